//! Location orchestrator - owns the provider lifecycle and the accept path.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    LocationOrchestrator                      │
//! │                                                              │
//! │  ProviderRegistry ──► raw-fix mpsc ──► consumer task         │
//! │   (forwarders)          queue           │                    │
//! │                                         ├─ acceptance policy │
//! │                                         ├─ FixStore.save     │
//! │                                         └─ broadcast publish │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Provider callbacks may arrive concurrently, but all fixes funnel through
//! one queue drained by a single consumer task, so accept-decide-persist-
//! publish is serialized without ad-hoc locking. The acceptance state lives
//! in an `RwLock` written only by the consumer; the write lock is released
//! before the save is dispatched and before subscribers run, so neither disk
//! latency nor subscriber code can stall the next fix's evaluation.
//!
//! # Lifecycle
//!
//! `Stopped → Starting → Running → Stopped`, re-entrant. `start()` is a
//! no-op while running; `stop()` is idempotent and acts as a barrier - once
//! it returns, no further fixes are evaluated until the next `start()`.
//!
//! # Usage
//!
//! ```ignore
//! let mut registry = ProviderRegistry::new();
//! registry.register(gps_provider);
//!
//! let orchestrator = LocationOrchestrator::new(registry, store, Default::default());
//! orchestrator.start().await;
//!
//! let mut updates = orchestrator.subscribe();
//! while let Ok(fix) = updates.recv().await {
//!     // map rendering, peer broadcast, chat gating
//! }
//! ```

use std::sync::{Arc, RwLock};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::fix::{LastKnownLocation, PositionFix};
use super::policy;
use super::registry::ProviderRegistry;
use super::store::FixStore;

/// Configuration for the orchestrator's channels.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Capacity of the raw-fix queue between providers and the consumer.
    pub raw_queue_capacity: usize,

    /// Capacity of the publish broadcast channel.
    pub publish_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            raw_queue_capacity: 64,
            publish_capacity: 16,
        }
    }
}

/// Lifecycle of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Not subscribed to any provider.
    #[default]
    Stopped,
    /// Subscriptions being established.
    Starting,
    /// Subscribed; fixes are being evaluated.
    Running,
}

/// The orchestrator's retained acceptance state.
///
/// Absent at construction, set on the first accepted fix, overwritten on
/// each subsequent acceptance, cleared only by [`LocationOrchestrator::reset`].
#[derive(Debug, Default)]
struct AcceptanceState {
    last_accepted: Option<PositionFix>,
}

struct Lifecycle {
    state: LifecycleState,
    consumer: Option<JoinHandle<()>>,
    raw_tx: Option<mpsc::Sender<PositionFix>>,
}

/// Pull API for the current accepted position.
///
/// This is the only query surface consumers (chat gating, map rendering)
/// need besides the publish channel.
pub trait LocationQuery: Send + Sync {
    /// The last accepted fix, if any.
    fn current_fix(&self) -> Option<PositionFix>;

    /// Whether any fix has been accepted since construction or reset.
    fn has_fix(&self) -> bool;
}

/// Push API for accepted-fix updates.
///
/// Delivery is at-most-once per accepted fix, never batched or coalesced;
/// order across subscribers is unspecified.
pub trait LocationBroadcaster: Send + Sync {
    /// Subscribe to accepted-fix updates.
    fn subscribe(&self) -> broadcast::Receiver<PositionFix>;
}

/// Orchestrates providers, the acceptance policy, persistence and publish.
pub struct LocationOrchestrator {
    registry: tokio::sync::Mutex<ProviderRegistry>,
    store: FixStore,
    acceptance: Arc<RwLock<AcceptanceState>>,
    publish_tx: broadcast::Sender<PositionFix>,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
    config: OrchestratorConfig,
}

impl LocationOrchestrator {
    /// Create an orchestrator over the given providers and store.
    ///
    /// No subscriptions are opened until [`start`](Self::start).
    pub fn new(registry: ProviderRegistry, store: FixStore, config: OrchestratorConfig) -> Self {
        let (publish_tx, _) = broadcast::channel(config.publish_capacity);
        Self {
            registry: tokio::sync::Mutex::new(registry),
            store,
            acceptance: Arc::new(RwLock::new(AcceptanceState::default())),
            publish_tx,
            lifecycle: tokio::sync::Mutex::new(Lifecycle {
                state: LifecycleState::Stopped,
                consumer: None,
                raw_tx: None,
            }),
            config,
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> LifecycleState {
        self.lifecycle.lock().await.state
    }

    /// Subscribe to every enabled provider and begin evaluating fixes.
    ///
    /// No-op when already running: repeated calls never create duplicate
    /// subscriptions.
    pub async fn start(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.state == LifecycleState::Running {
            debug!("Orchestrator already running");
            return;
        }
        lifecycle.state = LifecycleState::Starting;

        let (raw_tx, raw_rx) = mpsc::channel(self.config.raw_queue_capacity);

        let subscribed = self.registry.lock().await.subscribe_enabled(raw_tx.clone());

        let acceptance = Arc::clone(&self.acceptance);
        let store = self.store.clone();
        let publish_tx = self.publish_tx.clone();
        let consumer = tokio::spawn(async move {
            consume_fixes(raw_rx, acceptance, store, publish_tx).await;
        });

        lifecycle.raw_tx = Some(raw_tx);
        lifecycle.consumer = Some(consumer);
        lifecycle.state = LifecycleState::Running;
        info!(subscribed, "Location orchestrator started");
    }

    /// Unsubscribe from all providers and stop evaluating fixes.
    ///
    /// Acts as a barrier: fixes already queued are still evaluated before
    /// this returns, and nothing arrives afterwards. Idempotent.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.state == LifecycleState::Stopped {
            debug!("Orchestrator already stopped");
            return;
        }

        // Barrier: no more fixes enter the queue after this returns.
        self.registry.lock().await.unsubscribe_all().await;

        // Closing our sender lets the consumer drain what is queued and exit.
        lifecycle.raw_tx = None;
        if let Some(consumer) = lifecycle.consumer.take() {
            if let Err(e) = consumer.await {
                warn!(error = %e, "Fix consumer task panicked");
            }
        }

        lifecycle.state = LifecycleState::Stopped;
        info!("Location orchestrator stopped");
    }

    /// Clear the acceptance state (e.g. provider permissions were revoked).
    ///
    /// The next observed fix is evaluated against no prior fix and is
    /// therefore accepted. The persisted record is left in place; it still
    /// corresponds to a fix that passed the policy.
    pub fn reset(&self) {
        self.acceptance
            .write()
            .expect("acceptance lock poisoned")
            .last_accepted = None;
        info!("Acceptance state reset");
    }

    /// Best known location for cold-start consumers.
    ///
    /// Returns the persisted record when it is complete and fresh relative
    /// to `now_millis`; otherwise falls back to the providers'
    /// platform-reported last fixes, arbitrated by the acceptance policy.
    /// `None` means "still searching" - a legitimate steady state, not an
    /// error.
    pub async fn last_known_location(&self, now_millis: i64) -> Option<LastKnownLocation> {
        if let Some(stored) = self.store.load_if_fresh(now_millis) {
            return Some(LastKnownLocation::from_stored(stored));
        }

        let candidates = self.registry.lock().await.last_known_fixes();
        policy::best_of(candidates).map(LastKnownLocation::from_fix)
    }

    /// [`last_known_location`](Self::last_known_location) relative to the
    /// current wall clock.
    pub async fn last_known_location_now(&self) -> Option<LastKnownLocation> {
        self.last_known_location(crate::time::unix_millis_now()).await
    }
}

impl LocationQuery for LocationOrchestrator {
    fn current_fix(&self) -> Option<PositionFix> {
        self.acceptance
            .read()
            .expect("acceptance lock poisoned")
            .last_accepted
            .clone()
    }

    fn has_fix(&self) -> bool {
        self.acceptance
            .read()
            .expect("acceptance lock poisoned")
            .last_accepted
            .is_some()
    }
}

impl LocationBroadcaster for LocationOrchestrator {
    fn subscribe(&self) -> broadcast::Receiver<PositionFix> {
        self.publish_tx.subscribe()
    }
}

impl LocationQuery for Arc<LocationOrchestrator> {
    fn current_fix(&self) -> Option<PositionFix> {
        (**self).current_fix()
    }

    fn has_fix(&self) -> bool {
        (**self).has_fix()
    }
}

impl LocationBroadcaster for Arc<LocationOrchestrator> {
    fn subscribe(&self) -> broadcast::Receiver<PositionFix> {
        (**self).subscribe()
    }
}

/// Drain the raw-fix queue, serializing accept-decide-persist-publish.
async fn consume_fixes(
    mut raw_rx: mpsc::Receiver<PositionFix>,
    acceptance: Arc<RwLock<AcceptanceState>>,
    store: FixStore,
    publish_tx: broadcast::Sender<PositionFix>,
) {
    debug!("Fix consumer started");

    while let Some(candidate) = raw_rx.recv().await {
        let accepted = {
            let mut state = acceptance.write().expect("acceptance lock poisoned");
            if policy::should_accept(&candidate, state.last_accepted.as_ref()) {
                state.last_accepted = Some(candidate.clone());
                true
            } else {
                false
            }
        };

        if !accepted {
            trace!(fix = %candidate, "Fix rejected");
            continue;
        }

        debug!(fix = %candidate, "Fix accepted");

        // Best-effort durability: dispatched off the consumer's critical
        // path, and failures never roll back the in-memory acceptance.
        let save_store = store.clone();
        let save_fix = candidate.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = save_store.save(&save_fix) {
                warn!(error = %e, "Failed to persist accepted fix");
            }
        });

        // At-most-once per accepted fix; no receivers is fine.
        let _ = publish_tx.send(candidate);
    }

    debug!("Fix consumer stopped");
}
