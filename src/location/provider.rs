//! Position provider seam: the trait platform sources implement, the
//! cancellable subscription handle they hand out, and a channel-backed
//! reference provider.
//!
//! A provider is a named source of position fixes (satellite-based,
//! network-based, a replay file, ...). The registry queries availability at
//! subscribe time and pulls fixes through a [`FixSubscription`], which
//! guarantees no further deliveries once it has been cancelled.
//!
//! # Example
//!
//! ```ignore
//! let gps = ChannelProvider::new("gps", ChannelProviderConfig::default());
//! let feed = gps.feed();
//!
//! // Platform callback bridge:
//! feed.report(PositionFix::new(53.55, 9.99, 12.0, now_millis, "gps"));
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::fix::PositionFix;

/// Errors from provider subscription.
///
/// Non-fatal by design: a provider that cannot be subscribed is logged and
/// skipped; remaining providers are unaffected.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider is disabled or the platform denied the subscription.
    #[error("Provider '{0}' is unavailable")]
    Unavailable(String),

    /// The platform subscription call failed.
    #[error("Failed to subscribe to provider '{provider}': {reason}")]
    SubscribeFailed { provider: String, reason: String },
}

/// A named source of position fixes.
///
/// Implementations bridge whatever the platform offers (OS location
/// services, NMEA streams, replay files) to a uniform subscribe contract.
pub trait PositionProvider: Send + Sync {
    /// Opaque identifier of this provider, carried on every fix it emits.
    fn id(&self) -> &str;

    /// Whether the platform currently reports this source as usable.
    ///
    /// Queried at subscribe time only; a provider that becomes enabled later
    /// is not picked up until the next start cycle.
    fn is_enabled(&self) -> bool;

    /// Open a subscription delivering this provider's fixes.
    fn subscribe(&self) -> Result<FixSubscription, ProviderError>;

    /// The platform-reported last fix from this source, if any.
    ///
    /// Used as the cold-start fallback when no fresh persisted fix exists.
    fn last_known_fix(&self) -> Option<PositionFix>;
}

/// Handle to an open provider subscription.
///
/// Owns the receiving end of the fix stream and a cancellation token shared
/// with the producing side. Once [`cancel`](Self::cancel) is called (or the
/// handle is dropped) the producer observes the token and stops delivering.
pub struct FixSubscription {
    rx: mpsc::Receiver<PositionFix>,
    cancel: CancellationToken,
}

impl FixSubscription {
    /// Create a subscription from its channel half and cancellation token.
    pub fn new(rx: mpsc::Receiver<PositionFix>, cancel: CancellationToken) -> Self {
        Self { rx, cancel }
    }

    /// Receive the next fix, or `None` once the subscription is finished
    /// (cancelled, or the producer went away).
    pub async fn recv(&mut self) -> Option<PositionFix> {
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            fix = self.rx.recv() => fix,
        }
    }

    /// Stop the subscription. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token observed by the producing side.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for FixSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Configuration for [`ChannelProvider`] delivery gating.
#[derive(Debug, Clone)]
pub struct ChannelProviderConfig {
    /// Minimum interval between delivered fixes.
    pub min_update_interval: Duration,

    /// Minimum displacement (meters) between delivered fixes.
    ///
    /// A fix closer than this to the previously delivered one is dropped,
    /// unless the time gate alone admits it. Zero disables the gate.
    pub min_displacement_meters: f64,

    /// Capacity of each subscription channel.
    pub channel_capacity: usize,
}

impl Default for ChannelProviderConfig {
    fn default() -> Self {
        Self {
            min_update_interval: Duration::from_secs(3),
            min_displacement_meters: 0.0,
            channel_capacity: 16,
        }
    }
}

struct ChannelProviderState {
    subscribers: Vec<(mpsc::Sender<PositionFix>, CancellationToken)>,
    last_delivered: Option<PositionFix>,
    enabled: bool,
}

/// In-process provider fed through a [`FixFeed`] handle.
///
/// This is the bridge between platform location callbacks and the registry:
/// the embedding application pushes raw fixes into the feed, and the provider
/// fans them out to open subscriptions, applying minimum time/displacement
/// gating so subscribers are not flooded.
pub struct ChannelProvider {
    id: String,
    config: ChannelProviderConfig,
    state: Arc<Mutex<ChannelProviderState>>,
}

impl ChannelProvider {
    /// Create a provider with the given id and delivery gating.
    pub fn new(id: impl Into<String>, config: ChannelProviderConfig) -> Self {
        Self {
            id: id.into(),
            config,
            state: Arc::new(Mutex::new(ChannelProviderState {
                subscribers: Vec::new(),
                last_delivered: None,
                enabled: true,
            })),
        }
    }

    /// Create with default gating.
    pub fn with_defaults(id: impl Into<String>) -> Self {
        Self::new(id, ChannelProviderConfig::default())
    }

    /// Mark this provider enabled or disabled (platform availability).
    pub fn set_enabled(&self, enabled: bool) {
        self.state.lock().unwrap().enabled = enabled;
    }

    /// Handle for pushing fixes into this provider.
    pub fn feed(&self) -> FixFeed {
        FixFeed {
            id: self.id.clone(),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl PositionProvider for ChannelProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_enabled(&self) -> bool {
        self.state.lock().unwrap().enabled
    }

    fn subscribe(&self) -> Result<FixSubscription, ProviderError> {
        let mut state = self.state.lock().unwrap();
        if !state.enabled {
            return Err(ProviderError::Unavailable(self.id.clone()));
        }

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let cancel = CancellationToken::new();
        state.subscribers.push((tx, cancel.clone()));

        debug!(provider = %self.id, "Subscription opened");
        Ok(FixSubscription::new(rx, cancel))
    }

    fn last_known_fix(&self) -> Option<PositionFix> {
        self.state.lock().unwrap().last_delivered.clone()
    }
}

/// Producer handle for a [`ChannelProvider`].
///
/// Cloneable; typically owned by the platform callback bridge.
#[derive(Clone)]
pub struct FixFeed {
    id: String,
    config: ChannelProviderConfig,
    state: Arc<Mutex<ChannelProviderState>>,
}

impl FixFeed {
    /// Push a raw fix into the provider.
    ///
    /// The fix is stamped with the provider id, gated by the configured
    /// minimum interval and displacement, and fanned out to open
    /// subscriptions. Cancelled or closed subscriptions are pruned.
    /// Returns `true` when the fix was delivered to subscribers.
    pub fn report(&self, mut fix: PositionFix) -> bool {
        fix.provider = self.id.clone();

        let mut state = self.state.lock().unwrap();

        if let Some(last) = &state.last_delivered {
            let elapsed_ms = fix.observed_at_millis - last.observed_at_millis;
            if elapsed_ms < self.config.min_update_interval.as_millis() as i64 {
                trace!(provider = %self.id, elapsed_ms, "Fix dropped by time gate");
                return false;
            }
            if self.config.min_displacement_meters > 0.0 {
                let moved = haversine_meters(
                    last.latitude,
                    last.longitude,
                    fix.latitude,
                    fix.longitude,
                );
                if moved < self.config.min_displacement_meters {
                    trace!(provider = %self.id, moved, "Fix dropped by displacement gate");
                    return false;
                }
            }
        }

        state.last_delivered = Some(fix.clone());
        state
            .subscribers
            .retain(|(tx, cancel)| !cancel.is_cancelled() && !tx.is_closed());

        for (tx, _) in &state.subscribers {
            // Slow subscribers lose the fix rather than stalling the feed.
            if let Err(e) = tx.try_send(fix.clone()) {
                trace!(provider = %self.id, error = %e, "Subscriber not keeping up");
            }
        }

        !state.subscribers.is_empty()
    }
}

/// Great-circle distance between two coordinates, in meters.
fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}
