//! Provider registry: enumerates position sources and manages their
//! subscriptions over the orchestrator's lifetime.
//!
//! The registry owns one forwarder task per subscribed provider. Each
//! forwarder drains that provider's [`FixSubscription`] into the
//! orchestrator's single raw-fix queue. [`unsubscribe_all`] cancels the
//! forwarders and joins them, so when it returns no further fixes can reach
//! the queue.
//!
//! [`unsubscribe_all`]: ProviderRegistry::unsubscribe_all

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::fix::PositionFix;
use super::provider::PositionProvider;

/// Tracked state for one registered provider.
#[derive(Debug, Clone)]
pub struct ProviderState {
    /// Provider identifier.
    pub id: String,

    /// Whether the provider reported itself enabled at subscribe time.
    pub enabled: bool,

    /// Whether a subscription is currently active.
    ///
    /// Invariant: `subscribed` implies `enabled`.
    pub subscribed: bool,
}

struct ActiveSubscription {
    forwarder: JoinHandle<()>,
}

/// Registry of position providers.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn PositionProvider>>,
    states: Vec<ProviderState>,
    active: Vec<ActiveSubscription>,
    cancel: CancellationToken,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            states: Vec::new(),
            active: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Register a provider. Registration alone does not subscribe.
    pub fn register(&mut self, provider: Arc<dyn PositionProvider>) {
        self.providers.push(provider);
    }

    /// Identifiers of providers that currently report themselves enabled.
    pub fn enabled_provider_ids(&self) -> Vec<String> {
        self.providers
            .iter()
            .filter(|p| p.is_enabled())
            .map(|p| p.id().to_string())
            .collect()
    }

    /// Per-provider state snapshot from the most recent subscribe pass.
    pub fn provider_states(&self) -> &[ProviderState] {
        &self.states
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.active.len()
    }

    /// Subscribe to every enabled provider, forwarding fixes into `raw_tx`.
    ///
    /// Disabled providers are silently skipped. A provider whose subscribe
    /// call fails is logged and skipped without affecting the others.
    /// Returns the number of subscriptions opened.
    pub fn subscribe_enabled(&mut self, raw_tx: mpsc::Sender<PositionFix>) -> usize {
        if !self.active.is_empty() {
            // Already subscribed; a repeated start must not duplicate.
            debug!("Providers already subscribed, skipping");
            return self.active.len();
        }

        self.cancel = CancellationToken::new();
        self.states.clear();

        for provider in &self.providers {
            let id = provider.id().to_string();

            if !provider.is_enabled() {
                debug!(provider = %id, "Provider disabled, skipping");
                self.states.push(ProviderState {
                    id,
                    enabled: false,
                    subscribed: false,
                });
                continue;
            }

            let mut subscription = match provider.subscribe() {
                Ok(sub) => sub,
                Err(e) => {
                    warn!(provider = %id, error = %e, "Provider subscription failed");
                    self.states.push(ProviderState {
                        id,
                        enabled: true,
                        subscribed: false,
                    });
                    continue;
                }
            };

            let tx = raw_tx.clone();
            let cancel = self.cancel.clone();
            let task_id = id.clone();
            let forwarder = tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        fix = subscription.recv() => {
                            let Some(fix) = fix else { break };
                            if tx.send(fix).await.is_err() {
                                // Orchestrator queue gone; nothing left to do.
                                break;
                            }
                        }
                    }
                }
                debug!(provider = %task_id, "Fix forwarder stopped");
            });

            self.active.push(ActiveSubscription { forwarder });
            self.states.push(ProviderState {
                id,
                enabled: true,
                subscribed: true,
            });
        }

        info!(
            subscribed = self.active.len(),
            registered = self.providers.len(),
            "Provider subscriptions opened"
        );
        self.active.len()
    }

    /// Cancel all subscriptions and wait for their forwarders to finish.
    ///
    /// Acts as a barrier: after this returns, no further fixes from these
    /// subscriptions can reach the raw-fix queue. Idempotent; safe to call
    /// when nothing is subscribed.
    pub async fn unsubscribe_all(&mut self) {
        if self.active.is_empty() {
            return;
        }

        self.cancel.cancel();
        for sub in self.active.drain(..) {
            if let Err(e) = sub.forwarder.await {
                warn!(error = %e, "Fix forwarder task panicked");
            }
        }
        for state in &mut self.states {
            state.subscribed = false;
        }
        info!("Provider subscriptions closed");
    }

    /// Each provider's platform-reported last fix, in registration order.
    ///
    /// Disabled providers are included; their cached fixes are still
    /// legitimate "best known" candidates.
    pub fn last_known_fixes(&self) -> Vec<PositionFix> {
        self.providers
            .iter()
            .filter_map(|p| p.last_known_fix())
            .collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::provider::{ChannelProvider, ChannelProviderConfig, ProviderError};
    use std::time::Duration;

    fn instant_provider(id: &str) -> Arc<ChannelProvider> {
        Arc::new(ChannelProvider::new(
            id,
            ChannelProviderConfig {
                min_update_interval: Duration::ZERO,
                ..Default::default()
            },
        ))
    }

    fn fix(observed_at: i64) -> PositionFix {
        PositionFix::new(53.55, 9.99, 20.0, observed_at, "raw")
    }

    /// Provider that claims to be enabled but fails to subscribe.
    struct FlakyProvider;

    impl PositionProvider for FlakyProvider {
        fn id(&self) -> &str {
            "flaky"
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn subscribe(&self) -> Result<crate::location::provider::FixSubscription, ProviderError> {
            Err(ProviderError::SubscribeFailed {
                provider: "flaky".to_string(),
                reason: "platform denied".to_string(),
            })
        }

        fn last_known_fix(&self) -> Option<PositionFix> {
            None
        }
    }

    #[tokio::test]
    async fn test_subscribes_enabled_skips_disabled() {
        let gps = instant_provider("gps");
        let network = instant_provider("network");
        network.set_enabled(false);

        let mut registry = ProviderRegistry::new();
        registry.register(gps.clone());
        registry.register(network.clone());

        let (tx, _rx) = mpsc::channel(16);
        assert_eq!(registry.subscribe_enabled(tx), 1);

        assert_eq!(registry.enabled_provider_ids(), vec!["gps".to_string()]);
        let states = registry.provider_states();
        assert!(states.iter().any(|s| s.id == "gps" && s.subscribed));
        assert!(states.iter().any(|s| s.id == "network" && !s.subscribed));

        registry.unsubscribe_all().await;
    }

    #[tokio::test]
    async fn test_subscribe_failure_does_not_block_others() {
        let gps = instant_provider("gps");

        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(FlakyProvider));
        registry.register(gps.clone());

        let (tx, mut rx) = mpsc::channel(16);
        assert_eq!(registry.subscribe_enabled(tx), 1);

        gps.feed().report(fix(1_000));
        let delivered = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("fix forwarded in time")
            .expect("channel open");
        assert_eq!(delivered.provider, "gps");

        registry.unsubscribe_all().await;
    }

    #[tokio::test]
    async fn test_repeated_subscribe_does_not_duplicate() {
        let gps = instant_provider("gps");
        let mut registry = ProviderRegistry::new();
        registry.register(gps.clone());

        let (tx, mut rx) = mpsc::channel(16);
        assert_eq!(registry.subscribe_enabled(tx.clone()), 1);
        assert_eq!(registry.subscribe_enabled(tx), 1);
        assert_eq!(registry.subscription_count(), 1);

        gps.feed().report(fix(1_000));
        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.observed_at_millis, 1_000);

        // Only one subscription, so exactly one copy was forwarded.
        assert!(rx.try_recv().is_err());

        registry.unsubscribe_all().await;
    }

    #[tokio::test]
    async fn test_unsubscribe_all_is_a_barrier_and_idempotent() {
        let gps = instant_provider("gps");
        let mut registry = ProviderRegistry::new();
        registry.register(gps.clone());

        let (tx, mut rx) = mpsc::channel(16);
        registry.subscribe_enabled(tx);

        registry.unsubscribe_all().await;
        registry.unsubscribe_all().await; // second call is a no-op

        // Fixes reported after the barrier never reach the queue.
        gps.feed().report(fix(1_000));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(registry.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_last_known_fixes_includes_disabled() {
        let gps = instant_provider("gps");
        let network = instant_provider("network");
        gps.feed().report(fix(1_000));
        network.feed().report(fix(2_000));
        network.set_enabled(false);

        let mut registry = ProviderRegistry::new();
        registry.register(gps);
        registry.register(network);

        let fixes = registry.last_known_fixes();
        assert_eq!(fixes.len(), 2);
    }
}
