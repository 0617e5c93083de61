//! Location acquisition core.
//!
//! This module turns raw, noisy, asynchronous position reports from multiple
//! providers into a single trustworthy "current position" stream. It is the
//! **single source of truth** for the tracked vehicle's position; map
//! rendering, peer broadcast and chat gating all consume it through the pull
//! and push seams it exposes.
//!
//! # Architecture
//!
//! Providers push fixes through cancellable subscriptions into one raw-fix
//! queue owned by the [`LocationOrchestrator`]. A single consumer task drains
//! the queue and, for each candidate fix, asks the pure acceptance policy
//! whether it supersedes the last accepted fix:
//!
//! 1. Any fix beats no fix.
//! 2. A fix more than 30 s newer than the accepted one always wins;
//!    more than 30 s older always loses.
//! 3. Within the window, accuracy and recency are traded off, and
//!    cross-provider jumps are only trusted when accuracy clearly improves.
//!
//! Accepted fixes update the in-memory state, are persisted best-effort to a
//! single-slot [`FixStore`], and are broadcast to subscribers. Rejected fixes
//! are dropped silently.
//!
//! # Usage
//!
//! ```ignore
//! use ridetrack::location::{
//!     ChannelProvider, FixStore, LocationBroadcaster, LocationOrchestrator,
//!     OrchestratorConfig, ProviderRegistry,
//! };
//!
//! let gps = Arc::new(ChannelProvider::with_defaults("gps"));
//! let mut registry = ProviderRegistry::new();
//! registry.register(gps.clone());
//!
//! let orchestrator = LocationOrchestrator::new(
//!     registry,
//!     FixStore::at_default_path(),
//!     OrchestratorConfig::default(),
//! );
//! orchestrator.start().await;
//!
//! let mut updates = orchestrator.subscribe();
//! while let Ok(fix) = updates.recv().await {
//!     // render, broadcast to peers, enable chat input
//! }
//! ```
//!
//! # Components
//!
//! - [`fix`] - Core types: [`PositionFix`], [`StoredFix`], [`LastKnownLocation`]
//! - [`policy`] - Pure acceptance decision and the pairwise best-of fold
//! - [`store`] - [`FixStore`] single-slot persistence with freshness gating
//! - [`provider`] - [`PositionProvider`] trait, [`FixSubscription`], [`ChannelProvider`]
//! - [`registry`] - [`ProviderRegistry`] subscribe/unsubscribe lifecycle
//! - [`orchestrator`] - [`LocationOrchestrator`] and the consumer seams

mod fix;
pub mod policy;
mod provider;
mod registry;
mod store;

pub mod orchestrator;

pub use fix::{LastKnownLocation, PositionFix, StoredFix};
pub use orchestrator::{
    LifecycleState, LocationBroadcaster, LocationOrchestrator, LocationQuery, OrchestratorConfig,
};
pub use policy::{MAX_FIX_AGE_MS, SIGNIFICANT_ACCURACY_LOSS_METERS};
pub use provider::{
    ChannelProvider, ChannelProviderConfig, FixFeed, FixSubscription, PositionProvider,
    ProviderError,
};
pub use registry::{ProviderRegistry, ProviderState};
pub use store::{FixStore, StoreError, FRESHNESS_WINDOW_MS};
