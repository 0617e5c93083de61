//! ridetrack - location acquisition core for a crowd-sourced fleet-tracking
//! client.
//!
//! This library turns raw, noisy, asynchronous position reports from multiple
//! on-device providers into a single trustworthy "current position" stream
//! that the rest of the application (map rendering, peer broadcast, chat
//! gating) consumes.
//!
//! # High-Level API
//!
//! ```ignore
//! use std::sync::Arc;
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
//!     println!("position: {fix}");
//! }
//! ```

pub mod location;
pub mod logging;
pub mod time;

/// Version of the ridetrack library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
