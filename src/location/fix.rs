//! Core value types for position tracking.
//!
//! This module defines the fundamental types used throughout the location
//! subsystem:
//!
//! - [`PositionFix`] - A single reported position from one provider
//! - [`StoredFix`] - The durable projection of the last accepted fix
//! - [`LastKnownLocation`] - Degraded position shape for cold-start queries

/// A single position report from one provider.
///
/// Immutable once constructed. A fix has no identity beyond its fields;
/// only ordering and acceptance matter, never equality.
#[derive(Debug, Clone)]
pub struct PositionFix {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,

    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,

    /// Reported accuracy radius in meters (lower is better).
    pub accuracy_meters: f32,

    /// Wall-clock reading from the source, in milliseconds since epoch.
    pub observed_at_millis: i64,

    /// Opaque identifier of the provider that produced this fix.
    pub provider: String,
}

impl PositionFix {
    /// Create a new position fix.
    pub fn new(
        latitude: f64,
        longitude: f64,
        accuracy_meters: f32,
        observed_at_millis: i64,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters,
            observed_at_millis,
            provider: provider.into(),
        }
    }

    /// Age of this fix relative to `now_millis`.
    ///
    /// Negative when the fix timestamp is in the future relative to `now`.
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis - self.observed_at_millis
    }
}

impl std::fmt::Display for PositionFix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.6},{:.6} ±{:.0}m via {} @{}",
            self.latitude, self.longitude, self.accuracy_meters, self.provider, self.observed_at_millis
        )
    }
}

/// The durable projection of the last accepted fix.
///
/// Only coordinates and the observation timestamp are persisted; accuracy and
/// provider are dropped at write time. Three typed fields, each independently
/// present or absent in storage - any missing field means no record.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFix {
    /// Latitude in degrees.
    pub latitude: f64,

    /// Longitude in degrees.
    pub longitude: f64,

    /// When the fix was observed, in milliseconds since epoch.
    pub observed_at_millis: i64,
}

/// Best known location for cold-start consumers.
///
/// Returned by [`LocationOrchestrator::last_known_location`]. When rebuilt
/// from the persisted record, accuracy and provider are unavailable; callers
/// must treat this as "best known location", never as a policy-eligible
/// candidate fix.
///
/// [`LocationOrchestrator::last_known_location`]: super::LocationOrchestrator::last_known_location
#[derive(Debug, Clone)]
pub struct LastKnownLocation {
    /// Latitude in degrees.
    pub latitude: f64,

    /// Longitude in degrees.
    pub longitude: f64,

    /// When the position was observed, in milliseconds since epoch.
    pub observed_at_millis: i64,

    /// Accuracy in meters, if known (absent when restored from storage).
    pub accuracy_meters: Option<f32>,

    /// Provider that produced the position, if known.
    pub provider: Option<String>,
}

impl LastKnownLocation {
    /// Build from a persisted record (accuracy and provider are not stored).
    pub fn from_stored(stored: StoredFix) -> Self {
        Self {
            latitude: stored.latitude,
            longitude: stored.longitude,
            observed_at_millis: stored.observed_at_millis,
            accuracy_meters: None,
            provider: None,
        }
    }

    /// Build from a live provider fix.
    pub fn from_fix(fix: PositionFix) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            observed_at_millis: fix.observed_at_millis,
            accuracy_meters: Some(fix.accuracy_meters),
            provider: Some(fix.provider),
        }
    }
}
