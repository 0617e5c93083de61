//! Time-related utility functions.
//!
//! Fix timestamps are wall-clock milliseconds since the Unix epoch, matching
//! what platform location services report. These helpers keep the conversion
//! in one place.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Saturates to zero for clocks set before the epoch rather than panicking.
pub fn unix_millis_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Convert a `SystemTime` to milliseconds since the Unix epoch.
///
/// Saturates to zero for times before the epoch.
pub fn unix_millis_from(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_unix_millis_now_is_recent() {
        let millis = unix_millis_now();
        // After 2020-01-01, before 2100-01-01
        assert!(millis > 1_577_836_800_000);
        assert!(millis < 4_102_444_800_000);
    }

    #[test]
    fn test_unix_millis_from_round_trip() {
        let time = UNIX_EPOCH + Duration::from_millis(1_724_400_000_000);
        assert_eq!(unix_millis_from(time), 1_724_400_000_000);
    }

    #[test]
    fn test_pre_epoch_saturates() {
        let time = UNIX_EPOCH - Duration::from_secs(60);
        assert_eq!(unix_millis_from(time), 0);
    }
}
