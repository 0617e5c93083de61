//! Fix acceptance policy - decides whether a candidate fix supersedes the
//! last accepted one.
//!
//! # Selection logic
//!
//! 1. Any fix is better than no fix.
//! 2. A fix more than 30 seconds newer always wins: a tracked vehicle moving
//!    at typical fleet speed can cover more ground in that interval than the
//!    accuracy budget, so recency dominates.
//! 3. A fix more than 30 seconds older than the accepted one never wins.
//! 4. Within the 30 second window, accuracy and recency are traded off:
//!    strictly better accuracy wins, newer-and-not-worse wins, and a newer
//!    fix from the same provider wins unless accuracy degraded by more than
//!    120 meters. Cross-provider jumps are only trusted when accuracy clearly
//!    improves, which suppresses provider-switch jitter.
//!
//! All functions here are pure: no side effects, identical results for
//! identical inputs, safe to call concurrently.

use super::fix::PositionFix;

/// Time delta beyond which a newer fix unconditionally supersedes the
/// accepted one (and an older fix is unconditionally stale).
pub const MAX_FIX_AGE_MS: i64 = 30_000;

/// Accuracy degradation (meters) beyond which a newer same-provider fix is
/// no longer trusted within the tie-break window.
pub const SIGNIFICANT_ACCURACY_LOSS_METERS: f32 = 120.0;

/// Decide whether `candidate` should replace `last`.
///
/// Returns `true` when the candidate supersedes the last accepted fix.
/// With `last == None` any candidate is accepted.
pub fn should_accept(candidate: &PositionFix, last: Option<&PositionFix>) -> bool {
    let Some(last) = last else {
        // Any location is better than no location
        return true;
    };

    let time_delta = candidate.observed_at_millis - last.observed_at_millis;

    if time_delta > MAX_FIX_AGE_MS {
        return true;
    }
    if time_delta < -MAX_FIX_AGE_MS {
        return false;
    }

    let accuracy_delta = candidate.accuracy_meters - last.accuracy_meters;
    let is_more_accurate = accuracy_delta < 0.0;
    let is_less_accurate = accuracy_delta > 0.0;
    let is_significantly_less_accurate = accuracy_delta > SIGNIFICANT_ACCURACY_LOSS_METERS;

    let is_newer = time_delta > 0;
    let same_provider = candidate.provider == last.provider;

    if is_more_accurate {
        return true;
    }
    if is_newer && !is_less_accurate {
        return true;
    }
    if is_newer && !is_significantly_less_accurate && same_provider {
        return true;
    }

    false
}

/// Pick the best fix among `candidates` by folding them pairwise through
/// [`should_accept`], starting from no accepted fix.
///
/// Used for the cold-start "best last known location" query across
/// providers. Returns `None` for an empty iterator.
pub fn best_of<I>(candidates: I) -> Option<PositionFix>
where
    I: IntoIterator<Item = PositionFix>,
{
    let mut best: Option<PositionFix> = None;
    for candidate in candidates {
        if should_accept(&candidate, best.as_ref()) {
            best = Some(candidate);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(accuracy: f32, observed_at: i64, provider: &str) -> PositionFix {
        PositionFix::new(53.55, 9.99, accuracy, observed_at, provider)
    }

    #[test]
    fn test_accepts_any_fix_when_none_accepted() {
        let candidate = fix(500.0, 0, "network");
        assert!(should_accept(&candidate, None));
    }

    #[test]
    fn test_significantly_newer_always_wins() {
        let last = fix(5.0, 100_000, "gps");
        // 30s + 1ms newer, far worse accuracy
        let candidate = fix(5_000.0, 130_001, "network");

        assert!(should_accept(&candidate, Some(&last)));
    }

    #[test]
    fn test_significantly_older_always_loses() {
        let last = fix(5_000.0, 130_001, "network");
        // 30s + 1ms older, far better accuracy
        let candidate = fix(5.0, 100_000, "gps");

        assert!(!should_accept(&candidate, Some(&last)));
    }

    #[test]
    fn test_exactly_at_window_boundary_falls_to_tie_break() {
        let last = fix(5.0, 100_000, "gps");
        // Exactly 30s newer is not "significantly" newer; accuracy worsens
        // by more than 120m from a different provider, so it loses.
        let candidate = fix(5_000.0, 130_000, "network");

        assert!(!should_accept(&candidate, Some(&last)));
    }

    #[test]
    fn test_exact_duplicate_rejected() {
        let last = fix(20.0, 100_000, "gps");
        let candidate = last.clone();

        // Zero deltas: not more accurate, not newer - falls through
        // every tie-break branch.
        assert!(!should_accept(&candidate, Some(&last)));
    }

    #[test]
    fn test_more_accurate_within_window_wins() {
        let last = fix(50.0, 100_000, "gps");
        let candidate = fix(20.0, 110_000, "network");

        assert!(should_accept(&candidate, Some(&last)));
    }

    #[test]
    fn test_more_accurate_but_slightly_older_wins() {
        let last = fix(50.0, 110_000, "gps");
        let candidate = fix(20.0, 100_000, "network");

        assert!(should_accept(&candidate, Some(&last)));
    }

    #[test]
    fn test_newer_same_accuracy_wins() {
        let last = fix(20.0, 100_000, "gps");
        let candidate = fix(20.0, 110_000, "network");

        assert!(should_accept(&candidate, Some(&last)));
    }

    #[test]
    fn test_newer_significantly_worse_same_provider_loses() {
        let last = fix(20.0, 100_000, "gps");
        // Delta 180m > 120m threshold
        let candidate = fix(200.0, 110_000, "gps");

        assert!(!should_accept(&candidate, Some(&last)));
    }

    #[test]
    fn test_newer_moderately_worse_same_provider_wins() {
        let last = fix(20.0, 100_000, "gps");
        // Delta 80m <= 120m threshold
        let candidate = fix(100.0, 110_000, "gps");

        assert!(should_accept(&candidate, Some(&last)));
    }

    #[test]
    fn test_newer_worse_different_provider_loses() {
        let last = fix(20.0, 100_000, "gps");
        // Only 50m worse, but from a different provider
        let candidate = fix(70.0, 110_000, "network");

        assert!(!should_accept(&candidate, Some(&last)));
    }

    #[test]
    fn test_older_within_window_not_more_accurate_loses() {
        let last = fix(20.0, 110_000, "gps");
        let candidate = fix(20.0, 100_000, "gps");

        assert!(!should_accept(&candidate, Some(&last)));
    }

    #[test]
    fn test_best_of_empty_is_none() {
        assert!(best_of(std::iter::empty()).is_none());
    }

    #[test]
    fn test_best_of_single() {
        let best = best_of(vec![fix(500.0, 100, "network")]).unwrap();
        assert_eq!(best.provider, "network");
    }

    #[test]
    fn test_best_of_prefers_accuracy_within_window() {
        let best = best_of(vec![
            fix(50.0, 100_000, "network"),
            fix(20.0, 101_000, "gps"),
            fix(80.0, 102_000, "network"),
        ])
        .unwrap();

        assert_eq!(best.provider, "gps");
        assert_eq!(best.accuracy_meters, 20.0);
    }

    #[test]
    fn test_best_of_prefers_much_newer_regardless_of_accuracy() {
        let best = best_of(vec![
            fix(5.0, 100_000, "gps"),
            fix(300.0, 200_000, "network"),
        ])
        .unwrap();

        assert_eq!(best.provider, "network");
    }
}
