use std::time::Duration;

use crate::shared::constants::UNKNOWN_ETA;

/// Formats a remaining duration as `[HH:]MM:SS`.
///
/// Hours are left out when zero. Minutes are always shown.
pub fn format_eta(remaining: Duration) -> String {
    let total_secs = remaining.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs / 60) % 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Remaining time given how long the last frame took, in whole seconds per
/// frame. `None` for a zero sample.
pub fn remaining_time(completed: usize, total: usize, time_elapsed_ms: u64) -> Option<Duration> {
    if time_elapsed_ms == 0 {
        return None;
    }
    let left = total.saturating_sub(completed) as u64;
    Some(Duration::from_secs(time_elapsed_ms / 1000 * left))
}

/// ETA string for a render that has `completed` of `total` frames done and
/// spent `time_elapsed_ms` on the most recent one.
pub fn calculate_time_remaining(completed: usize, total: usize, time_elapsed_ms: u64) -> String {
    match remaining_time(completed, total, time_elapsed_ms) {
        Some(remaining) => format_eta(remaining),
        None => UNKNOWN_ETA.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "00:00")]
    #[case(5, "00:05")]
    #[case(59, "00:59")]
    #[case(60, "01:00")]
    #[case(20 * 60 + 7, "20:07")]
    #[case(3600, "01:00:00")]
    #[case(3600 + 61, "01:01:01")]
    #[case(2 * 3600 + 59 * 60 + 59, "02:59:59")]
    #[case(100 * 3600, "100:00:00")]
    fn test_format_eta(#[case] secs: u64, #[case] expected: &str) {
        assert_eq!(format_eta(Duration::from_secs(secs)), expected);
    }

    #[rstest]
    #[case(1, 11, 2000, "00:20")]
    #[case(1, 11, 0, "--:--")]
    #[case(0, 5, 0, "--:--")]
    #[case(5, 5, 3000, "00:00")]
    #[case(1, 3, 999, "00:00")]
    #[case(1, 3, 1999, "00:02")]
    #[case(0, 120, 30_000, "01:00:00")]
    fn test_calculate_time_remaining(
        #[case] completed: usize,
        #[case] total: usize,
        #[case] elapsed_ms: u64,
        #[case] expected: &str,
    ) {
        assert_eq!(calculate_time_remaining(completed, total, elapsed_ms), expected);
    }

    #[test]
    fn test_remaining_time_never_underflows() {
        assert_eq!(remaining_time(7, 5, 1000), Some(Duration::ZERO));
    }
}
