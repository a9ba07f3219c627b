use std::time::Duration;

use crate::shared::constants::UNKNOWN_ETA;

use super::eta::{format_eta, remaining_time};

/// Snapshot of how far a render has come.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Progress {
    completed: usize,
    total: usize,
    last_frame_duration: Duration,
    eta: Option<Duration>,
}

impl Progress {
    pub fn new(
        completed: usize,
        total: usize,
        last_frame_duration: Duration,
        eta: Option<Duration>,
    ) -> Self {
        Self {
            completed: completed.min(total),
            total,
            last_frame_duration,
            eta,
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn last_frame_duration(&self) -> Duration {
        self.last_frame_duration
    }

    /// `None` while the estimate is unknown.
    pub fn eta(&self) -> Option<Duration> {
        self.eta
    }

    /// Completed share in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }

    pub fn eta_string(&self) -> String {
        match self.eta {
            Some(eta) => format_eta(eta),
            None => UNKNOWN_ETA.to_string(),
        }
    }
}

/// Turns per-frame timing samples into progress reports.
pub trait ProgressEstimator: Send {
    fn estimate(&mut self, completed: usize, total: usize, last_frame_duration: Duration)
        -> Progress;
}

/// Projects the most recent frame's duration onto the remaining frames.
#[derive(Debug, Default)]
pub struct LastFrameEstimator;

impl ProgressEstimator for LastFrameEstimator {
    fn estimate(
        &mut self,
        completed: usize,
        total: usize,
        last_frame_duration: Duration,
    ) -> Progress {
        let elapsed_ms = last_frame_duration.as_millis() as u64;
        let eta = remaining_time(completed, total, elapsed_ms);
        Progress::new(completed, total, last_frame_duration, eta)
    }
}

/// Exponential moving average over frame durations.
#[derive(Debug)]
pub struct SmoothedEstimator {
    alpha: f64,
    average_ms: Option<f64>,
}

impl SmoothedEstimator {
    pub const DEFAULT_ALPHA: f64 = 0.3;

    /// `alpha` is clamped into `(0, 1]`; larger values follow recent frames
    /// more closely.
    pub fn new(alpha: f64) -> Self {
        let alpha = if alpha.is_finite() {
            alpha.clamp(f64::EPSILON, 1.0)
        } else {
            Self::DEFAULT_ALPHA
        };
        Self {
            alpha,
            average_ms: None,
        }
    }

    pub fn average_ms(&self) -> Option<f64> {
        self.average_ms
    }
}

impl Default for SmoothedEstimator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ALPHA)
    }
}

impl ProgressEstimator for SmoothedEstimator {
    fn estimate(
        &mut self,
        completed: usize,
        total: usize,
        last_frame_duration: Duration,
    ) -> Progress {
        let sample_ms = last_frame_duration.as_millis() as u64;
        if sample_ms == 0 {
            return Progress::new(completed, total, last_frame_duration, None);
        }

        let sample = sample_ms as f64;
        let average = match self.average_ms {
            Some(avg) => self.alpha * sample + (1.0 - self.alpha) * avg,
            None => sample,
        };
        self.average_ms = Some(average);

        let left = total.saturating_sub(completed) as f64;
        let eta = Duration::from_secs((average * left / 1000.0).floor() as u64);
        Progress::new(completed, total, last_frame_duration, Some(eta))
    }
}

/// Which estimator a render uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EtaStrategy {
    #[default]
    LastFrame,
    Smoothed,
}

impl EtaStrategy {
    pub fn estimator(self) -> Box<dyn ProgressEstimator> {
        match self {
            EtaStrategy::LastFrame => Box::new(LastFrameEstimator),
            EtaStrategy::Smoothed => Box::new(SmoothedEstimator::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_fraction() {
        let progress = Progress::new(1, 3, ms(10), None);
        assert_relative_eq!(progress.fraction(), 1.0 / 3.0);
        assert_relative_eq!(Progress::new(3, 3, ms(10), None).fraction(), 1.0);
        assert_relative_eq!(Progress::new(0, 0, ms(0), None).fraction(), 0.0);
    }

    #[test]
    fn test_completed_clamped_to_total() {
        let progress = Progress::new(4, 3, ms(10), None);
        assert_eq!(progress.completed(), 3);
    }

    #[test]
    fn test_last_frame_first_sample_unknown() {
        let progress = LastFrameEstimator.estimate(1, 11, Duration::ZERO);
        assert_eq!(progress.eta(), None);
        assert_eq!(progress.eta_string(), "--:--");
    }

    #[test]
    fn test_last_frame_sub_millisecond_is_unknown() {
        let progress = LastFrameEstimator.estimate(1, 11, Duration::from_micros(400));
        assert_eq!(progress.eta_string(), "--:--");
    }

    #[test]
    fn test_last_frame_uses_only_latest_sample() {
        let mut estimator = LastFrameEstimator;
        estimator.estimate(1, 11, ms(9000));
        let progress = estimator.estimate(2, 11, ms(2000));
        assert_eq!(progress.eta(), Some(Duration::from_secs(18)));
        assert_eq!(progress.eta_string(), "00:18");
    }

    #[test]
    fn test_last_frame_matches_reference_example() {
        let progress = LastFrameEstimator.estimate(1, 11, ms(2000));
        assert_eq!(progress.eta_string(), "00:20");
        assert_relative_eq!(progress.fraction(), 1.0 / 11.0);
    }

    #[test]
    fn test_smoothed_first_sample_is_the_average() {
        let mut estimator = SmoothedEstimator::default();
        let progress = estimator.estimate(1, 11, ms(2000));
        assert_relative_eq!(estimator.average_ms().unwrap(), 2000.0);
        assert_eq!(progress.eta_string(), "00:20");
    }

    #[test]
    fn test_smoothed_moving_average() {
        let mut estimator = SmoothedEstimator::new(0.5);
        estimator.estimate(1, 10, ms(1000));
        let progress = estimator.estimate(2, 10, ms(3000));
        assert_relative_eq!(estimator.average_ms().unwrap(), 2000.0);
        assert_eq!(progress.eta(), Some(Duration::from_secs(16)));
    }

    #[test]
    fn test_smoothed_zero_sample_keeps_average() {
        let mut estimator = SmoothedEstimator::default();
        estimator.estimate(1, 10, ms(1000));
        let progress = estimator.estimate(2, 10, Duration::ZERO);
        assert_eq!(progress.eta(), None);
        assert_relative_eq!(estimator.average_ms().unwrap(), 1000.0);
    }

    #[test]
    fn test_smoothed_alpha_is_clamped() {
        let mut estimator = SmoothedEstimator::new(7.0);
        estimator.estimate(1, 10, ms(1000));
        estimator.estimate(2, 10, ms(4000));
        assert_relative_eq!(estimator.average_ms().unwrap(), 4000.0);
    }

    #[test]
    fn test_strategy_builds_estimator() {
        let mut estimator = EtaStrategy::Smoothed.estimator();
        assert_eq!(estimator.estimate(1, 2, ms(1000)).total(), 2);
        assert_eq!(EtaStrategy::default(), EtaStrategy::LastFrame);
    }
}
