pub mod eta;
pub mod progress_estimator;
