pub mod bundle;
pub mod linear;
pub mod logistic;
pub mod scaler;
pub mod trainer;

pub use bundle::{Prediction, Predictor};
pub use trainer::{train, TrainingMetrics};

pub const N_FEATURES: usize = 4;

/// Column order shared by training rows and prediction inputs.
pub const FEATURE_COLUMNS: [&str; N_FEATURES] =
    ["home_runs", "away_runs", "home_hits", "away_hits"];
