pub mod artifact;
pub mod feature_builder;
pub mod inference;
pub mod linalg;
pub mod model_search;
pub mod regressors;
pub mod scaler;
pub mod trainer;

pub use artifact::ModelArtifact;
pub use feature_builder::{FeatureBuilder, MarketHistory};
pub use inference::InferenceEngine;
pub use regressors::{FittedEstimator, Regressor};
pub use scaler::StandardScaler;
pub use trainer::ModelTrainer;
