// Feature layout and model selection
pub mod feature_frame;
pub mod feature_registry;
pub mod model_kind;

pub use feature_frame::{FeatureFrame, TrainingSet};
pub use feature_registry::FeatureLayout;
pub use model_kind::ModelKind;
