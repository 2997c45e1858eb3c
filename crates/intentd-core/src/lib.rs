pub mod context;
pub mod normalize;
pub mod registry;
pub mod types;

pub use context::compose;
pub use normalize::normalize;
pub use registry::{GENERAL_INTENT, IntentEntry, IntentRegistry, RegistryError};
pub use types::{ClassificationRequest, ClassificationResult, Health, LabelScore, ScoreMap, Turn};
