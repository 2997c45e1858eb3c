//! Classifier gateway and intent resolver: zero-shot scoring against a hosted
//! inference endpoint or a local ONNX Runtime model.

mod remote;
mod resolver;
mod scorer;

pub use remote::{DEFAULT_API_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT, RemoteConfig, RemoteScorer};
pub use resolver::{ResolveError, Resolver};
pub use scorer::{ScoreError, Scorer};

#[cfg(feature = "onnx")]
mod local;
#[cfg(feature = "onnx")]
pub use local::{LocalConfig, LocalScorer};
