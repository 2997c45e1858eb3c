//! Intent resolution: compose context, score, normalize, and fold every
//! failure into a well-formed result.

use std::sync::Arc;
use std::time::Instant;

use intentd_core::{
    ClassificationRequest, ClassificationResult, Health, IntentRegistry, Turn, compose, normalize,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::scorer::{ScoreError, Scorer};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Empty message")]
    EmptyInput,
    #[error("classifier returned an empty ranking")]
    EmptyRanking,
    #[error(transparent)]
    Score(#[from] ScoreError),
}

/// Resolves messages to canonical intents with a fixed registry and scorer.
///
/// Holds no per-request state; share it behind an `Arc` across requests.
pub struct Resolver {
    registry: Arc<IntentRegistry>,
    scorer: Arc<dyn Scorer>,
}

impl Resolver {
    pub fn new(registry: Arc<IntentRegistry>, scorer: Arc<dyn Scorer>) -> Self {
        Self { registry, scorer }
    }

    pub fn registry(&self) -> &IntentRegistry {
        &self.registry
    }

    /// Backend tag of the configured scorer.
    pub fn source(&self) -> &'static str {
        self.scorer.source()
    }

    /// Resolve `message` with optional `history`, reporting failures as errors.
    ///
    /// A blank message fails with [`ResolveError::EmptyInput`] before the
    /// scorer is touched.
    pub async fn try_resolve(
        &self,
        message: &str,
        history: &[Turn],
    ) -> Result<ClassificationResult, ResolveError> {
        if message.trim().is_empty() {
            return Err(ResolveError::EmptyInput);
        }

        let text = compose(message, history);

        let start = Instant::now();
        let ranking = self.scorer.score(&text, self.registry.labels()).await?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let mut result = normalize(&ranking, &self.registry).ok_or(ResolveError::EmptyRanking)?;
        result.request_time_ms = Some((elapsed_ms * 100.0).round() / 100.0);
        Ok(result)
    }

    /// Resolve `message`, always returning a result.
    ///
    /// Failures yield intent `general`, confidence 0.0, no scores, and the
    /// failure description in `error`.
    pub async fn resolve(&self, message: &str, history: &[Turn]) -> ClassificationResult {
        let result = match self.try_resolve(message, history).await {
            Ok(result) => {
                debug!(
                    intent = %result.intent,
                    confidence = result.confidence,
                    request_time_ms = ?result.request_time_ms,
                    "classified message"
                );
                result
            }
            Err(ResolveError::EmptyInput) => {
                ClassificationResult::degraded(ResolveError::EmptyInput.to_string())
            }
            Err(e) => {
                warn!(error = %e, source = self.source(), "classification degraded");
                ClassificationResult::degraded(e.to_string())
            }
        };
        result.with_source(self.source())
    }

    pub async fn resolve_request(&self, request: &ClassificationRequest) -> ClassificationResult {
        self.resolve(&request.message, request.history()).await
    }

    /// Liveness probe. Static, does not touch the scorer.
    pub fn health() -> Health {
        Health::healthy()
    }
}
