//! The zero-shot scoring contract shared by the remote and local backends.

use async_trait::async_trait;
use intentd_core::LabelScore;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("Request timeout")]
    Timeout,
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("unexpected API response format: {0}")]
    MalformedResponse(String),
    #[error("local inference failed: {0}")]
    LocalInference(String),
}

impl From<reqwest::Error> for ScoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

/// Zero-shot, single-label classifier over an arbitrary candidate label set.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Score `text` against every label in `labels`.
    ///
    /// The returned ranking covers every input label, is sorted descending
    /// by score, and has scores in `[0, 1]`.
    async fn score(&self, text: &str, labels: &[String]) -> Result<Vec<LabelScore>, ScoreError>;

    /// Short backend tag reported in results (`hf_api`, `local`).
    fn source(&self) -> &'static str;
}

/// Sort a ranking descending by score. Ties keep their input order.
pub(crate) fn rank(mut scores: Vec<LabelScore>) -> Vec<LabelScore> {
    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_sorts_descending_and_is_stable() {
        let ranked = rank(vec![
            LabelScore::new("a", 0.1),
            LabelScore::new("b", 0.5),
            LabelScore::new("c", 0.1),
            LabelScore::new("d", 0.3),
        ]);
        let labels: Vec<_> = ranked.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn timeout_message() {
        assert_eq!(ScoreError::Timeout.to_string(), "Request timeout");
    }

    #[test]
    fn server_error_message() {
        let err = ScoreError::Server {
            status: 401,
            body: "Invalid credentials".into(),
        };
        assert_eq!(err.to_string(), "server returned 401: Invalid credentials");
    }
}
