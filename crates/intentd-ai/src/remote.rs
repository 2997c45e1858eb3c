//! Remote zero-shot scoring against a hosted inference endpoint
//! (Hugging Face Inference API compatible).

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use intentd_core::LabelScore;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::scorer::{ScoreError, Scorer, rank};

pub const DEFAULT_API_URL: &str = "https://api-inference.huggingface.co/models";
pub const DEFAULT_MODEL: &str = "facebook/bart-large-mnli";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait before the single retry when the endpoint reports the model is loading.
pub const LOADING_BACKOFF: Duration = Duration::from_secs(2);

/// Connection settings for [`RemoteScorer`].
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL, e.g. `https://api-inference.huggingface.co/models`.
    pub api_url: String,
    /// Model identifier appended to the base URL.
    pub model: String,
    /// Sent as a bearer token when present and non-empty.
    pub api_token: Option<String>,
    pub timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct ZeroShotRequest<'a> {
    inputs: &'a str,
    parameters: ZeroShotParameters<'a>,
}

#[derive(Serialize)]
struct ZeroShotParameters<'a> {
    candidate_labels: &'a [String],
    multi_label: bool,
}

#[derive(Deserialize)]
struct ZeroShotOutput {
    labels: Vec<String>,
    scores: Vec<f64>,
}

/// The endpoint answers with either one output object or a list wrapping it.
#[derive(Deserialize)]
#[serde(untagged)]
enum ZeroShotResponse {
    Single(ZeroShotOutput),
    Batch(Vec<ZeroShotOutput>),
}

/// HTTP client for a hosted zero-shot classification endpoint.
pub struct RemoteScorer {
    client: reqwest::Client,
    url: String,
    api_token: Option<String>,
    loading_backoff: Duration,
}

impl RemoteScorer {
    /// Build a client with the configured request timeout.
    pub fn new(config: RemoteConfig) -> Result<Self, ScoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let url = format!(
            "{}/{}",
            config.api_url.trim_end_matches('/'),
            config.model.trim_start_matches('/')
        );
        Ok(Self {
            client,
            url,
            api_token: config.api_token.filter(|t| !t.is_empty()),
            loading_backoff: LOADING_BACKOFF,
        })
    }

    /// Override the model-loading backoff.
    pub fn with_loading_backoff(mut self, backoff: Duration) -> Self {
        self.loading_backoff = backoff;
        self
    }

    /// Full endpoint URL (`{api_url}/{model}`).
    pub fn url(&self) -> &str {
        &self.url
    }

    /// One POST. Returns the body of a successful response.
    async fn attempt(&self, payload: &ZeroShotRequest<'_>) -> Result<String, AttemptError> {
        let mut request = self.client.post(&self.url).json(payload);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.map_err(ScoreError::from)?;
        let status = resp.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(AttemptError::Loading {
                body: read_error_body(resp).await,
            });
        }
        if !status.is_success() {
            return Err(ScoreError::Server {
                status: status.as_u16(),
                body: read_error_body(resp).await,
            }
            .into());
        }

        Ok(resp.text().await.map_err(ScoreError::from)?)
    }
}

/// Outcome of a single request that did not yield a usable body.
enum AttemptError {
    /// 503 while the endpoint warms the model up.
    Loading { body: String },
    Failed(ScoreError),
}

impl From<ScoreError> for AttemptError {
    fn from(err: ScoreError) -> Self {
        Self::Failed(err)
    }
}

/// Body of a non-success response, or a note saying why it could not be read.
async fn read_error_body(resp: reqwest::Response) -> String {
    let status = resp.status();
    match resp.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(status = status.as_u16(), error = %e, "failed to read error response body");
            format!("<unreadable body: {e}>")
        }
    }
}

#[async_trait]
impl Scorer for RemoteScorer {
    async fn score(&self, text: &str, labels: &[String]) -> Result<Vec<LabelScore>, ScoreError> {
        let payload = ZeroShotRequest {
            inputs: text,
            parameters: ZeroShotParameters {
                candidate_labels: labels,
                multi_label: false,
            },
        };

        debug!(url = %self.url, labels = labels.len(), "scoring against remote endpoint");
        let body = match self.attempt(&payload).await {
            Ok(body) => body,
            Err(AttemptError::Failed(e)) => return Err(e),
            Err(AttemptError::Loading { .. }) => {
                warn!(
                    backoff_ms = self.loading_backoff.as_millis() as u64,
                    "model loading, retrying once"
                );
                tokio::time::sleep(self.loading_backoff).await;
                match self.attempt(&payload).await {
                    Ok(body) => body,
                    Err(AttemptError::Failed(e)) => return Err(e),
                    Err(AttemptError::Loading { body }) => {
                        return Err(ScoreError::Server {
                            status: StatusCode::SERVICE_UNAVAILABLE.as_u16(),
                            body,
                        });
                    }
                }
            }
        };

        parse_ranking(&body, labels)
    }

    fn source(&self) -> &'static str {
        "hf_api"
    }
}

/// Parse a `{labels, scores}` body (or a list wrapping one) into a ranking.
///
/// The ranking must cover exactly `candidates`, each once, with finite
/// scores in `[0, 1]`.
fn parse_ranking(body: &str, candidates: &[String]) -> Result<Vec<LabelScore>, ScoreError> {
    let response: ZeroShotResponse = serde_json::from_str(body)
        .map_err(|_| ScoreError::MalformedResponse(truncate(body, 200)))?;

    let output = match response {
        ZeroShotResponse::Single(output) => output,
        ZeroShotResponse::Batch(outputs) => outputs
            .into_iter()
            .next()
            .ok_or_else(|| ScoreError::MalformedResponse("empty result list".into()))?,
    };

    if output.labels.is_empty() {
        return Err(ScoreError::MalformedResponse("no labels in response".into()));
    }
    if output.labels.len() != output.scores.len() {
        return Err(ScoreError::MalformedResponse(format!(
            "{} labels but {} scores",
            output.labels.len(),
            output.scores.len()
        )));
    }
    if let Some(score) = output
        .scores
        .iter()
        .find(|s| !s.is_finite() || !(0.0..=1.0).contains(*s))
    {
        return Err(ScoreError::MalformedResponse(format!(
            "score {score} outside [0, 1]"
        )));
    }

    let mut seen = HashSet::with_capacity(output.labels.len());
    for label in &output.labels {
        if !candidates.contains(label) {
            return Err(ScoreError::MalformedResponse(format!(
                "label {label:?} was not a candidate"
            )));
        }
        if !seen.insert(label.as_str()) {
            return Err(ScoreError::MalformedResponse(format!(
                "label {label:?} returned twice"
            )));
        }
    }
    if let Some(missing) = candidates.iter().find(|c| !seen.contains(c.as_str())) {
        return Err(ScoreError::MalformedResponse(format!(
            "candidate {missing:?} missing from response"
        )));
    }

    let scores = output
        .labels
        .into_iter()
        .zip(output.scores)
        .map(|(label, score)| LabelScore::new(label, score))
        .collect();
    Ok(rank(scores))
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
