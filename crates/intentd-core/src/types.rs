//! Shared request/response types for the classify and health operations.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::registry::GENERAL_INTENT;

/// One prior turn of conversation supplied by the chat backend.
///
/// Only `text` is read; any other fields the backend sends are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(default)]
    pub text: Option<String>,
}

impl Turn {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    /// Turn text, empty when the field was missing or null.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// Inbound payload for `classify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub message: String,
    #[serde(default)]
    pub history: Option<Vec<Turn>>,
}

impl ClassificationRequest {
    pub fn history(&self) -> &[Turn] {
        self.history.as_deref().unwrap_or(&[])
    }
}

/// A raw classifier label with its score, as returned by a scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Canonical intent → score, iterated in the order intents were first seen.
///
/// Serializes as a JSON object whose key order follows the classifier's
/// ranking. Re-inserting an existing intent overwrites its score in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreMap(Vec<(String, f64)>);

impl ScoreMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, intent: impl Into<String>, score: f64) {
        let intent = intent.into();
        match self.0.iter_mut().find(|(k, _)| *k == intent) {
            Some(entry) => entry.1 = score,
            None => self.0.push((intent, score)),
        }
    }

    pub fn get(&self, intent: &str) -> Option<f64> {
        self.0.iter().find(|(k, _)| k == intent).map(|(_, v)| *v)
    }

    pub fn contains_key(&self, intent: &str) -> bool {
        self.get(intent).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Serialize for ScoreMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ScoreMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScoreMapVisitor;

        impl<'de> Visitor<'de> for ScoreMapVisitor {
            type Value = ScoreMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of intent to score")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ScoreMap, A::Error> {
                let mut scores = ScoreMap::new();
                while let Some((k, v)) = access.next_entry::<String, f64>()? {
                    scores.insert(k, v);
                }
                Ok(scores)
            }
        }

        deserializer.deserialize_map(ScoreMapVisitor)
    }
}

/// Outbound payload for `classify`.
///
/// A degraded result (empty input or classifier failure) has intent
/// `general`, confidence 0.0, no scores, and `error` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub intent: String,
    pub confidence: f64,
    pub all_scores: ScoreMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Backend that produced the result: `hf_api` or `local`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Scoring call duration in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_time_ms: Option<f64>,
}

impl ClassificationResult {
    /// The fallback result carrying a diagnostic.
    pub fn degraded(error: impl Into<String>) -> Self {
        Self {
            intent: GENERAL_INTENT.to_string(),
            confidence: 0.0,
            all_scores: ScoreMap::new(),
            raw_label: None,
            error: Some(error.into()),
            source: None,
            request_time_ms: None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Top `n` intents by score.
    pub fn top(&self, n: usize) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self.all_scores.iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(n);
        ranked
    }
}

/// Liveness probe payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub service: String,
}

impl Health {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            service: "intent-classifier".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_without_history() {
        let req: ClassificationRequest =
            serde_json::from_str(r#"{"message": "what's the price of bitcoin?"}"#).unwrap();
        assert_eq!(req.message, "what's the price of bitcoin?");
        assert!(req.history().is_empty());
    }

    #[test]
    fn request_turns_ignore_extra_fields() {
        let json = r#"{
            "message": "and ethereum?",
            "history": [
                {"text": "price of btc", "role": "user", "ts": 1700000000},
                {"role": "assistant"},
                {"text": null}
            ]
        }"#;
        let req: ClassificationRequest = serde_json::from_str(json).unwrap();
        let history = req.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].text(), "price of btc");
        assert_eq!(history[1].text(), "");
        assert_eq!(history[2].text(), "");
    }

    #[test]
    fn request_requires_message() {
        let err = serde_json::from_str::<ClassificationRequest>(r#"{"history": []}"#);
        assert!(err.is_err());
    }

    #[test]
    fn score_map_keeps_first_position_last_value() {
        let mut scores = ScoreMap::new();
        scores.insert("dashboard", 0.4);
        scores.insert("sell", 0.3);
        scores.insert("dashboard", 0.1);

        let keys: Vec<_> = scores.keys().collect();
        assert_eq!(keys, vec!["dashboard", "sell"]);
        assert_eq!(scores.get("dashboard"), Some(0.1));
        assert_eq!(scores.len(), 2);
    }

    #[test]
    fn score_map_serializes_in_rank_order() {
        let mut scores = ScoreMap::new();
        scores.insert("sell", 0.7);
        scores.insert("deposit", 0.2);
        scores.insert("help", 0.1);
        let json = serde_json::to_string(&scores).unwrap();
        assert_eq!(json, r#"{"sell":0.7,"deposit":0.2,"help":0.1}"#);

        let parsed: ScoreMap = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, scores);
    }

    #[test]
    fn degraded_result_omits_optional_fields() {
        let result = ClassificationResult::degraded("Empty message");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "intent": "general",
                "confidence": 0.0,
                "all_scores": {},
                "error": "Empty message"
            })
        );
        assert!(result.is_degraded());
    }

    #[test]
    fn top_sorts_by_score() {
        let mut result = ClassificationResult::degraded("x");
        result.all_scores.insert("help", 0.1);
        result.all_scores.insert("sell", 0.6);
        result.all_scores.insert("deposit", 0.3);
        assert_eq!(result.top(2), vec![("sell", 0.6), ("deposit", 0.3)]);
    }

    #[test]
    fn health_payload() {
        let value = serde_json::to_value(Health::healthy()).unwrap();
        assert_eq!(value["status"], "healthy");
        assert_eq!(value["service"], "intent-classifier");
    }
}
