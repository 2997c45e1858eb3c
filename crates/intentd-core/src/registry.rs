//! Intent label registry: the raw labels offered to the classifier and their
//! mapping onto the canonical intent names callers depend on.
//!
//! Built once at startup (either [`IntentRegistry::builtin`] or a JSON file)
//! and shared read-only across requests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Reserved intent for empty input, failures, and unmapped labels.
pub const GENERAL_INTENT: &str = "general";

/// Version of the built-in label table.
pub const BUILTIN_VERSION: &str = "2.0.0";

/// Built-in `(raw label, canonical intent)` pairs, in the order offered to the classifier.
pub const BUILTIN_LABELS: &[(&str, &str)] = &[
    ("sell_crypto", "sell"),
    ("deposit_crypto", "deposit"),
    ("check_balance", "dashboard"),
    ("check_portfolio", "dashboard"),
    ("get_crypto_price", "supported_token_price"),
    ("get_naira_rates", "naira_rates"),
    ("transaction_history", "transaction_history"),
    ("help", "help"),
    ("support", "support"),
    ("security_question", "security"),
    ("feedback", "feedback"),
    ("greeting", "greeting"),
    ("spacewatch_leaderboard", "spacewatch_leaderboard"),
    ("general_knowledge", "general_knowledge"),
    ("realtime_crypto_news", "realtime"),
];

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("label registry is empty")]
    Empty,

    #[error("duplicate raw label: {0}")]
    DuplicateLabel(String),

    #[error("blank label or intent at entry {0}")]
    BlankEntry(usize),

    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One raw label and the canonical intent it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IntentEntry {
    pub label: String,
    pub intent: String,
}

impl IntentEntry {
    pub fn new(label: impl Into<String>, intent: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            intent: intent.into(),
        }
    }
}

#[derive(Deserialize)]
struct RegistryFile {
    #[serde(default)]
    version: Option<String>,
    labels: Vec<IntentEntry>,
}

/// Validated label set and label → intent mapping.
#[derive(Debug, Clone)]
pub struct IntentRegistry {
    version: String,
    entries: Vec<IntentEntry>,
    /// Raw labels in entry order, ready to hand to a scorer.
    labels: Vec<String>,
}

impl IntentRegistry {
    /// Build a registry, rejecting empty sets, blank entries, and duplicate labels.
    pub fn new(
        version: impl Into<String>,
        entries: Vec<IntentEntry>,
    ) -> Result<Self, RegistryError> {
        if entries.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = HashSet::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if entry.label.trim().is_empty() || entry.intent.trim().is_empty() {
                return Err(RegistryError::BlankEntry(i));
            }
            if !seen.insert(entry.label.as_str()) {
                return Err(RegistryError::DuplicateLabel(entry.label.clone()));
            }
        }

        let labels = entries.iter().map(|e| e.label.clone()).collect();
        Ok(Self {
            version: version.into(),
            entries,
            labels,
        })
    }

    /// The built-in crypto-assistant vocabulary.
    pub fn builtin() -> Self {
        let entries: Vec<IntentEntry> = BUILTIN_LABELS
            .iter()
            .map(|&(label, intent)| IntentEntry::new(label, intent))
            .collect();
        let labels = entries.iter().map(|e| e.label.clone()).collect();
        Self {
            version: BUILTIN_VERSION.to_string(),
            entries,
            labels,
        }
    }

    /// Parse a registry from `{"version": "...", "labels": [{"label": .., "intent": ..}]}`.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_json::from_str(json)?;
        let version = file.version.unwrap_or_else(|| "custom".to_string());
        Self::new(version, file.labels)
    }

    /// Load a registry from a JSON file on disk.
    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let json = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Raw candidate labels, in registry order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn entries(&self) -> &[IntentEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical intent for a raw label; [`GENERAL_INTENT`] if the label is unknown.
    pub fn canonical(&self, raw_label: &str) -> &str {
        self.entries
            .iter()
            .find(|e| e.label == raw_label)
            .map(|e| e.intent.as_str())
            .unwrap_or(GENERAL_INTENT)
    }

    /// Distinct canonical intents, in order of first appearance.
    pub fn intents(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(|e| e.intent.as_str())
            .filter(|intent| seen.insert(*intent))
            .collect()
    }
}
