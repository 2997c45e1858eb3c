//! Translate a scorer's raw ranking into a [`ClassificationResult`].

use crate::registry::IntentRegistry;
use crate::types::{ClassificationResult, LabelScore, ScoreMap};

/// Build a result from a ranking sorted descending by score.
///
/// The first entry is the top match. Every raw label is mapped through the
/// registry into `all_scores`; labels sharing a canonical intent merge in
/// ranking order, the later (lower-ranked) score winning. Returns `None` for
/// an empty ranking.
pub fn normalize(ranking: &[LabelScore], registry: &IntentRegistry) -> Option<ClassificationResult> {
    let top = ranking.first()?;

    let mut all_scores = ScoreMap::new();
    for entry in ranking {
        all_scores.insert(registry.canonical(&entry.label), entry.score);
    }

    Some(ClassificationResult {
        intent: registry.canonical(&top.label).to_string(),
        confidence: top.score,
        all_scores,
        raw_label: Some(top.label.clone()),
        error: None,
        source: None,
        request_time_ms: None,
    })
}
