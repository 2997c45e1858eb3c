//! Plain-text report for a classification result.

use std::fmt::Write;

use intentd_core::ClassificationResult;

const TOP_N: usize = 3;

/// Render `result` for `message` as a short multi-line report.
pub fn render_report(message: &str, result: &ClassificationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Message: {message}");
    let _ = writeln!(
        out,
        "Intent: {} (confidence: {:.2})",
        result.intent, result.confidence
    );
    match result.request_time_ms {
        Some(ms) => {
            let _ = writeln!(out, "Request time: {ms:.2}ms");
        }
        None => out.push_str("Request time: N/A\n"),
    }
    if let Some(source) = &result.source {
        let _ = writeln!(out, "Source: {source}");
    }

    match &result.error {
        Some(err) => {
            let _ = writeln!(out, "Error: {err}");
        }
        None => {
            let top: Vec<String> = result
                .top(TOP_N)
                .into_iter()
                .map(|(intent, score)| format!("{intent}={score:.3}"))
                .collect();
            let _ = writeln!(out, "Top {TOP_N}: {}", top.join(", "));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use intentd_core::ScoreMap;

    fn classified() -> ClassificationResult {
        let mut all_scores = ScoreMap::new();
        all_scores.insert("supported_token_price", 0.861);
        all_scores.insert("realtime", 0.07);
        all_scores.insert("sell", 0.05);
        all_scores.insert("greeting", 0.019);
        ClassificationResult {
            intent: "supported_token_price".into(),
            confidence: 0.861,
            all_scores,
            raw_label: Some("get_crypto_price".into()),
            error: None,
            source: Some("hf_api".into()),
            request_time_ms: Some(412.5),
        }
    }

    #[test]
    fn report_lists_top_three() {
        let report = render_report("what's the price of bitcoin?", &classified());
        assert_eq!(
            report,
            "Message: what's the price of bitcoin?\n\
             Intent: supported_token_price (confidence: 0.86)\n\
             Request time: 412.50ms\n\
             Source: hf_api\n\
             Top 3: supported_token_price=0.861, realtime=0.070, sell=0.050\n"
        );
    }

    #[test]
    fn degraded_report_shows_error() {
        let result = ClassificationResult::degraded("Request timeout").with_source("hf_api");
        let report = render_report("btc?", &result);
        assert!(report.contains("Intent: general (confidence: 0.00)"));
        assert!(report.contains("Request time: N/A"));
        assert!(report.contains("Error: Request timeout"));
        assert!(!report.contains("Top 3"));
    }
}
