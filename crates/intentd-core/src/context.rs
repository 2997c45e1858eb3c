//! Context composition: the text actually sent to the classifier.
//!
//! Short follow-ups ("and ethereum?") classify badly on their own, so the
//! most recent turns of history are prefixed to the message.

use crate::types::Turn;

/// Number of trailing history turns considered at all.
pub const HISTORY_WINDOW: usize = 3;

/// Number of turns (from the end of the window) whose text is prepended.
pub const CONTEXT_TURNS: usize = 2;

/// Compose the classifier input from `message` and optional `history`.
///
/// With no history the message is returned unchanged. Otherwise the text of
/// the last [`CONTEXT_TURNS`] turns of the last [`HISTORY_WINDOW`] turns is
/// joined with single spaces and prefixed to the message. Turns without text
/// contribute an empty string.
pub fn compose(message: &str, history: &[Turn]) -> String {
    if history.is_empty() {
        return message.to_string();
    }

    let window = &history[history.len().saturating_sub(HISTORY_WINDOW)..];
    let recent = &window[window.len().saturating_sub(CONTEXT_TURNS)..];
    let context = recent.iter().map(Turn::text).collect::<Vec<_>>().join(" ");

    if context.is_empty() {
        message.to_string()
    } else {
        format!("{context} {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(texts: &[&str]) -> Vec<Turn> {
        texts.iter().map(|t| Turn::new(*t)).collect()
    }

    #[test]
    fn no_history_passes_message_through() {
        assert_eq!(compose("hello", &[]), "hello");
    }

    #[test]
    fn uses_last_two_of_last_three() {
        let history = turns(&["A", "B", "C", "D"]);
        assert_eq!(compose("E", &history), "C D E");
    }

    #[test]
    fn single_turn_history() {
        let history = turns(&["price of btc"]);
        assert_eq!(compose("and eth?", &history), "price of btc and eth?");
    }

    #[test]
    fn two_turn_history() {
        let history = turns(&["A", "B"]);
        assert_eq!(compose("C", &history), "A B C");
    }

    #[test]
    fn missing_text_contributes_empty_string() {
        let history = vec![Turn::default(), Turn::new("B")];
        assert_eq!(compose("E", &history), " B E");
    }

    #[test]
    fn empty_context_text_is_not_prepended() {
        let history = vec![Turn::new("")];
        assert_eq!(compose("E", &history), "E");
    }

    #[test]
    fn two_empty_turns_still_prefix_separator() {
        // Two empty texts join to a single space, which still counts as context.
        let history = vec![Turn::default(), Turn::default()];
        assert_eq!(compose("E", &history), "  E");
    }

    #[test]
    fn message_is_not_trimmed() {
        let history = turns(&["A"]);
        assert_eq!(compose(" sell  ", &history), "A  sell  ");
    }
}
