//! Bounded conversation history
//!
//! Provides:
//! - FIFO-evicting turn buffer
//! - Recency-windowed rendering for prompts

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// Rendering of an empty conversation
pub const NO_PRIOR_CONVERSATION: &str = "No previous conversation.";

/// Speaker of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Uppercase label used in rendered history
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        }
    }
}

/// One message of the conversation
#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordered turns of one session, oldest first
#[derive(Debug, Clone)]
pub struct ConversationState {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl ConversationState {
    /// Create an empty conversation retaining at most `capacity` turns
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a turn, evicting from the front on overflow
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push_back(ConversationTurn {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
        while self.turns.len() > self.capacity {
            self.turns.pop_front();
        }
    }

    /// Record a complete exchange in one step
    pub fn record_exchange(&mut self, user: &str, assistant: &str) {
        self.append(Role::User, user);
        self.append(Role::Assistant, assistant);
    }

    /// View over the last `window` turns
    pub fn render(&self, window: usize) -> HistoryView<'_> {
        HistoryView {
            turns: &self.turns,
            start: self.turns.len().saturating_sub(window),
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        tracing::debug!("Conversation cleared");
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }
}

/// Lazy rendering of recent turns.
///
/// Nothing is formatted until the view is displayed or iterated, and the
/// view can be walked any number of times.
#[derive(Debug, Clone, Copy)]
pub struct HistoryView<'a> {
    turns: &'a VecDeque<ConversationTurn>,
    start: usize,
}

impl<'a> HistoryView<'a> {
    /// `"{ROLE}: {content}"` lines in chronological order
    pub fn lines(&self) -> impl Iterator<Item = String> + 'a {
        self.turns
            .range(self.start..)
            .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.turns.len()
    }
}

impl fmt::Display for HistoryView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str(NO_PRIOR_CONVERSATION);
        }
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction_keeps_most_recent() {
        let mut state = ConversationState::new(10);
        for i in 0..13 {
            state.append(Role::User, format!("message {}", i));
        }
        assert_eq!(state.len(), 10);
        let contents: Vec<_> = state.turns().map(|t| t.content.clone()).collect();
        let expected: Vec<_> = (3..13).map(|i| format!("message {}", i)).collect();
        assert_eq!(contents, expected);
    }

    #[test]
    fn test_render_window() {
        let mut state = ConversationState::new(10);
        state.record_exchange("What causes bone loss?", "Unloading [1].");
        state.record_exchange("And muscle?", "Atrophy [2].");
        state.append(Role::User, "ignored?");

        let view = state.render(4);
        let lines: Vec<_> = view.lines().collect();
        assert_eq!(
            lines,
            vec![
                "ASSISTANT: Unloading [1].",
                "USER: And muscle?",
                "ASSISTANT: Atrophy [2].",
                "USER: ignored?",
            ]
        );
        // Restartable
        assert_eq!(view.lines().count(), 4);
        assert_eq!(
            view.to_string(),
            "ASSISTANT: Unloading [1].\nUSER: And muscle?\nASSISTANT: Atrophy [2].\nUSER: ignored?\n"
        );
    }

    #[test]
    fn test_render_empty() {
        let state = ConversationState::new(10);
        let view = state.render(4);
        assert!(view.is_empty());
        assert_eq!(view.lines().count(), 0);
        assert_eq!(view.to_string(), NO_PRIOR_CONVERSATION);
    }

    #[test]
    fn test_clear() {
        let mut state = ConversationState::new(10);
        state.record_exchange("q", "a");
        state.clear();
        assert!(state.is_empty());
        assert_eq!(state.render(4).to_string(), NO_PRIOR_CONVERSATION);
    }
}
