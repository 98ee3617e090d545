//! Conversation State
//!
//! The ordered dialogue history supplied to the model as working memory for
//! one continuous run. Bounded: the oldest non-system turns are evicted once
//! the cap is exceeded. The system turn is pinned at index 0 and never moves.

use crate::types::{Role, Turn};

/// Ordered, capped log of turns. Owned exclusively by one cycle controller;
/// mutated only by appending or trimming, never reordered.
pub struct ConversationState {
    turns: Vec<Turn>,
    max_turns: usize,
}

impl ConversationState {
    /// Start a conversation from a pinned system prompt.
    pub fn new(system_prompt: impl Into<String>, max_turns: usize) -> Self {
        Self {
            turns: vec![Turn::system(system_prompt)],
            // The pinned turn always fits.
            max_turns: max_turns.max(2),
        }
    }

    /// Append a turn and trim back to capacity.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.trim_to_capacity();
    }

    /// Evict the oldest non-system turns until the log fits the cap. The
    /// system turn at index 0 is never evicted, and remaining turns keep
    /// their relative order.
    pub fn trim_to_capacity(&mut self) {
        while self.turns.len() > self.max_turns {
            self.turns.remove(1);
        }
    }

    /// The full ordered history for prompt construction.
    pub fn render(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Text of the most recent non-empty assistant turn, if any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant && !t.content.is_empty())
            .map(|t| t.content.as_str())
    }
}
