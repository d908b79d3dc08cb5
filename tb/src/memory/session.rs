//! Session and Turn types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::Role;

/// One role-tagged message in a session transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    /// When the turn was appended
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// A conversational context identified by an opaque key
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    turns: Vec<Turn>,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        debug!(%id, "Session::new: called");
        Self {
            id,
            turns: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Turns in append order
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append a turn, then drop the oldest beyond `max_turns` (0 keeps all)
    ///
    /// The kept window never opens on an assistant reply whose request was
    /// trimmed away.
    pub fn push(&mut self, turn: Turn, max_turns: usize) {
        debug!(id = %self.id, role = %turn.role, max_turns, "Session::push: called");
        self.turns.push(turn);
        if max_turns > 0 && self.turns.len() > max_turns {
            let mut excess = self.turns.len() - max_turns;
            excess += self.turns[excess..]
                .iter()
                .take_while(|t| t.role == Role::Assistant)
                .count();
            debug!(id = %self.id, excess, "Session::push: trimming oldest turns");
            self.turns.drain(..excess);
        }
    }

    pub fn clear(&mut self) {
        debug!(id = %self.id, dropped = self.turns.len(), "Session::clear: called");
        self.turns.clear();
    }

    /// Flatten the transcript for prompt rendering
    pub fn transcript(&self) -> String {
        render_transcript(&self.turns)
    }
}

/// One `Role: text` entry per turn, in order
pub fn render_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role.label(), t.text))
        .collect::<Vec<_>>()
        .join("\n")
}
