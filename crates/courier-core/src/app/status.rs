//! Status views.
//!
//! Plain serde structs so a host can log or expose them as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::state::RuntimeState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateStatus {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub pending: usize,
    pub processed: u64,
    pub handlers: Vec<String>,
}

impl StateStatus {
    pub fn of(state: &RuntimeState) -> Self {
        Self {
            id: state.id().to_string(),
            name: state.name().to_string(),
            created_at: state.created_at(),
            pending: state.pending_len(),
            processed: state.processed_count(),
            handlers: state.handler_paths(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeStatus {
    /// Pool order (creation order).
    pub states: Vec<StateStatus>,
    pub total_pending: usize,
    pub total_processed: u64,
    pub default_channel: u8,
}

impl RuntimeStatus {
    pub fn state(&self, name: &str) -> Option<&StateStatus> {
        self.states.iter().find(|s| s.name == name)
    }
}

/// What one `Runtime::run` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub cycles: usize,
    pub states_visited: usize,
    pub messages: usize,
}

impl RunReport {
    pub(crate) fn absorb(&mut self, other: RunReport) {
        self.cycles += other.cycles;
        self.states_visited += other.states_visited;
        self.messages += other.messages;
    }
}
