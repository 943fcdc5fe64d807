//! Vote ledger model.
//!
//! # Responsibility
//! - Hold the per-submission vote state of this client.
//! - Count local edits with a monotonically increasing sequence number.
//!
//! # Invariants
//! - Every applied mutation increments the sequence number by exactly one.
//! - No-op mutations (unchanged vote, already expanded) do not count.
//! - The sequence number only restarts at zero when a new client id is
//!   created; otherwise it is never decremented.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rating given to one submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteValue {
    Up,
    Down,
    #[default]
    Neutral,
}

impl VoteValue {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Neutral => "neutral",
        }
    }
}

/// Vote state of one submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteState {
    /// Whether the user opened the submission details.
    pub expanded: bool,
    pub vote: VoteValue,
}

/// In-memory mapping of submission code to vote state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteLedger {
    votes: BTreeMap<String, VoteState>,
    sequence_number: Option<u64>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a ledger from persisted parts.
    pub fn from_parts(votes: BTreeMap<String, VoteState>, sequence_number: Option<u64>) -> Self {
        Self {
            votes,
            sequence_number,
        }
    }

    pub fn votes(&self) -> &BTreeMap<String, VoteState> {
        &self.votes
    }

    pub fn get(&self, code: &str) -> VoteState {
        self.votes.get(code).copied().unwrap_or_default()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.votes.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Number of local edits since the identity was created.
    ///
    /// `None` only before the client identity exists.
    pub fn sequence_number(&self) -> Option<u64> {
        self.sequence_number
    }

    /// Restarts the edit counter at zero for a newly created client id.
    pub fn reset_sequence(&mut self) {
        self.sequence_number = Some(0);
    }

    /// Marks a submission as expanded.
    ///
    /// Returns `false` without counting an edit when it already was.
    pub fn set_expanded(&mut self, code: &str) -> bool {
        let current = self.get(code);
        if current.expanded {
            return false;
        }
        self.write(
            code,
            VoteState {
                expanded: true,
                ..current
            },
        );
        true
    }

    /// Sets the vote of a submission.
    ///
    /// Returns `false` without counting an edit when the vote is unchanged.
    pub fn set_vote(&mut self, code: &str, vote: VoteValue) -> bool {
        let current = self.get(code);
        if current.vote == vote {
            return false;
        }
        self.write(code, VoteState { vote, ..current });
        true
    }

    /// Records an entry for a newly observed submission.
    ///
    /// An existing entry is kept as-is but the write still counts as an edit.
    pub fn seed(&mut self, code: &str) {
        let state = self.get(code);
        self.write(code, state);
    }

    fn write(&mut self, code: &str, state: VoteState) {
        self.votes.insert(code.to_string(), state);
        self.sequence_number = Some(self.sequence_number.unwrap_or(0) + 1);
    }
}
