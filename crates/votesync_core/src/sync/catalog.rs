//! Submission catalog merger.
//!
//! # Responsibility
//! - Apply version-stamped poll diffs to the local catalog.
//! - Derive the display order from first-observed version and a per-client
//!   hash tie-break.
//! - Track initial-load and polling error bookkeeping.
//!
//! # Invariants
//! - `first_observed_version` never changes for a present record; a code
//!   deleted and later reintroduced is a new record.
//! - The order is recomputed only on the first load or when the catalog
//!   content changed, so identical diffs leave it untouched.
//! - Order is a pure function of `(first_observed_version, fnv1a32(seed + code))`
//!   with the code itself as final tie-break.

use crate::model::submission::SubmissionRecord;
use crate::sync::wire::SubmissionsResponse;
use log::{debug, info};
use std::collections::BTreeMap;

const FNV32_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// FNV-1a 32-bit hash of UTF-8 bytes.
pub fn fnv1a32(input: &str) -> u32 {
    input.bytes().fold(FNV32_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV32_PRIME)
    })
}

/// Progress of the very first catalog load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InitialLoadState {
    #[default]
    Idle,
    Loading,
    Error,
}

/// What one merge did to the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub version: i64,
    /// Codes seen for the first time (or again after a deletion).
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Codes whose title or abstract changed.
    pub updated: Vec<String>,
    /// Whether the display order was recomputed.
    pub reordered: bool,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || !self.updated.is_empty()
    }
}

/// Locally known submissions and their display order.
#[derive(Debug, Clone, Default)]
pub struct SubmissionCatalog {
    records: BTreeMap<String, SubmissionRecord>,
    order: Vec<String>,
    last_version: Option<i64>,
    polling_error: bool,
    initial_load: InitialLoadState,
}

impl SubmissionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one poll response.
    ///
    /// `seed` is the per-client random seed used for the hash tie-break.
    pub fn merge(&mut self, response: &SubmissionsResponse, seed: &str) -> MergeOutcome {
        let version = response.version;
        let first_load = self.last_version.is_none();
        let mut outcome = MergeOutcome {
            version,
            ..MergeOutcome::default()
        };

        for (code, diff) in &response.submissions {
            match diff {
                None => {
                    if self.records.remove(code).is_some() {
                        outcome.removed.push(code.clone());
                    }
                }
                Some(payload) => match self.records.get_mut(code) {
                    None => {
                        self.records.insert(
                            code.clone(),
                            SubmissionRecord::from_payload(code, payload, version),
                        );
                        outcome.added.push(code.clone());
                    }
                    Some(existing) if existing.content_differs(payload) => {
                        existing.title = payload.title.clone();
                        existing.abstract_text = payload.abstract_text.clone();
                        outcome.updated.push(code.clone());
                    }
                    Some(_) => {}
                },
            }
        }

        if outcome.changed() || first_load {
            self.order = compute_order(&self.records, seed);
            outcome.reordered = true;
        }
        self.last_version = Some(version);
        self.polling_error = false;
        self.initial_load = InitialLoadState::Idle;

        if outcome.changed() {
            info!(
                "event=catalog_merge module=sync status=changed version={} added={} removed={} updated={} total={}",
                version,
                outcome.added.len(),
                outcome.removed.len(),
                outcome.updated.len(),
                self.records.len()
            );
        } else {
            debug!("event=catalog_merge module=sync status=unchanged version={version}");
        }
        outcome
    }

    /// Marks the start of a poll; only the first load is tracked.
    pub fn record_poll_started(&mut self) {
        if self.last_version.is_none() {
            self.initial_load = InitialLoadState::Loading;
        }
    }

    /// Records a failed poll.
    ///
    /// Before the first successful load this is an initial-load error,
    /// afterwards it raises the polling-error flag.
    pub fn record_poll_failure(&mut self) {
        if self.last_version.is_none() {
            self.initial_load = InitialLoadState::Error;
        } else {
            self.polling_error = true;
        }
    }

    pub fn get(&self, code: &str) -> Option<&SubmissionRecord> {
        self.records.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.records.contains_key(code)
    }

    /// Codes in display order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Records in display order.
    pub fn ordered_records(&self) -> impl Iterator<Item = &SubmissionRecord> + '_ {
        self.order.iter().filter_map(|code| self.records.get(code))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last_version(&self) -> Option<i64> {
        self.last_version
    }

    pub fn polling_error(&self) -> bool {
        self.polling_error
    }

    pub fn initial_load_state(&self) -> InitialLoadState {
        self.initial_load
    }
}

fn compute_order(records: &BTreeMap<String, SubmissionRecord>, seed: &str) -> Vec<String> {
    let mut keyed: Vec<(i64, u32, &String)> = records
        .iter()
        .map(|(code, record)| {
            let hash = fnv1a32(&format!("{seed}{code}"));
            (record.first_observed_version, hash, code)
        })
        .collect();
    keyed.sort_unstable();
    keyed.into_iter().map(|(_, _, code)| code.clone()).collect()
}
