//! Vote synchronization engine.
//!
//! # Responsibility
//! - Own the client identity and vote ledger and persist them on change.
//! - Debounce ledger mutations into uploads of the full vote map.
//! - Keep at most one upload in flight and retry failures with capped
//!   exponential backoff.
//! - Suspend or re-arm uploads on consent transitions.
//!
//! # Invariants
//! - Exactly one timer (debounce or retry) is pending at any time, or none.
//! - At most one upload ticket is outstanding.
//! - Outcomes are applied only for the current in-flight ticket; tickets
//!   from an earlier consent epoch are ignored.
//! - Backoff doubles per consecutive failure, never exceeds the configured
//!   maximum, and resets on success, on consent denial and on load.
//! - The sequence number grows with local edits and restarts at zero only
//!   for a new client id; upload outcomes never touch it.

use crate::config::VoteSyncConfig;
use crate::model::identity::ClientIdentity;
use crate::model::vote::{VoteLedger, VoteState, VoteValue};
use crate::repo::persisted_state::{load_record, save_record, PersistedState, APPLICATION_TAG};
use crate::repo::state_store::StateStorage;
use crate::sync::clock::Clock;
use crate::sync::consent::ConsentState;
use crate::sync::timer::TimerSlot;
use crate::sync::wire::{UploadOutcome, VoteUploadRequest};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;

/// Upload status shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Queued,
    Syncing,
    Error,
    Disabled,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Queued => "queued",
            Self::Syncing => "syncing",
            Self::Error => "error",
            Self::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerPurpose {
    Debounce,
    Retry,
}

/// Identifies one dispatched upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadTicket {
    epoch: u64,
    request_id: u64,
}

impl UploadTicket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }
}

/// Upload the caller must send and later report with `complete_upload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub ticket: UploadTicket,
    pub request: VoteUploadRequest,
}

/// Returns the backoff delay following `current`.
pub fn next_retry_delay(current_ms: u64, max_ms: u64) -> u64 {
    current_ms.saturating_mul(2).min(max_ms)
}

/// Backoff delay after a reset, never above the ceiling.
fn initial_retry_delay(config: &VoteSyncConfig) -> u64 {
    config.initial_retry_delay_ms.min(config.max_retry_delay_ms)
}

pub struct VoteSyncEngine<S: StateStorage, C: Clock> {
    config: VoteSyncConfig,
    storage: S,
    clock: C,
    client_id: Option<String>,
    seed: Option<String>,
    ledger: VoteLedger,
    consent: ConsentState,
    status: SyncStatus,
    timer: TimerSlot<TimerPurpose>,
    in_flight: Option<UploadTicket>,
    resend_after_flight: bool,
    retry_delay_ms: u64,
    epoch: u64,
    next_request_id: u64,
}

impl<S: StateStorage, C: Clock> VoteSyncEngine<S, C> {
    /// Opens the engine over the record stored under `config.storage_key`.
    ///
    /// A missing or unreadable record yields a fresh client. Status is
    /// `disabled` when consent was denied, otherwise `idle`; backoff starts
    /// at its initial value.
    pub fn open(config: VoteSyncConfig, storage: S, clock: C) -> Self {
        let record = match load_record(&storage, &config.storage_key) {
            Ok(record) => record,
            Err(err) => {
                warn!(
                    "event=engine_open module=sync status=fallback reason=record_unreadable key={} error={}",
                    config.storage_key, err
                );
                None
            }
        };

        let mut engine = Self {
            retry_delay_ms: initial_retry_delay(&config),
            config,
            storage,
            clock,
            client_id: None,
            seed: None,
            ledger: VoteLedger::new(),
            consent: ConsentState::Unset,
            status: SyncStatus::Idle,
            timer: TimerSlot::new(),
            in_flight: None,
            resend_after_flight: false,
            epoch: 0,
            next_request_id: 0,
        };
        let restored = record.is_some();
        if let Some(record) = record {
            engine.apply_record(record);
        }
        engine.status = engine.resting_status();

        info!(
            "event=engine_open module=sync status=ok restored={} consent={} votes={}",
            restored,
            engine.consent.as_str(),
            engine.ledger.len()
        );
        engine
    }

    /// Creates the client identity if absent and persists it.
    ///
    /// Existing id and seed are never regenerated. The sequence number starts
    /// at zero when the client id is created.
    pub fn initialize(&mut self) {
        let had_client_id = self.client_id.is_some();
        let (identity, generated) = ClientIdentity::complete(self.client_id.take(), self.seed.take());
        self.client_id = Some(identity.id);
        self.seed = Some(identity.seed);
        if !had_client_id {
            self.ledger.reset_sequence();
        }
        if generated {
            info!("event=client_init module=sync status=ok generated=true");
            self.persist();
        }
    }

    /// Reloads the persisted record, e.g. after another process wrote it.
    ///
    /// Pending timers are cancelled and any in-flight upload is orphaned.
    /// Returns `false` when no readable record exists.
    pub fn rehydrate(&mut self) -> bool {
        let record = match load_record(&self.storage, &self.config.storage_key) {
            Ok(Some(record)) => record,
            Ok(None) => return false,
            Err(err) => {
                warn!("event=engine_rehydrate module=sync status=error error={err}");
                return false;
            }
        };
        self.apply_record(record);
        self.timer.cancel();
        self.in_flight = None;
        self.resend_after_flight = false;
        self.retry_delay_ms = initial_retry_delay(&self.config);
        self.epoch += 1;
        self.status = self.resting_status();
        info!(
            "event=engine_rehydrate module=sync status=ok consent={} votes={}",
            self.consent.as_str(),
            self.ledger.len()
        );
        true
    }

    /// Records the user's consent decision.
    ///
    /// Denial cancels pending timers, orphans any in-flight upload, resets
    /// backoff and forces `disabled`. Granting behaves like a fresh mutation.
    pub fn set_consent(&mut self, allowed: bool) {
        let next = ConsentState::from_decision(allowed);
        let previous = self.consent;
        self.consent = next;

        if next != previous {
            self.epoch += 1;
            self.timer.cancel();
            self.in_flight = None;
            self.resend_after_flight = false;
            info!(
                "event=consent_change module=sync status=ok from={} to={} epoch={}",
                previous.as_str(),
                next.as_str(),
                self.epoch
            );
            self.persist();
        }

        if allowed {
            if self.status == SyncStatus::Disabled {
                self.status = SyncStatus::Idle;
            }
            self.trigger_sync();
        } else {
            self.retry_delay_ms = initial_retry_delay(&self.config);
            self.status = SyncStatus::Disabled;
        }
    }

    /// Marks a submission as expanded. Returns whether the ledger changed.
    pub fn set_expanded(&mut self, code: &str) -> bool {
        if !self.ledger.set_expanded(code) {
            return false;
        }
        self.after_mutation();
        true
    }

    /// Sets the vote for a submission. Returns whether the ledger changed.
    pub fn set_vote(&mut self, code: &str, vote: VoteValue) -> bool {
        if !self.ledger.set_vote(code, vote) {
            return false;
        }
        self.after_mutation();
        true
    }

    /// Records ledger entries for newly observed submissions.
    ///
    /// Each code counts as one edit; the batch triggers one sync cycle.
    pub fn seed_votes(&mut self, codes: &[String]) -> usize {
        for code in codes {
            self.ledger.seed(code);
        }
        if !codes.is_empty() {
            debug!(
                "event=vote_seed module=sync status=ok count={} seq={:?}",
                codes.len(),
                self.ledger.sequence_number()
            );
            self.after_mutation();
        }
        codes.len()
    }

    /// Fires due timers.
    ///
    /// Returns the upload to send when the debounce timer fired and an upload
    /// could be formed.
    pub fn poll_timers(&mut self) -> Option<PendingUpload> {
        let now = self.clock.now_ms();
        while let Some(purpose) = self.timer.take_expired(now) {
            match purpose {
                TimerPurpose::Debounce => return self.dispatch(),
                TimerPurpose::Retry => {
                    debug!("event=vote_retry module=sync status=fired");
                    self.trigger_sync();
                }
            }
        }
        None
    }

    /// Applies the outcome of a dispatched upload.
    ///
    /// Returns `false` when the ticket is not the current in-flight upload;
    /// such outcomes change nothing.
    pub fn complete_upload(&mut self, ticket: UploadTicket, outcome: UploadOutcome) -> bool {
        if self.in_flight != Some(ticket) {
            debug!(
                "event=vote_upload_outcome module=sync status=ignored request_id={} epoch={} current_epoch={}",
                ticket.request_id, ticket.epoch, self.epoch
            );
            return false;
        }
        self.in_flight = None;

        match outcome {
            UploadOutcome::Success => {
                self.retry_delay_ms = initial_retry_delay(&self.config);
                info!(
                    "event=vote_upload_outcome module=sync status=ok request_id={}",
                    ticket.request_id
                );
                if std::mem::take(&mut self.resend_after_flight) {
                    self.arm_debounce();
                } else {
                    self.status = SyncStatus::Idle;
                }
            }
            UploadOutcome::Failure => {
                self.resend_after_flight = false;
                self.retry_delay_ms =
                    next_retry_delay(self.retry_delay_ms, self.config.max_retry_delay_ms);
                self.status = SyncStatus::Error;
                let deadline = self.clock.now_ms().saturating_add(self.retry_delay_ms);
                self.timer.arm(TimerPurpose::Retry, deadline);
                warn!(
                    "event=vote_upload_outcome module=sync status=error request_id={} retry_in_ms={}",
                    ticket.request_id, self.retry_delay_ms
                );
            }
        }
        true
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn consent(&self) -> ConsentState {
        self.consent
    }

    /// Complete identity, once `initialize` ran.
    pub fn identity(&self) -> Option<ClientIdentity> {
        match (&self.client_id, &self.seed) {
            (Some(id), Some(seed)) => Some(ClientIdentity {
                id: id.clone(),
                seed: seed.clone(),
            }),
            _ => None,
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Ordering seed; empty until the identity exists.
    pub fn seed(&self) -> &str {
        self.seed.as_deref().unwrap_or_default()
    }

    pub fn vote(&self, code: &str) -> VoteState {
        self.ledger.get(code)
    }

    pub fn votes(&self) -> &BTreeMap<String, VoteState> {
        self.ledger.votes()
    }

    pub fn sequence_number(&self) -> Option<u64> {
        self.ledger.sequence_number()
    }

    /// Delay the next failure will be retried after, before doubling.
    pub fn retry_delay_ms(&self) -> u64 {
        self.retry_delay_ms
    }

    pub fn is_upload_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// When the caller should next call `poll_timers`.
    pub fn next_deadline_ms(&self) -> Option<u64> {
        self.timer.deadline_ms()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn config(&self) -> &VoteSyncConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn after_mutation(&mut self) {
        self.persist();
        self.trigger_sync();
    }

    fn trigger_sync(&mut self) {
        self.timer.cancel();
        if !self.consent.allows_upload() {
            self.status = SyncStatus::Disabled;
            return;
        }
        if self.in_flight.is_some() {
            self.resend_after_flight = true;
            self.status = SyncStatus::Queued;
            return;
        }
        self.arm_debounce();
    }

    fn arm_debounce(&mut self) {
        let deadline = self
            .clock
            .now_ms()
            .saturating_add(self.config.send_debounce_ms);
        self.timer.arm(TimerPurpose::Debounce, deadline);
        self.status = SyncStatus::Queued;
    }

    fn dispatch(&mut self) -> Option<PendingUpload> {
        if !self.consent.allows_upload() {
            self.status = SyncStatus::Disabled;
            return None;
        }
        if self.in_flight.is_some() {
            self.resend_after_flight = true;
            self.status = SyncStatus::Queued;
            return None;
        }
        let Some(client_id) = self.client_id.clone() else {
            error!("event=vote_upload module=sync status=skipped reason=missing_client_id");
            self.status = SyncStatus::Idle;
            return None;
        };

        let ticket = UploadTicket {
            epoch: self.epoch,
            request_id: self.next_request_id,
        };
        self.next_request_id += 1;
        self.in_flight = Some(ticket);
        self.status = SyncStatus::Syncing;

        let request = VoteUploadRequest {
            client_id,
            sequence_number: self.ledger.sequence_number(),
            votes: self.ledger.votes().clone(),
        };
        info!(
            "event=vote_upload module=sync status=dispatched request_id={} seq={:?} votes={}",
            ticket.request_id,
            request.sequence_number,
            request.votes.len()
        );
        Some(PendingUpload { ticket, request })
    }

    fn resting_status(&self) -> SyncStatus {
        if self.consent == ConsentState::Denied {
            SyncStatus::Disabled
        } else {
            SyncStatus::Idle
        }
    }

    fn apply_record(&mut self, record: PersistedState) {
        self.client_id = record.client_id.filter(|id| !id.is_empty());
        self.seed = record.random_value.filter(|seed| !seed.is_empty());
        self.ledger = VoteLedger::from_parts(record.votes, record.last_vote_sequence_number);
        self.consent = ConsentState::from_flag(record.is_vote_submission_enabled);
    }

    fn persist(&self) {
        let record = PersistedState {
            client_id: self.client_id.clone(),
            random_value: self.seed.clone(),
            votes: self.ledger.votes().clone(),
            last_vote_sequence_number: self.ledger.sequence_number(),
            is_vote_submission_enabled: self.consent.as_flag(),
            application_name: APPLICATION_TAG.to_string(),
        };
        if let Err(err) = save_record(&self.storage, &self.config.storage_key, &record) {
            warn!(
                "event=record_save module=sync status=error key={} error={}",
                self.config.storage_key, err
            );
        }
    }
}
