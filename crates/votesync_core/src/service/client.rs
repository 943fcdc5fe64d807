//! Client facade tying identity, votes, catalog and confirmation together.
//!
//! # Responsibility
//! - Route poll responses through the catalog and seed votes for new codes.
//! - Expose ledger mutations, consent and upload plumbing of the engine.
//! - Gate server-side deletion behind consent state and the countdown.
//!
//! # Invariants
//! - The catalog orders with the seed of this client's identity.
//! - Deletion is requested and confirmed only while uploads are off.

use crate::config::ClientConfig;
use crate::model::submission::SubmissionRecord;
use crate::model::vote::{VoteState, VoteValue};
use crate::repo::state_store::StateStorage;
use crate::service::confirmation::{ConfirmationAction, ConfirmationGate, ConfirmationRequest};
use crate::service::data_rights::{
    build_destructive_request, build_export_request, confirmation_message, DataRightsError,
    DataScope, DestructiveRequest,
};
use crate::sync::catalog::{InitialLoadState, MergeOutcome, SubmissionCatalog};
use crate::sync::clock::Clock;
use crate::sync::consent::ConsentState;
use crate::sync::engine::{PendingUpload, SyncStatus, UploadTicket, VoteSyncEngine};
use crate::sync::wire::{submissions_path, ExportRequest, SubmissionsResponse, UploadOutcome};
use log::{info, warn};

pub struct VotingClient<S: StateStorage, C: Clock + Clone> {
    config: ClientConfig,
    engine: VoteSyncEngine<S, C>,
    catalog: SubmissionCatalog,
    gate: ConfirmationGate<C>,
}

impl<S: StateStorage, C: Clock + Clone> VotingClient<S, C> {
    /// Opens the client over `storage` and ensures an identity exists.
    ///
    /// An invalid `config` is logged and used as given; backoff still never
    /// exceeds `max_retry_delay_ms`.
    pub fn open(config: ClientConfig, storage: S, clock: C) -> Self {
        if let Err(err) = config.validate() {
            warn!("event=client_open module=service status=invalid_config error={err}");
        }
        let gate = ConfirmationGate::new(config.confirmation, clock.clone());
        let mut engine = VoteSyncEngine::open(config.votes.clone(), storage, clock);
        engine.initialize();
        Self {
            config,
            engine,
            catalog: SubmissionCatalog::new(),
            gate,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn engine(&self) -> &VoteSyncEngine<S, C> {
        &self.engine
    }

    pub fn catalog(&self) -> &SubmissionCatalog {
        &self.catalog
    }

    /// Path of the next catalog poll, relative to `api_base_url`.
    pub fn next_poll_path(&self) -> String {
        submissions_path(self.catalog.last_version())
    }

    pub fn record_poll_started(&mut self) {
        self.catalog.record_poll_started();
    }

    pub fn record_poll_failure(&mut self) {
        self.catalog.record_poll_failure();
    }

    /// Merges a poll response and seeds vote entries for new codes.
    pub fn apply_poll_response(&mut self, response: &SubmissionsResponse) -> MergeOutcome {
        let outcome = self.catalog.merge(response, self.engine.seed());
        self.engine.seed_votes(&outcome.added);
        outcome
    }

    pub fn initial_load_state(&self) -> InitialLoadState {
        self.catalog.initial_load_state()
    }

    pub fn ordered_submissions(&self) -> impl Iterator<Item = &SubmissionRecord> + '_ {
        self.catalog.ordered_records()
    }

    /// Codes voted up that are still in the catalog, in display order.
    pub fn upvoted_codes(&self) -> Vec<String> {
        self.catalog
            .order()
            .iter()
            .filter(|code| self.engine.vote(code).vote == VoteValue::Up)
            .cloned()
            .collect()
    }

    pub fn vote(&self, code: &str) -> VoteState {
        self.engine.vote(code)
    }

    pub fn set_vote(&mut self, code: &str, vote: VoteValue) -> bool {
        self.engine.set_vote(code, vote)
    }

    pub fn set_expanded(&mut self, code: &str) -> bool {
        self.engine.set_expanded(code)
    }

    pub fn set_consent(&mut self, allowed: bool) {
        self.engine.set_consent(allowed);
    }

    pub fn consent(&self) -> ConsentState {
        self.engine.consent()
    }

    pub fn status(&self) -> SyncStatus {
        self.engine.status()
    }

    pub fn poll_timers(&mut self) -> Option<PendingUpload> {
        self.engine.poll_timers()
    }

    pub fn complete_upload(&mut self, ticket: UploadTicket, outcome: UploadOutcome) -> bool {
        self.engine.complete_upload(ticket, outcome)
    }

    /// Reloads the persisted record. The catalog and gate are untouched.
    pub fn rehydrate(&mut self) -> bool {
        self.engine.rehydrate()
    }

    /// Whether deletion may be requested right now.
    pub fn can_request_deletion(&self) -> bool {
        !self.engine.consent().allows_upload() && self.engine.status() == SyncStatus::Disabled
    }

    pub fn request_delete_current(&mut self) -> Result<(), DataRightsError> {
        self.open_confirmation(ConfirmationAction::DeleteCurrentEventData)
    }

    pub fn request_delete_all(&mut self) -> Result<(), DataRightsError> {
        self.open_confirmation(ConfirmationAction::DeleteAllEventData)
    }

    pub fn confirmation(&self) -> &ConfirmationRequest {
        self.gate.pending()
    }

    pub fn confirmation_remaining_ticks(&self) -> u32 {
        self.gate.remaining_ticks()
    }

    pub fn abort_confirmation(&mut self) {
        self.gate.abort();
    }

    /// Confirms the pending action once the countdown elapsed.
    ///
    /// Closes the gate and returns the request the caller must send. If
    /// uploads were switched on meanwhile the gate closes without a request.
    pub fn confirm_pending_action(&mut self) -> Result<DestructiveRequest, DataRightsError> {
        let action = self.gate.confirm()?;
        if !self.can_request_deletion() {
            self.gate.abort();
            return Err(DataRightsError::SyncActive);
        }
        let request = build_destructive_request(
            self.engine.storage(),
            &self.config.votes.storage_key,
            self.engine.client_id(),
            action,
        );
        self.gate.complete();
        info!(
            "event=data_delete module=service status={} action={}",
            if request.is_ok() { "confirmed" } else { "empty" },
            action.as_str()
        );
        request
    }

    pub fn build_export_request(&self, scope: DataScope) -> Result<ExportRequest, DataRightsError> {
        build_export_request(
            self.engine.storage(),
            &self.config.votes.storage_key,
            self.engine.client_id(),
            scope,
        )
    }

    fn open_confirmation(&mut self, action: ConfirmationAction) -> Result<(), DataRightsError> {
        if !self.can_request_deletion() {
            return Err(DataRightsError::SyncActive);
        }
        self.gate.request(confirmation_message(action), action);
        info!(
            "event=data_delete module=service status=awaiting_confirmation action={}",
            action.as_str()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::VotingClient;
    use crate::config::ClientConfig;
    use crate::model::vote::VoteValue;
    use crate::repo::state_store::MemoryStateStore;
    use crate::service::data_rights::{DataRightsError, DestructiveRequest};
    use crate::sync::clock::ManualClock;
    use crate::sync::engine::SyncStatus;
    use crate::sync::wire::SubmissionsResponse;

    fn client() -> (VotingClient<MemoryStateStore, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (
            VotingClient::open(ClientConfig::default(), MemoryStateStore::new(), clock.clone()),
            clock,
        )
    }

    fn response(json: &str) -> SubmissionsResponse {
        serde_json::from_str(json).expect("valid poll response")
    }

    #[test]
    fn poll_response_seeds_votes_for_new_codes() {
        let (mut client, _clock) = client();
        assert_eq!(client.next_poll_path(), "/getsubmissions");
        let outcome = client.apply_poll_response(&response(
            r#"{"version":3,"submissions":{"A":{"title":"a","code":"A","abstract":""},"B":{"title":"b","code":"B","abstract":""}}}"#,
        ));
        assert_eq!(outcome.added.len(), 2);
        assert_eq!(client.engine().sequence_number(), Some(2));
        assert_eq!(client.next_poll_path(), "/getsubmissions/3");
    }

    #[test]
    fn upvoted_codes_follow_catalog_order() {
        let (mut client, _clock) = client();
        client.apply_poll_response(&response(
            r#"{"version":1,"submissions":{"A":{"title":"a","code":"A","abstract":""},"B":{"title":"b","code":"B","abstract":""}}}"#,
        ));
        client.set_vote("A", VoteValue::Up);
        client.set_vote("B", VoteValue::Up);
        client.set_vote("GONE", VoteValue::Up);
        let expected: Vec<String> = client.catalog().order().to_vec();
        assert_eq!(client.upvoted_codes(), expected);
    }

    #[test]
    fn deletion_requires_uploads_off() {
        let (mut client, _clock) = client();
        assert!(matches!(
            client.request_delete_current(),
            Err(DataRightsError::SyncActive)
        ));
        client.set_consent(true);
        assert!(!client.can_request_deletion());
        client.set_consent(false);
        assert_eq!(client.status(), SyncStatus::Disabled);
        assert!(client.can_request_deletion());
    }

    #[test]
    fn confirmed_deletion_yields_request_and_closes_gate() {
        let (mut client, clock) = client();
        client.set_consent(false);
        client.request_delete_current().expect("open gate");
        assert!(client.confirmation().visible);
        assert!(matches!(
            client.confirm_pending_action(),
            Err(DataRightsError::Confirmation(_))
        ));

        clock.advance(5_000);
        let request = client.confirm_pending_action().expect("confirmed");
        let DestructiveRequest::DeleteCurrent(body) = request else {
            panic!("expected delete-current request");
        };
        assert_eq!(Some(body.client_id.as_str()), client.engine().client_id());
        assert!(!client.confirmation().visible);
    }
}
