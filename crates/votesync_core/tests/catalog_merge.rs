use serde_json::json;
use votesync_core::sync::catalog::fnv1a32;
use votesync_core::{
    ClientConfig, InitialLoadState, ManualClock, MemoryStateStore, SubmissionCatalog,
    SubmissionsResponse, SyncStatus, UploadOutcome, VoteValue, VotingClient,
};

fn response(value: serde_json::Value) -> SubmissionsResponse {
    serde_json::from_value(value).unwrap()
}

fn submission(code: &str, title: &str) -> serde_json::Value {
    json!({ "title": title, "abstract": "", "code": code })
}

fn granted_client() -> (VotingClient<MemoryStateStore, ManualClock>, ManualClock) {
    let clock = ManualClock::new();
    let mut client =
        VotingClient::open(ClientConfig::default(), MemoryStateStore::new(), clock.clone());
    client.set_consent(true);
    (client, clock)
}

#[test]
fn first_load_inserts_and_later_null_removes() {
    let (mut client, _clock) = granted_client();

    let outcome = client.apply_poll_response(&response(json!({
        "version": 1,
        "submissions": { "A": { "title": "T", "abstract": "X", "code": "A" } }
    })));
    assert_eq!(outcome.added, vec!["A".to_string()]);
    assert_eq!(client.catalog().order(), ["A".to_string()]);
    assert!(client.engine().votes().contains_key("A"));

    let outcome = client.apply_poll_response(&response(json!({
        "version": 2,
        "submissions": { "A": null }
    })));
    assert_eq!(outcome.removed, vec!["A".to_string()]);
    assert!(client.catalog().is_empty());
    assert!(client.catalog().order().is_empty());
    assert_eq!(client.catalog().last_version(), Some(2));
}

#[test]
fn equal_versions_are_ordered_by_seeded_hash() {
    let mut catalog = SubmissionCatalog::new();
    let seed = "3f2a9c";
    catalog.merge(
        &response(json!({
            "version": 5,
            "submissions": {
                "X1": submission("X1", "one"),
                "X2": submission("X2", "two"),
                "X3": submission("X3", "three"),
                "X4": submission("X4", "four")
            }
        })),
        seed,
    );
    catalog.merge(
        &response(json!({ "version": 6, "submissions": { "A0": submission("A0", "late") } })),
        seed,
    );

    let mut expected = vec!["X1", "X2", "X3", "X4"];
    expected.sort_by_key(|code| fnv1a32(&format!("{seed}{code}")));
    expected.push("A0");
    assert_eq!(catalog.order(), expected.as_slice());
}

#[test]
fn identical_payload_keeps_order_and_bumps_version() {
    let mut catalog = SubmissionCatalog::new();
    let payload = json!({
        "version": 1,
        "submissions": { "A": submission("A", "a"), "B": submission("B", "b") }
    });
    catalog.merge(&response(payload.clone()), "seed");
    let order = catalog.order().to_vec();

    let mut repeated = payload;
    repeated["version"] = json!(9);
    let outcome = catalog.merge(&response(repeated), "seed");
    assert!(!outcome.changed());
    assert!(!outcome.reordered);
    assert_eq!(catalog.order(), order.as_slice());
    assert_eq!(catalog.last_version(), Some(9));
}

#[test]
fn catalog_key_wins_over_payload_code() {
    let (mut client, _clock) = granted_client();
    client.apply_poll_response(&response(json!({
        "version": 1,
        "submissions": { "K1": submission("mismatch", "keyed") }
    })));

    let record = client.catalog().get("K1").unwrap();
    assert_eq!(record.code, "K1");
    let listed: Vec<&str> = client
        .ordered_submissions()
        .map(|record| record.code.as_str())
        .collect();
    assert_eq!(listed, client.catalog().order());

    client.set_vote("K1", VoteValue::Up);
    assert_eq!(client.upvoted_codes(), vec!["K1".to_string()]);
    assert!(!client.engine().votes().contains_key("mismatch"));
}

#[test]
fn content_update_preserves_first_observed_version() {
    let mut catalog = SubmissionCatalog::new();
    catalog.merge(
        &response(json!({ "version": 1, "submissions": { "A": submission("A", "draft") } })),
        "seed",
    );
    let outcome = catalog.merge(
        &response(json!({ "version": 4, "submissions": { "A": submission("A", "final") } })),
        "seed",
    );
    assert_eq!(outcome.updated, vec!["A".to_string()]);
    let record = catalog.get("A").unwrap();
    assert_eq!(record.title, "final");
    assert_eq!(record.first_observed_version, 1);
}

#[test]
fn reintroduced_code_gets_new_first_observed_version() {
    let mut catalog = SubmissionCatalog::new();
    catalog.merge(
        &response(json!({ "version": 1, "submissions": { "A": submission("A", "a") } })),
        "seed",
    );
    catalog.merge(&response(json!({ "version": 2, "submissions": { "A": null } })), "seed");
    catalog.merge(
        &response(json!({ "version": 7, "submissions": { "A": submission("A", "a") } })),
        "seed",
    );
    assert_eq!(catalog.get("A").unwrap().first_observed_version, 7);
}

#[test]
fn seeding_counts_once_per_code_and_triggers_one_cycle() {
    let (mut client, clock) = granted_client();
    let before = client.engine().sequence_number().unwrap();

    client.apply_poll_response(&response(json!({
        "version": 1,
        "submissions": { "A": submission("A", "a"), "B": submission("B", "b") }
    })));
    assert_eq!(client.engine().sequence_number(), Some(before + 2));
    assert_eq!(client.status(), SyncStatus::Queued);

    clock.advance(1_000);
    let upload = client.poll_timers().unwrap();
    assert_eq!(upload.request.votes.len(), 2);
    assert!(client.poll_timers().is_none());
}

#[test]
fn seeding_during_flight_lands_in_next_cycle() {
    let (mut client, clock) = granted_client();
    client.apply_poll_response(&response(json!({
        "version": 1,
        "submissions": { "A": submission("A", "a") }
    })));
    clock.advance(1_000);
    let first = client.poll_timers().unwrap();

    client.apply_poll_response(&response(json!({
        "version": 2,
        "submissions": { "B": submission("B", "b") }
    })));
    assert!(!first.request.votes.contains_key("B"));
    assert!(client.complete_upload(first.ticket, UploadOutcome::Success));

    clock.advance(1_000);
    let second = client.poll_timers().unwrap();
    assert!(second.request.votes.contains_key("B"));
    assert_eq!(
        second.request.sequence_number,
        first.request.sequence_number.map(|seq| seq + 1)
    );
}

#[test]
fn poll_bookkeeping_tracks_initial_load_and_polling_errors() {
    let (mut client, _clock) = granted_client();
    client.record_poll_started();
    assert_eq!(client.initial_load_state(), InitialLoadState::Loading);
    client.record_poll_failure();
    assert_eq!(client.initial_load_state(), InitialLoadState::Error);
    assert!(!client.catalog().polling_error());

    client.apply_poll_response(&response(json!({ "version": 1, "submissions": {} })));
    assert_eq!(client.initial_load_state(), InitialLoadState::Idle);

    client.record_poll_started();
    client.record_poll_failure();
    assert!(client.catalog().polling_error());
    assert_eq!(client.initial_load_state(), InitialLoadState::Idle);

    client.apply_poll_response(&response(json!({ "version": 2, "submissions": {} })));
    assert!(!client.catalog().polling_error());
}
