use votesync_core::db::open_db_in_memory;
use votesync_core::service::data_rights::destructive_outcome_message;
use votesync_core::{
    ClientConfig, ConfirmationAction, DataRightsError, DataScope, DestructiveRequest,
    ManualClock, SqliteStateStore, StateStorage, VotingClient,
};

fn config_for(storage_key: &str) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.votes.storage_key = storage_key.to_string();
    config
}

#[test]
fn delete_all_collects_every_tagged_record_after_countdown() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new();

    let other_id = {
        let other = VotingClient::open(
            config_for("event-2024"),
            SqliteStateStore::new(&conn),
            clock.clone(),
        );
        other.engine().client_id().unwrap().to_string()
    };
    let store = SqliteStateStore::new(&conn);
    store.set_item("broken", "{not json").unwrap();
    store
        .set_item(
            "foreign",
            r#"{"state":{"clientId":"x","applicationName":"somethingElse"},"version":0}"#,
        )
        .unwrap();

    let mut client = VotingClient::open(config_for("event-2025"), store, clock.clone());
    client.set_consent(false);
    client.request_delete_all().unwrap();
    assert_eq!(
        client.confirmation().action,
        Some(ConfirmationAction::DeleteAllEventData)
    );
    assert!(client.confirmation().message.contains("ALL events"));

    clock.advance(4_999);
    assert!(matches!(
        client.confirm_pending_action(),
        Err(DataRightsError::Confirmation(_))
    ));
    clock.advance(1);
    let request = client.confirm_pending_action().unwrap();
    assert_eq!(request.path(), "/delete-all");
    assert!(!client.confirmation().visible);

    let DestructiveRequest::DeleteAll(body) = request else {
        panic!("expected delete-all request");
    };
    assert_eq!(body.client_ids.len(), 2);
    assert_eq!(body.client_ids["event-2024"], other_id);
    assert_eq!(
        Some(body.client_ids["event-2025"].as_str()),
        client.engine().client_id()
    );
}

#[test]
fn enabling_uploads_during_countdown_blocks_confirmation() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new();
    let mut client =
        VotingClient::open(ClientConfig::default(), SqliteStateStore::new(&conn), clock.clone());
    client.set_consent(false);
    client.request_delete_current().unwrap();

    client.set_consent(true);
    clock.advance(5_000);
    assert!(matches!(
        client.confirm_pending_action(),
        Err(DataRightsError::SyncActive)
    ));
    assert!(!client.confirmation().visible);
}

#[test]
fn abort_discards_pending_deletion() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new();
    let mut client =
        VotingClient::open(ClientConfig::default(), SqliteStateStore::new(&conn), clock.clone());
    client.set_consent(false);
    client.request_delete_current().unwrap();
    client.abort_confirmation();

    clock.advance(10_000);
    assert!(client.confirm_pending_action().is_err());
    assert_eq!(client.confirmation().message, "");
}

#[test]
fn export_covers_current_or_all_records() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new();
    drop(VotingClient::open(
        config_for("event-a"),
        SqliteStateStore::new(&conn),
        clock.clone(),
    ));
    let client = VotingClient::open(config_for("event-b"), SqliteStateStore::new(&conn), clock);

    let current = client.build_export_request(DataScope::CurrentEvent).unwrap();
    assert_eq!(current.events.keys().collect::<Vec<_>>(), vec!["event-b"]);

    let all = client.build_export_request(DataScope::AllEvents).unwrap();
    assert_eq!(all.events.len(), 2);
    let body = serde_json::to_value(&all).unwrap();
    assert!(body["events"]["event-a"].is_string());
}

#[test]
fn outcome_messages_match_action() {
    assert_eq!(
        destructive_outcome_message(ConfirmationAction::DeleteAllEventData, None),
        "Server data deleted for all found events."
    );
    assert_eq!(
        destructive_outcome_message(ConfirmationAction::DeleteCurrentEventData, Some("timeout")),
        "Error deleting data: timeout"
    );
}
