//! CLI smoke entry point.
//!
//! # Responsibility
//! - Drive `votesync_core` against an on-disk SQLite state store.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `votesync_cli <db_path> <status|merge <response.json>|export [all]|records>`

use log::error;
use std::process::ExitCode;
use votesync_core::repo::persisted_state::{scan_client_records, APPLICATION_TAG};
use votesync_core::{
    default_log_level, init_logging, open_db, ClientConfig, DataScope, SqliteStateStore,
    SubmissionsResponse, SystemClock, VotingClient,
};

const USAGE: &str =
    "usage: votesync_cli <db_path> <status|merge <response.json>|export [all]|records>";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_run module=cli status=error");
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), String> {
    let [db_path, command, rest @ ..] = args else {
        return Err(USAGE.to_string());
    };

    if let Ok(log_dir) = std::env::var("VOTESYNC_LOG_DIR") {
        init_logging(default_log_level(), &log_dir).map_err(|err| err.to_string())?;
    }

    let config = ClientConfig::from_env();
    config.validate().map_err(|err| err.to_string())?;
    let conn = open_db(db_path).map_err(|err| err.to_string())?;
    let storage = SqliteStateStore::new(&conn);
    let mut client = VotingClient::open(config, storage, SystemClock::new());

    println!("votesync_core version={}", votesync_core::core_version());
    match (command.as_str(), rest) {
        ("status", []) => {
            let engine = client.engine();
            println!("client_id={}", engine.client_id().unwrap_or_default());
            println!("consent={}", engine.consent().as_str());
            println!("status={}", engine.status().as_str());
            println!("sequence_number={:?}", engine.sequence_number());
            println!("votes={}", engine.votes().len());
        }
        ("merge", [response_path]) => {
            let raw = std::fs::read_to_string(response_path)
                .map_err(|err| format!("failed to read `{response_path}`: {err}"))?;
            let response: SubmissionsResponse = serde_json::from_str(&raw)
                .map_err(|err| format!("invalid poll response `{response_path}`: {err}"))?;
            let outcome = client.apply_poll_response(&response);
            println!(
                "version={} added={} removed={} updated={}",
                outcome.version,
                outcome.added.len(),
                outcome.removed.len(),
                outcome.updated.len()
            );
            for (position, record) in client.ordered_submissions().enumerate() {
                println!(
                    "{position}\t{}\tv{}\t{}",
                    record.code, record.first_observed_version, record.title
                );
            }
            println!("sequence_number={:?}", client.engine().sequence_number());
        }
        ("export", scope) => {
            let scope = match scope {
                [] => DataScope::CurrentEvent,
                [all] if all == "all" => DataScope::AllEvents,
                _ => return Err(USAGE.to_string()),
            };
            let request = client
                .build_export_request(scope)
                .map_err(|err| err.to_string())?;
            let body = serde_json::to_string_pretty(&request).map_err(|err| err.to_string())?;
            println!("{body}");
        }
        ("records", []) => {
            let records = scan_client_records(client.engine().storage(), APPLICATION_TAG)
                .map_err(|err| err.to_string())?;
            for (key, client_id) in records {
                println!("{key}\t{client_id}");
            }
        }
        _ => return Err(USAGE.to_string()),
    }
    Ok(())
}
