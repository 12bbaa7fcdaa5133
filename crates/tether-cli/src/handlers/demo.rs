//! Demo command handler
//!
//! Drives the state manager through a short session: refresh, add a client
//! and a file, verify the file, delete the client. Every change to the
//! status key is logged by an observer.

use anyhow::Result;
use serde_json::json;
use tether_core::{Client, NewClient, NewFile};
use tether_state::{keys, Intent, IntentOutcome, Observer};

use super::{print_json, Session};

/// Run the demo session and print the final state.
pub async fn run(session: &Session) -> Result<()> {
    let _status = session.state.subscribe_scoped(
        keys::STATUS,
        Observer::immediate(|new, _old| {
            tracing::info!(
                clients = %new["clients"],
                files = %new["files"],
                verified = %new["verified_files"],
                "status changed"
            );
            Ok(())
        }),
    );

    let client = walkthrough(session).await?;

    print_json(&json!({
        "demo_client": client.id,
        "state": session.state.keys(),
        "status": session.state.get(keys::STATUS),
        "bridge": session.bridge.stats(),
        "notifications": session.state.stats(),
    }))
}

fn checked(step: &str, outcome: IntentOutcome) -> Result<IntentOutcome> {
    if outcome.is_success() {
        return Ok(outcome);
    }
    let reason = outcome
        .mutation
        .iter()
        .chain(outcome.refreshed.iter().map(|(_, e)| e))
        .find_map(|e| e.error().cloned())
        .map_or_else(|| "unknown failure".to_string(), |e| e.to_string());
    anyhow::bail!("{step} failed: {reason}")
}

async fn walkthrough(session: &Session) -> Result<Client> {
    let state = &session.state;

    checked("refresh", state.dispatch(Intent::RefreshClients).await)?;
    checked("refresh", state.dispatch(Intent::RefreshStatus).await)?;

    let added = checked(
        "add client",
        state
            .dispatch(Intent::AddClient(NewClient::named("Demo Workstation")))
            .await,
    )?;
    let client: Client = match added.mutation {
        Some(envelope) => envelope.decode()?,
        None => anyhow::bail!("add client produced no result"),
    };
    tracing::info!(id = %client.id, "client added");

    let file = checked(
        "add file",
        state
            .dispatch(Intent::AddFile {
                owner_id: client.id.clone(),
                file: NewFile::sized(4096).with_name("demo.tar"),
            })
            .await,
    )?;
    let file_id = file
        .mutation
        .as_ref()
        .and_then(|e| e.data())
        .and_then(|data| data["id"].as_str())
        .map(str::to_string);

    if let Some(id) = file_id {
        checked("verify file", state.dispatch(Intent::VerifyFile { id }).await)?;
    }

    checked(
        "delete client",
        state
            .dispatch(Intent::DeleteClient {
                id: client.id.clone(),
            })
            .await,
    )?;
    Ok(client)
}
