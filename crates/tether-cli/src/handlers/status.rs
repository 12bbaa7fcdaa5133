//! Status command handler

use anyhow::Result;
use serde_json::{json, Value};
use tether_state::{keys, Intent};

use super::{print_json, Session};

/// Refresh status and logs through the state manager and print them.
pub async fn run(session: &Session, logs: usize) -> Result<()> {
    let report = collect(session, logs).await?;
    print_json(&report)
}

async fn collect(session: &Session, logs: usize) -> Result<Value> {
    for intent in [
        Intent::RefreshStatus,
        Intent::RefreshLogs { limit: Some(logs) },
    ] {
        let outcome = session.state.dispatch(intent).await;
        if let Some((key, envelope)) = outcome.refreshed.iter().find(|(_, e)| !e.is_success()) {
            if let Some(error) = envelope.error() {
                anyhow::bail!("refreshing {key} failed: {error}");
            }
        }
    }

    Ok(json!({
        "summary": session.state.get_or(keys::STATUS, Value::Null),
        "logs": session.state.get_or(keys::LOGS, json!([])),
        "snapshot": session.store.config().snapshot_path,
    }))
}
