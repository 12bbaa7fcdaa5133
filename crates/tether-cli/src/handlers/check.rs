//! Check command handler

use anyhow::{Context, Result};
use serde_json::Value;

use super::Session;

/// Run the integrity audit; fails when any violation is found.
pub async fn run(session: &Session) -> Result<()> {
    let violations = audit(session).await?;
    if violations.is_empty() {
        println!(
            "ok: {} clients, {} files",
            session.store.client_count(),
            session.store.file_count()
        );
        return Ok(());
    }
    for violation in &violations {
        println!("violation: {violation}");
    }
    anyhow::bail!("{} integrity violation(s)", violations.len())
}

async fn audit(session: &Session) -> Result<Vec<Value>> {
    let envelope = session.bridge.invoke("integrity_check", Value::Null).await;
    let violations = envelope
        .decode::<Vec<Value>>()
        .context("integrity check failed")?;
    tracing::debug!(count = violations.len(), "integrity check finished");
    Ok(violations)
}
