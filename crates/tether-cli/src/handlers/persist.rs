//! Persist command handler

use std::path::PathBuf;

use anyhow::{Context, Result};

use super::Session;

/// Write a snapshot to `output`, or to the configured snapshot path.
pub async fn run(session: &Session, output: Option<PathBuf>) -> Result<()> {
    let path = write(session, output)?;
    println!("snapshot written to {}", path.display());
    Ok(())
}

fn write(session: &Session, output: Option<PathBuf>) -> Result<PathBuf> {
    match output {
        Some(path) => {
            session
                .store
                .persist_to(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            Ok(path)
        }
        None => session
            .store
            .persist()
            .context("no snapshot path configured; pass --output or set store.snapshot_path"),
    }
}
