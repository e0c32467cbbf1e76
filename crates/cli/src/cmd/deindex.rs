//! Remove one resource from the knowledge base

use crate::session::Session;
use crate::util;
use anyhow::{Context, Result};
use kbpick_sync::SyncConfig;
use std::path::Path;

pub async fn run(
    fixture: &Path,
    kb: Option<&str>,
    folder: Option<&str>,
    id: &str,
    fail_write: bool,
    config: SyncConfig,
) -> Result<()> {
    let session = Session::open(fixture, config)?;
    if fail_write {
        session.fail_writes();
    }
    let scope = session.scope(kb, folder).await?;
    let view = session
        .loader
        .load(&scope)
        .await
        .context("Failed to load folder")?;
    if let Some(kb) = scope.knowledge_base_id.as_deref() {
        session
            .loader
            .refresh_summary(kb)
            .await
            .context("Failed to read knowledge base")?;
    }

    let resource = match view.resources.iter().find(|r| r.id == id) {
        Some(resource) => resource.clone(),
        None => session.resource_in(&scope, id)?,
    };
    let outcome = session.orchestrator.deindex(&scope, &resource).await;
    util::print_outcome(&outcome);
    if !outcome.is_success() {
        anyhow::bail!("{}", outcome.message());
    }

    let view = session.loader.load(&scope).await.context("Failed to reload folder")?;
    util::print_resources(&view.resources, view.statuses_loaded);
    Ok(())
}
