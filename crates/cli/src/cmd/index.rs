//! Index the picked resources and wait for them to show up

use crate::session::Session;
use crate::util;
use anyhow::{Context, Result};
use kbpick_sync::SyncConfig;
use owo_colors::OwoColorize;
use std::path::Path;
use tracing::info;

pub async fn run(
    fixture: &Path,
    kb: Option<&str>,
    folder: Option<&str>,
    picks: &[String],
    fail_write: bool,
    config: SyncConfig,
) -> Result<()> {
    let session = Session::open(fixture, config)?;
    if fail_write {
        session.fail_writes();
    }
    let scope = session.scope(kb, folder).await?;
    session
        .loader
        .load(&scope)
        .await
        .context("Failed to load folder")?;

    {
        let mut selection = session.state.selection.lock();
        for id in picks {
            selection.toggle(session.resource_in(&scope, id)?);
        }
    }

    let outcome = session.orchestrator.index_selected(&scope).await;
    util::print_outcome(&outcome);
    if !outcome.is_success() {
        anyhow::bail!("{}", outcome.message());
    }

    println!("{}", "Waiting for the knowledge base to catch up…".dimmed());
    for report in session.orchestrator.wait_idle().await {
        util::print_poll_report(&report);
    }
    info!("Index mutation {} settled", outcome.mutation_id);

    let view = session
        .loader
        .refetch(&scope)
        .await
        .context("Failed to reload folder")?;
    util::print_resources(&view.resources, view.statuses_loaded);
    Ok(())
}
