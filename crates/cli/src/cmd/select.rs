//! Apply selection toggles and print the result

use crate::session::Session;
use anyhow::{Context, Result};
use kbpick_state::SelectionChange;
use kbpick_sync::SyncConfig;
use owo_colors::OwoColorize;
use std::path::Path;

pub async fn run(
    fixture: &Path,
    folder: Option<&str>,
    picks: &[String],
    config: SyncConfig,
) -> Result<()> {
    let session = Session::open(fixture, config)?;
    let scope = session.scope(None, folder).await?;
    let view = session
        .loader
        .load(&scope)
        .await
        .context("Failed to load folder")?;

    let mut selection = session.state.selection.lock();
    for id in picks {
        let resource = match view.resources.iter().find(|r| &r.id == id) {
            Some(resource) => resource.clone(),
            None => session.resource(id)?,
        };
        let name = resource.name.clone();

        match selection.toggle(resource) {
            SelectionChange::Selected { pruned: 0 } => {
                println!("{} {}", "+".green(), name);
            }
            SelectionChange::Selected { pruned } => {
                println!(
                    "{} {} {}",
                    "+".green(),
                    name,
                    format!("(replaces {} selected item(s) inside)", pruned).dimmed()
                );
            }
            SelectionChange::Deselected => println!("{} {}", "-".red(), name),
            SelectionChange::AlreadyCovered => {
                println!("{} {} {}", "=".dimmed(), name, "(already covered)".dimmed());
            }
        }
    }

    println!("\n{} ({})", "Selection".bold(), selection.len());
    let mut selected = selection.resources();
    selected.sort_by(|a, b| a.path.cmp(&b.path));
    for resource in &selected {
        println!("  {}", resource.path);
    }
    if selection.all_selected(&view.resources) {
        println!("{}", "Everything in this folder is selected".dimmed());
    }

    Ok(())
}
