//! Print the projected listing of a folder

use crate::session::Session;
use crate::util;
use anyhow::{Context, Result};
use kbpick_core::view::{sort_resources, SortDirection, SortField, StatusFilter, ViewFilter};
use kbpick_sync::SyncConfig;
use owo_colors::OwoColorize;
use std::path::PathBuf;

pub struct ViewOptions {
    pub fixture: PathBuf,
    pub folder: Option<String>,
    pub kb: Option<String>,
    pub filter: Option<String>,
    pub status: StatusFilter,
    pub sort: SortField,
    pub desc: bool,
    /// Warm every subfolder after printing
    pub prefetch: bool,
}

pub async fn run(options: ViewOptions, config: SyncConfig) -> Result<()> {
    let mut session = Session::open(&options.fixture, config)?;
    let scope = session
        .scope(options.kb.as_deref(), options.folder.as_deref())
        .await?;
    let view = session
        .loader
        .load(&scope)
        .await
        .context("Failed to load folder")?;

    println!(
        "{} {} {}",
        scope.kb_path().bold(),
        "in".dimmed(),
        scope
            .knowledge_base_id
            .as_deref()
            .unwrap_or("(no knowledge base)")
            .cyan()
    );
    if !view.statuses_loaded {
        println!("{}", "Knowledge base unavailable; statuses not loaded".yellow());
    }

    let filter = ViewFilter {
        text: options.filter.unwrap_or_default(),
        status: options.status,
        statuses_loading: !view.statuses_loaded,
    };
    let mut resources = filter.apply(view.resources);
    let direction = if options.desc {
        SortDirection::Desc
    } else {
        SortDirection::Asc
    };
    sort_resources(&mut resources, options.sort, direction);
    util::print_resources(&resources, view.statuses_loaded);

    if let Some(every) = view.refetch_every {
        println!(
            "{}",
            format!("Indexing in flight; refresh every {}s", every.as_secs()).dimmed()
        );
    }

    if options.prefetch {
        for folder in resources.iter().filter(|r| r.is_directory()) {
            if session.prefetcher.hover(&scope, folder) {
                session.prefetcher.settle().await;
            }
            for notice in session.drain_notices() {
                util::print_notice(&notice);
            }
        }
    }

    Ok(())
}
