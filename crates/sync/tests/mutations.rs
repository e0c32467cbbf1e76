//! Index / de-index mutations against the in-memory backend

mod common;

use common::{docs_scope, resource, root_key, root_scope, status, Harness, KB};
use kbpick_core::ResourceStatus;
use kbpick_state::{NoticeLevel, ViewScope};
use kbpick_sync::{MutationError, Operation, PollFinish};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_index_without_knowledge_base_is_rejected() {
    let h = Harness::new();
    let scope = ViewScope::root(common::CONNECTION);
    let target = kbpick_core::Resource::file("f-a", "/a.txt");

    let outcome = h.orchestrator.index_resources(&scope, &[target]).await;
    assert!(!outcome.is_success());
    assert_eq!(outcome.message(), "Select a knowledge base first.");
    assert_eq!(h.backend.total_calls(), 0);
    assert!(h.state.pending_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_index_with_empty_selection_is_rejected() {
    let mut h = Harness::new();
    let outcome = h.orchestrator.index_selected(&root_scope()).await;

    assert!(matches!(outcome.error(), Some(MutationError::EmptySelection)));
    assert_eq!(outcome.message(), "Select at least one file or folder");
    assert_eq!(h.backend.total_calls(), 0);

    let notice = h.outcomes.try_recv().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
}

#[tokio::test(start_paused = true)]
async fn test_failed_index_restores_exact_view() {
    let h = Harness::new();
    let view = h.load_root().await;
    h.loader.refresh_summary(KB).await.unwrap();

    let before_listing = h.state.cache.get(&root_key()).unwrap();
    let before_ids = h.state.cache.source_ids(KB);
    let before_view = h.load_root().await.resources;

    h.state.selection.lock().toggle(resource(&view, "f-a"));
    h.backend.fail(Operation::AddSourceIds);

    let outcome = h.orchestrator.index_selected(&root_scope()).await;
    assert_eq!(outcome.message(), "Failed to start indexing. Please try again.");
    assert!(matches!(outcome.error(), Some(MutationError::Index(_))));

    assert_eq!(*h.state.cache.get(&root_key()).unwrap(), *before_listing);
    assert_eq!(h.state.cache.source_ids(KB), before_ids);
    assert!(h.state.pending_ids().is_empty());
    assert!(h.state.selection.lock().contains_id("f-a"), "selection kept on failure");

    let after = h.load_root().await;
    assert_eq!(after.resources, before_view);
    assert_eq!(status(&after, "f-a"), ResourceStatus::NotIndexed);
    assert_eq!(h.backend.calls(Operation::TriggerSync), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_reindex_keeps_earlier_pending() {
    let h = Harness::new();
    let view = h.load_root().await;
    let target = resource(&view, "f-a");

    let first = h.orchestrator.index_resources(&root_scope(), &[target.clone()]).await;
    assert!(first.is_success());

    // The first poll refetches while the backend still lags
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert!(status(&h.load_root().await, "f-a").is_in_progress());

    h.backend.fail(Operation::AddSourceIds);
    let second = h.orchestrator.index_resources(&root_scope(), &[target]).await;
    assert!(matches!(second.error(), Some(MutationError::Index(_))));

    assert!(h.state.pending_ids().contains("f-a"));
    assert!(status(&h.load_root().await, "f-a").is_in_progress());

    let reports = h.orchestrator.wait_idle().await;
    assert_eq!(reports[0].finish, PollFinish::Converged);
    assert!(h.state.pending_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_row_action_waits_for_statuses() {
    let mut h = Harness::new();
    let view = h.load_root().await;

    let outcome = h
        .orchestrator
        .row_action(&root_scope(), &resource(&view, "f-a"), false)
        .await;
    assert!(matches!(outcome.error(), Some(MutationError::StatusesLoading)));
    assert_eq!(outcome.message(), "Please wait for statuses to finish loading.");
    assert_eq!(h.backend.calls(Operation::AddSourceIds), 0);
    assert!(h.state.pending_ids().is_empty());

    let notice = h.outcomes.try_recv().unwrap();
    assert_eq!(notice.level, NoticeLevel::Info);
}

#[tokio::test(start_paused = true)]
async fn test_row_action_indexes_unindexed_row() {
    let h = Harness::new();
    let view = h.load_root().await;
    assert_eq!(status(&view, "f-a"), ResourceStatus::NotIndexed);

    let outcome = h
        .orchestrator
        .row_action(&root_scope(), &resource(&view, "f-a"), true)
        .await;
    assert_eq!(outcome.message(), "Indexing started");
    assert_eq!(h.backend.calls(Operation::AddSourceIds), 1);
    assert_eq!(h.backend.calls(Operation::DeleteIndexedResource), 0);
    assert!(h.state.pending_ids().contains("f-a"));
    h.orchestrator.wait_idle().await;
}

#[tokio::test(start_paused = true)]
async fn test_row_action_deindexes_indexed_and_processing_rows() {
    let h = Harness::new();
    let view = h.load_root().await;
    h.loader.refresh_summary(KB).await.unwrap();

    let outcome = h
        .orchestrator
        .row_action(&root_scope(), &resource(&view, "f-report"), true)
        .await;
    assert_eq!(outcome.message(), "Resource removed from knowledge base");
    assert_eq!(h.backend.calls(Operation::DeleteIndexedResource), 1);

    h.orchestrator
        .index_resources(&root_scope(), &[resource(&view, "f-a")])
        .await;
    let during = h.load_root().await;
    assert!(status(&during, "f-a").is_in_progress());

    let outcome = h
        .orchestrator
        .row_action(&root_scope(), &resource(&during, "f-a"), true)
        .await;
    assert_eq!(outcome.message(), "Resource removed from knowledge base");
    assert_eq!(h.backend.calls(Operation::DeleteIndexedResource), 2);
    assert_eq!(h.backend.calls(Operation::AddSourceIds), 1);
    assert!(!h.state.pending_ids().contains("f-a"));
    h.orchestrator.cancel_polls();
}

#[tokio::test(start_paused = true)]
async fn test_index_is_processing_until_poll_converges() {
    let h = Harness::new();
    let view = h.load_root().await;
    let target = resource(&view, "f-a");
    h.state.selection.lock().toggle(target.clone());

    let outcome = h.orchestrator.index_resources(&root_scope(), &[target]).await;
    assert!(outcome.is_success());
    assert_eq!(outcome.message(), "Indexing started");
    assert!(h.state.selection.lock().is_empty());

    let during = h.load_root().await;
    assert!(status(&during, "f-a").is_in_progress());
    assert_eq!(status(&during, "f-a").label(), "Processing");
    assert_eq!(during.refetch_every, Some(Duration::from_secs(4)));
    assert!(h.state.pending_ids().contains("f-a"));
    assert!(h
        .state
        .cache
        .source_ids(KB)
        .unwrap()
        .contains(&"f-a".to_string()));

    let reports = h.orchestrator.wait_idle().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].finish, PollFinish::Converged);
    // Visible after the 3s lag, so the second 2s attempt sees it
    assert_eq!(reports[0].attempts, 2);
    assert!(h.state.pending_ids().is_empty());
    assert_eq!(h.backend.calls(Operation::TriggerSync), 1);

    tokio::time::sleep(Duration::from_secs(3)).await;
    let settled = h.loader.refetch(&root_scope()).await.unwrap();
    assert_eq!(status(&settled, "f-a"), ResourceStatus::Indexed);
    assert_eq!(settled.refetch_every, None);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_poll_force_clears_pending() {
    let h = Harness::new();
    let view = h.load_root().await;

    let outcome = h
        .orchestrator
        .index_resources(&root_scope(), &[resource(&view, "f-a")])
        .await;
    assert!(outcome.is_success());
    h.backend.fail(Operation::ListIndexedResources);

    let reports = h.orchestrator.wait_idle().await;
    assert_eq!(reports[0].finish, PollFinish::Exhausted);
    assert_eq!(reports[0].attempts, 10);
    assert_eq!(h.backend.calls(Operation::ListIndexedResources), 11);
    assert!(h.state.pending_ids().is_empty());
    assert!(h
        .state
        .cache
        .get_fresh(&root_key(), Duration::from_secs(120))
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn test_sync_trigger_failure_is_swallowed() {
    let h = Harness::new();
    let view = h.load_root().await;
    h.backend.fail(Operation::TriggerSync);

    let outcome = h
        .orchestrator
        .index_resources(&root_scope(), &[resource(&view, "f-a")])
        .await;
    assert!(outcome.is_success());

    h.orchestrator.wait_idle().await;
    assert_eq!(h.backend.calls(Operation::TriggerSync), 1);
    assert!(h
        .state
        .cache
        .source_ids(KB)
        .unwrap()
        .contains(&"f-a".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_folder_index_covers_children() {
    let h = Harness::new();
    let view = h.load_root().await;
    let docs = resource(&view, "d-docs");

    let outcome = h.orchestrator.index_resources(&root_scope(), &[docs]).await;
    assert!(outcome.is_success());
    h.orchestrator.wait_idle().await;

    tokio::time::sleep(Duration::from_secs(3)).await;
    let inside = h.loader.refetch(&docs_scope()).await.unwrap();
    assert_eq!(status(&inside, "f-readme"), ResourceStatus::Indexed);
    assert_eq!(status(&inside, "d-nested"), ResourceStatus::Indexed);
}

#[tokio::test(start_paused = true)]
async fn test_deindex_removes_entry() {
    let h = Harness::new();
    let view = h.load_root().await;
    h.loader.refresh_summary(KB).await.unwrap();
    assert_eq!(status(&view, "f-report"), ResourceStatus::Indexed);

    let outcome = h
        .orchestrator
        .deindex(&root_scope(), &resource(&view, "f-report"))
        .await;
    assert!(outcome.is_success());
    assert_eq!(outcome.message(), "Resource removed from knowledge base");
    assert_eq!(h.backend.calls(Operation::DeleteIndexedResource), 1);
    assert_eq!(h.backend.calls(Operation::RemoveSourceId), 1);
    assert_eq!(h.state.cache.source_ids(KB), Some(vec!["f-guide".to_string()]));

    let after = h.load_root().await;
    assert_eq!(status(&after, "f-report"), ResourceStatus::NotIndexed);
}

#[tokio::test(start_paused = true)]
async fn test_failed_deindex_rolls_back() {
    let h = Harness::new();
    let view = h.load_root().await;
    h.loader.refresh_summary(KB).await.unwrap();
    let before = h.state.cache.get(&root_key()).unwrap();

    h.backend.fail(Operation::RemoveSourceId);
    let outcome = h
        .orchestrator
        .deindex(&root_scope(), &resource(&view, "f-report"))
        .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.message(), "Failed to de-index resource.");
    assert_eq!(h.backend.calls(Operation::DeleteIndexedResource), 1);
    assert_eq!(h.backend.calls(Operation::RemoveSourceId), 1);

    assert_eq!(*h.state.cache.get(&root_key()).unwrap(), *before);
    assert_eq!(
        h.state.cache.source_ids(KB),
        Some(vec!["f-report".to_string(), "f-guide".to_string()])
    );
    assert_eq!(status(&h.load_root().await, "f-report"), ResourceStatus::Indexed);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_poll_keeps_pending() {
    let h = Harness::new();
    let view = h.load_root().await;
    h.orchestrator
        .index_resources(&root_scope(), &[resource(&view, "f-a")])
        .await;
    assert_eq!(h.orchestrator.active_polls(), 1);

    h.orchestrator.cancel_polls();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(h.orchestrator.wait_idle().await.is_empty());
    assert!(h.state.pending_ids().contains("f-a"));
}
