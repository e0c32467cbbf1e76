//! View loading, stale responses and hover prefetch

mod common;

use common::{docs_scope, resource, root_key, root_scope, status, Harness, CONNECTION, KB};
use kbpick_core::{IdSet, IndexedEntry, IndexedListing, Resource, ResourceStatus, SourceEntry};
use kbpick_state::{Notice, NoticeLevel, ViewScope};
use kbpick_sync::{Operation, Prefetcher, SyncConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn prefetcher(h: &Harness) -> (Prefetcher<kbpick_sync::MemoryBackend>, mpsc::Receiver<Notice>) {
    let (tx, rx) = mpsc::channel(16);
    let prefetcher = Prefetcher::new(
        Arc::clone(&h.backend),
        Arc::clone(&h.state),
        SyncConfig::default(),
        tx,
    );
    (prefetcher, rx)
}

fn drain(rx: &mut mpsc::Receiver<Notice>) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        out.push(notice);
    }
    out
}

#[tokio::test]
async fn test_root_projection() {
    let h = Harness::new();
    let view = h.load_root().await;

    assert!(view.statuses_loaded);
    assert_eq!(view.resources.len(), 3);
    assert_eq!(status(&view, "f-report"), ResourceStatus::Indexed);
    assert_eq!(status(&view, "f-a"), ResourceStatus::NotIndexed);
    assert_eq!(status(&view, "d-docs"), ResourceStatus::NotIndexed);
    assert_eq!(resource(&view, "d-docs").path, "/docs/");
    assert!(resource(&view, "f-report").modified_at.is_some());
    assert_eq!(view.refetch_every, None);
}

#[tokio::test]
async fn test_visited_folder_feeds_parent_status() {
    let h = Harness::new();
    let inside = h.loader.load(&docs_scope()).await.unwrap();
    assert_eq!(status(&inside, "f-guide"), ResourceStatus::Error);

    let root = h.load_root().await;
    assert_eq!(status(&root, "d-docs"), ResourceStatus::Error);
}

#[tokio::test]
async fn test_cached_listings_are_reused() {
    let h = Harness::new();
    h.load_root().await;
    h.load_root().await;
    assert_eq!(h.backend.calls(Operation::ListSourceChildren), 1);
    assert_eq!(h.backend.calls(Operation::ListIndexedResources), 1);

    h.loader.refetch(&root_scope()).await.unwrap();
    assert_eq!(h.backend.calls(Operation::ListSourceChildren), 1);
    assert_eq!(h.backend.calls(Operation::ListIndexedResources), 2);
}

#[tokio::test]
async fn test_knowledge_base_failure_degrades_statuses() {
    let h = Harness::new();
    h.backend.fail(Operation::ListIndexedResources);

    let view = h.load_root().await;
    assert!(!view.statuses_loaded);
    assert_eq!(status(&view, "f-report"), ResourceStatus::NotIndexed);
    assert!(!h.state.cache.is_fetching(&root_key()));

    h.backend.fail(Operation::ListSourceChildren);
    assert!(h.loader.refetch(&root_scope()).await.is_ok(), "root source listing is cached");
    assert!(h.loader.load(&docs_scope()).await.is_err());
}

#[tokio::test]
async fn test_view_without_knowledge_base() {
    let h = Harness::new();
    let view = h.loader.load(&ViewScope::root(CONNECTION)).await.unwrap();
    assert_eq!(status(&view, "f-report"), ResourceStatus::NotIndexed);
    assert_eq!(h.backend.calls(Operation::ListIndexedResources), 0);
}

#[tokio::test]
async fn test_refetch_policy() {
    let h = Harness::new();
    let mut pending = IdSet::new();
    assert_eq!(h.loader.refetch_interval(&pending, None), None);

    let busy = IndexedListing::new(vec![IndexedEntry::new(SourceEntry::file("x", "/x"), "pending")]);
    assert_eq!(h.loader.refetch_interval(&pending, Some(&busy)), Some(Duration::from_secs(4)));

    let quiet = IndexedListing::new(vec![IndexedEntry::new(SourceEntry::file("x", "/x"), "indexed")]);
    assert_eq!(h.loader.refetch_interval(&pending, Some(&quiet)), None);

    pending.insert("x".to_string());
    assert_eq!(h.loader.refetch_interval(&pending, Some(&quiet)), Some(Duration::from_secs(4)));
}

#[tokio::test(start_paused = true)]
async fn test_late_response_cannot_overwrite_optimistic_write() {
    let h = Harness::new();
    let target = Resource::file("f-a", "/a.txt");
    h.backend
        .set_latency(Operation::ListIndexedResources, Duration::from_secs(1));

    let scope = root_scope();
    let (view, outcome) = tokio::join!(h.loader.load(&scope), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.orchestrator.index_resources(&root_scope(), &[target]).await
    });

    assert!(outcome.is_success());
    let view = view.unwrap();
    assert_eq!(status(&view, "f-a"), ResourceStatus::Processing);

    let cached = h.state.cache.get(&root_key()).unwrap();
    assert!(cached.find("f-a").is_some());
}

#[tokio::test]
async fn test_knowledge_base_directory() {
    let h = Harness::new();
    let directory = h.loader.knowledge_bases().await.unwrap();
    assert_eq!(directory.default_id().as_deref(), Some(KB));
    assert_eq!(directory.flatten().len(), 2);
    assert_eq!(directory.find("kb-other").unwrap().name, "Other");
}

#[tokio::test]
async fn test_prefetch_warms_cache_once() {
    let h = Harness::new();
    let view = h.load_root().await;
    let (prefetcher, mut rx) = prefetcher(&h);
    let docs = resource(&view, "d-docs");

    assert!(!prefetcher.hover(&root_scope(), &resource(&view, "f-a")));
    assert!(prefetcher.hover(&root_scope(), &docs));
    prefetcher.settle().await;

    let notices = drain(&mut rx);
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].level, NoticeLevel::Info);
    assert_eq!(notices[0].message, "Preloading \"docs\" in the background…");
    assert_eq!(notices[1].level, NoticeLevel::Success);
    assert_eq!(notices[1].message, "\"docs\" is ready to open.");
    assert_eq!(notices[0].key, notices[1].key);

    let calls = h.backend.total_calls();
    h.loader.load(&docs_scope()).await.unwrap();
    assert_eq!(h.backend.total_calls(), calls, "opening a prefetched folder is free");

    assert!(prefetcher.hover(&root_scope(), &docs));
    prefetcher.settle().await;
    assert!(drain(&mut rx).is_empty());
    assert_eq!(h.backend.total_calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_superseded_prefetch_is_silent() {
    let h = Harness::new();
    let (prefetcher, mut rx) = prefetcher(&h);
    h.backend
        .set_latency(Operation::ListSourceChildren, Duration::from_secs(1));

    let docs = Resource::directory("d-docs", "/docs/");
    let nested = Resource::directory("d-nested", "/docs/nested/");
    prefetcher.hover(&root_scope(), &docs);
    tokio::time::sleep(Duration::from_millis(200)).await;
    prefetcher.hover(&root_scope(), &nested);
    prefetcher.settle().await;

    let messages: Vec<_> = drain(&mut rx).into_iter().map(|n| n.message).collect();
    assert_eq!(
        messages,
        vec![
            "Preloading \"docs\" in the background…",
            "Preloading \"nested\" in the background…",
            "\"nested\" is ready to open.",
        ]
    );
    assert!(h
        .state
        .cache
        .get(&kbpick_state::CacheKey::new(KB, "/docs/"))
        .is_none());
}

#[tokio::test]
async fn test_prefetch_failure_and_integration_switch() {
    let h = Harness::new();
    let (prefetcher, mut rx) = prefetcher(&h);
    let docs = Resource::directory("d-docs", "/docs/");
    h.backend.fail(Operation::ListSourceChildren);

    prefetcher.hover(&root_scope(), &docs);
    prefetcher.settle().await;
    let notices = drain(&mut rx);
    assert_eq!(notices.last().unwrap().level, NoticeLevel::Error);
    assert_eq!(notices.last().unwrap().message, "Failed to preload \"docs\".");

    h.backend.heal(Operation::ListSourceChildren);
    h.state.reset_for_integration_switch();
    prefetcher.hover(&root_scope(), &docs);
    prefetcher.settle().await;
    let notices = drain(&mut rx);
    assert_eq!(notices.len(), 2, "dedup log was cleared");
}

#[tokio::test]
async fn test_failed_refresh_of_ready_folder_is_silent() {
    let h = Harness::new();
    let view = h.load_root().await;
    let (prefetcher, mut rx) = prefetcher(&h);
    let docs = resource(&view, "d-docs");

    prefetcher.hover(&root_scope(), &docs);
    prefetcher.settle().await;
    assert_eq!(drain(&mut rx).len(), 2);

    h.state.cache.invalidate_knowledge_base(KB);
    h.backend.fail(Operation::ListIndexedResources);
    let calls = h.backend.calls(Operation::ListIndexedResources);

    assert!(prefetcher.hover(&root_scope(), &docs));
    prefetcher.settle().await;
    assert_eq!(h.backend.calls(Operation::ListIndexedResources), calls + 1);
    assert!(drain(&mut rx).is_empty());
}
