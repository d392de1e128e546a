use super::test_helpers::*;
use crate::db::{ClaimOutcome, JobCheckpoint};
use crate::error::{Error, SourceError};
use crate::source::SourceRegistry;
use crate::types::{BookId, Event, JobStatus, SourceId, StartOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[tokio::test]
async fn download_completes_and_reports_full_progress() {
    let source = ScriptedSource::new(1, "alpha", 25);
    let ctx = create_test_downloader(single_source_registry(source), |_| {}).await;

    let mut events = ctx.downloader.subscribe();
    let outcome = ctx
        .downloader
        .start_download(start_request(100, 1))
        .await
        .unwrap();
    assert_eq!(outcome, StartOutcome::Started);

    let terminal = wait_for_terminal(&mut events).await;
    assert!(
        matches!(
            terminal,
            Event::DownloadComplete {
                completed_units: 25,
                total_units: 25,
                ..
            }
        ),
        "unexpected terminal event: {:?}",
        terminal
    );

    // Reconciler view: terminal checkpoint persisted, cache cleared
    let view = ctx.downloader.progress(BookId(100)).await.unwrap();
    assert_eq!(view.status, JobStatus::Completed);
    assert_eq!(view.downloaded_chapters, 25);
    assert_eq!(view.total_chapters, 25);
    assert_eq!(view.progress, 100);

    // Store row is terminal and complete
    let row = ctx.downloader.db.get_job(BookId(100)).await.unwrap().unwrap();
    assert_eq!(row.status, JobStatus::Completed.to_i32());
    assert_eq!(row.completed_units, 25);
    assert_eq!(row.is_complete, 1);

    // Every chapter reached the content store
    assert_eq!(ctx.store.units.lock().unwrap().len(), 25);
    assert!(ctx.store.infos.lock().unwrap().contains_key(&100));
}

#[tokio::test]
async fn second_start_while_active_is_idempotent() {
    // Gate with no permits: the first fetch blocks, keeping the job active
    let gate = Arc::new(Semaphore::new(0));
    let source = ScriptedSource::new(1, "alpha", 5).with_gate(gate.clone());
    let ctx = create_test_downloader(single_source_registry(source), |_| {}).await;

    let first = ctx
        .downloader
        .start_download(start_request(100, 1))
        .await
        .unwrap();
    assert_eq!(first, StartOutcome::Started);

    // Give the orchestrator time to claim and block on the gate
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = ctx
        .downloader
        .start_download(start_request(100, 1))
        .await
        .unwrap();
    assert_eq!(
        second,
        StartOutcome::AlreadyActive,
        "a second start must not spawn a second orchestrator"
    );

    // Release the gate so the job can finish
    let mut events = ctx.downloader.subscribe();
    gate.add_permits(64);
    wait_for_terminal(&mut events).await;
}

#[tokio::test]
async fn transient_fetch_failures_are_retried() {
    // First 2 fetch calls fail transiently; retry budget is 2, so chapter 1
    // succeeds on its third attempt
    let source = ScriptedSource::new(1, "alpha", 3).with_behavior(FetchBehavior::FailFirst(2));
    let ctx = create_test_downloader(single_source_registry(source), |_| {}).await;

    let mut events = ctx.downloader.subscribe();
    ctx.downloader
        .start_download(start_request(100, 1))
        .await
        .unwrap();

    let terminal = wait_for_terminal(&mut events).await;
    assert!(
        matches!(terminal, Event::DownloadComplete { .. }),
        "transient failures within the retry budget must not fail the job"
    );
}

#[tokio::test]
async fn persistent_fetch_failure_fails_the_job() {
    // Unit index 2 (chapter 3) is gone for good
    let source = ScriptedSource::new(1, "alpha", 5).with_behavior(FetchBehavior::FailUnit(2));
    let ctx = create_test_downloader(single_source_registry(source), |_| {}).await;

    let mut events = ctx.downloader.subscribe();
    ctx.downloader
        .start_download(start_request(100, 1))
        .await
        .unwrap();

    let terminal = wait_for_terminal(&mut events).await;
    let Event::DownloadFailed { error, .. } = terminal else {
        panic!("expected DownloadFailed, got {:?}", terminal);
    };
    assert!(error.contains("chapter 3"), "error should name the chapter: {error}");

    let view = ctx.downloader.progress(BookId(100)).await.unwrap();
    assert_eq!(view.status, JobStatus::Failed);
    assert_eq!(view.downloaded_chapters, 2, "chapters before the failure stay counted");
    assert!(view.message.is_some());

    let row = ctx.downloader.db.get_job(BookId(100)).await.unwrap().unwrap();
    assert_eq!(row.status, JobStatus::Failed.to_i32());
    assert!(row.last_error.unwrap().contains("chapter 3"));
}

#[tokio::test]
async fn empty_chapter_list_fails_the_job() {
    let source = ScriptedSource::new(1, "alpha", 0);
    let ctx = create_test_downloader(single_source_registry(source), |_| {}).await;

    let mut events = ctx.downloader.subscribe();
    ctx.downloader
        .start_download(start_request(100, 1))
        .await
        .unwrap();

    let terminal = wait_for_terminal(&mut events).await;
    assert!(matches!(terminal, Event::DownloadFailed { .. }));

    let view = ctx.downloader.progress(BookId(100)).await.unwrap();
    assert_eq!(view.status, JobStatus::Failed);
}

#[tokio::test]
async fn unknown_source_is_rejected_at_start() {
    let source = ScriptedSource::new(1, "alpha", 5);
    let ctx = create_test_downloader(single_source_registry(source), |_| {}).await;

    let err = ctx
        .downloader
        .start_download(start_request(100, 99))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Source(SourceError::NotFound { id: 99 })
    ));
}

#[tokio::test]
async fn start_is_refused_during_shutdown() {
    let source = ScriptedSource::new(1, "alpha", 5);
    let ctx = create_test_downloader(single_source_registry(source), |_| {}).await;

    ctx.downloader.shutdown().await.unwrap();

    let err = ctx
        .downloader
        .start_download(start_request(100, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ShuttingDown));
}

#[tokio::test]
async fn checkpoints_land_every_interval() {
    // Meter fetches through a gate: release exactly 10 units, then inspect
    // the store before letting the rest through.
    let gate = Arc::new(Semaphore::new(0));
    let source = ScriptedSource::new(1, "alpha", 25).with_gate(gate.clone());
    let ctx = create_test_downloader(single_source_registry(source), |config| {
        config.download.checkpoint_interval = 10;
    })
    .await;

    ctx.downloader
        .start_download(start_request(100, 1))
        .await
        .unwrap();

    gate.add_permits(10);

    // Wait until the 10-unit checkpoint is visible in the store
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let row = ctx.downloader.db.get_job(BookId(100)).await.unwrap().unwrap();
        if row.completed_units == 10 {
            assert_eq!(row.status, JobStatus::Downloading.to_i32());
            assert_eq!(row.total_units, 25);
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "checkpoint at 10 units never appeared (store shows {})",
            row.completed_units
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // Release the rest and confirm the final checkpoint
    let mut events = ctx.downloader.subscribe();
    gate.add_permits(64);
    wait_for_terminal(&mut events).await;

    let row = ctx.downloader.db.get_job(BookId(100)).await.unwrap().unwrap();
    assert_eq!(row.completed_units, 25);
    assert_eq!(row.status, JobStatus::Completed.to_i32());
}

// ---------------------------------------------------------------------------
// State reconciler
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resolve_prefers_cache_over_store() {
    let source = ScriptedSource::new(1, "alpha", 5);
    let ctx = create_test_downloader(single_source_registry(source), |_| {}).await;
    let downloader = &ctx.downloader;

    // Store says 10/25; this process's cache says 12/25 (fresher by
    // construction: the cache is written before each checkpoint)
    downloader.db.upsert_job(&crate::db::NewJob {
        book_id: BookId(7),
        book_name: Some("Cached Book".to_string()),
        book_author: None,
        book_cover_url: None,
        source_id: 1,
        book_url: "https://example.com/book/7".to_string(),
        variables: None,
    })
    .await
    .unwrap();
    downloader
        .db
        .claim_job(BookId(7), Duration::from_secs(600))
        .await
        .unwrap();
    downloader
        .db
        .checkpoint_job(
            BookId(7),
            &JobCheckpoint {
                completed_units: 10,
                total_units: 25,
                status: JobStatus::Downloading,
                last_error: None,
            },
        )
        .await
        .unwrap();

    downloader
        .cache
        .update(BookId(7), |snapshot| {
            snapshot.completed_units = 12;
            snapshot.total_units = 25;
        })
        .await;

    let view = downloader.progress(BookId(7)).await.unwrap();
    assert_eq!(
        view.downloaded_chapters, 12,
        "resolve must never be staler than the local cache"
    );
    assert_eq!(view.progress, 48);
    assert_eq!(
        view.book_name,
        Some("Cached Book".to_string()),
        "metadata is enriched from the store row"
    );
}

#[tokio::test]
async fn resolve_falls_back_to_store_without_cache() {
    let source = ScriptedSource::new(1, "alpha", 5);
    let ctx = create_test_downloader(single_source_registry(source), |_| {}).await;
    let downloader = &ctx.downloader;

    downloader.db.upsert_job(&crate::db::NewJob {
        book_id: BookId(8),
        book_name: Some("Other Worker's Book".to_string()),
        book_author: None,
        book_cover_url: None,
        source_id: 1,
        book_url: "https://example.com/book/8".to_string(),
        variables: None,
    })
    .await
    .unwrap();
    downloader
        .db
        .claim_job(BookId(8), Duration::from_secs(600))
        .await
        .unwrap();
    downloader
        .db
        .checkpoint_job(
            BookId(8),
            &JobCheckpoint {
                completed_units: 10,
                total_units: 25,
                status: JobStatus::Downloading,
                last_error: None,
            },
        )
        .await
        .unwrap();

    let view = downloader.progress(BookId(8)).await.unwrap();
    assert_eq!(view.status, JobStatus::Downloading);
    assert_eq!(view.downloaded_chapters, 10);
    assert_eq!(view.progress, 40);
    assert_eq!(
        view.message,
        Some("Downloading chapter 11".to_string()),
        "store-only views report the next chapter in flight"
    );
}

#[tokio::test]
async fn resolve_synthesizes_not_started_for_unknown_book() {
    let source = ScriptedSource::new(1, "alpha", 5);
    let ctx = create_test_downloader(single_source_registry(source), |_| {}).await;

    let view = ctx.downloader.progress(BookId(424242)).await.unwrap();
    assert_eq!(view.status, JobStatus::NotStarted);
    assert_eq!(view.total_chapters, 0);
    assert_eq!(view.downloaded_chapters, 0);
    assert_eq!(view.progress, 0);
    assert!(view.message.is_none());
}

#[tokio::test]
async fn active_downloads_unions_cache_and_store() {
    let source = ScriptedSource::new(1, "alpha", 5);
    let ctx = create_test_downloader(single_source_registry(source), |_| {}).await;
    let downloader = &ctx.downloader;

    // Job 1: owned by this process (cache + store), cache is fresher
    downloader.db.upsert_job(&crate::db::NewJob {
        book_id: BookId(1),
        book_name: Some("Mine".to_string()),
        book_author: None,
        book_cover_url: None,
        source_id: 1,
        book_url: "https://example.com/book/1".to_string(),
        variables: None,
    })
    .await
    .unwrap();
    downloader
        .db
        .claim_job(BookId(1), Duration::from_secs(600))
        .await
        .unwrap();
    downloader
        .db
        .checkpoint_job(
            BookId(1),
            &JobCheckpoint {
                completed_units: 4,
                total_units: 20,
                status: JobStatus::Downloading,
                last_error: None,
            },
        )
        .await
        .unwrap();
    downloader
        .cache
        .update(BookId(1), |snapshot| {
            snapshot.completed_units = 6;
            snapshot.total_units = 20;
        })
        .await;

    // Job 2: owned by some other worker (store only)
    downloader.db.upsert_job(&crate::db::NewJob {
        book_id: BookId(2),
        book_name: Some("Theirs".to_string()),
        book_author: None,
        book_cover_url: None,
        source_id: 1,
        book_url: "https://example.com/book/2".to_string(),
        variables: None,
    })
    .await
    .unwrap();
    downloader
        .db
        .claim_job(BookId(2), Duration::from_secs(600))
        .await
        .unwrap();
    downloader
        .db
        .checkpoint_job(
            BookId(2),
            &JobCheckpoint {
                completed_units: 9,
                total_units: 30,
                status: JobStatus::Downloading,
                last_error: None,
            },
        )
        .await
        .unwrap();

    let mut views = downloader.active_downloads().await.unwrap();
    views.sort_by_key(|v| v.book_id.get());

    assert_eq!(views.len(), 2);
    assert_eq!(
        views[0].downloaded_chapters, 6,
        "owned job reports the fresher cached count"
    );
    assert_eq!(
        views[1].downloaded_chapters, 9,
        "foreign job reports checkpoint-granularity progress"
    );
}

// ---------------------------------------------------------------------------
// Claim interplay with the orchestrator
// ---------------------------------------------------------------------------

#[tokio::test]
async fn foreign_claim_blocks_local_start() {
    let source = ScriptedSource::new(1, "alpha", 5);
    let ctx = create_test_downloader(single_source_registry(source), |_| {}).await;
    let downloader = &ctx.downloader;

    // Simulate another worker holding the claim
    downloader.db.upsert_job(&crate::db::NewJob {
        book_id: BookId(50),
        book_name: None,
        book_author: None,
        book_cover_url: None,
        source_id: 1,
        book_url: "https://example.com/book/50".to_string(),
        variables: None,
    })
    .await
    .unwrap();
    let outcome = downloader
        .db
        .claim_job(BookId(50), Duration::from_secs(600))
        .await
        .unwrap();
    assert_eq!(outcome, ClaimOutcome::Claimed);

    let start = downloader
        .start_download(start_request(50, 1))
        .await
        .unwrap();
    assert_eq!(
        start,
        StartOutcome::AlreadyActive,
        "a claim held elsewhere must report already-in-progress here"
    );
}

// ---------------------------------------------------------------------------
// Search entry points
// ---------------------------------------------------------------------------

#[tokio::test]
async fn gather_search_combines_batches() {
    let mut alpha = ScriptedSource::new(1, "alpha", 0);
    alpha.search_results = vec![sample_result("rust and friends", 1, "alpha")];
    let mut beta = ScriptedSource::new(2, "beta", 0);
    beta.search_results = vec![
        sample_result("rust at work", 2, "beta"),
        sample_result("more rust", 2, "beta"),
    ];

    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(alpha));
    registry.register(Arc::new(beta));
    let ctx = create_test_downloader(registry, |_| {}).await;

    let results = ctx.downloader.search("rust", 1, None).await;
    assert_eq!(results.len(), 3);
}

#[tokio::test]
async fn search_by_source_rejects_unknown_id() {
    let source = ScriptedSource::new(1, "alpha", 0);
    let ctx = create_test_downloader(single_source_registry(source), |_| {}).await;

    let err = ctx
        .downloader
        .search_by_source(SourceId(9), "rust", 1)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Source(SourceError::NotFound { id: 9 })));
}

fn sample_result(name: &str, source_id: i64, source_name: &str) -> crate::types::SearchResult {
    crate::types::SearchResult {
        name: name.to_string(),
        author: None,
        book_url: format!("https://example.com/{}", name.replace(' ', "-")),
        cover_url: None,
        intro: None,
        kind: None,
        last_chapter: None,
        word_count: None,
        source_id: SourceId(source_id),
        source_name: source_name.to_string(),
        variables: crate::types::Variables::new(),
    }
}
