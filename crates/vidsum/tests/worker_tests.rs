//! Worker-loop behavior tests over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use vidsum_testing::{
    MemoryTaskStore, RecordingNotifier, RecordingSink, StubDownloader, StubSummarizer,
    StubTranscriber, STUB_SUMMARY, STUB_TITLE,
};

use vidsum_core::{Pipeline, ProcessingWorker, TaskStatus, TaskStore, WorkerOptions};

fn stub_pipeline() -> Pipeline {
    Pipeline {
        downloader: Arc::new(StubDownloader::new()),
        transcriber: Arc::new(StubTranscriber::new()),
        summarizer: Arc::new(StubSummarizer),
        sink: Arc::new(RecordingSink::with_page_id("page-1")),
    }
}

fn fast_options(worker_id: &str) -> WorkerOptions {
    WorkerOptions {
        worker_id: Some(worker_id.to_string()),
        task_lease_secs: 60,
        global_lock_secs: 60,
        refresh_interval_secs: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn drains_queue_and_notifies_per_completed_task() {
    let store = Arc::new(MemoryTaskStore::new());
    store
        .add_task("https://www.youtube.com/watch?v=stubvideo01")
        .await
        .unwrap();
    store
        .add_task("https://www.youtube.com/watch?v=stubvideo02")
        .await
        .unwrap();

    let notifier = Arc::new(RecordingNotifier::new());
    let worker = ProcessingWorker::new(
        store.clone(),
        stub_pipeline(),
        notifier.clone(),
        fast_options("worker-test"),
    );
    let summary = worker.run().await;

    assert!(summary.acquired_lock);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed, 0);

    for task in store.all_tasks().await.unwrap() {
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.title, STUB_TITLE);
        assert_eq!(task.summary, STUB_SUMMARY);
        assert_eq!(task.external_page_id.as_deref(), Some("page-1"));
        assert!(task.processing_duration.unwrap() >= 0.0);
        assert!(task.worker_id.is_none());
        assert!(task.locked_at.is_none());
    }
    assert_eq!(notifier.count(), 2);

    // The loop released its lock on exit.
    assert!(store.read_lock().await.unwrap().worker_id.is_none());
}

#[tokio::test]
async fn continues_after_mid_pipeline_failure() {
    let store = Arc::new(MemoryTaskStore::new());
    let failing = store
        .add_task("https://www.youtube.com/watch?v=failvideo01")
        .await
        .unwrap();
    store
        .add_task("https://www.youtube.com/watch?v=stubvideo02")
        .await
        .unwrap();

    let pipeline = Pipeline {
        transcriber: Arc::new(StubTranscriber::new().failing_on("failvideo01")),
        ..stub_pipeline()
    };
    let notifier = Arc::new(RecordingNotifier::new());
    let worker = ProcessingWorker::new(
        store.clone(),
        pipeline,
        notifier.clone(),
        fast_options("worker-flaky"),
    );
    let summary = worker.run().await;

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);

    let failed = store.task(&failing.id).await.unwrap().unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    assert!(!failed.error_message.is_empty());
    assert!(failed.processing_duration.is_some());
    assert!(failed.worker_id.is_none());

    let ok = store.task("2").await.unwrap().unwrap();
    assert_eq!(ok.status, TaskStatus::Completed);

    // Only the completed task produced a notification.
    assert_eq!(notifier.count(), 1);
    assert_eq!(
        notifier.calls()[0].1,
        "https://www.youtube.com/watch?v=stubvideo02"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_worker_is_rejected_while_lock_is_held() {
    let store = Arc::new(MemoryTaskStore::new());
    store
        .add_task("https://www.youtube.com/watch?v=stubvideo01")
        .await
        .unwrap();

    let notifier = Arc::new(RecordingNotifier::new());
    let pipeline = Pipeline {
        downloader: Arc::new(
            StubDownloader::new().with_delay(Duration::from_millis(300)),
        ),
        ..stub_pipeline()
    };
    let worker_a = ProcessingWorker::new(
        store.clone(),
        pipeline,
        notifier.clone(),
        fast_options("worker-a"),
    );
    let handle = tokio::spawn(async move { worker_a.run().await });

    // Wait until A visibly owns the global lock, then contend.
    loop {
        if store.read_lock().await.unwrap().worker_id.as_deref() == Some("worker-a") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let worker_b = ProcessingWorker::new(
        store.clone(),
        stub_pipeline(),
        notifier.clone(),
        fast_options("worker-b"),
    );
    let summary_b = worker_b.run().await;
    assert!(!summary_b.acquired_lock);
    assert_eq!(summary_b.processed, 0);
    assert_eq!(summary_b.failed, 0);

    let summary_a = handle.await.unwrap();
    assert!(summary_a.acquired_lock);
    assert_eq!(summary_a.processed, 1);
}

#[tokio::test]
async fn expired_global_lock_is_taken_over() {
    let store = Arc::new(MemoryTaskStore::new());
    assert!(store.acquire_lock("worker-gone", 60).await.unwrap());
    assert!(!store.acquire_lock("worker-new", 60).await.unwrap());

    store.rewind_global_lock(120);
    assert!(store.acquire_lock("worker-new", 60).await.unwrap());
    assert_eq!(
        store.read_lock().await.unwrap().worker_id.as_deref(),
        Some("worker-new")
    );
}

#[tokio::test]
async fn stalled_claim_is_reprocessed_by_next_worker() {
    let store = Arc::new(MemoryTaskStore::new());
    let task = store
        .add_task("https://www.youtube.com/watch?v=stubvideo01")
        .await
        .unwrap();

    // Worker A claims the row and then "crashes" without releasing.
    let claimed = store.acquire_next("worker-a", 60).await.unwrap().unwrap();
    assert_eq!(claimed.id, task.id);
    store.rewind_task_lease(&task.id, 600);

    let notifier = Arc::new(RecordingNotifier::new());
    let worker_b = ProcessingWorker::new(
        store.clone(),
        stub_pipeline(),
        notifier.clone(),
        fast_options("worker-b"),
    );
    let summary = worker_b.run().await;

    assert_eq!(summary.processed, 1);
    let finished = store.task(&task.id).await.unwrap().unwrap();
    assert_eq!(finished.status, TaskStatus::Completed);
    assert_eq!(notifier.count(), 1);
}

#[tokio::test]
async fn claim_failure_ends_the_run_and_releases_the_lock() {
    let store = Arc::new(MemoryTaskStore::new());
    store
        .add_task("https://www.youtube.com/watch?v=stubvideo01")
        .await
        .unwrap();
    store.fail_claims(true);

    let notifier = Arc::new(RecordingNotifier::new());
    let worker = ProcessingWorker::new(
        store.clone(),
        stub_pipeline(),
        notifier,
        fast_options("worker-err"),
    );
    let summary = worker.run().await;

    assert!(summary.acquired_lock);
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.failed, 0);
    assert!(store.read_lock().await.unwrap().worker_id.is_none());
}

#[tokio::test]
async fn assigns_a_random_worker_id_when_absent() {
    let store = Arc::new(MemoryTaskStore::new());
    let worker = ProcessingWorker::new(
        store,
        stub_pipeline(),
        Arc::new(RecordingNotifier::new()),
        WorkerOptions::default(),
    );
    assert!(worker.worker_id().starts_with("worker-"));
}
