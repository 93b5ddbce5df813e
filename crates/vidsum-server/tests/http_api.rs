//! HTTP-level tests for the control plane.
//!
//! Each test builds the full router over a scratch SQLite database with
//! stubbed pipeline stages, then drives it with in-process requests.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::Router;
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use vidsum_core::{
    DbType, Pipeline, RecentViewStore, StatusUpdate, TaskStatus, TaskStore,
};
use vidsum_server::router::build_router;
use vidsum_server::state::{AppState, ProviderError, Settings, StoreProvider};
use vidsum_store_sqlite::SqliteTaskStore;
use vidsum_testing::{
    RecordingNotifier, RecordingSink, StubDownloader, StubSummarizer, StubTranscriber,
    STUB_SUMMARY, STUB_TITLE,
};

const ADMIN_TOKEN: &str = "maintainer-secret";
const VIDEO_URL: &str = "https://youtu.be/dQw4w9WgXcQ";
const CANONICAL_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

struct SqliteOnlyProvider {
    sqlite: Arc<dyn TaskStore>,
}

impl StoreProvider for SqliteOnlyProvider {
    fn store(&self, db_type: DbType) -> Result<Arc<dyn TaskStore>, ProviderError> {
        match db_type {
            DbType::Sqlite => Ok(Arc::clone(&self.sqlite)),
            DbType::Notion => Err(ProviderError::ConfigMissing(
                "NOTION_API_KEY, NOTION_DATABASE_ID".to_string(),
            )),
        }
    }
}

struct TestApp {
    router: Router,
    store: SqliteTaskStore,
    notifier: Arc<RecordingNotifier>,
    _dir: tempfile::TempDir,
}

async fn build_app() -> TestApp {
    build_app_with_token(Some(ADMIN_TOKEN)).await
}

async fn build_app_with_token(admin_token: Option<&str>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteTaskStore::connect(&dir.path().join("tasks.db"))
        .await
        .unwrap();

    let pipeline = Pipeline {
        downloader: Arc::new(StubDownloader::new()),
        transcriber: Arc::new(StubTranscriber::new()),
        summarizer: Arc::new(StubSummarizer),
        sink: Arc::new(RecordingSink::with_page_id("page-1")),
    };
    let notifier = Arc::new(RecordingNotifier::new());

    let state = AppState {
        stores: Arc::new(SqliteOnlyProvider {
            sqlite: Arc::new(store.clone()),
        }),
        pipeline,
        notifier: notifier.clone(),
        history: Arc::new(RecentViewStore::new(dir.path().join("recent.json"))),
        settings: Arc::new(Settings {
            task_lease_secs: 60,
            global_lock_secs: 1800,
            refresh_interval_secs: 1,
            admin_token: admin_token.map(str::to_string),
            summaries_dir: None,
            page_base_url: Some("https://pages.example".to_string()),
        }),
    };

    TestApp {
        router: build_router(state),
        store,
        notifier,
        _dir: dir,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn maintainer(mut request: Request<Body>, token: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert("x-maintainer-token", token.parse().unwrap());
    request
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_task_processes_it_end_to_end() {
    let app = build_app().await;

    let (status, body) = send(
        &app.router,
        json_request("POST", "/tasks", &json!({ "url": VIDEO_URL })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "Pending");
    assert_eq!(body["db_type"], "sqlite");
    assert_eq!(body["processing_started"], true);
    assert!(!body["processing_worker_id"].as_str().unwrap().is_empty());
    let task_id = body["task_id"].as_str().unwrap().to_string();

    // The background worker finishes shortly after the response.
    let mut waited = 0;
    while app.notifier.count() == 0 && waited < 100 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += 1;
    }
    assert_eq!(app.notifier.count(), 1);

    let task = app.store.task(&task_id).await.unwrap().unwrap();
    assert_eq!(task.url, CANONICAL_URL);
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.title, STUB_TITLE);
    assert_eq!(task.summary, STUB_SUMMARY);
    assert_eq!(task.external_page_id.as_deref(), Some("page-1"));
    assert!(task.processing_duration.unwrap() >= 0.0);
    assert!(task.worker_id.is_none());
    assert!(task.locked_at.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_task_rejects_invalid_urls() {
    let app = build_app().await;
    let (status, body) = send(
        &app.router,
        json_request("POST", "/tasks", &json!({ "url": "https://example.com/video" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_db_type_is_unprocessable() {
    let app = build_app().await;
    let (status, _body) = send(
        &app.router,
        json_request(
            "POST",
            "/tasks",
            &json!({ "url": VIDEO_URL, "db_type": "postgres" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unconfigured_backend_is_a_bad_request() {
    let app = build_app().await;
    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/tasks",
            &json!({ "url": VIDEO_URL, "db_type": "notion" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("NOTION_API_KEY"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn retry_clones_the_failed_task_and_marks_the_source() {
    let app = build_app().await;
    let source = app.store.add_task(CANONICAL_URL).await.unwrap();
    app.store
        .update_status(
            &source.id,
            TaskStatus::Failed,
            StatusUpdate {
                error_message: Some("boom".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            &format!("/tasks/{}/retry", source.id),
            &json!({ "db_type": "sqlite" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["source_task_id"], source.id.as_str());
    assert_eq!(body["status"], "Pending");
    let clone_id = body["task_id"].as_str().unwrap().to_string();
    assert_ne!(clone_id, source.id);

    let clone = app.store.task(&clone_id).await.unwrap().unwrap();
    assert_eq!(clone.url, source.url);
    assert_eq!(clone.retry_of_task_id.as_deref(), Some(source.id.as_str()));
    assert_eq!(clone.retry_reason, "boom");

    let marked = app.store.task(&source.id).await.unwrap().unwrap();
    assert_eq!(marked.status, TaskStatus::FailedRetryCreated);

    // A second retry attempt hits the Failed-only guard.
    let (status, _body) = send(
        &app.router,
        json_request(
            "POST",
            &format!("/tasks/{}/retry", source.id),
            &json!({ "db_type": "sqlite" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn retry_of_missing_task_is_not_found() {
    let app = build_app().await;
    let (status, _body) = send(
        &app.router,
        json_request("POST", "/tasks/9999/retry", &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn processing_job_conflicts_while_another_worker_holds_the_lock() {
    let app = build_app().await;
    assert!(app.store.acquire_lock("other-worker", 1800).await.unwrap());

    let (status, _body) = send(
        &app.router,
        json_request("POST", "/processing-jobs", &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.store.release_lock("other-worker").await.unwrap();
    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/processing-jobs",
            &json!({ "worker_id": "drain-now" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["accepted"], true);
    assert_eq!(body["worker_id"], "drain-now");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lock_endpoints_enforce_the_maintainer_token() {
    let app = build_app().await;

    let (status, _) = send(&app.router, get_request("/processing-lock")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app.router,
        maintainer(get_request("/processing-lock"), "wrong-token"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let unconfigured = build_app_with_token(None).await;
    let (status, _) = send(
        &unconfigured.router,
        maintainer(get_request("/processing-lock"), ADMIN_TOKEN),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lock_status_reports_the_holder_and_staleness() {
    let app = build_app().await;
    assert!(app.store.acquire_lock("stuck-worker", 1800).await.unwrap());

    let (status, body) = send(
        &app.router,
        maintainer(get_request("/processing-lock?db_type=sqlite"), ADMIN_TOKEN),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["snapshot"]["worker_id"], "stuck-worker");
    assert_eq!(body["snapshot"]["stale"], false);
    assert!(body["snapshot"]["age_seconds"].as_f64().unwrap() >= 0.0);

    app.store.rewind_global_lock(3600).await.unwrap();
    let (_, body) = send(
        &app.router,
        maintainer(get_request("/processing-lock?db_type=sqlite"), ADMIN_TOKEN),
    )
    .await;
    assert_eq!(body["snapshot"]["stale"], true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn forced_release_requires_the_age_threshold() {
    let app = build_app().await;
    assert!(app.store.acquire_lock("stuck-worker", 1800).await.unwrap());

    let release = json!({ "force": true, "force_threshold_seconds": 60 });
    let (status, _body) = send(
        &app.router,
        maintainer(
            json_request("DELETE", "/processing-lock", &release),
            ADMIN_TOKEN,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        app.store.read_lock().await.unwrap().worker_id.as_deref(),
        Some("stuck-worker")
    );

    app.store.rewind_global_lock(120).await.unwrap();
    let (status, body) = send(
        &app.router,
        maintainer(
            json_request("DELETE", "/processing-lock", &release),
            ADMIN_TOKEN,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released"], true);
    assert_eq!(body["before"]["worker_id"], "stuck-worker");
    assert!(body["after"]["worker_id"].is_null());

    let (_, body) = send(
        &app.router,
        maintainer(get_request("/processing-lock"), ADMIN_TOKEN),
    )
    .await;
    assert!(body["snapshot"]["worker_id"].is_null());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scoped_release_checks_the_expected_holder() {
    let app = build_app().await;
    assert!(app.store.acquire_lock("worker-a", 1800).await.unwrap());

    // Dry run reports without mutating.
    let (status, body) = send(
        &app.router,
        maintainer(
            json_request("DELETE", "/processing-lock", &json!({ "dry_run": true })),
            ADMIN_TOKEN,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released"], false);
    assert_eq!(body["reason"], "dry_run");

    let (status, _body) = send(
        &app.router,
        maintainer(
            json_request(
                "DELETE",
                "/processing-lock",
                &json!({ "expected_worker_id": "worker-b" }),
            ),
            ADMIN_TOKEN,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app.router,
        maintainer(
            json_request(
                "DELETE",
                "/processing-lock",
                &json!({ "expected_worker_id": "worker-a", "reason": "stale deploy" }),
            ),
            ADMIN_TOKEN,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released"], true);
    assert_eq!(body["reason"], "stale deploy");
    assert!(app.store.read_lock().await.unwrap().worker_id.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn releasing_an_absent_lock_reports_lock_not_found() {
    let app = build_app().await;
    let (status, body) = send(
        &app.router,
        maintainer(
            json_request("DELETE", "/processing-lock", &json!({ "force": true })),
            ADMIN_TOKEN,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released"], false);
    assert_eq!(body["reason"], "lock_not_found");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn queue_stats_reflect_the_store() {
    let app = build_app().await;
    app.store.add_task(CANONICAL_URL).await.unwrap();
    let failed = app.store.add_task(CANONICAL_URL).await.unwrap();
    app.store
        .update_status(&failed.id, TaskStatus::Failed, StatusUpdate::default())
        .await
        .unwrap();

    let (status, body) = send(&app.router, get_request("/queue-stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["counts"]["pending"], 1);
    assert_eq!(body["counts"]["failed"], 1);

    let (status, body) = send(&app.router, get_request("/tasks")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn recent_views_record_and_list_breadcrumbs() {
    let app = build_app().await;
    let task = app.store.add_task(CANONICAL_URL).await.unwrap();
    app.store
        .update_status(
            &task.id,
            TaskStatus::Completed,
            StatusUpdate {
                title: Some("A Video".to_string()),
                external_page_id: Some("abcd-1234".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/recent-views",
            &json!({ "client_id": "client-1", "task_id": task.id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "A Video");
    assert_eq!(body["page_url"], "https://pages.example/abcd1234");

    let (status, body) = send(
        &app.router,
        get_request("/recent-views?client_id=client-1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], task.id.as_str());

    // Unknown clients see nothing; unknown tasks cannot be recorded.
    let (_, body) = send(&app.router, get_request("/recent-views?client_id=other")).await;
    assert!(body.as_array().unwrap().is_empty());

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/recent-views",
            &json!({ "client_id": "client-1", "task_id": "9999" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn get_task_round_trips_the_canonical_url() {
    let app = build_app().await;
    let task = app.store.add_task(CANONICAL_URL).await.unwrap();

    let (status, body) = send(&app.router, get_request(&format!("/tasks/{}", task.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], CANONICAL_URL);

    let (status, _) = send(&app.router, get_request("/tasks/123456")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
