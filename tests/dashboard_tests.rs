mod test_harness;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::ServiceExt;

use queuectl::dashboard::{render_metrics, router, DashboardState};
use queuectl::scheduler::RunDetails;
use queuectl::store::{QueueMetrics, StateCounts};
use test_harness::{enqueue, test_db, TestDb};

fn dashboard_state(db: &TestDb) -> DashboardState {
    DashboardState {
        store: Arc::new(Mutex::new(db.store())),
    }
}

async fn get(state: DashboardState, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_index_returns_html() {
    let db = test_db();
    let (status, body) = get(dashboard_state(&db), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&body).contains("QueueCTL"));
}

#[tokio::test]
async fn test_api_jobs_lists_and_filters() {
    let db = test_db();
    let mut store = db.store();
    enqueue(&mut store, "j1", "true");
    enqueue(&mut store, "j2", "true");
    store.claim_next(Utc::now()).unwrap().unwrap();

    let (status, body) = get(dashboard_state(&db), "/api/jobs").await;
    assert_eq!(status, StatusCode::OK);
    let jobs: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(jobs.as_array().unwrap().len(), 2);

    let (status, body) = get(dashboard_state(&db), "/api/jobs?state=processing").await;
    assert_eq!(status, StatusCode::OK);
    let jobs: Value = serde_json::from_slice(&body).unwrap();
    let jobs = jobs.as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["id"], "j1");
    assert_eq!(jobs[0]["state"], "processing");

    let (status, body) = get(dashboard_state(&db), "/api/jobs?limit=1").await;
    assert_eq!(status, StatusCode::OK);
    let jobs: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(jobs.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_api_jobs_rejects_bad_state() {
    let db = test_db();
    let (status, _) = get(dashboard_state(&db), "/api/jobs?state=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_status_reports_counts() {
    let db = test_db();
    let mut store = db.store();
    enqueue(&mut store, "j1", "true");
    store.claim_next(Utc::now()).unwrap().unwrap();
    store
        .finalize_success(
            "j1",
            Utc::now(),
            &RunDetails {
                last_stdout: None,
                last_stderr: None,
                duration_ms: Some(50),
            },
        )
        .unwrap();

    let (status, body) = get(dashboard_state(&db), "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["counts"]["completed"], 1);
    assert_eq!(parsed["total"], 1);
    assert_eq!(parsed["metrics"]["avg_duration_ms"], 50);
}

#[tokio::test]
async fn test_api_workers() {
    let db = test_db();
    let mut store = db.store();
    store.register_worker("w1", 42, Utc::now()).unwrap();

    let (status, body) = get(dashboard_state(&db), "/api/workers").await;
    assert_eq!(status, StatusCode::OK);
    let workers: Value = serde_json::from_slice(&body).unwrap();
    let workers = workers.as_array().unwrap();
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0]["id"], "w1");
    assert_eq!(workers[0]["status"], "active");
}

#[tokio::test]
async fn test_metrics_exposition() {
    let db = test_db();
    let mut store = db.store();
    enqueue(&mut store, "j1", "true");

    let (status, body) = get(dashboard_state(&db), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("queue_jobs_total{state=\"pending\"} 1"));
    assert!(text.contains("queue_jobs_total{state=\"dead\"} 0"));
    assert!(text.contains("queue_active_workers 0"));
}

#[test]
fn test_render_metrics_format() {
    let counts = StateCounts {
        pending: 2,
        processing: 1,
        completed: 5,
        failed: 0,
        dead: 1,
    };
    let metrics = QueueMetrics {
        avg_duration_ms: Some(120),
        completed_last_min: 3,
    };
    let text = render_metrics(&counts, 2, &metrics);
    assert!(text.contains("# TYPE queue_jobs_total gauge"));
    assert!(text.contains("queue_jobs_total{state=\"completed\"} 5"));
    assert!(text.contains("queue_active_workers 2"));
    assert!(text.contains("queue_avg_duration_ms 120"));
    assert!(text.contains("queue_completed_last_min 3"));
    assert!(text.ends_with('\n'));
}
