//! Read-only web dashboard and Prometheus counter sink. Consumes the
//! engine's query surface only; no mutations are exposed here.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::scheduler::JobState;
use crate::store::{QueueMetrics, StateCounts, Store};

/// Heartbeats older than this no longer count a worker as active.
const WORKER_STALE_SECS: i64 = 10;

#[derive(Clone)]
pub struct DashboardState {
    pub store: Arc<Mutex<Store>>,
}

#[derive(Serialize)]
struct JobResponse {
    id: String,
    command: String,
    state: String,
    attempts: u32,
    max_retries: u32,
    priority: i64,
    created_at: String,
    updated_at: String,
    run_at: Option<String>,
    next_retry_at: Option<String>,
    completed_at: Option<String>,
    error_message: Option<String>,
    duration_ms: Option<i64>,
}

#[derive(Serialize)]
struct StatusResponse {
    counts: StateCounts,
    total: u64,
    active_workers: u64,
    metrics: QueueMetrics,
}

#[derive(Serialize)]
struct WorkerResponse {
    id: String,
    pid: i64,
    started_at: String,
    last_heartbeat: String,
    stopped_at: Option<String>,
    status: &'static str,
}

#[derive(Deserialize)]
pub struct JobsQuery {
    state: Option<String>,
    limit: Option<usize>,
}

pub fn router(state: DashboardState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/api/jobs", get(list_jobs_handler))
        .route("/api/status", get(status_handler))
        .route("/api/workers", get(list_workers_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn run_dashboard(addr: SocketAddr, state: DashboardState) {
    let app = router(state);

    tracing::info!(addr = %addr, "starting dashboard server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "failed to bind dashboard server");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "dashboard server failed");
    }
}

pub async fn index_handler() -> Html<&'static str> {
    Html(include_str!("index.html"))
}

pub async fn list_jobs_handler(
    State(state): State<DashboardState>,
    Query(query): Query<JobsQuery>,
) -> Result<Json<Vec<JobResponse>>, (StatusCode, String)> {
    let filter = match query.state.as_deref() {
        Some(raw) => Some(
            JobState::from_str(raw)
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
        ),
        None => None,
    };
    let store = state.store.lock().await;
    let jobs = store
        .list(filter, query.limit)
        .map_err(internal_error)?
        .into_iter()
        .map(|job| JobResponse {
            id: job.id,
            command: job.command,
            state: job.state.to_string(),
            attempts: job.attempts,
            max_retries: job.max_retries,
            priority: job.priority,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
            run_at: job.run_at.map(|t| t.to_rfc3339()),
            next_retry_at: job.next_retry_at.map(|t| t.to_rfc3339()),
            completed_at: job.completed_at.map(|t| t.to_rfc3339()),
            error_message: job.error_message,
            duration_ms: job.duration_ms,
        })
        .collect();
    Ok(Json(jobs))
}

pub async fn status_handler(
    State(state): State<DashboardState>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let now = Utc::now();
    let store = state.store.lock().await;
    let counts = store.counts_by_state().map_err(internal_error)?;
    let active_workers = store
        .active_workers(now, WORKER_STALE_SECS)
        .map_err(internal_error)?;
    let metrics = store.metrics(now).map_err(internal_error)?;
    Ok(Json(StatusResponse {
        counts,
        total: counts.total(),
        active_workers,
        metrics,
    }))
}

pub async fn list_workers_handler(
    State(state): State<DashboardState>,
) -> Result<Json<Vec<WorkerResponse>>, (StatusCode, String)> {
    let now = Utc::now();
    let store = state.store.lock().await;
    let workers = store
        .list_workers()
        .map_err(internal_error)?
        .into_iter()
        .map(|w| {
            let status = if w.is_active(now, WORKER_STALE_SECS) {
                "active"
            } else if w.stopped_at.is_some() {
                "stopped"
            } else {
                "stale"
            };
            WorkerResponse {
                id: w.id,
                pid: w.pid,
                started_at: w.started_at.to_rfc3339(),
                last_heartbeat: w.last_heartbeat.to_rfc3339(),
                stopped_at: w.stopped_at.map(|t| t.to_rfc3339()),
                status,
            }
        })
        .collect();
    Ok(Json(workers))
}

pub async fn metrics_handler(
    State(state): State<DashboardState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let now = Utc::now();
    let store = state.store.lock().await;
    let counts = store.counts_by_state().map_err(internal_error)?;
    let active_workers = store
        .active_workers(now, WORKER_STALE_SECS)
        .map_err(internal_error)?;
    let metrics = store.metrics(now).map_err(internal_error)?;
    Ok((
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        render_metrics(&counts, active_workers, &metrics),
    ))
}

/// Prometheus text exposition of the queue gauges and counters.
pub fn render_metrics(counts: &StateCounts, active_workers: u64, metrics: &QueueMetrics) -> String {
    let mut lines = Vec::new();
    lines.push("# HELP queue_jobs_total Number of jobs by state".to_string());
    lines.push("# TYPE queue_jobs_total gauge".to_string());
    for state in JobState::ALL {
        let count = match state {
            JobState::Pending => counts.pending,
            JobState::Processing => counts.processing,
            JobState::Completed => counts.completed,
            JobState::Failed => counts.failed,
            JobState::Dead => counts.dead,
        };
        lines.push(format!("queue_jobs_total{{state=\"{state}\"}} {count}"));
    }

    lines.push("# HELP queue_active_workers Active workers based on recent heartbeats".to_string());
    lines.push("# TYPE queue_active_workers gauge".to_string());
    lines.push(format!("queue_active_workers {active_workers}"));

    lines.push(
        "# HELP queue_avg_duration_ms Average job duration over last 20 completed jobs".to_string(),
    );
    lines.push("# TYPE queue_avg_duration_ms gauge".to_string());
    lines.push(format!(
        "queue_avg_duration_ms {}",
        metrics.avg_duration_ms.unwrap_or(0)
    ));

    lines.push(
        "# HELP queue_completed_last_min Number of jobs completed in the last minute".to_string(),
    );
    lines.push("# TYPE queue_completed_last_min counter".to_string());
    lines.push(format!(
        "queue_completed_last_min {}",
        metrics.completed_last_min
    ));

    lines.join("\n") + "\n"
}

fn internal_error(e: crate::error::QueueError) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
