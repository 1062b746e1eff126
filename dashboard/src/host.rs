use std::{
    io::ErrorKind,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Path as UrlPath, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use camper_common::{
    Clock, Engine, Enqueue, FetchKind, HistoryQueryParams, MonotonicClock, PollConfig,
    PollSchedule, PollTask, RuntimeConfig, SensorReadings,
};

use crate::http::ReqwestTransport;

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    api_base: Arc<str>,
    started_at: Instant,
}

struct ConfigStore {
    runtime_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusView {
    running: bool,
    api_base: String,
    uptime_ms: u64,
    now_epoch: i64,
    pending_fetches: usize,
    pending_actions: usize,
    history_query: Option<HistoryQueryParams>,
    readings: SensorReadings,
}

#[derive(Debug, Serialize)]
struct QueuedResponse {
    request: String,
    outcome: &'static str,
}

#[derive(Debug, Deserialize)]
struct ActionUpdate {
    entity: String,
    status: String,
}

/// The sync worker does blocking I/O on its own thread, so it is started
/// before the tokio runtime exists and stopped after the runtime is gone.
pub fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = ConfigStore::new();
    let mut config = store.load_runtime_config().unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    apply_overrides(
        &mut config,
        std::env::var("CAMPER_API_BASE").ok(),
        std::env::var("DASHBOARD_HTTP_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok()),
    );
    config.sanitize();

    let transport = Arc::new(ReqwestTransport::new()?);
    let engine = Arc::new(Engine::new(&config, transport));
    engine.start().context("failed to start sync worker")?;
    info!("syncing from {}", config.api.base_url);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let served = runtime.block_on(serve(&config, Arc::clone(&engine)));
    drop(runtime);

    engine.stop();
    info!("dashboard stopped");
    served
}

async fn serve(config: &RuntimeConfig, engine: Arc<Engine>) -> anyhow::Result<()> {
    spawn_poll_loop(Arc::clone(&engine), config.poll.clone());

    let app_state = AppState {
        engine,
        api_base: Arc::from(config.api.base_url.as_str()),
        started_at: Instant::now(),
    };

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/camper", get(handle_get_camper))
        .route("/api/climate/inside", get(handle_get_inside_climate))
        .route("/api/climate/outside", get(handle_get_outside_climate))
        .route("/api/solar", get(handle_get_smart_solar))
        .route("/api/shunt", get(handle_get_smart_shunt))
        .route(
            "/api/history",
            get(handle_get_history).post(handle_post_history),
        )
        .route("/api/fetch/{kind}", post(handle_post_fetch))
        .route("/api/action", post(handle_post_action))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind dashboard server at {addr}"))?;

    info!("dashboard listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn spawn_poll_loop(engine: Arc<Engine>, poll: PollConfig) {
    tokio::spawn(async move {
        let clock = MonotonicClock::new();
        let mut schedule = PollSchedule::from_config(&poll);
        let mut interval = tokio::time::interval(Duration::from_millis(poll.tick_ms));

        loop {
            interval.tick().await;
            for task in schedule.due(clock.now_ms()) {
                dispatch_poll_task(&engine, task);
            }
        }
    });
}

fn dispatch_poll_task(engine: &Engine, task: PollTask) {
    match task {
        PollTask::Fetch(kind) => {
            engine.enqueue_fetch(kind);
        }
        PollTask::History(query) => {
            engine.request_entity_history(
                &query.sensor_name,
                &query.entity_name,
                &query.interval_label,
                query.sample_count,
            );
        }
    }
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let engine = &state.engine;
    Json(StatusView {
        running: engine.is_running(),
        api_base: state.api_base.to_string(),
        uptime_ms: state
            .started_at
            .elapsed()
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX),
        now_epoch: Utc::now().timestamp(),
        pending_fetches: engine.pending_fetches(),
        pending_actions: engine.pending_actions(),
        history_query: engine.history_query(),
        readings: engine.get_readings(),
    })
}

async fn handle_get_camper(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.get_camper_data())
}

async fn handle_get_inside_climate(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.get_inside_climate_data())
}

async fn handle_get_outside_climate(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.get_outside_climate_data())
}

async fn handle_get_smart_solar(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.get_smart_solar_data())
}

async fn handle_get_smart_shunt(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.get_smart_shunt_data())
}

async fn handle_get_history(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.get_history())
}

async fn handle_post_fetch(
    State(state): State<AppState>,
    UrlPath(kind): UrlPath<String>,
) -> impl IntoResponse {
    let Some(kind) = FetchKind::parse(&kind) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown fetch kind");
    };
    if kind == FetchKind::EntityHistory && state.engine.history_query().is_none() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "No history query set; use POST /api/history",
        );
    }

    queued_response(kind.as_str(), state.engine.enqueue_fetch(kind))
}

async fn handle_post_history(
    State(state): State<AppState>,
    Json(query): Json<HistoryQueryParams>,
) -> impl IntoResponse {
    if let Err(message) = validate_history_query(&query) {
        return error_response(StatusCode::BAD_REQUEST, message);
    }

    let queued = state.engine.request_entity_history(
        &query.sensor_name,
        &query.entity_name,
        &query.interval_label,
        query.sample_count,
    );
    let outcome = if queued {
        Enqueue::Queued
    } else {
        Enqueue::Duplicate
    };
    queued_response(FetchKind::EntityHistory.as_str(), outcome)
}

async fn handle_post_action(
    State(state): State<AppState>,
    Json(update): Json<ActionUpdate>,
) -> impl IntoResponse {
    let entity = update.entity.trim();
    let status = update.status.trim();
    if entity.is_empty() || status.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "entity and status are required");
    }

    queued_response(
        &format!("{entity} -> {status}"),
        state.engine.enqueue_action(entity, status),
    )
}

impl ConfigStore {
    fn new() -> Self {
        let data_dir = std::env::var("CAMPER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.camper"));
        Self::at(&data_dir)
    }

    fn at(data_dir: &Path) -> Self {
        Self {
            runtime_path: data_dir.join("runtime.json"),
        }
    }

    fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        match std::fs::read(&self.runtime_path) {
            Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
                .with_context(|| format!("invalid {}", self.runtime_path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }
}

fn apply_overrides(config: &mut RuntimeConfig, api_base: Option<String>, port: Option<u16>) {
    if let Some(api_base) = api_base.filter(|value| !value.trim().is_empty()) {
        config.api.base_url = api_base;
    }
    if let Some(port) = port {
        config.http.port = port;
    }
}

fn validate_history_query(query: &HistoryQueryParams) -> Result<(), &'static str> {
    if query.sensor_name.trim().is_empty() {
        return Err("sensorName cannot be empty");
    }
    if query.entity_name.trim().is_empty() {
        return Err("entityName cannot be empty");
    }
    if query.interval_label.trim().is_empty() {
        return Err("interval cannot be empty");
    }
    if query.sample_count == 0 {
        return Err("samples must be greater than 0");
    }
    Ok(())
}

fn queued_status(outcome: Enqueue) -> (StatusCode, &'static str) {
    match outcome {
        Enqueue::Queued => (StatusCode::ACCEPTED, "queued"),
        Enqueue::Duplicate => (StatusCode::CONFLICT, "duplicate"),
        Enqueue::Full => (StatusCode::CONFLICT, "full"),
    }
}

fn queued_response(request: &str, outcome: Enqueue) -> axum::response::Response {
    let (status, label) = queued_status(outcome);
    (
        status,
        Json(QueuedResponse {
            request: request.to_string(),
            outcome: label,
        }),
    )
        .into_response()
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
