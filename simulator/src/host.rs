use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::sim::{ActionError, Simulator};

type SharedSimulator = Arc<Mutex<Simulator>>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    period: String,
    samples: usize,
}

#[derive(Debug, Deserialize)]
struct ActionBody {
    state: String,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let port = std::env::var("SIMULATOR_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8000);

    let simulator: SharedSimulator = Arc::new(Mutex::new(Simulator::default()));
    spawn_drift_loop(Arc::clone(&simulator));

    let app = Router::new()
        .route("/sensors/{sensor}/states/", get(handle_get_states))
        .route(
            "/grouped_states_by_name/{sensor}/{entity}",
            get(handle_get_history),
        )
        .route("/action_by_name/camper/{entity}", post(handle_post_action))
        .layer(TraceLayer::new_for_http())
        .with_state(simulator);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind simulator at {addr}"))?;

    info!("simulator listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for ctrl-c: {err}");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}

fn spawn_drift_loop(simulator: SharedSimulator) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(2));
        loop {
            interval.tick().await;
            simulator.lock().advance();
        }
    });
}

async fn handle_get_states(
    State(simulator): State<SharedSimulator>,
    Path(sensor): Path<String>,
) -> impl IntoResponse {
    match simulator.lock().sensor_states(&sensor) {
        Some(states) => Json(states).into_response(),
        None => error_response(StatusCode::NOT_FOUND, &format!("Unknown sensor '{sensor}'")),
    }
}

async fn handle_get_history(
    State(simulator): State<SharedSimulator>,
    Path((sensor, entity)): Path<(String, String)>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    if params.period.trim().is_empty() || params.samples == 0 {
        return error_response(StatusCode::BAD_REQUEST, "period and samples are required");
    }

    let history = simulator
        .lock()
        .history(&sensor, &entity, params.period.trim(), params.samples);
    match history {
        Some(document) => Json(document).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            &format!("No numeric history for {sensor}/{entity}"),
        ),
    }
}

async fn handle_post_action(
    State(simulator): State<SharedSimulator>,
    Path(entity): Path<String>,
    Json(body): Json<ActionBody>,
) -> impl IntoResponse {
    let applied = simulator.lock().apply_action(&entity, &body.state);
    match applied {
        Ok(on) => {
            info!("camper {entity} switched {}", if on { "on" } else { "off" });
            Json(serde_json::json!({ "entity_name": entity, "state": body.state.trim() }))
                .into_response()
        }
        Err(ActionError::UnknownEntity) => error_response(
            StatusCode::NOT_FOUND,
            &format!("Unknown camper entity '{entity}'"),
        ),
        Err(ActionError::EmptyState) => {
            error_response(StatusCode::BAD_REQUEST, "state cannot be empty")
        }
    }
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
