use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::checker::NetProber;
use crate::engine::{self, Engine};
use crate::models::{CheckResult, StatusSnapshot, Target};
use crate::registry::{FileStore, Registry, RegistryError, TargetDraft};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine<NetProber>>,
    pub registry: Arc<Mutex<Registry<FileStore>>>,
}

type ApiError = (StatusCode, String);

fn registry_error(err: RegistryError) -> ApiError {
    match err {
        RegistryError::IndexOutOfRange(_) => (StatusCode::NOT_FOUND, err.to_string()),
        RegistryError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        _ => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
    }
}

async fn get_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.engine.get_full_status().await)
}

#[derive(Deserialize)]
struct QueryParams {
    q: String,
}

#[derive(Serialize)]
struct QueryResponse {
    summary: String,
    results: Vec<CheckResult>,
}

async fn query_status(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Json<QueryResponse> {
    let targets = state.engine.targets().await;
    let matched = engine::match_query(&params.q, &targets).cloned();

    // No match falls back to a full status sweep.
    let (selected, single) = match matched {
        Some(target) => (vec![target], true),
        None => (targets, false),
    };
    let results = state.engine.check_targets(&selected).await;

    let summary = if single {
        engine::describe(&results[0])
    } else {
        engine::summarize(&results)
    };
    Json(QueryResponse { summary, results })
}

async fn list_targets(State(state): State<AppState>) -> Json<Vec<Target>> {
    Json(state.registry.lock().await.list())
}

async fn add_target(
    State(state): State<AppState>,
    Json(draft): Json<TargetDraft>,
) -> Result<Json<Target>, ApiError> {
    let registry = state.registry.lock().await;
    let target = registry.add(draft).map_err(registry_error)?;
    state.engine.update_servers(registry.load()).await;
    Ok(Json(target))
}

async fn update_target(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Json(draft): Json<TargetDraft>,
) -> Result<Json<Target>, ApiError> {
    let registry = state.registry.lock().await;
    let target = registry.update(index, draft).map_err(registry_error)?;
    state.engine.update_servers(registry.load()).await;
    Ok(Json(target))
}

async fn delete_target(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<Target>, ApiError> {
    let registry = state.registry.lock().await;
    let removed = registry.delete(index).map_err(registry_error)?;
    state.engine.update_servers(registry.load()).await;
    Ok(Json(removed))
}

async fn test_target(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<CheckResult>, ApiError> {
    let target = {
        let registry = state.registry.lock().await;
        registry.get(index).map_err(registry_error)?
    };
    Ok(Json(state.engine.check_one(&target).await))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/query", get(query_status))
        .route("/api/targets", get(list_targets).post(add_target))
        .route(
            "/api/targets/{index}",
            axum::routing::put(update_target).delete(delete_target),
        )
        .route("/api/targets/{index}/test", post(test_target))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(port: u16, state: AppState) {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("API listening on http://localhost:{}", addr.port());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind API port");
    axum::serve(listener, app).await.expect("API server failed");
}
