use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{deployment_state_item, DeploymentStateSpec, FormalItem, FormalItemList};
use crate::metrics::{exposition, MetricsRegistry};
use crate::state::StateStore;

/// Read-only handles shared with the HTTP handlers.
#[derive(Clone)]
pub struct ApiState {
    pub state: Arc<StateStore>,
    pub metrics: Arc<MetricsRegistry>,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    start: Option<usize>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/deployment_states", get(list_states))
        .route("/api/deployment_states/:name", get(get_state))
        .route("/metrics", get(metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `host:port`, resolving hostnames and accepting bare IPv6 literals such as `::`.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed binding REST API to {host} port {port}"))?;
    Ok(listener)
}

pub async fn run_server(
    state: ApiState,
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    info!("REST API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn list_states(
    State(state): State<ApiState>,
    Query(page): Query<PageQuery>,
) -> Json<FormalItemList<FormalItem<DeploymentStateSpec>>> {
    let mut records = state.state.list();
    records.sort_by(|a, b| a.name.cmp(&b.name));
    let items = records.iter().map(deployment_state_item).collect();
    Json(FormalItemList::paginate(items, page.start, page.limit))
}

async fn get_state(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<FormalItem<DeploymentStateSpec>>, ApiError> {
    match state.state.get(&name) {
        Some(record) => Ok(Json(deployment_state_item(&record))),
        None => Err(ApiError::not_found(format!(
            "State named \"{name}\" not found"
        ))),
    }
}

async fn metrics(State(state): State<ApiState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, exposition::CONTENT_TYPE)],
        state.metrics.render(),
    )
}
