//! Node-facing registry endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use encodefleet_core::{EncoderNode, NodeHealth, NodeRegistration, RegistryError};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct NodeErrorResponse {
    pub error: String,
}

/// Body of `POST /nodes/{id}/heartbeat`.
#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub node_id: String,
    #[serde(default)]
    pub health: Option<NodeHealth>,
}

#[derive(Debug, Serialize)]
pub struct ListNodesResponse {
    pub nodes: Vec<EncoderNode>,
    pub active: usize,
    pub inactive: usize,
}

fn error_response(err: RegistryError) -> (StatusCode, Json<NodeErrorResponse>) {
    let status = match err {
        RegistryError::UnknownNode { .. } => StatusCode::NOT_FOUND,
        RegistryError::InvalidRegistration { .. } => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(NodeErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Register (or re-register) a node
pub async fn register_node(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NodeRegistration>,
) -> Result<Json<EncoderNode>, impl IntoResponse> {
    match state.registry().register(body).await {
        Ok(node) => Ok(Json(node)),
        Err(e) => Err(error_response(e)),
    }
}

pub async fn list_nodes(State(state): State<Arc<AppState>>) -> Json<ListNodesResponse> {
    let nodes = state.registry().list().await;
    let active = nodes.iter().filter(|n| n.active).count();
    Json(ListNodesResponse {
        inactive: nodes.len() - active,
        active,
        nodes,
    })
}

pub async fn get_node(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<EncoderNode>, impl IntoResponse> {
    match state.registry().get(&id).await {
        Some(node) => Ok(Json(node)),
        None => Err(error_response(RegistryError::unknown_node(id))),
    }
}

/// Record a heartbeat. The reply carries `active`, so a node swept as stale
/// learns it has to register again.
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<HeartbeatRequest>,
) -> Result<Json<EncoderNode>, impl IntoResponse> {
    if body.node_id != id {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(NodeErrorResponse {
                error: format!("Heartbeat for {} sent to /nodes/{}", body.node_id, id),
            }),
        ));
    }

    debug!(node_id = %id, "Heartbeat received");
    match state.registry().heartbeat(&id, body.health).await {
        Ok(node) => Ok(Json(node)),
        Err(e) => Err(error_response(e)),
    }
}

/// Mark a node inactive. Tasks already running on it are left alone.
pub async fn deregister_node(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<EncoderNode>, impl IntoResponse> {
    match state.registry().deregister(&id).await {
        Ok(node) => Ok(Json(node)),
        Err(e) => Err(error_response(e)),
    }
}
