use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use encodefleet_core::{CapabilityReport, GpuAccelerator};

use crate::state::AppState;

#[derive(Serialize)]
pub struct HardwareResponse {
    pub accelerators: Vec<GpuAccelerator>,
}

/// Encoders and containers this deployment can target.
pub async fn get_capabilities(State(state): State<Arc<AppState>>) -> Json<CapabilityReport> {
    Json(state.hardware().capability_report().await)
}

pub async fn list_hardware(State(state): State<Arc<AppState>>) -> Json<HardwareResponse> {
    Json(HardwareResponse {
        accelerators: state.hardware().list_accelerators().await.to_vec(),
    })
}
