//! Common test utilities for HTTP API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! backed by a real orchestrator with mock runner, prober and hardware probe,
//! so the API can be exercised without ffmpeg installed.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use encodefleet_core::testing::{MockTaskRunner, StaticAcceleratorProbe, StaticMediaProber};
use encodefleet_core::{
    Config, GpuAccelerator, GpuVendor, HardwareAcceleratorService, InMemoryJobStore,
    InMemoryProfileRepository, NodeRegistry, TranscodeOrchestrator,
};
use encodefleet_server::state::AppState;

/// Re-export fixtures for test convenience
#[allow(unused_imports)]
pub use encodefleet_core::testing::fixtures;

/// In-process server with controllable dependencies.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub orchestrator: Arc<TranscodeOrchestrator>,
    pub runner: Arc<MockTaskRunner>,
    /// Scratch directory for job outputs
    #[allow(dead_code)]
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Software-only fixture.
    pub async fn new() -> Self {
        Self::with_accelerators(Vec::new()).await
    }

    /// Fixture whose hardware probe reports `gpus`.
    pub async fn with_accelerators(gpus: Vec<GpuAccelerator>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.server.host = std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);
        config.dispatcher.poll_interval_ms = 20;

        let hardware = Arc::new(HardwareAcceleratorService::new(Arc::new(
            StaticAcceleratorProbe::new(gpus),
        )));
        let registry = Arc::new(NodeRegistry::new(&config.registry));
        let runner = Arc::new(MockTaskRunner::new().with_outputs(2, 6.0));
        let orchestrator = Arc::new(TranscodeOrchestrator::new(
            &config,
            registry,
            Arc::new(InMemoryProfileRepository::with_builtin().await),
            Arc::clone(&hardware),
            Arc::new(StaticMediaProber::new(fixtures::probed_input_simple())),
            Arc::clone(&runner) as Arc<dyn encodefleet_core::TaskRunner>,
            Arc::new(InMemoryJobStore::new()),
        ));

        let state = Arc::new(AppState::new(config, Arc::clone(&orchestrator), hardware));
        let router = encodefleet_server::api::create_router(state);

        Self {
            router,
            orchestrator,
            runner,
            temp_dir,
        }
    }

    /// Fixture with one NVIDIA GPU.
    #[allow(dead_code)]
    pub async fn with_nvidia() -> Self {
        Self::with_accelerators(vec![GpuAccelerator::new(GpuVendor::Nvidia, "RTX 4070")]).await
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a DELETE request.
    #[allow(dead_code)]
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Raw text body of a GET, for non-JSON endpoints.
    #[allow(dead_code)]
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
