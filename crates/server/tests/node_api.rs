mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestFixture;
use encodefleet_core::{JobRequest, JobStatus};

fn registration(id: &str, max_jobs: u32) -> serde_json::Value {
    json!({
        "id": id,
        "name": format!("{} encoder", id),
        "version": "1.2.0",
        "address": "10.0.0.7",
        "port": 9100,
        "max_concurrent_jobs": max_jobs,
        "encoders": ["h264", "aac"]
    })
}

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_exposes_sections() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/config").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["server"]["port"], 8080);
    assert_eq!(response.body["registry"]["heartbeat_interval_secs"], 10);
    assert!(response.body["local_node"].is_object());
}

#[tokio::test]
async fn test_register_and_get_node() {
    let fixture = TestFixture::new().await;

    let response = fixture.post("/api/v1/nodes", registration("gpu-1", 4)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["id"], "gpu-1");
    assert_eq!(response.body["active"], true);
    assert_eq!(response.body["current_jobs"], 0);
    assert_eq!(response.body["max_concurrent_jobs"], 4);

    let response = fixture.get("/api/v1/nodes/gpu-1").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["address"], "10.0.0.7");
    assert_eq!(response.body["encoders"], json!(["h264", "aac"]));

    let response = fixture.get("/api/v1/nodes").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["active"], 1);
    assert_eq!(response.body["inactive"], 0);
    assert_eq!(response.body["nodes"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_register_rejects_zero_capacity() {
    let fixture = TestFixture::new().await;
    let response = fixture.post("/api/v1/nodes", registration("gpu-1", 0)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("max_concurrent_jobs"));
}

#[tokio::test]
async fn test_get_unknown_node() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/nodes/missing").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_heartbeat_records_health() {
    let fixture = TestFixture::new().await;
    fixture.post("/api/v1/nodes", registration("gpu-1", 2)).await;

    let response = fixture
        .post(
            "/api/v1/nodes/gpu-1/heartbeat",
            json!({
                "node_id": "gpu-1",
                "health": {
                    "timestamp": "2026-01-01T00:00:00Z",
                    "cpu_percent": 42.5,
                    "active_jobs": 1
                }
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["health"]["cpu_percent"], 42.5);
    assert_eq!(response.body["health"]["active_jobs"], 1);
    // Reported job counts never feed the capacity counter.
    assert_eq!(response.body["current_jobs"], 0);
}

#[tokio::test]
async fn test_heartbeat_unknown_node() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post("/api/v1/nodes/ghost/heartbeat", json!({ "node_id": "ghost" }))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_heartbeat_id_mismatch() {
    let fixture = TestFixture::new().await;
    fixture.post("/api/v1/nodes", registration("gpu-1", 2)).await;
    let response = fixture
        .post("/api/v1/nodes/gpu-1/heartbeat", json!({ "node_id": "gpu-2" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deregister_then_reregister() {
    let fixture = TestFixture::new().await;
    fixture.post("/api/v1/nodes", registration("gpu-1", 2)).await;

    let response = fixture.delete("/api/v1/nodes/gpu-1").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["active"], false);

    // A heartbeat does not bring the node back.
    let response = fixture
        .post("/api/v1/nodes/gpu-1/heartbeat", json!({ "node_id": "gpu-1" }))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["active"], false);

    let response = fixture.post("/api/v1/nodes", registration("gpu-1", 2)).await;
    assert_eq!(response.body["active"], true);

    let response = fixture.delete("/api/v1/nodes/unknown").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_capabilities_software_only() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/capabilities").await;
    assert_eq!(response.status, StatusCode::OK);

    let video: Vec<&str> = response.body["video_encoders"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert!(video.contains(&"h264"));
    assert!(!video.contains(&"h264_nvenc"));

    let response = fixture.get("/api/v1/hardware").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["accelerators"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_capabilities_with_gpu() {
    let fixture = TestFixture::with_nvidia().await;
    let response = fixture.get("/api/v1/capabilities").await;
    let hardware: Vec<&str> = response.body["video_encoders"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["hardware"] == true)
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert!(hardware.contains(&"h264_nvenc"));

    let response = fixture.get("/api/v1/hardware").await;
    assert_eq!(response.body["accelerators"][0]["vendor"], "nvidia");
}

#[tokio::test]
async fn test_registered_node_runs_jobs_and_status_reports_them() {
    let fixture = TestFixture::new().await;
    fixture
        .post(
            "/api/v1/nodes",
            json!({ "id": "n1", "name": "n1", "address": "127.0.0.1", "port": 0, "max_concurrent_jobs": 2 }),
        )
        .await;

    let job_id = fixture
        .orchestrator
        .submit(JobRequest::new("/media/input.mkv", fixture.temp_dir.path()))
        .await
        .unwrap();
    let job = fixture.orchestrator.wait(job_id).await.unwrap();
    assert_eq!(job.status(), JobStatus::Completed);
    assert!(fixture.runner.attempts().iter().all(|a| a.node_id == "n1"));

    let response = fixture.get("/api/v1/status").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["nodes_active"], 1);
    assert_eq!(response.body["jobs"]["completed"], 1);

    let (status, text) = fixture.get_text("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("encodefleet_jobs_by_status{status=\"completed\"} 1"));
    assert!(text.contains("encodefleet_http_requests_total"));
}
