use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};
use tempfile::TempDir;

use clipdock_server::{AppState, Config, build_app_state, create_app};

struct TestApp {
    server: TestServer,
    state: AppState,
    source_dir: PathBuf,
    _tempdir: TempDir,
}

async fn build_test_app() -> Result<TestApp> {
    let tempdir = tempfile::tempdir()?;
    let source_dir = tempdir.path().join("incoming");
    fs::create_dir(&source_dir)?;

    let config = Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        state_path: tempdir.path().join("state.toml"),
        downloads_dir: None,
        dev_mode: true,
        ingest: Default::default(),
    };

    let state = build_app_state(config).await?;
    let server = TestServer::new(create_app(state.clone()))
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;

    Ok(TestApp {
        server,
        state,
        source_dir,
        _tempdir: tempdir,
    })
}

async fn create_target(app: &TestApp) -> Result<String> {
    let response = app
        .server
        .post("/api/v1/targets")
        .json(&json!({
            "sourceDir": app.source_dir,
            "projectPath": "/edit/show.prproj",
            "binPath": "Footage",
            "consumer": "premiere"
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    Ok(body["data"]["id"].as_str().expect("target id").to_string())
}

async fn report_active(app: &TestApp, project: &str) {
    let response = app
        .server
        .post("/active-project")
        .json(&json!({ "projectPath": project }))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn health_reports_ok() -> Result<()> {
    let app = build_test_app().await?;
    let response = app.server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn submitted_job_round_trips_through_poll_and_result() -> Result<()> {
    let app = build_test_app().await?;

    let submit = app
        .server
        .post("/jobs")
        .json(&json!({
            "id": uuid::Uuid::now_v7(),
            "projectPath": "/edit/show.prproj",
            "binPath": "Footage",
            "files": ["/in/a.wav"],
            "consumer": "premiere",
            "createdAt": chrono::Utc::now()
        }))
        .await;
    submit.assert_status_ok();
    let submitted: Value = submit.json();
    assert_eq!(submitted["status"], "accepted");

    // Without an active report the poll withholds the job.
    let empty = app.server.get("/jobs/next").await;
    empty.assert_status_ok();
    assert_eq!(empty.json::<Value>(), json!({}));

    report_active(&app, "/edit/show.prproj").await;
    let poll = app.server.get("/jobs/next").await;
    poll.assert_status_ok();
    let job: Value = poll.json();
    assert_eq!(job["projectPath"], "/edit/show.prproj");
    assert_eq!(job["files"][0], "/in/a.wav");
    let job_id = job["id"].as_str().expect("job id").to_string();

    let result = app
        .server
        .post(&format!("/jobs/{job_id}/result"))
        .json(&json!({
            "jobId": job_id,
            "success": true,
            "imported": ["/in/a.wav"],
            "failed": []
        }))
        .await;
    result.assert_status_ok();
    assert_eq!(result.json::<Value>()["status"], "received");

    // Delivered and acknowledged; nothing left to poll.
    report_active(&app, "/edit/show.prproj").await;
    let drained = app.server.get("/jobs/next").await;
    assert_eq!(drained.json::<Value>(), json!({}));
    Ok(())
}

#[tokio::test]
async fn poll_withholds_jobs_for_other_projects() -> Result<()> {
    let app = build_test_app().await?;

    app.server
        .post("/jobs")
        .json(&json!({
            "id": uuid::Uuid::now_v7(),
            "projectPath": "/edit/show.prproj",
            "binPath": "Footage",
            "files": ["/in/a.wav"],
            "consumer": "premiere",
            "createdAt": chrono::Utc::now()
        }))
        .await
        .assert_status_ok();

    report_active(&app, "/edit/other.prproj").await;
    let poll = app.server.get("/jobs/next").await;
    assert_eq!(poll.json::<Value>(), json!({}));
    Ok(())
}

#[tokio::test]
async fn result_with_mismatched_path_id_is_rejected() -> Result<()> {
    let app = build_test_app().await?;
    let response = app
        .server
        .post(&format!("/jobs/{}/result", uuid::Uuid::now_v7()))
        .json(&json!({
            "jobId": uuid::Uuid::now_v7(),
            "success": true,
            "imported": [],
            "failed": []
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn malformed_job_submission_is_rejected() -> Result<()> {
    let app = build_test_app().await?;

    // Missing required fields.
    let missing = app
        .server
        .post("/jobs")
        .json(&json!({ "binPath": "Footage" }))
        .await;
    missing.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    // Structurally valid but empty file list.
    let empty_files = app
        .server
        .post("/jobs")
        .json(&json!({
            "id": uuid::Uuid::now_v7(),
            "projectPath": "/edit/show.prproj",
            "binPath": "Footage",
            "files": [],
            "consumer": "premiere",
            "createdAt": chrono::Utc::now()
        }))
        .await;
    empty_files.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn unknown_consumer_in_path_is_rejected() -> Result<()> {
    let app = build_test_app().await?;
    let response = app.server.get("/jobs/photoshop/next").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn active_project_report_echoes_normalized_path() -> Result<()> {
    let app = build_test_app().await?;
    let response = app
        .server
        .post("/active-project")
        .json(&json!({ "projectPath": "/edit/./show.prproj" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["projectPath"], "/edit/show.prproj");
    Ok(())
}

#[tokio::test]
async fn target_lifecycle_via_admin_api() -> Result<()> {
    let app = build_test_app().await?;
    let id = create_target(&app).await?;

    let list = app.server.get("/api/v1/targets").await;
    list.assert_status_ok();
    let body: Value = list.json();
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    app.server
        .post(&format!("/api/v1/targets/{id}/start"))
        .await
        .assert_status_ok();
    app.server
        .post(&format!("/api/v1/targets/{id}/stop"))
        .await
        .assert_status_ok();

    let delete = app.server.delete(&format!("/api/v1/targets/{id}")).await;
    delete.assert_status_ok();

    let drained = app.server.get("/api/v1/targets").await;
    let body: Value = drained.json();
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn resync_queues_folder_contents_once() -> Result<()> {
    let app = build_test_app().await?;
    fs::write(app.source_dir.join("clip.mov"), b"media bytes")?;
    let id = create_target(&app).await?;

    let resync = app
        .server
        .post(&format!("/api/v1/targets/{id}/resync"))
        .await;
    resync.assert_status_ok();
    let body: Value = resync.json();
    assert_eq!(body["data"], json!(1));

    report_active(&app, "/edit/show.prproj").await;
    let poll = app.server.get("/jobs/next").await;
    let job: Value = poll.json();
    assert_eq!(job["binPath"], "Footage");
    assert_eq!(job["pendingHashes"].as_array().map(Vec::len), Some(1));

    // Acknowledge, then a second resync finds nothing new.
    let job_id = job["id"].as_str().expect("job id").to_string();
    let imported = job["files"].clone();
    app.server
        .post(&format!("/jobs/{job_id}/result"))
        .json(&json!({
            "jobId": job_id,
            "success": true,
            "imported": imported,
            "failed": []
        }))
        .await
        .assert_status_ok();

    let again = app
        .server
        .post(&format!("/api/v1/targets/{id}/resync"))
        .await;
    let body: Value = again.json();
    assert_eq!(body["data"], json!(0));

    app.state.sync_engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unknown_target_operations_return_not_found() -> Result<()> {
    let app = build_test_app().await?;
    let missing = uuid::Uuid::now_v7();

    app.server
        .post(&format!("/api/v1/targets/{missing}/resync"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .delete(&format!("/api/v1/targets/{missing}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    Ok(())
}
