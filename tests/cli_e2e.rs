//! End-to-end CLI tests for the assemblyline binary.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A command isolated from the developer's own config and environment.
fn isolated_cmd(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("assemblyline").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env_remove("ASSEMBLYLINE_URL")
        .env_remove("ASSEMBLYLINE_USER")
        .env_remove("ASSEMBLYLINE_APIKEY")
        .env_remove("ASSEMBLYLINE_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

async fn file_info_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/file/info/abc/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "api_error_message": "",
            "api_response": {"sha256": "abc", "size": 42},
            "api_status_code": 200
        })))
        .mount(&server)
        .await;
    server
}

#[test]
fn test_binary_help_displays_usage() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Assemblyline"))
        .stdout(predicate::str::contains("hash-search"));
}

#[test]
fn test_binary_version_displays_version() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("assemblyline"));
}

#[test]
fn test_binary_missing_subcommand_returns_error() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(dir.path()).assert().failure();
}

#[test]
fn test_binary_without_url_reports_missing_config() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(dir.path())
        .args(["-q", "login"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing config value `url`"));
}

#[test]
fn test_binary_rejects_invalid_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "read_timeout_secs = 0\n").unwrap();
    isolated_cmd(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("login")
        .assert()
        .failure()
        .stderr(predicate::str::contains("read_timeout_secs"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_file_info_prints_pretty_json() {
    let server = file_info_server().await;
    let dir = TempDir::new().unwrap();
    let mut cmd = isolated_cmd(dir.path());
    cmd.args(["-q", "file-info", "abc", "--url", &server.uri()])
        .args(["--user", "admin", "--apikey", "devkey"]);

    tokio::task::spawn_blocking(move || {
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("\"sha256\": \"abc\""))
            .stdout(predicate::str::contains("\"size\": 42"));
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_reads_connection_from_config_file_and_env() {
    let server = file_info_server().await;
    let dir = TempDir::new().unwrap();
    let config_dir = dir.path().join("assemblyline");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        format!("url = \"{}\"\nusername = \"admin\"\n", server.uri()),
    )
    .unwrap();

    let mut cmd = isolated_cmd(dir.path());
    cmd.env("ASSEMBLYLINE_APIKEY", "devkey")
        .args(["-q", "file-info", "abc"]);

    tokio::task::spawn_blocking(move || {
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("\"sha256\": \"abc\""));
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_bearer_token_flag_sets_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/ingest/get_message_list/nq/"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "api_response": [{"alert": false, "ingest_id": "ing-1"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = dir.path().join("custom.toml");
    std::fs::write(
        &config,
        format!(
            "url = \"{}\"\nusername = \"admin\"\napikey = \"devkey\"\n",
            server.uri()
        ),
    )
    .unwrap();

    let mut cmd = isolated_cmd(dir.path());
    cmd.args(["-q", "messages", "nq", "--bearer-token", "tok", "--config"])
        .arg(&config);

    tokio::task::spawn_blocking(move || {
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("ing-1"));
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_download_writes_output_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/file/download/abc/"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"raw file bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("sample.bin");
    let mut cmd = isolated_cmd(dir.path());
    cmd.args(["-q", "download", "abc", "--raw", "--url", &server.uri()])
        .args(["--user", "admin", "--apikey", "devkey", "-o"])
        .arg(&output);

    tokio::task::spawn_blocking(move || cmd.assert().success())
        .await
        .unwrap();
    assert_eq!(std::fs::read(&output).unwrap(), b"raw file bytes");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_server_error_exits_non_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/submission/sid1/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "api_error_message": "Submission not found",
            "api_status_code": 404
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut cmd = isolated_cmd(dir.path());
    cmd.args(["-q", "submission", "sid1", "--url", &server.uri()])
        .args(["--user", "admin", "--password", "hunter2"]);

    tokio::task::spawn_blocking(move || {
        cmd.assert()
            .failure()
            .stderr(predicate::str::contains("Submission not found"));
    })
    .await
    .unwrap();
}
