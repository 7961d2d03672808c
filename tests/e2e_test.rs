//! End-to-end tests for the Filter Gateway binary
//!
//! These tests start the gateway server and verify the endpoints work correctly.

use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::Duration;

/// Base port for tests, incremented atomically to avoid conflicts
static PORT_COUNTER: AtomicU16 = AtomicU16::new(19400);

const TOKEN: &str = "e2e-token";

/// Get a unique port for testing
fn get_unique_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Kills the server when the test ends, even on assertion failure
struct ServerGuard(Child);

impl Drop for ServerGuard {
    fn drop(&mut self) {
        self.0.kill().ok();
        self.0.wait().ok();
    }
}

/// Create a temporary config file with the specified port
fn create_test_config(port: u16, guarded: bool) -> tempfile::NamedTempFile {
    let config = format!(
        r#"
[server]
host = "127.0.0.1"
port = {}
timeout = 30

[metrics]
enabled = true
path = "/metrics"

[health]
enabled = true
path = "/health"

[request_id]
enabled = true
order = 0

[access_token]
enabled = {}
header_name = "X-Gateway-Token"
tokens = ["{}"]
order = 10

[[logging.outputs]]
target = "stderr"
min_level = "warn"
max_level = "error"
"#,
        port, guarded, TOKEN
    );

    let file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    std::fs::write(file.path(), config).unwrap();
    file
}

/// Start the gateway server
fn start_server(config_path: &str) -> ServerGuard {
    let child = Command::new(env!("CARGO_BIN_EXE_filter-gateway"))
        .args(["start", "-c", config_path])
        .spawn()
        .expect("Failed to start gateway server");
    ServerGuard(child)
}

/// Wait for the server to accept requests by polling the health endpoint
fn wait_for_server(port: u16, timeout_secs: u64) -> bool {
    let start = std::time::Instant::now();
    let timeout = Duration::from_secs(timeout_secs);
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(1))
        .build()
        .unwrap();

    while start.elapsed() < timeout {
        let response = client
            .get(format!("http://127.0.0.1:{}/health", port))
            .header("X-Gateway-Token", TOKEN)
            .send();
        if let Ok(response) = response {
            if response.status().is_success() {
                return true;
            }
        }
        thread::sleep(Duration::from_millis(100));
    }
    false
}

#[test]
fn test_health_endpoint() {
    let port = get_unique_port();
    let config_file = create_test_config(port, false);
    let _server = start_server(config_file.path().to_str().unwrap());

    assert!(
        wait_for_server(port, 10),
        "Server failed to start within timeout"
    );

    let client = reqwest::blocking::Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .expect("Failed to send request");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));

    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
    assert!(body["uptime_seconds"].is_number());
}

#[test]
fn test_metrics_endpoint() {
    let port = get_unique_port();
    let config_file = create_test_config(port, false);
    let _server = start_server(config_file.path().to_str().unwrap());

    assert!(
        wait_for_server(port, 10),
        "Server failed to start within timeout"
    );

    let client = reqwest::blocking::Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/metrics", port))
        .send()
        .expect("Failed to send request");

    assert!(response.status().is_success());

    // The readiness probe above has already been counted
    let body = response.text().unwrap();
    assert!(body.contains("gateway_requests_total"));
}

#[test]
fn test_missing_token_returns_envelope() {
    let port = get_unique_port();
    let config_file = create_test_config(port, true);
    let _server = start_server(config_file.path().to_str().unwrap());

    assert!(
        wait_for_server(port, 10),
        "Server failed to start within timeout"
    );

    let client = reqwest::blocking::Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(
        response.headers()["content-type"],
        "application/json"
    );
    assert_eq!(
        response.text().unwrap(),
        r#"{"statusCode":401,"message":"unauthorized","body":null}"#
    );
}

#[test]
fn test_wrong_method_returns_405() {
    let port = get_unique_port();
    let config_file = create_test_config(port, false);
    let _server = start_server(config_file.path().to_str().unwrap());

    assert!(
        wait_for_server(port, 10),
        "Server failed to start within timeout"
    );

    let client = reqwest::blocking::Client::new();
    let response = client
        .post(format!("http://127.0.0.1:{}/health", port))
        .send()
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 405);
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["statusCode"], 405);
    assert_eq!(body["message"], "use GET method");
}

#[test]
fn test_unmatched_route_returns_404() {
    let port = get_unique_port();
    let config_file = create_test_config(port, false);
    let _server = start_server(config_file.path().to_str().unwrap());

    assert!(
        wait_for_server(port, 10),
        "Server failed to start within timeout"
    );

    let client = reqwest::blocking::Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/nonexistent", port))
        .send()
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 404);
}
