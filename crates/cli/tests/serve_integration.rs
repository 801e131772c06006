//! Integration tests for the `crm serve` HTTP API.
//!
//! Each test starts the server as a child process on a unique port,
//! makes HTTP requests, and verifies the responses.

use std::io::Read;
use std::net::TcpStream;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use serde_json::Value;

/// Atomic port counter to avoid port conflicts between parallel tests.
/// Base port is derived from process ID so separate test binaries don't
/// collide on the same port range.
static NEXT_PORT: AtomicU16 = AtomicU16::new(0);
static PORT_INIT: std::sync::Once = std::sync::Once::new();

const DATASET: &str = "crates/cli/tests/fixtures/dataset.json";
const CONFIG: &str = "crates/cli/tests/fixtures/crm.toml";

fn next_port() -> u16 {
    PORT_INIT.call_once(|| {
        let base = 20000 + (std::process::id() as u16 % 20000);
        NEXT_PORT.store(base, Ordering::SeqCst);
    });
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// Helper: start `crm serve` on the given port with extra arguments.
fn start_server(port: u16, args: &[&str]) -> Child {
    // The workspace root is two levels up from crates/cli
    let manifest_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    let workspace_root = manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_crm"));
    cmd.current_dir(workspace_root);
    cmd.arg("serve").arg("--port").arg(port.to_string());
    cmd.args(args);
    cmd.env("CRM_SERVER_HOST", "127.0.0.1");
    // Redirect stdout/stderr to avoid blocking
    cmd.stdout(std::process::Stdio::null());
    cmd.stderr(std::process::Stdio::null());

    let child = cmd.spawn().expect("failed to start crm serve");
    // Wait for server to be ready by polling the port
    for _ in 0..50 {
        if TcpStream::connect(format!("127.0.0.1:{}", port)).is_ok() {
            return child;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    child
}

/// Start a server over the fixture dataset.
fn start_with_dataset(port: u16) -> Child {
    start_server(port, &["--data", DATASET])
}

/// Helper: make an HTTP request and return (status, body).
fn http_request(
    port: u16,
    method: &str,
    path: &str,
    extra_headers: &[(&str, &str)],
    body: Option<&str>,
) -> (u16, String) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let mut header_lines = String::new();
    for (name, value) in extra_headers {
        header_lines.push_str(&format!("{}: {}\r\n", name, value));
    }
    if let Some(b) = body {
        header_lines.push_str(&format!(
            "Content-Type: application/json\r\nContent-Length: {}\r\n",
            b.len()
        ));
    }

    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost:{}\r\n{}Connection: close\r\n\r\n{}",
        method,
        path,
        port,
        header_lines,
        body.unwrap_or("")
    );
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);

    parse_http_response(&response)
}

/// Helper: POST a body with an explicit (or no) Content-Type.
fn http_post_raw(port: u16, path: &str, content_type: Option<&str>, body: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let content_type = content_type
        .map(|c| format!("Content-Type: {}\r\n", c))
        .unwrap_or_default();
    let request = format!(
        "POST {} HTTP/1.1\r\nHost: localhost:{}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        path,
        port,
        content_type,
        body.len(),
        body
    );
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);

    parse_http_response(&response)
}

fn http_get(port: u16, path: &str) -> (u16, String) {
    http_request(port, "GET", path, &[], None)
}

fn http_post(port: u16, path: &str, body: &str) -> (u16, String) {
    http_request(port, "POST", path, &[], Some(body))
}

fn http_get_as(port: u16, path: &str, id: &str, roles: &str, reports: &str) -> (u16, String) {
    let mut headers = vec![("X-Principal-Id", id), ("X-Principal-Roles", roles)];
    if !reports.is_empty() {
        headers.push(("X-Principal-Reports", reports));
    }
    http_request(port, "GET", path, &headers, None)
}

/// Parse an HTTP response into (status_code, body).
fn parse_http_response(response: &str) -> (u16, String) {
    let parts: Vec<&str> = response.splitn(2, "\r\n\r\n").collect();
    let headers = parts.first().unwrap_or(&"").to_string();
    let body = parts.get(1).unwrap_or(&"").to_string();

    let status = headers
        .lines()
        .next()
        .unwrap_or("")
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);

    let body = if headers
        .to_ascii_lowercase()
        .contains("transfer-encoding: chunked")
    {
        decode_chunked(&body)
    } else {
        body
    };

    (status, body)
}

/// Decode chunked transfer encoding.
fn decode_chunked(data: &str) -> String {
    let mut result = String::new();
    let mut remaining = data;

    while let Some(line_end) = remaining.find("\r\n") {
        let size = match usize::from_str_radix(remaining[..line_end].trim(), 16) {
            Ok(s) => s,
            Err(_) => break,
        };
        if size == 0 {
            break;
        }
        let chunk_start = line_end + 2;
        let chunk_end = chunk_start + size;
        if chunk_end > remaining.len() {
            result.push_str(&remaining[chunk_start..]);
            break;
        }
        result.push_str(&remaining[chunk_start..chunk_end]);
        remaining = remaining.get(chunk_end + 2..).unwrap_or("");
    }

    result
}

fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("invalid JSON body ({}): {}", e, body))
}

fn count(report: &Value, metric: &str) -> (u64, u64) {
    let c = &report["counts"][metric];
    (c["total"].as_u64().unwrap(), c["flagged"].as_u64().unwrap())
}

// ──────────────────────────────────────────────
// Health and routing
// ──────────────────────────────────────────────

#[test]
fn health_reports_loaded_rows() {
    let port = next_port();
    let mut child = start_with_dataset(port);

    let (status, body) = http_get(port, "/health");
    child.kill().ok();

    assert_eq!(status, 200);
    let v = json(&body);
    assert_eq!(v["success"], true);
    assert_eq!(v["data"]["status"], "ok");
    assert_eq!(v["data"]["entities"], 5);
    assert_eq!(v["data"]["interactions"], 7);
    assert!(v["data"]["version"].is_string());
}

#[test]
fn health_without_dataset_is_empty() {
    let port = next_port();
    let mut child = start_server(port, &[]);

    let (status, body) = http_get(port, "/health");
    child.kill().ok();

    assert_eq!(status, 200);
    assert_eq!(json(&body)["data"]["entities"], 0);
}

#[test]
fn unknown_route_returns_404_envelope() {
    let port = next_port();
    let mut child = start_with_dataset(port);

    let (status, body) = http_get(port, "/nope");
    child.kill().ok();

    assert_eq!(status, 404);
    let v = json(&body);
    assert_eq!(v["success"], false);
    assert_eq!(v["error"]["kind"], "not_found");
}

// ──────────────────────────────────────────────
// POST /latest and /rollup
// ──────────────────────────────────────────────

#[test]
fn latest_resolves_posted_interactions() {
    let port = next_port();
    let mut child = start_server(port, &[]);

    let body = r#"{"interactions": [
        {"id": "a1", "entity_id": "A", "occurred_on": "2024-01-10"},
        {"id": "a2", "entity_id": "A", "occurred_on": "2024-01-15"},
        {"id": "b1", "entity_id": 7, "occurred_on": "2024-01-01"}
    ]}"#;
    let (status, body) = http_post(port, "/latest", body);
    child.kill().ok();

    assert_eq!(status, 200);
    let v = json(&body);
    assert_eq!(v["data"]["A"]["id"], "a2");
    assert_eq!(v["data"]["7"]["id"], "b1");
}

#[test]
fn latest_accepts_integer_and_text_keys_in_one_body() {
    let port = next_port();
    let mut child = start_server(port, &[]);

    let body = r#"{"interactions": [
        {"id": 1, "entity_id": 10, "occurred_on": null, "status": "Interested"},
        {"id": 2, "entity_id": "10", "occurred_on": "2024-05-01", "status": "Onboarded"}
    ]}"#;
    let (status, body) = http_post(port, "/latest", body);
    child.kill().ok();

    assert_eq!(status, 200);
    let v = json(&body);
    assert_eq!(v["success"], true);
    assert_eq!(v["data"]["10"]["id"], "2");
    assert_eq!(v["data"]["10"]["status"], "Onboarded");
}

#[test]
fn malformed_json_body_uses_error_envelope() {
    let port = next_port();
    let mut child = start_server(port, &[]);

    let (status, body) = http_post_raw(port, "/latest", Some("application/json"), "{not json");
    child.kill().ok();

    assert_eq!(status, 400);
    let v = json(&body);
    assert_eq!(v["success"], false);
    assert_eq!(v["error"]["kind"], "bad_request");
}

#[test]
fn missing_content_type_uses_error_envelope() {
    let port = next_port();
    let mut child = start_server(port, &[]);

    let (status, body) = http_post_raw(port, "/rollup", None, r#"{"metrics": {"metrics": {}}}"#);
    child.kill().ok();

    assert_eq!(status, 400);
    let v = json(&body);
    assert_eq!(v["success"], false);
    assert_eq!(v["error"]["kind"], "bad_request");
    assert!(v["error"]["message"].as_str().unwrap().contains("invalid JSON body"));
}

#[test]
fn latest_rejects_bad_body() {
    let port = next_port();
    let mut child = start_server(port, &[]);

    let (status, body) = http_post(port, "/latest", r#"{"rows": []}"#);
    child.kill().ok();

    assert_eq!(status, 400);
    assert_eq!(json(&body)["error"]["kind"], "bad_request");
}

#[test]
fn rollup_counts_posted_dataset() {
    let port = next_port();
    let mut child = start_server(port, &[]);

    let body = r#"{
        "entities": [{"id": "A", "is_startup": "Yes"}, {"id": "B"}, {"id": "C"}],
        "interactions": [
            {"id": "1", "entity_id": "A", "occurred_on": "2024-02-01", "status": "Interested"},
            {"id": "2", "entity_id": "B", "occurred_on": "2024-02-02", "status": "Interested"},
            {"id": "3", "entity_id": "B", "occurred_on": "2024-02-03", "status": "Not Picked"}
        ],
        "metrics": {
            "flag": "entity.is_startup",
            "metrics": {
                "interested": {
                    "predicate": {"op": "equals", "field": "status", "value": "Interested"},
                    "when_missing": "exclude"
                },
                "new": {
                    "predicate": {"op": "equals", "field": "status", "value": "New"},
                    "when_missing": {"default": {"status": "New"}}
                }
            }
        }
    }"#;
    let (status, body) = http_post(port, "/rollup", body);
    child.kill().ok();

    assert_eq!(status, 200);
    let report = &json(&body)["data"];
    assert_eq!(count(report, "interested"), (1, 1));
    assert_eq!(count(report, "new"), (1, 0));
    assert_eq!(report["considered"], 3);
}

#[test]
fn rollup_with_unknown_selection_is_400() {
    let port = next_port();
    let mut child = start_server(port, &[]);

    let body = r#"{
        "metrics": {"metrics": {}},
        "select": ["missing"]
    }"#;
    let (status, body) = http_post(port, "/rollup", body);
    child.kill().ok();

    assert_eq!(status, 400);
    assert_eq!(json(&body)["error"]["kind"], "unknown_metric");
}

// ──────────────────────────────────────────────
// Dashboards
// ──────────────────────────────────────────────

#[test]
fn list_dashboards() {
    let port = next_port();
    let mut child = start_with_dataset(port);

    let (status, body) = http_get(port, "/dashboards");
    child.kill().ok();

    assert_eq!(status, 200);
    let v = json(&body);
    let names: Vec<&str> = v["data"]["dashboards"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["leadgen", "fse", "franchise"]);
    assert_eq!(v["data"]["dashboards"][2]["min_role"], "manager");
}

#[test]
fn admin_sees_every_entity() {
    let port = next_port();
    let mut child = start_with_dataset(port);

    let (status, body) = http_get_as(port, "/dashboards/leadgen", "boss", "admin", "");
    child.kill().ok();

    assert_eq!(status, 200);
    let v = json(&body);
    assert_eq!(v["data"]["dashboard"], "leadgen");
    let report = &v["data"]["report"];
    assert_eq!(count(report, "total_leads"), (5, 2));
    assert_eq!(count(report, "interested"), (2, 1));
    assert_eq!(count(report, "onboarded"), (1, 1));
}

#[test]
fn manager_sees_only_owned_entities() {
    let port = next_port();
    let mut child = start_with_dataset(port);

    let (status, body) = http_get_as(port, "/dashboards/leadgen", "u1", "MANAGER", "");
    child.kill().ok();

    assert_eq!(status, 200);
    let report = &json(&body)["data"]["report"];
    assert_eq!(count(report, "total_leads"), (2, 1));
    assert_eq!(count(report, "interested"), (1, 1));
    assert_eq!(count(report, "not_picked"), (1, 0));
}

#[test]
fn manager_scope_includes_reports() {
    let port = next_port();
    let mut child = start_with_dataset(port);

    let (status, body) = http_get_as(port, "/dashboards/leadgen", "u1", "manager", "u2");
    child.kill().ok();

    assert_eq!(status, 200);
    assert_eq!(
        count(&json(&body)["data"]["report"], "total_leads"),
        (4, 2)
    );
}

#[test]
fn small_pages_give_the_same_counts() {
    let port = next_port();
    let mut child = start_server(port, &["--config", CONFIG]);

    let (status, body) = http_get_as(port, "/dashboards/franchise", "h", "hod", "");
    child.kill().ok();

    assert_eq!(status, 200);
    let report = &json(&body)["data"]["report"];
    assert_eq!(count(report, "franchise_discussed"), (2, 2));
    assert_eq!(count(report, "form_filled"), (1, 1));
}

#[test]
fn dashboard_query_filters() {
    let port = next_port();
    let mut child = start_with_dataset(port);

    let (status, body) = http_get_as(
        port,
        "/dashboards/leadgen?from=2024-02-01&to=2024-02-29&select=total_leads,interested",
        "boss",
        "admin",
        "",
    );
    child.kill().ok();

    assert_eq!(status, 200);
    let report = &json(&body)["data"]["report"];
    assert_eq!(report["counts"].as_object().unwrap().len(), 2);
    assert_eq!(count(report, "total_leads"), (3, 2));
    assert_eq!(count(report, "interested"), (1, 1));
    assert_eq!(report["excluded_by_date"], 2);
}

#[test]
fn fse_cannot_open_franchise_dashboard() {
    let port = next_port();
    let mut child = start_with_dataset(port);

    let (status, body) = http_get_as(port, "/dashboards/franchise", "f1", "FSE", "");
    child.kill().ok();

    assert_eq!(status, 403);
    assert_eq!(json(&body)["error"]["kind"], "forbidden");
}

#[test]
fn missing_identity_is_403() {
    let port = next_port();
    let mut child = start_with_dataset(port);

    let (status, body) = http_get(port, "/dashboards/leadgen");
    child.kill().ok();

    assert_eq!(status, 403);
    assert_eq!(json(&body)["error"]["kind"], "missing_identity");
}

#[test]
fn unknown_role_is_400() {
    let port = next_port();
    let mut child = start_with_dataset(port);

    let (status, body) = http_get_as(port, "/dashboards/leadgen", "u1", "intern", "");
    child.kill().ok();

    assert_eq!(status, 400);
    assert_eq!(json(&body)["error"]["kind"], "unknown_role");
}

#[test]
fn unknown_dashboard_is_404() {
    let port = next_port();
    let mut child = start_with_dataset(port);

    let (status, body) = http_get_as(port, "/dashboards/hr", "boss", "admin", "");
    child.kill().ok();

    assert_eq!(status, 404);
    assert_eq!(json(&body)["error"]["kind"], "unknown_dashboard");
}

#[test]
fn half_open_date_range_is_400() {
    let port = next_port();
    let mut child = start_with_dataset(port);

    let (status, body) = http_get_as(
        port,
        "/dashboards/leadgen?from=2024-02-01",
        "boss",
        "admin",
        "",
    );
    child.kill().ok();

    assert_eq!(status, 400);
    assert_eq!(json(&body)["error"]["kind"], "bad_request");
}
