#![allow(dead_code)]

use forgehub_server::{
    build_router, AppState, IdentityStore as _, MemoryActivityLog, MemoryIdentityStore,
    MemoryObjectStore, MemoryProjectStore,
};
use forgehub_model::UserId;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub struct TestStores {
    pub projects: Arc<MemoryProjectStore>,
    pub objects: Arc<MemoryObjectStore>,
    pub activity: Arc<MemoryActivityLog>,
    pub identity: Arc<MemoryIdentityStore>,
}

/// Boots the real router on an ephemeral port with in-memory stores and
/// bearer tokens for alice, bob, and carol (`tok-<handle>`).
pub async fn spawn_server() -> (SocketAddr, TestStores) {
    let projects = Arc::new(MemoryProjectStore::new());
    let objects = Arc::new(MemoryObjectStore::new());
    let activity = Arc::new(MemoryActivityLog::default());
    let identity = Arc::new(MemoryIdentityStore::new());
    for handle in ["alice", "bob", "carol"] {
        identity
            .register_token(
                &format!("tok-{handle}"),
                UserId::parse(handle).expect("handle"),
            )
            .await
            .expect("register token");
    }
    let state = AppState::new(
        projects.clone(),
        objects.clone(),
        activity.clone(),
        identity.clone(),
    );
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    (
        addr,
        TestStores {
            projects,
            objects,
            activity,
            identity,
        },
    )
}

pub async fn send_raw(
    addr: SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: &[u8],
) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    for (k, v) in headers {
        req.push_str(&format!("{k}: {v}\r\n"));
    }
    req.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request head");
    stream.write_all(body).await.expect("write request body");
    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .await
        .expect("read response");
    let response = String::from_utf8(response).expect("utf8 response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response must have separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("http status");
    // Axum replies with chunked encoding on Connection: close; strip the
    // framing when present.
    let body = if head
        .to_ascii_lowercase()
        .contains("transfer-encoding: chunked")
    {
        dechunk(body)
    } else {
        body.to_string()
    };
    (status, head.to_string(), body)
}

fn dechunk(raw: &str) -> String {
    let mut out = String::new();
    let mut rest = raw;
    loop {
        let Some((size_line, tail)) = rest.split_once("\r\n") else {
            break;
        };
        let Ok(size) = usize::from_str_radix(size_line.trim(), 16) else {
            break;
        };
        if size == 0 {
            break;
        }
        out.push_str(&tail[..size]);
        rest = &tail[size..];
        rest = rest.strip_prefix("\r\n").unwrap_or(rest);
    }
    out
}

pub async fn send_json(
    addr: SocketAddr,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: &serde_json::Value,
) -> (u16, serde_json::Value) {
    let payload = serde_json::to_vec(body).expect("serialize body");
    let auth;
    let mut headers: Vec<(&str, &str)> = vec![("Content-Type", "application/json")];
    if let Some(token) = token {
        auth = format!("Bearer {token}");
        headers.push(("Authorization", &auth));
    }
    let (status, _, body) = send_raw(addr, method, path, &headers, &payload).await;
    let json = if body.trim().is_empty() {
        serde_json::json!(null)
    } else {
        serde_json::from_str(&body).unwrap_or(serde_json::json!({"raw": body}))
    };
    (status, json)
}

pub const MULTIPART_BOUNDARY: &str = "----forgehub-test-boundary";

/// Builds a check-in body: optional message/version text fields plus
/// (name, bytes) file parts.
pub fn multipart_body(
    message: Option<&str>,
    version: Option<&str>,
    files: &[(&str, &[u8])],
) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(message) = message {
        body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"message\"\r\n\r\n{message}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(version) = version {
        body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"version\"\r\n\r\n{version}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn send_multipart(
    addr: SocketAddr,
    path: &str,
    token: &str,
    body: Vec<u8>,
) -> (u16, serde_json::Value) {
    let auth = format!("Bearer {token}");
    let content_type = format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}");
    let headers: Vec<(&str, &str)> = vec![
        ("Content-Type", &content_type),
        ("Authorization", &auth),
    ];
    let (status, _, body) = send_raw(addr, "POST", path, &headers, &body).await;
    let json = if body.trim().is_empty() {
        serde_json::json!(null)
    } else {
        serde_json::from_str(&body).unwrap_or(serde_json::json!({"raw": body}))
    };
    (status, json)
}

/// Creates a project as `token` and returns its id.
pub async fn create_project(addr: SocketAddr, token: &str, name: &str, is_public: bool) -> String {
    let (status, body) = send_json(
        addr,
        "POST",
        "/v1/projects",
        Some(token),
        &serde_json::json!({"name": name, "is_public": is_public}),
    )
    .await;
    assert_eq!(status, 201, "project create failed: {body}");
    body.get("project")
        .and_then(|p| p.get("id"))
        .and_then(serde_json::Value::as_str)
        .expect("project id")
        .to_string()
}

pub fn error_code(body: &serde_json::Value) -> Option<&str> {
    body.get("error")
        .and_then(|e| e.get("code"))
        .and_then(serde_json::Value::as_str)
}
