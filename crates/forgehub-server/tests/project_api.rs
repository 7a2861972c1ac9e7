// SPDX-License-Identifier: Apache-2.0
//
// Project CRUD, membership, and visibility over real HTTP, plus the
// operational endpoints and request-id propagation.

mod support;

use forgehub_server::ActivityLog as _;
use serde_json::json;
use support::{create_project, error_code, send_json, send_raw, spawn_server};

#[tokio::test]
async fn operational_endpoints_respond() {
    let (addr, _stores) = spawn_server().await;

    let (status, _, body) = send_raw(addr, "GET", "/healthz", &[], b"").await;
    assert_eq!(status, 200);
    assert_eq!(body, "ok");

    let (status, _, body) = send_raw(addr, "GET", "/readyz", &[], b"").await;
    assert_eq!(status, 200);
    assert_eq!(body, "ready");

    let (status, body) = send_json(addr, "GET", "/v1/version", None, &json!(null)).await;
    assert_eq!(status, 200);
    assert_eq!(
        body.pointer("/server/crate").and_then(serde_json::Value::as_str),
        Some("forgehub-server")
    );
}

#[tokio::test]
async fn request_id_is_echoed_or_minted() {
    let (addr, _stores) = spawn_server().await;

    let (_, head, _) = send_raw(
        addr,
        "GET",
        "/v1/projects",
        &[("x-request-id", "trace-42")],
        b"",
    )
    .await;
    assert!(head.to_ascii_lowercase().contains("x-request-id: trace-42"));

    let (_, head, _) = send_raw(addr, "GET", "/v1/projects", &[], b"").await;
    assert!(head.to_ascii_lowercase().contains("x-request-id: req-"));
}

#[tokio::test]
async fn creation_requires_a_valid_token() {
    let (addr, _stores) = spawn_server().await;

    let (status, body) = send_json(
        addr,
        "POST",
        "/v1/projects",
        None,
        &json!({"name": "anon"}),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(error_code(&body), Some("Unauthorized"));

    let (status, body) = send_json(
        addr,
        "POST",
        "/v1/projects",
        Some("tok-forged"),
        &json!({"name": "forged"}),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(error_code(&body), Some("Unauthorized"));

    let (status, body) = send_json(
        addr,
        "POST",
        "/v1/projects",
        Some("tok-alice"),
        &json!({"name": "   "}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(error_code(&body), Some("ValidationFailed"));
}

#[tokio::test]
async fn private_projects_are_members_only() {
    let (addr, _stores) = spawn_server().await;
    let id = create_project(addr, "tok-alice", "skunkworks", false).await;
    let (status, _) = send_json(
        addr,
        "POST",
        &format!("/v1/projects/{id}/collaborators"),
        Some("tok-alice"),
        &json!({"user": "bob"}),
    )
    .await;
    assert_eq!(status, 200);

    // Anonymous readers are asked to authenticate; authenticated
    // strangers are refused.
    let (status, _) = send_json(addr, "GET", &format!("/v1/projects/{id}"), None, &json!(null)).await;
    assert_eq!(status, 401);
    let (status, body) = send_json(
        addr,
        "GET",
        &format!("/v1/projects/{id}"),
        Some("tok-carol"),
        &json!(null),
    )
    .await;
    assert_eq!(status, 403);
    assert_eq!(error_code(&body), Some("Forbidden"));
    let (status, _) = send_json(
        addr,
        "GET",
        &format!("/v1/projects/{id}"),
        Some("tok-bob"),
        &json!(null),
    )
    .await;
    assert_eq!(status, 200);

    // Listing hides it from everyone but members.
    let (_, body) = send_json(addr, "GET", "/v1/projects", None, &json!(null)).await;
    assert_eq!(
        body.get("projects").and_then(serde_json::Value::as_array).map(Vec::len),
        Some(0)
    );
    let (_, body) = send_json(addr, "GET", "/v1/projects", Some("tok-bob"), &json!(null)).await;
    assert_eq!(
        body.get("projects").and_then(serde_json::Value::as_array).map(Vec::len),
        Some(1)
    );
}

#[tokio::test]
async fn only_the_owner_edits_metadata() {
    let (addr, _stores) = spawn_server().await;
    let id = create_project(addr, "tok-alice", "rename-me", true).await;
    let (status, _) = send_json(
        addr,
        "POST",
        &format!("/v1/projects/{id}/collaborators"),
        Some("tok-alice"),
        &json!({"user": "bob"}),
    )
    .await;
    assert_eq!(status, 200);

    let (status, body) = send_json(
        addr,
        "PATCH",
        &format!("/v1/projects/{id}"),
        Some("tok-bob"),
        &json!({"name": "hijacked"}),
    )
    .await;
    assert_eq!(status, 403);
    assert_eq!(error_code(&body), Some("Forbidden"));

    let (status, body) = send_json(
        addr,
        "PATCH",
        &format!("/v1/projects/{id}"),
        Some("tok-alice"),
        &json!({"name": "renamed", "tags": ["cad", "rev-b"]}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(
        body.pointer("/project/name").and_then(serde_json::Value::as_str),
        Some("renamed")
    );
    assert_eq!(
        body.pointer("/project/tags/1").and_then(serde_json::Value::as_str),
        Some("rev-b")
    );
}

#[tokio::test]
async fn deletion_is_owner_only_and_clears_the_feed() {
    let (addr, stores) = spawn_server().await;
    let id = create_project(addr, "tok-alice", "short-lived", true).await;

    let (status, _) = send_json(
        addr,
        "DELETE",
        &format!("/v1/projects/{id}"),
        Some("tok-carol"),
        &json!(null),
    )
    .await;
    assert_eq!(status, 403);

    let (status, body) = send_json(
        addr,
        "DELETE",
        &format!("/v1/projects/{id}"),
        Some("tok-alice"),
        &json!(null),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body.get("deleted").and_then(serde_json::Value::as_bool), Some(true));

    let (status, _) = send_json(addr, "GET", &format!("/v1/projects/{id}"), None, &json!(null)).await;
    assert_eq!(status, 404);
    let feed = stores
        .activity
        .recent_for_project(&forgehub_model::ProjectId::parse(&id).expect("id"), 10)
        .await
        .expect("feed");
    assert!(feed.is_empty());
}

#[tokio::test]
async fn collaborator_management_and_transfer() {
    let (addr, _stores) = spawn_server().await;
    let id = create_project(addr, "tok-alice", "handover", true).await;

    // Ownership can only move to an existing collaborator.
    let (status, body) = send_json(
        addr,
        "POST",
        &format!("/v1/projects/{id}/transfer"),
        Some("tok-alice"),
        &json!({"to": "bob"}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(error_code(&body), Some("ValidationFailed"));

    let (status, _) = send_json(
        addr,
        "POST",
        &format!("/v1/projects/{id}/collaborators"),
        Some("tok-alice"),
        &json!({"user": "bob"}),
    )
    .await;
    assert_eq!(status, 200);

    // A collaborator holding the lease cannot be removed mid-edit.
    let (status, _) = send_json(
        addr,
        "POST",
        &format!("/v1/projects/{id}/checkout"),
        Some("tok-bob"),
        &json!({}),
    )
    .await;
    assert_eq!(status, 200);
    let (status, body) = send_json(
        addr,
        "DELETE",
        &format!("/v1/projects/{id}/collaborators/bob"),
        Some("tok-alice"),
        &json!(null),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(error_code(&body), Some("Conflict"));

    let (status, body) = send_json(
        addr,
        "POST",
        &format!("/v1/projects/{id}/transfer"),
        Some("tok-alice"),
        &json!({"to": "bob"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(
        body.pointer("/project/creator").and_then(serde_json::Value::as_str),
        Some("bob")
    );
    let collaborators = body
        .pointer("/project/collaborators")
        .and_then(serde_json::Value::as_array)
        .map(|c| {
            c.iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    assert!(collaborators.contains(&"alice".to_string()));

    // The new owner runs the roster now.
    let (status, _) = send_json(
        addr,
        "DELETE",
        &format!("/v1/projects/{id}/collaborators/alice"),
        Some("tok-alice"),
        &json!(null),
    )
    .await;
    assert_eq!(status, 403);
}
