//! Integration tests for the command API

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use che_api_backend::account::SubscriptionServiceRegistry;
use che_api_backend::api;
use che_api_backend::db::Database;
use che_api_backend::state::AppState;
use che_api_backend::workspace::WorkspaceMember;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Router over a fresh database where `dev` and `other` develop in
/// `workspace1` and `lead` administers it
async fn setup() -> Router {
    let db = Database::in_memory().await.unwrap();
    let state = Arc::new(AppState::new(
        &db,
        SubscriptionServiceRegistry::new(),
        "http://localhost:8080/api",
    ));
    for (user, role) in [
        ("dev", "workspace/developer"),
        ("other", "workspace/developer"),
        ("lead", "workspace/admin"),
    ] {
        state
            .workspaces
            .add_member(&WorkspaceMember {
                workspace_id: "workspace1".to_string(),
                user_id: user.to_string(),
                roles: vec![role.to_string()],
            })
            .await
            .unwrap();
    }
    api::router(state)
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    user: &str,
    roles: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", user)
        .header("x-user-roles", roles);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create(router: &Router, user: &str, body: Value) -> String {
    let (status, body) = send(
        router,
        Method::POST,
        "/api/command/workspace1",
        user,
        "user",
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_create_command() {
    let router = setup().await;
    let (status, body) = send(
        &router,
        Method::POST,
        "/api/command/workspace1",
        "dev",
        "user",
        Some(json!({
            "name": "MVN_CLEAN_INSTALL",
            "commandLine": "mvn clean install",
            "type": "maven"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["id"].as_str().unwrap();
    assert!(id.starts_with("command"));
    assert_eq!(id.len(), "command".len() + 16);
    assert_eq!(body["creator"], "dev");
    assert_eq!(body["workspaceId"], "workspace1");
    assert_eq!(body["visibility"], "private");
    assert_eq!(body["type"], "maven");
    assert_eq!(
        body["links"][0]["href"],
        format!("http://localhost:8080/api/command/{}", id)
    );
}

#[tokio::test]
async fn test_create_command_validation() {
    let router = setup().await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/command/workspace1",
        "stranger",
        "user",
        Some(json!({"name": "build", "commandLine": "make"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Access denied");

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/command/workspace1",
        "lead",
        "user",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Command required");

    let cases = [
        (json!({"commandLine": "make"}), "Command name required"),
        (json!({"name": "", "commandLine": "make"}), "Command name required"),
        (json!({"name": "build"}), "Command line required"),
        (json!({"name": "build", "commandLine": ""}), "Command line required"),
    ];
    for (request, message) in cases {
        let (status, body) = send(
            &router,
            Method::POST,
            "/api/command/workspace1",
            "dev",
            "user",
            Some(request),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], message);
    }
}

#[tokio::test]
async fn test_get_command_respects_visibility() {
    let router = setup().await;
    let private = create(&router, "dev", json!({"name": "a", "commandLine": "make"})).await;
    let public = create(
        &router,
        "dev",
        json!({"name": "b", "commandLine": "make test", "visibility": "public"}),
    )
    .await;

    let (status, _) = send(
        &router,
        Method::GET,
        &format!("/api/command/{}", private),
        "dev",
        "user",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &router,
        Method::GET,
        &format!("/api/command/{}", private),
        "other",
        "user",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["error"],
        format!("User 'other' doesn't have access to command '{}'", private)
    );

    let (status, body) = send(
        &router,
        Method::GET,
        &format!("/api/command/{}", public),
        "other",
        "user",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["commandLine"], "make test");

    let (status, _) = send(
        &router,
        Method::GET,
        "/api/command/command0000000000000000",
        "dev",
        "user",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_workspace_commands() {
    let router = setup().await;
    create(&router, "dev", json!({"name": "a", "commandLine": "make"})).await;
    create(
        &router,
        "other",
        json!({"name": "b", "commandLine": "make test", "visibility": "public"}),
    )
    .await;
    create(&router, "other", json!({"name": "c", "commandLine": "make clean"})).await;

    let (status, body) = send(
        &router,
        Method::GET,
        "/api/command/workspace1/all",
        "dev",
        "user",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["a", "b"]);

    // listing needs no platform role
    let (status, body) = send(
        &router,
        Method::GET,
        "/api/command/workspace1/all",
        "dev",
        "",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_update_command() {
    let router = setup().await;
    let id = create(&router, "dev", json!({"name": "build", "commandLine": "make"})).await;

    let (status, body) = send(
        &router,
        Method::PUT,
        "/api/command",
        "dev",
        "user",
        Some(json!({"id": id, "commandLine": "make all", "visibility": "public"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["name"], "build");
    assert_eq!(body["commandLine"], "make all");
    assert_eq!(body["visibility"], "public");

    let (status, body) = send(
        &router,
        Method::PUT,
        "/api/command",
        "other",
        "user",
        Some(json!({"id": id, "name": "hijacked"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["error"],
        format!("User 'other' doesn't have access to update command '{}'", id)
    );

    let (status, body) = send(&router, Method::PUT, "/api/command", "dev", "user", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Update required");

    let (status, body) = send(
        &router,
        Method::PUT,
        "/api/command",
        "dev",
        "user",
        Some(json!({"name": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Command id required");

    let (status, _) = send(
        &router,
        Method::PUT,
        "/api/command",
        "dev",
        "user",
        Some(json!({"id": "missing", "name": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_command_rejects_empty_fields() {
    let router = setup().await;
    let id = create(&router, "dev", json!({"name": "build", "commandLine": "make"})).await;

    let cases = [
        (json!({"id": id, "name": ""}), "Command name required"),
        (json!({"id": id, "commandLine": ""}), "Command line required"),
    ];
    for (request, message) in cases {
        let (status, body) = send(
            &router,
            Method::PUT,
            "/api/command",
            "dev",
            "user",
            Some(request),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], message);
    }

    let (status, body) = send(
        &router,
        Method::GET,
        &format!("/api/command/{}", id),
        "dev",
        "user",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "build");
    assert_eq!(body["commandLine"], "make");
}

#[tokio::test]
async fn test_remove_command() {
    let router = setup().await;
    let id = create(&router, "dev", json!({"name": "build", "commandLine": "make"})).await;
    let uri = format!("/api/command/{}", id);

    let (status, _) = send(&router, Method::DELETE, &uri, "other", "user", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&router, Method::DELETE, &uri, "dev", "user", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&router, Method::DELETE, &uri, "dev", "user", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let id = create(&router, "dev", json!({"name": "test", "commandLine": "make test"})).await;
    let (status, _) = send(
        &router,
        Method::DELETE,
        &format!("/api/command/{}", id),
        "admin",
        "system/admin",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
