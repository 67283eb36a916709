//! API module
//!
//! Contains HTTP request handlers for accounts, subscriptions, commands and
//! workspace membership, and the router wiring them together.

pub mod accounts;
pub mod commands;
pub mod subscriptions;
pub mod utils;
pub mod workspaces;

use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    message: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        message: "Backend is healthy".to_string(),
    })
}

/// Build the API router over the given state
///
/// Middleware layers are added by the binary so tests can drive the bare
/// router with `tower::ServiceExt::oneshot`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        // Accounts and plans
        .route("/api/account", post(accounts::create_account))
        .route(
            "/api/account/plans",
            get(accounts::list_plans).post(accounts::create_plan),
        )
        .route("/api/account/plans/:plan_id", get(accounts::get_plan))
        .route("/api/account/:account_id", get(accounts::get_account))
        .route(
            "/api/account/:account_id/members",
            get(accounts::get_members).post(accounts::add_member),
        )
        // Subscriptions
        .route(
            "/api/account/subscriptions",
            post(subscriptions::add_subscription),
        )
        .route(
            "/api/account/subscriptions/:subscription_id",
            get(subscriptions::get_subscription_by_id).delete(subscriptions::remove_subscription),
        )
        .route(
            "/api/account/:account_id/subscriptions",
            get(subscriptions::get_subscriptions),
        )
        .route(
            "/api/account/:account_id/resources",
            get(subscriptions::get_resources),
        )
        // Commands; POST takes a workspace id, GET and DELETE a command id
        .route("/api/command", put(commands::update_command))
        .route(
            "/api/command/:id",
            get(commands::get_command)
                .post(commands::create_command)
                .delete(commands::remove_command),
        )
        .route("/api/command/:id/all", get(commands::get_commands))
        // Workspace membership
        .route(
            "/api/workspace/:workspace_id/members",
            get(workspaces::get_members).post(workspaces::add_member),
        )
        .with_state(state)
}
