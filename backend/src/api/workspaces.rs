//! Workspace membership API handlers

use crate::auth::{roles, Caller};
use crate::error::AppError;
use crate::state::AppState;
use crate::workspace::WorkspaceMember;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

const WORKSPACE_ROLES: &[&str] = &[roles::WORKSPACE_ADMIN, roles::WORKSPACE_DEVELOPER];

const MEMBER_MANAGERS: &[&str] = &[roles::WORKSPACE_ADMIN, roles::SYSTEM_ADMIN];

/// Add workspace member request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWorkspaceMemberRequest {
    /// User to add
    pub user_id: String,
    /// Workspace roles to grant
    pub roles: Vec<String>,
}

/// GET /api/workspace/:workspace_id/members - Members of a workspace
pub async fn get_members(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(workspace_id): Path<String>,
) -> Result<Json<Vec<WorkspaceMember>>, AppError> {
    let workspace_roles = state
        .workspace_roles(&workspace_id, &caller.user_id)
        .await?;
    caller.require_any_scoped(&workspace_roles, MEMBER_MANAGERS)?;
    Ok(Json(state.workspaces.get_members(&workspace_id).await?))
}

/// POST /api/workspace/:workspace_id/members - Add a member to a workspace
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(workspace_id): Path<String>,
    Json(request): Json<AddWorkspaceMemberRequest>,
) -> Result<(StatusCode, Json<WorkspaceMember>), AppError> {
    let workspace_roles = state
        .workspace_roles(&workspace_id, &caller.user_id)
        .await?;
    caller.require_any_scoped(&workspace_roles, MEMBER_MANAGERS)?;

    if request.roles.is_empty() {
        return Err(AppError::Conflict("Member roles required".to_string()));
    }
    if let Some(role) = request
        .roles
        .iter()
        .find(|role| !WORKSPACE_ROLES.contains(&role.as_str()))
    {
        return Err(AppError::Conflict(format!("Unknown workspace role {}", role)));
    }

    let member = WorkspaceMember {
        workspace_id,
        user_id: request.user_id,
        roles: request.roles,
    };
    state.workspaces.add_member(&member).await?;

    info!(
        workspace_id = %member.workspace_id,
        member_id = %member.user_id,
        user_id = %caller.user_id,
        "Added workspace member"
    );
    Ok((StatusCode::CREATED, Json(member)))
}
