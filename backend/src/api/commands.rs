//! Command API handlers

use crate::api::utils::{is_null_or_empty, parse_optional_body};
use crate::auth::{roles, Caller};
use crate::command::{Command, CommandDescriptor, CommandUpdate, NewCommand};
use crate::error::AppError;
use crate::ids::{self, ID_LENGTH};
use crate::links::{Link, LINK_REL_GET_COMMAND, LINK_REL_REMOVE_COMMAND};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use tracing::info;

const COMMAND_WRITERS: &[&str] = &[roles::WORKSPACE_ADMIN, roles::WORKSPACE_DEVELOPER];

const USERS: &[&str] = &[roles::USER, roles::SYSTEM_ADMIN, roles::SYSTEM_MANAGER];

fn forbidden(message: &str) -> AppError {
    AppError::Forbidden(message.to_string())
}

/// Build the API view of a command with the links the caller may follow
fn to_descriptor(command: Command, base_url: &str, caller: &Caller) -> CommandDescriptor {
    let href = format!("{}/command/{}", base_url, command.id);
    let mut links = vec![Link::get(href.clone(), LINK_REL_GET_COMMAND)];
    if command.creator == caller.user_id || caller.is_privileged() {
        links.push(Link::delete(href, LINK_REL_REMOVE_COMMAND));
    }
    CommandDescriptor { command, links }
}

/// POST /api/command/:workspace_id - Create a command in a workspace
pub async fn create_command(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(workspace_id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<CommandDescriptor>), AppError> {
    let workspace_roles = state
        .workspace_roles(&workspace_id, &caller.user_id)
        .await?;
    caller.require_any_scoped(&workspace_roles, COMMAND_WRITERS)?;

    let new_command = parse_optional_body::<NewCommand>(&body)?
        .ok_or_else(|| forbidden("Command required"))?;
    if is_null_or_empty(&new_command.name) {
        return Err(forbidden("Command name required"));
    }
    if is_null_or_empty(&new_command.command_line) {
        return Err(forbidden("Command line required"));
    }

    let command = Command {
        id: ids::generate("command", ID_LENGTH),
        name: new_command.name.unwrap_or_default(),
        command_line: new_command.command_line.unwrap_or_default(),
        creator: caller.user_id.clone(),
        workspace_id,
        visibility: new_command.visibility.unwrap_or_default(),
        command_type: new_command.command_type,
        working_dir: new_command.working_dir,
    };
    state.commands.create(&command).await?;

    info!(
        command_id = %command.id,
        workspace_id = %command.workspace_id,
        user_id = %caller.user_id,
        "Created command"
    );

    Ok((
        StatusCode::CREATED,
        Json(to_descriptor(command, &state.api_base_url, &caller)),
    ))
}

/// GET /api/command/:id - Get a command visible to the caller
pub async fn get_command(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<CommandDescriptor>, AppError> {
    caller.require_any(USERS)?;
    let command = state.commands.get_command(&id).await?;
    if !command.is_visible_to(&caller.user_id) {
        return Err(AppError::Forbidden(format!(
            "User '{}' doesn't have access to command '{}'",
            caller.user_id, id
        )));
    }
    Ok(Json(to_descriptor(command, &state.api_base_url, &caller)))
}

/// GET /api/command/:workspace_id/all - Commands of a workspace visible to the caller
pub async fn get_commands(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(workspace_id): Path<String>,
) -> Result<Json<Vec<CommandDescriptor>>, AppError> {
    // any identified caller; the listing only holds their own and public commands
    let commands = state
        .commands
        .get_commands(&workspace_id, &caller.user_id)
        .await?;
    Ok(Json(
        commands
            .into_iter()
            .map(|command| to_descriptor(command, &state.api_base_url, &caller))
            .collect(),
    ))
}

/// PUT /api/command - Update a command created by the caller
pub async fn update_command(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    body: Bytes,
) -> Result<Json<CommandDescriptor>, AppError> {
    caller.require_any(&[roles::USER])?;
    let update = parse_optional_body::<CommandUpdate>(&body)?
        .ok_or_else(|| forbidden("Update required"))?;
    let id = match update.id.as_deref() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return Err(forbidden("Command id required")),
    };
    if update.name.as_deref().is_some_and(str::is_empty) {
        return Err(forbidden("Command name required"));
    }
    if update.command_line.as_deref().is_some_and(str::is_empty) {
        return Err(forbidden("Command line required"));
    }

    let command = state.commands.get_command(&id).await?;
    if command.creator != caller.user_id {
        return Err(AppError::Forbidden(format!(
            "User '{}' doesn't have access to update command '{}'",
            caller.user_id, id
        )));
    }

    state.commands.update(&update).await?;
    let updated = state.commands.get_command(&id).await?;

    info!(command_id = %id, user_id = %caller.user_id, "Updated command");
    Ok(Json(to_descriptor(updated, &state.api_base_url, &caller)))
}

/// DELETE /api/command/:id - Remove a command
pub async fn remove_command(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    caller.require_any(USERS)?;
    let command = state.commands.get_command(&id).await?;
    if command.creator != caller.user_id && !caller.is_privileged() {
        return Err(AppError::Forbidden(format!(
            "User '{}' doesn't have access to remove command '{}'",
            caller.user_id, id
        )));
    }

    state.commands.remove(&id).await?;
    info!(command_id = %id, user_id = %caller.user_id, "Removed command");
    Ok(StatusCode::NO_CONTENT)
}
