//! Account and plan API handlers
//!
//! Contains HTTP request handlers for accounts, their members and the
//! billing plans subscriptions are created from.

use crate::account::models::trial_end;
use crate::account::{Account, Member, Plan};
use crate::auth::{roles, Caller};
use crate::error::AppError;
use crate::ids::{self, ID_LENGTH};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

const ACCOUNT_ROLES: &[&str] = &[roles::ACCOUNT_OWNER, roles::ACCOUNT_MEMBER];

const USERS: &[&str] = &[roles::USER, roles::SYSTEM_ADMIN, roles::SYSTEM_MANAGER];

/// Create account request
#[derive(Deserialize)]
pub struct CreateAccountRequest {
    /// Display name of the new account
    pub name: String,
}

/// Add member request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    /// User to add
    pub user_id: String,
    /// Account roles to grant
    pub roles: Vec<String>,
}

/// POST /api/account - Create an account owned by the caller
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    caller.require_any(USERS)?;
    if request.name.trim().is_empty() {
        return Err(AppError::Conflict("Account name required".to_string()));
    }

    let account = Account {
        id: ids::generate("account", ID_LENGTH),
        name: request.name,
    };
    state.accounts.create(&account).await?;
    state
        .accounts
        .add_member(&Member {
            account_id: account.id.clone(),
            user_id: caller.user_id.clone(),
            roles: vec![roles::ACCOUNT_OWNER.to_string()],
        })
        .await?;

    info!(account_id = %account.id, user_id = %caller.user_id, "Created account");
    Ok((StatusCode::CREATED, Json(account)))
}

/// GET /api/account/:account_id - Get an account
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(account_id): Path<String>,
) -> Result<Json<Account>, AppError> {
    let account_roles = state.account_roles(&account_id, &caller.user_id).await?;
    caller.require_any_scoped(
        &account_roles,
        &[
            roles::ACCOUNT_OWNER,
            roles::ACCOUNT_MEMBER,
            roles::SYSTEM_ADMIN,
            roles::SYSTEM_MANAGER,
        ],
    )?;
    Ok(Json(state.accounts.get_by_id(&account_id).await?))
}

/// GET /api/account/:account_id/members - Members of an account
pub async fn get_members(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(account_id): Path<String>,
) -> Result<Json<Vec<Member>>, AppError> {
    let account_roles = state.account_roles(&account_id, &caller.user_id).await?;
    caller.require_any_scoped(
        &account_roles,
        &[roles::ACCOUNT_OWNER, roles::SYSTEM_ADMIN, roles::SYSTEM_MANAGER],
    )?;
    state.accounts.get_by_id(&account_id).await?;
    Ok(Json(state.accounts.get_members(&account_id).await?))
}

/// POST /api/account/:account_id/members - Add a member to an account
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(account_id): Path<String>,
    Json(request): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<Member>), AppError> {
    let account_roles = state.account_roles(&account_id, &caller.user_id).await?;
    caller.require_any_scoped(&account_roles, &[roles::ACCOUNT_OWNER, roles::SYSTEM_ADMIN])?;
    state.accounts.get_by_id(&account_id).await?;

    if request.roles.is_empty() {
        return Err(AppError::Conflict("Member roles required".to_string()));
    }
    if let Some(role) = request
        .roles
        .iter()
        .find(|role| !ACCOUNT_ROLES.contains(&role.as_str()))
    {
        return Err(AppError::Conflict(format!("Unknown account role {}", role)));
    }

    let member = Member {
        account_id,
        user_id: request.user_id,
        roles: request.roles,
    };
    state.accounts.add_member(&member).await?;

    info!(
        account_id = %member.account_id,
        member_id = %member.user_id,
        user_id = %caller.user_id,
        "Added account member"
    );
    Ok((StatusCode::CREATED, Json(member)))
}

/// GET /api/account/plans - List billing plans
pub async fn list_plans(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Vec<Plan>>, AppError> {
    caller.require_any(USERS)?;
    Ok(Json(state.plans.get_plans().await?))
}

/// GET /api/account/plans/:plan_id - Get a billing plan
pub async fn get_plan(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(plan_id): Path<String>,
) -> Result<Json<Plan>, AppError> {
    caller.require_any(USERS)?;
    Ok(Json(state.plans.get_plan_by_id(&plan_id).await?))
}

/// POST /api/account/plans - Create a billing plan
pub async fn create_plan(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(plan): Json<Plan>,
) -> Result<(StatusCode, Json<Plan>), AppError> {
    caller.require_any(&[roles::SYSTEM_ADMIN])?;
    if plan.id.is_empty() {
        return Err(AppError::Conflict("Plan identifier required".to_string()));
    }
    if state.registry.get(&plan.service_id).is_none() {
        return Err(AppError::Conflict("Unknown serviceId is used".to_string()));
    }
    // trials started from this plan must end within the representable dates
    if plan.trial_duration < 0 || trial_end(Utc::now(), plan.trial_duration).is_none() {
        return Err(AppError::Conflict(
            "Trial duration is out of range".to_string(),
        ));
    }

    state.plans.create(&plan).await?;
    info!(plan_id = %plan.id, service_id = %plan.service_id, "Created plan");
    Ok((StatusCode::CREATED, Json(plan)))
}
