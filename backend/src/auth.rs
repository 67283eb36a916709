//! Caller identity and role checks
//!
//! The caller is identified by the `X-User-Id` header; global roles come from
//! `X-User-Roles`. Account and workspace roles are resolved per request from
//! membership data and checked together with the global ones.

use crate::error::AppError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::collections::HashSet;

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the comma separated global roles of the user
pub const USER_ROLES_HEADER: &str = "x-user-roles";

/// Role names used by the services
pub mod roles {
    /// Any registered user
    pub const USER: &str = "user";
    /// Platform administrator
    pub const SYSTEM_ADMIN: &str = "system/admin";
    /// Platform manager (support, sales)
    pub const SYSTEM_MANAGER: &str = "system/manager";
    /// Owner of an account
    pub const ACCOUNT_OWNER: &str = "account/owner";
    /// Member of an account
    pub const ACCOUNT_MEMBER: &str = "account/member";
    /// Administrator of a workspace
    pub const WORKSPACE_ADMIN: &str = "workspace/admin";
    /// Developer in a workspace
    pub const WORKSPACE_DEVELOPER: &str = "workspace/developer";
}

/// Authenticated caller of an API operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Id of the user performing the request
    pub user_id: String,
    /// Global roles of the user
    pub roles: HashSet<String>,
}

impl Caller {
    /// Create a caller with the given global roles
    pub fn new<I, R>(user_id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            user_id: user_id.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the caller holds the given global role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// System admins and managers bypass account ownership checks
    pub fn is_privileged(&self) -> bool {
        self.has_role(roles::SYSTEM_ADMIN) || self.has_role(roles::SYSTEM_MANAGER)
    }

    /// Check that the caller holds at least one of `allowed` as a global role
    pub fn require_any(&self, allowed: &[&str]) -> Result<(), AppError> {
        self.require_any_scoped(&HashSet::new(), allowed)
    }

    /// Check `allowed` against global roles plus roles resolved for the
    /// account or workspace the request targets
    pub fn require_any_scoped(
        &self,
        scoped: &HashSet<String>,
        allowed: &[&str],
    ) -> Result<(), AppError> {
        let permitted = allowed
            .iter()
            .any(|role| self.roles.contains(*role) || scoped.contains(*role));
        if permitted {
            Ok(())
        } else {
            tracing::debug!(
                user_id = %self.user_id,
                allowed = ?allowed,
                "Caller lacks required role"
            );
            Err(AppError::Forbidden("Access denied".to_string()))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::Unauthorized("missing user identity".to_string()))?;

        let roles = parts
            .headers
            .get(USER_ROLES_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|role| !role.is_empty())
                    .map(str::to_string)
                    .collect::<HashSet<_>>()
            })
            .unwrap_or_default();

        Ok(Caller {
            user_id: user_id.to_string(),
            roles,
        })
    }
}
