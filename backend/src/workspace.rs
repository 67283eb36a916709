//! Workspace membership
//!
//! Backs the `workspace/admin` and `workspace/developer` roles checked by the
//! command API.

use crate::db::{from_json, to_json};
use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashSet;

/// Membership of a user in a workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMember {
    /// Workspace id
    pub workspace_id: String,
    /// Member user id
    pub user_id: String,
    /// Workspace roles
    pub roles: Vec<String>,
}

/// Storage of workspace members
#[async_trait]
pub trait WorkspaceDao: Send + Sync {
    /// Add a member, replacing the roles of an existing one
    async fn add_member(&self, member: &WorkspaceMember) -> Result<(), AppError>;

    /// Members of a workspace
    async fn get_members(&self, workspace_id: &str) -> Result<Vec<WorkspaceMember>, AppError>;

    /// Roles of `user_id` in `workspace_id`, empty for non-members
    async fn get_roles(&self, workspace_id: &str, user_id: &str)
        -> Result<HashSet<String>, AppError>;
}

/// Workspace members stored in SQLite
#[derive(Clone)]
pub struct SqliteWorkspaceDao {
    pool: SqlitePool,
}

impl SqliteWorkspaceDao {
    /// Create a DAO over the given pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkspaceDao for SqliteWorkspaceDao {
    async fn add_member(&self, member: &WorkspaceMember) -> Result<(), AppError> {
        sqlx::query(
            "INSERT OR REPLACE INTO workspace_members (workspace_id, user_id, roles) VALUES (?, ?, ?)",
        )
        .bind(&member.workspace_id)
        .bind(&member.user_id)
        .bind(to_json(&member.roles)?)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            "Added member {} to workspace {}",
            member.user_id,
            member.workspace_id
        );
        Ok(())
    }

    async fn get_members(&self, workspace_id: &str) -> Result<Vec<WorkspaceMember>, AppError> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT workspace_id, user_id, roles FROM workspace_members WHERE workspace_id = ? ORDER BY user_id",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(workspace_id, user_id, roles)| {
                Ok(WorkspaceMember {
                    workspace_id,
                    user_id,
                    roles: from_json(&roles)?,
                })
            })
            .collect()
    }

    async fn get_roles(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<HashSet<String>, AppError> {
        let roles: Option<(String,)> = sqlx::query_as(
            "SELECT roles FROM workspace_members WHERE workspace_id = ? AND user_id = ?",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match roles {
            Some((raw,)) => Ok(from_json::<Vec<String>>(&raw)?.into_iter().collect()),
            None => Ok(HashSet::new()),
        }
    }
}
