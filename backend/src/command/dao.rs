//! Command persistence

use crate::command::models::{Command, CommandUpdate, Visibility};
use crate::db::conflict_on_duplicate;
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

/// Storage of workspace commands
#[async_trait]
pub trait CommandDao: Send + Sync {
    /// Store a new command
    async fn create(&self, command: &Command) -> Result<(), AppError>;

    /// Get a command, `NotFound` when it doesn't exist
    async fn get_command(&self, id: &str) -> Result<Command, AppError>;

    /// Commands of a workspace visible to `user_id`: public ones and the
    /// user's own
    async fn get_commands(&self, workspace_id: &str, user_id: &str)
        -> Result<Vec<Command>, AppError>;

    /// Apply the present fields of `update` to the stored command
    async fn update(&self, update: &CommandUpdate) -> Result<(), AppError>;

    /// Delete a command, `NotFound` when it doesn't exist
    async fn remove(&self, id: &str) -> Result<(), AppError>;
}

const COMMAND_COLUMNS: &str =
    "id, name, command_line, creator, workspace_id, visibility, command_type, working_dir";

#[derive(FromRow)]
struct CommandRow {
    id: String,
    name: String,
    command_line: String,
    creator: String,
    workspace_id: String,
    visibility: String,
    command_type: Option<String>,
    working_dir: Option<String>,
}

impl From<CommandRow> for Command {
    fn from(row: CommandRow) -> Self {
        Command {
            id: row.id,
            name: row.name,
            command_line: row.command_line,
            creator: row.creator,
            workspace_id: row.workspace_id,
            visibility: Visibility::from(row.visibility.as_str()),
            command_type: row.command_type,
            working_dir: row.working_dir,
        }
    }
}

/// Commands stored in SQLite
#[derive(Clone)]
pub struct SqliteCommandDao {
    pool: SqlitePool,
}

impl SqliteCommandDao {
    /// Create a DAO over the given pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommandDao for SqliteCommandDao {
    async fn create(&self, command: &Command) -> Result<(), AppError> {
        sqlx::query(&format!(
            "INSERT INTO commands ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            COMMAND_COLUMNS
        ))
        .bind(&command.id)
        .bind(&command.name)
        .bind(&command.command_line)
        .bind(&command.creator)
        .bind(&command.workspace_id)
        .bind(command.visibility.as_str())
        .bind(&command.command_type)
        .bind(&command.working_dir)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_duplicate(
                e,
                format!("Command '{}' already exists", command.id),
            )
        })?;

        debug!(
            "Created command {} in workspace {}",
            command.id, command.workspace_id
        );
        Ok(())
    }

    async fn get_command(&self, id: &str) -> Result<Command, AppError> {
        let row = sqlx::query_as::<_, CommandRow>(&format!(
            "SELECT {} FROM commands WHERE id = ?",
            COMMAND_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Command::from)
            .ok_or_else(|| AppError::NotFound(format!("Command '{}' not found", id)))
    }

    async fn get_commands(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Vec<Command>, AppError> {
        let rows = sqlx::query_as::<_, CommandRow>(&format!(
            "SELECT {} FROM commands WHERE workspace_id = ? AND (visibility = ? OR creator = ?) ORDER BY name, id",
            COMMAND_COLUMNS
        ))
        .bind(workspace_id)
        .bind(Visibility::Public.as_str())
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Command::from).collect())
    }

    async fn update(&self, update: &CommandUpdate) -> Result<(), AppError> {
        let id = update
            .id
            .as_deref()
            .ok_or_else(|| AppError::Conflict("Command id required".to_string()))?;
        let mut command = self.get_command(id).await?;
        command.apply(update);

        sqlx::query(
            "UPDATE commands SET name = ?, command_line = ?, visibility = ?, command_type = ?, working_dir = ? WHERE id = ?",
        )
        .bind(&command.name)
        .bind(&command.command_line)
        .bind(command.visibility.as_str())
        .bind(&command.command_type)
        .bind(&command.working_dir)
        .bind(&command.id)
        .execute(&self.pool)
        .await?;

        debug!("Updated command: {}", command.id);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM commands WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Command '{}' not found", id)));
        }

        debug!("Removed command: {}", id);
        Ok(())
    }
}
