//! Database connection and migrations
//!
//! Owns the SQLite pool shared by all DAO implementations.

use crate::error::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_create_accounts",
        include_str!("../migrations/001_create_accounts.sql"),
    ),
    (
        "002_create_commands",
        include_str!("../migrations/002_create_commands.sql"),
    ),
];

/// Database connection pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Initialize database connection pool
    ///
    /// # Arguments
    /// * `db_url` - `sqlite:` URL or path to the SQLite database file
    ///
    /// # Returns
    /// * `Ok(Database)` if successful
    /// * `Err(AppError)` if connection or migration failed
    pub async fn new(db_url: &str) -> Result<Self, AppError> {
        let file_path = db_url.strip_prefix("sqlite:").unwrap_or(db_url);
        let file_path = file_path.strip_prefix("//").unwrap_or(file_path);
        let in_memory = file_path.starts_with(":memory:");

        // Ensure parent directory exists
        if !in_memory {
            if let Some(parent) = Path::new(file_path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Internal(anyhow::anyhow!("Failed to create db directory: {}", e))
                })?;
            }
        }

        // SQLite connection string format: sqlite://path/to/db.db
        let connection_string = if db_url.starts_with("sqlite:") {
            db_url.to_string()
        } else {
            format!("sqlite:{}", db_url)
        };

        let options = SqliteConnectOptions::from_str(&connection_string)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid database path: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` opens a fresh database, so keep
        // exactly one connection alive for the lifetime of the pool.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to connect to database: {}", e))
        })?;

        info!("Connected to SQLite database at: {}", db_url);

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Open a private in-memory database with all migrations applied
    pub async fn in_memory() -> Result<Self, AppError> {
        Self::new("sqlite::memory:").await
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations...");

        for (name, migration_sql) in MIGRATIONS {
            for statement in split_statements(migration_sql) {
                sqlx::query(&statement)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| {
                        AppError::Internal(anyhow::anyhow!(
                            "Migration {} failed: {} - Statement: {}",
                            name,
                            e,
                            statement.chars().take(100).collect::<String>()
                        ))
                    })?;
            }
            tracing::debug!(migration = %name, "Applied migration");
        }

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the database pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Map a unique constraint violation to `Conflict`, anything else passes through
pub fn conflict_on_duplicate(err: sqlx::Error, message: String) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(message)
        }
        _ => AppError::Database(err),
    }
}

/// Serialize a value into a JSON text column
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize column: {}", e)))
}

/// Deserialize a JSON text column
pub fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, AppError> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Corrupted JSON column: {}", e)))
}

/// Strip `--` comments and split a migration script into statements
fn split_statements(migration_sql: &str) -> Vec<String> {
    let mut cleaned_sql = String::new();
    for line in migration_sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        let without_comments = match trimmed.find("--") {
            Some(comment_pos) => &trimmed[..comment_pos],
            None => trimmed,
        };
        cleaned_sql.push_str(without_comments.trim());
        cleaned_sql.push(' ');
    }

    cleaned_sql
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
