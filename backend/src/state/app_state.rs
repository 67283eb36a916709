// Application state management
// Holds the DAOs, the subscription service registry and link settings

use crate::account::{
    AccountDao, DefaultSubscriptionService, PlanDao, SqliteAccountDao, SqlitePlanDao,
    SqliteSubscriptionDao, SubscriptionDao, SubscriptionServiceRegistry,
};
use crate::command::{CommandDao, SqliteCommandDao};
use crate::config::Config;
use crate::db::Database;
use crate::error::AppError;
use crate::workspace::{SqliteWorkspaceDao, WorkspaceDao};
use std::collections::HashSet;
use std::sync::Arc;

/// Main application state
/// Shared by all handlers; every DAO is behind a trait object so tests can
/// substitute their own implementations
#[derive(Clone)]
pub struct AppState {
    /// Accounts and memberships
    pub accounts: Arc<dyn AccountDao>,
    /// Billing plans
    pub plans: Arc<dyn PlanDao>,
    /// Account subscriptions
    pub subscriptions: Arc<dyn SubscriptionDao>,
    /// Workspace commands
    pub commands: Arc<dyn CommandDao>,
    /// Workspace memberships
    pub workspaces: Arc<dyn WorkspaceDao>,
    /// Subscribable services
    pub registry: Arc<SubscriptionServiceRegistry>,
    /// Base URL used for hypermedia links, without trailing slash
    pub api_base_url: String,
}

impl AppState {
    /// Create state backed by SQLite DAOs over `db`
    pub fn new(
        db: &Database,
        registry: SubscriptionServiceRegistry,
        api_base_url: impl Into<String>,
    ) -> Self {
        let pool = db.pool().clone();
        Self {
            accounts: Arc::new(SqliteAccountDao::new(pool.clone())),
            plans: Arc::new(SqlitePlanDao::new(pool.clone())),
            subscriptions: Arc::new(SqliteSubscriptionDao::new(pool.clone())),
            commands: Arc::new(SqliteCommandDao::new(pool.clone())),
            workspaces: Arc::new(SqliteWorkspaceDao::new(pool)),
            registry: Arc::new(registry),
            api_base_url: api_base_url.into(),
        }
    }

    /// Create state from configuration, registering the default service
    /// hook for every configured service id
    pub fn from_config(db: &Database, config: &Config) -> Self {
        let mut registry = SubscriptionServiceRegistry::new();
        for service_id in &config.subscriptions.service_ids {
            registry.add(Arc::new(DefaultSubscriptionService::new(service_id.clone())));
        }
        Self::new(db, registry, config.server.api_base_url.clone())
    }

    /// Roles of `user_id` in `account_id`, empty when the user is not a member
    pub async fn account_roles(
        &self,
        account_id: &str,
        user_id: &str,
    ) -> Result<HashSet<String>, AppError> {
        let memberships = self.accounts.get_by_member(user_id).await?;
        Ok(memberships
            .into_iter()
            .find(|membership| membership.account_id == account_id)
            .map(|membership| membership.roles.into_iter().collect())
            .unwrap_or_default())
    }

    /// Roles of `user_id` in `workspace_id`, empty when the user is not a member
    pub async fn workspace_roles(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<HashSet<String>, AppError> {
        self.workspaces.get_roles(workspace_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Account, Member};

    #[tokio::test]
    async fn test_account_roles_resolution() {
        let db = Database::in_memory().await.unwrap();
        let state = AppState::new(&db, SubscriptionServiceRegistry::new(), "http://test/api");

        for id in ["account1", "account2"] {
            state
                .accounts
                .create(&Account {
                    id: id.to_string(),
                    name: id.to_string(),
                })
                .await
                .unwrap();
        }
        state
            .accounts
            .add_member(&Member {
                account_id: "account2".to_string(),
                user_id: "user1".to_string(),
                roles: vec!["account/member".to_string()],
            })
            .await
            .unwrap();

        assert!(state
            .account_roles("account1", "user1")
            .await
            .unwrap()
            .is_empty());
        let roles = state.account_roles("account2", "user1").await.unwrap();
        assert!(roles.contains("account/member"));
        assert_eq!(roles.len(), 1);
    }
}
