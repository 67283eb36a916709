//! Persistence interfaces for accounts, plans and subscriptions

use crate::account::models::{Account, Member, Plan, Subscription};
use crate::error::AppError;
use async_trait::async_trait;

/// Storage of accounts and their members
#[async_trait]
pub trait AccountDao: Send + Sync {
    /// Store a new account
    async fn create(&self, account: &Account) -> Result<(), AppError>;

    /// Get an account, `NotFound` when it doesn't exist
    async fn get_by_id(&self, id: &str) -> Result<Account, AppError>;

    /// Add a user to an account, replacing the roles of an existing member
    async fn add_member(&self, member: &Member) -> Result<(), AppError>;

    /// Members of an account
    async fn get_members(&self, account_id: &str) -> Result<Vec<Member>, AppError>;

    /// Memberships of a user across all accounts
    async fn get_by_member(&self, user_id: &str) -> Result<Vec<Member>, AppError>;
}

/// Storage of billing plans
#[async_trait]
pub trait PlanDao: Send + Sync {
    /// Store a new plan
    async fn create(&self, plan: &Plan) -> Result<(), AppError>;

    /// Get a plan, `NotFound` when it doesn't exist
    async fn get_plan_by_id(&self, plan_id: &str) -> Result<Plan, AppError>;

    /// All plans ordered by id
    async fn get_plans(&self) -> Result<Vec<Plan>, AppError>;
}

/// Storage of account subscriptions
#[async_trait]
pub trait SubscriptionDao: Send + Sync {
    /// Add a subscription to an existing account
    ///
    /// An account holds at most one active subscription per service.
    async fn add_subscription(&self, subscription: &Subscription) -> Result<(), AppError>;

    /// Get a subscription, `NotFound` when it doesn't exist
    async fn get_subscription_by_id(&self, subscription_id: &str)
        -> Result<Subscription, AppError>;

    /// Active subscriptions of an account, empty when there are none
    async fn get_active_subscriptions(&self, account_id: &str)
        -> Result<Vec<Subscription>, AppError>;

    /// Active subscription of an account to the given service
    async fn get_active_subscription(
        &self,
        account_id: &str,
        service_id: &str,
    ) -> Result<Option<Subscription>, AppError>;

    /// Replace a stored subscription
    async fn update_subscription(&self, subscription: &Subscription) -> Result<(), AppError>;

    /// Delete a subscription permanently
    async fn remove_subscription(&self, subscription_id: &str) -> Result<(), AppError>;
}
