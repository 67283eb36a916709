//! Account module
//!
//! Accounts, billing plans and subscriptions, with their SQLite storage and
//! the registry of subscribable services.

pub mod dao;
pub mod descriptor;
pub mod models;
pub mod registry;
pub mod sqlite;

pub use dao::{AccountDao, PlanDao, SubscriptionDao};
pub use descriptor::{SubscriptionDescriptor, SubscriptionReference, SubscriptionResourcesUsed};
pub use models::{
    Account, BillingCycleType, Member, Plan, Properties, Subscription, SubscriptionState,
    UsedAccountResources, WorkspaceResources,
};
pub use registry::{DefaultSubscriptionService, SubscriptionService, SubscriptionServiceRegistry};
pub use sqlite::{SqliteAccountDao, SqlitePlanDao, SqliteSubscriptionDao};
