//! Account data models
//!
//! Accounts, their members, billing plans and subscriptions.

use crate::error::AppError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form key/value properties of plans and subscriptions
pub type Properties = BTreeMap<String, String>;

/// Lifecycle state of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionState {
    /// Subscription is in effect
    Active,
    /// Subscription was removed
    Inactive,
}

impl SubscriptionState {
    /// Convert the state to its stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::Active => "ACTIVE",
            SubscriptionState::Inactive => "INACTIVE",
        }
    }
}

impl From<&str> for SubscriptionState {
    fn from(s: &str) -> Self {
        match s {
            "ACTIVE" => SubscriptionState::Active,
            _ => SubscriptionState::Inactive,
        }
    }
}

/// How a subscription behaves at the end of its billing contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BillingCycleType {
    /// Renewed automatically for another contract term
    #[default]
    AutoRenew,
    /// Renewed once, then ends
    RenewOnce,
    /// Ends with the contract term
    NoRenewal,
}

impl BillingCycleType {
    /// Convert the type to its stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycleType::AutoRenew => "AutoRenew",
            BillingCycleType::RenewOnce => "RenewOnce",
            BillingCycleType::NoRenewal => "NoRenewal",
        }
    }
}

impl From<&str> for BillingCycleType {
    fn from(s: &str) -> Self {
        match s {
            "RenewOnce" => BillingCycleType::RenewOnce,
            "NoRenewal" => BillingCycleType::NoRenewal,
            _ => BillingCycleType::AutoRenew,
        }
    }
}

/// An account owning subscriptions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for the account
    pub id: String,
    /// Display name of the account
    pub name: String,
}

/// Membership of a user in an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Account the user belongs to
    pub account_id: String,
    /// Member user id
    pub user_id: String,
    /// Account roles, e.g. `account/owner`
    pub roles: Vec<String>,
}

/// A billing plan subscriptions are created from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Unique identifier for the plan
    pub id: String,
    /// Service the plan subscribes to
    pub service_id: String,
    /// Human-readable plan description
    #[serde(default)]
    pub description: String,
    /// Whether subscriptions to this plan are charged
    #[serde(default)]
    pub paid: bool,
    /// Only sales staff may create subscriptions to this plan
    #[serde(default)]
    pub sales_only: bool,
    /// Trial length in days, 0 when the plan has no trial
    #[serde(default)]
    pub trial_duration: i32,
    /// Default subscription properties
    #[serde(default)]
    pub properties: Properties,
    /// Billing cycle length in months
    #[serde(default)]
    pub billing_cycle: i32,
    /// Renewal behaviour
    #[serde(default)]
    pub billing_cycle_type: BillingCycleType,
    /// Contract term in billing cycles
    #[serde(default)]
    pub billing_contract_term: i32,
}

/// A subscription of an account to a service plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Unique identifier for the subscription
    pub id: String,
    /// Subscribed account
    pub account_id: String,
    /// Service the plan belongs to
    pub service_id: String,
    /// Plan the subscription was created from
    pub plan_id: String,
    /// Plan properties, possibly overridden on creation
    pub properties: Properties,
    /// Lifecycle state
    pub state: SubscriptionState,
    /// Description copied from the plan
    pub description: String,
    /// Whether the subscription is charged through the payment system
    pub use_payment_system: bool,
    /// Subscription period start
    pub start_date: Option<DateTime<Utc>>,
    /// Subscription period end
    pub end_date: Option<DateTime<Utc>>,
    /// Trial start, set only for trial subscriptions
    pub trial_start_date: Option<DateTime<Utc>>,
    /// Trial end, set only for trial subscriptions
    pub trial_end_date: Option<DateTime<Utc>>,
    /// Billing period start
    pub billing_start_date: Option<DateTime<Utc>>,
    /// Billing period end
    pub billing_end_date: Option<DateTime<Utc>>,
    /// Next charge date
    pub next_billing_date: Option<DateTime<Utc>>,
    /// Billing cycle length in months
    pub billing_cycle: i32,
    /// Renewal behaviour
    pub billing_cycle_type: BillingCycleType,
    /// Contract term in billing cycles
    pub billing_contract_term: i32,
}

impl Subscription {
    /// Create an active subscription of `account_id` to `plan`
    ///
    /// Service, description and billing terms are copied from the plan.
    /// Dates are left unset.
    pub fn from_plan(
        id: String,
        account_id: String,
        plan: &Plan,
        use_payment_system: bool,
        properties: Properties,
    ) -> Self {
        Self {
            id,
            account_id,
            service_id: plan.service_id.clone(),
            plan_id: plan.id.clone(),
            properties,
            state: SubscriptionState::Active,
            description: plan.description.clone(),
            use_payment_system,
            start_date: None,
            end_date: None,
            trial_start_date: None,
            trial_end_date: None,
            billing_start_date: None,
            billing_end_date: None,
            next_billing_date: None,
            billing_cycle: plan.billing_cycle,
            billing_cycle_type: plan.billing_cycle_type,
            billing_contract_term: plan.billing_contract_term,
        }
    }

    /// Start a trial of `days` days at `now`
    ///
    /// Fails with `Conflict` when the trial would end past the representable
    /// date range.
    pub fn start_trial(&mut self, now: DateTime<Utc>, days: i32) -> Result<(), AppError> {
        let end = trial_end(now, days).ok_or_else(|| {
            AppError::Conflict("Trial duration is out of range".to_string())
        })?;
        self.trial_start_date = Some(now);
        self.trial_end_date = Some(end);
        Ok(())
    }

    /// Whether the subscription is in effect
    pub fn is_active(&self) -> bool {
        self.state == SubscriptionState::Active
    }
}

/// End of a trial of `days` days starting at `now`, if representable
pub fn trial_end(now: DateTime<Utc>, days: i32) -> Option<DateTime<Utc>> {
    now.checked_add_signed(Duration::try_days(i64::from(days))?)
}

/// Resources used by a single workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceResources {
    /// Workspace consuming the resources
    pub workspace_id: String,
    /// Memory used, in megabyte-hours
    pub memory: f64,
}

/// Resources an account used under one subscription
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UsedAccountResources {
    /// Per-workspace usage
    pub used: Vec<WorkspaceResources>,
}
