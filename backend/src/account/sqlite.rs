//! SQLite implementations of the account DAOs

use crate::account::dao::{AccountDao, PlanDao, SubscriptionDao};
use crate::account::models::{
    Account, BillingCycleType, Member, Plan, Properties, Subscription, SubscriptionState,
};
use crate::db::{conflict_on_duplicate, from_json, to_json};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

const SUBSCRIPTION_COLUMNS: &str = "id, account_id, service_id, plan_id, properties, state, \
     description, use_payment_system, start_date, end_date, trial_start_date, trial_end_date, \
     billing_start_date, billing_end_date, next_billing_date, billing_cycle, billing_cycle_type, \
     billing_contract_term";

const PLAN_COLUMNS: &str = "id, service_id, description, paid, sales_only, trial_duration, \
     properties, billing_cycle, billing_cycle_type, billing_contract_term";

fn to_timestamp(date: Option<DateTime<Utc>>) -> Option<i64> {
    date.map(|d| d.timestamp())
}

fn from_timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

#[derive(FromRow)]
struct MemberRow {
    account_id: String,
    user_id: String,
    roles: String,
}

impl TryFrom<MemberRow> for Member {
    type Error = AppError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        Ok(Member {
            account_id: row.account_id,
            user_id: row.user_id,
            roles: from_json(&row.roles)?,
        })
    }
}

#[derive(FromRow)]
struct PlanRow {
    id: String,
    service_id: String,
    description: String,
    paid: bool,
    sales_only: bool,
    trial_duration: i32,
    properties: String,
    billing_cycle: i32,
    billing_cycle_type: String,
    billing_contract_term: i32,
}

impl TryFrom<PlanRow> for Plan {
    type Error = AppError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        Ok(Plan {
            id: row.id,
            service_id: row.service_id,
            description: row.description,
            paid: row.paid,
            sales_only: row.sales_only,
            trial_duration: row.trial_duration,
            properties: from_json(&row.properties)?,
            billing_cycle: row.billing_cycle,
            billing_cycle_type: BillingCycleType::from(row.billing_cycle_type.as_str()),
            billing_contract_term: row.billing_contract_term,
        })
    }
}

#[derive(FromRow)]
struct SubscriptionRow {
    id: String,
    account_id: String,
    service_id: String,
    plan_id: String,
    properties: String,
    state: String,
    description: String,
    use_payment_system: bool,
    start_date: Option<i64>,
    end_date: Option<i64>,
    trial_start_date: Option<i64>,
    trial_end_date: Option<i64>,
    billing_start_date: Option<i64>,
    billing_end_date: Option<i64>,
    next_billing_date: Option<i64>,
    billing_cycle: i32,
    billing_cycle_type: String,
    billing_contract_term: i32,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = AppError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let properties: Properties = from_json(&row.properties)?;
        Ok(Subscription {
            id: row.id,
            account_id: row.account_id,
            service_id: row.service_id,
            plan_id: row.plan_id,
            properties,
            state: SubscriptionState::from(row.state.as_str()),
            description: row.description,
            use_payment_system: row.use_payment_system,
            start_date: from_timestamp(row.start_date),
            end_date: from_timestamp(row.end_date),
            trial_start_date: from_timestamp(row.trial_start_date),
            trial_end_date: from_timestamp(row.trial_end_date),
            billing_start_date: from_timestamp(row.billing_start_date),
            billing_end_date: from_timestamp(row.billing_end_date),
            next_billing_date: from_timestamp(row.next_billing_date),
            billing_cycle: row.billing_cycle,
            billing_cycle_type: BillingCycleType::from(row.billing_cycle_type.as_str()),
            billing_contract_term: row.billing_contract_term,
        })
    }
}

/// Accounts and members stored in SQLite
#[derive(Clone)]
pub struct SqliteAccountDao {
    pool: SqlitePool,
}

impl SqliteAccountDao {
    /// Create a DAO over the given pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountDao for SqliteAccountDao {
    async fn create(&self, account: &Account) -> Result<(), AppError> {
        sqlx::query("INSERT INTO accounts (id, name) VALUES (?, ?)")
            .bind(&account.id)
            .bind(&account.name)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                conflict_on_duplicate(e, format!("Account '{}' already exists", account.id))
            })?;

        debug!("Created account: {}", account.id);
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Account, AppError> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id, name FROM accounts WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(id, name)| Account { id, name })
            .ok_or_else(|| AppError::NotFound(format!("Account '{}' not found", id)))
    }

    async fn add_member(&self, member: &Member) -> Result<(), AppError> {
        self.get_by_id(&member.account_id).await?;

        sqlx::query(
            "INSERT OR REPLACE INTO account_members (account_id, user_id, roles) VALUES (?, ?, ?)",
        )
        .bind(&member.account_id)
        .bind(&member.user_id)
        .bind(to_json(&member.roles)?)
        .execute(&self.pool)
        .await?;

        debug!(
            "Added member {} to account {}",
            member.user_id, member.account_id
        );
        Ok(())
    }

    async fn get_members(&self, account_id: &str) -> Result<Vec<Member>, AppError> {
        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT account_id, user_id, roles FROM account_members WHERE account_id = ? ORDER BY user_id",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Member::try_from).collect()
    }

    async fn get_by_member(&self, user_id: &str) -> Result<Vec<Member>, AppError> {
        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT account_id, user_id, roles FROM account_members WHERE user_id = ? ORDER BY account_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Member::try_from).collect()
    }
}

/// Billing plans stored in SQLite
#[derive(Clone)]
pub struct SqlitePlanDao {
    pool: SqlitePool,
}

impl SqlitePlanDao {
    /// Create a DAO over the given pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanDao for SqlitePlanDao {
    async fn create(&self, plan: &Plan) -> Result<(), AppError> {
        sqlx::query(&format!(
            "INSERT INTO plans ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            PLAN_COLUMNS
        ))
        .bind(&plan.id)
        .bind(&plan.service_id)
        .bind(&plan.description)
        .bind(plan.paid)
        .bind(plan.sales_only)
        .bind(plan.trial_duration)
        .bind(to_json(&plan.properties)?)
        .bind(plan.billing_cycle)
        .bind(plan.billing_cycle_type.as_str())
        .bind(plan.billing_contract_term)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, format!("Plan '{}' already exists", plan.id)))?;

        debug!("Created plan: {}", plan.id);
        Ok(())
    }

    async fn get_plan_by_id(&self, plan_id: &str) -> Result<Plan, AppError> {
        let row = sqlx::query_as::<_, PlanRow>(&format!(
            "SELECT {} FROM plans WHERE id = ?",
            PLAN_COLUMNS
        ))
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Plan::try_from(row),
            None => Err(AppError::NotFound(format!(
                "Plan with id {} was not found",
                plan_id
            ))),
        }
    }

    async fn get_plans(&self) -> Result<Vec<Plan>, AppError> {
        let rows = sqlx::query_as::<_, PlanRow>(&format!(
            "SELECT {} FROM plans ORDER BY id",
            PLAN_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Plan::try_from).collect()
    }
}

/// Subscriptions stored in SQLite
#[derive(Clone)]
pub struct SqliteSubscriptionDao {
    pool: SqlitePool,
}

impl SqliteSubscriptionDao {
    /// Create a DAO over the given pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn already_active(subscription: &Subscription) -> String {
        format!(
            "Account '{}' already has an active subscription to service '{}'",
            subscription.account_id, subscription.service_id
        )
    }

    /// Bind every column of `subscription`, id last
    ///
    /// Unique violations are reported as `Conflict`: the partial index on
    /// active subscriptions rejects a second active one per service.
    async fn write(&self, statement: &str, subscription: &Subscription) -> Result<u64, AppError> {
        let result = sqlx::query(statement)
            .bind(&subscription.account_id)
            .bind(&subscription.service_id)
            .bind(&subscription.plan_id)
            .bind(to_json(&subscription.properties)?)
            .bind(subscription.state.as_str())
            .bind(&subscription.description)
            .bind(subscription.use_payment_system)
            .bind(to_timestamp(subscription.start_date))
            .bind(to_timestamp(subscription.end_date))
            .bind(to_timestamp(subscription.trial_start_date))
            .bind(to_timestamp(subscription.trial_end_date))
            .bind(to_timestamp(subscription.billing_start_date))
            .bind(to_timestamp(subscription.billing_end_date))
            .bind(to_timestamp(subscription.next_billing_date))
            .bind(subscription.billing_cycle)
            .bind(subscription.billing_cycle_type.as_str())
            .bind(subscription.billing_contract_term)
            .bind(&subscription.id)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_on_duplicate(e, Self::already_active(subscription)))?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SubscriptionDao for SqliteSubscriptionDao {
    async fn add_subscription(&self, subscription: &Subscription) -> Result<(), AppError> {
        let (accounts,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts WHERE id = ?")
            .bind(&subscription.account_id)
            .fetch_one(&self.pool)
            .await?;
        if accounts == 0 {
            return Err(AppError::NotFound(format!(
                "Account '{}' not found",
                subscription.account_id
            )));
        }

        // concurrent inserts are caught by idx_subscriptions_active
        if subscription.is_active()
            && self
                .get_active_subscription(&subscription.account_id, &subscription.service_id)
                .await?
                .is_some()
        {
            return Err(AppError::Conflict(Self::already_active(subscription)));
        }

        self.write(
            "INSERT INTO subscriptions (account_id, service_id, plan_id, properties, state, \
             description, use_payment_system, start_date, end_date, trial_start_date, \
             trial_end_date, billing_start_date, billing_end_date, next_billing_date, \
             billing_cycle, billing_cycle_type, billing_contract_term, id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            subscription,
        )
        .await?;

        debug!(
            "Added subscription {} to account {}",
            subscription.id, subscription.account_id
        );
        Ok(())
    }

    async fn get_subscription_by_id(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, AppError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {} FROM subscriptions WHERE id = ?",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Subscription::try_from(row),
            None => Err(AppError::NotFound(format!(
                "Subscription not found {}",
                subscription_id
            ))),
        }
    }

    async fn get_active_subscriptions(
        &self,
        account_id: &str,
    ) -> Result<Vec<Subscription>, AppError> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {} FROM subscriptions WHERE account_id = ? AND state = ? ORDER BY service_id, id",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(account_id)
        .bind(SubscriptionState::Active.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Subscription::try_from).collect()
    }

    async fn get_active_subscription(
        &self,
        account_id: &str,
        service_id: &str,
    ) -> Result<Option<Subscription>, AppError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {} FROM subscriptions WHERE account_id = ? AND service_id = ? AND state = ? LIMIT 1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(account_id)
        .bind(service_id)
        .bind(SubscriptionState::Active.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Subscription::try_from).transpose()
    }

    async fn update_subscription(&self, subscription: &Subscription) -> Result<(), AppError> {
        let updated = self
            .write(
                "UPDATE subscriptions SET account_id = ?, service_id = ?, plan_id = ?, \
                 properties = ?, state = ?, description = ?, use_payment_system = ?, \
                 start_date = ?, end_date = ?, trial_start_date = ?, trial_end_date = ?, \
                 billing_start_date = ?, billing_end_date = ?, next_billing_date = ?, \
                 billing_cycle = ?, billing_cycle_type = ?, billing_contract_term = ? \
                 WHERE id = ?",
                subscription,
            )
            .await?;

        if updated == 0 {
            return Err(AppError::NotFound(format!(
                "Subscription not found {}",
                subscription.id
            )));
        }

        debug!("Updated subscription: {}", subscription.id);
        Ok(())
    }

    async fn remove_subscription(&self, subscription_id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = ?")
            .bind(subscription_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Subscription not found {}",
                subscription_id
            )));
        }

        debug!("Removed subscription: {}", subscription_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> (SqliteAccountDao, SqlitePlanDao, SqliteSubscriptionDao) {
        let db = Database::in_memory().await.unwrap();
        let pool = db.pool().clone();
        let accounts = SqliteAccountDao::new(pool.clone());
        accounts
            .create(&Account {
                id: "account1".to_string(),
                name: "Acme".to_string(),
            })
            .await
            .unwrap();
        (
            accounts,
            SqlitePlanDao::new(pool.clone()),
            SqliteSubscriptionDao::new(pool),
        )
    }

    fn plan(id: &str, service_id: &str) -> Plan {
        Plan {
            id: id.to_string(),
            service_id: service_id.to_string(),
            description: "Team plan".to_string(),
            paid: true,
            sales_only: false,
            trial_duration: 7,
            properties: [("RAM".to_string(), "4096".to_string())].into(),
            billing_cycle: 1,
            billing_cycle_type: BillingCycleType::RenewOnce,
            billing_contract_term: 12,
        }
    }

    fn subscription(id: &str, plan: &Plan) -> Subscription {
        Subscription::from_plan(
            id.to_string(),
            "account1".to_string(),
            plan,
            true,
            plan.properties.clone(),
        )
    }

    #[tokio::test]
    async fn test_members_round_trip() {
        let (accounts, _, _) = setup().await;
        accounts
            .add_member(&Member {
                account_id: "account1".to_string(),
                user_id: "user1".to_string(),
                roles: vec!["account/owner".to_string()],
            })
            .await
            .unwrap();

        let memberships = accounts.get_by_member("user1").await.unwrap();
        assert_eq!(memberships.len(), 1);
        assert_eq!(memberships[0].roles, vec!["account/owner"]);
        assert_eq!(accounts.get_members("account1").await.unwrap().len(), 1);
        assert!(accounts.get_by_member("user2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_account_is_conflict() {
        let (accounts, _, _) = setup().await;
        let err = accounts
            .create(&Account {
                id: "account1".to_string(),
                name: "Again".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_plan_lookup() {
        let (_, plans, _) = setup().await;
        plans.create(&plan("plan1", "Saas")).await.unwrap();

        let stored = plans.get_plan_by_id("plan1").await.unwrap();
        assert_eq!(stored, plan("plan1", "Saas"));
        assert!(matches!(
            plans.get_plan_by_id("missing").await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(plans.get_plans().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_subscription_lifecycle() {
        let (_, _, subscriptions) = setup().await;
        let plan = plan("plan1", "Saas");
        let mut subscription = subscription("subscription1", &plan);
        subscription.start_trial(Utc::now(), 7).unwrap();
        subscriptions.add_subscription(&subscription).await.unwrap();

        let stored = subscriptions
            .get_subscription_by_id("subscription1")
            .await
            .unwrap();
        assert_eq!(stored.properties, plan.properties);
        assert!(stored.trial_end_date.is_some());
        assert!(stored.start_date.is_none());

        let active = subscriptions
            .get_active_subscription("account1", "Saas")
            .await
            .unwrap();
        assert_eq!(active.map(|s| s.id), Some("subscription1".to_string()));

        let mut inactive = stored.clone();
        inactive.state = SubscriptionState::Inactive;
        subscriptions.update_subscription(&inactive).await.unwrap();
        assert!(subscriptions
            .get_active_subscriptions("account1")
            .await
            .unwrap()
            .is_empty());

        subscriptions
            .remove_subscription("subscription1")
            .await
            .unwrap();
        assert!(matches!(
            subscriptions.get_subscription_by_id("subscription1").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_second_active_subscription_to_service_is_conflict() {
        let (_, _, subscriptions) = setup().await;
        let plan = plan("plan1", "Saas");
        subscriptions
            .add_subscription(&subscription("subscription1", &plan))
            .await
            .unwrap();

        let err = subscriptions
            .add_subscription(&subscription("subscription2", &plan))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_reactivating_second_subscription_is_conflict() {
        let (_, _, subscriptions) = setup().await;
        let plan = plan("plan1", "Saas");
        let mut second = subscription("subscription2", &plan);
        second.state = SubscriptionState::Inactive;
        subscriptions.add_subscription(&second).await.unwrap();
        subscriptions
            .add_subscription(&subscription("subscription1", &plan))
            .await
            .unwrap();

        second.state = SubscriptionState::Active;
        let err = subscriptions.update_subscription(&second).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Account 'account1' already has an active subscription to service 'Saas'"
        );
        assert_eq!(
            subscriptions
                .get_active_subscriptions("account1")
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_subscription_for_unknown_account_is_not_found() {
        let (_, _, subscriptions) = setup().await;
        let mut subscription = subscription("subscription1", &plan("plan1", "Saas"));
        subscription.account_id = "ghost".to_string();
        assert!(matches!(
            subscriptions.add_subscription(&subscription).await,
            Err(AppError::NotFound(_))
        ));
    }
}
