//! Subscription API handlers
//!
//! Lists, creates and removes account subscriptions and reports the
//! resources used under them.

use crate::account::descriptor::{to_descriptor, to_reference};
use crate::account::{
    Properties, Subscription, SubscriptionDescriptor, SubscriptionResourcesUsed,
    SubscriptionService, SubscriptionState,
};
use crate::api::utils::{parse_optional_body, required};
use crate::auth::{roles, Caller};
use crate::error::AppError;
use crate::ids::{self, ID_LENGTH};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Query of the subscription list
#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionsQuery {
    /// Only return the active subscription to this service
    pub service: Option<String>,
}

/// Query of the resources report
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesQuery {
    /// Only report resources of this service
    pub service_id: Option<String>,
}

/// Create subscription request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubscription {
    /// Account to subscribe
    pub account_id: Option<String>,
    /// Plan to subscribe to
    pub plan_id: Option<String>,
    /// Charge the subscription through the payment system
    pub use_payment_system: Option<bool>,
    /// Trial length in days, 0 or absent for no trial
    pub trial_duration: Option<i32>,
    /// Overrides of plan properties
    #[serde(default)]
    pub properties: Properties,
}

const ACCOUNT_READERS: &[&str] = &[
    roles::ACCOUNT_MEMBER,
    roles::ACCOUNT_OWNER,
    roles::SYSTEM_ADMIN,
    roles::SYSTEM_MANAGER,
];

const USERS: &[&str] = &[roles::USER, roles::SYSTEM_ADMIN, roles::SYSTEM_MANAGER];

const NOT_AUTHORIZED_FOR_SUBSCRIPTION: &str =
    "User not authorized to add this subscription, please contact support";

fn unknown_service() -> AppError {
    AppError::Conflict("Unknown serviceId is used".to_string())
}

/// GET /api/account/:account_id/subscriptions - Active subscriptions of an account
pub async fn get_subscriptions(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(account_id): Path<String>,
    Query(query): Query<SubscriptionsQuery>,
) -> Result<Json<Vec<SubscriptionDescriptor>>, AppError> {
    let account_roles = state.account_roles(&account_id, &caller.user_id).await?;
    caller.require_any_scoped(&account_roles, ACCOUNT_READERS)?;
    state.accounts.get_by_id(&account_id).await?;

    let subscriptions = match query.service.as_deref().filter(|s| !s.is_empty()) {
        None => state.subscriptions.get_active_subscriptions(&account_id).await?,
        Some(service_id) => state
            .subscriptions
            .get_active_subscription(&account_id, service_id)
            .await?
            .into_iter()
            .collect(),
    };

    let descriptors = subscriptions
        .iter()
        .map(|s| to_descriptor(s, &state.api_base_url, &caller, &account_roles))
        .collect();
    Ok(Json(descriptors))
}

/// GET /api/account/subscriptions/:subscription_id - Get a specific subscription
pub async fn get_subscription_by_id(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(subscription_id): Path<String>,
) -> Result<Json<SubscriptionDescriptor>, AppError> {
    caller.require_any(USERS)?;
    let subscription = state
        .subscriptions
        .get_subscription_by_id(&subscription_id)
        .await?;

    let mut account_roles = HashSet::new();
    if !caller.is_privileged() {
        account_roles = state
            .account_roles(&subscription.account_id, &caller.user_id)
            .await?;
        if !account_roles.contains(roles::ACCOUNT_OWNER)
            && !account_roles.contains(roles::ACCOUNT_MEMBER)
        {
            return Err(AppError::Forbidden("Access denied".to_string()));
        }
    }

    Ok(Json(to_descriptor(
        &subscription,
        &state.api_base_url,
        &caller,
        &account_roles,
    )))
}

/// POST /api/account/subscriptions - Add a subscription to an account
pub async fn add_subscription(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    body: Bytes,
) -> Result<(StatusCode, Json<SubscriptionDescriptor>), AppError> {
    caller.require_any(USERS)?;
    let new_subscription = required(
        parse_optional_body::<NewSubscription>(&body)?,
        "New subscription",
    )?;
    let account_id = required(new_subscription.account_id, "Account identifier")?;
    let plan_id = required(new_subscription.plan_id, "Plan identifier")?;
    let mut use_payment_system =
        required(new_subscription.use_payment_system, "Use payment system")?;
    let trial_duration = new_subscription.trial_duration.filter(|days| *days != 0);

    let mut account_roles = HashSet::new();
    if !caller.is_privileged() {
        account_roles = state.account_roles(&account_id, &caller.user_id).await?;
        if !account_roles.contains(roles::ACCOUNT_OWNER) {
            return Err(AppError::Forbidden("Access denied".to_string()));
        }
    }
    if trial_duration.is_some_and(|days| days < 0) {
        return Err(AppError::Conflict(
            "Trial duration must not be negative".to_string(),
        ));
    }

    let plan = state.plans.get_plan_by_id(&plan_id).await?;
    let service = state
        .registry
        .get(&plan.service_id)
        .ok_or_else(unknown_service)?;

    if !caller.is_privileged() {
        if plan.sales_only {
            return Err(AppError::Forbidden(
                NOT_AUTHORIZED_FOR_SUBSCRIPTION.to_string(),
            ));
        }
        // only system users may disable payment on paid plans
        if use_payment_system != plan.paid {
            return Err(AppError::Conflict(
                "Given value of attribute usePaymentSystem is not allowed".to_string(),
            ));
        }
        if trial_duration.is_some_and(|days| days != plan.trial_duration) {
            return Err(AppError::Conflict(
                NOT_AUTHORIZED_FOR_SUBSCRIPTION.to_string(),
            ));
        }
        if !new_subscription.properties.is_empty() {
            return Err(AppError::Forbidden(
                "User not authorized to add subscription with custom properties, please contact support"
                    .to_string(),
            ));
        }
    }

    if !plan.paid {
        use_payment_system = false;
    }

    let mut properties = plan.properties.clone();
    for (key, value) in new_subscription.properties {
        match properties.get_mut(&key) {
            Some(existing) => *existing = value,
            None => {
                return Err(AppError::Forbidden(
                    "Forbidden overriding of non-existent plan properties".to_string(),
                ))
            }
        }
    }

    let mut subscription = Subscription::from_plan(
        ids::generate("subscription", ID_LENGTH),
        account_id,
        &plan,
        use_payment_system,
        properties,
    );
    if let Some(days) = trial_duration {
        subscription.start_trial(Utc::now(), days)?;
    }

    service.before_create_subscription(&mut subscription).await?;

    info!(
        subscription_id = %subscription.id,
        user_id = %caller.user_id,
        account_id = %subscription.account_id,
        plan_id = %subscription.plan_id,
        "Add subscription"
    );

    state.subscriptions.add_subscription(&subscription).await?;

    service.after_create_subscription(&subscription).await?;

    info!(
        subscription_id = %subscription.id,
        account_id = %subscription.account_id,
        "Added subscription"
    );

    Ok((
        StatusCode::CREATED,
        Json(to_descriptor(
            &subscription,
            &state.api_base_url,
            &caller,
            &account_roles,
        )),
    ))
}

/// DELETE /api/account/subscriptions/:subscription_id - Deactivate a subscription
pub async fn remove_subscription(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(subscription_id): Path<String>,
) -> Result<StatusCode, AppError> {
    caller.require_any(USERS)?;
    let mut subscription = state
        .subscriptions
        .get_subscription_by_id(&subscription_id)
        .await?;

    if !caller.is_privileged()
        && !state
            .account_roles(&subscription.account_id, &caller.user_id)
            .await?
            .contains(roles::ACCOUNT_OWNER)
    {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }
    if !subscription.is_active() {
        return Err(AppError::Forbidden(format!(
            "Subscription is inactive already {}",
            subscription_id
        )));
    }

    info!(
        subscription_id = %subscription_id,
        user_id = %caller.user_id,
        account_id = %subscription.account_id,
        "Remove subscription"
    );

    subscription.state = SubscriptionState::Inactive;
    state.subscriptions.update_subscription(&subscription).await?;

    match state.registry.get(&subscription.service_id) {
        Some(service) => service.on_remove_subscription(&subscription).await?,
        None => tracing::warn!(
            subscription_id = %subscription_id,
            service_id = %subscription.service_id,
            "Removed subscription of unregistered service"
        ),
    }

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/account/:account_id/resources - Resources used under active subscriptions
pub async fn get_resources(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(account_id): Path<String>,
    Query(query): Query<ResourcesQuery>,
) -> Result<Json<Vec<SubscriptionResourcesUsed>>, AppError> {
    let account_roles = state.account_roles(&account_id, &caller.user_id).await?;
    caller.require_any_scoped(&account_roles, ACCOUNT_READERS)?;

    let services: Vec<Arc<dyn SubscriptionService>> = match query.service_id {
        None => state.registry.get_all(),
        Some(service_id) => vec![state
            .registry
            .get(&service_id)
            .ok_or_else(unknown_service)?],
    };

    let mut result = Vec::new();
    for service in services {
        // an account has at most one active subscription per service
        let active = state
            .subscriptions
            .get_active_subscription(&account_id, service.service_id())
            .await?;
        if let Some(subscription) = active {
            let resources = service.get_account_resources(&subscription).await?;
            result.push(SubscriptionResourcesUsed {
                used: resources.used,
                subscription_reference: to_reference(&subscription, &state.api_base_url),
            });
        }
    }

    Ok(Json(result))
}
