//! Response descriptors for subscriptions
//!
//! Converts stored subscriptions into the JSON shapes returned by the API,
//! applying link and property visibility rules for the calling user.

use crate::account::models::{
    BillingCycleType, Properties, Subscription, SubscriptionState, WorkspaceResources,
};
use crate::auth::{roles, Caller};
use crate::links::{Link, LINK_REL_GET_SUBSCRIPTION, LINK_REL_REMOVE_SUBSCRIPTION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Community subscriptions are not addressable and carry no links
pub const COMMUNITY_PLAN_ID: &str = "sas-community";

/// Properties with this prefix are internal and only shown to system users
pub const INTERNAL_PROPERTY_PREFIX: &str = "codenvy:";

const DATE_FORMAT: &str = "%m/%d/%Y";

/// Subscription as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDescriptor {
    /// Subscription id
    pub id: String,
    /// Subscribed account
    pub account_id: String,
    /// Service of the plan
    pub service_id: String,
    /// Plan the subscription was created from
    pub plan_id: String,
    /// Properties visible to the caller
    pub properties: Properties,
    /// Lifecycle state
    pub state: SubscriptionState,
    /// Plan description
    pub description: String,
    /// Whether the subscription is charged
    pub use_payment_system: bool,
    /// Subscription period start; all dates are formatted as `MM/dd/yyyy`
    pub start_date: Option<String>,
    /// Subscription period end
    pub end_date: Option<String>,
    /// Trial start
    pub trial_start_date: Option<String>,
    /// Trial end
    pub trial_end_date: Option<String>,
    /// Billing period start
    pub billing_start_date: Option<String>,
    /// Billing period end
    pub billing_end_date: Option<String>,
    /// Next charge date
    pub next_billing_date: Option<String>,
    /// Billing cycle length in months
    pub billing_cycle: i32,
    /// Renewal behaviour
    pub billing_cycle_type: BillingCycleType,
    /// Contract term in billing cycles
    pub billing_contract_term: i32,
    /// Operations available to the caller
    pub links: Vec<Link>,
}

/// Short reference to a subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionReference {
    /// Referenced subscription id
    pub subscription_id: String,
    /// Service of the subscription
    pub service_id: String,
    /// Plan description
    pub description: String,
    /// Plan id
    pub plan_id: String,
    /// Link to the full subscription
    pub links: Vec<Link>,
}

/// Resources used under a subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResourcesUsed {
    /// Per-workspace usage
    pub used: Vec<WorkspaceResources>,
    /// Subscription providing the resources
    pub subscription_reference: SubscriptionReference,
}

fn format_date(date: Option<DateTime<Utc>>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

fn subscription_href(base_url: &str, subscription_id: &str) -> String {
    format!("{}/account/subscriptions/{}", base_url, subscription_id)
}

/// Build the descriptor of `subscription` as seen by `caller`
///
/// `account_roles` are the caller's roles in the subscription's account, as
/// resolved by the handler (empty when they were not resolved).
pub fn to_descriptor(
    subscription: &Subscription,
    base_url: &str,
    caller: &Caller,
    account_roles: &HashSet<String>,
) -> SubscriptionDescriptor {
    let mut links = Vec::new();
    if subscription.plan_id != COMMUNITY_PLAN_ID {
        let href = subscription_href(base_url, &subscription.id);
        links.push(Link::get(href.clone(), LINK_REL_GET_SUBSCRIPTION));

        let may_remove = account_roles.contains(roles::ACCOUNT_OWNER)
            || caller.has_role(roles::ACCOUNT_OWNER)
            || caller.is_privileged();
        if subscription.is_active() && may_remove {
            links.push(Link::delete(href, LINK_REL_REMOVE_SUBSCRIPTION));
        }
    }

    let properties = subscription
        .properties
        .iter()
        .filter(|(key, _)| !key.starts_with(INTERNAL_PROPERTY_PREFIX) || caller.is_privileged())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    SubscriptionDescriptor {
        id: subscription.id.clone(),
        account_id: subscription.account_id.clone(),
        service_id: subscription.service_id.clone(),
        plan_id: subscription.plan_id.clone(),
        properties,
        state: subscription.state,
        description: subscription.description.clone(),
        use_payment_system: subscription.use_payment_system,
        start_date: format_date(subscription.start_date),
        end_date: format_date(subscription.end_date),
        trial_start_date: format_date(subscription.trial_start_date),
        trial_end_date: format_date(subscription.trial_end_date),
        billing_start_date: format_date(subscription.billing_start_date),
        billing_end_date: format_date(subscription.billing_end_date),
        next_billing_date: format_date(subscription.next_billing_date),
        billing_cycle: subscription.billing_cycle,
        billing_cycle_type: subscription.billing_cycle_type,
        billing_contract_term: subscription.billing_contract_term,
        links,
    }
}

/// Build a reference to `subscription`
pub fn to_reference(subscription: &Subscription, base_url: &str) -> SubscriptionReference {
    let links = if subscription.plan_id == COMMUNITY_PLAN_ID {
        Vec::new()
    } else {
        vec![Link::get(
            subscription_href(base_url, &subscription.id),
            LINK_REL_GET_SUBSCRIPTION,
        )]
    };

    SubscriptionReference {
        subscription_id: subscription.id.clone(),
        service_id: subscription.service_id.clone(),
        description: subscription.description.clone(),
        plan_id: subscription.plan_id.clone(),
        links,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::models::Plan;
    use chrono::TimeZone;

    const BASE: &str = "http://localhost:8080/api";

    fn subscription(plan_id: &str) -> Subscription {
        let plan = Plan {
            id: plan_id.to_string(),
            service_id: "Saas".to_string(),
            description: "description".to_string(),
            paid: true,
            sales_only: false,
            trial_duration: 0,
            properties: [
                ("RAM".to_string(), "2048".to_string()),
                ("codenvy:trial".to_string(), "true".to_string()),
            ]
            .into(),
            billing_cycle: 1,
            billing_cycle_type: BillingCycleType::AutoRenew,
            billing_contract_term: 12,
        };
        Subscription::from_plan(
            "subscription1".to_string(),
            "account1".to_string(),
            &plan,
            true,
            plan.properties.clone(),
        )
    }

    fn rels(descriptor: &SubscriptionDescriptor) -> Vec<&str> {
        descriptor.links.iter().map(|l| l.rel.as_str()).collect()
    }

    #[test]
    fn test_admin_sees_all_links_and_properties() {
        let admin = Caller::new("admin", [roles::USER, roles::SYSTEM_ADMIN]);
        let descriptor = to_descriptor(&subscription("plan1"), BASE, &admin, &HashSet::new());

        assert_eq!(
            rels(&descriptor),
            vec![LINK_REL_GET_SUBSCRIPTION, LINK_REL_REMOVE_SUBSCRIPTION]
        );
        assert_eq!(
            descriptor.links[0].href,
            "http://localhost:8080/api/account/subscriptions/subscription1"
        );
        assert_eq!(descriptor.links[1].method, "DELETE");
        assert!(descriptor.properties.contains_key("codenvy:trial"));
    }

    #[test]
    fn test_member_gets_no_delete_link_and_no_internal_properties() {
        let user = Caller::new("user1", [roles::USER]);
        let member: HashSet<String> = [roles::ACCOUNT_MEMBER.to_string()].into();
        let descriptor = to_descriptor(&subscription("plan1"), BASE, &user, &member);

        assert_eq!(rels(&descriptor), vec![LINK_REL_GET_SUBSCRIPTION]);
        assert_eq!(descriptor.properties.len(), 1);
        assert_eq!(descriptor.properties.get("RAM").map(String::as_str), Some("2048"));
    }

    #[test]
    fn test_owner_of_inactive_subscription_gets_only_get_link() {
        let user = Caller::new("user1", [roles::USER]);
        let owner: HashSet<String> = [roles::ACCOUNT_OWNER.to_string()].into();
        let mut subscription = subscription("plan1");

        assert_eq!(
            to_descriptor(&subscription, BASE, &user, &owner).links.len(),
            2
        );
        subscription.state = SubscriptionState::Inactive;
        assert_eq!(
            rels(&to_descriptor(&subscription, BASE, &user, &owner)),
            vec![LINK_REL_GET_SUBSCRIPTION]
        );
    }

    #[test]
    fn test_community_subscription_has_no_links() {
        let admin = Caller::new("admin", [roles::SYSTEM_ADMIN]);
        let subscription = subscription(COMMUNITY_PLAN_ID);
        assert!(to_descriptor(&subscription, BASE, &admin, &HashSet::new())
            .links
            .is_empty());
        assert!(to_reference(&subscription, BASE).links.is_empty());
    }

    #[test]
    fn test_dates_are_formatted_and_missing_dates_stay_null() {
        let admin = Caller::new("admin", [roles::SYSTEM_ADMIN]);
        let mut subscription = subscription("plan1");
        subscription.start_date = Some(Utc.with_ymd_and_hms(2015, 3, 7, 12, 0, 0).unwrap());

        let descriptor = to_descriptor(&subscription, BASE, &admin, &HashSet::new());
        assert_eq!(descriptor.start_date.as_deref(), Some("03/07/2015"));
        assert!(descriptor.end_date.is_none());
        assert!(descriptor.next_billing_date.is_none());

        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["startDate"], "03/07/2015");
        assert!(json["trialEndDate"].is_null());
        assert_eq!(json["state"], "ACTIVE");
    }

    #[test]
    fn test_reference_points_to_subscription() {
        let reference = to_reference(&subscription("plan1"), BASE);
        assert_eq!(reference.subscription_id, "subscription1");
        assert_eq!(reference.plan_id, "plan1");
        assert_eq!(reference.links.len(), 1);
    }
}
