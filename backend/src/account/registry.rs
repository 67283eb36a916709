//! Subscription services and their registry
//!
//! Each paid service (e.g. `Saas`) plugs into the subscription lifecycle
//! through a [`SubscriptionService`]. The registry maps service ids to them.

use crate::account::models::{Subscription, UsedAccountResources};
use crate::error::AppError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Lifecycle hooks of a subscribable service
#[async_trait]
pub trait SubscriptionService: Send + Sync {
    /// Id of the service, matched against `Plan::service_id`
    fn service_id(&self) -> &str;

    /// Validate or adjust a subscription before it is stored
    ///
    /// Returning an error aborts the creation; nothing is stored.
    async fn before_create_subscription(
        &self,
        subscription: &mut Subscription,
    ) -> Result<(), AppError>;

    /// Invoked after the subscription was stored
    async fn after_create_subscription(&self, subscription: &Subscription)
        -> Result<(), AppError>;

    /// Invoked after the subscription was deactivated
    async fn on_remove_subscription(&self, subscription: &Subscription) -> Result<(), AppError>;

    /// Resources the account consumed under this subscription
    async fn get_account_resources(
        &self,
        subscription: &Subscription,
    ) -> Result<UsedAccountResources, AppError>;
}

/// Registry of subscription services keyed by service id
#[derive(Default, Clone)]
pub struct SubscriptionServiceRegistry {
    services: BTreeMap<String, Arc<dyn SubscriptionService>>,
}

impl SubscriptionServiceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service, replacing any service with the same id
    pub fn add(&mut self, service: Arc<dyn SubscriptionService>) {
        info!(service_id = %service.service_id(), "Registered subscription service");
        self.services
            .insert(service.service_id().to_string(), service);
    }

    /// Service registered under `service_id`
    pub fn get(&self, service_id: &str) -> Option<Arc<dyn SubscriptionService>> {
        self.services.get(service_id).cloned()
    }

    /// All registered services, ordered by id
    pub fn get_all(&self) -> Vec<Arc<dyn SubscriptionService>> {
        self.services.values().cloned().collect()
    }

    /// Number of registered services
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether no service is registered
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Service without provisioning side effects
///
/// Accepts every subscription and reports no resource usage. Used for the
/// service ids configured through `SUBSCRIPTION_SERVICES`.
pub struct DefaultSubscriptionService {
    service_id: String,
}

impl DefaultSubscriptionService {
    /// Create the service for `service_id`
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
        }
    }
}

#[async_trait]
impl SubscriptionService for DefaultSubscriptionService {
    fn service_id(&self) -> &str {
        &self.service_id
    }

    async fn before_create_subscription(
        &self,
        _subscription: &mut Subscription,
    ) -> Result<(), AppError> {
        Ok(())
    }

    async fn after_create_subscription(
        &self,
        subscription: &Subscription,
    ) -> Result<(), AppError> {
        tracing::debug!(
            service_id = %self.service_id,
            subscription_id = %subscription.id,
            "Subscription created"
        );
        Ok(())
    }

    async fn on_remove_subscription(&self, subscription: &Subscription) -> Result<(), AppError> {
        tracing::debug!(
            service_id = %self.service_id,
            subscription_id = %subscription.id,
            "Subscription removed"
        );
        Ok(())
    }

    async fn get_account_resources(
        &self,
        _subscription: &Subscription,
    ) -> Result<UsedAccountResources, AppError> {
        Ok(UsedAccountResources::default())
    }
}
