//! Subscriptions, purchases, in-app products and orders
//!
//! Read-only lookups against the monetization endpoints.

use playdeck_core::validation::validate_package_name;
use playdeck_core::{
    InAppProduct, Order, Result, SubscriptionProduct, SubscriptionPurchase, ValidationIssue,
    ValidationReport, VoidedPurchase,
};
use tracing::{debug, info};

use crate::client::ApiClient;

/// Voided purchases returned when the caller sets no limit
pub const DEFAULT_VOIDED_PAGE: u32 = 100;

/// Reads monetization data for an app
#[derive(Clone)]
pub struct CommerceManager {
    client: ApiClient,
}

impl CommerceManager {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Subscription products with their base plans
    pub async fn list_subscriptions(&self, package_name: &str) -> Result<Vec<SubscriptionProduct>> {
        validate_package_name(package_name).into_result()?;
        let session = self.client.session();
        let products = session
            .retrying("list_subscriptions", |_| session.list_subscriptions(package_name))
            .await?;
        debug!(package = package_name, count = products.len(), "subscriptions listed");
        Ok(products)
    }

    /// State of one subscription purchase
    pub async fn get_subscription_purchase(
        &self,
        package_name: &str,
        subscription_id: &str,
        token: &str,
    ) -> Result<SubscriptionPurchase> {
        let mut report = validate_package_name(package_name);
        report.merge(required("subscription_id", subscription_id));
        report.merge(required("token", token));
        report.into_result()?;

        info!(package = package_name, subscription_id, "fetching subscription purchase");
        let session = self.client.session();
        session
            .retrying("get_subscription_purchase", |_| {
                session.get_subscription_purchase(package_name, subscription_id, token)
            })
            .await
    }

    /// Refunded, charged back or revoked purchases
    pub async fn list_voided_purchases(
        &self,
        package_name: &str,
        max_results: Option<u32>,
    ) -> Result<Vec<VoidedPurchase>> {
        let max_results = max_results.unwrap_or(DEFAULT_VOIDED_PAGE);
        let mut report = validate_package_name(package_name);
        if max_results == 0 {
            report.add(ValidationIssue::new("max_results", "Must be at least 1", "0"));
        }
        report.into_result()?;

        let session = self.client.session();
        session
            .retrying("list_voided_purchases", |_| {
                session.list_voided_purchases(package_name, max_results)
            })
            .await
    }

    pub async fn list_in_app_products(&self, package_name: &str) -> Result<Vec<InAppProduct>> {
        validate_package_name(package_name).into_result()?;
        let session = self.client.session();
        session
            .retrying("list_in_app_products", |_| {
                session.list_in_app_products(package_name)
            })
            .await
    }

    pub async fn get_in_app_product(&self, package_name: &str, sku: &str) -> Result<InAppProduct> {
        let mut report = validate_package_name(package_name);
        report.merge(required("sku", sku));
        report.into_result()?;

        let session = self.client.session();
        session
            .retrying("get_in_app_product", |_| {
                session.get_in_app_product(package_name, sku)
            })
            .await
    }

    pub async fn get_order(&self, package_name: &str, order_id: &str) -> Result<Order> {
        let mut report = validate_package_name(package_name);
        report.merge(required("order_id", order_id));
        report.into_result()?;

        info!(package = package_name, order_id, "fetching order");
        let session = self.client.session();
        session
            .retrying("get_order", |_| session.get_order(package_name, order_id))
            .await
    }
}

fn required(field: &str, value: &str) -> ValidationReport {
    let mut report = ValidationReport::new();
    if value.trim().is_empty() {
        report.add(ValidationIssue::new(field, format!("{} is required", field), value));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{test_credential, CredentialStore};
    use crate::retry::RetryPolicy;
    use crate::testing::{ApiOp, Failure, ScriptedApi};
    use playdeck_core::{BasePlan, ErrorKind, PublishError};
    use std::sync::Arc;

    const PKG: &str = "com.example.app";

    fn manager(api: ScriptedApi) -> (Arc<ScriptedApi>, CommerceManager) {
        let api = Arc::new(api);
        let store = Arc::new(CredentialStore::new(test_credential("ci@example.com"), api.clone()));
        let client = ApiClient::new(api.clone(), store, RetryPolicy::default());
        (api, CommerceManager::new(client))
    }

    fn product(sku: &str) -> InAppProduct {
        InAppProduct {
            sku: sku.to_string(),
            package_name: PKG.to_string(),
            product_type: "managedProduct".to_string(),
            status: Some("active".to_string()),
            default_language: Some("en-US".to_string()),
            title: Some("Coins".to_string()),
            description: None,
            default_price: None,
        }
    }

    fn voided(token: &str) -> VoidedPurchase {
        VoidedPurchase {
            package_name: PKG.to_string(),
            purchase_token: token.to_string(),
            order_id: None,
            voided_time: None,
            voided_reason: Some(1),
            voided_source: Some(0),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriptions_retry() {
        let (api, manager) = manager(ScriptedApi::new().with_subscription(SubscriptionProduct {
            product_id: "premium".to_string(),
            package_name: PKG.to_string(),
            base_plans: vec![BasePlan {
                base_plan_id: "monthly".to_string(),
                state: Some("ACTIVE".to_string()),
            }],
        }));
        api.fail(ApiOp::ListSubscriptions, [Failure::Status(503)]);

        let products = manager.list_subscriptions(PKG).await.unwrap();
        assert_eq!(products[0].base_plans[0].base_plan_id, "monthly");
        assert_eq!(api.count(ApiOp::ListSubscriptions), 2);
    }

    #[tokio::test]
    async fn test_subscription_purchase_lookup() {
        let (_api, manager) = manager(ScriptedApi::new().with_purchase(SubscriptionPurchase {
            package_name: PKG.to_string(),
            subscription_id: "premium".to_string(),
            purchase_token: "tok-1".to_string(),
            order_id: Some("GPA.1".to_string()),
            state: Some("SUBSCRIPTION_STATE_ACTIVE".to_string()),
            start_time: None,
            expiry_time: None,
            auto_renewing: true,
        }));

        let purchase = manager
            .get_subscription_purchase(PKG, "premium", "tok-1")
            .await
            .unwrap();
        assert!(purchase.auto_renewing);

        let err = manager
            .get_subscription_purchase(PKG, "premium", "tok-2")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = manager.get_subscription_purchase(PKG, "", "").await.unwrap_err();
        assert_eq!(err.validation_report().unwrap().errors.len(), 2);
    }

    #[tokio::test]
    async fn test_voided_purchases_limit() {
        let (_api, manager) = manager(
            ScriptedApi::new()
                .with_voided(voided("a"))
                .with_voided(voided("b"))
                .with_voided(voided("c")),
        );
        assert_eq!(manager.list_voided_purchases(PKG, Some(2)).await.unwrap().len(), 2);
        assert_eq!(manager.list_voided_purchases(PKG, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_in_app_products() {
        let (_api, manager) = manager(
            ScriptedApi::new()
                .with_product(product("coins_100"))
                .with_product(product("coins_500")),
        );
        assert_eq!(manager.list_in_app_products(PKG).await.unwrap().len(), 2);
        let one = manager.get_in_app_product(PKG, "coins_500").await.unwrap();
        assert_eq!(one.sku, "coins_500");

        let err = manager.get_in_app_product(PKG, "gems").await.unwrap_err();
        assert!(matches!(err, PublishError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_order_lookup_is_not_retried_on_auth_failure() {
        let (api, manager) = manager(ScriptedApi::new().with_order(Order {
            order_id: "GPA.9".to_string(),
            package_name: PKG.to_string(),
            product_id: Some("coins_100".to_string()),
            state: Some("PROCESSED".to_string()),
            purchase_token: None,
        }));
        api.fail(ApiOp::GetOrder, [Failure::Status(403)]);

        let err = manager.get_order(PKG, "GPA.9").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(api.count(ApiOp::GetOrder), 1);

        let order = manager.get_order(PKG, "GPA.9").await.unwrap();
        assert_eq!(order.product_id.as_deref(), Some("coins_100"));
    }
}
