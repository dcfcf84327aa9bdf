//! Wire records for monetization endpoints

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use playdeck_core::commerce::SUBSCRIPTION_STATE_ACTIVE;
use playdeck_core::{
    BasePlan, InAppProduct, Order, Price, SubscriptionProduct, SubscriptionPurchase,
    VoidedPurchase,
};
use serde::Deserialize;

use super::records::Int64;

/// Listing language assumed when a product names none
const FALLBACK_LANGUAGE: &str = "en-US";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionsPage {
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionRecord>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub base_plans: Vec<BasePlanRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasePlanRecord {
    #[serde(default)]
    pub base_plan_id: String,
    #[serde(default)]
    pub state: Option<String>,
}

impl SubscriptionRecord {
    pub fn into_product(self, package_name: &str) -> SubscriptionProduct {
        SubscriptionProduct {
            product_id: self.product_id,
            package_name: package_name.to_string(),
            base_plans: self
                .base_plans
                .into_iter()
                .map(|plan| BasePlan {
                    base_plan_id: plan.base_plan_id,
                    state: plan.state,
                })
                .collect(),
        }
    }
}

/// `purchases.subscriptionsv2` resource
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPurchaseRecord {
    #[serde(default)]
    pub latest_order_id: Option<String>,
    #[serde(default)]
    pub subscription_state: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub line_items: Vec<SubscriptionLineItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionLineItem {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub expiry_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_renewing_plan: Option<AutoRenewingPlan>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoRenewingPlan {
    #[serde(default)]
    pub auto_renew_enabled: Option<bool>,
}

impl SubscriptionPurchaseRecord {
    /// Expiry and renewal come from the line item of `subscription_id`, or
    /// the first line item when none matches.
    pub fn into_purchase(
        self,
        package_name: &str,
        subscription_id: &str,
        token: &str,
    ) -> SubscriptionPurchase {
        let active = self.subscription_state.as_deref() == Some(SUBSCRIPTION_STATE_ACTIVE);
        let item = self
            .line_items
            .iter()
            .find(|item| item.product_id.as_deref() == Some(subscription_id))
            .or_else(|| self.line_items.first());

        SubscriptionPurchase {
            package_name: package_name.to_string(),
            subscription_id: subscription_id.to_string(),
            purchase_token: token.to_string(),
            order_id: self.latest_order_id,
            start_time: self.start_time,
            expiry_time: item.and_then(|i| i.expiry_time),
            auto_renewing: item
                .and_then(|i| i.auto_renewing_plan.as_ref()?.auto_renew_enabled)
                .unwrap_or(active),
            state: self.subscription_state,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoidedPurchasesResponse {
    #[serde(default)]
    pub voided_purchases: Vec<VoidedPurchaseRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoidedPurchaseRecord {
    #[serde(default)]
    pub purchase_token: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub voided_time_millis: Option<Int64>,
    #[serde(default)]
    pub voided_reason: Option<i32>,
    #[serde(default)]
    pub voided_source: Option<i32>,
}

impl VoidedPurchaseRecord {
    pub fn into_voided(self, package_name: &str) -> VoidedPurchase {
        VoidedPurchase {
            package_name: package_name.to_string(),
            purchase_token: self.purchase_token,
            order_id: self.order_id,
            voided_time: self
                .voided_time_millis
                .and_then(|m| m.value())
                .and_then(DateTime::from_timestamp_millis),
            voided_reason: self.voided_reason,
            voided_source: self.voided_source,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct InAppProductsResponse {
    #[serde(default)]
    pub inappproduct: Vec<InAppProductRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InAppProductRecord {
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub purchase_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub default_language: Option<String>,
    #[serde(default)]
    pub listings: HashMap<String, ProductListing>,
    #[serde(default)]
    pub default_price: Option<PriceRecord>,
}

#[derive(Debug, Deserialize)]
pub struct ProductListing {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    pub price_micros: String,
    pub currency: String,
}

impl InAppProductRecord {
    /// Title and description come from the default-language listing
    pub fn into_product(mut self, package_name: &str) -> InAppProduct {
        let language = self
            .default_language
            .clone()
            .unwrap_or_else(|| FALLBACK_LANGUAGE.to_string());
        let listing = self.listings.remove(&language);

        InAppProduct {
            sku: self.sku,
            package_name: package_name.to_string(),
            product_type: self
                .purchase_type
                .unwrap_or_else(|| "managedProduct".to_string()),
            status: self.status,
            default_language: self.default_language,
            title: listing.as_ref().and_then(|l| l.title.clone()),
            description: listing.and_then(|l| l.description),
            default_price: self.default_price.map(|p| Price {
                price_micros: p.price_micros,
                currency: p.currency,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub purchase_token: Option<String>,
    #[serde(default)]
    pub line_items: Vec<OrderLineItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    #[serde(default)]
    pub product_id: Option<String>,
}

impl OrderRecord {
    pub fn into_order(self, package_name: &str, order_id: &str) -> Order {
        Order {
            order_id: order_id.to_string(),
            package_name: package_name.to_string(),
            product_id: self.line_items.into_iter().find_map(|item| item.product_id),
            state: self.state,
            purchase_token: self.purchase_token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PKG: &str = "com.example.app";

    #[test]
    fn test_subscription_purchase_line_item() {
        let record: SubscriptionPurchaseRecord = serde_json::from_value(json!({
            "latestOrderId": "GPA.1234-5678",
            "subscriptionState": "SUBSCRIPTION_STATE_ACTIVE",
            "startTime": "2026-01-05T10:00:00Z",
            "lineItems": [
                {"productId": "other", "expiryTime": "2026-02-01T00:00:00Z"},
                {
                    "productId": "premium",
                    "expiryTime": "2026-02-05T10:00:00Z",
                    "autoRenewingPlan": {"autoRenewEnabled": false}
                }
            ]
        }))
        .unwrap();

        let purchase = record.into_purchase(PKG, "premium", "tok");
        assert_eq!(purchase.order_id.as_deref(), Some("GPA.1234-5678"));
        assert_eq!(purchase.expiry_time.unwrap().to_rfc3339(), "2026-02-05T10:00:00+00:00");
        // renewal was turned off even though the subscription is active
        assert!(!purchase.auto_renewing);
        assert_eq!(purchase.purchase_token, "tok");
    }

    #[test]
    fn test_subscription_renewal_falls_back_to_state() {
        let record: SubscriptionPurchaseRecord = serde_json::from_value(json!({
            "subscriptionState": "SUBSCRIPTION_STATE_ACTIVE"
        }))
        .unwrap();
        assert!(record.into_purchase(PKG, "premium", "tok").auto_renewing);

        let expired: SubscriptionPurchaseRecord = serde_json::from_value(json!({
            "subscriptionState": "SUBSCRIPTION_STATE_EXPIRED"
        }))
        .unwrap();
        assert!(!expired.into_purchase(PKG, "premium", "tok").auto_renewing);
    }

    #[test]
    fn test_in_app_product_default_listing() {
        let record: InAppProductRecord = serde_json::from_value(json!({
            "sku": "coins_100",
            "status": "active",
            "defaultLanguage": "fr-FR",
            "listings": {
                "en-US": {"title": "100 coins"},
                "fr-FR": {"title": "100 pièces", "description": "Un sac de pièces"}
            },
            "defaultPrice": {"priceMicros": "990000", "currency": "EUR"}
        }))
        .unwrap();

        let product = record.into_product(PKG);
        assert_eq!(product.product_type, "managedProduct");
        assert_eq!(product.title.as_deref(), Some("100 pièces"));
        assert_eq!(product.default_price.unwrap().currency, "EUR");
    }

    #[test]
    fn test_voided_time_from_millis() {
        let record: VoidedPurchaseRecord = serde_json::from_value(json!({
            "purchaseToken": "tok",
            "orderId": "GPA.1",
            "voidedTimeMillis": "1700000000123",
            "voidedReason": 1,
            "voidedSource": 0
        }))
        .unwrap();

        let voided = record.into_voided(PKG);
        assert_eq!(voided.voided_time.unwrap().timestamp_millis(), 1_700_000_000_123);
        assert_eq!(voided.voided_reason, Some(1));
    }

    #[test]
    fn test_order_product_from_line_items() {
        let record: OrderRecord = serde_json::from_value(json!({
            "orderId": "GPA.9",
            "state": "PROCESSED",
            "purchaseToken": "tok",
            "lineItems": [{"productTitle": "Coins"}, {"productId": "coins_100"}]
        }))
        .unwrap();

        let order = record.into_order(PKG, "GPA.9");
        assert_eq!(order.product_id.as_deref(), Some("coins_100"));
        assert_eq!(order.state.as_deref(), Some("PROCESSED"));
    }
}
