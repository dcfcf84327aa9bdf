//! Subscriptions, in-app products, orders and voided purchases

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription state reported for an active subscription
pub const SUBSCRIPTION_STATE_ACTIVE: &str = "SUBSCRIPTION_STATE_ACTIVE";

/// A subscription product and its base plans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionProduct {
    pub product_id: String,
    pub package_name: String,
    pub base_plans: Vec<BasePlan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasePlan {
    pub base_plan_id: String,
    /// `ACTIVE`, `INACTIVE` or `DRAFT`
    pub state: Option<String>,
}

/// The state of one subscription purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPurchase {
    pub package_name: String,
    pub subscription_id: String,
    pub purchase_token: String,
    pub order_id: Option<String>,
    pub state: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub expiry_time: Option<DateTime<Utc>>,
    pub auto_renewing: bool,
}

/// A purchase that was refunded, charged back or revoked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidedPurchase {
    pub package_name: String,
    pub purchase_token: String,
    pub order_id: Option<String>,
    pub voided_time: Option<DateTime<Utc>>,
    pub voided_reason: Option<i32>,
    pub voided_source: Option<i32>,
}

/// A one-time product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InAppProduct {
    pub sku: String,
    pub package_name: String,
    /// `managedProduct` or `subscription`
    pub product_type: String,
    pub status: Option<String>,
    pub default_language: Option<String>,
    /// Title in the default language
    pub title: Option<String>,
    /// Description in the default language
    pub description: Option<String>,
    pub default_price: Option<Price>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub price_micros: String,
    pub currency: String,
}

/// An order placed for one of the app's products
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub package_name: String,
    pub product_id: Option<String>,
    pub state: Option<String>,
    pub purchase_token: Option<String>,
}
