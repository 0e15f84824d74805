use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::enums::checkout_modes::CheckoutMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorPrice {
    pub id: String,
    pub is_recurring: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorCustomer {
    pub id: String,
    /// Deleted customers are still retrievable by id but can no longer be charged.
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewVendorCustomer {
    pub email: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorInvoice {
    pub id: String,
    pub status: Option<String>,
}

impl VendorInvoice {
    pub fn is_open(&self) -> bool {
        self.status.as_deref() == Some("open")
    }
}

/// Subscription settings attached to a checkout session in subscription mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionData {
    pub trial_period_days: Option<i64>,
    /// Cancel the subscription when the trial ends without a payment method on file.
    pub cancel_on_missing_payment_method: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub customer_id: String,
    pub mode: CheckoutMode,
    pub price_id: String,
    pub quantity: u32,
    pub success_url: String,
    pub cancel_url: String,
    pub payment_method_types: Vec<String>,
    pub subscription_data: Option<SubscriptionData>,
    pub allow_promotion_codes: bool,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}
