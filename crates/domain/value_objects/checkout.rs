use serde::{Deserialize, Serialize};

use crate::domain::entities::subscriptions::SubscriptionEntity;

/// Profile of the purchasing user, as carried by the identity session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub locale: Option<String>,
    pub twitch_id: Option<String>,
}

impl UserProfile {
    /// Email usable for a vendor lookup; blank addresses count as missing.
    pub fn usable_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}

/// The user's current subscription as seen by checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub status: Option<String>,
    pub stripe_price_id: Option<String>,
    pub transaction_type: String,
}

impl From<SubscriptionEntity> for SubscriptionSnapshot {
    fn from(value: SubscriptionEntity) -> Self {
        Self {
            stripe_customer_id: value.stripe_customer_id,
            stripe_subscription_id: value.stripe_subscription_id,
            status: Some(value.status),
            stripe_price_id: value.stripe_price_id,
            transaction_type: value.transaction_type,
        }
    }
}

/// Everything the session builder needs for one checkout request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionParams {
    pub customer_id: String,
    pub price_id: String,
    pub is_recurring: bool,
    pub is_lifetime: bool,
    pub subscription: Option<SubscriptionSnapshot>,
    pub user: UserProfile,
    pub referer: Option<String>,
    pub is_gift: bool,
    pub is_crypto_payment: bool,
}

impl CheckoutSessionParams {
    pub fn previous_subscription_id(&self) -> Option<&str> {
        self.subscription
            .as_ref()
            .and_then(|snapshot| snapshot.stripe_subscription_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    pub fn previous_price_id(&self) -> Option<&str> {
        self.subscription
            .as_ref()
            .and_then(|snapshot| snapshot.stripe_price_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    pub fn is_upgrade_to_lifetime(&self) -> bool {
        self.is_lifetime && self.previous_subscription_id().is_some()
    }

    pub fn is_new_subscription(&self) -> bool {
        self.is_recurring && self.previous_subscription_id().is_none()
    }
}
