use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use crates::domain::{
    repositories::{payment_gateway::PaymentGateway, subscriptions::SubscriptionTransaction},
    value_objects::{checkout::UserProfile, payments::NewVendorCustomer},
};
use tracing::{error, info, warn};

/// Maps a user to a vendor customer id, creating the customer when none is usable.
pub struct CustomerResolver<G>
where
    G: PaymentGateway + 'static,
{
    gateway: Arc<G>,
}

impl<G> CustomerResolver<G>
where
    G: PaymentGateway + 'static,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    pub async fn resolve(
        &self,
        tx: &dyn SubscriptionTransaction,
        user: &UserProfile,
    ) -> Result<String> {
        let user_id = user.id.as_str();

        // The most recent subscription is treated as the source of truth for the customer id.
        let latest = tx
            .find_latest_by_user(user_id)
            .await
            .context("failed to load latest subscription for customer lookup")?;
        let stored_customer_id = latest
            .as_ref()
            .and_then(|subscription| subscription.stripe_customer_id.clone())
            .filter(|id| !id.is_empty());

        if let Some(stored) = stored_customer_id.as_deref() {
            if self.is_usable(user_id, stored).await {
                return Ok(stored.to_string());
            }
        }

        let Some(email) = user.usable_email() else {
            error!(%user_id, "customer_resolver: no usable customer id and no email on session");
            return Err(anyhow!("Unable to establish customer ID"));
        };

        let customer_id = match self
            .gateway
            .find_customer_by_email(email)
            .await
            .context("failed to search vendor customers by email")?
        {
            Some(existing) => {
                info!(
                    %user_id,
                    customer_id = %existing.id,
                    "customer_resolver: reusing vendor customer matched by email"
                );
                existing.id
            }
            None => {
                let created = self
                    .gateway
                    .create_customer(new_customer(user))
                    .await
                    .context("failed to create vendor customer")?;
                info!(
                    %user_id,
                    customer_id = %created.id,
                    "customer_resolver: created vendor customer"
                );
                created.id
            }
        };

        // A stale stored id is left in place; only rows that never had an id are filled in.
        if stored_customer_id.is_none() {
            let updated = tx
                .backfill_customer_id(user_id, &customer_id)
                .await
                .context("failed to backfill customer id on subscriptions")?;
            info!(
                %user_id,
                %customer_id,
                updated,
                "customer_resolver: backfilled customer id"
            );
        }

        Ok(customer_id)
    }

    async fn is_usable(&self, user_id: &str, customer_id: &str) -> bool {
        match self.gateway.retrieve_customer(customer_id).await {
            Ok(customer) if customer.deleted => {
                warn!(
                    %user_id,
                    %customer_id,
                    "customer_resolver: stored customer was deleted at vendor; discarding"
                );
                false
            }
            Ok(_) => true,
            Err(err) => {
                warn!(
                    %user_id,
                    %customer_id,
                    error = ?err,
                    "customer_resolver: stored customer id is invalid; discarding"
                );
                false
            }
        }
    }
}

pub fn new_customer(user: &UserProfile) -> NewVendorCustomer {
    let field = |value: &Option<String>| value.clone().unwrap_or_default();

    NewVendorCustomer {
        email: user.usable_email().map(str::to_string),
        metadata: BTreeMap::from([
            ("userId".to_string(), user.id.clone()),
            (
                "email".to_string(),
                user.usable_email().unwrap_or_default().to_string(),
            ),
            ("name".to_string(), field(&user.name)),
            ("image".to_string(), field(&user.image)),
            ("locale".to_string(), field(&user.locale)),
            ("twitchId".to_string(), field(&user.twitch_id)),
        ]),
    }
}
