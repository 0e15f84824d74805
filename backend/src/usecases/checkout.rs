use std::{sync::Arc, time::Duration};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use crates::domain::{
    repositories::{
        payment_gateway::PaymentGateway,
        subscriptions::{
            IsolationLevel, SubscriptionStore, SubscriptionTransaction, TransactionOptions,
        },
    },
    value_objects::{
        checkout::{CheckoutSessionParams, UserProfile},
        enums::payment_methods::PaymentMethod,
        trial_policy::{PurchaseKind, TrialPolicy},
    },
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::config_model::Checkout as CheckoutSettings;
use crate::usecases::{
    checkout_session_builder::build_session_request, customer_resolver::CustomerResolver,
    invoice_reconciliation::InvoiceReconciler,
};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Price ID is required")]
    MissingPriceId,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CheckoutError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            CheckoutError::MissingPriceId => StatusCode::BAD_REQUEST,
            CheckoutError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, CheckoutError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutConfig {
    pub base_url: String,
    pub grace_period_end: Option<DateTime<Utc>>,
    pub transaction_timeout: Duration,
}

impl From<&CheckoutSettings> for CheckoutConfig {
    fn from(value: &CheckoutSettings) -> Self {
        Self {
            base_url: value.base_url.clone(),
            grace_period_end: value.grace_period_end,
            transaction_timeout: Duration::from_secs(value.transaction_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub price_id: String,
    pub is_gift: bool,
    pub payment_method: PaymentMethod,
    pub referer: Option<String>,
}

pub struct CheckoutUseCase<G, S>
where
    G: PaymentGateway + 'static,
    S: SubscriptionStore + 'static,
{
    gateway: Arc<G>,
    store: Arc<S>,
    customer_resolver: CustomerResolver<G>,
    invoice_reconciler: InvoiceReconciler<G>,
    trial_policy: TrialPolicy,
    config: CheckoutConfig,
    clock: fn() -> DateTime<Utc>,
}

impl<G, S> CheckoutUseCase<G, S>
where
    G: PaymentGateway + 'static,
    S: SubscriptionStore + 'static,
{
    pub fn new(gateway: Arc<G>, store: Arc<S>, config: CheckoutConfig) -> Self {
        Self {
            customer_resolver: CustomerResolver::new(Arc::clone(&gateway)),
            invoice_reconciler: InvoiceReconciler::new(Arc::clone(&gateway)),
            trial_policy: TrialPolicy::new(config.grace_period_end),
            gateway,
            store,
            config,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Creates a hosted checkout session and returns its redirect URL.
    ///
    /// Customer resolution, reconciliation and session creation run inside one
    /// read-committed transaction bounded by the configured timeout. Vendor
    /// calls made before a rollback are not undone.
    pub async fn create_checkout_session(
        &self,
        user: &UserProfile,
        request: CheckoutRequest,
    ) -> UseCaseResult<String> {
        let user_id = user.id.as_str();
        let price_id = request.price_id.trim().to_string();
        if price_id.is_empty() {
            warn!(%user_id, "checkout: price id missing");
            return Err(CheckoutError::MissingPriceId);
        }

        info!(
            %user_id,
            %price_id,
            is_gift = request.is_gift,
            payment_method = %request.payment_method,
            "checkout: create checkout session requested"
        );

        let price = self.gateway.retrieve_price(&price_id).await.map_err(|err| {
            error!(%user_id, %price_id, error = ?err, "checkout: failed to retrieve price");
            CheckoutError::Internal(err.context("failed to retrieve price"))
        })?;

        let kind = PurchaseKind {
            is_recurring: price.is_recurring,
            is_gift: request.is_gift,
            is_crypto: request.payment_method.is_crypto(),
        };

        let tx = self
            .store
            .begin(TransactionOptions {
                isolation: IsolationLevel::ReadCommitted,
                timeout: self.config.transaction_timeout,
            })
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "checkout: failed to begin transaction");
                CheckoutError::Internal(err)
            })?;

        let outcome = tokio::time::timeout(
            self.config.transaction_timeout,
            self.run_in_transaction(tx.as_ref(), user, &price_id, kind, request.referer),
        )
        .await
        .unwrap_or_else(|_| {
            Err(anyhow!(
                "checkout transaction timed out after {:?}",
                self.config.transaction_timeout
            ))
        });

        match outcome {
            Ok(url) => {
                tx.commit().await.map_err(|err| {
                    error!(%user_id, db_error = ?err, "checkout: failed to commit transaction");
                    CheckoutError::Internal(err)
                })?;
                info!(%user_id, %price_id, "checkout: checkout session created");
                Ok(url)
            }
            Err(err) => {
                error!(%user_id, %price_id, error = ?err, "checkout: checkout creation failed");
                if let Err(rollback_err) = tx.rollback().await {
                    error!(
                        %user_id,
                        db_error = ?rollback_err,
                        "checkout: failed to roll back transaction"
                    );
                }
                Err(CheckoutError::Internal(err))
            }
        }
    }

    async fn run_in_transaction(
        &self,
        tx: &dyn SubscriptionTransaction,
        user: &UserProfile,
        price_id: &str,
        kind: PurchaseKind,
        referer: Option<String>,
    ) -> anyhow::Result<String> {
        let customer_id = self.customer_resolver.resolve(tx, user).await?;

        let subscription = tx
            .find_current_snapshot(&user.id)
            .await
            .context("failed to load current subscription")?;

        let params = CheckoutSessionParams {
            customer_id,
            price_id: price_id.to_string(),
            is_recurring: kind.is_recurring,
            is_lifetime: !kind.is_recurring,
            subscription,
            user: user.clone(),
            referer,
            is_gift: kind.is_gift,
            is_crypto_payment: kind.is_crypto,
        };

        if params.is_crypto_payment && params.previous_price_id().is_some() {
            let outcome = self
                .invoice_reconciler
                .cancel_pending_renewal(tx, &user.id, &params.customer_id)
                .await;
            info!(user_id = %user.id, outcome = ?outcome, "checkout: invoice reconciliation finished");
        }

        let plan = self.trial_policy.plan(kind, (self.clock)());
        let session_request = build_session_request(&self.config.base_url, &params, plan)?;

        info!(
            user_id = %user.id,
            customer_id = %params.customer_id,
            mode = %plan.mode,
            trial_days = plan.trial_days,
            "checkout: creating vendor checkout session"
        );

        let session = self
            .gateway
            .create_checkout_session(session_request)
            .await
            .context("failed to create vendor checkout session")?;

        if session.url.is_none() {
            warn!(session_id = %session.id, "checkout: vendor returned a session without url");
        }

        Ok(session.url.unwrap_or_default())
    }
}
