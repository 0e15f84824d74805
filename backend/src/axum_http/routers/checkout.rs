use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRef, State, rejection::JsonRejection},
    http::{HeaderMap, header::REFERER},
    routing::post,
};
use crates::{
    domain::{
        repositories::{payment_gateway::PaymentGateway, subscriptions::SubscriptionStore},
        value_objects::enums::payment_methods::PaymentMethod,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::subscriptions::SubscriptionPostgres,
    },
    payments::stripe_client::StripeClient,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    auth::{SessionUser, SessionVerifier},
    axum_http::error_responses::AppError,
    config::config_model::DotEnvyConfig,
    usecases::checkout::{CheckoutConfig, CheckoutRequest, CheckoutUseCase},
};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CreateCheckoutBody {
    pub price_id: Option<String>,
    pub is_gift: bool,
    pub payment_method: Option<String>,
    /// Accepted for client compatibility; the billing period comes from the price.
    pub period: Option<String>,
}

impl CreateCheckoutBody {
    /// Reads each field on its own; a field of the wrong type counts as absent.
    pub fn from_json(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

        Self {
            price_id: text("priceId"),
            is_gift: value.get("isGift").and_then(Value::as_bool).unwrap_or(false),
            payment_method: text("paymentMethod"),
            period: text("period"),
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CreateCheckoutResponse {
    pub url: String,
}

pub struct CheckoutState<G, S>
where
    G: PaymentGateway + 'static,
    S: SubscriptionStore + 'static,
{
    pub usecase: Arc<CheckoutUseCase<G, S>>,
    pub verifier: Arc<SessionVerifier>,
}

impl<G, S> Clone for CheckoutState<G, S>
where
    G: PaymentGateway + 'static,
    S: SubscriptionStore + 'static,
{
    fn clone(&self) -> Self {
        Self {
            usecase: Arc::clone(&self.usecase),
            verifier: Arc::clone(&self.verifier),
        }
    }
}

impl<G, S> FromRef<CheckoutState<G, S>> for Arc<SessionVerifier>
where
    G: PaymentGateway + 'static,
    S: SubscriptionStore + 'static,
{
    fn from_ref(state: &CheckoutState<G, S>) -> Self {
        Arc::clone(&state.verifier)
    }
}

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Router {
    let subscriptions_store = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let stripe_client = StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.api_base.clone(),
    );
    let checkout_usecase = CheckoutUseCase::new(
        Arc::new(stripe_client),
        Arc::new(subscriptions_store),
        CheckoutConfig::from(&config.checkout),
    );
    let verifier = SessionVerifier::new(
        config.session.cookie_name.clone(),
        &config.session.jwt_secret,
    );

    router(Arc::new(checkout_usecase), Arc::new(verifier))
}

pub fn router<G, S>(usecase: Arc<CheckoutUseCase<G, S>>, verifier: Arc<SessionVerifier>) -> Router
where
    G: PaymentGateway + 'static,
    S: SubscriptionStore + 'static,
{
    Router::new()
        .route(
            "/create-checkout",
            post(create_checkout::<G, S>).fallback(method_not_allowed),
        )
        .with_state(CheckoutState { usecase, verifier })
}

pub async fn create_checkout<G, S>(
    State(state): State<CheckoutState<G, S>>,
    session: SessionUser,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CreateCheckoutResponse>, AppError>
where
    G: PaymentGateway + 'static,
    S: SubscriptionStore + 'static,
{
    let user = session.require_direct().inspect_err(|_| {
        warn!(user_id = %session.profile.id, "checkout: impersonated session rejected");
    })?;

    let body = match body {
        Ok(Json(value)) => CreateCheckoutBody::from_json(&value),
        Err(rejection) => {
            debug!(error = %rejection, "checkout: request body rejected");
            CreateCheckoutBody::default()
        }
    };

    if let Some(period) = body.period.as_deref() {
        debug!(%period, "checkout: ignoring requested period");
    }

    let referer = headers
        .get(REFERER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let request = CheckoutRequest {
        price_id: body.price_id.unwrap_or_default(),
        is_gift: body.is_gift,
        payment_method: PaymentMethod::from_request(body.payment_method.as_deref()),
        referer,
    };

    let url = state.usecase.create_checkout_session(user, request).await?;

    Ok(Json(CreateCheckoutResponse { url }))
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
