use anyhow::{Result, bail};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::{debug, error};

use crate::domain::{
    repositories::payment_gateway::PaymentGateway,
    value_objects::payments::{
        CheckoutSession, CheckoutSessionRequest, NewVendorCustomer, VendorCustomer, VendorInvoice,
        VendorPrice,
    },
};

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripePrice {
    id: String,
    #[serde(rename = "type")]
    type_: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
    #[serde(default)]
    deleted: bool,
}

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StripeInvoice {
    id: String,
    status: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: String, api_base: Option<String>) -> Self {
        let api_base = api_base
            .map(|base| base.trim_end_matches('/').to_string())
            .filter(|base| !base.is_empty())
            .unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string());

        Self {
            http: reqwest::Client::new(),
            secret_key,
            api_base,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.as_deref()),
            context = %context,
            "stripe api request failed"
        );

        bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    async fn get(&self, path: &str, context: &str) -> Result<reqwest::Response> {
        let resp = self
            .http
            .get(self.endpoint(path))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        Self::ensure_success(resp, context).await
    }

    async fn post_form(
        &self,
        path: &str,
        body: &[(String, String)],
        context: &str,
    ) -> Result<reqwest::Response> {
        let resp = self
            .http
            .post(self.endpoint(path))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(body)
            .send()
            .await?;
        Self::ensure_success(resp, context).await
    }
}

/// Vendor object ids are interpolated into request paths, so only the
/// characters Stripe itself uses are accepted.
pub fn path_segment(id: &str) -> Result<&str> {
    let valid = !id.is_empty()
        && id.len() <= 255
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        bail!("invalid stripe object id: {:?}", id);
    }
    Ok(id)
}

pub fn customer_form(customer: &NewVendorCustomer) -> Vec<(String, String)> {
    let mut body = Vec::new();
    if let Some(email) = customer.email.as_ref() {
        body.push(("email".to_string(), email.clone()));
    }
    for (key, value) in &customer.metadata {
        body.push((format!("metadata[{}]", key), value.clone()));
    }
    body
}

/// Form-encodes a Checkout Session request.
/// See https://stripe.com/docs/api/checkout/sessions/create
pub fn checkout_session_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mut body: Vec<(String, String)> = vec![
        ("customer".to_string(), request.customer_id.clone()),
        ("mode".to_string(), request.mode.to_string()),
        ("line_items[0][price]".to_string(), request.price_id.clone()),
        (
            "line_items[0][quantity]".to_string(),
            request.quantity.to_string(),
        ),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        (
            "allow_promotion_codes".to_string(),
            request.allow_promotion_codes.to_string(),
        ),
    ];

    for (idx, method) in request.payment_method_types.iter().enumerate() {
        body.push((format!("payment_method_types[{}]", idx), method.clone()));
    }

    if let Some(subscription_data) = request.subscription_data.as_ref() {
        if let Some(days) = subscription_data.trial_period_days {
            body.push((
                "subscription_data[trial_period_days]".to_string(),
                days.to_string(),
            ));
        }
        if subscription_data.cancel_on_missing_payment_method {
            body.push((
                "subscription_data[trial_settings][end_behavior][missing_payment_method]"
                    .to_string(),
                "cancel".to_string(),
            ));
        }
    }

    for (key, value) in &request.metadata {
        body.push((format!("metadata[{}]", key), value.clone()));
    }

    body
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn retrieve_price(&self, price_id: &str) -> Result<VendorPrice> {
        let path = format!("prices/{}", path_segment(price_id)?);
        let price: StripePrice = self.get(&path, "retrieve price").await?.json().await?;

        Ok(VendorPrice {
            is_recurring: price.type_.as_deref() == Some("recurring"),
            id: price.id,
        })
    }

    async fn retrieve_customer(&self, customer_id: &str) -> Result<VendorCustomer> {
        let path = format!("customers/{}", path_segment(customer_id)?);
        let customer: StripeCustomer = self.get(&path, "retrieve customer").await?.json().await?;

        Ok(VendorCustomer {
            id: customer.id,
            deleted: customer.deleted,
        })
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<VendorCustomer>> {
        let resp = self
            .http
            .get(self.endpoint("customers"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .query(&[("email", email), ("limit", "1")])
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "list customers by email").await?;

        let customers: StripeList<StripeCustomer> = resp.json().await?;
        debug!(
            matches = customers.data.len(),
            "stripe: customer lookup by email finished"
        );

        Ok(customers.data.into_iter().next().map(|customer| VendorCustomer {
            id: customer.id,
            deleted: customer.deleted,
        }))
    }

    async fn create_customer(&self, customer: NewVendorCustomer) -> Result<VendorCustomer> {
        // https://stripe.com/docs/api/customers/create
        let body = customer_form(&customer);
        let created: StripeCustomer = self
            .post_form("customers", &body, "create customer")
            .await?
            .json()
            .await?;

        Ok(VendorCustomer {
            id: created.id,
            deleted: created.deleted,
        })
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession> {
        let body = checkout_session_form(&request);
        let session: CheckoutSession = self
            .post_form("checkout/sessions", &body, "create checkout session")
            .await?
            .json()
            .await?;
        Ok(session)
    }

    async fn retrieve_invoice(&self, invoice_id: &str) -> Result<VendorInvoice> {
        let path = format!("invoices/{}", path_segment(invoice_id)?);
        let invoice: StripeInvoice = self.get(&path, "retrieve invoice").await?.json().await?;

        Ok(VendorInvoice {
            id: invoice.id,
            status: invoice.status,
        })
    }

    async fn void_invoice(&self, invoice_id: &str) -> Result<()> {
        // https://stripe.com/docs/api/invoices/void
        let path = format!("invoices/{}/void", path_segment(invoice_id)?);
        self.post_form(&path, &[], "void invoice").await?;
        Ok(())
    }

    async fn mark_invoice_uncollectible(&self, invoice_id: &str) -> Result<()> {
        // https://stripe.com/docs/api/invoices/mark_uncollectible
        let path = format!("invoices/{}/mark_uncollectible", path_segment(invoice_id)?);
        self.post_form(&path, &[], "mark invoice uncollectible")
            .await?;
        Ok(())
    }
}
