use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use url::Url;

use super::config_model::{
    BackendServer, Checkout, Database, DotEnvyConfig, Session, Stripe,
};

pub const DEFAULT_SESSION_COOKIE_NAME: &str = "session-token";
pub const DEFAULT_TRANSACTION_TIMEOUT_SECS: u64 = 30;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let required = |key: &str| -> Result<String> {
        lookup(key)
            .filter(|value| !value.trim().is_empty())
            .with_context(|| format!("{key} is missing"))
    };
    let optional = |key: &str| -> Option<String> {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        api_base: optional("STRIPE_API_BASE"),
    };

    let session = Session {
        jwt_secret: required("SESSION_JWT_SECRET")?,
        cookie_name: optional("SESSION_COOKIE_NAME")
            .unwrap_or_else(|| DEFAULT_SESSION_COOKIE_NAME.to_string()),
    };

    let base_url = optional("APP_BASE_URL")
        .or_else(|| optional("NEXTAUTH_URL"))
        .unwrap_or_default();
    if !base_url.is_empty() {
        let parsed = Url::parse(&base_url).context("APP_BASE_URL is invalid")?;
        if parsed.cannot_be_a_base() {
            bail!("APP_BASE_URL must be an absolute http(s) url");
        }
    }

    let grace_period_end = optional("GRACE_PERIOD_END")
        .map(|raw| parse_grace_period_end(&raw))
        .transpose()?;

    let transaction_timeout_secs = match optional("CHECKOUT_TX_TIMEOUT_SECS") {
        Some(raw) => raw
            .parse()
            .context("CHECKOUT_TX_TIMEOUT_SECS is invalid")?,
        None => DEFAULT_TRANSACTION_TIMEOUT_SECS,
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        stripe,
        session,
        checkout: Checkout {
            base_url,
            grace_period_end,
            transaction_timeout_secs,
        },
    })
}

pub fn parse_grace_period_end(raw: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw.trim())
        .with_context(|| format!("GRACE_PERIOD_END must be an RFC3339 timestamp, got {raw:?}"))?;
    Ok(parsed.with_timezone(&Utc))
}
