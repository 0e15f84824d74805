use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub stripe: Stripe,
    pub session: Session,
    pub checkout: Checkout,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// MiB.
    pub body_limit: u64,
    /// Seconds.
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub jwt_secret: String,
    pub cookie_name: String,
}

#[derive(Debug, Clone)]
pub struct Checkout {
    /// Public site origin used for redirect URLs; empty means the product default.
    pub base_url: String,
    pub grace_period_end: Option<DateTime<Utc>>,
    pub transaction_timeout_secs: u64,
}
