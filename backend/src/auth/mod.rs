use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use crates::domain::value_objects::checkout::UserProfile;
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::axum_http::error_responses::AppError;

/// Claims carried by the signed session cookie issued by the identity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub locale: Option<String>,
    pub twitch_id: Option<String>,
    #[serde(default)]
    pub is_impersonating: bool,
    pub exp: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub profile: UserProfile,
    pub is_impersonating: bool,
}

impl SessionUser {
    /// Payment actions must be taken by the account owner, never an impersonating admin.
    pub fn require_direct(&self) -> Result<&UserProfile, AppError> {
        if self.is_impersonating {
            return Err(AppError::Impersonation);
        }
        Ok(&self.profile)
    }
}

impl From<SessionClaims> for SessionUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            profile: UserProfile {
                id: claims.sub,
                email: claims.email,
                name: claims.name,
                image: claims.image,
                locale: claims.locale,
                twitch_id: claims.twitch_id,
            },
            is_impersonating: claims.is_impersonating,
        }
    }
}

pub struct SessionVerifier {
    cookie_name: String,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionVerifier {
    pub fn new(cookie_name: impl Into<String>, secret: &str) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(jsonwebtoken::Algorithm::HS256),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<SessionUser> {
        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| anyhow::anyhow!("session token validation failed: {}", e))?;

        if token_data.claims.sub.trim().is_empty() {
            anyhow::bail!("session token has an empty subject");
        }

        Ok(SessionUser::from(token_data.claims))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    Arc<SessionVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<SessionVerifier>::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        let token = jar
            .get(verifier.cookie_name())
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| {
                debug!("auth: session cookie missing");
                AppError::Unauthorized
            })?;

        verifier.verify(&token).map_err(|err| {
            debug!(error = %err, "auth: session cookie rejected");
            AppError::Unauthorized
        })
    }
}
