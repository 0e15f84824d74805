use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::usecases::checkout::CheckoutError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Unauthorized: Impersonation not allowed")]
    Impersonation,

    #[error("{0}")]
    BadRequest(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Failed to create checkout session")]
    CheckoutFailed(#[source] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Impersonation => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::CheckoutFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(value: CheckoutError) -> Self {
        match value {
            CheckoutError::MissingPriceId => AppError::BadRequest(value.to_string()),
            CheckoutError::Internal(err) => AppError::CheckoutFailed(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Display only carries the client-facing message; the source stays in the logs.
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use http_body_util::BodyExt;

    async fn body_of(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_failure_does_not_leak_detail() {
        let (status, body) =
            body_of(AppError::CheckoutFailed(anyhow!("db password rejected"))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            serde_json::json!({ "error": "Failed to create checkout session" })
        );
    }

    #[tokio::test]
    async fn missing_price_maps_to_bad_request() {
        let (status, body) = body_of(CheckoutError::MissingPriceId.into()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({ "error": "Price ID is required" }));
    }

    #[tokio::test]
    async fn impersonation_is_forbidden() {
        let (status, body) = body_of(AppError::Impersonation).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body,
            serde_json::json!({ "error": "Unauthorized: Impersonation not allowed" })
        );
    }
}
