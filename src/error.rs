//! HTTP error type shared by every route.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

use crate::core::{ChatError, SwipeRejection, UiConfigError};
use crate::models::ErrorResponse;
use crate::realtime::HandlerError;
use crate::services::{AuthError, CacheError, PostgresError, PushError};

/// Error rendered as `ErrorResponse`
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
    code: Option<String>,
    details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error,
            message: message.into(),
            code: None,
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// Details stay in the logs; clients get a generic message
    pub fn internal(message: impl fmt::Display) -> Self {
        tracing::error!("Internal error: {}", message);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal server error")
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn to_body(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.error.to_string(),
            message: self.message.clone(),
            status_code: self.status.as_u16(),
            code: self.code.clone(),
            details: self.details.clone(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for ApiError {}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status).json(self.to_body())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Forbidden => ApiError::forbidden(err.to_string()),
            AuthError::Database(e) => ApiError::from(e),
            other => ApiError::unauthorized(other.to_string()),
        }
    }
}

impl From<PostgresError> for ApiError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            PostgresError::InvalidInput(msg) => ApiError::bad_request(msg),
            other => ApiError::internal(other),
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        ApiError::internal(err)
    }
}

impl From<PushError> for ApiError {
    fn from(err: PushError) -> Self {
        tracing::warn!(error = %err, "Push provider failure");
        ApiError::new(StatusCode::BAD_GATEWAY, "push_failed", "Push delivery failed")
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
        ApiError::new(status, "chat_error", err.to_string()).with_code(err.code())
    }
}

impl From<HandlerError> for ApiError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Chat(e) => e.into(),
            HandlerError::Database(e) => e.into(),
            other => ApiError::bad_request(other.to_string()).with_code(other.code()),
        }
    }
}

impl From<SwipeRejection> for ApiError {
    fn from(err: SwipeRejection) -> Self {
        let details = match &err {
            SwipeRejection::LimitExceeded { limit, used_today } => Some(json!({
                "currentLimit": limit,
                "usedToday": used_today,
            })),
            SwipeRejection::InsufficientSuperLikes { balance } => Some(json!({
                "canPurchase": true,
                "balance": balance,
            })),
            SwipeRejection::OwnPet => None,
        };
        let status = match err {
            SwipeRejection::OwnPet => StatusCode::BAD_REQUEST,
            _ => StatusCode::FORBIDDEN,
        };
        let api = ApiError::new(status, "swipe_rejected", err.to_string()).with_code(err.code());
        match details {
            Some(details) => api.with_details(details),
            None => api,
        }
    }
}

impl From<UiConfigError> for ApiError {
    fn from(err: UiConfigError) -> Self {
        let api = ApiError::bad_request(err.to_string()).with_code("INVALID_UI_CONFIG");
        match &err {
            UiConfigError::Validation(errors) => match serde_json::to_value(errors) {
                Ok(details) => api.with_details(details),
                Err(_) => api,
            },
            _ => api,
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::bad_request(format!("Validation failed: {}", err))
    }
}

impl From<actix_web::Error> for ApiError {
    fn from(err: actix_web::Error) -> Self {
        let status = err.as_response_error().status_code();
        ApiError::new(status, "request_failed", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_auth_errors_map_to_401_and_403() {
        assert_eq!(ApiError::from(AuthError::MissingToken).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(AuthError::AccountDisabled).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(AuthError::Forbidden).status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_chat_error_carries_code() {
        let err = ApiError::from(ChatError::PremiumRequired { feature: "read receipts" });
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), Some("PREMIUM_FEATURE_REQUIRED"));

        let err = ApiError::from(ChatError::MatchNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_database_details_hidden() {
        let err = ApiError::from(PostgresError::SerializationError(
            serde_json::from_str::<u8>("x").unwrap_err(),
        ));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "Internal server error");
    }

    #[actix_web::test]
    async fn test_swipe_limit_body() {
        let err = ApiError::from(SwipeRejection::LimitExceeded { limit: 5, used_today: 5 });
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = to_bytes(response.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["code"], "SWIPE_LIMIT_EXCEEDED");
        assert_eq!(value["details"]["currentLimit"], 5);
        assert_eq!(value["status_code"], 403);
    }
}
