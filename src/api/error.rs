use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::fmt;

use crate::core::DeliveryError;

#[derive(Debug)]
pub struct ApiError {
    message: String,
    kind: &'static str,
    status_code: StatusCode,
}

impl ApiError {
    pub fn new(message: impl Into<String>, kind: &'static str, status_code: StatusCode) -> Self {
        ApiError {
            message: message.into(),
            kind,
            status_code,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, "validation", StatusCode::BAD_REQUEST)
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code)
            .json(serde_json::json!({
                "error": self.message,
                "kind": self.kind,
                "status": self.status_code.as_u16()
            }))
    }

    fn status_code(&self) -> StatusCode {
        self.status_code
    }
}

impl From<DeliveryError> for ApiError {
    fn from(err: DeliveryError) -> Self {
        let status_code = match &err {
            DeliveryError::Validation(_) => StatusCode::BAD_REQUEST,
            DeliveryError::NotFound(_) => StatusCode::NOT_FOUND,
            e if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            DeliveryError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DeliveryError::Send(_) => StatusCode::BAD_GATEWAY,
        };
        ApiError::new(err.to_string(), err.kind(), status_code)
    }
}

impl From<actix_web::error::JsonPayloadError> for ApiError {
    fn from(err: actix_web::error::JsonPayloadError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
