// src/errors.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use log::error;
use thiserror::Error;

use crate::models::ApiResponse;

#[derive(Error, Debug)]
pub enum ListingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} is not configured")]
    UpstreamUnavailable(&'static str),

    #[error("{service} error ({status}): {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),
}

impl ListingError {
    /// Transport failures (including timeouts) have no HTTP status; 0 marks them.
    pub fn transport(service: &'static str, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else {
            err.to_string()
        };
        ListingError::Upstream {
            service,
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            message,
        }
    }

    /// Message safe to show to API callers.
    fn public_message(&self) -> String {
        match self {
            ListingError::Validation(_)
            | ListingError::NotFound(_)
            | ListingError::ImageProcessing(_) => self.to_string(),
            ListingError::UpstreamUnavailable(_) => "Service is not configured".to_string(),
            ListingError::Upstream { service, .. } => format!("{} request failed", service),
            ListingError::AnalysisFailed(_) => "Failed to analyze image".to_string(),
            ListingError::Persistence(_) | ListingError::Serialization(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl From<redis::RedisError> for ListingError {
    fn from(e: redis::RedisError) -> Self {
        ListingError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for ListingError {
    fn from(e: serde_json::Error) -> Self {
        ListingError::Serialization(e.to_string())
    }
}

impl ResponseError for ListingError {
    fn status_code(&self) -> StatusCode {
        match self {
            ListingError::Validation(_) | ListingError::ImageProcessing(_) => {
                StatusCode::BAD_REQUEST
            }
            ListingError::NotFound(_) => StatusCode::NOT_FOUND,
            ListingError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ListingError::Upstream { .. } | ListingError::AnalysisFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            ListingError::Persistence(_) | ListingError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self);
        }
        HttpResponse::build(status).json(ApiResponse::failure(self.public_message()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn test_server_errors_hide_details() {
        let err = ListingError::Upstream {
            service: "Vision API",
            status: 403,
            message: "key AIza-secret rejected".to_string(),
        };
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Vision API request failed");
        assert!(!body.windows(6).any(|w| w == b"secret"));
    }

    #[actix_web::test]
    async fn test_validation_errors_are_client_errors() {
        let err = ListingError::Validation("price must be a non-negative number".to_string());
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json["error"],
            "Validation error: price must be a non-negative number"
        );
    }

    #[test]
    fn test_missing_credentials_status() {
        let err = ListingError::UpstreamUnavailable("PERPLEXITY_API_KEY");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "PERPLEXITY_API_KEY is not configured");
    }
}
