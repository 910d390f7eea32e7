use crate::backend::RateStatus;
use crate::{dispatch, verify};
use actix_web::error::PayloadError;
use actix_web::http::header::{HeaderName, HeaderValue, RETRY_AFTER};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use once_cell::sync::Lazy;
use serde::Serialize;
use thiserror::Error;

pub static X_RATELIMIT_LIMIT: Lazy<HeaderName> =
    Lazy::new(|| HeaderName::from_static("x-ratelimit-limit"));

pub static X_RATELIMIT_REMAINING: Lazy<HeaderName> =
    Lazy::new(|| HeaderName::from_static("x-ratelimit-remaining"));

pub static X_RATELIMIT_RESET: Lazy<HeaderName> =
    Lazy::new(|| HeaderName::from_static("x-ratelimit-reset"));

/// Ways a contact submission can end without being relayed.
///
/// The [Display](std::fmt::Display) text is meant for logs; clients only ever see
/// [ContactError::public_message].
#[derive(Debug, Error)]
pub enum ContactError {
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Validation failed: {0}")]
    Validation(&'static str),
    #[error("Rate limit exceeded ({} of {} requests)", .0.count, .0.limit)]
    RateLimited(RateStatus),
    #[error("Challenge token missing")]
    MissingToken,
    #[error("Challenge verification rejected the token")]
    VerificationRejected,
    #[error("Challenge verification failed: {0}")]
    Verification(
        #[source]
        #[from]
        verify::Error,
    ),
    #[error("Email dispatch failed: {0}")]
    Dispatch(
        #[source]
        #[from]
        dispatch::Error,
    ),
    #[error("Unable to read request body: {0}")]
    Payload(
        #[source]
        #[from]
        PayloadError,
    ),
    #[error("Request body exceeds {0} bytes")]
    Overflow(usize),
    #[error("Request body is a JSON {0}, not an object")]
    NotAnObject(&'static str),
    #[error("Malformed request body: {0}")]
    Json(
        #[source]
        #[from]
        serde_json::Error,
    ),
}

/// JSON body of every contact response.
#[derive(Debug, Serialize)]
pub struct Reply<'a> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

impl Reply<'static> {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }
}

impl ContactError {
    /// Short message returned to the client.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "Method not allowed",
            Self::Validation(message) => message,
            Self::RateLimited(_) => "Too many requests",
            Self::MissingToken => "Missing reCAPTCHA token",
            Self::VerificationRejected | Self::Verification(_) => "reCAPTCHA verification failed",
            Self::Dispatch(_) => "Email delivery failed",
            Self::Payload(_) | Self::Overflow(_) | Self::NotAnObject(_) | Self::Json(_) => {
                "Server error"
            }
        }
    }

    /// Whether the failure is worth a report to error monitoring.
    pub fn is_reportable(&self) -> bool {
        matches!(
            self,
            Self::Dispatch(_)
                | Self::Payload(_)
                | Self::Overflow(_)
                | Self::NotAnObject(_)
                | Self::Json(_)
        )
    }
}

impl ResponseError for ContactError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Validation(_) | Self::MissingToken | Self::VerificationRejected => {
                StatusCode::BAD_REQUEST
            }
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Dispatch(_) => StatusCode::BAD_GATEWAY,
            Self::Verification(_)
            | Self::Payload(_)
            | Self::Overflow(_)
            | Self::NotAnObject(_)
            | Self::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code()).json(Reply {
            ok: false,
            error: Some(self.public_message()),
        });
        if let Self::RateLimited(status) = self {
            let map = response.headers_mut();
            map.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(status.limit));
            map.insert(
                X_RATELIMIT_REMAINING.clone(),
                HeaderValue::from(status.remaining),
            );
            let seconds = status.seconds_until_reset();
            map.insert(X_RATELIMIT_RESET.clone(), HeaderValue::from(seconds));
            map.insert(RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::rt::time::Instant;
    use std::time::Duration;

    #[actix_web::test]
    async fn test_validation_response() {
        let response = ContactError::Validation("Invalid name").error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body()).await.unwrap();
        assert_eq!(body, r#"{"ok":false,"error":"Invalid name"}"#);
    }

    #[actix_web::test]
    async fn test_rate_limited_headers() {
        tokio::time::pause();
        let status = RateStatus::new(6, 5, Instant::now() + Duration::from_secs(42));
        let response = ContactError::RateLimited(status).error_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers.get("retry-after").unwrap(), "42");
        assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "5");
        assert_eq!(headers.get("x-ratelimit-remaining").unwrap(), "0");
    }

    #[test]
    fn test_internal_details_stay_private() {
        let error = ContactError::Dispatch(dispatch::Error::Rejected {
            status: 401,
            body: "bad api key".to_owned(),
        });
        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(error.public_message(), "Email delivery failed");
        assert!(error.to_string().contains("bad api key"));
        assert!(error.is_reportable());

        let error = ContactError::Json(serde_json::from_str::<u8>("{").unwrap_err());
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.public_message(), "Server error");
        assert!(!ContactError::Validation("Invalid email").is_reportable());
    }
}
