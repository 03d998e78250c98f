use chrono::Utc;
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use rocket_okapi::OpenApiError;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::response::OpenApiResponderInner;
use serde::Serialize;
use std::io::Cursor;

/// The closed set of error kinds any component in the engine can surface.
/// Every leaf gateway error (mail, LLM, browser worker) eventually collapses
/// into one of these before it reaches an HTTP boundary.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    /// A write lost a compare-and-swap race against a concurrent mutation.
    Conflict(String),
    /// A mail or browser-portal credential needs re-authorization.
    AuthExpired(String),
    /// A quota counter was already at its plan limit.
    QuotaDenied(String),
    /// A downstream mail/LLM/browser-worker gateway is unreachable or erroring.
    ExternalUnavailable(String),
    /// The classifier could not assign any category.
    ClassifiedUnknown(String),
    /// The classifier assigned a category below the confidence floor.
    ClassifiedLowConfidence { category: String, confidence: f64 },
    /// A closed invariant (state machine, terminal-state non-regression, ...) was violated.
    Invariant(String),
    BadRequest(String),
    DatabaseError(sqlx::Error),
    InternalError(String),
}

/// RFC 7807-style problem details payload.
#[derive(Debug, Serialize, JsonSchema)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let (status, title, detail, problem_type) = match self {
            ApiError::NotFound(msg) => {
                log::debug!("not found: {}", msg);
                (
                    Status::NotFound,
                    "Resource Not Found",
                    msg,
                    "https://docs.apply-orchestrator/errors/not-found",
                )
            }
            ApiError::Conflict(msg) => {
                log::debug!("conflict: {}", msg);
                (
                    Status::Conflict,
                    "Conflict",
                    msg,
                    "https://docs.apply-orchestrator/errors/conflict",
                )
            }
            ApiError::AuthExpired(msg) => {
                log::warn!("auth expired: {}", msg);
                (
                    Status::Unauthorized,
                    "Authorization Expired",
                    msg,
                    "https://docs.apply-orchestrator/errors/auth-expired",
                )
            }
            ApiError::QuotaDenied(msg) => {
                log::debug!("quota denied: {}", msg);
                (
                    Status::TooManyRequests,
                    "Quota Exceeded",
                    msg,
                    "https://docs.apply-orchestrator/errors/quota-denied",
                )
            }
            ApiError::ExternalUnavailable(msg) => {
                log::error!("external gateway unavailable: {}", msg);
                (
                    Status::BadGateway,
                    "External Service Unavailable",
                    msg,
                    "https://docs.apply-orchestrator/errors/external-unavailable",
                )
            }
            ApiError::ClassifiedUnknown(msg) => {
                log::debug!("classification unknown: {}", msg);
                (
                    Status::UnprocessableEntity,
                    "Classification Unknown",
                    msg,
                    "https://docs.apply-orchestrator/errors/classified-unknown",
                )
            }
            ApiError::ClassifiedLowConfidence { category, confidence } => {
                log::debug!("classification below confidence floor: {} ({})", category, confidence);
                (
                    Status::UnprocessableEntity,
                    "Classification Below Confidence Floor",
                    format!("category '{}' at confidence {:.2}", category, confidence),
                    "https://docs.apply-orchestrator/errors/classified-low-confidence",
                )
            }
            ApiError::Invariant(msg) => {
                log::error!("invariant violated: {}", msg);
                (
                    Status::InternalServerError,
                    "Invariant Violated",
                    msg,
                    "https://docs.apply-orchestrator/errors/invariant",
                )
            }
            ApiError::BadRequest(msg) => {
                log::debug!("bad request: {}", msg);
                (
                    Status::BadRequest,
                    "Bad Request",
                    msg,
                    "https://docs.apply-orchestrator/errors/bad-request",
                )
            }
            ApiError::DatabaseError(e) => {
                log::error!("database error: {}", e);
                (
                    Status::InternalServerError,
                    "Internal Server Error",
                    "An internal database error occurred".to_string(),
                    "https://docs.apply-orchestrator/errors/internal",
                )
            }
            ApiError::InternalError(msg) => {
                log::error!("internal error: {}", msg);
                (
                    Status::InternalServerError,
                    "Internal Server Error",
                    "An internal server error occurred".to_string(),
                    "https://docs.apply-orchestrator/errors/internal",
                )
            }
        };

        let body = ProblemDetails {
            problem_type: problem_type.to_string(),
            title: title.to_string(),
            status: status.code,
            detail,
            instance: None,
            timestamp: Some(Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        };

        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"type":"about:blank","title":"Internal Server Error","status":500,"detail":"Failed to serialize error"}"#
                .to_string()
        });

        Response::build()
            .status(status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("resource not found".to_string()),
            _ => ApiError::DatabaseError(err),
        }
    }
}

impl From<crate::mail::MailError> for ApiError {
    fn from(err: crate::mail::MailError) -> Self {
        match err {
            crate::mail::MailError::AuthExpired(msg) => ApiError::AuthExpired(msg),
            other => ApiError::ExternalUnavailable(other.to_string()),
        }
    }
}

impl From<crate::llm::LlmError> for ApiError {
    fn from(err: crate::llm::LlmError) -> Self {
        ApiError::ExternalUnavailable(err.to_string())
    }
}

impl From<crate::browser::BrowserError> for ApiError {
    fn from(err: crate::browser::BrowserError) -> Self {
        ApiError::ExternalUnavailable(err.to_string())
    }
}

impl OpenApiResponderInner for ApiError {
    fn responses(_generator: &mut OpenApiGenerator) -> Result<Responses, OpenApiError> {
        use rocket_okapi::okapi::openapi3::*;

        Ok(Responses {
            responses: rocket_okapi::okapi::map! {
                "400".to_string() => RefOr::Object(Response {
                    description: "Bad Request - Invalid input parameters".to_string(),
                    ..Default::default()
                }),
                "404".to_string() => RefOr::Object(Response {
                    description: "Not Found - The requested resource was not found".to_string(),
                    ..Default::default()
                }),
                "409".to_string() => RefOr::Object(Response {
                    description: "Conflict - The resource was modified concurrently".to_string(),
                    ..Default::default()
                }),
                "429".to_string() => RefOr::Object(Response {
                    description: "Too Many Requests - Plan quota exceeded".to_string(),
                    ..Default::default()
                }),
                "500".to_string() => RefOr::Object(Response {
                    description: "Internal Server Error - An unexpected error occurred".to_string(),
                    ..Default::default()
                }),
            },
            ..Default::default()
        })
    }
}
