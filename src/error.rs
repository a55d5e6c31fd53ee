use crate::envelope::{ErrorEnvelope, FailedAttempt};
use axum::{
    Json,
    extract::rejection::QueryRejection,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use snafu::Snafu;
use std::{fmt, num::ParseIntError};

pub type SiswaResult<T> = Result<T, SiswaError>;

/// Boxed failure coming out of an [`crate::upstream::HttpTransport`] before any status was received.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Which proxied operation an error belongs to, used to pick the envelope message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    List,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const fn failure_message(self) -> &'static str {
        match self {
            Self::List => "Failed to fetch students",
            Self::Create => "Failed to add student",
            Self::Update => "Failed to update student",
            Self::Delete => "Failed to delete student",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::List => "list",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SiswaError {
    #[snafu(display("Missing student ID"))]
    MissingId { operation: Operation },
    #[snafu(display("Request body for {} is not valid JSON", operation))]
    InvalidBody {
        source: serde_json::Error,
        operation: Operation,
    },
    #[snafu(display("Invalid query string: {}", source))]
    InvalidQuery {
        source: QueryRejection,
        operation: Operation,
    },
    #[snafu(display("Invalid student form: {}", reason))]
    InvalidForm { reason: &'static str },
    #[snafu(display("Error serialising student form"))]
    SerialiseForm { source: serde_json::Error },
    #[snafu(display("Upstream answered {} to {} {}", status, method, url))]
    Upstream {
        operation: Operation,
        method: Method,
        url: String,
        status: StatusCode,
        body: Value,
    },
    #[snafu(display("Unable to reach upstream at {}", url))]
    Transport {
        source: TransportError,
        operation: Operation,
        url: String,
    },
    #[snafu(display("All {} upstream endpoint forms failed for {}", attempts.len(), operation))]
    AllCandidatesFailed {
        operation: Operation,
        attempts: Vec<FailedAttempt>,
    },
    #[snafu(display("Unable to retrieve env var `{}`", name))]
    BadEnvVar {
        source: dotenvy::Error,
        name: &'static str,
    },
    #[snafu(display("Unable to parse env var `{}` as a number", name))]
    ParseNumber {
        source: ParseIntError,
        name: &'static str,
    },
    #[snafu(display("Page size must be greater than zero"))]
    ZeroPageSize,
    #[snafu(display("Session capacity must be greater than zero"))]
    ZeroMaxSessions,
    #[snafu(display("Unable to use {:?} as the upstream URL: {}", original, reason))]
    InvalidUpstreamUrl { original: String, reason: String },
    #[snafu(display("Error building the upstream HTTP client"))]
    BuildHttpClient { source: reqwest::Error },
    #[snafu(display("Error with sessions"))]
    TowerSession {
        source: tower_sessions::session::Error,
    },
}

impl SiswaError {
    pub fn status_code(&self) -> StatusCode {
        const ISE: StatusCode = StatusCode::INTERNAL_SERVER_ERROR; //internal server error
        const BI: StatusCode = StatusCode::BAD_REQUEST; //bad input

        match self {
            Self::MissingId { .. }
            | Self::InvalidBody { .. }
            | Self::InvalidQuery { .. }
            | Self::InvalidForm { .. } => BI,
            Self::Upstream { status, .. } => {
                if status.is_client_error() || status.is_server_error() {
                    *status
                } else {
                    ISE
                }
            }
            Self::Transport { .. } | Self::AllCandidatesFailed { .. } => ISE,
            Self::SerialiseForm { .. } | Self::TowerSession { .. } => ISE,
            Self::BadEnvVar { .. }
            | Self::ParseNumber { .. }
            | Self::ZeroPageSize
            | Self::ZeroMaxSessions
            | Self::InvalidUpstreamUrl { .. }
            | Self::BuildHttpClient { .. } => ISE,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            Self::MissingId { operation }
            | Self::InvalidBody { operation, .. }
            | Self::InvalidQuery { operation, .. } => {
                ErrorEnvelope::new(operation.failure_message(), Value::String(self.to_string()))
            }
            Self::Upstream {
                operation, body, ..
            } => ErrorEnvelope::new(operation.failure_message(), body.clone()),
            Self::Transport {
                operation, source, ..
            } => ErrorEnvelope::new(operation.failure_message(), Value::String(source.to_string())),
            Self::AllCandidatesFailed {
                operation,
                attempts,
            } => ErrorEnvelope::new(
                operation.failure_message(),
                Value::String(self.to_string()),
            )
            .with_details(attempts.clone()),
            _ => ErrorEnvelope::new("Internal server error", Value::String(self.to_string())),
        }
    }
}

impl IntoResponse for SiswaError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            error!(?self, "Error!");
        } else {
            warn!(?self, "Rejected request");
        }

        (status_code, Json(self.envelope())).into_response()
    }
}
