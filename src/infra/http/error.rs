use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::application::{
    engagement::EngagementFailure, error::ErrorReport, pipeline::AggregationError,
    repos::PersistError,
};

const SOURCE: &str = "infra::http::engagement";

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const MALFORMED_QUERY: &str = "malformed_query";
    pub const PROVIDER: &str = "provider_error";
    pub const PERSISTENCE: &str = "persistence_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const AGGREGATION_TIMEOUT: &str = "aggregation_timeout";
    pub const AGGREGATION_ABORTED: &str = "aggregation_aborted";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub success: bool,
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: &'static str,
    pub message: &'static str,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    retryable: bool,
    hint: Option<String>,
    report: ErrorReport,
}

impl ApiError {
    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        let report = ErrorReport::from_message(
            SOURCE,
            StatusCode::BAD_REQUEST,
            hint.clone().unwrap_or_else(|| message.to_string()),
        );
        Self {
            status: StatusCode::BAD_REQUEST,
            code: codes::BAD_REQUEST,
            message,
            retryable: false,
            hint,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<&EngagementFailure> for ApiError {
    fn from(failure: &EngagementFailure) -> Self {
        let (status, code, message) = match failure {
            EngagementFailure::MalformedQuery(_) => (
                StatusCode::BAD_REQUEST,
                codes::MALFORMED_QUERY,
                "Query is not a status URL",
            ),
            EngagementFailure::Aggregation { source, .. } => (
                StatusCode::BAD_GATEWAY,
                codes::PROVIDER,
                match source {
                    AggregationError::Transport(_) => "Provider is unreachable",
                    AggregationError::Provider { .. } => "Provider rejected the request",
                    AggregationError::Decode(_) => "Provider returned an unexpected payload",
                },
            ),
            EngagementFailure::Persist {
                source: PersistError::Timeout,
                ..
            } => (
                StatusCode::SERVICE_UNAVAILABLE,
                codes::DB_TIMEOUT,
                "Database timeout",
            ),
            EngagementFailure::Persist { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                codes::PERSISTENCE,
                "Engagement could not be stored",
            ),
            EngagementFailure::Timeout { .. } => (
                StatusCode::GATEWAY_TIMEOUT,
                codes::AGGREGATION_TIMEOUT,
                "Engagement is still being calculated",
            ),
            EngagementFailure::Aborted { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::AGGREGATION_ABORTED,
                "Engagement calculation aborted",
            ),
        };

        let hint = match failure {
            EngagementFailure::MalformedQuery(err) => Some(format!(
                "{err}; expected https://twitter.com/<user>/status/<id>"
            )),
            EngagementFailure::Timeout { .. } => Some("Retry shortly".to_string()),
            _ => None,
        };

        Self {
            status,
            code,
            message,
            retryable: failure.kind().is_retryable(),
            hint,
            report: ErrorReport::from_error(SOURCE, status, failure),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            success: false,
            error: ApiErrorMessage {
                code: self.code,
                message: self.message,
                retryable: self.retryable,
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}
