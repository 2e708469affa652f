use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use metrics_core::MetricError;
use thiserror::Error;

/// Error taxonomy for the scenarios layer. Maps 1:1 onto the HTTP status
/// codes of SPEC_FULL.md §7 (`IntoResponse` below) and onto `tonic::Status`
/// codes in [`crate::grpc`].
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    NotImplemented(String),

    #[error("{0}")]
    Internal(String),

    #[error("request not from a trusted subnet")]
    Unauthenticated,
}

pub type Result<T> = std::result::Result<T, ScenarioError>;

impl From<MetricError> for ScenarioError {
    fn from(e: MetricError) -> Self {
        match e {
            MetricError::UndefinedType => ScenarioError::NotImplemented(e.to_string()),
            MetricError::WrongType { .. } => ScenarioError::BadRequest(e.to_string()),
            MetricError::ParseMetric => ScenarioError::BadRequest(e.to_string()),
            MetricError::BadHash(_) => ScenarioError::BadRequest("signature is wrong".to_string()),
        }
    }
}

impl From<sqlx::Error> for ScenarioError {
    fn from(e: sqlx::Error) -> Self {
        ScenarioError::Internal(e.to_string())
    }
}

impl From<std::io::Error> for ScenarioError {
    fn from(e: std::io::Error) -> Self {
        ScenarioError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for ScenarioError {
    fn from(e: serde_json::Error) -> Self {
        ScenarioError::Internal(e.to_string())
    }
}

impl IntoResponse for ScenarioError {
    fn into_response(self) -> Response {
        let status = match &self {
            ScenarioError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ScenarioError::NotFound(_) => StatusCode::NOT_FOUND,
            ScenarioError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ScenarioError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ScenarioError::Unauthenticated => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

impl ScenarioError {
    pub fn to_grpc_status(&self) -> tonic::Status {
        match self {
            ScenarioError::BadRequest(msg) => tonic::Status::invalid_argument(msg.clone()),
            ScenarioError::NotFound(msg) => tonic::Status::not_found(msg.clone()),
            ScenarioError::NotImplemented(msg) => tonic::Status::unimplemented(msg.clone()),
            ScenarioError::Internal(msg) => tonic::Status::internal(msg.clone()),
            ScenarioError::Unauthenticated => {
                tonic::Status::unauthenticated("request not from a trusted subnet")
            }
        }
    }
}
