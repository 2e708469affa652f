use thiserror::Error;

/// Failure modes intrinsic to the metric data model itself, independent of
/// transport (HTTP/gRPC) or storage backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricError {
    #[error("metric {id:?} was previously recorded as {old_type} but was sent as {new_type}")]
    WrongType {
        id: String,
        old_type: &'static str,
        new_type: &'static str,
    },

    #[error("undefined metric type")]
    UndefinedType,

    #[error("can't parse metric value")]
    ParseMetric,

    #[error("hash decode failed: {0}")]
    BadHash(String),
}

pub type Result<T> = std::result::Result<T, MetricError>;
