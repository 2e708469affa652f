use thiserror::Error;

/// Failures loading the server's RSA public key from disk. Everything else
/// in the agent either can't fail (sampling) or degrades by logging and
/// skipping a tick rather than propagating (dispatch).
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("failed to read key file {path}: {source}")]
    KeyIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode PEM public key: {0}")]
    KeyDecode(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
