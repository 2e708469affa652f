use std::sync::Arc;

use crate::config::ServerConfig;
use crate::storage::Repository;

/// Shared between the HTTP router and the gRPC service; both talk to the
/// same repository and configuration, never to each other.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub cfg: Arc<ServerConfig>,
}
