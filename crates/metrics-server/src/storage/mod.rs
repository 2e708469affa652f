//! Pluggable repository abstraction (SPEC_FULL.md §4.6). Three concrete
//! backends share the [`Repository`] trait; the scenarios layer
//! ([`crate::scenarios`]) never knows which one it's talking to.

mod file;
mod memory;
mod sql;

pub use file::FileRepo;
pub use memory::MemoryRepo;
pub use sql::SqlRepo;

use async_trait::async_trait;
use metrics_core::Metric;

use crate::config::ServerConfig;
use crate::error::Result;

#[async_trait]
pub trait Repository: Send + Sync {
    async fn save_metric(&self, m: Metric) -> Result<()>;

    /// Batched upsert; returns the number of rows actually written.
    /// Per-row failures are logged and skipped without failing the batch.
    async fn save_list_metric(&self, ms: Vec<Metric>) -> Result<usize>;

    async fn get_value(&self, id: &str) -> Result<Metric>;

    /// Sorted ascending by id.
    async fn list_metrics(&self) -> Result<Vec<Metric>>;

    /// No-op for backends without durable snapshotting (in-memory, SQL).
    async fn dump_metrics(&self) -> Result<()>;

    async fn ping(&self) -> Result<()>;

    async fn close(&self);
}

/// Backend selection priority: SQL DSN > file path > in-memory.
pub async fn create_repo(cfg: &ServerConfig) -> Result<Box<dyn Repository>> {
    if let Some(dsn) = &cfg.db_dsn {
        match SqlRepo::connect(dsn, cfg.restore).await {
            Ok(repo) => {
                tracing::info!("using SQL repository");
                return Ok(Box::new(repo));
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to connect to database, falling back to file repository");
            }
        }
    }
    let repo = FileRepo::new(cfg).await?;
    tracing::info!("using file repository");
    Ok(Box::new(repo))
}
