//! Validation and orchestration between the transport layer (HTTP/gRPC
//! handlers) and the [`crate::storage::Repository`]. Neither handler layer
//! touches a repository directly.

use metrics_core::Metric;

use crate::config::ServerConfig;
use crate::error::{Result, ScenarioError};
use crate::storage::Repository;

/// Saves one metric. `verify_sig` is true whenever the caller supplied a
/// signature to check against (both HTTP routes into this function always
/// do; gRPC callers may opt out).
pub async fn save_metric(
    repo: &dyn Repository,
    cfg: &ServerConfig,
    m: Metric,
    verify_sig: bool,
) -> Result<()> {
    if verify_sig && !cfg.key.is_empty() && !m.compare_hash(&cfg.key)? {
        return Err(ScenarioError::BadRequest(format!(
            "metric {}: signature verification failed",
            m.id
        )));
    }

    repo.save_metric(m).await?;

    if cfg.store_interval.is_zero() {
        repo.dump_metrics().await?;
    }
    Ok(())
}

/// Saves a batch. Each element's signature is checked up front; the first
/// failure aborts the whole batch before anything is written.
pub async fn save_array_metric(
    repo: &dyn Repository,
    cfg: &ServerConfig,
    ms: Vec<Metric>,
) -> Result<usize> {
    if !cfg.key.is_empty() {
        for m in &ms {
            if !m.compare_hash(&cfg.key)? {
                return Err(ScenarioError::BadRequest(format!(
                    "metric {}: signature verification failed",
                    m.id
                )));
            }
        }
    }

    let count = repo.save_list_metric(ms).await?;

    if cfg.store_interval.is_zero() {
        repo.dump_metrics().await?;
    }
    Ok(count)
}

/// Looks up a metric by id and expected type. A type mismatch is reported
/// the same way as a missing metric — the source treats both as `NotFound`
/// rather than distinguishing "wrong type" from "absent" on the read path.
pub async fn get_metric(
    repo: &dyn Repository,
    id: &str,
    mtype: &str,
    sign: bool,
    key: &str,
) -> Result<Metric> {
    let mut m = repo.get_value(id).await?;
    if m.type_name() != mtype {
        return Err(ScenarioError::NotFound(format!(
            "metric not saved: {id}"
        )));
    }
    if sign {
        m.fill_hash(key)?;
    }
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryRepo;
    use std::time::Duration;

    fn cfg(key: &str, store_interval: Duration) -> ServerConfig {
        ServerConfig {
            server_address: "127.0.0.1:8080".into(),
            store_interval,
            store_file: None,
            restore: false,
            key: key.to_string(),
            db_dsn: None,
            private_key: None,
            trusted_subnet: None,
            grpc_address: "127.0.0.1:3200".into(),
            grpc_enabled: false,
        }
    }

    #[tokio::test]
    async fn save_metric_rejects_bad_signature() {
        let repo = MemoryRepo::new();
        let c = cfg("secret", Duration::from_secs(300));
        let mut m = Metric::gauge("G", 1.0);
        m.hash = Some("deadbeef".into());
        let err = save_metric(&repo, &c, m, true).await;
        assert!(matches!(err, Err(ScenarioError::BadRequest(_))));
    }

    #[tokio::test]
    async fn save_metric_accepts_correct_signature() {
        let repo = MemoryRepo::new();
        let c = cfg("secret", Duration::from_secs(300));
        let mut m = Metric::gauge("G", 1.0);
        m.fill_hash("secret").unwrap();
        save_metric(&repo, &c, m, true).await.unwrap();
        let v = repo.get_value("G").await.unwrap();
        assert_eq!(v.value_string(), "1");
    }

    #[tokio::test]
    async fn get_metric_type_mismatch_is_not_found() {
        let repo = MemoryRepo::new();
        repo.save_metric(Metric::gauge("G", 1.0)).await.unwrap();
        let err = get_metric(&repo, "G", "counter", false, "").await;
        assert!(matches!(err, Err(ScenarioError::NotFound(_))));
    }

    #[tokio::test]
    async fn get_metric_signs_when_requested() {
        let repo = MemoryRepo::new();
        repo.save_metric(Metric::gauge("G", 1.0)).await.unwrap();
        let m = get_metric(&repo, "G", "gauge", true, "secret").await.unwrap();
        assert!(m.hash.is_some());
    }
}
