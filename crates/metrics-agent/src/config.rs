//! Mirrors `metrics_server::config`: defaults ← JSON file ← environment ←
//! flags, later wins.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "metrics-agent", about = "Samples and pushes metrics to a server")]
struct RawArgs {
    #[arg(short = 'a', long = "address", env = "ADDRESS")]
    server_address: Option<String>,

    #[arg(short = 'p', long = "poll-interval", env = "POLL_INTERVAL")]
    poll_interval: Option<String>,

    #[arg(short = 'r', long = "report-interval", env = "REPORT_INTERVAL")]
    report_interval: Option<String>,

    #[arg(short = 'k', long = "key", env = "KEY")]
    key: Option<String>,

    #[arg(short = 'c', long = "config", env = "CONFIG")]
    config_file: Option<PathBuf>,

    #[arg(long = "crypto-key", env = "CRYPTO_KEY")]
    public_key: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    address: Option<String>,
    poll_interval: Option<String>,
    report_interval: Option<String>,
    key: Option<String>,
    crypto_key: Option<String>,
    metrics: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub server_address: String,
    pub poll_interval: Duration,
    pub report_interval: Duration,
    pub key: String,
    pub public_key: Option<PathBuf>,
    pub metrics: HashMap<String, String>,
}

impl AgentConfig {
    pub fn load() -> Self {
        let args = RawArgs::parse();
        Self::from_raw(args)
    }

    fn from_raw(args: RawArgs) -> Self {
        let file = args
            .config_file
            .as_ref()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|contents| match serde_json::from_str::<FileConfig>(&contents) {
                Ok(cfg) => Some(cfg),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse config file, ignoring");
                    None
                }
            })
            .unwrap_or_default();

        let server_address = args
            .server_address
            .or(file.address)
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());

        let poll_interval = args
            .poll_interval
            .or(file.poll_interval)
            .map(|s| parse_duration(&s, DEFAULT_POLL_INTERVAL))
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        let report_interval = args
            .report_interval
            .or(file.report_interval)
            .map(|s| parse_duration(&s, DEFAULT_REPORT_INTERVAL))
            .unwrap_or(DEFAULT_REPORT_INTERVAL);

        let key = args.key.or(file.key).unwrap_or_default();

        let public_key = args
            .public_key
            .or_else(|| file.crypto_key.map(PathBuf::from));

        let metrics = file.metrics.unwrap_or_else(default_metric_catalog);

        AgentConfig {
            server_address,
            poll_interval,
            report_interval,
            key,
            public_key,
            metrics,
        }
    }
}

/// The ~27 Go `runtime.MemStats` fields carried over as gauges, matching
/// the source's default catalog.
fn default_metric_catalog() -> HashMap<String, String> {
    [
        "Alloc",
        "BuckHashSys",
        "Frees",
        "GCCPUFraction",
        "GCSys",
        "HeapAlloc",
        "HeapIdle",
        "HeapInuse",
        "HeapObjects",
        "HeapReleased",
        "HeapSys",
        "LastGC",
        "Lookups",
        "MCacheInuse",
        "MCacheSys",
        "MSpanInuse",
        "MSpanSys",
        "Mallocs",
        "NextGC",
        "NumForcedGC",
        "NumGC",
        "OtherSys",
        "PauseTotalNs",
        "StackInuse",
        "StackSys",
        "Sys",
        "TotalAlloc",
    ]
    .into_iter()
    .map(|name| (name.to_string(), "gauge".to_string()))
    .collect()
}

fn parse_duration(raw: &str, default: Duration) -> Duration {
    humantime::parse_duration(raw).unwrap_or_else(|e| {
        tracing::warn!(value = raw, error = %e, "invalid duration, falling back to default");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_has_27_gauge_fields() {
        let catalog = default_metric_catalog();
        assert_eq!(catalog.len(), 27);
        assert!(catalog.values().all(|t| t == "gauge"));
    }

    #[test]
    fn invalid_duration_falls_back_to_default() {
        assert_eq!(
            parse_duration("not-a-duration", DEFAULT_POLL_INTERVAL),
            DEFAULT_POLL_INTERVAL
        );
    }
}
