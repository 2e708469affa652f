//! Layered configuration: defaults ← JSON file ← environment ← flags,
//! later wins. `clap`'s own flag-over-env precedence handles the last two
//! layers; the JSON file is spliced in as a second default layer before
//! clap's parse is folded on top, mirroring the source's
//! `yamlRead`/`envRead`/`flagsRead` sequence (translated from YAML to JSON).

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use ipnetwork::IpNetwork;
use serde::Deserialize;

const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";
const DEFAULT_GRPC_ADDRESS: &str = "127.0.0.1:3200";
const DEFAULT_STORE_FILE: &str = "/tmp/metrics-db.json";
const DEFAULT_STORE_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Parser)]
#[command(name = "metrics-server", about = "Ingests and serves pushed metrics")]
struct RawArgs {
    #[arg(short = 'a', long = "address", env = "ADDRESS")]
    server_address: Option<String>,

    #[arg(short = 'i', long = "store-interval", env = "STORE_INTERVAL")]
    store_interval: Option<String>,

    #[arg(short = 'f', long = "store-file", env = "STORE_FILE")]
    store_file: Option<String>,

    #[arg(short = 'r', long = "restore", env = "RESTORE")]
    restore: Option<bool>,

    #[arg(short = 'k', long = "key", env = "KEY")]
    key: Option<String>,

    #[arg(short = 'd', long = "database-dsn", env = "DATABASE_DSN")]
    db_dsn: Option<String>,

    #[arg(long = "crypto-key", env = "CRYPTO_KEY")]
    private_key: Option<PathBuf>,

    #[arg(short = 't', long = "trusted-subnet", env = "TRUSTED_SUBNET")]
    trusted_subnet: Option<String>,

    #[arg(short = 'c', long = "config", env = "CONFIG")]
    config_file: Option<PathBuf>,

    #[arg(long = "grpc-address", env = "GRPC_ADDRESS")]
    grpc_address: Option<String>,

    #[arg(long = "grpc-enabled", env = "GRPC_ENABLED")]
    grpc_enabled: Option<bool>,
}

/// JSON config-file shape. Every field is optional: only the keys present
/// override the built-in defaults.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    address: Option<String>,
    store_interval: Option<String>,
    store_file: Option<String>,
    restore: Option<bool>,
    key: Option<String>,
    database_dsn: Option<String>,
    crypto_key: Option<String>,
    trusted_subnet: Option<String>,
    grpc_address: Option<String>,
    grpc_enabled: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_address: String,
    pub store_interval: Duration,
    pub store_file: Option<String>,
    pub restore: bool,
    pub key: String,
    pub db_dsn: Option<String>,
    pub private_key: Option<PathBuf>,
    pub trusted_subnet: Option<IpNetwork>,
    pub grpc_address: String,
    pub grpc_enabled: bool,
}

impl ServerConfig {
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

        let store_interval = args
            .store_interval
            .or(file.store_interval)
            .map(|s| parse_duration(&s))
            .unwrap_or(DEFAULT_STORE_INTERVAL);

        let store_file = args
            .store_file
            .or(file.store_file)
            .or_else(|| Some(DEFAULT_STORE_FILE.to_string()))
            .filter(|s| !s.is_empty());

        let restore = args.restore.or(file.restore).unwrap_or(true);

        let key = args.key.or(file.key).unwrap_or_default();

        let db_dsn = args.db_dsn.or(file.database_dsn).filter(|s| !s.is_empty());

        let private_key = args
            .private_key
            .or_else(|| file.crypto_key.map(PathBuf::from));

        let trusted_subnet = args
            .trusted_subnet
            .or(file.trusted_subnet)
            .and_then(|s| s.parse::<IpNetwork>().ok());

        let grpc_address = args
            .grpc_address
            .or(file.grpc_address)
            .unwrap_or_else(|| DEFAULT_GRPC_ADDRESS.to_string());

        let grpc_enabled = args.grpc_enabled.or(file.grpc_enabled).unwrap_or(false);

        ServerConfig {
            server_address,
            store_interval,
            store_file,
            restore,
            key,
            db_dsn,
            private_key,
            trusted_subnet,
            grpc_address,
            grpc_enabled,
        }
    }

    pub fn is_real_ip_trusted(&self, addr: IpAddr) -> bool {
        match &self.trusted_subnet {
            None => true,
            Some(net) => net.contains(addr),
        }
    }
}

fn parse_duration(raw: &str) -> Duration {
    humantime::parse_duration(raw).unwrap_or_else(|e| {
        tracing::warn!(value = raw, error = %e, "invalid duration, falling back to default");
        DEFAULT_STORE_INTERVAL
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_store_interval_means_synchronous() {
        assert_eq!(parse_duration("0s"), Duration::ZERO);
    }

    #[test]
    fn trusted_subnet_admits_matching_address() {
        let cfg = ServerConfig {
            server_address: DEFAULT_ADDRESS.into(),
            store_interval: DEFAULT_STORE_INTERVAL,
            store_file: None,
            restore: false,
            key: String::new(),
            db_dsn: None,
            private_key: None,
            trusted_subnet: Some("10.0.0.0/8".parse().unwrap()),
            grpc_address: DEFAULT_GRPC_ADDRESS.into(),
            grpc_enabled: false,
        };
        assert!(cfg.is_real_ip_trusted("10.1.2.3".parse().unwrap()));
        assert!(!cfg.is_real_ip_trusted("192.168.0.1".parse().unwrap()));
    }
}
