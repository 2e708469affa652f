//! Signs and pushes the store's current contents on every report tick.
//! Unencrypted ticks batch everything into one POST to `/updates/`;
//! once a server public key is configured, RSA-OAEP can only carry one
//! metric's worth of plaintext per request, so encrypted ticks instead
//! POST each metric individually to `/update/`, the one route the
//! server mounts its decrypt middleware on. Failures are logged and
//! retried on the next tick — there is no in-flight queue, only the
//! latest sampled value matters.

use std::net::IpAddr;
use std::path::Path;

use metrics_core::{Metric, MetricWire};
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha256;

use crate::error::AgentError;
use crate::store::SharedStore;

pub struct Dispatcher {
    client: reqwest::Client,
    server_address: String,
    key: String,
    public_key: Option<RsaPublicKey>,
    local_ip: String,
}

impl Dispatcher {
    pub fn new(server_address: String, key: String, public_key_path: Option<&Path>) -> Self {
        let public_key = public_key_path.and_then(|path| match load_public_key(path) {
            Ok(k) => Some(k),
            Err(e) => {
                tracing::error!(error = %e, path = %path.display(), "failed to load server public key, sending unencrypted");
                None
            }
        });

        Self {
            client: reqwest::Client::new(),
            server_address,
            key,
            public_key,
            local_ip: local_non_loopback_ipv4().unwrap_or_else(|| "127.0.0.1".to_string()),
        }
    }

    pub async fn dispatch(&self, store: &SharedStore) {
        let mut metrics = store.snapshot();
        if metrics.is_empty() {
            return;
        }

        for m in &mut metrics {
            if let Err(e) = m.fill_hash(&self.key) {
                tracing::warn!(metric = %m.id, error = %e, "failed to sign metric, sending unsigned");
            }
        }

        match &self.public_key {
            Some(pub_key) => self.dispatch_encrypted(&metrics, pub_key).await,
            None => self.dispatch_batch(&metrics).await,
        }
    }

    async fn dispatch_encrypted(&self, metrics: &[Metric], pub_key: &RsaPublicKey) {
        let url = format!("http://{}/update/", self.server_address);
        let mut sent = 0usize;
        for m in metrics {
            let wire = MetricWire::from(m);
            let body = match serde_json::to_vec(&wire) {
                Ok(b) => b,
                Err(e) => {
                    tracing::error!(metric = %m.id, error = %e, "failed to encode metric, skipping");
                    continue;
                }
            };

            let mut rng = rand::rng();
            let body = match pub_key.encrypt(&mut rng, Oaep::new::<Sha256>(), &body) {
                Ok(encrypted) => encrypted,
                Err(e) => {
                    tracing::error!(metric = %m.id, error = %e, "failed to encrypt metric, skipping");
                    continue;
                }
            };

            let result = self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .header("X-Real-IP", &self.local_ip)
                .body(body)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => sent += 1,
                Ok(resp) => {
                    tracing::warn!(metric = %m.id, status = %resp.status(), "server rejected metric");
                }
                Err(e) => {
                    tracing::warn!(metric = %m.id, error = %e, "failed to reach server, will retry next tick");
                }
            }
        }
        tracing::debug!(count = sent, total = metrics.len(), "metrics pushed (encrypted)");
    }

    async fn dispatch_batch(&self, metrics: &[Metric]) {
        let wires: Vec<MetricWire> = metrics.iter().map(MetricWire::from).collect();
        let body = match serde_json::to_vec(&wires) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode metrics batch, skipping this tick");
                return;
            }
        };

        let url = format!("http://{}/updates/", self.server_address);
        let result = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("X-Real-IP", &self.local_ip)
            .body(body)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(count = metrics.len(), "metrics pushed");
            }
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "server rejected metrics batch");
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to reach server, will retry next tick");
            }
        }
    }
}

fn load_public_key(path: &Path) -> crate::error::Result<RsaPublicKey> {
    let pem = std::fs::read_to_string(path).map_err(|source| AgentError::KeyIo {
        path: path.display().to_string(),
        source,
    })?;
    RsaPublicKey::from_public_key_pem(&pem).map_err(|e| AgentError::KeyDecode(e.to_string()))
}

/// The first non-loopback IPv4 address bound to any local interface, used
/// to populate `X-Real-IP` so server-side trusted-subnet admission has
/// something to check.
fn local_non_loopback_ipv4() -> Option<String> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(addr) if !addr.is_loopback() => Some(addr.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_is_a_noop_on_empty_store() {
        let store = SharedStore::new();
        let dispatcher = Dispatcher::new("127.0.0.1:1".to_string(), String::new(), None);
        // Should return without attempting a network call (and thus without hanging).
        dispatcher.dispatch(&store).await;
    }
}
