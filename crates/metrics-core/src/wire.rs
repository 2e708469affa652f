//! JSON wire shape for [`crate::Metric`].
//!
//! The source's `Metrics` struct carries `Value *float64` / `Delta *int64`
//! directly; here that optional-pair shape is confined to this module so
//! the domain type ([`crate::Metric`]) can stay a clean sum type.

use serde::{Deserialize, Serialize};

use crate::error::{MetricError, Result};
use crate::metric::{Metric, MetricKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricWire {
    pub id: String,
    #[serde(rename = "type")]
    pub mtype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl From<&Metric> for MetricWire {
    fn from(m: &Metric) -> Self {
        match m.kind {
            MetricKind::Gauge(v) => MetricWire {
                id: m.id.clone(),
                mtype: "gauge".to_string(),
                value: Some(v),
                delta: None,
                hash: m.hash.clone(),
            },
            MetricKind::Counter(d) => MetricWire {
                id: m.id.clone(),
                mtype: "counter".to_string(),
                value: None,
                delta: Some(d),
                hash: m.hash.clone(),
            },
        }
    }
}

impl TryFrom<MetricWire> for Metric {
    type Error = MetricError;

    fn try_from(w: MetricWire) -> Result<Metric> {
        let kind = match w.mtype.as_str() {
            "gauge" => MetricKind::Gauge(w.value.ok_or(MetricError::ParseMetric)?),
            "counter" => MetricKind::Counter(w.delta.ok_or(MetricError::ParseMetric)?),
            _ => return Err(MetricError::UndefinedType),
        };
        Ok(Metric {
            id: w.id,
            kind,
            hash: w.hash,
        })
    }
}

/// A request for a single metric's value/type, without a reading
/// (`POST /value/` body shape — id and type only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricQuery {
    pub id: String,
    #[serde(rename = "type")]
    pub mtype: String,
}
