use metrics_core::{Metric, MetricKind};

use crate::error::ScenarioError;
use crate::grpc::proto;

impl TryFrom<proto::Metric> for Metric {
    type Error = ScenarioError;

    fn try_from(p: proto::Metric) -> Result<Self, Self::Error> {
        let kind = match p.mtype.as_str() {
            "gauge" => MetricKind::Gauge(p.value),
            "counter" => MetricKind::Counter(p.delta),
            other => {
                return Err(ScenarioError::NotImplemented(format!(
                    "unrecognized metric type: {other}"
                )))
            }
        };
        Ok(Metric {
            id: p.id,
            kind,
            hash: if p.hash.is_empty() { None } else { Some(p.hash) },
        })
    }
}

impl From<&Metric> for proto::Metric {
    fn from(m: &Metric) -> Self {
        let (value, delta) = match m.kind {
            MetricKind::Gauge(v) => (v, 0),
            MetricKind::Counter(d) => (0.0, d),
        };
        proto::Metric {
            id: m.id.clone(),
            mtype: m.type_name().to_string(),
            value,
            delta,
            hash: m.hash.clone().unwrap_or_default(),
        }
    }
}
