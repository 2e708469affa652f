//! Shared data model for the metrics agent/server pair: the `Metric` type,
//! its canonical HMAC signing scheme, the gauge/counter merge rule, and the
//! JSON wire shape. Neither binary crate owns this — it's the only thing
//! that crosses the network boundary between them.

pub mod error;
pub mod metric;
pub mod wire;

pub use error::{MetricError, Result};
pub use metric::{merge, parse_value, Metric, MetricKind};
pub use wire::{MetricQuery, MetricWire};
