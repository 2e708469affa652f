//! In-process concurrent map from metric name to latest value. Both
//! collectors write under the lock; the dispatcher reads a full snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use metrics_core::Metric;
use parking_lot::Mutex;

#[derive(Clone, Default)]
pub struct SharedStore {
    inner: Arc<Mutex<HashMap<String, Metric>>>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_all(&self, metrics: Vec<Metric>) {
        let mut guard = self.inner.lock();
        for m in metrics {
            guard.insert(m.id.clone(), m);
        }
    }

    pub fn snapshot(&self) -> Vec<Metric> {
        self.inner.lock().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_write_overwrites_same_id() {
        let store = SharedStore::new();
        store.write_all(vec![Metric::gauge("X", 1.0)]);
        store.write_all(vec![Metric::gauge("X", 2.0)]);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].value_string(), "2");
    }

    #[test]
    fn independent_ids_coexist() {
        let store = SharedStore::new();
        store.write_all(vec![Metric::gauge("A", 1.0)]);
        store.write_all(vec![Metric::gauge("B", 2.0)]);
        assert_eq!(store.snapshot().len(), 2);
    }
}
