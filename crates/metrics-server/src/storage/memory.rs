use std::collections::HashMap;

use async_trait::async_trait;
use metrics_core::{merge, Metric};
use parking_lot::Mutex;

use crate::error::{Result, ScenarioError};
use crate::storage::Repository;

/// Plain map + lock. State is lost on restart; `dump_metrics` is a no-op;
/// `ping` always succeeds.
#[derive(Default)]
pub struct MemoryRepo {
    db: Mutex<HashMap<String, Metric>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(db: HashMap<String, Metric>) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub fn snapshot(&self) -> HashMap<String, Metric> {
        self.db.lock().clone()
    }

    fn upsert_one(db: &mut HashMap<String, Metric>, m: Metric) -> Result<()> {
        match db.get(&m.id) {
            Some(existing) => {
                let merged = merge(existing, &m)?;
                db.insert(merged.id.clone(), merged);
            }
            None => {
                db.insert(m.id.clone(), m);
            }
        }
        Ok(())
    }
}

impl Clone for MemoryRepo {
    fn clone(&self) -> Self {
        Self {
            db: Mutex::new(self.db.lock().clone()),
        }
    }
}

#[async_trait]
impl Repository for MemoryRepo {
    async fn save_metric(&self, m: Metric) -> Result<()> {
        let mut db = self.db.lock();
        Self::upsert_one(&mut db, m)?;
        Ok(())
    }

    async fn save_list_metric(&self, ms: Vec<Metric>) -> Result<usize> {
        let mut db = self.db.lock();
        let mut count = 0;
        for m in ms {
            let id = m.id.clone();
            match Self::upsert_one(&mut db, m) {
                Ok(()) => count += 1,
                Err(e) => tracing::warn!(metric = %id, error = %e, "skipping metric in batch"),
            }
        }
        Ok(count)
    }

    async fn get_value(&self, id: &str) -> Result<Metric> {
        self.db
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| ScenarioError::NotFound(format!("metric not saved: {id}")))
    }

    async fn list_metrics(&self) -> Result<Vec<Metric>> {
        let mut list: Vec<Metric> = self.db.lock().values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(list)
    }

    async fn dump_metrics(&self) -> Result<()> {
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) {}
}
