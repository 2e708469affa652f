use async_trait::async_trait;
use metrics_core::{Metric, MetricKind};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::error::{Result, ScenarioError};
use crate::storage::Repository;

/// Postgres-backed repository. Upserts are `INSERT ... ON CONFLICT(id) DO
/// UPDATE`, matching the merge semantics in `metrics_core::merge`: gauges
/// overwrite, counters accumulate server-side via `metrics.delta + excluded.delta`.
pub struct SqlRepo {
    pool: PgPool,
}

impl SqlRepo {
    pub async fn connect(dsn: &str, restore: bool) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(dsn)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metrics (
                id    TEXT PRIMARY KEY,
                mtype TEXT NOT NULL,
                value DOUBLE PRECISION,
                delta BIGINT
            )
            "#,
        )
        .execute(&pool)
        .await?;

        if !restore {
            sqlx::query("TRUNCATE TABLE metrics").execute(&pool).await?;
        }

        Ok(Self { pool })
    }

    async fn check_type(&self, id: &str, new_type: &'static str) -> Result<()> {
        let row = sqlx::query("SELECT mtype FROM metrics WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = row {
            let old_type: String = row.try_get("mtype")?;
            if old_type != new_type {
                return Err(ScenarioError::BadRequest(format!(
                    "metric {id}: cannot save {new_type}, already registered as {old_type}"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for SqlRepo {
    async fn save_metric(&self, m: Metric) -> Result<()> {
        self.check_type(&m.id, m.type_name()).await?;
        match m.kind {
            MetricKind::Gauge(v) => {
                sqlx::query(
                    r#"
                    INSERT INTO metrics (id, mtype, value, delta)
                    VALUES ($1, 'gauge', $2, NULL)
                    ON CONFLICT (id) DO UPDATE SET value = excluded.value
                    "#,
                )
                .bind(&m.id)
                .bind(v)
                .execute(&self.pool)
                .await?;
            }
            MetricKind::Counter(d) => {
                sqlx::query(
                    r#"
                    INSERT INTO metrics (id, mtype, value, delta)
                    VALUES ($1, 'counter', NULL, $2)
                    ON CONFLICT (id) DO UPDATE SET delta = metrics.delta + excluded.delta
                    "#,
                )
                .bind(&m.id)
                .bind(d)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    async fn save_list_metric(&self, ms: Vec<Metric>) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut count = 0;
        for m in ms {
            let id = m.id.clone();
            let outcome: Result<()> = async {
                let row = sqlx::query("SELECT mtype FROM metrics WHERE id = $1")
                    .bind(&m.id)
                    .fetch_optional(&mut *tx)
                    .await?;
                if let Some(row) = row {
                    let old_type: String = row.try_get("mtype")?;
                    if old_type != m.type_name() {
                        return Err(ScenarioError::BadRequest(format!(
                            "metric {}: cannot save {}, already registered as {old_type}",
                            m.id,
                            m.type_name()
                        )));
                    }
                }
                match m.kind {
                    MetricKind::Gauge(v) => {
                        sqlx::query(
                            r#"
                            INSERT INTO metrics (id, mtype, value, delta)
                            VALUES ($1, 'gauge', $2, NULL)
                            ON CONFLICT (id) DO UPDATE SET value = excluded.value
                            "#,
                        )
                        .bind(&m.id)
                        .bind(v)
                        .execute(&mut *tx)
                        .await?;
                    }
                    MetricKind::Counter(d) => {
                        sqlx::query(
                            r#"
                            INSERT INTO metrics (id, mtype, value, delta)
                            VALUES ($1, 'counter', NULL, $2)
                            ON CONFLICT (id) DO UPDATE SET delta = metrics.delta + excluded.delta
                            "#,
                        )
                        .bind(&m.id)
                        .bind(d)
                        .execute(&mut *tx)
                        .await?;
                    }
                }
                Ok(())
            }
            .await;

            match outcome {
                Ok(()) => count += 1,
                Err(e) => tracing::warn!(metric = %id, error = %e, "skipping metric in batch"),
            }
        }
        tx.commit().await?;
        Ok(count)
    }

    async fn get_value(&self, id: &str) -> Result<Metric> {
        let row = sqlx::query("SELECT id, mtype, value, delta FROM metrics WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ScenarioError::NotFound(format!("metric not saved: {id}")))?;
        row_to_metric(&row)
    }

    async fn list_metrics(&self) -> Result<Vec<Metric>> {
        let rows = sqlx::query("SELECT id, mtype, value, delta FROM metrics ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_metric).collect()
    }

    async fn dump_metrics(&self) -> Result<()> {
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_metric(row: &sqlx::postgres::PgRow) -> Result<Metric> {
    let id: String = row.try_get("id")?;
    let mtype: String = row.try_get("mtype")?;
    let kind = match mtype.as_str() {
        "gauge" => {
            let v: f64 = row.try_get("value")?;
            MetricKind::Gauge(v)
        }
        "counter" => {
            let d: i64 = row.try_get("delta")?;
            MetricKind::Counter(d)
        }
        other => {
            return Err(ScenarioError::Internal(format!(
                "row {id}: unrecognized metric type {other} in storage"
            )))
        }
    };
    Ok(Metric { id, kind, hash: None })
}
