use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    database::DatabasePool,
    error::ApiError,
    models::{ScanResult, ScanResultCreate},
};

#[async_trait]
pub trait ScanResultRepository: Send + Sync {
    /// Insert all host rows for a scan in a single transaction.
    async fn insert_many(
        &self,
        scan_id: &Uuid,
        results: &[ScanResultCreate],
    ) -> Result<usize, ApiError>;
    async fn list_by_scan(&self, scan_id: &Uuid) -> Result<Vec<ScanResult>, ApiError>;
}

pub struct SqlxScanResultRepository {
    pool: DatabasePool,
}

impl SqlxScanResultRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScanResultRepository for SqlxScanResultRepository {
    async fn insert_many(
        &self,
        scan_id: &Uuid,
        results: &[ScanResultCreate],
    ) -> Result<usize, ApiError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        for result in results {
            let ports = serde_json::to_value(&result.ports)?;
            let services = serde_json::to_value(&result.services)?;
            let os_detection = serde_json::to_value(&result.os_detection)?;

            sqlx::query(
                r#"
                INSERT INTO scan_results
                    (id, scan_id, host, hostname, state, ports, services, os_detection,
                     mac_address, mac_vendor, raw_output, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(scan_id)
            .bind(&result.host)
            .bind(&result.hostname)
            .bind(&result.state)
            .bind(&ports)
            .bind(&services)
            .bind(&os_detection)
            .bind(&result.mac_address)
            .bind(&result.mac_vendor)
            .bind(&result.raw_output)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(results.len())
    }

    async fn list_by_scan(&self, scan_id: &Uuid) -> Result<Vec<ScanResult>, ApiError> {
        let rows = sqlx::query_as::<_, ScanResult>(
            "SELECT * FROM scan_results WHERE scan_id = $1 ORDER BY created_at ASC, host ASC",
        )
        .bind(scan_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
