use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    database::DatabasePool,
    error::ApiError,
    models::{ScanLog, ScanLogLevel},
};

#[async_trait]
pub trait ScanLogRepository: Send + Sync {
    async fn append(
        &self,
        scan_id: &Uuid,
        level: ScanLogLevel,
        message: &str,
    ) -> Result<ScanLog, ApiError>;
    async fn list_by_scan(&self, scan_id: &Uuid) -> Result<Vec<ScanLog>, ApiError>;
}

pub struct SqlxScanLogRepository {
    pool: DatabasePool,
}

impl SqlxScanLogRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScanLogRepository for SqlxScanLogRepository {
    async fn append(
        &self,
        scan_id: &Uuid,
        level: ScanLogLevel,
        message: &str,
    ) -> Result<ScanLog, ApiError> {
        let row = sqlx::query_as::<_, ScanLog>(
            r#"
            INSERT INTO scan_logs (id, scan_id, level, message, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(scan_id)
        .bind(level.to_string())
        .bind(message)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_by_scan(&self, scan_id: &Uuid) -> Result<Vec<ScanLog>, ApiError> {
        let rows = sqlx::query_as::<_, ScanLog>(
            "SELECT * FROM scan_logs WHERE scan_id = $1 ORDER BY created_at ASC",
        )
        .bind(scan_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
