use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    database::DatabasePool,
    error::ApiError,
    models::{Scan, ScanCreate, ScanStatus},
};

#[async_trait]
pub trait ScanRepository: Send + Sync {
    async fn create(&self, scan: &ScanCreate, nmap_arguments: &str) -> Result<Scan, ApiError>;
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Scan>, ApiError>;
    async fn list(
        &self,
        limit: i64,
        offset: i64,
        status: Option<ScanStatus>,
    ) -> Result<Vec<Scan>, ApiError>;
    async fn update_status(&self, id: &Uuid, status: ScanStatus) -> Result<Scan, ApiError>;
    async fn set_progress(&self, id: &Uuid, progress: i32) -> Result<(), ApiError>;
    async fn start(&self, id: &Uuid) -> Result<Scan, ApiError>;
    async fn complete(&self, id: &Uuid) -> Result<Scan, ApiError>;
    async fn fail(&self, id: &Uuid, error: &str) -> Result<Scan, ApiError>;
    async fn delete(&self, id: &Uuid) -> Result<(), ApiError>;
}

pub struct SqlxScanRepository {
    pool: DatabasePool,
}

impl SqlxScanRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScanRepository for SqlxScanRepository {
    async fn create(&self, scan: &ScanCreate, nmap_arguments: &str) -> Result<Scan, ApiError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let configuration = scan
            .configuration
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let row = sqlx::query_as::<_, Scan>(
            r#"
            INSERT INTO scans
                (id, name, target, scan_type, nmap_arguments, status, progress, configuration, created_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', 0, $6, $7)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&scan.name)
        .bind(&scan.target)
        .bind(&scan.scan_type)
        .bind(nmap_arguments)
        .bind(&configuration)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Scan>, ApiError> {
        let row = sqlx::query_as::<_, Scan>("SELECT * FROM scans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn list(
        &self,
        limit: i64,
        offset: i64,
        status: Option<ScanStatus>,
    ) -> Result<Vec<Scan>, ApiError> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, Scan>(
                    r#"
                    SELECT * FROM scans
                    WHERE status = $1
                    ORDER BY created_at DESC
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(status)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Scan>(
                    "SELECT * FROM scans ORDER BY created_at DESC LIMIT $1 OFFSET $2",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows)
    }

    async fn update_status(&self, id: &Uuid, status: ScanStatus) -> Result<Scan, ApiError> {
        let row =
            sqlx::query_as::<_, Scan>("UPDATE scans SET status = $2 WHERE id = $1 RETURNING *")
                .bind(id)
                .bind(status)
                .fetch_optional(&self.pool)
                .await?;

        row.ok_or_else(|| ApiError::NotFound(format!("Scan with id {} not found", id)))
    }

    async fn set_progress(&self, id: &Uuid, progress: i32) -> Result<(), ApiError> {
        let result = sqlx::query("UPDATE scans SET progress = $2 WHERE id = $1")
            .bind(id)
            .bind(progress.clamp(0, 100))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("Scan with id {} not found", id)));
        }

        Ok(())
    }

    async fn start(&self, id: &Uuid) -> Result<Scan, ApiError> {
        let now = Utc::now();

        let row = sqlx::query_as::<_, Scan>(
            "UPDATE scans SET status = 'running', started_at = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| ApiError::NotFound(format!("Scan with id {} not found", id)))
    }

    async fn complete(&self, id: &Uuid) -> Result<Scan, ApiError> {
        let now = Utc::now();

        let row = sqlx::query_as::<_, Scan>(
            r#"
            UPDATE scans
            SET status = 'completed', progress = 100, completed_at = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| ApiError::NotFound(format!("Scan with id {} not found", id)))
    }

    async fn fail(&self, id: &Uuid, error: &str) -> Result<Scan, ApiError> {
        let now = Utc::now();

        let row = sqlx::query_as::<_, Scan>(
            r#"
            UPDATE scans
            SET status = 'failed', error_message = $2, completed_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| ApiError::NotFound(format!("Scan with id {} not found", id)))
    }

    async fn delete(&self, id: &Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM scans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("Scan with id {} not found", id)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_connection_pool;
    use crate::models::ScanConfiguration;

    /// Returns None when DATABASE_URL is not set so these tests skip on
    /// machines without a test database. Tests share one database and run
    /// in parallel, so every assertion is scoped to rows created here.
    async fn setup_test_db() -> Option<DatabasePool> {
        let db_url = std::env::var("DATABASE_URL").ok()?;
        Some(create_connection_pool(&db_url).await.unwrap())
    }

    fn sample_create() -> ScanCreate {
        ScanCreate {
            name: "Office subnet".to_string(),
            target: "192.168.1.0/24".to_string(),
            scan_type: "quick".to_string(),
            nmap_arguments: None,
            configuration: Some(ScanConfiguration::default()),
        }
    }

    #[tokio::test]
    async fn test_create_scan() {
        let Some(pool) = setup_test_db().await else {
            eprintln!("DATABASE_URL not set; skipping");
            return;
        };
        let repo = SqlxScanRepository::new(pool);

        let scan = repo.create(&sample_create(), "-F -T4").await.unwrap();
        assert_eq!(scan.name, "Office subnet");
        assert_eq!(scan.target, "192.168.1.0/24");
        assert_eq!(scan.scan_type, "quick");
        assert_eq!(scan.nmap_arguments, "-F -T4");
        assert_eq!(scan.status, ScanStatus::Pending);
        assert_eq!(scan.progress, 0);
        assert!(scan.started_at.is_none());
        assert!(scan.configuration.is_some());
    }

    #[tokio::test]
    async fn test_get_scan_by_id() {
        let Some(pool) = setup_test_db().await else {
            eprintln!("DATABASE_URL not set; skipping");
            return;
        };
        let repo = SqlxScanRepository::new(pool);

        let created = repo.create(&sample_create(), "-F -T4").await.unwrap();
        let fetched = repo.get_by_id(&created.id).await.unwrap();

        assert!(fetched.is_some());
        assert_eq!(fetched.unwrap().id, created.id);
    }

    #[tokio::test]
    async fn test_get_nonexistent_scan() {
        let Some(pool) = setup_test_db().await else {
            eprintln!("DATABASE_URL not set; skipping");
            return;
        };
        let repo = SqlxScanRepository::new(pool);

        let result = repo.get_by_id(&Uuid::new_v4()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_list_with_status_filter() {
        let Some(pool) = setup_test_db().await else {
            eprintln!("DATABASE_URL not set; skipping");
            return;
        };
        let repo = SqlxScanRepository::new(pool);

        let first = repo.create(&sample_create(), "-F -T4").await.unwrap();
        let second = repo.create(&sample_create(), "-p- -T4").await.unwrap();
        repo.start(&second.id).await.unwrap();

        let pending = repo
            .list(10_000, 0, Some(ScanStatus::Pending))
            .await
            .unwrap();
        assert!(pending.iter().any(|s| s.id == first.id));
        assert!(pending.iter().all(|s| s.status == ScanStatus::Pending));
        assert!(!pending.iter().any(|s| s.id == second.id));

        let running = repo
            .list(10_000, 0, Some(ScanStatus::Running))
            .await
            .unwrap();
        assert!(running.iter().any(|s| s.id == second.id));

        // Newest first
        let all = repo.list(10_000, 0, None).await.unwrap();
        let first_pos = all.iter().position(|s| s.id == first.id).unwrap();
        let second_pos = all.iter().position(|s| s.id == second.id).unwrap();
        assert!(second_pos < first_pos);
    }

    #[tokio::test]
    async fn test_list_respects_limit() {
        let Some(pool) = setup_test_db().await else {
            eprintln!("DATABASE_URL not set; skipping");
            return;
        };
        let repo = SqlxScanRepository::new(pool);

        repo.create(&sample_create(), "-F -T4").await.unwrap();
        repo.create(&sample_create(), "-F -T4").await.unwrap();

        let limited = repo.list(1, 0, None).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_scan_lifecycle() {
        let Some(pool) = setup_test_db().await else {
            eprintln!("DATABASE_URL not set; skipping");
            return;
        };
        let repo = SqlxScanRepository::new(pool);

        let scan = repo.create(&sample_create(), "-F -T4").await.unwrap();

        let started = repo.start(&scan.id).await.unwrap();
        assert_eq!(started.status, ScanStatus::Running);
        assert!(started.started_at.is_some());

        repo.set_progress(&scan.id, 40).await.unwrap();
        let in_flight = repo.get_by_id(&scan.id).await.unwrap().unwrap();
        assert_eq!(in_flight.progress, 40);

        let completed = repo.complete(&scan.id).await.unwrap();
        assert_eq!(completed.status, ScanStatus::Completed);
        assert_eq!(completed.progress, 100);
        assert!(completed.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_scan_failure_records_message() {
        let Some(pool) = setup_test_db().await else {
            eprintln!("DATABASE_URL not set; skipping");
            return;
        };
        let repo = SqlxScanRepository::new(pool);

        let scan = repo.create(&sample_create(), "-F -T4").await.unwrap();
        repo.start(&scan.id).await.unwrap();

        let failed = repo
            .fail(&scan.id, "Scan failed: nmap exited with status 1")
            .await
            .unwrap();
        assert_eq!(failed.status, ScanStatus::Failed);
        assert_eq!(
            failed.error_message.as_deref(),
            Some("Scan failed: nmap exited with status 1")
        );
        assert!(failed.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_cancel_via_update_status() {
        let Some(pool) = setup_test_db().await else {
            eprintln!("DATABASE_URL not set; skipping");
            return;
        };
        let repo = SqlxScanRepository::new(pool);

        let scan = repo.create(&sample_create(), "-F -T4").await.unwrap();
        repo.start(&scan.id).await.unwrap();

        let cancelled = repo
            .update_status(&scan.id, ScanStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, ScanStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_delete_scan() {
        let Some(pool) = setup_test_db().await else {
            eprintln!("DATABASE_URL not set; skipping");
            return;
        };
        let repo = SqlxScanRepository::new(pool);

        let scan = repo.create(&sample_create(), "-F -T4").await.unwrap();
        repo.delete(&scan.id).await.unwrap();

        assert!(repo.get_by_id(&scan.id).await.unwrap().is_none());

        let result = repo.delete(&scan.id).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_nonexistent_scan_status() {
        let Some(pool) = setup_test_db().await else {
            eprintln!("DATABASE_URL not set; skipping");
            return;
        };
        let repo = SqlxScanRepository::new(pool);

        let result = repo
            .update_status(&Uuid::new_v4(), ScanStatus::Running)
            .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}
