use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    database::DatabasePool,
    error::ApiError,
    models::{ScanTemplate, ScanTemplateCreate},
};

#[async_trait]
pub trait ScanTemplateRepository: Send + Sync {
    async fn create(&self, template: &ScanTemplateCreate) -> Result<ScanTemplate, ApiError>;
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<ScanTemplate>, ApiError>;
    async fn list(&self) -> Result<Vec<ScanTemplate>, ApiError>;
    async fn delete(&self, id: &Uuid) -> Result<(), ApiError>;
}

pub struct SqlxScanTemplateRepository {
    pool: DatabasePool,
}

impl SqlxScanTemplateRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScanTemplateRepository for SqlxScanTemplateRepository {
    async fn create(&self, template: &ScanTemplateCreate) -> Result<ScanTemplate, ApiError> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row = sqlx::query_as::<_, ScanTemplate>(
            r#"
            INSERT INTO scan_templates
                (id, name, description, scan_type, nmap_arguments, configuration, is_default, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(&template.scan_type)
        .bind(&template.nmap_arguments)
        .bind(&template.configuration)
        .bind(template.is_default)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                ApiError::Conflict(format!("Template '{}' already exists", template.name))
            }
            other => ApiError::Database(other),
        })?;

        Ok(row)
    }

    async fn get_by_id(&self, id: &Uuid) -> Result<Option<ScanTemplate>, ApiError> {
        let row = sqlx::query_as::<_, ScanTemplate>("SELECT * FROM scan_templates WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn list(&self) -> Result<Vec<ScanTemplate>, ApiError> {
        let rows =
            sqlx::query_as::<_, ScanTemplate>("SELECT * FROM scan_templates ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows)
    }

    async fn delete(&self, id: &Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM scan_templates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!(
                "Template with id {} not found",
                id
            )));
        }

        Ok(())
    }
}
