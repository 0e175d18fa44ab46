use std::sync::Arc;

use crate::{
    config::Settings,
    database::DatabasePool,
    repositories::{
        log_repo::SqlxScanLogRepository, result_repo::SqlxScanResultRepository,
        scan_repo::SqlxScanRepository, template_repo::SqlxScanTemplateRepository,
        ScanLogRepository, ScanRepository, ScanResultRepository, ScanTemplateRepository,
    },
    services::{NmapScanner, ReportService, ScanService, TaskManager},
};

pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub db_pool: DatabasePool,
    pub scan_service: Arc<ScanService>,
    pub report_service: Arc<ReportService>,
    pub task_manager: Arc<TaskManager>,
    pub scanner: Arc<NmapScanner>,
    pub scan_repo: Arc<dyn ScanRepository>,
    pub result_repo: Arc<dyn ScanResultRepository>,
    pub log_repo: Arc<dyn ScanLogRepository>,
    pub template_repo: Arc<dyn ScanTemplateRepository>,
}

impl AppState {
    /// Create new application state with dependency injection
    pub async fn new(config: Settings) -> Result<Self, crate::error::ApiError> {
        let db_pool = crate::database::create_connection_pool(&config.database_url).await?;
        Self::new_with_pool(config, db_pool).await
    }

    /// Create new application state with an existing database pool
    pub async fn new_with_pool(
        config: Settings,
        db_pool: DatabasePool,
    ) -> Result<Self, crate::error::ApiError> {
        let config = Arc::new(config);

        let scan_repo: Arc<dyn ScanRepository> =
            Arc::new(SqlxScanRepository::new(db_pool.clone()));
        let result_repo: Arc<dyn ScanResultRepository> =
            Arc::new(SqlxScanResultRepository::new(db_pool.clone()));
        let log_repo: Arc<dyn ScanLogRepository> =
            Arc::new(SqlxScanLogRepository::new(db_pool.clone()));
        let template_repo: Arc<dyn ScanTemplateRepository> =
            Arc::new(SqlxScanTemplateRepository::new(db_pool.clone()));

        let scanner = Arc::new(NmapScanner::new(config.clone()));
        let task_manager = Arc::new(TaskManager::new(config.clone()));

        let scan_service = Arc::new(ScanService::new(
            scan_repo.clone(),
            result_repo.clone(),
            log_repo.clone(),
            scanner.clone(),
            task_manager.clone(),
            config.clone(),
        ));

        let report_service = Arc::new(ReportService::new(scan_repo.clone(), result_repo.clone()));

        Ok(Self {
            config,
            db_pool,
            scan_service,
            report_service,
            task_manager,
            scanner,
            scan_repo,
            result_repo,
            log_repo,
            template_repo,
        })
    }
}
