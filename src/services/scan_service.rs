//! Scan orchestration: creation, background execution, cancellation, deletion.
//!
//! Background tasks are keyed by the scan id they execute, so the task
//! manager entry and the database row always describe the same unit of work.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::ApiError;
use crate::models::{
    find_builtin, Scan, ScanConfiguration, ScanCreate, ScanLog, ScanLogLevel, ScanResult,
    ScanStatus,
};
use crate::repositories::{ScanLogRepository, ScanRepository, ScanResultRepository};
use crate::services::nmap::{parse_nmap_xml, NmapScanner};
use crate::services::normalizer::normalize_results;
use crate::services::task_manager::{TaskContext, TaskManager};
use crate::utils::validation::validate_target;

pub struct ScanService {
    scan_repo: Arc<dyn ScanRepository>,
    result_repo: Arc<dyn ScanResultRepository>,
    log_repo: Arc<dyn ScanLogRepository>,
    scanner: Arc<NmapScanner>,
    task_manager: Arc<TaskManager>,
    settings: Arc<Settings>,
}

impl ScanService {
    pub fn new(
        scan_repo: Arc<dyn ScanRepository>,
        result_repo: Arc<dyn ScanResultRepository>,
        log_repo: Arc<dyn ScanLogRepository>,
        scanner: Arc<NmapScanner>,
        task_manager: Arc<TaskManager>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            scan_repo,
            result_repo,
            log_repo,
            scanner,
            task_manager,
            settings,
        }
    }

    // ========================================================================
    // SCAN MANAGEMENT
    // ========================================================================

    /// Create a scan record and submit its background task.
    ///
    /// The argument string comes from the explicit override when one is
    /// given, otherwise from the builtin template for the scan type.
    pub async fn create_scan(&self, scan_create: ScanCreate) -> Result<Scan, ApiError> {
        let nmap_arguments = resolve_arguments(&scan_create)?;
        validate_target(&scan_create.target)?;

        let scan = self.scan_repo.create(&scan_create, &nmap_arguments).await?;
        let scan_id = scan.id;

        let scan_service = self.clone();
        let task_metadata = json!({
            "scan_id": scan_id,
            "name": scan.name,
            "target": scan.target,
            "scan_type": scan.scan_type,
        });

        self.task_manager
            .submit_task(scan_id, task_metadata, move |ctx| {
                let scan_service = scan_service.clone();
                Box::pin(async move { scan_service.execute_scan(ctx, scan_id).await })
            })
            .await?;

        tracing::info!("Created scan {} for target {}", scan_id, scan.target);
        Ok(scan)
    }

    /// Get a scan by ID
    pub async fn get_scan(&self, id: &Uuid) -> Result<Option<Scan>, ApiError> {
        self.scan_repo.get_by_id(id).await
    }

    /// List scans, newest first, optionally filtered by status.
    pub async fn list_scans(
        &self,
        limit: i64,
        offset: i64,
        status: Option<ScanStatus>,
    ) -> Result<Vec<Scan>, ApiError> {
        self.scan_repo.list(limit, offset, status).await
    }

    pub async fn get_scan_results(&self, scan_id: &Uuid) -> Result<Vec<ScanResult>, ApiError> {
        self.result_repo.list_by_scan(scan_id).await
    }

    pub async fn get_scan_logs(&self, scan_id: &Uuid) -> Result<Vec<ScanLog>, ApiError> {
        self.log_repo.list_by_scan(scan_id).await
    }

    /// Cancel a pending or running scan.
    pub async fn cancel_scan(&self, id: &Uuid) -> Result<(), ApiError> {
        let scan = self
            .scan_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Scan not found"))?;

        if !scan.status.is_active() {
            return Err(ApiError::validation("Scan is not running"));
        }

        self.scan_repo
            .update_status(id, ScanStatus::Cancelled)
            .await?;

        // The task may already have drained by the time we get here.
        let _ = self.task_manager.cancel_task(*id).await;

        tracing::info!("Cancelled scan {}", id);
        Ok(())
    }

    /// Delete a scan and everything hanging off it, stopping the worker
    /// first when the scan is still active.
    pub async fn delete_scan(&self, id: &Uuid) -> Result<(), ApiError> {
        let scan = self
            .scan_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Scan not found"))?;

        if scan.status.is_active() {
            let _ = self.task_manager.cancel_task(*id).await;
        }

        self.scan_repo.delete(id).await?;
        tracing::info!("Deleted scan {}", id);
        Ok(())
    }

    // ========================================================================
    // SCAN EXECUTION
    // ========================================================================

    async fn execute_scan(&self, ctx: TaskContext, scan_id: Uuid) -> Result<(), ApiError> {
        let result = self.execute_scan_internal(&ctx, scan_id).await;

        match result {
            Ok(host_count) => {
                tracing::info!("Scan {} completed with {} hosts", scan_id, host_count);
                Ok(())
            }
            Err(e) => {
                // A cancelled scan keeps its cancelled status; only genuine
                // failures are recorded on the row.
                if self.task_manager.is_task_cancelled(scan_id).await {
                    tracing::info!("Scan {} stopped after cancellation", scan_id);
                    return Err(e);
                }

                let message = format!("Scan failed: {}", e);
                self.scan_repo.fail(&scan_id, &message).await?;
                self.log_repo
                    .append(&scan_id, ScanLogLevel::Error, &message)
                    .await?;
                tracing::error!("Scan {} failed: {}", scan_id, e);
                Err(e)
            }
        }
    }

    async fn execute_scan_internal(
        &self,
        ctx: &TaskContext,
        scan_id: Uuid,
    ) -> Result<usize, ApiError> {
        let scan = self
            .scan_repo
            .get_by_id(&scan_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Scan not found"))?;

        self.scan_repo.start(&scan_id).await?;
        self.scan_repo.set_progress(&scan_id, 10).await?;
        self.log_repo
            .append(
                &scan_id,
                ScanLogLevel::Info,
                &format!("Starting scan on target: {}", scan.target),
            )
            .await?;
        ctx.update_progress(0.1, Some(format!("Scanning {}", scan.target)))
            .await?;

        ctx.check_cancellation().await?;

        let timeout = scan_timeout(&scan, self.settings.default_scan_timeout_secs);
        self.scan_repo.set_progress(&scan_id, 40).await?;
        ctx.update_progress(0.4, Some("Collecting scanner output".to_string()))
            .await?;
        let raw_xml = self
            .scanner
            .run_scan(&scan.target, &scan.nmap_arguments, timeout)
            .await?;
        self.scan_repo.set_progress(&scan_id, 70).await?;
        ctx.update_progress(0.7, Some("Parsing scanner output".to_string()))
            .await?;

        ctx.check_cancellation().await?;

        let report = parse_nmap_xml(&raw_xml)?;
        let rows = normalize_results(&report, &raw_xml);

        ctx.check_cancellation().await?;

        let host_count = self.result_repo.insert_many(&scan_id, &rows).await?;
        self.scan_repo.set_progress(&scan_id, 90).await?;
        self.log_repo
            .append(
                &scan_id,
                ScanLogLevel::Info,
                &format!("Processed {} hosts", host_count),
            )
            .await?;
        ctx.update_progress(0.9, Some("Storing results".to_string()))
            .await?;

        self.scan_repo.complete(&scan_id).await?;
        self.log_repo
            .append(
                &scan_id,
                ScanLogLevel::Success,
                "Scan completed successfully",
            )
            .await?;

        Ok(host_count)
    }
}

/// Pick the nmap argument string for a new scan. An explicit, non-blank
/// override wins; otherwise the builtin template for the scan type supplies
/// the arguments.
fn resolve_arguments(scan_create: &ScanCreate) -> Result<String, ApiError> {
    if let Some(arguments) = &scan_create.nmap_arguments {
        if !arguments.trim().is_empty() {
            return Ok(arguments.clone());
        }
    }

    find_builtin(&scan_create.scan_type)
        .map(|template| template.arguments.to_string())
        .ok_or_else(|| {
            ApiError::validation(format!("Unknown scan type: {}", scan_create.scan_type))
        })
}

/// Per-scan timeout: the stored configuration wins, otherwise the
/// server-wide default applies.
fn scan_timeout(scan: &Scan, default_secs: u64) -> Duration {
    let secs = scan
        .configuration
        .as_ref()
        .and_then(|value| serde_json::from_value::<ScanConfiguration>(value.clone()).ok())
        .map(|config| config.timeout)
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}

// Implement Clone for ScanService to enable Arc sharing in background tasks
impl Clone for ScanService {
    fn clone(&self) -> Self {
        Self {
            scan_repo: Arc::clone(&self.scan_repo),
            result_repo: Arc::clone(&self.result_repo),
            log_repo: Arc::clone(&self.log_repo),
            scanner: Arc::clone(&self.scanner),
            task_manager: Arc::clone(&self.task_manager),
            settings: Arc::clone(&self.settings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_create() -> ScanCreate {
        ScanCreate {
            name: "lab sweep".to_string(),
            target: "192.168.1.0/24".to_string(),
            scan_type: "quick".to_string(),
            nmap_arguments: None,
            configuration: None,
        }
    }

    fn sample_scan(configuration: Option<serde_json::Value>) -> Scan {
        Scan {
            id: Uuid::new_v4(),
            name: "lab sweep".to_string(),
            target: "10.0.0.1".to_string(),
            scan_type: "quick".to_string(),
            nmap_arguments: "-F -T4".to_string(),
            status: ScanStatus::Pending,
            progress: 0,
            configuration,
            error_message: None,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_resolve_arguments_from_builtin() {
        let create = base_create();
        assert_eq!(resolve_arguments(&create).unwrap(), "-F -T4");
    }

    #[test]
    fn test_resolve_arguments_explicit_override() {
        let mut create = base_create();
        create.nmap_arguments = Some("-sn -T3".to_string());
        assert_eq!(resolve_arguments(&create).unwrap(), "-sn -T3");
    }

    #[test]
    fn test_resolve_arguments_blank_override_falls_back() {
        let mut create = base_create();
        create.nmap_arguments = Some("   ".to_string());
        assert_eq!(resolve_arguments(&create).unwrap(), "-F -T4");
    }

    #[test]
    fn test_resolve_arguments_unknown_type() {
        let mut create = base_create();
        create.scan_type = "warp".to_string();
        let err = resolve_arguments(&create).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(err.to_string().contains("Unknown scan type: warp"));
    }

    #[test]
    fn test_scan_timeout_prefers_configuration() {
        let scan = sample_scan(Some(json!({"timeout": 60})));
        assert_eq!(scan_timeout(&scan, 1800), Duration::from_secs(60));
    }

    #[test]
    fn test_scan_timeout_default_without_configuration() {
        let scan = sample_scan(None);
        assert_eq!(scan_timeout(&scan, 900), Duration::from_secs(900));
    }

    #[test]
    fn test_scan_timeout_configuration_defaults_fill_gaps() {
        // A configuration blob without a timeout key carries its own default.
        let scan = sample_scan(Some(json!({"timing": "T2"})));
        assert_eq!(scan_timeout(&scan, 900), Duration::from_secs(1800));
    }
}
