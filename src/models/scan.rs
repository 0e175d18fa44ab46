use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "scan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl Default for ScanStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Pending => write!(f, "pending"),
            ScanStatus::Running => write!(f, "running"),
            ScanStatus::Completed => write!(f, "completed"),
            ScanStatus::Failed => write!(f, "failed"),
            ScanStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl ScanStatus {
    /// A scan that has not yet reached a terminal state
    pub fn is_active(&self) -> bool {
        matches!(self, ScanStatus::Pending | ScanStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanStatus::Completed | ScanStatus::Failed | ScanStatus::Cancelled
        )
    }
}

impl From<&str> for ScanStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "running" => ScanStatus::Running,
            "completed" => ScanStatus::Completed,
            "failed" => ScanStatus::Failed,
            "cancelled" => ScanStatus::Cancelled,
            _ => ScanStatus::Pending,
        }
    }
}

/// Per-scan execution knobs, stored as JSONB alongside the scan row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfiguration {
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_max_hosts")]
    pub max_hosts: u32,
    #[serde(default = "default_timing")]
    pub timing: String,
    #[serde(default)]
    pub additional_args: String,
}

fn default_timeout() -> u64 {
    1800
}

fn default_max_hosts() -> u32 {
    256
}

fn default_timing() -> String {
    "T4".to_string()
}

impl Default for ScanConfiguration {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            max_hosts: default_max_hosts(),
            timing: default_timing(),
            additional_args: String::new(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Scan {
    pub id: Uuid,
    pub name: String,
    pub target: String,
    pub scan_type: String,
    pub nmap_arguments: String,
    pub status: ScanStatus,
    pub progress: i32,
    pub configuration: Option<Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanCreate {
    pub name: String,
    pub target: String,
    pub scan_type: String,
    pub nmap_arguments: Option<String>,
    pub configuration: Option<ScanConfiguration>,
}

/// Response DTO for scan endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ScanResponse {
    pub id: Uuid,
    pub name: String,
    pub target: String,
    pub scan_type: String,
    pub status: ScanStatus,
    pub progress: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl From<Scan> for ScanResponse {
    fn from(scan: Scan) -> Self {
        Self {
            id: scan.id,
            name: scan.name,
            target: scan.target,
            scan_type: scan.scan_type,
            status: scan.status,
            progress: scan.progress,
            created_at: scan.created_at,
            started_at: scan.started_at,
            completed_at: scan.completed_at,
            error_message: scan.error_message,
        }
    }
}
