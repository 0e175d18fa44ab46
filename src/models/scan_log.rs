use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanLogLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl std::fmt::Display for ScanLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanLogLevel::Info => write!(f, "info"),
            ScanLogLevel::Warning => write!(f, "warning"),
            ScanLogLevel::Error => write!(f, "error"),
            ScanLogLevel::Success => write!(f, "success"),
        }
    }
}

/// Append-only log line attached to a scan
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScanLog {
    pub id: Uuid,
    pub scan_id: Uuid,
    pub level: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Response DTO for the scan logs endpoint; the scan id is already in the path
#[derive(Debug, Clone, Serialize)]
pub struct ScanLogResponse {
    pub id: Uuid,
    pub level: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<ScanLog> for ScanLogResponse {
    fn from(log: ScanLog) -> Self {
        Self {
            id: log.id,
            level: log.level,
            message: log.message,
            created_at: log.created_at,
        }
    }
}
