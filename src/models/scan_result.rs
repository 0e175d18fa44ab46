use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A single port observation on a host, stored inside the `ports` JSONB array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PortEntry {
    pub port: u16,
    pub protocol: String,
    pub state: String,
    pub service: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub extrainfo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsMatch {
    pub name: String,
    pub accuracy: String,
    pub line: String,
}

/// OS fingerprint summary, stored inside the `os_detection` JSONB column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OsDetection {
    pub matches: Vec<OsMatch>,
}

/// Normalized per-host row as persisted
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScanResult {
    pub id: Uuid,
    pub scan_id: Uuid,
    pub host: String,
    pub hostname: Option<String>,
    pub state: Option<String>,
    pub ports: Option<Value>,
    pub services: Option<Value>,
    pub os_detection: Option<Value>,
    pub mac_address: Option<String>,
    pub mac_vendor: Option<String>,
    #[serde(skip_serializing)]
    pub raw_output: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Normalizer output, not yet bound to a scan row
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanResultCreate {
    pub host: String,
    pub hostname: Option<String>,
    pub state: String,
    pub ports: Vec<PortEntry>,
    pub services: Vec<String>,
    pub os_detection: OsDetection,
    pub mac_address: Option<String>,
    pub mac_vendor: Option<String>,
    pub raw_output: Option<String>,
}

/// Response DTO for the scan results endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ScanResultResponse {
    pub id: Uuid,
    pub scan_id: Uuid,
    pub host: String,
    pub hostname: Option<String>,
    pub state: Option<String>,
    pub ports: Option<Value>,
    pub services: Option<Value>,
    pub os_detection: Option<Value>,
    pub mac_address: Option<String>,
    pub mac_vendor: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ScanResult> for ScanResultResponse {
    fn from(result: ScanResult) -> Self {
        Self {
            id: result.id,
            scan_id: result.scan_id,
            host: result.host,
            hostname: result.hostname,
            state: result.state,
            ports: result.ports,
            services: result.services,
            os_detection: result.os_detection,
            mac_address: result.mac_address,
            mac_vendor: result.mac_vendor,
            created_at: result.created_at,
        }
    }
}
