//! Report projections over stored scan results: JSON, HTML, and CSV.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{PortEntry, Scan, ScanResult, ScanStatus};
use crate::repositories::{ScanRepository, ScanResultRepository};

pub struct ReportService {
    scan_repo: Arc<dyn ScanRepository>,
    result_repo: Arc<dyn ScanResultRepository>,
}

/// Machine-readable report envelope
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport {
    pub scan_info: ScanInfo,
    pub summary: ReportSummary,
    pub results: Vec<HostReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanInfo {
    pub id: Uuid,
    pub name: String,
    pub target: String,
    pub scan_type: String,
    pub status: ScanStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub total_hosts: usize,
    pub hosts_up: usize,
    pub hosts_down: usize,
    pub total_open_ports: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostReport {
    pub host: String,
    pub hostname: Option<String>,
    pub state: Option<String>,
    pub ports: Option<Value>,
    pub os_detection: Option<Value>,
    pub services: Option<Value>,
}

impl ReportService {
    pub fn new(
        scan_repo: Arc<dyn ScanRepository>,
        result_repo: Arc<dyn ScanResultRepository>,
    ) -> Self {
        Self {
            scan_repo,
            result_repo,
        }
    }

    pub async fn json_report(&self, scan_id: &Uuid) -> Result<JsonReport, ApiError> {
        let (scan, results) = self.load_scan_with_results(scan_id).await?;
        Ok(build_json_report(&scan, &results))
    }

    pub async fn html_report(&self, scan_id: &Uuid) -> Result<String, ApiError> {
        let (scan, results) = self.load_scan_with_results(scan_id).await?;
        Ok(render_html_report(&scan, &results))
    }

    /// CSV export, one row per observed port. Hosts without any port still
    /// get a single row with the port columns left empty.
    pub async fn csv_report(&self, scan_id: &Uuid) -> Result<String, ApiError> {
        let results = self.result_repo.list_by_scan(scan_id).await?;
        if results.is_empty() {
            return Err(ApiError::not_found("No results found for this scan"));
        }
        Ok(render_csv_report(&results))
    }

    async fn load_scan_with_results(
        &self,
        scan_id: &Uuid,
    ) -> Result<(Scan, Vec<ScanResult>), ApiError> {
        let scan = self
            .scan_repo
            .get_by_id(scan_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Scan not found"))?;
        let results = self.result_repo.list_by_scan(scan_id).await?;
        Ok((scan, results))
    }
}

fn build_json_report(scan: &Scan, results: &[ScanResult]) -> JsonReport {
    JsonReport {
        scan_info: ScanInfo {
            id: scan.id,
            name: scan.name.clone(),
            target: scan.target.clone(),
            scan_type: scan.scan_type.clone(),
            status: scan.status,
            created_at: scan.created_at,
            started_at: scan.started_at,
            completed_at: scan.completed_at,
        },
        summary: summarize(results),
        results: results
            .iter()
            .map(|result| HostReport {
                host: result.host.clone(),
                hostname: result.hostname.clone(),
                state: result.state.clone(),
                ports: result.ports.clone(),
                os_detection: result.os_detection.clone(),
                services: result.services.clone(),
            })
            .collect(),
    }
}

fn summarize(results: &[ScanResult]) -> ReportSummary {
    ReportSummary {
        total_hosts: results.len(),
        hosts_up: results
            .iter()
            .filter(|r| r.state.as_deref() == Some("up"))
            .count(),
        hosts_down: results
            .iter()
            .filter(|r| r.state.as_deref() == Some("down"))
            .count(),
        total_open_ports: results.iter().map(port_count).sum(),
    }
}

fn port_count(result: &ScanResult) -> usize {
    result
        .ports
        .as_ref()
        .and_then(|value| value.as_array())
        .map(|ports| ports.len())
        .unwrap_or(0)
}

fn port_entries(result: &ScanResult) -> Vec<PortEntry> {
    result
        .ports
        .as_ref()
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default()
}

fn service_lines(result: &ScanResult) -> Vec<String> {
    result
        .services
        .as_ref()
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default()
}

const REPORT_STYLE: &str = "\
        body { font-family: Arial, sans-serif; margin: 20px; background: #f5f5f5; }
        .container { max-width: 1200px; margin: 0 auto; background: white; padding: 30px; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
        h1 { color: #2c3e50; border-bottom: 3px solid #3498db; padding-bottom: 10px; }
        h2 { color: #34495e; margin-top: 30px; }
        .summary { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 15px; margin: 20px 0; }
        .summary-card { background: #ecf0f1; padding: 15px; border-radius: 5px; border-left: 4px solid #3498db; }
        .summary-card h3 { margin: 0; color: #7f8c8d; font-size: 14px; }
        .summary-card p { margin: 5px 0 0 0; font-size: 24px; font-weight: bold; color: #2c3e50; }
        table { width: 100%; border-collapse: collapse; margin-top: 20px; }
        th { background: #3498db; color: white; padding: 12px; text-align: left; }
        td { padding: 10px; border-bottom: 1px solid #ddd; }
        tr:hover { background: #f8f9fa; }
        .state-up { color: #27ae60; font-weight: bold; }
        .state-down { color: #e74c3c; font-weight: bold; }
        .port-list { list-style: none; padding: 0; margin: 0; }
        .port-list li { padding: 3px 0; }
        .metadata { background: #f8f9fa; padding: 15px; border-radius: 5px; margin-bottom: 20px; }
        .metadata p { margin: 5px 0; }
";

fn render_html_report(scan: &Scan, results: &[ScanResult]) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str(&format!(
        "    <title>Scan Report - {}</title>\n",
        html_escape(&scan.name)
    ));
    html.push_str("    <style>\n");
    html.push_str(REPORT_STYLE);
    html.push_str("    </style>\n</head>\n<body>\n    <div class=\"container\">\n");
    html.push_str(&format!(
        "        <h1>\u{1F50D} Nmap Scan Report: {}</h1>\n",
        html_escape(&scan.name)
    ));

    html.push_str("        <div class=\"metadata\">\n");
    html.push_str(&format!(
        "            <p><strong>Target:</strong> {}</p>\n",
        html_escape(&scan.target)
    ));
    html.push_str(&format!(
        "            <p><strong>Scan Type:</strong> {}</p>\n",
        html_escape(&scan.scan_type)
    ));
    html.push_str(&format!(
        "            <p><strong>Status:</strong> {}</p>\n",
        scan.status
    ));
    html.push_str(&format!(
        "            <p><strong>Started:</strong> {}</p>\n",
        format_optional_time(scan.started_at)
    ));
    html.push_str(&format!(
        "            <p><strong>Completed:</strong> {}</p>\n",
        format_optional_time(scan.completed_at)
    ));
    html.push_str("        </div>\n");

    let summary = summarize(results);
    html.push_str("        <h2>\u{1F4CA} Summary</h2>\n        <div class=\"summary\">\n");
    html.push_str(&summary_card("Total Hosts", summary.total_hosts));
    html.push_str(&summary_card("Hosts Up", summary.hosts_up));
    html.push_str(&summary_card("Hosts Down", summary.hosts_down));
    html.push_str(&summary_card("Open Ports", summary.total_open_ports));
    html.push_str("        </div>\n");

    html.push_str("        <h2>\u{1F5A5} Host Details</h2>\n");
    html.push_str("        <table>\n            <thead>\n                <tr>\n");
    for header in ["Host", "Hostname", "State", "Open Ports", "Services"] {
        html.push_str(&format!("                    <th>{}</th>\n", header));
    }
    html.push_str("                </tr>\n            </thead>\n            <tbody>\n");

    for result in results {
        let state = result.state.as_deref().unwrap_or("unknown");
        let state_class = if state == "up" {
            "state-up"
        } else {
            "state-down"
        };

        // Only the first 10 ports and 5 services make it into the table.
        let ports = port_entries(result);
        let ports_html = if ports.is_empty() {
            "None".to_string()
        } else {
            let items: String = ports
                .iter()
                .take(10)
                .map(|port| {
                    format!(
                        "<li>{}/{} - {}</li>",
                        port.port,
                        html_escape(&port.protocol),
                        html_escape(&port.service)
                    )
                })
                .collect();
            format!("<ul class=\"port-list\">{}</ul>", items)
        };

        let services = service_lines(result);
        let services_html = if services.is_empty() {
            "None".to_string()
        } else {
            services
                .iter()
                .take(5)
                .map(|service| html_escape(service))
                .collect::<Vec<_>>()
                .join("<br>")
        };

        html.push_str("                <tr>\n");
        html.push_str(&format!(
            "                    <td>{}</td>\n",
            html_escape(&result.host)
        ));
        html.push_str(&format!(
            "                    <td>{}</td>\n",
            html_escape(result.hostname.as_deref().unwrap_or("N/A"))
        ));
        html.push_str(&format!(
            "                    <td class=\"{}\">{}</td>\n",
            state_class,
            html_escape(state)
        ));
        html.push_str(&format!("                    <td>{}</td>\n", ports_html));
        html.push_str(&format!("                    <td>{}</td>\n", services_html));
        html.push_str("                </tr>\n");
    }

    html.push_str("            </tbody>\n        </table>\n");
    html.push_str(&format!(
        "        <p style=\"margin-top: 30px; text-align: center; color: #7f8c8d; font-size: 12px;\">\n            Generated by Nmap Scanner - {}\n        </p>\n",
        Utc::now().to_rfc3339()
    ));
    html.push_str("    </div>\n</body>\n</html>\n");
    html
}

fn summary_card(title: &str, value: usize) -> String {
    format!(
        "            <div class=\"summary-card\">\n                <h3>{}</h3>\n                <p>{}</p>\n            </div>\n",
        title, value
    )
}

fn format_optional_time(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "N/A".to_string())
}

fn render_csv_report(results: &[ScanResult]) -> String {
    let mut lines = vec!["Host,Hostname,State,Port,Protocol,Service,Version,Product".to_string()];

    for result in results {
        let host = csv_field(&result.host);
        let hostname = csv_field(result.hostname.as_deref().unwrap_or("N/A"));
        let state = csv_field(result.state.as_deref().unwrap_or("unknown"));

        let ports = port_entries(result);
        if ports.is_empty() {
            lines.push(format!("{},{},{},,,,,", host, hostname, state));
        } else {
            for port in ports {
                lines.push(format!(
                    "{},{},{},{},{},{},{},{}",
                    host,
                    hostname,
                    state,
                    port.port,
                    csv_field(&port.protocol),
                    csv_field(&port.service),
                    csv_field(&port.version),
                    csv_field(&port.product)
                ));
            }
        }
    }

    lines.join("\n")
}

/// Quote a CSV field only when it contains a delimiter, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_scan() -> Scan {
        Scan {
            id: Uuid::new_v4(),
            name: "office sweep".to_string(),
            target: "192.168.1.0/24".to_string(),
            scan_type: "quick".to_string(),
            nmap_arguments: "-F -T4".to_string(),
            status: ScanStatus::Completed,
            progress: 100,
            configuration: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
        }
    }

    fn result_row(host: &str, state: &str, ports: Value, services: Value) -> ScanResult {
        ScanResult {
            id: Uuid::new_v4(),
            scan_id: Uuid::new_v4(),
            host: host.to_string(),
            hostname: None,
            state: Some(state.to_string()),
            ports: Some(ports),
            services: Some(services),
            os_detection: Some(json!({"matches": []})),
            mac_address: None,
            mac_vendor: None,
            raw_output: None,
            created_at: Utc::now(),
        }
    }

    fn ssh_port() -> Value {
        json!({
            "port": 22,
            "protocol": "tcp",
            "state": "open",
            "service": "ssh",
            "version": "8.9p1",
            "product": "OpenSSH"
        })
    }

    #[test]
    fn test_json_report_summary_counts() {
        let scan = sample_scan();
        let results = vec![
            result_row("10.0.0.1", "up", json!([ssh_port()]), json!(["22/tcp - ssh"])),
            result_row("10.0.0.2", "up", json!([ssh_port(), ssh_port()]), json!([])),
            result_row("10.0.0.3", "down", json!([]), json!([])),
        ];

        let report = build_json_report(&scan, &results);
        assert_eq!(report.summary.total_hosts, 3);
        assert_eq!(report.summary.hosts_up, 2);
        assert_eq!(report.summary.hosts_down, 1);
        assert_eq!(report.summary.total_open_ports, 3);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.scan_info.name, "office sweep");
    }

    #[test]
    fn test_json_report_serializes_expected_keys() {
        let scan = sample_scan();
        let results = vec![result_row(
            "10.0.0.1",
            "up",
            json!([ssh_port()]),
            json!(["22/tcp - ssh"]),
        )];

        let value = serde_json::to_value(build_json_report(&scan, &results)).unwrap();
        assert!(value.get("scan_info").is_some());
        assert!(value.get("summary").is_some());
        assert_eq!(value["scan_info"]["status"], "completed");
        assert_eq!(value["results"][0]["host"], "10.0.0.1");
        assert!(value["results"][0].get("raw_output").is_none());
    }

    #[test]
    fn test_html_report_escapes_values() {
        let scan = Scan {
            name: "<script>alert(1)</script>".to_string(),
            ..sample_scan()
        };
        let mut row = result_row("10.0.0.1", "up", json!([]), json!([]));
        row.hostname = Some("evil<host>".to_string());

        let html = render_html_report(&scan, &[row]);
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("evil&lt;host&gt;"));
        assert!(!html.contains("<script>alert(1)</script>"));
    }

    #[test]
    fn test_html_report_truncates_ports_and_services() {
        let ports: Vec<Value> = (1..=15)
            .map(|n| {
                json!({
                    "port": n,
                    "protocol": "tcp",
                    "state": "open",
                    "service": format!("svc{}", n)
                })
            })
            .collect();
        let services: Vec<String> = (1..=8).map(|n| format!("{}/tcp - svc{}", n, n)).collect();
        let row = result_row("10.0.0.1", "up", json!(ports), json!(services));

        let html = render_html_report(&sample_scan(), &[row]);
        assert!(html.contains("<li>10/tcp - svc10</li>"));
        assert!(!html.contains("<li>11/tcp - svc11</li>"));
        assert!(html.contains("<br>5/tcp - svc5"));
        assert!(!html.contains("<br>6/tcp - svc6"));
        assert!(html.contains("state-up"));
    }

    #[test]
    fn test_html_report_empty_cells_render_none() {
        let row = result_row("10.0.0.9", "down", json!([]), json!([]));
        let html = render_html_report(&sample_scan(), &[row]);
        assert!(html.contains("<td>None</td>"));
        assert!(html.contains("state-down"));
    }

    #[test]
    fn test_csv_report_row_per_port() {
        let mut http_port = ssh_port();
        http_port["port"] = json!(80);
        http_port["service"] = json!("http");
        http_port["version"] = json!("1.24");
        http_port["product"] = json!("nginx");
        let row = result_row("10.0.0.1", "up", json!([ssh_port(), http_port]), json!([]));

        let csv = render_csv_report(&[row]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "Host,Hostname,State,Port,Protocol,Service,Version,Product"
        );
        assert_eq!(lines[1], "10.0.0.1,N/A,up,22,tcp,ssh,8.9p1,OpenSSH");
        assert_eq!(lines[2], "10.0.0.1,N/A,up,80,tcp,http,1.24,nginx");
    }

    #[test]
    fn test_csv_report_portless_host_single_row() {
        let mut row = result_row("10.0.0.3", "down", json!([]), json!([]));
        row.hostname = Some("printer.lan".to_string());

        let csv = render_csv_report(&[row]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[1], "10.0.0.3,printer.lan,down,,,,,");
        assert_eq!(lines[1].matches(',').count(), 7);
    }

    #[test]
    fn test_csv_report_quotes_embedded_delimiters() {
        let mut port = ssh_port();
        port["product"] = json!("ACME, Inc. \"router\"");
        let row = result_row("10.0.0.1", "up", json!([port]), json!([]));

        let csv = render_csv_report(&[row]);
        assert!(csv.contains("\"ACME, Inc. \"\"router\"\"\""));
    }
}
