//! Nmap subprocess runner and XML report parsing.
//!
//! Scans are executed by spawning the configured nmap binary with `-oX -` so
//! the XML report arrives on stdout. Parsing goes through serde first and
//! falls back to a DOM walk for reports the strict deserializer rejects.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use roxmltree::Document;
use serde::Deserialize;
use tokio::process::Command;

use crate::config::Settings;
use crate::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct NmapRun {
    #[serde(rename = "@scanner", default)]
    pub scanner: Option<String>,
    #[serde(rename = "@args", default)]
    pub args: Option<String>,
    #[serde(rename = "host", default)]
    pub hosts: Vec<NmapHost>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NmapHost {
    pub status: Option<NmapHostStatus>,
    #[serde(rename = "address", default)]
    pub addresses: Vec<NmapAddress>,
    pub hostnames: Option<NmapHostnames>,
    pub ports: Option<NmapPorts>,
    pub os: Option<NmapOs>,
    pub hostscript: Option<NmapHostScript>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NmapHostStatus {
    #[serde(rename = "@state")]
    pub state: String,
    #[serde(rename = "@reason", default)]
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NmapAddress {
    #[serde(rename = "@addr")]
    pub addr: String,
    #[serde(rename = "@addrtype")]
    pub addr_type: String,
    #[serde(rename = "@vendor", default)]
    pub vendor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NmapHostnames {
    #[serde(rename = "hostname", default)]
    pub hostnames: Vec<NmapHostname>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NmapHostname {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@type", default)]
    pub hostname_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NmapPorts {
    #[serde(rename = "port", default)]
    pub ports: Vec<NmapPort>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NmapPort {
    #[serde(rename = "@protocol")]
    pub protocol: String,
    #[serde(rename = "@portid")]
    pub port_id: u16,
    pub state: Option<NmapPortState>,
    pub service: Option<NmapService>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NmapPortState {
    #[serde(rename = "@state")]
    pub state: String,
    #[serde(rename = "@reason", default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NmapService {
    #[serde(rename = "@name", default)]
    pub name: Option<String>,
    #[serde(rename = "@product", default)]
    pub product: Option<String>,
    #[serde(rename = "@version", default)]
    pub version: Option<String>,
    #[serde(rename = "@extrainfo", default)]
    pub extra_info: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NmapOs {
    #[serde(rename = "osmatch", default)]
    pub os_matches: Vec<NmapOsMatch>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NmapOsMatch {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@accuracy")]
    pub accuracy: String,
    #[serde(rename = "@line", default)]
    pub line: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NmapHostScript {
    #[serde(rename = "script", default)]
    pub scripts: Vec<NmapScript>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NmapScript {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@output", default)]
    pub output: String,
}

/// Executes nmap as a child process
pub struct NmapScanner {
    settings: Arc<Settings>,
}

impl NmapScanner {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Check whether the configured nmap binary can be executed
    pub async fn is_available(&self) -> bool {
        Command::new(&self.settings.nmap_path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Run nmap against a target and return the raw XML report
    pub async fn run_scan(
        &self,
        target: &str,
        arguments: &str,
        timeout: Duration,
    ) -> Result<String, ApiError> {
        let mut cmd = Command::new(&self.settings.nmap_path);
        for arg in arguments.split_whitespace() {
            cmd.arg(arg);
        }
        cmd.arg("-oX").arg("-"); // XML report to stdout
        cmd.arg(target);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!("Running nmap command: {:?}", cmd);

        let child = cmd.spawn().map_err(|e| {
            ApiError::scanner(format!(
                "Failed to launch {}: {}",
                self.settings.nmap_path, e
            ))
        })?;

        // kill_on_drop reaps the child when the timeout drops the future
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ApiError::timeout(format!(
                    "Scan of {} exceeded the {}s timeout",
                    target,
                    timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ApiError::scanner(format!(
                "nmap exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Parse an nmap XML report
pub fn parse_nmap_xml(xml: &str) -> Result<NmapRun, ApiError> {
    match quick_xml::de::from_str::<NmapRun>(xml) {
        Ok(run) => Ok(run),
        Err(e) => {
            tracing::debug!("Strict XML deserialization failed ({}), trying DOM walk", e);
            parse_nmap_xml_dom(xml)
        }
    }
}

/// DOM fallback for reports the serde deserializer cannot handle
fn parse_nmap_xml_dom(xml: &str) -> Result<NmapRun, ApiError> {
    // the DTD reference and the stylesheet directive trip up the parser
    let cleaned = xml
        .lines()
        .filter(|line| !line.contains("<!DOCTYPE") && !line.contains("<?xml-stylesheet"))
        .collect::<Vec<_>>()
        .join("\n");

    let doc = Document::parse(&cleaned)
        .map_err(|e| ApiError::scan_output(format!("Unparseable nmap XML report: {}", e)))?;

    let root = doc.root_element();
    let mut run = NmapRun {
        scanner: root.attribute("scanner").map(str::to_string),
        args: root.attribute("args").map(str::to_string),
        hosts: Vec::new(),
    };

    for host_node in doc.descendants().filter(|n| n.has_tag_name("host")) {
        let mut host = NmapHost::default();

        if let Some(status_node) = host_node.children().find(|n| n.has_tag_name("status")) {
            if let Some(state) = status_node.attribute("state") {
                host.status = Some(NmapHostStatus {
                    state: state.to_string(),
                    reason: status_node.attribute("reason").unwrap_or("").to_string(),
                });
            }
        }

        for addr_node in host_node.children().filter(|n| n.has_tag_name("address")) {
            if let Some(addr) = addr_node.attribute("addr") {
                host.addresses.push(NmapAddress {
                    addr: addr.to_string(),
                    addr_type: addr_node.attribute("addrtype").unwrap_or("ipv4").to_string(),
                    vendor: addr_node.attribute("vendor").map(str::to_string),
                });
            }
        }

        if let Some(hostnames_node) = host_node.children().find(|n| n.has_tag_name("hostnames")) {
            let hostnames: Vec<NmapHostname> = hostnames_node
                .children()
                .filter(|n| n.has_tag_name("hostname"))
                .filter_map(|n| {
                    n.attribute("name").map(|name| NmapHostname {
                        name: name.to_string(),
                        hostname_type: n.attribute("type").unwrap_or("").to_string(),
                    })
                })
                .collect();
            if !hostnames.is_empty() {
                host.hostnames = Some(NmapHostnames { hostnames });
            }
        }

        if let Some(ports_node) = host_node.children().find(|n| n.has_tag_name("ports")) {
            let mut ports = Vec::new();
            for port_node in ports_node.children().filter(|n| n.has_tag_name("port")) {
                let Some(port_id) = port_node.attribute("portid").and_then(|p| p.parse().ok())
                else {
                    continue;
                };

                let state = port_node
                    .children()
                    .find(|n| n.has_tag_name("state"))
                    .and_then(|n| {
                        n.attribute("state").map(|state| NmapPortState {
                            state: state.to_string(),
                            reason: n.attribute("reason").unwrap_or("").to_string(),
                        })
                    });

                let service = port_node
                    .children()
                    .find(|n| n.has_tag_name("service"))
                    .map(|n| NmapService {
                        name: n.attribute("name").map(str::to_string),
                        product: n.attribute("product").map(str::to_string),
                        version: n.attribute("version").map(str::to_string),
                        extra_info: n.attribute("extrainfo").map(str::to_string),
                    });

                ports.push(NmapPort {
                    protocol: port_node.attribute("protocol").unwrap_or("tcp").to_string(),
                    port_id,
                    state,
                    service,
                });
            }
            if !ports.is_empty() {
                host.ports = Some(NmapPorts { ports });
            }
        }

        if let Some(os_node) = host_node.children().find(|n| n.has_tag_name("os")) {
            let os_matches: Vec<NmapOsMatch> = os_node
                .children()
                .filter(|n| n.has_tag_name("osmatch"))
                .filter_map(|n| {
                    n.attribute("name").map(|name| NmapOsMatch {
                        name: name.to_string(),
                        accuracy: n.attribute("accuracy").unwrap_or("0").to_string(),
                        line: n.attribute("line").unwrap_or("").to_string(),
                    })
                })
                .collect();
            if !os_matches.is_empty() {
                host.os = Some(NmapOs { os_matches });
            }
        }

        if let Some(hostscript_node) = host_node.children().find(|n| n.has_tag_name("hostscript"))
        {
            let scripts: Vec<NmapScript> = hostscript_node
                .children()
                .filter(|n| n.has_tag_name("script"))
                .filter_map(|n| {
                    n.attribute("id").map(|id| NmapScript {
                        id: id.to_string(),
                        output: n.attribute("output").unwrap_or("").to_string(),
                    })
                })
                .collect();
            if !scripts.is_empty() {
                host.hostscript = Some(NmapHostScript { scripts });
            }
        }

        run.hosts.push(host);
    }

    Ok(run)
}
