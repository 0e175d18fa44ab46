//! Maps parsed nmap reports onto normalized per-host result rows.
//!
//! Hostname resolution prefers reverse-DNS names from the report and falls
//! back to NetBIOS names recovered from `nbstat` or `smb-os-discovery`
//! script output when DNS gave nothing.

use crate::models::{OsDetection, OsMatch, PortEntry, ScanResultCreate};
use crate::services::nmap::{NmapHost, NmapRun};

/// Convert a parsed report into result rows, one per host.
///
/// The raw XML is kept on the first row only; per-host raw output is not
/// worth duplicating for every host of a /24 sweep.
pub fn normalize_results(run: &NmapRun, raw_xml: &str) -> Vec<ScanResultCreate> {
    let mut results: Vec<ScanResultCreate> =
        run.hosts.iter().filter_map(normalize_host).collect();

    if let Some(first) = results.first_mut() {
        first.raw_output = Some(raw_xml.to_string());
    }

    results
}

/// Flatten one host element. Hosts without any address are dropped, there is
/// nothing to key the row by.
fn normalize_host(host: &NmapHost) -> Option<ScanResultCreate> {
    let address = host
        .addresses
        .iter()
        .find(|a| a.addr_type == "ipv4")
        .or_else(|| host.addresses.first())?;

    let mac_entry = host.addresses.iter().find(|a| a.addr_type == "mac");
    let mac_address = mac_entry.map(|a| a.addr.clone());
    let mac_vendor = mac_entry.and_then(|a| a.vendor.clone());

    let state = host
        .status
        .as_ref()
        .map(|s| s.state.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let mut hostname = host
        .hostnames
        .as_ref()
        .and_then(|h| h.hostnames.iter().find(|hn| !hn.name.is_empty()))
        .map(|hn| hn.name.clone());

    if hostname.is_none() {
        hostname = hostname_from_scripts(host);
    }

    let mut ports = Vec::new();
    let mut services = Vec::new();
    if let Some(host_ports) = &host.ports {
        for port in &host_ports.ports {
            let service = port.service.as_ref();
            let service_name = service
                .and_then(|s| s.name.clone())
                .unwrap_or_else(|| "unknown".to_string());

            ports.push(PortEntry {
                port: port.port_id,
                protocol: port.protocol.clone(),
                state: port
                    .state
                    .as_ref()
                    .map(|s| s.state.clone())
                    .unwrap_or_else(|| "unknown".to_string()),
                service: service_name.clone(),
                version: service.and_then(|s| s.version.clone()).unwrap_or_default(),
                product: service.and_then(|s| s.product.clone()).unwrap_or_default(),
                extrainfo: service
                    .and_then(|s| s.extra_info.clone())
                    .unwrap_or_default(),
            });
            services.push(format!("{}/{} - {}", port.port_id, port.protocol, service_name));
        }
    }

    let os_detection = host
        .os
        .as_ref()
        .map(|os| OsDetection {
            matches: os
                .os_matches
                .iter()
                .map(|m| OsMatch {
                    name: m.name.clone(),
                    accuracy: m.accuracy.clone(),
                    line: m.line.clone(),
                })
                .collect(),
        })
        .unwrap_or_default();

    Some(ScanResultCreate {
        host: address.addr.clone(),
        hostname,
        state,
        ports,
        services,
        os_detection,
        mac_address,
        mac_vendor,
        raw_output: None,
    })
}

fn hostname_from_scripts(host: &NmapHost) -> Option<String> {
    let scripts = &host.hostscript.as_ref()?.scripts;
    for script in scripts {
        if script.output.is_empty() {
            continue;
        }
        if script.id.contains("nbstat") {
            if let Some(name) = netbios_name_from_nbstat(&script.output) {
                return Some(name);
            }
        }
        if script.id.contains("smb-os-discovery") {
            if let Some(name) = computer_name_from_smb(&script.output) {
                return Some(name);
            }
        }
    }
    None
}

/// Pull the computer name out of nbstat output. The name table line looks
/// like `  FILESERVER  <00>  UNIQUE  Registered`.
fn netbios_name_from_nbstat(output: &str) -> Option<String> {
    for line in output.lines() {
        if line.contains("<00>") && (line.contains("Workstation") || line.contains("UNIQUE")) {
            if let Some(first) = line.split_whitespace().next() {
                if !first.starts_with('<') {
                    return Some(first.trim().to_string());
                }
            }
        }
    }
    None
}

fn computer_name_from_smb(output: &str) -> Option<String> {
    for line in output.lines() {
        if line.contains("Computer name:") || line.contains("NetBIOS computer name:") {
            if let Some((_, value)) = line.split_once(':') {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::nmap::parse_nmap_xml;

    fn parse(xml: &str) -> NmapRun {
        parse_nmap_xml(xml).unwrap()
    }

    #[test]
    fn test_normalize_host_with_ports_and_os() {
        let xml = r#"<nmaprun scanner="nmap">
<host>
<status state="up" reason="arp-response"/>
<address addr="192.168.1.10" addrtype="ipv4"/>
<address addr="AA:BB:CC:DD:EE:FF" addrtype="mac" vendor="Intel Corporate"/>
<hostnames><hostname name="fileserver.lan" type="PTR"/></hostnames>
<ports>
<port protocol="tcp" portid="22"><state state="open"/><service name="ssh" product="OpenSSH" version="8.9p1" extrainfo="protocol 2.0"/></port>
<port protocol="tcp" portid="8080"><state state="open"/></port>
</ports>
<os><osmatch name="Linux 5.0 - 5.14" accuracy="96" line="67241"/></os>
</host>
</nmaprun>"#;

        let results = normalize_results(&parse(xml), xml);
        assert_eq!(results.len(), 1);

        let row = &results[0];
        assert_eq!(row.host, "192.168.1.10");
        assert_eq!(row.hostname.as_deref(), Some("fileserver.lan"));
        assert_eq!(row.state, "up");
        assert_eq!(row.mac_address.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(row.mac_vendor.as_deref(), Some("Intel Corporate"));

        assert_eq!(row.ports.len(), 2);
        assert_eq!(row.ports[0].port, 22);
        assert_eq!(row.ports[0].service, "ssh");
        assert_eq!(row.ports[0].product, "OpenSSH");
        assert_eq!(row.ports[0].version, "8.9p1");
        assert_eq!(row.ports[0].extrainfo, "protocol 2.0");
        // port without a service element falls back to "unknown"
        assert_eq!(row.ports[1].service, "unknown");
        assert_eq!(row.ports[1].version, "");

        assert_eq!(row.services, vec!["22/tcp - ssh", "8080/tcp - unknown"]);

        assert_eq!(row.os_detection.matches.len(), 1);
        assert_eq!(row.os_detection.matches[0].name, "Linux 5.0 - 5.14");
        assert_eq!(row.os_detection.matches[0].accuracy, "96");

        // raw report rides on the first row
        assert!(row.raw_output.is_some());
    }

    #[test]
    fn test_raw_output_only_on_first_row() {
        let xml = r#"<nmaprun scanner="nmap">
<host><status state="up"/><address addr="10.0.0.1" addrtype="ipv4"/></host>
<host><status state="up"/><address addr="10.0.0.2" addrtype="ipv4"/></host>
</nmaprun>"#;

        let results = normalize_results(&parse(xml), xml);
        assert_eq!(results.len(), 2);
        assert!(results[0].raw_output.is_some());
        assert!(results[1].raw_output.is_none());
    }

    #[test]
    fn test_down_host_is_kept() {
        let xml = r#"<nmaprun scanner="nmap">
<host><status state="down" reason="no-response"/><address addr="10.0.0.9" addrtype="ipv4"/></host>
</nmaprun>"#;

        let results = normalize_results(&parse(xml), xml);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].state, "down");
        assert!(results[0].ports.is_empty());
        assert!(results[0].services.is_empty());
        assert!(results[0].os_detection.matches.is_empty());
    }

    #[test]
    fn test_host_without_address_is_dropped() {
        let xml = r#"<nmaprun scanner="nmap">
<host><status state="up"/></host>
<host><status state="up"/><address addr="10.0.0.2" addrtype="ipv4"/></host>
</nmaprun>"#;

        let results = normalize_results(&parse(xml), xml);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].host, "10.0.0.2");
    }

    #[test]
    fn test_netbios_fallback_from_nbstat() {
        // nbtstat-style name table: name and suffix separated by whitespace
        let nbstat_output = "NetBIOS name table:\n\
            \x20 WORKSTATION01  <00>  UNIQUE      Registered\n\
            \x20 WORKGROUP      <00>  GROUP       Registered";

        assert_eq!(
            netbios_name_from_nbstat(nbstat_output).as_deref(),
            Some("WORKSTATION01")
        );

        // lines whose first token is a NetBIOS suffix marker are skipped
        let leading_bracket = "<00> UNIQUE\n  REALNAME  <00>  UNIQUE  Registered";
        assert_eq!(
            netbios_name_from_nbstat(leading_bracket).as_deref(),
            Some("REALNAME")
        );

        assert_eq!(netbios_name_from_nbstat("no name table here"), None);
    }

    #[test]
    fn test_netbios_fallback_from_smb_discovery() {
        let smb_output = "\
            |   OS: Windows Server 2016 Standard 14393\n\
            |   Computer name: fileserver\n\
            |   NetBIOS computer name: FILESERVER";
        assert_eq!(computer_name_from_smb(smb_output).as_deref(), Some("fileserver"));

        let netbios_only = "|   NetBIOS computer name: FILESERVER";
        assert_eq!(computer_name_from_smb(netbios_only).as_deref(), Some("FILESERVER"));

        assert_eq!(computer_name_from_smb("|   OS: Windows"), None);
    }

    #[test]
    fn test_script_fallback_used_only_without_dns_name() {
        let xml = r#"<nmaprun scanner="nmap">
<host>
<status state="up"/>
<address addr="192.168.1.20" addrtype="ipv4"/>
<hostscript>
<script id="nbstat" output="Name table:&#10;  STATION42  &lt;00&gt;  UNIQUE  Registered"/>
</hostscript>
</host>
<host>
<status state="up"/>
<address addr="192.168.1.21" addrtype="ipv4"/>
<hostnames><hostname name="printer.lan" type="PTR"/></hostnames>
<hostscript>
<script id="nbstat" output="Name table:&#10;  IGNORED  &lt;00&gt;  UNIQUE  Registered"/>
</hostscript>
</host>
</nmaprun>"#;

        let results = normalize_results(&parse(xml), xml);
        assert_eq!(results[0].hostname.as_deref(), Some("STATION42"));
        assert_eq!(results[1].hostname.as_deref(), Some("printer.lan"));
    }

    #[test]
    fn test_empty_run_yields_no_rows() {
        let xml = r#"<nmaprun scanner="nmap"></nmaprun>"#;
        let results = normalize_results(&parse(xml), xml);
        assert!(results.is_empty());
    }
}
