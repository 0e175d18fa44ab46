use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScanTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub scan_type: String,
    pub nmap_arguments: Option<String>,
    pub configuration: Option<Value>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanTemplateCreate {
    pub name: String,
    pub description: Option<String>,
    pub scan_type: String,
    pub nmap_arguments: Option<String>,
    pub configuration: Option<Value>,
    #[serde(default)]
    pub is_default: bool,
}

/// One entry of the builtin catalog served by `/api/templates/builtin`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuiltinTemplate {
    pub name: &'static str,
    pub arguments: &'static str,
    pub description: &'static str,
}

/// Builtin scan templates keyed by the `scan_type` accepted at scan creation.
pub const BUILTIN_TEMPLATES: &[(&str, BuiltinTemplate)] = &[
    (
        "quick",
        BuiltinTemplate {
            name: "Quick Scan",
            arguments: "-F -T4",
            description: "Fast scan of the most common 100 ports",
        },
    ),
    (
        "full",
        BuiltinTemplate {
            name: "Full Port Scan",
            arguments: "-p- -T4",
            description: "Comprehensive scan of all 65535 ports",
        },
    ),
    (
        "udp",
        BuiltinTemplate {
            name: "UDP Scan",
            arguments: "-sU --top-ports 100 -T4",
            description: "Scan common UDP ports",
        },
    ),
    (
        "discovery",
        BuiltinTemplate {
            name: "Host Discovery",
            arguments: "-sn -PE -PP -PM --dns-servers 8.8.8.8,1.1.1.1 -T4",
            description: "Discover active hosts in network (ping sweep)",
        },
    ),
    (
        "local_network",
        BuiltinTemplate {
            name: "Local Network Scan",
            arguments: "-sn -PR --dns-servers 8.8.8.8,1.1.1.1 -T4",
            description: "Complete local network scan with MAC vendor identification",
        },
    ),
    (
        "web_server",
        BuiltinTemplate {
            name: "Web Server Scan",
            arguments: "-p 80,443,8080,8443,3000,5000,8000 -sV --script http-title,http-methods,http-headers -T4",
            description: "Scan web servers (HTTP/HTTPS) with service detection",
        },
    ),
    (
        "db_server",
        BuiltinTemplate {
            name: "Database Server Scan",
            arguments: "-p 3306,5432,1433,1521,27017,6379,5984,9200,11211 -sV -T4",
            description: "Scan common database ports with version detection",
        },
    ),
    (
        "mail_server",
        BuiltinTemplate {
            name: "Mail Server Scan",
            arguments: "-p 25,110,143,465,587,993,995 -sV --script smtp-commands,pop3-capabilities,imap-capabilities -T4",
            description: "Scan mail servers (SMTP, POP3, IMAP)",
        },
    ),
    (
        "ftp_ssh_server",
        BuiltinTemplate {
            name: "FTP/SSH Server Scan",
            arguments: "-p 20,21,22,23,990,2121,2222 -sV --script ftp-anon,ssh-auth-methods -T4",
            description: "Scan file transfer and remote access services",
        },
    ),
    (
        "dns_server",
        BuiltinTemplate {
            name: "DNS Server Scan",
            arguments: "-p 53 -sU -sV --script dns-nsid,dns-recursion -T4",
            description: "Scan DNS servers and detect configuration",
        },
    ),
    (
        "service",
        BuiltinTemplate {
            name: "Service Version Detection",
            arguments: "-sV -O -T4",
            description: "Detect service versions and OS",
        },
    ),
    (
        "vulnerability",
        BuiltinTemplate {
            name: "Vulnerability Scan",
            arguments: "-sV --script vuln -T4",
            description: "Scan with NSE vulnerability scripts",
        },
    ),
    (
        "security_audit",
        BuiltinTemplate {
            name: "Security Audit",
            arguments: "-p- -sV --script ssl-cert,ssl-enum-ciphers,ssh-auth-methods -T4",
            description: "Complete security audit with SSL/TLS checks",
        },
    ),
    (
        "stealth",
        BuiltinTemplate {
            name: "Stealth Scan",
            arguments: "-sS -T2 -f",
            description: "SYN stealth scan with minimal footprint",
        },
    ),
    (
        "aggressive",
        BuiltinTemplate {
            name: "Aggressive Scan",
            arguments: "-A -T4",
            description: "Aggressive scan with OS detection, version, scripts and traceroute",
        },
    ),
];

/// Look up a builtin template by its catalog key.
pub fn find_builtin(scan_type: &str) -> Option<&'static BuiltinTemplate> {
    BUILTIN_TEMPLATES
        .iter()
        .find(|(key, _)| *key == scan_type)
        .map(|(_, template)| template)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_size_and_lookup() {
        assert_eq!(BUILTIN_TEMPLATES.len(), 15);

        let quick = find_builtin("quick").unwrap();
        assert_eq!(quick.arguments, "-F -T4");

        let aggressive = find_builtin("aggressive").unwrap();
        assert_eq!(aggressive.name, "Aggressive Scan");

        assert!(find_builtin("nonexistent").is_none());
    }

    #[test]
    fn test_catalog_keys_are_unique() {
        let mut keys: Vec<&str> = BUILTIN_TEMPLATES.iter().map(|(k, _)| *k).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), BUILTIN_TEMPLATES.len());
    }

    #[test]
    fn test_catalog_arguments_never_empty() {
        for (key, template) in BUILTIN_TEMPLATES {
            assert!(!template.arguments.is_empty(), "empty arguments for {}", key);
        }
    }
}
