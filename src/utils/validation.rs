use std::net::IpAddr;

use crate::error::ApiError;

/// Validate a scan target: a single IP address, a CIDR network, or a
/// hostname.
pub fn validate_target(target: &str) -> Result<(), ApiError> {
    let target = target.trim();

    if target.is_empty() {
        return Err(ApiError::validation("Target cannot be empty"));
    }

    if target.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    if target.contains('/') {
        target
            .parse::<ipnet::IpNet>()
            .map_err(|_| ApiError::validation(format!("Invalid CIDR notation: {}", target)))?;
        return Ok(());
    }

    validate_hostname(target)
}

fn validate_hostname(hostname: &str) -> Result<(), ApiError> {
    if hostname.len() > 253 {
        return Err(ApiError::validation("Target hostname too long"));
    }

    // A hostname starts with an alphanumeric character; dots and dashes
    // only appear between labels.
    if !hostname
        .chars()
        .next()
        .map(|c| c.is_alphanumeric())
        .unwrap_or(false)
    {
        return Err(ApiError::validation(format!("Invalid target: {}", hostname)));
    }

    if !hostname
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ApiError::validation(format!("Invalid target: {}", hostname)));
    }

    Ok(())
}
