//! Domain keys for per-site partitions

use url::Url;

use crate::error::SnapshotError;
use crate::Result;

/// Reduce a domain argument to the key its records are filed under.
///
/// Accepts a bare host (`example.com`) or anything carrying a scheme
/// (`https://example.com:8443/path`). Hosts are lowercased; non-default
/// ports are kept so that two origins on one host stay apart.
pub fn normalize_domain(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SnapshotError::EmptyDomain);
    }

    if !trimmed.contains("://") {
        return Ok(trimmed.to_ascii_lowercase());
    }

    let url = Url::parse(trimmed).map_err(|_| SnapshotError::InvalidDomain(trimmed.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| SnapshotError::InvalidDomain(trimmed.to_string()))?;

    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
