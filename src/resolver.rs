//! Target address resolution
//!
//! A target is either an IP literal or a hostname. Anything that looks like a
//! numeric address has to parse as one, so typos like `192.168.1.300` are
//! rejected instead of being sent to DNS.

use std::net::{IpAddr, SocketAddr};

use tokio::net::lookup_host;
use tracing::{instrument, trace};

use crate::error::{ConfigError, ConfigResult};

/// Resolve a target to a single IP address, preferring IPv4.
#[instrument]
pub async fn resolve_target(host: &str) -> ConfigResult<IpAddr> {
    let host = host.trim();

    if let Some(ip) = parse_literal(host)? {
        return Ok(ip);
    }

    if !is_valid_hostname(host) {
        return Err(ConfigError::InvalidAddress(host.to_string()));
    }

    let addrs: Vec<SocketAddr> = lookup_host((host, 0))
        .await
        .map_err(|e| ConfigError::ResolutionFailure(format!("{host}: {e}")))?
        .collect();
    trace!("{host} resolved to {addrs:?}");

    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .map(SocketAddr::ip)
        .ok_or_else(|| ConfigError::ResolutionFailure(format!("{host}: no addresses found")))
}

/// Parse `host` as an IP literal.
///
/// Returns `Ok(None)` if the input does not look numeric at all.
pub fn parse_literal(host: &str) -> ConfigResult<Option<IpAddr>> {
    let looks_numeric = host.contains(':')
        || (!host.is_empty() && host.chars().all(|c| c.is_ascii_digit() || c == '.'));

    if !looks_numeric {
        return Ok(None);
    }

    host.parse::<IpAddr>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidAddress(host.to_string()))
}

pub fn is_valid_hostname(host: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() || host.len() > 253 {
        return false;
    }

    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
