//! Strict `host:port` resolution.
//!
//! Only literal IP addresses with an explicit numeric port are accepted; no
//! name lookups are ever performed.

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddrError {
    #[error("missing port in address {0:?}")]
    MissingPort(String),
    #[error("too many colons in address {0:?}")]
    TooManyColons(String),
    #[error("missing ']' in address {0:?}")]
    MissingBracket(String),
    #[error("address string {0:?} lacks a host part")]
    EmptyHost(String),
    #[error("address string {0:?} lacks a port part")]
    EmptyPort(String),
    #[error("not an IP string: {0:?}")]
    NotAnIp(String),
    #[error("invalid port {0:?}")]
    BadPort(String),
}

/// Split `host:port`, where an IPv6 host must be bracketed.
fn split_host_port(s: &str) -> Result<(&str, &str), AddrError> {
    if let Some(rest) = s.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| AddrError::MissingBracket(s.to_string()))?;
        let port = after
            .strip_prefix(':')
            .ok_or_else(|| AddrError::MissingPort(s.to_string()))?;
        if port.contains(':') || host.contains('[') || host.contains(']') {
            return Err(AddrError::TooManyColons(s.to_string()));
        }
        return Ok((host, port));
    }

    let (host, port) = s
        .rsplit_once(':')
        .ok_or_else(|| AddrError::MissingPort(s.to_string()))?;
    if host.contains(':') {
        return Err(AddrError::TooManyColons(s.to_string()));
    }
    Ok((host, port))
}

/// Resolve an address string into a socket address.
///
/// Stricter than ordinary resolution: the host must be a literal IP and both
/// parts must be present. Older controllers wrote IPv6 addresses without
/// brackets (`::1:9001`); that form is retried by treating the last colon as
/// the port separator.
pub fn resolve_addr(s: &str) -> Result<SocketAddr, AddrError> {
    let (host, port) = match split_host_port(s) {
        Ok(parts) => parts,
        // Only worth retrying for what looks like a bare IPv6 address.
        Err(err) => match s.rsplit_once(':') {
            Some((host, port)) if !s.starts_with('[') && host.contains(':') => (host, port),
            _ => return Err(err),
        },
    };

    if host.is_empty() {
        return Err(AddrError::EmptyHost(s.to_string()));
    }
    if port.is_empty() {
        return Err(AddrError::EmptyPort(s.to_string()));
    }
    let ip: IpAddr = host
        .parse()
        .map_err(|_| AddrError::NotAnIp(host.to_string()))?;
    // Digits only: `parse` would also take a leading `+`.
    if !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AddrError::BadPort(port.to_string()));
    }
    let port: u16 = port
        .parse()
        .map_err(|_| AddrError::BadPort(port.to_string()))?;
    Ok(SocketAddr::new(ip, port))
}
