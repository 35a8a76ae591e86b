//! Turns user-entered settings into a base URL and token.

use super::error::{ApiError, ApiResult};
use crate::settings::ServerSettings;
use lazy_static::lazy_static;
use regex::Regex;
use std::net::{Ipv4Addr, Ipv6Addr};

lazy_static! {
    static ref HOSTNAME_LABEL: Regex =
        Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").unwrap();
}

const MAX_HOSTNAME_LEN: usize = 253;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConnection {
    pub base_url: String,
    pub token: String,
}

fn not_configured(reason: impl Into<String>) -> ApiError {
    ApiError::NotConfigured(reason.into())
}

fn is_valid_hostname(host: &str) -> bool {
    if host.is_empty() || host.len() > MAX_HOSTNAME_LEN {
        return false;
    }
    // All-numeric dotted names must be real IPv4 addresses.
    if host.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return host.parse::<Ipv4Addr>().is_ok();
    }
    host.trim_end_matches('.')
        .split('.')
        .all(|label| HOSTNAME_LABEL.is_match(label))
}

/// Splits `host` into `(scheme, host, embedded_port)`.
fn split_host(raw: &str) -> ApiResult<(&'static str, String, Option<String>)> {
    let lower = raw.to_ascii_lowercase();
    let (scheme, rest) = if lower.starts_with("https://") {
        ("https", &raw["https://".len()..])
    } else if lower.starts_with("http://") {
        ("http", &raw["http://".len()..])
    } else {
        ("http", raw)
    };
    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return Err(not_configured("host is empty"));
    }

    if let Some(bracketed) = authority.strip_prefix('[') {
        let (addr, tail) = bracketed
            .split_once(']')
            .ok_or_else(|| not_configured(format!("unterminated IPv6 address '{}'", raw)))?;
        addr.parse::<Ipv6Addr>()
            .map_err(|_| not_configured(format!("invalid IPv6 address '{}'", addr)))?;
        let port = match tail {
            "" => None,
            _ => Some(
                tail.strip_prefix(':')
                    .ok_or_else(|| not_configured(format!("invalid host '{}'", raw)))?
                    .to_string(),
            ),
        };
        return Ok((scheme, format!("[{}]", addr), port));
    }

    match authority.matches(':').count() {
        0 => Ok((scheme, authority.to_string(), None)),
        1 => {
            let (host, port) = authority.split_once(':').unwrap_or((authority, ""));
            Ok((scheme, host.to_string(), Some(port.to_string())))
        }
        _ => {
            let addr = authority
                .parse::<Ipv6Addr>()
                .map_err(|_| not_configured(format!("invalid host '{}'", raw)))?;
            Ok((scheme, format!("[{}]", addr), None))
        }
    }
}

fn parse_port(port: &str) -> ApiResult<u16> {
    let trimmed = port.trim();
    if trimmed.is_empty() {
        return Err(not_configured("port is empty"));
    }
    match trimmed.parse::<u16>() {
        Ok(0) | Err(_) => Err(not_configured(format!("invalid port '{}'", trimmed))),
        Ok(port) => Ok(port),
    }
}

/// Resolves settings into a connection. A port embedded in the host wins over
/// the separate port field.
pub fn resolve(settings: &ServerSettings) -> ApiResult<ResolvedConnection> {
    let raw_host = settings.host.trim();
    if raw_host.is_empty() {
        return Err(not_configured("host is empty"));
    }

    let (scheme, host, embedded_port) = split_host(raw_host)?;
    if !host.starts_with('[') && !is_valid_hostname(&host) {
        return Err(not_configured(format!("invalid host '{}'", host)));
    }

    let port = parse_port(embedded_port.as_deref().unwrap_or(&settings.port))?;

    let token = settings
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| not_configured("API token is empty"))?;

    Ok(ResolvedConnection {
        base_url: format!("{}://{}:{}", scheme, host, port),
        token: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(host: &str, port: &str, token: Option<&str>) -> ServerSettings {
        ServerSettings {
            host: host.to_string(),
            port: port.to_string(),
            token: token.map(str::to_string),
            ..Default::default()
        }
    }

    fn base_url(host: &str, port: &str) -> String {
        resolve(&settings(host, port, Some("tok"))).unwrap().base_url
    }

    #[test]
    fn plain_host_and_port() {
        assert_eq!(base_url("media.local", "8096"), "http://media.local:8096");
        assert_eq!(base_url("10.0.0.5", "8096"), "http://10.0.0.5:8096");
    }

    #[test]
    fn scheme_is_preserved() {
        assert_eq!(base_url("https://media.example.com", "443"), "https://media.example.com:443");
        assert_eq!(base_url("HTTP://media.local/", "8096"), "http://media.local:8096");
    }

    #[test]
    fn embedded_port_wins() {
        assert_eq!(base_url("media.local:9000", "8096"), "http://media.local:9000");
        assert_eq!(base_url("https://media.local:8920/jf", ""), "https://media.local:8920");
    }

    #[test]
    fn ipv6_hosts() {
        assert_eq!(base_url("[::1]:8096", ""), "http://[::1]:8096");
        assert_eq!(base_url("[fe80::1]", "8096"), "http://[fe80::1]:8096");
        assert_eq!(base_url("::1", "8096"), "http://[::1]:8096");
    }

    #[test]
    fn invalid_hosts_are_not_configured() {
        for host in ["", "   ", "bad host", "-leading.dash", "300.1.1.1", "[::1", "a..b"] {
            let err = resolve(&settings(host, "8096", Some("tok"))).unwrap_err();
            assert!(err.is_not_configured(), "host {:?} should be rejected", host);
            assert_eq!(err.status(), 0);
        }
        let long_label = "a".repeat(64);
        assert!(resolve(&settings(&long_label, "8096", Some("tok"))).is_err());
    }

    #[test]
    fn invalid_ports_are_not_configured() {
        for port in ["", "0", "65536", "http", "-1"] {
            let err = resolve(&settings("media.local", port, Some("tok"))).unwrap_err();
            assert!(err.is_not_configured(), "port {:?} should be rejected", port);
        }
        assert!(resolve(&settings("media.local", "65535", Some("tok"))).is_ok());
    }

    #[test]
    fn token_must_be_present() {
        assert!(resolve(&settings("media.local", "8096", None))
            .unwrap_err()
            .is_not_configured());
        assert!(resolve(&settings("media.local", "8096", Some("  ")))
            .unwrap_err()
            .is_not_configured());
        let resolved = resolve(&settings("media.local", "8096", Some(" tok "))).unwrap();
        assert_eq!(resolved.token, "tok");
    }
}
