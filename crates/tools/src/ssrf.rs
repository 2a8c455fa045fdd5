//! Outbound-fetch guard: reject URLs resolving to private address space.
//!
//! Blocked ranges and config exemptions share one representation: a CIDR
//! table checked with [`in_ranges`]. Allowlist entries take precedence
//! over the built-in blocks.

use std::{net::IpAddr, sync::OnceLock};

use {crate::error::Error, url::Url};

use crate::Result;

/// Address space never fetched unless explicitly allowlisted: loopback,
/// RFC 1918, link-local, CGNAT, IETF protocol assignments, broadcast,
/// unspecified, and their IPv6 counterparts.
const BLOCKED_RANGES: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "100.64.0.0/10",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.0.0.0/24",
    "192.168.0.0/16",
    "255.255.255.255/32",
    "::/128",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
];

fn blocked_ranges() -> &'static [ipnet::IpNet] {
    static RANGES: OnceLock<Vec<ipnet::IpNet>> = OnceLock::new();
    RANGES.get_or_init(|| {
        BLOCKED_RANGES
            .iter()
            .filter_map(|entry| entry.parse().ok())
            .collect()
    })
}

fn in_ranges(ip: &IpAddr, ranges: &[ipnet::IpNet]) -> bool {
    ranges.iter().any(|net| net.contains(ip))
}

/// Check if an IP is covered by an explicit allowlist entry.
#[must_use]
pub fn is_ssrf_allowed(ip: &IpAddr, allowlist: &[ipnet::IpNet]) -> bool {
    in_ranges(ip, allowlist)
}

/// Check if an IP address falls in a blocked range.
#[must_use]
pub fn is_private_ip(ip: &IpAddr) -> bool {
    in_ranges(ip, blocked_ranges())
}

fn validate_ips(host: &str, ips: &[IpAddr], allowlist: &[ipnet::IpNet]) -> Result<()> {
    if ips.is_empty() {
        return Err(Error::message(format!("DNS resolution failed for {host}")));
    }

    for ip in ips {
        if is_private_ip(ip) && !is_ssrf_allowed(ip, allowlist) {
            return Err(Error::message(format!(
                "fetch blocked: {host} resolves to private IP {ip}"
            )));
        }
    }

    Ok(())
}

/// Resolve the URL host and reject private/loopback/link-local IPs unless
/// explicitly allowlisted.
pub async fn ssrf_check(url: &Url, allowlist: &[ipnet::IpNet]) -> Result<()> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::message("URL has no host"))?;

    if let Ok(ip) = host.parse::<IpAddr>() {
        return validate_ips(host, &[ip], allowlist);
    }

    let port = url.port_or_known_default().unwrap_or(443);
    let addrs: Vec<IpAddr> = tokio::net::lookup_host(format!("{host}:{port}"))
        .await?
        .map(|socket_addr| socket_addr.ip())
        .collect();
    validate_ips(host, &addrs, allowlist)
}

/// Parse CIDR allowlist entries from config, skipping invalid ones.
#[must_use]
pub fn parse_allowlist(entries: &[String]) -> Vec<ipnet::IpNet> {
    entries
        .iter()
        .filter_map(|entry| entry.parse().ok())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn blocked_range_table_parses_fully() {
        assert_eq!(blocked_ranges().len(), BLOCKED_RANGES.len());
    }

    #[test]
    fn loopback_and_private_are_rejected() {
        assert!(is_private_ip(&"127.0.0.1".parse().unwrap()));
        assert!(is_private_ip(&"10.1.2.3".parse().unwrap()));
        assert!(is_private_ip(&"172.20.1.1".parse().unwrap()));
        assert!(is_private_ip(&"192.168.0.1".parse().unwrap()));
        assert!(is_private_ip(&"169.254.10.10".parse().unwrap()));
        assert!(is_private_ip(&"100.64.0.1".parse().unwrap()));
        assert!(is_private_ip(&"192.0.0.10".parse().unwrap()));
        assert!(is_private_ip(&"fe80::1".parse().unwrap()));
        assert!(is_private_ip(&"fd00::1".parse().unwrap()));
    }

    #[test]
    fn public_addresses_pass() {
        assert!(!is_private_ip(&"93.184.216.34".parse().unwrap()));
        assert!(!is_private_ip(&"100.128.0.1".parse().unwrap()));
        assert!(!is_private_ip(&"192.0.1.1".parse().unwrap()));
        assert!(!is_private_ip(&"2606:2800:220:1::1".parse().unwrap()));
    }

    #[tokio::test]
    async fn literal_private_ip_url_is_blocked() {
        let url = Url::parse("http://127.0.0.1:8080/").unwrap();
        assert!(ssrf_check(&url, &[]).await.is_err());
    }

    #[tokio::test]
    async fn allowlist_exempts_private_ranges() {
        let url = Url::parse("http://127.0.0.1:8080/").unwrap();
        let allowlist = parse_allowlist(&["127.0.0.0/8".to_string()]);
        assert!(ssrf_check(&url, &allowlist).await.is_ok());
    }

    #[test]
    fn parse_allowlist_skips_garbage() {
        let nets = parse_allowlist(&["10.0.0.0/8".into(), "not-a-cidr".into()]);
        assert_eq!(nets.len(), 1);
    }
}
