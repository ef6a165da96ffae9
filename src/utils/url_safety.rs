//! Guards against server-side request forgery through the image URL.
//!
//! The provider fetches whatever URL we forward, so URLs pointing at the
//! loopback interface, private ranges or non-HTTP schemes are refused before
//! any outbound call is made. This is a syntactic check: host names are not
//! resolved here.

use crate::error::AppError;
use ipnetwork::IpNetwork;
use once_cell::sync::Lazy;
use std::net::IpAddr;
use url::{Host, Url};

const ALLOWED_SCHEMES: [&str; 2] = ["http", "https"];

const BLOCKED_HOSTNAMES: [&str; 2] = ["localhost", "metadata.google.internal"];

static BLOCKED_NETWORKS: Lazy<Vec<IpNetwork>> = Lazy::new(|| {
    [
        "0.0.0.0/8",
        "10.0.0.0/8",
        "100.64.0.0/10",
        "127.0.0.0/8",
        "169.254.0.0/16",
        "172.16.0.0/12",
        "192.168.0.0/16",
        "224.0.0.0/4",
        "255.255.255.255/32",
        "::/96",
        "64:ff9b::/96",
        "fc00::/7",
        "fe80::/10",
        "ff00::/8",
    ]
    .iter()
    .filter_map(|cidr| cidr.parse().ok())
    .collect()
});

/// Parses `raw` as an absolute http(s) URL that does not target a local or
/// private address. `field` names the request field in error messages.
pub fn validate_image_url(raw: &str, field: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw.trim())
        .map_err(|_| AppError::Validation(format!("{} must be a valid absolute URL", field)))?;

    if !ALLOWED_SCHEMES.contains(&url.scheme()) {
        return Err(AppError::Validation(format!(
            "{} must use http or https",
            field
        )));
    }

    let blocked = match url.host() {
        Some(Host::Domain(domain)) => is_blocked_hostname(domain),
        Some(Host::Ipv4(ip)) => is_blocked_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => match ip.to_ipv4_mapped() {
            Some(mapped) => is_blocked_ip(IpAddr::V4(mapped)),
            None => is_blocked_ip(IpAddr::V6(ip)),
        },
        None => true,
    };

    if blocked {
        return Err(AppError::Validation(format!(
            "{} must not point to a local or private network address",
            field
        )));
    }

    Ok(url)
}

fn is_blocked_hostname(domain: &str) -> bool {
    let domain = domain.trim_end_matches('.').to_lowercase();
    BLOCKED_HOSTNAMES.contains(&domain.as_str()) || domain.ends_with(".localhost")
}

fn is_blocked_ip(ip: IpAddr) -> bool {
    BLOCKED_NETWORKS.iter().any(|network| network.contains(ip))
}
