use actix_web::http::header::HeaderName;
use actix_web::HttpRequest;
use once_cell::sync::Lazy;
use std::net::{IpAddr, Ipv6Addr};

pub const UNKNOWN_CLIENT: &str = "unknown";

static X_FORWARDED_FOR: Lazy<HeaderName> =
    Lazy::new(|| HeaderName::from_static("x-forwarded-for"));

/// Derive the rate limiting key for a request.
///
/// # Security
///
/// The first `X-Forwarded-For` entry is trusted when present, which is only suitable for
/// deployments behind a proxy that you control. Without it the connection peer address is used.
///
/// # IPv6
///
/// IPv6 addresses will be grouped into a single key per /64
pub fn client_key(req: &HttpRequest) -> String {
    let forwarded = req
        .headers()
        .get(&*X_FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty());

    match forwarded {
        Some(first) => match first.parse::<IpAddr>() {
            Ok(ip) => ip_key(ip),
            Err(_) => first.to_owned(),
        },
        None => req
            .peer_addr()
            .map_or_else(|| UNKNOWN_CLIENT.to_owned(), |addr| ip_key(addr.ip())),
    }
}

// Groups IPv6 addresses together, see:
// https://adam-p.ca/blog/2022/02/ipv6-rate-limiting/
fn ip_key(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return v4.to_string();
            }
            let s = v6.segments();
            let subnet = Ipv6Addr::new(s[0], s[1], s[2], s[3], 0, 0, 0, 0);
            format!("{subnet}/64")
        }
    }
}
