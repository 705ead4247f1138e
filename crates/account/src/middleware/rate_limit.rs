//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - [`auth_rate_limiter`]: login and the public billing email reject link
//! - [`api_rate_limiter`]: the authenticated settings API
//!
//! Limits are keyed by client IP as reported by the fronting proxy.

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::{HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Proxy headers carrying the client IP, most trusted first.
///
/// `x-forwarded-for` may hold a chain; its first entry is the client.
const CLIENT_IP_HEADERS: [&str; 4] = [
    "cf-connecting-ip",
    "x-forwarded-for",
    "x-real-ip",
    "fly-client-ip",
];

/// Key extractor that reads the client IP from proxy headers.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    })
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        client_ip(req.headers()).ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Replenish interval and burst of one limiter.
#[derive(Debug, Clone, Copy)]
struct Quota {
    replenish_seconds: u64,
    burst: u32,
}

/// ~10 requests per minute: 1 token every 6 seconds, burst of 5.
const AUTH_QUOTA: Quota = Quota {
    replenish_seconds: 6,
    burst: 5,
};

/// ~100 requests per minute: 1 token per second, burst of 50.
const API_QUOTA: Quota = Quota {
    replenish_seconds: 1,
    burst: 50,
};

/// # Panics
///
/// Panics only for a zero replenish interval or burst, which the constant
/// quotas above never use.
fn limiter(quota: Quota) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(quota.replenish_seconds)
        .burst_size(quota.burst)
        .finish()
        .expect("rate limiter quotas are non-zero");
    GovernorLayer::new(Arc::new(config))
}

/// Limiter for login and the reject link.
#[must_use]
pub fn auth_rate_limiter() -> RateLimiterLayer {
    limiter(AUTH_QUOTA)
}

/// Limiter for the settings API.
#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    limiter(API_QUOTA)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_cloudflare_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.7"));
        assert_eq!(client_ip(&headers), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn test_forwarded_chain_uses_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.4, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), Some("198.51.100.4".parse().unwrap()));
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }
}
