//! Cross-origin header handling
//!
//! Builds the header values advertised to the browser once at startup and
//! applies them to preflight and relayed responses.

use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::Method;

use crate::config::ProxyConfig;
use crate::error::ConfigError;

/// Headers that describe a single connection and must not be relayed
const HOP_BY_HOP_HEADERS: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TRANSFER_ENCODING,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
];

/// Precomputed relay policy derived from `ProxyConfig`
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    path_prefix: String,
    allowed_origin: HeaderValue,
    allow_methods: HeaderValue,
    max_age: HeaderValue,
    default_allow_headers: HeaderValue,
    forwarded_methods: Vec<Method>,
}

impl CorsPolicy {
    pub fn from_config(cfg: &ProxyConfig) -> Result<Self, ConfigError> {
        let allowed_origin = HeaderValue::from_str(&cfg.allowed_origin)
            .map_err(|e| ConfigError::invalid("proxy.allowed_origin", e.to_string()))?;

        let methods: Vec<String> = cfg
            .allowed_methods
            .iter()
            .map(|m| m.trim().to_ascii_uppercase())
            .collect();
        let allow_methods = HeaderValue::from_str(&methods.join(","))
            .map_err(|e| ConfigError::invalid("proxy.allowed_methods", e.to_string()))?;

        let default_allow_headers = HeaderValue::from_str(&cfg.default_allow_headers)
            .map_err(|e| ConfigError::invalid("proxy.default_allow_headers", e.to_string()))?;

        Ok(Self {
            path_prefix: cfg.path_prefix.clone(),
            allowed_origin,
            allow_methods,
            max_age: HeaderValue::from(cfg.max_age),
            default_allow_headers,
            forwarded_methods: cfg.forwarded_methods()?,
        })
    }

    /// Whether the path belongs to this relay
    pub fn in_scope(&self, path: &str) -> bool {
        path.starts_with(&self.path_prefix)
    }

    /// Exact comparison against the allowed origin; a missing header never matches
    pub fn origin_allowed(&self, headers: &HeaderMap) -> bool {
        headers
            .get(header::ORIGIN)
            .is_some_and(|origin| *origin == self.allowed_origin)
    }

    pub fn is_forwarded(&self, method: &Method) -> bool {
        self.forwarded_methods.contains(method)
    }

    /// Value for the `Allow` header of a 405 response
    pub fn allow_header(&self) -> HeaderValue {
        self.allow_methods.clone()
    }

    /// Headers of a successful preflight response
    pub fn preflight_headers(&self, request_headers: &HeaderMap) -> HeaderMap {
        let allow_headers = request_headers
            .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.default_allow_headers)
            .clone();

        let mut headers = HeaderMap::with_capacity(5);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            self.allowed_origin.clone(),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            self.allow_methods.clone(),
        );
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers);
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        headers
    }

    /// Rewrite upstream response headers in place before relaying them
    pub fn apply_to_relayed(&self, headers: &mut HeaderMap) {
        strip_hop_by_hop(headers);

        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            self.allowed_origin.clone(),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            self.allow_methods.clone(),
        );
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        headers.remove(header::SET_COOKIE);
    }
}

/// Outbound header set for the upstream call: `Accept` only
///
/// Repeated `Accept` lines are folded into one comma-separated value.
pub fn minimize_request_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut outbound = HeaderMap::with_capacity(1);
    let values: Vec<&HeaderValue> = inbound
        .get_all(header::ACCEPT)
        .iter()
        .filter(|v| !v.is_empty())
        .collect();

    let accept = match values.as_slice() {
        [] => return outbound,
        [single] => (*single).clone(),
        many => {
            let joined = many
                .iter()
                .map(|v| v.as_bytes())
                .collect::<Vec<_>>()
                .join(&b", "[..]);
            HeaderValue::from_bytes(&joined).unwrap_or_else(|_| many[0].clone())
        }
    };
    outbound.insert(header::ACCEPT, accept);
    outbound
}

/// Remove hop-by-hop headers, including any named by `Connection`
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP_HEADERS.iter()) {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::default_config;

    fn policy() -> CorsPolicy {
        CorsPolicy::from_config(&default_config().proxy).unwrap()
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_static(*name),
                HeaderValue::from_static(*value),
            );
        }
        map
    }

    #[test]
    fn test_path_scope() {
        let p = policy();
        assert!(p.in_scope("/corsproxy"));
        assert!(p.in_scope("/corsproxy/anything"));
        assert!(p.in_scope("/corsproxyfoo"));
        assert!(!p.in_scope("/"));
        assert!(!p.in_scope("/api/corsproxy"));
    }

    #[test]
    fn test_origin_exact_match() {
        let p = policy();
        assert!(p.origin_allowed(&headers(&[("origin", "https://jha-summary.wefma.net")])));
        assert!(!p.origin_allowed(&headers(&[("origin", "https://jha-summary.wefma.net/")])));
        assert!(!p.origin_allowed(&headers(&[("origin", "http://jha-summary.wefma.net")])));
        assert!(!p.origin_allowed(&headers(&[("origin", "https://evil.example")])));
        assert!(!p.origin_allowed(&HeaderMap::new()));
    }

    #[test]
    fn test_forwarded_methods() {
        let p = policy();
        assert!(p.is_forwarded(&Method::GET));
        assert!(p.is_forwarded(&Method::HEAD));
        assert!(!p.is_forwarded(&Method::OPTIONS));
        assert!(!p.is_forwarded(&Method::POST));
        assert_eq!(p.allow_header(), "GET,HEAD,OPTIONS");
    }

    #[test]
    fn test_preflight_echoes_requested_headers() {
        let p = policy();
        let out = p.preflight_headers(&headers(&[(
            "access-control-request-headers",
            "x-custom, content-type",
        )]));
        assert_eq!(out[header::ACCESS_CONTROL_ALLOW_HEADERS], "x-custom, content-type");
        assert_eq!(out[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://jha-summary.wefma.net");
        assert_eq!(out[header::ACCESS_CONTROL_ALLOW_METHODS], "GET,HEAD,OPTIONS");
        assert_eq!(out[header::ACCESS_CONTROL_MAX_AGE], "86400");
        assert_eq!(out[header::VARY], "Origin");
    }

    #[test]
    fn test_preflight_default_allow_headers() {
        let p = policy();
        let out = p.preflight_headers(&HeaderMap::new());
        assert_eq!(out[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");

        let out = p.preflight_headers(&headers(&[("access-control-request-headers", "")]));
        assert_eq!(out[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
    }

    #[test]
    fn test_relayed_headers_rewritten() {
        let p = policy();
        let mut upstream = headers(&[
            ("content-type", "application/json"),
            ("set-cookie", "a=1"),
            ("set-cookie", "b=2"),
            ("access-control-allow-origin", "*"),
            ("vary", "Accept-Encoding"),
            ("connection", "keep-alive, x-conn-scoped"),
            ("x-conn-scoped", "1"),
            ("transfer-encoding", "chunked"),
            ("etag", "\"abc\""),
        ]);
        p.apply_to_relayed(&mut upstream);

        assert!(upstream.get(header::SET_COOKIE).is_none());
        assert!(upstream.get(header::CONNECTION).is_none());
        assert!(upstream.get(header::TRANSFER_ENCODING).is_none());
        assert!(upstream.get("x-conn-scoped").is_none());
        assert_eq!(upstream[header::CONTENT_TYPE], "application/json");
        assert_eq!(upstream[header::ETAG], "\"abc\"");
        assert_eq!(
            upstream[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://jha-summary.wefma.net"
        );
        assert_eq!(upstream.get_all(header::VARY).iter().count(), 1);
        assert_eq!(upstream[header::VARY], "Origin");
        assert_eq!(upstream[header::ACCESS_CONTROL_MAX_AGE], "86400");
    }

    #[test]
    fn test_minimize_keeps_only_accept() {
        let inbound = headers(&[
            ("accept", "application/json"),
            ("cookie", "session=secret"),
            ("authorization", "Bearer token"),
            ("user-agent", "Mozilla/5.0"),
            ("x-test", "1"),
        ]);
        let out = minimize_request_headers(&inbound);
        assert_eq!(out.len(), 1);
        assert_eq!(out[header::ACCEPT], "application/json");

        assert!(minimize_request_headers(&headers(&[("x-test", "1")])).is_empty());
        assert!(minimize_request_headers(&headers(&[("accept", "")])).is_empty());
    }

    #[test]
    fn test_minimize_joins_repeated_accept() {
        let inbound = headers(&[
            ("accept", "text/html"),
            ("accept", ""),
            ("accept", "application/json;q=0.9"),
            ("accept", "*/*;q=0.1"),
        ]);
        let out = minimize_request_headers(&inbound);
        assert_eq!(out.get_all(header::ACCEPT).iter().count(), 1);
        assert_eq!(
            out[header::ACCEPT],
            "text/html, application/json;q=0.9, */*;q=0.1"
        );
    }

    #[test]
    fn test_invalid_origin_rejected() {
        let mut cfg = default_config().proxy;
        cfg.allowed_origin = "https://bad\norigin".to_string();
        assert!(CorsPolicy::from_config(&cfg).is_err());
    }
}
