//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: path scope, preflight, method
//! and origin gates, then the upstream relay.

use crate::config::AppState;
use crate::http::{self, cors, ResponseBody};
use crate::logger::{self, AccessLogEntry};
use hyper::header::{self, HeaderMap};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Connection-level entry point: handle the request and write its access log line
pub async fn serve_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<ResponseBody>, Infallible> {
    let started = Instant::now();
    let mut entry = state.access_log.then(|| {
        AccessLogEntry::from_request(
            peer_addr.to_string(),
            req.method(),
            req.uri(),
            req.version(),
            req.headers(),
        )
    });

    let resp = handle_request(req, Arc::clone(&state)).await?;

    if let Some(entry) = entry.as_mut() {
        entry.status = resp.status().as_u16();
        entry.body_bytes = content_length(resp.headers());
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(entry, &state.config.logging.access_log_format);
    }
    Ok(resp)
}

/// Main entry point for HTTP request handling
///
/// Every outcome, including an unreachable upstream, is an HTTP response.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<ResponseBody>, Infallible> {
    // Nothing from the inbound body is forwarded
    let (parts, _) = req.into_parts();
    let policy = &state.policy;
    let method = &parts.method;
    let headers = &parts.headers;

    logger::log_headers_count(headers.len(), state.config.logging.show_headers);

    // 1. Path scope
    if !policy.in_scope(parts.uri.path()) {
        return Ok(http::build_404_response());
    }

    // 2. Preflight
    if *method == Method::OPTIONS {
        if !policy.origin_allowed(headers) {
            log_rejected_origin("preflight", headers);
            return Ok(http::build_preflight_forbidden_response());
        }
        return Ok(http::build_preflight_response(policy.preflight_headers(headers)));
    }

    // 3. Method
    if !policy.is_forwarded(method) {
        logger::log_warning(&format!("Method not allowed: {method}"));
        return Ok(http::build_405_response(policy.allow_header()));
    }

    // 4. Origin
    if !policy.origin_allowed(headers) {
        log_rejected_origin("request", headers);
        return Ok(http::build_403_response());
    }

    // 5-7. Forward with minimal headers and relay
    let outbound = cors::minimize_request_headers(headers);
    logger::log_debug(&format!(
        "Forwarding {method} to {} ({} header(s))",
        state.upstream.url(),
        outbound.len()
    ));

    match state.upstream.fetch(method.clone(), outbound).await {
        Ok(mut resp) => {
            policy.apply_to_relayed(resp.headers_mut());
            Ok(resp)
        }
        Err(e) => {
            logger::log_upstream_error(state.upstream.url(), &e);
            Ok(http::build_502_response())
        }
    }
}

fn log_rejected_origin(kind: &str, headers: &HeaderMap) {
    let origin = headers
        .get(header::ORIGIN)
        .map_or("<none>", |v| v.to_str().unwrap_or("<non-ascii>"));
    logger::log_warning(&format!("Rejected {kind} from origin {origin}"));
}

fn content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}
