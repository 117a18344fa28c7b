//! HTTP response building module
//!
//! Provides builders for every terminal response the relay produces itself.

use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::{Response, StatusCode};

use super::{empty, full, ResponseBody};

/// Build a `text/plain` response with a fixed body
fn build_text_response(status: StatusCode, text: &'static str) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain;charset=UTF-8")
        .body(full(text))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            fallback(status)
        })
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<ResponseBody> {
    build_text_response(StatusCode::NOT_FOUND, "Not Found")
}

/// Build 403 Forbidden response for a rejected non-preflight request
pub fn build_403_response() -> Response<ResponseBody> {
    build_text_response(StatusCode::FORBIDDEN, "Forbidden")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response(allow: HeaderValue) -> Response<ResponseBody> {
    let mut resp = build_text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    resp.headers_mut().insert(header::ALLOW, allow);
    resp
}

/// Build 502 Bad Gateway response for an unreachable upstream
pub fn build_502_response() -> Response<ResponseBody> {
    build_text_response(StatusCode::BAD_GATEWAY, "Bad Gateway")
}

/// Build 403 response for a preflight from a foreign origin (empty body)
pub fn build_preflight_forbidden_response() -> Response<ResponseBody> {
    fallback(StatusCode::FORBIDDEN)
}

/// Build 204 preflight response carrying the CORS grant
pub fn build_preflight_response(cors_headers: HeaderMap) -> Response<ResponseBody> {
    let mut resp = fallback(StatusCode::NO_CONTENT);
    *resp.headers_mut() = cors_headers;
    resp
}

/// Bare response with an empty body, used when the builder cannot fail
fn fallback(status: StatusCode) -> Response<ResponseBody> {
    let mut resp = Response::new(empty());
    *resp.status_mut() = status;
    resp
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_text(resp: Response<ResponseBody>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_plain_text_bodies() {
        let resp = build_404_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/plain;charset=UTF-8");
        assert_eq!(body_text(resp).await, "Not Found");

        assert_eq!(body_text(build_403_response()).await, "Forbidden");
        assert_eq!(body_text(build_502_response()).await, "Bad Gateway");
    }

    #[tokio::test]
    async fn test_405_carries_allow() {
        let resp = build_405_response(HeaderValue::from_static("GET,HEAD,OPTIONS"));
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()[header::ALLOW], "GET,HEAD,OPTIONS");
        assert_eq!(body_text(resp).await, "Method Not Allowed");
    }

    #[tokio::test]
    async fn test_preflight_forbidden_is_empty() {
        let resp = build_preflight_forbidden_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(resp.headers().is_empty());
        assert_eq!(body_text(resp).await, "");
    }
}
