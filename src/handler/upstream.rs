//! Upstream client module
//!
//! Issues the single forwarded request and turns the upstream reply into a
//! streamed response body.

use std::time::Duration;

use futures::TryStreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use hyper::{HeaderMap, Method, Response, StatusCode};

use crate::config::UpstreamConfig;
use crate::error::{ConfigError, UpstreamError};
use crate::http::{BoxError, ResponseBody};

/// Client bound to the one fixed upstream URL
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl UpstreamClient {
    pub fn new(cfg: &UpstreamConfig, upstream_url: &str) -> Result<Self, ConfigError> {
        let url = reqwest::Url::parse(upstream_url)
            .map_err(|e| ConfigError::invalid("proxy.upstream_url", e.to_string()))?;

        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(cfg.connect_timeout))
            .redirect(reqwest::redirect::Policy::limited(10));
        if cfg.read_timeout > 0 {
            builder = builder.read_timeout(Duration::from_secs(cfg.read_timeout));
        }
        if cfg.timeout > 0 {
            builder = builder.timeout(Duration::from_secs(cfg.timeout));
        }
        if let Some(ref ua) = cfg.user_agent {
            builder = builder.user_agent(ua.as_str());
        }

        let client = builder.build().map_err(ConfigError::Client)?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Send `method` with `headers` to the upstream and return its status,
    /// headers and a body that streams as bytes arrive
    pub async fn fetch(
        &self,
        method: Method,
        headers: HeaderMap,
    ) -> Result<Response<ResponseBody>, UpstreamError> {
        let upstream = self
            .client
            .request(method, self.url.clone())
            .headers(headers)
            .send()
            .await?;

        let status: StatusCode = upstream.status();
        let headers = upstream.headers().clone();

        let stream = upstream
            .bytes_stream()
            .map_ok(Frame::data)
            .map_err(BoxError::from);
        let body = StreamBody::new(stream).boxed_unsync();

        let mut resp = Response::new(body);
        *resp.status_mut() = status;
        *resp.headers_mut() = headers;
        Ok(resp)
    }
}
