// Application state module
// Immutable runtime state shared by every connection

use super::types::Config;
use crate::error::ConfigError;
use crate::handler::upstream::UpstreamClient;
use crate::http::CorsPolicy;

/// Application state
pub struct AppState {
    pub config: Config,

    /// Header values precomputed from `config.proxy`
    pub policy: CorsPolicy,

    /// Pooled client for the fixed upstream resource
    pub upstream: UpstreamClient,

    /// Copy of `config.logging.access_log`
    pub access_log: bool,
}

impl AppState {
    /// Build state from a validated configuration
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let policy = CorsPolicy::from_config(&config.proxy)?;
        let upstream = UpstreamClient::new(&config.upstream, &config.proxy.upstream_url)?;

        Ok(Self {
            config: config.clone(),
            policy,
            upstream,
            access_log: config.logging.access_log,
        })
    }
}
