// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub proxy: ProxyConfig,
    pub upstream: UpstreamConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Minimum level: error, warn, info or debug
    pub level: String,
    pub access_log: bool,
    pub show_headers: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// Relay policy: which requests are accepted and where they go
#[derive(Debug, Deserialize, Clone)]
pub struct ProxyConfig {
    /// The single browser origin allowed to read relayed responses
    pub allowed_origin: String,
    /// Fixed upstream resource; inbound path and query are never appended
    pub upstream_url: String,
    /// Requests whose path does not start with this prefix get 404
    pub path_prefix: String,
    /// Advertised in `Access-Control-Allow-Methods`; every entry except
    /// OPTIONS is also forwarded upstream
    pub allowed_methods: Vec<String>,
    /// `Access-Control-Max-Age` in seconds
    pub max_age: u64,
    /// Preflight `Access-Control-Allow-Headers` when the browser asks for none
    pub default_allow_headers: String,
}

/// Upstream HTTP client configuration
#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    pub connect_timeout: u64,
    /// Idle time allowed between body reads, in seconds; 0 disables it
    pub read_timeout: u64,
    /// Deadline for the whole exchange including the body, in seconds;
    /// 0 disables it
    pub timeout: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
}
