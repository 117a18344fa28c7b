// Configuration module entry point
// Loads and validates application configuration and builds runtime state

mod state;
mod types;

use std::net::SocketAddr;

use config::builder::{ConfigBuilder, DefaultState};
use hyper::Method;

use crate::error::ConfigError;
use crate::logger::writer::Level;

// Re-export public types
pub use state::AppState;
pub use types::{Config, ProxyConfig, UpstreamConfig};

/// Environment variable prefix, e.g. `CORS_RELAY__PROXY__ALLOWED_ORIGIN`
const ENV_PREFIX: &str = "CORS_RELAY";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// The file is optional; missing keys fall back to built-in defaults
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        let builder = Self::with_defaults()?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("proxy.allowed_methods")
                    .try_parsing(true),
            );
        Self::build_from(builder)
    }

    /// Built-in defaults only, with no file or environment layer
    #[cfg(test)]
    pub fn from_defaults() -> Result<Self, ConfigError> {
        Self::build_from(Self::with_defaults()?)
    }

    fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let builder = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("proxy.allowed_origin", "https://jha-summary.wefma.net")?
            .set_default(
                "proxy.upstream_url",
                "https://jha-summary-api.wefma.net/jha-scores.json",
            )?
            .set_default("proxy.path_prefix", "/corsproxy")?
            .set_default("proxy.allowed_methods", vec!["GET", "HEAD", "OPTIONS"])?
            .set_default("proxy.max_age", 86_400)?
            .set_default("proxy.default_allow_headers", "Content-Type")?
            .set_default("upstream.connect_timeout", 10)?
            .set_default("upstream.read_timeout", 0)?
            .set_default("upstream.timeout", 0)?;
        Ok(builder)
    }

    fn build_from(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| ConfigError::invalid("server.host", format!("invalid address: {e}")))
    }

    /// Check every field the relay depends on before the server starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.get_socket_addr()?;
        self.proxy.validate()?;

        if Level::from_name(&self.logging.level).is_none() {
            return Err(ConfigError::invalid(
                "logging.level",
                format!("unknown level '{}'", self.logging.level),
            ));
        }

        Ok(())
    }
}

impl ProxyConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.upstream_url)
            .map_err(|e| ConfigError::invalid("proxy.upstream_url", e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "proxy.upstream_url",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        if !self.path_prefix.starts_with('/') {
            return Err(ConfigError::invalid(
                "proxy.path_prefix",
                "must start with '/'",
            ));
        }

        if self.allowed_origin.is_empty() {
            return Err(ConfigError::invalid("proxy.allowed_origin", "must not be empty"));
        }

        self.forwarded_methods()?;
        Ok(())
    }

    /// Methods relayed to the upstream (the allowed list without OPTIONS)
    pub fn forwarded_methods(&self) -> Result<Vec<Method>, ConfigError> {
        let mut methods = Vec::with_capacity(self.allowed_methods.len());
        for name in &self.allowed_methods {
            let method = Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes())
                .map_err(|_| {
                    ConfigError::invalid("proxy.allowed_methods", format!("invalid method '{name}'"))
                })?;
            if method != Method::OPTIONS && !methods.contains(&method) {
                methods.push(method);
            }
        }

        if methods.is_empty() {
            return Err(ConfigError::invalid(
                "proxy.allowed_methods",
                "at least one method other than OPTIONS is required",
            ));
        }
        Ok(methods)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Configuration built from defaults only
    pub fn default_config() -> Config {
        Config::from_defaults().expect("defaults must load")
    }

    #[test]
    fn test_defaults() {
        let cfg = default_config();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.proxy.allowed_origin, "https://jha-summary.wefma.net");
        assert_eq!(
            cfg.proxy.upstream_url,
            "https://jha-summary-api.wefma.net/jha-scores.json"
        );
        assert_eq!(cfg.proxy.path_prefix, "/corsproxy");
        assert_eq!(cfg.proxy.allowed_methods, vec!["GET", "HEAD", "OPTIONS"]);
        assert_eq!(cfg.proxy.max_age, 86_400);
        assert_eq!(cfg.proxy.default_allow_headers, "Content-Type");
        assert_eq!(cfg.logging.access_log_format, "combined");
        assert_eq!(cfg.upstream.timeout, 0);
        assert_eq!(cfg.upstream.read_timeout, 0);
    }

    #[test]
    fn test_forwarded_methods_excludes_options() {
        let cfg = default_config();
        let methods = cfg.proxy.forwarded_methods().unwrap();
        assert_eq!(methods, vec![Method::GET, Method::HEAD]);
    }

    #[test]
    fn test_only_options_is_rejected() {
        let mut cfg = default_config();
        cfg.proxy.allowed_methods = vec!["OPTIONS".to_string()];
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "proxy.allowed_methods", .. })
        ));
    }

    #[test]
    fn test_invalid_method_token() {
        let mut cfg = default_config();
        cfg.proxy.allowed_methods = vec!["GET".to_string(), "BAD METHOD".to_string()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_upstream_url_must_be_http() {
        let mut cfg = default_config();
        cfg.proxy.upstream_url = "ftp://example.com/data.json".to_string();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "proxy.upstream_url", .. })
        ));

        cfg.proxy.upstream_url = "not a url".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_path_prefix_must_be_absolute() {
        let mut cfg = default_config();
        cfg.proxy.path_prefix = "corsproxy".to_string();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "proxy.path_prefix", .. })
        ));
    }

    #[test]
    fn test_unknown_log_level() {
        let mut cfg = default_config();
        cfg.logging.level = "verbose".to_string();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "logging.level", .. })
        ));
    }

    #[test]
    fn test_log_level_accepts_what_logger_parses() {
        let mut cfg = default_config();
        for name in ["WARN", "Info", "warning", "trace", "ERROR", "debug"] {
            cfg.logging.level = name.to_string();
            assert!(cfg.validate().is_ok(), "level {name} should validate");
            assert_eq!(Level::from_name(name), Some(Level::parse(name)));
        }
    }

    #[test]
    fn test_environment_layer_only_in_load_from() {
        let key = "CORS_RELAY__PROXY__PATH_PREFIX";
        std::env::set_var(key, "/from-env");
        let loaded = Config::load_from("__cors_relay_no_such_config__");
        let defaults = Config::from_defaults();
        std::env::remove_var(key);

        assert_eq!(loaded.unwrap().proxy.path_prefix, "/from-env");
        assert_eq!(defaults.unwrap().proxy.path_prefix, "/corsproxy");
    }

    #[test]
    fn test_invalid_listen_address() {
        let mut cfg = default_config();
        cfg.server.host = "not-an-ip".to_string();
        assert!(cfg.get_socket_addr().is_err());
    }
}
