/// Configuration management for the purrboard gallery service
use crate::engine::coalesce::CoalescePolicy;
use crate::error::{GalleryError, GalleryResult};
use serde::{Deserialize, Serialize};
use std::env;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub upstream: UpstreamConfig,
    pub engine: EngineConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Upstream cat API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the TheCatAPI-compatible backend
    pub base_url: String,
    /// API key sent as the `x-api-key` header
    pub api_key: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User-Agent header for outbound requests
    pub user_agent: String,
}

/// Optimistic engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Coalescing policy for burst user actions
    pub coalesce_policy: CoalescePolicy,
    /// Coalescing window in milliseconds
    pub coalesce_window_ms: u64,
}

/// Inbound rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_second: u32,
    pub burst_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> GalleryResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("GALLERY_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("GALLERY_PORT")
            .unwrap_or_else(|_| "2590".to_string())
            .parse()
            .map_err(|_| GalleryError::Validation("Invalid port number".to_string()))?;
        let version = env::var("GALLERY_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let base_url = env::var("CAT_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.thecatapi.com/v1".to_string());
        let api_key = env::var("CAT_API_KEY")
            .map_err(|_| GalleryError::Validation("CAT_API_KEY required".to_string()))?;
        let timeout_secs = env::var("CAT_API_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);
        let user_agent = env::var("GALLERY_USER_AGENT")
            .unwrap_or_else(|_| format!("Purrboard/{}", env!("CARGO_PKG_VERSION")));

        let coalesce_policy = match env::var("GALLERY_COALESCE_POLICY")
            .unwrap_or_else(|_| "throttle".to_string())
            .to_lowercase()
            .as_str()
        {
            "debounce" => CoalescePolicy::Debounce,
            "throttle" => CoalescePolicy::Throttle,
            other => {
                return Err(GalleryError::Validation(format!(
                    "Unknown coalesce policy: {}",
                    other
                )))
            }
        };
        let coalesce_window_ms = env::var("GALLERY_COALESCE_WINDOW_MS")
            .unwrap_or_else(|_| "275".to_string())
            .parse()
            .unwrap_or(275);

        let rate_limit_enabled = env::var("GALLERY_RATE_LIMITS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let requests_per_second = env::var("GALLERY_RATE_LIMIT_RPS")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .unwrap_or(50);
        let burst_size = env::var("GALLERY_RATE_LIMIT_BURST")
            .unwrap_or_else(|_| "25".to_string())
            .parse()
            .unwrap_or(25);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            upstream: UpstreamConfig {
                base_url,
                api_key,
                timeout_secs,
                user_agent,
            },
            engine: EngineConfig {
                coalesce_policy,
                coalesce_window_ms,
            },
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                requests_per_second,
                burst_size,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> GalleryResult<()> {
        if self.service.hostname.is_empty() {
            return Err(GalleryError::Validation(
                "Hostname cannot be empty".to_string(),
            ));
        }

        if self.upstream.api_key.is_empty() {
            return Err(GalleryError::Validation(
                "Upstream API key cannot be empty".to_string(),
            ));
        }

        if self.engine.coalesce_window_ms == 0 {
            return Err(GalleryError::Validation(
                "Coalescing window must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 2590,
                version: "0.1.0".to_string(),
            },
            upstream: UpstreamConfig {
                base_url: "https://api.thecatapi.com/v1".to_string(),
                api_key: "test-key".to_string(),
                timeout_secs: 10,
                user_agent: "Purrboard/0.1.0".to_string(),
            },
            engine: EngineConfig {
                coalesce_policy: CoalescePolicy::Throttle,
                coalesce_window_ms: 275,
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                requests_per_second: 50,
                burst_size: 25,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = test_config();
        config.engine.coalesce_window_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let mut config = test_config();
        config.upstream.api_key = String::new();
        assert!(config.validate().is_err());
    }
}
