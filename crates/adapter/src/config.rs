//! Command-line and environment configuration.

use crate::error::{AdapterError, Result};
use crate::tools::SeriesDefaults;
use clap::{Parser, ValueEnum};
use sonarr_mcp_upstream::SonarrClientConfig;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Sonarr MCP adapter: expose a Sonarr instance as MCP tools over streamable HTTP.
#[derive(Parser, Debug)]
#[command(name = "sonarr-mcp-adapter", version, about, long_about = None)]
pub struct Cli {
    /// Sonarr base URL, e.g. `http://localhost:8989`
    #[arg(long, env = "SONARR_URL")]
    pub sonarr_url: String,

    /// Sonarr API key
    #[arg(long, env = "SONARR_API_KEY", hide_env_values = true)]
    pub sonarr_api_key: String,

    /// Address to bind the MCP endpoint on
    #[arg(long, env = "SONARR_MCP_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "SONARR_MCP_PORT", default_value_t = 4200)]
    pub port: u16,

    /// Log level (`RUST_LOG` takes precedence when set)
    #[arg(long, env = "SONARR_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "SONARR_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Per-request timeout for Sonarr calls, in seconds
    #[arg(long, env = "SONARR_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Reject Sonarr responses larger than this many bytes
    #[arg(long, env = "SONARR_MAX_RESPONSE_BYTES")]
    pub max_response_bytes: Option<usize>,

    /// Root folder used by `add_series` when the caller does not pass one
    #[arg(long, env = "SONARR_DEFAULT_ROOT_FOLDER")]
    pub default_root_folder: Option<String>,

    /// Quality profile used by `add_series` when the caller does not pass one
    #[arg(long, env = "SONARR_DEFAULT_QUALITY_PROFILE_ID")]
    pub default_quality_profile_id: Option<i64>,

    /// Language profile sent with new series
    #[arg(long, env = "SONARR_LANGUAGE_PROFILE_ID", default_value_t = 1)]
    pub language_profile_id: i64,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub client: SonarrClientConfig,
    pub host: String,
    pub port: u16,
    pub series_defaults: SeriesDefaults,
}

impl Cli {
    /// Validate flags into an [`AdapterConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Config`] for an empty URL or API key, or a zero timeout.
    pub fn into_config(self) -> Result<AdapterConfig> {
        if self.sonarr_url.trim().is_empty() {
            return Err(AdapterError::Config("SONARR_URL must be set".into()));
        }
        if self.sonarr_api_key.trim().is_empty() {
            return Err(AdapterError::Config("SONARR_API_KEY must be set".into()));
        }
        if self.timeout_secs == 0 {
            return Err(AdapterError::Config(
                "timeout must be at least one second".into(),
            ));
        }

        let default_root_folder = self
            .default_root_folder
            .filter(|p| !p.trim().is_empty());

        Ok(AdapterConfig {
            client: SonarrClientConfig {
                base_url: self.sonarr_url,
                api_key: self.sonarr_api_key,
                timeout: Duration::from_secs(self.timeout_secs),
                max_response_bytes: self.max_response_bytes,
            },
            host: self.host,
            port: self.port,
            series_defaults: SeriesDefaults {
                root_folder: default_root_folder,
                quality_profile_id: self.default_quality_profile_id,
                language_profile_id: self.language_profile_id,
            },
        })
    }
}
