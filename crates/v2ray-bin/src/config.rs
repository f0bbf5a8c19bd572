//! `v2rayctl` configuration using Figment.
//!
//! Configuration is layered (later wins):
//! 1. Built-in defaults
//! 2. TOML file (`--config`, else `v2rayctl.toml` in the working directory if present)
//! 3. Environment variables prefixed with `V2RAYCTL_`, `__` separating levels,
//!    e.g. `V2RAYCTL_API__ADDRESS=10.0.0.2:10085`
//!
//! # Example
//!
//! ```toml
//! log_level = "debug"
//!
//! [api]
//! address = "127.0.0.1:10085"
//! request_timeout_secs = 5
//!
//! [templates]
//! server_version = "v4-patched"
//!
//! [templates.email_exists]
//! pattern = "User {email} already exists."
//! match = "suffix"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use v2ray_client::{ChannelConfig, DetailTemplates};

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "v2rayctl.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "V2RAYCTL_";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    Pretty,
    /// One JSON object per event
    Json,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// API endpoint settings.
    pub api: ApiSettings,
    /// Detail-text compatibility table for the target server.
    pub templates: DetailTemplates,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_format: LogFormat::Pretty,
            api: ApiSettings::default(),
            templates: DetailTemplates::default(),
        }
    }
}

/// API endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// `host:port` of the V2Ray API inbound. Unset falls back to
    /// `V2RAY_API_ADDR`, then `127.0.0.1:10085`.
    pub address: Option<String>,
    /// Connection attempt timeout.
    pub connect_timeout_secs: u64,
    /// Per-call deadline; unset means none.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            address: None,
            connect_timeout_secs: 10,
            request_timeout_secs: None,
        }
    }
}

impl ApiSettings {
    /// Channel configuration for the client.
    #[must_use]
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
            ..ChannelConfig::default()
        }
    }
}

impl Settings {
    /// Load settings from `path` (must exist) or the default file (optional),
    /// then environment overrides, and validate the result.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let file = match path {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                path.to_path_buf()
            }
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(&file))
            .merge(Env::prefixed(env_prefix).split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration ({})", file.display()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check values serde cannot.
    pub fn validate(&self) -> Result<()> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            bail!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                VALID_LOG_LEVELS.join(", ")
            );
        }
        if self.api.connect_timeout_secs == 0 {
            bail!("api.connect_timeout_secs must be greater than zero");
        }
        if self.api.request_timeout_secs == Some(0) {
            bail!("api.request_timeout_secs must be greater than zero when set");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::io::Write;
    use v2ray_client::MatchMode;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing_default = dir.path().join(DEFAULT_CONFIG_FILE);
        let settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(missing_default))
            .extract::<Settings>()
            .unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.templates.server_version, "v4");
    }

    #[test]
    fn test_load_file_overrides() {
        let file = write_config(
            r#"
log_level = "debug"
log_format = "json"

[api]
address = "10.0.0.2:10085"
request_timeout_secs = 5

[templates]
server_version = "patched"

[templates.address_in_use]
pattern = "port {port} busy"
match = "exact"
"#,
        );

        let settings =
            Settings::load_with_prefix(Some(file.path()), "V2RAYCTL_TEST_FILE_").unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.api.address.as_deref(), Some("10.0.0.2:10085"));
        assert_eq!(settings.api.connect_timeout_secs, 10);
        assert_eq!(
            settings.api.channel_config().request_timeout,
            Some(Duration::from_secs(5))
        );
        assert_eq!(settings.templates.server_version, "patched");
        assert_eq!(settings.templates.address_in_use.mode, MatchMode::Exact);
        // Untouched rules keep the built-in wording
        assert_eq!(
            settings.templates.email_exists,
            DetailTemplates::v4().email_exists
        );
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config("[api]\naddress = \"file.local:1\"\n");
        std::env::set_var("V2RAYCTL_TEST_ENV_API__ADDRESS", "env.local:2");

        let settings =
            Settings::load_with_prefix(Some(file.path()), "V2RAYCTL_TEST_ENV_").unwrap();
        std::env::remove_var("V2RAYCTL_TEST_ENV_API__ADDRESS");

        assert_eq!(settings.api.address.as_deref(), Some("env.local:2"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(Some(dir.path().join("nope.toml").as_path())).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_invalid_log_level() {
        let settings = Settings {
            log_level: "loud".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut settings = Settings::default();
        settings.api.connect_timeout_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.api.request_timeout_secs = Some(0);
        assert!(settings.validate().is_err());
    }
}
