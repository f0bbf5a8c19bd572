//! API endpoint configuration and address normalization.
//!
//! This module provides types and utilities for managing the V2Ray API address:
//! - [`ApiAddress`]: Validated `host:port` endpoint with source tracking
//! - [`AddressSource`]: Where the address configuration came from
//! - [`AddressError`]: User-friendly validation errors
//!
//! # Address Resolution Precedence
//!
//! Addresses are resolved in this order (highest priority first):
//! 1. User input (command-line flag)
//! 2. Configuration file / `V2RAYCTL_API__ADDRESS`
//! 3. `V2RAY_API_ADDR` environment variable
//! 4. Default: `127.0.0.1:10085`
//!
//! # Plaintext only
//!
//! The V2Ray API listener speaks unauthenticated plaintext gRPC. Only bare
//! `host:port` input and the `http://` scheme are accepted; `https://` is
//! rejected instead of silently downgraded.
//!
//! # Example
//!
//! ```
//! use v2ray_client::connection::{ApiAddress, AddressSource};
//!
//! let addr = ApiAddress::parse("[::1]:10085", AddressSource::UserInput)?;
//! assert_eq!(addr.uri(), "http://[::1]:10085");
//! assert_eq!(addr.port(), 10085);
//! # Ok::<(), v2ray_client::connection::AddressError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv6Addr;
use url::Url;

/// Environment variable consulted when no address is configured.
pub const ENV_API_ADDR: &str = "V2RAY_API_ADDR";

/// Conventional port of the V2Ray API inbound.
pub const DEFAULT_API_PORT: u16 = 10085;

/// Default API address when no configuration is provided.
pub const DEFAULT_API_ADDR: &str = "127.0.0.1:10085";

/// Source of the API address configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressSource {
    /// Hardcoded default (`127.0.0.1:10085`)
    Default,
    /// Loaded from `V2RAY_API_ADDR`
    Environment,
    /// Loaded from the configuration file or its environment overrides
    Config,
    /// Given on the command line
    UserInput,
}

impl AddressSource {
    /// Returns the priority for address resolution (higher = preferred).
    #[must_use]
    pub fn priority(self) -> u8 {
        match self {
            Self::Default => 0,
            Self::Environment => 1,
            Self::Config => 2,
            Self::UserInput => 3,
        }
    }
}

impl fmt::Display for AddressSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "Default"),
            Self::Environment => write!(f, "Environment ({ENV_API_ADDR})"),
            Self::Config => write!(f, "Configuration"),
            Self::UserInput => write!(f, "Command line"),
        }
    }
}

/// Validated API endpoint with metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiAddress {
    /// Host as it appears in a URI (IPv6 literals keep their brackets)
    host: String,
    port: u16,
    source: AddressSource,
    /// Original input string (for display/debugging)
    original: String,
}

impl ApiAddress {
    /// Parse and normalize an API address.
    ///
    /// Accepts bare `host:port`, `http://host:port` and bracketed IPv6
    /// literals. A missing port defaults to [`DEFAULT_API_PORT`].
    pub fn parse(input: &str, source: AddressSource) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        let url = normalize_url(trimmed)?;
        let host = url.host_str().ok_or(AddressError::MissingHost)?.to_string();
        let port = match url.port() {
            Some(port) => port,
            None => explicit_port(trimmed).unwrap_or(DEFAULT_API_PORT),
        };
        Ok(Self {
            host,
            port,
            source,
            original: input.to_string(),
        })
    }

    /// Build an address from a separate host and port.
    ///
    /// Unbracketed IPv6 literals are accepted and bracketed.
    pub fn from_host_port(
        host: &str,
        port: u16,
        source: AddressSource,
    ) -> Result<Self, AddressError> {
        let host = host.trim();
        let authority = if host.parse::<Ipv6Addr>().is_ok() {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        };
        Self::parse(&authority, source)
    }

    /// Host part, bracketed for IPv6 literals.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port part.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns where this address came from.
    #[must_use]
    pub fn source(&self) -> AddressSource {
        self.source
    }

    /// Returns the original input string before normalization.
    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Plaintext endpoint URI handed to the gRPC transport.
    #[must_use]
    pub fn uri(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ApiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Address validation error with user-friendly messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Input was empty or whitespace-only
    EmptyInput,
    /// URL parsing failed
    InvalidUrl(String),
    /// No host was found in the input
    MissingHost,
    /// Scheme other than plain `http`
    UnsupportedScheme(String),
}

impl std::error::Error for AddressError {}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "Address cannot be empty"),
            Self::InvalidUrl(e) => write!(f, "Invalid address: {e}"),
            Self::MissingHost => write!(f, "Address must include a host"),
            Self::UnsupportedScheme(s) => {
                write!(f, "Unsupported scheme '{s}' (the API is plaintext, use host:port)")
            }
        }
    }
}

/// Normalize an address string into an `http` URL.
///
/// Adds the `http://` scheme when missing and rejects every other scheme.
pub fn normalize_url(input: &str) -> Result<Url, AddressError> {
    let input = input.trim();

    if input.is_empty() {
        return Err(AddressError::EmptyInput);
    }

    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("http://{input}")
    };

    let url = Url::parse(&with_scheme).map_err(|e| AddressError::InvalidUrl(e.to_string()))?;

    let scheme = url.scheme().to_lowercase();
    if scheme != "http" {
        return Err(AddressError::UnsupportedScheme(scheme));
    }

    if url.host().is_none() {
        return Err(AddressError::MissingHost);
    }

    Ok(url)
}

/// `Url` drops a port equal to the scheme default (80), so recover it from
/// the authority when it was written out.
fn explicit_port(input: &str) -> Option<u16> {
    let rest = input.split_once("://").map_or(input, |(_, rest)| rest);
    let authority = rest.split('/').next()?;
    let (_, port) = authority.rsplit_once(':')?;
    if port.ends_with(']') {
        return None;
    }
    port.parse().ok()
}

/// Resolve the API address from multiple sources with precedence.
///
/// Invalid candidates are skipped, so this never fails and falls back to
/// [`DEFAULT_API_ADDR`].
pub fn resolve_address(user_input: Option<&str>, configured: Option<&str>) -> ApiAddress {
    let env = std::env::var(ENV_API_ADDR).ok();
    resolve_from(user_input, configured, env.as_deref())
}

fn resolve_from(
    user_input: Option<&str>,
    configured: Option<&str>,
    env: Option<&str>,
) -> ApiAddress {
    let mut candidates = [
        (env, AddressSource::Environment),
        (configured, AddressSource::Config),
        (user_input, AddressSource::UserInput),
    ];
    candidates.sort_by_key(|(_, source)| std::cmp::Reverse(source.priority()));

    for (input, source) in candidates {
        let Some(input) = input.filter(|s| !s.trim().is_empty()) else {
            continue;
        };
        match ApiAddress::parse(input, source) {
            Ok(addr) => return addr,
            Err(e) => tracing::warn!(%source, input, error = %e, "ignoring invalid API address"),
        }
    }

    ApiAddress::default()
}

impl Default for ApiAddress {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_API_PORT,
            source: AddressSource::Default,
            original: DEFAULT_API_ADDR.to_string(),
        }
    }
}
