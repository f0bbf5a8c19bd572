//! Client error types.
//!
//! [`ProxyError`] is what every mutating call returns on failure. The server
//! reports structured conditions only as free text in the gRPC status detail,
//! so the refined variants are produced by [`crate::classify`]; each of them
//! keeps the original detail text next to the identifier that caused it.
//!
//! [`ClientError`] covers construction: a host/port that cannot form a valid
//! endpoint URI. Network failures never surface here because the channel
//! connects lazily.

use thiserror::Error;

use crate::connection::AddressError;

/// Result type alias for remote operations.
pub type Result<T, E = ProxyError> = std::result::Result<T, E>;

/// Failure of a remote control operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// The inbound already has a user with this email.
    #[error("user {email} already exists")]
    EmailExists {
        /// Email from the request.
        email: String,
        /// Server detail text.
        details: String,
    },

    /// The inbound has no user with this email.
    #[error("user {email} not found")]
    EmailNotFound {
        /// Email from the request.
        email: String,
        /// Server detail text.
        details: String,
    },

    /// No inbound handler carries this tag.
    #[error("inbound {tag} not found")]
    InboundNotFound {
        /// Inbound tag from the request.
        tag: String,
        /// Server detail text.
        details: String,
    },

    /// The server could not bind the requested listen port.
    #[error("port {port} already in use")]
    AddressAlreadyInUse {
        /// Port from the request.
        port: u16,
        /// Server detail text.
        details: String,
    },

    /// Any failure that matched no known detail template.
    #[error("v2ray error ({code:?}): {details}")]
    Rpc {
        /// gRPC status code.
        code: tonic::Code,
        /// Server detail text, verbatim.
        details: String,
    },
}

impl ProxyError {
    /// The raw detail text reported by the server.
    #[must_use]
    pub fn details(&self) -> &str {
        match self {
            Self::EmailExists { details, .. }
            | Self::EmailNotFound { details, .. }
            | Self::InboundNotFound { details, .. }
            | Self::AddressAlreadyInUse { details, .. }
            | Self::Rpc { details, .. } => details,
        }
    }

    /// Short machine-friendly name of the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmailExists { .. } => "email_exists",
            Self::EmailNotFound { .. } => "email_not_found",
            Self::InboundNotFound { .. } => "inbound_not_found",
            Self::AddressAlreadyInUse { .. } => "address_already_in_use",
            Self::Rpc { .. } => "rpc",
        }
    }
}

impl From<tonic::Status> for ProxyError {
    fn from(status: tonic::Status) -> Self {
        Self::Rpc {
            code: status.code(),
            details: status.message().to_string(),
        }
    }
}

/// Errors that can occur while constructing a client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The address could not be parsed or normalized.
    #[error("Invalid address: {0}")]
    Address(#[from] AddressError),

    /// The normalized address was rejected as an endpoint URI.
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}
