//! gRPC control-plane client for the V2Ray administrative API.
//!
//! This crate manages users and inbounds of a running V2Ray instance and reads
//! its traffic counters through the `HandlerService` and `StatsService` APIs.
//!
//! ```no_run
//! use v2ray_client::{ProxyError, Traffic, V2RayClient};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let client = V2RayClient::insecure("127.0.0.1", 10085)?;
//!
//! match client
//!     .add_user("vmess-in", "66ad4540-b58c-4ad2-9926-ea63445a9b57", "love@v2ray.com", 0, 64)
//!     .await
//! {
//!     Ok(_) | Err(ProxyError::EmailExists { .. }) => {}
//!     Err(e) => return Err(e.into()),
//! }
//!
//! if let Traffic::Bytes(n) = client.uplink_traffic("love@v2ray.com", false).await {
//!     println!("uplink: {n} bytes");
//! }
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod client;
pub mod connection;
pub mod error;
pub mod settings;
pub mod stats;

pub use classify::{DetailRule, DetailTemplates, MatchMode, Operation};
pub use client::{ChannelConfig, V2RayClient};
pub use connection::{resolve_address, AddressError, AddressSource, ApiAddress, DEFAULT_API_PORT};
pub use error::{ClientError, ProxyError, Result};
pub use settings::{vmess_inbound_settings, VmessUser};
pub use stats::{Counter, CounterName, Direction, SysStats, Traffic};

/// Re-export of the wire types, for callers building custom envelopes.
pub use v2ray_proto as proto;
