//! Protocol buffer definitions for the V2Ray administrative API.
//!
//! This crate contains:
//! - Generated protobuf types and gRPC stubs for the vendored subset of the
//!   V2Ray schema under `proto/` (`HandlerService`, `StatsService` and the
//!   messages they carry)
//! - Envelope helpers for `TypedMessage`, the schema's manual tagged union
//! - Conversions between standard library address types and wire types
//!
//! # Layout
//!
//! Generated modules mirror the proto package hierarchy (`v2ray.core.*`)
//! because generated code refers to sibling packages through relative
//! `super::` paths. Commonly used items are re-exported at the crate root.

#![allow(missing_docs)] // Generated code doesn't have docs

pub mod convert;

/// Generated V2Ray protocol buffer types.
pub mod v2ray {
    pub mod core {
        tonic::include_proto!("v2ray.core");

        pub mod common {
            pub mod serial {
                tonic::include_proto!("v2ray.core.common.serial");
            }
            pub mod protocol {
                tonic::include_proto!("v2ray.core.common.protocol");
            }
            pub mod net {
                tonic::include_proto!("v2ray.core.common.net");
            }
        }

        pub mod app {
            pub mod proxyman {
                tonic::include_proto!("v2ray.core.app.proxyman");

                pub mod command {
                    tonic::include_proto!("v2ray.core.app.proxyman.command");
                }
            }
            pub mod stats {
                pub mod command {
                    tonic::include_proto!("v2ray.core.app.stats.command");
                }
            }
        }

        pub mod proxy {
            pub mod vmess {
                tonic::include_proto!("v2ray.core.proxy.vmess");

                pub mod inbound {
                    tonic::include_proto!("v2ray.core.proxy.vmess.inbound");
                }
            }
        }
    }
}

// Re-export commonly used types at crate root
pub use convert::{EnvelopeError, TypedPayload};
pub use v2ray::core::app::proxyman::command as handler;
pub use v2ray::core::app::stats::command as stats;
pub use v2ray::core::common::serial::TypedMessage;
