//! gRPC client for the V2Ray administrative API.
//!
//! [`V2RayClient`] owns one channel to the API endpoint and binds a fresh,
//! short-lived stub to it for every call. The channel multiplexes concurrent
//! calls, so the client is cheap to clone and needs no locking.
//!
//! # Security
//!
//! The V2Ray API inbound has neither TLS nor authentication. The constructors
//! are named `insecure*` because that is exactly what they build: a plaintext
//! channel that trusts the endpoint and the network path to it.
//!
//! # Connection lifecycle
//!
//! Construction never touches the network. The channel connects on first use,
//! so building a client for an unreachable host succeeds and the failure shows
//! up on the first call (as [`Traffic::Unavailable`] for traffic reads and as
//! [`ProxyError::Rpc`] with `Code::Unavailable` otherwise).
//!
//! The client never retries and sets no deadline of its own; use
//! [`ChannelConfig::request_timeout`] for a transport-level deadline.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tonic::transport::{Channel, Endpoint};
use tonic::Status;
use v2ray_proto::handler::{
    handler_service_client::HandlerServiceClient, AddInboundRequest, AddUserOperation,
    AlterInboundRequest, RemoveInboundRequest, RemoveUserOperation,
};
use v2ray_proto::stats::{
    stats_service_client::StatsServiceClient, GetStatsRequest, QueryStatsRequest,
    SysStatsRequest,
};
use v2ray_proto::v2ray::core::app::proxyman::ReceiverConfig;
use v2ray_proto::v2ray::core::common::net::PortRange;
use v2ray_proto::v2ray::core::InboundHandlerConfig;
use v2ray_proto::TypedMessage;

use crate::classify::{DetailTemplates, Operation};
use crate::connection::{AddressSource, ApiAddress};
use crate::error::{ClientError, ProxyError, Result};
use crate::settings::VmessUser;
use crate::stats::{Counter, CounterName, Direction, SysStats, Traffic};

/// gRPC channel configuration.
///
/// Everything here is applied by the transport; the client itself adds no
/// timeouts or retries on top.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// How long a (lazy) connection attempt may take.
    pub connect_timeout: Duration,
    /// Per-call deadline. `None` leaves calls unbounded.
    pub request_timeout: Option<Duration>,
    /// HTTP/2 keepalive ping interval. `None` disables keepalive pings.
    pub keepalive_interval: Option<Duration>,
    /// How long to wait for a keepalive ack.
    pub keepalive_timeout: Duration,
    /// Whether to ping while no call is in flight.
    pub keepalive_while_idle: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            keepalive_interval: None,
            keepalive_timeout: Duration::from_secs(20),
            keepalive_while_idle: false,
        }
    }
}

/// Control-plane client for one V2Ray API endpoint.
#[derive(Debug, Clone)]
pub struct V2RayClient {
    channel: Channel,
    address: ApiAddress,
    templates: Arc<DetailTemplates>,
}

impl V2RayClient {
    /// Plaintext client for `host:port` with default channel settings.
    ///
    /// Fails only if `host` and `port` do not form a valid endpoint URI; the
    /// host is not contacted.
    pub fn insecure(host: &str, port: u16) -> Result<Self, ClientError> {
        let address = ApiAddress::from_host_port(host, port, AddressSource::UserInput)?;
        Self::insecure_with_config(&address, ChannelConfig::default())
    }

    /// Plaintext client with custom channel configuration.
    pub fn insecure_with_config(
        address: &ApiAddress,
        config: ChannelConfig,
    ) -> Result<Self, ClientError> {
        let mut endpoint = Endpoint::from_shared(address.uri())?
            .connect_timeout(config.connect_timeout)
            .keep_alive_timeout(config.keepalive_timeout)
            .keep_alive_while_idle(config.keepalive_while_idle);
        if let Some(timeout) = config.request_timeout {
            endpoint = endpoint.timeout(timeout);
        }
        if let Some(interval) = config.keepalive_interval {
            endpoint = endpoint.http2_keep_alive_interval(interval);
        }

        tracing::debug!(%address, source = %address.source(), "creating lazy plaintext channel");

        Ok(Self {
            channel: endpoint.connect_lazy(),
            address: address.clone(),
            templates: Arc::new(DetailTemplates::default()),
        })
    }

    /// Replace the detail-text table used to classify failures.
    #[must_use]
    pub fn with_templates(mut self, templates: DetailTemplates) -> Self {
        self.templates = Arc::new(templates);
        self
    }

    /// The endpoint this client talks to.
    #[must_use]
    pub fn address(&self) -> &ApiAddress {
        &self.address
    }

    /// The detail-text table in use.
    #[must_use]
    pub fn templates(&self) -> &DetailTemplates {
        &self.templates
    }

    fn handler(&self) -> HandlerServiceClient<Channel> {
        HandlerServiceClient::new(self.channel.clone())
    }

    fn stats(&self) -> StatsServiceClient<Channel> {
        StatsServiceClient::new(self.channel.clone())
    }

    fn fail(&self, operation: &Operation<'_>, status: &Status) -> ProxyError {
        let err = self.templates.classify(operation, status);
        tracing::warn!(
            operation = operation.name(),
            code = ?status.code(),
            kind = err.kind(),
            details = status.message(),
            "v2ray call failed"
        );
        err
    }

    // =========================================================================
    // Stats Service
    // =========================================================================

    /// Bytes uploaded by the user with `email`.
    ///
    /// Best effort: any failure, including a counter that does not exist yet
    /// because the user never sent traffic, reads as [`Traffic::Unavailable`].
    /// With `reset` the server zeroes the counter after reading it.
    pub async fn uplink_traffic(&self, email: &str, reset: bool) -> Traffic {
        self.read_counter(&CounterName::user(email, Direction::Uplink), reset)
            .await
    }

    /// Bytes downloaded by the user with `email`. Same semantics as
    /// [`uplink_traffic`](Self::uplink_traffic).
    pub async fn downlink_traffic(&self, email: &str, reset: bool) -> Traffic {
        self.read_counter(&CounterName::user(email, Direction::Downlink), reset)
            .await
    }

    /// Traffic through the inbound tagged `tag`, best effort.
    pub async fn inbound_traffic(&self, tag: &str, direction: Direction, reset: bool) -> Traffic {
        self.read_counter(&CounterName::inbound(tag, direction), reset)
            .await
    }

    /// Read any counter by name, best effort.
    pub async fn read_counter(&self, name: &CounterName, reset: bool) -> Traffic {
        tracing::debug!(counter = %name, reset, "GetStats");
        let request = GetStatsRequest {
            name: name.to_string(),
            reset,
        };
        match self.stats().get_stats(request).await {
            // An absent stat reads as the proto3 default, as the server means it
            Ok(response) => Traffic::Bytes(response.into_inner().stat.map_or(0, |s| s.value)),
            Err(status) => {
                tracing::debug!(
                    counter = %name,
                    code = ?status.code(),
                    details = status.message(),
                    "stat query failed, reporting unavailable"
                );
                Traffic::Unavailable
            }
        }
    }

    /// All counters whose name contains `pattern` (empty matches all).
    ///
    /// Unlike the single-counter reads this is not best effort: failures are
    /// returned as [`ProxyError::Rpc`].
    pub async fn query_stats(&self, pattern: &str, reset: bool) -> Result<Vec<Counter>> {
        tracing::debug!(pattern, reset, "QueryStats");
        let response = self
            .stats()
            .query_stats(QueryStatsRequest {
                pattern: pattern.to_string(),
                reset,
            })
            .await?;
        Ok(response
            .into_inner()
            .stat
            .into_iter()
            .map(Counter::from)
            .collect())
    }

    /// Runtime statistics of the server process.
    pub async fn sys_stats(&self) -> Result<SysStats> {
        let response = self.stats().get_sys_stats(SysStatsRequest {}).await?;
        Ok(response.into_inner().into())
    }

    // =========================================================================
    // Handler Service
    // =========================================================================

    /// Add a VMess user to the inbound tagged `inbound_tag`, returning `user_id`.
    ///
    /// # Errors
    ///
    /// - [`ProxyError::EmailExists`] if the inbound already has `email`
    /// - [`ProxyError::InboundNotFound`] if no inbound has `inbound_tag`
    /// - [`ProxyError::Rpc`] for anything else, detail text intact
    pub async fn add_user(
        &self,
        inbound_tag: &str,
        user_id: &str,
        email: &str,
        level: u32,
        alter_id: u32,
    ) -> Result<String> {
        let user = VmessUser {
            email: email.to_string(),
            level,
            id: user_id.to_string(),
            alter_id,
        };
        self.add_vmess_user(inbound_tag, &user).await?;
        Ok(user.id)
    }

    /// Add a fully described VMess user. See [`add_user`](Self::add_user).
    pub async fn add_vmess_user(&self, inbound_tag: &str, user: &VmessUser) -> Result<()> {
        tracing::debug!(inbound_tag, email = %user.email, level = user.level, "AlterInbound: add user");
        let operation = AddUserOperation {
            user: Some(user.to_proto()),
        };
        let request = AlterInboundRequest {
            tag: inbound_tag.to_string(),
            operation: Some(TypedMessage::pack(&operation)),
        };
        self.handler()
            .alter_inbound(request)
            .await
            .map_err(|status| {
                self.fail(
                    &Operation::AddUser {
                        tag: inbound_tag,
                        email: &user.email,
                    },
                    &status,
                )
            })?;
        Ok(())
    }

    /// Remove the user with `email` from the inbound tagged `inbound_tag`.
    ///
    /// Removal is eventually consistent on the server: the user is dropped
    /// from the list immediately, but sessions that already authenticated are
    /// not terminated. The user stops being able to authenticate only once the
    /// server's session cache expires, which takes minutes.
    ///
    /// # Errors
    ///
    /// - [`ProxyError::EmailNotFound`] if the inbound has no `email`
    /// - [`ProxyError::InboundNotFound`] if no inbound has `inbound_tag`
    /// - [`ProxyError::Rpc`] for anything else
    pub async fn remove_user(&self, inbound_tag: &str, email: &str) -> Result<()> {
        tracing::debug!(inbound_tag, email, "AlterInbound: remove user");
        let operation = RemoveUserOperation {
            email: email.to_string(),
        };
        let request = AlterInboundRequest {
            tag: inbound_tag.to_string(),
            operation: Some(TypedMessage::pack(&operation)),
        };
        self.handler()
            .alter_inbound(request)
            .await
            .map_err(|status| {
                self.fail(
                    &Operation::RemoveUser {
                        tag: inbound_tag,
                        email,
                    },
                    &status,
                )
            })?;
        Ok(())
    }

    /// Add an inbound tagged `tag` listening on `address:port`.
    ///
    /// `proxy_settings` is the protocol-specific configuration envelope, e.g.
    /// from [`vmess_inbound_settings`](crate::settings::vmess_inbound_settings).
    ///
    /// # Errors
    ///
    /// - [`ProxyError::AddressAlreadyInUse`] if the server cannot bind `port`
    /// - [`ProxyError::InboundNotFound`] if the server reports the handler missing
    /// - [`ProxyError::Rpc`] for anything else
    pub async fn add_inbound(
        &self,
        tag: &str,
        address: IpAddr,
        port: u16,
        proxy_settings: TypedMessage,
    ) -> Result<()> {
        tracing::debug!(tag, %address, port, settings = %proxy_settings.r#type, "AddInbound");
        let receiver = ReceiverConfig {
            port_range: Some(PortRange::single(port)),
            listen: Some(address.into()),
            ..Default::default()
        };
        let request = AddInboundRequest {
            inbound: Some(InboundHandlerConfig {
                tag: tag.to_string(),
                receiver_settings: Some(TypedMessage::pack(&receiver)),
                proxy_settings: Some(proxy_settings),
            }),
        };
        self.handler()
            .add_inbound(request)
            .await
            .map_err(|status| self.fail(&Operation::AddInbound { tag, port }, &status))?;
        Ok(())
    }

    /// Remove the inbound tagged `tag`.
    ///
    /// # Errors
    ///
    /// - [`ProxyError::InboundNotFound`] if no inbound has `tag`
    /// - [`ProxyError::Rpc`] for anything else
    pub async fn remove_inbound(&self, tag: &str) -> Result<()> {
        tracing::debug!(tag, "RemoveInbound");
        self.handler()
            .remove_inbound(RemoveInboundRequest {
                tag: tag.to_string(),
            })
            .await
            .map_err(|status| self.fail(&Operation::RemoveInbound { tag }, &status))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    async fn test_construction_does_not_connect() {
        // Nothing listens on a documentation address; creation must still succeed
        let client = V2RayClient::insecure("192.0.2.1", 10085).unwrap();
        assert_eq!(client.address().uri(), "http://192.0.2.1:10085");
        assert_eq!(client.templates().server_version, "v4");
    }

    #[tokio::test]
    async fn test_construction_rejects_invalid_host() {
        assert!(matches!(
            V2RayClient::insecure("", 10085),
            Err(ClientError::Address(_))
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_unreachable_server_reads_unavailable() {
        let client = V2RayClient::insecure("127.0.0.1", 1).unwrap();
        assert_eq!(
            client.uplink_traffic("love@v2ray.com", false).await,
            Traffic::Unavailable
        );
        assert_eq!(
            client.downlink_traffic("love@v2ray.com", true).await,
            Traffic::Unavailable
        );
        assert!(logs_contain("stat query failed"));
    }

    #[tokio::test]
    async fn test_unreachable_server_surfaces_generic_error() {
        let client = V2RayClient::insecure("127.0.0.1", 1).unwrap();
        let err = client.remove_inbound("api").await.unwrap_err();
        assert!(matches!(err, ProxyError::Rpc { .. }));
        assert!(!err.details().is_empty());
    }
}
