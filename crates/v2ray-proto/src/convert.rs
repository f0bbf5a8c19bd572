//! Conversions between wire types and standard library / domain types.
//!
//! The V2Ray schema has no native union type for polymorphic fields. Instead a
//! [`TypedMessage`] pairs a fully-qualified message name with the serialized
//! payload. [`TypedPayload`] ties each packable message to the name the server
//! dispatches on, so packing and on-demand decoding stay type checked.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use prost::Message;
use thiserror::Error;

use crate::v2ray::core::app::proxyman::command::{AddUserOperation, RemoveUserOperation};
use crate::v2ray::core::app::proxyman::ReceiverConfig;
use crate::v2ray::core::common::net::{ip_or_domain, IpOrDomain, PortRange};
use crate::v2ray::core::common::protocol::User;
use crate::v2ray::core::common::serial::TypedMessage;
use crate::v2ray::core::proxy::vmess;
use crate::v2ray::core::InboundHandlerConfig;

/// A message that can travel inside a [`TypedMessage`] envelope.
pub trait TypedPayload: Message + Default {
    /// Fully-qualified protobuf name, e.g. `v2ray.core.proxy.vmess.Account`.
    const TYPE_NAME: &'static str;
}

macro_rules! typed_payload {
    ($($ty:ty => $name:literal),+ $(,)?) => {
        $(
            impl TypedPayload for $ty {
                const TYPE_NAME: &'static str = $name;
            }
        )+
    };
}

typed_payload! {
    AddUserOperation => "v2ray.core.app.proxyman.command.AddUserOperation",
    RemoveUserOperation => "v2ray.core.app.proxyman.command.RemoveUserOperation",
    ReceiverConfig => "v2ray.core.app.proxyman.ReceiverConfig",
    InboundHandlerConfig => "v2ray.core.InboundHandlerConfig",
    User => "v2ray.core.common.protocol.User",
    vmess::Account => "v2ray.core.proxy.vmess.Account",
    vmess::inbound::Config => "v2ray.core.proxy.vmess.inbound.Config",
}

/// Errors raised when unpacking a [`TypedMessage`].
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The envelope carries a different message type than requested.
    #[error("envelope holds '{found}', expected '{expected}'")]
    TypeMismatch {
        /// Requested type name.
        expected: &'static str,
        /// Type name found in the envelope.
        found: String,
    },

    /// The payload bytes are not a valid encoding of the requested type.
    #[error("malformed envelope payload: {0}")]
    Decode(#[from] prost::DecodeError),
}

impl TypedMessage {
    /// Serialize `message` and tag it with its schema name.
    pub fn pack<T: TypedPayload>(message: &T) -> Self {
        Self {
            r#type: T::TYPE_NAME.to_string(),
            value: message.encode_to_vec(),
        }
    }

    /// Returns `true` if the envelope is tagged with `T`'s schema name.
    #[must_use]
    pub fn is<T: TypedPayload>(&self) -> bool {
        self.r#type == T::TYPE_NAME
    }

    /// Decode the payload as `T`, checking the type tag first.
    pub fn decode_as<T: TypedPayload>(&self) -> Result<T, EnvelopeError> {
        if !self.is::<T>() {
            return Err(EnvelopeError::TypeMismatch {
                expected: T::TYPE_NAME,
                found: self.r#type.clone(),
            });
        }
        Ok(T::decode(self.value.as_slice())?)
    }
}

// Addresses travel as raw big-endian octets: 4 bytes for IPv4, 16 for IPv6.

impl From<IpAddr> for IpOrDomain {
    fn from(addr: IpAddr) -> Self {
        let octets = match addr {
            IpAddr::V4(v4) => v4.octets().to_vec(),
            IpAddr::V6(v6) => v6.octets().to_vec(),
        };
        Self {
            address: Some(ip_or_domain::Address::Ip(octets)),
        }
    }
}

impl IpOrDomain {
    /// Decode the raw IP octets, if this is a well-formed IP address.
    ///
    /// Returns `None` for domain addresses and for byte strings that are
    /// neither 4 nor 16 bytes long.
    #[must_use]
    pub fn ip_addr(&self) -> Option<IpAddr> {
        match self.address.as_ref()? {
            ip_or_domain::Address::Ip(bytes) => match bytes.len() {
                4 => {
                    let octets: [u8; 4] = bytes.as_slice().try_into().ok()?;
                    Some(IpAddr::V4(Ipv4Addr::from(octets)))
                }
                16 => {
                    let octets: [u8; 16] = bytes.as_slice().try_into().ok()?;
                    Some(IpAddr::V6(Ipv6Addr::from(octets)))
                }
                _ => None,
            },
            ip_or_domain::Address::Domain(_) => None,
        }
    }
}

impl PortRange {
    /// A range covering exactly one port.
    #[must_use]
    pub fn single(port: u16) -> Self {
        Self {
            from: u32::from(port),
            to: u32::from(port),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_pack_uses_schema_name() {
        let op = RemoveUserOperation {
            email: "love@v2ray.com".to_string(),
        };
        let envelope = TypedMessage::pack(&op);
        assert_eq!(
            envelope.r#type,
            "v2ray.core.app.proxyman.command.RemoveUserOperation"
        );
        assert!(envelope.is::<RemoveUserOperation>());
        assert!(!envelope.is::<AddUserOperation>());
    }

    #[test]
    fn test_decode_as_nested_account() {
        let account = vmess::Account {
            id: "66ad4540-b58c-4ad2-9926-ea63445a9b57".to_string(),
            alter_id: 16,
            ..Default::default()
        };
        let user = User {
            level: 1,
            email: "love@v2ray.com".to_string(),
            account: Some(TypedMessage::pack(&account)),
        };
        let envelope = TypedMessage::pack(&AddUserOperation { user: Some(user) });

        let op: AddUserOperation = envelope.decode_as().unwrap();
        let user = op.user.unwrap();
        assert_eq!(user.email, "love@v2ray.com");
        let decoded: vmess::Account = user.account.unwrap().decode_as().unwrap();
        assert_eq!(decoded, account);
    }

    #[test]
    fn test_decode_as_rejects_wrong_type() {
        let envelope = TypedMessage::pack(&RemoveUserOperation::default());
        let err = envelope.decode_as::<AddUserOperation>().unwrap_err();
        match err {
            EnvelopeError::TypeMismatch { expected, found } => {
                assert_eq!(expected, AddUserOperation::TYPE_NAME);
                assert_eq!(found, RemoveUserOperation::TYPE_NAME);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_as_rejects_garbage_payload() {
        let envelope = TypedMessage {
            r#type: vmess::Account::TYPE_NAME.to_string(),
            value: vec![0xff, 0xff, 0xff],
        };
        assert!(matches!(
            envelope.decode_as::<vmess::Account>(),
            Err(EnvelopeError::Decode(_))
        ));
    }

    #[test]
    fn test_ipv4_is_four_raw_bytes() {
        let addr: IpAddr = "127.0.0.1".parse().unwrap();
        let wire = IpOrDomain::from(addr);
        assert_eq!(
            wire.address,
            Some(ip_or_domain::Address::Ip(vec![127, 0, 0, 1]))
        );
        assert_eq!(wire.ip_addr(), Some(addr));
    }

    #[test]
    fn test_ipv6_is_sixteen_raw_bytes() {
        let addr: IpAddr = "::1".parse().unwrap();
        let wire = IpOrDomain::from(addr);
        let mut expected = vec![0u8; 16];
        expected[15] = 1;
        assert_eq!(wire.address, Some(ip_or_domain::Address::Ip(expected)));
        assert_eq!(wire.ip_addr(), Some(addr));
    }

    #[test]
    fn test_malformed_ip_length_is_none() {
        let wire = IpOrDomain {
            address: Some(ip_or_domain::Address::Ip(vec![10, 0, 0])),
        };
        assert_eq!(wire.ip_addr(), None);

        let domain = IpOrDomain {
            address: Some(ip_or_domain::Address::Domain("v2ray.com".to_string())),
        };
        assert_eq!(domain.ip_addr(), None);
    }

    #[test]
    fn test_single_port_range() {
        let range = PortRange::single(10086);
        assert_eq!(range.from, 10086);
        assert_eq!(range.to, 10086);
    }
}
