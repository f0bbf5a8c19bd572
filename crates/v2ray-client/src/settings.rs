//! Builders for the protocol-specific payloads carried in envelopes.
//!
//! Only VMess is covered: it is the protocol whose user list the handler
//! service can alter at runtime.

use serde::{Deserialize, Serialize};
use v2ray_proto::v2ray::core::common::protocol::User;
use v2ray_proto::v2ray::core::proxy::vmess;
use v2ray_proto::TypedMessage;

/// A VMess user entry of one inbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmessUser {
    /// Unique key within the inbound's user list; also names the traffic counters.
    pub email: String,
    /// Policy level.
    pub level: u32,
    /// Account UUID.
    pub id: String,
    /// Number of alternative IDs shared with the client.
    pub alter_id: u32,
}

impl VmessUser {
    /// Wire form, with the account packed into its envelope.
    #[must_use]
    pub fn to_proto(&self) -> User {
        let account = vmess::Account {
            id: self.id.clone(),
            alter_id: self.alter_id,
            ..Default::default()
        };
        User {
            level: self.level,
            email: self.email.clone(),
            account: Some(TypedMessage::pack(&account)),
        }
    }
}

/// Proxy settings for a VMess inbound serving `users`.
#[must_use]
pub fn vmess_inbound_settings(users: &[VmessUser]) -> TypedMessage {
    let config = vmess::inbound::Config {
        user: users.iter().map(VmessUser::to_proto).collect(),
        ..Default::default()
    };
    TypedMessage::pack(&config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn user() -> VmessUser {
        VmessUser {
            email: "love@v2ray.com".into(),
            level: 0,
            id: "66ad4540-b58c-4ad2-9926-ea63445a9b57".into(),
            alter_id: 64,
        }
    }

    #[test]
    fn test_user_account_envelope() {
        let proto = user().to_proto();
        assert_eq!(proto.email, "love@v2ray.com");
        let account: vmess::Account = proto.account.unwrap().decode_as().unwrap();
        assert_eq!(account.id, "66ad4540-b58c-4ad2-9926-ea63445a9b57");
        assert_eq!(account.alter_id, 64);
    }

    #[test]
    fn test_inbound_settings_carry_users() {
        let settings = vmess_inbound_settings(&[user()]);
        assert_eq!(settings.r#type, "v2ray.core.proxy.vmess.inbound.Config");
        let config: vmess::inbound::Config = settings.decode_as().unwrap();
        assert_eq!(config.user.len(), 1);
        assert_eq!(config.user[0].email, "love@v2ray.com");
    }
}
