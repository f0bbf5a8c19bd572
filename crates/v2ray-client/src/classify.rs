//! Classification of server failure details into [`ProxyError`] variants.
//!
//! The V2Ray API reports "user exists", "inbound missing" and "port taken"
//! only as free text inside a generic gRPC status. This module maps that text
//! back to typed errors by matching it against message templates with the
//! request's own identifiers interpolated (`{email}`, `{tag}`, `{port}`).
//!
//! # Compatibility table
//!
//! The wording is owned by the server and is not a documented contract, so
//! the templates live in a [`DetailTemplates`] table labelled with the server
//! release it was taken from. The default table matches V2Ray v4. A different
//! server build can be supported by loading another table from configuration
//! without touching the matching code.
//!
//! Text that matches no template is never dropped: it becomes
//! [`ProxyError::Rpc`] with the detail verbatim.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tonic::{Code, Status};

use crate::error::ProxyError;

/// How a rendered template is compared with the detail text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Detail ends with the rendered template (server prefixes error chains).
    Suffix,
    /// Detail equals the rendered template.
    Exact,
}

/// One detail-text template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRule {
    /// Message text with `{email}`, `{tag}` or `{port}` placeholders.
    pub pattern: String,
    /// Comparison applied after interpolation.
    #[serde(rename = "match")]
    pub mode: MatchMode,
}

impl DetailRule {
    /// Rule matching the end of the detail text.
    #[must_use]
    pub fn suffix(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            mode: MatchMode::Suffix,
        }
    }

    /// Rule matching the whole detail text.
    #[must_use]
    pub fn exact(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            mode: MatchMode::Exact,
        }
    }

    fn matches(&self, detail: &str, vars: &HashMap<String, String>) -> bool {
        let expected = match strfmt::strfmt(&self.pattern, vars) {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::warn!(pattern = %self.pattern, error = %e, "unusable detail template");
                return false;
            }
        };
        match self.mode {
            MatchMode::Suffix => detail.ends_with(&expected),
            MatchMode::Exact => detail == expected,
        }
    }
}

/// Versioned table of server detail-text templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailTemplates {
    /// Server release the wording was taken from.
    pub server_version: String,
    /// `AlterInbound` + `AddUserOperation` on a duplicate email.
    pub email_exists: DetailRule,
    /// `AlterInbound` + `RemoveUserOperation` on an unknown email.
    pub email_not_found: DetailRule,
    /// Any handler operation addressed to an unknown tag.
    pub handler_not_found: DetailRule,
    /// `AddInbound` whose listener cannot bind.
    pub address_in_use: DetailRule,
    /// `RemoveInbound` on an unknown tag.
    pub remove_unknown_inbound: DetailRule,
}

impl Default for DetailTemplates {
    fn default() -> Self {
        Self::v4()
    }
}

impl DetailTemplates {
    /// Wording used by V2Ray v4.x.
    #[must_use]
    pub fn v4() -> Self {
        Self {
            server_version: "v4".to_string(),
            email_exists: DetailRule::suffix("User {email} already exists."),
            email_not_found: DetailRule::suffix("User {email} not found."),
            handler_not_found: DetailRule::suffix("handler not found: {tag}"),
            address_in_use: DetailRule::suffix("address already in use"),
            remove_unknown_inbound: DetailRule::exact(
                "not enough information for making a decision",
            ),
        }
    }

    /// Map a failed call of `operation` to a typed error.
    #[must_use]
    pub fn classify(&self, operation: &Operation<'_>, status: &Status) -> ProxyError {
        self.classify_detail(operation, status.code(), status.message())
    }

    /// Pure form of [`classify`](Self::classify) over the raw code and detail.
    #[must_use]
    pub fn classify_detail(&self, operation: &Operation<'_>, code: Code, detail: &str) -> ProxyError {
        let vars = operation.vars();
        let details = detail.to_string();

        match *operation {
            Operation::AddUser { tag, email } => {
                if self.email_exists.matches(detail, &vars) {
                    return ProxyError::EmailExists {
                        email: email.to_string(),
                        details,
                    };
                }
                if self.handler_not_found.matches(detail, &vars) {
                    return ProxyError::InboundNotFound {
                        tag: tag.to_string(),
                        details,
                    };
                }
            }
            Operation::RemoveUser { tag, email } => {
                if self.email_not_found.matches(detail, &vars) {
                    return ProxyError::EmailNotFound {
                        email: email.to_string(),
                        details,
                    };
                }
                if self.handler_not_found.matches(detail, &vars) {
                    return ProxyError::InboundNotFound {
                        tag: tag.to_string(),
                        details,
                    };
                }
            }
            Operation::AddInbound { tag, port } => {
                if self.address_in_use.matches(detail, &vars) {
                    return ProxyError::AddressAlreadyInUse { port, details };
                }
                if self.handler_not_found.matches(detail, &vars) {
                    return ProxyError::InboundNotFound {
                        tag: tag.to_string(),
                        details,
                    };
                }
            }
            Operation::RemoveInbound { tag } => {
                if self.remove_unknown_inbound.matches(detail, &vars) {
                    return ProxyError::InboundNotFound {
                        tag: tag.to_string(),
                        details,
                    };
                }
            }
        }

        ProxyError::Rpc { code, details }
    }
}

/// Identifiers of the request whose failure is being classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    /// `AlterInbound` carrying an `AddUserOperation`.
    AddUser {
        /// Target inbound tag.
        tag: &'a str,
        /// Email of the new user.
        email: &'a str,
    },
    /// `AlterInbound` carrying a `RemoveUserOperation`.
    RemoveUser {
        /// Target inbound tag.
        tag: &'a str,
        /// Email of the user to remove.
        email: &'a str,
    },
    /// `AddInbound`.
    AddInbound {
        /// Tag of the new inbound.
        tag: &'a str,
        /// Requested listen port.
        port: u16,
    },
    /// `RemoveInbound`.
    RemoveInbound {
        /// Tag of the inbound to remove.
        tag: &'a str,
    },
}

impl Operation<'_> {
    /// RPC name, for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddUser { .. } => "add_user",
            Self::RemoveUser { .. } => "remove_user",
            Self::AddInbound { .. } => "add_inbound",
            Self::RemoveInbound { .. } => "remove_inbound",
        }
    }

    fn vars(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        match *self {
            Self::AddUser { tag, email } | Self::RemoveUser { tag, email } => {
                vars.insert("tag".to_string(), tag.to_string());
                vars.insert("email".to_string(), email.to_string());
            }
            Self::AddInbound { tag, port } => {
                vars.insert("tag".to_string(), tag.to_string());
                vars.insert("port".to_string(), port.to_string());
            }
            Self::RemoveInbound { tag } => {
                vars.insert("tag".to_string(), tag.to_string());
            }
        }
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADD: Operation<'static> = Operation::AddUser {
        tag: "vmess-in",
        email: "love@v2ray.com",
    };
    const REMOVE: Operation<'static> = Operation::RemoveUser {
        tag: "vmess-in",
        email: "love@v2ray.com",
    };

    fn classify(op: &Operation<'_>, detail: &str) -> ProxyError {
        DetailTemplates::default().classify_detail(op, Code::Unknown, detail)
    }

    #[test]
    fn test_rule_constructors_set_match_mode() {
        let suffix = DetailRule::suffix("handler not found: {tag}");
        assert_eq!(suffix.mode, MatchMode::Suffix);
        assert_eq!(suffix.pattern, "handler not found: {tag}");
        assert_eq!(DetailRule::exact("gone").mode, MatchMode::Exact);
    }

    #[test]
    fn test_add_user_duplicate_email() {
        let detail = "app/proxyman/command: failed to add user > \
                      proxy/vmess/inbound: User love@v2ray.com already exists.";
        assert_eq!(
            classify(&ADD, detail),
            ProxyError::EmailExists {
                email: "love@v2ray.com".into(),
                details: detail.into(),
            }
        );
    }

    #[test]
    fn test_add_user_other_email_in_message_is_not_a_match() {
        let detail = "User someone@else.com already exists.";
        assert!(matches!(classify(&ADD, detail), ProxyError::Rpc { .. }));
    }

    #[test]
    fn test_add_user_unknown_inbound() {
        let detail = "app/proxyman/command: failed to get handler: vmess-in > \
                      app/proxyman/inbound: handler not found: vmess-in";
        assert_eq!(
            classify(&ADD, detail),
            ProxyError::InboundNotFound {
                tag: "vmess-in".into(),
                details: detail.into(),
            }
        );
    }

    #[test]
    fn test_remove_user_unknown_email() {
        let detail = "proxy/vmess: User love@v2ray.com not found.";
        assert!(matches!(
            classify(&REMOVE, detail),
            ProxyError::EmailNotFound { ref email, .. } if email == "love@v2ray.com"
        ));
    }

    #[test]
    fn test_remove_user_unknown_inbound() {
        let detail = "handler not found: vmess-in";
        assert!(matches!(
            classify(&REMOVE, detail),
            ProxyError::InboundNotFound { ref tag, .. } if tag == "vmess-in"
        ));
    }

    #[test]
    fn test_remove_user_does_not_use_add_template() {
        let detail = "User love@v2ray.com already exists.";
        assert!(matches!(classify(&REMOVE, detail), ProxyError::Rpc { .. }));
    }

    #[test]
    fn test_add_inbound_port_in_use() {
        let op = Operation::AddInbound {
            tag: "api-in",
            port: 10086,
        };
        let detail = "app/proxyman/inbound: failed to listen TCP on 10086 > \
                      listen tcp 0.0.0.0:10086: bind: address already in use";
        assert_eq!(
            classify(&op, detail),
            ProxyError::AddressAlreadyInUse {
                port: 10086,
                details: detail.into(),
            }
        );
    }

    #[test]
    fn test_add_inbound_unknown_handler() {
        let op = Operation::AddInbound {
            tag: "api-in",
            port: 10086,
        };
        assert!(matches!(
            classify(&op, "handler not found: api-in"),
            ProxyError::InboundNotFound { ref tag, .. } if tag == "api-in"
        ));
    }

    #[test]
    fn test_remove_inbound_requires_exact_text() {
        let op = Operation::RemoveInbound { tag: "gone" };
        assert!(matches!(
            classify(&op, "not enough information for making a decision"),
            ProxyError::InboundNotFound { ref tag, .. } if tag == "gone"
        ));
        assert!(matches!(
            classify(&op, "prefix: not enough information for making a decision"),
            ProxyError::Rpc { .. }
        ));
    }

    #[test]
    fn test_unmatched_detail_kept_verbatim() {
        let detail = "rpc error: something completely different";
        let err = DetailTemplates::default().classify_detail(&ADD, Code::Internal, detail);
        assert_eq!(
            err,
            ProxyError::Rpc {
                code: Code::Internal,
                details: detail.into(),
            }
        );
    }

    #[test]
    fn test_classify_from_status() {
        let status = Status::unknown("User love@v2ray.com already exists.");
        let err = DetailTemplates::default().classify(&ADD, &status);
        assert_eq!(err.details(), "User love@v2ray.com already exists.");
        assert_eq!(err.kind(), "email_exists");
    }

    #[test]
    fn test_custom_table_changes_wording() {
        let templates = DetailTemplates {
            server_version: "v5".into(),
            email_exists: DetailRule::suffix("user {email} exists"),
            ..DetailTemplates::v4()
        };
        let err = templates.classify_detail(&ADD, Code::Unknown, "x: user love@v2ray.com exists");
        assert_eq!(err.kind(), "email_exists");
    }

    #[test]
    fn test_port_placeholder_is_available() {
        let templates = DetailTemplates {
            address_in_use: DetailRule::suffix("port {port} is busy"),
            ..DetailTemplates::v4()
        };
        let op = Operation::AddInbound { tag: "t", port: 443 };
        let err = templates.classify_detail(&op, Code::Unknown, "port 443 is busy");
        assert_eq!(err.kind(), "address_already_in_use");
    }
}
