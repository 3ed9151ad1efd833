use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{EVENT_NEW_ORDER, EVENT_NEW_ORDER_ADMIN, JOIN_ADMIN, JOIN_DELIVERER};

/// Consumer class of a notification session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Operations console.
    Admin,
    /// Field courier.
    #[serde(alias = "deliverer")]
    Courier,
}

impl Role {
    /// Key carrying the identity in the join payload.
    pub fn id_key(self) -> &'static str {
        match self {
            Self::Admin => "adminId",
            Self::Courier => "delivererId",
        }
    }

    /// Channel the join message is emitted on.
    pub fn join_channel(self) -> &'static str {
        match self {
            Self::Admin => JOIN_ADMIN,
            Self::Courier => JOIN_DELIVERER,
        }
    }

    /// Event name the server uses to push new orders to this role.
    pub fn new_order_event(self) -> &'static str {
        match self {
            Self::Admin => EVENT_NEW_ORDER_ADMIN,
            Self::Courier => EVENT_NEW_ORDER,
        }
    }

    /// Builds the join payload, e.g. `{"delivererId": "courier-42"}`.
    pub fn join_payload(self, identity: &str) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(
            self.id_key().to_string(),
            serde_json::Value::String(identity.to_string()),
        );
        serde_json::Value::Object(map)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Courier => "courier",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "courier" | "deliverer" => Ok(Self::Courier),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_payload_uses_role_key() {
        assert_eq!(
            Role::Courier.join_payload("courier-42"),
            serde_json::json!({"delivererId": "courier-42"})
        );
        assert_eq!(
            Role::Admin.join_payload("a-1"),
            serde_json::json!({"adminId": "a-1"})
        );
    }

    #[test]
    fn channels_and_events() {
        assert_eq!(Role::Admin.join_channel(), "join-admin");
        assert_eq!(Role::Courier.join_channel(), "join-deliverer");
        assert_eq!(Role::Admin.new_order_event(), "new-order-admin");
        assert_eq!(Role::Courier.new_order_event(), "new-order");
    }

    #[test]
    fn parse_accepts_deliverer_alias() {
        assert_eq!("deliverer".parse::<Role>().unwrap(), Role::Courier);
        assert_eq!(" Admin ".parse::<Role>().unwrap(), Role::Admin);
        assert!("driver".parse::<Role>().is_err());
    }

    #[test]
    fn serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Courier).unwrap(), "\"courier\"");
        let r: Role = serde_json::from_str("\"deliverer\"").unwrap();
        assert_eq!(r, Role::Courier);
    }
}
