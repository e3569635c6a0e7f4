use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit record of a legal identity transition. Recorded alongside the
/// state flags so the history of an account can be replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum IdentityEvent {
    /// Account created, awaiting email confirmation
    Registered { user_id: Uuid },

    /// Confirmation code redeemed
    Confirmed { user_id: Uuid },

    /// Password set, either deferred from registration or via reset
    PasswordSet { user_id: Uuid },

    /// Seller profile attached
    ElevatedToSeller { user_id: Uuid, seller_id: Uuid },
}

impl IdentityEvent {
    /// Stable name stored in the audit table.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Registered { .. } => "registered",
            Self::Confirmed { .. } => "confirmed",
            Self::PasswordSet { .. } => "password_set",
            Self::ElevatedToSeller { .. } => "elevated_to_seller",
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            Self::Registered { user_id }
            | Self::Confirmed { user_id }
            | Self::PasswordSet { user_id }
            | Self::ElevatedToSeller { user_id, .. } => *user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_adjacently_tagged() {
        let user_id = Uuid::nil();
        let json = serde_json::to_value(IdentityEvent::Confirmed { user_id }).unwrap();
        assert_eq!(json["type"], "Confirmed");
        assert_eq!(json["data"]["user_id"], user_id.to_string());
    }
}
