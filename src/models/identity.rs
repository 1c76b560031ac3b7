use serde::{Deserialize, Serialize};
use uuid::Uuid;

const GUEST_PREFIX: &str = "guest-";

/// Who a conversation belongs to.
///
/// Members carry their durable platform id. Guests get a random key that lives
/// only as long as the session holding it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserKey {
    Member(String),
    Guest(String),
}

impl UserKey {
    /// Use the member id when signed in, otherwise mint a fresh guest key.
    pub fn resolve(member_id: Option<&str>) -> Self {
        match member_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => UserKey::Member(id.to_string()),
            None => Self::new_guest(),
        }
    }

    pub fn new_guest() -> Self {
        UserKey::Guest(format!("{}{}", GUEST_PREFIX, Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            UserKey::Member(id) | UserKey::Guest(id) => id,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, UserKey::Guest(_))
    }
}

impl std::fmt::Display for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
