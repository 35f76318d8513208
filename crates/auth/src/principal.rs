use serde::{Deserialize, Serialize};

use groupvault_core::UserId;

/// Identity of an authenticated caller.
///
/// The identity provider verifies the caller before any request reaches the
/// governance layer; this type only carries the result. Construct it at the
/// transport boundary, never inside a vault critical section.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(UserId);

impl CallerId {
    pub fn new(user_id: UserId) -> Self {
        Self(user_id)
    }

    pub fn user_id(&self) -> UserId {
        self.0
    }
}

impl From<UserId> for CallerId {
    fn from(value: UserId) -> Self {
        Self(value)
    }
}

impl core::fmt::Display for CallerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
