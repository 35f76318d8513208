use groupvault_auth::CallerId;

/// Caller context for a request.
///
/// Inserted by the identity middleware; every vault route requires it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CallerContext {
    caller: CallerId,
}

impl CallerContext {
    pub fn new(caller: CallerId) -> Self {
        Self { caller }
    }

    pub fn caller(&self) -> CallerId {
        self.caller
    }
}
