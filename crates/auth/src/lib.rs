//! `groupvault-auth`: pure role/capability authorization (no IO).
//!
//! Roles are a closed tagged enum; every permission check is a pure function
//! of `(role, explicit grants, capability)`.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{
    AuthorizationExplanation, AuthzError, MemberGrants, authorize, explain_authorization, role_grants,
};
pub use permissions::Capability;
pub use principal::CallerId;
pub use roles::Role;
