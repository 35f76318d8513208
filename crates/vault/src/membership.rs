//! Membership registry: roles, capabilities and per-member limits.
//!
//! Invariant: exactly one active Owner per vault. Every operation that could
//! break it fails with `LastOwnerProtected` (demotion/removal) or
//! `Validation` (a second owner) before touching state.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use groupvault_auth::{Capability, Role, authorize};
use groupvault_core::{GovernanceError, GovernanceResult, UserId};

use crate::events::GovernanceEvent;
use crate::member::VaultMember;
use crate::state::VaultState;

impl VaultState {
    pub fn get_role(&self, user_id: UserId) -> GovernanceResult<Role> {
        self.active_member(user_id).map(|m| m.role)
    }

    pub fn has_permission(&self, user_id: UserId, capability: Capability) -> bool {
        self.members
            .get(&user_id)
            .is_some_and(|m| m.can(capability))
    }

    /// Require an active member holding `capability`.
    pub fn require(&self, user_id: UserId, capability: Capability) -> GovernanceResult<&VaultMember> {
        let member = self.active_member(user_id)?;
        authorize(&member.grants(), capability)
            .map(|()| member)
            .map_err(|e| GovernanceError::permission_denied(format!("{}: {e}", member.role)))
    }

    pub fn active_members(&self) -> impl Iterator<Item = &VaultMember> {
        self.members.values().filter(|m| m.is_active)
    }

    pub fn active_member_count(&self) -> usize {
        self.active_members().count()
    }

    pub fn is_active_member(&self, user_id: UserId) -> bool {
        self.members.get(&user_id).is_some_and(|m| m.is_active)
    }

    pub fn owner(&self) -> Option<&VaultMember> {
        self.members.values().find(|m| m.is_active_owner())
    }

    pub fn active_owner_count(&self) -> usize {
        self.members.values().filter(|m| m.is_active_owner()).count()
    }

    /// Add (or re-activate) a member. Owners are never added directly.
    pub fn add_member(
        &mut self,
        user_id: UserId,
        role: Role,
        permissions: BTreeSet<Capability>,
        now: DateTime<Utc>,
    ) -> GovernanceResult<VaultMember> {
        if role == Role::Owner {
            return Err(GovernanceError::validation(
                "ownership can only be transferred, not granted",
            ));
        }

        let vault_id = self.vault.id;
        let member = match self.members.get_mut(&user_id) {
            Some(existing) if existing.is_active => {
                return Err(GovernanceError::validation("user is already an active member"));
            }
            Some(existing) => {
                existing.role = role;
                existing.permissions = permissions;
                existing.is_active = true;
                existing.left_at = None;
                existing.joined_at = now;
                existing.clone()
            }
            None => {
                let mut member = VaultMember::new(vault_id, user_id, role, now);
                member.permissions = permissions;
                self.members.insert(user_id, member.clone());
                member
            }
        };

        self.record(GovernanceEvent::MemberJoined {
            vault_id,
            user_id,
            role,
            at: now,
        });
        tracing::info!(%vault_id, %user_id, %role, "member joined");
        Ok(member)
    }

    /// Soft-delete a member (`is_active = false`).
    pub fn remove_member(&mut self, user_id: UserId, now: DateTime<Utc>) -> GovernanceResult<Role> {
        let role = self.get_role(user_id)?;
        if role == Role::Owner {
            return Err(GovernanceError::LastOwnerProtected);
        }

        if let Some(member) = self.members.get_mut(&user_id) {
            member.is_active = false;
            member.left_at = Some(now);
        }

        self.record(GovernanceEvent::MemberRemoved {
            vault_id: self.vault.id,
            user_id,
            at: now,
        });
        tracing::info!(vault_id = %self.vault.id, %user_id, "member removed");
        Ok(role)
    }

    /// Bring a removed member back with the role they held.
    pub(crate) fn reinstate_member(
        &mut self,
        user_id: UserId,
        role: Role,
        now: DateTime<Utc>,
    ) -> GovernanceResult<()> {
        let member = self
            .members
            .get_mut(&user_id)
            .ok_or(GovernanceError::NotAMember)?;
        if member.is_active {
            return Ok(());
        }
        if role == Role::Owner {
            return Err(GovernanceError::validation("cannot reinstate as a second owner"));
        }
        member.is_active = true;
        member.role = role;
        member.left_at = None;

        self.record(GovernanceEvent::MemberJoined {
            vault_id: self.vault.id,
            user_id,
            role,
            at: now,
        });
        Ok(())
    }

    /// Change a non-owner's role; returns the previous role.
    pub fn change_role(
        &mut self,
        user_id: UserId,
        new_role: Role,
        now: DateTime<Utc>,
    ) -> GovernanceResult<Role> {
        let current = self.get_role(user_id)?;
        if current == Role::Owner {
            return Err(GovernanceError::LastOwnerProtected);
        }
        if new_role == Role::Owner {
            return Err(GovernanceError::validation(
                "use a TransferOwnership proposal to change the owner",
            ));
        }

        if let Some(member) = self.members.get_mut(&user_id) {
            member.role = new_role;
        }
        self.record(GovernanceEvent::RoleChanged {
            vault_id: self.vault.id,
            user_id,
            from: current,
            to: new_role,
            at: now,
        });
        Ok(current)
    }

    /// Hand the Owner role to `new_owner`; the outgoing owner takes
    /// `outgoing_role`. Returns `(previous_owner, new_owner's previous role)`.
    pub fn transfer_ownership(
        &mut self,
        new_owner: UserId,
        outgoing_role: Role,
        now: DateTime<Utc>,
    ) -> GovernanceResult<(UserId, Role)> {
        if outgoing_role == Role::Owner {
            return Err(GovernanceError::validation("outgoing owner must take a lesser role"));
        }
        let incoming_previous = self.get_role(new_owner)?;
        if incoming_previous == Role::Owner {
            return Err(GovernanceError::validation("user already owns this vault"));
        }
        let previous_owner = self
            .owner()
            .map(|m| m.user_id)
            .ok_or(GovernanceError::not_found("owner"))?;

        // Demote first, promote second: both happen within this call, so the
        // single-owner invariant holds for every observer.
        if let Some(m) = self.members.get_mut(&previous_owner) {
            m.role = outgoing_role;
        }
        if let Some(m) = self.members.get_mut(&new_owner) {
            m.role = Role::Owner;
        }
        self.vault.owner_id = new_owner;

        self.record(GovernanceEvent::RoleChanged {
            vault_id: self.vault.id,
            user_id: previous_owner,
            from: Role::Owner,
            to: outgoing_role,
            at: now,
        });
        self.record(GovernanceEvent::RoleChanged {
            vault_id: self.vault.id,
            user_id: new_owner,
            from: incoming_previous,
            to: Role::Owner,
            at: now,
        });
        tracing::info!(vault_id = %self.vault.id, from = %previous_owner, to = %new_owner, "ownership transferred");
        Ok((previous_owner, incoming_previous))
    }

    /// Set per-operation caps for a member (`None` = unlimited).
    pub fn set_limits(
        &mut self,
        user_id: UserId,
        contribution_limit: Option<Decimal>,
        withdrawal_limit: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> GovernanceResult<VaultMember> {
        for limit in [contribution_limit, withdrawal_limit].into_iter().flatten() {
            if limit <= Decimal::ZERO {
                return Err(GovernanceError::validation("limits must be positive"));
            }
        }
        self.active_member(user_id)?;

        let member = match self.members.get_mut(&user_id) {
            Some(m) => {
                m.contribution_limit = contribution_limit;
                m.withdrawal_limit = withdrawal_limit;
                m.clone()
            }
            None => return Err(GovernanceError::NotAMember),
        };
        self.record(GovernanceEvent::LimitsChanged {
            vault_id: self.vault.id,
            user_id,
            at: now,
        });
        Ok(member)
    }

    /// Replace the vault's free-text rules; returns the previous text.
    pub fn set_rules(&mut self, rules: String, now: DateTime<Utc>) -> String {
        let previous = std::mem::replace(&mut self.vault.rules, rules);
        self.record(GovernanceEvent::RulesChanged {
            vault_id: self.vault.id,
            at: now,
        });
        previous
    }

    /// Deactivate the vault. Balance-affecting operations fail afterwards.
    pub fn deactivate(&mut self, by: UserId, now: DateTime<Utc>) -> GovernanceResult<()> {
        self.ensure_active()?;
        self.vault.is_active = false;
        self.record(GovernanceEvent::VaultDeactivated {
            vault_id: self.vault.id,
            by,
            at: now,
        });
        tracing::info!(vault_id = %self.vault.id, %by, "vault deactivated");
        Ok(())
    }
}
