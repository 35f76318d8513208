use std::collections::BTreeSet;
use std::sync::Arc;

use rust_decimal::Decimal;

use groupvault_auth::{
    AuthorizationExplanation, CallerId, Capability, Role, explain_authorization,
};
use groupvault_core::{
    Amount, Clock, GovernanceError, GovernanceResult, ProposalId, SystemClock, UserId, VaultId,
};
use groupvault_events::{EventBus, VaultEventEnvelope};
use groupvault_infra::VaultArena;
use groupvault_vault::{
    GovernanceEvent, GovernancePolicy, NewVault, ProposedAction, VaultActionProposal, VaultMember,
    VaultState, VaultTransaction,
};

use crate::views::{InviteOutcome, VaultDetails, VaultSummary};

/// Bus carrying governance notifications.
pub trait NotificationBus: EventBus<VaultEventEnvelope<GovernanceEvent>> {}

impl<B> NotificationBus for B where B: EventBus<VaultEventEnvelope<GovernanceEvent>> {}

/// Entry point for every governance operation.
///
/// Operations are atomic per vault: each runs entirely under that vault's
/// write lock. Notification delivery happens afterwards and never rolls a
/// mutation back.
#[derive(Debug)]
pub struct GovernanceFacade<B, C = SystemClock> {
    arena: Arc<VaultArena>,
    bus: B,
    clock: C,
    policy: GovernancePolicy,
}

impl<B: NotificationBus> GovernanceFacade<B, SystemClock> {
    pub fn new(arena: Arc<VaultArena>, bus: B, policy: GovernancePolicy) -> GovernanceResult<Self> {
        Self::with_clock(arena, bus, SystemClock, policy)
    }
}

impl<B, C> GovernanceFacade<B, C>
where
    B: NotificationBus,
    C: Clock,
{
    pub fn with_clock(
        arena: Arc<VaultArena>,
        bus: B,
        clock: C,
        policy: GovernancePolicy,
    ) -> GovernanceResult<Self> {
        policy.validate()?;
        Ok(Self {
            arena,
            bus,
            clock,
            policy,
        })
    }

    pub fn arena(&self) -> &Arc<VaultArena> {
        &self.arena
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn policy(&self) -> &GovernancePolicy {
        &self.policy
    }

    /// Create a vault owned by the caller.
    pub fn create_vault(&self, caller: CallerId, new: NewVault) -> GovernanceResult<VaultId> {
        let mut state = VaultState::create(new, caller.user_id(), self.clock.now())?;
        let events = state.take_events();
        let vault_id = self.arena.insert(state)?;
        self.publish(vault_id, events);

        tracing::info!(%vault_id, owner = %caller, "vault created");
        Ok(vault_id)
    }

    pub fn deposit(
        &self,
        caller: CallerId,
        vault_id: VaultId,
        amount: Amount,
        description: Option<String>,
    ) -> GovernanceResult<VaultTransaction> {
        let now = self.clock.now();
        self.mutate(vault_id, |s| {
            s.ensure_active()?;
            s.require(caller.user_id(), Capability::CanDeposit)?;
            s.deposit(caller.user_id(), amount, description, now)
        })
    }

    /// Direct withdrawal by a member holding `CanWithdraw`, within their cap.
    pub fn withdraw(
        &self,
        caller: CallerId,
        vault_id: VaultId,
        amount: Amount,
        description: Option<String>,
    ) -> GovernanceResult<VaultTransaction> {
        let now = self.clock.now();
        self.mutate(vault_id, |s| {
            s.ensure_active()?;
            s.require(caller.user_id(), Capability::CanWithdraw)?;
            s.withdraw(caller.user_id(), amount, description, now)
        })
    }

    /// Add a member directly when unilateral invites are enabled and the
    /// caller holds `CanInvite`; otherwise open an `InviteMember` proposal.
    pub fn invite_member(
        &self,
        caller: CallerId,
        vault_id: VaultId,
        user_id: UserId,
        role: Role,
    ) -> GovernanceResult<InviteOutcome> {
        let now = self.clock.now();
        let policy = &self.policy;
        self.mutate(vault_id, |s| {
            s.ensure_active()?;
            s.active_member(caller.user_id())?;

            if policy.unilateral_invites && s.has_permission(caller.user_id(), Capability::CanInvite) {
                let member = s.add_member(user_id, role, BTreeSet::new(), now)?;
                Ok(InviteOutcome::Added { member })
            } else {
                let proposal = s.propose(
                    caller.user_id(),
                    ProposedAction::InviteMember { user_id, role },
                    policy,
                    now,
                )?;
                Ok(InviteOutcome::Proposed { proposal })
            }
        })
    }

    pub fn propose_action(
        &self,
        caller: CallerId,
        vault_id: VaultId,
        action: ProposedAction,
    ) -> GovernanceResult<VaultActionProposal> {
        let now = self.clock.now();
        let policy = &self.policy;
        self.mutate(vault_id, |s| s.propose(caller.user_id(), action, policy, now))
    }

    pub fn vote(
        &self,
        caller: CallerId,
        proposal_id: ProposalId,
        approve: bool,
    ) -> GovernanceResult<VaultActionProposal> {
        let vault_id = self.arena.vault_of(proposal_id)?;
        let now = self.clock.now();
        let policy = &self.policy;
        self.mutate(vault_id, |s| {
            s.vote(proposal_id, caller.user_id(), approve, policy, now)
        })
    }

    pub fn appeal(
        &self,
        caller: CallerId,
        proposal_id: ProposalId,
        reason: String,
    ) -> GovernanceResult<VaultActionProposal> {
        let vault_id = self.arena.vault_of(proposal_id)?;
        let now = self.clock.now();
        let policy = &self.policy;
        self.mutate(vault_id, |s| {
            s.appeal(proposal_id, caller.user_id(), reason, policy, now)
        })
    }

    /// Vault, members and transaction log. Public vaults are readable by any
    /// caller; private ones only by current or former members.
    pub fn get_vault_details(&self, caller: CallerId, vault_id: VaultId) -> GovernanceResult<VaultDetails> {
        self.arena.with_vault(vault_id, |s| {
            ensure_can_read(s, caller)?;
            Ok(VaultDetails::of(s))
        })?
    }

    /// All proposals of a vault, with due expiries applied first.
    pub fn get_proposals(
        &self,
        caller: CallerId,
        vault_id: VaultId,
    ) -> GovernanceResult<Vec<VaultActionProposal>> {
        let now = self.clock.now();
        let policy = &self.policy;
        self.mutate(vault_id, |s| {
            ensure_can_read(s, caller)?;
            s.refresh_all(policy, now)?;
            Ok(s.proposals().cloned().collect())
        })
    }

    /// Vaults in which the caller is an active member.
    pub fn list_vaults(&self, caller: CallerId) -> GovernanceResult<Vec<VaultSummary>> {
        let mut out = Vec::new();
        for vault_id in self.arena.vault_ids()? {
            let summary = self.arena.with_vault(vault_id, |s| {
                s.is_active_member(caller.user_id())
                    .then(|| VaultSummary::of(s))
            })?;
            out.extend(summary);
        }
        Ok(out)
    }

    /// Why `user_id` does or does not hold `capability` in this vault.
    pub fn explain_permission(
        &self,
        caller: CallerId,
        vault_id: VaultId,
        user_id: UserId,
        capability: Capability,
    ) -> GovernanceResult<AuthorizationExplanation> {
        self.arena.with_vault(vault_id, |s| {
            ensure_can_read(s, caller)?;
            let member = s.member(user_id).ok_or(GovernanceError::NotAMember)?;
            Ok(explain_authorization(&member.grants(), capability))
        })?
    }

    pub fn deactivate_vault(&self, caller: CallerId, vault_id: VaultId) -> GovernanceResult<()> {
        let now = self.clock.now();
        self.mutate(vault_id, |s| {
            s.require(caller.user_id(), Capability::CanDeleteVault)?;
            s.deactivate(caller.user_id(), now)
        })
    }

    /// Set a member's per-operation caps. Only the owner may cap the owner.
    pub fn set_member_limits(
        &self,
        caller: CallerId,
        vault_id: VaultId,
        user_id: UserId,
        contribution_limit: Option<Decimal>,
        withdrawal_limit: Option<Decimal>,
    ) -> GovernanceResult<VaultMember> {
        let now = self.clock.now();
        self.mutate(vault_id, |s| {
            let acting = s.require(caller.user_id(), Capability::CanManageMembers)?.role;
            if s.get_role(user_id)? == Role::Owner && acting != Role::Owner {
                return Err(GovernanceError::permission_denied(
                    "only the owner may change the owner's limits",
                ));
            }
            s.set_limits(user_id, contribution_limit, withdrawal_limit, now)
        })
    }

    fn mutate<R>(
        &self,
        vault_id: VaultId,
        f: impl FnOnce(&mut VaultState) -> GovernanceResult<R>,
    ) -> GovernanceResult<R> {
        let committed = self.arena.with_vault_mut(vault_id, f)?;
        // The vault lock is released here; delivery happens outside it.
        self.publish(committed.vault_id, committed.events);
        committed.outcome
    }

    fn publish(&self, vault_id: VaultId, events: Vec<(u64, GovernanceEvent)>) {
        for (sequence, event) in events {
            let envelope = VaultEventEnvelope::wrap(vault_id, sequence, event);
            let event_type = envelope.event_type().to_string();
            if let Err(err) = self.bus.publish(envelope) {
                tracing::warn!(%vault_id, sequence, %event_type, error = ?err, "notification delivery failed");
            }
        }
    }
}

fn ensure_can_read(state: &VaultState, caller: CallerId) -> GovernanceResult<()> {
    if state.vault().is_public || state.member(caller.user_id()).is_some() {
        Ok(())
    } else {
        Err(GovernanceError::NotAMember)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use groupvault_core::ManualClock;
    use groupvault_events::InMemoryEventBus;
    use groupvault_vault::{ProposalStatus, VaultType};
    use rust_decimal_macros::dec;

    type Bus = Arc<InMemoryEventBus<VaultEventEnvelope<GovernanceEvent>>>;

    fn facade() -> (GovernanceFacade<Bus, Arc<ManualClock>>, Bus, Arc<ManualClock>) {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let facade = GovernanceFacade::with_clock(
            Arc::new(VaultArena::new()),
            bus.clone(),
            clock.clone(),
            GovernancePolicy::default(),
        )
        .unwrap();
        (facade, bus, clock)
    }

    fn new_vault() -> NewVault {
        NewVault {
            name: "Rent".to_string(),
            description: "flat 4".to_string(),
            vault_type: VaultType::Savings,
            currency: "USD".to_string(),
            target_amount: Some(dec!(1200)),
            is_public: false,
            rules: None,
        }
    }

    fn amount(v: Decimal) -> Amount {
        Amount::new(v).unwrap()
    }

    #[test]
    fn owner_invites_directly_and_members_propose() {
        let (facade, _bus, _clock) = facade();
        let owner = CallerId::new(UserId::new());
        let vault_id = facade.create_vault(owner, new_vault()).unwrap();

        let alice = UserId::new();
        let outcome = facade
            .invite_member(owner, vault_id, alice, Role::Member)
            .unwrap();
        assert!(matches!(outcome, InviteOutcome::Added { .. }));

        let outcome = facade
            .invite_member(CallerId::new(alice), vault_id, UserId::new(), Role::Member)
            .unwrap();
        match outcome {
            InviteOutcome::Proposed { proposal } => {
                assert_eq!(proposal.status, ProposalStatus::Pending)
            }
            other => panic!("expected a proposal, got {other:?}"),
        }
    }

    #[test]
    fn members_cannot_withdraw_directly() {
        let (facade, _bus, _clock) = facade();
        let owner = CallerId::new(UserId::new());
        let vault_id = facade.create_vault(owner, new_vault()).unwrap();
        let member = UserId::new();
        facade.invite_member(owner, vault_id, member, Role::Member).unwrap();
        facade
            .deposit(CallerId::new(member), vault_id, amount(dec!(50)), None)
            .unwrap();

        assert!(matches!(
            facade.withdraw(CallerId::new(member), vault_id, amount(dec!(10)), None),
            Err(GovernanceError::PermissionDenied(_))
        ));
        facade.withdraw(owner, vault_id, amount(dec!(10)), None).unwrap();
    }

    #[test]
    fn mutations_publish_sequenced_notifications() {
        let (facade, bus, _clock) = facade();
        let sub = bus.subscribe();
        let owner = CallerId::new(UserId::new());
        let vault_id = facade.create_vault(owner, new_vault()).unwrap();
        facade.deposit(owner, vault_id, amount(dec!(5)), None).unwrap();

        let received = sub.drain();
        let types: Vec<&str> = received.iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["vault.created", "vault.ledger.deposited"]);
        assert_eq!(received[1].sequence_number(), 2);
        assert!(received.iter().all(|e| e.vault_id() == vault_id));
    }

    #[test]
    fn closed_bus_never_rolls_back_a_mutation() {
        let (facade, bus, _clock) = facade();
        let owner = CallerId::new(UserId::new());
        let vault_id = facade.create_vault(owner, new_vault()).unwrap();

        bus.close();
        facade.deposit(owner, vault_id, amount(dec!(42)), None).unwrap();

        let details = facade.get_vault_details(owner, vault_id).unwrap();
        assert_eq!(details.vault.total_balance, dec!(42));
        assert_eq!(details.transactions.len(), 1);
    }

    #[test]
    fn get_proposals_applies_expiry() {
        let (facade, _bus, clock) = facade();
        let owner = CallerId::new(UserId::new());
        let vault_id = facade.create_vault(owner, new_vault()).unwrap();
        facade
            .invite_member(owner, vault_id, UserId::new(), Role::Member)
            .unwrap();
        let p = facade
            .propose_action(
                owner,
                vault_id,
                ProposedAction::EditRules {
                    rules: "pay by the 5th".to_string(),
                },
            )
            .unwrap();

        clock.advance(Duration::days(8));
        let proposals = facade.get_proposals(owner, vault_id).unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].id, p.id);
        assert_eq!(proposals[0].status, ProposalStatus::Expired);
    }

    #[test]
    fn private_vaults_are_hidden_from_strangers() {
        let (facade, _bus, _clock) = facade();
        let owner = CallerId::new(UserId::new());
        let vault_id = facade.create_vault(owner, new_vault()).unwrap();
        let stranger = CallerId::new(UserId::new());

        assert_eq!(
            facade.get_vault_details(stranger, vault_id),
            Err(GovernanceError::NotAMember)
        );
        assert!(facade.list_vaults(stranger).unwrap().is_empty());
        assert_eq!(facade.list_vaults(owner).unwrap().len(), 1);
    }

    #[test]
    fn admins_cannot_cap_the_owner() {
        let (facade, _bus, _clock) = facade();
        let owner = CallerId::new(UserId::new());
        let vault_id = facade.create_vault(owner, new_vault()).unwrap();
        let admin = UserId::new();
        facade.invite_member(owner, vault_id, admin, Role::Admin).unwrap();

        assert!(matches!(
            facade.set_member_limits(
                CallerId::new(admin),
                vault_id,
                owner.user_id(),
                Some(dec!(10)),
                None
            ),
            Err(GovernanceError::PermissionDenied(_))
        ));
        let m = facade
            .set_member_limits(owner, vault_id, admin, None, Some(dec!(100)))
            .unwrap();
        assert_eq!(m.withdrawal_limit, Some(dec!(100)));

        let why = facade
            .explain_permission(owner, vault_id, admin, Capability::CanDeleteVault)
            .unwrap();
        assert!(!why.granted);
        assert_eq!(why.role, Role::Admin);
    }

    #[test]
    fn deactivated_vaults_refuse_deposits() {
        let (facade, _bus, _clock) = facade();
        let owner = CallerId::new(UserId::new());
        let vault_id = facade.create_vault(owner, new_vault()).unwrap();
        facade.deactivate_vault(owner, vault_id).unwrap();

        assert_eq!(
            facade.deposit(owner, vault_id, amount(dec!(1)), None),
            Err(GovernanceError::VaultInactive)
        );
        assert_eq!(
            facade.withdraw(owner, vault_id, amount(dec!(1)), None),
            Err(GovernanceError::VaultInactive)
        );
        assert_eq!(
            facade.propose_action(
                owner,
                vault_id,
                ProposedAction::EditRules {
                    rules: "closed".to_string()
                }
            ),
            Err(GovernanceError::VaultInactive)
        );
        assert!(facade.get_vault_details(owner, vault_id).is_ok());
    }

    #[test]
    fn tiny_targets_do_not_break_the_vault_list() {
        let (facade, _bus, _clock) = facade();
        let owner = CallerId::new(UserId::new());
        let vault_id = facade
            .create_vault(
                owner,
                NewVault {
                    target_amount: Some(Decimal::new(1, 28)),
                    ..new_vault()
                },
            )
            .unwrap();
        facade
            .deposit(owner, vault_id, amount(dec!(1000)), None)
            .unwrap();

        let list = facade.list_vaults(owner).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].progress, None);
    }
}
