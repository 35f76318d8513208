use std::sync::Arc;
use std::thread;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use groupvault_auth::{CallerId, Role};
use groupvault_core::{Amount, GovernanceError, ManualClock, UserId, VaultId};
use groupvault_events::{InMemoryEventBus, VaultEventEnvelope};
use groupvault_governance::GovernanceFacade;
use groupvault_infra::VaultArena;
use groupvault_vault::{
    AppealOutcome, GovernanceEvent, GovernancePolicy, NewVault, ProposalStatus, ProposedAction,
    TransactionStatus, VaultType,
};

type Bus = Arc<InMemoryEventBus<VaultEventEnvelope<GovernanceEvent>>>;
type Facade = GovernanceFacade<Bus, Arc<ManualClock>>;

struct Group {
    facade: Facade,
    clock: Arc<ManualClock>,
    vault_id: VaultId,
    /// owner first, then three members
    people: Vec<CallerId>,
}

fn group_of_four() -> Group {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let facade = GovernanceFacade::with_clock(
        Arc::new(VaultArena::new()),
        Arc::new(InMemoryEventBus::new()),
        clock.clone(),
        GovernancePolicy::default(),
    )
    .unwrap();

    let people: Vec<CallerId> = (0..4).map(|_| CallerId::new(UserId::new())).collect();
    let vault_id = facade
        .create_vault(
            people[0],
            NewVault {
                name: "Household".to_string(),
                description: "shared costs".to_string(),
                vault_type: VaultType::Savings,
                currency: "USD".to_string(),
                target_amount: None,
                is_public: false,
                rules: None,
            },
        )
        .unwrap();
    for p in &people[1..] {
        facade
            .invite_member(people[0], vault_id, p.user_id(), Role::Member)
            .unwrap();
    }
    facade
        .deposit(people[0], vault_id, Amount::new(dec!(500)).unwrap(), None)
        .unwrap();

    Group {
        facade,
        clock,
        vault_id,
        people,
    }
}

fn withdraw_100() -> ProposedAction {
    ProposedAction::Withdraw {
        amount: Amount::new(dec!(100)).unwrap(),
        description: Some("repairs".to_string()),
    }
}

fn balance(g: &Group) -> Decimal {
    g.facade
        .get_vault_details(g.people[0], g.vault_id)
        .unwrap()
        .vault
        .total_balance
}

#[test]
fn withdrawal_by_quorum_then_overturned_on_appeal() {
    let g = group_of_four();
    let [a, b, c, d] = [g.people[0], g.people[1], g.people[2], g.people[3]];

    let p = g.facade.propose_action(a, g.vault_id, withdraw_100()).unwrap();
    g.facade.vote(b, p.id, true).unwrap();
    let p = g.facade.vote(c, p.id, true).unwrap();
    assert_eq!(p.status, ProposalStatus::Executed);
    assert_eq!(balance(&g), dec!(400));

    g.clock.advance(Duration::hours(1));
    let p = g.facade.appeal(d, p.id, "we never agreed".to_string()).unwrap();
    assert_eq!(p.status, ProposalStatus::Appealed);

    g.facade.vote(a, p.id, false).unwrap();
    let p = g.facade.vote(b, p.id, false).unwrap();
    assert_eq!(p.status, ProposalStatus::Rejected);
    assert_eq!(p.appeal.as_ref().unwrap().outcome, Some(AppealOutcome::Overturned));
    assert_eq!(balance(&g), dec!(500));

    let details = g.facade.get_vault_details(a, g.vault_id).unwrap();
    let reversal = details.transactions.last().unwrap();
    assert_eq!(reversal.status, TransactionStatus::Reversed);
}

#[test]
fn the_owner_cannot_be_voted_out() {
    let g = group_of_four();
    let before = g.facade.get_proposals(g.people[1], g.vault_id).unwrap().len();

    assert_eq!(
        g.facade.propose_action(
            g.people[1],
            g.vault_id,
            ProposedAction::RemoveMember {
                member: g.people[0].user_id()
            }
        ),
        Err(GovernanceError::LastOwnerProtected)
    );
    assert_eq!(
        g.facade.get_proposals(g.people[1], g.vault_id).unwrap().len(),
        before
    );
}

#[test]
fn voting_after_expiry_reports_expired() {
    let g = group_of_four();
    let p = g
        .facade
        .propose_action(g.people[0], g.vault_id, withdraw_100())
        .unwrap();

    g.clock.advance(Duration::days(7) + Duration::seconds(1));
    assert_eq!(
        g.facade.vote(g.people[1], p.id, true),
        Err(GovernanceError::ProposalExpired)
    );
    assert_eq!(balance(&g), dec!(500));
}

#[test]
fn appeal_after_the_window_is_refused() {
    let g = group_of_four();
    let p = g
        .facade
        .propose_action(g.people[0], g.vault_id, withdraw_100())
        .unwrap();
    g.facade.vote(g.people[1], p.id, true).unwrap();
    g.facade.vote(g.people[2], p.id, true).unwrap();

    g.clock.advance(Duration::days(3) + Duration::seconds(1));
    assert_eq!(
        g.facade.appeal(g.people[3], p.id, "too late?".to_string()),
        Err(GovernanceError::AppealWindowClosed)
    );
}

#[test]
fn an_overflowing_deposit_fails_alone_and_the_vault_keeps_working() {
    let g = group_of_four();

    assert!(matches!(
        g.facade
            .deposit(g.people[0], g.vault_id, Amount::new(Decimal::MAX).unwrap(), None),
        Err(GovernanceError::LimitExceeded { .. })
    ));
    assert_eq!(balance(&g), dec!(500));

    g.facade
        .deposit(g.people[1], g.vault_id, Amount::new(dec!(5)).unwrap(), None)
        .unwrap();
    assert_eq!(balance(&g), dec!(505));
}

#[test]
fn unknown_proposals_are_not_found() {
    let g = group_of_four();
    assert_eq!(
        g.facade
            .vote(g.people[0], groupvault_core::ProposalId::new(), true),
        Err(GovernanceError::NotFound("proposal"))
    );
}

/// Many threads deposit and withdraw against one vault; the balance must
/// equal the log and never go negative.
#[test]
fn concurrent_ledger_traffic_keeps_the_balance_invariant() {
    let g = Arc::new(group_of_four());
    let owner = g.people[0];
    let admin = UserId::new();
    g.facade
        .invite_member(owner, g.vault_id, admin, Role::Admin)
        .unwrap();
    let admin = CallerId::new(admin);

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let g = g.clone();
            let caller = if i % 2 == 0 { owner } else { admin };
            thread::spawn(move || {
                for n in 0..100 {
                    let amount = Amount::new(Decimal::from(1 + (n % 7))).unwrap();
                    let _ = if (n + i) % 3 == 0 {
                        g.facade.withdraw(caller, g.vault_id, amount, None)
                    } else {
                        g.facade.deposit(caller, g.vault_id, amount, None)
                    };
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    let (balance, from_log) = g
        .facade
        .arena()
        .with_vault(g.vault_id, |s| (s.balance(), s.balance_from_log()))
        .unwrap();
    assert!(balance >= Decimal::ZERO);
    assert_eq!(Some(balance), from_log);
}
