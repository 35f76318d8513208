use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rust_decimal_macros::dec;

use groupvault_auth::Role;
use groupvault_core::{Amount, UserId, VaultId};
use groupvault_infra::VaultArena;
use groupvault_vault::{NewVault, VaultState, VaultType};

fn seeded_arena(vaults: usize) -> (Arc<VaultArena>, Vec<(VaultId, UserId)>) {
    let arena = Arc::new(VaultArena::new());
    let mut ids = Vec::with_capacity(vaults);
    for i in 0..vaults {
        let owner = UserId::new();
        let mut state = VaultState::create(
            NewVault {
                name: format!("bench-{i}"),
                description: String::new(),
                vault_type: VaultType::Savings,
                currency: "USD".to_string(),
                target_amount: None,
                is_public: false,
                rules: None,
            },
            owner,
            Utc::now(),
        )
        .unwrap();
        state
            .add_member(UserId::new(), Role::Member, BTreeSet::new(), Utc::now())
            .unwrap();
        let id = arena.insert(state).unwrap();
        ids.push((id, owner));
    }
    (arena, ids)
}

/// Single-threaded deposit/withdraw pairs against one vault.
fn bench_single_vault(c: &mut Criterion) {
    let (arena, ids) = seeded_arena(1);
    let (vault_id, owner) = ids[0];
    let amount = Amount::new(dec!(10)).unwrap();

    let mut group = c.benchmark_group("ledger_single_vault");
    group.throughput(Throughput::Elements(2));
    group.bench_function("deposit_withdraw", |b| {
        b.iter(|| {
            black_box(
                arena
                    .with_vault_mut(vault_id, |s| {
                        s.deposit(owner, amount, None, Utc::now())?;
                        s.withdraw(owner, amount, None, Utc::now())
                    })
                    .unwrap(),
            );
        })
    });
    group.finish();
}

/// Many threads, each hammering its own vault: measures lock isolation.
fn bench_parallel_vaults(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_parallel_vaults");
    for threads in [1usize, 4, 8] {
        let (arena, ids) = seeded_arena(threads);
        group.throughput(Throughput::Elements((threads * 100) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, _| {
            b.iter(|| {
                let workers: Vec<_> = ids
                    .iter()
                    .map(|(vault_id, owner)| {
                        let (arena, vault_id, owner) = (arena.clone(), *vault_id, *owner);
                        thread::spawn(move || {
                            let amount = Amount::new(dec!(1)).unwrap();
                            for _ in 0..100 {
                                let _ = arena.with_vault_mut(vault_id, |s| {
                                    s.deposit(owner, amount, None, Utc::now())
                                });
                            }
                        })
                    })
                    .collect();
                for w in workers {
                    w.join().unwrap();
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single_vault, bench_parallel_vaults);
criterion_main!(benches);
