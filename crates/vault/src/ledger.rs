//! Ledger store: the vault balance and its append-only transaction log.
//!
//! Every balance mutation checks and updates within the same `&mut self`
//! borrow, which the infrastructure layer only hands out under the vault's
//! exclusive lock. That makes check-then-act atomic per vault.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use groupvault_core::{Amount, GovernanceError, GovernanceResult, TransactionId, UserId};

use crate::events::GovernanceEvent;
use crate::member::VaultMember;
use crate::state::VaultState;
use crate::transaction::{TransactionStatus, TransactionType, VaultTransaction};

impl VaultState {
    pub fn balance(&self) -> Decimal {
        self.vault.total_balance
    }

    /// Recompute the balance from the transaction log, `None` if the sum
    /// does not fit in a `Decimal`.
    pub fn balance_from_log(&self) -> Option<Decimal> {
        self.transactions
            .iter()
            .map(VaultTransaction::signed_amount)
            .try_fold(Decimal::ZERO, Decimal::checked_add)
    }

    /// Credit the vault.
    ///
    /// Fails with `VaultInactive`, `NotAMember`, or `LimitExceeded` when the
    /// amount is above the member's contribution cap. The only bound on the
    /// total balance is what a `Decimal` can represent.
    pub fn deposit(
        &mut self,
        user_id: UserId,
        amount: Amount,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> GovernanceResult<VaultTransaction> {
        self.ensure_active()?;
        let member = self.active_member(user_id)?;
        check_limit(member.contribution_limit, amount)?;

        self.vault.total_balance = self.credited(amount)?;
        let tx = self.append_transaction(
            user_id,
            TransactionType::Deposit,
            amount,
            TransactionStatus::Completed,
            description.unwrap_or_else(|| "deposit".to_string()),
            None,
            now,
        );
        self.record(GovernanceEvent::FundsDeposited {
            vault_id: self.vault.id,
            transaction_id: tx.id,
            user_id,
            amount,
            at: now,
        });

        tracing::info!(vault_id = %self.vault.id, %user_id, %amount, "deposit completed");
        Ok(tx)
    }

    /// Debit the vault.
    ///
    /// Fails with `InsufficientFunds` when the amount exceeds the balance and
    /// `LimitExceeded` when it exceeds the initiator's withdrawal cap. The
    /// caller is responsible for capability checks.
    pub fn withdraw(
        &mut self,
        user_id: UserId,
        amount: Amount,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> GovernanceResult<VaultTransaction> {
        self.ensure_active()?;
        let member = self.active_member(user_id)?;
        let limit = member.withdrawal_limit;

        if amount.value() > self.vault.total_balance {
            return Err(GovernanceError::InsufficientFunds {
                requested: amount.value(),
                available: self.vault.total_balance,
            });
        }
        check_limit(limit, amount)?;

        self.vault.total_balance = self
            .vault
            .total_balance
            .checked_sub(amount.value())
            .ok_or_else(|| GovernanceError::validation("balance underflow"))?;
        let tx = self.append_transaction(
            user_id,
            TransactionType::Withdrawal,
            amount,
            TransactionStatus::Completed,
            description.unwrap_or_else(|| "withdrawal".to_string()),
            None,
            now,
        );
        self.record(GovernanceEvent::FundsWithdrawn {
            vault_id: self.vault.id,
            transaction_id: tx.id,
            user_id,
            amount,
            at: now,
        });

        tracing::info!(vault_id = %self.vault.id, %user_id, %amount, "withdrawal completed");
        Ok(tx)
    }

    /// Log a withdrawal that was approved but could not settle.
    pub(crate) fn record_failed_withdrawal(
        &mut self,
        user_id: UserId,
        amount: Amount,
        reason: &GovernanceError,
        now: DateTime<Utc>,
    ) -> VaultTransaction {
        let tx = self.append_transaction(
            user_id,
            TransactionType::Withdrawal,
            amount,
            TransactionStatus::Failed,
            format!("withdrawal failed: {reason}"),
            None,
            now,
        );
        self.record(GovernanceEvent::WithdrawalFailed {
            vault_id: self.vault.id,
            transaction_id: tx.id,
            user_id,
            amount,
            at: now,
        });
        tx
    }

    /// Append a compensating credit for a completed withdrawal.
    ///
    /// The original entry is left untouched. Limits and the vault's active
    /// flag do not apply: this restores funds, it does not contribute them.
    pub(crate) fn reverse_withdrawal(
        &mut self,
        original: TransactionId,
        now: DateTime<Utc>,
    ) -> GovernanceResult<VaultTransaction> {
        let source = self
            .transactions
            .iter()
            .find(|t| t.id == original)
            .ok_or(GovernanceError::not_found("transaction"))?;

        if source.tx_type != TransactionType::Withdrawal
            || source.status != TransactionStatus::Completed
        {
            return Err(GovernanceError::validation(
                "only completed withdrawals can be reversed",
            ));
        }
        if self.transactions.iter().any(|t| t.reverses == Some(original)) {
            return Err(GovernanceError::validation("transaction already reversed"));
        }

        let (user_id, amount) = (source.user_id, source.amount);

        self.vault.total_balance = self.credited(amount)?;
        let tx = self.append_transaction(
            user_id,
            TransactionType::Deposit,
            amount,
            TransactionStatus::Reversed,
            format!("reversal of {original}"),
            Some(original),
            now,
        );
        self.record(GovernanceEvent::FundsReversed {
            vault_id: self.vault.id,
            transaction_id: tx.id,
            reverses: original,
            amount,
            at: now,
        });

        tracing::info!(vault_id = %self.vault.id, %original, %amount, "withdrawal reversed");
        Ok(tx)
    }

    pub fn ensure_active(&self) -> GovernanceResult<()> {
        if self.vault.is_active {
            Ok(())
        } else {
            Err(GovernanceError::VaultInactive)
        }
    }

    pub fn active_member(&self, user_id: UserId) -> GovernanceResult<&VaultMember> {
        self.members
            .get(&user_id)
            .filter(|m| m.is_active)
            .ok_or(GovernanceError::NotAMember)
    }

    /// Balance after crediting `amount`, computed before anything is touched.
    fn credited(&self, amount: Amount) -> GovernanceResult<Decimal> {
        let balance = self.vault.total_balance;
        balance
            .checked_add(amount.value())
            .ok_or(GovernanceError::LimitExceeded {
                requested: amount.value(),
                limit: Decimal::MAX - balance,
            })
    }

    #[allow(clippy::too_many_arguments)]
    fn append_transaction(
        &mut self,
        user_id: UserId,
        tx_type: TransactionType,
        amount: Amount,
        status: TransactionStatus,
        description: String,
        reverses: Option<TransactionId>,
        now: DateTime<Utc>,
    ) -> VaultTransaction {
        let tx = VaultTransaction {
            id: TransactionId::new(),
            vault_id: self.vault.id,
            user_id,
            tx_type,
            amount,
            currency: self.vault.currency.clone(),
            status,
            description,
            timestamp: now,
            reverses,
        };
        self.transactions.push(tx.clone());
        tx
    }
}

fn check_limit(limit: Option<Decimal>, amount: Amount) -> GovernanceResult<()> {
    match limit {
        Some(limit) if amount.value() > limit => Err(GovernanceError::LimitExceeded {
            requested: amount.value(),
            limit,
        }),
        _ => Ok(()),
    }
}
