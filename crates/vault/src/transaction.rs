use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use groupvault_core::{Amount, Entity, TransactionId, UserId, VaultId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    /// A compensating entry that undoes an earlier completed transaction.
    Reversed,
}

/// One entry of a vault's append-only transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultTransaction {
    pub id: TransactionId,
    pub vault_id: VaultId,
    /// Initiator.
    pub user_id: UserId,
    pub tx_type: TransactionType,
    pub amount: Amount,
    pub currency: String,
    pub status: TransactionStatus,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    /// The transaction this entry compensates, for `Reversed` entries.
    pub reverses: Option<TransactionId>,
}

impl Entity for VaultTransaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl VaultTransaction {
    /// Whether this entry moved money (failed/pending entries did not).
    pub fn affects_balance(&self) -> bool {
        matches!(
            self.status,
            TransactionStatus::Completed | TransactionStatus::Reversed
        )
    }

    /// Signed effect on the vault balance.
    pub fn signed_amount(&self) -> Decimal {
        if !self.affects_balance() {
            return Decimal::ZERO;
        }
        match self.tx_type {
            TransactionType::Deposit => self.amount.value(),
            TransactionType::Withdrawal => -self.amount.value(),
        }
    }
}
