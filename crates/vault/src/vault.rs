use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use groupvault_core::{Entity, GovernanceError, GovernanceResult, UserId, VaultId};

/// Purpose of a vault (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultType {
    Savings,
    Investment,
    Business,
    Travel,
    Emergency,
    Education,
    Charity,
    Custom,
}

impl VaultType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "savings" => Some(VaultType::Savings),
            "investment" => Some(VaultType::Investment),
            "business" => Some(VaultType::Business),
            "travel" => Some(VaultType::Travel),
            "emergency" => Some(VaultType::Emergency),
            "education" => Some(VaultType::Education),
            "charity" => Some(VaultType::Charity),
            "custom" => Some(VaultType::Custom),
            _ => None,
        }
    }
}

/// A jointly custodied pool of funds.
///
/// `total_balance` is only ever changed by the ledger operations in
/// [`crate::ledger`]; it always equals the signed sum of the vault's
/// balance-affecting transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVault {
    pub id: VaultId,
    pub name: String,
    pub description: String,
    pub vault_type: VaultType,
    pub currency: String,
    pub total_balance: Decimal,
    pub target_amount: Option<Decimal>,
    pub is_public: bool,
    pub is_active: bool,
    pub rules: String,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for GroupVault {
    type Id = VaultId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl GroupVault {
    /// Progress towards `target_amount`, as a fraction (may exceed 1).
    /// `None` without a target or when the ratio is not representable.
    pub fn progress(&self) -> Option<Decimal> {
        self.target_amount
            .filter(|t| *t > Decimal::ZERO)
            .and_then(|t| self.total_balance.checked_div(t))
    }
}

/// Input for vault creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVault {
    pub name: String,
    pub description: String,
    pub vault_type: VaultType,
    pub currency: String,
    pub target_amount: Option<Decimal>,
    pub is_public: bool,
    pub rules: Option<String>,
}

impl NewVault {
    pub fn validate(&self) -> GovernanceResult<()> {
        if self.name.trim().is_empty() {
            return Err(GovernanceError::validation("name cannot be empty"));
        }

        let currency = self.currency.trim();
        let well_formed = (3..=10).contains(&currency.len())
            && currency
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if !well_formed {
            return Err(GovernanceError::validation(format!(
                "currency must be 3-10 uppercase alphanumerics, got '{}'",
                self.currency
            )));
        }

        if let Some(target) = self.target_amount {
            if target <= Decimal::ZERO {
                return Err(GovernanceError::validation("target amount must be positive"));
            }
        }

        Ok(())
    }

    pub(crate) fn into_vault(self, id: VaultId, owner_id: UserId, now: DateTime<Utc>) -> GroupVault {
        GroupVault {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            vault_type: self.vault_type,
            currency: self.currency.trim().to_string(),
            total_balance: Decimal::ZERO,
            target_amount: self.target_amount,
            is_public: self.is_public,
            is_active: true,
            rules: self.rules.unwrap_or_default(),
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }
}
