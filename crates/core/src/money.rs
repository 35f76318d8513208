//! Money amounts as value objects.
//!
//! Balances and transaction amounts use `rust_decimal::Decimal` so that fiat
//! and token amounts with many fractional digits stay exact.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{GovernanceError, GovernanceResult};

/// Marker trait for value objects.
///
/// Value objects have no identity: two values with the same attributes are
/// equal and interchangeable. They are immutable; "changing" one means
/// building a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A strictly positive decimal amount.
///
/// Construction is the only validation point, so any `Amount` that exists is
/// safe to credit or debit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl ValueObject for Amount {}

impl Amount {
    pub fn new(value: Decimal) -> GovernanceResult<Self> {
        if value <= Decimal::ZERO {
            return Err(GovernanceError::validation(format!(
                "amount must be positive, got {value}"
            )));
        }
        Ok(Self(value.normalize()))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = GovernanceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
