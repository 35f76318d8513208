use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use groupvault_core::VaultId;

use crate::Event;

/// Envelope for a notification, carrying vault + ordering metadata.
///
/// `sequence_number` is the vault's aggregate version right after the
/// mutation was accepted, so consumers can order a single vault's
/// notifications even if the transport reorders them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEventEnvelope<E> {
    event_id: Uuid,
    vault_id: VaultId,
    sequence_number: u64,
    event_type: String,
    occurred_at: DateTime<Utc>,
    payload: E,
}

impl<E: Event> VaultEventEnvelope<E> {
    pub fn wrap(vault_id: VaultId, sequence_number: u64, payload: E) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            vault_id,
            sequence_number,
            event_type: payload.event_type().to_string(),
            occurred_at: payload.occurred_at(),
            payload,
        }
    }
}

impl<E> VaultEventEnvelope<E> {
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn vault_id(&self) -> VaultId {
        self.vault_id
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

}
