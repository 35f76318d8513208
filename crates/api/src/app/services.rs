use std::sync::Arc;

use groupvault_core::GovernanceResult;
use groupvault_events::{Event, EventBus, InMemoryEventBus, Subscription, VaultEventEnvelope};
use groupvault_governance::GovernanceFacade;
use groupvault_infra::VaultArena;
use groupvault_vault::{GovernanceEvent, GovernancePolicy};

pub type NotificationEnvelope = VaultEventEnvelope<GovernanceEvent>;
pub type NotificationBus = Arc<InMemoryEventBus<NotificationEnvelope>>;

/// Shared state behind every handler.
pub struct AppServices {
    pub facade: GovernanceFacade<NotificationBus>,
}

impl AppServices {
    pub fn new(policy: GovernancePolicy) -> GovernanceResult<Self> {
        let bus: NotificationBus = Arc::new(InMemoryEventBus::new());
        spawn_notification_logger(bus.subscribe());

        let facade = GovernanceFacade::new(Arc::new(VaultArena::new()), bus, policy)?;
        Ok(Self { facade })
    }
}

/// Drain notifications on a plain thread; it ends once the bus is dropped.
fn spawn_notification_logger(subscription: Subscription<NotificationEnvelope>) {
    std::thread::spawn(move || {
        while let Ok(envelope) = subscription.recv() {
            if envelope.payload().matches("vault.proposal") {
                tracing::info!(
                    event_id = %envelope.event_id(),
                    vault_id = %envelope.vault_id(),
                    sequence = envelope.sequence_number(),
                    event_type = envelope.event_type(),
                    "proposal notification"
                );
            } else {
                tracing::debug!(
                    vault_id = %envelope.vault_id(),
                    sequence = envelope.sequence_number(),
                    event_type = envelope.event_type(),
                    "notification"
                );
            }
        }
        tracing::debug!("notification stream closed");
    });
}
