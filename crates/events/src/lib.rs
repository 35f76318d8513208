//! Governance notification events and the pub/sub mechanics that carry them.
//!
//! Notifications are fire-and-forget: they are published only after the vault
//! mutation they describe has been committed, and a delivery failure never
//! rolls that mutation back.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::VaultEventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
