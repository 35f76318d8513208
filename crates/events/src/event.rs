use chrono::{DateTime, Utc};

/// A notification payload.
///
/// Notifications are facts about mutations that have already been committed
/// to a vault; consumers never see an event for a rejected operation.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name, most general segment first (e.g. "vault.proposal.created").
    fn event_type(&self) -> &'static str;

    /// Business time of the mutation.
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Whether `prefix` names this event or one of its parent groups.
    fn matches(&self, prefix: &str) -> bool {
        let ty = self.event_type();
        ty == prefix
            || (ty.starts_with(prefix) && ty.as_bytes().get(prefix.len()) == Some(&b'.'))
    }
}
