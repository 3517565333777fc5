//! Scoped state subscriptions.
//!
//! A [`Subscription`] releases its host subscription when dropped, so every
//! exit path of a sensor (stop, reload, failed setup) gives it back.

use tracing::debug;

use crate::host::{SharedHost, StateCallback, SubscriptionId};

/// A guard that unsubscribes from the host when dropped.
///
/// # Example
///
/// ```ignore
/// use battery_notes_core::Subscription;
///
/// let subscription = Subscription::subscribe(&host, "sensor.remote_battery", callback);
/// // ... callbacks arrive while `subscription` is alive ...
/// drop(subscription); // no further callbacks
/// ```
pub struct Subscription {
    host: SharedHost,
    entity_id: String,
    id: Option<SubscriptionId>,
}

impl Subscription {
    /// Subscribe to an entity's state changes.
    pub fn subscribe(host: &SharedHost, entity_id: &str, callback: StateCallback) -> Self {
        let id = host.subscribe(entity_id, callback);
        debug!("Subscribed to {} ({:?})", entity_id, id);
        Self {
            host: host.clone(),
            entity_id: entity_id.to_string(),
            id: Some(id),
        }
    }

    /// The entity this subscription watches.
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Returns true until the subscription is released.
    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }

    /// Release the subscription. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(id) = self.id.take() {
            self.host.unsubscribe(id);
            debug!("Unsubscribed from {} ({:?})", self.entity_id, id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("entity_id", &self.entity_id)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mock::MockHost;

    fn noop() -> StateCallback {
        Arc::new(|_| {})
    }

    #[test]
    fn test_drop_unsubscribes() {
        let mock = Arc::new(MockHost::new());
        let host: SharedHost = mock.clone();

        let subscription = Subscription::subscribe(&host, "sensor.a", noop());
        assert_eq!(mock.subscription_count(), 1);
        assert_eq!(subscription.entity_id(), "sensor.a");

        drop(subscription);
        assert_eq!(mock.subscription_count(), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mock = Arc::new(MockHost::new());
        let host: SharedHost = mock.clone();

        let mut subscription = Subscription::subscribe(&host, "sensor.a", noop());
        let _other = Subscription::subscribe(&host, "sensor.a", noop());

        subscription.release();
        subscription.release();
        assert!(!subscription.is_active());
        assert_eq!(mock.subscription_count(), 1);
    }
}
