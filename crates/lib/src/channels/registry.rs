//! Process-local publish/subscribe channel: receivers register for an action and get every event
//! sent with that action. Never crosses the process boundary.

use std::sync::{Arc, PoisonError, RwLock};

use super::inbound::LocalEvent;

/// Subscriber on the local channel.
pub trait LocalReceiver: Send + Sync {
    fn on_receive(&self, event: &LocalEvent);
}

/// Id of a channel subscription, returned by `LocalChannel::register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(uuid::Uuid);

struct Subscription {
    id: SubscriptionId,
    action: String,
    receiver: Arc<dyn LocalReceiver>,
}

/// Action-scoped subscriber list. Shared between the delivery router and UI surfaces.
#[derive(Default)]
pub struct LocalChannel {
    inner: RwLock<Vec<Subscription>>,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        action: impl Into<String>,
        receiver: Arc<dyn LocalReceiver>,
    ) -> SubscriptionId {
        let id = SubscriptionId(uuid::Uuid::new_v4());
        // A panicked writer cannot leave the list half-updated; keep using it.
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscription {
                id,
                action: action.into(),
                receiver,
            });
        id
    }

    /// Drop a subscription. Unknown or already-removed ids return false.
    pub fn unregister(&self, id: SubscriptionId) -> bool {
        let mut g = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = g.len();
        g.retain(|s| s.id != id);
        before != g.len()
    }

    pub fn subscriber_count(&self, action: &str) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.action == action)
            .count()
    }

    /// Send `event` to every receiver registered for its action. Returns true if at least one
    /// receiver got it. Receivers run after the lock is released, so they may (un)register.
    pub fn send(&self, event: &LocalEvent) -> bool {
        let targets: Vec<Arc<dyn LocalReceiver>> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.action == event.action)
            .map(|s| Arc::clone(&s.receiver))
            .collect();
        for receiver in &targets {
            receiver.on_receive(event);
        }
        !targets.is_empty()
    }
}
