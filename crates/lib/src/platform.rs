//! Host-platform side: the raw broadcast event and the system-wide receiver registrations.
//!
//! `SystemBroadcasts` stands in for the platform's broadcast dispatch. Registrations here live for
//! the whole visible lifetime of the process and are independent of the in-process channel.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::sms::MessageSegment;

/// Action the platform uses for an incoming SMS.
pub const SMS_RECEIVED_ACTION: &str = "android.provider.Telephony.SMS_RECEIVED";
/// Extras key holding the array of raw PDUs.
pub const EXTRA_PDUS: &str = "pdus";
/// Extras key holding the PDU format tag ("3gpp" / "3gpp2").
pub const EXTRA_FORMAT: &str = "format";

/// A value stored under an extras key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraValue {
    Segments(Vec<MessageSegment>),
    Text(String),
}

/// Keyed payload carried by a raw event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extras {
    values: BTreeMap<String, ExtraValue>,
}

impl Extras {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, value: ExtraValue) -> &mut Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Segments under `key`; None when absent or stored with another type.
    pub fn segments(&self, key: &str) -> Option<&[MessageSegment]> {
        match self.values.get(key)? {
            ExtraValue::Segments(s) => Some(s.as_slice()),
            ExtraValue::Text(_) => None,
        }
    }

    /// String under `key`; None when absent or stored with another type.
    pub fn string(&self, key: &str) -> Option<&str> {
        match self.values.get(key)? {
            ExtraValue::Text(s) => Some(s.as_str()),
            ExtraValue::Segments(_) => None,
        }
    }
}

/// An event as delivered by the host platform. Any part may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    pub action: Option<String>,
    pub extras: Option<Extras>,
}

impl RawEvent {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            extras: None,
        }
    }

    /// SMS-received event carrying `pdus` and an optional format tag.
    pub fn sms_received<I, P>(pdus: I, format: Option<&str>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Vec<u8>>,
    {
        let mut extras = Extras::new();
        extras.put(
            EXTRA_PDUS,
            ExtraValue::Segments(pdus.into_iter().map(MessageSegment::new).collect()),
        );
        if let Some(f) = format {
            extras.put(EXTRA_FORMAT, ExtraValue::Text(f.to_string()));
        }
        Self {
            action: Some(SMS_RECEIVED_ACTION.to_string()),
            extras: Some(extras),
        }
    }
}

/// Receiver for platform broadcasts. The event is optional: the platform may hand over nothing.
pub trait BroadcastReceiver: Send + Sync {
    fn on_receive(&self, event: Option<&RawEvent>);
}

/// Id of a platform registration, returned by `SystemBroadcasts::register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(uuid::Uuid);

struct Registration {
    id: RegistrationId,
    action: String,
    receiver: Arc<dyn BroadcastReceiver>,
}

/// System-wide receiver list, filtered by action.
#[derive(Default)]
pub struct SystemBroadcasts {
    inner: RwLock<Vec<Registration>>,
}

impl SystemBroadcasts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `receiver` for events whose action equals `action`.
    pub fn register(
        &self,
        action: impl Into<String>,
        receiver: Arc<dyn BroadcastReceiver>,
    ) -> RegistrationId {
        let id = RegistrationId(uuid::Uuid::new_v4());
        let action = action.into();
        log::debug!("platform: registering receiver for {}", action);
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration {
                id,
                action,
                receiver,
            });
        id
    }

    /// Remove a registration. Returns false when it was not registered; never fails.
    pub fn unregister(&self, id: RegistrationId) -> bool {
        let mut g = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = g.len();
        g.retain(|r| r.id != id);
        before != g.len()
    }

    /// Dispatch `event` to every receiver registered for its action, on the caller's thread.
    /// Returns the number of receivers invoked.
    pub fn dispatch(&self, event: &RawEvent) -> usize {
        let Some(action) = event.action.as_deref() else {
            log::debug!("platform: event without action, not dispatched");
            return 0;
        };
        let targets: Vec<Arc<dyn BroadcastReceiver>> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.action == action)
            .map(|r| Arc::clone(&r.receiver))
            .collect();
        for receiver in &targets {
            receiver.on_receive(Some(event));
        }
        targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl BroadcastReceiver for Counter {
        fn on_receive(&self, _event: Option<&RawEvent>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn sms_received_builds_extras() {
        let ev = RawEvent::sms_received([vec![1u8, 2], vec![3]], Some("3gpp"));
        assert_eq!(ev.action.as_deref(), Some(SMS_RECEIVED_ACTION));
        let extras = ev.extras.unwrap();
        assert_eq!(extras.segments(EXTRA_PDUS).map(|s| s.len()), Some(2));
        assert_eq!(extras.string(EXTRA_FORMAT), Some("3gpp"));
        assert_eq!(extras.string(EXTRA_PDUS), None);
        assert_eq!(extras.segments(EXTRA_FORMAT), None);
    }

    #[test]
    fn dispatch_filters_by_action() {
        let bus = SystemBroadcasts::new();
        let sms = Arc::new(Counter::default());
        let other = Arc::new(Counter::default());
        bus.register(SMS_RECEIVED_ACTION, sms.clone());
        bus.register("android.intent.action.BOOT_COMPLETED", other.clone());

        assert_eq!(bus.dispatch(&RawEvent::new(SMS_RECEIVED_ACTION)), 1);
        assert_eq!(bus.dispatch(&RawEvent::default()), 0);
        assert_eq!(sms.0.load(Ordering::SeqCst), 1);
        assert_eq!(other.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unregister_is_idempotent() {
        let bus = SystemBroadcasts::new();
        let id = bus.register(SMS_RECEIVED_ACTION, Arc::new(Counter::default()));
        assert!(bus.unregister(id));
        assert!(!bus.unregister(id));
        assert_eq!(bus.dispatch(&RawEvent::new(SMS_RECEIVED_ACTION)), 0);
    }

    #[test]
    fn poisoned_lock_still_registers_and_dispatches() {
        let bus = Arc::new(SystemBroadcasts::new());
        let b = Arc::clone(&bus);
        let _ = std::thread::spawn(move || {
            let _guard = b.inner.write().unwrap();
            panic!("poison the receiver list");
        })
        .join();
        assert!(bus.inner.is_poisoned());

        let sms = Arc::new(Counter::default());
        let id = bus.register(SMS_RECEIVED_ACTION, sms.clone());
        assert_eq!(bus.dispatch(&RawEvent::new(SMS_RECEIVED_ACTION)), 1);
        assert_eq!(sms.0.load(Ordering::SeqCst), 1);
        assert!(bus.unregister(id));
    }
}
