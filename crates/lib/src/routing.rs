//! Delivery router: fans an assembled message out to the direct listener and the local channel.
//!
//! The listener slot holds at most one listener; setting a new one replaces the old one. The
//! slot is read once per delivery, so a listener detached after that read may still get the
//! message it was already chosen for.

use arc_swap::ArcSwapOption;
use std::sync::Arc;

use crate::channels::{LocalChannel, LocalEvent, LOCAL_SMS_RECEIVED_ACTION};
use crate::sms::IncomingMessage;
use crate::ui::UiHandle;

/// Direct in-process listener, invoked on the UI context.
pub trait MessageListener: Send + Sync {
    fn on_message_received(&self, sender: Option<&str>, body: &str);
}

/// Routes assembled messages to at most one direct listener plus the local channel.
pub struct DeliveryRouter {
    listener: ArcSwapOption<Arc<dyn MessageListener>>,
    channel: Arc<LocalChannel>,
    local_action: String,
    ui: UiHandle,
}

impl DeliveryRouter {
    pub fn new(channel: Arc<LocalChannel>, ui: UiHandle) -> Self {
        Self {
            listener: ArcSwapOption::empty(),
            channel,
            local_action: LOCAL_SMS_RECEIVED_ACTION.to_string(),
            ui,
        }
    }

    /// Publish channel events under `action` instead of the default local action.
    pub fn with_local_action(mut self, action: impl Into<String>) -> Self {
        self.local_action = action.into();
        self
    }

    pub fn local_action(&self) -> &str {
        &self.local_action
    }

    /// Attach `listener`, replacing any previous one.
    pub fn set_listener(&self, listener: Arc<dyn MessageListener>) {
        let replaced = self.listener.swap(Some(Arc::new(listener))).is_some();
        log::debug!("message listener set (replaced previous: {})", replaced);
    }

    /// Detach the current listener, if any.
    pub fn clear_listener(&self) {
        if self.listener.swap(None).is_some() {
            log::debug!("message listener cleared");
        }
    }

    pub fn has_listener(&self) -> bool {
        self.listener.load().is_some()
    }

    /// Wait until every delivery routed so far has reached its targets on the UI context.
    pub async fn flush(&self) -> bool {
        self.ui.flush().await
    }

    /// Deliver `message` once to the current listener (if attached) and once to the local
    /// channel. Both hops run on the UI context as separate tasks.
    pub fn deliver(&self, message: IncomingMessage) {
        let message = Arc::new(message);

        match self.listener.load_full() {
            Some(listener) => {
                let m = Arc::clone(&message);
                let posted = self
                    .ui
                    .post(move || listener.on_message_received(m.sender(), m.body()));
                if posted {
                    log::debug!("notifying message listener");
                } else {
                    log::debug!("ui context closed, direct delivery dropped");
                }
            }
            None => log::warn!("message listener is not attached, cannot notify directly"),
        }

        let event = LocalEvent::new(
            self.local_action.clone(),
            message.sender().map(str::to_string),
            Some(message.body().to_string()),
        );
        let channel = Arc::clone(&self.channel);
        let posted = self.ui.post(move || {
            let sent = channel.send(&event);
            log::debug!(
                "local broadcast sent: {} with message length: {}",
                sent,
                event.message.as_deref().map_or(0, |m| m.chars().count())
            );
        });
        if !posted {
            log::debug!("ui context closed, local broadcast dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::LocalReceiver;
    use crate::ui::ui_context;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(Option<String>, String)>>);

    impl MessageListener for Recorder {
        fn on_message_received(&self, sender: Option<&str>, body: &str) {
            self.0
                .lock()
                .unwrap()
                .push((sender.map(str::to_string), body.to_string()));
        }
    }

    #[derive(Default)]
    struct ChannelRecorder(Mutex<Vec<LocalEvent>>);

    impl LocalReceiver for ChannelRecorder {
        fn on_receive(&self, event: &LocalEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    fn msg(sender: &str, body: &str) -> IncomingMessage {
        IncomingMessage::new(Some(sender.to_string()), body.to_string())
    }

    #[test]
    fn delivers_to_listener_and_channel_once() {
        let (ui, mut ui_loop) = ui_context();
        let channel = Arc::new(LocalChannel::new());
        let sub = Arc::new(ChannelRecorder::default());
        channel.register(LOCAL_SMS_RECEIVED_ACTION, sub.clone());
        let router = DeliveryRouter::new(Arc::clone(&channel), ui);
        let listener = Arc::new(Recorder::default());
        router.set_listener(listener.clone());

        router.deliver(msg("+1555", "hi"));
        assert_eq!(ui_loop.drain(), 2);

        assert_eq!(
            *listener.0.lock().unwrap(),
            vec![(Some("+1555".to_string()), "hi".to_string())]
        );
        let events = sub.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sender.as_deref(), Some("+1555"));
        assert_eq!(events[0].message.as_deref(), Some("hi"));
    }

    #[test]
    fn nothing_runs_before_the_ui_drains() {
        let (ui, mut ui_loop) = ui_context();
        let router = DeliveryRouter::new(Arc::new(LocalChannel::new()), ui);
        let listener = Arc::new(Recorder::default());
        router.set_listener(listener.clone());
        router.deliver(msg("+1555", "hi"));
        assert!(listener.0.lock().unwrap().is_empty());
        ui_loop.drain();
        assert_eq!(listener.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn missing_listener_still_publishes_to_channel() {
        let (ui, mut ui_loop) = ui_context();
        let channel = Arc::new(LocalChannel::new());
        let sub = Arc::new(ChannelRecorder::default());
        channel.register(LOCAL_SMS_RECEIVED_ACTION, sub.clone());
        let router = DeliveryRouter::new(channel, ui);

        assert!(!router.has_listener());
        router.deliver(msg("+1555", "hi"));
        assert_eq!(ui_loop.drain(), 1);
        assert_eq!(sub.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn last_listener_wins() {
        let (ui, mut ui_loop) = ui_context();
        let router = DeliveryRouter::new(Arc::new(LocalChannel::new()), ui);
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());

        router.set_listener(first.clone());
        router.deliver(msg("a", "1"));
        router.set_listener(second.clone());
        router.deliver(msg("b", "2"));
        router.clear_listener();
        router.deliver(msg("c", "3"));
        ui_loop.drain();

        assert_eq!(
            *first.0.lock().unwrap(),
            vec![(Some("a".to_string()), "1".to_string())]
        );
        assert_eq!(
            *second.0.lock().unwrap(),
            vec![(Some("b".to_string()), "2".to_string())]
        );
        assert!(!router.has_listener());
    }

    #[test]
    fn custom_local_action() {
        let (ui, mut ui_loop) = ui_context();
        let channel = Arc::new(LocalChannel::new());
        let default_sub = Arc::new(ChannelRecorder::default());
        let custom_sub = Arc::new(ChannelRecorder::default());
        channel.register(LOCAL_SMS_RECEIVED_ACTION, default_sub.clone());
        channel.register("org.example.SMS", custom_sub.clone());
        let router = DeliveryRouter::new(channel, ui).with_local_action("org.example.SMS");
        assert_eq!(router.local_action(), "org.example.SMS");

        router.deliver(msg("+1", "x"));
        ui_loop.drain();
        assert!(default_sub.0.lock().unwrap().is_empty());
        assert_eq!(custom_sub.0.lock().unwrap().len(), 1);
    }

    struct Exploding;

    impl MessageListener for Exploding {
        fn on_message_received(&self, _sender: Option<&str>, _body: &str) {
            panic!("listener failed");
        }
    }

    #[test]
    fn panicking_listener_does_not_block_channel() {
        let (ui, mut ui_loop) = ui_context();
        let channel = Arc::new(LocalChannel::new());
        let sub = Arc::new(ChannelRecorder::default());
        channel.register(LOCAL_SMS_RECEIVED_ACTION, sub.clone());
        let router = DeliveryRouter::new(channel, ui);
        router.set_listener(Arc::new(Exploding));

        router.deliver(msg("+1555", "hi"));
        assert_eq!(ui_loop.drain(), 2);
        let events = sub.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message.as_deref(), Some("hi"));
    }

    #[test]
    fn closed_ui_context_drops_silently() {
        let (ui, ui_loop) = ui_context();
        drop(ui_loop);
        let router = DeliveryRouter::new(Arc::new(LocalChannel::new()), ui);
        router.set_listener(Arc::new(Recorder::default()));
        router.deliver(msg("+1", "x"));
    }
}
