//! Event published on the in-process channel after a message has been assembled.

/// Local action for assembled SMS events.
pub const LOCAL_SMS_RECEIVED_ACTION: &str = "com.example.phishstop.SMS_RECEIVED";
/// Field name of the sender.
pub const EXTRA_SENDER: &str = "sender";
/// Field name of the body.
pub const EXTRA_MESSAGE: &str = "message";

/// Addressed event carrying sender and body as named fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEvent {
    pub action: String,
    pub sender: Option<String>,
    pub message: Option<String>,
}

impl LocalEvent {
    pub fn new(
        action: impl Into<String>,
        sender: Option<String>,
        message: Option<String>,
    ) -> Self {
        Self {
            action: action.into(),
            sender,
            message,
        }
    }

    /// Look up a named field (`sender` or `message`).
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            EXTRA_SENDER => self.sender.as_deref(),
            EXTRA_MESSAGE => self.message.as_deref(),
            _ => None,
        }
    }
}
