//! Intercept gate: entry point for platform SMS broadcasts.
//!
//! Checks the event, the receive permission, the action and the payload, then decodes every
//! segment in platform order and hands one assembled message to the delivery router. A single
//! undecodable segment drops the whole event.

use std::sync::Arc;

use crate::permissions::{Permission, PermissionChecker};
use crate::platform::{BroadcastReceiver, RawEvent, EXTRA_FORMAT, EXTRA_PDUS, SMS_RECEIVED_ACTION};
use crate::routing::DeliveryRouter;
use crate::sms::{decode_segment, DecodeError, IncomingMessage, MessageSegment};

/// Permission the gate re-checks on every event.
pub const GATE_PERMISSION: Permission = Permission::ReceiveSms;

/// Why an event did not produce a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("received null event or null action")]
    MissingAction,
    #[error("{0} permission not granted")]
    PermissionDenied(Permission),
    #[error("not an SMS received action, received: {0}")]
    UnexpectedAction(String),
    #[error("no PDUs in SMS")]
    NoPayload,
    #[error("segment {index} failed to decode: {source}")]
    Decode {
        index: usize,
        #[source]
        source: DecodeError,
    },
}

impl GateError {
    /// True for normal platform traffic that is simply not for us; false for malformed payloads.
    pub fn is_ignorable(&self) -> bool {
        !matches!(self, GateError::Decode { .. })
    }
}

/// Receives raw platform events and routes assembled messages.
pub struct InterceptGate {
    permissions: Arc<dyn PermissionChecker>,
    router: Arc<DeliveryRouter>,
}

impl InterceptGate {
    pub fn new(permissions: Arc<dyn PermissionChecker>, router: Arc<DeliveryRouter>) -> Self {
        Self {
            permissions,
            router,
        }
    }

    /// Handle one platform event. Never fails outward: discards are logged and dropped.
    pub fn handle_incoming(&self, event: Option<&RawEvent>) {
        log::debug!(
            "sms receiver called with action: {}",
            event
                .and_then(|e| e.action.as_deref())
                .unwrap_or("null")
        );
        match self.assemble(event) {
            Ok(message) => {
                log::info!(
                    "parsed SMS at {} - sender: {}, message length: {}",
                    message.received_at().format("%H:%M:%S"),
                    message.sender().unwrap_or("unknown"),
                    message.body().chars().count()
                );
                self.router.deliver(message);
            }
            Err(e @ GateError::UnexpectedAction(_)) => log::debug!("{}", e),
            Err(e) if e.is_ignorable() => log::warn!("discarding event: {}", e),
            Err(e) => log::error!("error processing SMS: {}", e),
        }
    }

    /// Guard and decode `event` into a message without delivering it.
    pub fn assemble(&self, event: Option<&RawEvent>) -> Result<IncomingMessage, GateError> {
        let event = event.ok_or(GateError::MissingAction)?;
        let action = event.action.as_deref().ok_or(GateError::MissingAction)?;
        if !self.permissions.is_granted(GATE_PERMISSION) {
            return Err(GateError::PermissionDenied(GATE_PERMISSION));
        }
        if action != SMS_RECEIVED_ACTION {
            return Err(GateError::UnexpectedAction(action.to_string()));
        }
        let extras = event.extras.as_ref().ok_or(GateError::NoPayload)?;
        let segments = extras
            .segments(EXTRA_PDUS)
            .filter(|s| !s.is_empty())
            .ok_or(GateError::NoPayload)?;
        let format = extras.string(EXTRA_FORMAT);
        log::debug!(
            "processing {} PDUs with format: {}",
            segments.len(),
            format.unwrap_or("null")
        );

        let (sender, body) = assemble_segments(segments, format)?;
        Ok(IncomingMessage::new(sender, body))
    }
}

impl BroadcastReceiver for InterceptGate {
    fn on_receive(&self, event: Option<&RawEvent>) {
        self.handle_incoming(event);
    }
}

/// Decode `segments` in the given order and join their text. The sender is taken from the first
/// segment only. Fails on the first segment that does not decode.
pub fn assemble_segments(
    segments: &[MessageSegment],
    format: Option<&str>,
) -> Result<(Option<String>, String), GateError> {
    let mut sender = None;
    let mut body = String::new();
    for (index, segment) in segments.iter().enumerate() {
        let decoded = decode_segment(&segment.payload, format)
            .map_err(|source| GateError::Decode { index, source })?;
        if index == 0 {
            sender = decoded.address;
        }
        if let Some(concat) = decoded.concat {
            if usize::from(concat.sequence) != index + 1 || usize::from(concat.total) != segments.len() {
                log::warn!(
                    "segment {} carries part {}/{} (ref {}); keeping platform order",
                    index,
                    concat.sequence,
                    concat.total,
                    concat.reference
                );
            }
        }
        if let Some(text) = decoded.text {
            body.push_str(&text);
        }
    }
    Ok((sender, body))
}
