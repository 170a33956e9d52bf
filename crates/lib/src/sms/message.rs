//! Message types: raw segments, per-segment decode results, and the reassembled message.

use chrono::{DateTime, FixedOffset, Local};

/// One raw platform-delivered fragment (the bytes of a single PDU).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSegment {
    pub payload: Vec<u8>,
}

impl MessageSegment {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

/// Concatenation header from a segment's user data header (reference, total parts, 1-based sequence).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcatInfo {
    pub reference: u16,
    pub total: u8,
    pub sequence: u8,
}

/// Result of decoding one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSegment {
    /// Originating address for display (e.g. "+15551234567" or an alphanumeric sender id).
    pub address: Option<String>,
    /// Text of this segment; None for 8-bit binary or unknown coding.
    pub text: Option<String>,
    /// Service-centre timestamp with its zone offset, when valid.
    pub service_centre_time: Option<DateTime<FixedOffset>>,
    pub concat: Option<ConcatInfo>,
}

/// The reassembled logical message handed to the delivery router. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    sender: Option<String>,
    body: String,
    received_at: DateTime<Local>,
}

impl IncomingMessage {
    /// Build a message stamped with the current local time.
    pub fn new(sender: Option<String>, body: String) -> Self {
        Self::with_received_at(sender, body, Local::now())
    }

    pub fn with_received_at(
        sender: Option<String>,
        body: String,
        received_at: DateTime<Local>,
    ) -> Self {
        Self {
            sender,
            body,
            received_at,
        }
    }

    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn received_at(&self) -> DateTime<Local> {
        self.received_at
    }
}
