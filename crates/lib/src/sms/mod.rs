//! SMS segment codec and message types.
//!
//! Segments arrive as raw PDUs with a shared format tag; each is decoded on its own into
//! address + text, and the intercept gate joins them in arrival order.

mod gsm7;
mod message;
mod pdu;

pub use message::{ConcatInfo, DecodedSegment, IncomingMessage, MessageSegment};
pub use pdu::{decode_segment, DecodeError, SmsFormat, FORMAT_3GPP, FORMAT_3GPP2};
