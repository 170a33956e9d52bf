//! In-process notification channel.
//!
//! Subscribers register per action and receive assembled-message events from the delivery
//! router. Independent of the platform registrations in `platform`.

mod inbound;
mod registry;

pub use inbound::{LocalEvent, EXTRA_MESSAGE, EXTRA_SENDER, LOCAL_SMS_RECEIVED_ACTION};
pub use registry::{LocalChannel, LocalReceiver, SubscriptionId};
