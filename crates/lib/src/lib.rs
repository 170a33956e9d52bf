//! PhishStop core library: SMS interception, reassembly and in-process delivery,
//! shared by the CLI and desktop applications.

pub mod channels;
pub mod config;
pub mod gate;
pub mod init;
pub mod lifecycle;
pub mod permissions;
pub mod pipeline;
pub mod platform;
pub mod routing;
pub mod sms;
pub mod ui;
