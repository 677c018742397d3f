//! Infrastructure adapters. Implement outbound ports and front-ends.
//!
//! Data sources, report sinks, Telegram, console. Map errors to DomainError.

pub mod channel;
pub mod persistence;
pub mod telegram;
pub mod ui;
