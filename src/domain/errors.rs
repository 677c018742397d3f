//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Data source error: {0}")]
    DataSource(String),

    /// Transient read/write failure on the interactive channel. Prompts retry on it.
    #[error("Channel error: {0}")]
    Channel(String),

    /// The channel is gone (stdin closed, prompt cancelled). Never retried.
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    InvalidDate(String),

    #[error("Invalid report window: {from} is after {to}")]
    InvalidWindow { from: NaiveDate, to: NaiveDate },

    #[error("Report sink error: {0}")]
    Report(String),

    #[error("Notifier error: {0}")]
    Notifier(String),

    #[error("A report is already being generated")]
    Busy,
}
