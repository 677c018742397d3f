//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{DatabaseStatistic, DateWindow, DomainError, HistoryRecord, Order, WeeklyReport};
use std::path::Path;

/// Source of raw call and order records.
#[async_trait::async_trait]
pub trait DataSourcePort: Send + Sync {
    /// Incoming calls of the last `window_days` days, in chronological order.
    /// Used for caller deduplication, so it reaches further back than the report window.
    async fn get_history(&self, window_days: u32) -> Result<Vec<HistoryRecord>, DomainError>;

    /// Orders created inside the window.
    async fn get_orders(&self, window: &DateWindow) -> Result<Vec<Order>, DomainError>;

    /// Unique incoming/outgoing calls per operator inside the window.
    /// Every roster operator is present, zero-initialised when they had no calls.
    async fn get_unique_calls_by_operator(
        &self,
        window: &DateWindow,
    ) -> Result<Vec<DatabaseStatistic>, DomainError>;
}

/// Duplex text channel to the human driving a report (console, chat).
#[async_trait::async_trait]
pub trait ChannelPort: Send + Sync {
    /// Show a message to the human.
    async fn send(&self, text: &str) -> Result<(), DomainError>;

    /// Wait for the next line typed by the human.
    ///
    /// # Errors
    /// `DomainError::Channel` for transient failures (callers may retry),
    /// `DomainError::ChannelClosed` when no more input will ever arrive.
    async fn receive(&self) -> Result<String, DomainError>;
}

/// Push-style notifications (periodic digest, report files).
#[async_trait::async_trait]
pub trait NotifierPort: Send + Sync {
    /// Send text rendered in a fixed-width font.
    async fn send_preformatted(&self, text: &str) -> Result<(), DomainError>;

    /// Upload a file.
    async fn send_document(&self, path: &Path, caption: &str) -> Result<(), DomainError>;
}

/// Report rendering target.
#[async_trait::async_trait]
pub trait ReportSinkPort: Send + Sync {
    async fn save_report(&self, report: &WeeklyReport, path: &Path) -> Result<(), DomainError>;
}
