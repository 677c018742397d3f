//! In-memory data source. Implements DataSourcePort over pre-loaded records.
//!
//! Used by tests and for replaying a fixed batch; filtering mirrors the database adapters.

use crate::domain::{DatabaseStatistic, DateWindow, DomainError, HistoryRecord, Order};
use crate::ports::DataSourcePort;

/// Fixed batch of records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataSource {
    history: Vec<HistoryRecord>,
    orders: Vec<Order>,
    call_stats: Vec<DatabaseStatistic>,
}

impl InMemoryDataSource {
    /// `history` is returned as-is by `get_history`, regardless of the requested depth.
    pub fn new(
        history: Vec<HistoryRecord>,
        orders: Vec<Order>,
        call_stats: Vec<DatabaseStatistic>,
    ) -> Self {
        Self {
            history,
            orders,
            call_stats,
        }
    }
}

#[async_trait::async_trait]
impl DataSourcePort for InMemoryDataSource {
    async fn get_history(&self, _window_days: u32) -> Result<Vec<HistoryRecord>, DomainError> {
        Ok(self.history.clone())
    }

    async fn get_orders(&self, window: &DateWindow) -> Result<Vec<Order>, DomainError> {
        Ok(self
            .orders
            .iter()
            .filter(|o| window.contains(o.date))
            .cloned()
            .collect())
    }

    async fn get_unique_calls_by_operator(
        &self,
        _window: &DateWindow,
    ) -> Result<Vec<DatabaseStatistic>, DomainError> {
        Ok(self.call_stats.clone())
    }
}
