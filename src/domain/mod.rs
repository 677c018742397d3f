//! Core domain layer. No external I/O dependencies.
//!
//! Entities and the report computation rules live here. Dependencies flow inward.

pub mod bonus;
pub mod cities;
pub mod dedup;
pub mod entities;
pub mod errors;
pub mod payroll;
pub mod settings;
pub mod statistics;

pub use bonus::{BonusSplit, BonusTier, BonusTiers, Negotiation, NegotiationState, NegotiationStep};
pub use cities::{CityPattern, CityTable};
pub use entities::{
    CityStatistic, DailyOperatorCalls, DatabaseStatistic, DateWindow, HistoryRecord, Order,
    OperatorReport, WeeklyReport,
};
pub use errors::DomainError;
pub use settings::ReportSettings;
pub use statistics::StatisticTable;
