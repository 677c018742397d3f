//! Domain entities. Pure data structures for the report engine.
//!
//! No database or Telegram types here; adapters map into these.

use crate::domain::DomainError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label of the synthetic row holding orders without an operator.
pub const UNASSIGNED_LABEL: &str = "Бесхозные заказы";

/// Label of the synthetic department total row.
pub const TOTAL_LABEL: &str = "ИТОГО";

/// Label of the synthetic total row of the city rollup.
pub const CITY_TOTAL_LABEL: &str = "Итого";

/// Date layout used by humans (chat, console, CSV feeds).
pub const DATE_LAYOUT: &str = "%d.%m.%Y";

/// One observed call event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub date: NaiveDate,
    /// Caller identity (phone number / abonent).
    pub caller: String,
    /// Empty when nobody answered.
    pub operator: String,
    pub line_number: String,
}

/// One completed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub date: NaiveDate,
    pub city: String,
    /// Empty when the order has no operator attribution.
    pub operator: String,
}

/// Per-operator working aggregate. Also used for the unassigned and total rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseStatistic {
    pub operator: String,
    pub orders_count: usize,
    pub unique_incoming_calls: usize,
    pub unique_outgoing_calls: usize,
    pub conversion: f64,
}

impl DatabaseStatistic {
    pub fn new(operator: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
            ..Self::default()
        }
    }

    pub fn add_incoming_calls(&mut self, n: usize) {
        self.unique_incoming_calls += n;
    }

    pub fn add_outgoing_calls(&mut self, n: usize) {
        self.unique_outgoing_calls += n;
    }

    pub fn add_orders(&mut self, n: usize) {
        self.orders_count += n;
    }

    pub fn unique_calls(&self) -> usize {
        self.unique_incoming_calls + self.unique_outgoing_calls
    }

    /// `orders / (incoming + outgoing)`, or 0 without calls.
    pub fn calculate_conversion(&mut self) {
        self.conversion = ratio(self.orders_count as f64, self.unique_calls() as f64);
    }

    /// True when the row carries no orders and no calls.
    pub fn is_empty(&self) -> bool {
        self.orders_count == 0 && self.unique_calls() == 0
    }
}

/// Final payroll line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorReport {
    pub name: String,
    pub salary: f64,
    pub bonus: f64,
    pub summary_payment: f64,
    pub orders_count: usize,
    pub price_per_order: f64,
    pub unique_calls: usize,
    pub conversion: f64,
}

/// Per-city rollup row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CityStatistic {
    pub city: String,
    pub unique_calls_total: usize,
    pub unique_calls_received: usize,
    pub unique_calls_missed: usize,
    pub orders_count: usize,
    pub conversion: f64,
}

impl CityStatistic {
    pub fn new(city: impl Into<String>, total: usize, received: usize, orders: usize) -> Self {
        Self {
            city: city.into(),
            unique_calls_total: total,
            unique_calls_received: received,
            unique_calls_missed: total.saturating_sub(received),
            orders_count: orders,
            conversion: ratio(orders as f64, total as f64),
        }
    }
}

/// Inclusive calendar window of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateWindow {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, DomainError> {
        if from > to {
            return Err(DomainError::InvalidWindow { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.from.format(DATE_LAYOUT),
            self.to.format(DATE_LAYOUT)
        )
    }
}

/// Received unique calls per day and operator.
pub type DailyOperatorCalls = BTreeMap<NaiveDate, BTreeMap<String, usize>>;

/// The root aggregate of a report run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub window: DateWindow,
    pub operator_reports: Vec<OperatorReport>,
    pub city_statistics: Vec<CityStatistic>,
    pub department_payment: f64,
    pub department_price_per_order: f64,
    pub telephony_payment: f64,
    pub sms_payment: f64,
    pub total_expenses: f64,
    pub total_orders_count: usize,
    pub total_price_per_order: f64,
    pub summary_department_salary: f64,
    pub summary_department_bonus: f64,
    pub sum_to_pay: f64,
    /// Department bonus per order selected from the tier table (0 without a tier).
    pub bonus_per_order: f64,
    /// Accepted personal bonus per order (0 when no negotiation happened).
    pub personal_bonus_per_order: f64,
    pub daily_received_calls: DailyOperatorCalls,
}

/// Parse a `DD.MM.YYYY` date as typed by a human.
pub fn parse_date(input: &str) -> Result<NaiveDate, DomainError> {
    let trimmed = input.trim();
    let parts = trimmed.split('.').count();
    if parts != 3 {
        return Err(DomainError::InvalidDate(format!(
            "Неверный формат даты, вместо 3 чисел введено {}",
            parts
        )));
    }
    NaiveDate::parse_from_str(trimmed, DATE_LAYOUT)
        .map_err(|e| DomainError::InvalidDate(format!("{}: {}", trimmed, e)))
}

/// Division with a zero guard.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_without_calls_is_zero() {
        let mut stat = DatabaseStatistic::new("A");
        stat.add_orders(5);
        stat.calculate_conversion();
        assert_eq!(stat.conversion, 0.0);
    }

    #[test]
    fn test_conversion_is_orders_over_calls() {
        let mut stat = DatabaseStatistic::new("A");
        stat.add_incoming_calls(3);
        stat.add_outgoing_calls(2);
        stat.add_orders(2);
        stat.calculate_conversion();
        assert!((stat.conversion - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_city_statistic_missed_and_conversion() {
        let city = CityStatistic::new("Москва", 10, 7, 4);
        assert_eq!(city.unique_calls_missed, 3);
        assert!((city.conversion - 0.4).abs() < 1e-12);

        let empty = CityStatistic::new("Курск", 0, 0, 2);
        assert_eq!(empty.conversion, 0.0);
    }

    #[test]
    fn test_window_is_inclusive_and_ordered() {
        let from = NaiveDate::from_ymd_opt(2023, 6, 12).unwrap();
        let to = NaiveDate::from_ymd_opt(2023, 6, 18).unwrap();
        let window = DateWindow::new(from, to).unwrap();
        assert!(window.contains(from));
        assert!(window.contains(to));
        assert!(!window.contains(to.succ_opt().unwrap()));
        assert!(DateWindow::new(to, from).is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date(" 12.06.2023 ").unwrap(),
            NaiveDate::from_ymd_opt(2023, 6, 12).unwrap()
        );
        assert!(parse_date("12.06").is_err());
        assert!(parse_date("31.02.2023").is_err());
    }
}
