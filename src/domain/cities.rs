//! City table and per-city rollup.
//!
//! A city is recognised on the call side by a regex over the dialed line number,
//! and on the order side by a case-insensitive substring of the order's city text.

use crate::domain::dedup::{unique_calls_per_city, unique_received_calls_per_city};
use crate::domain::entities::{CITY_TOTAL_LABEL, CityStatistic, DateWindow, HistoryRecord, Order};
use crate::domain::DomainError;
use regex::Regex;
use std::collections::HashMap;

/// A known city and the pattern of its incoming lines.
#[derive(Debug, Clone)]
pub struct CityPattern {
    pub name: String,
    pub line_pattern: Regex,
}

/// Ordered city table. Cities are kept sorted by name so classification is deterministic.
#[derive(Debug, Clone, Default)]
pub struct CityTable {
    cities: Vec<CityPattern>,
}

impl CityTable {
    /// Build the table from `(city, regex)` pairs.
    pub fn new<I, S, P>(entries: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
        P: AsRef<str>,
    {
        let mut cities = Vec::new();
        for (name, pattern) in entries {
            let name = name.into();
            let line_pattern = Regex::new(pattern.as_ref()).map_err(|e| {
                DomainError::Config(format!("invalid line pattern for {}: {}", name, e))
            })?;
            cities.push(CityPattern { name, line_pattern });
        }
        cities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self { cities })
    }

    pub fn iter(&self) -> impl Iterator<Item = &CityPattern> {
        self.cities.iter()
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    /// First city whose pattern matches the line number.
    pub fn classify(&self, line_number: &str) -> Option<&str> {
        self.cities
            .iter()
            .find(|c| c.line_pattern.is_match(line_number))
            .map(|c| c.name.as_str())
    }

    /// Orders per city. An order may count for several cities when names overlap.
    pub fn orders_per_city(&self, orders: &[Order]) -> HashMap<String, usize> {
        let names: Vec<(String, String)> = self
            .cities
            .iter()
            .map(|c| (c.name.clone(), c.name.to_lowercase()))
            .collect();
        let mut result = HashMap::new();
        for order in orders {
            let city = order.city.to_lowercase();
            for (name, lower) in &names {
                if city.contains(lower.as_str()) {
                    *result.entry(name.clone()).or_insert(0) += 1;
                }
            }
        }
        result
    }
}

/// Per-city calls/orders/conversion rows, busiest city first, plus the total row.
///
/// Ties on total unique calls are broken by city name ascending.
pub fn city_statistics(
    history: &[HistoryRecord],
    orders: &[Order],
    window: &DateWindow,
    cities: &CityTable,
) -> Vec<CityStatistic> {
    let total_calls = unique_calls_per_city(history, window, cities);
    let received_calls = unique_received_calls_per_city(history, window, cities);
    let orders_per_city = cities.orders_per_city(orders);

    let mut rows: Vec<CityStatistic> = cities
        .iter()
        .map(|c| {
            let get = |m: &HashMap<String, usize>| m.get(&c.name).copied().unwrap_or(0);
            CityStatistic::new(
                c.name.clone(),
                get(&total_calls),
                get(&received_calls),
                get(&orders_per_city),
            )
        })
        .collect();

    rows.sort_by(|a, b| {
        b.unique_calls_total
            .cmp(&a.unique_calls_total)
            .then_with(|| a.city.cmp(&b.city))
    });

    let total = CityStatistic::new(
        CITY_TOTAL_LABEL,
        rows.iter().map(|r| r.unique_calls_total).sum(),
        rows.iter().map(|r| r.unique_calls_received).sum(),
        rows.iter().map(|r| r.orders_count).sum(),
    );
    rows.push(total);
    rows
}
