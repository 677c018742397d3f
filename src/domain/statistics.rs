//! Per-operator statistics: call counts merged with orders.

use crate::domain::entities::{DatabaseStatistic, Order, TOTAL_LABEL, UNASSIGNED_LABEL};
use std::collections::HashMap;

/// Aggregated rows with a fixed tail: `[operators sorted by name..., unassigned, total]`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticTable {
    rows: Vec<DatabaseStatistic>,
}

impl StatisticTable {
    /// Real operator rows, sorted by operator name.
    pub fn operators(&self) -> &[DatabaseStatistic] {
        &self.rows[..self.rows.len() - 2]
    }

    /// Orders without an operator.
    pub fn unassigned(&self) -> &DatabaseStatistic {
        &self.rows[self.rows.len() - 2]
    }

    /// Department total: every order, every operator call.
    pub fn total(&self) -> &DatabaseStatistic {
        &self.rows[self.rows.len() - 1]
    }

    pub fn rows(&self) -> &[DatabaseStatistic] {
        &self.rows
    }
}

/// Merge per-operator call counts with orders.
///
/// `call_stats` is expected to hold one zero-initialised row per roster operator.
/// Orders of operators missing from `call_stats` only count towards the total row.
pub fn aggregate(call_stats: Vec<DatabaseStatistic>, orders: &[Order]) -> StatisticTable {
    let mut by_operator: HashMap<String, DatabaseStatistic> = call_stats
        .into_iter()
        .map(|s| (s.operator.clone(), s))
        .collect();

    let mut unassigned_orders = 0usize;
    for order in orders {
        if order.operator.is_empty() {
            unassigned_orders += 1;
            continue;
        }
        if let Some(stat) = by_operator.get_mut(&order.operator) {
            stat.add_orders(1);
        }
    }

    let mut total_incoming = 0usize;
    let mut total_outgoing = 0usize;
    let mut rows: Vec<DatabaseStatistic> = by_operator
        .into_values()
        .map(|mut stat| {
            stat.calculate_conversion();
            total_incoming += stat.unique_incoming_calls;
            total_outgoing += stat.unique_outgoing_calls;
            stat
        })
        .collect();
    rows.sort_by(|a, b| a.operator.cmp(&b.operator));

    let mut unassigned = DatabaseStatistic::new(UNASSIGNED_LABEL);
    unassigned.add_orders(unassigned_orders);

    let mut total = DatabaseStatistic::new(TOTAL_LABEL);
    total.add_orders(orders.len());
    total.add_incoming_calls(total_incoming);
    total.add_outgoing_calls(total_outgoing);
    total.calculate_conversion();

    rows.push(unassigned);
    rows.push(total);
    StatisticTable { rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn order(id: u64, operator: &str) -> Order {
        Order {
            id,
            date: NaiveDate::from_ymd_opt(2023, 6, 12).unwrap(),
            city: "Москва".to_string(),
            operator: operator.to_string(),
        }
    }

    fn calls(operator: &str, incoming: usize, outgoing: usize) -> DatabaseStatistic {
        let mut stat = DatabaseStatistic::new(operator);
        stat.add_incoming_calls(incoming);
        stat.add_outgoing_calls(outgoing);
        stat
    }

    #[test]
    fn test_tail_layout_and_order_counts() {
        let table = aggregate(
            vec![calls("B", 0, 0), calls("A", 3, 2)],
            &[order(1, "A"), order(2, "A"), order(3, "")],
        );

        let rows = table.rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].operator, "A");
        assert_eq!(rows[1].operator, "B");
        assert_eq!(rows[2].operator, UNASSIGNED_LABEL);
        assert_eq!(rows[3].operator, TOTAL_LABEL);

        assert!((table.operators()[0].conversion - 0.4).abs() < 1e-12);
        assert_eq!(table.operators()[1].conversion, 0.0);
        assert_eq!(table.unassigned().orders_count, 1);
        assert_eq!(table.total().orders_count, 3);
        assert_eq!(table.total().unique_incoming_calls, 3);
        assert_eq!(table.total().unique_outgoing_calls, 2);
        assert!((table.total().conversion - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_orders_of_unknown_operator_only_in_total() {
        let table = aggregate(vec![calls("A", 1, 0)], &[order(1, "Z"), order(2, "A")]);
        assert_eq!(table.operators()[0].orders_count, 1);
        assert_eq!(table.unassigned().orders_count, 0);
        assert_eq!(table.total().orders_count, 2);
    }

    #[test]
    fn test_empty_input_still_has_tail() {
        let table = aggregate(Vec::new(), &[]);
        assert!(table.operators().is_empty());
        assert_eq!(table.unassigned().orders_count, 0);
        assert_eq!(table.total().conversion, 0.0);
    }
}
