//! Operator digest: week-to-date orders, unique calls and conversion per operator.
//!
//! Condensed fixed-width table meant for a chat message. Same aggregation as the
//! weekly report, without money.

use crate::domain::entities::{DATE_LAYOUT, TOTAL_LABEL, UNASSIGNED_LABEL};
use crate::domain::statistics::aggregate;
use crate::domain::{DatabaseStatistic, DateWindow, DomainError};
use crate::ports::{DataSourcePort, NotifierPort};
use chrono::{Datelike, Days, NaiveDate};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{error, info};

/// Monday of the week containing `day`.
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day.checked_sub_days(Days::new(u64::from(day.weekday().num_days_from_monday())))
        .unwrap_or(day)
}

/// Format with `digits` significant digits, dropping trailing zeros (C `%g` style).
pub fn format_significant(value: f64, digits: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return if value == 0.0 { "0".to_string() } else { value.to_string() };
    }
    let digits = digits.max(1);
    let sci = format!("{:.*e}", digits - 1, value);
    let Some((mantissa, exponent)) = sci.split_once('e') else {
        return sci;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= digits as i32 {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exponent.abs());
    }
    let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
    trim_fraction(&format!("{:.*}", decimals, value)).to_string()
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn operator_row(stat: &DatabaseStatistic) -> String {
    format!(
        "{:<20} {:<7} {:<7} {:<7} {}%",
        stat.operator,
        stat.orders_count,
        stat.unique_incoming_calls,
        stat.unique_outgoing_calls,
        format_significant(stat.conversion * 100.0, 4)
    )
}

/// Render the digest table for `window`.
///
/// Operators with no orders and no calls are left out. The unassigned row shows
/// only its order count; the total row is always present.
pub fn format_digest(rows: &[DatabaseStatistic], window: &DateWindow) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Отчет по операторам за период с {} по {}",
        window.from.format(DATE_LAYOUT),
        window.to.format(DATE_LAYOUT)
    );
    let _ = writeln!(
        out,
        "{:<20} {:<7} {:<7} {:<7} {}",
        "ФИО", "заказы", "ун.вх.", "ун.исх.", "конв."
    );
    for stat in rows {
        if stat.operator == UNASSIGNED_LABEL {
            let _ = writeln!(out, "{:<20} {:<7}", stat.operator, stat.orders_count);
        } else if stat.operator == TOTAL_LABEL || !stat.is_empty() {
            let _ = writeln!(out, "{}", operator_row(stat));
        }
    }
    out
}

/// Builds the week-to-date digest and pushes it to a notifier.
pub struct DigestService {
    data: Arc<dyn DataSourcePort>,
}

impl DigestService {
    pub fn new(data: Arc<dyn DataSourcePort>) -> Self {
        Self { data }
    }

    /// Digest for Monday..`today`.
    pub async fn render(&self, today: NaiveDate) -> Result<String, DomainError> {
        let window = DateWindow::new(week_start(today), today)?;
        let call_stats = self.data.get_unique_calls_by_operator(&window).await?;
        let orders = self.data.get_orders(&window).await?;
        let table = aggregate(call_stats, &orders);
        info!(window = %window, orders = table.total().orders_count, "operator digest built");
        Ok(format_digest(table.rows(), &window))
    }

    pub async fn send(&self, notifier: &dyn NotifierPort, today: NaiveDate) -> Result<(), DomainError> {
        let digest = self.render(today).await.inspect_err(|e| {
            error!(error = %e, "operator digest failed");
        })?;
        notifier.send_preformatted(&digest).await
    }
}
