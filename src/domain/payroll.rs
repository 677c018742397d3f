//! Salary lines and department money totals.

use crate::domain::bonus::BonusSplit;
use crate::domain::entities::{OperatorReport, ratio};
use crate::domain::settings::ReportSettings;
use crate::domain::statistics::StatisticTable;

/// Payroll lines plus department-level money figures.
#[derive(Debug, Clone, PartialEq)]
pub struct Payroll {
    /// Operator lines followed by the department head line.
    pub lines: Vec<OperatorReport>,
    pub total_orders: usize,
    /// Σ pay of every line, head included.
    pub department_payment: f64,
    pub department_price_per_order: f64,
    /// Σ salaries, head included.
    pub summary_salary: f64,
    /// The whole pool.
    pub summary_bonus: f64,
}

impl Payroll {
    /// Operator lines only (head excluded).
    pub fn operator_lines(&self) -> &[OperatorReport] {
        &self.lines[..self.lines.len().saturating_sub(1)]
    }

    pub fn head_line(&self) -> Option<&OperatorReport> {
        self.lines.last()
    }
}

/// Company-wide cost figures once external costs are known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Expenses {
    pub total_expenses: f64,
    pub total_price_per_order: f64,
}

/// Build salary lines from aggregated statistics and the accepted bonus split.
pub fn build_payroll(
    table: &StatisticTable,
    split: &BonusSplit,
    settings: &ReportSettings,
) -> Payroll {
    let total_orders = table.total().orders_count;

    let mut lines: Vec<OperatorReport> = table
        .operators()
        .iter()
        .map(|stat| {
            let salary = stat.orders_count as f64 * settings.order_fee;
            let bonus = split.bonus_of(&stat.operator);
            let pay = salary + bonus;
            OperatorReport {
                name: stat.operator.clone(),
                salary,
                bonus,
                summary_payment: pay,
                orders_count: stat.orders_count,
                price_per_order: ratio(pay, stat.orders_count as f64),
                unique_calls: stat.unique_calls(),
                conversion: stat.conversion,
            }
        })
        .collect();

    let operators_bonus: f64 = lines.iter().map(|l| l.bonus).sum();
    let head_salary = total_orders as f64 * settings.head_rate;
    let head_bonus = split.pool - operators_bonus;
    lines.push(OperatorReport {
        name: settings.head_name.clone(),
        salary: head_salary,
        bonus: head_bonus,
        summary_payment: head_salary + head_bonus,
        ..OperatorReport::default()
    });

    let department_payment: f64 = lines.iter().map(|l| l.summary_payment).sum();
    let summary_salary: f64 = lines.iter().map(|l| l.salary).sum();

    Payroll {
        lines,
        total_orders,
        department_payment,
        department_price_per_order: ratio(department_payment, total_orders as f64),
        summary_salary,
        summary_bonus: split.pool,
    }
}

/// Add telephony and SMS costs to the department payment.
pub fn expenses(payroll: &Payroll, telephony: f64, sms: f64) -> Expenses {
    let total_expenses = payroll.department_payment + telephony + sms;
    Expenses {
        total_expenses,
        total_price_per_order: ratio(total_expenses, payroll.total_orders as f64),
    }
}
