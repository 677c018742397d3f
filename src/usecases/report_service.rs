//! Weekly report: fetch records -> aggregate -> negotiate bonus -> payroll -> city rollup.
//!
//! - Data-source failures abort the run; nothing partial is returned
//! - Bonus negotiation and cost entry talk to a human over ChannelPort
//! - One run at a time per service (second caller gets `DomainError::Busy`)

use crate::domain::bonus::{BonusSplit, Negotiation, NegotiationStep, bonus_pool, format_proposal, parse_rate};
use crate::domain::cities::city_statistics;
use crate::domain::dedup::unique_received_calls_by_operator;
use crate::domain::payroll::{build_payroll, expenses};
use crate::domain::statistics::{StatisticTable, aggregate};
use crate::domain::{
    DatabaseStatistic, DateWindow, DomainError, HistoryRecord, Order, ReportSettings, WeeklyReport,
};
use crate::ports::{ChannelPort, DataSourcePort};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

const TELEPHONY_PROMPT: &str = "Сколько заплатили за телефонию?";
const SMS_PROMPT: &str = "Сколько заплатили за СМС?";
const NOT_A_NUMBER: &str = "Нужно число, попробуйте ещё раз";
/// Pause between reads after a transient channel failure.
const READ_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Report service. Drives one report run over a data source and an interactive channel.
pub struct ReportService {
    data: Arc<dyn DataSourcePort>,
    channel: Arc<dyn ChannelPort>,
    settings: Arc<ReportSettings>,
    run_guard: Mutex<()>,
}

impl ReportService {
    pub fn new(
        data: Arc<dyn DataSourcePort>,
        channel: Arc<dyn ChannelPort>,
        settings: Arc<ReportSettings>,
    ) -> Self {
        Self {
            data,
            channel,
            settings,
            run_guard: Mutex::new(()),
        }
    }

    /// Build the weekly report for `window`.
    ///
    /// Blocks on the channel while the bonus is negotiated and costs are entered.
    pub async fn make_report(&self, window: DateWindow) -> Result<WeeklyReport, DomainError> {
        let _guard = self.run_guard.try_lock().map_err(|_| DomainError::Busy)?;
        info!(window = %window, "building weekly report");

        let (call_stats, orders, history) = self.fetch(&window).await.inspect_err(|e| {
            error!(window = %window, error = %e, "data source failed; report aborted");
        })?;

        let table = aggregate(call_stats, &orders);
        let total = table.total();
        let bonus_per_order = self.settings.tiers.bonus_per_order(total.conversion);
        let pool = bonus_pool(bonus_per_order, total.orders_count);
        info!(
            orders = total.orders_count,
            conversion = total.conversion,
            bonus_per_order,
            pool,
            "department statistics aggregated"
        );

        let split = if pool > 0.0 {
            self.negotiate(&table, bonus_per_order, pool).await
        } else {
            BonusSplit::empty(pool, table.operators())
        };

        let payroll = build_payroll(&table, &split, &self.settings);
        let telephony = self.prompt_amount(TELEPHONY_PROMPT).await?;
        let sms = self.prompt_amount(SMS_PROMPT).await?;
        let costs = expenses(&payroll, telephony, sms);

        let report = WeeklyReport {
            window,
            city_statistics: city_statistics(&history, &orders, &window, &self.settings.cities),
            daily_received_calls: unique_received_calls_by_operator(
                &history,
                &window,
                &self.settings.roster,
            ),
            department_payment: payroll.department_payment,
            department_price_per_order: payroll.department_price_per_order,
            telephony_payment: telephony,
            sms_payment: sms,
            total_expenses: costs.total_expenses,
            total_orders_count: payroll.total_orders,
            total_price_per_order: costs.total_price_per_order,
            summary_department_salary: payroll.summary_salary,
            summary_department_bonus: payroll.summary_bonus,
            sum_to_pay: payroll.summary_salary + payroll.summary_bonus,
            bonus_per_order,
            personal_bonus_per_order: split.personal_rate,
            operator_reports: payroll.lines,
        };

        info!(
            window = %window,
            to_pay = report.sum_to_pay,
            expenses = report.total_expenses,
            "weekly report ready"
        );
        Ok(report)
    }

    async fn fetch(
        &self,
        window: &DateWindow,
    ) -> Result<(Vec<DatabaseStatistic>, Vec<Order>, Vec<HistoryRecord>), DomainError> {
        let call_stats = self.data.get_unique_calls_by_operator(window).await?;
        let orders = self.data.get_orders(window).await?;
        let history = self.data.get_history(self.settings.history_days).await?;
        Ok((call_stats, orders, history))
    }

    /// Run the personal-rate negotiation until the human accepts a split.
    /// A failed read counts as acceptance of the last proposed rate.
    async fn negotiate(&self, table: &StatisticTable, bonus_per_order: f64, pool: f64) -> BonusSplit {
        let mut negotiation = Negotiation::new(
            pool,
            bonus_per_order,
            table.operators(),
            self.settings.min_conversion_grade,
        );
        self.notify(&negotiation.opening_message()).await;

        loop {
            let line = match self.channel.receive().await {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "channel read failed during negotiation; accepting last rate");
                    return negotiation.accept();
                }
            };
            match negotiation.submit(&line) {
                NegotiationStep::Proposal(split) => {
                    info!(rate = split.personal_rate, head_bonus = split.head_bonus, "bonus split proposed");
                    self.notify(&format_proposal(&split, &self.settings.head_name))
                        .await;
                }
                NegotiationStep::Accepted(split) => {
                    info!(rate = split.personal_rate, "bonus split accepted");
                    self.notify(&format!(
                        "Размер персональной премии {}",
                        split.personal_rate
                    ))
                    .await;
                    return split;
                }
            }
        }
    }

    /// Ask for a money amount until a number arrives. Transient read errors are retried.
    async fn prompt_amount(&self, question: &str) -> Result<f64, DomainError> {
        self.notify(question).await;
        loop {
            match self.channel.receive().await {
                Ok(line) => match parse_rate(&line) {
                    Some(value) => return Ok(value),
                    None => self.notify(NOT_A_NUMBER).await,
                },
                Err(DomainError::ChannelClosed(reason)) => {
                    error!(reason = %reason, "channel closed while waiting for an amount");
                    return Err(DomainError::ChannelClosed(reason));
                }
                Err(e) => {
                    warn!(error = %e, "channel read failed; retrying");
                    tokio::time::sleep(READ_RETRY_DELAY).await;
                }
            }
        }
    }

    async fn notify(&self, text: &str) {
        if let Err(e) = self.channel.send(text).await {
            warn!(error = %e, "failed to send message to channel");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::channel::ScriptedChannel;
    use crate::adapters::persistence::InMemoryDataSource;
    use crate::domain::bonus::{BonusTier, BonusTiers};
    use crate::domain::cities::CityTable;
    use crate::domain::entities::CITY_TOTAL_LABEL;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 6, d).unwrap()
    }

    fn window() -> DateWindow {
        DateWindow::new(day(12), day(18)).unwrap()
    }

    fn settings(tiers: &[(f64, f64)]) -> Arc<ReportSettings> {
        Arc::new(ReportSettings {
            roster: vec!["A".to_string(), "B".to_string()],
            cities: CityTable::new([("Москва", "^7495"), ("Спб", "^7812")]).unwrap(),
            tiers: BonusTiers::new(tiers.iter().map(|&(grade, bonus_per_order)| BonusTier {
                grade,
                bonus_per_order,
            })),
            order_fee: 80.0,
            head_rate: 20.0,
            head_name: "Виктор".to_string(),
            min_conversion_grade: 0.28,
            history_days: 90,
        })
    }

    fn calls(operator: &str, incoming: usize, outgoing: usize) -> DatabaseStatistic {
        let mut stat = DatabaseStatistic::new(operator);
        stat.add_incoming_calls(incoming);
        stat.add_outgoing_calls(outgoing);
        stat
    }

    fn orders(counts: &[(&str, &str, usize)]) -> Vec<Order> {
        let mut out = Vec::new();
        for (operator, city, n) in counts {
            for _ in 0..*n {
                out.push(Order {
                    id: out.len() as u64 + 1,
                    date: day(13),
                    city: city.to_string(),
                    operator: operator.to_string(),
                });
            }
        }
        out
    }

    fn history() -> Vec<HistoryRecord> {
        let record = |d, caller: &str, operator: &str, line: &str| HistoryRecord {
            date: day(d),
            caller: caller.to_string(),
            operator: operator.to_string(),
            line_number: line.to_string(),
        };
        vec![
            record(1, "900", "A", "74950000000"),
            record(12, "900", "A", "74950000000"),
            record(12, "901", "A", "74950000000"),
            record(13, "902", "", "74950000000"),
            record(13, "903", "B", "78120000000"),
        ]
    }

    #[tokio::test]
    async fn test_report_without_bonus_tier() {
        // Department conversion 3/10 = 30%: grade 40 is not exceeded, grade 0 pays nothing.
        let data = Arc::new(InMemoryDataSource::new(
            history(),
            orders(&[("A", "Москва", 2), ("", "Спб", 1)]),
            vec![calls("A", 3, 2), calls("B", 5, 0)],
        ));
        let channel = Arc::new(ScriptedChannel::new(["1000", "500,5"]));
        let service = ReportService::new(data, channel.clone(), settings(&[(40.0, 10.0), (0.0, 0.0)]));

        let report = service.make_report(window()).await.unwrap();

        assert_eq!(report.bonus_per_order, 0.0);
        assert_eq!(report.summary_department_bonus, 0.0);
        assert_eq!(report.total_orders_count, 3);
        assert_eq!(report.operator_reports.len(), 3);
        let a = &report.operator_reports[0];
        assert_eq!(a.name, "A");
        assert!((a.conversion - 0.4).abs() < 1e-12);
        assert_eq!(a.salary, 160.0);
        assert_eq!(a.price_per_order, 80.0);
        assert_eq!(report.operator_reports[1].conversion, 0.0);
        let head = &report.operator_reports[2];
        assert_eq!(head.name, "Виктор");
        assert_eq!(head.salary, 60.0);
        assert_eq!(head.bonus, 0.0);

        assert_eq!(report.department_payment, 220.0);
        assert_eq!(report.telephony_payment, 1000.0);
        assert_eq!(report.sms_payment, 500.5);
        assert_eq!(report.total_expenses, 1720.5);
        assert_eq!(report.total_price_per_order, 573.5);
        assert_eq!(report.sum_to_pay, 220.0);

        // Only the two cost prompts were asked.
        assert_eq!(
            channel.sent(),
            vec![TELEPHONY_PROMPT.to_string(), SMS_PROMPT.to_string()]
        );

        let cities = &report.city_statistics;
        assert_eq!(cities.last().unwrap().city, CITY_TOTAL_LABEL);
        // Caller 900 first called before the window and is not counted.
        assert_eq!(cities[0].city, "Москва");
        assert_eq!(cities[0].unique_calls_total, 2);
        assert_eq!(cities[0].unique_calls_received, 1);
        assert_eq!(cities[0].orders_count, 2);
        assert_eq!(report.daily_received_calls[&day(12)].get("A"), Some(&1));
        assert_eq!(report.daily_received_calls[&day(13)].get("B"), Some(&1));
    }

    #[tokio::test]
    async fn test_report_with_negotiated_bonus() {
        // A: 30/100 = 0.30, B: 16/80 = 0.20. Department with 35 unassigned orders: 81/180 = 45%.
        let data = Arc::new(InMemoryDataSource::new(
            history(),
            orders(&[("A", "Москва", 30), ("B", "Спб", 16), ("", "Москва", 35)]),
            vec![calls("A", 60, 40), calls("B", 80, 0)],
        ));
        let channel = Arc::new(ScriptedChannel::new(["10", "20", "годится", "0", "0"]));
        let service = ReportService::new(
            data,
            channel.clone(),
            settings(&[(40.0, 35.0), (30.0, 20.0), (0.0, 0.0)]),
        );

        let report = service.make_report(window()).await.unwrap();

        assert_eq!(report.bonus_per_order, 35.0);
        // round_half_even(35 * 81)
        assert_eq!(report.summary_department_bonus, 2835.0);
        assert_eq!(report.personal_bonus_per_order, 20.0);

        let a = &report.operator_reports[0];
        assert_eq!(a.bonus, 600.0);
        let b = &report.operator_reports[1];
        assert_eq!(b.bonus, 0.0);
        let head = &report.operator_reports[2];
        assert_eq!(head.bonus, 2835.0 - 600.0);
        assert_eq!(head.salary, 81.0 * 20.0);

        let sent = channel.sent();
        assert!(sent[0].contains("Премия за заказ 35"));
        assert!(sent[1].contains("A 300"));
        assert!(sent[2].contains("A 600"));
        assert!(sent[2].contains("Виктор 2235"));
        assert!(sent[3].contains("20"));
        assert_eq!(channel.remaining(), 0);
    }

    #[tokio::test]
    async fn test_read_error_during_negotiation_accepts_last_rate() {
        let data = Arc::new(InMemoryDataSource::new(
            vec![],
            orders(&[("A", "Москва", 50)]),
            vec![calls("A", 100, 0), calls("B", 0, 0)],
        ));
        let channel = Arc::new(ScriptedChannel::with_results(vec![
            Ok("10".to_string()),
            Err(DomainError::Channel("network".into())),
            Err(DomainError::Channel("network".into())),
            Ok("abc".to_string()),
            Ok("300".to_string()),
            Ok("0".to_string()),
        ]));
        let service = ReportService::new(data, channel.clone(), settings(&[(40.0, 35.0)]));

        let report = service.make_report(window()).await.unwrap();

        assert_eq!(report.personal_bonus_per_order, 10.0);
        assert_eq!(report.operator_reports[0].bonus, 500.0);
        // Second read error was retried by the telephony prompt, "abc" re-prompted.
        assert_eq!(report.telephony_payment, 300.0);
        assert!(channel.sent().iter().any(|m| m == NOT_A_NUMBER));
    }

    #[tokio::test]
    async fn test_closed_channel_aborts_cost_entry() {
        let data = Arc::new(InMemoryDataSource::new(vec![], vec![], vec![calls("A", 0, 0)]));
        let channel = Arc::new(ScriptedChannel::new(Vec::<String>::new()));
        let service = ReportService::new(data, channel, settings(&[]));
        let err = service.make_report(window()).await.unwrap_err();
        assert!(matches!(err, DomainError::ChannelClosed(_)));
    }

    #[tokio::test]
    async fn test_concurrent_run_is_rejected() {
        let data = Arc::new(InMemoryDataSource::default());
        let channel = Arc::new(ScriptedChannel::default());
        let service = ReportService::new(data, channel, settings(&[]));

        let _held = service.run_guard.lock().await;
        let err = service.make_report(window()).await.unwrap_err();
        assert!(matches!(err, DomainError::Busy));
    }
}
