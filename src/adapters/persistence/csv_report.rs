//! Payroll sheet writer. Implements ReportSinkPort with the `csv` crate.
//!
//! The sheet is `;`-delimited and encoded as Windows-1251, which is what Excel with a
//! Russian locale assumes for a CSV file.
//! Sections, separated by an empty row: payroll, city rollup, totals, daily calls.

use crate::domain::entities::DATE_LAYOUT;
use crate::domain::{CityStatistic, DomainError, WeeklyReport};
use crate::ports::ReportSinkPort;
use encoding_rs::WINDOWS_1251;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

const PAYROLL_HEADER: [&str; 8] = [
    "ФИО",
    "ЗП",
    "Премия",
    "ЗП + Премия",
    "Принято заказов",
    "Цена за заказ",
    "ун. зв.",
    "конв.",
];

fn money(value: f64) -> String {
    format!("{:.2}", value)
}

fn percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

// The ruble sign has no Windows-1251 code point.
fn rubles(value: f64) -> String {
    format!("{:.2} руб.", value)
}

/// Encode sheet text as Windows-1251.
///
/// Characters outside the code page (emoji in a name, say) become `&#NNNN;`
/// references instead of failing the whole report.
pub fn to_windows_1251(text: &str) -> Vec<u8> {
    let (bytes, _, had_unmappable) = WINDOWS_1251.encode(text);
    if had_unmappable {
        warn!("report has characters outside Windows-1251; replaced with numeric references");
    }
    bytes.into_owned()
}

/// Writes the weekly report as a CSV sheet.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReportSink;

impl CsvReportSink {
    pub fn new() -> Self {
        Self
    }

    /// Render the sheet in memory, before encoding.
    pub fn render(report: &WeeklyReport) -> Result<String, DomainError> {
        Self::write_sheet(report).map_err(|e| DomainError::Report(e.to_string()))
    }

    fn write_sheet(report: &WeeklyReport) -> Result<String, csv::Error> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_writer(Vec::new());

        wtr.write_record(PAYROLL_HEADER)?;
        for line in &report.operator_reports {
            wtr.write_record([
                line.name.clone(),
                money(line.salary),
                money(line.bonus),
                money(line.summary_payment),
                line.orders_count.to_string(),
                money(line.price_per_order),
                line.unique_calls.to_string(),
                percent(line.conversion),
            ])?;
        }
        wtr.write_record([
            "Цена заказа по операторам".to_string(),
            money(report.department_payment),
            String::new(),
            String::new(),
            String::new(),
            money(report.department_price_per_order),
        ])?;
        wtr.write_record(["Манго".to_string(), money(report.telephony_payment)])?;
        wtr.write_record(["Оплата СМС сервиса".to_string(), money(report.sms_payment)])?;
        wtr.write_record([
            "Итого".to_string(),
            money(report.total_expenses),
            String::new(),
            String::new(),
            report.total_orders_count.to_string(),
            money(report.total_price_per_order),
        ])?;
        wtr.write_record([""])?;

        let cities = &report.city_statistics;
        let mut header = vec![String::new()];
        header.extend(cities.iter().map(|c| c.city.clone()));
        wtr.write_record(&header)?;
        let rows: [(&str, fn(&CityStatistic) -> String); 5] = [
            ("Звонков уникальных всего", |c: &CityStatistic| c.unique_calls_total.to_string()),
            ("Звонков уникальных успешных", |c: &CityStatistic| c.unique_calls_received.to_string()),
            ("Звонков уникальных пропущено", |c: &CityStatistic| c.unique_calls_missed.to_string()),
            ("Заказов принято", |c: &CityStatistic| c.orders_count.to_string()),
            ("Конверсия", |c: &CityStatistic| percent(c.conversion)),
        ];
        for (label, cell) in rows {
            let mut record = vec![label.to_string()];
            record.extend(cities.iter().map(|c| cell(c)));
            wtr.write_record(&record)?;
        }
        wtr.write_record([""])?;

        wtr.write_record([
            "ЗП операторы, общая сумма".to_string(),
            rubles(report.summary_department_salary),
        ])?;
        wtr.write_record([
            "Премия операторы, общая сумма".to_string(),
            rubles(report.summary_department_bonus),
        ])?;
        wtr.write_record(["Итого за неделю".to_string(), rubles(report.sum_to_pay)])?;

        if !report.daily_received_calls.is_empty() {
            wtr.write_record([""])?;
            let operators: BTreeSet<&str> = report
                .daily_received_calls
                .values()
                .flat_map(|per_operator| per_operator.keys().map(String::as_str))
                .collect();
            let mut header = vec!["Принятые уникальные звонки".to_string()];
            header.extend(operators.iter().map(|o| o.to_string()));
            wtr.write_record(&header)?;
            for (date, per_operator) in &report.daily_received_calls {
                let mut record = vec![date.format(DATE_LAYOUT).to_string()];
                record.extend(
                    operators
                        .iter()
                        .map(|o| per_operator.get(*o).copied().unwrap_or(0).to_string()),
                );
                wtr.write_record(&record)?;
            }
        }

        wtr.flush()?;
        let bytes = wtr
            .into_inner()
            .map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))?;
        String::from_utf8(bytes).map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))
    }
}

#[async_trait::async_trait]
impl ReportSinkPort for CsvReportSink {
    async fn save_report(&self, report: &WeeklyReport, path: &Path) -> Result<(), DomainError> {
        let bytes = to_windows_1251(&Self::render(report)?);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::Report(e.to_string()))?;
        }
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|e| DomainError::Report(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), window = %report.window, bytes = bytes.len(), "report saved");
        Ok(())
    }
}
