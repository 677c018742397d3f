//! CSV-backed data source. Implements DataSourcePort over telephony/CRM exports.
//!
//! Two `;`-delimited files with a header row, `#` comment lines and `DD.MM.YYYY` dates:
//! - `calls.csv`: `date;caller;operator;line_number;direction;unique`
//! - `orders.csv`: `id;date;city;operator`
//!
//! Files are re-read on every call so a fresh export is picked up without a restart.

use crate::adapters::persistence::sqlite_source::{DIRECTION_INCOMING, DIRECTION_OUTGOING};
use crate::domain::entities::parse_date;
use crate::domain::settings::normalize_operator_name;
use crate::domain::{DatabaseStatistic, DateWindow, DomainError, HistoryRecord, Order};
use crate::ports::DataSourcePort;
use chrono::{Days, Local, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const CALLS_FILE: &str = "calls.csv";
const ORDERS_FILE: &str = "orders.csv";

#[derive(Debug, Deserialize)]
struct CallRow {
    date: String,
    caller: String,
    #[serde(default)]
    operator: String,
    #[serde(default)]
    line_number: String,
    direction: String,
    #[serde(default)]
    unique: u8,
}

#[derive(Debug, Deserialize)]
struct OrderRow {
    id: u64,
    date: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    operator: String,
}

/// A call row with its date parsed.
struct Call {
    date: NaiveDate,
    row: CallRow,
}

/// Data source reading `calls.csv` and `orders.csv` from one directory.
pub struct CsvDataSource {
    dir: PathBuf,
    roster: Vec<String>,
}

impl CsvDataSource {
    pub fn new(dir: impl Into<PathBuf>, roster: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            roster,
        }
    }

    async fn read_rows<T>(&self, file: &str) -> Result<Vec<T>, DomainError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let path = self.dir.join(file);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| DomainError::DataSource(format!("{}: {}", path.display(), e)))?;
        parse_rows(&bytes, &path)
    }

    async fn calls(&self) -> Result<Vec<Call>, DomainError> {
        let rows: Vec<CallRow> = self.read_rows(CALLS_FILE).await?;
        rows.into_iter()
            .map(|row| {
                let date = parse_date(&row.date)
                    .map_err(|e| DomainError::DataSource(format!("{}: {}", CALLS_FILE, e)))?;
                Ok(Call { date, row })
            })
            .collect()
    }

    fn history_between(&self, calls: Vec<Call>, from: NaiveDate, to: NaiveDate) -> Vec<HistoryRecord> {
        // Stable sort keeps file order for calls of the same day.
        let mut history: Vec<HistoryRecord> = calls
            .into_iter()
            .filter(|c| c.row.direction == DIRECTION_INCOMING && c.date >= from && c.date <= to)
            .map(|c| HistoryRecord {
                date: c.date,
                operator: normalize_operator_name(&c.row.operator, &self.roster),
                caller: c.row.caller,
                line_number: c.row.line_number,
            })
            .collect();
        history.sort_by_key(|r| r.date);
        history
    }
}

fn parse_rows<T>(bytes: &[u8], path: &Path) -> Result<Vec<T>, DomainError>
where
    T: for<'de> Deserialize<'de>,
{
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .comment(Some(b'#'))
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);
    reader
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()
        .map_err(|e| DomainError::DataSource(format!("{}: {}", path.display(), e)))
}

#[async_trait::async_trait]
impl DataSourcePort for CsvDataSource {
    async fn get_history(&self, window_days: u32) -> Result<Vec<HistoryRecord>, DomainError> {
        let today = Local::now().date_naive();
        let from = today
            .checked_sub_days(Days::new(u64::from(window_days)))
            .unwrap_or(NaiveDate::MIN);
        let calls = self.calls().await?;
        let history = self.history_between(calls, from, today);
        debug!(count = history.len(), "history loaded from csv");
        Ok(history)
    }

    async fn get_orders(&self, window: &DateWindow) -> Result<Vec<Order>, DomainError> {
        let rows: Vec<OrderRow> = self.read_rows(ORDERS_FILE).await?;
        let mut orders = Vec::new();
        for row in rows {
            let date = parse_date(&row.date)
                .map_err(|e| DomainError::DataSource(format!("{}: {}", ORDERS_FILE, e)))?;
            if !window.contains(date) {
                continue;
            }
            orders.push(Order {
                id: row.id,
                date,
                city: row.city,
                operator: normalize_operator_name(&row.operator, &self.roster),
            });
        }
        debug!(window = %window, count = orders.len(), "orders loaded from csv");
        Ok(orders)
    }

    async fn get_unique_calls_by_operator(
        &self,
        window: &DateWindow,
    ) -> Result<Vec<DatabaseStatistic>, DomainError> {
        let mut stats: BTreeMap<String, DatabaseStatistic> = self
            .roster
            .iter()
            .map(|o| (o.clone(), DatabaseStatistic::new(o.as_str())))
            .collect();

        for call in self.calls().await? {
            if call.row.unique != 1 || !window.contains(call.date) {
                continue;
            }
            let name = normalize_operator_name(&call.row.operator, &self.roster);
            let Some(stat) = stats.get_mut(&name) else {
                continue;
            };
            match call.row.direction.as_str() {
                DIRECTION_INCOMING => stat.add_incoming_calls(1),
                DIRECTION_OUTGOING => stat.add_outgoing_calls(1),
                _ => {}
            }
        }
        Ok(stats.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CALLS: &str = "\
date;caller;operator;line_number;direction;unique
# exported from telephony
12.06.2023;901;Анна;74950000000;incoming;1
12.06.2023;902;;78120000000;incoming;1
13.06.2023;903;олег;78120000000;outgoing;1
11.06.2023;900;Анна;74950000000;incoming;1
";

    const ORDERS: &str = "\
id;date;city;operator
1;12.06.2023;Москва;Анна
2;18.06.2023;Спб;
3;19.06.2023;Спб;Олег
";

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 6, d).unwrap()
    }

    fn source() -> (CsvDataSource, TempDir) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CALLS_FILE), CALLS).unwrap();
        std::fs::write(dir.path().join(ORDERS_FILE), ORDERS).unwrap();
        let source = CsvDataSource::new(dir.path(), vec!["Анна".to_string(), "Олег".to_string()]);
        (source, dir)
    }

    #[tokio::test]
    async fn test_orders_filtered_and_normalized() {
        let (source, _dir) = source();
        let window = DateWindow::new(day(12), day(18)).unwrap();
        let orders = source.get_orders(&window).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].operator, "Анна");
        assert_eq!(orders[1].operator, "");
    }

    #[tokio::test]
    async fn test_operator_stats_from_csv() {
        let (source, _dir) = source();
        let window = DateWindow::new(day(12), day(18)).unwrap();
        let stats = source.get_unique_calls_by_operator(&window).await.unwrap();
        assert_eq!(stats[0].operator, "Анна");
        assert_eq!(stats[0].unique_incoming_calls, 1);
        assert_eq!(stats[1].unique_outgoing_calls, 1);
    }

    #[tokio::test]
    async fn test_history_sorted_by_date() {
        let (source, _dir) = source();
        let calls = source.calls().await.unwrap();
        let history = source.history_between(calls, day(1), day(30));
        let callers: Vec<&str> = history.iter().map(|r| r.caller.as_str()).collect();
        assert_eq!(callers, vec!["900", "901", "902"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_data_source_error() {
        let dir = TempDir::new().unwrap();
        let source = CsvDataSource::new(dir.path(), vec![]);
        let window = DateWindow::new(day(12), day(18)).unwrap();
        assert!(matches!(
            source.get_orders(&window).await,
            Err(DomainError::DataSource(_))
        ));
    }
}
