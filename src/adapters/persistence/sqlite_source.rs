//! SQLite-backed data source via libsql. Implements DataSourcePort.
//!
//! One database file (data/calls.db) with two tables filled by the telephony and
//! CRM exports: `calls` (one row per call leg) and `orders`. Dates are stored as
//! `YYYY-MM-DD` text, optionally followed by a time; only the day part is used.

use crate::domain::settings::normalize_operator_name;
use crate::domain::{DatabaseStatistic, DateWindow, DomainError, HistoryRecord, Order};
use crate::ports::DataSourcePort;
use chrono::{Days, Local, NaiveDate};
use libsql::{Database, params};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

const CALLS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS calls (
    date TEXT NOT NULL,
    caller TEXT NOT NULL,
    operator TEXT NOT NULL DEFAULT '',
    line_number TEXT NOT NULL DEFAULT '',
    direction TEXT NOT NULL,
    is_unique INTEGER NOT NULL DEFAULT 0
)"#;
const CALLS_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_calls_date ON calls (date)";

const ORDERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id INTEGER PRIMARY KEY,
    date TEXT NOT NULL,
    city TEXT NOT NULL DEFAULT '',
    operator TEXT
)"#;
const ORDERS_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_orders_date ON orders (date)";

/// Value of `calls.direction` for incoming external calls.
pub const DIRECTION_INCOMING: &str = "incoming";
/// Value of `calls.direction` for outgoing external calls.
pub const DIRECTION_OUTGOING: &str = "outgoing";

fn db_err(e: impl std::fmt::Display) -> DomainError {
    DomainError::DataSource(e.to_string())
}

fn parse_db_date(raw: &str) -> Result<NaiveDate, DomainError> {
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| DomainError::DataSource(format!("bad date {:?}: {}", raw, e)))
}

/// SQLite data source. Operator names are mapped onto the roster on read.
pub struct SqliteDataSource {
    db: Database,
    roster: Vec<String>,
}

impl SqliteDataSource {
    /// Open (or create) `calls.db` in `base_dir` and ensure the schema exists.
    pub async fn connect(base_dir: impl AsRef<Path>, roster: Vec<String>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(db_err)?;
        let db_path = base.join("calls.db");
        let db = libsql::Builder::new_local(db_path.to_string_lossy().as_ref())
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        // PRAGMA returns a row; execute() refuses statements that return rows.
        let mut wal_rows = conn
            .query("PRAGMA journal_mode=WAL", ())
            .await
            .map_err(|e| DomainError::DataSource(format!("WAL pragma failed: {}", e)))?;
        while wal_rows.next().await.map_err(db_err)?.is_some() {}

        for ddl in [CALLS_TABLE, CALLS_INDEX, ORDERS_TABLE, ORDERS_INDEX] {
            conn.execute(ddl, ()).await.map_err(db_err)?;
        }

        info!(path = %db_path.display(), operators = roster.len(), "SQLite data source connected");
        Ok(Self { db, roster })
    }

    async fn history_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HistoryRecord>, DomainError> {
        let conn = self.db.connect().map_err(db_err)?;
        let mut rows = conn
            .query(
                r#"
                SELECT date, caller, operator, line_number
                FROM calls
                WHERE direction = ?1 AND date(date) BETWEEN ?2 AND ?3
                ORDER BY date, rowid
                "#,
                params![DIRECTION_INCOMING, from.to_string(), to.to_string()],
            )
            .await
            .map_err(db_err)?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            let date: String = row.get(0).map_err(db_err)?;
            let caller: String = row.get(1).map_err(db_err)?;
            let operator: String = row.get::<String>(2).unwrap_or_default();
            let line_number: String = row.get::<String>(3).unwrap_or_default();
            records.push(HistoryRecord {
                date: parse_db_date(&date)?,
                caller,
                operator: normalize_operator_name(&operator, &self.roster),
                line_number,
            });
        }
        debug!(from = %from, to = %to, count = records.len(), "history loaded");
        Ok(records)
    }
}

#[async_trait::async_trait]
impl DataSourcePort for SqliteDataSource {
    async fn get_history(&self, window_days: u32) -> Result<Vec<HistoryRecord>, DomainError> {
        let today = Local::now().date_naive();
        let from = today
            .checked_sub_days(Days::new(u64::from(window_days)))
            .unwrap_or(NaiveDate::MIN);
        self.history_between(from, today).await
    }

    async fn get_orders(&self, window: &DateWindow) -> Result<Vec<Order>, DomainError> {
        let conn = self.db.connect().map_err(db_err)?;
        let mut rows = conn
            .query(
                r#"
                SELECT id, date, city, COALESCE(operator, '')
                FROM orders
                WHERE date(date) BETWEEN ?1 AND ?2
                ORDER BY id
                "#,
                params![window.from.to_string(), window.to.to_string()],
            )
            .await
            .map_err(db_err)?;

        let mut orders = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            let id: i64 = row.get(0).map_err(db_err)?;
            let date: String = row.get(1).map_err(db_err)?;
            let city: String = row.get::<String>(2).unwrap_or_default();
            let operator: String = row.get::<String>(3).unwrap_or_default();
            orders.push(Order {
                id: id as u64,
                date: parse_db_date(&date)?,
                city,
                operator: normalize_operator_name(&operator, &self.roster),
            });
        }
        debug!(window = %window, count = orders.len(), "orders loaded");
        Ok(orders)
    }

    async fn get_unique_calls_by_operator(
        &self,
        window: &DateWindow,
    ) -> Result<Vec<DatabaseStatistic>, DomainError> {
        let conn = self.db.connect().map_err(db_err)?;
        let mut rows = conn
            .query(
                r#"
                SELECT operator, direction
                FROM calls
                WHERE is_unique = 1 AND date(date) BETWEEN ?1 AND ?2
                "#,
                params![window.from.to_string(), window.to.to_string()],
            )
            .await
            .map_err(db_err)?;

        let mut stats: BTreeMap<String, DatabaseStatistic> = self
            .roster
            .iter()
            .map(|o| (o.clone(), DatabaseStatistic::new(o.as_str())))
            .collect();

        while let Some(row) = rows.next().await.map_err(db_err)? {
            let operator: String = row.get::<String>(0).unwrap_or_default();
            let direction: String = row.get(1).map_err(db_err)?;
            let name = normalize_operator_name(&operator, &self.roster);
            let Some(stat) = stats.get_mut(&name) else {
                continue;
            };
            match direction.as_str() {
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

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 6, d).unwrap()
    }

    async fn seeded() -> (SqliteDataSource, TempDir) {
        let dir = TempDir::new().unwrap();
        let source = SqliteDataSource::connect(dir.path(), vec!["Анна".to_string(), "Олег".to_string()])
            .await
            .unwrap();
        let conn = source.db.connect().unwrap();
        let calls = [
            ("2023-06-10 09:00:00", "900", "", "74950000000", DIRECTION_INCOMING, 1),
            ("2023-06-12 10:00:00", "901", "Анна (доб. 11)", "74950000000", DIRECTION_INCOMING, 1),
            ("2023-06-12 11:00:00", "901", "Олег", "74950000000", DIRECTION_INCOMING, 0),
            ("2023-06-13 12:00:00", "902", "олег", "78120000000", DIRECTION_OUTGOING, 1),
            ("2023-06-19 12:00:00", "903", "Анна", "78120000000", DIRECTION_INCOMING, 1),
            ("2023-06-14 12:00:00", "904", "Стажер", "78120000000", DIRECTION_INCOMING, 1),
        ];
        for (date, caller, operator, line, direction, unique) in calls {
            conn.execute(
                "INSERT INTO calls (date, caller, operator, line_number, direction, is_unique) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![date, caller, operator, line, direction, unique],
            )
            .await
            .unwrap();
        }
        conn.execute(
            "INSERT INTO orders (id, date, city, operator) VALUES (1, '2023-06-12', 'Москва', 'Анна'), (2, '2023-06-18 23:59:00', 'Спб', NULL), (3, '2023-06-19', 'Спб', 'Олег')",
            (),
        )
        .await
        .unwrap();
        (source, dir)
    }

    #[tokio::test]
    async fn test_orders_inside_window_with_normalized_operators() {
        let (source, _dir) = seeded().await;
        let window = DateWindow::new(day(12), day(18)).unwrap();
        let orders = source.get_orders(&window).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].operator, "Анна");
        assert_eq!(orders[1].operator, "");
        assert_eq!(orders[1].date, day(18));
    }

    #[tokio::test]
    async fn test_unique_calls_seeded_with_roster() {
        let (source, _dir) = seeded().await;
        let window = DateWindow::new(day(12), day(18)).unwrap();
        let stats = source.get_unique_calls_by_operator(&window).await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].operator, "Анна");
        assert_eq!(stats[0].unique_incoming_calls, 1);
        assert_eq!(stats[1].operator, "Олег");
        assert_eq!(stats[1].unique_incoming_calls, 0);
        assert_eq!(stats[1].unique_outgoing_calls, 1);
    }

    #[tokio::test]
    async fn test_history_is_incoming_and_chronological() {
        let (source, _dir) = seeded().await;
        let history = source.history_between(day(1), day(30)).await.unwrap();
        let callers: Vec<&str> = history.iter().map(|r| r.caller.as_str()).collect();
        assert_eq!(callers, vec!["900", "901", "901", "904", "903"]);
        assert_eq!(history[1].operator, "Анна");
        assert_eq!(history[0].date, day(10));
    }
}
