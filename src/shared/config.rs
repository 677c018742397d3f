//! Application configuration: payroll rules, cities, Telegram credentials, schedule, paths.
//!
//! Sources, later ones win: `config.yaml` in the working directory (optional), the file
//! named by `CALL_REPORT_CONFIG`, then `CALL_REPORT_*` environment variables with `__`
//! between nested keys (e.g. `CALL_REPORT_TELEGRAM__TOKEN`).

use crate::domain::{BonusTier, BonusTiers, CityTable, DomainError, ReportSettings};
use chrono::NaiveTime;
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_ORDER_FEE: f64 = 80.0;
pub const DEFAULT_HEAD_RATE: f64 = 20.0;
pub const DEFAULT_HEAD_NAME: &str = "Руководитель";
pub const DEFAULT_PERSONAL_CONVERSION_GRADE: f64 = 0.28;
pub const DEFAULT_HISTORY_DAYS: u32 = 90;
pub const DEFAULT_WEEKDAY_TIME: &str = "20:00";
pub const DEFAULT_WEEKEND_TIME: &str = "18:00";
pub const DEFAULT_OUTPUT_PATH: &str = "data/report.csv";
pub const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub salary: SalaryConfig,
    /// Known cities and the regex of their incoming line numbers.
    #[serde(default)]
    pub cities: Vec<CityConfig>,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub data: DataConfig,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct SalaryConfig {
    pub order_fee: Option<f64>,
    pub head_rate: Option<f64>,
    pub head_name: Option<String>,
    /// Personal conversion (ratio) an operator must exceed to get a bonus.
    pub personal_conversion_grade: Option<f64>,
    /// Operators on payroll.
    #[serde(default)]
    pub operators: Vec<String>,
    /// Tier table: department conversion grade in percent → bonus per order.
    #[serde(default)]
    pub motivation: Vec<MotivationConfig>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct MotivationConfig {
    pub grade: f64,
    pub bonus_per_order: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CityConfig {
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct TelegramConfig {
    pub token: Option<String>,
    /// Admin chat: the only chat allowed to drive the bot; digests and reports go there.
    pub chat_id: Option<i64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ReportConfig {
    /// `HH:MM`, Monday to Friday.
    pub weekday_time: Option<String>,
    /// `HH:MM`, Saturday and Sunday.
    pub weekend_time: Option<String>,
    pub history_days: Option<u32>,
    pub output_path: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    #[default]
    Sqlite,
    Csv,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct DataConfig {
    pub source: Option<DataSourceKind>,
    pub dir: Option<String>,
}

fn parse_time(raw: &str, key: &str) -> Result<NaiveTime, DomainError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|e| DomainError::Config(format!("{}: expected HH:MM, got {:?}: {}", key, raw, e)))
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder()
            .add_source(config::File::with_name("config").required(false));
        if let Ok(path) = std::env::var("CALL_REPORT_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        c = c.add_source(
            config::Environment::with_prefix("CALL_REPORT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        c.build()?.try_deserialize()
    }

    /// Compile the immutable engine settings. Fails on bad regexes or tier values.
    pub fn report_settings(&self) -> Result<ReportSettings, DomainError> {
        let roster: Vec<String> = self
            .salary
            .operators
            .iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if roster.is_empty() {
            return Err(DomainError::Config("salary.operators is empty".to_string()));
        }

        if let Some(bad) = self
            .salary
            .motivation
            .iter()
            .find(|t| !t.grade.is_finite() || !t.bonus_per_order.is_finite())
        {
            return Err(DomainError::Config(format!(
                "salary.motivation: non-numeric tier {:?}",
                bad
            )));
        }
        let tiers = BonusTiers::new(self.salary.motivation.iter().map(|t| BonusTier {
            grade: t.grade,
            bonus_per_order: t.bonus_per_order,
        }));

        let cities = CityTable::new(
            self.cities
                .iter()
                .map(|c| (c.name.trim().to_string(), c.pattern.as_str())),
        )?;

        Ok(ReportSettings {
            roster,
            cities,
            tiers,
            order_fee: self.salary.order_fee.unwrap_or(DEFAULT_ORDER_FEE),
            head_rate: self.salary.head_rate.unwrap_or(DEFAULT_HEAD_RATE),
            head_name: self
                .salary
                .head_name
                .clone()
                .unwrap_or_else(|| DEFAULT_HEAD_NAME.to_string()),
            min_conversion_grade: self
                .salary
                .personal_conversion_grade
                .unwrap_or(DEFAULT_PERSONAL_CONVERSION_GRADE),
            history_days: self.report.history_days.unwrap_or(DEFAULT_HISTORY_DAYS),
        })
    }

    pub fn weekday_time(&self) -> Result<NaiveTime, DomainError> {
        parse_time(
            self.report.weekday_time.as_deref().unwrap_or(DEFAULT_WEEKDAY_TIME),
            "report.weekday_time",
        )
    }

    pub fn weekend_time(&self) -> Result<NaiveTime, DomainError> {
        parse_time(
            self.report.weekend_time.as_deref().unwrap_or(DEFAULT_WEEKEND_TIME),
            "report.weekend_time",
        )
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(self.report.output_path.as_deref().unwrap_or(DEFAULT_OUTPUT_PATH))
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(self.data.dir.as_deref().unwrap_or(DEFAULT_DATA_DIR))
    }

    pub fn data_source(&self) -> DataSourceKind {
        self.data.source.unwrap_or_default()
    }

    /// Bot token from config or CALL_REPORT_TELEGRAM_TOKEN env.
    pub fn telegram_token(&self) -> Option<String> {
        self.telegram
            .token
            .clone()
            .or_else(|| std::env::var("CALL_REPORT_TELEGRAM_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }

    /// Admin chat id from config or CALL_REPORT_TELEGRAM_CHAT_ID env.
    pub fn telegram_chat_id(&self) -> Option<i64> {
        self.telegram.chat_id.or_else(|| {
            std::env::var("CALL_REPORT_TELEGRAM_CHAT_ID")
                .ok()
                .and_then(|s| s.trim().parse().ok())
        })
    }
}
