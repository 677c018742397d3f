//! Implements InputPort. Inquire-based main menu for the terminal.
//!
//! The weekly report runs over the console channel, so bonus negotiation and cost
//! entry happen right here in the terminal.

use crate::adapters::channel::console::map_inquire_error;
use crate::domain::entities::{DATE_LAYOUT, parse_date};
use crate::domain::{DateWindow, DomainError};
use crate::ports::{InputPort, ReportSinkPort};
use crate::usecases::digest_service::week_start;
use crate::usecases::{DigestService, ReportService};
use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use crossterm::style::Stylize;
use indicatif::ProgressBar;
use inquire::ui::{Color, RenderConfig, Styled};
use inquire::{InquireError, Select, Text};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Prompt glyphs and colors for every inquire prompt of the process.
pub fn apply_theme() {
    let mut config = RenderConfig::default_colored();
    config.prompt_prefix = Styled::new("›").with_fg(Color::LightCyan);
    config.answered_prompt_prefix = Styled::new("✓").with_fg(Color::LightGreen);
    inquire::set_global_render_config(config);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuItem {
    WeeklyReport,
    Digest,
    TelegramBot,
    Exit,
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuItem::WeeklyReport => "Недельный отчет",
            MenuItem::Digest => "Статистика по операторам",
            MenuItem::TelegramBot => "Запустить Telegram-бота",
            MenuItem::Exit => "Выход",
        };
        f.write_str(label)
    }
}

/// Run a blocking inquire prompt off the async workers.
async fn blocking_prompt<T, F>(prompt: F) -> Result<T, DomainError>
where
    F: FnOnce() -> Result<T, InquireError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(prompt)
        .await
        .map_err(|e| DomainError::Channel(e.to_string()))?
        .map_err(map_inquire_error)
}

/// Monday..Sunday of the week before the one containing `today`.
fn previous_week(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = week_start(today);
    let from = monday.checked_sub_days(Days::new(7)).unwrap_or(monday);
    let to = monday.checked_sub_days(Days::new(1)).unwrap_or(monday);
    (from, to)
}

/// TUI adapter. Inquire prompts.
pub struct TuiInputPort {
    reports: Arc<ReportService>,
    digest: Arc<DigestService>,
    sink: Arc<dyn ReportSinkPort>,
    output_path: PathBuf,
    bot: Option<Arc<dyn InputPort>>,
}

impl TuiInputPort {
    pub fn new(
        reports: Arc<ReportService>,
        digest: Arc<DigestService>,
        sink: Arc<dyn ReportSinkPort>,
        output_path: PathBuf,
        bot: Option<Arc<dyn InputPort>>,
    ) -> Self {
        Self {
            reports,
            digest,
            sink,
            output_path,
            bot,
        }
    }

    fn menu(&self) -> Vec<MenuItem> {
        let mut items = vec![MenuItem::WeeklyReport, MenuItem::Digest];
        if self.bot.is_some() {
            items.push(MenuItem::TelegramBot);
        }
        items.push(MenuItem::Exit);
        items
    }

    async fn ask_date(question: &'static str, default: NaiveDate) -> Result<NaiveDate, DomainError> {
        let default = default.format(DATE_LAYOUT).to_string();
        let answer = blocking_prompt(move || Text::new(question).with_default(&default).prompt()).await?;
        parse_date(&answer)
    }

    async fn weekly_report(&self) -> Result<(), DomainError> {
        let (default_from, default_to) = previous_week(Local::now().date_naive());
        let from = Self::ask_date("С какого числа? (ДД.ММ.ГГГГ)", default_from).await?;
        let to = Self::ask_date("По какое число? (ДД.ММ.ГГГГ)", default_to).await?;
        let window = DateWindow::new(from, to)?;

        let report = self.reports.make_report(window).await?;
        self.sink.save_report(&report, &self.output_path).await?;

        println!();
        println!("{} {}", "Отчет сохранен:".green(), self.output_path.display());
        println!("Итого за неделю: {:.2} ₽", report.sum_to_pay);
        println!(
            "Расходы всего: {:.2} ₽ ({:.2} ₽ за заказ, заказов {})",
            report.total_expenses, report.total_price_per_order, report.total_orders_count
        );
        Ok(())
    }

    async fn digest(&self) -> Result<(), DomainError> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_message("Собираю статистику...");
        spinner.enable_steady_tick(Duration::from_millis(100));
        let rendered = self.digest.render(Local::now().date_naive()).await;
        spinner.finish_and_clear();
        println!("{}", rendered?);
        Ok(())
    }
}

#[async_trait]
impl InputPort for TuiInputPort {
    async fn run(&self) -> Result<(), DomainError> {
        loop {
            let items = self.menu();
            let choice = match blocking_prompt(move || Select::new("Что делаем?", items).prompt()).await {
                Ok(choice) => choice,
                Err(DomainError::ChannelClosed(_)) => return Ok(()),
                Err(e) => {
                    warn!(error = %e, "menu prompt failed");
                    continue;
                }
            };

            let outcome = match choice {
                MenuItem::WeeklyReport => self.weekly_report().await,
                MenuItem::Digest => self.digest().await,
                MenuItem::TelegramBot => match &self.bot {
                    Some(bot) => bot.run().await,
                    None => Ok(()),
                },
                MenuItem::Exit => return Ok(()),
            };
            match outcome {
                Ok(()) => {}
                Err(DomainError::ChannelClosed(_)) => println!("{}", "Отменено".yellow()),
                Err(e) => eprintln!("{} {}", "Ошибка:".red(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_previous_week_bounds() {
        let wednesday = NaiveDate::from_ymd_opt(2023, 6, 14).unwrap();
        let (from, to) = previous_week(wednesday);
        assert_eq!(from, NaiveDate::from_ymd_opt(2023, 6, 5).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2023, 6, 11).unwrap());
    }

    #[test]
    fn test_menu_labels() {
        assert_eq!(MenuItem::WeeklyReport.to_string(), "Недельный отчет");
        assert_eq!(MenuItem::Exit.to_string(), "Выход");
    }
}
