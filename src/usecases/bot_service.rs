//! Chat command loop. Implements InputPort for the Telegram front-end.
//!
//! Commands: `Статистика` (digest), `Отчет` (weekly report over the chat),
//! `Пришли` (upload the last saved report). Failures are reported back to the chat.

use crate::domain::entities::{DATE_LAYOUT, parse_date};
use crate::domain::{DateWindow, DomainError};
use crate::ports::{ChannelPort, InputPort, NotifierPort, ReportSinkPort};
use crate::usecases::digest_service::DigestService;
use crate::usecases::report_service::ReportService;
use chrono::{Local, NaiveDate};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const ASK_FROM: &str = "С какого числа? (ДД.ММ.ГГГГ)";
const ASK_TO: &str = "По какое число? (ДД.ММ.ГГГГ)";
const DATES_SET: &str = "Даты заданы. Считаем бонус";
const UNKNOWN_COMMAND: &str = "Неизвестная команда";
const NO_REPORT_YET: &str = "Отчет еще не сформирован";

/// Pause after a failed read before polling again.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// A chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Statistics,
    Report,
    Resend,
    Unknown(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            "Статистика" => Command::Statistics,
            "Отчет" => Command::Report,
            "Пришли" => Command::Resend,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// Bot front-end: reads commands from the channel and runs them one at a time.
pub struct BotService {
    channel: Arc<dyn ChannelPort>,
    notifier: Arc<dyn NotifierPort>,
    reports: Arc<ReportService>,
    digest: Arc<DigestService>,
    sink: Arc<dyn ReportSinkPort>,
    report_path: PathBuf,
}

impl BotService {
    pub fn new(
        channel: Arc<dyn ChannelPort>,
        notifier: Arc<dyn NotifierPort>,
        reports: Arc<ReportService>,
        digest: Arc<DigestService>,
        sink: Arc<dyn ReportSinkPort>,
        report_path: PathBuf,
    ) -> Self {
        Self {
            channel,
            notifier,
            reports,
            digest,
            sink,
            report_path,
        }
    }

    /// Run one command. Only a closed channel is returned as an error.
    pub async fn handle(&self, command: Command, today: NaiveDate) -> Result<(), DomainError> {
        info!(?command, "bot command");
        let outcome = match command {
            Command::Statistics => self.digest.send(self.notifier.as_ref(), today).await,
            Command::Report => self.report().await,
            Command::Resend => self.resend().await,
            Command::Unknown(_) => self.channel.send(UNKNOWN_COMMAND).await,
        };
        match outcome {
            Err(DomainError::ChannelClosed(reason)) => Err(DomainError::ChannelClosed(reason)),
            Err(e) => {
                warn!(error = %e, "bot command failed");
                self.say(&e.to_string()).await;
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    async fn report(&self) -> Result<(), DomainError> {
        let from = self.ask_date(ASK_FROM).await?;
        let to = self.ask_date(ASK_TO).await?;
        let window = DateWindow::new(from, to)?;
        self.say(DATES_SET).await;

        let report = self.reports.make_report(window).await?;
        self.sink.save_report(&report, &self.report_path).await?;
        let caption = format!(
            "Отчет за период с {} по {}",
            window.from.format(DATE_LAYOUT),
            window.to.format(DATE_LAYOUT)
        );
        self.notifier.send_document(&self.report_path, &caption).await
    }

    async fn resend(&self) -> Result<(), DomainError> {
        if !tokio::fs::try_exists(&self.report_path).await.unwrap_or(false) {
            self.say(NO_REPORT_YET).await;
            return Ok(());
        }
        self.notifier
            .send_document(&self.report_path, "Последний отчет")
            .await
    }

    async fn ask_date(&self, question: &str) -> Result<NaiveDate, DomainError> {
        self.say(question).await;
        let answer = self.channel.receive().await?;
        parse_date(&answer)
    }

    async fn say(&self, text: &str) {
        if let Err(e) = self.channel.send(text).await {
            warn!(error = %e, "failed to reply in chat");
        }
    }
}

#[async_trait::async_trait]
impl InputPort for BotService {
    async fn run(&self) -> Result<(), DomainError> {
        info!("bot command loop started");
        loop {
            let text = match self.channel.receive().await {
                Ok(text) => text,
                Err(DomainError::ChannelClosed(reason)) => {
                    info!(reason = %reason, "chat channel closed; bot stopped");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "failed to read chat; retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
            };
            let today = Local::now().date_naive();
            if let Err(e) = self.handle(Command::parse(&text), today).await {
                info!(error = %e, "chat channel closed during a command; bot stopped");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::channel::ScriptedChannel;
    use crate::adapters::persistence::{CsvReportSink, InMemoryDataSource};
    use crate::domain::{BonusTiers, CityTable, DatabaseStatistic, Order, ReportSettings};
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingNotifier {
        texts: Mutex<Vec<String>>,
        documents: Mutex<Vec<(PathBuf, String)>>,
    }

    #[async_trait::async_trait]
    impl NotifierPort for RecordingNotifier {
        async fn send_preformatted(&self, text: &str) -> Result<(), DomainError> {
            self.texts.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn send_document(&self, path: &Path, caption: &str) -> Result<(), DomainError> {
            self.documents
                .lock()
                .unwrap()
                .push((path.to_path_buf(), caption.to_string()));
            Ok(())
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 6, d).unwrap()
    }

    fn bot(
        script: &[&str],
        dir: &TempDir,
    ) -> (BotService, Arc<ScriptedChannel>, Arc<RecordingNotifier>) {
        let data = Arc::new(InMemoryDataSource::new(
            vec![],
            vec![Order {
                id: 1,
                date: day(13),
                city: "Москва".to_string(),
                operator: "Анна".to_string(),
            }],
            vec![DatabaseStatistic::new("Анна")],
        ));
        let settings = Arc::new(ReportSettings {
            roster: vec!["Анна".to_string()],
            cities: CityTable::default(),
            tiers: BonusTiers::default(),
            order_fee: 80.0,
            head_rate: 20.0,
            head_name: "Виктор".to_string(),
            min_conversion_grade: 0.28,
            history_days: 90,
        });
        let channel = Arc::new(ScriptedChannel::new(script.iter().copied()));
        let notifier = Arc::new(RecordingNotifier::default());
        let reports = Arc::new(ReportService::new(data.clone(), channel.clone(), settings));
        let service = BotService::new(
            channel.clone(),
            notifier.clone(),
            reports,
            Arc::new(DigestService::new(data)),
            Arc::new(CsvReportSink::new()),
            dir.path().join("report.csv"),
        );
        (service, channel, notifier)
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse(" Отчет "), Command::Report);
        assert_eq!(Command::parse("Статистика"), Command::Statistics);
        assert_eq!(Command::parse("Пришли"), Command::Resend);
        assert_eq!(Command::parse("отчет"), Command::Unknown("отчет".to_string()));
    }

    #[tokio::test]
    async fn test_report_command_saves_and_uploads() {
        let dir = TempDir::new().unwrap();
        let (service, channel, notifier) =
            bot(&["Привет", "Отчет", "12.06.2023", "18.06.2023", "1000", "0"], &dir);

        service.run().await.unwrap();

        let sent = channel.sent();
        assert_eq!(sent[0], UNKNOWN_COMMAND);
        assert_eq!(sent[1], ASK_FROM);
        assert_eq!(sent[2], ASK_TO);
        assert_eq!(sent[3], DATES_SET);
        let documents = notifier.documents.lock().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].1, "Отчет за период с 12.06.2023 по 18.06.2023");
        let bytes = std::fs::read(dir.path().join("report.csv")).unwrap();
        let (sheet, _, _) = encoding_rs::WINDOWS_1251.decode(&bytes);
        assert!(sheet.contains("Анна;80.00;0.00;80.00;1;80.00;0;0.00%"));
    }

    #[tokio::test]
    async fn test_bad_date_is_reported_to_chat() {
        let dir = TempDir::new().unwrap();
        let (service, channel, notifier) = bot(&["Отчет", "12-06-2023"], &dir);

        service.run().await.unwrap();

        let sent = channel.sent();
        assert_eq!(sent.last().unwrap(), "Неверный формат даты, вместо 3 чисел введено 1");
        assert!(notifier.documents.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resend_without_report() {
        let dir = TempDir::new().unwrap();
        let (service, channel, notifier) = bot(&[], &dir);
        service.handle(Command::Resend, day(14)).await.unwrap();
        assert_eq!(channel.sent(), vec![NO_REPORT_YET.to_string()]);
        assert!(notifier.documents.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_statistics_goes_to_notifier() {
        let dir = TempDir::new().unwrap();
        let (service, _channel, notifier) = bot(&[], &dir);
        service.handle(Command::Statistics, day(14)).await.unwrap();
        let texts = notifier.texts.lock().unwrap();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("Анна"));
    }
}
