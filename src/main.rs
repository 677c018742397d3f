//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run UI.
//! No business logic here.

use call_report::adapters::channel::ConsoleChannel;
use call_report::adapters::persistence::{CsvDataSource, CsvReportSink, SqliteDataSource};
use call_report::adapters::telegram::TelegramBot;
use call_report::adapters::ui::tui::TuiInputPort;
use call_report::ports::{ChannelPort, DataSourcePort, InputPort, NotifierPort, ReportSinkPort};
use call_report::shared::config::{AppConfig, DataSourceKind};
use call_report::usecases::{BotService, DigestScheduler, DigestService, ReportService};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    call_report::adapters::ui::init_ui();

    let cfg = AppConfig::load().map_err(|e| anyhow::anyhow!("config: {}", e))?;
    let settings = Arc::new(cfg.report_settings().map_err(|e| anyhow::anyhow!("{}", e))?);
    info!(
        operators = settings.roster.len(),
        cities = settings.cities.len(),
        tiers = settings.tiers.iter().count(),
        "report settings loaded"
    );

    // --- Data source ---
    let data_dir = cfg.data_dir();
    let data: Arc<dyn DataSourcePort> = match cfg.data_source() {
        DataSourceKind::Sqlite => Arc::new(
            SqliteDataSource::connect(&data_dir, settings.roster.clone())
                .await
                .map_err(|e| anyhow::anyhow!("SQLite connect failed: {}", e))?,
        ),
        DataSourceKind::Csv => {
            info!(path = %data_dir.display(), "CSV data source");
            Arc::new(CsvDataSource::new(&data_dir, settings.roster.clone()))
        }
    };

    // --- Services ---
    let output_path = cfg.output_path();
    let sink: Arc<dyn ReportSinkPort> = Arc::new(CsvReportSink::new());
    let digest = Arc::new(DigestService::new(Arc::clone(&data)));
    let console: Arc<dyn ChannelPort> = Arc::new(ConsoleChannel::new());
    let console_reports = Arc::new(ReportService::new(
        Arc::clone(&data),
        console,
        Arc::clone(&settings),
    ));

    // --- Telegram: bot front-end and scheduled digest ---
    let bot: Option<Arc<dyn InputPort>> = match (cfg.telegram_token(), cfg.telegram_chat_id()) {
        (Some(token), Some(chat_id)) => {
            let telegram = Arc::new(TelegramBot::new(&token, chat_id));
            let channel: Arc<dyn ChannelPort> = Arc::clone(&telegram) as Arc<dyn ChannelPort>;
            let notifier: Arc<dyn NotifierPort> = Arc::clone(&telegram) as Arc<dyn NotifierPort>;

            let scheduler = DigestScheduler::new(
                Arc::clone(&digest),
                Arc::clone(&notifier),
                cfg.weekday_time().map_err(|e| anyhow::anyhow!("{}", e))?,
                cfg.weekend_time().map_err(|e| anyhow::anyhow!("{}", e))?,
            );
            tokio::spawn(async move {
                scheduler.run_loop().await;
            });

            let bot_reports = Arc::new(ReportService::new(
                Arc::clone(&data),
                Arc::clone(&channel),
                Arc::clone(&settings),
            ));
            info!(chat_id, "Telegram bot enabled");
            Some(Arc::new(BotService::new(
                channel,
                notifier,
                bot_reports,
                Arc::clone(&digest),
                Arc::clone(&sink),
                output_path.clone(),
            )))
        }
        _ => {
            warn!("CALL_REPORT_TELEGRAM_TOKEN / CALL_REPORT_TELEGRAM_CHAT_ID not set, bot and digest schedule disabled");
            None
        }
    };

    let input_port: Arc<dyn InputPort> = Arc::new(TuiInputPort::new(
        console_reports,
        digest,
        sink,
        output_path,
        bot,
    ));

    // --- Run (main menu -> Weekly report / Digest / Telegram bot) ---
    input_port
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(())
}
