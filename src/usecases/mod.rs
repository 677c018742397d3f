//! Application use cases. Orchestrate domain logic via ports.

pub mod bot_service;
pub mod digest_service;
pub mod report_service;
pub mod scheduler;

pub use bot_service::{BotService, Command};
pub use digest_service::DigestService;
pub use report_service::ReportService;
pub use scheduler::DigestScheduler;
