//! Record sources and report sinks.

pub mod csv_report;
pub mod csv_source;
pub mod memory_source;
pub mod sqlite_source;

pub use csv_report::CsvReportSink;
pub use csv_source::CsvDataSource;
pub use memory_source::InMemoryDataSource;
pub use sqlite_source::SqliteDataSource;
