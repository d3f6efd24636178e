//! Daily movement-report scheduling (spec §4.K).

pub mod error;
pub mod report;
pub mod scheduler;

pub use error::{Result, SchedulerError};
pub use report::generate_daily_report;
pub use scheduler::{DailyReportScheduler, DailyRunSummary, LoggingReportSink, ReportSink, ScheduleConfig};
