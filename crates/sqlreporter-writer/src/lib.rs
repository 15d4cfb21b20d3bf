//! Query filtering and log file writing for sqlreporter
//!
//! This crate decides whether an executed query is logged, renders it and
//! appends it to the current monthly log file.

mod clock;
mod error;
mod filename;
mod filter;
mod formatter;
mod sink;
mod writer;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{PatternKind, WriterError};
pub use filename::{FileNamer, MonthlyFileName};
pub use filter::{Decision, PatternCache, QueryFilter, evaluate, should_log};
pub use formatter::{Formatter, SqlFormatter};
pub use sink::{FileSink, LogSink, LogTarget, WriteMode};
pub use writer::Writer;

// Re-export types used in our public API
pub use sqlreporter_types::{Binding, QueriesConfig, QueryRecord, ReporterConfig, SharedConfig};
