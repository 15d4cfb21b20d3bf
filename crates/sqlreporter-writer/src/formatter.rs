use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use sqlreporter_types::{HeaderField, QueryRecord, SharedConfig};

use crate::clock::{Clock, SystemClock};
use crate::error::WriterError;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders query records and file headers.
///
/// Neither method returns a trailing newline; the writer adds it.
pub trait Formatter {
    fn line(&self, record: &QueryRecord) -> Result<String, WriterError>;

    fn header(&self) -> Result<String, WriterError>;
}

/// Template-driven SQL formatter.
///
/// The entry template understands `[query_nr]`, `[datetime]`, `[query_time]`,
/// `[origin]`, `[separator]` and `[query]`.
pub struct SqlFormatter {
    config: SharedConfig,
    clock: Arc<dyn Clock>,

    /// Where the queries come from (request, command, ...)
    origin: String,

    /// Lines rendered so far
    rendered: AtomicU64,
}

impl SqlFormatter {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            origin: "cli".to_string(),
            rendered: AtomicU64::new(0),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Number of lines rendered by this formatter
    pub fn rendered(&self) -> u64 {
        self.rendered.load(Ordering::SeqCst)
    }

    fn separator() -> String {
        format!("-- {}", "-".repeat(80))
    }
}

impl Formatter for SqlFormatter {
    fn line(&self, record: &QueryRecord) -> Result<String, WriterError> {
        let formatting = self.config.snapshot().formatting;

        let mut query = record.interpolated();
        if formatting.new_lines_to_spaces {
            query = query
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
        }

        // [query] goes last so query text is never treated as a placeholder
        let line = formatting
            .entry_format
            .replace("[query_nr]", &record.number.to_string())
            .replace(
                "[datetime]",
                &self.clock.now().format(DATETIME_FORMAT).to_string(),
            )
            .replace("[query_time]", &format!("{:.2}ms", record.time))
            .replace("[origin]", &self.origin)
            .replace("[separator]", &Self::separator())
            .replace("[query]", &query);

        self.rendered.fetch_add(1, Ordering::SeqCst);
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }

    fn header(&self) -> Result<String, WriterError> {
        let formatting = self.config.snapshot().formatting;

        let lines: Vec<String> = formatting
            .header_fields
            .iter()
            .map(|field| {
                let value = match field {
                    HeaderField::Datetime => self.clock.now().format(DATETIME_FORMAT).to_string(),
                    HeaderField::Origin => self.origin.clone(),
                    HeaderField::QueryCount => self.rendered().to_string(),
                    HeaderField::App => formatting.app_name.clone(),
                };
                format!("-- {}: {}", field.label(), value)
            })
            .collect();

        Ok(lines.join("\n"))
    }
}
