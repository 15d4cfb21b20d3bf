use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace};

use sqlreporter_types::{QueryRecord, SharedConfig};

use crate::error::WriterError;
use crate::filename::FileNamer;
use crate::filter::PatternCache;
use crate::formatter::Formatter;
use crate::sink::{FileSink, LogSink, LogTarget, WriteMode};

/// Filters query records and persists the accepted ones
pub struct Writer<F, N, S = FileSink> {
    formatter: F,
    namer: N,
    sink: S,

    /// Read on every call
    config: SharedConfig,

    /// Compiled include/exclude patterns
    patterns: PatternCache,

    /// Set once this instance has written anything
    wrote_once: AtomicBool,
}

impl<F, N> Writer<F, N, FileSink>
where
    F: Formatter,
    N: FileNamer,
{
    pub fn new(formatter: F, config: SharedConfig, namer: N) -> Self {
        Self::with_sink(formatter, config, namer, FileSink)
    }
}

impl<F, N, S> Writer<F, N, S>
where
    F: Formatter,
    N: FileNamer,
    S: LogSink,
{
    pub fn with_sink(formatter: F, config: SharedConfig, namer: N, sink: S) -> Self {
        Self {
            formatter,
            namer,
            sink,
            config,
            patterns: PatternCache::new(),
            wrote_once: AtomicBool::new(false),
        }
    }

    /// Persist a query if it passes the filter.
    ///
    /// Returns `Ok(false)` for filtered queries, in which case nothing is
    /// formatted and nothing is touched on disk.
    pub fn write_query(&self, record: &QueryRecord) -> Result<bool, WriterError> {
        let config = self.config.snapshot();

        let decision = self.patterns.evaluate(record, &config.queries)?;
        if !decision.is_accepted() {
            debug!(query = record.number, reason = %decision, "query skipped");
            return Ok(false);
        }

        let target = LogTarget::new(config.general.directory, self.namer.log_file()?);
        self.sink.prepare(&target.directory)?;

        let path = target.path();
        let existed = self.sink.exists(&path);

        let line = self.formatter.line(record)?;
        let first = !self.wrote_once.load(Ordering::SeqCst);
        let override_log = config.queries.override_log;

        let (content, mode) = if override_log && !first {
            (format!("{}\n", line), WriteMode::Append)
        } else {
            let header = self.formatter.header()?;
            let mode = if override_log {
                WriteMode::Truncate
            } else {
                WriteMode::Append
            };
            (format!("{}\n{}\n", header, line), mode)
        };

        self.sink.write(&path, &content, mode)?;
        self.wrote_once.store(true, Ordering::SeqCst);

        trace!(
            query = record.number,
            path = %path.display(),
            ?mode,
            existed,
            "query written"
        );
        Ok(true)
    }

    /// Whether this instance has already written a query
    pub fn has_written(&self) -> bool {
        self.wrote_once.load(Ordering::SeqCst)
    }

    pub fn formatter(&self) -> &F {
        &self.formatter
    }

    pub fn namer(&self) -> &N {
        &self.namer
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }
}
