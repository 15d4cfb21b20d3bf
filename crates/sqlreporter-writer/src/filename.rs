use std::sync::Arc;

use sqlreporter_types::SharedConfig;

use crate::clock::{Clock, SystemClock};
use crate::error::WriterError;

/// Resolves the name of the log file for "now"
pub trait FileNamer {
    fn log_file(&self) -> Result<String, WriterError>;
}

/// One file per calendar month: `<YYYY>-<MM>-log<suffix><extension>`
pub struct MonthlyFileName {
    config: SharedConfig,
    clock: Arc<dyn Clock>,

    /// Append `general.console_suffix` to the stem
    console: bool,
}

impl MonthlyFileName {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            console: false,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Mark the process as running from a console
    pub fn console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }
}

impl FileNamer for MonthlyFileName {
    fn log_file(&self) -> Result<String, WriterError> {
        let general = self.config.snapshot().general;
        let suffix = if self.console {
            general.console_suffix.as_str()
        } else {
            ""
        };
        Ok(format!(
            "{}-log{}{}",
            self.clock.now().format("%Y-%m"),
            suffix,
            general.extension
        ))
    }
}
