//! Shared types for sqlreporter
//!
//! This crate contains the query record handed over by the host and the
//! configuration read by the writer on every call.

use parking_lot::RwLock;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Query Types
// ============================================================================

/// A value bound to a `?` placeholder
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Binding {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Binding {
    /// Render as a SQL literal
    pub fn to_sql(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(true) => "1".to_string(),
            Self::Bool(false) => "0".to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// A single executed query
#[derive(Clone, Debug, PartialEq)]
pub struct QueryRecord {
    /// Sequential number within the process
    pub number: u64,

    /// Query text as executed, placeholders included
    pub raw: String,

    /// Values for the placeholders, in order
    pub bindings: Vec<Binding>,

    /// Execution time in milliseconds
    pub time: f64,
}

impl QueryRecord {
    pub fn new(number: u64, raw: impl Into<String>, time: f64) -> Self {
        Self {
            number,
            raw: raw.into(),
            bindings: Vec::new(),
            time,
        }
    }

    pub fn with_bindings(mut self, bindings: Vec<Binding>) -> Self {
        self.bindings = bindings;
        self
    }

    /// Query text with every `?` outside string literals replaced by its binding.
    ///
    /// Placeholders without a binding stay as `?`, extra bindings are ignored.
    pub fn interpolated(&self) -> String {
        let mut out = String::with_capacity(self.raw.len());
        let mut bindings = self.bindings.iter();
        let mut in_literal = false;

        for c in self.raw.chars() {
            match c {
                '\'' => {
                    in_literal = !in_literal;
                    out.push(c);
                }
                '?' if !in_literal => match bindings.next() {
                    Some(binding) => out.push_str(&binding.to_sql()),
                    None => out.push(c),
                },
                _ => out.push(c),
            }
        }

        out
    }
}

/// Hands out process-monotonic query numbers
#[derive(Clone, Debug)]
pub struct QuerySequence {
    next: Arc<AtomicU64>,
}

impl QuerySequence {
    /// Create a sequence whose first number is 1
    pub fn new() -> Self {
        Self {
            next: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn next_number(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Build a record with the next number
    pub fn record(&self, raw: impl Into<String>, time: f64) -> QueryRecord {
        QueryRecord::new(self.next_number(), raw, time)
    }
}

impl Default for QuerySequence {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Errors raised while loading a config file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Complete reporter configuration
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    pub general: GeneralConfig,
    pub formatting: FormattingConfig,
    pub queries: QueriesConfig,
}

impl ReporterConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// `[general]` section
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the log files
    pub directory: PathBuf,

    /// Appended to the file stem when running from a console
    pub console_suffix: String,

    /// File extension, including the dot
    pub extension: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("storage/logs/sql"),
            console_suffix: String::new(),
            extension: ".sql".to_string(),
        }
    }
}

/// Default template for a single query entry
pub const DEFAULT_ENTRY_FORMAT: &str =
    "/* Query [query_nr] - [datetime] [[query_time]] */\n[query]";

/// `[formatting]` section
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct FormattingConfig {
    /// Collapse line breaks inside queries to single spaces
    pub new_lines_to_spaces: bool,

    /// Template for one query, see `SqlFormatter`
    pub entry_format: String,

    /// Fields listed in the file header
    pub header_fields: Vec<HeaderField>,

    /// Application name shown by the `app` header field
    pub app_name: String,
}

impl Default for FormattingConfig {
    fn default() -> Self {
        Self {
            new_lines_to_spaces: false,
            entry_format: DEFAULT_ENTRY_FORMAT.to_string(),
            header_fields: vec![HeaderField::Datetime, HeaderField::Origin],
            app_name: "sqlreporter".to_string(),
        }
    }
}

/// A field shown in the file header
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderField {
    Datetime,
    Origin,
    QueryCount,
    App,
}

impl HeaderField {
    /// Label used in the rendered header
    pub fn label(&self) -> &'static str {
        match self {
            Self::Datetime => "Datetime",
            Self::Origin => "Origin",
            Self::QueryCount => "Query count",
            Self::App => "App",
        }
    }
}

/// `[queries]` section
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueriesConfig {
    /// Master switch
    pub enabled: bool,

    /// Minimum execution time in milliseconds (0 logs everything)
    pub min_exec_time: f64,

    /// Only queries matching this pattern are logged
    pub include_pattern: Option<String>,

    /// Queries matching this pattern are never logged
    pub exclude_pattern: Option<String>,

    /// Replace the file content on the first write of a writer
    pub override_log: bool,
}

impl Default for QueriesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_exec_time: 0.0,
            include_pattern: None,
            exclude_pattern: None,
            override_log: false,
        }
    }
}

/// Thread-safe handle to the live configuration
#[derive(Clone, Debug, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<ReporterConfig>>,
}

impl SharedConfig {
    pub fn new(config: ReporterConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Copy of the current configuration
    pub fn snapshot(&self) -> ReporterConfig {
        self.inner.read().clone()
    }

    /// Mutate the configuration in place
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut ReporterConfig),
    {
        f(&mut self.inner.write());
    }
}
