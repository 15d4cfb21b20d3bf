use std::fmt;
use std::path::PathBuf;

/// Which of the two query patterns an error refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternKind {
    Include,
    Exclude,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Include => f.write_str("include"),
            Self::Exclude => f.write_str("exclude"),
        }
    }
}

/// Errors returned by the writer and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("invalid {which} pattern `{pattern}`")]
    Pattern {
        which: PatternKind,
        pattern: String,
        #[source]
        source: Box<fancy_regex::Error>,
    },

    #[error("failed to match {which} pattern `{pattern}`")]
    Match {
        which: PatternKind,
        pattern: String,
        #[source]
        source: Box<fancy_regex::Error>,
    },

    #[error("unsupported flag `{flag}` in {which} pattern `{pattern}`")]
    PatternFlag {
        which: PatternKind,
        pattern: String,
        flag: char,
    },

    #[error("failed to create log directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write log file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("formatter failed: {0}")]
    Formatter(String),

    #[error("could not resolve log file name: {0}")]
    FileName(String),
}

impl WriterError {
    /// Whether this error comes from the query patterns in the config
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Pattern { .. } | Self::PatternFlag { .. } | Self::Match { .. }
        )
    }

    /// Whether this error comes from the file system
    pub fn is_io(&self) -> bool {
        matches!(self, Self::CreateDir { .. } | Self::Write { .. })
    }
}
