use fancy_regex::Regex;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use sqlreporter_types::{QueriesConfig, QueryRecord};

use crate::error::{PatternKind, WriterError};

/// Outcome of running a query through the filter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Accept,
    /// Query logging is switched off
    Disabled,
    /// Faster than the configured threshold
    BelowThreshold,
    /// Matched the exclude pattern
    Excluded,
    /// Did not match the include pattern
    NotIncluded,
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Accept => "accepted",
            Self::Disabled => "queries disabled",
            Self::BelowThreshold => "below min_exec_time",
            Self::Excluded => "matched exclude pattern",
            Self::NotIncluded => "did not match include pattern",
        };
        f.write_str(reason)
    }
}

/// Query filter with both patterns compiled up front
#[derive(Clone)]
pub struct QueryFilter {
    enabled: bool,

    /// Minimum execution time in milliseconds
    min_exec_time: f64,

    /// Include regex (None = match all)
    include: Option<Regex>,

    /// Exclude regex (None = match none)
    exclude: Option<Regex>,
}

impl QueryFilter {
    /// Compile a filter from the `[queries]` config section
    pub fn from_config(config: &QueriesConfig) -> Result<Self, WriterError> {
        Ok(Self {
            enabled: config.enabled,
            min_exec_time: config.min_exec_time,
            include: compile(PatternKind::Include, config.include_pattern.as_deref())?,
            exclude: compile(PatternKind::Exclude, config.exclude_pattern.as_deref())?,
        })
    }

    /// Run the checks in order, cheapest first
    pub fn decide(&self, record: &QueryRecord) -> Result<Decision, WriterError> {
        if !self.enabled {
            return Ok(Decision::Disabled);
        }
        if record.time < self.min_exec_time {
            return Ok(Decision::BelowThreshold);
        }
        if let Some(re) = &self.exclude {
            if is_match(PatternKind::Exclude, re, &record.raw)? {
                return Ok(Decision::Excluded);
            }
        }
        if let Some(re) = &self.include {
            if !is_match(PatternKind::Include, re, &record.raw)? {
                return Ok(Decision::NotIncluded);
            }
        }
        Ok(Decision::Accept)
    }

    pub fn should_log(&self, record: &QueryRecord) -> Result<bool, WriterError> {
        Ok(self.decide(record)?.is_accepted())
    }
}

impl fmt::Debug for QueryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryFilter")
            .field("enabled", &self.enabled)
            .field("min_exec_time", &self.min_exec_time)
            .field("include", &self.include.as_ref().map(Regex::as_str))
            .field("exclude", &self.exclude.as_ref().map(Regex::as_str))
            .finish()
    }
}

/// A compiled pattern and the config string it came from
type Slot = Mutex<Option<(String, Arc<Regex>)>>;

/// Compiled include/exclude patterns, reused while the config strings stay the same
#[derive(Default)]
pub struct PatternCache {
    include: Slot,
    exclude: Slot,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide on a record straight from config.
    ///
    /// Patterns are only looked up once the cheaper checks have passed, so a
    /// broken pattern surfaces as soon as it is actually evaluated.
    pub fn evaluate(
        &self,
        record: &QueryRecord,
        config: &QueriesConfig,
    ) -> Result<Decision, WriterError> {
        if !config.enabled {
            return Ok(Decision::Disabled);
        }
        if record.time < config.min_exec_time {
            return Ok(Decision::BelowThreshold);
        }
        if let Some(re) = self.get(PatternKind::Exclude, config.exclude_pattern.as_deref())? {
            if is_match(PatternKind::Exclude, &re, &record.raw)? {
                return Ok(Decision::Excluded);
            }
        }
        if let Some(re) = self.get(PatternKind::Include, config.include_pattern.as_deref())? {
            if !is_match(PatternKind::Include, &re, &record.raw)? {
                return Ok(Decision::NotIncluded);
            }
        }
        Ok(Decision::Accept)
    }

    fn slot(&self, which: PatternKind) -> &Slot {
        match which {
            PatternKind::Include => &self.include,
            PatternKind::Exclude => &self.exclude,
        }
    }

    fn get(
        &self,
        which: PatternKind,
        pattern: Option<&str>,
    ) -> Result<Option<Arc<Regex>>, WriterError> {
        let Some(pattern) = pattern.filter(|p| !p.trim().is_empty()) else {
            return Ok(None);
        };

        let mut slot = self.slot(which).lock();
        if let Some((source, re)) = slot.as_ref() {
            if source == pattern {
                return Ok(Some(Arc::clone(re)));
            }
        }

        let re = Arc::new(compile_pattern(which, pattern)?);
        *slot = Some((pattern.to_string(), Arc::clone(&re)));
        Ok(Some(re))
    }

    #[cfg(test)]
    fn cached(&self, which: PatternKind) -> Option<Arc<Regex>> {
        self.slot(which).lock().as_ref().map(|(_, re)| Arc::clone(re))
    }
}

/// Decide on a record straight from config, compiling patterns as needed
pub fn evaluate(record: &QueryRecord, config: &QueriesConfig) -> Result<Decision, WriterError> {
    PatternCache::new().evaluate(record, config)
}

/// Whether a record passes the `[queries]` checks
pub fn should_log(record: &QueryRecord, config: &QueriesConfig) -> Result<bool, WriterError> {
    Ok(evaluate(record, config)?.is_accepted())
}

fn is_match(which: PatternKind, re: &Regex, text: &str) -> Result<bool, WriterError> {
    re.is_match(text).map_err(|source| WriterError::Match {
        which,
        pattern: re.as_str().to_string(),
        source: Box::new(source),
    })
}

/// Compile a configured pattern; empty means "no pattern"
fn compile(which: PatternKind, pattern: Option<&str>) -> Result<Option<Regex>, WriterError> {
    match pattern.filter(|p| !p.trim().is_empty()) {
        Some(pattern) => compile_pattern(which, pattern).map(Some),
        None => Ok(None),
    }
}

fn compile_pattern(which: PatternKind, pattern: &str) -> Result<Regex, WriterError> {
    let (body, flags) = split_delimited(pattern);

    // Always case insensitive
    let mut inline = String::from("i");
    let mut anchored = false;
    for flag in flags.chars() {
        match flag {
            // Unicode is the only mode; D and S do not change what matches
            'i' | 'u' | 'D' | 'S' => {}
            'A' => anchored = true,
            'm' | 's' | 'x' | 'U' => {
                if !inline.contains(flag) {
                    inline.push(flag);
                }
            }
            _ => {
                return Err(WriterError::PatternFlag {
                    which,
                    pattern: pattern.to_string(),
                    flag,
                });
            }
        }
    }

    let source = if anchored {
        format!("(?{})\\A(?:{})", inline, body)
    } else {
        format!("(?{}){}", inline, body)
    };

    Regex::new(&source).map_err(|source| WriterError::Pattern {
        which,
        pattern: pattern.to_string(),
        source: Box::new(source),
    })
}

/// Closing delimiter for an opening one
fn closing_delimiter(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        '<' => '>',
        c => c,
    }
}

/// Split `#body#flags` into body and flags; anything else is a bare body.
///
/// Any character except alphanumerics, backslash and whitespace may open a
/// pattern, as long as its counterpart closes it and only flag letters follow.
fn split_delimited(pattern: &str) -> (&str, &str) {
    let Some(open) = pattern
        .chars()
        .next()
        .filter(|c| !c.is_alphanumeric() && *c != '\\' && !c.is_whitespace())
    else {
        return (pattern, "");
    };

    let inner = &pattern[open.len_utf8()..];
    let close = closing_delimiter(open);
    match inner.rfind(close) {
        Some(end) if inner[end + close.len_utf8()..].chars().all(|c| c.is_ascii_alphabetic()) => {
            (&inner[..end], &inner[end + close.len_utf8()..])
        }
        _ => (pattern, ""),
    }
}
