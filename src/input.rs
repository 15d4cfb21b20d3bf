//! JSON-lines query input
//!
//! Each non-blank line is one executed query:
//! `{"sql": "select * from users where id = ?", "bindings": [1], "time": 5.41}`

use std::io::BufRead;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use sqlreporter_types::{Binding, QueryRecord, QuerySequence};

#[derive(Debug, Deserialize)]
struct InputQuery {
    sql: String,
    #[serde(default)]
    bindings: Vec<Binding>,
    /// Milliseconds
    time: f64,
}

/// Iterates query records from a JSON-lines stream
pub struct QueryReader<R> {
    reader: R,
    line_number: usize,
    sequence: QuerySequence,
    buf: String,
}

impl<R: BufRead> QueryReader<R> {
    pub fn new(reader: R, sequence: QuerySequence) -> Self {
        Self {
            reader,
            line_number: 0,
            sequence,
            buf: String::new(),
        }
    }

    fn parse_line(&self, line: &str) -> Result<QueryRecord> {
        let input: InputQuery = serde_json::from_str(line)
            .with_context(|| format!("invalid query on line {}", self.line_number))?;
        if !input.time.is_finite() || input.time < 0.0 {
            bail!(
                "invalid execution time {} on line {}",
                input.time,
                self.line_number
            );
        }
        Ok(self
            .sequence
            .record(input.sql, input.time)
            .with_bindings(input.bindings))
    }
}

impl<R: BufRead> Iterator for QueryReader<R> {
    type Item = Result<QueryRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_number += 1;
                    let line = self.buf.trim();
                    if line.is_empty() {
                        continue;
                    }
                    return Some(self.parse_line(line));
                }
                Err(e) => {
                    let line = self.line_number + 1;
                    return Some(
                        Err::<QueryRecord, _>(e)
                            .with_context(|| format!("failed to read line {}", line)),
                    );
                }
            }
        }
    }
}
