use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use sqlreporter_types::QuerySequence;
use sqlreporter_writer::{
    FileNamer, Formatter, LogSink, MonthlyFileName, QueryFilter, ReporterConfig, SharedConfig,
    SqlFormatter, Writer,
};

mod input;

use input::QueryReader;

/// sqlreporter - persist executed SQL queries into monthly log files
#[derive(Parser, Debug)]
#[command(name = "sqlreporter")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON-lines file with executed queries (defaults to stdin)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for the log files
    #[arg(long)]
    directory: Option<PathBuf>,

    /// Only log queries matching this pattern
    #[arg(long, value_name = "PATTERN")]
    include: Option<String>,

    /// Never log queries matching this pattern
    #[arg(long, value_name = "PATTERN")]
    exclude: Option<String>,

    /// Only log queries slower than this many milliseconds
    #[arg(long, value_name = "MS")]
    min_exec_time: Option<f64>,

    /// Replace the current log file instead of appending to it
    #[arg(long)]
    override_log: bool,

    /// Do not log any queries
    #[arg(long)]
    disable: bool,

    /// Use the console suffix in the log file name
    #[arg(long)]
    console: bool,

    /// Origin shown in the log header
    #[arg(long, default_value = "cli")]
    origin: String,
}

impl Args {
    /// Layer command line flags over the file configuration
    fn apply(&self, config: &mut ReporterConfig) {
        if let Some(directory) = &self.directory {
            config.general.directory = directory.clone();
        }
        if let Some(include) = &self.include {
            config.queries.include_pattern = Some(include.clone());
        }
        if let Some(exclude) = &self.exclude {
            config.queries.exclude_pattern = Some(exclude.clone());
        }
        if let Some(min_exec_time) = self.min_exec_time {
            config.queries.min_exec_time = min_exec_time;
        }
        if self.override_log {
            config.queries.override_log = true;
        }
        if self.disable {
            config.queries.enabled = false;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(args);

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

/// Counts reported at the end of a run
#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    total: usize,
    written: usize,
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ReporterConfig::load(path)?,
        None => ReporterConfig::default(),
    };
    args.apply(&mut config);

    // Fail on broken patterns before reading any input
    QueryFilter::from_config(&config.queries).context("invalid query filter configuration")?;

    let directory = config.general.directory.clone();
    let shared = SharedConfig::new(config);
    let formatter = SqlFormatter::new(shared.clone()).with_origin(args.origin.clone());
    let namer = MonthlyFileName::new(shared.clone()).console(args.console);
    let writer = Writer::new(formatter, shared, namer);

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let summary = write_all(&writer, reader)?;
    println!(
        "{}/{} queries written to {}",
        summary.written,
        summary.total,
        directory.display()
    );

    Ok(())
}

/// Feed every query from the reader through the writer
fn write_all<F, N, S, R>(writer: &Writer<F, N, S>, reader: R) -> Result<Summary>
where
    F: Formatter,
    N: FileNamer,
    S: LogSink,
    R: BufRead,
{
    let mut summary = Summary::default();

    for record in QueryReader::new(reader, QuerySequence::new()) {
        let record = record?;
        summary.total += 1;
        if writer
            .write_query(&record)
            .with_context(|| format!("failed to log query {}", record.number))?
        {
            summary.written += 1;
        }
    }

    tracing::debug!(total = summary.total, written = summary.written, "input processed");
    Ok(summary)
}
