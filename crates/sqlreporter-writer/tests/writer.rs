use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Local, TimeZone};
use tempfile::TempDir;

use sqlreporter_writer::{
    FixedClock, Formatter, MonthlyFileName, QueryRecord, ReporterConfig, SharedConfig,
    SqlFormatter, Writer, WriterError,
};

const FILE_NAME: &str = "2015-02-log.sql";

/// Formatter returning fixed text and counting calls
struct FixedFormatter {
    line: String,
    header: String,
    lines: AtomicUsize,
    headers: AtomicUsize,
}

impl FixedFormatter {
    fn new(line: &str, header: &str) -> Self {
        Self {
            line: line.to_string(),
            header: header.to_string(),
            lines: AtomicUsize::new(0),
            headers: AtomicUsize::new(0),
        }
    }
}

impl Formatter for FixedFormatter {
    fn line(&self, _record: &QueryRecord) -> Result<String, WriterError> {
        self.lines.fetch_add(1, Ordering::SeqCst);
        Ok(self.line.clone())
    }

    fn header(&self) -> Result<String, WriterError> {
        self.headers.fetch_add(1, Ordering::SeqCst);
        Ok(self.header.clone())
    }
}

struct Fixture {
    _temp: TempDir,
    directory: PathBuf,
    config: SharedConfig,
}

impl Fixture {
    fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let directory = temp.path().join("test-dir/directory");
        let mut config = ReporterConfig::default();
        config.general.directory = directory.clone();
        Self {
            _temp: temp,
            directory,
            config: SharedConfig::new(config),
        }
    }

    fn namer(&self) -> MonthlyFileName {
        let now = Local.with_ymd_and_hms(2015, 2, 3, 6, 41, 31).unwrap();
        MonthlyFileName::new(self.config.clone()).with_clock(Arc::new(FixedClock::new(now)))
    }

    fn writer(&self, line: &str, header: &str) -> Writer<FixedFormatter, MonthlyFileName> {
        Writer::new(
            FixedFormatter::new(line, header),
            self.config.clone(),
            self.namer(),
        )
    }

    fn log_path(&self) -> PathBuf {
        self.directory.join(FILE_NAME)
    }

    fn seed(&self, content: &str) {
        fs::create_dir_all(&self.directory).unwrap();
        fs::write(self.log_path(), content).unwrap();
    }

    fn read(&self) -> String {
        fs::read_to_string(self.log_path()).unwrap()
    }
}

fn file_count(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

#[test]
fn disabled_queries_create_nothing() {
    let fx = Fixture::new();
    fx.config.update(|c| c.queries.enabled = false);
    let writer = fx.writer("Sample log line", "-- header");

    assert!(!writer.write_query(&QueryRecord::new(1, "test", 5.41)).unwrap());
    assert!(!writer.write_query(&QueryRecord::new(2, "test", 5.41)).unwrap());
    assert!(!fx.directory.exists());
    assert_eq!(writer.formatter().lines.load(Ordering::SeqCst), 0);
}

#[test]
fn creates_directory_and_log_file() {
    let fx = Fixture::new();
    fx.config
        .update(|c| c.queries.include_pattern = Some("#.*#i".to_string()));
    let writer = fx.writer("Sample log line", "-- header");

    assert!(writer.write_query(&QueryRecord::new(1, "test", 5.41)).unwrap());
    assert!(fx.directory.is_dir());
    assert_eq!(file_count(&fx.directory), 1);
    assert_eq!(fx.read(), "-- header\nSample log line\n");
}

#[test]
fn appends_to_existing_log_file() {
    let fx = Fixture::new();
    fx.seed("Initial file content\n");
    let writer = fx.writer("Sample log line", "-- header");

    writer.write_query(&QueryRecord::new(1, "test", 5.41)).unwrap();
    writer.write_query(&QueryRecord::new(2, "test", 5.41)).unwrap();

    assert_eq!(file_count(&fx.directory), 1);
    assert_eq!(
        fx.read(),
        "Initial file content\n-- header\nSample log line\n-- header\nSample log line\n"
    );
}

#[test]
fn override_replaces_content_on_first_query() {
    let fx = Fixture::new();
    fx.seed("Initial file content\n");
    fx.config.update(|c| {
        c.queries.include_pattern = Some("#.*#i".to_string());
        c.queries.override_log = true;
    });
    let writer = fx.writer("Sample log line", "-- header");

    writer.write_query(&QueryRecord::new(1, "test", 5.41)).unwrap();
    assert_eq!(fx.read(), "-- header\nSample log line\n");
}

#[test]
fn override_appends_lines_after_first_query() {
    let fx = Fixture::new();
    fx.seed("Initial file content\n");
    fx.config.update(|c| c.queries.override_log = true);
    let writer = fx.writer("Sample log line", "-- header");

    writer.write_query(&QueryRecord::new(1, "test", 5.41)).unwrap();
    writer.write_query(&QueryRecord::new(2, "test", 5.41)).unwrap();

    assert_eq!(fx.read(), "-- header\nSample log line\nSample log line\n");
    assert_eq!(writer.formatter().lines.load(Ordering::SeqCst), 2);
    assert_eq!(writer.formatter().headers.load(Ordering::SeqCst), 1);
}

#[test]
fn new_writer_overrides_again() {
    let fx = Fixture::new();
    fx.config.update(|c| c.queries.override_log = true);

    let first = fx.writer("first", "-- header");
    first.write_query(&QueryRecord::new(1, "test", 1.0)).unwrap();
    first.write_query(&QueryRecord::new(2, "test", 1.0)).unwrap();

    let second = fx.writer("second", "-- header");
    second.write_query(&QueryRecord::new(3, "test", 1.0)).unwrap();

    assert_eq!(fx.read(), "-- header\nsecond\n");
}

#[test]
fn empty_header_keeps_separator() {
    let fx = Fixture::new();
    fx.config
        .update(|c| c.queries.include_pattern = Some("#^SELECT .*$#i".to_string()));
    let writer = fx.writer("Sample log line", "");

    assert!(writer.write_query(&QueryRecord::new(1, "select * FROM test", 5.41)).unwrap());
    assert_eq!(fx.read(), "\nSample log line\n");
}

#[test]
fn include_pattern_rejects_select() {
    let fx = Fixture::new();
    fx.config.update(|c| {
        c.queries.include_pattern = Some("#^(?:UPDATE|INSERT) .*$#i".to_string())
    });
    let writer = fx.writer("Sample log line", "");

    assert!(!writer.write_query(&QueryRecord::new(1, "select * FROM test", 5.41)).unwrap());
    assert!(!fx.directory.exists());

    let insert = QueryRecord::new(2, "INSERT INTO test(one, two, three) values(?, ?, ?)", 5.41);
    assert!(writer.write_query(&insert).unwrap());
    assert_eq!(fx.read(), "\nSample log line\n");
}

#[test]
fn insert_scenario() {
    let fx = Fixture::new();
    fx.config
        .update(|c| c.queries.include_pattern = Some("INSERT|UPDATE".to_string()));
    let writer = fx.writer("Sample log line", "-- header");

    assert!(writer.write_query(&QueryRecord::new(1, "INSERT INTO t VALUES (1)", 5.41)).unwrap());
    assert_eq!(fx.read(), "-- header\nSample log line\n");
}

#[test]
fn min_exec_time_scenario() {
    let fx = Fixture::new();
    fx.config.update(|c| c.queries.min_exec_time = 500.0);
    let writer = fx.writer("slow", "-- header");

    assert!(!writer.write_query(&QueryRecord::new(1, "test1", 5.41)).unwrap());
    assert!(!fx.directory.exists());
    assert!(writer.write_query(&QueryRecord::new(2, "test2", 500.5)).unwrap());
    assert_eq!(fx.read(), "-- header\nslow\n");
}

#[test]
fn directory_creation_is_idempotent() {
    let fx = Fixture::new();
    fs::create_dir_all(&fx.directory).unwrap();
    let writer = fx.writer("x", "h");
    for n in 1..=3 {
        assert!(writer.write_query(&QueryRecord::new(n, "test", 1.0)).unwrap());
    }
    assert_eq!(fx.read(), "h\nx\nh\nx\nh\nx\n");
}

#[test]
fn unwritable_directory_is_reported() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.directory.parent().unwrap()).unwrap();
    fs::write(&fx.directory, "not a directory").unwrap();
    let writer = fx.writer("x", "h");

    let err = writer.write_query(&QueryRecord::new(1, "test", 1.0)).unwrap_err();
    assert!(matches!(err, WriterError::CreateDir { .. }));
}

#[test]
fn sql_formatter_end_to_end() {
    let fx = Fixture::new();
    let now = Local.with_ymd_and_hms(2015, 2, 3, 6, 41, 31).unwrap();
    let formatter = SqlFormatter::new(fx.config.clone())
        .with_clock(Arc::new(FixedClock::new(now)))
        .with_origin("GET /users");
    let writer = Writer::new(formatter, fx.config.clone(), fx.namer());

    let record = QueryRecord::new(1, "UPDATE users SET name = ? WHERE id = ?", 12.5)
        .with_bindings(vec![
            sqlreporter_writer::Binding::Text("Ann".to_string()),
            sqlreporter_writer::Binding::Int(4),
        ]);
    writer.write_query(&record).unwrap();

    assert_eq!(
        fx.read(),
        "-- Datetime: 2015-02-03 06:41:31\n-- Origin: GET /users\n\
         /* Query 1 - 2015-02-03 06:41:31 [12.50ms] */\n\
         UPDATE users SET name = 'Ann' WHERE id = 4\n"
    );
}
