use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::WriterError;

/// Log file location resolved for one write
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogTarget {
    pub directory: PathBuf,
    pub file_name: String,
}

impl LogTarget {
    pub fn new(directory: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_name: file_name.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// How content lands in the file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// Create if missing, add after existing content
    Append,
    /// Create if missing, replace existing content
    Truncate,
}

/// The I/O side of the writer
pub trait LogSink {
    /// Make sure the directory exists; must succeed if it already does
    fn prepare(&self, directory: &Path) -> Result<(), WriterError>;

    fn exists(&self, path: &Path) -> bool;

    fn write(&self, path: &Path, content: &str, mode: WriteMode) -> Result<(), WriterError>;
}

/// Plain file system sink
#[derive(Clone, Copy, Debug, Default)]
pub struct FileSink;

impl LogSink for FileSink {
    fn prepare(&self, directory: &Path) -> Result<(), WriterError> {
        if directory.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(directory).map_err(|source| WriterError::CreateDir {
            path: directory.to_path_buf(),
            source,
        })?;
        debug!(directory = %directory.display(), "created log directory");
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn write(&self, path: &Path, content: &str, mode: WriteMode) -> Result<(), WriterError> {
        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            WriteMode::Append => options.append(true),
            WriteMode::Truncate => options.write(true).truncate(true),
        };

        options
            .open(path)
            .and_then(|mut file| file.write_all(content.as_bytes()))
            .map_err(|source| WriterError::Write {
                path: path.to_path_buf(),
                source,
            })
    }
}
