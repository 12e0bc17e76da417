//! Access log sink
//!
//! Access lines go to stdout or to an append-mode file. Diagnostics are
//! handled by the `tracing` subscriber instead.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::OnceLock;

/// Global access log writer
static LOG_WRITER: OnceLock<LogWriter> = OnceLock::new();

enum LogTarget {
    Stdout,
    File(Mutex<File>),
}

/// Thread-safe access log writer
pub struct LogWriter {
    target: LogTarget,
}

impl LogWriter {
    fn new(access_log_file: Option<&str>) -> io::Result<Self> {
        let target = match access_log_file {
            Some(path) => LogTarget::File(Mutex::new(open_log_file(path)?)),
            None => LogTarget::Stdout,
        };
        Ok(Self { target })
    }

    pub fn write_access(&self, message: &str) {
        match &self.target {
            LogTarget::Stdout => println!("{message}"),
            LogTarget::File(file) => {
                if let Err(e) = writeln!(file.lock(), "{message}") {
                    tracing::warn!(error = %e, "failed to write access log");
                }
            }
        }
    }
}

/// Open or create a log file for appending
pub(crate) fn open_log_file(path: &str) -> io::Result<File> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}

/// Initialize the global access log writer. Fails if the file cannot be
/// opened or the writer was already set.
pub fn init(access_log_file: Option<&str>) -> io::Result<()> {
    let writer = LogWriter::new(access_log_file)?;
    LOG_WRITER.set(writer).map_err(|_| {
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            "Log writer already initialized",
        )
    })
}

/// The global writer, if [`init`] has run
pub fn get() -> Option<&'static LogWriter> {
    LOG_WRITER.get()
}
