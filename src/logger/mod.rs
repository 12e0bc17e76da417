//! Logger module
//!
//! Diagnostics go through `tracing`; access log lines go through the
//! [`writer`] sink in one of the [`AccessLogEntry`] formats.

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::Config;
use hyper::Version;
use std::io;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// Install the `tracing` subscriber and the access log writer
///
/// `RUST_LOG` takes precedence over `logging.level`. Diagnostics are
/// written to `logging.error_log_file` when set, stderr otherwise.
/// Should be called once at application startup.
pub fn init(config: &Config) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match config.logging.error_log_file.as_deref() {
        Some(path) => {
            let file = writer::open_log_file(path)?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(io::stderr).try_init(),
    };
    installed.map_err(io::Error::other)?;

    writer::init(config.logging.access_log_file.as_deref())
}

/// Write one formatted access log line
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    let line = entry.format(format);
    match writer::get() {
        Some(w) => w.write_access(&line),
        None => println!("{line}"),
    }
}

/// Version label used in the request line, e.g. `1.1`
pub fn http_version(version: Version) -> String {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
    .to_string()
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!("server listening on http://{addr}");
    tracing::info!(
        level = %config.logging.level,
        workers = ?config.server.workers,
        data_dir = %config.storage.data_dir,
        persist = config.storage.persist,
        "configuration loaded"
    );
    if let Some(ref path) = config.logging.access_log_file {
        tracing::info!("access log: {path}");
    }
    if let Some(ref path) = config.logging.error_log_file {
        tracing::info!("error log: {path}");
    }
}
