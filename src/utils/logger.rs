//! Logger utility for application-wide logging
//!
//! This module provides a custom logger implementation that works alongside
//! the standard log crate, but adds file output capabilities. The same type
//! backs the run log, a plain file that keeps the per-level summary of a
//! build and the exact command line of every failed tile or block.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::tiling::BuildReport;

/// Custom logger implementation
pub struct Logger {
    /// File handle for log output
    file: Mutex<Option<File>>,
    /// Most verbose level written
    level: LevelFilter,
    /// Whether records are echoed to the console
    console: bool,
}

impl Logger {
    /// Creates a new logger instance
    ///
    /// # Arguments
    ///
    /// * `log_file` - Path to the log file, truncated when it exists
    ///
    /// # Returns
    ///
    /// A new Logger instance or an error if the file cannot be created
    pub fn new(log_file: &Path) -> io::Result<Self> {
        let file = File::create(log_file)?;
        Ok(Logger {
            file: Mutex::new(Some(file)),
            level: LevelFilter::Debug,
            console: false,
        })
    }

    /// Opens a log file for appending, creating it when needed
    pub fn append(log_file: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(log_file)?;
        Ok(Logger {
            file: Mutex::new(Some(file)),
            level: LevelFilter::Debug,
            console: false,
        })
    }

    /// A logger that only writes to the console
    pub fn console_only(level: LevelFilter) -> Self {
        Logger {
            file: Mutex::new(None),
            level,
            console: true,
        }
    }

    /// Logs a message to the log file
    ///
    /// # Arguments
    ///
    /// * `message` - The message to log
    pub fn log(&self, message: &str) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        if let Some(file) = guard.as_mut() {
            writeln!(file, "{}", message)?;
            file.flush()?;
        }
        Ok(())
    }

    /// Records the outcome of a build in the run log
    ///
    /// Writes one line per level and, for every failed tile or block, the
    /// error and the command line that failed.
    pub fn log_build_report(&self, source: &Path, report: &BuildReport) -> io::Result<()> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        self.log(&format!("# run at {} on {}", timestamp, source.display()))?;

        for level in &report.levels {
            self.log(&level.to_string())?;
            for failure in &level.failures {
                self.log(&format!("  FAILED {}: {}", failure.label, failure.error))?;
                if let Some(command) = &failure.command {
                    self.log(&format!("    command: {}", command))?;
                }
            }
        }

        self.log(if report.is_success() { "# result: success" } else { "# result: failure" })
    }

    /// Static method to initialize the global logger
    ///
    /// # Arguments
    ///
    /// * `log_file` - File receiving every record, `None` for console only
    /// * `level` - Most verbose level written
    pub fn init_global_logger(log_file: Option<&Path>, level: LevelFilter) -> io::Result<()> {
        let mut global_logger = match log_file {
            Some(path) => Logger::new(path)?,
            None => Logger::console_only(level),
        };
        global_logger.level = level;
        global_logger.console = true;

        // Only called once at startup
        if log::set_boxed_logger(Box::new(global_logger)).is_err() {
            eprintln!("Warning: Global logger was already initialized");
        }

        log::set_max_level(level);
        Ok(())
    }
}

// Implement the Log trait to make our Logger work with the log crate
impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let message = format!("[{}] {}", record.level(), record.args());
            let _ = Logger::log(self, &message);

            if self.console {
                if record.level() <= Level::Warn {
                    eprintln!("{}", message);
                } else {
                    println!("{}", message);
                }
            }
        }
    }

    fn flush(&self) {
        // Already flushing in the log method
    }
}
