//! External tool invocation
//!
//! Builds a command line for a GDAL-style tool, runs it to completion and
//! turns a spawn failure or non-zero exit into [`TilerError::OperatorFailure`]
//! carrying the exact command line and the captured output.

use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

use log::{debug, info};

use crate::errors::{TilerError, TilerResult};

/// A single invocation of an external tool
#[derive(Debug, Clone)]
pub struct ToolCommand {
    /// Operator name used in logs and errors (crop, rasterize, ...)
    operator: String,
    program: OsString,
    args: Vec<OsString>,
}

impl ToolCommand {
    /// Start a command line for `program`
    pub fn new(operator: &str, program: impl Into<OsString>) -> Self {
        ToolCommand {
            operator: operator.to_string(),
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a path argument
    pub fn path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    /// Append `-co KEY=VALUE`
    pub fn creation_option(self, key: &str, value: impl fmt::Display) -> Self {
        self.arg("-co").arg(format!("{}={}", key, value))
    }

    /// Append `--config KEY VALUE`
    pub fn config(self, key: &str, value: impl fmt::Display) -> Self {
        self.arg("--config").arg(key).arg(value.to_string())
    }

    /// Operator name
    pub fn operator(&self) -> &str {
        &self.operator
    }

    /// The command line as a single shell-like string
    pub fn command_line(&self) -> String {
        let mut line = quote(&self.program.to_string_lossy());
        for arg in &self.args {
            line.push(' ');
            line.push_str(&quote(&arg.to_string_lossy()));
        }
        line
    }

    /// Run the command to completion and return its standard output
    pub fn run(&self) -> TilerResult<String> {
        let command_line = self.command_line();
        info!("Executing: {}", command_line);
        let started = Instant::now();

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| TilerError::OperatorFailure {
                operator: self.operator.clone(),
                command: command_line.clone(),
                status: None,
                output: format!("failed to start: {}", e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(
            "{} finished in {:.2}s with {}",
            self.operator,
            started.elapsed().as_secs_f64(),
            output.status
        );

        if !output.status.success() {
            let mut captured = stdout;
            if !stderr.trim().is_empty() {
                if !captured.is_empty() {
                    captured.push('\n');
                }
                captured.push_str(&stderr);
            }
            return Err(TilerError::OperatorFailure {
                operator: self.operator.clone(),
                command: command_line,
                status: output.status.code(),
                output: captured,
            });
        }

        Ok(stdout)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command_line())
    }
}

/// Single-quote an argument when it would not survive a shell as-is
fn quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:%,+@".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}
