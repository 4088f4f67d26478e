//! Per-level outcome of a pyramid build

use std::fmt;

use crate::errors::TilerError;
use crate::tiling::grid::TileRect;
use crate::tiling::scheduler::{TaskResult, TaskStatus};

/// A failed tile or block
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFailure {
    pub label: String,
    pub error: String,
    /// Command line of the failing operator, when an operator failed
    pub command: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelReport {
    pub level: u32,
    pub rect: TileRect,
    pub planned: usize,
    pub produced: usize,
    pub skipped: usize,
    pub cancelled: usize,
    pub failures: Vec<TaskFailure>,
    /// `false` when the level never ran because the build was aborted
    pub ran: bool,
}

impl LevelReport {
    /// Summarize the results of a stage
    pub fn from_results(level: u32, rect: TileRect, results: &[TaskResult]) -> Self {
        let mut report = LevelReport::not_run(level, rect, results.len());
        report.ran = true;
        for result in results {
            match &result.status {
                TaskStatus::Produced => report.produced += 1,
                TaskStatus::Skipped => report.skipped += 1,
                TaskStatus::Cancelled => report.cancelled += 1,
                TaskStatus::Failed(e) => report.failures.push(TaskFailure {
                    label: result.label.clone(),
                    error: e.to_string(),
                    command: match e {
                        TilerError::OperatorFailure { command, .. } => Some(command.clone()),
                        _ => None,
                    },
                }),
            }
        }
        report
    }

    /// A level that was planned but never started
    pub fn not_run(level: u32, rect: TileRect, planned: usize) -> Self {
        LevelReport {
            level,
            rect,
            planned,
            produced: 0,
            skipped: 0,
            cancelled: 0,
            failures: Vec::new(),
            ran: false,
        }
    }

    /// Whether every planned task of the level succeeded
    pub fn is_success(&self) -> bool {
        self.produced + self.skipped == self.planned
    }

    /// Whether the level had nothing to build
    pub fn is_empty(&self) -> bool {
        self.planned == 0
    }
}

impl fmt::Display for LevelReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            if self.level == 0 {
                return write!(f, "Level 0: no tiles requested");
            }
            return write!(
                f,
                "Level {}: no level-{} output (level grid {}x{} is smaller than one 4x4 block)",
                self.level, self.level, self.rect.width, self.rect.height
            );
        }
        if !self.ran {
            return write!(f, "Level {}: not run, {} tasks dropped after abort", self.level, self.planned);
        }
        write!(
            f,
            "Level {}: {} produced, {} skipped, {} failed",
            self.level,
            self.produced,
            self.skipped,
            self.failures.len()
        )?;
        if self.cancelled > 0 {
            write!(f, ", {} cancelled", self.cancelled)?;
        }
        Ok(())
    }
}

/// Outcome of a whole build
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BuildReport {
    pub levels: Vec<LevelReport>,
    pub aborted: bool,
}

impl BuildReport {
    /// Whether every planned tile and block succeeded
    pub fn is_success(&self) -> bool {
        !self.aborted && self.levels.iter().all(LevelReport::is_success)
    }

    pub fn level(&self, level: u32) -> Option<&LevelReport> {
        self.levels.iter().find(|report| report.level == level)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskFailure> {
        self.levels.iter().flat_map(|report| report.failures.iter())
    }

    pub fn failure_count(&self) -> usize {
        self.levels.iter().map(|report| report.failures.len()).sum()
    }

    /// Process exit status of the run
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.levels {
            writeln!(f, "{}", report)?;
            for failure in &report.failures {
                writeln!(f, "  FAILED {}: {}", failure.label, failure.error)?;
            }
        }
        if self.is_success() {
            write!(f, "Build succeeded")
        } else {
            write!(f, "Build failed: {} failed tasks", self.failure_count())
        }
    }
}
