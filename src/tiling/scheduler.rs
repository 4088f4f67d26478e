//! Stage execution on a bounded worker pool
//!
//! Tasks of one stage run concurrently on a rayon pool of `workers`
//! threads. A stage returns only once every task has finished, which is
//! the barrier between pyramid levels. Completion is tracked in memory by
//! a [`CompletionLedger`] instead of being re-derived from the folder.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{error, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::FailurePolicy;
use crate::errors::{TilerError, TilerResult};
use crate::tiling::plan::{Stage, Task};
use crate::utils::progress::ProgressTracker;

/// Outcome of one task
#[derive(Debug)]
pub enum TaskStatus {
    Produced,
    /// Outputs were left over from an earlier run
    Skipped,
    Failed(TilerError),
    /// Never started because the run was aborted
    Cancelled,
}

#[derive(Debug)]
pub struct TaskResult {
    /// Human readable task name
    pub label: String,
    pub outputs: Vec<PathBuf>,
    pub status: TaskStatus,
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, TaskStatus::Produced | TaskStatus::Skipped)
    }
}

/// Which tiles this run planned and which it completed
#[derive(Debug, Default)]
pub struct CompletionLedger {
    planned: HashSet<PathBuf>,
    completed: HashSet<PathBuf>,
}

impl CompletionLedger {
    /// A ledger expecting `planned` to be produced by this run
    pub fn new<'a, I>(planned: I) -> Self
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        CompletionLedger {
            planned: planned.into_iter().cloned().collect(),
            completed: HashSet::new(),
        }
    }

    /// Record the outputs of a successful task
    pub fn record(&mut self, result: &TaskResult) {
        if result.is_success() {
            self.completed.extend(result.outputs.iter().cloned());
        }
    }

    pub fn is_completed(&self, path: &Path) -> bool {
        self.completed.contains(path)
    }

    /// Whether a dependency is available
    ///
    /// Tiles planned by this run must have been completed by it; tiles
    /// outside the run must already exist on disk.
    pub fn is_available(&self, path: &Path) -> bool {
        if self.planned.contains(path) {
            self.completed.contains(path)
        } else {
            path.is_file()
        }
    }

    /// First dependency of `task` that is not available
    pub fn missing_dependency<'t>(&self, task: &'t Task) -> Option<&'t PathBuf> {
        task.dependencies.iter().find(|dependency| !self.is_available(dependency))
    }
}

pub struct Scheduler {
    pool: ThreadPool,
    policy: FailurePolicy,
    aborted: AtomicBool,
    show_progress: bool,
}

impl Scheduler {
    /// Create a scheduler with `workers` threads
    pub fn new(workers: usize, policy: FailurePolicy) -> TilerResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|index| format!("orthotiler-worker-{}", index))
            .build()
            .map_err(|e| TilerError::GenericError(format!("Failed to start worker pool: {}", e)))?;

        Ok(Scheduler {
            pool,
            policy,
            aborted: AtomicBool::new(false),
            show_progress: false,
        })
    }

    /// Draw a progress bar per stage
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Whether a failure stopped the run
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Run every task of `stage` and wait for all of them
    ///
    /// Tasks with an unavailable dependency fail with `MissingInputTile`
    /// without calling `execute`. `execute` returns `Ok(true)` when it
    /// skipped a task whose outputs already existed.
    pub fn run_stage<F>(&self, stage: &Stage, ledger: &CompletionLedger, execute: F) -> Vec<TaskResult>
    where
        F: Fn(&Task) -> TilerResult<bool> + Sync,
    {
        let progress = if self.show_progress && !stage.tasks.is_empty() {
            Some(ProgressTracker::new(stage.tasks.len() as u64, &format!("level {}", stage.level)))
        } else {
            None
        };

        let results: Vec<TaskResult> = self.pool.install(|| {
            stage
                .tasks
                .par_iter()
                .map(|task| {
                    let result = self.run_task(task, ledger, &execute);
                    if let Some(progress) = &progress {
                        progress.increment(1);
                    }
                    result
                })
                .collect()
        });

        if let Some(progress) = progress {
            progress.finish();
        }
        results
    }

    fn run_task<F>(&self, task: &Task, ledger: &CompletionLedger, execute: &F) -> TaskResult
    where
        F: Fn(&Task) -> TilerResult<bool> + Sync,
    {
        let label = task.to_string();
        let outputs = task.outputs.clone();

        if self.is_aborted() {
            return TaskResult { label, outputs, status: TaskStatus::Cancelled };
        }

        let status = match ledger.missing_dependency(task) {
            Some(missing) => TaskStatus::Failed(TilerError::MissingInputTile(missing.clone())),
            None => match execute(task) {
                Ok(true) => TaskStatus::Skipped,
                Ok(false) => TaskStatus::Produced,
                Err(e) => TaskStatus::Failed(e),
            },
        };

        if let TaskStatus::Failed(e) = &status {
            error!("{} failed: {}", label, e);
            if self.policy == FailurePolicy::Abort && !self.aborted.swap(true, Ordering::SeqCst) {
                warn!("Aborting run after failure of {}", label);
            }
        }

        TaskResult { label, outputs, status }
    }
}
