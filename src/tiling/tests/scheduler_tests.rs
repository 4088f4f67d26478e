//! Tests for stage execution

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crate::config::FailurePolicy;
use crate::errors::TilerError;
use crate::raster::{Band, PixelWindow};
use crate::tiling::{CompletionLedger, Scheduler, Stage, Task, TaskKind, TaskStatus, TileCoordinate, TileRect};

fn crop_task(folder: &Path, column: u32) -> Task {
    Task {
        kind: TaskKind::Crop {
            coordinate: TileCoordinate::from_cell(column, 0),
            window: PixelWindow::new(u64::from(column) * 16, 0, 16, 16),
        },
        outputs: vec![folder.join(format!("R1C{}.tif", column + 1))],
        dependencies: Vec::new(),
    }
}

fn aggregate_task(folder: &Path, dependencies: Vec<PathBuf>) -> Task {
    Task {
        kind: TaskKind::Aggregate { level: 1, block_column: 0, block_row: 0, band: Band::Rgb },
        outputs: vec![folder.join("R1C1_RGB_1.tif")],
        dependencies,
    }
}

fn stage(level: u32, tasks: Vec<Task>) -> Stage {
    Stage { level, rect: TileRect::new(0, 0, tasks.len() as u32, 1), tasks }
}

#[test]
fn test_stage_runs_every_task() {
    let folder = Path::new("/out");
    let tasks: Vec<Task> = (0..6).map(|column| crop_task(folder, column)).collect();
    let stage = stage(0, tasks);
    let ledger = CompletionLedger::new(stage.tasks.iter().flat_map(|task| task.outputs.iter()));
    let scheduler = Scheduler::new(3, FailurePolicy::Continue).unwrap();
    let calls = AtomicUsize::new(0);

    let results = scheduler.run_stage(&stage, &ledger, |task| {
        calls.fetch_add(1, Ordering::SeqCst);
        match task.kind {
            TaskKind::Crop { coordinate, .. } => Ok(coordinate.column % 2 == 0),
            _ => Ok(false),
        }
    });

    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(results.len(), 6);
    assert!(results.iter().all(|result| result.is_success()));
    assert!(matches!(results[0].status, TaskStatus::Produced));
    assert!(matches!(results[1].status, TaskStatus::Skipped));
    assert_eq!(results[2].label, "crop R1C3");
}

#[test]
fn test_concurrency_stays_within_worker_count() {
    let folder = Path::new("/out");
    let stage = stage(0, (0..12).map(|column| crop_task(folder, column)).collect());
    let ledger = CompletionLedger::default();
    let scheduler = Scheduler::new(3, FailurePolicy::Continue).unwrap();
    let running = AtomicUsize::new(0);
    let peak = AtomicUsize::new(0);

    let results = scheduler.run_stage(&stage, &ledger, |_| {
        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(25));
        running.fetch_sub(1, Ordering::SeqCst);
        Ok(true)
    });

    assert!(results.iter().all(|result| result.is_success()));
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "{} tasks ran at once on 3 workers", peak);
    assert!(peak > 1, "tasks never overlapped");
}

#[test]
fn test_ledger_tracks_planned_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let planned = dir.path().join("R1C1.tif");
    let on_disk = dir.path().join("R1C2.tif");
    fs::write(&on_disk, "").unwrap();
    fs::write(&planned, "").unwrap();

    let mut ledger = CompletionLedger::new([planned.clone()].iter());
    assert!(!ledger.is_available(&planned));
    assert!(ledger.is_available(&on_disk));
    assert!(!ledger.is_available(&dir.path().join("R1C3.tif")));

    let task = crop_task(dir.path(), 0);
    let mut result = crate::tiling::TaskResult {
        label: task.to_string(),
        outputs: task.outputs.clone(),
        status: TaskStatus::Failed(TilerError::GenericError("boom".to_string())),
    };
    ledger.record(&result);
    assert!(!ledger.is_completed(&planned));

    result.status = TaskStatus::Produced;
    ledger.record(&result);
    assert!(ledger.is_completed(&planned));
    assert!(ledger.is_available(&planned));
}

#[test]
fn test_missing_dependency_skips_execution() {
    let folder = Path::new("/out");
    let crop = crop_task(folder, 0);
    let stage = stage(1, vec![aggregate_task(folder, crop.outputs.clone())]);
    let ledger = CompletionLedger::new(crop.outputs.iter());
    let scheduler = Scheduler::new(2, FailurePolicy::Continue).unwrap();
    let calls = AtomicUsize::new(0);

    let results = scheduler.run_stage(&stage, &ledger, |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    });

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    match &results[0].status {
        TaskStatus::Failed(TilerError::MissingInputTile(path)) => assert_eq!(path, &crop.outputs[0]),
        other => panic!("expected a missing input, got {:?}", other),
    }
    assert!(!scheduler.is_aborted());
}

#[test]
fn test_continue_policy_runs_siblings() {
    let folder = Path::new("/out");
    let stage = stage(0, (0..4).map(|column| crop_task(folder, column)).collect());
    let ledger = CompletionLedger::default();
    let scheduler = Scheduler::new(2, FailurePolicy::Continue).unwrap();

    let results = scheduler.run_stage(&stage, &ledger, |task| match task.kind {
        TaskKind::Crop { coordinate, .. } if coordinate.column == 2 => {
            Err(TilerError::GenericError("crop failed".to_string()))
        }
        _ => Ok(false),
    });

    let failed = results.iter().filter(|result| !result.is_success()).count();
    assert_eq!(failed, 1);
    assert!(!scheduler.is_aborted());
}

#[test]
fn test_abort_policy_cancels_remaining_tasks() {
    let folder = Path::new("/out");
    let stage = stage(0, (0..5).map(|column| crop_task(folder, column)).collect());
    let ledger = CompletionLedger::default();
    let scheduler = Scheduler::new(1, FailurePolicy::Abort).unwrap();

    let results = scheduler.run_stage(&stage, &ledger, |_| Err(TilerError::GenericError("crop failed".to_string())));

    assert!(scheduler.is_aborted());
    assert!(matches!(results[0].status, TaskStatus::Failed(_)));
    let cancelled = results
        .iter()
        .filter(|result| matches!(result.status, TaskStatus::Cancelled))
        .count();
    assert_eq!(cancelled, 4);
}
