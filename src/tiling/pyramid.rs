//! Top-level pyramid build

use std::fs;
use std::path::Path;
use std::time::Instant;

use log::{error, info, warn};

use crate::config::TilerConfig;
use crate::errors::TilerResult;
use crate::operators::RasterOperators;
use crate::tiling::aggregator::LevelAggregator;
use crate::tiling::address::TileNamer;
use crate::tiling::cropper::TileCropper;
use crate::tiling::grid::{TileGrid, TileRect};
use crate::tiling::plan::{PyramidPlan, Task, TaskKind};
use crate::tiling::report::{BuildReport, LevelReport};
use crate::tiling::scheduler::{CompletionLedger, Scheduler};
use crate::utils::logger::Logger;

/// Crops a source mosaic into tiles and builds the pyramid above them
pub struct PyramidBuilder<'a> {
    operators: &'a dyn RasterOperators,
    config: TilerConfig,
    run_log: Option<&'a Logger>,
    show_progress: bool,
}

impl<'a> PyramidBuilder<'a> {
    pub fn new(operators: &'a dyn RasterOperators, config: TilerConfig) -> Self {
        PyramidBuilder {
            operators,
            config,
            run_log: None,
            show_progress: false,
        }
    }

    /// Record the outcome of every build in `run_log`
    pub fn with_run_log(mut self, run_log: &'a Logger) -> Self {
        self.run_log = Some(run_log);
        self
    }

    /// Draw a progress bar per stage
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &TilerConfig {
        &self.config
    }

    /// Build the tiles of `window` and every configured level above them
    ///
    /// # Arguments
    /// * `source` - Source mosaic
    /// * `output` - Output folder, created when missing
    /// * `window` - Level-0 tile rectangle, `None` for the whole grid. It is
    ///   clamped to the grid.
    ///
    /// # Returns
    /// The per-level report. Tile and block failures are reported, not
    /// returned as errors; an error means the build could not start, for
    /// instance because a tile index does not fit in the configured digits.
    pub fn build(&self, source: &Path, output: &Path, window: Option<TileRect>) -> TilerResult<BuildReport> {
        let started = Instant::now();
        fs::create_dir_all(output)?;

        let source_info = self.operators.raster_info(source)?;
        let grid = TileGrid::for_raster(source_info.width, source_info.height, self.config.tile_size())?;
        info!(
            "Source {} is {}x{} pixels, {} bands: {}x{} tiles of {} pixels",
            source.display(),
            source_info.width,
            source_info.height,
            source_info.band_count,
            grid.columns,
            grid.rows,
            grid.tile_size
        );

        let rect = self.requested_rect(&grid, window);

        let namer = TileNamer::new(output, self.config.digits());
        let cropper = TileCropper::new(self.operators, &self.config, &namer);
        let aggregator = LevelAggregator::new(self.operators, &self.config, &namer);
        let plan = PyramidPlan::new(&grid, rect, self.config.levels(), &cropper, &aggregator)?;
        info!("Planned {} tasks over {} levels", plan.task_count(), plan.stages.len());

        let scheduler = Scheduler::new(self.config.workers(), self.config.failure_policy())?
            .with_progress(self.show_progress);
        let mut ledger = CompletionLedger::new(plan.outputs());
        let mut report = BuildReport::default();

        for stage in &plan.stages {
            if scheduler.is_aborted() {
                report.levels.push(LevelReport::not_run(stage.level, stage.rect, stage.tasks.len()));
                continue;
            }

            let stage_started = Instant::now();
            info!("Level {}: {} tasks over {}", stage.level, stage.tasks.len(), stage.rect);

            let execute = |task: &Task| -> TilerResult<bool> {
                match task.kind {
                    TaskKind::Crop { coordinate, window } => cropper
                        .crop(source, &source_info, coordinate, &window)
                        .map(|crop| crop.skipped),
                    TaskKind::Aggregate { level, block_column, block_row, band } => aggregator
                        .aggregate(block_column, block_row, level, band)
                        .map(|tile| tile.skipped),
                }
            };
            let results = scheduler.run_stage(stage, &ledger, execute);
            for result in &results {
                ledger.record(result);
            }

            let level_report = LevelReport::from_results(stage.level, stage.rect, &results);
            if level_report.is_success() {
                info!("{} in {:.1}s", level_report, stage_started.elapsed().as_secs_f64());
            } else {
                error!("{} in {:.1}s", level_report, stage_started.elapsed().as_secs_f64());
            }
            report.levels.push(level_report);
        }

        report.aborted = scheduler.is_aborted();
        info!("Build finished in {:.1}s", started.elapsed().as_secs_f64());

        if let Some(run_log) = self.run_log {
            if let Err(e) = run_log.log_build_report(source, &report) {
                warn!("Could not write run log: {}", e);
            }
        }

        Ok(report)
    }

    /// Clamp the requested rectangle to the grid
    fn requested_rect(&self, grid: &TileGrid, window: Option<TileRect>) -> TileRect {
        let full = grid.full_rect();
        let rect = match window {
            Some(window) => {
                let clamped = window.intersect(&full);
                if clamped != window {
                    warn!("Requested tiles {} clamped to the grid: {}", window, clamped);
                }
                clamped
            }
            None => full,
        };

        if rect.is_empty() {
            warn!("No level-0 tiles requested");
        } else if self.config.levels() > 0 && !rect.is_block_aligned() {
            warn!(
                "Tile rectangle {} does not start on a 4x4 block boundary; \
                 pyramid blocks will read tiles outside it",
                rect
            );
        }
        rect
    }
}
