//! Task graph of a pyramid build
//!
//! Level-0 crops are leaves. Every aggregation task names the 16 tiles it
//! reads; stage `L` only holds tasks whose dependencies are outputs of
//! stage `L-1` or tiles already on disk.

use std::fmt;
use std::path::PathBuf;

use crate::errors::TilerResult;
use crate::raster::{Band, PixelWindow};
use crate::tiling::address::TileCoordinate;
use crate::tiling::aggregator::LevelAggregator;
use crate::tiling::cropper::TileCropper;
use crate::tiling::grid::{TileGrid, TileRect};

/// Work of one task
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskKind {
    /// Produce the level-0 tiles of a coordinate
    Crop {
        coordinate: TileCoordinate,
        window: PixelWindow,
    },
    /// Produce one pyramid tile from a 4x4 block
    Aggregate {
        level: u32,
        block_column: u32,
        block_row: u32,
        band: Band,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub kind: TaskKind,
    /// Files the task persists
    pub outputs: Vec<PathBuf>,
    /// Files that must exist before the task runs
    pub dependencies: Vec<PathBuf>,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TaskKind::Crop { coordinate, .. } => write!(f, "crop {}", coordinate),
            TaskKind::Aggregate { level, block_column, block_row, band } => write!(
                f,
                "level {} {} block {}",
                level,
                band,
                TileCoordinate::from_cell(block_column, block_row)
            ),
        }
    }
}

/// The tasks of one level
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub level: u32,
    /// Tile rectangle of the level
    pub rect: TileRect,
    pub tasks: Vec<Task>,
}

/// Every stage of a build, level 0 first
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidPlan {
    pub stages: Vec<Stage>,
}

impl PyramidPlan {
    /// Plan the crops of `rect` and `levels` pyramid levels above it
    ///
    /// Fails when any tile of the plan cannot be named.
    pub fn new(
        grid: &TileGrid,
        rect: TileRect,
        levels: u32,
        cropper: &TileCropper<'_>,
        aggregator: &LevelAggregator<'_>,
    ) -> TilerResult<Self> {
        let mut stages = Vec::with_capacity(levels as usize + 1);

        let mut crops = Vec::with_capacity(rect.tile_count() as usize);
        for (column, row) in rect.cells() {
            let coordinate = TileCoordinate::from_cell(column, row);
            let output = cropper.outputs(coordinate)?;
            crops.push(Task {
                kind: TaskKind::Crop {
                    coordinate,
                    window: grid.pixel_window(column, row),
                },
                outputs: output.paths().iter().map(|path| path.to_path_buf()).collect(),
                dependencies: Vec::new(),
            });
        }
        stages.push(Stage { level: 0, rect, tasks: crops });

        let mut level_rect = rect;
        for level in 1..=levels {
            level_rect = level_rect.coarser();
            let mut tasks = Vec::with_capacity(level_rect.tile_count() as usize * Band::ALL.len());
            for (block_column, block_row) in level_rect.cells() {
                for band in Band::ALL {
                    tasks.push(Task {
                        kind: TaskKind::Aggregate { level, block_column, block_row, band },
                        outputs: vec![aggregator.output(block_column, block_row, level, band)?],
                        dependencies: aggregator.inputs(block_column, block_row, level, band)?,
                    });
                }
            }
            stages.push(Stage { level, rect: level_rect, tasks });
        }

        Ok(PyramidPlan { stages })
    }

    /// Number of tasks over all stages
    pub fn task_count(&self) -> usize {
        self.stages.iter().map(|stage| stage.tasks.len()).sum()
    }

    /// Every output of every task
    pub fn outputs(&self) -> impl Iterator<Item = &PathBuf> {
        self.stages
            .iter()
            .flat_map(|stage| stage.tasks.iter())
            .flat_map(|task| task.outputs.iter())
    }
}
