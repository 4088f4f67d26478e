//! Tiling and pyramid construction
//!
//! [`PyramidBuilder`] crops the requested level-0 rectangle with
//! [`TileCropper`], then builds each configured level with
//! [`LevelAggregator`], one stage per level on a bounded worker pool.
//! All file names come from [`TileNamer`].

pub mod address;
pub mod aggregator;
pub mod cropper;
mod existing;
pub mod grid;
pub mod inventory;
pub mod plan;
pub mod pyramid;
pub mod report;
pub mod scheduler;
#[cfg(test)]
mod tests;

pub use self::address::{address, TileCoordinate, TileNamer, Variant};
pub use self::aggregator::{AggregateOutput, LevelAggregator};
pub use self::cropper::{CropOutput, TileCropper};
pub use self::existing::TileExpectation;
pub use self::grid::{TileGrid, TileRect, BLOCK_SPAN};
pub use self::inventory::{parse_tile_name, Inventory, TileName};
pub use self::plan::{PyramidPlan, Stage, Task, TaskKind};
pub use self::pyramid::PyramidBuilder;
pub use self::report::{BuildReport, LevelReport, TaskFailure};
pub use self::scheduler::{CompletionLedger, Scheduler, TaskResult, TaskStatus};
