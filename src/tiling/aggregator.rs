//! Pyramid level construction
//!
//! A tile at level `L >= 1` is built from the 4x4 block of level `L-1`
//! tiles it covers: the 16 inputs are mosaicked, the mosaic is rescaled and
//! the result receives internal overviews like a level-0 split.

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info};

use crate::config::TilerConfig;
use crate::errors::{TilerError, TilerResult};
use crate::operators::RasterOperators;
use crate::raster::{scaled_size, Band, Extent, GeoTransform};
use crate::tiling::address::{TileCoordinate, TileNamer, Variant};
use crate::tiling::existing::{is_complete, TileExpectation};
use crate::tiling::grid::BLOCK_SPAN;
use crate::utils::scratch::ScratchFiles;

/// One aggregated tile
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateOutput {
    pub path: PathBuf,
    pub skipped: bool,
}

/// Builds pyramid tiles from blocks of the level below
pub struct LevelAggregator<'a> {
    operators: &'a dyn RasterOperators,
    config: &'a TilerConfig,
    namer: &'a TileNamer,
}

impl<'a> LevelAggregator<'a> {
    pub fn new(operators: &'a dyn RasterOperators, config: &'a TilerConfig, namer: &'a TileNamer) -> Self {
        LevelAggregator { operators, config, namer }
    }

    /// The 16 level-below tiles of the 0-based block `(block_column, block_row)`, row by row
    pub fn inputs(&self, block_column: u32, block_row: u32, level: u32, band: Band) -> TilerResult<Vec<PathBuf>> {
        let below = Variant::for_level(band, level.saturating_sub(1));
        let mut inputs = Vec::with_capacity((BLOCK_SPAN * BLOCK_SPAN) as usize);
        for row in 0..BLOCK_SPAN {
            for column in 0..BLOCK_SPAN {
                let coordinate =
                    TileCoordinate::from_cell(block_column * BLOCK_SPAN + column, block_row * BLOCK_SPAN + row);
                inputs.push(self.namer.path(coordinate, below)?);
            }
        }
        Ok(inputs)
    }

    /// Path of the tile produced for the 0-based block `(block_column, block_row)`
    pub fn output(&self, block_column: u32, block_row: u32, level: u32, band: Band) -> TilerResult<PathBuf> {
        self.namer.path(
            TileCoordinate::from_cell(block_column, block_row),
            Variant::for_level(band, level),
        )
    }

    /// Build one tile at `level`
    ///
    /// # Arguments
    /// * `block_column`, `block_row` - 0-based cell of the output tile in the level grid
    /// * `level` - Output level, 1 or more
    /// * `band` - Composition to aggregate
    ///
    /// # Returns
    /// The output tile. Fails with `MissingInputTile` before invoking any
    /// operator when an input is absent, and with `ExtentMismatch` when the
    /// output does not cover its inputs.
    pub fn aggregate(&self, block_column: u32, block_row: u32, level: u32, band: Band) -> TilerResult<AggregateOutput> {
        if level == 0 {
            return Err(TilerError::GenericError("pyramid levels start at 1".to_string()));
        }

        let inputs = self.inputs(block_column, block_row, level, band)?;
        let output = self.output(block_column, block_row, level, band)?;

        if let Some(missing) = inputs.iter().find(|input| !input.is_file()) {
            return Err(TilerError::MissingInputTile(missing.clone()));
        }

        let (block, input_pixel) = self.block_extent(&inputs)?;
        let expectation = TileExpectation::new(band.band_count() as u64)
            .with_overviews(self.config.overview_factors().len())
            .with_geotransform(self.expected_geotransform(&block, input_pixel));
        if self.config.skip_existing() && is_complete(&output, &expectation) {
            info!("Skipping {}: already complete", output.display());
            return Ok(AggregateOutput { path: output, skipped: true });
        }

        let started = Instant::now();
        let mut scratch = ScratchFiles::new();
        let mosaic = scratch.track(output.with_extension("vrt"));
        scratch.track(output.clone());

        self.operators.build_mosaic(&inputs, &mosaic)?;
        self.operators.rescale(&mosaic, self.config.rescale_percent(), band, &output)?;
        self.check_extent(&block, &output)?;
        self.operators.build_overviews(&output, self.config.overview_factors(), band)?;

        scratch.keep(&output);
        info!(
            "Level {} {} tile {} finished in {:.1}s",
            level,
            band,
            TileCoordinate::from_cell(block_column, block_row),
            started.elapsed().as_secs_f64()
        );
        Ok(AggregateOutput { path: output, skipped: false })
    }

    /// Union of the input extents, with the pixel size of the first input
    fn block_extent(&self, inputs: &[PathBuf]) -> TilerResult<(Extent, f64)> {
        let mut extents = Vec::with_capacity(inputs.len());
        let mut input_pixel = None;
        for input in inputs {
            let info = self.operators.raster_info(input)?;
            input_pixel.get_or_insert(info.geotransform.pixel_width().abs());
            extents.push(info.extent());
        }
        let block = Extent::union_all(&extents)
            .ok_or_else(|| TilerError::GenericError("empty aggregation block".to_string()))?;
        Ok((block, input_pixel.unwrap_or(0.0)))
    }

    /// Georeferencing of the rescaled mosaic of `block`
    fn expected_geotransform(&self, block: &Extent, input_pixel: f64) -> GeoTransform {
        let factor = self.config.rescale_percent() / 100.0;
        let mosaic_pixels = |span: f64| if input_pixel > 0.0 { (span / input_pixel).round() as u64 } else { 1 };
        let width = scaled_size(mosaic_pixels(block.width()), factor);
        let height = scaled_size(mosaic_pixels(block.height()), factor);
        GeoTransform::north_up(
            block.min_x,
            block.max_y,
            block.width() / width as f64,
            block.height() / height as f64,
        )
    }

    /// Compare the output extent with the block extent
    ///
    /// Edges may differ by half an output pixel, the rounding a resample
    /// to a whole number of pixels introduces.
    fn check_extent(&self, expected: &Extent, output: &Path) -> TilerResult<()> {
        let info = self.operators.raster_info(output)?;
        let actual = info.extent();
        let pixel = info
            .geotransform
            .pixel_width()
            .abs()
            .max(info.geotransform.pixel_height().abs());

        debug!("Block extent {:?}, output extent {:?}", expected, actual);
        if !expected.approx_eq(&actual, pixel / 2.0) {
            return Err(TilerError::ExtentMismatch {
                expected: expected.to_array(),
                actual: actual.to_array(),
            });
        }
        Ok(())
    }
}
