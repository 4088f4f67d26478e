//! Level-0 tile production
//!
//! One crop turns a window of the source mosaic into three persisted tiles
//! sharing the same pixel grid:
//!
//! * `R<row>C<col>.tif`: the 4-band tile with its footprint as internal mask
//! * `R<row>C<col>_RGB.tif`: bands 1-3 with internal overviews
//! * `R<row>C<col>_IR.tif`: band 4 with internal overviews
//!
//! The canonical composite path only ever receives a fully masked tile;
//! the unmasked crop lives under a scratch name until it is deleted or
//! renamed aside.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info};

use crate::config::TilerConfig;
use crate::errors::TilerResult;
use crate::operators::RasterOperators;
use crate::raster::{Band, MaskedTileDescriptor, PixelWindow, RasterInfo, COMPOSITE_BAND_COUNT};
use crate::tiling::address::{TileCoordinate, TileNamer, Variant};
use crate::tiling::existing::{is_complete, TileExpectation};
use crate::utils::scratch::ScratchFiles;

/// Tiles persisted for one level-0 coordinate
#[derive(Debug, Clone, PartialEq)]
pub struct CropOutput {
    pub composite: PathBuf,
    pub rgb: PathBuf,
    pub ir: PathBuf,
    /// `true` when all three tiles were left over from an earlier run
    pub skipped: bool,
}

impl CropOutput {
    pub fn paths(&self) -> [&Path; 3] {
        [&self.composite, &self.rgb, &self.ir]
    }

    /// Path of the split holding `band`
    pub fn split(&self, band: Band) -> &Path {
        match band {
            Band::Rgb => &self.rgb,
            Band::Ir => &self.ir,
        }
    }
}

/// Produces masked, band-split level-0 tiles from a source mosaic
pub struct TileCropper<'a> {
    operators: &'a dyn RasterOperators,
    config: &'a TilerConfig,
    namer: &'a TileNamer,
}

impl<'a> TileCropper<'a> {
    pub fn new(operators: &'a dyn RasterOperators, config: &'a TilerConfig, namer: &'a TileNamer) -> Self {
        TileCropper { operators, config, namer }
    }

    /// Paths of the three tiles of `coordinate`
    pub fn outputs(&self, coordinate: TileCoordinate) -> TilerResult<CropOutput> {
        Ok(CropOutput {
            composite: self.namer.path(coordinate, Variant::Composite)?,
            rgb: self.namer.path(coordinate, Variant::Split(Band::Rgb))?,
            ir: self.namer.path(coordinate, Variant::Split(Band::Ir))?,
            skipped: false,
        })
    }

    /// Crop one tile
    ///
    /// # Arguments
    /// * `source` - Source mosaic (GeoTIFF or VRT)
    /// * `source_info` - Metadata of `source`
    /// * `coordinate` - Level-0 coordinate of the tile
    /// * `window` - Source pixels of the tile
    ///
    /// # Returns
    /// The three persisted tiles, or the first operator failure. On failure
    /// no scratch file is left behind and the canonical composite path is
    /// untouched.
    pub fn crop(
        &self,
        source: &Path,
        source_info: &RasterInfo,
        coordinate: TileCoordinate,
        window: &PixelWindow,
    ) -> TilerResult<CropOutput> {
        let mut output = self.outputs(coordinate)?;
        let grid = source_info.window(window.x, window.y, window.width, window.height);

        if self.config.skip_existing() && self.is_complete(&output, &grid) {
            info!("Skipping {}: tiles already complete", coordinate);
            output.skipped = true;
            return Ok(output);
        }

        let started = Instant::now();
        info!("Cropping {} from window {}", coordinate, window);

        self.produce_composite(source, coordinate, window, &grid, &output.composite)?;

        for band in Band::ALL {
            self.split(&output.composite, band, output.split(band))?;
        }

        info!("Tile {} finished in {:.1}s", coordinate, started.elapsed().as_secs_f64());
        Ok(output)
    }

    /// Crop, mask and move the composite into place
    fn produce_composite(
        &self,
        source: &Path,
        coordinate: TileCoordinate,
        window: &PixelWindow,
        grid: &RasterInfo,
        composite: &Path,
    ) -> TilerResult<()> {
        let mut scratch = ScratchFiles::new();
        let raw = scratch.track(self.namer.scratch_path(coordinate, Variant::Composite, "raw", "tif")?);
        let mask = scratch.track(self.namer.scratch_path(coordinate, Variant::Composite, "", "msk")?);
        let descriptor = scratch.track(self.namer.scratch_path(coordinate, Variant::Composite, "", "vrt")?);
        let masked = scratch.track(self.namer.scratch_path(coordinate, Variant::Composite, "masked", "tif")?);

        self.operators.crop(source, window, &raw)?;

        let footprint = self.operators.extract_footprint(&raw)?;
        scratch.track_all(footprint.artifacts.iter().cloned());
        scratch.track(footprint.vector_file.clone());

        self.operators.rasterize(&footprint, grid, &mask)?;

        MaskedTileDescriptor::new(grid, &raw, &mask, self.config.block_size())?.write_to(&descriptor)?;

        self.operators.apply_mask(&descriptor, &masked)?;

        if self.config.delete_original() {
            debug!("Deleting unmasked crop {}", raw.display());
        } else {
            let aside = self.namer.scratch_path(coordinate, Variant::Composite, "old", "tif")?;
            debug!("Keeping unmasked crop as {}", aside.display());
            fs::rename(&raw, &aside)?;
            scratch.keep(&raw);
        }

        if composite.exists() {
            fs::remove_file(composite)?;
        }
        fs::rename(&masked, composite)?;
        scratch.keep(&masked);
        Ok(())
    }

    /// Write the split holding `band` and add its overviews
    fn split(&self, composite: &Path, band: Band, output: &Path) -> TilerResult<()> {
        let mut scratch = ScratchFiles::new();
        scratch.track(output);

        self.operators.extract_bands(composite, band, output)?;
        self.operators.build_overviews(output, self.config.overview_factors(), band)?;

        scratch.keep(output);
        Ok(())
    }

    fn is_complete(&self, output: &CropOutput, grid: &RasterInfo) -> bool {
        let composite = TileExpectation::new(COMPOSITE_BAND_COUNT as u64)
            .with_size(grid.width, grid.height)
            .with_mask()
            .with_geotransform(grid.geotransform);
        if !is_complete(&output.composite, &composite) {
            return false;
        }

        Band::ALL.iter().all(|&band| {
            let expectation = TileExpectation::new(band.band_count() as u64)
                .with_size(grid.width, grid.height)
                .with_overviews(self.config.overview_factors().len());
            is_complete(output.split(band), &expectation)
        })
    }
}
