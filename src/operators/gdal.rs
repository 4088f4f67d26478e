//! GDAL command-line backend

use std::path::{Path, PathBuf};

use crate::config::GdalSettings;
use crate::errors::{TilerError, TilerResult};
use crate::operators::command::ToolCommand;
use crate::operators::gdalinfo::parse_gdalinfo_json;
use crate::operators::{Footprint, RasterOperators};
use crate::raster::{Band, PixelWindow, RasterInfo};
use crate::utils::scratch::ScratchFiles;

/// Files written next to a raster by the footprint tool, besides the `.shp`
const FOOTPRINT_SIDECARS: [&str; 5] = ["shx", "dbf", "prj", "fix", "qix"];

/// [`RasterOperators`] implemented by running `gdal_translate`, `gdal_rasterize`,
/// `gdaladdo`, `gdalbuildvrt`, `gdalinfo` and the footprint tool
#[derive(Debug, Clone, Default)]
pub struct GdalOperators {
    settings: GdalSettings,
}

impl GdalOperators {
    pub fn new(settings: GdalSettings) -> Self {
        GdalOperators { settings }
    }

    pub fn settings(&self) -> &GdalSettings {
        &self.settings
    }

    fn tool(&self, operator: &str, program: &str) -> ToolCommand {
        ToolCommand::new(operator, self.settings.tool_path(program))
    }

    /// `gdal_translate` with the cache limit applied
    fn translate(&self, operator: &str) -> ToolCommand {
        self.tool(operator, "gdal_translate")
            .config("GDAL_CACHEMAX", self.settings.cache_max_mb)
    }

    /// Creation options shared by the JPEG-compressed RGB/IR outputs
    fn jpeg_output(command: ToolCommand, band: Band) -> ToolCommand {
        let command = command
            .arg("-of")
            .arg("GTiff")
            .creation_option("ALPHA", "NO")
            .creation_option("TILED", "YES")
            .creation_option("COMPRESS", "JPEG")
            .config("GDAL_TIFF_INTERNAL_MASK", "YES");
        if band.is_color() {
            command.creation_option("PHOTOMETRIC", "YCBCR")
        } else {
            command
        }
    }

    /// Command line of the crop step
    pub fn crop_command(&self, source: &Path, window: &PixelWindow, output: &Path) -> ToolCommand {
        self.translate("crop")
            .arg("-srcwin")
            .args([
                window.x.to_string(),
                window.y.to_string(),
                window.width.to_string(),
                window.height.to_string(),
            ])
            .creation_option("BLOCKXSIZE", self.settings.block_size)
            .creation_option("BLOCKYSIZE", self.settings.block_size)
            .creation_option("TILED", "YES")
            .creation_option("PHOTOMETRIC", "RGB")
            .creation_option("ALPHA", "NO")
            .path(source)
            .path(output)
    }

    pub fn rasterize_command(&self, footprint: &Footprint, grid: &RasterInfo, output: &Path) -> ToolCommand {
        let extent = grid.extent();
        self.tool("rasterize", "gdal_rasterize")
            .arg("-of")
            .arg("GTiff")
            .arg("-ot")
            .arg("Byte")
            .arg("-l")
            .arg(footprint.layer.as_str())
            .creation_option("TILED", "YES")
            .creation_option("BLOCKXSIZE", self.settings.block_size)
            .creation_option("BLOCKYSIZE", self.settings.block_size)
            .creation_option("NBITS", 1)
            .creation_option("PHOTOMETRIC", "MINISBLACK")
            .creation_option("COMPRESS", "DEFLATE")
            .arg("-burn")
            .arg("1")
            .arg("-te")
            .args([
                extent.min_x.to_string(),
                extent.min_y.to_string(),
                extent.max_x.to_string(),
                extent.max_y.to_string(),
            ])
            .arg("-ts")
            .args([grid.width.to_string(), grid.height.to_string()])
            .path(&footprint.vector_file)
            .path(output)
    }

    pub fn apply_mask_command(&self, descriptor: &Path, output: &Path) -> ToolCommand {
        self.translate("apply_mask")
            .arg("-of")
            .arg("GTiff")
            .creation_option("PHOTOMETRIC", "RGB")
            .creation_option("ALPHA", "NO")
            .creation_option("TILED", "YES")
            .creation_option("COMPRESS", "DEFLATE")
            .args(["-b", "1", "-b", "2", "-b", "3", "-b", "4", "-mask", "5"])
            .config("GDAL_TIFF_INTERNAL_MASK", "YES")
            .path(descriptor)
            .path(output)
    }

    pub fn extract_bands_command(&self, source: &Path, band: Band, output: &Path) -> ToolCommand {
        let mut command = Self::jpeg_output(self.translate("extract_bands"), band);
        for index in band.source_bands() {
            command = command.arg("-b").arg(index.to_string());
        }
        command.path(source).path(output)
    }

    pub fn overviews_command(&self, raster: &Path, factors: &[u32], band: Band) -> ToolCommand {
        let mut command = self
            .tool("build_overviews", "gdaladdo")
            .arg("-r")
            .arg("average")
            .config("COMPRESS_OVERVIEW", "JPEG");
        if band.is_color() {
            command = command.config("PHOTOMETRIC_OVERVIEW", "YCBCR");
        }
        command
            .path(raster)
            .args(factors.iter().map(|factor| factor.to_string()))
    }

    pub fn mosaic_command(&self, tiles: &[PathBuf], output: &Path) -> ToolCommand {
        let mut command = self.tool("build_mosaic", "gdalbuildvrt").path(output);
        for tile in tiles {
            command = command.path(tile);
        }
        command
    }

    pub fn rescale_command(&self, source: &Path, percent: f64, band: Band, output: &Path) -> ToolCommand {
        let size = format!("{}%", percent);
        let command = self
            .translate("rescale")
            .arg("-outsize")
            .arg(size.as_str())
            .arg(size.as_str());
        Self::jpeg_output(command, band).path(source).path(output)
    }
}

impl RasterOperators for GdalOperators {
    fn raster_info(&self, raster: &Path) -> TilerResult<RasterInfo> {
        let json = self.tool("raster_info", "gdalinfo").arg("-json").path(raster).run()?;
        parse_gdalinfo_json(&json)
    }

    fn crop(&self, source: &Path, window: &PixelWindow, output: &Path) -> TilerResult<()> {
        self.crop_command(source, window, output).run().map(|_| ())
    }

    /// Runs the footprint tool, which writes a shapefile named after the raster
    fn extract_footprint(&self, raster: &Path) -> TilerResult<Footprint> {
        let stem = raster
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| TilerError::GenericError(format!("Raster has no file name: {}", raster.display())))?;

        let footprint = Footprint {
            vector_file: raster.with_extension("shp"),
            layer: stem.clone(),
            artifacts: footprint_artifacts(raster, &stem),
        };

        let mut scratch = ScratchFiles::new();
        scratch.track_all(footprint.artifacts.iter().cloned());

        let command = ToolCommand::new("extract_footprint", &self.settings.footprint_tool)
            .path(raster)
            .arg("SHAPEFILE")
            .arg("WKB");
        command.run()?;

        if !footprint.vector_file.exists() {
            return Err(TilerError::OperatorFailure {
                operator: command.operator().to_string(),
                command: command.command_line(),
                status: Some(0),
                output: format!("no footprint written to {}", footprint.vector_file.display()),
            });
        }

        scratch.release();
        Ok(footprint)
    }

    fn rasterize(&self, footprint: &Footprint, grid: &RasterInfo, output: &Path) -> TilerResult<()> {
        self.rasterize_command(footprint, grid, output).run().map(|_| ())
    }

    fn apply_mask(&self, descriptor: &Path, output: &Path) -> TilerResult<()> {
        self.apply_mask_command(descriptor, output).run().map(|_| ())
    }

    fn extract_bands(&self, source: &Path, band: Band, output: &Path) -> TilerResult<()> {
        self.extract_bands_command(source, band, output).run().map(|_| ())
    }

    fn build_overviews(&self, raster: &Path, factors: &[u32], band: Band) -> TilerResult<()> {
        if factors.is_empty() {
            return Ok(());
        }
        self.overviews_command(raster, factors, band).run().map(|_| ())
    }

    fn build_mosaic(&self, tiles: &[PathBuf], output: &Path) -> TilerResult<()> {
        self.mosaic_command(tiles, output).run().map(|_| ())
    }

    fn rescale(&self, source: &Path, percent: f64, band: Band, output: &Path) -> TilerResult<()> {
        self.rescale_command(source, percent, band, output).run().map(|_| ())
    }
}

/// Every file the footprint tool may leave next to `raster`
fn footprint_artifacts(raster: &Path, stem: &str) -> Vec<PathBuf> {
    let mut artifacts = vec![raster.with_extension("shp")];
    artifacts.extend(FOOTPRINT_SIDECARS.iter().map(|ext| raster.with_extension(ext)));
    artifacts.push(raster.with_file_name(format!("{}_simplified.wkb", stem)));
    artifacts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GeoTransform;

    fn operators() -> GdalOperators {
        GdalOperators::new(GdalSettings {
            bin_dir: Some(PathBuf::from("/opt/gdal/bin")),
            ..GdalSettings::default()
        })
    }

    #[test]
    fn test_crop_command() {
        let command = operators().crop_command(
            Path::new("/data/ortho.vrt"),
            &PixelWindow::new(16384, 32768, 16384, 16384),
            Path::new("/out/R0003C0002_raw.tif"),
        );
        assert_eq!(
            command.command_line(),
            "/opt/gdal/bin/gdal_translate --config GDAL_CACHEMAX 512 -srcwin 16384 32768 16384 16384 \
             -co BLOCKXSIZE=512 -co BLOCKYSIZE=512 -co TILED=YES -co PHOTOMETRIC=RGB -co ALPHA=NO \
             /data/ortho.vrt /out/R0003C0002_raw.tif"
        );
    }

    #[test]
    fn test_rasterize_uses_tile_grid() {
        let grid = RasterInfo::new(1024, 1024, 4, GeoTransform::north_up(1000.0, 2000.0, 0.5, 0.5));
        let footprint = Footprint {
            vector_file: PathBuf::from("/out/R0001C0001_raw.shp"),
            layer: "R0001C0001_raw".to_string(),
            artifacts: Vec::new(),
        };
        let line = operators()
            .rasterize_command(&footprint, &grid, Path::new("/out/R0001C0001.msk"))
            .command_line();

        assert!(line.contains("-l R0001C0001_raw"));
        assert!(line.contains("-te 1000 1488 1512 2000"));
        assert!(line.contains("-ts 1024 1024"));
        assert!(line.contains("-co NBITS=1"));
        assert!(!line.contains("-a cat"));
        assert!(line.ends_with("/out/R0001C0001_raw.shp /out/R0001C0001.msk"));
    }

    #[test]
    fn test_band_split_commands() {
        let ops = operators();
        let rgb = ops
            .extract_bands_command(Path::new("a.tif"), Band::Rgb, Path::new("a_RGB.tif"))
            .command_line();
        let ir = ops
            .extract_bands_command(Path::new("a.tif"), Band::Ir, Path::new("a_IR.tif"))
            .command_line();

        assert!(rgb.contains("-co PHOTOMETRIC=YCBCR"));
        assert!(rgb.contains("-b 1 -b 2 -b 3 a.tif a_RGB.tif"));
        assert!(!ir.contains("YCBCR"));
        assert!(ir.contains("-b 4 a.tif a_IR.tif"));
    }

    #[test]
    fn test_overviews_and_rescale_commands() {
        let ops = operators();
        let overviews = ops
            .overviews_command(Path::new("t_IR_1.tif"), &[2, 4], Band::Ir)
            .command_line();
        assert_eq!(
            overviews,
            "/opt/gdal/bin/gdaladdo -r average --config COMPRESS_OVERVIEW JPEG t_IR_1.tif 2 4"
        );

        let rescale = ops
            .rescale_command(Path::new("t.vrt"), 12.5, Band::Rgb, Path::new("t.tif"))
            .command_line();
        assert!(rescale.contains("-outsize 12.5% 12.5%"));
        assert!(rescale.ends_with("-co PHOTOMETRIC=YCBCR t.vrt t.tif"));
    }

    #[test]
    fn test_footprint_artifacts() {
        let artifacts = footprint_artifacts(Path::new("/out/R0001C0001_raw.tif"), "R0001C0001_raw");
        assert_eq!(artifacts.len(), 7);
        assert_eq!(artifacts[0], PathBuf::from("/out/R0001C0001_raw.shp"));
        assert!(artifacts.contains(&PathBuf::from("/out/R0001C0001_raw_simplified.wkb")));
    }
}
