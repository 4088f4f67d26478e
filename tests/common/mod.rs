//! Shared fixtures for the pyramid build tests
//!
//! [`FakeGdal`] stands in for the GDAL tools. Every raster it writes is a
//! header-only GeoTIFF, so the native probe sees real dimensions, band
//! counts, overviews, masks and georeferencing.

#![allow(dead_code)]

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use byteorder::{LittleEndian, WriteBytesExt};

use orthotiler::operators::Footprint;
use orthotiler::tiff::probe_file;
use orthotiler::{Band, Extent, GeoTransform, PixelWindow, RasterInfo, RasterOperators, TilerError, TilerResult};

/// Layout of a header-only GeoTIFF
#[derive(Debug, Clone)]
pub struct TiffImage {
    pub width: u64,
    pub height: u64,
    pub samples: u16,
    pub overviews: usize,
    pub masked: bool,
    pub geotransform: GeoTransform,
}

impl TiffImage {
    pub fn from_info(info: &RasterInfo) -> Self {
        TiffImage {
            width: info.width,
            height: info.height,
            samples: info.band_count as u16,
            overviews: 0,
            masked: false,
            geotransform: info.geotransform,
        }
    }
}

const DOUBLE: u16 = 12;
const LONG: u16 = 4;
const SHORT: u16 = 3;

enum Value {
    Short(u16),
    Long(u32),
    Doubles(Vec<f64>),
}

/// Write `image` as a little-endian classic TIFF without pixel data
pub fn write_tiff(path: &Path, image: &TiffImage) -> io::Result<()> {
    let gt = &image.geotransform.coefficients;
    let mut ifds: Vec<Vec<(u16, Value)>> = Vec::new();

    let mut main = image_entries(0, image.width, image.height, image.samples);
    main.push((33550, Value::Doubles(vec![gt[1], -gt[5], 0.0])));
    main.push((33922, Value::Doubles(vec![0.0, 0.0, 0.0, gt[0], gt[3], 0.0])));
    ifds.push(main);

    for level in 1..=image.overviews {
        let factor = 1u64 << level;
        ifds.push(image_entries(1, (image.width / factor).max(1), (image.height / factor).max(1), image.samples));
    }
    if image.masked {
        ifds.push(image_entries(4, image.width, image.height, 1));
        for level in 1..=image.overviews {
            let factor = 1u64 << level;
            ifds.push(image_entries(5, (image.width / factor).max(1), (image.height / factor).max(1), 1));
        }
    }

    let mut buffer: Vec<u8> = Vec::new();
    buffer.write_all(b"II")?;
    buffer.write_u16::<LittleEndian>(42)?;
    buffer.write_u32::<LittleEndian>(8)?;

    for (index, entries) in ifds.iter().enumerate() {
        let ifd_start = buffer.len();
        let mut data_offset = ifd_start + 2 + entries.len() * 12 + 4;
        let mut data: Vec<u8> = Vec::new();

        buffer.write_u16::<LittleEndian>(entries.len() as u16)?;
        for (tag, value) in entries {
            buffer.write_u16::<LittleEndian>(*tag)?;
            match value {
                Value::Short(v) => {
                    buffer.write_u16::<LittleEndian>(SHORT)?;
                    buffer.write_u32::<LittleEndian>(1)?;
                    buffer.write_u16::<LittleEndian>(*v)?;
                    buffer.write_u16::<LittleEndian>(0)?;
                }
                Value::Long(v) => {
                    buffer.write_u16::<LittleEndian>(LONG)?;
                    buffer.write_u32::<LittleEndian>(1)?;
                    buffer.write_u32::<LittleEndian>(*v)?;
                }
                Value::Doubles(values) => {
                    buffer.write_u16::<LittleEndian>(DOUBLE)?;
                    buffer.write_u32::<LittleEndian>(values.len() as u32)?;
                    buffer.write_u32::<LittleEndian>(data_offset as u32)?;
                    for v in values {
                        data.write_f64::<LittleEndian>(*v)?;
                    }
                    data_offset += values.len() * 8;
                }
            }
        }

        let next = if index + 1 < ifds.len() { data_offset as u32 } else { 0 };
        buffer.write_u32::<LittleEndian>(next)?;
        buffer.extend_from_slice(&data);
    }

    fs::write(path, buffer)
}

fn image_entries(subfile_type: u32, width: u64, height: u64, samples: u16) -> Vec<(u16, Value)> {
    vec![
        (254, Value::Long(subfile_type)),
        (256, Value::Long(width as u32)),
        (257, Value::Long(height as u32)),
        (277, Value::Short(samples)),
    ]
}

/// Metadata of a raster written by [`write_tiff`]
pub fn read_info(path: &Path) -> TilerResult<RasterInfo> {
    let summary = probe_file(path)?;
    let geotransform = summary
        .geotransform
        .ok_or_else(|| TilerError::GenericError(format!("{} is not georeferenced", path.display())))?;
    Ok(RasterInfo::new(summary.width, summary.height, summary.samples_per_pixel as usize, geotransform))
}

/// Write a source mosaic of `width` x `height` pixels at half a map unit per pixel
pub fn write_source(folder: &Path, width: u64, height: u64) -> PathBuf {
    let path = folder.join("source.tif");
    let info = RasterInfo::new(width, height, 4, GeoTransform::north_up(500000.0, 5400000.0, 0.5, 0.5));
    write_tiff(&path, &TiffImage::from_info(&info)).unwrap();
    path
}

/// In-process replacement for the GDAL command-line tools
#[derive(Default)]
pub struct FakeGdal {
    calls: Mutex<Vec<String>>,
    /// (operator, fragment of the output file name)
    failures: Mutex<Vec<(String, String)>>,
}

impl FakeGdal {
    pub fn new() -> Self {
        FakeGdal::default()
    }

    /// Make `operator` fail whenever its output file name contains `fragment`
    pub fn fail(&self, operator: &str, fragment: &str) {
        self.failures.lock().unwrap().push((operator.to_string(), fragment.to_string()));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Calls since the last `take_calls`, as `<operator> <output file name>`
    pub fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn begin(&self, operator: &str, output: &Path) -> TilerResult<()> {
        let name = output.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        self.calls.lock().unwrap().push(format!("{} {}", operator, name));

        let fails = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .any(|(op, fragment)| op == operator && name.contains(fragment.as_str()));
        if fails {
            fs::write(output, b"partial")?;
            return Err(TilerError::OperatorFailure {
                operator: operator.to_string(),
                command: format!("fake-gdal {} {}", operator, output.display()),
                status: Some(1),
                output: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

impl RasterOperators for FakeGdal {
    fn raster_info(&self, raster: &Path) -> TilerResult<RasterInfo> {
        read_info(raster)
    }

    fn crop(&self, source: &Path, window: &PixelWindow, output: &Path) -> TilerResult<()> {
        self.begin("crop", output)?;
        let info = read_info(source)?.window(window.x, window.y, window.width, window.height);
        write_tiff(output, &TiffImage::from_info(&info))?;
        Ok(())
    }

    fn extract_footprint(&self, raster: &Path) -> TilerResult<Footprint> {
        let vector_file = raster.with_extension("shp");
        self.begin("extract_footprint", &vector_file)?;
        let mut artifacts = Vec::new();
        for extension in ["shp", "shx", "dbf", "prj"] {
            let artifact = raster.with_extension(extension);
            fs::write(&artifact, extension)?;
            artifacts.push(artifact);
        }
        Ok(Footprint {
            layer: raster.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default(),
            vector_file,
            artifacts,
        })
    }

    fn rasterize(&self, footprint: &Footprint, grid: &RasterInfo, output: &Path) -> TilerResult<()> {
        self.begin("rasterize", output)?;
        assert!(footprint.vector_file.is_file(), "footprint must exist before rasterizing");
        let mut mask = TiffImage::from_info(grid);
        mask.samples = 1;
        write_tiff(output, &mask)?;
        Ok(())
    }

    fn apply_mask(&self, descriptor: &Path, output: &Path) -> TilerResult<()> {
        self.begin("apply_mask", output)?;
        let xml = fs::read_to_string(descriptor)?;
        assert_eq!(xml.matches("<VRTRasterBand").count(), 5);

        let start = xml
            .find("relativeToVRT=\"1\">")
            .map(|i| i + "relativeToVRT=\"1\">".len())
            .ok_or_else(|| TilerError::GenericError("descriptor without sources".to_string()))?;
        let end = start + xml[start..].find('<').unwrap_or(0);
        let data = descriptor.with_file_name(&xml[start..end]);

        let mut image = TiffImage::from_info(&read_info(&data)?);
        image.masked = true;
        write_tiff(output, &image)?;
        Ok(())
    }

    fn extract_bands(&self, source: &Path, band: Band, output: &Path) -> TilerResult<()> {
        self.begin("extract_bands", output)?;
        let mut image = TiffImage::from_info(&read_info(source)?);
        image.samples = band.band_count() as u16;
        write_tiff(output, &image)?;
        Ok(())
    }

    fn build_overviews(&self, raster: &Path, factors: &[u32], _band: Band) -> TilerResult<()> {
        self.begin("build_overviews", raster)?;
        let summary = probe_file(raster)?;
        let mut image = TiffImage::from_info(&read_info(raster)?);
        image.overviews = factors.len();
        image.masked = summary.mask_count > 0;
        write_tiff(raster, &image)?;
        Ok(())
    }

    fn build_mosaic(&self, tiles: &[PathBuf], output: &Path) -> TilerResult<()> {
        self.begin("build_mosaic", output)?;
        let mut infos = Vec::with_capacity(tiles.len());
        for tile in tiles {
            infos.push(read_info(tile)?);
        }
        let extents: Vec<Extent> = infos.iter().map(RasterInfo::extent).collect();
        let union = Extent::union_all(&extents)
            .ok_or_else(|| TilerError::GenericError("empty mosaic".to_string()))?;

        let pixel = infos[0].geotransform.pixel_width();
        let width = (union.width() / pixel).round() as u64;
        let height = (union.height() / pixel).round() as u64;
        let info = RasterInfo::new(
            width,
            height,
            infos[0].band_count,
            GeoTransform::north_up(union.min_x, union.max_y, pixel, pixel),
        );
        write_tiff(output, &TiffImage::from_info(&info))?;
        Ok(())
    }

    fn rescale(&self, source: &Path, percent: f64, band: Band, output: &Path) -> TilerResult<()> {
        self.begin("rescale", output)?;
        let mut info = read_info(source)?.rescaled(percent);
        info.band_count = band.band_count();
        write_tiff(output, &TiffImage::from_info(&info))?;
        Ok(())
    }
}

/// Names of the files in `folder`, sorted
pub fn folder_contents(folder: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(folder)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Files in `folder` whose names end with `suffix`
pub fn count_with_suffix(folder: &Path, suffix: &str) -> usize {
    folder_contents(folder).iter().filter(|name| name.ends_with(suffix)).count()
}
