//! End-to-end pyramid builds against the in-process GDAL stand-in

mod common;

use std::fs;
use std::path::Path;

use orthotiler::tiff::probe_file;
use orthotiler::tiling::{Inventory, LevelReport};
use orthotiler::utils::logger::Logger;
use orthotiler::{Band, BuildReport, FailurePolicy, PyramidBuilder, TilerConfig, TilerError, TileRect};

use common::{count_with_suffix, folder_contents, read_info, write_source, write_tiff, FakeGdal, TiffImage};

fn config(tile_size: u32, workers: usize) -> TilerConfig {
    TilerConfig::builder().tile_size(tile_size).workers(workers).build().unwrap()
}

fn build(gdal: &FakeGdal, source: &Path, output: &Path, config: TilerConfig, window: Option<TileRect>) -> BuildReport {
    PyramidBuilder::new(gdal, config).build(source, output, window).unwrap()
}

#[test]
fn test_two_by_two_grid_has_no_pyramid() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("tiles");
    let source = write_source(dir.path(), 32768, 32768);
    let gdal = FakeGdal::new();

    let report = build(&gdal, &source, &output, config(16384, 4), Some(TileRect::new(0, 0, 32, 32)));

    assert!(report.is_success());
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.levels.len(), 4);
    assert_eq!(report.level(0).unwrap().produced, 4);
    assert_eq!(report.level(1).unwrap().planned, 0);
    assert!(report.level(1).unwrap().to_string().contains("no level-1 output"));

    assert_eq!(count_with_suffix(&output, "_RGB.tif"), 4);
    assert_eq!(count_with_suffix(&output, "_IR.tif"), 4);
    assert_eq!(count_with_suffix(&output, "_old.tif"), 4);
    assert_eq!(folder_contents(&output).len(), 16);
    for name in ["R0001C0001.tif", "R0001C0002.tif", "R0002C0001.tif", "R0002C0002.tif"] {
        assert!(output.join(name).is_file(), "{} missing", name);
    }
}

#[test]
fn test_level_zero_tiles_are_masked_and_split() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("tiles");
    let source = write_source(dir.path(), 32768, 32768);
    let gdal = FakeGdal::new();

    build(&gdal, &source, &output, config(16384, 2), None);

    let composite = probe_file(&output.join("R0001C0002.tif")).unwrap();
    assert_eq!((composite.width, composite.height, composite.samples_per_pixel), (16384, 16384, 4));
    assert!(composite.mask_count > 0);
    let gt = composite.geotransform.unwrap();
    assert_eq!(gt.coefficients[0], 500000.0 + 16384.0 * 0.5);
    assert_eq!(gt.coefficients[3], 5400000.0);

    let rgb = probe_file(&output.join("R0001C0002_RGB.tif")).unwrap();
    assert_eq!(rgb.samples_per_pixel, 3);
    assert_eq!(rgb.overview_count, 2);
    let ir = probe_file(&output.join("R0001C0002_IR.tif")).unwrap();
    assert_eq!(ir.samples_per_pixel, 1);
    assert_eq!(ir.overview_count, 2);
}

#[test]
fn test_eight_by_eight_grid_builds_level_one() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("tiles");
    let source = write_source(dir.path(), 131072, 131072);
    let gdal = FakeGdal::new();

    let report = build(&gdal, &source, &output, config(16384, 5), None);

    assert!(report.is_success(), "{}", report);
    assert_eq!(report.level(0).unwrap().produced, 64);
    assert_eq!(report.level(1).unwrap().produced, 8);
    assert!(report.level(2).unwrap().is_empty());
    assert!(report.level(3).unwrap().is_empty());

    let inventory = Inventory::scan(&output).unwrap();
    assert_eq!(inventory.composites, 64);
    assert_eq!(inventory.count(1, Band::Rgb), 4);
    assert_eq!(inventory.count(1, Band::Ir), 4);
    assert_eq!(inventory.max_level(), Some(1));

    let tile = read_info(&output.join("R0002C0001_RGB_1.tif")).unwrap();
    assert_eq!((tile.width, tile.height, tile.band_count), (8192, 8192, 3));
    let block = read_info(&source).unwrap().window(0, 65536, 65536, 65536);
    assert!(tile.extent().approx_eq(&block.extent(), 1e-6));

    assert!(folder_contents(&output).iter().all(|name| name.ends_with(".tif")));
}

#[test]
fn test_full_pyramid_over_sixteen_by_sixteen_grid() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("tiles");
    let source = write_source(dir.path(), 4096, 4096);
    let gdal = FakeGdal::new();

    let report = build(&gdal, &source, &output, config(256, 3), None);

    assert!(report.is_success(), "{}", report);
    let produced: Vec<usize> = report.levels.iter().map(|level| level.produced).collect();
    assert_eq!(produced, vec![256, 32, 2, 0]);
    assert!(output.join("R0001C0001_RGB_2.tif").is_file());
    assert!(output.join("R0001C0001_IR_2.tif").is_file());

    let top = read_info(&output.join("R0001C0001_RGB_2.tif")).unwrap();
    assert_eq!(top.width, 64);
    assert!(top.extent().approx_eq(&read_info(&source).unwrap().extent(), 1e-6));
}

#[test]
fn test_sub_window_builds_its_block() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("tiles");
    let source = write_source(dir.path(), 4096, 4096);
    let gdal = FakeGdal::new();

    let report = build(&gdal, &source, &output, config(256, 2), Some(TileRect::new(4, 4, 4, 4)));

    assert!(report.is_success(), "{}", report);
    assert_eq!(report.level(0).unwrap().produced, 16);
    assert_eq!(report.level(1).unwrap().rect, TileRect::new(1, 1, 1, 1));
    assert!(output.join("R0005C0005.tif").is_file());
    assert!(output.join("R0002C0002_RGB_1.tif").is_file());
    assert!(output.join("R0002C0002_IR_1.tif").is_file());
    assert!(!output.join("R0001C0001.tif").exists());
}

#[test]
fn test_failed_tile_fails_its_block_only() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("tiles");
    let source = write_source(dir.path(), 131072, 131072);
    let gdal = FakeGdal::new();
    gdal.fail("crop", "R0002C0003");

    let report = build(&gdal, &source, &output, config(16384, 4), None);

    assert!(!report.is_success());
    assert_eq!(report.exit_code(), 1);

    let level0 = report.level(0).unwrap();
    assert_eq!((level0.produced, level0.failures.len()), (63, 1));
    assert_eq!(level0.failures[0].label, "crop R2C3");
    assert!(level0.failures[0].command.as_deref().unwrap().starts_with("fake-gdal crop"));

    let level1 = report.level(1).unwrap();
    assert_eq!((level1.produced, level1.failures.len()), (6, 2));
    assert!(level1.failures.iter().all(|failure| failure.error.contains("Missing input tile")));
    assert!(!output.join("R0001C0001_RGB_1.tif").exists());
    assert!(output.join("R0001C0002_RGB_1.tif").is_file());

    let leftovers: Vec<String> = folder_contents(&output)
        .into_iter()
        .filter(|name| name.starts_with("R0002C0003"))
        .collect();
    assert!(leftovers.is_empty(), "leftovers: {:?}", leftovers);
}

#[test]
fn test_abort_policy_stops_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("tiles");
    let source = write_source(dir.path(), 131072, 131072);
    let gdal = FakeGdal::new();
    gdal.fail("apply_mask", "R0002C0003");

    let config = TilerConfig::builder()
        .tile_size(16384)
        .workers(1)
        .failure_policy(FailurePolicy::Abort)
        .build()
        .unwrap();
    let report = build(&gdal, &source, &output, config, None);

    assert!(report.aborted);
    assert!(!report.is_success());
    let level0 = report.level(0).unwrap();
    assert_eq!(level0.failures.len(), 1);
    assert_eq!(level0.produced, 10);
    assert_eq!(level0.cancelled, 53);

    let level1: &LevelReport = report.level(1).unwrap();
    assert!(!level1.ran);
    assert_eq!(level1.planned, 8);
    assert_eq!(count_with_suffix(&output, "_1.tif"), 0);
}

#[test]
fn test_rerun_skips_complete_tiles() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("tiles");
    let source = write_source(dir.path(), 131072, 131072);
    let gdal = FakeGdal::new();

    build(&gdal, &source, &output, config(16384, 4), None);
    gdal.take_calls();

    fs::remove_file(output.join("R0003C0004_IR.tif")).unwrap();
    let report = build(&gdal, &source, &output, config(16384, 4), None);

    assert!(report.is_success(), "{}", report);
    let level0 = report.level(0).unwrap();
    assert_eq!((level0.produced, level0.skipped), (1, 63));
    assert_eq!(report.level(1).unwrap().skipped, 8);

    let crops: Vec<String> = gdal.take_calls().into_iter().filter(|call| call.starts_with("crop")).collect();
    assert_eq!(crops, vec!["crop R0003C0004_raw.tif".to_string()]);
}

/// A BigTIFF whose pixel scale declares 2^62 doubles
fn corrupt_bigtiff() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"II");
    bytes.extend_from_slice(&43u16.to_le_bytes());
    bytes.extend_from_slice(&8u16.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&16u64.to_le_bytes());
    bytes.extend_from_slice(&3u64.to_le_bytes());
    for (tag, field_type, count, value) in [(256u16, 4u16, 1u64, 16384u64), (257, 4, 1, 16384), (33550, 12, 1 << 62, 16)] {
        bytes.extend_from_slice(&tag.to_le_bytes());
        bytes.extend_from_slice(&field_type.to_le_bytes());
        bytes.extend_from_slice(&count.to_le_bytes());
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes.extend_from_slice(&0u64.to_le_bytes());
    bytes
}

#[test]
fn test_corrupt_leftover_tile_is_recropped() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("tiles");
    let source = write_source(dir.path(), 32768, 32768);
    let gdal = FakeGdal::new();
    fs::create_dir_all(&output).unwrap();
    fs::write(output.join("R0001C0001.tif"), corrupt_bigtiff()).unwrap();

    let report = build(&gdal, &source, &output, config(16384, 2), None);

    assert!(report.is_success(), "{}", report);
    assert_eq!(report.level(0).unwrap().produced, 4);
    let crops: Vec<String> = gdal.take_calls().into_iter().filter(|call| call.starts_with("crop")).collect();
    assert!(crops.contains(&"crop R0001C0001_raw.tif".to_string()));
    assert!(probe_file(&output.join("R0001C0001.tif")).unwrap().mask_count > 0);
}

#[test]
fn test_foreign_pyramid_tile_is_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("tiles");
    let source = write_source(dir.path(), 131072, 131072);
    let gdal = FakeGdal::new();

    build(&gdal, &source, &output, config(16384, 4), None);
    gdal.take_calls();

    let tile = output.join("R0001C0001_RGB_1.tif");
    let mut foreign = TiffImage::from_info(&read_info(&tile).unwrap());
    foreign.overviews = 2;
    foreign.geotransform = foreign.geotransform.shifted(100.0, 0.0);
    write_tiff(&tile, &foreign).unwrap();

    let report = build(&gdal, &source, &output, config(16384, 4), None);

    let level1 = report.level(1).unwrap();
    assert_eq!((level1.produced, level1.skipped), (1, 7));
    let rescales: Vec<String> = gdal.take_calls().into_iter().filter(|call| call.starts_with("rescale")).collect();
    assert_eq!(rescales, vec!["rescale R0001C0001_RGB_1.tif".to_string()]);
    let rebuilt = read_info(&tile).unwrap();
    assert_eq!(rebuilt.geotransform.coefficients[0], 500000.0);
}

#[test]
fn test_skip_existing_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("tiles");
    let source = write_source(dir.path(), 32768, 32768);
    let gdal = FakeGdal::new();

    build(&gdal, &source, &output, config(16384, 2), None);
    gdal.take_calls();

    let config = TilerConfig::builder().tile_size(16384).skip_existing(false).build().unwrap();
    let report = build(&gdal, &source, &output, config, None);

    assert_eq!(report.level(0).unwrap().produced, 4);
    let crops = gdal.take_calls().into_iter().filter(|call| call.starts_with("crop")).count();
    assert_eq!(crops, 4);
    assert_eq!(folder_contents(&output).len(), 16);
}

#[test]
fn test_steps_run_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("tiles");
    let source = write_source(dir.path(), 1024, 1024);
    let gdal = FakeGdal::new();

    build(&gdal, &source, &output, config(256, 4), None);
    let calls = gdal.take_calls();

    let tile: Vec<&str> = calls
        .iter()
        .filter(|call| call.contains("R0002C0003") && !call.contains("_1."))
        .map(|call| call.as_str())
        .collect();
    assert_eq!(
        tile,
        vec![
            "crop R0002C0003_raw.tif",
            "extract_footprint R0002C0003_raw.shp",
            "rasterize R0002C0003.msk",
            "apply_mask R0002C0003_masked.tif",
            "extract_bands R0002C0003_RGB.tif",
            "build_overviews R0002C0003_RGB.tif",
            "extract_bands R0002C0003_IR.tif",
            "build_overviews R0002C0003_IR.tif",
        ]
    );

    let first_mosaic = calls.iter().position(|call| call.starts_with("build_mosaic")).unwrap();
    let last_crop_step = calls.iter().rposition(|call| !call.contains("_1.")).unwrap();
    assert!(last_crop_step < first_mosaic);

    let block: Vec<&str> = calls
        .iter()
        .filter(|call| call.contains("R0001C0001_IR_1"))
        .map(|call| call.as_str())
        .collect();
    assert_eq!(
        block,
        vec![
            "build_mosaic R0001C0001_IR_1.vrt",
            "rescale R0001C0001_IR_1.tif",
            "build_overviews R0001C0001_IR_1.tif",
        ]
    );
}

#[test]
fn test_digit_overflow_rejects_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("tiles");
    let source = write_source(dir.path(), 4096, 256);
    let gdal = FakeGdal::new();

    let config = TilerConfig::builder().tile_size(256).digits(1).build().unwrap();
    let result = PyramidBuilder::new(&gdal, config).build(&source, &output, None);

    assert!(matches!(result, Err(TilerError::PathOverflow { .. })));
    assert!(gdal.take_calls().is_empty());
}

#[test]
fn test_run_log_records_levels_and_failures() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("tiles");
    let source = write_source(dir.path(), 32768, 32768);
    let gdal = FakeGdal::new();
    gdal.fail("rasterize", "R0001C0002");

    let log_path = dir.path().join("run.log");
    let run_log = Logger::append(&log_path).unwrap();
    let report = PyramidBuilder::new(&gdal, config(16384, 2))
        .with_run_log(&run_log)
        .build(&source, &output, None)
        .unwrap();
    assert!(!report.is_success());

    let content = fs::read_to_string(&log_path).unwrap();
    assert!(content.contains("Level 0: 3 produced, 0 skipped, 1 failed"));
    assert!(content.contains("  FAILED crop R1C2: rasterize failed with exit code 1"));
    assert!(content.contains("    command: fake-gdal rasterize"));
    assert!(content.contains("Level 1: no level-1 output"));
    assert!(content.ends_with("# result: failure\n"));
}
