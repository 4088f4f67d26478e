//! Tests for the GeoTIFF probe

extern crate std;

use super::test_utils::{TestValue, TiffBufferBuilder};
use crate::errors::TilerError;
use crate::tiff::probe::probe;
use crate::tiff::reader::TiffReader;

const TILE: u32 = 16384;

/// A masked 4-band tile with two overviews and their masks
fn masked_tile(builder: TiffBufferBuilder) -> TiffBufferBuilder {
    builder
        .image(TILE, TILE, 4, 0)
        .tag(33550, TestValue::Double(vec![0.05, 0.05, 0.0]))
        .tag(33922, TestValue::Double(vec![0.0, 0.0, 0.0, 500000.0, 5400000.0, 0.0]))
        .image(TILE / 2, TILE / 2, 4, 1)
        .image(TILE / 4, TILE / 4, 4, 1)
        .image(TILE, TILE, 1, 4)
        .image(TILE / 2, TILE / 2, 1, 5)
}

#[test]
fn test_probe_little_endian_tile() {
    let mut cursor = masked_tile(TiffBufferBuilder::new()).cursor();
    let summary = probe(&mut cursor).unwrap();

    std::assert_eq!(summary.width, 16384);
    std::assert_eq!(summary.height, 16384);
    std::assert_eq!(summary.samples_per_pixel, 4);
    std::assert_eq!(summary.overview_count, 2);
    std::assert_eq!(summary.mask_count, 2);
    std::assert!(!summary.is_big_tiff);

    let geotransform = summary.geotransform.unwrap();
    std::assert_eq!(geotransform.coefficients, [500000.0, 0.05, 0.0, 5400000.0, 0.0, -0.05]);
}

#[test]
fn test_probe_big_endian_bigtiff() {
    let mut cursor = masked_tile(TiffBufferBuilder::new().big_tiff().big_endian()).cursor();
    let summary = probe(&mut cursor).unwrap();

    std::assert!(summary.is_big_tiff);
    std::assert_eq!(summary.samples_per_pixel, 4);
    std::assert_eq!(summary.overview_count, 2);
    std::assert_eq!(
        summary.geotransform.unwrap().coefficients,
        [500000.0, 0.05, 0.0, 5400000.0, 0.0, -0.05]
    );
}

#[test]
fn test_tiepoint_away_from_origin() {
    // Pixel (100, 200) sits at (505.0, 380.0) with 0.5 unit pixels
    let mut cursor = TiffBufferBuilder::new()
        .image(1000, 1000, 3, 0)
        .tag(33550, TestValue::Double(vec![0.5, 0.5, 0.0]))
        .tag(33922, TestValue::Double(vec![100.0, 200.0, 0.0, 505.0, 380.0, 0.0]))
        .cursor();
    let geotransform = probe(&mut cursor).unwrap().geotransform.unwrap();

    std::assert_eq!(geotransform.coefficients, [455.0, 0.5, 0.0, 480.0, 0.0, -0.5]);
}

#[test]
fn test_model_transformation_takes_precedence() {
    let matrix = vec![
        2.0, 0.0, 0.0, 1000.0,
        0.0, -2.0, 0.0, 9000.0,
        0.0, 0.0, 0.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ];
    let mut cursor = TiffBufferBuilder::new()
        .image(10, 10, 1, 0)
        .tag(34264, TestValue::Double(matrix))
        .tag(33550, TestValue::Double(vec![99.0, 99.0, 0.0]))
        .tag(33922, TestValue::Double(vec![0.0, 0.0, 0.0, 1.0, 1.0, 0.0]))
        .cursor();
    let geotransform = probe(&mut cursor).unwrap().geotransform.unwrap();

    std::assert_eq!(geotransform.coefficients, [1000.0, 2.0, 0.0, 9000.0, 0.0, -2.0]);
}

#[test]
fn test_plain_tiff_has_no_geotransform() {
    let mut cursor = TiffBufferBuilder::new().image(800, 600, 1, 0).cursor();
    let summary = probe(&mut cursor).unwrap();

    std::assert_eq!((summary.width, summary.height), (800, 600));
    std::assert!(summary.geotransform.is_none());
    std::assert_eq!(summary.overview_count, 0);
}

#[test]
fn test_ifd_chain_is_read_in_order() {
    let mut cursor = masked_tile(TiffBufferBuilder::new()).cursor();
    let mut reader = TiffReader::new();
    let tiff = reader.read(&mut cursor).unwrap();

    std::assert_eq!(tiff.ifd_count(), 5);
    std::assert_eq!(tiff.ifds[1].get_dimensions(), Some((8192, 8192)));
    std::assert!(tiff.ifds[3].is_mask());
    std::assert!(!tiff.ifds[4].is_overview());
}

#[test]
fn test_truncated_file_is_rejected() {
    let mut bytes = masked_tile(TiffBufferBuilder::new()).build();
    bytes.truncate(6);
    match probe(&mut std::io::Cursor::new(bytes)) {
        Err(TilerError::IoError(_)) | Err(TilerError::InvalidHeader) => {}
        other => std::panic!("expected a header error, got {:?}", other),
    }
}

#[test]
fn test_not_a_tiff() {
    let mut cursor = std::io::Cursor::new(b"<VRTDataset rasterXSize=\"1\"/>".to_vec());
    std::assert!(std::matches!(probe(&mut cursor), Err(TilerError::InvalidByteOrder(_))));
}

#[test]
fn test_overflowing_value_count_is_rejected() {
    let mut cursor = TiffBufferBuilder::new()
        .big_tiff()
        .image(TILE, TILE, 4, 0)
        .tag(33550, TestValue::Truncated { count: 1 << 62, stored: vec![0.05, 0.05] })
        .tag(33922, TestValue::Double(vec![0.0, 0.0, 0.0, 500000.0, 5400000.0, 0.0]))
        .cursor();
    std::assert!(std::matches!(probe(&mut cursor), Err(TilerError::InvalidHeader)));
}

#[test]
fn test_value_array_past_end_of_file_is_rejected() {
    let mut cursor = TiffBufferBuilder::new()
        .image(TILE, TILE, 4, 0)
        .tag(33550, TestValue::Double(vec![0.05, 0.05, 0.0]))
        .tag(33922, TestValue::Truncated { count: 100_000, stored: vec![0.0, 0.0, 0.0, 500000.0] })
        .cursor();
    std::assert!(std::matches!(probe(&mut cursor), Err(TilerError::InvalidHeader)));
}
