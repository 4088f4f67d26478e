//! Parsing of `gdalinfo -json` output

use serde_json::Value;

use crate::errors::{TilerError, TilerResult};
use crate::raster::{GeoTransform, RasterInfo};

/// Build [`RasterInfo`] from the JSON report of `gdalinfo -json`
///
/// Only `size`, `geoTransform`, `coordinateSystem.wkt` and the length of
/// `bands` are used. A raster without a geotransform is rejected since the
/// tiler cannot place its tiles.
pub fn parse_gdalinfo_json(json: &str) -> TilerResult<RasterInfo> {
    let report: Value = serde_json::from_str(json)
        .map_err(|e| TilerError::GenericError(format!("Invalid gdalinfo JSON: {}", e)))?;

    let size = report
        .get("size")
        .and_then(Value::as_array)
        .ok_or_else(|| missing("size"))?;
    if size.len() != 2 {
        return Err(missing("size"));
    }
    let width = size[0].as_u64().ok_or_else(|| missing("size"))?;
    let height = size[1].as_u64().ok_or_else(|| missing("size"))?;

    let coefficients: Vec<f64> = report
        .get("geoTransform")
        .and_then(Value::as_array)
        .ok_or_else(|| missing("geoTransform"))?
        .iter()
        .filter_map(Value::as_f64)
        .collect();
    let geotransform = GeoTransform::from_slice(&coefficients).ok_or_else(|| missing("geoTransform"))?;

    let band_count = report
        .get("bands")
        .and_then(Value::as_array)
        .map(|bands| bands.len())
        .unwrap_or(0);

    let mut info = RasterInfo::new(width, height, band_count, geotransform);
    if let Some(wkt) = report
        .get("coordinateSystem")
        .and_then(|cs| cs.get("wkt"))
        .and_then(Value::as_str)
        .filter(|wkt| !wkt.is_empty())
    {
        info = info.with_projection(wkt);
    }

    Ok(info)
}

fn missing(field: &str) -> TilerError {
    TilerError::GenericError(format!("gdalinfo report has no valid '{}'", field))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "description": "ortho.vrt",
        "driverShortName": "VRT",
        "size": [131072, 98304],
        "coordinateSystem": { "wkt": "PROJCRS[\"ETRS89 / UTM zone 32N\"]" },
        "geoTransform": [500000.0, 0.05, 0.0, 5400000.0, 0.0, -0.05],
        "bands": [ {"band": 1}, {"band": 2}, {"band": 3}, {"band": 4} ]
    }"#;

    #[test]
    fn test_parse_report() {
        let info = parse_gdalinfo_json(REPORT).unwrap();
        assert_eq!(info.width, 131072);
        assert_eq!(info.height, 98304);
        assert_eq!(info.band_count, 4);
        assert_eq!(info.geotransform.coefficients, [500000.0, 0.05, 0.0, 5400000.0, 0.0, -0.05]);
        assert_eq!(info.projection.as_deref(), Some("PROJCRS[\"ETRS89 / UTM zone 32N\"]"));
    }

    #[test]
    fn test_missing_geotransform_is_rejected() {
        let json = r#"{"size": [10, 10], "bands": []}"#;
        assert!(parse_gdalinfo_json(json).is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse_gdalinfo_json("ERROR 4: not a raster").is_err());
    }
}
