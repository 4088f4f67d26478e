//! Affine pixel-to-map transform and map extents

use std::fmt;

/// Six-coefficient affine transform from pixel/line to map coordinates
///
/// Coefficients follow the usual order:
/// `[origin_x, pixel_width, row_rotation, origin_y, column_rotation, pixel_height]`,
/// with `pixel_height` negative for north-up rasters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub coefficients: [f64; 6],
}

impl GeoTransform {
    /// Create a geotransform from its six coefficients
    pub fn new(coefficients: [f64; 6]) -> Self {
        GeoTransform { coefficients }
    }

    /// Create a north-up geotransform without rotation
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        GeoTransform::new([origin_x, pixel_width, 0.0, origin_y, 0.0, -pixel_height.abs()])
    }

    /// Build a geotransform from a slice, which must hold exactly six values
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        if values.len() != 6 {
            return None;
        }
        let mut coefficients = [0.0; 6];
        coefficients.copy_from_slice(values);
        Some(GeoTransform::new(coefficients))
    }

    /// Map coordinates of the top-left corner of pixel `(x, y)`
    pub fn pixel_to_geo(&self, x: f64, y: f64) -> (f64, f64) {
        let c = &self.coefficients;
        (c[0] + x * c[1] + y * c[2], c[3] + x * c[4] + y * c[5])
    }

    /// Pixel width in map units
    pub fn pixel_width(&self) -> f64 {
        self.coefficients[1]
    }

    /// Pixel height in map units (negative for north-up)
    pub fn pixel_height(&self) -> f64 {
        self.coefficients[5]
    }

    /// Transform of a sub-window whose top-left pixel is `(x, y)`
    pub fn shifted(&self, x: f64, y: f64) -> GeoTransform {
        let (origin_x, origin_y) = self.pixel_to_geo(x, y);
        let mut coefficients = self.coefficients;
        coefficients[0] = origin_x;
        coefficients[3] = origin_y;
        GeoTransform::new(coefficients)
    }

    /// Transform of the same area with pixels enlarged by `ratio_x` columns and `ratio_y` rows
    ///
    /// Resampling a 1000 pixel wide raster to 125 pixels uses `ratio_x = 8.0`.
    pub fn resampled(&self, ratio_x: f64, ratio_y: f64) -> GeoTransform {
        let c = &self.coefficients;
        GeoTransform::new([c[0], c[1] * ratio_x, c[2] * ratio_y, c[3], c[4] * ratio_x, c[5] * ratio_y])
    }

    /// Map extent covered by a raster of `width` x `height` pixels
    pub fn extent(&self, width: u64, height: u64) -> Extent {
        let (w, h) = (width as f64, height as f64);
        let corners = [
            self.pixel_to_geo(0.0, 0.0),
            self.pixel_to_geo(w, 0.0),
            self.pixel_to_geo(0.0, h),
            self.pixel_to_geo(w, h),
        ];

        let mut extent = Extent::new(corners[0].0, corners[0].1, corners[0].0, corners[0].1);
        for &(x, y) in &corners[1..] {
            extent.min_x = extent.min_x.min(x);
            extent.max_x = extent.max_x.max(x);
            extent.min_y = extent.min_y.min(y);
            extent.max_y = extent.max_y.max(y);
        }
        extent
    }
}

impl fmt::Display for GeoTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.coefficients;
        write!(f, "{}, {}, {}, {}, {}, {}", c[0], c[1], c[2], c[3], c[4], c[5])
    }
}

/// Axis-aligned rectangle in map coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    /// Create a new extent
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Extent { min_x, min_y, max_x, max_y }
    }

    /// Smallest extent containing both `self` and `other`
    pub fn union(&self, other: &Extent) -> Extent {
        Extent::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Union of all extents, `None` for an empty iterator
    pub fn union_all<'a, I>(extents: I) -> Option<Extent>
    where
        I: IntoIterator<Item = &'a Extent>,
    {
        extents.into_iter().fold(None, |acc: Option<Extent>, extent| match acc {
            Some(current) => Some(current.union(extent)),
            None => Some(*extent),
        })
    }

    /// Width in map units
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height in map units
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Whether every edge of `other` lies within `tolerance` of the matching edge
    pub fn approx_eq(&self, other: &Extent, tolerance: f64) -> bool {
        (self.min_x - other.min_x).abs() <= tolerance
            && (self.min_y - other.min_y).abs() <= tolerance
            && (self.max_x - other.max_x).abs() <= tolerance
            && (self.max_y - other.max_y).abs() <= tolerance
    }

    /// Edges as `[min_x, min_y, max_x, max_y]`
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}
