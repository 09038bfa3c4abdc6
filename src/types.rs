use geo::Polygon;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Real-valued intensity data
pub type SarReal = f32;

/// 2D real SAR intensity array (rows x cols)
pub type SarRealImage = Array2<SarReal>;

/// 2D binary mask (0 = background, 1 = foreground)
pub type BinaryMask = Array2<u8>;

/// Digital elevation model aligned to the mask grid
pub type ElevationGrid = Array2<f32>;

/// Polarization channels carried by a dual-pol Sentinel-1 GRD scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarization {
    /// Co-polarized channel
    VV,
    /// Cross-polarized channel
    VH,
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarization::VV => write!(f, "VV"),
            Polarization::VH => write!(f, "VH"),
        }
    }
}

/// Geospatial transformation parameters (GDAL affine layout)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl Default for GeoTransform {
    /// Identity-like transform: world coordinates equal pixel coordinates
    fn default() -> Self {
        Self {
            top_left_x: 0.0,
            pixel_width: 1.0,
            rotation_x: 0.0,
            top_left_y: 0.0,
            rotation_y: 0.0,
            pixel_height: 1.0,
        }
    }
}

impl GeoTransform {
    /// North-up transform with square pixels
    pub fn north_up(top_left_x: f64, top_left_y: f64, pixel_size: f64) -> Self {
        Self {
            top_left_x,
            pixel_width: pixel_size,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height: -pixel_size,
        }
    }

    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Map a pixel-space position (col, row) to world coordinates
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.top_left_x + col * self.pixel_width + row * self.rotation_x,
            self.top_left_y + col * self.rotation_y + row * self.pixel_height,
        )
    }

    /// Map world coordinates back to a pixel-space position (col, row)
    pub fn world_to_pixel(&self, x: f64, y: f64) -> FloodResult<(f64, f64)> {
        let det = self.pixel_width * self.pixel_height - self.rotation_x * self.rotation_y;
        if det == 0.0 || !det.is_finite() {
            return Err(FloodError::Processing(format!(
                "Geotransform is not invertible: {:?}",
                self
            )));
        }

        let dx = x - self.top_left_x;
        let dy = y - self.top_left_y;
        let col = (dx * self.pixel_height - dy * self.rotation_x) / det;
        let row = (dy * self.pixel_width - dx * self.rotation_y) / det;
        Ok((col, row))
    }
}

/// Coordinate reference system definition (WKT, `EPSG:nnnn` or PROJ string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crs(String);

impl Crs {
    pub fn new(definition: impl Into<String>) -> Self {
        Self(definition.into())
    }

    pub fn from_epsg(code: u32) -> Self {
        Self(format!("EPSG:{}", code))
    }

    /// Geographic lat/lon on the WGS84 datum
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    pub fn definition(&self) -> &str {
        &self.0
    }

    pub fn is_missing(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_missing() {
            write!(f, "<missing CRS>")
        } else if self.0.chars().count() > 48 {
            let head: String = self.0.chars().take(48).collect();
            write!(f, "{}...", head)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Shape, affine transform and CRS shared by every grid of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub crs: Crs,
}

impl GridGeometry {
    pub fn new(rows: usize, cols: usize, transform: GeoTransform, crs: Crs) -> Self {
        Self { rows, cols, transform, crs }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Check that a grid has exactly this geometry's shape
    pub fn check_shape(&self, context: &str, shape: (usize, usize)) -> FloodResult<()> {
        ensure_same_shape(context, self.shape(), shape)
    }
}

/// Co-registered dual-polarization intensity scene
#[derive(Debug, Clone)]
pub struct RadarScene {
    vh: SarRealImage,
    vv: SarRealImage,
    geometry: GridGeometry,
}

impl RadarScene {
    /// Build a scene, rejecting channels whose shapes differ
    pub fn new(
        vh: SarRealImage,
        vv: SarRealImage,
        transform: GeoTransform,
        crs: Crs,
    ) -> FloodResult<Self> {
        ensure_same_shape("radar scene VH/VV channels", vh.dim(), vv.dim())?;
        let (rows, cols) = vv.dim();
        Ok(Self {
            vh,
            vv,
            geometry: GridGeometry::new(rows, cols, transform, crs),
        })
    }

    pub fn vh(&self) -> &SarRealImage {
        &self.vh
    }

    pub fn vv(&self) -> &SarRealImage {
        &self.vv
    }

    pub fn channel(&self, polarization: Polarization) -> &SarRealImage {
        match polarization {
            Polarization::VV => &self.vv,
            Polarization::VH => &self.vh,
        }
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }
}

/// Set of polygons sharing one CRS
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonLayer {
    pub polygons: Vec<Polygon<f64>>,
    pub crs: Crs,
}

impl PolygonLayer {
    pub fn new(polygons: Vec<Polygon<f64>>, crs: Crs) -> Self {
        Self { polygons, crs }
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Reproject into `target`; see [`crate::core::reproject::reproject_layer`]
    pub fn to_crs(&self, target: &Crs) -> FloodResult<PolygonLayer> {
        crate::core::reproject::reproject_layer(self, target)
    }
}

/// Error types for flood mapping
#[derive(Debug, thiserror::Error)]
pub enum FloodError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing input file: {}", .path.display())]
    MissingInput { path: PathBuf },

    #[error("Dimension mismatch in {context}: expected {expected:?}, found {actual:?}")]
    DimensionMismatch {
        context: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Degenerate metric: {0}")]
    DegenerateMetric(String),

    #[error("CRS mismatch: {0}")]
    CrsMismatch(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for flood mapping operations
pub type FloodResult<T> = Result<T, FloodError>;

/// Fail with `DimensionMismatch` unless both shapes are equal
pub fn ensure_same_shape(
    context: &str,
    expected: (usize, usize),
    actual: (usize, usize),
) -> FloodResult<()> {
    if expected != actual {
        return Err(FloodError::DimensionMismatch {
            context: context.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}
