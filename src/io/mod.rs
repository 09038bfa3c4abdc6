//! Input/output modules for rasters, vector layers and metrics

pub mod metrics;
pub mod raster;
pub mod vector;

pub use metrics::write_metrics_csv;
pub use raster::{RasterIo, SceneBands};
pub use vector::{VectorFormat, VectorIo};
