//! sarflood: Sentinel-1 flood mapping from pre/post-event GRD scenes
//!
//! Segments open water in two co-registered dual-pol scenes, keeps the water
//! that appeared after the event, vectorizes it and scores it against a
//! reference flood map.

pub mod types;
pub mod io;
pub mod core;
pub mod pipeline;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    BinaryMask, Crs, ElevationGrid, FloodError, FloodResult, GeoTransform, GridGeometry,
    Polarization, PolygonLayer, RadarScene, SarRealImage,
};

pub use crate::core::{
    AccuracyAssessor, ChangeDetector, MaskVectorizer, SlopeFilter, ValidationReport, WaterDetector,
};
pub use io::{RasterIo, VectorFormat, VectorIo};
pub use pipeline::{FloodPipeline, PipelineConfig, PipelineOutputs};
