//! Core flood mapping modules

pub mod change_detection;
pub mod morphology;
pub mod rasterize;
pub mod reproject;
pub mod slope_filter;
pub mod validation;
pub mod vectorize;
pub mod water_detection;

// Re-export main types
pub use change_detection::{ChangeDetector, ChangeSummary};
pub use morphology::{Connectivity, StructuringElement};
pub use rasterize::rasterize_polygons;
pub use reproject::reproject_layer;
pub use slope_filter::{SlopeFilter, SlopeFilterParams};
pub use validation::{AccuracyAssessor, ConfusionMatrix, ValidationReport};
pub use vectorize::{MaskVectorizer, VectorizedMask};
pub use water_detection::{WaterDetectionParams, WaterDetectionStats, WaterDetector};
