use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::types::{ensure_same_shape, BinaryMask, ElevationGrid, FloodResult};

/// Terrain slope suppression parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlopeFilterParams {
    /// Water on terrain steeper than this (degrees) is removed
    pub slope_threshold_deg: f32,
    /// Grid spacing (row, col) in elevation units; unit spacing treats the DEM as pixel-relative
    pub pixel_spacing: (f64, f64),
}

impl Default for SlopeFilterParams {
    fn default() -> Self {
        Self {
            slope_threshold_deg: 5.0,
            pixel_spacing: (1.0, 1.0),
        }
    }
}

/// Removes water detections on steep terrain
#[derive(Debug, Clone)]
pub struct SlopeFilter {
    params: SlopeFilterParams,
}

impl SlopeFilter {
    pub fn new() -> Self {
        Self {
            params: SlopeFilterParams::default(),
        }
    }

    pub fn with_params(params: SlopeFilterParams) -> Self {
        Self { params }
    }

    /// Zero every mask pixel whose slope exceeds the threshold; returns how many were cleared
    pub fn apply(&self, mask: &mut BinaryMask, dem: &ElevationGrid) -> FloodResult<usize> {
        ensure_same_shape("slope filter mask/DEM", mask.dim(), dem.dim())?;

        let slope = compute_slope_degrees(dem, self.params.pixel_spacing);
        let threshold = self.params.slope_threshold_deg;
        let mut suppressed = 0usize;

        Zip::from(mask).and(&slope).for_each(|m, &s| {
            if *m != 0 && s > threshold {
                *m = 0;
                suppressed += 1;
            }
        });

        log::info!(
            "Slope filter removed {} water pixels steeper than {:.1}°",
            suppressed,
            threshold
        );
        Ok(suppressed)
    }
}

impl Default for SlopeFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Slope in degrees from a DEM
///
/// Gradients use central differences in the interior and one-sided
/// differences on the first and last row/column.
pub fn compute_slope_degrees(dem: &ElevationGrid, pixel_spacing: (f64, f64)) -> Array2<f32> {
    let (height, width) = dem.dim();
    let (dy, dx) = (pixel_spacing.0 as f32, pixel_spacing.1 as f32);

    Array2::from_shape_fn((height, width), |(i, j)| {
        let dz_dy = axis_gradient(height, i, dy, |k| dem[[k, j]]);
        let dz_dx = axis_gradient(width, j, dx, |k| dem[[i, k]]);
        (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan().to_degrees()
    })
}

#[inline]
fn axis_gradient<F: Fn(usize) -> f32>(len: usize, k: usize, spacing: f32, at: F) -> f32 {
    if len < 2 {
        0.0
    } else if k == 0 {
        (at(1) - at(0)) / spacing
    } else if k == len - 1 {
        (at(k) - at(k - 1)) / spacing
    } else {
        (at(k + 1) - at(k - 1)) / (2.0 * spacing)
    }
}
