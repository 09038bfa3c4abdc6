use ndarray::Zip;
use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::core::morphology::{self, Connectivity, StructuringElement};
use crate::types::{
    ensure_same_shape, BinaryMask, FloodError, FloodResult, RadarScene, SarRealImage,
};

/// Offset added to intensities before taking the log ratio
pub const LOG_RATIO_EPSILON: f64 = 1e-6;

/// Water segmentation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterDetectionParams {
    /// Percentile of the VV/VH log ratio above which a pixel is a water candidate
    pub percentile: f64,
    /// VV intensity threshold (linear)
    pub vv_threshold: f64,
    /// VH intensity threshold (linear)
    pub vh_threshold: f64,
    /// Connected water bodies smaller than this (pixels) are discarded
    pub min_object_size: usize,
    /// Radius of the disk used for opening and closing
    pub disk_radius: usize,
    /// Median smoothing window (odd)
    pub median_size: usize,
    /// Adjacency used for small-object removal
    pub connectivity: Connectivity,
}

impl Default for WaterDetectionParams {
    fn default() -> Self {
        Self {
            percentile: 90.0,
            vv_threshold: 0.03,
            vh_threshold: 0.01,
            min_object_size: 2000,
            disk_radius: 2,
            median_size: 3,
            connectivity: Connectivity::Four,
        }
    }
}

/// Foreground pixel counts after each segmentation stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaterDetectionStats {
    pub dual_threshold_pixels: usize,
    pub log_ratio_pixels: usize,
    pub union_pixels: usize,
    pub cleaned_pixels: usize,
    pub water_pixels: usize,
}

/// Water/non-water classifier for dual-pol intensity scenes
#[derive(Debug, Clone)]
pub struct WaterDetector {
    params: WaterDetectionParams,
}

impl WaterDetector {
    /// Create a detector with default parameters
    pub fn new() -> Self {
        Self {
            params: WaterDetectionParams::default(),
        }
    }

    pub fn with_params(params: WaterDetectionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &WaterDetectionParams {
        &self.params
    }

    pub fn detect_scene(&self, scene: &RadarScene) -> FloodResult<BinaryMask> {
        self.detect_water(scene.vv(), scene.vh())
    }

    /// Classify each pixel as water (1) or not (0)
    pub fn detect_water(&self, vv: &SarRealImage, vh: &SarRealImage) -> FloodResult<BinaryMask> {
        self.detect_water_with_stats(vv, vh).map(|(mask, _)| mask)
    }

    pub fn detect_water_with_stats(
        &self,
        vv: &SarRealImage,
        vh: &SarRealImage,
    ) -> FloodResult<(BinaryMask, WaterDetectionStats)> {
        ensure_same_shape("water detection VV/VH inputs", vv.dim(), vh.dim())?;
        self.validate_params()?;

        let (height, width) = vv.dim();
        log::info!("Detecting water on {}x{} scene", height, width);
        log::debug!("Water detection parameters: {:?}", self.params);

        let mut stats = WaterDetectionStats::default();

        let dual = self.dual_threshold_mask(vv, vh);
        stats.dual_threshold_pixels = count_foreground(&dual);

        let log_ratio = compute_log_ratio(vv, vh);
        let ratio_mask = match finite_percentile(&log_ratio, self.params.percentile) {
            Some(threshold) => {
                log::debug!(
                    "Log-ratio threshold at P{}: {:.4}",
                    self.params.percentile,
                    threshold
                );
                log_ratio.mapv(|r| (r > threshold) as u8)
            }
            None => {
                log::warn!("No finite log-ratio values; ratio test selects nothing");
                BinaryMask::zeros((height, width))
            }
        };
        stats.log_ratio_pixels = count_foreground(&ratio_mask);

        let mut mask = dual;
        Zip::from(&mut mask).and(&ratio_mask).for_each(|m, &r| *m |= r);
        stats.union_pixels = count_foreground(&mask);

        let disk = StructuringElement::disk(self.params.disk_radius);
        mask = morphology::opening(&mask, &disk);
        mask = morphology::closing(&mask, &disk);
        mask = morphology::median_filter(&mask, self.params.median_size)?;
        stats.cleaned_pixels = count_foreground(&mask);

        mask = morphology::remove_small_objects(
            &mask,
            self.params.min_object_size,
            self.params.connectivity,
        );
        stats.water_pixels = count_foreground(&mask);

        log::debug!("Water detection stages: {:?}", stats);
        log::info!(
            "Water pixels: {} ({:.2}%)",
            stats.water_pixels,
            percentage(stats.water_pixels, height * width)
        );

        Ok((mask, stats))
    }

    /// Candidate where both channels are darker than their thresholds
    ///
    /// Intensities are widened to `f64` before comparing, so a sample stored
    /// as the `f32` nearest to a threshold is judged by its actual value.
    pub fn dual_threshold_mask(&self, vv: &SarRealImage, vh: &SarRealImage) -> BinaryMask {
        let vv_thresh = self.params.vv_threshold;
        let vh_thresh = self.params.vh_threshold;
        Zip::from(vv)
            .and(vh)
            .map_collect(|&v, &h| ((v as f64) < vv_thresh && (h as f64) < vh_thresh) as u8)
    }

    fn validate_params(&self) -> FloodResult<()> {
        let p = self.params.percentile;
        if !(0.0..=100.0).contains(&p) {
            return Err(FloodError::Processing(format!(
                "Percentile must lie in [0, 100], got {}",
                p
            )));
        }
        if self.params.median_size == 0 || self.params.median_size % 2 == 0 {
            return Err(FloodError::Processing(format!(
                "Median window size must be odd and positive, got {}",
                self.params.median_size
            )));
        }
        Ok(())
    }
}

impl Default for WaterDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// `ln(vv + eps) - ln(vh + eps)` per pixel, in double precision
pub fn compute_log_ratio(vv: &SarRealImage, vh: &SarRealImage) -> ndarray::Array2<f64> {
    Zip::from(vv).and(vh).map_collect(|&v, &h| {
        (v as f64 + LOG_RATIO_EPSILON).ln() - (h as f64 + LOG_RATIO_EPSILON).ln()
    })
}

/// Percentile of the finite values with linear interpolation between closest ranks
///
/// Returns `None` when no finite value exists.
pub fn finite_percentile<T: Float + Send + Sync>(
    values: &ndarray::Array2<T>,
    percentile: f64,
) -> Option<T> {
    let mut finite: Vec<T> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }

    sort_values(&mut finite);

    let rank = (percentile / 100.0) * (finite.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = T::from(rank - lower as f64)?;

    let lo = finite[lower];
    let hi = finite[upper.min(finite.len() - 1)];
    Some(lo + (hi - lo) * fraction)
}

fn sort_values<T: Float + Send + Sync>(values: &mut [T]) {
    let cmp = |a: &T, b: &T| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal);

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        values.par_sort_unstable_by(cmp);
    }

    #[cfg(not(feature = "parallel"))]
    {
        values.sort_unstable_by(cmp);
    }
}

fn count_foreground(mask: &BinaryMask) -> usize {
    mask.iter().filter(|&&v| v != 0).count()
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}
