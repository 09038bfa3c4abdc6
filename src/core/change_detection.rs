use ndarray::Zip;

use crate::types::{ensure_same_shape, BinaryMask, FloodResult};

/// Pixel counts describing one change-detection run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    pub pre_water_pixels: usize,
    pub post_water_pixels: usize,
    pub new_water_pixels: usize,
}

/// Flood-growth detector: water after the event that was dry before it
///
/// Receding water is not reported.
pub struct ChangeDetector;

impl ChangeDetector {
    /// 1 where `post == 1` and `pre == 0`, otherwise 0
    pub fn detect_new_water(pre: &BinaryMask, post: &BinaryMask) -> FloodResult<BinaryMask> {
        ensure_same_shape("change detection pre/post masks", pre.dim(), post.dim())?;

        Ok(Zip::from(pre)
            .and(post)
            .map_collect(|&before, &after| (after == 1 && before == 0) as u8))
    }

    pub fn detect_with_summary(
        pre: &BinaryMask,
        post: &BinaryMask,
    ) -> FloodResult<(BinaryMask, ChangeSummary)> {
        let flooded = Self::detect_new_water(pre, post)?;
        let summary = ChangeSummary {
            pre_water_pixels: pre.iter().filter(|&&v| v == 1).count(),
            post_water_pixels: post.iter().filter(|&&v| v == 1).count(),
            new_water_pixels: flooded.iter().filter(|&&v| v == 1).count(),
        };

        log::info!(
            "Change detection: {} pre-event, {} post-event, {} newly flooded pixels",
            summary.pre_water_pixels,
            summary.post_water_pixels,
            summary.new_water_pixels
        );

        Ok((flooded, summary))
    }
}
