/*!
 * Flood map accuracy assessment
 *
 * Scores a predicted flood mask against a reference polygon layer:
 * - reference polygons are reprojected into the mask CRS
 * - rasterized onto the mask grid (burn 1, fill 0)
 * - compared pixel by pixel in row-major order
 *
 * The reference is treated as ground truth. F1 and IoU with a zero
 * denominator are reported as 0.
 */

use ndarray::Zip;
use serde::{Deserialize, Serialize};

use crate::core::rasterize::rasterize_polygons;
use crate::types::{BinaryMask, FloodError, FloodResult, GridGeometry, PolygonLayer};

/// 2x2 confusion matrix with the reference as truth
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negatives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub true_positives: u64,
}

impl ConfusionMatrix {
    /// Tally pixel pairs; any non-zero value counts as positive
    pub fn from_masks(reference: &BinaryMask, predicted: &BinaryMask) -> FloodResult<Self> {
        crate::types::ensure_same_shape(
            "confusion matrix reference/prediction",
            reference.dim(),
            predicted.dim(),
        )?;

        let mut matrix = ConfusionMatrix::default();
        Zip::from(reference).and(predicted).for_each(|&truth, &guess| {
            match (truth != 0, guess != 0) {
                (false, false) => matrix.true_negatives += 1,
                (false, true) => matrix.false_positives += 1,
                (true, false) => matrix.false_negatives += 1,
                (true, true) => matrix.true_positives += 1,
            }
        });
        Ok(matrix)
    }

    pub fn total(&self) -> u64 {
        self.true_negatives + self.false_positives + self.false_negatives + self.true_positives
    }

    /// `2TP / (2TP + FP + FN)`, failing on a zero denominator
    pub fn try_f1_score(&self) -> FloodResult<f64> {
        let numerator = 2 * self.true_positives;
        let denominator = numerator + self.false_positives + self.false_negatives;
        ratio("F1 score", numerator, denominator)
    }

    /// `TP / (TP + FP + FN)`, failing on a zero denominator
    pub fn try_iou(&self) -> FloodResult<f64> {
        let denominator = self.true_positives + self.false_positives + self.false_negatives;
        ratio("IoU", self.true_positives, denominator)
    }

    pub fn f1_score(&self) -> f64 {
        resolve_degenerate(self.try_f1_score())
    }

    pub fn iou(&self) -> f64 {
        resolve_degenerate(self.try_iou())
    }

    pub fn precision(&self) -> f64 {
        resolve_degenerate(ratio(
            "precision",
            self.true_positives,
            self.true_positives + self.false_positives,
        ))
    }

    pub fn recall(&self) -> f64 {
        resolve_degenerate(ratio(
            "recall",
            self.true_positives,
            self.true_positives + self.false_negatives,
        ))
    }

    pub fn overall_accuracy(&self) -> f64 {
        resolve_degenerate(ratio(
            "overall accuracy",
            self.true_positives + self.true_negatives,
            self.total(),
        ))
    }

    /// `[[TN, FP], [FN, TP]]`
    pub fn as_table(&self) -> [[u64; 2]; 2] {
        [
            [self.true_negatives, self.false_positives],
            [self.false_negatives, self.true_positives],
        ]
    }
}

impl std::fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = self
            .as_table()
            .iter()
            .flatten()
            .map(|v| v.to_string().len())
            .max()
            .unwrap_or(1);
        writeln!(f, "[[{:>w$} {:>w$}]", self.true_negatives, self.false_positives, w = width)?;
        write!(f, " [{:>w$} {:>w$}]]", self.false_negatives, self.true_positives, w = width)
    }
}

fn ratio(name: &str, numerator: u64, denominator: u64) -> FloodResult<f64> {
    if denominator == 0 {
        return Err(FloodError::DegenerateMetric(format!(
            "{} is undefined: no positive pixels in reference or prediction",
            name
        )));
    }
    Ok(numerator as f64 / denominator as f64)
}

fn resolve_degenerate(value: FloodResult<f64>) -> f64 {
    match value {
        Ok(v) => v,
        Err(e) => {
            log::warn!("{}; reporting 0.0", e);
            0.0
        }
    }
}

/// Outcome of one accuracy assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub confusion: ConfusionMatrix,
    pub f1_score: f64,
    pub iou: f64,
    pub precision: f64,
    pub recall: f64,
    pub overall_accuracy: f64,
    /// True when F1/IoU had a zero denominator and were set to 0
    pub degenerate: bool,
}

impl ValidationReport {
    pub fn from_confusion(confusion: ConfusionMatrix) -> Self {
        let degenerate = confusion.try_iou().is_err();
        Self {
            confusion,
            f1_score: confusion.f1_score(),
            iou: confusion.iou(),
            precision: confusion.precision(),
            recall: confusion.recall(),
            overall_accuracy: confusion.overall_accuracy(),
            degenerate,
        }
    }
}

/// Scores predicted flood masks against reference flood maps
pub struct AccuracyAssessor;

impl AccuracyAssessor {
    /// Reproject, rasterize and compare the reference against the prediction
    pub fn assess(
        predicted: &BinaryMask,
        geometry: &GridGeometry,
        reference: &PolygonLayer,
    ) -> FloodResult<ValidationReport> {
        geometry.check_shape("accuracy assessment mask/grid", predicted.dim())?;
        log::info!(
            "Validating {}x{} flood mask against {} reference polygons",
            geometry.rows,
            geometry.cols,
            reference.len()
        );

        let reference_raster = Self::rasterize_reference(reference, geometry)?;
        Self::compare(&reference_raster, predicted)
    }

    /// Reference polygons as a 0/1 grid aligned with the prediction
    pub fn rasterize_reference(
        reference: &PolygonLayer,
        geometry: &GridGeometry,
    ) -> FloodResult<BinaryMask> {
        if reference.is_empty() {
            log::warn!("Reference layer has no geometries; reference raster is empty");
            return Ok(BinaryMask::zeros(geometry.shape()));
        }

        let aligned = reference.to_crs(&geometry.crs)?;
        rasterize_polygons(&aligned.polygons, geometry, 1, 0)
    }

    /// Compare an already rasterized reference against the prediction
    pub fn compare(
        reference: &BinaryMask,
        predicted: &BinaryMask,
    ) -> FloodResult<ValidationReport> {
        let confusion = ConfusionMatrix::from_masks(reference, predicted)?;
        let report = ValidationReport::from_confusion(confusion);

        log::info!("Confusion matrix:\n{}", confusion);
        log::info!("F1-score: {:.3}, IoU: {:.3}", report.f1_score, report.iou);
        log::debug!(
            "Precision: {:.3}, recall: {:.3}, overall accuracy: {:.3}",
            report.precision,
            report.recall,
            report.overall_accuracy
        );

        Ok(report)
    }
}
