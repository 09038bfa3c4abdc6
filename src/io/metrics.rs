use std::path::Path;

use crate::core::validation::ValidationReport;
use crate::types::FloodResult;

/// Header of the metrics table
pub const METRICS_HEADER: &str = "F1_score,IoU";

/// Render the one-row `F1_score,IoU` table
pub fn format_metrics_csv(report: &ValidationReport) -> String {
    format!("{}\n{},{}\n", METRICS_HEADER, report.f1_score, report.iou)
}

pub fn write_metrics_csv<P: AsRef<Path>>(path: P, report: &ValidationReport) -> FloodResult<()> {
    let path = path.as_ref();
    std::fs::write(path, format_metrics_csv(report))?;
    log::info!("Saved metrics: {}", path.display());
    Ok(())
}
