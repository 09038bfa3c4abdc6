use anyhow::Context;
use sarflood::{FloodPipeline, PipelineConfig};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => {
            log::info!("No configuration given, using default input paths");
            PipelineConfig::default()
        }
    };

    let outputs = FloodPipeline::new(config).run().context("Flood mapping failed")?;

    println!(
        "Flooded pixels: {} ({} polygons)",
        outputs.masks.summary.new_water_pixels,
        outputs.polygons.native.len()
    );
    if let Some(report) = outputs.validation {
        println!("F1 score: {:.4}", report.f1_score);
        println!("IoU:      {:.4}", report.iou);
        println!("Confusion matrix:\n{}", report.confusion);
    }

    Ok(())
}
