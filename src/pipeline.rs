//! End-to-end flood mapping run
//!
//! Stages pass in-memory grids to each other; files are only read at the
//! start and written at the end.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::change_detection::{ChangeDetector, ChangeSummary};
use crate::core::slope_filter::{SlopeFilter, SlopeFilterParams};
use crate::core::validation::{AccuracyAssessor, ValidationReport};
use crate::core::vectorize::{MaskVectorizer, VectorizedMask};
use crate::core::water_detection::{WaterDetectionParams, WaterDetector};
use crate::io::{write_metrics_csv, RasterIo, SceneBands, VectorFormat, VectorIo};
use crate::types::{
    ensure_same_shape, BinaryMask, Crs, ElevationGrid, FloodError, FloodResult, GridGeometry,
    PolygonLayer, RadarScene,
};

/// Pipeline configuration, loadable from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pre-event dual-pol GeoTIFF
    pub pre_scene: PathBuf,
    /// Post-event dual-pol GeoTIFF
    pub post_scene: PathBuf,
    /// Optional DEM on the scene grid
    pub dem: Option<PathBuf>,
    /// Optional reference flood polygons
    pub reference: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub bands: SceneBands,
    pub water: WaterDetectionParams,
    pub slope: SlopeFilterParams,
    /// CRS of the secondary polygon export
    pub export_crs: Crs,
    pub vector_format: VectorFormat,
    /// Also save the pre/post water masks
    pub write_intermediate_masks: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pre_scene: PathBuf::from("data/may.tif"),
            post_scene: PathBuf::from("data/june.tif"),
            dem: None,
            reference: Some(PathBuf::from("data/EMSN_199.shp")),
            output_dir: PathBuf::from("results"),
            bands: SceneBands::default(),
            water: WaterDetectionParams::default(),
            slope: SlopeFilterParams::default(),
            export_crs: Crs::wgs84(),
            vector_format: VectorFormat::GeoJson,
            write_intermediate_masks: true,
        }
    }
}

impl PipelineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> FloodResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FloodError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Water masks and change mask of one run
#[derive(Debug, Clone)]
pub struct FloodMasks {
    pub pre_water: BinaryMask,
    pub post_water: BinaryMask,
    pub flooded: BinaryMask,
    pub summary: ChangeSummary,
}

/// Everything a full run produces
#[derive(Debug, Clone)]
pub struct PipelineOutputs {
    pub geometry: GridGeometry,
    pub masks: FloodMasks,
    pub polygons: VectorizedMask,
    pub validation: Option<ValidationReport>,
}

/// Runs segmentation, change detection, vectorization and validation
pub struct FloodPipeline {
    config: PipelineConfig,
}

impl FloodPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fail with `MissingInput` for the first configured input that does not exist
    pub fn check_inputs(&self) -> FloodResult<()> {
        let inputs = [Some(&self.config.pre_scene), Some(&self.config.post_scene)]
            .into_iter()
            .chain([self.config.dem.as_ref(), self.config.reference.as_ref()])
            .flatten();

        for path in inputs {
            if !path.exists() {
                log::error!("Input not found: {}", path.display());
                return Err(FloodError::MissingInput { path: path.clone() });
            }
        }
        Ok(())
    }

    /// Full run from files to files
    pub fn run(&self) -> FloodResult<PipelineOutputs> {
        log::info!("🌊 Starting flood mapping pipeline");
        self.check_inputs()?;

        let pre = stage(
            &format!("read pre-event scene {}", self.config.pre_scene.display()),
            RasterIo::read_scene(&self.config.pre_scene, self.config.bands),
        )?;
        let post = stage(
            &format!("read post-event scene {}", self.config.post_scene.display()),
            RasterIo::read_scene(&self.config.post_scene, self.config.bands),
        )?;
        let dem = match &self.config.dem {
            Some(path) => {
                let (dem, _) = stage(
                    &format!("read DEM {}", path.display()),
                    RasterIo::read_elevation(path),
                )?;
                Some(dem)
            }
            None => None,
        };

        let masks = self.process_scenes(&pre, &post, dem.as_ref())?;
        let geometry = pre.geometry().clone();

        self.prepare_output_dir()?;
        if self.config.write_intermediate_masks {
            self.write_mask("pre_water.tif", &masks.pre_water, &geometry)?;
            self.write_mask("post_water.tif", &masks.post_water, &geometry)?;
        }
        self.write_mask("flood_area.tif", &masks.flooded, &geometry)?;

        let polygons = stage(
            "vectorize flood mask",
            MaskVectorizer::vectorize(&masks.flooded, &geometry, &self.config.export_crs),
        )?;
        self.write_polygons("flood_area_polygons", &polygons.native)?;
        self.write_polygons("flood_area_polygons_WGS84", &polygons.export)?;

        let validation = match &self.config.reference {
            Some(path) => {
                let reference = stage(
                    &format!("read reference layer {}", path.display()),
                    VectorIo::read_polygon_layer(path),
                )?;
                let report = stage(
                    "validate against reference",
                    AccuracyAssessor::assess(&masks.flooded, &geometry, &reference),
                )?;
                let metrics_path = self.output_path("metrics.csv");
                stage(
                    &format!("write metrics {}", metrics_path.display()),
                    write_metrics_csv(&metrics_path, &report),
                )?;
                Some(report)
            }
            None => {
                log::info!("No reference layer configured; skipping validation");
                None
            }
        };

        log::info!("✅ Pipeline finished, results in {}", self.config.output_dir.display());
        Ok(PipelineOutputs {
            geometry,
            masks,
            polygons,
            validation,
        })
    }

    /// Segment both scenes, apply the optional slope filter and detect new water
    pub fn process_scenes(
        &self,
        pre: &RadarScene,
        post: &RadarScene,
        dem: Option<&ElevationGrid>,
    ) -> FloodResult<FloodMasks> {
        stage(
            "co-registration check",
            ensure_same_shape(
                "pre/post scene grids",
                pre.geometry().shape(),
                post.geometry().shape(),
            ),
        )?;
        if pre.geometry().transform != post.geometry().transform
            || pre.geometry().crs != post.geometry().crs
        {
            log::warn!("Pre and post scenes differ in georeferencing; using the pre-event grid");
        }

        let detector = WaterDetector::with_params(self.config.water.clone());
        let mut pre_water = stage("segment pre-event water", detector.detect_scene(pre))?;
        let mut post_water = stage("segment post-event water", detector.detect_scene(post))?;

        if let Some(dem) = dem {
            let filter = SlopeFilter::with_params(self.config.slope.clone());
            stage("slope filter pre-event", filter.apply(&mut pre_water, dem))?;
            stage("slope filter post-event", filter.apply(&mut post_water, dem))?;
        }

        let (flooded, summary) = stage(
            "change detection",
            ChangeDetector::detect_with_summary(&pre_water, &post_water),
        )?;

        Ok(FloodMasks {
            pre_water,
            post_water,
            flooded,
            summary,
        })
    }

    fn output_path(&self, name: &str) -> PathBuf {
        self.config.output_dir.join(name)
    }

    fn prepare_output_dir(&self) -> FloodResult<()> {
        let dir = &self.config.output_dir;
        stage(
            &format!("create output directory {}", dir.display()),
            std::fs::create_dir_all(dir).map_err(FloodError::from),
        )
    }

    fn write_mask(
        &self,
        name: &str,
        mask: &BinaryMask,
        geometry: &GridGeometry,
    ) -> FloodResult<()> {
        let path = self.output_path(name);
        stage(
            &format!("write mask {}", path.display()),
            RasterIo::write_mask(&path, mask, geometry),
        )
    }

    fn write_polygons(&self, stem: &str, layer: &PolygonLayer) -> FloodResult<()> {
        let format = self.config.vector_format;
        let path = self.output_path(&format!("{}.{}", stem, format.extension()));
        stage(
            &format!("write polygons {}", path.display()),
            VectorIo::write_polygon_layer(&path, layer, format),
        )
    }
}

/// Log a failing stage before handing its error back
fn stage<T>(name: &str, result: FloodResult<T>) -> FloodResult<T> {
    result.map_err(|e| {
        log::error!("Stage '{}' failed: {}", name, e);
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoTransform;
    use ndarray::Array2;

    fn scene(vv: Array2<f32>, vh: Array2<f32>) -> RadarScene {
        let transform = GeoTransform::north_up(0.0, 0.0, 10.0);
        RadarScene::new(vh, vv, transform, Crs::from_epsg(32633)).unwrap()
    }

    fn small_objects_config() -> PipelineConfig {
        PipelineConfig {
            water: WaterDetectionParams {
                percentile: 100.0,
                min_object_size: 50,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_new_lake_is_detected_as_flood() {
        let dry_vv = Array2::from_elem((40, 40), 0.2f32);
        let dry_vh = Array2::from_elem((40, 40), 0.05f32);
        let mut wet_vv = dry_vv.clone();
        let mut wet_vh = dry_vh.clone();
        for i in 5..25 {
            for j in 10..30 {
                wet_vv[[i, j]] = 0.004;
                wet_vh[[i, j]] = 0.001;
            }
        }

        let pipeline = FloodPipeline::new(small_objects_config());
        let masks = pipeline
            .process_scenes(&scene(dry_vv, dry_vh), &scene(wet_vv, wet_vh), None)
            .unwrap();

        assert_eq!(masks.summary.pre_water_pixels, 0);
        assert!(masks.summary.new_water_pixels > 300);
        assert_eq!(masks.flooded[[15, 20]], 1);
        assert_eq!(masks.flooded[[35, 35]], 0);
    }

    #[test]
    fn test_mismatched_scenes_rejected() {
        let a = scene(Array2::zeros((10, 10)), Array2::zeros((10, 10)));
        let b = scene(Array2::zeros((10, 12)), Array2::zeros((10, 12)));
        let err = FloodPipeline::new(small_objects_config())
            .process_scenes(&a, &b, None)
            .unwrap_err();
        assert!(matches!(err, FloodError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_missing_input_detected_before_processing() {
        let config = PipelineConfig {
            pre_scene: PathBuf::from("/nonexistent/pre.tif"),
            ..Default::default()
        };
        let err = FloodPipeline::new(config).run().unwrap_err();
        match err {
            FloodError::MissingInput { path } => {
                assert_eq!(path, PathBuf::from("/nonexistent/pre.tif"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_output_dir_under_regular_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();

        let pipeline = FloodPipeline::new(PipelineConfig {
            output_dir: blocker.join("results"),
            ..Default::default()
        });
        let err = pipeline.prepare_output_dir().unwrap_err();
        assert!(matches!(err, FloodError::Io(_)));
        assert!(!blocker.join("results").exists());
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{ "pre_scene": "a.tif", "post_scene": "b.tif", "reference": null,
                 "water": { "percentile": 95.0 } }"#,
        )
        .unwrap();

        assert_eq!(config.pre_scene, PathBuf::from("a.tif"));
        assert!(config.reference.is_none());
        assert_eq!(config.water.percentile, 95.0);
        assert_eq!(config.water.min_object_size, 2000);
        assert_eq!(config.export_crs, Crs::wgs84());
        assert_eq!(config.vector_format, VectorFormat::GeoJson);
    }
}
