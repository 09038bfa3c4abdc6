use approx::assert_abs_diff_eq;
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::DriverManager;
use geo::{polygon, Area, BoundingRect};
use ndarray::{s, Array2};
use sarflood::core::{reproject_layer, MaskVectorizer};
use sarflood::io::{RasterIo, SceneBands, VectorFormat, VectorIo};
use sarflood::{
    Crs, FloodError, FloodPipeline, GeoTransform, GridGeometry, PipelineConfig, PolygonLayer,
};
use std::path::Path;
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn utm_transform() -> GeoTransform {
    GeoTransform::north_up(500_000.0, 4_500_000.0, 10.0)
}

/// Write a two-band (VH, VV) float GeoTIFF in UTM 33N
fn write_scene(path: &Path, vh: &Array2<f32>, vv: &Array2<f32>) {
    let (rows, cols) = vv.dim();
    let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
    let mut dataset = driver
        .create_with_band_type::<f32, _>(path, cols as isize, rows as isize, 2)
        .unwrap();
    dataset.set_geo_transform(&utm_transform().to_gdal()).unwrap();
    dataset.set_spatial_ref(&SpatialRef::from_epsg(32633).unwrap()).unwrap();

    for (index, band) in [(1, vh), (2, vv)] {
        let mut rasterband = dataset.rasterband(index).unwrap();
        let buffer = Buffer::new((cols, rows), band.iter().cloned().collect());
        rasterband.write((0, 0), (cols, rows), &buffer).unwrap();
    }
}

#[test]
fn test_mask_geotiff_roundtrip() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mask.tif");

    let mut mask = Array2::<u8>::zeros((12, 17));
    mask.slice_mut(s![2..9, 3..11]).fill(1);
    let geometry = GridGeometry::new(12, 17, utm_transform(), Crs::from_epsg(32633));

    RasterIo::write_mask(&path, &mask, &geometry).unwrap();
    let (restored, restored_geometry) = RasterIo::read_mask(&path).unwrap();

    assert_eq!(restored, mask);
    assert_eq!(restored_geometry.shape(), (12, 17));
    assert_eq!(restored_geometry.transform, utm_transform());
    assert!(!restored_geometry.crs.is_missing());
}

#[test]
fn test_mask_shape_must_match_grid() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let geometry = GridGeometry::new(5, 5, utm_transform(), Crs::from_epsg(32633));

    let err = RasterIo::write_mask(dir.path().join("bad.tif"), &Array2::zeros((5, 6)), &geometry)
        .unwrap_err();
    assert!(matches!(err, FloodError::DimensionMismatch { .. }));
}

#[test]
fn test_scene_bands_are_read_in_order() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scene.tif");

    let vh = Array2::from_elem((8, 6), 0.02f32);
    let vv = Array2::from_shape_fn((8, 6), |(i, j)| (i * 6 + j) as f32 * 0.01);
    write_scene(&path, &vh, &vv);

    let scene = RasterIo::read_scene(&path, SceneBands::default()).unwrap();
    assert_eq!(scene.vh(), &vh);
    assert_eq!(scene.vv(), &vv);
    assert_eq!(scene.geometry().shape(), (8, 6));

    let swapped = RasterIo::read_scene(&path, SceneBands { vh: 2, vv: 1 }).unwrap();
    assert_eq!(swapped.vv(), &vh);

    let err = RasterIo::read_scene(&path, SceneBands { vh: 1, vv: 3 }).unwrap_err();
    assert!(matches!(err, FloodError::InvalidFormat(_)));
}

#[test]
fn test_missing_raster_reported() {
    init_logging();
    let err = RasterIo::read_elevation("/nonexistent/dem.tif").unwrap_err();
    assert!(matches!(err, FloodError::MissingInput { .. }));
}

#[test]
fn test_geojson_layer_roundtrip() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("polygons.json");

    let mut mask = Array2::<u8>::zeros((10, 10));
    mask.slice_mut(s![1..4, 1..5]).fill(1);
    mask.slice_mut(s![6..9, 2..9]).fill(1);
    mask[[7, 5]] = 0;

    let polygons = MaskVectorizer::polygonize(&mask, &utm_transform()).unwrap();
    let layer = PolygonLayer::new(polygons, Crs::from_epsg(32633));

    VectorIo::write_polygon_layer(&path, &layer, VectorFormat::GeoJson).unwrap();
    // Writing again replaces the file instead of failing
    VectorIo::write_polygon_layer(&path, &layer, VectorFormat::GeoJson).unwrap();

    let restored = VectorIo::read_polygon_layer(&path).unwrap();
    assert_eq!(restored.len(), 2);
    assert!(!restored.crs.is_missing());

    let mut areas: Vec<f64> = restored.polygons.iter().map(|p| p.unsigned_area()).collect();
    areas.sort_by(|a, b| a.total_cmp(b));
    assert_abs_diff_eq!(areas[0], 12.0 * 100.0, epsilon = 1e-6);
    assert_abs_diff_eq!(areas[1], 20.0 * 100.0, epsilon = 1e-6);
}

#[test]
fn test_reprojection_to_wgs84() {
    init_logging();

    // 2x2 km square on the UTM 33N central meridian at the equator
    let square = geo::polygon![
        (x: 500_000.0, y: 0.0),
        (x: 502_000.0, y: 0.0),
        (x: 502_000.0, y: 2_000.0),
        (x: 500_000.0, y: 2_000.0),
    ];
    let layer = PolygonLayer::new(vec![square], Crs::from_epsg(32633));

    let wgs84 = reproject_layer(&layer, &Crs::wgs84()).unwrap();
    assert_eq!(wgs84.crs, Crs::wgs84());

    let bounds = wgs84.polygons[0].bounding_rect().unwrap();
    assert_abs_diff_eq!(bounds.min().x, 15.0, epsilon = 1e-6);
    assert_abs_diff_eq!(bounds.min().y, 0.0, epsilon = 1e-6);
    assert!(bounds.max().x > 15.0 && bounds.max().x < 15.05);
    assert!(bounds.max().y > 0.0 && bounds.max().y < 0.05);

    let err =
        reproject_layer(&PolygonLayer::new(Vec::new(), Crs::default()), &Crs::wgs84()).unwrap_err();
    assert!(matches!(err, FloodError::CrsMismatch(_)));
}

#[test]
fn test_full_pipeline_run() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let (rows, cols) = (60, 60);

    let dry_vv = Array2::from_elem((rows, cols), 0.15f32);
    let dry_vh = Array2::from_elem((rows, cols), 0.04f32);
    let mut wet_vv = dry_vv.clone();
    let mut wet_vh = dry_vh.clone();
    wet_vv.slice_mut(s![10..40, 15..45]).fill(0.005);
    wet_vh.slice_mut(s![10..40, 15..45]).fill(0.002);

    let pre_path = dir.path().join("pre.tif");
    let post_path = dir.path().join("post.tif");
    write_scene(&pre_path, &dry_vh, &dry_vv);
    write_scene(&post_path, &wet_vh, &wet_vv);

    // Reference flood extent is the full lake square
    let mut lake = Array2::<u8>::zeros((rows, cols));
    lake.slice_mut(s![10..40, 15..45]).fill(1);
    let reference_path = dir.path().join("reference.json");
    let reference = PolygonLayer::new(
        MaskVectorizer::polygonize(&lake, &utm_transform()).unwrap(),
        Crs::from_epsg(32633),
    );
    VectorIo::write_polygon_layer(&reference_path, &reference, VectorFormat::GeoJson).unwrap();

    let output_dir = dir.path().join("results");
    let mut config = PipelineConfig {
        pre_scene: pre_path,
        post_scene: post_path,
        reference: Some(reference_path),
        output_dir: output_dir.clone(),
        ..Default::default()
    };
    config.water.percentile = 100.0;
    config.water.min_object_size = 100;

    let outputs = FloodPipeline::new(config).run().unwrap();

    for name in [
        "pre_water.tif",
        "post_water.tif",
        "flood_area.tif",
        "flood_area_polygons.json",
        "flood_area_polygons_WGS84.json",
        "metrics.csv",
    ] {
        assert!(output_dir.join(name).exists(), "missing output {}", name);
    }

    assert_eq!(outputs.polygons.native.len(), 1);
    assert_eq!(outputs.polygons.export.crs, Crs::wgs84());

    let report = outputs.validation.unwrap();
    assert_eq!(report.confusion.false_positives, 0);
    assert!(report.f1_score > 0.98);
    assert!(report.iou > 0.97);

    let (flood_mask, _) = RasterIo::read_mask(output_dir.join("flood_area.tif")).unwrap();
    assert_eq!(flood_mask, outputs.masks.flooded);

    let metrics = std::fs::read_to_string(output_dir.join("metrics.csv")).unwrap();
    assert!(metrics.starts_with("F1_score,IoU\n"));
}
