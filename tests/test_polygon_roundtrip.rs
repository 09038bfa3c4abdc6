use geo::Area;
use ndarray::{array, Array2};
use sarflood::core::{rasterize_polygons, MaskVectorizer};
use sarflood::{BinaryMask, Crs, GeoTransform, GridGeometry};

fn geometry_for(mask: &BinaryMask, transform: GeoTransform) -> GridGeometry {
    let (rows, cols) = mask.dim();
    GridGeometry::new(rows, cols, transform, Crs::from_epsg(32633))
}

fn assert_roundtrip(mask: &BinaryMask, transform: GeoTransform) {
    let geometry = geometry_for(mask, transform);
    let polygons = MaskVectorizer::polygonize(mask, &geometry.transform).unwrap();
    let restored = rasterize_polygons(&polygons, &geometry, 1, 0).unwrap();
    assert_eq!(&restored, mask, "mask changed after vectorize/rasterize:\n{:?}", mask);
}

/// Deterministic noise mask from a linear congruential generator
fn noise_mask(rows: usize, cols: usize, seed: u64, density_percent: u64) -> BinaryMask {
    let mut state = seed;
    Array2::from_shape_fn((rows, cols), |_| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 33) % 100 < density_percent) as u8
    })
}

#[test]
fn test_roundtrip_simple_shapes() {
    let transform = GeoTransform::north_up(500_000.0, 4_500_000.0, 10.0);

    let l_shape = array![
        [1u8, 0, 0, 0],
        [1, 0, 0, 0],
        [1, 1, 1, 0],
        [0, 0, 0, 0],
    ];
    assert_roundtrip(&l_shape, transform);

    let ring = array![
        [1u8, 1, 1, 1, 1],
        [1, 0, 0, 0, 1],
        [1, 0, 1, 0, 1],
        [1, 0, 0, 0, 1],
        [1, 1, 1, 1, 1],
    ];
    assert_roundtrip(&ring, transform);

    let full = Array2::<u8>::ones((6, 7));
    assert_roundtrip(&full, transform);

    let empty = Array2::<u8>::zeros((6, 7));
    assert_roundtrip(&empty, transform);
}

#[test]
fn test_diagonal_pixels_become_separate_polygons() {
    let mask = array![
        [1u8, 0, 0],
        [0, 1, 0],
        [0, 0, 1],
    ];
    let transform = GeoTransform::default();
    let polygons = MaskVectorizer::polygonize(&mask, &transform).unwrap();

    assert_eq!(polygons.len(), 3);
    for polygon in &polygons {
        assert!((polygon.unsigned_area() - 1.0).abs() < 1e-12);
        assert!(polygon.interiors().is_empty());
    }
    assert_roundtrip(&mask, transform);
}

#[test]
fn test_holes_touching_at_corners_roundtrip() {
    let mask = array![
        [1u8, 1, 1, 0, 0],
        [1, 0, 1, 0, 0],
        [1, 1, 0, 1, 1],
        [0, 1, 1, 0, 1],
        [0, 0, 1, 1, 1],
    ];
    let polygons = MaskVectorizer::polygonize(&mask, &GeoTransform::default()).unwrap();

    assert_eq!(polygons.len(), 1);
    assert_eq!(polygons[0].interiors().len(), 3);
    assert_roundtrip(&mask, GeoTransform::north_up(500_000.0, 4_500_000.0, 10.0));
}

#[test]
fn test_checkerboard_saddles_roundtrip() {
    let mask = Array2::from_shape_fn((7, 9), |(i, j)| ((i + j) % 2 == 0) as u8);
    let polygons = MaskVectorizer::polygonize(&mask, &GeoTransform::default()).unwrap();

    assert_eq!(polygons.len(), mask.iter().filter(|&&v| v == 1).count());
    assert_roundtrip(&mask, GeoTransform::north_up(0.0, 100.0, 2.5));
}

#[test]
fn test_roundtrip_noise_masks() {
    let transform = GeoTransform::north_up(300_000.0, 5_000_000.0, 20.0);
    for (seed, density) in [(1u64, 30u64), (7, 50), (42, 65), (2024, 80)] {
        let mask = noise_mask(24, 31, seed, density);
        assert_roundtrip(&mask, transform);
    }
}

#[test]
fn test_polygon_area_matches_pixel_count() {
    let mask = noise_mask(16, 16, 99, 55);
    let pixel_size = 10.0;
    let polygons =
        MaskVectorizer::polygonize(&mask, &GeoTransform::north_up(0.0, 0.0, pixel_size)).unwrap();

    let area: f64 = polygons.iter().map(|p| p.unsigned_area()).sum();
    let expected = mask.iter().filter(|&&v| v == 1).count() as f64 * pixel_size * pixel_size;
    assert!((area - expected).abs() < 1e-6, "area {} != {}", area, expected);
}
