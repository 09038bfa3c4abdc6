use geo::Polygon;
use ndarray::Array2;

use crate::types::{FloodResult, GeoTransform, GridGeometry};

/// Burn polygons onto a grid
///
/// A pixel receives `burn` when its centre lies inside any polygon (even-odd
/// rule, so holes stay unburned) and `fill` otherwise. Centres exactly on a
/// left or top edge count as inside, on a right or bottom edge as outside.
pub fn rasterize_polygons(
    polygons: &[Polygon<f64>],
    geometry: &GridGeometry,
    burn: u8,
    fill: u8,
) -> FloodResult<Array2<u8>> {
    let (height, width) = geometry.shape();
    let mut grid = Array2::from_elem((height, width), fill);
    if height == 0 || width == 0 {
        return Ok(grid);
    }

    for polygon in polygons {
        let rings = pixel_rings(polygon, &geometry.transform)?;
        burn_rings(&mut grid, &rings, burn);
    }

    Ok(grid)
}

/// Polygon rings as (col, row) positions in pixel space
fn pixel_rings(
    polygon: &Polygon<f64>,
    transform: &GeoTransform,
) -> FloodResult<Vec<Vec<(f64, f64)>>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors().iter())
        .map(|ring| {
            ring.coords()
                .map(|c| transform.world_to_pixel(c.x, c.y))
                .collect::<FloodResult<Vec<_>>>()
        })
        .collect()
}

fn burn_rings(grid: &mut Array2<u8>, rings: &[Vec<(f64, f64)>], burn: u8) {
    let (height, width) = grid.dim();

    let (min_row, max_row) = rings
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, row)| (lo.min(row), hi.max(row)));
    if !min_row.is_finite() || !max_row.is_finite() {
        return;
    }

    let first_row = (min_row - 0.5).ceil().max(0.0);
    let last_row = (max_row - 0.5).floor().min(height as f64 - 1.0);
    if first_row > last_row {
        return;
    }

    let mut crossings = Vec::new();
    for row in first_row as usize..=last_row as usize {
        let y = row as f64 + 0.5;
        crossings.clear();

        for ring in rings {
            for edge in ring.windows(2) {
                let (x0, y0) = edge[0];
                let (x1, y1) = edge[1];
                if (y0 <= y) != (y1 <= y) {
                    crossings.push(x0 + (y - y0) * (x1 - x0) / (y1 - y0));
                }
            }
        }

        crossings.sort_by(|a, b| a.total_cmp(b));
        for span in crossings.chunks_exact(2) {
            let start = (span[0] - 0.5).ceil().max(0.0);
            let end = (span[1] - 0.5).ceil().min(width as f64);
            if start >= end {
                continue;
            }
            for col in start as usize..end as usize {
                grid[[row, col]] = burn;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Crs;
    use geo::polygon;

    fn grid(rows: usize, cols: usize) -> GridGeometry {
        GridGeometry::new(rows, cols, GeoTransform::default(), Crs::from_epsg(32633))
    }

    #[test]
    fn test_square_covers_pixel_centres() {
        let square = polygon![
            (x: 1.0, y: 1.0), (x: 3.0, y: 1.0), (x: 3.0, y: 4.0), (x: 1.0, y: 4.0),
        ];
        let raster = rasterize_polygons(&[square], &grid(5, 5), 1, 0).unwrap();

        assert_eq!(raster.iter().filter(|&&v| v == 1).count(), 6);
        assert_eq!(raster[[1, 1]], 1);
        assert_eq!(raster[[3, 2]], 1);
        assert_eq!(raster[[0, 1]], 0);
        assert_eq!(raster[[1, 3]], 0);
    }

    #[test]
    fn test_hole_is_left_unburned() {
        let with_hole = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)],
            interiors: [[(x: 1.0, y: 1.0), (x: 3.0, y: 1.0), (x: 3.0, y: 3.0), (x: 1.0, y: 3.0)]],
        );
        let raster = rasterize_polygons(&[with_hole], &grid(4, 4), 1, 0).unwrap();

        assert_eq!(raster.iter().filter(|&&v| v == 1).count(), 12);
        assert_eq!(raster[[1, 1]], 0);
        assert_eq!(raster[[2, 2]], 0);
    }

    #[test]
    fn test_polygon_outside_grid_is_clipped() {
        let far = polygon![
            (x: -10.0, y: -10.0), (x: -5.0, y: -10.0), (x: -5.0, y: -5.0), (x: -10.0, y: -5.0),
        ];
        let partial = polygon![
            (x: -2.0, y: -2.0), (x: 1.0, y: -2.0), (x: 1.0, y: 1.0), (x: -2.0, y: 1.0),
        ];
        let raster = rasterize_polygons(&[far, partial], &grid(3, 3), 1, 0).unwrap();
        assert_eq!(raster.iter().filter(|&&v| v == 1).count(), 1);
        assert_eq!(raster[[0, 0]], 1);
    }

    #[test]
    fn test_no_polygons_gives_fill() {
        let raster = rasterize_polygons(&[], &grid(3, 4), 1, 7).unwrap();
        assert!(raster.iter().all(|&v| v == 7));
    }

    #[test]
    fn test_world_polygon_on_north_up_grid() {
        let geometry = GridGeometry::new(
            4,
            4,
            GeoTransform::north_up(100.0, 200.0, 10.0),
            Crs::from_epsg(32633),
        );
        // Covers columns 1..3 and rows 0..2
        let block = polygon![
            (x: 110.0, y: 200.0), (x: 130.0, y: 200.0), (x: 130.0, y: 180.0), (x: 110.0, y: 180.0),
        ];
        let raster = rasterize_polygons(&[block], &geometry, 1, 0).unwrap();
        assert_eq!(raster.iter().filter(|&&v| v == 1).count(), 4);
        assert_eq!(raster[[0, 1]], 1);
        assert_eq!(raster[[1, 2]], 1);
        assert_eq!(raster[[2, 1]], 0);
    }
}
