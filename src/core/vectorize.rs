//! Raster-to-polygon conversion for binary masks
//!
//! Each 4-connected foreground region becomes one polygon whose rings follow
//! pixel edges. Boundary edges are oriented with the region on their right
//! (in row-down pixel space), so exterior rings run clockwise on screen and
//! holes counter-clockwise. Where two foreground pixels of one region touch
//! only at a corner, the tracer turns toward the pixel it is following, which
//! keeps diagonal pixels apart as 4-connectivity requires. A hole that meets
//! the outside, or another hole, at such a corner gets its own ring touching
//! the other at that single vertex.

use geo::{Coord, LineString, Polygon};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::core::morphology::{label_components, Connectivity};
use crate::types::{
    BinaryMask, Crs, FloodError, FloodResult, GeoTransform, GridGeometry, PolygonLayer,
};

/// Vertex in pixel-corner space, stored as (row, col) so map order is raster order
type Vertex = (usize, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Direction {
    East,
    South,
    West,
    North,
}

impl Direction {
    const ALL: [Direction; 4] = [
        Direction::East,
        Direction::South,
        Direction::West,
        Direction::North,
    ];

    fn bit(self) -> u8 {
        match self {
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 4,
            Direction::North => 8,
        }
    }

    fn turn_right(self) -> Self {
        match self {
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
            Direction::North => Direction::East,
        }
    }

    fn turn_left(self) -> Self {
        match self {
            Direction::East => Direction::North,
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
        }
    }

    fn step(self, (row, col): Vertex) -> Vertex {
        match self {
            Direction::East => (row, col + 1),
            Direction::South => (row + 1, col),
            Direction::West => (row, col - 1),
            Direction::North => (row - 1, col),
        }
    }
}

/// Flood polygons in the mask's native CRS and in the export CRS
#[derive(Debug, Clone)]
pub struct VectorizedMask {
    pub native: PolygonLayer,
    pub export: PolygonLayer,
}

/// Converts binary masks into polygon layers
pub struct MaskVectorizer;

impl MaskVectorizer {
    /// Trace every foreground region and build both polygon layers
    pub fn vectorize(
        mask: &BinaryMask,
        geometry: &GridGeometry,
        export_crs: &Crs,
    ) -> FloodResult<VectorizedMask> {
        geometry.check_shape("vectorizer mask/grid", mask.dim())?;

        let polygons = Self::polygonize(mask, &geometry.transform)?;
        log::info!("Vectorized flood mask into {} polygons", polygons.len());

        let native = PolygonLayer::new(polygons, geometry.crs.clone());
        let export = native.to_crs(export_crs)?;

        Ok(VectorizedMask { native, export })
    }

    /// One polygon per 4-connected region of value 1, in world coordinates
    pub fn polygonize(
        mask: &BinaryMask,
        transform: &GeoTransform,
    ) -> FloodResult<Vec<Polygon<f64>>> {
        let (height, width) = mask.dim();
        let (labels, sizes) = label_components(mask, Connectivity::Four);

        let mut pixels_by_label: Vec<Vec<(usize, usize)>> =
            sizes.iter().map(|&s| Vec::with_capacity(s)).collect();
        for ((i, j), &label) in labels.indexed_iter() {
            if label != 0 {
                pixels_by_label[label as usize].push((i, j));
            }
        }

        let mut polygons = Vec::with_capacity(sizes.len().saturating_sub(1));
        for (label, pixels) in pixels_by_label.iter().enumerate().skip(1) {
            let inside = |r: isize, c: isize| {
                r >= 0
                    && c >= 0
                    && (r as usize) < height
                    && (c as usize) < width
                    && labels[[r as usize, c as usize]] == label as u32
            };

            let edges = collect_boundary_edges(pixels, inside);
            let rings = trace_rings(&edges)?;
            polygons.push(assemble_polygon(rings, transform)?);
        }

        Ok(polygons)
    }
}

/// Outgoing boundary directions per vertex
fn collect_boundary_edges<F>(pixels: &[(usize, usize)], inside: F) -> BTreeMap<Vertex, u8>
where
    F: Fn(isize, isize) -> bool,
{
    let mut edges: BTreeMap<Vertex, u8> = BTreeMap::new();
    let mut add = |v: Vertex, d: Direction| *edges.entry(v).or_insert(0) |= d.bit();

    for &(r, c) in pixels {
        let (ri, ci) = (r as isize, c as isize);
        if !inside(ri - 1, ci) {
            add((r, c), Direction::East);
        }
        if !inside(ri, ci + 1) {
            add((r, c + 1), Direction::South);
        }
        if !inside(ri + 1, ci) {
            add((r + 1, c + 1), Direction::West);
        }
        if !inside(ri, ci - 1) {
            add((r + 1, c), Direction::North);
        }
    }

    edges
}

/// Follow edges into closed rings; each ring is its list of corner vertices
///
/// A walk that comes back to a vertex it already passed (a hole touching the
/// outside, or another hole, at one corner) is split there, so every ring
/// returned is simple.
fn trace_rings(edges: &BTreeMap<Vertex, u8>) -> FloodResult<Vec<Vec<Vertex>>> {
    let mut visited: HashSet<(Vertex, Direction)> = HashSet::new();
    let mut rings = Vec::new();

    for (&start, &dirs) in edges {
        for start_dir in Direction::ALL {
            if dirs & start_dir.bit() == 0 || visited.contains(&(start, start_dir)) {
                continue;
            }

            // Open part of the walk as (vertex, outgoing heading), with each vertex's position
            let mut path: Vec<(Vertex, Direction)> = Vec::new();
            let mut position: HashMap<Vertex, usize> = HashMap::new();
            let (mut vertex, mut dir) = (start, start_dir);

            loop {
                visited.insert((vertex, dir));
                if let Some(&first) = position.get(&vertex) {
                    let loop_part = path.split_off(first);
                    for (v, _) in &loop_part {
                        position.remove(v);
                    }
                    rings.push(drop_collinear(&loop_part));
                }
                position.insert(vertex, path.len());
                path.push((vertex, dir));

                let next = dir.step(vertex);
                let outgoing = edges.get(&next).copied().unwrap_or(0);
                let next_dir = [dir.turn_right(), dir, dir.turn_left()]
                    .into_iter()
                    .find(|d| outgoing & d.bit() != 0)
                    .ok_or_else(|| {
                        FloodError::Processing(format!("Open boundary at pixel corner {:?}", next))
                    })?;

                if (next, next_dir) == (start, start_dir) {
                    break;
                }
                vertex = next;
                dir = next_dir;
            }

            rings.push(drop_collinear(&path));
        }
    }

    Ok(rings)
}

/// Keep only the corners where the heading changes
fn drop_collinear(ring: &[(Vertex, Direction)]) -> Vec<Vertex> {
    let n = ring.len();
    (0..n)
        .filter(|&k| ring[(k + n - 1) % n].1 != ring[k].1)
        .map(|k| ring[k].0)
        .collect()
}

/// Signed area in (col, row) space; exteriors are positive, holes negative
fn shoelace_area(ring: &[Vertex]) -> f64 {
    let n = ring.len();
    let twice: f64 = (0..n)
        .map(|k| {
            let (r0, c0) = ring[k];
            let (r1, c1) = ring[(k + 1) % n];
            c0 as f64 * r1 as f64 - c1 as f64 * r0 as f64
        })
        .sum();
    twice / 2.0
}

fn assemble_polygon(
    mut rings: Vec<Vec<Vertex>>,
    transform: &GeoTransform,
) -> FloodResult<Polygon<f64>> {
    let exterior_index = rings
        .iter()
        .map(|ring| shoelace_area(ring))
        .enumerate()
        .filter(|&(_, area)| area > 0.0)
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(k, _)| k)
        .ok_or_else(|| FloodError::Processing("Region produced no exterior ring".to_string()))?;

    let exterior = rings.swap_remove(exterior_index);
    let to_world = |ring: &[Vertex]| -> LineString<f64> {
        ring.iter()
            .map(|&(row, col)| {
                let (x, y) = transform.pixel_to_world(col as f64, row as f64);
                Coord { x, y }
            })
            .collect::<Vec<_>>()
            .into()
    };

    let holes = rings.iter().map(|ring| to_world(ring)).collect();
    Ok(Polygon::new(to_world(&exterior), holes))
}
