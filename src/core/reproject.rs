use gdal::spatial_ref::{CoordTransform, SpatialRef};
use geo::{Coord, LineString, Polygon};

use crate::types::{Crs, FloodError, FloodResult, PolygonLayer};

/// Parse a CRS definition with x = easting/longitude axis order
fn spatial_ref(crs: &Crs) -> FloodResult<SpatialRef> {
    let srs = SpatialRef::from_definition(crs.definition())
        .map_err(|e| FloodError::CrsMismatch(format!("Cannot parse CRS '{}': {}", crs, e)))?;
    srs.set_axis_mapping_strategy(gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER);
    Ok(srs)
}

/// Reproject every polygon of a layer into `target`
///
/// Layers already in the target CRS are returned unchanged without touching GDAL.
pub fn reproject_layer(layer: &PolygonLayer, target: &Crs) -> FloodResult<PolygonLayer> {
    if layer.crs == *target {
        return Ok(layer.clone());
    }
    if layer.crs.is_missing() || target.is_missing() {
        return Err(FloodError::CrsMismatch(format!(
            "Cannot reproject from {} to {}",
            layer.crs, target
        )));
    }

    let source_srs = spatial_ref(&layer.crs)?;
    let target_srs = spatial_ref(target)?;
    if source_srs == target_srs {
        log::debug!("{} and {} describe the same CRS", layer.crs, target);
        return Ok(PolygonLayer::new(layer.polygons.clone(), target.clone()));
    }

    let transform = CoordTransform::new(&source_srs, &target_srs).map_err(|e| {
        FloodError::CrsMismatch(format!(
            "No transformation from {} to {}: {}",
            layer.crs, target, e
        ))
    })?;

    log::debug!(
        "Reprojecting {} polygons from {} to {}",
        layer.len(),
        layer.crs,
        target
    );

    let polygons = layer
        .polygons
        .iter()
        .map(|polygon| transform_polygon(polygon, &transform))
        .collect::<FloodResult<Vec<_>>>()?;

    Ok(PolygonLayer::new(polygons, target.clone()))
}

fn transform_polygon(
    polygon: &Polygon<f64>,
    transform: &CoordTransform,
) -> FloodResult<Polygon<f64>> {
    let exterior = transform_ring(polygon.exterior(), transform)?;
    let interiors = polygon
        .interiors()
        .iter()
        .map(|ring| transform_ring(ring, transform))
        .collect::<FloodResult<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn transform_ring(
    ring: &LineString<f64>,
    transform: &CoordTransform,
) -> FloodResult<LineString<f64>> {
    let mut xs: Vec<f64> = ring.coords().map(|c| c.x).collect();
    let mut ys: Vec<f64> = ring.coords().map(|c| c.y).collect();
    let mut zs = vec![0.0; xs.len()];

    transform
        .transform_coords(&mut xs, &mut ys, &mut zs)
        .map_err(|e| FloodError::CrsMismatch(format!("Coordinate transformation failed: {}", e)))?;

    Ok(xs
        .into_iter()
        .zip(ys)
        .map(|(x, y)| Coord { x, y })
        .collect::<Vec<_>>()
        .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_identical_crs_is_passthrough() {
        let layer = PolygonLayer::new(
            vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]],
            Crs::from_epsg(3857),
        );
        let out = reproject_layer(&layer, &Crs::from_epsg(3857)).unwrap();
        assert_eq!(out, layer);
    }

    #[test]
    fn test_missing_crs_is_rejected() {
        let layer = PolygonLayer::new(
            vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]],
            Crs::default(),
        );
        let err = reproject_layer(&layer, &Crs::wgs84()).unwrap_err();
        assert!(matches!(err, FloodError::CrsMismatch(_)));
    }
}
