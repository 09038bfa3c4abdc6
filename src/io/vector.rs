use gdal::spatial_ref::SpatialRef;
use gdal::vector::{FieldValue, LayerAccess, ToGdal};
use gdal::LayerOptions;
use gdal::{Dataset, DriverManager};
use geo::{Geometry, Polygon};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{Crs, FloodError, FloodResult, PolygonLayer};

/// Vector output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VectorFormat {
    GeoJson,
    GeoPackage,
}

impl Default for VectorFormat {
    fn default() -> Self {
        VectorFormat::GeoJson
    }
}

impl VectorFormat {
    pub fn driver_name(&self) -> &'static str {
        match self {
            VectorFormat::GeoJson => "GeoJSON",
            VectorFormat::GeoPackage => "GPKG",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            VectorFormat::GeoJson => "json",
            VectorFormat::GeoPackage => "gpkg",
        }
    }
}

/// OGR-backed polygon layer reader/writer
pub struct VectorIo;

impl VectorIo {
    /// Read every polygonal feature of the first layer; multipolygons are split into their parts
    pub fn read_polygon_layer<P: AsRef<Path>>(path: P) -> FloodResult<PolygonLayer> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FloodError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        log::info!("Reading polygon layer from: {}", path.display());

        let dataset = Dataset::open(path)?;
        let mut layer = dataset.layer(0)?;
        let crs = match layer.spatial_ref() {
            Some(srs) => Crs::new(srs.to_wkt()?),
            None => Crs::default(),
        };

        let mut polygons = Vec::new();
        let mut skipped = 0usize;
        for feature in layer.features() {
            let Some(geometry) = feature.geometry() else {
                skipped += 1;
                continue;
            };
            if !collect_polygons(geometry.to_geo()?, &mut polygons) {
                skipped += 1;
            }
        }

        if skipped > 0 {
            log::warn!("Skipped {} non-polygonal or empty features", skipped);
        }
        log::debug!("Read {} polygons, CRS: {}", polygons.len(), crs);

        Ok(PolygonLayer::new(polygons, crs))
    }

    /// Write one feature per polygon with an integer `id` field, replacing any existing file
    pub fn write_polygon_layer<P: AsRef<Path>>(
        path: P,
        layer: &PolygonLayer,
        format: VectorFormat,
    ) -> FloodResult<()> {
        let path = path.as_ref();
        log::info!(
            "Saving {} polygons ({}): {}",
            layer.len(),
            format.driver_name(),
            path.display()
        );

        if path.exists() {
            std::fs::remove_file(path)?;
        }

        let srs = if layer.crs.is_missing() {
            log::warn!("Polygon layer has no CRS; writing without spatial reference");
            None
        } else {
            Some(SpatialRef::from_definition(layer.crs.definition())?)
        };

        let driver = DriverManager::get_driver_by_name(format.driver_name())?;
        let mut dataset = driver.create_vector_only(path)?;
        let layer_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("flood_area");

        let mut out_layer = dataset.create_layer(LayerOptions {
            name: layer_name,
            srs: srs.as_ref(),
            ty: gdal_sys::OGRwkbGeometryType::wkbPolygon,
            options: None,
        })?;
        out_layer.create_defn_fields(&[("id", gdal_sys::OGRFieldType::OFTInteger)])?;

        for (id, polygon) in layer.polygons.iter().enumerate() {
            out_layer.create_feature_fields(
                polygon.to_gdal()?,
                &["id"],
                &[FieldValue::IntegerValue(id as i32)],
            )?;
        }

        Ok(())
    }
}

/// Append the polygons of `geometry`; returns false when it holds none
fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<Polygon<f64>>) -> bool {
    match geometry {
        Geometry::Polygon(polygon) => {
            out.push(polygon);
            true
        }
        Geometry::MultiPolygon(multi) => {
            let found = !multi.0.is_empty();
            out.extend(multi.0);
            found
        }
        Geometry::GeometryCollection(collection) => collection
            .0
            .into_iter()
            .fold(false, |found, g| collect_polygons(g, out) || found),
        _ => false,
    }
}
