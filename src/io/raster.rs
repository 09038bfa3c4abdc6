use gdal::raster::{Buffer, RasterCreationOption};
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{
    BinaryMask, Crs, ElevationGrid, FloodError, FloodResult, GeoTransform, GridGeometry, RadarScene,
};

/// Band layout of a dual-pol GRD GeoTIFF (1-based band indices)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneBands {
    pub vh: usize,
    pub vv: usize,
}

impl Default for SceneBands {
    fn default() -> Self {
        Self { vh: 1, vv: 2 }
    }
}

/// GeoTIFF reader/writer for scenes, DEMs and masks
pub struct RasterIo;

impl RasterIo {
    /// Read the VH and VV bands of a Sentinel-1 GRD scene
    pub fn read_scene<P: AsRef<Path>>(path: P, bands: SceneBands) -> FloodResult<RadarScene> {
        let path = path.as_ref();
        log::info!("Reading SAR scene from: {}", path.display());

        let dataset = Self::open(path)?;
        let (transform, crs) = Self::georeference(&dataset);

        let vh = Self::read_band(&dataset, bands.vh)?;
        let vv = Self::read_band(&dataset, bands.vv)?;
        log::debug!("Scene size: {:?}, CRS: {}", vv.dim(), crs);

        RadarScene::new(vh, vv, transform, crs)
    }

    /// Read band 1 of a DEM, returning it with its grid geometry
    pub fn read_elevation<P: AsRef<Path>>(path: P) -> FloodResult<(ElevationGrid, GridGeometry)> {
        let path = path.as_ref();
        log::info!("Reading DEM from: {}", path.display());

        let dataset = Self::open(path)?;
        let (transform, crs) = Self::georeference(&dataset);
        let dem = Self::read_band(&dataset, 1)?;
        let (rows, cols) = dem.dim();

        Ok((dem, GridGeometry::new(rows, cols, transform, crs)))
    }

    /// Write a single-band, LZW-compressed `u8` GeoTIFF
    pub fn write_mask<P: AsRef<Path>>(
        path: P,
        mask: &BinaryMask,
        geometry: &GridGeometry,
    ) -> FloodResult<()> {
        let path = path.as_ref();
        geometry.check_shape("mask GeoTIFF output", mask.dim())?;
        log::info!("Saving mask GeoTIFF: {}", path.display());

        let (height, width) = mask.dim();
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let options = [RasterCreationOption {
            key: "COMPRESS",
            value: "LZW",
        }];
        let mut dataset = driver.create_with_band_type_with_options::<u8, _>(
            path,
            width as isize,
            height as isize,
            1,
            &options,
        )?;

        dataset.set_geo_transform(&geometry.transform.to_gdal())?;
        if geometry.crs.is_missing() {
            log::warn!("Mask {} has no CRS; writing without spatial reference", path.display());
        } else {
            dataset.set_spatial_ref(&SpatialRef::from_definition(geometry.crs.definition())?)?;
        }

        let mut rasterband = dataset.rasterband(1)?;
        let flat_data: Vec<u8> = mask.iter().cloned().collect();
        let buffer = Buffer::new((width, height), flat_data);
        rasterband.write((0, 0), (width, height), &buffer)?;

        Ok(())
    }

    /// Read band 1 of a mask GeoTIFF
    pub fn read_mask<P: AsRef<Path>>(path: P) -> FloodResult<(BinaryMask, GridGeometry)> {
        let path = path.as_ref();
        let dataset = Self::open(path)?;
        let (transform, crs) = Self::georeference(&dataset);

        let (width, height) = dataset.raster_size();
        let band = dataset.rasterband(1)?;
        let data = band.read_as::<u8>((0, 0), (width, height), (width, height), None)?;
        let mask = Array2::from_shape_vec((height, width), data.data)
            .map_err(|e| FloodError::InvalidFormat(format!("Failed to reshape mask data: {}", e)))?;

        Ok((mask, GridGeometry::new(height, width, transform, crs)))
    }

    fn open(path: &Path) -> FloodResult<Dataset> {
        if !path.exists() {
            return Err(FloodError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        Ok(Dataset::open(path)?)
    }

    fn georeference(dataset: &Dataset) -> (GeoTransform, Crs) {
        let transform = match dataset.geo_transform() {
            Ok(gt) => GeoTransform::from_gdal(gt),
            Err(e) => {
                log::warn!("No geotransform ({}); using pixel coordinates", e);
                GeoTransform::default()
            }
        };
        (transform, Crs::new(dataset.projection()))
    }

    fn read_band(dataset: &Dataset, index: usize) -> FloodResult<Array2<f32>> {
        let count = dataset.raster_count() as usize;
        if index == 0 || index > count {
            return Err(FloodError::InvalidFormat(format!(
                "Band {} requested but dataset has {} bands",
                index, count
            )));
        }

        let (width, height) = dataset.raster_size();
        let rasterband = dataset.rasterband(index as isize)?;
        let band_data = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

        Array2::from_shape_vec((height, width), band_data.data).map_err(|e| {
            FloodError::InvalidFormat(format!("Failed to reshape band {}: {}", index, e))
        })
    }
}
