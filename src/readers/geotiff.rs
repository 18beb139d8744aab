use gdal::Dataset;
use log::debug;
use ndarray::Array3;
use std::path::PathBuf;

use super::{Data, DataReader, ProductRequest, ReadError};
use crate::bbox::{BoundsError, GeoBounds};
use crate::grid::GridShape;

pub struct GeoTiffReader {
    pub path: PathBuf,
}

/// Extent of a north-up raster. Rotated or south-up geotransforms give `None`
/// since row 0 would not be the northern edge.
fn geotransform_bounds(
    gt: &[f64; 6],
    width: usize,
    height: usize,
) -> Option<Result<GeoBounds, BoundsError>> {
    if gt[2] != 0.0 || gt[4] != 0.0 || gt[1] <= 0.0 || gt[5] >= 0.0 {
        return None;
    }

    let west = gt[0];
    let north = gt[3];
    let east = west + width as f64 * gt[1];
    let south = north + height as f64 * gt[5];
    Some(GeoBounds::new(north, south, east, west))
}

impl GeoTiffReader {
    fn gdal_error(&self, source: gdal::errors::GdalError) -> ReadError {
        ReadError::Gdal {
            path: self.path.clone(),
            source,
        }
    }

    fn read_bounds(
        &self,
        dataset: &Dataset,
        width: usize,
        height: usize,
    ) -> Option<Result<GeoBounds, BoundsError>> {
        let gt = dataset.geo_transform().ok()?;
        geotransform_bounds(&gt, width, height)
    }
}

impl DataReader for GeoTiffReader {
    fn read_data(&self, request: &ProductRequest) -> Result<Data, ReadError> {
        let dataset = Dataset::open(&self.path).map_err(|e| self.gdal_error(e))?;

        let (width, height) = dataset.raster_size();
        let layers = dataset.raster_count();
        GridShape::new(height, width).map_err(|source| ReadError::EmptyVariable {
            path: self.path.clone(),
            variable: request.product.clone(),
            source,
        })?;

        let mut values = Vec::with_capacity(layers * width * height);
        let mut mask = Vec::with_capacity(layers * width * height);
        let mut fill_value = None;

        for index in 1..=layers {
            let band = dataset.rasterband(index).map_err(|e| self.gdal_error(e))?;
            let buffer = band
                .read_as::<f64>((0, 0), (width, height), (width, height), None)
                .map_err(|e| self.gdal_error(e))?;

            let scale = band.scale().unwrap_or(1.0);
            let offset = band.offset().unwrap_or(0.0);
            let nodata = band.no_data_value();
            fill_value = fill_value.or(nodata);

            for &raw in buffer.data() {
                let invalid = nodata.is_some_and(|nd| raw == nd);
                values.push(if invalid { raw } else { raw * scale + offset });
                mask.push(invalid);
            }
        }

        let invalid_shape = || ReadError::InvalidShape {
            path: self.path.clone(),
            variable: request.product.clone(),
            ndim: 3,
        };
        let values =
            Array3::from_shape_vec((layers, height, width), values).map_err(|_| invalid_shape())?;
        let mask =
            Array3::from_shape_vec((layers, height, width), mask).map_err(|_| invalid_shape())?;

        debug!(
            "{}: read {} band(s) of {}x{}",
            self.path.display(),
            layers,
            height,
            width
        );

        Ok(Data {
            variable: request.product.clone(),
            values,
            fill_value,
            mask: Some(mask),
            bounds: self.read_bounds(&dataset, width, height),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_north_up_geotransform() {
        let gt = [-77.85, 0.0375, 0.0, 34.25, 0.0, -0.0375];
        let bounds = geotransform_bounds(&gt, 4, 4).unwrap().unwrap();

        assert_abs_diff_eq!(bounds.west(), -77.85, epsilon = 1e-12);
        assert_abs_diff_eq!(bounds.east(), -77.70, epsilon = 1e-12);
        assert_abs_diff_eq!(bounds.north(), 34.25, epsilon = 1e-12);
        assert_abs_diff_eq!(bounds.south(), 34.10, epsilon = 1e-12);
    }

    #[test]
    fn test_rotated_or_south_up_has_no_bounds() {
        let rotated = [-77.85, 0.0375, 0.001, 34.25, 0.0, -0.0375];
        assert!(geotransform_bounds(&rotated, 4, 4).is_none());

        let south_up = [-77.85, 0.0375, 0.0, 34.10, 0.0, 0.0375];
        assert!(geotransform_bounds(&south_up, 4, 4).is_none());
    }

    #[test]
    fn test_read_geotiff_bands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("LANDSAT8_OLI.20240507T154500.L2.OC.tif");
        {
            let driver = gdal::DriverManager::get_driver_by_name("GTiff").unwrap();
            let mut dataset = driver
                .create_with_band_type::<f64, _>(&path, 3, 2, 2)
                .unwrap();
            dataset
                .set_geo_transform(&[-77.85, 0.05, 0.0, 34.25, 0.0, -0.075])
                .unwrap();

            for (index, data) in [
                vec![2.0, 4.0, -9999.0, 6.0, 8.0, 10.0],
                vec![1.0, 1.0, 1.0, 1.0, 1.0, -9999.0],
            ]
            .into_iter()
            .enumerate()
            {
                let mut band = dataset.rasterband(index + 1).unwrap();
                band.set_no_data_value(Some(-9999.0)).unwrap();
                band.set_scale(0.5).unwrap();
                band.set_offset(1.0).unwrap();
                let mut buffer = gdal::raster::Buffer::new((3, 2), data);
                band.write((0, 0), (3, 2), &mut buffer).unwrap();
            }
        }

        let reader = GeoTiffReader { path: path.clone() };
        let data = reader
            .read_data(&ProductRequest::new("chlor_a", crate::readers::GroupLayout::Auto))
            .unwrap();

        assert_eq!(data.layers(), 2);
        assert_eq!(data.values.dim(), (2, 2, 3));
        assert_eq!(data.fill_value, Some(-9999.0));
        assert_abs_diff_eq!(data.values[[0, 0, 0]], 2.0);
        assert_abs_diff_eq!(data.values[[0, 1, 2]], 6.0);
        assert_abs_diff_eq!(data.values[[1, 0, 0]], 1.5);

        let mask = data.mask.unwrap();
        assert!(mask[[0, 0, 2]]);
        assert!(mask[[1, 1, 2]]);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 2);

        let bounds = data.bounds.unwrap().unwrap();
        assert_abs_diff_eq!(bounds.south(), 34.10, epsilon = 1e-12);
        assert_abs_diff_eq!(bounds.east(), -77.70, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_file_is_gdal_error() {
        let dir = tempfile::tempdir().unwrap();
        let reader = GeoTiffReader {
            path: dir.path().join("absent.tif"),
        };
        let result =
            reader.read_data(&ProductRequest::new("chlor_a", crate::readers::GroupLayout::Auto));
        assert!(matches!(result, Err(ReadError::Gdal { .. })));
    }
}
