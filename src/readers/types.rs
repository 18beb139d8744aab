use ndarray::{Array2, Array3, Axis};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::bbox::{BoundsError, GeoBounds};
use crate::fill::MaskShapeError;
use crate::grid::{GridError, GridShape};

pub trait DataReader {
    fn read_data(&self, request: &ProductRequest) -> Result<Data, ReadError>;
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("NetCDF error in {path}: {source}")]
    NetCdf {
        path: PathBuf,
        #[source]
        source: netcdf::Error,
    },
    #[error("GDAL error in {path}: {source}")]
    Gdal {
        path: PathBuf,
        #[source]
        source: gdal::errors::GdalError,
    },
    #[error("group '{group}' not found in {path}")]
    GroupNotFound { path: PathBuf, group: String },
    #[error("product '{product}' not found in {path} (searched {searched})")]
    ProductNotFound {
        path: PathBuf,
        product: String,
        searched: String,
    },
    #[error("variable '{variable}' in {path} has {ndim} dimensions, expected 2 or 3")]
    InvalidShape {
        path: PathBuf,
        variable: String,
        ndim: usize,
    },
    #[error("variable '{variable}' in {path} is empty: {source}")]
    EmptyVariable {
        path: PathBuf,
        variable: String,
        #[source]
        source: GridError,
    },
    #[error("layer {layer} requested from '{variable}', which has {layers} layer(s)")]
    MissingLayer {
        variable: String,
        layer: usize,
        layers: usize,
    },
    #[error("invalid coordinate extent in {path}: {source}")]
    Bounds {
        path: PathBuf,
        #[source]
        source: BoundsError,
    },
    #[error(transparent)]
    MaskShape(#[from] MaskShapeError),
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(PathBuf),
    #[error("invalid file pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("no file matches '{0}'")]
    NoMatchingFile(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    GeoTiff,
    NetCDF,
}

/// Where a product variable is looked up inside a NetCDF file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GroupLayout {
    /// Dataset root first, then the groups OBPG products are known to use.
    #[default]
    Auto,
    Root,
    Group(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRequest {
    pub product: String,
    pub layout: GroupLayout,
}

impl ProductRequest {
    pub fn new(product: impl Into<String>, layout: GroupLayout) -> Self {
        Self {
            product: product.into(),
            layout,
        }
    }
}

/// A product read from disk: `values` is indexed `(layer, row, col)`, a plain
/// 2-D product has a single layer.
#[derive(Debug, Clone)]
pub struct Data {
    pub variable: String,
    pub values: Array3<f64>,
    pub fill_value: Option<f64>,
    /// `true` where the file itself marks a pixel invalid.
    pub mask: Option<Array3<bool>>,
    /// Extent from the file's own coordinates: `None` when it has none,
    /// an error when they do not describe a usable grid.
    pub bounds: Option<Result<GeoBounds, BoundsError>>,
}

impl Data {
    /// Single-layer product without mask, fill attribute or file bounds.
    pub fn from_grid(variable: impl Into<String>, grid: Array2<f64>) -> Self {
        Self {
            variable: variable.into(),
            values: grid.insert_axis(Axis(0)),
            fill_value: None,
            mask: None,
            bounds: None,
        }
    }

    pub fn layers(&self) -> usize {
        self.values.len_of(Axis(0))
    }

    pub fn shape(&self) -> Result<GridShape, GridError> {
        let (_, rows, cols) = self.values.dim();
        GridShape::new(rows, cols)
    }

    /// Copy of one layer together with its mask, if any.
    pub fn layer(&self, index: usize) -> Option<(Array2<f64>, Option<Array2<bool>>)> {
        if index >= self.layers() {
            return None;
        }
        let values = self.values.index_axis(Axis(0), index).to_owned();
        let mask = self
            .mask
            .as_ref()
            .map(|mask| mask.index_axis(Axis(0), index).to_owned());
        Some((values, mask))
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (layers, height, width) = self.values.dim();
        let min_value = self
            .values
            .iter()
            .copied()
            .filter(|x| !x.is_nan())
            .fold(f64::NAN, f64::min);
        let max_value = self
            .values
            .iter()
            .copied()
            .filter(|x| !x.is_nan())
            .fold(f64::NAN, f64::max);

        write!(
            f,
            "Variable: {}\nLayers: {}\nWidth: {}\nHeight: {}\nMin value: {}\nMax value: {}",
            self.variable, layers, width, height, min_value, max_value,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_from_grid_has_one_layer() {
        let data = Data::from_grid("chlor_a", array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(data.layers(), 1);

        let shape = data.shape().unwrap();
        assert_eq!((shape.rows(), shape.cols()), (2, 3));

        let (layer, mask) = data.layer(0).unwrap();
        assert_eq!(layer[[1, 2]], 6.0);
        assert!(mask.is_none());
        assert!(data.layer(1).is_none());
    }

    #[test]
    fn test_display_ignores_nan() {
        let data = Data::from_grid("chlor_a", array![[f64::NAN, 2.0], [0.5, f64::NAN]]);
        let text = data.to_string();
        assert!(text.contains("Min value: 0.5"));
        assert!(text.contains("Max value: 2"));
    }
}
