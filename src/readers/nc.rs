use log::debug;
use ndarray::Array3;
use std::path::PathBuf;

use super::{Data, DataReader, GroupLayout, ProductRequest, ReadError};
use crate::bbox::{BoundsError, GeoBounds};
use crate::grid::GridShape;

/// Groups searched, in order, after the dataset root when no group is given.
const PRODUCT_GROUPS: &[&str] = &["geophysical_data", "Mapped_Data_and_Params"];
const NAVIGATION_GROUP: &str = "navigation_data";
const LATITUDE_NAMES: &[&str] = &["lat", "latitude"];
const LONGITUDE_NAMES: &[&str] = &["lon", "longitude"];

pub struct NcReader {
    pub path: PathBuf,
}

/// CF packing and validity attributes of a variable, in packed units.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Packing {
    fill_value: Option<f64>,
    scale_factor: f64,
    add_offset: f64,
    valid_min: Option<f64>,
    valid_max: Option<f64>,
}

impl Default for Packing {
    fn default() -> Self {
        Self {
            fill_value: None,
            scale_factor: 1.0,
            add_offset: 0.0,
            valid_min: None,
            valid_max: None,
        }
    }
}

impl Packing {
    fn from_variable(var: &netcdf::Variable) -> Self {
        Self {
            fill_value: f64_attribute(var, "_FillValue"),
            scale_factor: f64_attribute(var, "scale_factor").unwrap_or(1.0),
            add_offset: f64_attribute(var, "add_offset").unwrap_or(0.0),
            valid_min: f64_attribute(var, "valid_min"),
            valid_max: f64_attribute(var, "valid_max"),
        }
    }

    fn is_invalid(&self, raw: f64) -> bool {
        self.fill_value.is_some_and(|fill| raw == fill)
            || self.valid_min.is_some_and(|min| raw < min)
            || self.valid_max.is_some_and(|max| raw > max)
    }

    /// Builds the invalid-pixel mask and unpacks the remaining pixels. Masked
    /// pixels keep their raw value.
    fn apply(&self, mut raw: Vec<f64>) -> (Vec<f64>, Vec<bool>) {
        let mut mask = Vec::with_capacity(raw.len());
        for value in raw.iter_mut() {
            let invalid = self.is_invalid(*value);
            if !invalid {
                *value = *value * self.scale_factor + self.add_offset;
            }
            mask.push(invalid);
        }
        (raw, mask)
    }
}

fn has_attribute(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn f64_attribute(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attribute(var, name) {
        return None;
    }
    let value = var.attribute_value(name)?.ok()?;
    f64::try_from(value).ok()
}

/// Names tried for `product`: OBPG mapped files suffix the statistic
/// (`chlor_a-mean`), swath files do not.
fn candidate_names(product: &str) -> Vec<String> {
    match product.strip_suffix("-mean") {
        Some(plain) => vec![product.to_string(), plain.to_string()],
        None => vec![product.to_string(), format!("{product}-mean")],
    }
}

fn first_variable<'a>(
    lookup: impl Fn(&str) -> Option<netcdf::Variable<'a>>,
    names: &[String],
) -> Option<(String, netcdf::Variable<'a>)> {
    names
        .iter()
        .find_map(|name| lookup(name).map(|var| (name.clone(), var)))
}

/// Extent of coordinate arrays, ignoring fill values and anything outside
/// valid latitude/longitude ranges. `None` when no valid coordinate remains.
fn extent_bounds(lats: &[f64], lons: &[f64]) -> Option<Result<GeoBounds, BoundsError>> {
    let valid_lats = lats
        .iter()
        .copied()
        .filter(|v| (-90.0..=90.0).contains(v));
    let valid_lons = lons
        .iter()
        .copied()
        .filter(|v| (-180.0..=180.0).contains(v));

    let (south, north) = min_max(valid_lats)?;
    let (west, east) = min_max(valid_lons)?;
    Some(GeoBounds::new(north, south, east, west))
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn read_all(var: &netcdf::Variable) -> Option<Vec<f64>> {
    var.get_values::<f64, _>(..).ok()
}

struct RawProduct {
    variable: String,
    values: Array3<f64>,
    mask: Array3<bool>,
    fill_value: Option<f64>,
}

impl NcReader {
    fn netcdf_error(&self, source: netcdf::Error) -> ReadError {
        ReadError::NetCdf {
            path: self.path.clone(),
            source,
        }
    }

    fn read_variable(&self, name: &str, var: &netcdf::Variable) -> Result<RawProduct, ReadError> {
        let dims: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let (layers, rows, cols) = match dims.as_slice() {
            [rows, cols] => (1, *rows, *cols),
            [layers, rows, cols] => (*layers, *rows, *cols),
            _ => {
                return Err(ReadError::InvalidShape {
                    path: self.path.clone(),
                    variable: name.to_string(),
                    ndim: dims.len(),
                });
            }
        };
        GridShape::new(rows, cols).map_err(|source| ReadError::EmptyVariable {
            path: self.path.clone(),
            variable: name.to_string(),
            source,
        })?;

        let raw: Vec<f64> = var
            .get_values::<f64, _>(..)
            .map_err(|source| self.netcdf_error(source))?;

        let packing = Packing::from_variable(var);
        let (values, mask) = packing.apply(raw);

        let invalid_shape = || ReadError::InvalidShape {
            path: self.path.clone(),
            variable: name.to_string(),
            ndim: dims.len(),
        };
        let values =
            Array3::from_shape_vec((layers, rows, cols), values).map_err(|_| invalid_shape())?;
        let mask =
            Array3::from_shape_vec((layers, rows, cols), mask).map_err(|_| invalid_shape())?;

        Ok(RawProduct {
            variable: name.to_string(),
            values,
            mask,
            fill_value: packing.fill_value,
        })
    }

    fn coordinate(&self, file: &netcdf::File, names: &[&str]) -> Option<Vec<f64>> {
        if let Some(values) = names
            .iter()
            .find_map(|name| file.variable(name))
            .and_then(|var| read_all(&var))
        {
            return Some(values);
        }

        let group = file.group(NAVIGATION_GROUP).ok().flatten()?;
        names
            .iter()
            .find_map(|name| group.variable(name))
            .and_then(|var| read_all(&var))
    }

    fn read_bounds(&self, file: &netcdf::File) -> Option<Result<GeoBounds, BoundsError>> {
        let lats = self.coordinate(file, LATITUDE_NAMES)?;
        let lons = self.coordinate(file, LONGITUDE_NAMES)?;
        extent_bounds(&lats, &lons)
    }
}

impl DataReader for NcReader {
    fn read_data(&self, request: &ProductRequest) -> Result<Data, ReadError> {
        // The handle is closed when `file` drops, on every return path.
        let file = netcdf::open(&self.path).map_err(|source| self.netcdf_error(source))?;
        let names = candidate_names(&request.product);

        let locations: Vec<Option<&str>> = match &request.layout {
            GroupLayout::Root => vec![None],
            GroupLayout::Group(group) => vec![Some(group.as_str())],
            GroupLayout::Auto => std::iter::once(None)
                .chain(PRODUCT_GROUPS.iter().map(|g| Some(*g)))
                .collect(),
        };

        let mut searched = Vec::new();
        for location in locations {
            let found = match location {
                None => first_variable(|n| file.variable(n), &names)
                    .map(|(name, var)| self.read_variable(&name, &var)),
                Some(group_name) => {
                    let group = file
                        .group(group_name)
                        .map_err(|source| self.netcdf_error(source))?;
                    let Some(group) = group else {
                        if matches!(request.layout, GroupLayout::Group(_)) {
                            return Err(ReadError::GroupNotFound {
                                path: self.path.clone(),
                                group: group_name.to_string(),
                            });
                        }
                        continue;
                    };
                    first_variable(|n| group.variable(n), &names)
                        .map(|(name, var)| self.read_variable(&name, &var))
                }
            };

            let Some(product) = found else {
                searched.push(location.unwrap_or("/").to_string());
                continue;
            };
            let product = product?;

            debug!(
                "{}: read '{}' from {}",
                self.path.display(),
                product.variable,
                location.unwrap_or("/")
            );

            return Ok(Data {
                variable: product.variable,
                values: product.values,
                fill_value: product.fill_value,
                mask: Some(product.mask),
                bounds: self.read_bounds(&file),
            });
        }

        Err(ReadError::ProductNotFound {
            path: self.path.clone(),
            product: request.product.clone(),
            searched: searched.join(", "),
        })
    }
}
