//! Conversion between geographic coordinates and pixel indices on a
//! fixed-bounds equirectangular grid.
//!
//! Row 0 is the northern edge of the grid and increasing rows move south;
//! column 0 is the western edge and increasing columns move east.
//!
//! [`to_pixel`] never clips: a coordinate outside the bounds produces an index
//! that is negative or past the end of the grid, and it is up to the caller to
//! check it against the [`GridShape`] before indexing.

use std::fmt;
use thiserror::Error;

use crate::bbox::GeoBounds;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("grid shape {rows}x{cols} has no pixels")]
    EmptyShape { rows: usize, cols: usize },
}

/// Number of rows (latitude bands) and columns (longitude bands) of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridShape {
    rows: usize,
    cols: usize,
}

impl GridShape {
    pub fn new(rows: usize, cols: usize) -> Result<Self, GridError> {
        if rows == 0 || cols == 0 {
            return Err(GridError::EmptyShape { rows, cols });
        }
        Ok(Self { rows, cols })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn contains(&self, index: PixelIndex) -> bool {
        index.irow >= 0
            && index.icol >= 0
            && (index.irow as u64) < self.rows as u64
            && (index.icol as u64) < self.cols as u64
    }

    /// Row-major position of `index`, or `None` when it falls outside the grid.
    pub fn flat_index(&self, index: PixelIndex) -> Option<usize> {
        self.contains(index)
            .then(|| index.irow as usize * self.cols + index.icol as usize)
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Unchecked pixel position. May be negative or past the end of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelIndex {
    pub irow: i64,
    pub icol: i64,
}

impl PixelIndex {
    pub fn new(irow: i64, icol: i64) -> Self {
        Self { irow, icol }
    }

    /// Both indices as `usize` when the pixel lies inside `shape`.
    pub fn checked(self, shape: GridShape) -> Option<(usize, usize)> {
        shape
            .contains(self)
            .then_some((self.irow as usize, self.icol as usize))
    }
}

/// Latitude and longitude size of one pixel, in degrees.
pub fn resolution(bounds: &GeoBounds, shape: GridShape) -> (f64, f64) {
    let lat_res = (bounds.north() - bounds.south()) / shape.rows() as f64;
    let lon_res = (bounds.east() - bounds.west()) / shape.cols() as f64;
    (lat_res, lon_res)
}

// Non-finite input saturates to i64::MIN/MAX, which is never inside a grid.
fn floor_index(position: f64) -> i64 {
    if position.is_nan() {
        return i64::MIN;
    }
    position.floor() as i64
}

/// Pixel containing (`lat`, `lon`).
pub fn to_pixel(lat: f64, lon: f64, bounds: &GeoBounds, shape: GridShape) -> PixelIndex {
    let (lat_res, lon_res) = resolution(bounds, shape);

    PixelIndex {
        irow: floor_index((bounds.north() - lat) / lat_res),
        icol: floor_index((lon - bounds.west()) / lon_res),
    }
}

/// Centre coordinate of pixel (`irow`, `icol`), returned as `(lat, lon)`.
pub fn to_latlon(irow: i64, icol: i64, bounds: &GeoBounds, shape: GridShape) -> (f64, f64) {
    let (lat_res, lon_res) = resolution(bounds, shape);

    let lat = bounds.north() - (irow as f64 * lat_res + lat_res / 2.0);
    let lon = bounds.west() + (icol as f64 * lon_res + lon_res / 2.0);
    (lat, lon)
}
