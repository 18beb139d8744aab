//! NaN-aware window means over matched pixels.
//!
//! Each sensor's matches are scattered onto a dense grid, smoothed with a
//! `w x w` mean that ignores NaN cells, and read back at every row's pixel.
//! A second grid holds the in-situ chlorophyll binned per pixel so both sides
//! of the comparison are averaged over the same footprint.

use ndarray::Array2;

use super::engine::SensorMatch;
use crate::config::GridSource;
use crate::grid::{GridShape, PixelIndex};
use crate::insitu::{InSituTable, RowId};

/// Mean of the non-NaN cells in the `window x window` block around each cell.
///
/// The block spans offsets `-(window / 2)` to `window - window / 2 - 1` on both
/// axes, so an even window leans towards the top-left. Cells beyond the grid
/// edges count as NaN. A block with no valid cell gives NaN, and a window of 1
/// returns the grid unchanged.
pub fn nan_mean_filter(grid: &Array2<f64>, window: usize) -> Array2<f64> {
    if window <= 1 {
        return grid.clone();
    }

    let (rows, cols) = grid.dim();
    let before = (window / 2) as isize;
    let after = (window - window / 2 - 1) as isize;

    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let r0 = (r as isize - before).max(0) as usize;
        let r1 = (r as isize + after).min(rows as isize - 1) as usize;
        let c0 = (c as isize - before).max(0) as usize;
        let c1 = (c as isize + after).min(cols as isize - 1) as usize;

        let mut sum = 0.0;
        let mut count = 0usize;
        for rr in r0..=r1 {
            for cc in c0..=c1 {
                let v = grid[[rr, cc]];
                if !v.is_nan() {
                    sum += v;
                    count += 1;
                }
            }
        }

        if count == 0 { f64::NAN } else { sum / count as f64 }
    })
}

/// Aggregated columns for one window size, one value per in-situ row.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowColumns {
    pub window: usize,
    pub satellite: Vec<(RowId, f64)>,
    pub insitu: Vec<(RowId, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorAggregation {
    pub sensor: String,
    pub windows: Vec<WindowColumns>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowAggregator {
    window_sizes: Vec<usize>,
    grid_source: GridSource,
}

impl WindowAggregator {
    pub fn new(window_sizes: Vec<usize>, grid_source: GridSource) -> Self {
        Self {
            window_sizes,
            grid_source,
        }
    }

    /// Extent of the grid spanned by the in-bounds matches.
    fn matched_extent(sensor_match: &SensorMatch) -> Option<GridShape> {
        let (max_irow, max_icol) = sensor_match
            .matches
            .iter()
            .filter_map(|m| m.index)
            .fold(None, |acc: Option<(i64, i64)>, index| match acc {
                Some((r, c)) => Some((r.max(index.irow), c.max(index.icol))),
                None => Some((index.irow, index.icol)),
            })?;
        GridShape::new(max_irow as usize + 1, max_icol as usize + 1).ok()
    }

    /// Satellite grid and its shape, per the configured grid source.
    fn satellite_grid(&self, sensor_match: &SensorMatch) -> Option<(Array2<f64>, GridShape)> {
        match self.grid_source {
            GridSource::Raster => sensor_match
                .raster
                .as_ref()
                .map(|raster| (raster.grid.clone(), raster.shape)),
            GridSource::MatchedPoints => {
                let shape = Self::matched_extent(sensor_match)?;
                let mut grid = Array2::from_elem((shape.rows(), shape.cols()), f64::NAN);
                for m in &sensor_match.matches {
                    if let Some((irow, icol)) = m.index.and_then(|index| index.checked(shape)) {
                        grid[[irow, icol]] = m.value;
                    }
                }
                Some((grid, shape))
            }
        }
    }

    /// Mean in-situ chlorophyll of the rows falling in each pixel.
    fn insitu_grid(
        sensor_match: &SensorMatch,
        table: &InSituTable,
        shape: GridShape,
    ) -> Array2<f64> {
        let mut sums = Array2::<f64>::zeros((shape.rows(), shape.cols()));
        let mut counts = Array2::<usize>::zeros((shape.rows(), shape.cols()));

        for m in &sensor_match.matches {
            let Some((irow, icol)) = m.index.and_then(|index| index.checked(shape)) else {
                continue;
            };
            let chl = table.get(m.row_id).map_or(f64::NAN, |r| r.chlor_a());
            if !chl.is_nan() {
                sums[[irow, icol]] += chl;
                counts[[irow, icol]] += 1;
            }
        }

        ndarray::Zip::from(&sums)
            .and(&counts)
            .map_collect(|&sum, &count| if count == 0 { f64::NAN } else { sum / count as f64 })
    }

    fn lookup(grid: &Array2<f64>, shape: GridShape, index: Option<PixelIndex>) -> f64 {
        index
            .and_then(|index| index.checked(shape))
            .and_then(|position| grid.get(position).copied())
            .unwrap_or(f64::NAN)
    }

    pub fn aggregate(&self, sensor_match: &SensorMatch, table: &InSituTable) -> SensorAggregation {
        let grids = self.satellite_grid(sensor_match).map(|(satellite, shape)| {
            let insitu = Self::insitu_grid(sensor_match, table, shape);
            (satellite, insitu, shape)
        });

        let windows = self
            .window_sizes
            .iter()
            .map(|&window| {
                let (satellite, insitu) = match &grids {
                    Some((satellite_grid, insitu_grid, shape)) => {
                        let satellite_grid = nan_mean_filter(satellite_grid, window);
                        let insitu_grid = nan_mean_filter(insitu_grid, window);
                        sensor_match
                            .matches
                            .iter()
                            .map(|m| {
                                (
                                    (m.row_id, Self::lookup(&satellite_grid, *shape, m.index)),
                                    (m.row_id, Self::lookup(&insitu_grid, *shape, m.index)),
                                )
                            })
                            .unzip()
                    }
                    None => sensor_match
                        .matches
                        .iter()
                        .map(|m| ((m.row_id, f64::NAN), (m.row_id, f64::NAN)))
                        .unzip(),
                };

                WindowColumns {
                    window,
                    satellite,
                    insitu,
                }
            })
            .collect();

        SensorAggregation {
            sensor: sensor_match.sensor.clone(),
            windows,
        }
    }
}
