use std::path::Path;

use super::engine::Raster;
use crate::errors::OutputError;
use crate::grid::to_latlon;

/// Writes every valid pixel of `raster` with its centre coordinate.
/// Returns the number of pixels written.
pub fn write_raster_csv(path: &Path, sensor: &str, raster: &Raster) -> Result<usize, OutputError> {
    let csv_error = |source| OutputError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut out_file = csv::Writer::from_path(path).map_err(csv_error)?;
    out_file
        .write_record(["sensor_name", "irow", "icol", "lat", "lon", "chlor_a"])
        .map_err(csv_error)?;

    let mut written = 0;
    for ((irow, icol), &value) in raster.grid.indexed_iter() {
        if value.is_nan() {
            continue;
        }
        let (lat, lon) = to_latlon(irow as i64, icol as i64, &raster.bounds, raster.shape);
        out_file
            .write_record([
                sensor.to_string(),
                irow.to_string(),
                icol.to_string(),
                lat.to_string(),
                lon.to_string(),
                value.to_string(),
            ])
            .map_err(csv_error)?;
        written += 1;
    }

    out_file.flush().map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(written)
}
