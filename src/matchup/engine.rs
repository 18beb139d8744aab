use log::{debug, info, warn};
use ndarray::Array2;
use rayon::prelude::*;

use crate::bbox::GeoBounds;
use crate::config::{BoundsMode, Config, SensorConfig};
use crate::fill::FillValueNormalizer;
use crate::grid::{GridShape, PixelIndex, to_pixel};
use crate::insitu::{InSituTable, RowId};
use crate::readers::{
    Data, ProductRequest, ReadError, parse_product_filename, read_product, resolve_path,
};
use crate::sat_bands::{SatBands, Satellites};
use crate::utils::RasterSummary;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchupSettings {
    pub bounds_mode: BoundsMode,
    pub fixed_bounds: GeoBounds,
    pub fill_value: f64,
    /// Keep each sensor's normalized raster after matching.
    pub keep_raster: bool,
}

impl MatchupSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            bounds_mode: config.bounds_mode(),
            fixed_bounds: *config.bounds(),
            fill_value: config.fill_value(),
            keep_raster: config.export_rasters()
                || config.grid_source() == crate::config::GridSource::Raster,
        }
    }
}

/// Result for one in-situ row. `index` is `None` when the row is out of the
/// raster or could not be matched at all; `value` is NaN in both cases and
/// also for in-bounds pixels without valid data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelMatch {
    pub row_id: RowId,
    pub index: Option<PixelIndex>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub grid: Array2<f64>,
    pub bounds: GeoBounds,
    pub shape: GridShape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorStatus {
    Matched,
    /// The product could not be read; every row carries NaN.
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorMatch {
    pub sensor: String,
    pub status: SensorStatus,
    /// One entry per in-situ row, in row id order.
    pub matches: Vec<PixelMatch>,
    /// In bounds with a valid pixel value.
    pub matched: usize,
    /// In bounds, but the pixel is fill or masked.
    pub filled: usize,
    pub out_of_bounds: usize,
    /// Malformed rows, never indexed.
    pub excluded: usize,
    pub raster: Option<Raster>,
}

impl SensorMatch {
    pub fn is_available(&self) -> bool {
        self.status == SensorStatus::Matched
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MatchupEngine {
    settings: MatchupSettings,
}

impl MatchupEngine {
    pub fn new(settings: MatchupSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MatchupSettings {
        &self.settings
    }

    /// All-NaN result for a sensor whose product could not be read.
    pub fn unavailable(sensor: &str, table: &InSituTable, reason: String) -> SensorMatch {
        let matches = table
            .records()
            .iter()
            .map(|record| PixelMatch {
                row_id: record.row_id,
                index: None,
                value: f64::NAN,
            })
            .collect();

        SensorMatch {
            sensor: sensor.to_string(),
            status: SensorStatus::Unavailable(reason),
            matches,
            matched: 0,
            filled: 0,
            out_of_bounds: 0,
            excluded: table.malformed_count(),
            raster: None,
        }
    }

    /// Bounds to index `data` with. In per-file mode a product without
    /// coordinates falls back to the fixed bounds, but coordinates that
    /// describe no usable grid are an error.
    fn bounds_for(&self, sensor: &SensorConfig, data: &Data) -> Result<GeoBounds, ReadError> {
        match (self.settings.bounds_mode, &data.bounds) {
            (BoundsMode::Fixed, _) => Ok(self.settings.fixed_bounds),
            (BoundsMode::PerFile, Some(Ok(bounds))) => Ok(*bounds),
            (BoundsMode::PerFile, Some(Err(e))) => Err(ReadError::Bounds {
                path: sensor.path.clone().into(),
                source: e.clone(),
            }),
            (BoundsMode::PerFile, None) => {
                info!(
                    "{}: product has no coordinate extent, using fixed bounds {}",
                    sensor.name, self.settings.fixed_bounds
                );
                Ok(self.settings.fixed_bounds)
            }
        }
    }

    /// Normalizes one product layer and looks up every in-situ row in it.
    pub fn match_product(
        &self,
        sensor: &SensorConfig,
        data: Data,
        table: &InSituTable,
    ) -> Result<SensorMatch, ReadError> {
        let (mut grid, mask) = data.layer(sensor.layer).ok_or_else(|| ReadError::MissingLayer {
            variable: data.variable.clone(),
            layer: sensor.layer,
            layers: data.layers(),
        })?;

        let (rows, cols) = grid.dim();
        let shape = GridShape::new(rows, cols).map_err(|source| ReadError::EmptyVariable {
            path: sensor.path.clone().into(),
            variable: data.variable.clone(),
            source,
        })?;

        // Explicit override, then the file's own attribute, then the default sentinel
        let fill_value = sensor
            .fill_value
            .or(data.fill_value)
            .unwrap_or(self.settings.fill_value);
        let normalizer = FillValueNormalizer::new(fill_value);
        match &mask {
            Some(mask) => normalizer.normalize_masked(&mut grid, mask)?,
            None => normalizer.normalize(&mut grid),
        };

        let bounds = self.bounds_for(sensor, &data)?;

        let mut result = SensorMatch {
            sensor: sensor.name.clone(),
            status: SensorStatus::Matched,
            matches: Vec::with_capacity(table.len()),
            matched: 0,
            filled: 0,
            out_of_bounds: 0,
            excluded: 0,
            raster: None,
        };

        for record in table.records() {
            let mut pixel = PixelMatch {
                row_id: record.row_id,
                index: None,
                value: f64::NAN,
            };

            if !record.is_matchable() {
                result.excluded += 1;
            } else {
                let index = to_pixel(record.lat, record.lon, &bounds, shape);
                match index.checked(shape) {
                    Some((irow, icol)) => {
                        pixel.index = Some(index);
                        pixel.value = grid[[irow, icol]];
                        if pixel.value.is_nan() {
                            result.filled += 1;
                        } else {
                            result.matched += 1;
                        }
                    }
                    None => result.out_of_bounds += 1,
                }
            }

            result.matches.push(pixel);
        }

        info!(
            "{}: {} '{}' [{}], bounds {}, {} matched, {} fill, {} out of bounds, {} excluded",
            sensor.name,
            shape,
            data.variable,
            RasterSummary::from_values(grid.iter().copied()),
            bounds,
            result.matched,
            result.filled,
            result.out_of_bounds,
            result.excluded
        );

        if self.settings.keep_raster {
            result.raster = Some(Raster {
                grid,
                bounds,
                shape,
            });
        }

        Ok(result)
    }

    /// Matches every sensor, in parallel. A sensor whose product cannot be
    /// loaded or matched yields an all-NaN result; the others are unaffected.
    /// Results come back in the order of `sensors`.
    pub fn run<F>(
        &self,
        sensors: &[SensorConfig],
        table: &InSituTable,
        load: F,
    ) -> Vec<SensorMatch>
    where
        F: Fn(&SensorConfig) -> Result<Data, ReadError> + Sync,
    {
        sensors
            .par_iter()
            .map(|sensor| {
                let result = load(sensor).and_then(|data| self.match_product(sensor, data, table));
                match result {
                    Ok(sensor_match) => sensor_match,
                    Err(e) => {
                        warn!(
                            "{}: product '{}' unavailable from {}: {}",
                            sensor.name, sensor.product, sensor.path, e
                        );
                        Self::unavailable(&sensor.name, table, e.to_string())
                    }
                }
            })
            .collect()
    }
}

/// Resolves the configured path, adapts `Rrs_<nm>` product names to the
/// sensor's nearest band and reads the product from disk.
pub fn load_from_disk(sensor: &SensorConfig) -> Result<Data, ReadError> {
    let path = resolve_path(&sensor.path)?;
    let mut request = sensor.request();

    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    match parse_product_filename(name) {
        Ok(parsed) => {
            debug!("{}: {} is {}", sensor.name, path.display(), parsed.identity());
            if let Some(satellite) = Satellites::from_identity(parsed.identity()) {
                let product = SatBands::new(satellite).resolve_product_name(&request.product);
                if product != request.product {
                    debug!(
                        "{}: '{}' resolved to {} band '{}'",
                        sensor.name, request.product, satellite, product
                    );
                }
                request = ProductRequest::new(product, request.layout);
            }
        }
        Err(e) => debug!("{}: {}", sensor.name, e),
    }

    read_product(path, &request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insitu::InSituRecord;
    use ndarray::array;

    fn study_site() -> GeoBounds {
        GeoBounds::new(34.25, 34.10, -77.70, -77.85).unwrap()
    }

    fn settings() -> MatchupSettings {
        MatchupSettings {
            bounds_mode: BoundsMode::Fixed,
            fixed_bounds: study_site(),
            fill_value: -32767.0,
            keep_raster: false,
        }
    }

    fn sensor(name: &str) -> SensorConfig {
        SensorConfig {
            name: name.to_string(),
            path: format!("{name}.nc"),
            product: "chlor_a".to_string(),
            group: None,
            layer: 0,
            fill_value: None,
        }
    }

    fn table(points: &[(f64, f64)]) -> InSituTable {
        let records = points
            .iter()
            .map(|&(lat, lon)| InSituRecord::at(lat, lon))
            .collect();
        InSituTable::from_records(records, vec![])
    }

    fn four_by_four() -> Data {
        Data::from_grid(
            "chlor_a",
            array![
                [0.1, 0.2, 0.3, 0.4],
                [0.5, 2.5, 2.5, 0.8],
                [0.9, 2.5, 2.5, -32767.0],
                [1.3, 1.4, 1.5, 1.6]
            ],
        )
    }

    #[test]
    fn test_center_point_and_far_point() {
        let (lat, lon) = study_site().center();
        // 1000 km is about 9 degrees of latitude
        let table = table(&[(lat, lon), (lat - 9.0, lon)]);

        let engine = MatchupEngine::new(settings());
        let result = engine
            .match_product(&sensor("hawkeye"), four_by_four(), &table)
            .unwrap();

        // the exact centre sits on the corner shared by the four central pixels
        let index = result.matches[0].index.unwrap();
        assert!((1..=2).contains(&index.irow) && (1..=2).contains(&index.icol));
        assert_eq!(result.matches[0].value, 2.5);

        assert_eq!(result.matches[1].index, None);
        assert!(result.matches[1].value.is_nan());
        assert_eq!((result.matched, result.out_of_bounds), (1, 1));
    }

    #[test]
    fn test_out_of_bounds_row_is_nan() {
        let grid = Array2::from_elem((10, 10), 1.0);
        // maps to irow 15 on a 10x10 grid
        let table = table(&[(34.10 - 0.0775, -77.80), (34.2, -77.8)]);

        let engine = MatchupEngine::new(settings());
        let result = engine
            .match_product(&sensor("modisa"), Data::from_grid("chlor_a", grid), &table)
            .unwrap();

        assert_eq!(result.matches[0].index, None);
        assert!(result.matches[0].value.is_nan());
        assert_eq!(result.matches[1].value, 1.0);
        assert_eq!(result.out_of_bounds, 1);
    }

    #[test]
    fn test_fill_pixel_keeps_index() {
        // pixel (2, 3) holds the fill value
        let table = table(&[(34.14, -77.71)]);

        let engine = MatchupEngine::new(settings());
        let result = engine
            .match_product(&sensor("s3a"), four_by_four(), &table)
            .unwrap();

        assert_eq!(result.matches[0].index, Some(PixelIndex::new(2, 3)));
        assert!(result.matches[0].value.is_nan());
        assert_eq!(result.filled, 1);
    }

    #[test]
    fn test_fill_value_priority() {
        let table = table(&[(34.24, -77.84)]);
        let engine = MatchupEngine::new(settings());

        let mut data = Data::from_grid("chlor_a", Array2::from_elem((4, 4), -999.0));
        data.fill_value = Some(-999.0);
        let result = engine.match_product(&sensor("a"), data.clone(), &table).unwrap();
        assert!(result.matches[0].value.is_nan());

        // an explicit sensor override wins over the file attribute
        let mut overridden = sensor("a");
        overridden.fill_value = Some(-1.0);
        let result = engine.match_product(&overridden, data, &table).unwrap();
        assert_eq!(result.matches[0].value, -999.0);
    }

    #[test]
    fn test_per_file_bounds() {
        let mut data = Data::from_grid("chlor_a", array![[1.0, 2.0], [3.0, 4.0]]);
        data.bounds = Some(GeoBounds::new(35.0, 34.0, -77.0, -78.0));
        let table = table(&[(34.9, -77.1)]);

        let mut per_file = settings();
        per_file.bounds_mode = BoundsMode::PerFile;

        let result = MatchupEngine::new(per_file)
            .match_product(&sensor("oli"), data.clone(), &table)
            .unwrap();
        assert_eq!(result.matches[0].value, 2.0);

        // the same point is outside the fixed study site
        let result = MatchupEngine::new(settings())
            .match_product(&sensor("oli"), data, &table)
            .unwrap();
        assert!(result.matches[0].value.is_nan());
        assert_eq!(result.out_of_bounds, 1);
    }

    #[test]
    fn test_degenerate_file_extent_makes_sensor_unavailable() {
        let (lat, lon) = study_site().center();
        let table = table(&[(lat, lon), (34.24, -77.84)]);
        let sensors = vec![sensor("hawkeye")];

        let mut per_file = settings();
        per_file.bounds_mode = BoundsMode::PerFile;

        // every latitude of the file is the same
        let load = |_: &SensorConfig| -> Result<Data, ReadError> {
            let mut data = four_by_four();
            data.bounds = Some(GeoBounds::new(34.2, 34.2, -77.70, -77.85));
            Ok(data)
        };

        let results = MatchupEngine::new(per_file).run(&sensors, &table, load);
        assert!(matches!(results[0].status, SensorStatus::Unavailable(_)));
        assert!(results[0].matches.iter().all(|m| m.index.is_none() && m.value.is_nan()));
        assert_eq!(results[0].matched, 0);

        let err = MatchupEngine::new(per_file)
            .match_product(&sensors[0], load(&sensors[0]).unwrap(), &table)
            .unwrap_err();
        assert!(matches!(
            err,
            ReadError::Bounds {
                source: crate::bbox::BoundsError::Degenerate { .. },
                ..
            }
        ));

        // fixed mode never looks at the file extent
        let results = MatchupEngine::new(settings()).run(&sensors, &table, load);
        assert!(results[0].is_available());
        assert_eq!(results[0].matches[0].value, 2.5);
    }

    #[test]
    fn test_missing_file_extent_falls_back_to_fixed_bounds() {
        let mut per_file = settings();
        per_file.bounds_mode = BoundsMode::PerFile;

        let result = MatchupEngine::new(per_file)
            .match_product(&sensor("s3b"), four_by_four(), &table(&[(34.24, -77.84)]))
            .unwrap();
        assert_eq!(result.matches[0].index, Some(PixelIndex::new(0, 0)));
        assert_eq!(result.matches[0].value, 0.1);
    }

    #[test]
    fn test_malformed_rows_are_excluded() {
        let mut records = vec![InSituRecord::at(34.2, -77.8), InSituRecord::at(34.2, -77.8)];
        records[1].malformed = true;
        let table = InSituTable::from_records(records, vec![]);

        let result = MatchupEngine::new(settings())
            .match_product(&sensor("a"), four_by_four(), &table)
            .unwrap();
        assert_eq!(result.excluded, 1);
        assert_eq!(result.matches[1].index, None);
        assert_eq!(result.matches.len(), 2);
    }

    #[test]
    fn test_missing_sensor_does_not_affect_others() {
        let (lat, lon) = study_site().center();
        let table = table(&[(lat, lon), (34.24, -77.84)]);
        let sensors = vec![sensor("missing"), sensor("present")];

        let engine = MatchupEngine::new(settings());
        let results = engine.run(&sensors, &table, |s| {
            if s.name == "missing" {
                Err(ReadError::ProductNotFound {
                    path: s.path.clone().into(),
                    product: s.product.clone(),
                    searched: "/".to_string(),
                })
            } else {
                Ok(four_by_four())
            }
        });

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].sensor, "missing");
        assert!(!results[0].is_available());
        assert!(results[0].matches.iter().all(|m| m.value.is_nan() && m.index.is_none()));

        assert!(results[1].is_available());
        assert_eq!(results[1].matches[0].value, 2.5);
        assert_eq!(results[1].matches[1].value, 0.1);
    }

    #[test]
    fn test_missing_layer() {
        let mut layered = sensor("a");
        layered.layer = 2;
        let err = MatchupEngine::new(settings())
            .match_product(&layered, four_by_four(), &table(&[(34.2, -77.8)]))
            .unwrap_err();
        assert!(matches!(err, ReadError::MissingLayer { layers: 1, .. }));
    }

    #[test]
    fn test_keep_raster() {
        let mut keep = settings();
        keep.keep_raster = true;
        let result = MatchupEngine::new(keep)
            .match_product(&sensor("a"), four_by_four(), &table(&[]))
            .unwrap();

        let raster = result.raster.unwrap();
        assert_eq!(raster.shape, GridShape::new(4, 4).unwrap());
        assert!(raster.grid[[2, 3]].is_nan());
    }
}
