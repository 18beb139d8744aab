use log::{info, warn};
use std::fmt;
use std::fs;
use std::path::PathBuf;

use super::aggregate::WindowAggregator;
use super::engine::{MatchupEngine, MatchupSettings, SensorMatch, load_from_disk};
use super::export::write_raster_csv;
use super::table::MatchedTable;
use crate::config::{Config, SensorConfig};
use crate::errors::{OutputError, PipelineError};
use crate::insitu::{InSituTable, ingest};
use crate::readers::{Data, ReadError};
use crate::stats::{compute_statistics, window_label, write_statistics_csv};

pub const MATCHED_FILE: &str = "matched.csv";
pub const STATISTICS_FILE: &str = "statistics.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorSummary {
    pub sensor: String,
    pub available: bool,
    pub matched: usize,
    pub filled: usize,
    pub out_of_bounds: usize,
    pub excluded: usize,
}

impl From<&SensorMatch> for SensorSummary {
    fn from(sensor_match: &SensorMatch) -> Self {
        Self {
            sensor: sensor_match.sensor.clone(),
            available: sensor_match.is_available(),
            matched: sensor_match.matched,
            filled: sensor_match.filled,
            out_of_bounds: sensor_match.out_of_bounds,
            excluded: sensor_match.excluded,
        }
    }
}

impl fmt::Display for SensorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.available {
            return write!(f, "{}: unavailable", self.sensor);
        }
        write!(
            f,
            "{}: {} matched, {} fill, {} out of bounds, {} excluded",
            self.sensor, self.matched, self.filled, self.out_of_bounds, self.excluded
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub rows: usize,
    pub sensors: Vec<SensorSummary>,
    pub statistics_rows: usize,
    pub outputs: Vec<PathBuf>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in-situ rows, {} sensor(s), {} statistics row(s)",
            self.rows,
            self.sensors.len(),
            self.statistics_rows
        )?;
        for sensor in &self.sensors {
            write!(f, "\n  {sensor}")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct BatchProcessor {
    config: Config,
}

impl BatchProcessor {
    pub fn new(config: Config) -> Self {
        BatchProcessor { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the whole matchup, reading each product from disk.
    pub fn process(&self) -> Result<RunSummary, PipelineError> {
        self.process_with(load_from_disk)
    }

    /// Runs the whole matchup with `load` providing each sensor's product.
    pub fn process_with<F>(&self, load: F) -> Result<RunSummary, PipelineError>
    where
        F: Fn(&SensorConfig) -> Result<Data, ReadError> + Sync,
    {
        let ingested = ingest(self.config.insitu())?;
        let qc = ingested.total_qc();
        info!(
            "QC: {} timing gap, {} range, {} spike flag(s), {} point(s) removed",
            qc.timing_gap_flags, qc.range_flags, qc.spike_flags, qc.total_points_removed
        );

        let table = ingested.table;
        let engine = MatchupEngine::new(MatchupSettings::from_config(&self.config));
        let matches = engine.run(self.config.sensors(), &table, load);

        let matched = self.merge(table, &matches);

        let output_directory = self.config.output_directory();
        fs::create_dir_all(output_directory).map_err(|source| OutputError::Directory {
            path: output_directory.to_path_buf(),
            source,
        })?;

        let mut outputs = Vec::new();

        let matched_path = output_directory.join(MATCHED_FILE);
        matched.write_csv(&matched_path)?;
        outputs.push(matched_path);

        let sensors: Vec<String> = matches.iter().map(|m| m.sensor.clone()).collect();
        let statistics = compute_statistics(
            &matched,
            &sensors,
            self.config.window_sizes(),
            self.config.depth_ranges(),
        )?;
        let statistics_path = output_directory.join(STATISTICS_FILE);
        write_statistics_csv(&statistics_path, &statistics)?;
        outputs.push(statistics_path);

        if self.config.export_rasters() {
            for sensor_match in &matches {
                let Some(raster) = &sensor_match.raster else {
                    continue;
                };
                let path = output_directory.join(format!("{}_pixels.csv", sensor_match.sensor));
                let written = write_raster_csv(&path, &sensor_match.sensor, raster)?;
                info!(
                    "{}: exported {} pixel(s) to {}",
                    sensor_match.sensor,
                    written,
                    path.display()
                );
                outputs.push(path);
            }
        }

        let summary = RunSummary {
            rows: matched.insitu().len(),
            sensors: matches.iter().map(SensorSummary::from).collect(),
            statistics_rows: statistics.len(),
            outputs,
        };

        for sensor in &summary.sensors {
            if sensor.available {
                info!("{sensor}");
            } else {
                warn!("{sensor}");
            }
        }

        Ok(summary)
    }

    /// Joins every sensor's matchup and aggregation columns onto the table.
    fn merge(&self, table: InSituTable, matches: &[SensorMatch]) -> MatchedTable {
        let aggregator = WindowAggregator::new(
            self.config.window_sizes().to_vec(),
            self.config.grid_source(),
        );

        let aggregations: Vec<_> = matches
            .iter()
            .map(|sensor_match| aggregator.aggregate(sensor_match, &table))
            .collect();

        let mut matched = MatchedTable::new(table);
        for (sensor_match, aggregation) in matches.iter().zip(aggregations) {
            let sensor = &sensor_match.sensor;
            let nan_or = |value: Option<i64>| value.map_or(f64::NAN, |v| v as f64);

            matched.add_column(
                format!("{sensor}_irow"),
                sensor_match
                    .matches
                    .iter()
                    .map(|m| (m.row_id, nan_or(m.index.map(|i| i.irow)))),
            );
            matched.add_column(
                format!("{sensor}_icol"),
                sensor_match
                    .matches
                    .iter()
                    .map(|m| (m.row_id, nan_or(m.index.map(|i| i.icol)))),
            );
            matched.add_column(
                format!("{sensor}_chl"),
                sensor_match.matches.iter().map(|m| (m.row_id, m.value)),
            );

            for window in aggregation.windows {
                let label = window_label(window.window);
                matched.add_column(format!("{sensor}_chl_{label}"), window.satellite);
                matched.add_column(format!("{sensor}_insitu_chl_{label}"), window.insitu);
            }
        }

        matched
    }
}
