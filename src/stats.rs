//! Agreement statistics between satellite and in-situ chlorophyll.

use log::info;
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::errors::OutputError;
use crate::matchup::MatchedTable;
use crate::utils::csv_cell;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatsError {
    #[error("{true_len} true values but {pred_len} predicted values")]
    LengthMismatch { true_len: usize, pred_len: usize },
    #[error("no pair with both values present")]
    NoValidPairs,
}

/// Half-open depth interval `[min, max)` in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthRange {
    min: f64,
    max: f64,
}

impl DepthRange {
    pub fn new(min: f64, max: f64) -> Option<Self> {
        (min.is_finite() && max.is_finite() && min < max).then_some(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn contains(&self, depth: f64) -> bool {
        depth >= self.min && depth < self.max
    }

    pub fn label(&self) -> String {
        format!("{}-{}m", self.min, self.max)
    }
}

impl fmt::Display for DepthRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonStatistics {
    /// Pairs where both values are present.
    pub count: usize,
    pub rmse: f64,
    /// Mean absolute percentage error, over pairs with a non-zero true value.
    pub mape: f64,
    /// Mean of `predicted - true`.
    pub bias: f64,
    pub r_squared: f64,
    pub slope: f64,
    pub intercept: f64,
    pub cv_true: f64,
    pub cv_predicted: f64,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population coefficient of variation in percent; 0 for a zero mean.
fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values);
    if m == 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt() / m * 100.0
}

impl ComparisonStatistics {
    /// Compares `predicted` against `true_values`, position by position,
    /// ignoring every position where either value is NaN.
    pub fn compute(true_values: &[f64], predicted: &[f64]) -> Result<Self, StatsError> {
        if true_values.len() != predicted.len() {
            return Err(StatsError::LengthMismatch {
                true_len: true_values.len(),
                pred_len: predicted.len(),
            });
        }

        let (x, y): (Vec<f64>, Vec<f64>) = true_values
            .iter()
            .zip(predicted)
            .filter(|(t, p)| !t.is_nan() && !p.is_nan())
            .map(|(&t, &p)| (t, p))
            .unzip();

        if x.is_empty() {
            return Err(StatsError::NoValidPairs);
        }
        let n = x.len() as f64;

        let rmse = (x.iter().zip(&y).map(|(t, p)| (p - t).powi(2)).sum::<f64>() / n).sqrt();
        let bias = x.iter().zip(&y).map(|(t, p)| p - t).sum::<f64>() / n;

        let relative: Vec<f64> = x
            .iter()
            .zip(&y)
            .filter(|(t, _)| **t != 0.0)
            .map(|(t, p)| ((t - p) / t).abs())
            .collect();
        let mape = if relative.is_empty() {
            f64::NAN
        } else {
            mean(&relative) * 100.0
        };

        // Ordinary least squares of predicted on true
        let (mean_x, mean_y) = (mean(&x), mean(&y));
        let sxx: f64 = x.iter().map(|t| (t - mean_x).powi(2)).sum();
        let syy: f64 = y.iter().map(|p| (p - mean_y).powi(2)).sum();
        let sxy: f64 = x
            .iter()
            .zip(&y)
            .map(|(t, p)| (t - mean_x) * (p - mean_y))
            .sum();

        let (slope, intercept) = if sxx > 0.0 {
            let slope = sxy / sxx;
            (slope, mean_y - slope * mean_x)
        } else {
            (f64::NAN, f64::NAN)
        };
        let r_squared = if sxx > 0.0 && syy > 0.0 {
            sxy * sxy / (sxx * syy)
        } else {
            f64::NAN
        };

        Ok(Self {
            count: x.len(),
            rmse,
            mape,
            bias,
            r_squared,
            slope,
            intercept,
            cv_true: coefficient_of_variation(&x),
            cv_predicted: coefficient_of_variation(&y),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsRow {
    pub sensor: String,
    pub depth_range: DepthRange,
    pub window: usize,
    pub statistics: ComparisonStatistics,
}

pub fn window_label(window: usize) -> String {
    format!("{window}x{window}")
}

/// One row per sensor, depth range and window size that has at least one
/// valid pair, comparing `<sensor>_chl_<w>x<w>` against
/// `<sensor>_insitu_chl_<w>x<w>`.
pub fn compute_statistics(
    table: &MatchedTable,
    sensors: &[String],
    window_sizes: &[usize],
    depth_ranges: &[DepthRange],
) -> Result<Vec<StatisticsRow>, StatsError> {
    let depths: Vec<f64> = table.insitu().records().iter().map(|r| r.depth()).collect();
    let mut rows = Vec::new();

    for sensor in sensors {
        for &window in window_sizes {
            let label = window_label(window);
            let (Some(truth), Some(predicted)) = (
                table.column(&format!("{sensor}_insitu_chl_{label}")),
                table.column(&format!("{sensor}_chl_{label}")),
            ) else {
                info!("{sensor}: no {label} columns, skipping statistics");
                continue;
            };

            for &depth_range in depth_ranges {
                let (truth, predicted): (Vec<f64>, Vec<f64>) = depths
                    .iter()
                    .zip(truth.iter().zip(predicted))
                    .filter(|(depth, _)| depth_range.contains(**depth))
                    .map(|(_, (&t, &p))| (t, p))
                    .unzip();

                match ComparisonStatistics::compute(&truth, &predicted) {
                    Ok(statistics) => rows.push(StatisticsRow {
                        sensor: sensor.clone(),
                        depth_range,
                        window,
                        statistics,
                    }),
                    Err(StatsError::NoValidPairs) => {
                        info!("{sensor} {depth_range} {label}: no valid pairs, skipping");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }

    Ok(rows)
}

pub fn write_statistics_csv(path: &Path, rows: &[StatisticsRow]) -> Result<(), OutputError> {
    let csv_error = |source| OutputError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut out_file = csv::Writer::from_path(path).map_err(csv_error)?;

    out_file
        .write_record([
            "sensor",
            "depth_range",
            "window",
            "count",
            "rmse",
            "mape",
            "bias",
            "r_squared",
            "slope",
            "intercept",
            "cv_true",
            "cv_predicted",
        ])
        .map_err(csv_error)?;

    for row in rows {
        let s = &row.statistics;
        out_file
            .write_record([
                row.sensor.clone(),
                row.depth_range.label(),
                window_label(row.window),
                s.count.to_string(),
                csv_cell(s.rmse),
                csv_cell(s.mape),
                csv_cell(s.bias),
                csv_cell(s.r_squared),
                csv_cell(s.slope),
                csv_cell(s.intercept),
                csv_cell(s.cv_true),
                csv_cell(s.cv_predicted),
            ])
            .map_err(csv_error)?;
    }

    out_file.flush().map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(())
}
