//! Threshold QC of towed-sensor time series.
//!
//! Three tests run over each transect in acquisition order: a timing gap test
//! (missing time or a jump larger than the allowed gap), a range test and a
//! spike test (jump from the previous reading). Flags are computed on the
//! incoming values; a flagged value is then set to NaN.

use serde::Deserialize;
use std::ops::AddAssign;

use super::{InSituRecord, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Threshold {
    pub min: f64,
    pub max: f64,
    pub spike: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QcConfig {
    max_time_gap_s: f64,
    thresholds: Vec<(Variable, Threshold)>,
}

impl Default for QcConfig {
    fn default() -> Self {
        Self {
            max_time_gap_s: 15.0 * 60.0,
            thresholds: vec![(
                Variable::Turbidity,
                Threshold {
                    min: 0.0,
                    max: 10.0,
                    spike: 5.0,
                },
            )],
        }
    }
}

impl QcConfig {
    pub fn new(max_time_gap_s: f64, thresholds: Vec<(Variable, Threshold)>) -> Self {
        Self {
            max_time_gap_s,
            thresholds,
        }
    }

    pub fn max_time_gap_s(&self) -> f64 {
        self.max_time_gap_s
    }

    pub fn thresholds(&self) -> &[(Variable, Threshold)] {
        &self.thresholds
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QcReport {
    pub timing_gap_flags: usize,
    pub range_flags: usize,
    pub spike_flags: usize,
    pub total_points_removed: usize,
}

impl AddAssign for QcReport {
    fn add_assign(&mut self, other: Self) {
        self.timing_gap_flags += other.timing_gap_flags;
        self.range_flags += other.range_flags;
        self.spike_flags += other.spike_flags;
        self.total_points_removed += other.total_points_removed;
    }
}

fn timing_gap_flags(records: &[InSituRecord], max_gap: f64) -> Vec<bool> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            if record.time.is_nan() {
                return true;
            }
            // NaN differences compare false, so a missing previous time does not flag
            i > 0 && (record.time - records[i - 1].time).abs() > max_gap
        })
        .collect()
}

/// Applies every configured test to `records` in place. Variables with no
/// value in this transect are skipped. `total_points_removed` counts rows
/// flagged by at least one test.
pub fn apply_qc(records: &mut [InSituRecord], config: &QcConfig) -> QcReport {
    let mut report = QcReport::default();
    let timing = timing_gap_flags(records, config.max_time_gap_s);
    report.timing_gap_flags = timing.iter().filter(|&&f| f).count();

    let mut flagged = timing.clone();
    for &(variable, threshold) in &config.thresholds {
        let values: Vec<f64> = records.iter().map(|r| r.get(variable)).collect();
        if values.iter().all(|v| v.is_nan()) {
            continue;
        }

        for (i, record) in records.iter_mut().enumerate() {
            let value = values[i];
            let out_of_range = value < threshold.min || value > threshold.max;
            let spike = i > 0 && (value - values[i - 1]).abs() > threshold.spike;

            report.range_flags += usize::from(out_of_range);
            report.spike_flags += usize::from(spike);

            if timing[i] || out_of_range || spike {
                record.set(variable, f64::NAN);
            }
            flagged[i] |= out_of_range || spike;
        }
    }

    report.total_points_removed = flagged.iter().filter(|&&f| f).count();
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transect(samples: &[(f64, f64)]) -> Vec<InSituRecord> {
        samples
            .iter()
            .map(|&(time, turbidity)| {
                let mut record = InSituRecord::at(34.2, -77.8).with(Variable::Turbidity, turbidity);
                record.time = time;
                record
            })
            .collect()
    }

    fn turbidity(records: &[InSituRecord]) -> Vec<f64> {
        records.iter().map(|r| r.get(Variable::Turbidity)).collect()
    }

    #[test]
    fn test_clean_series_is_untouched() {
        let mut records = transect(&[(0.0, 1.0), (60.0, 1.5), (120.0, 2.0)]);
        let report = apply_qc(&mut records, &QcConfig::default());

        assert_eq!(report, QcReport::default());
        assert_eq!(turbidity(&records), vec![1.0, 1.5, 2.0]);
    }

    #[test]
    fn test_range_and_spike() {
        // 12.0 is out of range and a spike from 1.0; 2.0 after it is a spike back down
        let mut records = transect(&[(0.0, 1.0), (60.0, 12.0), (120.0, 2.0), (180.0, -1.0)]);
        let report = apply_qc(&mut records, &QcConfig::default());

        assert_eq!(report.range_flags, 2);
        assert_eq!(report.spike_flags, 2);
        assert_eq!(report.timing_gap_flags, 0);
        assert_eq!(report.total_points_removed, 3);

        let values = turbidity(&records);
        assert_eq!(values[0], 1.0);
        assert!(values[1].is_nan());
        assert!(values[2].is_nan());
        assert!(values[3].is_nan());
    }

    #[test]
    fn test_timing_gap() {
        let mut records = transect(&[(0.0, 1.0), (60.0, 1.0), (2000.0, 1.0), (f64::NAN, 1.0)]);
        let report = apply_qc(&mut records, &QcConfig::default());

        assert_eq!(report.timing_gap_flags, 2);
        assert_eq!(report.total_points_removed, 2);
        assert_eq!(turbidity(&records)[1], 1.0);
        assert!(turbidity(&records)[2].is_nan());
    }

    #[test]
    fn test_absent_variable_is_skipped() {
        let mut records = transect(&[(0.0, f64::NAN), (5000.0, f64::NAN)]);
        let report = apply_qc(&mut records, &QcConfig::default());

        // the gap still counts as a removed row with nothing to null
        assert_eq!(report.timing_gap_flags, 1);
        assert_eq!(report.total_points_removed, 1);
    }

    #[test]
    fn test_row_flagged_by_several_tests_counts_once() {
        let mut records = transect(&[(0.0, 1.0), (60.0, 1.0), (2000.0, 12.0)]);
        for record in &mut records {
            record.set(Variable::Temperature, 20.0);
        }
        records[2].set(Variable::Temperature, 40.0);

        let config = QcConfig::new(
            900.0,
            vec![
                (
                    Variable::Turbidity,
                    Threshold {
                        min: 0.0,
                        max: 10.0,
                        spike: 5.0,
                    },
                ),
                (
                    Variable::Temperature,
                    Threshold {
                        min: 0.0,
                        max: 35.0,
                        spike: 5.0,
                    },
                ),
            ],
        );
        let report = apply_qc(&mut records, &config);

        assert_eq!(report.timing_gap_flags, 1);
        assert_eq!(report.range_flags, 2);
        assert_eq!(report.spike_flags, 2);
        assert_eq!(report.total_points_removed, 1);
        assert!(records[2].get(Variable::Temperature).is_nan());
        assert_eq!(records[1].get(Variable::Temperature), 20.0);
    }

    #[test]
    fn test_reports_accumulate() {
        let mut total = QcReport::default();
        total += QcReport {
            timing_gap_flags: 1,
            range_flags: 2,
            spike_flags: 3,
            total_points_removed: 4,
        };
        total += QcReport {
            timing_gap_flags: 1,
            ..QcReport::default()
        };
        assert_eq!(total.timing_gap_flags, 2);
        assert_eq!(total.total_points_removed, 4);
    }
}
