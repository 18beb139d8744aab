use std::fmt;

/// Formats a value for CSV output; NaN becomes an empty cell.
pub fn csv_cell(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

/// Min, max and mean over the non-NaN values of a raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub valid: usize,
    pub total: usize,
}

impl RasterSummary {
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut summary = RasterSummary {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: f64::NAN,
            valid: 0,
            total: 0,
        };
        let mut sum = 0.0;

        for value in values {
            summary.total += 1;
            if value.is_nan() {
                continue;
            }
            summary.valid += 1;
            summary.min = summary.min.min(value);
            summary.max = summary.max.max(value);
            sum += value;
        }

        if summary.valid == 0 {
            summary.min = f64::NAN;
            summary.max = f64::NAN;
        } else {
            summary.mean = sum / summary.valid as f64;
        }
        summary
    }

    pub fn valid_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.valid as f64 / self.total as f64
    }
}

impl fmt::Display for RasterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min {:.3}, max {:.3}, mean {:.3}, valid {} / {} ({:.1}%)",
            self.min,
            self.max,
            self.mean,
            self.valid,
            self.total,
            self.valid_percent()
        )
    }
}
