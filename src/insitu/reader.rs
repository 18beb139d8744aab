use chrono::{DateTime, NaiveDateTime};
use log::{debug, warn};
use std::path::{Path, PathBuf};

use super::{InSituError, InSituRecord, Variable};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// One transect file, read but not yet merged into the combined table.
#[derive(Debug, Clone, PartialEq)]
pub struct Transect {
    pub path: PathBuf,
    pub transect_id: Option<i64>,
    pub columns: Vec<Variable>,
    pub records: Vec<InSituRecord>,
}

impl Transect {
    pub fn malformed_count(&self) -> usize {
        self.records.iter().filter(|r| r.malformed).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Time,
    Lat,
    Lon,
    TransectId,
    Measurement(Variable),
}

impl Column {
    fn from_header(header: &str) -> Option<Self> {
        let column = match header.trim().to_ascii_lowercase().as_str() {
            "time" | "elapsed_time" | "timestamp" => Column::Time,
            "lat" | "latitude" => Column::Lat,
            "lon" | "long" | "longitude" => Column::Lon,
            "transect_id" | "transect" => Column::TransectId,
            other => Column::Measurement(Variable::from_name(other)?),
        };
        Some(column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Cell {
    Missing,
    Value(f64),
    Invalid,
}

impl Cell {
    fn value(self) -> f64 {
        match self {
            Cell::Value(v) => v,
            Cell::Missing | Cell::Invalid => f64::NAN,
        }
    }
}

fn is_missing(raw: &str) -> bool {
    raw.is_empty() || ["nan", "na", "null", "none"].iter().any(|m| raw.eq_ignore_ascii_case(m))
}

fn parse_number(raw: &str) -> Cell {
    let raw = raw.trim();
    if is_missing(raw) {
        return Cell::Missing;
    }
    raw.parse::<f64>().map_or(Cell::Invalid, Cell::Value)
}

/// Seconds, either given directly or converted from a calendar timestamp
/// (UTC assumed when no offset is present).
fn parse_time(raw: &str) -> Cell {
    let raw = raw.trim();
    match parse_number(raw) {
        Cell::Invalid => {}
        cell => return cell,
    }

    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Cell::Value(datetime.timestamp() as f64);
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map_or(Cell::Invalid, |datetime| {
            Cell::Value(datetime.and_utc().timestamp() as f64)
        })
}

/// `transect_3.csv`, `transect3.csv` and `Transect-3.csv` give 3. Files that
/// do not start with "transect" carry no id.
pub fn transect_id_from_path(path: &Path) -> Result<Option<i64>, InSituError> {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return Ok(None);
    };
    let stem = stem.to_ascii_lowercase();
    let Some(rest) = stem.strip_prefix("transect") else {
        return Ok(None);
    };

    rest.trim_start_matches(['_', '-', ' '])
        .parse::<i64>()
        .map(Some)
        .map_err(|_| InSituError::TransectId(path.to_path_buf()))
}

pub fn read_transect(path: &Path) -> Result<Transect, InSituError> {
    let csv_error = |source| InSituError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let file_transect_id = transect_id_from_path(path)?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_error)?;

    let headers: Vec<Option<Column>> = reader
        .byte_headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| Column::from_header(&String::from_utf8_lossy(h)))
        .collect();

    for (required, name) in [(Column::Lat, "lat"), (Column::Lon, "lon")] {
        if !headers.contains(&Some(required)) {
            return Err(InSituError::MissingColumn {
                path: path.to_path_buf(),
                column: name,
            });
        }
    }

    let mut columns: Vec<Variable> = headers
        .iter()
        .filter_map(|column| match column {
            Some(Column::Measurement(variable)) => Some(*variable),
            _ => None,
        })
        .collect();
    columns.sort();
    columns.dedup();

    let mut records = Vec::new();
    for (line, result) in reader.byte_records().enumerate() {
        let row = result.map_err(csv_error)?;
        let mut record = InSituRecord::at(f64::NAN, f64::NAN);
        record.transect_id = file_transect_id;

        let mut lat = Cell::Missing;
        let mut lon = Cell::Missing;
        let mut time = Cell::Missing;

        for (column, raw) in headers.iter().zip(row.iter()) {
            let Some(column) = column else { continue };
            let raw = String::from_utf8_lossy(raw);
            match column {
                Column::Lat => lat = parse_number(&raw),
                Column::Lon => lon = parse_number(&raw),
                Column::Time => time = parse_time(&raw),
                Column::TransectId => {
                    if let Cell::Value(id) = parse_number(&raw) {
                        record.transect_id = Some(id as i64);
                    }
                }
                Column::Measurement(variable) => {
                    let cell = parse_number(&raw);
                    if cell == Cell::Invalid {
                        debug!(
                            "{}:{}: unreadable {} '{}'",
                            path.display(),
                            line + 2,
                            variable,
                            raw
                        );
                    }
                    record.set(*variable, cell.value());
                }
            }
        }

        record.lat = lat.value();
        record.lon = lon.value();
        record.time = time.value();
        record.malformed = !matches!(lat, Cell::Value(v) if (-90.0..=90.0).contains(&v))
            || !matches!(lon, Cell::Value(v) if (-180.0..=180.0).contains(&v))
            || time == Cell::Invalid;

        records.push(record);
    }

    let transect = Transect {
        path: path.to_path_buf(),
        transect_id: file_transect_id.or_else(|| records.first().and_then(|r| r.transect_id)),
        columns,
        records,
    };

    let malformed = transect.malformed_count();
    if malformed > 0 {
        warn!(
            "{}: {} of {} rows have an unreadable position or time and will not be matched",
            path.display(),
            malformed,
            transect.records.len()
        );
    }

    Ok(transect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_transect_id_from_path() {
        assert_eq!(transect_id_from_path(Path::new("a/transect_3.csv")).unwrap(), Some(3));
        assert_eq!(transect_id_from_path(Path::new("transect12.csv")).unwrap(), Some(12));
        assert_eq!(transect_id_from_path(Path::new("Transect-4.csv")).unwrap(), Some(4));
        assert_eq!(transect_id_from_path(Path::new("survey.csv")).unwrap(), None);
        assert!(matches!(
            transect_id_from_path(Path::new("transect_a.csv")),
            Err(InSituError::TransectId(_))
        ));
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("1683475200"), Cell::Value(1683475200.0));
        assert_eq!(parse_time("2023-05-07 16:00:00"), Cell::Value(1683475200.0));
        assert_eq!(parse_time("2023-05-07T16:00:00Z"), Cell::Value(1683475200.0));
        assert_eq!(parse_time(""), Cell::Missing);
        assert_eq!(parse_time("yesterday"), Cell::Invalid);
    }

    #[test]
    fn test_read_transect() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transect_3.csv");
        fs::write(
            &path,
            "time,Lat,Lon,Depth,chlor_a,Turbidity,notes\n\
             100,34.20,-77.80,1.5,2.5,3.0,ok\n\
             160,34.21,-77.79,2.0,,abc,\n\
             220,north,-77.78,2.5,1.0,3.0,bad lat\n\
             soon,34.22,-77.77,3.0,1.2,3.0,bad time\n",
        )
        .unwrap();

        let transect = read_transect(&path).unwrap();

        assert_eq!(transect.transect_id, Some(3));
        assert_eq!(
            transect.columns,
            vec![Variable::Depth, Variable::Turbidity, Variable::ChlorA]
        );
        assert_eq!(transect.records.len(), 4);

        let first = &transect.records[0];
        assert_eq!(first.time, 100.0);
        assert_eq!(first.lat, 34.20);
        assert_eq!(first.chlor_a(), 2.5);
        assert_eq!(first.transect_id, Some(3));
        assert!(first.is_matchable());

        // missing and unreadable measurements are NaN but keep the row usable
        let second = &transect.records[1];
        assert!(second.chlor_a().is_nan());
        assert!(second.get(Variable::Turbidity).is_nan());
        assert!(!second.malformed);

        assert!(transect.records[2].malformed);
        assert!(transect.records[2].lat.is_nan());
        assert!(transect.records[3].malformed);
        assert_eq!(transect.malformed_count(), 2);
    }

    #[test]
    fn test_missing_position_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transect_1.csv");
        fs::write(&path, "time,lat,depth\n1,34.2,1.0\n").unwrap();

        assert!(matches!(
            read_transect(&path),
            Err(InSituError::MissingColumn { column: "lon", .. })
        ));
    }
}
