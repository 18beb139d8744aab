use std::collections::HashMap;
use std::path::Path;

use crate::errors::OutputError;
use crate::insitu::{InSituTable, RowId};
use crate::utils::csv_cell;

/// The in-situ table plus named satellite columns, one value per row.
///
/// Columns are joined on [`RowId`], never on position: a value whose row id
/// is unknown is dropped and a row without a value reads as NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedTable {
    insitu: InSituTable,
    names: Vec<String>,
    columns: HashMap<String, Vec<f64>>,
}

impl MatchedTable {
    pub fn new(insitu: InSituTable) -> Self {
        Self {
            insitu,
            names: Vec::new(),
            columns: HashMap::new(),
        }
    }

    pub fn insitu(&self) -> &InSituTable {
        &self.insitu
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Adds or replaces a column.
    pub fn add_column<I>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = (RowId, f64)>,
    {
        let name = name.into();
        let mut column = vec![f64::NAN; self.insitu.len()];
        for (RowId(row), value) in values {
            if let Some(cell) = column.get_mut(row) {
                *cell = value;
            }
        }

        if !self.columns.contains_key(&name) {
            self.names.push(name.clone());
        }
        self.columns.insert(name, column);
    }

    /// Writes one line per in-situ row: row id, transect, time, position, the
    /// measured variables, then every added column. NaN is an empty cell.
    pub fn write_csv(&self, path: &Path) -> Result<(), OutputError> {
        let csv_error = |source| OutputError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut out_file = csv::Writer::from_path(path).map_err(csv_error)?;

        let variables = self.insitu.columns();
        let mut header = vec!["row_id", "transect_id", "time", "lat", "lon"];
        header.extend(variables.iter().map(|v| v.name()));
        header.extend(self.names.iter().map(String::as_str));
        out_file.write_record(&header).map_err(csv_error)?;

        let columns: Vec<&[f64]> = self
            .names
            .iter()
            .filter_map(|name| self.column(name))
            .collect();

        for (row, record) in self.insitu.records().iter().enumerate() {
            let mut line = vec![
                record.row_id.to_string(),
                record.transect_id.map(|id| id.to_string()).unwrap_or_default(),
                csv_cell(record.time),
                csv_cell(record.lat),
                csv_cell(record.lon),
            ];
            line.extend(variables.iter().map(|&v| csv_cell(record.get(v))));
            line.extend(columns.iter().map(|column| csv_cell(column[row])));
            out_file.write_record(&line).map_err(csv_error)?;
        }

        out_file.flush().map_err(|source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insitu::{InSituRecord, Variable};
    use std::fs;
    use tempfile::tempdir;

    fn insitu() -> InSituTable {
        let mut records = vec![
            InSituRecord::at(34.2, -77.8).with(Variable::ChlorA, 1.5),
            InSituRecord::at(34.21, -77.81),
        ];
        records[0].transect_id = Some(3);
        records[0].time = 60.0;
        InSituTable::from_records(records, vec![Variable::ChlorA])
    }

    #[test]
    fn test_columns_join_on_row_id() {
        let mut table = MatchedTable::new(insitu());
        // out of order, with an unknown row id
        table.add_column("a_chl", vec![(RowId(1), 2.0), (RowId(0), 1.0), (RowId(9), 5.0)]);
        table.add_column("b_chl", vec![(RowId(1), 4.0)]);

        assert_eq!(table.column("a_chl").unwrap(), &[1.0, 2.0]);
        let b = table.column("b_chl").unwrap();
        assert!(b[0].is_nan());
        assert_eq!(b[1], 4.0);
        assert!(table.column("c_chl").is_none());

        table.add_column("a_chl", vec![(RowId(0), 7.0)]);
        assert_eq!(table.column_names(), &["a_chl".to_string(), "b_chl".to_string()]);
        assert_eq!(table.column("a_chl").unwrap()[0], 7.0);
    }

    #[test]
    fn test_write_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matched.csv");

        let mut table = MatchedTable::new(insitu());
        table.add_column("hawkeye_irow", vec![(RowId(0), 2.0), (RowId(1), f64::NAN)]);
        table.add_column("hawkeye_chl", vec![(RowId(0), 2.5)]);
        table.write_csv(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "row_id,transect_id,time,lat,lon,chlor_a,hawkeye_irow,hawkeye_chl");
        assert_eq!(lines[1], "0,3,60,34.2,-77.8,1.5,2,2.5");
        assert_eq!(lines[2], "1,,,34.21,-77.81,,,");
    }
}
