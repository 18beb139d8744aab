use log::{info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::qc::{QcConfig, QcReport, apply_qc};
use super::reader::{Transect, read_transect};
use super::{InSituError, InSituTable};
use crate::config::InSituConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutput {
    pub table: InSituTable,
    /// Per transect file, in table order.
    pub qc_reports: Vec<(PathBuf, QcReport)>,
}

impl IngestOutput {
    pub fn total_qc(&self) -> QcReport {
        let mut total = QcReport::default();
        for (_, report) in &self.qc_reports {
            total += *report;
        }
        total
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// CSV files under `path` in lexical order, or `path` itself when it is a file.
fn transect_files(path: &Path) -> Result<Vec<PathBuf>, InSituError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file() && is_csv(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(InSituError::NoFiles(path.to_path_buf()));
    }
    Ok(files)
}

fn process_file(
    path: &Path,
    qc: Option<&QcConfig>,
    reverse_odd_transects: bool,
) -> Result<(Transect, QcReport), InSituError> {
    let mut transect = read_transect(path)?;

    let report = match qc {
        Some(qc) => apply_qc(&mut transect.records, qc),
        None => QcReport::default(),
    };

    // Odd transects were surveyed in the opposite direction
    if reverse_odd_transects && transect.transect_id.is_some_and(|id| id % 2 != 0) {
        transect.records.reverse();
    }

    Ok((transect, report))
}

/// Reads every transect file in parallel, then concatenates them on one
/// thread, ordered by transect id and file name, assigning row ids.
pub fn ingest(config: &InSituConfig) -> Result<IngestOutput, InSituError> {
    let files = transect_files(config.path())?;

    let results: Vec<Result<(Transect, QcReport), InSituError>> = files
        .par_iter()
        .map(|path| process_file(path, config.qc(), config.reverse_odd_transects()))
        .collect();

    let mut transects = Vec::with_capacity(results.len());
    for (path, result) in files.iter().zip(results) {
        match result {
            Ok(transect) => transects.push(transect),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    if transects.is_empty() {
        return Err(InSituError::AllFilesFailed(files.len()));
    }

    transects.sort_by(|(a, _), (b, _)| {
        a.transect_id
            .cmp(&b.transect_id)
            .then_with(|| a.path.cmp(&b.path))
    });

    let mut records = Vec::new();
    let mut columns = Vec::new();
    let mut qc_reports = Vec::with_capacity(transects.len());
    for (transect, report) in transects {
        columns.extend(transect.columns);
        records.extend(transect.records);
        qc_reports.push((transect.path, report));
    }

    let table = InSituTable::from_records(records, columns);
    info!(
        "Ingested {} in-situ rows from {} transect file(s), {} malformed",
        table.len(),
        qc_reports.len(),
        table.malformed_count()
    );

    Ok(IngestOutput { table, qc_reports })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insitu::{RowId, Variable};
    use std::fs;
    use tempfile::tempdir;

    fn insitu_config(path: &Path, reverse: bool, qc: bool) -> InSituConfig {
        let json = format!(
            r#"{{ "insitu": {{ "path": {:?}, "reverse_odd_transects": {} {} }},
                 "sensors": [{{ "name": "a", "path": "a.nc" }}] }}"#,
            path.display().to_string(),
            reverse,
            if qc { r#", "qc": {}"# } else { "" }
        );
        let config: crate::config::Config = serde_json::from_str(&json).unwrap();
        config.insitu().clone()
    }

    fn write_transects(dir: &Path) {
        fs::write(
            dir.join("transect_2.csv"),
            concat!(
                "time,lat,lon,depth,chlor_a,turbidity\n",
                "0,34.20,-77.80,1,2.0,1\n",
                "60,34.21,-77.79,2,2.1,1\n",
            ),
        )
        .unwrap();
        fs::write(
            dir.join("transect_1.csv"),
            concat!(
                "time,lat,lon,depth,chlor_a,turbidity\n",
                "0,34.15,-77.75,1,1.0,1\n",
                "60,34.16,-77.74,2,1.1,50\n",
            ),
        )
        .unwrap();
        fs::write(dir.join("notes.txt"), "not a transect").unwrap();
    }

    #[test]
    fn test_ingest_directory() {
        let dir = tempdir().unwrap();
        write_transects(dir.path());

        let output = ingest(&insitu_config(dir.path(), false, false)).unwrap();
        let table = &output.table;

        assert_eq!(table.len(), 4);
        assert_eq!(output.qc_reports.len(), 2);
        assert_eq!(table.columns(), &[Variable::Depth, Variable::Turbidity, Variable::ChlorA]);

        // transect 1 first, rows in file order
        let ids: Vec<Option<i64>> = table.records().iter().map(|r| r.transect_id).collect();
        assert_eq!(ids, vec![Some(1), Some(1), Some(2), Some(2)]);
        assert_eq!(table.get(RowId(0)).unwrap().chlor_a(), 1.0);
        assert_eq!(table.get(RowId(3)).unwrap().row_id, RowId(3));
    }

    #[test]
    fn test_reverse_odd_transects_and_qc() {
        let dir = tempdir().unwrap();
        write_transects(dir.path());

        let output = ingest(&insitu_config(dir.path(), true, true)).unwrap();
        let table = &output.table;

        // transect 1 reversed after QC removed its out-of-range turbidity
        assert_eq!(table.get(RowId(0)).unwrap().chlor_a(), 1.1);
        assert!(table.get(RowId(0)).unwrap().get(Variable::Turbidity).is_nan());
        assert_eq!(table.get(RowId(1)).unwrap().chlor_a(), 1.0);
        assert_eq!(table.get(RowId(2)).unwrap().chlor_a(), 2.0);

        assert_eq!(output.total_qc().range_flags, 1);
        assert_eq!(output.total_qc().total_points_removed, 1);
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = tempdir().unwrap();
        write_transects(dir.path());
        fs::write(dir.path().join("transect_3.csv"), "time,depth\n0,1\n").unwrap();

        let output = ingest(&insitu_config(dir.path(), false, false)).unwrap();
        assert_eq!(output.table.len(), 4);
        assert_eq!(output.qc_reports.len(), 2);
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            ingest(&insitu_config(dir.path(), false, false)),
            Err(InSituError::NoFiles(_))
        ));
    }
}
