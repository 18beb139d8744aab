//! In-situ transect data: towed-sensor readings, one record per sampling
//! instant, identified by an immutable [`RowId`] assigned at ingestion.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub mod ingest;
pub mod qc;
pub mod reader;

pub use ingest::{IngestOutput, ingest};
pub use qc::{QcConfig, QcReport, Threshold, apply_qc};
pub use reader::{Transect, read_transect};

#[derive(Debug, Error)]
pub enum InSituError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("cannot read a transect id from file name {0}")]
    TransectId(PathBuf),
    #[error("no in-situ CSV files found under {0}")]
    NoFiles(PathBuf),
    #[error("none of the {0} in-situ files could be read")]
    AllFilesFailed(usize),
}

/// Position of a record in the combined in-situ table. Never changes once
/// assigned; every per-sensor result is joined back on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(pub usize);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const VARIABLE_COUNT: usize = 11;

/// Measured quantities carried by a record besides time and position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variable {
    Scan,
    Depth,
    Temperature,
    Conductivity,
    Density,
    Salinity,
    Turbidity,
    Cdom,
    ChlorA,
    OxSat,
    Flag,
}

impl Variable {
    pub const ALL: [Variable; VARIABLE_COUNT] = [
        Variable::Scan,
        Variable::Depth,
        Variable::Temperature,
        Variable::Conductivity,
        Variable::Density,
        Variable::Salinity,
        Variable::Turbidity,
        Variable::Cdom,
        Variable::ChlorA,
        Variable::OxSat,
        Variable::Flag,
    ];

    /// Output column name.
    pub fn name(&self) -> &'static str {
        match self {
            Variable::Scan => "scan",
            Variable::Depth => "depth",
            Variable::Temperature => "temp",
            Variable::Conductivity => "conductivity",
            Variable::Density => "density",
            Variable::Salinity => "salinity",
            Variable::Turbidity => "turbidity",
            Variable::Cdom => "cdom",
            Variable::ChlorA => "chlor_a",
            Variable::OxSat => "ox_sat",
            Variable::Flag => "flag",
        }
    }

    /// Accepts the output name and the usual header spellings, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let variable = match name.trim().to_ascii_lowercase().as_str() {
            "scan" => Variable::Scan,
            "depth" => Variable::Depth,
            "temp" | "temperature" => Variable::Temperature,
            "conductivity" => Variable::Conductivity,
            "density" => Variable::Density,
            "salinity" => Variable::Salinity,
            "turbidity" => Variable::Turbidity,
            "cdom" => Variable::Cdom,
            "chlor_a" | "chl" | "chlorophyll" => Variable::ChlorA,
            "ox_sat" | "oxygen_saturation" => Variable::OxSat,
            "flag" => Variable::Flag,
            _ => return None,
        };
        Some(variable)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InSituRecord {
    pub row_id: RowId,
    pub transect_id: Option<i64>,
    /// Seconds; NaN when missing.
    pub time: f64,
    pub lat: f64,
    pub lon: f64,
    /// Set when a position or time cell could not be parsed. Malformed
    /// records stay in the table but are never matched.
    pub malformed: bool,
    values: [f64; VARIABLE_COUNT],
}

impl InSituRecord {
    /// Record at (`lat`, `lon`) with every measurement missing.
    pub fn at(lat: f64, lon: f64) -> Self {
        Self {
            row_id: RowId(0),
            transect_id: None,
            time: f64::NAN,
            lat,
            lon,
            malformed: false,
            values: [f64::NAN; VARIABLE_COUNT],
        }
    }

    pub fn with(mut self, variable: Variable, value: f64) -> Self {
        self.set(variable, value);
        self
    }

    pub fn get(&self, variable: Variable) -> f64 {
        self.values[variable.index()]
    }

    pub fn set(&mut self, variable: Variable, value: f64) {
        self.values[variable.index()] = value;
    }

    pub fn chlor_a(&self) -> f64 {
        self.get(Variable::ChlorA)
    }

    pub fn depth(&self) -> f64 {
        self.get(Variable::Depth)
    }

    /// Whether the record has a usable position to match against.
    pub fn is_matchable(&self) -> bool {
        !self.malformed
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// The combined in-situ table. Records are stored in `RowId` order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InSituTable {
    records: Vec<InSituRecord>,
    columns: Vec<Variable>,
}

impl InSituTable {
    /// Builds a table, assigning row ids in the given order. `columns` lists
    /// the measurement columns present in the source data.
    pub fn from_records(mut records: Vec<InSituRecord>, mut columns: Vec<Variable>) -> Self {
        for (index, record) in records.iter_mut().enumerate() {
            record.row_id = RowId(index);
        }
        columns.sort();
        columns.dedup();
        Self { records, columns }
    }

    pub fn records(&self) -> &[InSituRecord] {
        &self.records
    }

    pub fn columns(&self) -> &[Variable] {
        &self.columns
    }

    pub fn get(&self, row_id: RowId) -> Option<&InSituRecord> {
        self.records.get(row_id.0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn malformed_count(&self) -> usize {
        self.records.iter().filter(|r| r.malformed).count()
    }
}
