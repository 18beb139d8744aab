use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::insitu::InSituError;
use crate::stats::StatsError;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("cannot create output directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed writing {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    InSitu(#[from] InSituError),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error(transparent)]
    Stats(#[from] StatsError),
}
