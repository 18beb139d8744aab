pub mod bbox;
pub mod config;
pub mod errors;
pub mod fill;
pub mod grid;
pub mod insitu;
pub mod matchup;
pub mod readers;
pub mod sat_bands;
pub mod stats;
pub mod utils;
