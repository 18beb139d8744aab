use serde::Deserialize;
use std::fmt;

/// Which geographic extent is used to index a sensor's raster.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundsMode {
    /// The configured study-site bounds, for every sensor.
    #[default]
    #[serde(rename(deserialize = "fixed"))]
    Fixed,
    /// The extent of each file's own coordinate variables, falling back to the
    /// configured bounds when a file has none.
    #[serde(rename(deserialize = "per_file"))]
    PerFile,
}

/// Pixel grid the window aggregation runs over.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridSource {
    /// Sparse grid rebuilt from the matched points only.
    #[default]
    #[serde(rename(deserialize = "matched_points"))]
    MatchedPoints,
    /// The whole satellite raster.
    #[serde(rename(deserialize = "raster"))]
    Raster,
}

impl fmt::Display for BoundsMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BoundsMode::Fixed => write!(f, "fixed"),
            BoundsMode::PerFile => write!(f, "per_file"),
        }
    }
}

impl fmt::Display for GridSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GridSource::MatchedPoints => write!(f, "matched_points"),
            GridSource::Raster => write!(f, "raster"),
        }
    }
}
