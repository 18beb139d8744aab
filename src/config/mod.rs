use serde::Deserialize;
use serde::Deserializer;
use serde::de::Error;

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::bbox::GeoBounds;
use crate::fill::DEFAULT_FILL_VALUE;
use crate::insitu::Variable;
use crate::insitu::qc::{QcConfig, Threshold};
use crate::readers::{GroupLayout, ProductRequest};
use crate::stats::DepthRange;

pub mod error;
pub use error::ConfigError;

pub mod modes;
pub use modes::{BoundsMode, GridSource};

pub const DEFAULT_CONFIG_PATH: &str = "./data/config/matchup_config.json";

/// Study-site bounds used when none are configured: (north, south, east, west).
pub const STUDY_SITE: (f64, f64, f64, f64) = (34.25, 34.10, -77.70, -77.85);
pub const DEFAULT_WINDOW_SIZES: [usize; 3] = [1, 2, 3];
pub const DEFAULT_DEPTH_RANGES: [(f64, f64); 4] =
    [(0.0, 4.0), (4.0, 7.0), (7.0, 10.0), (0.0, 10.0)];

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SensorConfig {
    pub name: String,
    /// File path or glob pattern.
    pub path: String,
    #[serde(default = "default_product")]
    pub product: String,
    /// NetCDF group; absent means the reader searches the usual locations,
    /// `"/"` means the dataset root only.
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub layer: usize,
    #[serde(default)]
    pub fill_value: Option<f64>,
}

fn default_product() -> String {
    "chlor_a".to_string()
}

impl SensorConfig {
    pub fn layout(&self) -> GroupLayout {
        match self.group.as_deref() {
            None => GroupLayout::Auto,
            Some("") | Some("/") => GroupLayout::Root,
            Some(group) => GroupLayout::Group(group.to_string()),
        }
    }

    pub fn request(&self) -> ProductRequest {
        ProductRequest::new(self.product.clone(), self.layout())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InSituConfig {
    path: PathBuf,
    reverse_odd_transects: bool,
    qc: Option<QcConfig>,
}

impl InSituConfig {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reverse_odd_transects(&self) -> bool {
        self.reverse_odd_transects
    }

    pub fn qc(&self) -> Option<&QcConfig> {
        self.qc.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    insitu: InSituConfig,
    sensors: Vec<SensorConfig>,
    bounds_mode: BoundsMode,
    bounds: GeoBounds,
    fill_value: f64,
    window_sizes: Vec<usize>,
    grid_source: GridSource,
    depth_ranges: Vec<DepthRange>,
    output_directory: PathBuf,
    export_rasters: bool,
}

// Deserializes through a helper so that every value is validated before a
// Config exists: bounds, sensor names, window sizes, depth ranges and QC
// thresholds.
impl<'de> Deserialize<'de> for Config {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ConfigHelper {
            insitu: InSituHelper,
            sensors: Vec<SensorConfig>,
            #[serde(default)]
            bounds_mode: BoundsMode,
            bounds: Option<BoundsHelper>,
            fill_value: Option<f64>,
            window_sizes: Option<Vec<usize>>,
            #[serde(default)]
            grid_source: GridSource,
            depth_ranges: Option<Vec<(f64, f64)>>,
            output_directory: Option<PathBuf>,
            #[serde(default)]
            export_rasters: bool,
        }

        #[derive(Deserialize)]
        struct InSituHelper {
            path: PathBuf,
            #[serde(default)]
            reverse_odd_transects: bool,
            qc: Option<QcHelper>,
        }

        #[derive(Deserialize)]
        struct QcHelper {
            max_time_gap_s: Option<f64>,
            thresholds: Option<BTreeMap<String, Threshold>>,
        }

        #[derive(Deserialize)]
        struct BoundsHelper {
            north: f64,
            south: f64,
            east: f64,
            west: f64,
        }

        let helper = ConfigHelper::deserialize(deserializer)?;

        let bounds = match helper.bounds {
            Some(b) => GeoBounds::new(b.north, b.south, b.east, b.west),
            None => {
                let (north, south, east, west) = STUDY_SITE;
                GeoBounds::new(north, south, east, west)
            }
        }
        .map_err(|e| D::Error::custom(ConfigError::from(e)))?;

        // Sensor names become column prefixes, so they must be unique
        if helper.sensors.is_empty() {
            return Err(D::Error::custom(ConfigError::NoSensors));
        }
        let mut seen = HashSet::new();
        for sensor in &helper.sensors {
            if sensor.name.trim().is_empty() {
                return Err(D::Error::custom(ConfigError::EmptySensorName));
            }
            if !seen.insert(sensor.name.clone()) {
                return Err(D::Error::custom(ConfigError::DuplicateSensor(
                    sensor.name.clone(),
                )));
            }
        }

        let window_sizes = helper
            .window_sizes
            .unwrap_or_else(|| DEFAULT_WINDOW_SIZES.to_vec());
        let distinct = window_sizes.iter().collect::<HashSet<_>>().len();
        if window_sizes.is_empty() || window_sizes.contains(&0) || distinct != window_sizes.len()
        {
            return Err(D::Error::custom(ConfigError::WindowSize(window_sizes)));
        }

        let depth_ranges = helper
            .depth_ranges
            .unwrap_or_else(|| DEFAULT_DEPTH_RANGES.to_vec())
            .into_iter()
            .map(|(min, max)| {
                DepthRange::new(min, max).ok_or(ConfigError::DepthRange { min, max })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(D::Error::custom)?;

        let qc = match helper.insitu.qc {
            Some(qc) => Some(build_qc(qc.max_time_gap_s, qc.thresholds).map_err(D::Error::custom)?),
            None => None,
        };

        Ok(Config {
            insitu: InSituConfig {
                path: helper.insitu.path,
                reverse_odd_transects: helper.insitu.reverse_odd_transects,
                qc,
            },
            sensors: helper.sensors,
            bounds_mode: helper.bounds_mode,
            bounds,
            fill_value: helper.fill_value.unwrap_or(DEFAULT_FILL_VALUE),
            window_sizes,
            grid_source: helper.grid_source,
            depth_ranges,
            output_directory: helper
                .output_directory
                .unwrap_or_else(|| PathBuf::from("./output")),
            export_rasters: helper.export_rasters,
        })
    }
}

fn build_qc(
    max_time_gap_s: Option<f64>,
    thresholds: Option<BTreeMap<String, Threshold>>,
) -> Result<QcConfig, ConfigError> {
    let defaults = QcConfig::default();

    let thresholds = match thresholds {
        None => defaults.thresholds().to_vec(),
        Some(map) => map
            .into_iter()
            .map(|(name, threshold)| {
                let variable = Variable::from_name(&name)
                    .ok_or_else(|| ConfigError::UnknownQcVariable(name.clone()))?;
                if threshold.min >= threshold.max || threshold.spike <= 0.0 {
                    return Err(ConfigError::QcThreshold(name));
                }
                Ok((variable, threshold))
            })
            .collect::<Result<Vec<_>, _>>()?,
    };

    Ok(QcConfig::new(
        max_time_gap_s.unwrap_or(defaults.max_time_gap_s()),
        thresholds,
    ))
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let config: Config = serde_json::from_reader(reader).map_err(ConfigError::from)?;

        Ok(config)
    }

    pub fn insitu(&self) -> &InSituConfig {
        &self.insitu
    }

    pub fn sensors(&self) -> &[SensorConfig] {
        &self.sensors
    }

    pub fn bounds_mode(&self) -> BoundsMode {
        self.bounds_mode
    }

    pub fn bounds(&self) -> &GeoBounds {
        &self.bounds
    }

    pub fn fill_value(&self) -> f64 {
        self.fill_value
    }

    pub fn window_sizes(&self) -> &[usize] {
        &self.window_sizes
    }

    pub fn grid_source(&self) -> GridSource {
        self.grid_source
    }

    pub fn depth_ranges(&self) -> &[DepthRange] {
        &self.depth_ranges
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn export_rasters(&self) -> bool {
        self.export_rasters
    }
}
