//! Satellite product filename parsing.
//!
//! Two naming conventions coexist in an archive of ocean-color products:
//!
//! * the current OBPG convention, `<MISSION>_<INSTRUMENT>[_<TYPE>].<time>.<rest>`
//!   (e.g. `AQUA_MODIS.20190621T180500.L2.OC.nc`), and
//! * older names: OCSSW single-letter prefixes with a day-of-year timestamp
//!   (`A2019172180500.L2_LAC_OC.nc`) and the ESA/USGS Level-1 names
//!   (Sentinel-3 OLCI, Sentinel-2 MSI, MERIS, Landsat-8).
//!
//! Every recognised pattern is listed in [`OLD_RULES`] or [`NEW_MISSIONS`];
//! nothing outside this module inspects product filenames.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilenameError {
    #[error("empty product filename")]
    Empty,
    #[error("'{0}' does not follow a known product naming convention")]
    UnknownConvention(String),
    #[error("could not read an acquisition time from '{name}' (token '{token}')")]
    InvalidTimestamp { name: String, token: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingLevel {
    L1A,
    L1B,
    L1C,
    L2,
    L3Binned,
    L3Mapped,
    Unknown,
}

impl fmt::Display for ProcessingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProcessingLevel::L1A => "L1A",
            ProcessingLevel::L1B => "L1B",
            ProcessingLevel::L1C => "L1C",
            ProcessingLevel::L2 => "L2",
            ProcessingLevel::L3Binned => "L3b",
            ProcessingLevel::L3Mapped => "L3m",
            ProcessingLevel::Unknown => "unknown level",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductIdentity {
    pub mission: String,
    pub instrument: String,
    pub timestamp: NaiveDateTime,
    pub level: ProcessingLevel,
}

impl ProductIdentity {
    /// `MISSION_INSTRUMENT.YYYYMMDDTHHMMSS`, the current-convention stem.
    pub fn canonical_stem(&self) -> String {
        format!(
            "{}_{}.{}",
            self.mission,
            self.instrument,
            self.timestamp.format("%Y%m%dT%H%M%S")
        )
    }
}

impl fmt::Display for ProductIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.canonical_stem(), self.level)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductFilename {
    New(ProductIdentity),
    Old(ProductIdentity),
}

impl ProductFilename {
    pub fn identity(&self) -> &ProductIdentity {
        match self {
            ProductFilename::New(identity) | ProductFilename::Old(identity) => identity,
        }
    }

    pub fn canonical_stem(&self) -> String {
        self.identity().canonical_stem()
    }
}

/// Mission prefixes of the current naming convention.
pub const NEW_MISSIONS: &[&str] = &[
    "SEASTAR", "AQUA", "TERRA", "SNPP", "NOAA20", "ENVISAT", "S3A", "S3B", "S2A", "S2B",
    "LANDSAT8", "SEAHAWK1", "PACE",
];

/// Substrings that mark a Level-1 ESA/USGS name even when it starts with a
/// current-convention mission prefix.
const L1_MARKERS: &[&str] = &["_OL_1", "_MSIL1", ".N1", "LC08"];

/// Where the acquisition time sits in an old-convention name.
#[derive(Debug, Clone, Copy)]
enum TimeField {
    /// `YYYYDDDHHMMSS` starting at the given byte offset.
    DayOfYear(usize),
    /// `YYYYMMDDTHHMMSS` starting at the given byte offset.
    Compact(usize),
    /// First `YYYYMMDD_HHMMSS` found anywhere in the name.
    Underscored,
    /// `YYYYMMDD` in the given `_`-separated field.
    DateField(usize),
}

struct OldRule {
    prefix: &'static str,
    requires: Option<&'static str>,
    mission: &'static str,
    instrument: &'static str,
    time: TimeField,
    level: Option<ProcessingLevel>,
}

const fn rule(
    prefix: &'static str,
    requires: Option<&'static str>,
    mission: &'static str,
    instrument: &'static str,
    time: TimeField,
    level: Option<ProcessingLevel>,
) -> OldRule {
    OldRule {
        prefix,
        requires,
        mission,
        instrument,
        time,
        level,
    }
}

/// Old-convention patterns, tried in order. Level-1 names come before the
/// single-letter OCSSW prefixes so that `S3A_...` is never read as SeaWiFS.
const OLD_RULES: &[OldRule] = &[
    rule("S3A_OL_1", None, "S3A", "OLCI", TimeField::Compact(16), Some(ProcessingLevel::L1B)),
    rule("S3B_OL_1", None, "S3B", "OLCI", TimeField::Compact(16), Some(ProcessingLevel::L1B)),
    rule("S2A_MSIL1", None, "S2A", "MSI", TimeField::Compact(11), Some(ProcessingLevel::L1C)),
    rule("S2B_MSIL1", None, "S2B", "MSI", TimeField::Compact(11), Some(ProcessingLevel::L1C)),
    rule("LC08", None, "LANDSAT8", "OLI", TimeField::DateField(3), Some(ProcessingLevel::L1A)),
    rule("MER_", None, "ENVISAT", "MERIS", TimeField::Underscored, None),
    rule("S", None, "SEASTAR", "SEAWIFS", TimeField::DayOfYear(1), None),
    rule("A", None, "AQUA", "MODIS", TimeField::DayOfYear(1), None),
    rule("T", None, "TERRA", "MODIS", TimeField::DayOfYear(1), None),
    rule("V", Some("SNPP"), "SNPP", "VIIRS", TimeField::DayOfYear(1), None),
    rule("V", Some("JPSS"), "NOAA20", "VIIRS", TimeField::DayOfYear(1), None),
    rule("H", None, "ISS", "HICO", TimeField::DayOfYear(1), None),
];

/// Parses the final path component of `name` into a product identity.
pub fn parse_product_filename(name: &str) -> Result<ProductFilename, FilenameError> {
    let basename = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name);

    if basename.is_empty() {
        return Err(FilenameError::Empty);
    }

    let first_piece = basename.split('_').next().unwrap_or(basename);
    let has_l1_marker = L1_MARKERS.iter().any(|m| basename.contains(m));

    if NEW_MISSIONS.contains(&first_piece) && !has_l1_marker {
        return parse_new(basename).map(ProductFilename::New);
    }

    for rule in OLD_RULES {
        if !basename.starts_with(rule.prefix) {
            continue;
        }
        if rule.requires.is_some_and(|token| !basename.contains(token)) {
            continue;
        }
        let Some(timestamp) = old_timestamp(basename, rule.time) else {
            // A one-letter prefix only identifies the product when digits follow.
            if matches!(rule.time, TimeField::DayOfYear(_)) {
                continue;
            }
            return Err(FilenameError::InvalidTimestamp {
                name: basename.to_string(),
                token: basename.to_string(),
            });
        };

        return Ok(ProductFilename::Old(ProductIdentity {
            mission: rule.mission.to_string(),
            instrument: rule.instrument.to_string(),
            timestamp,
            level: rule.level.unwrap_or_else(|| level_from_tokens(basename)),
        }));
    }

    Err(FilenameError::UnknownConvention(basename.to_string()))
}

fn parse_new(basename: &str) -> Result<ProductIdentity, FilenameError> {
    let mut parts = basename.split('.');
    let stem = parts.next().unwrap_or_default();
    let time_token = parts.next().unwrap_or_default();

    let mut stem_pieces = stem.split('_');
    let mission = stem_pieces.next().unwrap_or_default();
    let instrument = stem_pieces
        .next()
        .ok_or_else(|| FilenameError::UnknownConvention(basename.to_string()))?;

    let timestamp =
        new_timestamp(time_token).ok_or_else(|| FilenameError::InvalidTimestamp {
            name: basename.to_string(),
            token: time_token.to_string(),
        })?;

    Ok(ProductIdentity {
        mission: mission.to_string(),
        instrument: instrument.to_string(),
        timestamp,
        level: level_from_tokens(basename),
    })
}

// `YYYYMMDDTHHMMSS`, `YYYYMMDD`, `YYYYMMDDYYYYMMDD` and `YYYYMMDD_YYYYMMDD`;
// composite periods resolve to their start date.
fn new_timestamp(token: &str) -> Option<NaiveDateTime> {
    if token.len() >= 15 && token.as_bytes()[8] == b'T' {
        return compact_datetime(token.get(..15)?);
    }
    let date = NaiveDate::parse_from_str(token.get(..8)?, "%Y%m%d").ok()?;
    Some(date.and_time(NaiveTime::MIN))
}

fn compact_datetime(token: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(token, "%Y%m%dT%H%M%S").ok()
}

fn all_digits(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

fn day_of_year_datetime(token: &str) -> Option<NaiveDateTime> {
    if token.len() != 13 || !all_digits(token) {
        return None;
    }
    let year: i32 = token[0..4].parse().ok()?;
    let ordinal: u32 = token[4..7].parse().ok()?;
    let hour: u32 = token[7..9].parse().ok()?;
    let minute: u32 = token[9..11].parse().ok()?;
    let second: u32 = token[11..13].parse().ok()?;

    let date = NaiveDate::from_yo_opt(year, ordinal)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;
    Some(date.and_time(time))
}

fn old_timestamp(basename: &str, field: TimeField) -> Option<NaiveDateTime> {
    match field {
        TimeField::DayOfYear(offset) => day_of_year_datetime(basename.get(offset..offset + 13)?),
        TimeField::Compact(offset) => compact_datetime(basename.get(offset..offset + 15)?),
        TimeField::Underscored => (0..basename.len().saturating_sub(14)).find_map(|start| {
            let window = basename.get(start..start + 15)?;
            NaiveDateTime::parse_from_str(window, "%Y%m%d_%H%M%S").ok()
        }),
        TimeField::DateField(index) => {
            let token = basename.split('_').nth(index)?;
            let date = NaiveDate::parse_from_str(token.get(..8)?, "%Y%m%d").ok()?;
            Some(date.and_time(NaiveTime::MIN))
        }
    }
}

fn level_from_tokens(basename: &str) -> ProcessingLevel {
    for token in basename.split(['.', '_']) {
        let level = match token {
            "L1A" => ProcessingLevel::L1A,
            "L1B" => ProcessingLevel::L1B,
            "L1C" => ProcessingLevel::L1C,
            "L2" => ProcessingLevel::L2,
            // MERIS product types: 1PNPDE, 2PNPDE, 2PRACR, ...
            t if t.starts_with("1P") => ProcessingLevel::L1B,
            t if t.starts_with("2P") => ProcessingLevel::L2,
            "L3b" | "L3B" => ProcessingLevel::L3Binned,
            "L3m" | "L3M" | "smi" | "SMI" | "map" => ProcessingLevel::L3Mapped,
            _ => continue,
        };
        return level;
    }
    ProcessingLevel::Unknown
}
