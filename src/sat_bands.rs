use std::fmt::Display;

use crate::readers::filename::ProductIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Satellites {
    SeaWiFS,
    Modis,
    HawkEye,
    Olci,
    Oli,
    Viirs,
    Msi,
}

impl Satellites {
    /// Sensor family of a parsed product name, if it carries Rrs bands we know.
    pub fn from_identity(identity: &ProductIdentity) -> Option<Self> {
        match identity.instrument.to_ascii_uppercase().as_str() {
            "SEAWIFS" => Some(Satellites::SeaWiFS),
            "MODIS" => Some(Satellites::Modis),
            "HAWKEYE" => Some(Satellites::HawkEye),
            "OLCI" => Some(Satellites::Olci),
            "OLI" => Some(Satellites::Oli),
            "VIIRS" => Some(Satellites::Viirs),
            "MSI" => Some(Satellites::Msi),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct SatBands {
    sensor: Satellites,
    wavelengths: &'static [u32],
}

impl SatBands {
    pub fn new(sensor: Satellites) -> Self {
        // Rrs wavelengths (nm) of the OBPG Level-2 ocean color products
        let wavelengths: &'static [u32] = match sensor {
            Satellites::SeaWiFS => &[412, 443, 490, 510, 555, 670],
            Satellites::Modis => &[412, 443, 469, 488, 531, 547, 555, 645, 667, 678],
            Satellites::HawkEye => &[412, 447, 488, 510, 556, 670],
            Satellites::Olci => &[400, 412, 443, 490, 510, 560, 620, 665, 674, 681, 709],
            Satellites::Oli => &[443, 482, 561, 655],
            Satellites::Viirs => &[410, 443, 486, 551, 671],
            Satellites::Msi => &[443, 492, 560, 665, 704],
        };
        Self {
            sensor,
            wavelengths,
        }
    }

    pub fn sensor(&self) -> Satellites {
        self.sensor
    }

    pub fn wavelengths(&self) -> &[u32] {
        self.wavelengths
    }

    pub fn closest_band(&self, target: u32) -> u32 {
        self.wavelengths
            .iter()
            .copied()
            .min_by_key(|w| (*w as i32 - target as i32).abs())
            .unwrap_or(target)
    }

    /// Maps `Rrs_<nm>` to this sensor's nearest band; other names pass through.
    pub fn resolve_product_name(&self, product: &str) -> String {
        let Some(target) = product
            .strip_prefix("Rrs_")
            .and_then(|nm| nm.parse::<u32>().ok())
        else {
            return product.to_string();
        };
        format!("Rrs_{}", self.closest_band(target))
    }
}

impl Display for Satellites {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Satellites::SeaWiFS => write!(f, "SeaWiFS"),
            Satellites::Modis => write!(f, "MODIS"),
            Satellites::HawkEye => write!(f, "HawkEye"),
            Satellites::Olci => write!(f, "OLCI"),
            Satellites::Oli => write!(f, "OLI"),
            Satellites::Viirs => write!(f, "VIIRS"),
            Satellites::Msi => write!(f, "MSI"),
        }
    }
}

impl Display for SatBands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Satellite: {}, Wavelengths: {:?}",
            self.sensor, self.wavelengths
        )
    }
}
