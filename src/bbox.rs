use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BoundsError {
    #[error("Longitude values must be between -180 and 180 (east={east}, west={west})")]
    Longitude { east: f64, west: f64 },
    #[error("Latitude values must be between -90 and 90 (north={north}, south={south})")]
    Latitude { north: f64, south: f64 },
    #[error("degenerate bounds (north={north}, south={south}, east={east}, west={west})")]
    Degenerate {
        north: f64,
        south: f64,
        east: f64,
        west: f64,
    },
    #[error("north ({north}) must be greater than south ({south})")]
    LatitudeOrder { north: f64, south: f64 },
    #[error("east ({east}) must be greater than west ({west})")]
    LongitudeOrder { east: f64, west: f64 },
}

/// Geographic extent of an equirectangular raster, in degrees.
///
/// Always constructed through [`GeoBounds::new`], so `north > south` and
/// `east > west` hold for every value of this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    north: f64,
    south: f64,
    east: f64,
    west: f64,
}

impl GeoBounds {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self, BoundsError> {
        if !(-180.0..=180.0).contains(&east) || !(-180.0..=180.0).contains(&west) {
            return Err(BoundsError::Longitude { east, west });
        }

        if !(-90.0..=90.0).contains(&north) || !(-90.0..=90.0).contains(&south) {
            return Err(BoundsError::Latitude { north, south });
        }

        if north == south || east == west {
            return Err(BoundsError::Degenerate {
                north,
                south,
                east,
                west,
            });
        }

        if north < south {
            return Err(BoundsError::LatitudeOrder { north, south });
        }

        if east < west {
            return Err(BoundsError::LongitudeOrder { east, west });
        }

        Ok(GeoBounds {
            north,
            south,
            east,
            west,
        })
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.south..=self.north).contains(&lat) && (self.west..=self.east).contains(&lon)
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.north + self.south) / 2.0,
            (self.east + self.west) / 2.0,
        )
    }
}

impl fmt::Display for GeoBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "N {:.4} S {:.4} E {:.4} W {:.4}",
            self.north, self.south, self.east, self.west
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_bounds_coords_are_within_ranges() {
        let valid = GeoBounds::new(34.25, 34.10, -77.70, -77.85);
        assert!(valid.is_ok());

        // Longitude out of range
        assert!(GeoBounds::new(10.0, 0.0, 0.0, -200.0).is_err());
        assert!(GeoBounds::new(10.0, 0.0, 200.0, 0.0).is_err());

        // Latitude out of range
        assert!(GeoBounds::new(100.0, 0.0, 10.0, 0.0).is_err());
        assert!(GeoBounds::new(10.0, -100.0, 10.0, 0.0).is_err());
    }

    #[test]
    fn test_degenerate_and_inverted_bounds_are_rejected() {
        assert_eq!(
            GeoBounds::new(34.1, 34.1, -77.7, -77.85),
            Err(BoundsError::Degenerate {
                north: 34.1,
                south: 34.1,
                east: -77.7,
                west: -77.85
            })
        );
        assert!(matches!(
            GeoBounds::new(34.25, 34.1, -77.7, -77.7),
            Err(BoundsError::Degenerate { .. })
        ));
        assert_eq!(
            GeoBounds::new(34.1, 34.25, -77.7, -77.85),
            Err(BoundsError::LatitudeOrder {
                north: 34.1,
                south: 34.25
            })
        );
        assert_eq!(
            GeoBounds::new(34.25, 34.1, -77.85, -77.7),
            Err(BoundsError::LongitudeOrder {
                east: -77.85,
                west: -77.7
            })
        );
    }

    #[test]
    fn test_contains_and_center() {
        let bounds = GeoBounds::new(34.25, 34.10, -77.70, -77.85).unwrap();
        let (lat, lon) = bounds.center();
        assert!(bounds.contains(lat, lon));
        assert!(!bounds.contains(40.0, lon));
    }
}
