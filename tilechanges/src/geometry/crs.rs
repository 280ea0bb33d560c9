//! Coordinate reference system identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// EPSG code of geographic WGS84 (lat/lon degrees).
pub const EPSG_WGS84: u32 = 4326;

/// EPSG code of spherical Web Mercator.
pub const EPSG_WEB_MERCATOR: u32 = 3857;

/// Meters covered by one degree at the equator of the WGS84 ellipsoid.
///
/// Used as the meters-per-unit factor for geographic systems when converting
/// scale denominators to ground resolution.
pub const METERS_PER_DEGREE: f64 = 111_319.490_793_273_57;

/// A coordinate reference system, identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs {
    epsg: u32,
}

impl Crs {
    /// Geographic WGS84.
    pub const WGS84: Crs = Crs { epsg: EPSG_WGS84 };

    /// Spherical Web Mercator.
    pub const WEB_MERCATOR: Crs = Crs {
        epsg: EPSG_WEB_MERCATOR,
    };

    /// Create a CRS from an EPSG code.
    pub const fn epsg(code: u32) -> Self {
        Self { epsg: code }
    }

    /// The EPSG code.
    pub fn code(&self) -> u32 {
        self.epsg
    }

    /// Whether coordinates are expressed in degrees.
    pub fn is_geographic(&self) -> bool {
        self.epsg == EPSG_WGS84
    }

    /// Identifier used in change summaries.
    ///
    /// Geographic WGS84 is reported with its OGC URN short form, everything
    /// else as `EPSG:<code>`.
    pub fn identifier(&self) -> String {
        if self.is_geographic() {
            "OGC:1.3:CRS84".to_string()
        } else {
            format!("EPSG:{}", self.epsg)
        }
    }

    /// Ground meters per CRS unit.
    pub fn meters_per_unit(&self) -> f64 {
        if self.is_geographic() {
            METERS_PER_DEGREE
        } else {
            1.0
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// Error returned when a CRS identifier cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized CRS identifier: {0}")]
pub struct ParseCrsError(pub String);

impl FromStr for Crs {
    type Err = ParseCrsError;

    /// Accepts `EPSG:<code>`, a bare code, and the CRS84 aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper == "CRS84" || upper == "OGC:1.3:CRS84" || upper.ends_with("OGC/1.3/CRS84") {
            return Ok(Crs::WGS84);
        }

        let code = upper.strip_prefix("EPSG:").unwrap_or(&upper);
        code.parse::<u32>()
            .map(Crs::epsg)
            .map_err(|_| ParseCrsError(trimmed.to_string()))
    }
}
