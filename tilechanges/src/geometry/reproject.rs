//! Reprojection between reference frames.
//!
//! Reprojection math is a collaborator of the change pipeline, not part of
//! it: the store and resolver only see the [`Reprojector`] trait. The
//! built-in implementation covers the two frames used by the built-in tile
//! matrix sets, geographic WGS84 and spherical Web Mercator.

use std::f64::consts::PI;

use geo::{Coord, MapCoords, MultiPolygon};
use thiserror::Error;

use super::Crs;

/// Radius of the Web Mercator sphere in meters.
const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitude limit of the square Web Mercator world.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Half the width of the Web Mercator world in meters.
pub const WEB_MERCATOR_HALF_WORLD: f64 = PI * EARTH_RADIUS;

/// Errors raised by a [`Reprojector`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReprojectError {
    /// No transform is known between the two frames.
    #[error("no transform from {from} to {to}")]
    Unsupported { from: Crs, to: Crs },

    /// A coordinate is outside the source frame's valid domain.
    #[error("coordinate ({x}, {y}) is invalid in {crs}")]
    InvalidCoordinate { x: f64, y: f64, crs: Crs },
}

/// Transforms footprints between coordinate reference systems.
///
/// Implementations must be thread safe; a single reprojector is shared by the
/// checkpoint store and the region resolver.
pub trait Reprojector: Send + Sync {
    /// Transform `geometry` from `from` into `to`.
    fn reproject(
        &self,
        geometry: &MultiPolygon<f64>,
        from: Crs,
        to: Crs,
    ) -> Result<MultiPolygon<f64>, ReprojectError>;
}

/// Identity plus WGS84 <-> Web Mercator.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinReprojector;

impl BuiltinReprojector {
    pub fn new() -> Self {
        Self
    }
}

impl Reprojector for BuiltinReprojector {
    fn reproject(
        &self,
        geometry: &MultiPolygon<f64>,
        from: Crs,
        to: Crs,
    ) -> Result<MultiPolygon<f64>, ReprojectError> {
        if from == to {
            return Ok(geometry.clone());
        }
        match (from, to) {
            (Crs::WGS84, Crs::WEB_MERCATOR) => geometry.try_map_coords(wgs84_to_mercator),
            (Crs::WEB_MERCATOR, Crs::WGS84) => geometry.try_map_coords(mercator_to_wgs84),
            _ => Err(ReprojectError::Unsupported { from, to }),
        }
    }
}

/// Forward Web Mercator. Latitude is clamped to the square-world limit.
fn wgs84_to_mercator(c: Coord<f64>) -> Result<Coord<f64>, ReprojectError> {
    let (lon, lat) = (c.x, c.y);
    if !lon.is_finite() || !lat.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(ReprojectError::InvalidCoordinate {
            x: lon,
            y: lat,
            crs: Crs::WGS84,
        });
    }

    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let lat_rad = lat * PI / 180.0;

    Ok(Coord {
        x: lon * PI / 180.0 * EARTH_RADIUS,
        y: lat_rad.tan().asinh() * EARTH_RADIUS,
    })
}

fn mercator_to_wgs84(c: Coord<f64>) -> Result<Coord<f64>, ReprojectError> {
    if !c.x.is_finite() || !c.y.is_finite() {
        return Err(ReprojectError::InvalidCoordinate {
            x: c.x,
            y: c.y,
            crs: Crs::WEB_MERCATOR,
        });
    }

    let lon = c.x / EARTH_RADIUS * 180.0 / PI;
    let lat = (c.y / EARTH_RADIUS).sinh().atan() * 180.0 / PI;

    Ok(Coord { x: lon, y: lat })
}
