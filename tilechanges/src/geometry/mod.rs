//! Geometry primitives for change footprints.
//!
//! Footprints are stored as [`MultiPolygon`]s from the `geo` crate. This module
//! adds the axis-aligned [`Envelope`] used by tile coverage math, footprint
//! normalization, and the [`Reprojector`] seam through which geometries move
//! between reference frames.

mod crs;
mod reproject;

pub use crs::{Crs, ParseCrsError, EPSG_WEB_MERCATOR, EPSG_WGS84, METERS_PER_DEGREE};
pub use reproject::{
    BuiltinReprojector, ReprojectError, Reprojector, MAX_MERCATOR_LAT, WEB_MERCATOR_HALF_WORLD,
};

use std::fmt;
use std::str::FromStr;

use geo::{BoundingRect, Coord, Geometry, MultiPolygon, Polygon, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while interpreting caller-supplied geometry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// The geometry has no area (points, lines).
    #[error("footprint must be polygonal, got {0}")]
    NotPolygonal(&'static str),

    #[error("footprint has no polygons")]
    EmptyFootprint,

    /// A bounding box string could not be parsed.
    #[error("invalid bounding box '{0}': expected minx,miny,maxx,maxy")]
    InvalidBbox(String),
}

/// Axis-aligned bounding box in some reference frame.
///
/// An envelope with `min_x > max_x` or `min_y > max_y` is empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    /// Create an envelope from its corners.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// An envelope that contains nothing and absorbs nothing on intersection.
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    /// Bounding envelope of a multipolygon; empty if it has no coordinates.
    pub fn from_multi_polygon(geometry: &MultiPolygon<f64>) -> Self {
        geometry
            .bounding_rect()
            .map(Self::from)
            .unwrap_or_else(Self::empty)
    }

    pub fn is_empty(&self) -> bool {
        !(self.min_x <= self.max_x && self.min_y <= self.max_y)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Intersection of two envelopes, empty when they do not overlap.
    ///
    /// Envelopes that only share an edge intersect in a degenerate (zero
    /// width or height) envelope, which is not empty.
    pub fn intersection(&self, other: &Envelope) -> Envelope {
        let result = Envelope {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        };
        if result.is_empty() {
            Envelope::empty()
        } else {
            result
        }
    }

    /// Grow this envelope to cover `other`.
    pub fn expand_to_include(&mut self, other: &Envelope) {
        if other.is_empty() {
            return;
        }
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Coordinates as `[minx, miny, maxx, maxy]`.
    pub fn to_bbox(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    /// Polygon covering this envelope. `None` for an empty envelope.
    pub fn to_polygon(&self) -> Option<Polygon<f64>> {
        if self.is_empty() {
            return None;
        }
        Some(
            Rect::new(
                Coord {
                    x: self.min_x,
                    y: self.min_y,
                },
                Coord {
                    x: self.max_x,
                    y: self.max_y,
                },
            )
            .to_polygon(),
        )
    }
}

impl From<Rect<f64>> for Envelope {
    fn from(rect: Rect<f64>) -> Self {
        Self {
            min_x: rect.min().x,
            min_y: rect.min().y,
            max_x: rect.max().x,
            max_y: rect.max().y,
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

impl FromStr for Envelope {
    type Err = GeometryError;

    /// Parses `minx,miny,maxx,maxy`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| GeometryError::InvalidBbox(s.to_string()))?;

        match parts.as_slice() {
            [min_x, min_y, max_x, max_y]
                if parts.iter().all(|v| v.is_finite()) && min_x <= max_x && min_y <= max_y =>
            {
                Ok(Envelope::new(*min_x, *min_y, *max_x, *max_y))
            }
            _ => Err(GeometryError::InvalidBbox(s.to_string())),
        }
    }
}

/// Normalize a change geometry into a footprint multipolygon.
///
/// Polygons, rectangles and triangles are wrapped; polygonal members of a
/// geometry collection are flattened. Anything without area is rejected.
pub fn normalize_footprint(geometry: Geometry<f64>) -> Result<MultiPolygon<f64>, GeometryError> {
    let mut polygons = Vec::new();
    collect_polygons(geometry, &mut polygons)?;
    Ok(MultiPolygon::new(polygons))
}

fn collect_polygons(
    geometry: Geometry<f64>,
    out: &mut Vec<Polygon<f64>>,
) -> Result<(), GeometryError> {
    match geometry {
        Geometry::Polygon(p) => out.push(p),
        Geometry::MultiPolygon(mp) => out.extend(mp.0),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for member in gc.0 {
                collect_polygons(member, out)?;
            }
        }
        Geometry::Point(_) => return Err(GeometryError::NotPolygonal("Point")),
        Geometry::MultiPoint(_) => return Err(GeometryError::NotPolygonal("MultiPoint")),
        Geometry::Line(_) => return Err(GeometryError::NotPolygonal("Line")),
        Geometry::LineString(_) => return Err(GeometryError::NotPolygonal("LineString")),
        Geometry::MultiLineString(_) => {
            return Err(GeometryError::NotPolygonal("MultiLineString"))
        }
    }
    Ok(())
}
