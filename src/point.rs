//! The spatial point base type.
//!
//! A [`PointValue`] is a 2D or 3D position with an SRID and a geodetic
//! flag. Planar measures use Euclidean geometry; geodetic measures use the
//! spherical formulas of the `geo` crate. All binary operators between two
//! spatial values verify SRID, dimensionality, and geodetic compatibility
//! before any computation.

use crate::base::{BaseValue, EPSILON};
use crate::boxes::STBox;
use crate::error::{Result, TemporalError};
use chrono::{DateTime, Utc};
use geo::{Bearing, Distance, Euclidean, Haversine, InterpolatePoint, Point};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Default SRID for geodetic coordinates (WGS 84).
pub const WGS84_SRID: i32 = 4326;

/// A 2D/3D point with spatial metadata.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointValue {
    x: f64,
    y: f64,
    z: Option<f64>,
    srid: i32,
    geodetic: bool,
}

impl PointValue {
    /// Planar 2D point with no SRID.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            z: None,
            srid: 0,
            geodetic: false,
        }
    }

    /// Planar 3D point with no SRID.
    pub fn new_z(x: f64, y: f64, z: f64) -> Self {
        Self {
            z: Some(z),
            ..Self::new(x, y)
        }
    }

    /// Geodetic 2D point (lon/lat on WGS 84).
    pub fn geog(lon: f64, lat: f64) -> Self {
        Self {
            x: lon,
            y: lat,
            z: None,
            srid: WGS84_SRID,
            geodetic: true,
        }
    }

    /// Geodetic 3D point (lon/lat/altitude on WGS 84).
    pub fn geog_z(lon: f64, lat: f64, alt: f64) -> Self {
        Self {
            z: Some(alt),
            ..Self::geog(lon, lat)
        }
    }

    pub fn with_srid(mut self, srid: i32) -> Self {
        self.srid = srid;
        self
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn z(&self) -> Option<f64> {
        self.z
    }

    pub fn has_z(&self) -> bool {
        self.z.is_some()
    }

    pub fn srid(&self) -> i32 {
        self.srid
    }

    pub fn is_geodetic(&self) -> bool {
        self.geodetic
    }

    /// 2D projection as a `geo` point.
    pub fn to_point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Build from a `geo` point, keeping this point's metadata.
    pub(crate) fn with_coords(&self, p: Point, z: Option<f64>) -> Self {
        Self {
            x: p.x(),
            y: p.y(),
            z,
            srid: self.srid,
            geodetic: self.geodetic,
        }
    }

    /// Distance to another point: meters for geodetic values, coordinate
    /// units for planar ones. The vertical component, when present, is
    /// combined by the Pythagorean rule.
    pub fn distance(&self, other: &Self) -> Result<f64> {
        self.ensure_compatible(other)?;
        let planar = if self.geodetic {
            Haversine.distance(self.to_point(), other.to_point())
        } else {
            Euclidean.distance(self.to_point(), other.to_point())
        };
        Ok(match (self.z, other.z) {
            (Some(z1), Some(z2)) => planar.hypot(z2 - z1),
            _ => planar,
        })
    }

    /// Bearing towards another point, in radians clockwise from north.
    ///
    /// `None` when the 2D positions coincide.
    pub fn azimuth(&self, other: &Self) -> Result<Option<f64>> {
        self.ensure_compatible(other)?;
        if self.x == other.x && self.y == other.y {
            return Ok(None);
        }
        let radians = if self.geodetic {
            Haversine
                .bearing(self.to_point(), other.to_point())
                .to_radians()
        } else {
            let az = (other.x - self.x).atan2(other.y - self.y);
            if az < 0.0 {
                az + 2.0 * std::f64::consts::PI
            } else {
                az
            }
        };
        Ok(Some(radians))
    }

    fn interpolate_coords(&self, other: &Self, ratio: f64) -> Self {
        let p = if self.geodetic {
            Haversine.point_at_ratio_between(self.to_point(), other.to_point(), ratio)
        } else {
            Point::new(
                self.x + (other.x - self.x) * ratio,
                self.y + (other.y - self.y) * ratio,
            )
        };
        let z = match (self.z, other.z) {
            (Some(z1), Some(z2)) => Some(z1 + (z2 - z1) * ratio),
            _ => None,
        };
        self.with_coords(p, z)
    }

    /// Coordinate-space distance, used only for tolerance checks.
    fn coord_distance(&self, other: &Self) -> f64 {
        let dz = match (self.z, other.z) {
            (Some(z1), Some(z2)) => z2 - z1,
            _ => 0.0,
        };
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2) + dz.powi(2)).sqrt()
    }
}

impl BaseValue for PointValue {
    type Bbox = STBox;
    const CONTINUOUS: bool = true;
    const NAME: &'static str = "point";

    fn validate(&self) -> Result<()> {
        if !self.x.is_finite() || !self.y.is_finite() || self.z.is_some_and(|z| !z.is_finite()) {
            return Err(TemporalError::InvalidInput(format!(
                "point coordinates must be finite: ({}, {}, {:?})",
                self.x, self.y, self.z
            )));
        }
        if self.geodetic {
            if !(-180.0..=180.0).contains(&self.x) {
                return Err(TemporalError::InvalidInput(format!(
                    "longitude out of range [-180, 180]: {}",
                    self.x
                )));
            }
            if !(-90.0..=90.0).contains(&self.y) {
                return Err(TemporalError::InvalidInput(format!(
                    "latitude out of range [-90, 90]: {}",
                    self.y
                )));
            }
        }
        Ok(())
    }

    fn ensure_compatible(&self, other: &Self) -> Result<()> {
        if self.srid != other.srid {
            return Err(TemporalError::SridMismatch(self.srid, other.srid));
        }
        if self.has_z() != other.has_z() {
            return Err(TemporalError::DimensionalityMismatch);
        }
        if self.geodetic != other.geodetic {
            return Err(TemporalError::GeodeticMismatch);
        }
        Ok(())
    }

    fn interpolate(&self, other: &Self, ratio: f64) -> Self {
        self.interpolate_coords(other, ratio)
    }

    fn collinear(first: &Self, mid: &Self, last: &Self, ratio: f64) -> bool {
        let on_segment = first.interpolate_coords(last, ratio);
        mid.coord_distance(&on_segment) <= EPSILON
    }

    fn segment_locate(start: &Self, end: &Self, target: &Self) -> Option<f64> {
        let dx = end.x - start.x;
        let dy = end.y - start.y;
        let dz = match (start.z, end.z) {
            (Some(z1), Some(z2)) => z2 - z1,
            _ => 0.0,
        };
        let tz = match (start.z, target.z) {
            (Some(z1), Some(z2)) => z2 - z1,
            _ => 0.0,
        };
        let len2 = dx * dx + dy * dy + dz * dz;
        if len2 <= EPSILON {
            return if target.coord_distance(start) <= EPSILON {
                Some(0.0)
            } else {
                None
            };
        }
        let ratio =
            ((target.x - start.x) * dx + (target.y - start.y) * dy + tz * dz) / len2;
        if !(0.0..=1.0).contains(&ratio) {
            return None;
        }
        let closest = start.interpolate_coords(end, ratio);
        if target.coord_distance(&closest) <= EPSILON {
            Some(ratio)
        } else {
            None
        }
    }

    fn value_cross(a1: &Self, a2: &Self, b1: &Self, b2: &Self) -> Option<f64> {
        // Relative motion of the two segment endpoints: the points meet
        // where the squared distance, a quadratic in the ratio, reaches a
        // near-zero minimum.
        let wx = a1.x - b1.x;
        let wy = a1.y - b1.y;
        let wz = match (a1.z, b1.z) {
            (Some(za), Some(zb)) => za - zb,
            _ => 0.0,
        };
        let vx = (a2.x - a1.x) - (b2.x - b1.x);
        let vy = (a2.y - a1.y) - (b2.y - b1.y);
        let vz = match (a1.z, a2.z, b1.z, b2.z) {
            (Some(za1), Some(za2), Some(zb1), Some(zb2)) => (za2 - za1) - (zb2 - zb1),
            _ => 0.0,
        };
        let len2 = vx * vx + vy * vy + vz * vz;
        if len2 <= EPSILON {
            return None;
        }
        let ratio = -(wx * vx + wy * vy + wz * vz) / len2;
        if ratio <= 0.0 || ratio >= 1.0 {
            return None;
        }
        let dx = wx + ratio * vx;
        let dy = wy + ratio * vy;
        let dz = wz + ratio * vz;
        if (dx * dx + dy * dy + dz * dz).sqrt() <= EPSILON {
            Some(ratio)
        } else {
            None
        }
    }

    fn gap_distance(&self, other: &Self) -> Option<f64> {
        self.distance(other).ok()
    }

    fn hash_value<H: Hasher>(&self, state: &mut H) {
        self.x.to_bits().hash(state);
        self.y.to_bits().hash(state);
        if let Some(z) = self.z {
            z.to_bits().hash(state);
        }
        self.srid.hash(state);
        self.geodetic.hash(state);
    }

    fn instant_box(&self, t: DateTime<Utc>) -> STBox {
        STBox::of_point(self.x, self.y, self.z, self.srid, self.geodetic, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_geodetic_ranges() {
        assert!(PointValue::geog(-74.0060, 40.7128).validate().is_ok());
        assert!(PointValue::geog(200.0, 40.0).validate().is_err());
        assert!(PointValue::geog(-74.0, 95.0).validate().is_err());
        assert!(PointValue::new(1e7, -1e7).validate().is_ok());
        assert!(PointValue::new(f64::NAN, 0.0).validate().is_err());
    }

    #[test]
    fn test_compatibility_checks() {
        let planar = PointValue::new(0.0, 0.0);
        let geodetic = PointValue::geog(0.0, 0.0);
        assert!(matches!(
            planar.distance(&geodetic),
            Err(TemporalError::SridMismatch(0, WGS84_SRID))
        ));

        let p2 = PointValue::new(1.0, 1.0);
        let p3 = PointValue::new_z(1.0, 1.0, 1.0);
        assert!(matches!(
            p2.distance(&p3),
            Err(TemporalError::DimensionalityMismatch)
        ));
    }

    #[test]
    fn test_planar_distance() {
        let a = PointValue::new(0.0, 0.0);
        let b = PointValue::new(3.0, 4.0);
        assert_eq!(a.distance(&b).unwrap(), 5.0);

        let a = PointValue::new_z(0.0, 0.0, 0.0);
        let b = PointValue::new_z(3.0, 4.0, 12.0);
        assert_eq!(a.distance(&b).unwrap(), 13.0);
    }

    #[test]
    fn test_geodetic_distance() {
        let nyc = PointValue::geog(-74.0060, 40.7128);
        let la = PointValue::geog(-118.2437, 34.0522);
        let dist = nyc.distance(&la).unwrap();
        assert!(dist > 3_900_000.0 && dist < 4_000_000.0);
    }

    #[test]
    fn test_planar_azimuth() {
        let a = PointValue::new(0.0, 0.0);
        let north = PointValue::new(0.0, 1.0);
        let east = PointValue::new(1.0, 0.0);
        assert!(a.azimuth(&north).unwrap().unwrap().abs() < 1e-12);
        assert!(
            (a.azimuth(&east).unwrap().unwrap() - std::f64::consts::FRAC_PI_2).abs() < 1e-12
        );
        assert!(a.azimuth(&a).unwrap().is_none());
    }

    #[test]
    fn test_interpolate_planar() {
        let a = PointValue::new(0.0, 0.0);
        let b = PointValue::new(10.0, 20.0);
        let mid = a.interpolate(&b, 0.5);
        assert_eq!((mid.x(), mid.y()), (5.0, 10.0));
    }

    #[test]
    fn test_segment_locate() {
        let a = PointValue::new(0.0, 0.0);
        let b = PointValue::new(10.0, 0.0);
        let on = PointValue::new(2.5, 0.0);
        let off = PointValue::new(2.5, 1.0);
        assert_eq!(PointValue::segment_locate(&a, &b, &on), Some(0.25));
        assert_eq!(PointValue::segment_locate(&a, &b, &off), None);
    }

    #[test]
    fn test_value_cross() {
        // Two points moving towards each other along the x axis meet midway.
        let a1 = PointValue::new(0.0, 0.0);
        let a2 = PointValue::new(10.0, 0.0);
        let b1 = PointValue::new(10.0, 0.0);
        let b2 = PointValue::new(0.0, 0.0);
        let ratio = PointValue::value_cross(&a1, &a2, &b1, &b2).unwrap();
        assert!((ratio - 0.5).abs() < 1e-12);

        // Parallel motion never meets.
        let c1 = PointValue::new(0.0, 1.0);
        let c2 = PointValue::new(10.0, 1.0);
        assert_eq!(PointValue::value_cross(&a1, &a2, &c1, &c2), None);
    }
}
