//! Spatiotemporal bounding boxes.

use super::TemporalBox;
use crate::error::{Result, TemporalError};
use crate::span::{Span, TsTzSpan};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// A bounding box over the spatial (x, y, optionally z) and time dimensions
/// of a temporal point.
///
/// The spatial dimensions are present together or not at all; the time
/// dimension is independent. Geodetic boxes must not be combined with
/// planar ones, and the SRIDs of two boxes must agree when combined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct STBox {
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
    zmin: f64,
    zmax: f64,
    has_x: bool,
    has_z: bool,
    geodetic: bool,
    srid: i32,
    period: Option<TsTzSpan>,
}

impl STBox {
    /// 2D spatial box.
    pub fn space(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Result<Self> {
        if xmin > xmax || ymin > ymax {
            return Err(TemporalError::InvalidInput(format!(
                "inverted STBox bounds: x [{}, {}], y [{}, {}]",
                xmin, xmax, ymin, ymax
            )));
        }
        Ok(Self {
            xmin,
            xmax,
            ymin,
            ymax,
            zmin: 0.0,
            zmax: 0.0,
            has_x: true,
            has_z: false,
            geodetic: false,
            srid: 0,
            period: None,
        })
    }

    /// 3D spatial box.
    pub fn space_z(
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
        zmin: f64,
        zmax: f64,
    ) -> Result<Self> {
        if zmin > zmax {
            return Err(TemporalError::InvalidInput(format!(
                "inverted STBox bounds: z [{}, {}]",
                zmin, zmax
            )));
        }
        let mut b = Self::space(xmin, xmax, ymin, ymax)?;
        b.zmin = zmin;
        b.zmax = zmax;
        b.has_z = true;
        Ok(b)
    }

    /// Degenerate box of a single positioned instant.
    pub(crate) fn of_point(
        x: f64,
        y: f64,
        z: Option<f64>,
        srid: i32,
        geodetic: bool,
        t: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            xmin: x,
            xmax: x,
            ymin: y,
            ymax: y,
            zmin: z.unwrap_or(0.0),
            zmax: z.unwrap_or(0.0),
            has_x: true,
            has_z: z.is_some(),
            geodetic,
            srid,
            period: Some(Span::instant(t)),
        }
    }

    /// Box with only a time dimension.
    pub fn from_period(period: TsTzSpan) -> Self {
        Self {
            xmin: 0.0,
            xmax: 0.0,
            ymin: 0.0,
            ymax: 0.0,
            zmin: 0.0,
            zmax: 0.0,
            has_x: false,
            has_z: false,
            geodetic: false,
            srid: 0,
            period: Some(period),
        }
    }

    pub fn with_period(mut self, period: TsTzSpan) -> Self {
        self.period = Some(period);
        self
    }

    pub fn with_srid(mut self, srid: i32) -> Self {
        self.srid = srid;
        self
    }

    pub fn with_geodetic(mut self, geodetic: bool) -> Self {
        self.geodetic = geodetic;
        self
    }

    pub fn has_x(&self) -> bool {
        self.has_x
    }

    pub fn has_z(&self) -> bool {
        self.has_z
    }

    pub fn has_t(&self) -> bool {
        self.period.is_some()
    }

    pub fn is_geodetic(&self) -> bool {
        self.geodetic
    }

    pub fn srid(&self) -> i32 {
        self.srid
    }

    pub fn xmin(&self) -> Option<f64> {
        self.has_x.then_some(self.xmin)
    }

    pub fn xmax(&self) -> Option<f64> {
        self.has_x.then_some(self.xmax)
    }

    pub fn ymin(&self) -> Option<f64> {
        self.has_x.then_some(self.ymin)
    }

    pub fn ymax(&self) -> Option<f64> {
        self.has_x.then_some(self.ymax)
    }

    pub fn zmin(&self) -> Option<f64> {
        self.has_z.then_some(self.zmin)
    }

    pub fn zmax(&self) -> Option<f64> {
        self.has_z.then_some(self.zmax)
    }

    pub fn period(&self) -> Option<&TsTzSpan> {
        self.period.as_ref()
    }

    /// Verify SRID, dimensionality, and geodetic compatibility.
    pub fn ensure_compatible(&self, other: &Self) -> Result<()> {
        if self.has_x && other.has_x {
            if self.srid != other.srid {
                return Err(TemporalError::SridMismatch(self.srid, other.srid));
            }
            if self.geodetic != other.geodetic {
                return Err(TemporalError::GeodeticMismatch);
            }
        }
        Ok(())
    }

    /// Dimensions present on both sides: (space, z, time).
    fn common_dims(&self, other: &Self) -> Result<(bool, bool, bool)> {
        self.ensure_compatible(other)?;
        let space = self.has_x && other.has_x;
        let z = self.has_z && other.has_z;
        let time = self.period.is_some() && other.period.is_some();
        if !space && !time {
            return Err(TemporalError::TypeMismatch(
                "the boxes share no dimension".to_string(),
            ));
        }
        Ok((space, z, time))
    }

    pub fn contains(&self, other: &Self) -> Result<bool> {
        let (space, z, time) = self.common_dims(other)?;
        let mut ok = true;
        if space {
            ok &= self.xmin <= other.xmin
                && self.xmax >= other.xmax
                && self.ymin <= other.ymin
                && self.ymax >= other.ymax;
        }
        if z {
            ok &= self.zmin <= other.zmin && self.zmax >= other.zmax;
        }
        if time {
            if let (Some(a), Some(b)) = (&self.period, &other.period) {
                ok &= a.contains_span(b);
            }
        }
        Ok(ok)
    }

    pub fn contained_in(&self, other: &Self) -> Result<bool> {
        other.contains(self)
    }

    pub fn overlaps(&self, other: &Self) -> Result<bool> {
        let (space, z, time) = self.common_dims(other)?;
        let mut ok = true;
        if space {
            ok &= self.xmin <= other.xmax
                && self.xmax >= other.xmin
                && self.ymin <= other.ymax
                && self.ymax >= other.ymin;
        }
        if z {
            ok &= self.zmin <= other.zmax && self.zmax >= other.zmin;
        }
        if time {
            if let (Some(a), Some(b)) = (&self.period, &other.period) {
                ok &= a.overlaps(b);
            }
        }
        Ok(ok)
    }

    pub fn same(&self, other: &Self) -> Result<bool> {
        let (space, z, time) = self.common_dims(other)?;
        let mut ok = true;
        if space {
            ok &= self.xmin == other.xmin
                && self.xmax == other.xmax
                && self.ymin == other.ymin
                && self.ymax == other.ymax;
        }
        if z {
            ok &= self.zmin == other.zmin && self.zmax == other.zmax;
        }
        if time {
            ok &= self.period == other.period;
        }
        Ok(ok)
    }

    /// Whether the boxes touch without sharing interior points.
    pub fn adjacent(&self, other: &Self) -> Result<bool> {
        let (space, z, time) = self.common_dims(other)?;
        if !self.overlaps(other)? {
            // Disjoint closures cannot be adjacent; test the closure touch.
            let mut touch = false;
            if space {
                if self.xmax < other.xmin
                    || other.xmax < self.xmin
                    || self.ymax < other.ymin
                    || other.ymax < self.ymin
                {
                    return Ok(false);
                }
                touch = true;
            }
            if z && (self.zmax < other.zmin || other.zmax < self.zmin) {
                return Ok(false);
            }
            if time {
                if let (Some(a), Some(b)) = (&self.period, &other.period) {
                    if !a.overlaps(b) && !a.adjacent(b) {
                        return Ok(false);
                    }
                    touch = true;
                }
            }
            return Ok(touch);
        }
        // Overlapping closures are adjacent only when they meet at a border.
        let mut border = false;
        if space {
            border |= self.xmax == other.xmin
                || other.xmax == self.xmin
                || self.ymax == other.ymin
                || other.ymax == self.ymin;
        }
        if z {
            border |= self.zmax == other.zmin || other.zmax == self.zmin;
        }
        if time {
            if let (Some(a), Some(b)) = (&self.period, &other.period) {
                border |= a.adjacent(b);
            }
        }
        Ok(border)
    }

    fn ensure_space(&self, other: &Self) -> Result<()> {
        self.ensure_compatible(other)?;
        if !(self.has_x && other.has_x) {
            return Err(TemporalError::TypeMismatch(
                "both boxes must have spatial dimensions".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_z(&self, other: &Self) -> Result<()> {
        self.ensure_space(other)?;
        if !(self.has_z && other.has_z) {
            return Err(TemporalError::DimensionalityMismatch);
        }
        Ok(())
    }

    fn time_pair(&self, other: &Self) -> Result<(TsTzSpan, TsTzSpan)> {
        match (self.period, other.period) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(TemporalError::TypeMismatch(
                "both boxes must have a time dimension".to_string(),
            )),
        }
    }

    pub fn is_left(&self, other: &Self) -> Result<bool> {
        self.ensure_space(other)?;
        Ok(self.xmax < other.xmin)
    }

    pub fn is_over_left(&self, other: &Self) -> Result<bool> {
        self.ensure_space(other)?;
        Ok(self.xmax <= other.xmax)
    }

    pub fn is_right(&self, other: &Self) -> Result<bool> {
        self.ensure_space(other)?;
        Ok(self.xmin > other.xmax)
    }

    pub fn is_over_right(&self, other: &Self) -> Result<bool> {
        self.ensure_space(other)?;
        Ok(self.xmin >= other.xmin)
    }

    pub fn is_below(&self, other: &Self) -> Result<bool> {
        self.ensure_space(other)?;
        Ok(self.ymax < other.ymin)
    }

    pub fn is_over_below(&self, other: &Self) -> Result<bool> {
        self.ensure_space(other)?;
        Ok(self.ymax <= other.ymax)
    }

    pub fn is_above(&self, other: &Self) -> Result<bool> {
        self.ensure_space(other)?;
        Ok(self.ymin > other.ymax)
    }

    pub fn is_over_above(&self, other: &Self) -> Result<bool> {
        self.ensure_space(other)?;
        Ok(self.ymin >= other.ymin)
    }

    pub fn is_front(&self, other: &Self) -> Result<bool> {
        self.ensure_z(other)?;
        Ok(self.zmax < other.zmin)
    }

    pub fn is_over_front(&self, other: &Self) -> Result<bool> {
        self.ensure_z(other)?;
        Ok(self.zmax <= other.zmax)
    }

    pub fn is_back(&self, other: &Self) -> Result<bool> {
        self.ensure_z(other)?;
        Ok(self.zmin > other.zmax)
    }

    pub fn is_over_back(&self, other: &Self) -> Result<bool> {
        self.ensure_z(other)?;
        Ok(self.zmin >= other.zmin)
    }

    pub fn is_before(&self, other: &Self) -> Result<bool> {
        let (a, b) = self.time_pair(other)?;
        Ok(a.is_left(&b))
    }

    pub fn is_over_before(&self, other: &Self) -> Result<bool> {
        let (a, b) = self.time_pair(other)?;
        Ok(a.is_over_left(&b))
    }

    pub fn is_after(&self, other: &Self) -> Result<bool> {
        let (a, b) = self.time_pair(other)?;
        Ok(a.is_right(&b))
    }

    pub fn is_over_after(&self, other: &Self) -> Result<bool> {
        let (a, b) = self.time_pair(other)?;
        Ok(a.is_over_right(&b))
    }

    /// Bounding union; both inputs must carry the same dimensions.
    pub fn union(&self, other: &Self) -> Result<Self> {
        self.ensure_compatible(other)?;
        if self.has_x != other.has_x
            || self.has_z != other.has_z
            || self.period.is_some() != other.period.is_some()
        {
            return Err(TemporalError::TypeMismatch(
                "cannot union boxes with different dimensions".to_string(),
            ));
        }
        let mut out = *self;
        out.expand(other);
        Ok(out)
    }

    /// Intersection over common dimensions; `None` when disjoint.
    pub fn intersection(&self, other: &Self) -> Result<Option<Self>> {
        let (space, z, time) = self.common_dims(other)?;
        let mut out = *self;
        out.has_x = space;
        out.has_z = z;
        if space {
            out.xmin = self.xmin.max(other.xmin);
            out.xmax = self.xmax.min(other.xmax);
            out.ymin = self.ymin.max(other.ymin);
            out.ymax = self.ymax.min(other.ymax);
            if out.xmin > out.xmax || out.ymin > out.ymax {
                return Ok(None);
            }
        }
        if z {
            out.zmin = self.zmin.max(other.zmin);
            out.zmax = self.zmax.min(other.zmax);
            if out.zmin > out.zmax {
                return Ok(None);
            }
        }
        out.period = if time {
            match (self.period, other.period) {
                (Some(a), Some(b)) => match a.intersection(&b) {
                    Some(p) => Some(p),
                    None => return Ok(None),
                },
                _ => None,
            }
        } else {
            None
        };
        Ok(Some(out))
    }

    /// Inflate the spatial dimensions by a distance.
    pub fn expand_space(&self, margin: f64) -> Result<Self> {
        if !self.has_x {
            return Err(TemporalError::TypeMismatch(
                "the box has no spatial dimensions".to_string(),
            ));
        }
        let mut out = *self;
        out.xmin -= margin;
        out.xmax += margin;
        out.ymin -= margin;
        out.ymax += margin;
        if out.has_z {
            out.zmin -= margin;
            out.zmax += margin;
        }
        Ok(out)
    }

    /// Round the spatial bounds to `digits` decimal digits.
    pub fn round(&self, digits: u32) -> Self {
        let factor = 10f64.powi(digits as i32);
        let r = |v: f64| (v * factor).round() / factor;
        let mut out = *self;
        if out.has_x {
            out.xmin = r(out.xmin);
            out.xmax = r(out.xmax);
            out.ymin = r(out.ymin);
            out.ymax = r(out.ymax);
        }
        if out.has_z {
            out.zmin = r(out.zmin);
            out.zmax = r(out.zmax);
        }
        out
    }

    /// Inflate the time dimension by a duration.
    pub fn expand_time(&self, margin: TimeDelta) -> Result<Self> {
        let period = self.period.ok_or_else(|| {
            TemporalError::TypeMismatch("the box has no time dimension".to_string())
        })?;
        let mut out = *self;
        out.period = Some(Span::from_parts(
            period.lower() - margin,
            period.upper() + margin,
            period.lower_inc(),
            period.upper_inc(),
        ));
        Ok(out)
    }
}

impl TemporalBox for STBox {
    fn expand(&mut self, other: &Self) {
        if other.has_x {
            if self.has_x {
                self.xmin = self.xmin.min(other.xmin);
                self.xmax = self.xmax.max(other.xmax);
                self.ymin = self.ymin.min(other.ymin);
                self.ymax = self.ymax.max(other.ymax);
            } else {
                self.xmin = other.xmin;
                self.xmax = other.xmax;
                self.ymin = other.ymin;
                self.ymax = other.ymax;
                self.has_x = true;
                self.srid = other.srid;
                self.geodetic = other.geodetic;
            }
        }
        if other.has_z {
            if self.has_z {
                self.zmin = self.zmin.min(other.zmin);
                self.zmax = self.zmax.max(other.zmax);
            } else {
                self.zmin = other.zmin;
                self.zmax = other.zmax;
                self.has_z = true;
            }
        }
        self.period = match (self.period, other.period) {
            (Some(a), Some(b)) => Some(a.hull(&b)),
            (a, b) => a.or(b),
        };
    }

    fn period(&self) -> Option<&TsTzSpan> {
        self.period.as_ref()
    }

    fn set_period(&mut self, period: TsTzSpan) {
        self.period = Some(period);
    }
}
