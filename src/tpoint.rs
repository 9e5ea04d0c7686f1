//! Temporal points: the spatial specialization of temporal values.
//!
//! A [`TPoint`] carries the SRID, dimensionality, and geodetic flag of its
//! positions. Beyond the generic temporal operations it exposes the
//! trajectory, metric derivatives (length, speed, azimuth), the
//! time-weighted centroid, simplicity handling, and restriction by
//! geometry or spatiotemporal box. Geometry restriction is planar; it
//! fails on geodetic input.

use crate::base::{BaseValue, EPSILON};
use crate::boxes::STBox;
use crate::error::{Result, TemporalError};
use crate::point::PointValue;
use crate::span::{Span, TsTzSpan};
use crate::spanset::TsTzSpanSet;
use crate::temporal::agg::TCentroidAgg;
use crate::temporal::lift::{LiftedBinary, lift_binary, lift_unary};
use crate::temporal::{TInstant, TInterpolation, TSequence, Temporal};
use crate::temporal::restrict::time_at_ratio;
use geo::line_intersection::{LineIntersection, line_intersection};
use geo::{Geometry, Intersects, Line, LineString, MultiLineString, MultiPoint, Point, Polygon};
use smallvec::SmallVec;

/// A temporal point.
pub type TPoint = Temporal<PointValue>;

impl Temporal<PointValue> {
    pub fn srid(&self) -> i32 {
        self.start_instant().value().srid()
    }

    pub fn has_z(&self) -> bool {
        self.start_instant().value().has_z()
    }

    pub fn is_geodetic(&self) -> bool {
        self.start_instant().value().is_geodetic()
    }

    /// Replace the SRID on every position.
    pub fn set_srid(&self, srid: i32) -> Result<Self> {
        lift_unary(self, |p| p.with_srid(srid))
    }

    /// The spatiotemporal bounding box.
    pub fn stbox(&self) -> STBox {
        self.bbox()
    }

    /// Bounding box inflated spatially by `margin`.
    pub fn expand_space(&self, margin: f64) -> Result<STBox> {
        self.bbox().expand_space(margin)
    }

    fn sequences_ref(&self) -> Vec<&TSequence<PointValue>> {
        match self {
            Temporal::Sequence(s) => vec![s],
            Temporal::SequenceSet(s) => s.sequences().iter().collect(),
            _ => vec![],
        }
    }

    /// The geometric trace: a line merge of the linear segments, or the
    /// set of visited positions for discrete and step interpolation.
    pub fn trajectory(&self) -> Geometry<f64> {
        if self.interpolation() == TInterpolation::Linear {
            let mut lines: Vec<LineString> = Vec::new();
            let mut points: Vec<Point> = Vec::new();
            for seq in self.sequences_ref() {
                let mut coords: Vec<geo::Coord> = Vec::with_capacity(seq.num_instants());
                for inst in seq.instants() {
                    let c = geo::coord! { x: inst.value().x(), y: inst.value().y() };
                    if coords.last() != Some(&c) {
                        coords.push(c);
                    }
                }
                if coords.len() == 1 {
                    points.push(Point::from(coords[0]));
                } else {
                    lines.push(LineString::new(coords));
                }
            }
            return match (points.len(), lines.len()) {
                (1, 0) => Geometry::Point(points.remove(0)),
                (0, 1) => Geometry::LineString(lines.remove(0)),
                (0, _) => Geometry::MultiLineString(MultiLineString::new(lines)),
                (_, 0) => Geometry::MultiPoint(MultiPoint::new(points)),
                _ => Geometry::GeometryCollection(geo::GeometryCollection::new_from(
                    points
                        .into_iter()
                        .map(Geometry::Point)
                        .chain(lines.into_iter().map(Geometry::LineString))
                        .collect(),
                )),
            };
        }
        let mut points: Vec<Point> = Vec::new();
        for inst in self.instants() {
            let p = inst.value().to_point();
            if !points.contains(&p) {
                points.push(p);
            }
        }
        if points.len() == 1 {
            Geometry::Point(points.remove(0))
        } else {
            Geometry::MultiPoint(MultiPoint::new(points))
        }
    }

    /// Length of the traversed path; zero without continuous motion.
    pub fn length(&self) -> f64 {
        if self.interpolation() != TInterpolation::Linear {
            return 0.0;
        }
        let mut total = 0.0;
        for seq in self.sequences_ref() {
            for w in seq.instants().windows(2) {
                total += w[0].value().distance(w[1].value()).unwrap_or(0.0);
            }
        }
        total
    }

    /// Length traversed so far, as a temporal float.
    pub fn cumulative_length(&self) -> Result<Temporal<f64>> {
        if self.interpolation() != TInterpolation::Linear {
            return Err(TemporalError::InvalidInput(
                "cumulative length requires linear interpolation".to_string(),
            ));
        }
        let mut running = 0.0;
        let mut sequences: Vec<TSequence<f64>> = Vec::new();
        for seq in self.sequences_ref() {
            let mut instants = Vec::with_capacity(seq.num_instants());
            let mut prev: Option<&TInstant<PointValue>> = None;
            for inst in seq.instants() {
                if let Some(prev) = prev {
                    running += prev.value().distance(inst.value())?;
                }
                instants.push(TInstant::from_parts(running, inst.timestamp()));
                prev = Some(inst);
            }
            sequences.push(TSequence::assemble(
                instants,
                seq.lower_inc(),
                seq.upper_inc(),
                TInterpolation::Linear,
            ));
        }
        if sequences.is_empty() {
            return Ok(Temporal::Instant(TInstant::from_parts(
                0.0,
                self.start_timestamp(),
            )));
        }
        Temporal::from_sequences(sequences)
    }

    /// Speed per segment, as a step-interpolated temporal float.
    pub fn speed(&self) -> Result<Temporal<f64>> {
        if self.interpolation() != TInterpolation::Linear {
            return Err(TemporalError::InvalidInput(
                "speed requires linear interpolation".to_string(),
            ));
        }
        let mut sequences: Vec<TSequence<f64>> = Vec::new();
        for seq in self.sequences_ref() {
            let instants = seq.instants();
            let mut out = Vec::with_capacity(instants.len());
            if instants.len() == 1 {
                out.push(TInstant::from_parts(0.0, instants[0].timestamp()));
            } else {
                let mut last_speed = 0.0;
                for w in instants.windows(2) {
                    let dist = w[0].value().distance(w[1].value())?;
                    let secs = (w[1].timestamp() - w[0].timestamp()).num_milliseconds() as f64
                        / 1e3;
                    last_speed = if secs > 0.0 { dist / secs } else { 0.0 };
                    out.push(TInstant::from_parts(last_speed, w[0].timestamp()));
                }
                out.push(TInstant::from_parts(
                    last_speed,
                    instants[instants.len() - 1].timestamp(),
                ));
            }
            sequences.push(TSequence::new(
                out,
                seq.lower_inc(),
                seq.upper_inc(),
                TInterpolation::Step,
            )?);
        }
        if sequences.is_empty() {
            return Err(TemporalError::InvalidInput(
                "speed requires a sequence".to_string(),
            ));
        }
        Temporal::from_sequences(sequences)
    }

    /// Per-segment bearing in radians, as a step sequence set; `None`
    /// when the point never moves.
    pub fn azimuth(&self) -> Result<Option<Temporal<f64>>> {
        let mut pieces: Vec<TSequence<f64>> = Vec::new();
        for seq in self.sequences_ref() {
            if seq.interpolation() != TInterpolation::Linear {
                continue;
            }
            let instants = seq.instants();
            let mut run: Vec<TInstant<f64>> = Vec::new();
            let mut run_starts_at_first = false;
            let mut last_az = 0.0;
            for (i, w) in instants.windows(2).enumerate() {
                match w[0].value().azimuth(w[1].value())? {
                    Some(az) => {
                        if run.is_empty() {
                            run_starts_at_first = i == 0;
                        }
                        run.push(TInstant::from_parts(az, w[0].timestamp()));
                        last_az = az;
                    }
                    None => {
                        if !run.is_empty() {
                            run.push(TInstant::from_parts(last_az, w[0].timestamp()));
                            let lower_inc = !run_starts_at_first || seq.lower_inc();
                            pieces.push(TSequence::new(
                                std::mem::take(&mut run),
                                lower_inc,
                                false,
                                TInterpolation::Step,
                            )?);
                        }
                    }
                }
            }
            if !run.is_empty() {
                let end = instants[instants.len() - 1].timestamp();
                run.push(TInstant::from_parts(last_az, end));
                let lower_inc = !run_starts_at_first || seq.lower_inc();
                pieces.push(TSequence::new(
                    run,
                    lower_inc,
                    seq.upper_inc(),
                    TInterpolation::Step,
                )?);
            }
        }
        if pieces.is_empty() {
            return Ok(None);
        }
        Ok(Some(Temporal::from_sequences(pieces)?))
    }

    /// Bearing from the moving point towards a fixed position, in
    /// radians; zero while the positions coincide.
    pub fn bearing_to(&self, target: &PointValue) -> Result<Temporal<f64>> {
        self.start_instant().value().ensure_compatible(target)?;
        let target = *target;
        lift_unary(self, move |p: &PointValue| {
            p.azimuth(&target).ok().flatten().unwrap_or(0.0)
        })
    }

    /// Temporal distance to another temporal point.
    pub fn tdistance(&self, other: &Self) -> Result<Option<Temporal<f64>>> {
        self.start_instant()
            .value()
            .ensure_compatible(other.start_instant().value())?;
        let turn = |a1: &PointValue, a2: &PointValue, b1: &PointValue, b2: &PointValue| {
            closest_approach_ratio(a1, a2, b1, b2)
        };
        let op = LiftedBinary {
            func: &|a: &PointValue, b: &PointValue| a.distance(b).unwrap_or(0.0),
            discontinuous: false,
            turnpoint: Some(&turn),
        };
        lift_binary(self, other, &op)
    }

    /// Smallest distance ever reached between two temporal points; `None`
    /// when they do not overlap in time.
    pub fn nearest_approach_distance(&self, other: &Self) -> Result<Option<f64>> {
        Ok(self.tdistance(other)?.map(|d| d.min_value()))
    }

    /// Time-weighted centroid of the whole temporal point.
    pub fn twcentroid(&self) -> Result<PointValue> {
        let mut agg = TCentroidAgg::new();
        agg.add(self)?;
        agg.finish()?.ok_or_else(|| {
            TemporalError::EmptyInput("the temporal point has no instants".to_string())
        })
    }

    /// Whether the trace never visits the same position twice.
    pub fn is_simple(&self) -> bool {
        match self.interpolation() {
            TInterpolation::Linear => self
                .sequences_ref()
                .iter()
                .all(|seq| sequence_simple_prefix(seq.instants()) == seq.num_instants()),
            _ => {
                let mut seen: Vec<(u64, u64, u64)> = Vec::new();
                for inst in self.instants() {
                    let key = coord_key(inst.value());
                    if seen.contains(&key) {
                        return false;
                    }
                    seen.push(key);
                }
                true
            }
        }
    }

    /// Split the temporal point into simple pieces at self-intersections.
    pub fn make_simple(&self) -> Result<Vec<Self>> {
        match self {
            Temporal::Instant(_) => Ok(vec![self.clone()]),
            Temporal::InstantSet(s) => {
                let mut groups: Vec<Vec<TInstant<PointValue>>> = Vec::new();
                let mut current: Vec<TInstant<PointValue>> = Vec::new();
                let mut seen: Vec<(u64, u64, u64)> = Vec::new();
                for inst in s.instants() {
                    let key = coord_key(inst.value());
                    if seen.contains(&key) {
                        groups.push(std::mem::take(&mut current));
                        seen.clear();
                    }
                    seen.push(key);
                    current.push(inst.clone());
                }
                if !current.is_empty() {
                    groups.push(current);
                }
                Ok(groups
                    .into_iter()
                    .map(|mut g| match g.len() {
                        1 => Temporal::Instant(g.swap_remove(0)),
                        _ => Temporal::InstantSet(
                            crate::temporal::TInstantSet::assemble(g),
                        ),
                    })
                    .collect())
            }
            Temporal::Sequence(s) => Ok(split_simple_sequence(s)
                .into_iter()
                .map(Temporal::Sequence)
                .collect()),
            Temporal::SequenceSet(set) => {
                let mut out = Vec::new();
                for seq in set.sequences() {
                    out.extend(
                        split_simple_sequence(seq)
                            .into_iter()
                            .map(Temporal::Sequence),
                    );
                }
                Ok(out)
            }
        }
    }

    /// Restrict to the time spent inside a planar geometry.
    pub fn at_geometry(&self, geom: &Geometry<f64>) -> Result<Option<Self>> {
        let time = self.geometry_time(geom)?;
        Ok(match time {
            Some(time) => self.at_periods(&time),
            None => None,
        })
    }

    /// Complement of [`Self::at_geometry`].
    pub fn minus_geometry(&self, geom: &Geometry<f64>) -> Result<Option<Self>> {
        let time = self.geometry_time(geom)?;
        Ok(match time {
            Some(time) => match self.time().difference(&time) {
                Some(keep) => self.at_periods(&keep),
                None => None,
            },
            None => Some(self.clone()),
        })
    }

    /// Time spent inside a planar geometry.
    fn geometry_time(&self, geom: &Geometry<f64>) -> Result<Option<TsTzSpanSet>> {
        if self.is_geodetic() {
            return Err(TemporalError::InvalidInput(
                "geometry restriction requires planar coordinates".to_string(),
            ));
        }
        let mut spans: Vec<TsTzSpan> = Vec::new();
        match self {
            Temporal::Instant(_) | Temporal::InstantSet(_) => {
                for inst in self.instants() {
                    if geom.intersects(&inst.value().to_point()) {
                        spans.push(Span::instant(inst.timestamp()));
                    }
                }
            }
            _ => {
                for seq in self.sequences_ref() {
                    spans.extend(sequence_geometry_spans(seq, geom));
                }
            }
        }
        Ok(TsTzSpanSet::new(spans).ok())
    }

    /// Restrict to a spatiotemporal box.
    pub fn at_stbox(&self, bbox: &STBox) -> Result<Option<Self>> {
        self.bbox().ensure_compatible(bbox)?;
        let mut current = self.clone();
        if let Some(period) = bbox.period() {
            current = match current.at_period(period) {
                Some(c) => c,
                None => return Ok(None),
            };
        }
        if !bbox.has_x() {
            return Ok(Some(current));
        }
        let time = current.stbox_space_time(bbox);
        Ok(match time {
            Some(time) => current.at_periods(&time),
            None => None,
        })
    }

    /// Complement of [`Self::at_stbox`].
    pub fn minus_stbox(&self, bbox: &STBox) -> Result<Option<Self>> {
        let at = self.at_stbox(bbox)?;
        Ok(match at {
            Some(at) => match self.time().difference(&at.time()) {
                Some(keep) => self.at_periods(&keep),
                None => None,
            },
            None => Some(self.clone()),
        })
    }

    /// Time spent inside the spatial extent of `bbox`.
    fn stbox_space_time(&self, bbox: &STBox) -> Option<TsTzSpanSet> {
        let inside = |p: &PointValue| -> bool {
            let xy = bbox.xmin().is_some_and(|m| p.x() >= m)
                && bbox.xmax().is_some_and(|m| p.x() <= m)
                && bbox.ymin().is_some_and(|m| p.y() >= m)
                && bbox.ymax().is_some_and(|m| p.y() <= m);
            let z_ok = match (bbox.zmin(), bbox.zmax(), p.z()) {
                (Some(zmin), Some(zmax), Some(z)) => z >= zmin && z <= zmax,
                _ => true,
            };
            xy && z_ok
        };
        let mut spans: Vec<TsTzSpan> = Vec::new();
        match self {
            Temporal::Instant(_) | Temporal::InstantSet(_) => {
                for inst in self.instants() {
                    if inside(inst.value()) {
                        spans.push(Span::instant(inst.timestamp()));
                    }
                }
            }
            _ => {
                for seq in self.sequences_ref() {
                    if seq.interpolation() == TInterpolation::Linear {
                        for w in seq.instants().windows(2) {
                            if let Some(span) = segment_box_span(w[0].clone(), w[1].clone(), bbox)
                            {
                                spans.push(span);
                            }
                        }
                        let last = &seq.instants()[seq.num_instants() - 1];
                        if inside(last.value()) {
                            spans.push(Span::instant(last.timestamp()));
                        }
                    } else {
                        let instants = seq.instants();
                        for w in instants.windows(2) {
                            if inside(w[0].value()) {
                                spans.push(Span::from_parts(
                                    w[0].timestamp(),
                                    w[1].timestamp(),
                                    true,
                                    false,
                                ));
                            }
                        }
                        let last = &instants[instants.len() - 1];
                        if inside(last.value()) {
                            spans.push(Span::instant(last.timestamp()));
                        }
                    }
                }
            }
        }
        TsTzSpanSet::new(spans).ok()
    }
}

/// Ratio at which two synchronized linear point segments are closest.
fn closest_approach_ratio(
    a1: &PointValue,
    a2: &PointValue,
    b1: &PointValue,
    b2: &PointValue,
) -> Option<f64> {
    let wx = a1.x() - b1.x();
    let wy = a1.y() - b1.y();
    let wz = match (a1.z(), b1.z()) {
        (Some(za), Some(zb)) => za - zb,
        _ => 0.0,
    };
    let vx = (a2.x() - a1.x()) - (b2.x() - b1.x());
    let vy = (a2.y() - a1.y()) - (b2.y() - b1.y());
    let vz = match (a1.z(), a2.z(), b1.z(), b2.z()) {
        (Some(za1), Some(za2), Some(zb1), Some(zb2)) => (za2 - za1) - (zb2 - zb1),
        _ => 0.0,
    };
    let len2 = vx * vx + vy * vy + vz * vz;
    if len2 <= EPSILON {
        return None;
    }
    let ratio = -(wx * vx + wy * vy + wz * vz) / len2;
    (ratio > 0.0 && ratio < 1.0).then_some(ratio)
}

fn coord_key(p: &PointValue) -> (u64, u64, u64) {
    (
        p.x().to_bits(),
        p.y().to_bits(),
        p.z().unwrap_or(0.0).to_bits(),
    )
}

/// Portion of a linear segment inside the spatial extent of an `STBox`.
fn segment_box_span(
    a: TInstant<PointValue>,
    b: TInstant<PointValue>,
    bbox: &STBox,
) -> Option<TsTzSpan> {
    let coord_range = |c1: f64, c2: f64, lo: f64, hi: f64| -> Option<(f64, f64)> {
        if (c2 - c1).abs() <= EPSILON {
            return (c1 >= lo && c1 <= hi).then_some((0.0, 1.0));
        }
        let r1 = (lo - c1) / (c2 - c1);
        let r2 = (hi - c1) / (c2 - c1);
        let (mut lo_r, mut hi_r) = if r1 <= r2 { (r1, r2) } else { (r2, r1) };
        lo_r = lo_r.max(0.0);
        hi_r = hi_r.min(1.0);
        (lo_r <= hi_r).then_some((lo_r, hi_r))
    };

    let (p, q) = (a.value(), b.value());
    let mut lo = 0.0f64;
    let mut hi = 1.0f64;
    let (xmin, xmax) = (bbox.xmin()?, bbox.xmax()?);
    let (ymin, ymax) = (bbox.ymin()?, bbox.ymax()?);
    let (xlo, xhi) = coord_range(p.x(), q.x(), xmin, xmax)?;
    lo = lo.max(xlo);
    hi = hi.min(xhi);
    let (ylo, yhi) = coord_range(p.y(), q.y(), ymin, ymax)?;
    lo = lo.max(ylo);
    hi = hi.min(yhi);
    if let (Some(zmin), Some(zmax), Some(z1), Some(z2)) =
        (bbox.zmin(), bbox.zmax(), p.z(), q.z())
    {
        let (zlo, zhi) = coord_range(z1, z2, zmin, zmax)?;
        lo = lo.max(zlo);
        hi = hi.min(zhi);
    }
    if lo > hi {
        return None;
    }
    let t1 = time_at_ratio(a.timestamp(), b.timestamp(), lo);
    let t2 = time_at_ratio(a.timestamp(), b.timestamp(), hi);
    if t1 == t2 {
        return Some(Span::instant(t1));
    }
    Some(Span::from_parts(t1, t2, true, true))
}

/// Time spans a linear sequence spends inside a geometry: each segment is
/// cut at its crossings with the boundary and classified by midpoint.
fn sequence_geometry_spans(seq: &TSequence<PointValue>, geom: &Geometry<f64>) -> Vec<TsTzSpan> {
    let mut spans = Vec::new();
    let instants = seq.instants();
    if instants.len() == 1 || seq.interpolation() != TInterpolation::Linear {
        // Isolated or step positions: constant membership per segment.
        for (i, inst) in instants.iter().enumerate() {
            if !geom.intersects(&inst.value().to_point()) {
                continue;
            }
            if seq.interpolation() != TInterpolation::Linear && i + 1 < instants.len() {
                spans.push(Span::from_parts(
                    inst.timestamp(),
                    instants[i + 1].timestamp(),
                    true,
                    false,
                ));
            } else {
                spans.push(Span::instant(inst.timestamp()));
            }
        }
        return spans;
    }
    for w in instants.windows(2) {
        let (p, q) = (w[0].value(), w[1].value());
        let segment = Line::new(
            geo::coord! { x: p.x(), y: p.y() },
            geo::coord! { x: q.x(), y: q.y() },
        );
        let mut cuts: SmallVec<[f64; 8]> = SmallVec::new();
        cuts.push(0.0);
        cuts.push(1.0);
        for edge in geometry_edges(geom) {
            match line_intersection(segment, edge) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    if let Some(r) = segment_param(&segment, intersection) {
                        cuts.push(r);
                    }
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    for c in [intersection.start, intersection.end] {
                        if let Some(r) = segment_param(&segment, c) {
                            cuts.push(r);
                        }
                    }
                }
                None => {}
            }
        }
        cuts.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));
        cuts.dedup_by(|x, y| (*x - *y).abs() <= EPSILON);
        for pair in cuts.windows(2) {
            let mid = (pair[0] + pair[1]) / 2.0;
            let probe = p.interpolate(q, mid);
            if geom.intersects(&probe.to_point()) {
                let t1 = time_at_ratio(w[0].timestamp(), w[1].timestamp(), pair[0]);
                let t2 = time_at_ratio(w[0].timestamp(), w[1].timestamp(), pair[1]);
                if t1 == t2 {
                    spans.push(Span::instant(t1));
                } else {
                    spans.push(Span::from_parts(t1, t2, true, true));
                }
            }
        }
    }
    spans
}

/// Boundary edges of the supported planar geometries.
fn geometry_edges(geom: &Geometry<f64>) -> Vec<Line> {
    fn polygon_edges(p: &Polygon, out: &mut Vec<Line>) {
        out.extend(p.exterior().lines());
        for interior in p.interiors() {
            out.extend(interior.lines());
        }
    }
    let mut out = Vec::new();
    match geom {
        Geometry::Polygon(p) => polygon_edges(p, &mut out),
        Geometry::MultiPolygon(mp) => {
            for p in &mp.0 {
                polygon_edges(p, &mut out);
            }
        }
        Geometry::Rect(r) => polygon_edges(&r.to_polygon(), &mut out),
        Geometry::LineString(l) => out.extend(l.lines()),
        Geometry::Line(l) => out.push(*l),
        Geometry::Point(_) | Geometry::MultiPoint(_) => {}
        _ => {
            log::warn!("geometry restriction falls back to point-membership probing");
        }
    }
    out
}

/// Parameter of a point along a segment, when it lies on it.
fn segment_param(segment: &Line, c: geo::Coord) -> Option<f64> {
    let d = segment.delta();
    let len2 = d.x * d.x + d.y * d.y;
    if len2 <= EPSILON {
        return None;
    }
    let r = ((c.x - segment.start.x) * d.x + (c.y - segment.start.y) * d.y) / len2;
    (0.0..=1.0).contains(&r).then_some(r)
}

/// Number of leading instants forming a simple (non-self-intersecting)
/// trace.
fn sequence_simple_prefix(instants: &[TInstant<PointValue>]) -> usize {
    let n = instants.len();
    if n <= 2 {
        return n;
    }
    let seg = |i: usize| -> Line {
        Line::new(
            geo::coord! { x: instants[i].value().x(), y: instants[i].value().y() },
            geo::coord! { x: instants[i + 1].value().x(), y: instants[i + 1].value().y() },
        )
    };
    for i in 1..n - 1 {
        let current = seg(i);
        for j in 0..i {
            let earlier = seg(j);
            match line_intersection(current, earlier) {
                Some(LineIntersection::SinglePoint { is_proper, .. }) => {
                    // Consecutive segments legitimately share an endpoint.
                    if j + 1 == i && !is_proper {
                        continue;
                    }
                    return i + 1;
                }
                Some(LineIntersection::Collinear { .. }) => return i + 1,
                None => {}
            }
        }
    }
    n
}

/// Split a linear sequence into simple pieces.
fn split_simple_sequence(seq: &TSequence<PointValue>) -> Vec<TSequence<PointValue>> {
    let mut pieces = Vec::new();
    let mut rest: Vec<TInstant<PointValue>> = seq.instants().to_vec();
    let mut lower_inc = seq.lower_inc();
    loop {
        let prefix = sequence_simple_prefix(&rest);
        if prefix >= rest.len() {
            pieces.push(TSequence::assemble(
                rest,
                lower_inc,
                seq.upper_inc(),
                seq.interpolation(),
            ));
            return pieces;
        }
        // Close the piece just before the offending segment; the boundary
        // instant starts the next piece.
        let head: Vec<TInstant<PointValue>> = rest[..prefix].to_vec();
        pieces.push(TSequence::assemble(
            head,
            lower_inc,
            false,
            seq.interpolation(),
        ));
        rest.drain(..prefix - 1);
        lower_inc = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, m / 60, m % 60, 0).unwrap()
    }

    fn tpoint(points: &[(f64, f64, u32)]) -> TPoint {
        Temporal::Sequence(
            TSequence::new(
                points
                    .iter()
                    .map(|&(x, y, m)| {
                        TInstant::new(PointValue::new(x, y), ts(m)).unwrap()
                    })
                    .collect(),
                true,
                true,
                TInterpolation::Linear,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_trajectory_linestring() {
        let p = tpoint(&[(0.0, 0.0, 0), (10.0, 0.0, 10), (10.0, 10.0, 20)]);
        match p.trajectory() {
            Geometry::LineString(l) => assert_eq!(l.0.len(), 3),
            other => panic!("expected a linestring, got {:?}", other),
        }
    }

    #[test]
    fn test_length_and_cumulative() {
        let p = tpoint(&[(0.0, 0.0, 0), (3.0, 4.0, 10), (3.0, 4.0, 20)]);
        assert_eq!(p.length(), 5.0);
        let cum = p.cumulative_length().unwrap();
        assert_eq!(cum.value_at_timestamp(ts(0)), Some(0.0));
        assert_eq!(cum.value_at_timestamp(ts(10)), Some(5.0));
        assert_eq!(cum.value_at_timestamp(ts(20)), Some(5.0));
    }

    #[test]
    fn test_speed() {
        // 600 meters of planar distance in 600 seconds.
        let p = tpoint(&[(0.0, 0.0, 0), (600.0, 0.0, 10)]);
        let speed = p.speed().unwrap();
        assert_eq!(speed.value_at_timestamp(ts(5)), Some(1.0));
    }

    #[test]
    fn test_azimuth() {
        let p = tpoint(&[(0.0, 0.0, 0), (0.0, 10.0, 10), (10.0, 10.0, 20)]);
        let az = p.azimuth().unwrap().unwrap();
        // Heading north, then east.
        assert_eq!(az.value_at_timestamp(ts(5)), Some(0.0));
        assert_eq!(
            az.value_at_timestamp(ts(15)),
            Some(std::f64::consts::FRAC_PI_2)
        );
    }

    #[test]
    fn test_azimuth_stationary() {
        let p = tpoint(&[(0.0, 0.0, 0), (0.0, 0.0, 10)]);
        assert!(p.azimuth().unwrap().is_none());
    }

    #[test]
    fn test_tdistance_and_nad() {
        let a = tpoint(&[(0.0, 0.0, 0), (10.0, 0.0, 10)]);
        let b = tpoint(&[(10.0, 0.0, 0), (0.0, 0.0, 10)]);
        let d = a.tdistance(&b).unwrap().unwrap();
        assert_eq!(d.value_at_timestamp(ts(0)), Some(10.0));
        assert_eq!(d.value_at_timestamp(ts(5)), Some(0.0));
        assert_eq!(a.nearest_approach_distance(&b).unwrap(), Some(0.0));
    }

    #[test]
    fn test_twcentroid_single() {
        let p = tpoint(&[(0.0, 0.0, 0), (10.0, 0.0, 10)]);
        let c = p.twcentroid().unwrap();
        assert!((c.x() - 5.0).abs() < 1e-9);
        assert!((c.y() - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_is_simple() {
        let straight = tpoint(&[(0.0, 0.0, 0), (10.0, 0.0, 10), (10.0, 10.0, 20)]);
        assert!(straight.is_simple());

        // A bowtie: the fourth segment crosses the first.
        let crossing = tpoint(&[
            (0.0, 0.0, 0),
            (10.0, 0.0, 10),
            (10.0, 10.0, 20),
            (5.0, -5.0, 30),
        ]);
        assert!(!crossing.is_simple());
    }

    #[test]
    fn test_make_simple() {
        let crossing = tpoint(&[
            (0.0, 0.0, 0),
            (10.0, 0.0, 10),
            (10.0, 10.0, 20),
            (5.0, -5.0, 30),
        ]);
        let pieces = crossing.make_simple().unwrap();
        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(piece.is_simple());
        }
        // The pieces cover the whole time support.
        let first = pieces[0].start_timestamp();
        let last = pieces[pieces.len() - 1].end_timestamp();
        assert_eq!(first, ts(0));
        assert_eq!(last, ts(30));
    }

    #[test]
    fn test_at_geometry_rect() {
        let p = tpoint(&[(0.0, 5.0, 0), (20.0, 5.0, 20)]);
        let rect = geo::Rect::new(
            geo::coord! { x: 5.0, y: 0.0 },
            geo::coord! { x: 10.0, y: 10.0 },
        );
        let inside = p.at_geometry(&Geometry::Rect(rect)).unwrap().unwrap();
        // x crosses 5 at minute 5 and 10 at minute 10.
        assert_eq!(inside.start_timestamp(), ts(5));
        assert_eq!(inside.end_timestamp(), ts(10));

        let outside = p.minus_geometry(&Geometry::Rect(rect)).unwrap().unwrap();
        assert!(outside.value_at_timestamp(ts(7)).is_none());
        assert!(outside.value_at_timestamp(ts(2)).is_some());
    }

    #[test]
    fn test_at_geometry_rejects_geodetic() {
        let p = Temporal::instant(PointValue::geog(0.0, 0.0), ts(0)).unwrap();
        let rect = geo::Rect::new(geo::coord! { x: 0.0, y: 0.0 }, geo::coord! { x: 1.0, y: 1.0 });
        assert!(p.at_geometry(&Geometry::Rect(rect)).is_err());
    }

    #[test]
    fn test_at_stbox() {
        let p = tpoint(&[(0.0, 0.0, 0), (20.0, 20.0, 20)]);
        let bbox = STBox::space(5.0, 10.0, 0.0, 20.0)
            .unwrap()
            .with_period(TsTzSpan::new(ts(0), ts(20), true, true).unwrap());
        let inside = p.at_stbox(&bbox).unwrap().unwrap();
        assert_eq!(inside.start_timestamp(), ts(5));
        assert_eq!(inside.end_timestamp(), ts(10));
    }

    #[test]
    fn test_srid_mismatch_in_distance() {
        let a = tpoint(&[(0.0, 0.0, 0), (1.0, 1.0, 10)]);
        let b = a.set_srid(3857).unwrap();
        assert!(matches!(
            a.tdistance(&b),
            Err(TemporalError::SridMismatch(0, 3857))
        ));
    }
}
