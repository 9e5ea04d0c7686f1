//! Temporal aggregation over many temporal values.
//!
//! A skiplist keyed by time holds the accumulated state as disjoint
//! instants or sequences. Each incoming value is spliced in: the stored
//! window it overlaps is extracted, combined through the lifting engine
//! with the per-aggregate base function, and reinserted. The centroid
//! aggregate transforms points into weighted tuples first, so sums
//! accumulate, and divides by the weight at the end.

use super::instant::TInstant;
use super::instant_set::TInstantSet;
use super::lift::{LiftedBinary, lift_binary, lift_unary};
use super::sequence::TSequence;
use super::{TInterpolation, Temporal};
use crate::base::BaseValue;
use crate::boxes::TemporalBox;
use crate::engine;
use crate::error::{Result, TemporalError};
use crate::point::PointValue;
use crate::span::TsTzSpan;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use std::hash::{Hash, Hasher};

/// Pair of float accumulators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Double2 {
    pub a: f64,
    pub b: f64,
}

/// Triple of float accumulators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Double3 {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

/// Quadruple of float accumulators: three coordinates and a weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Double4 {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

macro_rules! impl_double_base {
    ($ty:ty, $name:literal, [$($field:ident),+]) => {
        impl $ty {
            pub fn add(&self, other: &Self) -> Self {
                Self { $($field: self.$field + other.$field),+ }
            }
        }

        impl BaseValue for $ty {
            type Bbox = TsTzSpan;
            const CONTINUOUS: bool = true;
            const NAME: &'static str = $name;

            fn interpolate(&self, other: &Self, ratio: f64) -> Self {
                Self {
                    $($field: self.$field + (other.$field - self.$field) * ratio),+
                }
            }

            fn hash_value<H: Hasher>(&self, state: &mut H) {
                $(self.$field.to_bits().hash(state);)+
            }

            fn instant_box(&self, t: DateTime<Utc>) -> TsTzSpan {
                crate::span::Span::instant(t)
            }
        }
    };
}

impl_double_base!(Double2, "double2", [a, b]);
impl_double_base!(Double3, "double3", [a, b, c]);
impl_double_base!(Double4, "double4", [a, b, c, d]);

const SKIPLIST_MAX_LEVEL: usize = 32;
const NIL: usize = usize::MAX;

/// Element stored in the aggregation skiplist.
pub(crate) trait AggElem: Clone {
    fn start_time(&self) -> DateTime<Utc>;
    fn end_time(&self) -> DateTime<Utc>;
}

impl<B: BaseValue> AggElem for TInstant<B> {
    fn start_time(&self) -> DateTime<Utc> {
        self.timestamp()
    }

    fn end_time(&self) -> DateTime<Utc> {
        self.timestamp()
    }
}

impl<B: BaseValue> AggElem for TSequence<B> {
    fn start_time(&self) -> DateTime<Utc> {
        self.start_timestamp()
    }

    fn end_time(&self) -> DateTime<Utc> {
        self.end_timestamp()
    }
}

struct SkipNode<E> {
    elem: Option<E>,
    next: Vec<usize>,
}

/// Arena-backed skiplist ordered by element start time.
pub(crate) struct SkipList<E> {
    nodes: Vec<SkipNode<E>>,
    free: Vec<usize>,
    level: usize,
    len: usize,
}

impl<E: AggElem> SkipList<E> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![SkipNode {
                elem: None,
                next: vec![NIL; SKIPLIST_MAX_LEVEL],
            }],
            free: Vec::new(),
            level: 1,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn alloc(&mut self, elem: E, height: usize) -> usize {
        let node = SkipNode {
            elem: Some(elem),
            next: vec![NIL; height],
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Per-level predecessors of the first element starting at or after
    /// `t`.
    fn find_path(&self, t: DateTime<Utc>) -> [usize; SKIPLIST_MAX_LEVEL] {
        let mut path = [0usize; SKIPLIST_MAX_LEVEL];
        let mut node = 0usize;
        for lvl in (0..self.level).rev() {
            loop {
                let next = self.nodes[node].next[lvl];
                let advance = next != NIL
                    && self.nodes[next]
                        .elem
                        .as_ref()
                        .is_some_and(|e| e.start_time() < t);
                if advance {
                    node = next;
                } else {
                    break;
                }
            }
            path[lvl] = node;
        }
        path
    }

    /// Insert keeping start-time order.
    pub(crate) fn insert(&mut self, elem: E) {
        let height = engine::global().random_level(SKIPLIST_MAX_LEVEL);
        let path = self.find_path(elem.start_time());
        let idx = self.alloc(elem, height);
        if height > self.level {
            self.level = height;
        }
        for lvl in 0..height {
            let prev = path[lvl];
            self.nodes[idx].next[lvl] = self.nodes[prev].next[lvl];
            self.nodes[prev].next[lvl] = idx;
        }
        self.len += 1;
    }

    /// Remove and return, in order, every element whose closed time range
    /// intersects `[lower, upper]`.
    pub(crate) fn extract_overlapping(
        &mut self,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    ) -> Vec<E> {
        // Stored elements are disjoint and sorted, so both their start and
        // end times are monotonic: the window is contiguous.
        let mut removed_idx: Vec<usize> = Vec::new();
        let mut removed: Vec<E> = Vec::new();
        let mut node = self.nodes[0].next[0];
        while node != NIL {
            let keep_scanning = match self.nodes[node].elem.as_ref() {
                Some(e) => {
                    if e.start_time() > upper {
                        false
                    } else {
                        if e.end_time() >= lower {
                            removed_idx.push(node);
                        }
                        true
                    }
                }
                None => false,
            };
            if !keep_scanning {
                break;
            }
            node = self.nodes[node].next[0];
        }
        if removed_idx.is_empty() {
            return removed;
        }

        let removed_set: FxHashSet<usize> = removed_idx.iter().copied().collect();
        for lvl in 0..self.level {
            let mut node = 0usize;
            loop {
                let next = self.nodes[node].next[lvl];
                if next == NIL {
                    break;
                }
                if removed_set.contains(&next) {
                    // Skip over the removed run.
                    let mut after = next;
                    while after != NIL && removed_set.contains(&after) {
                        after = self.nodes[after].next[lvl];
                    }
                    self.nodes[node].next[lvl] = after;
                } else {
                    node = next;
                }
            }
        }
        for idx in removed_idx {
            if let Some(elem) = self.nodes[idx].elem.take() {
                removed.push(elem);
            }
            self.free.push(idx);
        }
        self.len -= removed.len();
        removed
    }

    /// Drain the list in time order.
    pub(crate) fn into_values(mut self) -> Vec<E> {
        let mut out = Vec::with_capacity(self.len);
        let mut node = self.nodes[0].next[0];
        while node != NIL {
            if let Some(elem) = self.nodes[node].elem.take() {
                out.push(elem);
            }
            node = self.nodes[node].next[0];
        }
        out
    }
}

enum AggState<B: BaseValue> {
    Instants(SkipList<TInstant<B>>),
    Sequences(SkipList<TSequence<B>>, TInterpolation),
}

/// Generic temporal aggregate combining values with a base function.
pub struct TAgg<B: BaseValue> {
    state: Option<AggState<B>>,
    func: fn(&B, &B) -> B,
    crossings: bool,
}

impl<B: BaseValue> TAgg<B> {
    pub fn new(func: fn(&B, &B) -> B) -> Self {
        Self {
            state: None,
            func,
            crossings: false,
        }
    }

    /// Combine with crossing discovery, for functions such as min and max
    /// whose result bends where two linear inputs cross.
    pub fn new_with_crossings(func: fn(&B, &B) -> B) -> Self {
        Self {
            state: None,
            func,
            crossings: true,
        }
    }

    /// Fold one temporal value into the accumulated state.
    pub fn add(&mut self, x: &Temporal<B>) -> Result<()> {
        match x {
            Temporal::Instant(_) | Temporal::InstantSet(_) => self.add_instants(x.instants()),
            Temporal::Sequence(s) => self.add_sequences(&[s.clone()], s.interpolation()),
            Temporal::SequenceSet(s) => self.add_sequences(s.sequences(), s.interpolation()),
        }
    }

    fn add_instants(&mut self, incoming: Vec<&TInstant<B>>) -> Result<()> {
        let func = self.func;
        let list = match self.state.get_or_insert_with(|| {
            AggState::Instants(SkipList::new())
        }) {
            AggState::Instants(list) => list,
            AggState::Sequences(..) => {
                return Err(TemporalError::TypeMismatch(
                    "cannot aggregate instants into a sequence state".to_string(),
                ));
            }
        };
        let lower = incoming[0].timestamp();
        let upper = incoming[incoming.len() - 1].timestamp();
        let window = list.extract_overlapping(lower, upper);

        // Merge the two sorted instant runs, combining equal timestamps.
        let mut merged: Vec<TInstant<B>> = Vec::with_capacity(window.len() + incoming.len());
        let mut i = 0;
        let mut j = 0;
        while i < window.len() && j < incoming.len() {
            let tw = window[i].timestamp();
            let tn = incoming[j].timestamp();
            if tw < tn {
                merged.push(window[i].clone());
                i += 1;
            } else if tn < tw {
                merged.push(incoming[j].clone());
                j += 1;
            } else {
                merged.push(TInstant::from_parts(
                    func(window[i].value(), incoming[j].value()),
                    tw,
                ));
                i += 1;
                j += 1;
            }
        }
        merged.extend(window[i..].iter().cloned());
        merged.extend(incoming[j..].iter().map(|inst| (*inst).clone()));
        for inst in merged {
            list.insert(inst);
        }
        Ok(())
    }

    fn add_sequences(&mut self, incoming: &[TSequence<B>], interp: TInterpolation) -> Result<()> {
        let func = self.func;
        let crossings = self.crossings;
        let list = match self
            .state
            .get_or_insert_with(|| AggState::Sequences(SkipList::new(), interp))
        {
            AggState::Sequences(list, state_interp) => {
                if *state_interp != interp {
                    return Err(TemporalError::TypeMismatch(format!(
                        "cannot aggregate {} sequences into a {} state",
                        interp, state_interp
                    )));
                }
                list
            }
            AggState::Instants(_) => {
                return Err(TemporalError::TypeMismatch(
                    "cannot aggregate sequences into an instant state".to_string(),
                ));
            }
        };
        let lower = incoming[0].start_timestamp();
        let upper = incoming[incoming.len() - 1].end_timestamp();
        let window = list.extract_overlapping(lower, upper);
        if !window.is_empty() {
            log::debug!("splicing {} stored sequences", window.len());
        }
        let merged = combine_sequences(window, incoming.to_vec(), func, crossings)?;
        for seq in merged {
            list.insert(seq);
        }
        Ok(())
    }

    /// Materialize the accumulated state.
    pub fn finish(self) -> Result<Option<Temporal<B>>> {
        match self.state {
            None => Ok(None),
            Some(AggState::Instants(list)) => {
                let mut instants = list.into_values();
                Ok(Some(match instants.len() {
                    0 => return Ok(None),
                    1 => Temporal::Instant(instants.swap_remove(0)),
                    _ => Temporal::InstantSet(TInstantSet::assemble(instants)),
                }))
            }
            Some(AggState::Sequences(list, _)) => {
                let sequences = list.into_values();
                if sequences.is_empty() {
                    return Ok(None);
                }
                Ok(Some(Temporal::from_sequences(sequences)?))
            }
        }
    }
}

/// Combine two disjoint-sorted sequence runs: overlapping time is merged
/// through the lifting engine, the rest passes through unchanged.
fn combine_sequences<B: BaseValue>(
    state: Vec<TSequence<B>>,
    incoming: Vec<TSequence<B>>,
    func: fn(&B, &B) -> B,
    crossings: bool,
) -> Result<Vec<TSequence<B>>> {
    if state.is_empty() {
        return Ok(incoming);
    }
    let a = Temporal::from_sequences(state)?;
    let b = Temporal::from_sequences(incoming)?;

    let turn = |a1: &B, a2: &B, b1: &B, b2: &B| B::value_cross(a1, a2, b1, b2);
    let op = LiftedBinary {
        func: &|x: &B, y: &B| func(x, y),
        discontinuous: false,
        turnpoint: if crossings { Some(&turn) } else { None },
    };
    let mut pieces: Vec<TSequence<B>> = Vec::new();
    if let Some(both) = lift_binary(&a, &b, &op)? {
        pieces.extend(sequences_owned(both));
    }
    if let Some(only_a) = a.minus_periods(&b.time()) {
        pieces.extend(sequences_owned(only_a));
    }
    if let Some(only_b) = b.minus_periods(&a.time()) {
        pieces.extend(sequences_owned(only_b));
    }
    pieces.sort_by_key(|s| s.start_timestamp());
    Ok(pieces)
}

fn sequences_owned<B: BaseValue>(t: Temporal<B>) -> Vec<TSequence<B>> {
    match t {
        Temporal::Sequence(s) => vec![s],
        Temporal::SequenceSet(s) => s.sequences().to_vec(),
        Temporal::Instant(i) => vec![TSequence::assemble(
            vec![i],
            true,
            true,
            TInterpolation::Step,
        )],
        Temporal::InstantSet(s) => s
            .instants()
            .iter()
            .map(|i| TSequence::assemble(vec![i.clone()], true, true, TInterpolation::Step))
            .collect(),
    }
}

impl TAgg<f64> {
    /// Temporal sum of floats.
    pub fn sum() -> Self {
        Self::new(|a, b| a + b)
    }

    /// Temporal minimum of floats, exact at crossings.
    pub fn min() -> Self {
        Self::new_with_crossings(|a, b| if a <= b { *a } else { *b })
    }

    /// Temporal maximum of floats, exact at crossings.
    pub fn max() -> Self {
        Self::new_with_crossings(|a, b| if a >= b { *a } else { *b })
    }
}

impl TAgg<i64> {
    pub fn sum() -> Self {
        Self::new(|a, b| a + b)
    }

    pub fn min() -> Self {
        Self::new(|a, b| *a.min(b))
    }

    pub fn max() -> Self {
        Self::new(|a, b| *a.max(b))
    }
}

impl TAgg<bool> {
    pub fn and() -> Self {
        Self::new(|a, b| *a && *b)
    }

    pub fn or() -> Self {
        Self::new(|a, b| *a || *b)
    }
}

/// Temporal count: how many inputs are defined at each time.
pub struct TCountAgg {
    inner: TAgg<i64>,
}

impl TCountAgg {
    pub fn new() -> Self {
        Self { inner: TAgg::<i64>::sum() }
    }

    pub fn add<B: BaseValue>(&mut self, x: &Temporal<B>) -> Result<()> {
        let ones = lift_unary(x, |_| 1i64)?;
        self.inner.add(&ones)
    }

    pub fn finish(self) -> Result<Option<Temporal<i64>>> {
        self.inner.finish()
    }
}

impl Default for TCountAgg {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounding-box extent aggregate.
pub struct ExtentAgg<Bx: TemporalBox> {
    state: Option<Bx>,
}

impl<Bx: TemporalBox> ExtentAgg<Bx> {
    pub fn new() -> Self {
        Self { state: None }
    }

    pub fn add_box(&mut self, bbox: &Bx) {
        match self.state.as_mut() {
            Some(state) => state.expand(bbox),
            None => self.state = Some(bbox.clone()),
        }
    }

    pub fn add<B: BaseValue<Bbox = Bx>>(&mut self, x: &Temporal<B>) {
        self.add_box(&x.bbox());
    }

    pub fn finish(self) -> Option<Bx> {
        self.state
    }
}

impl<Bx: TemporalBox> Default for ExtentAgg<Bx> {
    fn default() -> Self {
        Self::new()
    }
}

impl Temporal<f64> {
    /// Integral of the value over time, in value-seconds.
    pub fn integral(&self) -> f64 {
        let mut total = 0.0;
        for seq in sequences_of_ref(self) {
            let instants = seq.instants();
            for w in instants.windows(2) {
                let dt = (w[1].timestamp() - w[0].timestamp()).num_milliseconds() as f64 / 1e3;
                total += match seq.interpolation() {
                    TInterpolation::Linear => (w[0].value() + w[1].value()) / 2.0 * dt,
                    _ => w[0].value() * dt,
                };
            }
        }
        total
    }

    /// Time-weighted average; plain mean for discrete values.
    pub fn twavg(&self) -> f64 {
        match self {
            Temporal::Instant(_) | Temporal::InstantSet(_) => {
                let values = self.values();
                values.iter().sum::<f64>() / values.len() as f64
            }
            _ => {
                let duration = self.duration(false).num_milliseconds() as f64 / 1e3;
                if duration == 0.0 {
                    self.start_value()
                } else {
                    self.integral() / duration
                }
            }
        }
    }
}

fn sequences_of_ref<B: BaseValue>(t: &Temporal<B>) -> Vec<&TSequence<B>> {
    match t {
        Temporal::Sequence(s) => vec![s],
        Temporal::SequenceSet(s) => s.sequences().iter().collect(),
        _ => vec![],
    }
}

/// Time-weighted centroid aggregate over temporal points.
///
/// Every point `(x, y[, z])` becomes a weighted tuple `(x, y, z, 1)`; the
/// skiplist accumulates tuple sums, and the final step divides by the
/// accumulated weight.
pub struct TCentroidAgg {
    agg: TAgg<Double4>,
    meta: Option<(i32, bool, bool)>,
}

impl TCentroidAgg {
    pub fn new() -> Self {
        Self {
            agg: TAgg::new(|a: &Double4, b: &Double4| a.add(b)),
            meta: None,
        }
    }

    /// Fold one temporal point into the centroid state.
    ///
    /// The first input installs the SRID, dimensionality, and geodetic
    /// invariants; later inputs must match them.
    pub fn add(&mut self, x: &Temporal<PointValue>) -> Result<()> {
        let p = x.start_instant().value();
        let meta = (p.srid(), p.has_z(), p.is_geodetic());
        match self.meta {
            None => self.meta = Some(meta),
            Some(expected) => {
                if expected.0 != meta.0 {
                    return Err(TemporalError::SridMismatch(expected.0, meta.0));
                }
                if expected.1 != meta.1 {
                    return Err(TemporalError::DimensionalityMismatch);
                }
                if expected.2 != meta.2 {
                    return Err(TemporalError::GeodeticMismatch);
                }
            }
        }
        let weighted = lift_unary(x, |p: &PointValue| Double4 {
            a: p.x(),
            b: p.y(),
            c: p.z().unwrap_or(0.0),
            d: 1.0,
        })?;
        self.agg.add(&weighted)
    }

    /// The time-weighted centroid of all inputs.
    pub fn finish(self) -> Result<Option<PointValue>> {
        let meta = self.meta;
        let acc = match self.agg.finish()? {
            Some(acc) => acc,
            None => return Ok(None),
        };
        let (srid, has_z, geodetic) = match meta {
            Some(meta) => meta,
            None => return Ok(None),
        };
        let (ix, iy, iz, iw) = tuple_integrals(&acc);
        if iw == 0.0 {
            return Ok(None);
        }
        let mut point = if has_z {
            PointValue::new_z(ix / iw, iy / iw, iz / iw)
        } else {
            PointValue::new(ix / iw, iy / iw)
        };
        point = point.with_srid(srid);
        if geodetic {
            point = PointValue::geog(ix / iw, iy / iw);
            if has_z {
                point = PointValue::geog_z(ix / iw, iy / iw, iz / iw);
            }
            point = point.with_srid(srid);
        }
        Ok(Some(point))
    }

    /// The accumulated temporal centroid.
    pub fn finish_temporal(self) -> Result<Option<Temporal<PointValue>>> {
        let meta = self.meta;
        let acc = match self.agg.finish()? {
            Some(acc) => acc,
            None => return Ok(None),
        };
        let (srid, has_z, geodetic) = match meta {
            Some(meta) => meta,
            None => return Ok(None),
        };
        let result = lift_unary(&acc, |v: &Double4| {
            let mut p = if has_z {
                PointValue::new_z(v.a / v.d, v.b / v.d, v.c / v.d)
            } else {
                PointValue::new(v.a / v.d, v.b / v.d)
            };
            if geodetic {
                p = if has_z {
                    PointValue::geog_z(v.a / v.d, v.b / v.d, v.c / v.d)
                } else {
                    PointValue::geog(v.a / v.d, v.b / v.d)
                };
            }
            p.with_srid(srid)
        })?;
        Ok(Some(result))
    }
}

impl Default for TCentroidAgg {
    fn default() -> Self {
        Self::new()
    }
}

/// Integrals of each tuple component over time; discrete states fall back
/// to unweighted sums.
fn tuple_integrals(t: &Temporal<Double4>) -> (f64, f64, f64, f64) {
    match t {
        Temporal::Instant(_) | Temporal::InstantSet(_) => t
            .instants()
            .into_iter()
            .fold((0.0, 0.0, 0.0, 0.0), |acc, i| {
                let v = i.value();
                (acc.0 + v.a, acc.1 + v.b, acc.2 + v.c, acc.3 + v.d)
            }),
        _ => {
            let mut acc = (0.0, 0.0, 0.0, 0.0);
            for seq in sequences_of_ref(t) {
                for w in seq.instants().windows(2) {
                    let dt =
                        (w[1].timestamp() - w[0].timestamp()).num_milliseconds() as f64 / 1e3;
                    let (v1, v2) = (w[0].value(), w[1].value());
                    match seq.interpolation() {
                        TInterpolation::Linear => {
                            acc.0 += (v1.a + v2.a) / 2.0 * dt;
                            acc.1 += (v1.b + v2.b) / 2.0 * dt;
                            acc.2 += (v1.c + v2.c) / 2.0 * dt;
                            acc.3 += (v1.d + v2.d) / 2.0 * dt;
                        }
                        _ => {
                            acc.0 += v1.a * dt;
                            acc.1 += v1.b * dt;
                            acc.2 += v1.c * dt;
                            acc.3 += v1.d * dt;
                        }
                    }
                }
            }
            if acc.3 == 0.0 {
                // Zero total duration: weight the instants equally.
                return t
                    .instants()
                    .into_iter()
                    .fold((0.0, 0.0, 0.0, 0.0), |acc, i| {
                        let v = i.value();
                        (acc.0 + v.a, acc.1 + v.b, acc.2 + v.c, acc.3 + v.d)
                    });
            }
            acc
        }
    }
}
