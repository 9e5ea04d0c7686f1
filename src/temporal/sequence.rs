//! Temporal sequences: a continuous segment with an interpolation rule.

use super::instant::TInstant;
use super::TInterpolation;
use crate::base::BaseValue;
use crate::boxes::TemporalBox;
use crate::error::{Result, TemporalError};
use crate::span::{Span, SpanBound, TsTzSpan};
use chrono::{DateTime, TimeDelta, Utc};

/// A non-empty run of strictly time-ordered instants with inclusivity
/// flags on both bounds and an interpolation rule between instants.
///
/// Sequences are kept normalized: no instant whose value is implied by its
/// neighbors under the interpolation survives construction.
#[derive(Debug, Clone, PartialEq)]
pub struct TSequence<B: BaseValue> {
    instants: Vec<TInstant<B>>,
    lower_inc: bool,
    upper_inc: bool,
    interp: TInterpolation,
    bbox: B::Bbox,
}

impl<B: BaseValue> TSequence<B> {
    /// Create a sequence, validating the invariants and normalizing.
    ///
    /// A single-instant sequence must include both bounds; `Linear`
    /// interpolation is rejected for base types that cannot interpolate.
    pub fn new(
        instants: Vec<TInstant<B>>,
        lower_inc: bool,
        upper_inc: bool,
        interp: TInterpolation,
    ) -> Result<Self> {
        Self::validate(&instants, lower_inc, upper_inc, interp)?;
        let instants = Self::normalize(instants, interp);
        Ok(Self::assemble(instants, lower_inc, upper_inc, interp))
    }

    /// Closed sequence over both bounds.
    pub fn closed(instants: Vec<TInstant<B>>, interp: TInterpolation) -> Result<Self> {
        Self::new(instants, true, true, interp)
    }

    /// Singleton sequence.
    pub fn from_instant(instant: TInstant<B>, interp: TInterpolation) -> Result<Self> {
        Self::new(vec![instant], true, true, interp)
    }

    fn validate(
        instants: &[TInstant<B>],
        lower_inc: bool,
        upper_inc: bool,
        interp: TInterpolation,
    ) -> Result<()> {
        if instants.is_empty() {
            return Err(TemporalError::EmptyInput(
                "a sequence requires at least one instant".to_string(),
            ));
        }
        if interp == TInterpolation::Discrete {
            return Err(TemporalError::InvalidInput(
                "discrete interpolation belongs to instant sets, not sequences".to_string(),
            ));
        }
        if interp == TInterpolation::Linear && !B::CONTINUOUS {
            return Err(TemporalError::InvalidInput(format!(
                "linear interpolation is not defined for base type {}",
                B::NAME
            )));
        }
        if instants.len() == 1 && !(lower_inc && upper_inc) {
            return Err(TemporalError::InvalidSpan(
                "a single-instant sequence must include both bounds".to_string(),
            ));
        }
        for window in instants.windows(2) {
            if window[0].timestamp() >= window[1].timestamp() {
                return Err(TemporalError::OutOfOrder(format!(
                    "instant at {} does not follow {}",
                    window[1].timestamp(),
                    window[0].timestamp()
                )));
            }
            window[0].value().ensure_compatible(window[1].value())?;
        }
        Ok(())
    }

    /// Drop every instant whose value is implied by its neighbors.
    fn normalize(instants: Vec<TInstant<B>>, interp: TInterpolation) -> Vec<TInstant<B>> {
        if instants.len() < 3 {
            return instants;
        }
        let mut kept: Vec<TInstant<B>> = Vec::with_capacity(instants.len());
        kept.push(instants[0].clone());
        for i in 1..instants.len() - 1 {
            let prev = &kept[kept.len() - 1];
            if !Self::removable(prev, &instants[i], &instants[i + 1], interp) {
                kept.push(instants[i].clone());
            }
        }
        kept.push(instants[instants.len() - 1].clone());
        kept
    }

    fn removable(
        prev: &TInstant<B>,
        mid: &TInstant<B>,
        next: &TInstant<B>,
        interp: TInterpolation,
    ) -> bool {
        match interp {
            // Under step interpolation the middle instant adds nothing
            // when it repeats the previous value.
            TInterpolation::Step => prev.value() == mid.value(),
            TInterpolation::Linear => {
                let total = (next.timestamp() - prev.timestamp()).num_microseconds();
                let part = (mid.timestamp() - prev.timestamp()).num_microseconds();
                match (total, part) {
                    (Some(total), Some(part)) if total > 0 => B::collinear(
                        prev.value(),
                        mid.value(),
                        next.value(),
                        part as f64 / total as f64,
                    ),
                    _ => false,
                }
            }
            TInterpolation::Discrete => false,
        }
    }

    /// Build from parts that already satisfy every invariant.
    pub(crate) fn assemble(
        instants: Vec<TInstant<B>>,
        lower_inc: bool,
        upper_inc: bool,
        interp: TInterpolation,
    ) -> Self {
        debug_assert!(!instants.is_empty());
        let bbox = Self::compute_bbox(&instants, lower_inc, upper_inc);
        Self {
            instants,
            lower_inc,
            upper_inc,
            interp,
            bbox,
        }
    }

    pub(crate) fn compute_bbox(
        instants: &[TInstant<B>],
        lower_inc: bool,
        upper_inc: bool,
    ) -> B::Bbox {
        let mut bbox = instants[0].bbox();
        for inst in &instants[1..] {
            bbox.expand(&inst.bbox());
        }
        bbox.set_period(Span::from_parts(
            instants[0].timestamp(),
            instants[instants.len() - 1].timestamp(),
            lower_inc,
            upper_inc,
        ));
        bbox
    }

    pub(crate) fn refresh_bbox(&mut self) {
        self.bbox = Self::compute_bbox(&self.instants, self.lower_inc, self.upper_inc);
    }

    /// Append without validation, growing the bounding box incrementally.
    pub(crate) fn push_instant_unchecked(&mut self, inst: TInstant<B>) {
        self.bbox.expand(&inst.bbox());
        self.instants.push(inst);
        self.bbox.set_period(Span::from_parts(
            self.instants[0].timestamp(),
            self.instants[self.instants.len() - 1].timestamp(),
            self.lower_inc,
            self.upper_inc,
        ));
    }

    /// Remove the second-to-last instant after an append made it
    /// redundant. The bounding box is kept as-is; a larger box stays
    /// sound.
    pub(crate) fn drop_penultimate(&mut self) {
        let n = self.instants.len();
        debug_assert!(n >= 3);
        self.instants.remove(n - 2);
    }

    pub(crate) fn is_redundant_window(&self) -> bool {
        let n = self.instants.len();
        n >= 3
            && Self::removable(
                &self.instants[n - 3],
                &self.instants[n - 2],
                &self.instants[n - 1],
                self.interp,
            )
    }

    pub fn instants(&self) -> &[TInstant<B>] {
        &self.instants
    }

    pub(crate) fn instants_mut(&mut self) -> &mut Vec<TInstant<B>> {
        &mut self.instants
    }

    pub fn num_instants(&self) -> usize {
        self.instants.len()
    }

    pub fn instant_n(&self, n: usize) -> Option<&TInstant<B>> {
        self.instants.get(n)
    }

    pub fn start_instant(&self) -> &TInstant<B> {
        &self.instants[0]
    }

    pub fn end_instant(&self) -> &TInstant<B> {
        &self.instants[self.instants.len() - 1]
    }

    pub fn start_value(&self) -> B {
        self.instants[0].value().clone()
    }

    pub fn end_value(&self) -> B {
        self.end_instant().value().clone()
    }

    pub fn start_timestamp(&self) -> DateTime<Utc> {
        self.instants[0].timestamp()
    }

    pub fn end_timestamp(&self) -> DateTime<Utc> {
        self.end_instant().timestamp()
    }

    pub fn lower_inc(&self) -> bool {
        self.lower_inc
    }

    pub fn upper_inc(&self) -> bool {
        self.upper_inc
    }

    pub fn interpolation(&self) -> TInterpolation {
        self.interp
    }

    pub fn bbox(&self) -> &B::Bbox {
        &self.bbox
    }

    /// Time span covered by the sequence.
    pub fn time_span(&self) -> TsTzSpan {
        Span::from_parts(
            self.start_timestamp(),
            self.end_timestamp(),
            self.lower_inc,
            self.upper_inc,
        )
    }

    pub fn duration(&self) -> TimeDelta {
        self.end_timestamp() - self.start_timestamp()
    }

    /// Whether `t` belongs to the sequence's time support.
    pub fn contains_timestamp(&self, t: DateTime<Utc>) -> bool {
        self.time_span().contains_value(t)
    }

    /// Index of the segment whose start is the latest instant at or before
    /// `t`. Assumes `t` lies within the closed time hull.
    pub(crate) fn segment_index(&self, t: DateTime<Utc>) -> usize {
        let count = self.instants.partition_point(|i| i.timestamp() <= t);
        count.saturating_sub(1)
    }

    /// Interpolated value at `t`, bounds treated as closed. Assumes
    /// `start_timestamp() <= t <= end_timestamp()`.
    pub(crate) fn value_at_closed(&self, t: DateTime<Utc>) -> B {
        let i = self.segment_index(t);
        let inst = &self.instants[i];
        if inst.timestamp() == t || i + 1 == self.instants.len() {
            return inst.value().clone();
        }
        match self.interp {
            TInterpolation::Linear => {
                let next = &self.instants[i + 1];
                let ratio = segment_ratio(inst.timestamp(), next.timestamp(), t);
                inst.value().interpolate(next.value(), ratio)
            }
            _ => inst.value().clone(),
        }
    }

    /// Value at `t`, honoring bound inclusivity.
    pub fn value_at_timestamp(&self, t: DateTime<Utc>) -> Option<B> {
        if !self.contains_timestamp(t) {
            return None;
        }
        Some(self.value_at_closed(t))
    }

    /// Translate every timestamp by `delta`.
    pub fn shift(&self, delta: TimeDelta) -> Result<Self> {
        let instants = self
            .instants
            .iter()
            .map(|i| i.shift(delta))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::assemble(
            instants,
            self.lower_inc,
            self.upper_inc,
            self.interp,
        ))
    }

    /// Rescale timestamps around the start so the duration becomes
    /// `new_duration`; values are unchanged.
    ///
    /// Fails with `InvalidDuration` for single-instant sequences and for
    /// non-positive durations.
    pub fn tscale(&self, new_duration: TimeDelta) -> Result<Self> {
        if new_duration <= TimeDelta::zero() {
            return Err(TemporalError::InvalidDuration(
                "the new duration must be positive".to_string(),
            ));
        }
        let old = self.duration();
        if old.is_zero() {
            return Err(TemporalError::InvalidDuration(
                "cannot rescale a sequence with zero duration".to_string(),
            ));
        }
        let origin = self.start_timestamp();
        let instants = self
            .instants
            .iter()
            .map(|i| {
                let offset =
                    <DateTime<Utc> as SpanBound>::rescale(i.timestamp() - origin, old, new_duration);
                Ok(TInstant::from_parts(i.value().clone(), origin.plus(offset)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::assemble(
            instants,
            self.lower_inc,
            self.upper_inc,
            self.interp,
        ))
    }

    pub fn shift_tscale(
        &self,
        delta: Option<TimeDelta>,
        new_duration: Option<TimeDelta>,
    ) -> Result<Self> {
        let mut seq = self.clone();
        if let Some(delta) = delta {
            seq = seq.shift(delta)?;
        }
        if let Some(duration) = new_duration {
            seq = seq.tscale(duration)?;
        }
        Ok(seq)
    }

    /// Reinterpret under another interpolation.
    ///
    /// `Linear -> Step` keeps the left value on every segment; `Step ->
    /// Linear` yields one constant sequence per step, so the result is an
    /// array of sequences.
    pub fn set_interpolation(&self, interp: TInterpolation) -> Result<Vec<Self>> {
        if interp == self.interp {
            return Ok(vec![self.clone()]);
        }
        match (self.interp, interp) {
            (TInterpolation::Linear, TInterpolation::Step) => Ok(vec![Self::new(
                self.instants.clone(),
                self.lower_inc,
                self.upper_inc,
                TInterpolation::Step,
            )?]),
            (TInterpolation::Step, TInterpolation::Linear) => {
                let n = self.instants.len();
                if n == 1 {
                    return Ok(vec![Self::assemble(
                        self.instants.clone(),
                        true,
                        true,
                        TInterpolation::Linear,
                    )]);
                }
                let mut pieces = Vec::with_capacity(n - 1);
                for i in 0..n - 1 {
                    let cur = &self.instants[i];
                    let next = &self.instants[i + 1];
                    let lower_inc = if i == 0 { self.lower_inc } else { true };
                    let constant = vec![
                        cur.clone(),
                        TInstant::from_parts(cur.value().clone(), next.timestamp()),
                    ];
                    pieces.push(Self::assemble(
                        constant,
                        lower_inc,
                        false,
                        TInterpolation::Linear,
                    ));
                }
                if self.upper_inc {
                    let last = self.end_instant();
                    let prev = &self.instants[n - 2];
                    if last.value() == prev.value() {
                        // Extend the final constant piece to a closed bound.
                        if let Some(piece) = pieces.last_mut() {
                            piece.upper_inc = true;
                            piece.refresh_bbox();
                        }
                    } else {
                        pieces.push(Self::assemble(
                            vec![last.clone()],
                            true,
                            true,
                            TInterpolation::Linear,
                        ));
                    }
                }
                Ok(pieces)
            }
            _ => Err(TemporalError::InvalidInput(format!(
                "cannot convert a sequence from {} to {}",
                self.interp, interp
            ))),
        }
    }

    /// Whether `next` can be absorbed into this sequence without changing
    /// the represented function.
    ///
    /// Joining requires touching bounds with exactly one side owning the
    /// junction (or both, with agreeing values) and value agreement at the
    /// junction; a value jump keeps the sequences separate.
    pub(crate) fn can_join(&self, next: &Self) -> bool {
        if self.interp != next.interp || self.end_timestamp() != next.start_timestamp() {
            return false;
        }
        match (self.upper_inc, next.lower_inc) {
            // Neither side owns the junction: the function has a hole there.
            (false, false) => false,
            _ => self.end_value() == next.start_value(),
        }
    }

    /// Concatenate `next` onto this sequence. Callers must have verified
    /// [`Self::can_join`].
    pub(crate) fn join(&self, next: &Self) -> Self {
        debug_assert!(self.can_join(next));
        // The junction instant appears in both inputs; `next`'s copy wins.
        // When both sides own the junction their values are equal, and when
        // only `next` owns it `self`'s copy is a phantom bound carrier.
        let mut instants = self.instants.clone();
        instants.pop();
        instants.extend(next.instants.iter().cloned());
        let instants = Self::normalize(instants, self.interp);
        Self::assemble(instants, self.lower_inc, next.upper_inc, self.interp)
    }
}

impl<B: BaseValue + PartialOrd> TSequence<B> {
    pub fn min_instant(&self) -> &TInstant<B> {
        let mut min = &self.instants[0];
        for inst in &self.instants[1..] {
            if inst.value() < min.value() {
                min = inst;
            }
        }
        min
    }

    pub fn max_instant(&self) -> &TInstant<B> {
        let mut max = &self.instants[0];
        for inst in &self.instants[1..] {
            if inst.value() > max.value() {
                max = inst;
            }
        }
        max
    }

    pub fn min_value(&self) -> B {
        self.min_instant().value().clone()
    }

    pub fn max_value(&self) -> B {
        self.max_instant().value().clone()
    }
}

/// Ratio of `t` within `[start, end]`.
pub(crate) fn segment_ratio(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    t: DateTime<Utc>,
) -> f64 {
    let total = crate::span::delta_micros(end - start);
    if total == 0 {
        return 0.0;
    }
    crate::span::delta_micros(t - start) as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, m / 60, m % 60, 0).unwrap()
    }

    fn inst(v: f64, m: u32) -> TInstant<f64> {
        TInstant::new(v, ts(m)).unwrap()
    }

    fn linear(values: &[(f64, u32)]) -> TSequence<f64> {
        let instants = values.iter().map(|&(v, m)| inst(v, m)).collect();
        TSequence::new(instants, true, true, TInterpolation::Linear).unwrap()
    }

    #[test]
    fn test_rejects_empty_and_unordered() {
        assert!(matches!(
            TSequence::<f64>::new(vec![], true, true, TInterpolation::Linear),
            Err(TemporalError::EmptyInput(_))
        ));
        assert!(matches!(
            TSequence::new(
                vec![inst(1.0, 10), inst(2.0, 5)],
                true,
                true,
                TInterpolation::Linear
            ),
            Err(TemporalError::OutOfOrder(_))
        ));
    }

    #[test]
    fn test_rejects_linear_over_step_base() {
        let instants = vec![TInstant::new(true, ts(0)).unwrap()];
        assert!(TSequence::new(instants, true, true, TInterpolation::Linear).is_err());
    }

    #[test]
    fn test_single_instant_needs_closed_bounds() {
        assert!(TSequence::new(vec![inst(1.0, 0)], true, false, TInterpolation::Linear).is_err());
        assert!(TSequence::new(vec![inst(1.0, 0)], true, true, TInterpolation::Linear).is_ok());
    }

    #[test]
    fn test_normalize_removes_collinear_middle() {
        let seq = linear(&[(0.0, 0), (5.0, 5), (10.0, 10)]);
        assert_eq!(seq.num_instants(), 2);
        // The sequence still takes the same values.
        assert_eq!(seq.value_at_timestamp(ts(5)), Some(5.0));
    }

    #[test]
    fn test_normalize_keeps_breakpoints() {
        let seq = linear(&[(0.0, 0), (5.0, 5), (0.0, 10)]);
        assert_eq!(seq.num_instants(), 3);
    }

    #[test]
    fn test_normalize_step_redundant_value() {
        let instants = vec![inst(1.0, 0), inst(1.0, 5), inst(2.0, 10)];
        let seq = TSequence::new(instants, true, true, TInterpolation::Step).unwrap();
        assert_eq!(seq.num_instants(), 2);
    }

    #[test]
    fn test_value_at_timestamp_linear() {
        let seq = linear(&[(10.0, 0), (20.0, 10)]);
        assert_eq!(seq.value_at_timestamp(ts(0)), Some(10.0));
        assert_eq!(seq.value_at_timestamp(ts(5)), Some(15.0));
        assert_eq!(seq.value_at_timestamp(ts(10)), Some(20.0));
        assert_eq!(seq.value_at_timestamp(ts(11)), None);
    }

    #[test]
    fn test_value_at_exclusive_bound() {
        let instants = vec![inst(10.0, 0), inst(20.0, 10)];
        let seq = TSequence::new(instants, true, false, TInterpolation::Linear).unwrap();
        assert_eq!(seq.value_at_timestamp(ts(10)), None);
        assert_eq!(seq.value_at_timestamp(ts(9)), Some(19.0));
    }

    #[test]
    fn test_value_at_timestamp_step() {
        let instants = vec![inst(1.0, 0), inst(2.0, 10)];
        let seq = TSequence::new(instants, true, true, TInterpolation::Step).unwrap();
        assert_eq!(seq.value_at_timestamp(ts(5)), Some(1.0));
        assert_eq!(seq.value_at_timestamp(ts(10)), Some(2.0));
    }

    #[test]
    fn test_tscale() {
        let seq = linear(&[(0.0, 0), (10.0, 10)]);
        let scaled = seq.tscale(TimeDelta::minutes(20)).unwrap();
        assert_eq!(scaled.duration(), TimeDelta::minutes(20));
        assert_eq!(scaled.value_at_timestamp(ts(10)), Some(5.0));

        assert!(seq.tscale(TimeDelta::zero()).is_err());
        let single = TSequence::from_instant(inst(1.0, 0), TInterpolation::Linear).unwrap();
        assert!(single.tscale(TimeDelta::minutes(5)).is_err());
    }

    #[test]
    fn test_shift_preserves_values() {
        let seq = linear(&[(0.0, 0), (10.0, 10)]);
        let shifted = seq.shift(TimeDelta::minutes(30)).unwrap();
        assert_eq!(shifted.start_timestamp(), ts(30));
        assert_eq!(shifted.value_at_timestamp(ts(35)), Some(5.0));
    }

    #[test]
    fn test_step_to_linear_pieces() {
        let instants = vec![inst(1.0, 0), inst(2.0, 10), inst(3.0, 20)];
        let seq = TSequence::new(instants, true, true, TInterpolation::Step).unwrap();
        let pieces = seq.set_interpolation(TInterpolation::Linear).unwrap();
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].start_value(), 1.0);
        assert!(!pieces[0].upper_inc());
        assert_eq!(pieces[2].num_instants(), 1);
        assert_eq!(pieces[2].start_value(), 3.0);
    }

    #[test]
    fn test_min_max() {
        let seq = linear(&[(5.0, 0), (1.0, 10), (7.0, 20)]);
        assert_eq!(seq.min_value(), 1.0);
        assert_eq!(seq.max_value(), 7.0);
        assert_eq!(seq.max_instant().timestamp(), ts(20));
    }
}
