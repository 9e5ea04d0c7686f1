//! Built-in lifted operators: arithmetic, comparison, boolean, and text.

use super::lift::{LiftedBinary, lift_binary, lift_unary, lift_unary_turn};
use super::Temporal;
use crate::base::{BaseValue, Text};
use crate::error::{Result, TemporalError};
use crate::spanset::TsTzSpanSet;

impl<B: BaseValue> Temporal<B> {
    /// Temporal equality.
    pub fn teq(&self, other: &Self) -> Result<Option<Temporal<bool>>> {
        let turn = |a1: &B, a2: &B, b1: &B, b2: &B| B::value_cross(a1, a2, b1, b2);
        let op = LiftedBinary {
            func: &|a: &B, b: &B| a == b,
            discontinuous: true,
            turnpoint: Some(&turn),
        };
        lift_binary(self, other, &op)
    }

    /// Temporal inequality.
    pub fn tne(&self, other: &Self) -> Result<Option<Temporal<bool>>> {
        let turn = |a1: &B, a2: &B, b1: &B, b2: &B| B::value_cross(a1, a2, b1, b2);
        let op = LiftedBinary {
            func: &|a: &B, b: &B| a != b,
            discontinuous: true,
            turnpoint: Some(&turn),
        };
        lift_binary(self, other, &op)
    }
}

impl<B: BaseValue + PartialOrd> Temporal<B> {
    /// Temporal less-than.
    pub fn tlt(&self, other: &Self) -> Result<Option<Temporal<bool>>> {
        let turn = |a1: &B, a2: &B, b1: &B, b2: &B| B::value_cross(a1, a2, b1, b2);
        let op = LiftedBinary {
            func: &|a: &B, b: &B| a < b,
            discontinuous: true,
            turnpoint: Some(&turn),
        };
        lift_binary(self, other, &op)
    }

    /// Temporal less-than-or-equal.
    pub fn tle(&self, other: &Self) -> Result<Option<Temporal<bool>>> {
        let turn = |a1: &B, a2: &B, b1: &B, b2: &B| B::value_cross(a1, a2, b1, b2);
        let op = LiftedBinary {
            func: &|a: &B, b: &B| a <= b,
            discontinuous: true,
            turnpoint: Some(&turn),
        };
        lift_binary(self, other, &op)
    }

    /// Temporal greater-than.
    pub fn tgt(&self, other: &Self) -> Result<Option<Temporal<bool>>> {
        other.tlt(self)
    }

    /// Temporal greater-than-or-equal.
    pub fn tge(&self, other: &Self) -> Result<Option<Temporal<bool>>> {
        other.tle(self)
    }
}

impl Temporal<f64> {
    /// Temporal addition.
    pub fn add(&self, other: &Self) -> Result<Option<Self>> {
        let op = LiftedBinary {
            func: &|a: &f64, b: &f64| a + b,
            discontinuous: false,
            turnpoint: None,
        };
        lift_binary(self, other, &op)
    }

    /// Temporal subtraction.
    pub fn sub(&self, other: &Self) -> Result<Option<Self>> {
        let op = LiftedBinary {
            func: &|a: &f64, b: &f64| a - b,
            discontinuous: false,
            turnpoint: None,
        };
        lift_binary(self, other, &op)
    }

    /// Temporal multiplication.
    ///
    /// The product of two linear segments bends at one interior point; an
    /// instant is inserted there so the linear output attains the
    /// extremum exactly.
    pub fn mul(&self, other: &Self) -> Result<Option<Self>> {
        let turn = |a1: &f64, a2: &f64, b1: &f64, b2: &f64| {
            let da = a2 - a1;
            let db = b2 - b1;
            if (da * db).abs() <= crate::base::EPSILON {
                return None;
            }
            let ratio = -(a1 * db + b1 * da) / (2.0 * da * db);
            (ratio > 0.0 && ratio < 1.0).then_some(ratio)
        };
        let op = LiftedBinary {
            func: &|a: &f64, b: &f64| a * b,
            discontinuous: false,
            turnpoint: Some(&turn),
        };
        lift_binary(self, other, &op)
    }

    /// Temporal division; fails when the divisor ever takes zero.
    pub fn div(&self, other: &Self) -> Result<Option<Self>> {
        if other.ever_eq(&0.0) {
            return Err(TemporalError::InvalidInput(
                "division by a temporal value that takes zero".to_string(),
            ));
        }
        let op = LiftedBinary {
            func: &|a: &f64, b: &f64| a / b,
            discontinuous: false,
            turnpoint: None,
        };
        lift_binary(self, other, &op)
    }

    pub fn add_const(&self, value: f64) -> Result<Self> {
        lift_unary(self, |v| v + value)
    }

    pub fn sub_const(&self, value: f64) -> Result<Self> {
        lift_unary(self, |v| v - value)
    }

    pub fn mul_const(&self, value: f64) -> Result<Self> {
        lift_unary(self, |v| v * value)
    }

    pub fn div_const(&self, value: f64) -> Result<Self> {
        if value == 0.0 {
            return Err(TemporalError::InvalidInput("division by zero".to_string()));
        }
        lift_unary(self, |v| v / value)
    }

    /// Temporal absolute value, exact at zero crossings.
    pub fn abs(&self) -> Result<Self> {
        lift_unary_turn(
            self,
            |v: &f64| v.abs(),
            |v1: &f64, v2: &f64| f64::segment_locate(v1, v2, &0.0),
        )
    }

    /// Round values to `digits` decimal digits.
    pub fn round(&self, digits: u32) -> Result<Self> {
        let factor = 10f64.powi(digits as i32);
        lift_unary(self, move |v| (v * factor).round() / factor)
    }

    /// Temporal distance `|self - other|`, exact at crossings.
    pub fn tdistance(&self, other: &Self) -> Result<Option<Self>> {
        let turn = |a1: &f64, a2: &f64, b1: &f64, b2: &f64| f64::value_cross(a1, a2, b1, b2);
        let op = LiftedBinary {
            func: &|a: &f64, b: &f64| (a - b).abs(),
            discontinuous: false,
            turnpoint: Some(&turn),
        };
        lift_binary(self, other, &op)
    }

    /// Smallest distance ever between the values.
    pub fn nearest_approach_distance(&self, other: &Self) -> Result<f64> {
        match self.tdistance(other)? {
            Some(d) => Ok(d.min_value()),
            None => {
                // Disjoint in time: compare the value ranges.
                let (a, b) = (self.min_value(), self.max_value());
                let (c, d) = (other.min_value(), other.max_value());
                if b < c {
                    Ok(c - b)
                } else if d < a {
                    Ok(a - d)
                } else {
                    Ok(0.0)
                }
            }
        }
    }
}

impl Temporal<i64> {
    pub fn add(&self, other: &Self) -> Result<Option<Self>> {
        let op = LiftedBinary {
            func: &|a: &i64, b: &i64| a + b,
            discontinuous: false,
            turnpoint: None,
        };
        lift_binary(self, other, &op)
    }

    pub fn sub(&self, other: &Self) -> Result<Option<Self>> {
        let op = LiftedBinary {
            func: &|a: &i64, b: &i64| a - b,
            discontinuous: false,
            turnpoint: None,
        };
        lift_binary(self, other, &op)
    }

    pub fn mul(&self, other: &Self) -> Result<Option<Self>> {
        let op = LiftedBinary {
            func: &|a: &i64, b: &i64| a * b,
            discontinuous: false,
            turnpoint: None,
        };
        lift_binary(self, other, &op)
    }

    pub fn add_const(&self, value: i64) -> Result<Self> {
        lift_unary(self, move |v| v + value)
    }

    /// Widen to a temporal float.
    pub fn to_tfloat(&self) -> Result<Temporal<f64>> {
        lift_unary(self, |v| *v as f64)
    }
}

impl Temporal<bool> {
    /// Temporal conjunction.
    pub fn tand(&self, other: &Self) -> Result<Option<Self>> {
        let op = LiftedBinary {
            func: &|a: &bool, b: &bool| *a && *b,
            discontinuous: false,
            turnpoint: None,
        };
        lift_binary(self, other, &op)
    }

    /// Temporal disjunction.
    pub fn tor(&self, other: &Self) -> Result<Option<Self>> {
        let op = LiftedBinary {
            func: &|a: &bool, b: &bool| *a || *b,
            discontinuous: false,
            turnpoint: None,
        };
        lift_binary(self, other, &op)
    }

    /// Temporal negation.
    pub fn tnot(&self) -> Result<Self> {
        lift_unary(self, |v| !v)
    }

    /// The time during which the value is true.
    pub fn when_true(&self) -> Option<TsTzSpanSet> {
        self.at_value(&true).map(|t| t.time())
    }
}

impl Temporal<Text> {
    /// Temporal concatenation.
    pub fn concat(&self, other: &Self) -> Result<Option<Self>> {
        let op = LiftedBinary {
            func: &|a: &Text, b: &Text| a.concat(b),
            discontinuous: false,
            turnpoint: None,
        };
        lift_binary(self, other, &op)
    }

    pub fn to_uppercase(&self) -> Result<Self> {
        lift_unary(self, |v| v.to_uppercase())
    }

    pub fn to_lowercase(&self) -> Result<Self> {
        lift_unary(self, |v| v.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::{TInstant, TInterpolation, TSequence};
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, m / 60, m % 60, 0).unwrap()
    }

    fn linear(values: &[(f64, u32)]) -> Temporal<f64> {
        Temporal::Sequence(
            TSequence::new(
                values
                    .iter()
                    .map(|&(v, m)| TInstant::new(v, ts(m)).unwrap())
                    .collect(),
                true,
                true,
                TInterpolation::Linear,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_arith() {
        let x = linear(&[(2.0, 0), (4.0, 10)]);
        let y = linear(&[(1.0, 0), (1.0, 10)]);
        let sum = x.add(&y).unwrap().unwrap();
        assert_eq!(sum.value_at_timestamp(ts(5)), Some(4.0));
        let diff = x.sub(&y).unwrap().unwrap();
        assert_eq!(diff.value_at_timestamp(ts(5)), Some(2.0));
    }

    #[test]
    fn test_mul_turnpoint_hits_extremum() {
        // (t) * (10 - t): the product peaks midway at 25; without the
        // turning point a linear output would read 0 there.
        let x = linear(&[(0.0, 0), (10.0, 10)]);
        let y = linear(&[(10.0, 0), (0.0, 10)]);
        let prod = x.mul(&y).unwrap().unwrap();
        assert_eq!(prod.value_at_timestamp(ts(5)), Some(25.0));
        assert_eq!(prod.value_at_timestamp(ts(0)), Some(0.0));
    }

    #[test]
    fn test_div_rejects_zero_crossing() {
        let x = linear(&[(1.0, 0), (1.0, 10)]);
        let y = linear(&[(-5.0, 0), (5.0, 10)]);
        assert!(x.div(&y).is_err());

        let safe = linear(&[(1.0, 0), (2.0, 10)]);
        let q = x.div(&safe).unwrap().unwrap();
        assert_eq!(q.value_at_timestamp(ts(0)), Some(1.0));
    }

    #[test]
    fn test_tdistance_zero_at_crossing() {
        let x = linear(&[(0.0, 0), (10.0, 10)]);
        let y = linear(&[(10.0, 0), (0.0, 10)]);
        let d = x.tdistance(&y).unwrap().unwrap();
        assert_eq!(d.value_at_timestamp(ts(5)), Some(0.0));
        assert_eq!(d.value_at_timestamp(ts(0)), Some(10.0));
        assert_eq!(x.nearest_approach_distance(&y).unwrap(), 0.0);
    }

    #[test]
    fn test_tbool_ops() {
        let t0 = ts(0);
        let t10 = ts(10);
        let a = Temporal::Sequence(
            TSequence::new(
                vec![
                    TInstant::new(true, t0).unwrap(),
                    TInstant::new(false, t10).unwrap(),
                ],
                true,
                true,
                TInterpolation::Step,
            )
            .unwrap(),
        );
        let b = Temporal::Sequence(
            TSequence::new(
                vec![
                    TInstant::new(true, t0).unwrap(),
                    TInstant::new(true, t10).unwrap(),
                ],
                true,
                true,
                TInterpolation::Step,
            )
            .unwrap(),
        );
        let and = a.tand(&b).unwrap().unwrap();
        assert_eq!(and.value_at_timestamp(ts(5)), Some(true));
        assert_eq!(and.value_at_timestamp(t10), Some(false));

        let not = a.tnot().unwrap();
        assert_eq!(not.value_at_timestamp(ts(5)), Some(false));

        let when = a.when_true().unwrap();
        assert!(when.contains_value(ts(5)));
        assert!(!when.contains_value(t10));
    }

    #[test]
    fn test_tint_ops() {
        let a = Temporal::instant(2i64, ts(0)).unwrap();
        let b = Temporal::instant(3i64, ts(0)).unwrap();
        let sum = a.add(&b).unwrap().unwrap();
        assert_eq!(sum.start_value(), 5);
        let f = a.to_tfloat().unwrap();
        assert_eq!(f.start_value(), 2.0);
    }

    #[test]
    fn test_text_concat() {
        let a = Temporal::instant(Text::from("foo"), ts(0)).unwrap();
        let b = Temporal::instant(Text::from("bar"), ts(0)).unwrap();
        let c = a.concat(&b).unwrap().unwrap();
        assert_eq!(c.start_value(), Text::from("foobar"));
    }

    #[test]
    fn test_tlt() {
        let x = linear(&[(0.0, 0), (10.0, 10)]);
        let y = linear(&[(10.0, 0), (0.0, 10)]);
        let lt = x.tlt(&y).unwrap().unwrap();
        assert_eq!(lt.value_at_timestamp(ts(2)), Some(true));
        assert_eq!(lt.value_at_timestamp(ts(5)), Some(false));
        assert_eq!(lt.value_at_timestamp(ts(8)), Some(false));
    }
}
