//! Temporal instants: a value at a timestamp.

use crate::base::BaseValue;
use crate::error::Result;
use crate::span::SpanBound;
use chrono::{DateTime, TimeDelta, Utc};

/// A base value attached to a single timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct TInstant<B: BaseValue> {
    value: B,
    t: DateTime<Utc>,
}

impl<B: BaseValue> TInstant<B> {
    /// Create an instant, validating the value.
    pub fn new(value: B, t: DateTime<Utc>) -> Result<Self> {
        value.validate()?;
        Ok(Self { value, t })
    }

    /// Build from an already-validated value.
    pub(crate) fn from_parts(value: B, t: DateTime<Utc>) -> Self {
        Self { value, t }
    }

    pub fn value(&self) -> &B {
        &self.value
    }

    pub fn into_value(self) -> B {
        self.value
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.t
    }

    /// Bounding box of this instant.
    pub fn bbox(&self) -> B::Bbox {
        self.value.instant_box(self.t)
    }

    /// Translate the timestamp by `delta`.
    pub fn shift(&self, delta: TimeDelta) -> Result<Self> {
        Ok(Self {
            value: self.value.clone(),
            t: self.t.plus(delta)?,
        })
    }

    /// Value at `t`, defined only at the instant itself.
    pub fn value_at_timestamp(&self, t: DateTime<Utc>) -> Option<B> {
        if t == self.t {
            Some(self.value.clone())
        } else {
            None
        }
    }
}
