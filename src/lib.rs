//! Embedded temporal-value algebra for moving objects.
//!
//! Tempora models values that vary over time: time spans and span sets,
//! temporal booleans, integers, floats, texts, and 2D/3D points, together
//! with the operators that combine them — synchronization, lifted
//! arithmetic and comparison, restriction by value and time, streaming
//! append, and skiplist-based aggregation.
//!
//! ```rust
//! use tempora::prelude::*;
//!
//! let trip: Temporal<f64> =
//!     "[10@2000-01-01 00:00:00+00, 20@2000-01-01 00:10:00+00)".parse()?;
//! let at = trip.at_value(&15.0).unwrap();
//! assert_eq!(at.start_value(), 15.0);
//! # Ok::<(), tempora::TemporalError>(())
//! ```

pub mod base;
pub mod boxes;
pub mod engine;
pub mod error;
pub mod interval;
pub mod io;
pub mod point;
pub mod span;
pub mod spanset;
pub mod temporal;
pub mod tpoint;

pub use error::{Result, TemporalError};

pub use engine::{Config, DateOrder, DateStyle, Engine, IntervalStyle, finalize, initialize};

pub use base::{BaseValue, EPSILON, NumberValue, Text};

pub use interval::Interval;

pub use span::{FloatSpan, IntSpan, Span, SpanBound, TsTzSpan};

pub use spanset::{FloatSpanSet, IntSpanSet, SpanSet, TsTzSpanSet};

pub use boxes::{STBox, TBox, TemporalBox};

pub use point::PointValue;

pub use temporal::{
    TInstant, TInstantSet, TInterpolation, TSequence, TSequenceSet, Temporal,
    agg::{ExtentAgg, TAgg, TCentroidAgg, TCountAgg},
    build::TSequenceSetBuilder,
    lift::{LiftedBinary, lift_binary, lift_unary},
    sync::{SyncMode, synchronize},
};

pub use tpoint::TPoint;

pub use io::{WkbReadable, WkbWritable, parse_tgeogpoint};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Result, TemporalError};

    pub use crate::{Config, finalize, initialize};

    pub use crate::{FloatSpan, IntSpan, Span, TsTzSpan};

    pub use crate::{FloatSpanSet, IntSpanSet, SpanSet, TsTzSpanSet};

    pub use crate::{STBox, TBox};

    pub use crate::{
        TInstant, TInstantSet, TInterpolation, TPoint, TSequence, TSequenceSet, Temporal,
    };

    pub use crate::{PointValue, Text};

    pub use crate::{WkbReadable, WkbWritable};

    pub use chrono::{DateTime, TimeDelta, Utc};
}
