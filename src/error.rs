//! Error types for Tempora.

use thiserror::Error;

/// Errors that can occur during temporal operations.
#[derive(Error, Debug)]
pub enum TemporalError {
    /// A literal could not be parsed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Span bounds are inverted or an instant span excludes its bounds.
    #[error("Invalid span: {0}")]
    InvalidSpan(String),

    /// An interval is unusable as a numeric period or a duration is not positive.
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// An appended instant is not strictly after the last one.
    #[error("Out-of-order timestamp: {0}")]
    OutOfOrder(String),

    /// Two temporal values have incompatible types or dimensions.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Two spatial values carry different SRIDs.
    #[error("SRID mismatch: {0} vs {1}")]
    SridMismatch(i32, i32),

    /// Mixed 2D and 3D spatial values.
    #[error("Dimensionality mismatch: cannot mix 2D and 3D values")]
    DimensionalityMismatch,

    /// Mixed geodetic and planar spatial values.
    #[error("Geodetic mismatch: cannot mix geodetic and planar values")]
    GeodeticMismatch,

    /// A constructor received zero elements where at least one is required.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// An operation would exceed the configured instant budget.
    #[error("Operation too complex: instant budget of {0} exceeded")]
    TooComplex(usize),

    /// Interval or timestamp arithmetic overflowed.
    #[error("Numeric overflow in {0}")]
    NumericOverflow(String),
}

/// Result type alias for Tempora operations.
pub type Result<T> = std::result::Result<T, TemporalError>;
