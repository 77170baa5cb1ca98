//! Errors raised by a single numeric operation.
//!
//! Neither variant is fatal to a render: the evaluator treats both as
//! "this orbit escaped" and moves on to the next pixel.

/// A numeric fault in one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NumericError {
    /// A result does not fit the active representation.
    #[error("numeric overflow in {0}")]
    Overflow(&'static str),
    /// An operation was evaluated outside its domain (zero denominator).
    #[error("domain error in {0}")]
    Domain(&'static str),
}

/// Convenience alias for results of numeric operations.
pub type NumericResult<T> = Result<T, NumericError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
