//! Core types shared by every numeric backend.
//!
//! Formula values are always complex. The float backend works on
//! [`Complex`] directly; the fixed-point and arbitrary-precision backends
//! convert to and from it at their boundaries.

// ---------------------------------------------------------------------------
// Scalar and complex
// ---------------------------------------------------------------------------

/// Convenience alias for the real component type used at backend boundaries.
pub type Scalar = f64;

/// Double-precision complex number.
pub type Complex = num_complex::Complex64;

/// Smallest positive normal double. Denominators at or below this magnitude
/// are treated as a domain error.
pub const DBL_MIN: Scalar = f64::MIN_POSITIVE;

/// Default number of fractional bits for fixed-point arithmetic and for the
/// width of generated random fractions.
pub const DEFAULT_BITSHIFT: u32 = 16;

/// Smallest accepted fixed-point fractional width.
pub const MIN_BITSHIFT: u32 = 8;

/// Largest accepted fixed-point fractional width.
pub const MAX_BITSHIFT: u32 = 30;

/// Build a complex value from its parts.
#[inline]
#[must_use]
pub const fn complex(re: Scalar, im: Scalar) -> Complex {
    Complex::new(re, im)
}

/// `(1, 0)` when `flag` holds, `(0, 0)` otherwise.
#[inline]
#[must_use]
pub const fn truth(flag: bool) -> Complex {
    if flag {
        Complex::new(1.0, 0.0)
    } else {
        Complex::new(0.0, 0.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
