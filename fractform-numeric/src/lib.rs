//! Complex arithmetic backends for compiled fractal formulas.

pub mod types;

pub mod error;
pub mod fixed;
pub mod float;
pub mod math;
pub mod ops;
pub mod random;

#[cfg(feature = "bignum")]
pub mod bignum;
