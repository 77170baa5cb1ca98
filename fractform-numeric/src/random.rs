//! The generator behind the `rand` variable and the `srand()` function.
//!
//! A 32-bit state is stirred with 15-bit draws from a seeded [`StdRng`]:
//! `state = ((state << 15) + draw) ^ state`. Each component of a `rand`
//! value is the top `bitshift` bits of a fresh state read as a fraction in
//! `[0, 1)`. Every precision mode goes through the same integer path, so a
//! formula seeded with `srand` produces the same sequence in float,
//! fixed-point and arbitrary-precision evaluation.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::types::{Complex, Scalar};

/// Number of draws discarded after every reseed.
const WARM_UP: usize = 3;

/// Random source for one evaluator.
#[derive(Debug, Clone)]
pub struct FormulaRng {
    rng: StdRng,
    state: u32,
    bitshift: u32,
    explicitly_seeded: bool,
}

impl FormulaRng {
    /// Seed from system entropy, as referencing `rand` without `srand` does.
    #[cfg(feature = "entropy")]
    #[must_use]
    pub fn from_entropy(bitshift: u32) -> Self {
        Self::with_rng(StdRng::from_entropy(), bitshift)
    }

    /// Seed deterministically. Used by tests and by callers that want
    /// reproducible renders of formulas that read `rand`.
    #[must_use]
    pub fn from_seed(seed: u64, bitshift: u32) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), bitshift)
    }

    fn with_rng(rng: StdRng, bitshift: u32) -> Self {
        let mut this = Self {
            rng,
            state: 0,
            bitshift: bitshift.clamp(1, 31),
            explicitly_seeded: false,
        };
        this.warm_up();
        this
    }

    /// Whether `srand()` has run since construction.
    #[must_use]
    pub const fn explicitly_seeded(&self) -> bool {
        self.explicitly_seeded
    }

    fn draw15(&mut self) -> u32 {
        self.rng.next_u32() & 0x7fff
    }

    fn advance(&mut self) -> u32 {
        let draw = self.draw15();
        self.state = (self.state.wrapping_shl(15).wrapping_add(draw)) ^ self.state;
        self.state
    }

    fn warm_up(&mut self) {
        for _ in 0..WARM_UP {
            self.advance();
        }
    }

    fn fraction(&mut self) -> Scalar {
        let bits = self.advance() >> (32 - self.bitshift);
        Scalar::from(bits) / Scalar::from(1_u32 << self.bitshift)
    }

    /// The next `rand` value: real part first, then imaginary.
    pub fn next_value(&mut self) -> Complex {
        let re = self.fraction();
        let im = self.fraction();
        Complex::new(re, im)
    }

    /// `srand(arg)`: reseed and return the first value of the new sequence.
    ///
    /// The first call takes its state from the fixed-point bits of `arg`;
    /// later calls reseed from the current state, so repeated `srand` calls
    /// keep advancing rather than restarting.
    pub fn reseed(&mut self, arg: Complex) -> Complex {
        if !self.explicitly_seeded {
            self.state = self.fixed_bits(arg.re) ^ self.fixed_bits(arg.im);
        }
        let seed = self.state ^ (self.state >> 16);
        self.rng = StdRng::seed_from_u64(u64::from(seed));
        self.explicitly_seeded = true;
        self.warm_up();
        self.next_value()
    }

    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "only the low 32 bits of the scaled value are wanted"
    )]
    fn fixed_bits(&self, x: Scalar) -> u32 {
        let scaled = (x * Scalar::from(1_u32 << self.bitshift)).trunc();
        (scaled as i64) as u32
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn values_are_unit_fractions() {
        let mut rng = FormulaRng::from_seed(7, 16);
        for _ in 0..1000 {
            let v = rng.next_value();
            assert!((0.0..1.0).contains(&v.re));
            assert!((0.0..1.0).contains(&v.im));
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = FormulaRng::from_seed(42, 16);
        let mut b = FormulaRng::from_seed(42, 16);
        for _ in 0..16 {
            assert_eq!(a.next_value(), b.next_value());
        }
    }

    #[test]
    fn srand_is_deterministic_across_sources() {
        let mut a = FormulaRng::from_seed(1, 16);
        let mut b = FormulaRng::from_seed(99, 16);
        let arg = Complex::new(0.25, 3.0);
        assert_eq!(a.reseed(arg), b.reseed(arg));
        assert_eq!(a.next_value(), b.next_value());
        assert!(a.explicitly_seeded());
    }

    #[test]
    fn second_srand_continues_from_state() {
        let mut a = FormulaRng::from_seed(1, 16);
        let arg = Complex::new(1.0, 0.0);
        let first = a.reseed(arg);
        let second = a.reseed(arg);
        assert_ne!(first, second);
    }

    #[test]
    fn fractions_have_bitshift_resolution() {
        let mut rng = FormulaRng::from_seed(3, 8);
        for _ in 0..100 {
            let v = rng.next_value();
            assert_eq!((v.re * 256.0).fract(), 0.0);
        }
    }
}
