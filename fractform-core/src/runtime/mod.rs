//! Stack-machine evaluator for compiled programs.
//!
//! An [`Evaluator`] owns one copy of a [`Program`] together with the slot
//! values, a value stack and the cursors into the load, store and jump
//! tables. It is built once per image; the caller then drives it per pixel
//! and per iteration:
//!
//! ```text
//! Evaluator::new(program, precision, params)      once per image
//!   run_initialization(pixel)                     once per pixel
//!     run_iteration() -> escaped                  once per orbit step
//! ```
//!
//! User variables and `z` keep their values from one pixel to the next;
//! the formula's initialization section is expected to reset them.
//!
//! A numeric fault (overflow, domain error) ends the orbit: the pixel is
//! reported as escaped and no further iteration runs until the next
//! initialization.

use fractform_numeric::error::NumericError;
use fractform_numeric::fixed::FixedOps;
use fractform_numeric::float::FloatOps;
use fractform_numeric::ops::{Function, NumericOps};
use fractform_numeric::random::FormulaRng;
use fractform_numeric::types::{complex, truth, Complex, MAX_BITSHIFT, MIN_BITSHIFT};

#[cfg(feature = "bignum")]
use fractform_numeric::bignum::{BigOps, MAX_DIGITS, MIN_DIGITS};

use crate::catalog::{Predefined, PARAM_FUNCTIONS};
use crate::config::{FormulaParams, PixelInput, Precision};
use crate::error::{CompileError, CompileResult};
use crate::program::{Instruction, Program};
use crate::symbols::{SymbolId, SymbolKind};

#[cfg(test)]
mod tests;

// ---------------------------------------------------------------------------
// Faults
// ---------------------------------------------------------------------------

/// Why an instruction could not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    #[error(transparent)]
    Numeric(#[from] NumericError),
    #[error("stack underflow at instruction {0}")]
    StackUnderflow(usize),
    #[error("{table} index {index} out of range")]
    BadIndex { table: &'static str, index: usize },
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// Positions in the instruction, load, store and jump tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Cursor {
    pc: usize,
    load: usize,
    store: usize,
    jump: usize,
}

/// The evaluator for one numeric backend.
#[derive(Debug)]
struct Machine<N: NumericOps> {
    ops: N,
    program: Program,
    slots: Vec<N::Value>,
    stack: Vec<N::Value>,
    functions: [Function; PARAM_FUNCTIONS],
    rng: FormulaRng,
    cursor: Cursor,
    /// Where each iteration starts.
    init: Cursor,
    overflow: bool,
}

impl<N: NumericOps> Machine<N> {
    fn new(
        ops: N,
        program: &Program,
        params: &FormulaParams,
        rng: FormulaRng,
    ) -> CompileResult<Self> {
        let mut slots = Vec::with_capacity(program.symbols.len());
        for symbol in program.symbols.iter() {
            let value = match symbol.kind {
                SymbolKind::Predefined(p) => image_value(p, params, symbol.value),
                _ => symbol.value,
            };
            let converted = ops.from_complex(value).map_err(|err| {
                CompileError::Precision(format!(
                    "{} = ({}, {}) in {} mode: {err}",
                    symbol.name,
                    value.re,
                    value.im,
                    ops.name()
                ))
            })?;
            slots.push(converted);
        }
        tracing::debug!(
            backend = ops.name(),
            slots = slots.len(),
            instructions = program.instructions.len(),
            "evaluator ready"
        );
        Ok(Self {
            stack: Vec::with_capacity(program.loads.len() + 1),
            slots,
            functions: params.functions,
            rng,
            cursor: Cursor::default(),
            init: Cursor::default(),
            overflow: false,
            program: program.clone(),
            ops,
        })
    }

    // -- slots --

    fn set(&mut self, p: Predefined, value: N::Value) {
        if let Some(slot) = self.slots.get_mut(p.slot()) {
            *slot = value;
        }
    }

    fn get(&self, id: SymbolId) -> Option<Complex> {
        self.slots.get(id.index()).map(|v| self.ops.to_complex(v))
    }

    fn bind_pixel(&mut self, input: &PixelInput) -> Result<(), Fault> {
        let screen = self
            .ops
            .from_complex(complex(f64::from(input.col), f64::from(input.row)))?;
        let white = self.ops.from_complex(truth(input.white_square()))?;
        let pixel = self.ops.pixel(input.pixel)?;
        self.set(Predefined::ScrnPix, screen);
        self.set(Predefined::WhiteSq, white);
        self.set(Predefined::Pixel, pixel);
        Ok(())
    }

    // -- driving --

    fn run_initialization(&mut self, input: &PixelInput) -> bool {
        self.overflow = false;
        self.cursor = Cursor::default();
        self.stack.clear();
        if let Err(fault) = self.bind_pixel(input) {
            self.fault(fault);
            return false;
        }
        if self.program.has_init {
            if let Err(fault) = self.execute(true) {
                self.fault(fault);
            }
            self.init = self.cursor;
        } else {
            self.init = Cursor::default();
        }
        !self.overflow
    }

    fn run_iteration(&mut self) -> bool {
        if self.overflow {
            return true;
        }
        self.cursor = self.init;
        if self.program.usage.rand || self.rng.explicitly_seeded() {
            let value = self.rng.next_value();
            match self.ops.from_complex(value) {
                Ok(value) => self.set(Predefined::Rand, value),
                Err(err) => {
                    self.fault(err.into());
                    return true;
                }
            }
        }
        self.stack.clear();
        if let Err(fault) = self.execute(false) {
            self.fault(fault);
            return true;
        }
        match self.stack.last() {
            Some(top) => self.ops.is_false(top),
            None => {
                tracing::error!("iteration left an empty stack");
                true
            }
        }
    }

    fn fault(&mut self, fault: Fault) {
        self.overflow = true;
        match fault {
            Fault::Numeric(err) => tracing::trace!(%err, pc = self.cursor.pc, "orbit ended"),
            other => tracing::error!(fault = %other, pc = self.cursor.pc, "evaluator fault"),
        }
    }

    // -- execution --

    /// Run from the cursor to the end of the program, or to `end-init`
    /// when `stop_at_init` is set.
    fn execute(&mut self, stop_at_init: bool) -> Result<(), Fault> {
        let len = self.program.instructions.len();
        while self.cursor.pc < len {
            let pc = self.cursor.pc;
            let instruction = self.program.instructions[pc];
            self.cursor.pc += 1;
            match instruction {
                Instruction::Load => {
                    let id = self.load_slot()?;
                    let value = self.slot(id)?.clone();
                    self.stack.push(value);
                }
                Instruction::Store => {
                    let id = self.store_slot()?;
                    let top = self.top(pc)?.clone();
                    let slot = self.slot_mut(id)?;
                    *slot = top;
                }
                Instruction::Clear => {
                    if let Some(top) = self.stack.pop() {
                        self.stack.clear();
                        self.stack.push(top);
                    }
                }
                Instruction::Negate => {
                    let value = self.ops.negate(self.top(pc)?)?;
                    self.replace_top(value);
                }
                Instruction::Modulus => {
                    let value = self.ops.modulus(self.top(pc)?)?;
                    self.replace_top(value);
                }
                Instruction::Binary(op) => {
                    let rhs = self.stack.pop().ok_or(Fault::StackUnderflow(pc))?;
                    let lhs = self.top(pc)?;
                    let value = self.ops.binary(op, lhs, &rhs)?;
                    self.replace_top(value);
                }
                Instruction::Call(function) => self.call(function, pc)?,
                Instruction::CallParam(n) => {
                    let function = *self.functions.get(usize::from(n)).ok_or(Fault::BadIndex {
                        table: "function",
                        index: usize::from(n),
                    })?;
                    self.call(function, pc)?;
                }
                Instruction::EndInit => {
                    if stop_at_init {
                        return Ok(());
                    }
                }
                Instruction::Jump => self.take_jump()?,
                Instruction::JumpOnFalse => {
                    if self.ops.is_false(self.top(pc)?) {
                        self.take_jump()?;
                    } else {
                        self.cursor.jump += 1;
                    }
                }
                Instruction::JumpLabel => self.cursor.jump += 1,
            }
        }
        Ok(())
    }

    fn call(&mut self, function: Function, pc: usize) -> Result<(), Fault> {
        match function {
            Function::Sqr => {
                let (square, magnitude) = self.ops.square(self.top(pc)?)?;
                self.set(Predefined::LastSqr, magnitude);
                self.replace_top(square);
            }
            Function::Srand => {
                let seed = self.ops.to_complex(self.top(pc)?);
                let first = self.ops.from_complex(self.rng.reseed(seed))?;
                self.set(Predefined::Rand, first.clone());
                self.replace_top(first);
            }
            other => {
                let value = self.ops.apply(other, self.top(pc)?)?;
                self.replace_top(value);
            }
        }
        Ok(())
    }

    fn take_jump(&mut self) -> Result<(), Fault> {
        let index = self.cursor.jump;
        let entry = self.program.jumps.get(index).ok_or(Fault::BadIndex {
            table: "jump",
            index,
        })?;
        let target = entry.target;
        self.cursor = Cursor {
            pc: target.op + 1,
            load: target.load,
            store: target.store,
            jump: target.next,
        };
        Ok(())
    }

    // -- stack and table access --

    fn top(&self, pc: usize) -> Result<&N::Value, Fault> {
        self.stack.last().ok_or(Fault::StackUnderflow(pc))
    }

    fn replace_top(&mut self, value: N::Value) {
        if let Some(top) = self.stack.last_mut() {
            *top = value;
        } else {
            self.stack.push(value);
        }
    }

    fn load_slot(&mut self) -> Result<SymbolId, Fault> {
        let index = self.cursor.load;
        let id = *self.program.loads.get(index).ok_or(Fault::BadIndex {
            table: "load",
            index,
        })?;
        self.cursor.load += 1;
        Ok(id)
    }

    fn store_slot(&mut self) -> Result<SymbolId, Fault> {
        let index = self.cursor.store;
        let id = *self.program.stores.get(index).ok_or(Fault::BadIndex {
            table: "store",
            index,
        })?;
        self.cursor.store += 1;
        Ok(id)
    }

    fn slot(&self, id: SymbolId) -> Result<&N::Value, Fault> {
        self.slots.get(id.index()).ok_or(Fault::BadIndex {
            table: "symbol",
            index: id.index(),
        })
    }

    fn slot_mut(&mut self, id: SymbolId) -> Result<&mut N::Value, Fault> {
        self.slots.get_mut(id.index()).ok_or(Fault::BadIndex {
            table: "symbol",
            index: id.index(),
        })
    }
}

/// The per-image value of a predefined slot.
fn image_value(p: Predefined, params: &FormulaParams, compiled: Complex) -> Complex {
    match p {
        Predefined::P1 => params.params[0],
        Predefined::P2 => params.params[1],
        Predefined::P3 => params.params[2],
        Predefined::P4 => params.params[3],
        Predefined::P5 => params.params[4],
        Predefined::MaxIt => complex(f64::from(params.maxit), 0.0),
        Predefined::IsMand => truth(params.ismand),
        Predefined::ScrnMax => complex(f64::from(params.screen.0), f64::from(params.screen.1)),
        Predefined::Center => params.center,
        Predefined::MagXMag => complex(params.magxmag.0, params.magxmag.1),
        Predefined::RotSkew => complex(params.rotskew.0, params.rotskew.1),
        Predefined::Pi | Predefined::E => compiled,
        Predefined::Pixel
        | Predefined::Z
        | Predefined::LastSqr
        | Predefined::Rand
        | Predefined::WhiteSq
        | Predefined::ScrnPix => complex(0.0, 0.0),
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Seed used when nothing else picks one.
const FALLBACK_SEED: u64 = 0;

/// Generator for a formula that reads `rand` without a caller seed.
#[cfg(feature = "entropy")]
fn unseeded_rng(bitshift: u32) -> FormulaRng {
    FormulaRng::from_entropy(bitshift)
}

#[cfg(not(feature = "entropy"))]
fn unseeded_rng(bitshift: u32) -> FormulaRng {
    FormulaRng::from_seed(FALLBACK_SEED, bitshift)
}

/// The machine for the selected backend.
#[derive(Debug)]
enum Backend {
    Float(Machine<FloatOps>),
    Fixed(Machine<FixedOps>),
    #[cfg(feature = "bignum")]
    Big(Machine<BigOps>),
}

macro_rules! dispatch {
    ($backend:expr, $m:ident => $body:expr) => {
        match $backend {
            Backend::Float($m) => $body,
            Backend::Fixed($m) => $body,
            #[cfg(feature = "bignum")]
            Backend::Big($m) => $body,
        }
    };
}

/// A program bound to one numeric backend and one image's parameters.
#[derive(Debug)]
pub struct Evaluator {
    backend: Backend,
}

impl Evaluator {
    /// Bind a program to a precision mode and per-image parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::Precision`] when the mode is unavailable or
    /// out of range, or when a parameter or constant does not fit it.
    pub fn new(
        program: &Program,
        precision: Precision,
        params: &FormulaParams,
    ) -> CompileResult<Self> {
        let rand_bits = precision.rand_bitshift();
        let rng = match params.rand_seed {
            Some(seed) => FormulaRng::from_seed(seed, rand_bits),
            None if program.usage.rand => unseeded_rng(rand_bits),
            None => FormulaRng::from_seed(FALLBACK_SEED, rand_bits),
        };
        let backend = match precision {
            Precision::Float => Backend::Float(Machine::new(FloatOps, program, params, rng)?),
            Precision::Fixed { bitshift } => {
                let ops = FixedOps::new(bitshift).ok_or_else(|| {
                    CompileError::Precision(format!(
                        "fixed point needs {MIN_BITSHIFT}..={MAX_BITSHIFT} fractional bits, got {bitshift}"
                    ))
                })?;
                Backend::Fixed(Machine::new(ops, program, params, rng)?)
            }
            #[cfg(feature = "bignum")]
            Precision::Arbitrary { digits } => {
                let ops = BigOps::with_digits(digits).ok_or_else(|| {
                    CompileError::Precision(format!(
                        "arbitrary precision needs {MIN_DIGITS}..={MAX_DIGITS} digits, got {digits}"
                    ))
                })?;
                Backend::Big(Machine::new(ops, program, params, rng)?)
            }
            #[cfg(not(feature = "bignum"))]
            Precision::Arbitrary { .. } => {
                return Err(CompileError::Precision(
                    "arbitrary precision is not available in this build".into(),
                ));
            }
        };
        Ok(Self { backend })
    }

    /// Bind a pixel and run the initialization section.
    ///
    /// Returns `false` when a numeric fault occurred.
    pub fn run_initialization(&mut self, input: &PixelInput) -> bool {
        dispatch!(&mut self.backend, m => m.run_initialization(input))
    }

    /// Run one iteration. Returns `true` when the orbit escaped (the final
    /// value's real part is zero, or a fault occurred).
    pub fn run_iteration(&mut self) -> bool {
        dispatch!(&mut self.backend, m => m.run_iteration())
    }

    /// Iterate one pixel until it escapes.
    ///
    /// Returns the iteration at which it escaped, `Some(0)` when the
    /// initialization failed, or `None` when it stayed bounded for
    /// `max_iterations` steps.
    pub fn escape_time(&mut self, input: &PixelInput, max_iterations: u32) -> Option<u32> {
        if !self.run_initialization(input) {
            return Some(0);
        }
        (1..=max_iterations).find(|_| self.run_iteration())
    }

    /// Current value of `z`.
    #[must_use]
    pub fn z(&self) -> Complex {
        self.predefined(Predefined::Z)
    }

    /// Current value of a predefined variable.
    #[must_use]
    pub fn predefined(&self, p: Predefined) -> Complex {
        dispatch!(&self.backend, m => m.get(SymbolId::predefined(p))).unwrap_or_default()
    }

    /// Current value of a named variable.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<Complex> {
        let name = name.to_ascii_lowercase();
        dispatch!(&self.backend, m => m.program.symbols.lookup(&name).and_then(|id| m.get(id)))
    }

    /// Name of the numeric backend.
    #[must_use]
    pub fn backend(&self) -> &'static str {
        dispatch!(&self.backend, m => m.ops.name())
    }
}
