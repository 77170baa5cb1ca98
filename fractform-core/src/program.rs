//! The compiled form of a formula.
//!
//! A [`Program`] is a linear instruction list plus three parallel tables.
//! Instructions carry no operands of their own: `load` and `store` consume
//! the next entry of their table, and the jump instructions consume the next
//! entry of the jump table, which says where execution resumes and where
//! the load and store cursors stand at that point.
//!
//! | Instruction     | Stack effect                                      |
//! |-----------------|---------------------------------------------------|
//! | `load`          | push the next load slot                           |
//! | `store`         | copy the top into the next store slot (no pop)    |
//! | `clear`         | drop everything below the top                     |
//! | binary          | pop two, push one                                 |
//! | unary, call     | replace the top                                   |
//! | `end-init`      | marks the end of the per-pixel section            |
//! | `jump`          | take the current jump entry                       |
//! | `jump-if-false` | take it when the top is false, else skip it       |
//! | `jump-label`    | skip the current jump entry                       |

use std::fmt::{self, Write as _};

use fractform_numeric::ops::{BinaryOp, Function};

use crate::catalog::JumpKeyword;
use crate::symbols::{SymbolId, SymbolTable};

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// One precision-independent operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    Load,
    Store,
    Clear,
    Negate,
    /// `|x|`.
    Modulus,
    Binary(BinaryOp),
    Call(Function),
    /// `fn1`..`fn4`, stored as 0..=3.
    CallParam(u8),
    EndInit,
    Jump,
    JumpOnFalse,
    JumpLabel,
}

impl Instruction {
    /// Whether this instruction consumes a jump-table entry.
    #[must_use]
    pub const fn is_jump(self) -> bool {
        matches!(self, Self::Jump | Self::JumpOnFalse | Self::JumpLabel)
    }

    /// Short mnemonic used in listings.
    #[must_use]
    pub fn mnemonic(self) -> String {
        match self {
            Self::Load => "load".into(),
            Self::Store => "store".into(),
            Self::Clear => "clear".into(),
            Self::Negate => "neg".into(),
            Self::Modulus => "mod".into(),
            Self::Binary(op) => op.symbol().into(),
            Self::Call(f) => f.name().into(),
            Self::CallParam(n) => format!("fn{}", n + 1),
            Self::EndInit => "end-init".into(),
            Self::Jump => "jump".into(),
            Self::JumpOnFalse => "jump-if-false".into(),
            Self::JumpLabel => "jump-label".into(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mnemonic())
    }
}

// ---------------------------------------------------------------------------
// Jump table
// ---------------------------------------------------------------------------

/// Where execution resumes after a jump is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JumpTarget {
    /// Index of the jump instruction to land on; execution continues with
    /// the instruction after it.
    pub op: usize,
    /// Load cursor at that point.
    pub load: usize,
    /// Store cursor at that point.
    pub store: usize,
    /// Jump entry to consult next.
    pub next: usize,
}

/// One resolved jump-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpControl {
    /// The keyword that produced the entry (`elseif` produces two).
    pub keyword: JumpKeyword,
    pub target: JumpTarget,
}

// ---------------------------------------------------------------------------
// Usage flags
// ---------------------------------------------------------------------------

/// What a formula refers to, for the caller and the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Usage {
    pub p1: bool,
    pub p2: bool,
    pub p3: bool,
    pub p4: bool,
    pub p5: bool,
    pub ismand: bool,
    /// `rand` is read, so the generator is refreshed every iteration.
    pub rand: bool,
    pub jump: bool,
    /// Highest `fnN` referenced (0 when none).
    pub max_fn: u8,
}

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

/// A compiled formula.
#[derive(Debug, Clone)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub loads: Vec<SymbolId>,
    pub stores: Vec<SymbolId>,
    pub jumps: Vec<JumpControl>,
    /// Slots with their compile-time values.
    pub symbols: SymbolTable,
    /// Whether the body has a `:` per-pixel section.
    pub has_init: bool,
    pub usage: Usage,
}

impl Program {
    /// Index of the first per-iteration instruction.
    #[must_use]
    pub fn iteration_start(&self) -> usize {
        if self.has_init {
            self.instructions
                .iter()
                .position(|i| *i == Instruction::EndInit)
                .map_or(0, |at| at + 1)
        } else {
            0
        }
    }
}

/// Render an instruction listing with resolved operands.
#[must_use]
pub fn disassemble(program: &Program) -> String {
    let mut out = String::new();
    let mut load = 0;
    let mut store = 0;
    let mut jump = 0;
    let slot_name = |id: Option<&SymbolId>| {
        id.and_then(|id| program.symbols.get(*id))
            .map_or_else(|| "?".to_owned(), |s| s.name.clone())
    };

    for (pc, instruction) in program.instructions.iter().enumerate() {
        let _ = write!(out, "{pc:4}  {:<14}", instruction.mnemonic());
        match instruction {
            Instruction::Load => {
                let _ = write!(out, "{}", slot_name(program.loads.get(load)));
                load += 1;
            }
            Instruction::Store => {
                let _ = write!(out, "{}", slot_name(program.stores.get(store)));
                store += 1;
            }
            i if i.is_jump() => {
                if let Some(entry) = program.jumps.get(jump) {
                    let _ = write!(
                        out,
                        "#{jump} {} -> {}",
                        entry.keyword.name(),
                        entry.target.op + 1
                    );
                }
                jump += 1;
            }
            _ => {}
        }
        out.truncate(out.trim_end().len());
        out.push('\n');
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
