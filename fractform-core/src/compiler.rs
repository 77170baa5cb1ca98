//! Expression compiler.
//!
//! The compiler walks the normalized token stream once. Every operand,
//! operator, function call and jump becomes a *pending op* tagged with a
//! precedence number; parentheses and assignments do not produce ops, they
//! lower the precedence of everything inside them by 15 per level. A
//! recursive reordering pass then emits each op after the ops of lower
//! precedence that follow it, which turns the infix stream into stack code.
//!
//! | Construct                  | Precedence (before nesting)    |
//! |----------------------------|--------------------------------|
//! | operand, function call     | 1                              |
//! | `^`, unary `-`, `\|x\|`    | 2                              |
//! | `*`, `/`                   | 3                              |
//! | `+`, binary `-`            | 4                              |
//! | `=` (store)                | 5                              |
//! | comparisons                | 6                              |
//! | `&&`, `\|\|`               | 7                              |
//! | statement barrier          | 15 (16 at the end)             |
//! | `clear`, `end-init`        | -30000                         |
//!
//! Jumps are pushed at precedence 1 without nesting, so an `if` is emitted
//! right after its parenthesised condition.

use fractform_numeric::ops::BinaryOp;
use fractform_numeric::types::complex;

use crate::alloc::Capacity;
use crate::catalog::{JumpKeyword, Operator, Predefined};
use crate::error::{CompileError, CompileResult, ParseErrorCode};
use crate::jumps;
use crate::normalize::Normalized;
use crate::program::{Instruction, Program, Usage};
use crate::symbols::{SymbolId, SymbolTable};
use crate::token::{Token, TokenKind};

/// Precedence step per level of parentheses or assignment.
const NESTING_STEP: i32 = 15;

/// Precedence of the barrier that ends a statement.
const BARRIER: i32 = 15;

/// Precedence of the barrier that ends the formula.
const FINAL_BARRIER: i32 = 16;

/// Precedence of statement-level steps (`clear`, `end-init`).
const STATEMENT: i32 = -30000;

/// `mod_flag` value while no `|` is open.
const NO_MODULUS: i32 = 999;

// ---------------------------------------------------------------------------
// Pending ops
// ---------------------------------------------------------------------------

/// An op waiting to be reordered. Barriers carry no instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingOp {
    instruction: Option<Instruction>,
    /// The slot a `load` or `store` refers to.
    slot: Option<SymbolId>,
    prec: i32,
}

/// The outcome of one compile pass.
#[derive(Debug, Clone)]
pub struct CompiledBody {
    pub program: Program,
    /// What the pass actually used of each table.
    pub measured: Capacity,
}

// ---------------------------------------------------------------------------
// Compiler context
// ---------------------------------------------------------------------------

struct CompilerContext {
    capacity: Capacity,
    pending: Vec<PendingOp>,
    loads: usize,
    stores: usize,
    jumps: Vec<JumpKeyword>,
    symbols: SymbolTable,
    usage: Usage,
    has_init: bool,
    expecting_arg: bool,
    paren: i32,
    equals: i32,
    /// Paren level of the innermost open `|`.
    mod_flag: i32,
    /// Enclosing `mod_flag` values.
    mods: Vec<i32>,
}

impl CompilerContext {
    fn new(capacity: Capacity) -> Self {
        Self {
            capacity,
            pending: Vec::new(),
            loads: 0,
            stores: 0,
            jumps: Vec::new(),
            symbols: SymbolTable::with_capacity(capacity.symbols),
            usage: Usage::default(),
            has_init: false,
            expecting_arg: true,
            paren: 0,
            equals: 0,
            mod_flag: NO_MODULUS,
            mods: Vec::new(),
        }
    }

    const fn nesting(&self) -> i32 {
        (self.paren + self.equals) * NESTING_STEP
    }

    fn full(table: &str, limit: usize) -> CompileError {
        CompileError::Resource {
            code: ParseErrorCode::InsufficientMemory,
            detail: format!("{table} table holds at most {limit} entries"),
        }
    }

    // -- table writers --

    fn push_op(&mut self, instruction: Option<Instruction>, prec: i32) -> CompileResult<()> {
        if self.pending.len() >= self.capacity.ops {
            return Err(Self::full("op", self.capacity.ops));
        }
        self.pending.push(PendingOp {
            instruction,
            slot: None,
            prec,
        });
        Ok(())
    }

    /// Push an op whose precedence is lowered by the current nesting.
    fn push_nested(&mut self, instruction: Instruction, base: i32) -> CompileResult<()> {
        let prec = base - self.nesting();
        self.push_op(Some(instruction), prec)
    }

    fn push_binary(&mut self, op: BinaryOp, base: i32) -> CompileResult<()> {
        self.expecting_arg = true;
        self.push_nested(Instruction::Binary(op), base)
    }

    fn push_jump(&mut self, keyword: JumpKeyword) -> CompileResult<()> {
        if self.jumps.len() >= self.capacity.jumps {
            return Err(Self::full("jump", self.capacity.jumps));
        }
        self.jumps.push(keyword);
        Ok(())
    }

    fn push_load(&mut self, id: SymbolId, prec: i32) -> CompileResult<()> {
        if self.loads >= self.capacity.loads {
            return Err(Self::full("load", self.capacity.loads));
        }
        self.push_op(Some(Instruction::Load), prec)?;
        if let Some(op) = self.pending.last_mut() {
            op.slot = Some(id);
        }
        self.loads += 1;
        Ok(())
    }

    /// End the statement: a barrier, then `step` at statement level.
    fn end_statement(&mut self, step: Instruction) -> CompileResult<()> {
        self.expecting_arg = true;
        self.push_op(None, BARRIER)?;
        self.push_op(Some(step), STATEMENT)?;
        self.paren = 0;
        self.equals = 0;
        Ok(())
    }

    // -- token handlers --

    fn token(&mut self, token: &Token) -> CompileResult<()> {
        match token.kind {
            TokenKind::OpenParen => self.paren += 1,
            TokenKind::CloseParen => self.paren -= 1,
            TokenKind::Operator(op) => self.operator(op)?,
            TokenKind::Function(f) => {
                self.push_nested(Instruction::Call(f), 1)?;
                self.expecting_arg = true;
            }
            TokenKind::ParamFunction(n) => {
                self.push_nested(Instruction::CallParam(n), 1)?;
                self.expecting_arg = true;
                self.usage.max_fn = self.usage.max_fn.max(n + 1);
            }
            TokenKind::FlowControl(keyword) => self.flow_control(keyword)?,
            TokenKind::EndOfFormula => self.push_op(None, FINAL_BARRIER)?,
            TokenKind::ParamVariable(_)
            | TokenKind::PredefinedVariable(_)
            | TokenKind::UserVariable
            | TokenKind::RealConstant(_)
            | TokenKind::ComplexConstant(_) => self.operand(token)?,
        }
        Ok(())
    }

    fn operator(&mut self, op: Operator) -> CompileResult<()> {
        match op {
            Operator::Comma => {
                if !self.expecting_arg {
                    self.end_statement(Instruction::Clear)?;
                }
            }
            Operator::Colon => {
                self.end_statement(Instruction::EndInit)?;
                self.has_init = true;
            }
            Operator::Modulus => {
                if self.mod_flag == self.paren - 1 {
                    self.paren -= 1;
                    self.mod_flag = self.mods.pop().unwrap_or(NO_MODULUS);
                } else {
                    self.mods.push(self.mod_flag);
                    self.push_nested(Instruction::Modulus, 2)?;
                    self.mod_flag = self.paren;
                    self.paren += 1;
                }
            }
            Operator::Minus if self.expecting_arg => {
                self.push_nested(Instruction::Negate, 2)?;
            }
            Operator::Assign => self.assignment()?,
            Operator::Or | Operator::And => self.push_binary(binary(op)?, 7)?,
            Operator::Ne | Operator::Eq | Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => {
                self.push_binary(binary(op)?, 6)?;
            }
            Operator::Plus | Operator::Minus => self.push_binary(binary(op)?, 4)?,
            Operator::Star | Operator::Slash => self.push_binary(binary(op)?, 3)?,
            Operator::Caret => self.push_binary(BinaryOp::Pow, 2)?,
        }
        Ok(())
    }

    /// `=` turns the load just pushed into a store of the same slot.
    fn assignment(&mut self) -> CompileResult<()> {
        self.expecting_arg = true;
        if self.stores >= self.capacity.stores {
            return Err(Self::full("store", self.capacity.stores));
        }
        let prec = 5 - self.nesting();
        match self.pending.last_mut() {
            Some(op) if op.instruction == Some(Instruction::Load) => {
                op.instruction = Some(Instruction::Store);
                op.prec = prec;
            }
            _ => return Err(CompileError::Internal("assignment without a target".into())),
        }
        self.loads -= 1;
        self.stores += 1;
        self.equals += 1;
        Ok(())
    }

    fn flow_control(&mut self, keyword: JumpKeyword) -> CompileResult<()> {
        self.expecting_arg = false;
        self.usage.jump = true;
        match keyword {
            JumpKeyword::If => {
                self.expecting_arg = true;
                self.push_jump(JumpKeyword::If)?;
                self.push_op(Some(Instruction::JumpOnFalse), 1)?;
            }
            JumpKeyword::ElseIf => {
                self.expecting_arg = true;
                self.push_jump(JumpKeyword::ElseIf)?;
                self.push_jump(JumpKeyword::ElseIf)?;
                self.push_op(Some(Instruction::Jump), 1)?;
                self.push_op(None, BARRIER)?;
                self.push_op(Some(Instruction::Clear), STATEMENT)?;
                self.push_op(Some(Instruction::JumpOnFalse), 1)?;
            }
            JumpKeyword::Else => {
                self.push_jump(JumpKeyword::Else)?;
                self.push_op(Some(Instruction::Jump), 1)?;
            }
            JumpKeyword::EndIf => {
                self.push_jump(JumpKeyword::EndIf)?;
                self.push_op(Some(Instruction::JumpLabel), 1)?;
            }
        }
        Ok(())
    }

    fn operand(&mut self, token: &Token) -> CompileResult<()> {
        self.expecting_arg = false;
        let mut prec = 1 - self.nesting();
        let id = match token.kind {
            TokenKind::RealConstant(_) | TokenKind::ComplexConstant(_)
                if token.text.starts_with('(') =>
            {
                // the literal's own parentheses count as one level
                prec -= NESTING_STEP;
                let value = match token.kind {
                    TokenKind::ComplexConstant(c) => c,
                    TokenKind::RealConstant(re) => complex(re, 0.0),
                    _ => return Err(CompileError::Internal("literal kind".into())),
                };
                self.symbols.intern_constant(value, &token.text)?
            }
            TokenKind::RealConstant(value) => {
                let folds = self
                    .pending
                    .last()
                    .is_some_and(|op| op.instruction == Some(Instruction::Negate));
                if folds {
                    self.pending.pop();
                    let text = format!("-{}", token.text);
                    self.symbols.intern_constant(complex(-value, 0.0), &text)?
                } else {
                    self.symbols.intern_constant(complex(value, 0.0), &token.text)?
                }
            }
            TokenKind::ComplexConstant(value) => {
                self.symbols.intern_constant(value, &token.text)?
            }
            TokenKind::ParamVariable(p) | TokenKind::PredefinedVariable(p) => {
                self.note_use(p);
                self.symbols.intern_variable(&token.text)?
            }
            _ => self.symbols.intern_variable(&token.text)?,
        };
        self.push_load(id, prec)
    }

    fn note_use(&mut self, p: Predefined) {
        match p {
            Predefined::P1 => self.usage.p1 = true,
            Predefined::P2 => self.usage.p2 = true,
            Predefined::P3 => self.usage.p3 = true,
            Predefined::P4 => self.usage.p4 = true,
            Predefined::P5 => self.usage.p5 = true,
            Predefined::IsMand => self.usage.ismand = true,
            Predefined::Rand => self.usage.rand = true,
            _ => {}
        }
    }

    // -- finishing --

    fn finish(self) -> CompileResult<CompiledBody> {
        let emitted = reorder(&self.pending)?;
        let jumps = jumps::resolve(&emitted.instructions, &self.jumps)?;
        let measured = Capacity {
            ops: self.pending.len(),
            symbols: self.symbols.len(),
            loads: self.loads,
            stores: self.stores,
            jumps: self.jumps.len(),
        };
        Ok(CompiledBody {
            program: Program {
                instructions: emitted.instructions,
                loads: emitted.loads,
                stores: emitted.stores,
                jumps,
                symbols: self.symbols,
                has_init: self.has_init,
                usage: self.usage,
            },
            measured,
        })
    }
}

fn binary(op: Operator) -> CompileResult<BinaryOp> {
    op.binary_op()
        .ok_or_else(|| CompileError::Internal(format!("'{}' is not a binary operator", op.text())))
}

// ---------------------------------------------------------------------------
// Reordering
// ---------------------------------------------------------------------------

/// Instructions in execution order, with the load and store slots in the
/// order the instructions consume them.
#[derive(Debug, Default)]
struct Emitted {
    instructions: Vec<Instruction>,
    loads: Vec<SymbolId>,
    stores: Vec<SymbolId>,
}

impl Emitted {
    fn push(&mut self, op: PendingOp) -> CompileResult<()> {
        let Some(instruction) = op.instruction else {
            return Ok(());
        };
        let slot = || {
            op.slot
                .ok_or_else(|| CompileError::Internal(format!("{instruction} without a slot")))
        };
        match instruction {
            Instruction::Load => self.loads.push(slot()?),
            Instruction::Store => self.stores.push(slot()?),
            _ => {}
        }
        self.instructions.push(instruction);
        Ok(())
    }
}

/// Emit pending ops in stack order.
fn reorder(pending: &[PendingOp]) -> CompileResult<Emitted> {
    let mut out = Emitted::default();
    let mut next = 0;
    while next < pending.len() {
        if pending[next].instruction.is_some() {
            reorder_from(pending, &mut next, &mut out)?;
        } else {
            next += 1;
        }
    }
    Ok(out)
}

/// Emit the op at `next` after every following op that binds tighter.
fn reorder_from(pending: &[PendingOp], next: &mut usize, out: &mut Emitted) -> CompileResult<()> {
    let this = *next;
    *next += 1;
    while *next < pending.len() && pending[this].prec > pending[*next].prec {
        reorder_from(pending, next, out)?;
    }
    out.push(pending[this])
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Compile a normalized body within the given table capacity.
///
/// # Errors
///
/// - [`CompileError::Resource`] when a table is too small
/// - [`CompileError::JumpResolution`] when the jumps cannot be linked
/// - [`CompileError::Internal`] on input the prescan should have rejected
pub fn compile_body(body: &Normalized, capacity: Capacity) -> CompileResult<CompiledBody> {
    let mut cx = CompilerContext::new(capacity);
    for token in &body.tokens {
        cx.token(token)?;
        if token.kind.is_end() {
            break;
        }
    }
    cx.finish()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
