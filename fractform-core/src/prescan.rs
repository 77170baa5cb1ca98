//! Validation and sizing pass.
//!
//! The prescan walks the body once, straight from the source text, before
//! anything is compiled. It checks the statement grammar and counts what
//! the compiler will need:
//!
//! | Count  | Contributed by                                               |
//! |--------|--------------------------------------------------------------|
//! | ops    | every operand, operator, function and jump; separators add a  |
//! |        | clear step; `elseif` adds three; the end adds three spare     |
//! | loads  | every operand, minus one per `=`                              |
//! | stores | one per `=`                                                   |
//! | jumps  | one per keyword, two per `elseif`                             |
//!
//! At most [`MAX_ERRORS`] errors are collected, one per statement.

use crate::catalog::{JumpKeyword, Operator};
use crate::error::{CompileError, CompileResult, Diagnostic, ParseErrorCode};
use crate::scanner::{LexError, LexErrorKind, Lexer};
use crate::token::{Token, TokenKind};

/// Errors collected before the prescan gives up.
pub const MAX_ERRORS: usize = 3;

/// Deepest parenthesis nesting.
pub const MAX_PARENS: u32 = 64;

/// Jump-table entries a formula may need (`elseif` counts twice).
pub const MAX_JUMPS: usize = 200;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Sizes of the tables a program needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpCounts {
    pub ops: usize,
    pub loads: usize,
    pub stores: usize,
    pub jumps: usize,
}

/// What a successful prescan learned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrescanReport {
    /// Upper bounds for the compiler's tables.
    pub counts: OpCounts,
    /// Whether any flow-control keyword appears.
    pub uses_jump: bool,
}

// ---------------------------------------------------------------------------
// Scanner state
// ---------------------------------------------------------------------------

struct Prescan {
    counts: OpCounts,
    uses_jump: bool,
    errors: Vec<Diagnostic>,
    statement_start: usize,
    expecting_arg: bool,
    new_statement: bool,
    assignment_ok: bool,
    got_colon: bool,
    /// One bit per open `if`: set once its `else` is seen.
    else_used: u64,
    /// One bit per paren level: set while a `|` is open at that level.
    waiting_for_mod: u64,
    waiting_for_endif: i32,
    parens: u32,
}

impl Prescan {
    fn new(body_start: usize) -> Self {
        Self {
            counts: OpCounts::default(),
            uses_jump: false,
            errors: Vec::new(),
            statement_start: body_start,
            expecting_arg: true,
            new_statement: true,
            assignment_ok: true,
            got_colon: false,
            else_used: 0,
            waiting_for_mod: 0,
            waiting_for_endif: 0,
            parens: 0,
        }
    }

    /// Record an error, keeping only the first one of each statement.
    fn error(&mut self, code: ParseErrorCode, offset: usize) {
        let same_statement = self
            .errors
            .last()
            .is_some_and(|e| e.start == self.statement_start);
        if !same_statement && self.errors.len() < MAX_ERRORS {
            self.errors
                .push(Diagnostic::new(code, self.statement_start, offset));
        }
    }

    fn done(&self) -> bool {
        self.errors.len() >= MAX_ERRORS
    }

    // -- token classes --

    fn lex_error(&mut self, err: &LexError) {
        self.assignment_ok = false;
        self.error(err.kind.code(), err.span.start);
    }

    fn operand(&mut self, token: &Token) {
        if matches!(
            token.kind,
            TokenKind::RealConstant(_) | TokenKind::ComplexConstant(_)
        ) {
            self.assignment_ok = false;
        }
        self.counts.ops += 1;
        self.counts.loads += 1;
        self.new_statement = false;
        if !self.expecting_arg {
            self.error(ParseErrorCode::ShouldBeOperator, token.span.start);
        }
        self.expecting_arg = false;
    }

    fn function(&mut self, at: usize) {
        self.assignment_ok = false;
        self.new_statement = false;
        self.counts.ops += 1;
        if !self.expecting_arg {
            self.error(ParseErrorCode::ShouldBeOperator, at);
        }
    }

    fn open_paren(&mut self, at: usize) {
        self.assignment_ok = false;
        self.new_statement = false;
        self.parens += 1;
        if self.parens > MAX_PARENS {
            self.error(ParseErrorCode::NestingTooDeep, at);
        } else if !self.expecting_arg {
            self.error(ParseErrorCode::ShouldBeOperator, at);
        }
        self.waiting_for_mod <<= 1;
    }

    fn close_paren(&mut self, at: usize) {
        self.assignment_ok = false;
        self.new_statement = false;
        if self.parens > 0 {
            self.parens -= 1;
        } else {
            self.error(ParseErrorCode::NeedAMatchingOpenParens, at);
        }
        if self.waiting_for_mod & 1 == 1 {
            self.error(ParseErrorCode::UnmatchedModulus, at);
        } else {
            self.waiting_for_mod >>= 1;
        }
        if self.expecting_arg {
            self.error(ParseErrorCode::ShouldBeArgument, at);
        }
    }

    fn flow_control(&mut self, keyword: JumpKeyword, at: usize) {
        self.assignment_ok = false;
        self.counts.ops += 1;
        self.counts.jumps += 1;
        if !self.new_statement {
            self.error(ParseErrorCode::JumpNotFirst, at);
            return;
        }
        self.uses_jump = true;
        match keyword {
            JumpKeyword::If => {
                self.else_used <<= 1;
                self.waiting_for_endif += 1;
            }
            JumpKeyword::ElseIf | JumpKeyword::Else => {
                if keyword == JumpKeyword::ElseIf {
                    // an unconditional jump, two clears and a second entry
                    self.counts.ops += 3;
                    self.counts.jumps += 1;
                }
                if self.else_used & 1 == 1 {
                    self.error(ParseErrorCode::EndifRequiredAfterElse, at);
                } else if self.waiting_for_endif == 0 {
                    self.error(ParseErrorCode::MisplacedElseOrElseif, at);
                }
                if keyword == JumpKeyword::Else {
                    self.else_used |= 1;
                }
            }
            JumpKeyword::EndIf => {
                self.else_used >>= 1;
                self.waiting_for_endif -= 1;
                if self.waiting_for_endif < 0 {
                    self.error(ParseErrorCode::EndifWithNoIf, at);
                    self.waiting_for_endif = 0;
                }
            }
        }
    }

    fn separator(&mut self, op: Operator, at: usize, next_statement: usize) {
        let colon = op == Operator::Colon;
        // the separator and the placeholder the compiler emits with it
        self.counts.ops += 2;
        if self.parens > 0 {
            self.error(ParseErrorCode::NeedMoreCloseParens, at);
            self.parens = 0;
        }
        if self.waiting_for_mod != 0 {
            self.error(ParseErrorCode::UnmatchedModulus, at);
            self.waiting_for_mod = 0;
        }
        if !self.expecting_arg {
            self.counts.ops += if colon { 2 } else { 1 };
        } else if !self.new_statement {
            self.error(ParseErrorCode::ShouldBeArgument, at);
        }
        if colon {
            if self.waiting_for_endif != 0 {
                self.error(ParseErrorCode::UnmatchedIfInInitSection, at);
                self.waiting_for_endif = 0;
            }
            if self.got_colon {
                self.error(ParseErrorCode::SecondColon, at);
            }
            self.got_colon = true;
        }
        self.new_statement = true;
        self.expecting_arg = true;
        self.assignment_ok = true;
        self.statement_start = next_statement;
    }

    fn assignment(&mut self, at: usize) {
        // converts the preceding load into a store
        self.counts.ops = self.counts.ops.saturating_sub(1);
        self.counts.loads = self.counts.loads.saturating_sub(1);
        self.counts.stores += 1;
        if !self.assignment_ok || self.expecting_arg {
            self.error(ParseErrorCode::IllegalAssignment, at);
        }
        self.expecting_arg = true;
    }

    fn modulus(&mut self, at: usize) {
        self.assignment_ok = false;
        let open = self.waiting_for_mod & 1 == 1;
        if !open {
            // `|..|` compiles to one operation, counted on the closing bar
            self.counts.ops = self.counts.ops.saturating_sub(1);
            if !self.expecting_arg {
                self.error(ParseErrorCode::ShouldBeOperator, at);
            }
        } else if self.expecting_arg {
            self.error(ParseErrorCode::ShouldBeArgument, at);
        }
        self.waiting_for_mod ^= 1;
    }

    fn binary(&mut self, at: usize) {
        self.assignment_ok = false;
        if self.expecting_arg {
            self.error(ParseErrorCode::ShouldBeArgument, at);
        }
        self.expecting_arg = true;
    }

    fn end_of_formula(&mut self, at: usize) {
        self.counts.ops += 3;
        if self.parens > 0 {
            self.error(ParseErrorCode::NeedMoreCloseParens, at);
            self.parens = 0;
        }
        if self.waiting_for_mod != 0 {
            self.error(ParseErrorCode::UnmatchedModulus, at);
            self.waiting_for_mod = 0;
        }
        if self.waiting_for_endif != 0 {
            self.error(ParseErrorCode::IfWithNoEndif, at);
            self.waiting_for_endif = 0;
        }
        if self.expecting_arg && !self.new_statement {
            self.error(ParseErrorCode::ShouldBeArgument, at);
        }
        if self.counts.jumps >= MAX_JUMPS {
            self.error(ParseErrorCode::TooManyJumps, at);
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Validate a formula body starting at `body_start` and count its needs.
///
/// # Errors
///
/// Returns [`CompileError::Rejected`] with up to [`MAX_ERRORS`] diagnostics,
/// or with a single `UnexpectedEof` when the body has no closing `}`.
pub fn prescan(source: &str, body_start: usize) -> CompileResult<PrescanReport> {
    let mut lexer = Lexer::new(source, body_start);
    let mut state = Prescan::new(body_start);

    loop {
        let token = match lexer.next_token() {
            Ok(token) => token,
            Err(err) if err.kind == LexErrorKind::EndOfFile => {
                return Err(CompileError::Rejected(vec![Diagnostic::new(
                    ParseErrorCode::UnexpectedEof,
                    state.statement_start,
                    err.span.start,
                )]));
            }
            Err(err) => {
                state.lex_error(&err);
                if state.done() {
                    break;
                }
                continue;
            }
        };

        let at = token.span.start;
        match token.kind {
            TokenKind::OpenParen => state.open_paren(at),
            TokenKind::CloseParen => state.close_paren(at),
            TokenKind::ParamVariable(_)
            | TokenKind::PredefinedVariable(_)
            | TokenKind::UserVariable
            | TokenKind::RealConstant(_)
            | TokenKind::ComplexConstant(_) => state.operand(&token),
            TokenKind::Function(_) | TokenKind::ParamFunction(_) => state.function(at),
            TokenKind::FlowControl(keyword) => state.flow_control(keyword, at),
            TokenKind::Operator(op @ (Operator::Comma | Operator::Colon)) => {
                state.separator(op, at, lexer.position());
            }
            TokenKind::Operator(op) => {
                state.counts.ops += 1;
                match op {
                    Operator::Assign => state.assignment(at),
                    Operator::Modulus => state.modulus(at),
                    Operator::Minus => {
                        state.assignment_ok = false;
                        state.expecting_arg = true;
                    }
                    Operator::Caret => {
                        state.binary(at);
                        let mark = lexer.position();
                        match lexer.next_token() {
                            Ok(next) if next.text.starts_with('-') => {
                                state.error(ParseErrorCode::NoNegAfterExponent, next.span.start);
                            }
                            _ => lexer = Lexer::new(source, mark),
                        }
                    }
                    _ => state.binary(at),
                }
            }
            TokenKind::EndOfFormula => {
                state.end_of_formula(at);
                break;
            }
        }
        if state.done() {
            break;
        }
    }

    if state.errors.is_empty() {
        tracing::debug!(
            ops = state.counts.ops,
            loads = state.counts.loads,
            stores = state.counts.stores,
            jumps = state.counts.jumps,
            "prescan passed"
        );
        Ok(PrescanReport {
            counts: state.counts,
            uses_jump: state.uses_jump,
        })
    } else {
        Err(CompileError::Rejected(state.errors))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn errors(body: &str) -> Vec<(ParseErrorCode, usize)> {
        match prescan(body, 0) {
            Err(CompileError::Rejected(diags)) => {
                diags.into_iter().map(|d| (d.code, d.offset)).collect()
            }
            Ok(_) => Vec::new(),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    fn codes(body: &str) -> Vec<ParseErrorCode> {
        errors(body).into_iter().map(|(code, _)| code).collect()
    }

    #[test]
    fn accepts_the_classic_mandelbrot() {
        let report = prescan("z = pixel:\n  z = sqr(z) + pixel,\n  |z| <= 4\n}", 0).unwrap();
        assert!(!report.uses_jump);
        // loads: pixel, z, pixel, z, 4; stores: z, z
        assert_eq!(report.counts.loads, 5);
        assert_eq!(report.counts.stores, 2);
        assert_eq!(report.counts.jumps, 0);
    }

    #[test]
    fn counts_jumps() {
        let body = "if (a < 1)\n b = 1\nelseif (a < 2)\n b = 2\nelse\n b = 3\nendif\n z}";
        let report = prescan(body, 0).unwrap();
        assert!(report.uses_jump);
        assert_eq!(report.counts.jumps, 5);
    }

    #[test]
    fn endif_without_if_points_at_endif() {
        let body = "z = 1\nendif\nz}";
        assert_eq!(errors(body), [(ParseErrorCode::EndifWithNoIf, 6)]);
    }

    #[test]
    fn operand_and_operator_order() {
        assert_eq!(codes("z z}"), [ParseErrorCode::ShouldBeOperator]);
        assert_eq!(codes("z + * 1}"), [ParseErrorCode::ShouldBeArgument]);
        assert_eq!(codes("z +}"), [ParseErrorCode::ShouldBeArgument]);
        assert_eq!(codes("z - - 1}"), []);
    }

    #[test]
    fn parentheses() {
        assert_eq!(codes("(z}"), [ParseErrorCode::NeedMoreCloseParens]);
        assert_eq!(codes("z)}"), [ParseErrorCode::NeedAMatchingOpenParens]);
        assert_eq!(codes("1(z)}"), [ParseErrorCode::ShouldBeOperator]);
        assert_eq!(codes("()}"), [ParseErrorCode::ShouldBeArgument]);
        let deep = format!("{}z{}}}", "(".repeat(65), ")".repeat(65));
        assert_eq!(codes(&deep), [ParseErrorCode::NestingTooDeep]);
    }

    #[test]
    fn modulus_pairs() {
        assert_eq!(codes("|z|+|pixel|}"), []);
        assert_eq!(codes("|z}"), [ParseErrorCode::UnmatchedModulus]);
        assert_eq!(codes("(|z)|}"), [ParseErrorCode::UnmatchedModulus]);
        assert_eq!(codes("z|z|}"), [ParseErrorCode::ShouldBeOperator]);
    }

    #[test]
    fn assignment_rules() {
        assert_eq!(codes("z = w = 1}"), []);
        assert_eq!(codes("1 = z}"), [ParseErrorCode::IllegalAssignment]);
        assert_eq!(codes("z + w = 1}"), [ParseErrorCode::IllegalAssignment]);
        assert_eq!(codes("= 1}"), [ParseErrorCode::IllegalAssignment]);
        assert_eq!(codes("sin(z) = 1}"), [ParseErrorCode::IllegalAssignment]);
    }

    #[test]
    fn negative_exponent_needs_parens() {
        assert_eq!(codes("z ^ -2}"), [ParseErrorCode::NoNegAfterExponent]);
        assert_eq!(codes("z ^ (-2)}"), []);
        assert_eq!(codes("z ^ (-1, 2)}"), []);
    }

    #[test]
    fn flow_control_rules() {
        assert_eq!(codes("else\nz}"), [ParseErrorCode::MisplacedElseOrElseif]);
        assert_eq!(
            codes("if (z)\nelse\nelse\nendif\nz}"),
            [ParseErrorCode::EndifRequiredAfterElse]
        );
        assert_eq!(codes("if (z)\nz = 1\nz}"), [ParseErrorCode::IfWithNoEndif]);
        assert_eq!(
            codes("if (z)\nz = 1:\nendif\nz}"),
            [
                ParseErrorCode::UnmatchedIfInInitSection,
                ParseErrorCode::EndifWithNoIf
            ]
        );
    }

    #[test]
    fn jump_must_start_statement() {
        assert_eq!(
            codes("z + if(1)\nendif\nz}"),
            [ParseErrorCode::JumpNotFirst, ParseErrorCode::EndifWithNoIf]
        );
    }

    #[test]
    fn second_colon() {
        assert_eq!(codes("z = 1 : z = 2 : z}"), [ParseErrorCode::SecondColon]);
    }

    #[test]
    fn lexical_errors_are_reported() {
        assert_eq!(codes("z = 1 # 2}"), [ParseErrorCode::IllegalChar]);
        assert_eq!(codes("z = sin}"), [ParseErrorCode::FuncUsedAsVar]);
        assert_eq!(codes("z = nosuch(1)}"), [ParseErrorCode::UndefinedFunction]);
    }

    #[test]
    fn one_error_per_statement_and_at_most_three() {
        assert_eq!(codes("z z z}"), [ParseErrorCode::ShouldBeOperator]);
        let body = "z z\n a a\n b b\n c c\n d d}";
        assert_eq!(errors(body).len(), MAX_ERRORS);
    }

    #[test]
    fn statement_start_is_recorded() {
        let Err(CompileError::Rejected(diags)) = prescan("z = 1\n w w}", 0) else {
            panic!("expected rejection");
        };
        assert_eq!(diags[0].start, 6);
        assert_eq!(diags[0].offset, 9);
    }

    #[test]
    fn missing_brace_is_unexpected_eof() {
        assert_eq!(codes("z = 1"), [ParseErrorCode::UnexpectedEof]);
    }

    #[test]
    fn empty_body_passes() {
        assert!(prescan("\n}", 0).is_ok());
    }

    #[test]
    fn too_many_jumps() {
        let body = format!("{}z}}", "if (z)\nendif\n".repeat(100));
        assert_eq!(codes(&body), [ParseErrorCode::TooManyJumps]);
    }
}
