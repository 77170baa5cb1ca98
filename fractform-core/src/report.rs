//! Human-readable rendering of diagnostics.
//!
//! Each diagnostic renders as a three-line block:
//!
//! ```text
//! Error(18) at line 4:  "endif" has no matching "if"
//!   endif
//!   ^^^^^
//! ```
//!
//! The middle line is the offending statement re-read from the source in
//! its dense form (no whitespace or comments), clipped to 74 columns so
//! that the error token stays visible. The caret line marks that token.

use std::fmt::Write as _;

use crate::error::{CompileError, Diagnostic, ParseErrorCode, Severity};
use crate::scanner::{LexErrorKind, Lexer};
use crate::token::TokenKind;

/// Widest statement or caret line.
const MAX_COLUMNS: usize = 74;

/// Width of the marker under an over-long name.
const TOO_LONG_MARKER: usize = 33;

/// Tokens read before giving up on finding the end of a statement.
const MAX_STATEMENT_TOKENS: usize = 4096;

/// One token of the statement being shown.
struct Piece {
    text: String,
    ends_statement: bool,
}

impl Piece {
    /// Columns the token takes up when shown.
    fn width(&self) -> usize {
        self.text.chars().count()
    }
}

/// Render one diagnostic against the formula text it was produced from.
#[must_use]
pub fn render_diagnostic(source: &str, diag: &Diagnostic) -> String {
    let offset = diag.offset.min(source.len());
    let line = 1 + source.as_bytes()[..offset]
        .iter()
        .filter(|&&b| b == b'\n')
        .count();
    let mut out = format!(
        "Error({}) at line {line}:  {}\n  ",
        diag.code.number(),
        diag.message()
    );
    if diag.severity == Severity::Fatal || diag.code == ParseErrorCode::InvalidSymmetry {
        render_header(&mut out, source, diag);
    } else {
        render_statement(&mut out, source, diag);
    }
    out
}

/// Render every diagnostic an error carries, or its message when it
/// carries none.
#[must_use]
pub fn render_error(source: &str, err: &CompileError) -> String {
    let diags = err.diagnostics();
    if diags.is_empty() {
        return format!("{err}\n");
    }
    diags
        .iter()
        .map(|d| render_diagnostic(source, d))
        .collect()
}

fn render_statement(out: &mut String, source: &str, diag: &Diagnostic) {
    let (pieces, error_index) = statement_pieces(source, diag);
    let mut chars_to_error: usize = pieces[..error_index].iter().map(Piece::width).sum();
    let mut chars_in_error = pieces.get(error_index).map_or(0, Piece::width);

    // the separator that ends the statement is not shown
    let mut count = pieces.len();
    if count > 1
        && diag.code != ParseErrorCode::SecondColon
        && pieces.last().is_some_and(|p| p.ends_statement)
    {
        count -= 1;
    }

    let mut first = 0;
    if chars_in_error < MAX_COLUMNS {
        while chars_to_error + chars_in_error > MAX_COLUMNS && first < error_index {
            chars_to_error -= pieces[first].width();
            first += 1;
            count = count.saturating_sub(1);
        }
    } else {
        first = error_index;
        chars_to_error = 0;
        count = 1;
    }

    let statement: String = pieces
        .iter()
        .skip(first)
        .take(count)
        .flat_map(|piece| piece.text.chars())
        .take(MAX_COLUMNS)
        .collect();
    out.push_str(&statement);
    out.push('\n');

    if diag.code == ParseErrorCode::TokenTooLong {
        chars_in_error = TOO_LONG_MARKER;
    }
    caret_line(out, chars_to_error + 2, chars_in_error.max(1));
}

/// Re-lex the statement holding the error. Returns the pieces and the
/// index of the error token among them.
fn statement_pieces(source: &str, diag: &Diagnostic) -> (Vec<Piece>, usize) {
    let mut lexer = Lexer::new(source, diag.start);
    let mut pieces = Vec::new();
    let mut error_index = None;
    while pieces.len() < MAX_STATEMENT_TOKENS {
        let (start, piece) = match lexer.next_token() {
            Ok(token) => (
                token.span.start,
                Piece {
                    ends_statement: token.kind.is_separator() || token.kind == TokenKind::EndOfFormula,
                    text: token.text,
                },
            ),
            Err(err) => (
                err.span.start,
                Piece {
                    ends_statement: err.kind == LexErrorKind::EndOfFile,
                    text: err.text,
                },
            ),
        };
        if error_index.is_none() && start >= diag.offset {
            error_index = Some(pieces.len());
        }
        let done = piece.ends_statement;
        pieces.push(piece);
        if done {
            break;
        }
    }
    if pieces.is_empty() {
        pieces.push(Piece {
            text: String::new(),
            ends_statement: true,
        });
    }
    let last = pieces.len() - 1;
    (pieces, error_index.unwrap_or(last))
}

/// The header line, with a caret under the offending column.
fn render_header(out: &mut String, source: &str, diag: &Diagnostic) {
    let line = source.lines().next().unwrap_or_default();
    let shown: String = line.chars().take(MAX_COLUMNS).collect();
    out.push_str(&shown);
    out.push('\n');
    let column = source
        .get(..diag.offset.min(source.len()))
        .map_or(0, |before| before.chars().count())
        .min(shown.chars().count());
    let width = match (&diag.detail, diag.code) {
        (Some(detail), ParseErrorCode::InvalidSymmetry) => detail.chars().count(),
        _ => 1,
    };
    caret_line(out, column + 2, width.max(1));
}

fn caret_line(out: &mut String, indent: usize, width: usize) {
    let start = out.len();
    let _ = write!(out, "{:indent$}", "");
    for n in 0..width {
        if n > 0 && out.len() - start > MAX_COLUMNS {
            break;
        }
        out.push('^');
    }
    out.push('\n');
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prescan::prescan;

    fn first_diag(source: &str, body_start: usize) -> Diagnostic {
        match prescan(source, body_start) {
            Err(CompileError::Rejected(diags)) => diags[0].clone(),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn endif_without_if() {
        let source = "bad {\n  z = pixel\n  endif\n  z\n}";
        let diag = first_diag(source, 5);
        let text = render_diagnostic(source, &diag);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Error(18) at line 3:  \"endif\" has no matching \"if\"");
        assert_eq!(lines[1], "  endif");
        assert_eq!(lines[2], "  ^^^^^");
    }

    #[test]
    fn caret_points_into_the_statement() {
        let source = "t {\nz = z + * 2\n}";
        let diag = first_diag(source, 3);
        assert_eq!(diag.code, ParseErrorCode::ShouldBeArgument);
        let text = render_diagnostic(source, &diag);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Error(0) at line 2:  Should be an Argument");
        assert_eq!(lines[1], "  z=z+*2");
        assert_eq!(lines[2], "      ^");
    }

    #[test]
    fn long_statements_are_clipped() {
        let long = "a1234567890+".repeat(8);
        let source = format!("t {{\nz = {long}* * 2\n}}");
        let diag = first_diag(&source, 3);
        let text = render_diagnostic(&source, &diag);
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[1].len() <= MAX_COLUMNS + 2);
        let caret = lines[2].find('^').unwrap();
        assert_eq!(&lines[1][caret..=caret], "*");
    }

    #[test]
    fn clipping_respects_multibyte_characters() {
        let source = format!("f {{\nz = {}\u{e9} + 1\n}}", "a+".repeat(40));
        let diag = first_diag(&source, 3);
        assert_eq!(diag.code, ParseErrorCode::IllegalChar);
        let text = render_diagnostic(&source, &diag);
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[1].chars().count() <= MAX_COLUMNS + 2);
        let caret = lines[2].find('^').unwrap();
        assert_eq!(lines[1].chars().nth(caret), Some('\u{e9}'));
    }

    #[test]
    fn too_long_names_get_a_wide_marker() {
        let name = "x".repeat(40);
        let source = format!("t {{\nz = {name}\n}}");
        let diag = first_diag(&source, 3);
        assert_eq!(diag.code, ParseErrorCode::TokenTooLong);
        let text = render_diagnostic(&source, &diag);
        let carets = text.lines().nth(2).unwrap().matches('^').count();
        assert_eq!(carets, TOO_LONG_MARKER);
    }

    #[test]
    fn header_warning() {
        let diag = Diagnostic::new(ParseErrorCode::InvalidSymmetry, 0, 4)
            .with_severity(Severity::Warning)
            .with_detail("NOTASYM");
        let text = render_diagnostic("bad(NOTASYM) {z}", &diag);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[1], "  bad(NOTASYM) {z}");
        assert_eq!(lines[2], "      ^^^^^^^");
    }

    #[test]
    fn errors_without_diagnostics_render_their_message() {
        assert_eq!(
            render_error("", &CompileError::Empty),
            "Formula has no executable instructions\n"
        );
    }
}
