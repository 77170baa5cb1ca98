//! Fractint-style formula compiler and evaluator.
//!
//! [`compile`] turns the text of one formula entry into a [`Program`];
//! [`Evaluator`] runs it per pixel and per iteration in the precision the
//! caller picks.

pub mod alloc;
pub mod catalog;
pub mod compiler;
pub mod config;
pub mod error;
pub mod jumps;
pub mod library;
pub mod normalize;
pub mod prescan;
pub mod program;
pub mod report;
pub mod runtime;
pub mod scanner;
pub mod symbols;
pub mod token;

pub use fractform_numeric::ops::Function;
pub use fractform_numeric::types::Complex;

pub use config::{CompileOptions, FormulaParams, PixelInput, Precision};
pub use error::{CompileError, CompileResult, Diagnostic, ParseErrorCode, Severity};
pub use library::{FormulaLibrary, FormulaSource, NullSource};
pub use normalize::Symmetry;
pub use program::{disassemble, Program, Usage};
pub use runtime::Evaluator;

use normalize::{check_header, prepare};
use symbols::SymbolKind;

/// What a compiled formula declares and refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaInfo {
    /// Entry name; empty for a bare body.
    pub name: String,
    pub symmetry: Symmetry,
    pub usage: Usage,
    /// Distinct names the formula introduced.
    pub user_variables: usize,
    pub real_constants: usize,
    pub complex_constants: usize,
    /// Sizes of the instruction and index tables.
    pub instructions: usize,
    pub loads: usize,
    pub stores: usize,
    pub jumps: usize,
}

impl FormulaInfo {
    fn describe(name: String, symmetry: Symmetry, program: &Program) -> Self {
        Self {
            name,
            symmetry,
            usage: program.usage,
            user_variables: program.symbols.count(SymbolKind::User),
            real_constants: program.symbols.count(SymbolKind::RealConstant),
            complex_constants: program.symbols.count(SymbolKind::ComplexConstant),
            instructions: program.instructions.len(),
            loads: program.loads.len(),
            stores: program.stores.len(),
            jumps: program.jumps.len(),
        }
    }
}

/// A successfully compiled formula.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub program: Program,
    pub info: FormulaInfo,
    /// Non-fatal diagnostics, such as an unknown symmetry.
    pub warnings: Vec<Diagnostic>,
}

/// Compile one formula.
///
/// `source` is either a full library entry (`name(SYM) { body }`) or a
/// bare body without header and braces.
///
/// # Errors
///
/// - [`CompileError::Header`] for a malformed header line
/// - [`CompileError::Rejected`] with up to three diagnostics for errors in
///   the body
/// - [`CompileError::Empty`] for a body with no statements
/// - [`CompileError::Resource`] when the formula is too large
/// - [`CompileError::Internal`] when the sizing passes disagree
pub fn compile(source: &str, options: &CompileOptions) -> CompileResult<Compiled> {
    if !source.contains('{') {
        let body = format!("{source}\n}}");
        return compile_body(&body, 0, String::new(), Symmetry::NoSym, Vec::new());
    }

    let header = check_header(source, options.report_bad_symmetry)?;
    let warnings = header.warning.into_iter().collect();
    compile_body(source, header.body_start, header.name, header.symmetry, warnings)
}

fn compile_body(
    source: &str,
    body_start: usize,
    name: String,
    symmetry: Symmetry,
    warnings: Vec<Diagnostic>,
) -> CompileResult<Compiled> {
    let report = prescan::prescan(source, body_start)?;
    let body = prepare(source, body_start)?;
    let program = alloc::allocate(&body, &report)?.program;
    let info = FormulaInfo::describe(name, symmetry, &program);
    tracing::debug!(
        formula = %info.name,
        instructions = info.instructions,
        warnings = warnings.len(),
        "compiled formula"
    );
    Ok(Compiled {
        program,
        info,
        warnings,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_body() {
        let compiled = compile("z = pixel: z = z*z + pixel, |z| < 4", &CompileOptions::default())
            .unwrap();
        assert!(compiled.info.name.is_empty());
        assert_eq!(compiled.info.symmetry, Symmetry::NoSym);
        assert!(compiled.program.has_init);
        assert!(compiled.warnings.is_empty());
    }

    #[test]
    fn header_and_counts() {
        let source = "Sample(XAXIS) {\n  c = (1, 2), k = 3:\n  z = z*k + c + 3, |z| < k + 0.5\n}";
        let compiled = compile(source, &CompileOptions::default()).unwrap();
        let info = &compiled.info;
        assert_eq!(info.name, "Sample");
        assert_eq!(info.symmetry, Symmetry::XAxis);
        assert_eq!(info.user_variables, 2);
        assert_eq!(info.real_constants, 2);
        assert_eq!(info.complex_constants, 1);
        assert_eq!(info.instructions, compiled.program.instructions.len());
    }

    #[test]
    fn bad_symmetry_is_a_warning() {
        let compiled = compile("badname(NOTASYM){z=z+1}", &CompileOptions::default()).unwrap();
        assert_eq!(compiled.info.symmetry, Symmetry::NoSym);
        assert_eq!(compiled.warnings.len(), 1);
        assert_eq!(compiled.warnings[0].code, ParseErrorCode::InvalidSymmetry);
        assert_eq!(compiled.warnings[0].severity, Severity::Warning);

        let quiet = CompileOptions {
            report_bad_symmetry: false,
        };
        assert!(compile("badname(NOTASYM){z=z+1}", &quiet).unwrap().warnings.is_empty());
    }

    #[test]
    fn empty_body() {
        assert!(matches!(
            compile("empty {\n ; nothing\n}", &CompileOptions::default()),
            Err(CompileError::Empty)
        ));
    }
}
