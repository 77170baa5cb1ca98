use fractform_core::error::{CompileError, Diagnostic, Severity};
use fractform_core::report::{render_diagnostic, render_error};
use fractform_core::{
    compile, disassemble, CompileOptions, Compiled, Evaluator, FormulaParams, PixelInput,
    Precision,
};
use num_complex::Complex64;
use wasm_bindgen::prelude::*;

/// Seed for `rand`; renders are reproducible and need no entropy source.
const RAND_SEED: u64 = 0x5eed;

#[wasm_bindgen]
pub struct CompileOutput {
    listing: String,
    diagnostics: String,
    report: String,
    has_error: bool,
}

#[wasm_bindgen]
impl CompileOutput {
    #[wasm_bindgen(getter)]
    pub fn listing(&self) -> String {
        self.listing.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn diagnostics(&self) -> String {
        self.diagnostics.clone()
    }

    /// Diagnostics rendered with the offending statement and a caret line.
    #[wasm_bindgen(getter)]
    pub fn report(&self) -> String {
        self.report.clone()
    }

    #[wasm_bindgen(getter, js_name = hasError)]
    pub fn has_error(&self) -> bool {
        self.has_error
    }
}

/// Compile a formula and return its listing and diagnostics.
#[wasm_bindgen(js_name = compileFormula)]
pub fn compile_formula(source: &str) -> CompileOutput {
    compile_source(source)
}

/// Escape iterations for a `width` x `height` grid of pixels spanning
/// `[x_min, x_max] x [y_min, y_max]`, row by row from the top.
///
/// A bounded pixel reports `0`. An empty array means the formula did not
/// compile.
#[wasm_bindgen(js_name = escapeTimes)]
#[expect(
    clippy::too_many_arguments,
    reason = "flat arguments keep the JavaScript side simple"
)]
pub fn escape_times(
    source: &str,
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    width: u32,
    height: u32,
    max_iterations: u32,
) -> Vec<u32> {
    let Ok(compiled) = compile(source, &CompileOptions::default()) else {
        return Vec::new();
    };
    let params = FormulaParams::default()
        .with_maxit(max_iterations)
        .with_screen(width, height)
        .with_rand_seed(RAND_SEED);
    let Ok(mut evaluator) = Evaluator::new(&compiled.program, Precision::Float, &params) else {
        return Vec::new();
    };
    escape_grid(
        &mut evaluator,
        (x_min, x_max),
        (y_min, y_max),
        (width, height),
        max_iterations,
    )
}

fn compile_source(source: &str) -> CompileOutput {
    match compile(source, &CompileOptions::default()) {
        Ok(compiled) => success_output(source, &compiled),
        Err(err) => failure_output(source, &err),
    }
}

fn success_output(source: &str, compiled: &Compiled) -> CompileOutput {
    CompileOutput {
        listing: disassemble(&compiled.program),
        diagnostics: collect_diagnostics(&compiled.warnings, None),
        report: compiled
            .warnings
            .iter()
            .map(|w| render_diagnostic(source, w))
            .collect(),
        has_error: has_errors(&compiled.warnings),
    }
}

fn failure_output(source: &str, err: &CompileError) -> CompileOutput {
    let diags = err.diagnostics();
    let failure = diags.is_empty().then_some(err);
    CompileOutput {
        listing: String::new(),
        diagnostics: collect_diagnostics(diags, failure),
        report: render_error(source, err),
        has_error: true,
    }
}

fn collect_diagnostics(diags: &[Diagnostic], failure: Option<&CompileError>) -> String {
    let mut lines: Vec<String> = diags.iter().map(format_diagnostic).collect();

    if let Some(err) = failure {
        lines.push(format!("fatal {err}"));
    }

    lines.join("\n")
}

fn has_errors(diags: &[Diagnostic]) -> bool {
    diags
        .iter()
        .any(|d| matches!(d.severity, Severity::Error | Severity::Fatal))
}

fn format_diagnostic(diag: &Diagnostic) -> String {
    format!(
        "{} [{}..{}] Error({}): {}",
        diag.severity,
        diag.start,
        diag.offset,
        diag.code.number(),
        diag.message()
    )
}

fn escape_grid(
    evaluator: &mut Evaluator,
    (x_min, x_max): (f64, f64),
    (y_min, y_max): (f64, f64),
    (width, height): (u32, u32),
    max_iterations: u32,
) -> Vec<u32> {
    let step = |lo: f64, hi: f64, n: u32| {
        if n > 1 {
            (hi - lo) / f64::from(n - 1)
        } else {
            0.0
        }
    };
    let dx = step(x_min, x_max, width);
    let dy = step(y_min, y_max, height);

    let capacity = usize::try_from(width)
        .ok()
        .zip(usize::try_from(height).ok())
        .and_then(|(w, h)| w.checked_mul(h))
        .unwrap_or(0);
    let mut out = Vec::with_capacity(capacity);
    for row in 0..height {
        let y = y_max - dy * f64::from(row);
        for col in 0..width {
            let x = x_min + dx * f64::from(col);
            let input = PixelInput::new(Complex64::new(x, y), col, row);
            out.push(evaluator.escape_time(&input, max_iterations).unwrap_or(0));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_and_lists_instructions() {
        let output = compile_source("Mandelbrot(XAXIS) {\n  z = 0:\n  z = sqr(z) + pixel, |z| <= 4\n}");

        assert!(
            !output.has_error,
            "unexpected diagnostics: {}",
            output.diagnostics
        );
        assert!(output.listing.contains("end-init"), "missing listing");
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn reports_errors_for_invalid_source() {
        let output = compile_source("bad {\n  z = z + * 2\n}");

        assert!(output.has_error, "expected compile error");
        assert!(
            output.diagnostics.starts_with("error ["),
            "got: {}",
            output.diagnostics
        );
        assert!(output.report.contains("Error(0) at line 2"), "got: {}", output.report);
        assert!(output.listing.is_empty());
    }

    #[test]
    fn warnings_do_not_fail() {
        let output = compile_source("badname(NOTASYM){z=z+1}");
        assert!(!output.has_error);
        assert!(output.diagnostics.starts_with("warning"), "got: {}", output.diagnostics);
    }

    #[test]
    fn errors_without_location_are_fatal_lines() {
        let output = compile_source("empty {\n}");
        assert!(output.has_error);
        assert_eq!(
            output.diagnostics,
            "fatal Formula has no executable instructions"
        );
    }

    #[test]
    fn grid_of_escape_times() {
        let times = escape_times(
            "z = 0: z = sqr(z) + pixel, |z| <= 4",
            -2.0,
            2.0,
            -2.0,
            2.0,
            3,
            3,
            20,
        );
        // corners escape at once; -2 and 0 are in the set
        assert_eq!(times, [1, 2, 1, 0, 0, 2, 1, 2, 1]);
        assert!(escape_times("z = (", 0.0, 1.0, 0.0, 1.0, 2, 2, 10).is_empty());
    }

    #[test]
    fn rand_formulas_render_reproducibly() {
        let source = "z = pixel: z = sqr(z) + rand * pixel, |z| <= 4";
        let first = escape_times(source, -2.0, 2.0, -2.0, 2.0, 8, 8, 30);
        let second = escape_times(source, -2.0, 2.0, -2.0, 2.0, 8, 8, 30);
        assert_eq!(first.len(), 64);
        assert_eq!(first, second);
    }
}
