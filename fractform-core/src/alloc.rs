//! Table sizing.
//!
//! A body is compiled twice. The first pass runs against generous probe
//! limits and records what it actually used; the second pass runs against
//! exactly that (plus a little slack) and must use the same amounts. Any
//! difference means the compiler is not deterministic, which is reported
//! as an internal error.

use crate::compiler::{compile_body, CompiledBody};
use crate::error::{CompileError, CompileResult, ParseErrorCode};
use crate::normalize::Normalized;
use crate::prescan::PrescanReport;

/// Entries added to each measured size for the second pass.
const SLACK: usize = 4;

/// Sizes of the compiler's tables: limits going in, usage coming out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    /// Pending ops, barriers included.
    pub ops: usize,
    /// Symbol slots, predefined variables included.
    pub symbols: usize,
    pub loads: usize,
    pub stores: usize,
    pub jumps: usize,
}

impl Capacity {
    /// Limits for the first pass.
    pub const PROBE: Self = Self {
        ops: 2300,
        symbols: 920,
        loads: 1840,
        stores: 1150,
        jumps: 200,
    };

    /// Measured usage plus slack.
    #[must_use]
    pub const fn with_slack(self) -> Self {
        Self {
            ops: self.ops + SLACK,
            symbols: self.symbols + SLACK,
            loads: self.loads + SLACK,
            stores: self.stores + SLACK,
            jumps: self.jumps + SLACK,
        }
    }

    /// The first table whose prescan estimate exceeds this capacity.
    fn exceeded_by(&self, report: &PrescanReport) -> Option<(&'static str, usize, usize)> {
        let counts = report.counts;
        [
            ("op", counts.ops, self.ops),
            ("load", counts.loads, self.loads),
            ("store", counts.stores, self.stores),
            ("jump", counts.jumps, self.jumps),
        ]
        .into_iter()
        .find(|(_, needed, limit)| needed > limit)
    }
}

/// Compile a body in two passes, sizing the tables from the first.
///
/// # Errors
///
/// - [`CompileError::Resource`] (`FormulaTooLarge`) when the prescan
///   estimates exceed the probe limits
/// - [`CompileError::Internal`] when the passes disagree
/// - any error from [`compile_body`]
pub fn allocate(body: &Normalized, report: &PrescanReport) -> CompileResult<CompiledBody> {
    if let Some((table, needed, limit)) = Capacity::PROBE.exceeded_by(report) {
        return Err(CompileError::Resource {
            code: ParseErrorCode::FormulaTooLarge,
            detail: format!("needs {needed} {table} entries, at most {limit} allowed"),
        });
    }

    let probe = compile_body(body, Capacity::PROBE)?;
    tracing::debug!(pass = 1, measured = ?probe.measured, "sized formula tables");

    let capacity = probe.measured.with_slack();
    let sized = compile_body(body, capacity)?;
    tracing::debug!(pass = 2, ?capacity, measured = ?sized.measured, "compiled formula");

    if sized.measured != probe.measured {
        return Err(CompileError::Internal(format!(
            "second pass used {:?}, first pass {:?}",
            sized.measured, probe.measured
        )));
    }
    Ok(sized)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
