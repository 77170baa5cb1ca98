use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

const LIBRARY: &str = "\
; test formulas
comment {
  Not a formula.
}

Mandelbrot(XAXIS) {
  z = 0:
  z = sqr(z) + pixel, |z| <= 4
}

Julia {
  z = pixel:
  z = sqr(z) + p1, |z| <= 4
}

Broken {
  z = pixel
  endif
  z
}

Sloppy(NOTASYM) {
  z = z + 1
}
";

struct TestDir {
    path: PathBuf,
}

impl TestDir {
    fn new(tag: &str) -> Self {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        let path =
            std::env::temp_dir().join(format!("fractform_cli_{tag}_{}_{}", std::process::id(), ts));
        fs::create_dir_all(&path).expect("create temp test dir");
        fs::write(path.join("test.frm"), LIBRARY).expect("write test library");
        Self { path }
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn run_fractform(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fractform"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .expect("run fractform")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn list_skips_comment_blocks() {
    let dir = TestDir::new("list");
    let output = run_fractform(&["list", "test.frm"], &dir.path);

    assert!(output.status.success(), "process failed: {output:?}");
    let names: Vec<String> = stdout(&output).lines().map(str::to_owned).collect();
    assert_eq!(names, ["Mandelbrot", "Julia", "Broken", "Sloppy"]);
}

#[test]
fn library_extension_is_optional() {
    let dir = TestDir::new("list_ext");
    let output = run_fractform(&["list", "test"], &dir.path);
    assert!(output.status.success(), "process failed: {output:?}");
    assert!(stdout(&output).contains("Julia"));
}

#[test]
fn check_one_formula() {
    let dir = TestDir::new("check_one");
    let output = run_fractform(&["check", "test.frm", "julia"], &dir.path);

    assert!(output.status.success(), "process failed: {output:?}");
    let out = stdout(&output);
    assert!(out.starts_with("Julia: ok ("), "unexpected output: {out}");
    assert!(out.contains("uses p1"), "expected usage flags in: {out}");
}

#[test]
fn check_all_reports_errors_with_context() {
    let dir = TestDir::new("check_all");
    let output = run_fractform(&["check", "test.frm"], &dir.path);

    assert!(!output.status.success(), "expected failure: {output:?}");
    let out = stdout(&output);
    assert!(out.contains("Mandelbrot: ok"), "got: {out}");
    assert!(out.contains("3 of 4 formulas compiled"), "got: {out}");

    let err = stderr(&output);
    assert!(
        err.contains("Error(18) at line 3:  \"endif\" has no matching \"if\""),
        "got: {err}"
    );
    assert!(err.contains("\n  endif\n  ^^^^^\n"), "got: {err}");
}

#[test]
fn invalid_symmetry_is_only_a_warning() {
    let dir = TestDir::new("check_sym");
    let output = run_fractform(&["check", "test.frm", "sloppy"], &dir.path);

    assert!(output.status.success(), "process failed: {output:?}");
    assert!(stdout(&output).contains("Sloppy: ok"));
    assert!(stderr(&output).contains("Error(10)"));
}

#[test]
fn disasm_lists_instructions() {
    let dir = TestDir::new("disasm");
    let output = run_fractform(&["disasm", "test.frm", "Mandelbrot"], &dir.path);

    assert!(output.status.success(), "process failed: {output:?}");
    let out = stdout(&output);
    assert!(out.contains("end-init"), "got: {out}");
    assert!(out.contains("sqr"), "got: {out}");
    assert!(out.contains("load"), "got: {out}");
}

#[test]
fn orbit_reports_escape_iteration() {
    let dir = TestDir::new("orbit_escape");
    let output = run_fractform(
        &["orbit", "test.frm", "Mandelbrot", "--pixel", "1,0"],
        &dir.path,
    );

    assert!(output.status.success(), "process failed: {output:?}");
    let out = stdout(&output);
    assert!(out.contains("escaped at iteration 3"), "got: {out}");
}

#[test]
fn orbit_in_fixed_point_with_parameters() {
    let dir = TestDir::new("orbit_fixed");
    let output = run_fractform(
        &[
            "orbit",
            "test.frm",
            "Julia",
            "--precision",
            "fixed:20",
            "--maxit",
            "10",
            "--param=-1,0",
            "--julia",
        ],
        &dir.path,
    );

    assert!(output.status.success(), "process failed: {output:?}");
    let out = stdout(&output);
    assert!(out.contains("bounded after 10 iterations"), "got: {out}");
}

#[test]
fn unknown_formula_fails() {
    let dir = TestDir::new("missing_formula");
    let output = run_fractform(&["disasm", "test.frm", "nope"], &dir.path);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("formula not found: nope"));
}

#[test]
fn missing_library_fails() {
    let dir = TestDir::new("missing_file");
    let output = run_fractform(&["list", "absent.frm"], &dir.path);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Error reading absent.frm"));
}

#[test]
fn bad_precision_is_a_usage_error() {
    let dir = TestDir::new("bad_precision");
    let output = run_fractform(
        &["orbit", "test.frm", "Mandelbrot", "--precision", "quad"],
        &dir.path,
    );
    assert!(!output.status.success());
}
