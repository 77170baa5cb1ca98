#![allow(clippy::float_cmp)]

use super::*;
use crate::config::CompileOptions;
use crate::error::ParseErrorCode;
use crate::{compile, Compiled};

const MANDELBROT: &str = "Mandelbrot(XAXIS) {\n  z = 0:\n  z = sqr(z) + pixel, |z| <= 4\n}";

fn compiled(source: &str) -> Compiled {
    compile(source, &CompileOptions::default()).unwrap()
}

fn evaluator(source: &str, precision: Precision, params: &FormulaParams) -> Evaluator {
    Evaluator::new(&compiled(source).program, precision, params).unwrap()
}

fn float(source: &str) -> Evaluator {
    evaluator(source, Precision::Float, &FormulaParams::default())
}

fn at(re: f64, im: f64) -> PixelInput {
    PixelInput::at(complex(re, im))
}

// -- escape time --

#[test]
fn mandelbrot_origin_stays_bounded() {
    let mut ev = float(MANDELBROT);
    assert_eq!(ev.escape_time(&at(0.0, 0.0), 50), None);
    assert_eq!(ev.z(), complex(0.0, 0.0));
}

#[test]
fn mandelbrot_far_pixel_escapes_at_once() {
    let mut ev = float(MANDELBROT);
    assert_eq!(ev.escape_time(&at(2.0, 2.0), 50), Some(1));
    assert_eq!(ev.z(), complex(2.0, 2.0));
}

#[test]
fn mandelbrot_counts_iterations() {
    let mut ev = float(MANDELBROT);
    // 1, 2, 5
    assert_eq!(ev.escape_time(&at(1.0, 0.0), 50), Some(3));
    assert_eq!(ev.z(), complex(5.0, 0.0));
    // period two: 0, -1, 0, -1
    assert_eq!(ev.escape_time(&at(-1.0, 0.0), 50), None);
}

#[test]
fn initialization_runs_once_per_pixel() {
    let mut ev = float("z = pixel:\n  z = z + 1, real(z) < 4");
    assert!(ev.run_initialization(&at(0.0, 0.0)));
    assert_eq!(ev.z(), complex(0.0, 0.0));
    assert!(!ev.run_iteration());
    assert!(!ev.run_iteration());
    assert!(!ev.run_iteration());
    assert!(ev.run_iteration());
    assert_eq!(ev.z(), complex(4.0, 0.0));

    assert!(ev.run_initialization(&at(3.0, 0.0)));
    assert!(ev.run_iteration());
}

#[test]
fn body_without_init_section() {
    let mut ev = float("t {\n  z = z + pixel, real(z) < 2\n}");
    assert!(ev.run_initialization(&at(1.0, 0.0)));
    assert!(!ev.run_iteration());
    assert!(ev.run_iteration());
}

// -- compile results seen by the caller --

#[test]
fn endif_without_if_is_rejected() {
    let err = compile("bad {\n  z = pixel\n  endif\n  z\n}", &CompileOptions::default())
        .unwrap_err();
    let CompileError::Rejected(diags) = err else {
        panic!("expected rejection, got {err:?}");
    };
    assert_eq!(diags[0].code, ParseErrorCode::EndifWithNoIf);
}

#[test]
fn invalid_symmetry_still_runs() {
    let c = compiled("badname(NOTASYM){z=z+1}");
    assert_eq!(c.warnings.len(), 1);
    let mut ev = Evaluator::new(&c.program, Precision::Float, &FormulaParams::default()).unwrap();
    assert!(ev.run_initialization(&at(0.0, 0.0)));
    assert!(!ev.run_iteration());
}

#[test]
fn reports_p1_and_ismand() {
    let c = compiled("t {\n  z = pixel:\n  if (ismand)\n    z = z*z + pixel\n  else\n    z = z*z + p1\n  endif\n  |z| <= 4\n}");
    let usage = c.program.usage;
    assert!(usage.p1);
    assert!(usage.ismand);
    assert!(usage.jump);
    assert!(!usage.p2);
    assert!(!usage.rand);
}

#[test]
fn ismand_selects_the_branch() {
    let source = "t {\n  z = pixel:\n  if (ismand)\n    z = z*z + pixel\n  else\n    z = z*z + p1\n  endif\n  |z| <= 4\n}";
    let mandel = FormulaParams::default().with_ismand(true);
    let mut ev = evaluator(source, Precision::Float, &mandel);
    assert_eq!(ev.escape_time(&at(1.0, 0.0), 20), Some(2));

    let julia = FormulaParams::default()
        .with_ismand(false)
        .with_param(1, complex(-1.0, 0.0));
    let mut ev = evaluator(source, Precision::Float, &julia);
    assert_eq!(ev.escape_time(&at(0.0, 0.0), 20), None);
}

// -- flow control --

#[test]
fn if_elseif_else_picks_one_branch() {
    let source = "t {\n  if (real(pixel) < 0)\n    z = 1\n  elseif (real(pixel) < 1)\n    z = 2\n  else\n    z = 3\n  endif\n  z\n}";
    let mut ev = float(source);
    for (re, expected) in [(-1.0, 1.0), (0.5, 2.0), (5.0, 3.0)] {
        assert!(ev.run_initialization(&at(re, 0.0)));
        assert!(!ev.run_iteration());
        assert_eq!(ev.z(), complex(expected, 0.0), "pixel {re}");
    }
}

#[test]
fn jumps_restart_each_iteration() {
    let source = "t {\n  k = 0:\n  if (k < 2)\n    k = k + 1\n  else\n    k = k + 10\n  endif\n  k < 20\n}";
    let mut ev = float(source);
    assert!(ev.run_initialization(&at(0.0, 0.0)));
    let mut seen = Vec::new();
    while !ev.run_iteration() {
        seen.push(ev.variable("k").unwrap().re);
    }
    assert_eq!(seen, [1.0, 2.0, 12.0]);
    assert_eq!(ev.variable("K"), Some(complex(22.0, 0.0)));
}

#[test]
fn if_in_initialization() {
    let source = "t {\n  if (real(pixel) > 0)\n    z = 1\n  else\n    z = -1\n  endif\n  :\n  z = z * 2, 1\n}";
    let mut ev = float(source);
    assert!(ev.run_initialization(&at(3.0, 0.0)));
    assert_eq!(ev.z(), complex(1.0, 0.0));
    assert!(!ev.run_iteration());
    assert_eq!(ev.z(), complex(2.0, 0.0));

    assert!(ev.run_initialization(&at(-3.0, 0.0)));
    assert!(!ev.run_iteration());
    assert_eq!(ev.z(), complex(-2.0, 0.0));
}

// -- predefined variables --

#[test]
fn sqr_updates_last_sqr() {
    let mut ev = float("t {\n  z = pixel:\n  z = sqr(z), 1\n}");
    assert!(ev.run_initialization(&at(1.0, 2.0)));
    assert!(!ev.run_iteration());
    assert_eq!(ev.z(), complex(-3.0, 4.0));
    assert_eq!(ev.predefined(Predefined::LastSqr), complex(5.0, 0.0));
}

#[test]
fn screen_position_and_checkerboard() {
    let mut ev = float("t {\n  z = scrnpix + whitesq:\n  1\n}");
    assert!(ev.run_initialization(&PixelInput::new(complex(0.0, 0.0), 3, 4)));
    assert_eq!(ev.predefined(Predefined::WhiteSq), complex(1.0, 0.0));
    assert_eq!(ev.z(), complex(4.0, 4.0));
    assert!(ev.run_initialization(&PixelInput::new(complex(0.0, 0.0), 3, 5)));
    assert_eq!(ev.predefined(Predefined::WhiteSq), complex(0.0, 0.0));
}

#[test]
fn image_parameters_are_bound() {
    let params = FormulaParams::default()
        .with_maxit(500)
        .with_screen(800, 600)
        .with_param(5, complex(0.25, -0.5));
    let mut ev = evaluator("t {\n  z = maxit + p5, s = scrnmax, c = pi:\n  1\n}", Precision::Float, &params);
    assert!(ev.run_initialization(&at(0.0, 0.0)));
    assert_eq!(ev.z(), complex(500.25, -0.5));
    assert_eq!(ev.variable("s"), Some(complex(800.0, 600.0)));
    assert_eq!(ev.variable("c"), Some(complex(std::f64::consts::PI, 0.0)));
}

#[test]
fn parameter_functions_follow_the_bindings() {
    let source = "t {\n  z = fn1(pixel):\n  1\n}";
    let mut ev = float(source);
    assert!(ev.run_initialization(&at(0.0, 0.0)));
    assert_eq!(ev.z(), complex(0.0, 0.0));

    let params = FormulaParams::default().with_function(1, Function::Sqr);
    let mut ev = evaluator(source, Precision::Float, &params);
    assert!(ev.run_initialization(&at(3.0, 0.0)));
    assert_eq!(ev.z(), complex(9.0, 0.0));
}

#[test]
fn user_variables_persist_across_pixels() {
    let mut ev = float("t {\n  c = c + 1:\n  1\n}");
    assert!(ev.run_initialization(&at(0.0, 0.0)));
    assert!(ev.run_initialization(&at(0.0, 0.0)));
    assert_eq!(ev.variable("c"), Some(complex(2.0, 0.0)));
    assert_eq!(ev.variable("nothing"), None);
}

// -- random numbers --

#[test]
fn srand_is_deterministic() {
    let source = "t {\n  z = srand(p1):\n  z = rand, 1\n}";
    let params = FormulaParams::default().with_param(1, complex(0.5, 0.25));
    let mut a = evaluator(source, Precision::Float, &params);
    let mut b = evaluator(source, Precision::Float, &params);
    assert!(a.run_initialization(&at(0.0, 0.0)));
    assert!(b.run_initialization(&at(0.0, 0.0)));
    assert_eq!(a.z(), b.z());
    for _ in 0..5 {
        a.run_iteration();
        b.run_iteration();
        let z = a.z();
        assert_eq!(z, b.z());
        assert!((0.0..1.0).contains(&z.re) && (0.0..1.0).contains(&z.im));
    }
}

#[test]
fn float_and_fixed_draw_the_same_numbers() {
    let source = "t {\n  z = srand(p1):\n  z = rand, 1\n}";
    let params = FormulaParams::default().with_param(1, complex(0.5, 0.25));
    let mut f = evaluator(source, Precision::Float, &params);
    let mut x = evaluator(source, Precision::fixed(), &params);
    assert!(f.run_initialization(&at(0.0, 0.0)));
    assert!(x.run_initialization(&at(0.0, 0.0)));
    for _ in 0..3 {
        f.run_iteration();
        x.run_iteration();
        assert_eq!(f.z(), x.z());
    }
}

#[test]
fn rand_follows_the_configured_seed() {
    let source = "t {\n  z = 0:\n  z = rand, 1\n}";
    let params = FormulaParams::default().with_rand_seed(7);
    let mut a = evaluator(source, Precision::Float, &params);
    let mut b = evaluator(source, Precision::Float, &params);
    assert!(a.run_initialization(&at(0.0, 0.0)));
    assert!(b.run_initialization(&at(0.0, 0.0)));
    a.run_iteration();
    b.run_iteration();
    let first = a.z();
    assert_eq!(first, b.z());
    a.run_iteration();
    assert_ne!(a.z(), first);
}

#[test]
fn formulas_without_rand_need_no_seed() {
    let program = compiled("t {\n  z = srand(p1):\n  z = z + 1, 1\n}").program;
    assert!(!program.usage.rand);
    let params = FormulaParams::default().with_param(1, complex(0.5, 0.25));
    let mut a = Evaluator::new(&program, Precision::Float, &params).unwrap();
    let mut b = Evaluator::new(&program, Precision::Float, &params).unwrap();
    assert!(a.run_initialization(&at(0.0, 0.0)));
    assert!(b.run_initialization(&at(0.0, 0.0)));
    assert_eq!(a.z(), b.z());
}

#[test]
#[cfg(not(feature = "entropy"))]
fn unseeded_rand_falls_back_to_a_fixed_seed() {
    let source = "t {\n  z = 0:\n  z = rand, 1\n}";
    let params = FormulaParams::default();
    let mut a = evaluator(source, Precision::Float, &params);
    let mut b = evaluator(source, Precision::Float, &params);
    assert!(a.run_initialization(&at(0.0, 0.0)));
    assert!(b.run_initialization(&at(0.0, 0.0)));
    a.run_iteration();
    b.run_iteration();
    assert_eq!(a.z(), b.z());
}

// -- backends --

#[test]
fn fixed_point_agrees_with_float() {
    let mut f = float(MANDELBROT);
    let mut x = evaluator(MANDELBROT, Precision::fixed(), &FormulaParams::default());
    for (re, im) in [(0.0, 0.0), (1.0, 0.0), (2.0, 2.0), (-1.0, 0.0), (-2.0, 0.0)] {
        assert_eq!(
            f.escape_time(&at(re, im), 40),
            x.escape_time(&at(re, im), 40),
            "pixel ({re}, {im})"
        );
    }
    assert_eq!(x.backend(), "fixed");
}

#[cfg(feature = "bignum")]
#[test]
fn arbitrary_precision_agrees_with_float() {
    let mut f = float(MANDELBROT);
    let mut b = evaluator(
        MANDELBROT,
        Precision::Arbitrary { digits: 40 },
        &FormulaParams::default(),
    );
    for (re, im) in [(0.0, 0.0), (1.0, 0.0), (2.0, 2.0), (-1.0, 0.0)] {
        assert_eq!(f.escape_time(&at(re, im), 40), b.escape_time(&at(re, im), 40));
    }
    // -1 on odd iterations, 0 on even ones
    assert_eq!(b.z(), complex(0.0, 0.0));
}

#[test]
fn fixed_point_replaces_far_pixels() {
    let mut ev = evaluator("t {\n  z = pixel:\n  1\n}", Precision::fixed(), &FormulaParams::default());
    assert!(ev.run_initialization(&at(20.0, 0.0)));
    assert_eq!(ev.predefined(Predefined::Pixel), complex(8.0, 8.0));
}

#[test]
fn bad_precision_is_rejected() {
    let program = compiled(MANDELBROT).program;
    let params = FormulaParams::default();
    assert!(matches!(
        Evaluator::new(&program, Precision::Fixed { bitshift: 40 }, &params),
        Err(CompileError::Precision(_))
    ));
    assert!(matches!(
        Evaluator::new(&program, Precision::Arbitrary { digits: 2 }, &params),
        Err(CompileError::Precision(_))
    ));
}

// -- faults --

#[test]
fn division_by_zero_escapes() {
    let mut ev = float("t {\n  z = pixel:\n  z = z / 0, 1\n}");
    assert_eq!(ev.escape_time(&at(1.0, 0.0), 10), Some(1));
    // stays escaped until the next pixel
    assert!(ev.run_iteration());
}

#[test]
fn fixed_overflow_escapes() {
    let source = "t {\n  z = pixel:\n  z = z * 1000, 1\n}";
    let mut x = evaluator(source, Precision::fixed(), &FormulaParams::default());
    assert_eq!(x.escape_time(&at(1.0, 0.0), 10), Some(2));
    let mut f = float(source);
    assert_eq!(f.escape_time(&at(1.0, 0.0), 10), None);
}

#[test]
fn fault_during_initialization() {
    let mut ev = float("t {\n  z = 1 / pixel:\n  1\n}");
    assert!(!ev.run_initialization(&at(0.0, 0.0)));
    assert!(ev.run_iteration());
    assert_eq!(ev.escape_time(&at(0.0, 0.0), 10), Some(0));
    assert_eq!(ev.escape_time(&at(2.0, 0.0), 10), None);
}
