//! `fractform` CLI: inspect, check and probe formulas in `.frm` libraries.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use num_complex::Complex64;
use tracing_subscriber::EnvFilter;

use fractform_core::library::{FormulaLibrary, FormulaSource};
use fractform_core::report::{render_diagnostic, render_error};
use fractform_core::{
    disassemble, CompileError, CompileOptions, Compiled, Evaluator, FormulaParams, Function,
    PixelInput, Precision, Usage,
};

#[derive(Parser)]
#[command(version, about = "Fractint-style formula compiler and evaluator")]
struct Cli {
    /// Log compiler passes (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the formulas in a library
    List {
        /// Formula library (.frm)
        file: PathBuf,
    },
    /// Compile formulas and report errors
    Check {
        /// Formula library (.frm)
        file: PathBuf,
        /// Formulas to check (all when omitted)
        names: Vec<String>,
    },
    /// Print the compiled instruction listing
    Disasm(Target),
    /// Iterate one pixel and print its orbit
    Orbit {
        #[command(flatten)]
        target: Target,

        /// Pixel coordinate as RE[,IM]
        #[arg(long, default_value = "0", allow_hyphen_values = true, value_parser = parse_complex)]
        pixel: Complex64,

        /// Numeric mode: float, fixed[:BITS] or arbitrary:DIGITS
        #[arg(long, default_value = "float")]
        precision: Precision,

        /// Maximum number of iterations
        #[arg(long, default_value_t = 150)]
        maxit: u32,

        /// Values for p1, p2, ... in order, each as RE[,IM]
        #[arg(
            short,
            long = "param",
            value_name = "RE[,IM]",
            allow_hyphen_values = true,
            value_parser = parse_complex
        )]
        params: Vec<Complex64>,

        /// Bindings for fn1, fn2, ... in order
        #[arg(long = "fn", value_name = "NAME", value_parser = parse_function)]
        functions: Vec<Function>,

        /// Seed for `rand`
        #[arg(long)]
        seed: Option<u64>,

        /// Set `ismand` to 0
        #[arg(long)]
        julia: bool,
    },
}

#[derive(Args)]
struct Target {
    /// Formula library (.frm)
    file: PathBuf,
    /// Formula name
    name: String,
}

fn parse_complex(s: &str) -> Result<Complex64, String> {
    let number = |part: &str| {
        part.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid number \"{part}\": {e}"))
    };
    match s.split_once(',') {
        Some((re, im)) => Ok(Complex64::new(number(re)?, number(im)?)),
        None => Ok(Complex64::new(number(s)?, 0.0)),
    }
}

fn parse_function(s: &str) -> Result<Function, String> {
    match Function::from_name(s) {
        Some(f) if f.is_bindable() => Ok(f),
        Some(f) => Err(format!("\"{f}\" cannot be bound to a parameter function")),
        None => Err(format!("unknown function \"{s}\"")),
    }
}

/// Library source that reads from disk.
///
/// Searches in configured directories, trying the exact name first,
/// then appending `.frm` if not found.
struct FsSource {
    search_dirs: Vec<PathBuf>,
}

impl FsSource {
    const fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }
}

impl FormulaSource for FsSource {
    fn read_library(&self, name: &str) -> Option<String> {
        let candidates = [name.to_owned(), format!("{name}.frm")];

        for dir in &self.search_dirs {
            for candidate in &candidates {
                let path = dir.join(candidate);
                if let Ok(contents) = fs::read_to_string(&path) {
                    tracing::debug!(path = %path.display(), "read formula library");
                    return Some(contents);
                }
            }
        }
        None
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ok = match cli.command {
        Command::List { file } => list(&load_library(&file)),
        Command::Check { file, names } => check(&load_library(&file), &names),
        Command::Disasm(target) => {
            let compiled = compile_target(&target);
            print!("{}", disassemble(&compiled.program));
            true
        }
        Command::Orbit {
            target,
            pixel,
            precision,
            maxit,
            params,
            functions,
            seed,
            julia,
        } => {
            let mut formula_params = FormulaParams::default()
                .with_maxit(maxit)
                .with_ismand(!julia);
            for (i, value) in params.into_iter().enumerate() {
                formula_params = formula_params.with_param(i + 1, value);
            }
            for (i, function) in functions.into_iter().enumerate() {
                formula_params = formula_params.with_function(i + 1, function);
            }
            formula_params.rand_seed = seed;
            let compiled = compile_target(&target);
            orbit(&compiled, precision, &formula_params, pixel)
        }
    };

    if !ok {
        process::exit(1);
    }
}

/// Read a library, searching next to the given path and in the current
/// directory.
fn load_library(file: &Path) -> FormulaLibrary {
    let mut search_dirs = Vec::new();
    if let Some(parent) = file.parent() {
        search_dirs.push(parent.to_path_buf());
    }
    if let Ok(cwd) = env::current_dir() {
        search_dirs.push(cwd);
    }
    let name = file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    match FormulaLibrary::load(&FsSource::new(search_dirs), name) {
        Ok(library) => library,
        Err(e) => {
            eprintln!("Error reading {}: {e}", file.display());
            process::exit(1);
        }
    }
}

fn compile_target(target: &Target) -> Compiled {
    let library = load_library(&target.file);
    match compile_entry(&library, &target.name) {
        Some(compiled) => compiled,
        None => process::exit(1),
    }
}

/// Compile one entry, printing warnings and errors to stderr.
fn compile_entry(library: &FormulaLibrary, name: &str) -> Option<Compiled> {
    let text = library.find(name).unwrap_or_default();
    match library.compile(name, &CompileOptions::default()) {
        Ok(compiled) => {
            for warning in &compiled.warnings {
                eprint!("{}", render_diagnostic(text, warning));
            }
            Some(compiled)
        }
        Err(e @ CompileError::NotFound(_)) => {
            eprintln!("Error: {e}");
            None
        }
        Err(e) => {
            eprintln!("{name}:");
            eprint!("{}", render_error(text, &e));
            None
        }
    }
}

fn list(library: &FormulaLibrary) -> bool {
    for entry in library.entries() {
        println!("{}", entry.name);
    }
    true
}

fn check(library: &FormulaLibrary, names: &[String]) -> bool {
    let names: Vec<String> = if names.is_empty() {
        library.entries().map(|e| e.name.clone()).collect()
    } else {
        names.to_vec()
    };

    let mut failed = 0;
    for name in &names {
        match compile_entry(library, name) {
            Some(compiled) => {
                let info = &compiled.info;
                println!(
                    "{}: ok ({} instructions, {}{})",
                    info.name,
                    info.instructions,
                    info.symmetry,
                    describe_usage(&info.usage)
                );
            }
            None => failed += 1,
        }
    }
    if names.len() > 1 {
        println!("{} of {} formulas compiled", names.len() - failed, names.len());
    }
    failed == 0
}

fn describe_usage(usage: &Usage) -> String {
    let flags = [
        ("p1", usage.p1),
        ("p2", usage.p2),
        ("p3", usage.p3),
        ("p4", usage.p4),
        ("p5", usage.p5),
        ("ismand", usage.ismand),
        ("rand", usage.rand),
        ("jump", usage.jump),
    ];
    let mut used: Vec<String> = flags
        .iter()
        .filter(|(_, on)| *on)
        .map(|(name, _)| (*name).to_owned())
        .collect();
    if usage.max_fn > 0 {
        used.push(format!("fn1..fn{}", usage.max_fn));
    }
    if used.is_empty() {
        String::new()
    } else {
        format!(", uses {}", used.join(" "))
    }
}

fn orbit(compiled: &Compiled, precision: Precision, params: &FormulaParams, pixel: Complex64) -> bool {
    let mut evaluator = match Evaluator::new(&compiled.program, precision, params) {
        Ok(evaluator) => evaluator,
        Err(e) => {
            eprintln!("Error: {e}");
            return false;
        }
    };

    let print_z = |n: u32, z: Complex64| println!("{n:5}  {:+.12} {:+.12}i", z.re, z.im);
    if !evaluator.run_initialization(&PixelInput::at(pixel)) {
        println!("overflow during initialization");
        return true;
    }
    print_z(0, evaluator.z());
    for n in 1..=params.maxit {
        let escaped = evaluator.run_iteration();
        print_z(n, evaluator.z());
        if escaped {
            println!("escaped at iteration {n}");
            return true;
        }
    }
    println!("bounded after {} iterations", params.maxit);
    true
}
