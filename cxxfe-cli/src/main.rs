//! Demo driver binary (spec §1 "CLI, build driver, include-path resolution,
//! pragma parsing: peripheral"). Grounded on `vex-cli/src/main.rs`'s `clap`
//! derive `Cli`/`Commands` shape and its `env_logger`/`log` wiring, trimmed
//! to the one operation this spec supports end to end: read a fixture
//! translation unit and drive `cxxfe_compiler::compile_source` over it,
//! printing either the resulting IR stream or the collected diagnostics.
//!
//! Unlike `vex-cli` this never touches a code-generation back end: per
//! spec §1 the back end is an external collaborator that only consumes the
//! IR this crate's `--emit-ir` prints.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use cxxfe_compiler::{compile_source, CompileContext, DataModel, MangleAbi};

#[derive(Parser)]
#[command(name = "cxxfe")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "C++20 front-end core: template instantiation, constant evaluation, IR generation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Target name-mangling ABI.
    #[arg(long, global = true, value_enum, default_value_t = Abi::Itanium)]
    abi: Abi,

    /// Target data model (controls `sizeof(long)`).
    #[arg(long, global = true, value_enum, default_value_t = Model::Lp64)]
    data_model: Model,

    /// Disable access-control checks (spec §6.3 `access_control_disabled`).
    #[arg(long, global = true)]
    no_access_control: bool,

    /// Lower `try`/`throw`/`catch` to `std::terminate` instead of EH calls.
    #[arg(long, global = true)]
    no_exceptions: bool,

    /// Raise logging detail (spec §6.3 `verbose`).
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Abi {
    Itanium,
    Msvc,
}

#[derive(Clone, Copy, ValueEnum)]
enum Model {
    Lp64,
    Llp64,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a translation unit and print the emitted IR as JSON.
    Compile {
        /// Input source file. Reads stdin when omitted.
        #[arg(value_name = "INPUT")]
        input: Option<PathBuf>,
    },

    /// Parse and generate IR, but only report whether it succeeded and
    /// print any collected diagnostics (no IR is printed).
    Check {
        #[arg(value_name = "INPUT")]
        input: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let ctx = CompileContext {
        mangling_style: match cli.abi {
            Abi::Itanium => MangleAbi::Itanium,
            Abi::Msvc => MangleAbi::Msvc,
        },
        data_model: match cli.data_model {
            Model::Lp64 => DataModel::Lp64,
            Model::Llp64 => DataModel::Llp64,
        },
        access_control_disabled: cli.no_access_control,
        exceptions_enabled: !cli.no_exceptions,
        verbose: cli.verbose,
        ..CompileContext::default()
    };

    match cli.command {
        Commands::Compile { input } => run_compile(input, &ctx, true),
        Commands::Check { input } => run_compile(input, &ctx, false),
    }
}

fn run_compile(input: Option<PathBuf>, ctx: &CompileContext, print_ir: bool) -> Result<()> {
    let source = match &input {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        None => std::io::read_to_string(std::io::stdin()).context("reading stdin")?,
    };

    log::info!("compiling {} bytes ({} ABI, {:?} data model)", source.len(), abi_name(ctx.mangling_style), ctx.data_model);

    let result = compile_source(&source, ctx).map_err(|e| anyhow::anyhow!("{e}"))?;

    if result.diagnostics.has_diagnostics() {
        result.diagnostics.print_all(&source);
        result.diagnostics.print_summary();
    }

    if print_ir {
        println!("{}", serde_json::to_string_pretty(&result.module)?);
    }

    if result.diagnostics.has_errors() {
        std::process::exit(1);
    }

    if !result.diagnostics.has_diagnostics() {
        eprintln!("{} no diagnostics, {} instructions emitted", "ok:".green().bold(), result.module.len());
    }

    Ok(())
}

fn abi_name(abi: MangleAbi) -> &'static str {
    match abi {
        MangleAbi::Itanium => "Itanium",
        MangleAbi::Msvc => "MSVC",
    }
}
