use clap::{Parser as ClapParser, Subcommand};
use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::ast::Program;
use crate::checker::Checker;
use crate::interpreter::config::ReturnPolicy;
use crate::interpreter::{run_with_config, EvalConfig, FunctionTable, Value};
use crate::lexer::{Lexer, TokenType};
use crate::parser::Parser as MinicParser;
use crate::tac::{lower_program, optimize_program};

/// minic CLI
#[derive(ClapParser)]
#[command(name = "minic")]
#[command(about = "Evaluate programs written in a small C subset")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one or more C files and print the value returned by the entry point
    Run {
        /// Paths to the C source files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Function to call
        #[arg(long, default_value = "main")]
        entry: String,

        /// Maximum call depth before reporting a stack overflow
        #[arg(long, value_name = "N", conflicts_with = "unlimited_depth")]
        max_depth: Option<usize>,

        /// Disable the call depth limit
        #[arg(long)]
        unlimited_depth: bool,

        /// Treat falling off the end of a function as an error instead of returning 0
        #[arg(long)]
        strict_return: bool,

        /// Run the semantic checker before evaluating
        #[arg(long)]
        check: bool,
    },

    /// Report semantic errors without running the program
    Check {
        /// Path to the C source file
        file: PathBuf,

        /// Function that must exist as the entry point
        #[arg(long, default_value = "main")]
        entry: String,
    },

    /// Tokenize a C file (for debugging)
    Tokenize {
        /// Path to the C source file
        file: PathBuf,
    },

    /// Parse a C file and show AST (for debugging)
    Parse {
        /// Path to the C source file
        file: PathBuf,
    },

    /// Lower a C file to three-address code and print it
    Tac {
        /// Path to the C source file
        file: PathBuf,

        /// Run the peephole optimizer on the lowered code
        #[arg(short = 'O', long)]
        optimize: bool,
    },
}

/// Options shared by every file of a `run` invocation
struct RunOptions {
    entry: String,
    config: EvalConfig,
    check: bool,
    verbose: bool,
}

/// Execute the CLI command
pub fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            files,
            verbose,
            entry,
            max_depth,
            unlimited_depth,
            strict_return,
            check,
        } => {
            let mut config = EvalConfig::default();
            if unlimited_depth {
                config = config.with_max_call_depth(None);
            } else if max_depth.is_some() {
                config = config.with_max_call_depth(max_depth);
            }
            if strict_return {
                config = config.with_return_policy(ReturnPolicy::Strict);
            }

            let options = RunOptions {
                entry,
                config,
                check,
                verbose,
            };
            run_files(&files, &options)
        }
        Commands::Check { file, entry } => check_file(&file, &entry),
        Commands::Tokenize { file } => tokenize_file(&file),
        Commands::Parse { file } => parse_file(&file),
        Commands::Tac { file, optimize } => print_tac(&file, optimize),
    }
}

/// Read, lex and parse a source file
fn load_program(file: &Path) -> Result<Program> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let tokens = Lexer::new(&source)
        .tokenize()
        .with_context(|| format!("failed to tokenize {}", file.display()))?;

    MinicParser::new(tokens)
        .parse()
        .with_context(|| format!("failed to parse {}", file.display()))
}

/// Run every file independently, in parallel; results are reported in argument order
fn run_files(files: &[PathBuf], options: &RunOptions) -> Result<()> {
    if let [file] = files {
        let value = run_file(file, options)?;
        println!("{}", value);
        return Ok(());
    }

    let results: Vec<Result<Value>> = files.par_iter().map(|file| run_file(file, options)).collect();

    let mut failures = 0;
    for (file, result) in files.iter().zip(results) {
        match result {
            Ok(value) => println!("{}: {}", file.display(), value),
            Err(err) => {
                failures += 1;
                eprintln!("{}: error: {:#}", file.display(), err);
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} programs failed", failures, files.len());
    }
    Ok(())
}

fn run_file(file: &Path, options: &RunOptions) -> Result<Value> {
    if options.verbose {
        println!("Running: {}", file.display());
    }

    let program = load_program(file)?;

    if options.verbose {
        println!("  Parsed {} functions", program.functions.len());
    }

    if options.check {
        if let Err(errors) = Checker::with_entry(&options.entry).check_program(&program) {
            for error in &errors {
                eprintln!("{}: {}", file.display(), error);
            }
            bail!("{} semantic errors in {}", errors.len(), file.display());
        }
    }

    let table = FunctionTable::from_program(&program)
        .with_context(|| format!("invalid program {}", file.display()))?;

    log::info!("evaluating {} from '{}'", file.display(), options.entry);
    let value = run_with_config(&table, &options.entry, &options.config)
        .with_context(|| format!("runtime error in {}", file.display()))?;

    if options.verbose {
        println!("  {} returned {}", options.entry, value);
    }
    Ok(value)
}

/// Run the semantic checker and print its findings
fn check_file(file: &Path, entry: &str) -> Result<()> {
    let program = load_program(file)?;

    match Checker::with_entry(entry).check_program(&program) {
        Ok(()) => {
            println!("{}: ok ({} functions)", file.display(), program.functions.len());
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                println!("{}: {}", file.display(), error);
            }
            bail!("{} semantic errors in {}", errors.len(), file.display())
        }
    }
}

/// Tokenize a file and print tokens
fn tokenize_file(file: &Path) -> Result<()> {
    println!("Tokenizing: {}", file.display());
    println!("{}", "=".repeat(60));

    let source = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let tokens = Lexer::new(&source).tokenize()?;

    for token in tokens {
        if matches!(token.token_type, TokenType::Eof) {
            break;
        }
        println!("{}", token);
    }

    Ok(())
}

/// Parse a file and print AST
fn parse_file(file: &Path) -> Result<()> {
    println!("Parsing: {}", file.display());
    println!("{}", "=".repeat(60));

    let program = load_program(file)?;
    println!("{:#?}", program);

    Ok(())
}

/// Lower a file to three-address code and print the listing
fn print_tac(file: &Path, optimize: bool) -> Result<()> {
    println!("Lowering: {}", file.display());
    println!("{}", "=".repeat(60));

    let program = load_program(file)?;
    let mut tac = lower_program(&program);
    let lowered = tac.len();
    if optimize {
        optimize_program(&mut tac);
    }

    print!("{}", tac);
    if optimize {
        println!("; {} instructions, {} after optimization", lowered, tac.len());
    } else {
        println!("; {} instructions", lowered);
    }
    Ok(())
}
