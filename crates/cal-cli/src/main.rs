mod config;
mod error;
mod report;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cal_lexer::{tokenize, Tokenized};
use cal_parser::{parse, ParseOutput, ParserOptions};
use cal_syntax::{validate_clean_exit, LexerEndState, Token, TokenKind, ValidationResult};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::error::CliError;
use crate::report::{render_note, render_problem, render_summary, Problem};

#[derive(Parser, Debug)]
#[command(name = "cal", version, about = "Tokenize, parse and check C/AL object files")]
struct Cli {
    /// Log at debug level (CAL_LOG or RUST_LOG override this)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Parser configuration file; defaults to ./cal.toml when present
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the token stream and the lexer end-state
    Lex {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the object outline and any diagnostics
    Parse {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Tokenize, validate and parse each file and report every problem
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Serialize)]
struct LexReport<'a> {
    tokens: &'a [Token],
    end_state: &'a LexerEndState,
    validation: &'a ValidationResult,
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("CAL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Reads a file as bytes and decodes it lossily.
fn read_source(path: &Path) -> Result<String, CliError> {
    let bytes = fs::read(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("{}: {}", "error".red().bold(), err.to_string().red());
            ExitCode::from(2)
        }
    }
}

/// Runs one subcommand; `Ok(false)` means problems were found.
fn run(cli: Cli) -> Result<bool, CliError> {
    let options = config::load_options(cli.config.as_deref())?;
    match cli.command {
        Command::Lex { file, json } => lex(&file, json),
        Command::Parse { file, json } => parse_file(&file, json, &options),
        Command::Check { files } => {
            let mut problems = 0;
            for file in &files {
                problems += check(file, &options)?;
            }
            render_summary(files.len(), problems);
            Ok(problems == 0)
        }
    }
}

fn lex(path: &Path, json: bool) -> Result<bool, CliError> {
    let source = read_source(path)?;
    let Tokenized { tokens, end_state } = tokenize(&source);
    let validation = validate_clean_exit(&end_state);
    if json {
        let report = LexReport {
            tokens: &tokens,
            end_state: &end_state,
            validation: &validation,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for tok in &tokens {
            println!("{:>5}:{:<4} {:<20} {}", tok.line, tok.column, format!("{:?}", tok.kind), tok.text);
        }
        println!("context stack: {}", end_state.context_names().join(" > "));
        for violation in &validation.violations {
            println!("{}: {}", violation.category, violation.message);
        }
    }
    let unknown = tokens.iter().any(|t| t.kind == TokenKind::Unknown);
    Ok(validation.passed && !unknown)
}

fn parse_file(path: &Path, json: bool, options: &ParserOptions) -> Result<bool, CliError> {
    let source = read_source(path)?;
    let lexed = tokenize(&source);
    let output = parse(&lexed.tokens, options);
    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_outline(&output);
        let display = path.display().to_string();
        for diag in &output.diagnostics {
            render_problem(&display, &source, &diag_problem(diag));
        }
    }
    Ok(output.diagnostics.is_empty())
}

fn print_outline(output: &ParseOutput) {
    let Some(object) = &output.document.object else {
        println!("(no object)");
        return;
    };
    println!("{} {} {}", object.kind.as_str(), object.id, object.name);
    if let Some(props) = &object.properties {
        println!("  properties: {}", props.properties.len());
    }
    if let Some(fields) = &object.fields {
        println!("  fields: {}", fields.fields.len());
    }
    if let Some(keys) = &object.keys {
        println!("  keys: {}", keys.keys.len());
    }
    if let Some(groups) = &object.field_groups {
        println!("  field groups: {}", groups.groups.len());
    }
    if let Some(code) = &object.code {
        println!(
            "  code: {} variable(s), {} procedure(s), {} trigger(s)",
            code.variables.len(),
            code.procedures.len(),
            code.triggers.len()
        );
        for procedure in &code.procedures {
            let scope = if procedure.is_local { "local " } else { "" };
            println!("    {}procedure {}", scope, procedure.name);
        }
    }
    for skipped in &object.skipped_sections {
        println!("  skipped: {}", skipped.name);
    }
}

fn diag_problem(diag: &cal_syntax::Diagnostic) -> Problem<'static> {
    Problem {
        kind: "Parse error",
        message: diag.message.clone(),
        line: diag.line(),
        column: diag.column(),
    }
}

/// Reports every problem in one file and returns how many there were.
fn check(path: &Path, options: &ParserOptions) -> Result<usize, CliError> {
    let source = read_source(path)?;
    let display = path.display().to_string();
    let lexed = tokenize(&source);
    let mut problems = 0;

    for tok in lexed.tokens.iter().filter(|t| t.kind == TokenKind::Unknown) {
        let problem = Problem {
            kind: "Lex error",
            message: format!("Unrecognised input {:?}", tok.text),
            line: tok.line,
            column: tok.column,
        };
        render_problem(&display, &source, &problem);
        problems += 1;
    }

    let validation = validate_clean_exit(&lexed.end_state);
    for violation in &validation.violations {
        render_note(violation.category.as_str(), &display, &violation.message);
        problems += 1;
    }

    let output = parse(&lexed.tokens, options);
    for diag in &output.diagnostics {
        render_problem(&display, &source, &diag_problem(diag));
        problems += 1;
    }

    debug!(file = %path.display(), problems, "checked");
    if problems == 0 {
        println!("{}: {}", display, "ok".green());
    }
    Ok(problems)
}
