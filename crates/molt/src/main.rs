//! Binary entry point for the molt CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Rename a function and its in-file references
//! molt apply rename src/calc.py --param target=add_numbers --param new_name=calculate_sum
//!
//! # Preview an extraction as a unified diff
//! molt apply extract-method src/order.py --param target=Order::total#L4-L6 --param name=subtotal --dry-run
//!
//! # Show the catalog
//! molt list
//!
//! # Find attribute accesses of `manager` under src/
//! molt references manager --pattern attr --root src
//! ```

use std::fmt::Display;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;

use molt::cli::{
    collect_params, describe_target, find_references, format_reference, list_refactorings,
    parse_param, run_apply, ApplyRequest,
};
use molt_core::error::{MoltError, MoltResult, OutputErrorCode};
use molt_python::references::{SearchBackend, UsagePattern};

// ============================================================================
// CLI Structure
// ============================================================================

/// Format-preserving Python refactoring.
#[derive(Parser, Debug)]
#[command(name = "molt", version, about = "Format-preserving Python refactoring")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Log level for tracing output (overridden by RUST_LOG).
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Emit log events as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Output format for command results.
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Search backend for cross-file work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    /// First available of rg, ag, grep, builtin.
    Auto,
    Rg,
    Ag,
    Grep,
    Builtin,
}

impl BackendArg {
    fn to_backend(self) -> Option<SearchBackend> {
        match self {
            BackendArg::Auto => None,
            BackendArg::Rg => Some(SearchBackend::Ripgrep),
            BackendArg::Ag => Some(SearchBackend::SilverSearcher),
            BackendArg::Grep => Some(SearchBackend::Grep),
            BackendArg::Builtin => Some(SearchBackend::Builtin),
        }
    }
}

fn parse_pattern(raw: &str) -> Result<UsagePattern, String> {
    raw.parse().map_err(|e: MoltError| e.to_string())
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a refactoring to one file.
    Apply {
        /// Refactoring name (see `molt list`).
        refactoring: String,
        /// Python file to refactor.
        file: PathBuf,
        /// Refactoring parameter as `key=value`; repeatable.
        #[arg(long = "param", short = 'p', value_parser = parse_param)]
        params: Vec<(String, String)>,
        /// Print a unified diff instead of writing.
        #[arg(long)]
        dry_run: bool,
        /// Root for cross-file updates (default: the file's directory).
        #[arg(long)]
        root: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "auto")]
        search_backend: BackendArg,
    },
    /// List the available refactorings and their parameters.
    List,
    /// Find validated references to a symbol.
    References {
        symbol: String,
        /// Usage pattern: attr, call, func or assign.
        #[arg(long, default_value = "attr", value_parser = parse_pattern)]
        pattern: UsagePattern,
        /// Only matches whose leftmost base name is this object.
        #[arg(long)]
        base: Option<String>,
        #[arg(long, default_value = ".")]
        root: PathBuf,
        #[arg(long, value_enum, default_value = "auto")]
        search_backend: BackendArg,
    },
    /// Parse a target string and show its structure.
    Target { raw: String },
}

// ============================================================================
// Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level, cli.global.log_json);

    let format = cli.global.format;
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            match format {
                OutputFormat::Text => eprintln!("error: {}", err),
                OutputFormat::Json => println!(
                    "{}",
                    json!({
                        "status": "error",
                        "code": error_code.code(),
                        "message": err.to_string(),
                    })
                ),
            }
            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel, json: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Execute the CLI command.
fn execute(cli: Cli) -> MoltResult<()> {
    let format = cli.global.format;
    match cli.command {
        Command::Apply {
            refactoring,
            file,
            params,
            dry_run,
            root,
            search_backend,
        } => {
            let request = ApplyRequest {
                refactoring,
                file,
                params: collect_params(params)?,
                dry_run,
                root,
                backend: search_backend.to_backend(),
            };
            let report = run_apply(&request)?;
            emit(format, &report, |out| out.push(report.to_string()))
        }
        Command::List => {
            let entries = list_refactorings();
            emit(format, &entries, |out| {
                out.extend(entries.iter().map(ToString::to_string))
            })
        }
        Command::References {
            symbol,
            pattern,
            base,
            root,
            search_backend,
        } => {
            let references = find_references(
                &root,
                &symbol,
                pattern,
                base.as_deref(),
                search_backend.to_backend(),
            )?;
            emit(format, &references, |out| {
                out.extend(references.iter().map(format_reference))
            })
        }
        Command::Target { raw } => {
            let report = describe_target(&raw)?;
            emit(format, &report, |out| out.push(report.to_string()))
        }
    }
}

/// Print `value` as pretty JSON, or the lines produced by `text`.
fn emit<T, F>(format: OutputFormat, value: &T, text: F) -> MoltResult<()>
where
    T: Serialize,
    F: FnOnce(&mut Vec<String>),
{
    match format {
        OutputFormat::Json => {
            let rendered = serde_json::to_string_pretty(value)
                .map_err(|e| MoltError::internal(format!("JSON serialization error: {}", e)))?;
            println!("{}", rendered);
        }
        OutputFormat::Text => {
            let mut lines = Vec::new();
            text(&mut lines);
            print_lines(&lines);
        }
    }
    Ok(())
}

fn print_lines(lines: &[impl Display]) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
