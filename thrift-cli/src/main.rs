//! # thrift-cli
//!
//! Command-line compiler that turns parsed Thrift documents into
//! binary-protocol codecs.
//!
//! ## Commands
//!
//! - `thriftc generate <doc.json>...` - Write TypeScript codecs for each document
//! - `thriftc check <doc.json>...` - Compile only and report errors
//! - `thriftc inspect <doc.json>` - Print the compiled codec IR as JSON
//!
//! See `thriftc --help` for the full command reference.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::io;
use std::path::PathBuf;
use std::process;

mod commands;
mod config;
mod telemetry;

#[derive(Parser)]
#[command(name = "thriftc")]
#[command(about = "Thrift codec compiler - generate binary-protocol codecs from parsed documents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to thriftc.toml configuration file
    #[arg(short, long, global = true, default_value = "thriftc.toml")]
    config: String,

    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Generate shell completions
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile documents and write TypeScript codecs
    Generate {
        /// Parsed document JSON files
        #[arg(required = true)]
        documents: Vec<PathBuf>,

        /// Output directory (overrides config)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Compile documents without writing any output
    Check {
        /// Parsed document JSON files
        #[arg(required = true)]
        documents: Vec<PathBuf>,
    },

    /// Print the compiled codec IR as JSON
    Inspect {
        /// Parsed document JSON file
        document: PathBuf,

        /// Only print the struct or service with this name
        #[arg(short, long)]
        definition: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "thriftc", &mut io::stdout());
        return;
    }

    if let Err(e) = telemetry::init(cli.verbose, cli.json_logs) {
        eprintln!("{} {}", "Warning:".yellow().bold(), e);
    }

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Generate { documents, out } => {
            commands::generate::generate(&cli.config, &documents, out)
        }
        Commands::Check { documents } => commands::check::check(&documents),
        Commands::Inspect {
            document,
            definition,
        } => commands::inspect::inspect(&document, definition.as_deref()),
    }
}
