//! dqcheck CLI - DQC rule validation for XBRL document models

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

use dqcheck::{loader, Diagnostic, RuleTables, Severity, ValidationConfig, Validator};

/// XBRL US Data Quality Committee rule validation
#[derive(Parser)]
#[command(name = "dqcheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a document-model JSON file
    Validate {
        /// Input file
        input: PathBuf,

        /// Rule codes to suppress, separated by | characters
        #[arg(short, long, default_value = "")]
        suppress: String,

        /// Directory with replacement rule data tables
        #[arg(long)]
        tables: Option<PathBuf>,

        /// Output diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate {
            input,
            suppress,
            tables,
            json,
        } => {
            let doc = loader::load_file(&input)
                .with_context(|| format!("Failed to load {}", input.display()))?;

            let tables = tables
                .map(|dir| {
                    RuleTables::from_dir(&dir)
                        .with_context(|| format!("Failed to load rule tables from {}", dir.display()))
                })
                .transpose()?;

            let validator = Validator::with_config(ValidationConfig { suppress, tables });
            let report = validator.validate(&doc)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report.diagnostics)?);
            } else if report.is_clean() {
                println!(
                    "{} {} - {} facts checked in {}ms, no violations",
                    "✓".green().bold(),
                    input.display(),
                    report.stats.facts_scanned,
                    report.stats.duration_ms
                );
            } else {
                println!(
                    "{} {} - {} violations",
                    "✗".red().bold(),
                    input.display(),
                    report.diagnostics.len()
                );
                for diagnostic in &report.diagnostics {
                    print_diagnostic(diagnostic, 1);
                }
            }

            if !report.is_clean() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn print_diagnostic(diagnostic: &Diagnostic, depth: usize) {
    let severity = match diagnostic.severity {
        Severity::Error => "ERROR:".red().bold(),
        Severity::Info => "INFO:".yellow(),
        Severity::Other => "".normal(),
    };
    println!(
        "{}{} {}",
        "  ".repeat(depth),
        severity,
        diagnostic.message
    );
    for child in &diagnostic.children {
        print_diagnostic(child, depth + 1);
    }
}
