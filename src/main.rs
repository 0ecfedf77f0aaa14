//! Command-line front end: lists the known file types and validates workbooks on disk.

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use rusty_intake::intake::admit;
use rusty_intake::intake::FileCandidate;
use rusty_intake::SchemaRegistry;
use rusty_intake::ValidationResult;
use rusty_intake::Validator;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Validate spreadsheet uploads against their file-type schema
#[derive(Parser, Debug)]
#[command(name = "rusty-intake")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log decoding and validation detail to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the known file types and their columns
    Types {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate workbooks against a file type
    Validate {
        /// File-type identifier
        #[arg(short = 't', long = "type", env = "RUSTY_INTAKE_FILE_TYPE", default_value = "report")]
        file_type: String,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Workbook paths or glob patterns
        #[arg(required = true)]
        files: Vec<String>,
    },
}

/// Result for one file on the command line
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FileReport {
    file: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rejections: Vec<String>,
    #[serde(flatten)]
    result: Option<ValidationResult>,
}

impl FileReport {
    fn valid(&self) -> bool {
        self.rejections.is_empty() && self.result.as_ref().is_some_and(|result| result.valid)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "rusty_intake=debug" } else { "rusty_intake=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

/// Expands glob patterns; a pattern matching nothing is kept as a literal path
fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let matches = glob::glob(pattern)
            .with_context(|| format!("Invalid file pattern '{pattern}'"))?
            .collect::<Result<Vec<PathBuf>, glob::GlobError>>()
            .with_context(|| format!("Failed to expand '{pattern}'"))?;
        if matches.is_empty() {
            paths.push(PathBuf::from(pattern));
        } else {
            paths.extend(matches);
        }
    }
    Ok(paths)
}

fn check_file(validator: &Validator, path: &Path, file_type: &str) -> Result<FileReport> {
    let file = path.display().to_string();
    let size = std::fs::metadata(path)
        .with_context(|| format!("Failed to read '{file}'"))?
        .len();
    let admission = admit(&[FileCandidate::from_path(path, size)]);
    if let Some(rejected) = admission.rejected.first() {
        debug!(file = %file, size, "File turned away at intake");
        return Ok(FileReport { file, rejections: rejected.messages(), result: None });
    }
    let result = validator
        .validate_file(path, file_type)
        .with_context(|| format!("Failed to read '{file}'"))?;
    Ok(FileReport { file, rejections: Vec::new(), result: Some(result) })
}

fn print_report(report: &FileReport) {
    if report.valid() {
        println!("{}: valid", report.file);
        return;
    }
    println!("{}: invalid", report.file);
    let messages = report.result.iter().flat_map(|result| result.errors.iter());
    for message in report.rejections.iter().chain(messages) {
        println!("  - {message}");
    }
}

fn list_types(registry: &SchemaRegistry, json: bool) -> Result<()> {
    if json {
        let types: Vec<_> = registry.file_types().collect();
        println!("{}", serde_json::to_string_pretty(&types)?);
        return Ok(());
    }
    for schema in registry.file_types() {
        let columns: Vec<String> = schema
            .columns
            .iter()
            .map(|column| format!("{}: {}", column.key, column.kind))
            .collect();
        println!("{}\t{}\t{}", schema.id, schema.label, columns.join(", "));
    }
    Ok(())
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let registry = SchemaRegistry::builtin();
    match cli.command {
        Command::Types { json } => {
            list_types(&registry, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate { file_type, json, files } => {
            let validator = Validator::new(registry);
            let reports = expand_patterns(&files)?
                .iter()
                .map(|path| check_file(&validator, path, &file_type))
                .collect::<Result<Vec<FileReport>>>()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                reports.iter().for_each(print_report);
            }
            if reports.iter().all(FileReport::valid) {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
