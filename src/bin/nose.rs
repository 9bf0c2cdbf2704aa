//! `nose` — loads a model + workload DSL file, runs the advisor pipeline,
//! and prints the chosen schema (§6 CLI collaborator).

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};

use nose::config::{AdvisorConfig, CostModelKind, OutputFormat};
use nose::cost::{CostModel, EntryCountCost, FieldSizeCost};
use nose::error::AdvisorError;
use nose::workload;

#[derive(Parser)]
#[command(name = "nose")]
#[command(about = "An automated index and view selection advisor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Workload DSL file (model + statements)
    workload: PathBuf,

    /// Optional TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format, overriding the config file
    #[arg(long, value_enum)]
    format: Option<CliOutputFormat>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline and print the chosen schema
    Plan,
    /// Validate a workload without solving
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliOutputFormat {
    Json,
    Table,
}

fn main() -> ExitCode {
    nose::init_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match AdvisorConfig::from_toml_file(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "failed to load configuration");
                return ExitCode::from(4);
            }
        },
        None => AdvisorConfig::default(),
    };
    if let Some(format) = cli.format {
        config.output_format = match format {
            CliOutputFormat::Json => OutputFormat::Json,
            CliOutputFormat::Table => OutputFormat::Table,
        };
    }

    let source = match std::fs::read_to_string(&cli.workload) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to read workload file");
            return ExitCode::from(4);
        }
    };

    let workload = match workload::load(&source) {
        Ok(w) => w,
        Err(e) => {
            tracing::error!(error = %e, "failed to parse workload");
            return exit_code_for(&e);
        }
    };
    if !workload.valid() {
        for reason in workload.errors() {
            tracing::warn!(reason, "invalid statement skipped while loading workload");
        }
    }

    match cli.command.unwrap_or(Command::Plan) {
        Command::Check => {
            println!("{} statements loaded, {} valid", workload.len(), if workload.valid() { "all" } else { "not" });
            ExitCode::SUCCESS
        }
        Command::Plan => run_plan(&workload, &config),
    }
}

fn run_plan(workload: &workload::Workload, config: &AdvisorConfig) -> ExitCode {
    let model = workload.model().clone();
    let deadline = Instant::now().checked_add(config.solver_timeout());

    let cost_model: Box<dyn CostModel> = match config.cost_model {
        CostModelKind::EntryCount => Box::new(EntryCountCost),
        CostModelKind::FieldSize => Box::new(FieldSizeCost),
    };

    match nose::pipeline::advise(&model, workload, cost_model.as_ref(), deadline) {
        Ok(schema) => {
            match config.output_format {
                OutputFormat::Json => match serde_json::to_string_pretty(&SchemaView::from(&schema)) {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize schema");
                        return ExitCode::from(4);
                    }
                },
                OutputFormat::Table => {
                    for key in &schema.chosen_indexes {
                        println!("{key}");
                    }
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "pipeline failed");
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(error: &AdvisorError) -> ExitCode {
    match error {
        AdvisorError::ParseFailed { .. } => ExitCode::from(2),
        AdvisorError::NoSolution(_) | AdvisorError::NoPlan(_) => ExitCode::from(3),
        _ => ExitCode::from(4),
    }
}

#[derive(serde::Serialize)]
struct SchemaView {
    chosen_indexes: Vec<String>,
}

impl From<&nose::milp::Schema> for SchemaView {
    fn from(schema: &nose::milp::Schema) -> Self {
        SchemaView { chosen_indexes: schema.chosen_indexes.iter().cloned().collect() }
    }
}
