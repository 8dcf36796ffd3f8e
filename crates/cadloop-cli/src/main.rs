//! cadloop CLI
//!
//! Offline tools around the generation engine: check a plan, print its
//! build order, emit a template script, or show the effective config.
//!
//! # Configuration
//!
//! Loaded from `--config <path>` if given, otherwise from `cadloop.toml` in
//! the current directory when present, otherwise defaults.
//!
//! # Logging
//!
//! `RUST_LOG` selects the filter (default `info`). Logs go to stderr so the
//! emitted script on stdout stays clean.

use anyhow::{Context, Result};
use cadloop_core::WorkflowConfig;
use cadloop_emitter::{CodeEmitter, EmitScope};
use cadloop_graph::PartDependencyGraph;
use cadloop_plan::{Plan, PlanValidator};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG_FILE: &str = "cadloop.toml";

#[derive(Parser, Debug)]
#[command(name = "cadloop", version, about = "Controlled parametric CAD generation")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (default: ./cadloop.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a plan file; exits 1 when issues are found
    ValidatePlan {
        /// Plan JSON, or planning text containing it
        file: PathBuf,
    },

    /// Print the parts of a plan in build order
    Order { file: PathBuf },

    /// Print the assembled template script for a plan
    Emit {
        file: PathBuf,

        /// Export directory written into the script
        #[arg(long)]
        output_dir: Option<String>,

        /// Only these parts, comma separated
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Print where the configuration came from instead
        #[arg(long)]
        path: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let (config, source) = load_config(cli.config.as_deref())?;
    tracing::debug!(source = %source, "configuration loaded");

    match cli.command {
        Command::ValidatePlan { file } => validate_plan(&file, &config),
        Command::Order { file } => {
            let plan = read_plan(&file)?;
            let graph = PartDependencyGraph::from_plan(&plan.items);
            for name in graph.topological_order() {
                println!("{name}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Emit {
            file,
            output_dir,
            select,
        } => {
            let plan = read_plan(&file)?;
            let dir = output_dir.unwrap_or(config.output_dir);
            print!("{}", emit_templates(&plan, dir, select));
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { path } => {
            if path {
                println!("{source}");
            } else {
                print!("{}", config.to_toml_string()?);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Effective config and a description of where it came from
fn load_config(explicit: Option<&Path>) -> Result<(WorkflowConfig, String)> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let local = PathBuf::from(DEFAULT_CONFIG_FILE);
            local.is_file().then_some(local)
        }
    };

    let Some(path) = path else {
        return Ok((WorkflowConfig::default(), "<defaults>".to_string()));
    };
    let config = WorkflowConfig::load(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    config.validate()?;
    Ok((config, path.display().to_string()))
}

fn read_plan(file: &Path) -> Result<Plan> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading plan {}", file.display()))?;
    Plan::parse_response(&text).with_context(|| format!("parsing plan {}", file.display()))
}

fn validate_plan(file: &Path, config: &WorkflowConfig) -> Result<ExitCode> {
    let plan = read_plan(file)?;
    let report = PlanValidator::with_config(config.validator).validate(&plan.items);
    let graph_issues = PartDependencyGraph::from_plan(&plan.items).validate();

    for message in report.messages() {
        println!("{message}");
    }
    for suggestion in PlanValidator::suggest_fixes(&report.issues) {
        println!("Suggestion: {suggestion}");
    }
    for issue in &graph_issues {
        println!("Graph: {issue}");
    }

    if report.is_valid() && graph_issues.is_empty() {
        println!("Plan OK: {} parts", plan.len());
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::warn!(
            plan_issues = report.issues.len(),
            graph_issues = graph_issues.len(),
            "plan has issues"
        );
        Ok(ExitCode::FAILURE)
    }
}

/// Script with template code for every part of the plan
fn emit_templates(plan: &Plan, output_dir: String, select: Vec<String>) -> String {
    let mut graph = PartDependencyGraph::from_plan(&plan.items);
    let emitter = CodeEmitter::new().with_output_dir(output_dir);

    let names: Vec<String> = graph.names().map(str::to_string).collect();
    for name in names {
        let code = graph.get(&name).map(|p| emitter.emit_part(p)).unwrap_or_default();
        emitter.update_part_code(&mut graph, &name, code);
    }

    let scope = if select.is_empty() {
        EmitScope::All
    } else {
        EmitScope::Selected(select)
    };
    emitter.emit(&graph, &scope)
}
