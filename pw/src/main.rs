//! Planwright - validated planning documents from language models
//!
//! CLI entry point.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, eyre};
use serde_json::Value;
use tracing::{debug, info};

use planwright::budget::{ContentCategory, ContextItem};
use planwright::cli::{Cli, Command, OutputFormat};
use planwright::config::Config;
use planwright::llm::HttpModelClient;
use planwright::plan::{ensure_element_ids, normalize};
use planwright::prompts::PromptLoader;
use planwright::registry::{ModelRegistry, RegistryHandle};
use planwright::repair::repair;
use planwright::router::{RouteOptions, Router};
use planwright::validate::{counts, summarize, unparseable, validate_all};
use planwright::workflow::{ConsoleRequester, FileReviewStore, Orchestrator, WorkflowOutcome};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("planwright")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(log_dir.join("planwright.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Plan {
            request,
            context,
            max_rounds,
            require_approval,
        } => cmd_plan(config, &request, &context, max_rounds, require_approval).await,
        Command::Validate { file, format } => cmd_validate(&file, format),
        Command::Repair { file, output } => cmd_repair(&file, output.as_deref()),
        Command::Models { format } => cmd_models(&config, format),
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).context(format!("Failed to read {}", path.display()))
}

/// Parse a document and bring it into canonical shape
fn parse_document(content: &str) -> Result<Value, serde_json::Error> {
    let mut doc: Value = serde_json::from_str(content)?;
    normalize(&mut doc, None);
    Ok(doc)
}

fn load_registry(config: &Config) -> Result<ModelRegistry> {
    ModelRegistry::load(&config.registry.path)
        .context(format!("Failed to load model registry from {}", config.registry.path.display()))
}

async fn cmd_plan(
    mut config: Config,
    request: &str,
    context: &[PathBuf],
    max_rounds: Option<u32>,
    require_approval: bool,
) -> Result<()> {
    debug!(%request, context = context.len(), ?max_rounds, "cmd_plan: called");
    if let Some(rounds) = max_rounds {
        config.workflow.max_rounds = rounds;
    }
    config.workflow.require_approval |= require_approval;
    config.validate()?;

    let registry = Arc::new(RegistryHandle::new(load_registry(&config)?));
    let client = Arc::new(HttpModelClient::new().context("Failed to create HTTP client")?);
    let router = Arc::new(Router::new(registry, client, &config.router));

    let items = context
        .iter()
        .map(|path| {
            fs::read_to_string(path)
                .map(|body| ContextItem::new(ContentCategory::Code, path.display().to_string(), body))
                .context(format!("Failed to read context file {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let store = FileReviewStore::new(&config.workflow.review_dir).with_approval(config.workflow.require_approval);
    let prompts = PromptLoader::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let orchestrator = Orchestrator::new(
        router.clone(),
        prompts,
        Arc::new(store),
        Arc::new(ConsoleRequester),
        config.workflow.clone(),
    )
    .with_route_options(RouteOptions::from_config(&config.router))
    .with_context(items)
    .with_cancel(cancel_rx);

    if config.workflow.require_approval {
        println!(
            "Review required: create {}/<run>.approved once the snapshot is reviewed",
            config.workflow.review_dir.display()
        );
    }

    let outcome = orchestrator.run(request).await;
    print_outcome(&outcome);

    let metrics = router.metrics().summary();
    info!(calls = metrics.total_calls, failures = metrics.total_failures, "Router metrics");
    println!("Model calls: {} ({} failed)", metrics.total_calls, metrics.total_failures);

    if outcome.status.is_success() {
        Ok(())
    } else {
        Err(eyre!("Planning ended with status {}", outcome.status))
    }
}

fn print_outcome(outcome: &WorkflowOutcome) {
    let status = outcome.status.to_string();
    let status = if outcome.status.is_success() {
        status.green()
    } else {
        status.red()
    };
    println!("Status: {}", status.bold());
    println!(
        "Rounds: {}  Repairs: {}  Clarifications: {}",
        outcome.rounds, outcome.repairs, outcome.clarifications
    );
    if let Some(error) = &outcome.error {
        println!("Reason: {}", error);
    }
    if !outcome.violations.is_empty() {
        println!();
        println!("{}", summarize(&outcome.violations));
    }
    if let Some(path) = &outcome.checkpoint {
        println!("Document: {}", path);
    }
}

fn cmd_validate(file: &Path, format: OutputFormat) -> Result<()> {
    debug!(?file, ?format, "cmd_validate: called");
    let content = read_file(file)?;
    let violations = match parse_document(&content) {
        Ok(doc) => validate_all(&doc),
        Err(e) => vec![unparseable(e.to_string())],
    };

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "valid": violations.is_empty(),
                "counts": counts(&violations),
                "violations": violations,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => println!("{}", summarize(&violations)),
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(eyre!("{} violation(s) in {}", violations.len(), file.display()))
    }
}

fn cmd_repair(file: &Path, output: Option<&Path>) -> Result<()> {
    debug!(?file, ?output, "cmd_repair: called");
    let mut doc = parse_document(&read_file(file)?).context(format!("{} is not valid JSON", file.display()))?;
    let report = ensure_element_ids(&mut doc);
    if report.changed() {
        eprintln!(
            "Element ids: {} assigned, {} renamed, {} tests linked",
            report.assigned, report.renamed, report.linked
        );
    }

    let outcome = repair(&doc, &validate_all(&doc));
    for action in &outcome.applied {
        eprintln!("  {} {}", "fixed".green(), action);
    }

    let remaining = validate_all(&outcome.document);
    let body = serde_json::to_string_pretty(&outcome.document)?;
    match output {
        Some(path) => {
            fs::write(path, body).context(format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{}", body),
    }

    if remaining.is_empty() {
        Ok(())
    } else {
        eprintln!("{}", summarize(&remaining));
        Err(eyre!("{} violation(s) could not be repaired", remaining.len()))
    }
}

fn cmd_models(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_models: called");
    let registry = load_registry(config)?;

    match format {
        OutputFormat::Json => {
            let entries: Vec<_> = registry.entries().iter().map(|e| e.as_ref()).collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Text => {
            println!("{:<24} {:<32} {:>10}", "ROLE", "MODEL", "CONTEXT");
            for role in registry.roles() {
                if let Some(entry) = registry.resolve(&role) {
                    println!("{:<24} {:<32} {:>10}", role, entry.model, entry.context_window);
                }
            }
        }
    }
    Ok(())
}
