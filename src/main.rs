// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Traceback main entry point - CLI and commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use traceback::config::{self, CliOptions, TracebackConfig, WorkspaceConfig};
use traceback::engine::{Engine, EntryAnalysis, UserNotice};
use traceback::index::{DistanceMetric, IndexProgress, ProgressCallback};
use traceback::logs::LogEntry;
use traceback::lsp::LspBackend;
use traceback::ranking::CallerCandidate;
use traceback::resolver::{Resolution, ResolvedLocation};
use traceback::state::{default_state_path, StateKey, StateStore};
use traceback::symbols::{CallerAnalyzer, FsTextBackend, DEFAULT_STACK_DEPTH};
#[cfg(feature = "telemetry")]
use traceback::telemetry::GLOBAL_METRICS;
use traceback::telemetry::{init_telemetry, TelemetryConfig};
use traceback::variables::{VariableLocator, VariableMatch, VariableQuery};
use traceback::EngineError;

/// Correlate runtime logs with the code that emitted them.
#[derive(Parser)]
#[command(name = "traceback")]
#[command(author, version, about = "Correlate runtime logs with the code that emitted them", long_about = None)]
struct Cli {
    /// Repository root (defaults to the workspace root)
    #[arg(long, global = true, env = "TRACEBACK_REPO")]
    repo: Option<PathBuf>,

    /// Distance metric for semantic search (cosine, euclidean, manhattan)
    #[arg(long, global = true)]
    metric: Option<DistanceMetric>,

    /// Embedding provider (auto, openai, ollama)
    #[arg(long, global = true, env = "TRACEBACK_EMBEDDING_PROVIDER")]
    embedding_provider: Option<String>,

    /// Model used to rank callers
    #[arg(short, long, global = true, env = "TRACEBACK_MODEL")]
    model: Option<String>,

    /// State database location
    #[arg(long, global = true)]
    state_path: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    /// Suppress spinners and progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show info-level logs
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Show debug output
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Subcommands for traceback.
#[derive(Subcommand)]
enum Commands {
    /// Build the embedding index and print its statistics
    Index,

    /// Find the source line that emitted a log message
    Locate {
        /// Log message; prefix with `exact:` for verbatim matching
        message: String,
        /// List every candidate location instead of the best one
        #[arg(long)]
        all: bool,
    },

    /// List call sites that may have led to a line
    Callers {
        /// Source file, absolute or relative to the repository root
        file: PathBuf,
        /// 1-based line number
        line: u32,
    },

    /// Reconstruct the probable call stack that reached a line
    Stack {
        /// Source file, absolute or relative to the repository root
        file: PathBuf,
        /// 1-based line number
        line: u32,
        /// Maximum number of frames, the line itself included
        #[arg(long, default_value_t = DEFAULT_STACK_DEPTH)]
        depth: usize,
    },

    /// Resolve a log entry and rank its likely callers
    Analyze {
        /// Raw log line or JSON log record
        line: Option<String>,
        /// File with one log line or JSON record per line
        #[arg(long, conflicts_with = "line")]
        file: Option<PathBuf>,
        /// 1-based entry in --file to analyze (defaults to the last)
        #[arg(long, requires = "file")]
        entry: Option<usize>,
    },

    /// Find where a variable was most plausibly set
    Var {
        /// Variable name
        name: String,
        /// Module path or log target, e.g. storage::page_service
        #[arg(long)]
        hint: Option<String>,
        /// File the log line was resolved to
        #[arg(long)]
        file: Option<PathBuf>,
        /// 1-based line the log was emitted from
        #[arg(long, requires = "file")]
        line: Option<u32>,
        /// Build the embedding index and search the files it ranks for the
        /// name when the hint finds nothing
        #[arg(long)]
        indexed: bool,
    },

    /// Read and write persistent state
    State {
        #[command(subcommand)]
        action: StateAction,
    },

    /// Show the merged configuration
    Config,

    /// Create a .traceback.json in the current directory
    Init,
}

/// State subcommand actions.
#[derive(Subcommand)]
enum StateAction {
    /// Print a state value (trace-id, dataset, endpoint)
    Get { key: String },
    /// Set a state value
    Set { key: String, value: String },
    /// List well-known state values
    List,
    /// Store a secret
    SetSecret { name: String, value: String },
    /// Delete a secret
    DeleteSecret { name: String },
    /// Drop every cached caller analysis
    ClearCache,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let format = cli.format;
    match run(cli).await {
        Ok(()) => Ok(()),
        Err(err) => match err.downcast_ref::<EngineError>() {
            Some(engine_err) => {
                let notice = Engine::notice(engine_err);
                print_notice(&notice, format)?;
                if notice.is_error() {
                    std::process::exit(1);
                }
                Ok(())
            }
            None => Err(err),
        },
    }
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let config = if cli.debug {
        TelemetryConfig::development()
    } else if cli.verbose {
        TelemetryConfig::default().with_level(tracing::Level::INFO)
    } else {
        TelemetryConfig::default()
    };
    init_telemetry(&config).context("failed to initialize logging")
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cli_options = CliOptions {
        repo_root: cli.repo.clone(),
        metric: cli.metric,
        embedding_provider: cli.embedding_provider.clone(),
        model: cli.model.clone(),
        state_path: cli.state_path.clone(),
    };
    let workspace_root = std::env::current_dir()?;
    let workspace_root = config::find_workspace_root(&workspace_root).unwrap_or(workspace_root);
    let config = config::load_config(&workspace_root, cli_options)?;
    let format = cli.format;

    match cli.command {
        Commands::Index => {
            let engine = build_engine(config, cli.quiet).await?;
            let stats = engine.build_index().await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                OutputFormat::Text => {
                    println!("{}", "Index built".bright_blue().bold());
                    println!("Files:      {} ({} skipped)", stats.files_indexed, stats.files_skipped);
                    println!("Lines:      {}", stats.chunks);
                    println!("Dimensions: {}", stats.dimensions);
                    println!("Embeddings: {} / {}", stats.provider, stats.model.bright_white());
                    println!("Took:       {} ms", stats.duration_ms);
                }
            }
        }
        Commands::Locate { message, all } => {
            let engine = indexed_engine(config, cli.quiet).await?;
            let resolution = engine.locate(&message, all).await?;
            print_resolution(&resolution, format)?;
        }
        Commands::Callers { file, line } => {
            let root = config.require_repo_root()?.clone();
            let lsp = Arc::new(LspBackend::with_defaults(&root));
            let analyzer = CallerAnalyzer::new(lsp.clone(), Arc::new(FsTextBackend));
            let path = if file.is_relative() { root.join(&file) } else { file };
            let result = analyzer
                .find_potential_callers(&path, line.saturating_sub(1))
                .await;
            lsp.shutdown().await;
            print_candidates(&result?, &root, format)?;
        }
        Commands::Stack { file, line, depth } => {
            let root = config.require_repo_root()?.clone();
            let lsp = Arc::new(LspBackend::with_defaults(&root));
            let analyzer = CallerAnalyzer::new(lsp.clone(), Arc::new(FsTextBackend));
            let path = if file.is_relative() { root.join(&file) } else { file };
            let result = analyzer.stack_trace(&path, line.saturating_sub(1), depth).await;
            lsp.shutdown().await;
            print_stack(&result?, &root, format)?;
        }
        Commands::Analyze { line, file, entry } => {
            let (mut target, history) = match (line, file) {
                (Some(line), _) => {
                    let entry = parse_entry(&line)?;
                    let history = vec![entry.display_text().to_string()];
                    (entry, history)
                }
                (None, Some(path)) => select_entry(&path, entry).await?,
                (None, None) => anyhow::bail!("give a log line or --file"),
            };
            let threshold = config.ranking.focus_threshold;
            let engine = indexed_engine(config, cli.quiet).await?;
            let result = engine.analyze_entry(&mut target, &history).await;
            engine.shutdown().await;
            match result? {
                Some(analysis) => print_analysis(&analysis, threshold, format)?,
                None => print_notice(&UserNotice::not_found("source location"), format)?,
            }
        }
        Commands::Var { name, hint, file, line, indexed } => {
            let mut query = VariableQuery::new(name);
            if let Some(hint) = hint {
                query = query.with_hint(hint);
            }
            if let Some(file) = file {
                query = query.with_active_file(file, line.map(|l| l.saturating_sub(1)));
            }
            let found = if indexed {
                let engine = indexed_engine(config, cli.quiet).await?;
                engine.locate_variable(&query).await?
            } else {
                let root = config.require_repo_root()?.clone();
                VariableLocator::new(None, Some(root), config.index.clone(), config.variables)
                    .locate(&query)
                    .await?
            };
            match found {
                Some(found) => print_variable(&found, format)?,
                None => print_notice(&UserNotice::not_found("occurrence"), format)?,
            }
        }
        Commands::State { action } => handle_state(&config, action, format)?,
        Commands::Config => println!("{}", serde_json::to_string_pretty(&config)?),
        Commands::Init => {
            let cwd = std::env::current_dir()?;
            if let Some(existing) = config::CONFIG_FILES.iter().map(|f| cwd.join(f)).find(|p| p.exists()) {
                anyhow::bail!("{} already exists", existing.display());
            }
            let starter = WorkspaceConfig {
                repo_root: Some(PathBuf::from(".")),
                ..WorkspaceConfig::default()
            };
            let path = config::save_workspace_config(&cwd, &starter)?;
            println!("{} created {}", "✓".green(), path.display());
        }
    }

    #[cfg(feature = "telemetry")]
    if cli.debug {
        eprintln!("{}", GLOBAL_METRICS.snapshot().format_report().dimmed());
    }
    Ok(())
}

/// Engine with a spinner wired to the index's progress.
async fn build_engine(config: TracebackConfig, quiet: bool) -> anyhow::Result<Engine> {
    let progress = if quiet {
        None
    } else {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
        spinner.enable_steady_tick(std::time::Duration::from_millis(100));
        spinner.set_message("Connecting to embedding backend...");
        let callback: ProgressCallback = Arc::new(move |p: IndexProgress| {
            if p.is_complete {
                spinner.finish_and_clear();
            } else {
                spinner.set_message(format!(
                    "Indexing {}/{} files, {} lines {}",
                    p.files_processed,
                    p.total_files,
                    p.chunks_created,
                    p.current_file.unwrap_or_default()
                ));
            }
        });
        Some(callback)
    };
    Ok(Engine::from_config_with_progress(config, progress).await?)
}

/// The index lives in memory, so every lookup builds it first.
async fn indexed_engine(config: TracebackConfig, quiet: bool) -> anyhow::Result<Engine> {
    let engine = build_engine(config, quiet).await?;
    engine.build_index().await?;
    Ok(engine)
}

fn parse_entry(line: &str) -> anyhow::Result<LogEntry> {
    if line.trim_start().starts_with('{') {
        LogEntry::from_json(line).context("invalid JSON log record")
    } else {
        Ok(LogEntry::from_raw(line))
    }
}

/// Pick one entry from a log file; every entry forms the history.
async fn select_entry(path: &Path, entry: Option<usize>) -> anyhow::Result<(LogEntry, Vec<String>)> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    let mut entries = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(parse_entry)
        .collect::<anyhow::Result<Vec<_>>>()?;
    let history = entries.iter().map(|e| e.display_text().to_string()).collect();

    let idx = match entry {
        Some(0) => anyhow::bail!("entries are numbered from 1"),
        Some(n) => n - 1,
        None => entries.len().saturating_sub(1),
    };
    if idx >= entries.len() {
        anyhow::bail!("{} has {} entries", path.display(), entries.len());
    }
    Ok((entries.swap_remove(idx), history))
}

fn handle_state(config: &TracebackConfig, action: StateAction, format: OutputFormat) -> anyhow::Result<()> {
    let path = match &config.state_path {
        Some(path) => path.clone(),
        None => default_state_path(config.require_repo_root()?),
    };
    let store = StateStore::open_at(&path)?;

    match action {
        StateAction::Get { key } => {
            let key: StateKey = key.parse()?;
            match store.get_state(key)? {
                Some(value) => println!("{}", value),
                None => print_notice(&UserNotice::not_found(key.as_str()), format)?,
            }
        }
        StateAction::Set { key, value } => {
            let key: StateKey = key.parse()?;
            store.set_state(key, &value)?;
            println!("{} {} = {}", "✓".green(), key.as_str(), value);
        }
        StateAction::List => {
            let mut values = serde_json::Map::new();
            for key in StateKey::ALL {
                let value = store.get_state(key)?;
                values.insert(key.as_str().to_string(), value.clone().into());
                if format == OutputFormat::Text {
                    println!("{:10} {}", key.as_str(), value.as_deref().unwrap_or("-").bright_white());
                }
            }
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&values)?);
            }
        }
        StateAction::SetSecret { name, value } => {
            store.set_secret(&name, &value)?;
            println!("{} stored secret {}", "✓".green(), name);
        }
        StateAction::DeleteSecret { name } => {
            if store.delete_secret(&name)? {
                println!("{} deleted secret {}", "✓".green(), name);
            } else {
                print_notice(&UserNotice::not_found("secret"), format)?;
            }
        }
        StateAction::ClearCache => {
            let removed = store.clear_analysis_cache()?;
            println!("{} removed {} cached analyses", "✓".green(), removed);
        }
    }
    Ok(())
}

fn print_notice(notice: &UserNotice, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(notice)?),
        OutputFormat::Text if notice.is_error() => eprintln!("{}", notice.message.red()),
        OutputFormat::Text => println!("{}", notice.message.cyan()),
    }
    Ok(())
}

fn print_location(location: &ResolvedLocation) {
    println!(
        "{}:{} {}",
        location.relative_path.bright_white(),
        location.line + 1,
        format!("({:.3})", location.similarity).dimmed()
    );
    if let Some(preview) = &location.preview {
        println!("    {}", preview.trim());
    }
}

fn print_resolution(resolution: &Resolution, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(resolution)?);
        return Ok(());
    }
    match resolution {
        Resolution::Best(Some(location)) => print_location(location),
        Resolution::All(locations) if !locations.is_empty() => locations.iter().for_each(print_location),
        _ => print_notice(&UserNotice::not_found("source location"), format)?,
    }
    Ok(())
}

fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

fn print_candidates(candidates: &[CallerCandidate], root: &Path, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(candidates)?);
        return Ok(());
    }
    if candidates.is_empty() {
        return print_notice(&UserNotice::not_found("callers"), format);
    }
    for candidate in candidates {
        println!(
            "{}:{} in {}",
            display_path(&candidate.file_path, root).bright_white(),
            candidate.line_number + 1,
            candidate.function_name.bright_magenta()
        );
        for line in candidate.code.lines() {
            println!("    {}", line.dimmed());
        }
    }
    Ok(())
}

fn print_stack(frames: &[CallerCandidate], root: &Path, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(frames)?);
        return Ok(());
    }
    println!("{}", "Probable call stack (outermost first)".bright_blue().bold());
    for (depth, frame) in frames.iter().enumerate() {
        println!(
            "{:>3}. {} at {}:{}",
            depth,
            frame.function_name.bright_magenta(),
            display_path(&frame.file_path, root).bright_white(),
            frame.line_number + 1
        );
    }
    Ok(())
}

fn print_analysis(result: &EntryAnalysis, threshold: f64, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    print_location(&result.location);
    for line in &result.context {
        let text = format!("{:>5} | {}", line.line_number + 1, line.content);
        if line.line_number == result.location.line {
            println!("{}", text.bright_yellow());
        } else {
            println!("{}", text.dimmed());
        }
    }

    if result.analysis.is_empty() {
        return print_notice(&UserNotice::not_found("callers"), format);
    }
    println!("\n{}", "Likely callers".bright_blue().bold());
    for (rank, caller) in result.analysis.ranked_callers.iter().enumerate() {
        let confidence = format!("{:>3.0}%", caller.confidence * 100.0);
        let confidence = if caller.confidence > threshold {
            confidence.green().bold()
        } else {
            confidence.normal()
        };
        println!(
            "{:2}. {} {}:{} in {}",
            rank + 1,
            confidence,
            caller.candidate.file_path.display(),
            caller.candidate.line_number + 1,
            caller.candidate.function_name.bright_magenta()
        );
        if !caller.explanation.is_empty() {
            println!("      {}", caller.explanation.dimmed());
        }
    }
    Ok(())
}

fn print_variable(found: &VariableMatch, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(found)?);
        return Ok(());
    }
    let best = &found.best;
    println!(
        "{}:{} {}",
        best.file.display().to_string().bright_white(),
        best.line + 1,
        format!("(score {})", best.score).green()
    );
    println!("    {}", best.line_text.trim());
    for other in found.all.iter().filter(|o| *o != best) {
        println!(
            "  {:>4} {:>3}  {}",
            other.line + 1,
            other.score,
            other.line_text.trim().dimmed()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_indexed_flag() {
        let cli = Cli::try_parse_from(["traceback", "var", "blkno", "--hint", "storage", "--indexed"]).unwrap();
        match cli.command {
            Commands::Var { name, hint, indexed, .. } => {
                assert_eq!(name, "blkno");
                assert_eq!(hint.as_deref(), Some("storage"));
                assert!(indexed);
            }
            _ => panic!("expected var"),
        }
    }

    #[test]
    fn test_stack_defaults_depth() {
        let cli = Cli::try_parse_from(["traceback", "stack", "src/pool.js", "3"]).unwrap();
        match cli.command {
            Commands::Stack { line, depth, .. } => {
                assert_eq!(line, 3);
                assert_eq!(depth, DEFAULT_STACK_DEPTH);
            }
            _ => panic!("expected stack"),
        }
    }
}
