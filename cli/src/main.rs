// meshsight: topology prediction from observation traces
//
// Replays JSON Lines traces through the predictor and reports link
// predictions, optimal paths and anticipated routes.

mod config;
mod trace;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use meshsight_core::{
    OptimalPath, SharedPredictor, StaticDiscovery, TopologyPredictor, TopologySnapshot,
};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "meshsight")]
#[command(about = "Predictive network topology from connectivity observations", long_about = None)]
#[command(version)]
struct Cli {
    /// Use this config file instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a trace and summarize the resulting model
    Replay {
        /// JSON Lines trace file
        trace: PathBuf,
    },
    /// Predict whether a directed link exists
    Predict {
        trace: PathBuf,
        from: String,
        to: String,
    },
    /// Find the optimal path between two nodes
    Path {
        trace: PathBuf,
        from: String,
        to: String,
        /// Number of alternative paths to report
        #[arg(long)]
        alternatives: Option<usize>,
    },
    /// Anticipate routes after the trace and show the cached paths
    Anticipate {
        trace: PathBuf,
        /// Routes as source:destination
        #[arg(required = true)]
        routes: Vec<String>,
    },
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Set a config value
    Set { key: String, value: String },
    /// Get a config value
    Get { key: String },
    /// List all config values
    List,
    /// Show the config file location
    Path,
    /// Manage seed nodes
    Seed {
        #[command(subcommand)]
        action: SeedAction,
    },
}

#[derive(Subcommand)]
enum SeedAction {
    /// Add a seed node
    Add { id: String, address: String },
    /// Remove a seed node
    Remove { id: String },
    /// List seed nodes
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config::Config::config_file()?,
    };
    let config = config::Config::load_from(&config_path)?;
    let _log_guard = init_logging(config.log_dir.as_deref());

    match cli.command {
        Commands::Replay { trace } => cmd_replay(&config, &trace, cli.json).await,
        Commands::Predict { trace, from, to } => {
            cmd_predict(&config, &trace, &from, &to, cli.json).await
        }
        Commands::Path {
            trace,
            from,
            to,
            alternatives,
        } => cmd_path(&config, &trace, &from, &to, alternatives, cli.json).await,
        Commands::Anticipate { trace, routes } => {
            cmd_anticipate(&config, &trace, &routes, cli.json).await
        }
        Commands::Config { action } => cmd_config(config, &config_path, action),
    }
}

/// Stderr logging filtered by RUST_LOG (default "warn"), plus a daily
/// rolling file when `log_dir` is set. The guard must outlive `main`'s work.
fn init_logging(log_dir: Option<&str>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "meshsight.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

/// Bootstrap from the configured seed nodes, then replay the trace
async fn load_model(
    config: &config::Config,
    trace_path: &Path,
    alternatives: Option<usize>,
) -> Result<(SharedPredictor, trace::ReplaySummary)> {
    let mut predictor_config = config.predictor.clone();
    if let Some(k) = alternatives {
        predictor_config.max_alternatives = k;
    }
    let predictor =
        TopologyPredictor::with_config(predictor_config).context("Invalid predictor settings")?;
    let shared = SharedPredictor::new(predictor);

    let seeds = StaticDiscovery::new(
        config
            .seed_nodes
            .iter()
            .map(config::SeedNode::to_node)
            .collect(),
    );
    shared.bootstrap_with(&seeds, &config.local_address).await;

    let events = trace::read_trace(trace_path).await?;
    let summary = trace::replay(&shared, &events);
    Ok((shared, summary))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

async fn cmd_replay(config: &config::Config, trace_path: &Path, json: bool) -> Result<()> {
    let (shared, summary) = load_model(config, trace_path, None).await?;
    let metrics = shared.metrics();
    let snapshot = shared.topology();

    if json {
        return print_json(&serde_json::json!({
            "replay": summary,
            "metrics": metrics,
            "topology": snapshot.as_deref(),
        }));
    }

    println!("{}", "Replay".bold());
    println!("  {:<20} {}", "nodes added".bright_cyan(), summary.nodes);
    println!("  {:<20} {}", "observations".bright_cyan(), summary.observations);
    println!("  {:<20} {}", "rejected".bright_cyan(), summary.rejected);
    println!("  {:<20} {}", "resolutions".bright_cyan(), summary.resolutions);
    println!();

    println!("{}", "Model".bold());
    println!("  {:<20} {}", "nodes".bright_cyan(), metrics.nodes);
    println!("  {:<20} {}", "connections".bright_cyan(), metrics.connections);
    println!("  {:<20} {:.4}", "entropy".bright_cyan(), metrics.entropy);
    println!("  {:<20} {:.4}", "confidence".bright_cyan(), metrics.confidence);
    println!();

    match snapshot {
        Some(snapshot) => print_snapshot(&snapshot, config.predictor.existence_threshold),
        None => println!("  {}", "(no resolution pass yet)".dimmed()),
    }

    Ok(())
}

fn print_snapshot(snapshot: &TopologySnapshot, threshold: f64) {
    println!("{}", "Published topology".bold());
    if snapshot.connections.is_empty() {
        println!("  {}", "(no links)".dimmed());
        return;
    }
    for (key, estimate) in &snapshot.connections {
        let marker = if estimate.exists(threshold) {
            "✓".green()
        } else {
            "?".yellow()
        };
        println!(
            "  {} {} -> {}  p={:.3} c={:.3} n={}",
            marker,
            key.from.bright_cyan(),
            key.to.bright_cyan(),
            estimate.probability,
            estimate.confidence,
            estimate.observation_count
        );
    }
}

async fn cmd_predict(
    config: &config::Config,
    trace_path: &Path,
    from: &str,
    to: &str,
    json: bool,
) -> Result<()> {
    let (shared, _) = load_model(config, trace_path, None).await?;
    let prediction = shared.predict_connection(from, to);

    if json {
        return print_json(&prediction);
    }

    let verdict = if prediction.exists {
        "exists".green().bold()
    } else {
        "not established".yellow().bold()
    };
    println!("{} -> {}: {}", from.bright_cyan(), to.bright_cyan(), verdict);
    println!("  {:<20} {:.4}", "probability".bright_cyan(), prediction.probability);
    println!("  {:<20} {:.4}", "confidence".bright_cyan(), prediction.confidence);

    Ok(())
}

async fn cmd_path(
    config: &config::Config,
    trace_path: &Path,
    from: &str,
    to: &str,
    alternatives: Option<usize>,
    json: bool,
) -> Result<()> {
    let (shared, _) = load_model(config, trace_path, alternatives).await?;
    let path = shared.calculate_optimal_path(from, to);

    if json {
        return print_json(&path);
    }

    match path {
        Some(path) => {
            print_path(&path);
            for (i, alternative) in path.alternatives.iter().enumerate() {
                println!();
                println!("{}", format!("Alternative {}", i + 1).bold());
                print_path(alternative);
            }
        }
        None => {
            println!(
                "{} No path from {} to {}",
                "✗".red(),
                from.bright_cyan(),
                to.bright_cyan()
            );
        }
    }

    Ok(())
}

fn print_path(path: &OptimalPath) {
    println!("  {}", path.node_ids().join(" -> ").bright_cyan());
    println!("  {:<20} {}", "hops".dimmed(), path.hop_count());
    println!("  {:<20} {:.4}", "probability".dimmed(), path.total_probability);
    println!("  {:<20} {:.1} ms", "latency".dimmed(), path.total_latency);
    println!("  {:<20} {:.1}", "min bandwidth".dimmed(), path.min_bandwidth);
}

fn parse_route(route: &str) -> Result<(String, String)> {
    match route.split_once(':') {
        Some((source, destination)) if !source.is_empty() && !destination.is_empty() => {
            Ok((source.to_string(), destination.to_string()))
        }
        _ => anyhow::bail!("Invalid route '{}': expected source:destination", route),
    }
}

async fn cmd_anticipate(
    config: &config::Config,
    trace_path: &Path,
    routes: &[String],
    json: bool,
) -> Result<()> {
    let routes = routes
        .iter()
        .map(|r| parse_route(r))
        .collect::<Result<Vec<_>>>()?;
    let (shared, _) = load_model(config, trace_path, None).await?;

    for (source, destination) in &routes {
        shared.anticipate_route(source, destination);
    }

    if json {
        let cached: Vec<_> = routes
            .iter()
            .map(|(source, destination)| {
                serde_json::json!({
                    "source": source,
                    "destination": destination,
                    "path": shared.get_path(source, destination),
                })
            })
            .collect();
        return print_json(&cached);
    }

    println!("{}", "Anticipated routes".bold());
    for (source, destination) in &routes {
        println!();
        match shared.get_path(source, destination) {
            Some(path) => {
                println!(
                    "{} {} -> {}",
                    "✓".green(),
                    source.bright_cyan(),
                    destination.bright_cyan()
                );
                print_path(&path);
            }
            None => {
                println!(
                    "{} {} -> {} {}",
                    "✗".red(),
                    source.bright_cyan(),
                    destination.bright_cyan(),
                    "(unreachable, cached on next refresh)".dimmed()
                );
            }
        }
    }

    Ok(())
}

fn cmd_config(mut config: config::Config, config_path: &Path, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save_to(config_path)?;
            println!("{} Set {} = {}", "✓".green(), key.bright_cyan(), value);
        }

        ConfigAction::Get { key } => {
            if let Some(value) = config.get(&key) {
                println!("{} = {}", key.bright_cyan(), value);
            } else {
                anyhow::bail!("Unknown config key: {}", key);
            }
        }

        ConfigAction::List => {
            println!("{}", "Configuration".bold());
            println!();

            for (key, value) in config.list() {
                println!("  {:<26} {}", key.bright_cyan(), value);
            }

            println!();
            print_seed_nodes(&config);
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }

        ConfigAction::Seed { action } => match action {
            SeedAction::Add { id, address } => {
                config.add_seed_node(id.clone(), address.clone())?;
                config.save_to(config_path)?;
                println!("{} Added seed node: {} ({})", "✓".green(), id, address);
            }

            SeedAction::Remove { id } => {
                if !config.remove_seed_node(&id) {
                    anyhow::bail!("No seed node with id {}", id);
                }
                config.save_to(config_path)?;
                println!("{} Removed seed node", "✓".green());
            }

            SeedAction::List => print_seed_nodes(&config),
        },
    }

    Ok(())
}

fn print_seed_nodes(config: &config::Config) {
    println!("{}", "Seed nodes:".bold());
    if config.seed_nodes.is_empty() {
        println!("  {}", "(none configured)".dimmed());
    } else {
        for (i, node) in config.seed_nodes.iter().enumerate() {
            println!("  {}. {} {}", i + 1, node.id, node.address.dimmed());
        }
    }
}
