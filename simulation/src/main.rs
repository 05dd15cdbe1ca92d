//! STAR network simulator
//!
//! Runs ad hoc networks of STAR routers over a simulated channel, either
//! interactively or as canned scenarios.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use star_core::{IdentityError, Metric, NodeId};
use star_logging::{ConsoleFormat, FileConfig, StarSubscriberBuilder};
use star_simulation::{
    AdHocNode, GraphBuilder, ServiceConfig, ServiceError, ServiceHandle, SimConfig, Simulation,
    SimulationService, WeightedGraph, scenarios,
};

#[derive(Parser)]
#[command(
    name = "star-sim",
    about = "Ad hoc network simulation with STAR link-state routing",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Console log format
    #[arg(long, global = true, value_enum, default_value = "compact")]
    log_format: LogFormat,

    /// Also write JSON log lines to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl From<LogFormat> for ConsoleFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Pretty => ConsoleFormat::Pretty,
            LogFormat::Compact => ConsoleFormat::Compact,
            LogFormat::Json => ConsoleFormat::Json,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ScenarioName {
    /// Line 0-1-2, route from 0 to 2
    A,
    /// Send before any advertisement arrived
    B,
    /// Duplicated advertisements are harmless
    C,
    /// Disconnected graph is rejected
    D,
}

#[derive(Clone, Copy, ValueEnum)]
enum Shape {
    Line,
    Ring,
    Full,
    Random,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a random connected network with an interactive menu
    Run {
        /// Number of nodes
        #[arg(short, long, default_value = "10")]
        nodes: u32,

        /// Edge probability of the random graph
        #[arg(short, long, default_value = "0.5")]
        probability: f64,

        #[arg(long, default_value = "1")]
        min_weight: Metric,

        #[arg(long, default_value = "10")]
        max_weight: Metric,

        /// Seed for the random graph (overrides the config file)
        #[arg(long)]
        seed: Option<u64>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Terminate every node after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Wall-clock milliseconds per simulated tick
        #[arg(long, default_value = "10")]
        tick_ms: u64,

        /// Run to quiescence and print the results instead of the menu
        #[arg(long)]
        batch: bool,
    },

    /// Run one of the canned scenarios
    Scenario {
        #[arg(value_enum)]
        name: ScenarioName,
    },

    /// Generate and print a topology
    Topology {
        #[arg(short, long, value_enum, default_value = "random")]
        shape: Shape,

        #[arg(short, long, default_value = "10")]
        nodes: u32,

        #[arg(short, long, default_value = "0.5")]
        probability: f64,

        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = logging(&cli).try_init()?;

    match cli.command {
        Commands::Run {
            nodes,
            probability,
            min_weight,
            max_weight,
            seed,
            config,
            duration,
            tick_ms,
            batch,
        } => {
            let mut config = match config {
                Some(path) => SimConfig::load(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => SimConfig::default(),
            };
            if let Some(seed) = seed {
                config.seed = seed;
            }
            let graph = GraphBuilder::new(nodes).random_connected(
                probability,
                min_weight..=max_weight,
                config.seed,
            )?;
            println!("{}", graph.visualize());

            if batch {
                run_batch(graph, config)?;
            } else {
                let service = ServiceConfig {
                    tick_interval: Duration::from_millis(tick_ms.max(1)),
                    ticks_per_interval: 1,
                };
                run_interactive(graph, config, service, duration).await?;
            }
        }
        Commands::Scenario { name } => match name {
            ScenarioName::A => {
                scenarios::run_line_scenario()?;
            }
            ScenarioName::B => {
                scenarios::run_early_send_scenario()?;
            }
            ScenarioName::C => {
                scenarios::run_duplicate_scenario()?;
            }
            ScenarioName::D => {
                // Rejection is the expected outcome
                if scenarios::run_disconnected_scenario().is_ok() {
                    anyhow::bail!("disconnected graph was accepted");
                }
            }
        },
        Commands::Topology {
            shape,
            nodes,
            probability,
            seed,
        } => {
            let builder = GraphBuilder::new(nodes);
            let graph = match shape {
                Shape::Line => builder.line(1)?,
                Shape::Ring => builder.ring(1)?,
                Shape::Full => builder.full_mesh(1)?,
                Shape::Random => builder.random_connected(probability, 1..=10, seed)?,
            };
            println!("{}", graph.visualize());
        }
    }

    Ok(())
}

fn logging(cli: &Cli) -> StarSubscriberBuilder {
    let level = if cli.verbose { "debug" } else { "info" };
    let builder = StarSubscriberBuilder::new()
        .with_level(level)
        .with_console_format(cli.log_format.into());
    match &cli.log_dir {
        Some(dir) => builder.with_file_output(FileConfig {
            directory: dir.clone(),
            ..FileConfig::default()
        }),
        None => builder,
    }
}

fn run_batch(graph: WeightedGraph, config: SimConfig) -> anyhow::Result<()> {
    let mut sim = Simulation::new(graph, config, &AdHocNode)?;
    sim.start()?;
    let summary = sim.run_until_quiescent()?;
    println!(
        "Quiescent at {} after {} events, converged: {}\n",
        summary.now,
        summary.dispatched,
        sim.is_converged()
    );
    println!("{}", sim.render_routing_tables());
    println!("{}", sim.stats());
    Ok(())
}

async fn run_interactive(
    graph: WeightedGraph,
    config: SimConfig,
    service: ServiceConfig,
    duration: Option<u64>,
) -> anyhow::Result<()> {
    let sim = Simulation::new(graph, config, &AdHocNode)?;
    let (handle, task) = SimulationService::spawn(sim, service);

    if let Some(secs) = duration {
        let timer = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            if let Ok(dropped) = timer.terminate().await {
                info!(dropped, "duration elapsed, all nodes terminated");
            }
        });
    }

    print_menu();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        match execute(&handle, &parts).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(ServiceError::Closed) => {
                println!("  simulation stopped");
                break;
            }
            Err(e) => println!("  error: {}", e),
        }
    }

    let _ = handle.shutdown().await;
    let sim = task.await??;
    println!("\nFinal statistics at {}:\n{}", sim.now(), sim.stats());
    Ok(())
}

fn print_menu() {
    println!("\nInteractive mode. Commands:");
    println!("  1 | table [x]           - Routing table of x (all nodes if omitted)");
    println!("  2 | topology <x> <y>    - Topology of y known by x");
    println!("  3 | tree <x> <y>        - Source tree of y in x");
    println!("  4 | spt <x>             - Rebuild the shortest-path tree in x");
    println!("  5 | send <x> <y> <msg>  - Send a message from x to y");
    println!("  6 | stats               - Aggregated statistics");
    println!("  link <x> <y> <cost|down> - Change a link");
    println!("  inbox <x>               - Messages delivered to x");
    println!("  stop                    - Terminate every node");
    println!("  quit                    - Exit");
    println!();
}

fn node(parts: &[&str], index: usize) -> Result<NodeId, ServiceError> {
    parts
        .get(index)
        .ok_or_else(|| IdentityError::InvalidFormat(format!("<missing argument {}>", index)))
        .and_then(|s| s.parse::<NodeId>())
        .map_err(|e| ServiceError::Star(e.into()))
}

/// Run one menu command; `Ok(false)` ends the session
async fn execute(handle: &ServiceHandle, parts: &[&str]) -> Result<bool, ServiceError> {
    match parts[0] {
        "1" | "table" => {
            if parts.len() > 1 {
                println!("{}", handle.routing_table(node(parts, 1)?).await?);
            } else {
                println!("{}", handle.routing_tables().await?);
            }
        }
        "2" | "topology" => {
            let (x, y) = (node(parts, 1)?, node(parts, 2)?);
            println!("{}", handle.topology_view(x, y).await?);
        }
        "3" | "tree" => {
            let (x, y) = (node(parts, 1)?, node(parts, 2)?);
            println!("{}", handle.source_tree(x, y).await?);
        }
        "4" | "spt" => {
            println!("{}", handle.build_tree(node(parts, 1)?).await?);
        }
        "5" | "send" => {
            let (x, y) = (node(parts, 1)?, node(parts, 2)?);
            let body = parts[3.min(parts.len())..].join(" ");
            let id = handle.send_message(x, y, body).await?;
            println!("  queued {} -> {} ({})", x, y, id);
        }
        "6" | "stats" => {
            let report = handle.report().await?;
            println!(
                "  {} | pending {} | converged {} | terminated {}",
                report.now, report.pending, report.converged, report.terminated
            );
            print!("{}", report.stats);
            println!(
                "{:<20} {}\n{:<20} {}\n{:<20} {}",
                "frames_sent",
                report.channel.frames_sent,
                "frames_dropped",
                report.channel.frames_dropped,
                "bytes_sent",
                report.channel.bytes_sent
            );
        }
        "link" => {
            let (x, y) = (node(parts, 1)?, node(parts, 2)?);
            let cost = match parts.get(3) {
                Some(&"down") => None,
                Some(cost) => match cost.parse::<Metric>() {
                    Ok(cost) => Some(cost),
                    Err(_) => {
                        println!("  Usage: link <x> <y> <cost|down>");
                        return Ok(true);
                    }
                },
                None => {
                    println!("  Usage: link <x> <y> <cost|down>");
                    return Ok(true);
                }
            };
            handle.set_link(x, y, cost).await?;
            println!("  link {}-{} set to {:?}", x, y, cost);
        }
        "inbox" => {
            for msg in handle.inbox(node(parts, 1)?).await? {
                println!("  {} from {} at {}: {}", msg.id, msg.source, msg.at, msg.body_text());
            }
        }
        "stop" => {
            let dropped = handle.terminate().await?;
            println!("  all nodes terminated, {} events discarded", dropped);
        }
        "quit" | "exit" | "q" => {
            println!("Goodbye!");
            return Ok(false);
        }
        other => println!("  Unknown command: {}", other),
    }
    Ok(true)
}
