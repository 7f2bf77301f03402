#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs Barn Defence sieges headlessly.

mod graph_transfer;
mod siege;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use barn_defence_core::{EngineConfig, Event, ManualClock, PlacementCode};
use barn_defence_system_structural_validator::{SerializedGraph, StructuralValidator};
use barn_defence_world::{apply, query, World};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sha2::{Digest, Sha256};
use tracing_subscriber::EnvFilter;

use crate::siege::{Siege, SiegePlan};

/// Headless driver for the Barn Defence structural simulation.
#[derive(Debug, Parser)]
#[command(name = "barn-defence", version, about)]
struct Cli {
    /// Engine configuration file in TOML; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Runs a seeded siege and prints an event digest.
    Simulate(SimulateArgs),
    /// Runs a siege and writes the resulting support graph.
    ExportGraph(ExportArgs),
    /// Loads a support graph and reports pieces cut off from the ground.
    CheckGraph(CheckArgs),
}

#[derive(Debug, Args)]
struct SiegeArgs {
    /// Seed of the siege generator.
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Number of frames to simulate.
    #[arg(long, default_value_t = 600)]
    frames: u32,
    /// Foundation posts in the barricade ring.
    #[arg(long, default_value_t = 24)]
    posts: u32,
    /// Zombies released at the start.
    #[arg(long, default_value_t = 40)]
    zombies: u32,
    /// Frames between explosions; zero disables them.
    #[arg(long, default_value_t = 90)]
    explosion_interval: u32,
    /// Simulated milliseconds per frame.
    #[arg(long, default_value_t = 50)]
    frame_ms: u64,
    /// Stability budget per tick in milliseconds; the configured default when omitted.
    #[arg(long)]
    budget_ms: Option<u64>,
}

#[derive(Debug, Args)]
struct SimulateArgs {
    #[command(flatten)]
    siege: SiegeArgs,
    /// Frames between progress log lines.
    #[arg(long, default_value_t = 100)]
    log_every: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum GraphFormat {
    Json,
    Transfer,
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[command(flatten)]
    siege: SiegeArgs,
    /// Output encoding.
    #[arg(long, value_enum, default_value_t = GraphFormat::Json)]
    format: GraphFormat,
    /// Destination file; standard output when omitted.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// JSON snapshot or transfer string to inspect.
    input: PathBuf,
    /// Fails when any piece lacks a path to the ground.
    #[arg(long)]
    strict: bool,
}

#[derive(Debug, Default)]
struct Tally {
    placed: usize,
    rejected: usize,
    blocked: usize,
    destroyed: usize,
    collapses: usize,
    recomputed: usize,
}

impl Tally {
    fn record(&mut self, event: &Event) {
        match event {
            Event::PiecePlaced { .. } => self.placed += 1,
            Event::PlacementRejected { reasons, .. } => {
                self.rejected += 1;
                if reasons.iter().any(|r| r.code == PlacementCode::Blocked) {
                    self.blocked += 1;
                }
            }
            Event::EntityDestroyed { .. } => self.destroyed += 1,
            Event::CollapseScheduled { .. } => self.collapses += 1,
            Event::StabilityRefreshed { processed, .. } => self.recomputed += processed,
            _ => {}
        }
    }
}

/// Entry point for the Barn Defence command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate(args) => simulate(config, &args),
        Commands::ExportGraph(args) => export_graph(config, &args),
        Commands::CheckGraph(args) => check_graph(config, &args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn plan(config: &EngineConfig, args: &SiegeArgs) -> SiegePlan {
    SiegePlan {
        posts: args.posts,
        zombies: args.zombies,
        explosion_interval: args.explosion_interval,
        frame: Duration::from_millis(args.frame_ms),
        budget: args
            .budget_ms
            .map_or_else(|| config.stability.default_budget(), Duration::from_millis),
    }
}

/// Runs the siege, feeding every emitted event to `observe` after each frame.
///
/// The world is timed by a virtual clock that moves one frame per step, so
/// stability budgets and cache ages never depend on the host machine.
fn run_siege(
    config: EngineConfig,
    args: &SiegeArgs,
    mut observe: impl FnMut(u32, &World<ManualClock>, &[Event]),
) -> World<ManualClock> {
    let plan = plan(&config, args);
    let step = plan.frame;
    let mut siege = Siege::new(plan, args.seed);
    let clock = ManualClock::new();
    let mut world = World::with_clock(config.clone(), clock.clone());
    let mut events = Vec::new();

    for command in siege.setup(&config) {
        apply(&mut world, command, &mut events);
    }
    observe(0, &world, &events);
    events.clear();

    for frame in 0..args.frames {
        for command in siege.frame(frame, &world) {
            apply(&mut world, command, &mut events);
        }
        observe(frame + 1, &world, &events);
        events.clear();
        clock.advance(step);
    }
    world
}

fn simulate(config: EngineConfig, args: &SimulateArgs) -> Result<()> {
    let mut digest = Sha256::new();
    let mut tally = Tally::default();
    let log_every = args.log_every.max(1);

    let world = run_siege(config, &args.siege, |frame, world, events| {
        for event in events {
            digest.update(format!("{event:?}\n").as_bytes());
            tally.record(event);
        }
        if frame % log_every == 0 {
            let stats = query::optimizer_stats(world);
            tracing::info!(
                frame,
                pieces = query::piece_count(world),
                pending = stats.pending_total,
                hit_rate = %stats.hit_rate,
                destroyed = tally.destroyed,
                "siege progress"
            );
        }
    });

    let stats = query::optimizer_stats(&world);
    let zones = query::zone_stats(&world);
    println!("frames simulated:   {}", query::tick_index(&world));
    println!("pieces standing:    {}", query::piece_count(&world));
    println!(
        "placements:         {} accepted, {} rejected ({} blocked)",
        tally.placed, tally.rejected, tally.blocked
    );
    println!("entities destroyed: {}", tally.destroyed);
    println!("collapses:          {}", tally.collapses);
    println!(
        "stability:          {} recomputed, {} hit rate, {} pending",
        tally.recomputed, stats.hit_rate, stats.pending_total
    );
    println!(
        "zones:              {} of {} active",
        zones.active_zones, zones.total_zones
    );
    println!("event digest:       {}", hex(&digest.finalize()));
    Ok(())
}

fn export_graph(config: EngineConfig, args: &ExportArgs) -> Result<()> {
    let world = run_siege(config, &args.siege, |_, _, _| {});
    let graph = query::serialized_graph(&world);

    let mut text = match args.format {
        GraphFormat::Json => {
            serde_json::to_string_pretty(&graph).context("failed to encode support graph")?
        }
        GraphFormat::Transfer => {
            graph_transfer::encode(&graph).context("failed to encode transfer string")?
        }
    };
    text.push('\n');

    match &args.output {
        Some(path) => {
            fs::write(path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(pieces = graph.pieces.len(), path = %path.display(), "graph exported");
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn check_graph(config: EngineConfig, args: &CheckArgs) -> Result<()> {
    let contents = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let mut validator = StructuralValidator::new(config.placement);
    if graph_transfer::is_transfer_string(&contents) {
        let graph: SerializedGraph =
            graph_transfer::decode(&contents).context("invalid transfer string")?;
        validator.deserialize_graph(Some(&graph));
    } else {
        validator
            .from_json(&contents)
            .context("invalid support graph document")?;
    }

    let graph = validator.graph();
    let floating: Vec<_> = graph
        .pieces()
        .filter(|piece| !graph.has_path_to_ground(*piece))
        .collect();

    println!("pieces:   {}", graph.len());
    println!("edges:    {}", graph.edge_count());
    println!(
        "grounded: {}",
        graph.pieces().filter(|piece| graph.is_grounded(*piece)).count()
    );
    if floating.is_empty() {
        println!("every piece reaches the ground");
    } else {
        let listed: Vec<String> = floating.iter().map(ToString::to_string).collect();
        println!("floating: {}", listed.join(", "));
        if args.strict {
            bail!("{} pieces have no path to the ground", floating.len());
        }
    }
    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
