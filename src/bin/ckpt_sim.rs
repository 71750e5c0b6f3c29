//! CLI driver: parses flags, builds the system, runs each enabled I/O
//! model for the requested number of replications, and prints one
//! report line per model per replication.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::Parser;

use ckpt_sim::config::{apply_overrides, demo_system, load_from_file, validate};
use ckpt_sim::iomodel::{
    IoModel, NoInterference, OrderedIoBlockingFcfs, OrderedIoCoop, OrderedIoFcfs,
    SimpleInterference,
};
use ckpt_sim::system::{CheckpointPolicy, System};
use ckpt_sim::time::SimTime;
use ckpt_sim::trace::StatTrace;
use ckpt_sim::Simulation;

/// Discrete-event simulator for checkpoint/restart strategies.
#[derive(Parser, Debug)]
#[command(name = "ckpt-sim", version, about)]
struct Args {
    /// PRNG seed. Omit to derive one from the current time.
    #[arg(short = 's', long)]
    seed: Option<u64>,

    /// Aggregate bandwidth in bytes/s.
    #[arg(short = 'b', long)]
    bandwidth: Option<f64>,

    /// System MTBF in seconds.
    #[arg(short = 'm', long)]
    mtbf: Option<f64>,

    /// Number of replications.
    #[arg(short = 'n', long, default_value_t = 1)]
    replications: u32,

    /// Fixed checkpoint interval in seconds; omit for Daly's formula.
    #[arg(short = 'c', long)]
    ckpt_interval: Option<f64>,

    /// Disable the cooperative-heuristic ordered model.
    #[arg(long = "no-coop")]
    no_coop: bool,

    /// Disable the FCFS ordered model.
    #[arg(long = "no-fcfs")]
    no_fcfs: bool,

    /// Disable the blocking-FCFS ordered model.
    #[arg(long = "no-blocking-fcfs")]
    no_blocking_fcfs: bool,

    /// Disable the no-interference model.
    #[arg(long = "no-interference-off")]
    no_no_interference: bool,

    /// Disable the simple-interference model.
    #[arg(long = "no-simple")]
    no_simple: bool,

    /// Disable fault injection entirely (baseline run).
    #[arg(long = "no-baseline")]
    no_faults: bool,

    /// Suppress the header line.
    #[arg(short = 'H', long)]
    no_header: bool,

    /// Optional TOML file overriding the built-in demo configuration.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn build_system(args: &Args) -> anyhow::Result<System> {
    let mut system = demo_system();
    if let Some(path) = &args.config {
        let parsed = load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?;
        validate(&parsed).context("invalid configuration")?;
        system = apply_overrides(system, parsed);
    }
    if let Some(b) = args.bandwidth {
        system.bandwidth = b;
    }
    if let Some(m) = args.mtbf {
        system.mtbf_system = m;
    }
    if let Some(c) = args.ckpt_interval {
        system.ckpt_policy = CheckpointPolicy::Fixed(SimTime::from_secs(c));
    }
    Ok(system)
}

fn default_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn run_model(system: &System, model: IoModel, seed: u64, inject_faults: bool) -> (String, bool, (f64, f64, f64, f64, f64)) {
    let name = model.name().to_string();
    let mut sim = Simulation::new(system, model, seed, inject_faults, StatTrace::new());
    sim.run();
    let window = system.min_run;
    let stat = sim
        .trace
        .get_stat(window, seed)
        .unwrap_or((0.0, 0.0, 0.0, 0.0, 0.0));
    (name, sim.converged, stat)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(default_seed);
    let system = build_system(&args)?;
    let inject_faults = !args.no_faults;
    tracing::info!(seed, nb_nodes = system.nb_nodes, replications = args.replications, "starting");

    if !args.no_header {
        println!("model: WORK IO CKPT WASTED TOTAL (s.node) Seed: {seed} Convergence: 0|1");
    }

    for rep in 0..args.replications.max(1) {
        let rep_seed = seed.wrapping_add(rep as u64);
        for (_, model) in enabled_models(&args, &system) {
            let (name, converged, (work, io, ckpt, wasted, total)) =
                run_model(&system, model, rep_seed, inject_faults);
            let prefix = if converged { "" } else { "#" };
            println!(
                "{prefix}{name}: {work:.3}/{io:.3}/{ckpt:.3}/{wasted:.3}/{total:.3} Seed: {rep_seed} Convergence: {}",
                converged as u8
            );
        }
    }
    Ok(())
}

/// Builds the set of models this invocation should run, in the fixed
/// order the header describes, skipping any the CLI flags disabled.
fn enabled_models(args: &Args, system: &System) -> Vec<(&'static str, IoModel)> {
    let mut runs = Vec::new();
    if !args.no_no_interference {
        runs.push(("NoInterference", IoModel::NoInterference(NoInterference::new())));
    }
    if !args.no_simple {
        runs.push(("Simple", IoModel::Simple(SimpleInterference::new())));
    }
    if !args.no_blocking_fcfs {
        runs.push((
            "BlockingFCFS",
            IoModel::OrderedBlockingFcfs(OrderedIoBlockingFcfs::new()),
        ));
    }
    if !args.no_fcfs {
        runs.push(("FCFS", IoModel::OrderedFcfs(OrderedIoFcfs::new())));
    }
    if !args.no_coop {
        runs.push((
            "Coop",
            IoModel::OrderedCoop(OrderedIoCoop::new(system.mtbf_ind())),
        ));
    }
    runs
}
