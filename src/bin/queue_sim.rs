//! Command line driver for the multi-queue service model.  A single run is
//! configured through flags; predefined parameter sweeps replay a series of
//! runs into one CSV per sweep.  Results are printed on stdout and
//! optionally appended, one row per monitor snapshot, to a CSV file shared
//! across runs.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use log::{info, warn};

use desim::input_modeling::rng;
use desim::models::queues::{Discipline, Queues, QueuesConfig};
use desim::simulator::Simulation;

const CSV_COLUMNS: [&str; 9] = [
    "lambd",
    "mu",
    "max_t",
    "n",
    "d",
    "w",
    "queue_size",
    "quantum",
    "weibull_shape",
];

#[derive(Parser, Debug)]
#[command(name = "queue-sim", version, about = "Multi-queue service simulation")]
struct Args {
    /// Arrival rate, per server
    #[arg(long, default_value_t = 0.7)]
    lambd: f64,

    /// Service rate
    #[arg(long, default_value_t = 1.0)]
    mu: f64,

    /// Maximum time to run the simulation
    #[arg(long, default_value_t = 10_000.0)]
    max_t: f64,

    /// Number of servers
    #[arg(long, default_value_t = 1)]
    n: usize,

    /// Number of queues to sample on arrival
    #[arg(long, default_value_t = 1)]
    d: usize,

    /// Use Round-Robin scheduling instead of FIFO
    #[arg(long)]
    use_rr: bool,

    /// Quantum of time for Round-Robin
    #[arg(long, default_value_t = 1.0)]
    quantum: f64,

    /// Interval between queue size snapshots
    #[arg(long, default_value_t = 10.0)]
    monitor_interval: f64,

    /// Shape parameter for Weibull interarrival and service times; omit for
    /// exponential
    #[arg(long)]
    shape: Option<f64>,

    /// CSV file in which to append results
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Random seed for repeatable runs
    #[arg(long)]
    seed: Option<u64>,

    /// Log simulation progress on stderr
    #[arg(long)]
    verbose: bool,

    /// Name of a predefined parameter sweep to run
    #[arg(long, value_name = "NAME")]
    param_list: Option<String>,

    /// Run every predefined parameter sweep
    #[arg(long)]
    run_all: bool,

    /// Directory for the per-sweep CSV files
    #[arg(long, default_value = "data")]
    sweep_dir: PathBuf,
}

/// One fully-specified run, as used by the predefined sweeps.
#[derive(Debug, Clone)]
struct Settings {
    lambd: f64,
    mu: f64,
    max_t: f64,
    n: usize,
    d: usize,
    use_rr: bool,
    quantum: f64,
    monitor_interval: f64,
    shape: Option<f64>,
}

impl Settings {
    fn new(lambd: f64, n: usize, d: usize, use_rr: bool, shape: Option<f64>) -> Self {
        Self {
            lambd,
            mu: 1.0,
            max_t: 100_000.0,
            n,
            d,
            use_rr,
            quantum: 1.0,
            monitor_interval: 10.0,
            shape,
        }
    }

    fn from_args(args: &Args) -> Self {
        Self {
            lambd: args.lambd,
            mu: args.mu,
            max_t: args.max_t,
            n: args.n,
            d: args.d,
            use_rr: args.use_rr,
            quantum: args.quantum,
            monitor_interval: args.monitor_interval,
            shape: args.shape,
        }
    }
}

/// The predefined sweeps: one CSV per sweep, one series of runs each.
fn sweeps() -> Vec<(&'static str, Vec<Settings>)> {
    vec![
        (
            "lambd",
            [0.5, 0.7, 0.9, 0.95, 0.99]
                .iter()
                .map(|&lambd| Settings::new(lambd, 100, 5, false, None))
                .collect(),
        ),
        (
            "lambd_rr",
            [0.5, 0.7, 0.9, 0.95, 0.99]
                .iter()
                .map(|&lambd| Settings::new(lambd, 100, 5, true, None))
                .collect(),
        ),
        (
            "d",
            [1, 2, 5, 10]
                .iter()
                .map(|&d| Settings::new(0.7, 100, d, false, None))
                .collect(),
        ),
        (
            "d_rr",
            [1, 2, 5, 10]
                .iter()
                .map(|&d| Settings::new(0.7, 100, d, true, None))
                .collect(),
        ),
        (
            "n",
            [30, 50, 100, 150]
                .iter()
                .map(|&n| Settings::new(0.7, n, 5, false, None))
                .collect(),
        ),
        (
            "n_rr",
            [(30, 1), (50, 2), (100, 5), (150, 10)]
                .iter()
                .map(|&(n, d)| Settings::new(0.7, n, d, true, None))
                .collect(),
        ),
        (
            "shape",
            [0.5, 1.0, 2.0, 3.0]
                .iter()
                .map(|&shape| Settings::new(0.7, 100, 5, false, Some(shape)))
                .collect(),
        ),
        (
            "shape_rr",
            [(1, 0.5), (2, 1.0), (5, 2.0), (10, 3.0)]
                .iter()
                .map(|&(d, shape)| Settings::new(0.7, 100, d, true, Some(shape)))
                .collect(),
        ),
    ]
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Some(name) = &args.param_list {
        let (_, runs) = sweeps()
            .into_iter()
            .find(|(sweep, _)| *sweep == name.as_str())
            .with_context(|| format!("unknown parameter sweep `{}`", name))?;
        info!("running parameter sweep `{}`", name);
        run_sweep(name, &runs, &args)?;
    } else if args.run_all {
        info!("running every predefined parameter sweep");
        for (name, runs) in sweeps() {
            run_sweep(name, &runs, &args)?;
        }
    } else {
        run_simulation(&Settings::from_args(&args), args.seed, args.csv.as_deref())?;
    }
    Ok(())
}

fn run_sweep(name: &str, runs: &[Settings], args: &Args) -> anyhow::Result<()> {
    fs::create_dir_all(&args.sweep_dir)
        .with_context(|| format!("creating {}", args.sweep_dir.display()))?;
    let csv = args.sweep_dir.join(format!("{}.csv", name));
    for settings in runs {
        run_simulation(settings, args.seed, Some(&csv))?;
    }
    Ok(())
}

fn run_simulation(
    settings: &Settings,
    seed: Option<u64>,
    csv: Option<&Path>,
) -> anyhow::Result<()> {
    anyhow::ensure!(settings.max_t > 0.0, "max-t must be positive");
    if settings.lambd >= settings.mu {
        warn!("the system is unstable: lambda >= mu");
    }

    let config = QueuesConfig {
        lambd: settings.lambd,
        mu: settings.mu,
        n: settings.n,
        d: settings.d,
        discipline: if settings.use_rr {
            Discipline::RoundRobin {
                quantum: settings.quantum,
            }
        } else {
            Discipline::Fifo
        },
        monitor_interval: settings.monitor_interval,
        shape: settings.shape,
    };
    let mut sim = Queues::new(config, rng::seeded(seed))?;
    sim.run(settings.max_t)?;

    let w = sim.mean_time_in_system();
    println!("Average time spent in the system: {}", w);
    if settings.lambd < settings.mu {
        // expectation for an M/M/1 queue with random placement
        println!(
            "Theoretical expectation for random server choice: {}",
            1.0 / (settings.mu - settings.lambd)
        );
    }

    if let Some(path) = csv {
        append_results(path, settings, w, sim.queue_log())
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

/// Append one row per monitor snapshot, writing the header only when the
/// file is empty.  The snapshot vector is serialized as a list literal.
fn append_results(
    path: &Path,
    settings: &Settings,
    w: f64,
    snapshots: &[Vec<usize>],
) -> anyhow::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let write_header = file.metadata()?.len() == 0;
    let mut writer = csv::Writer::from_writer(file);
    if write_header {
        writer.write_record(CSV_COLUMNS)?;
    }
    let shape_field = match settings.shape {
        Some(shape) => shape.to_string(),
        None => String::from("None"),
    };
    for snapshot in snapshots {
        writer.write_record([
            settings.lambd.to_string(),
            settings.mu.to_string(),
            settings.max_t.to_string(),
            settings.n.to_string(),
            settings.d.to_string(),
            w.to_string(),
            serde_json::to_string(snapshot)?,
            settings.quantum.to_string(),
            shape_field.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
