// pendulumctl
// Train tabular Q-learning policies for the pendulum family and replay them

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pendulum_rl_core::{ControlSet, LqrFallback, Task};

mod commands;

#[derive(Parser)]
#[command(name = "pendulumctl")]
#[command(about = "Pendulum Q-learning control CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List plant tasks and control sets
    Tasks,

    /// Run a Q-learning session
    Train(TrainArgs),

    /// Replay a stored policy snapshot
    Replay(ReplayArgs),

    /// Show snapshot metadata and table summaries
    Inspect {
        /// Snapshot file
        snapshot: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args, Debug, Default)]
struct TrainArgs {
    /// TOML training configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory snapshots are written to
    #[arg(long, default_value = "snapshots")]
    out_dir: PathBuf,

    /// Run label
    #[arg(long)]
    label: Option<String>,

    /// Plant task
    #[arg(short, long)]
    task: Option<Task>,

    /// Control set
    #[arg(long)]
    controls: Option<ControlSet>,

    /// Maximum control magnitude
    #[arg(long)]
    u_max: Option<f64>,

    /// Initial exploration rate
    #[arg(long)]
    epsilon: Option<f64>,

    /// Exploration decay per step
    #[arg(long)]
    epsilon_decay: Option<f64>,

    /// Learning rate
    #[arg(long)]
    alpha: Option<f64>,

    /// Discount factor
    #[arg(long)]
    gamma: Option<f64>,

    /// Integration step
    #[arg(long)]
    dt: Option<f64>,

    /// Episode budget
    #[arg(long)]
    episodes: Option<usize>,

    /// Step budget per episode
    #[arg(long)]
    steps: Option<usize>,

    /// Snapshot every this many episodes
    #[arg(long)]
    snapshot_interval: Option<usize>,

    /// RNG seed
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(clap::Args, Debug, Default)]
struct ReplayArgs {
    /// Snapshot file
    snapshot: PathBuf,

    /// TOML simulation configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Wrap the table policy with a per-step LQR
    #[arg(long)]
    lqr: bool,

    /// Initial angle in degrees
    #[arg(long, allow_negative_numbers = true)]
    theta0: Option<f64>,

    /// Initial angular velocity
    #[arg(long, allow_negative_numbers = true)]
    omega0: Option<f64>,

    /// Integration step
    #[arg(long)]
    dt: Option<f64>,

    /// Seconds to sleep between steps
    #[arg(long)]
    delay: Option<f64>,

    /// Step budget
    #[arg(long)]
    steps: Option<usize>,

    /// Keep the whole cell trace
    #[arg(long)]
    trace: bool,

    /// What to do when the LQR gain cannot be computed
    #[arg(long, value_enum)]
    fallback: Option<FallbackArg>,

    /// RNG seed for stochastic plants
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FallbackArg {
    TablePolicy,
    Halt,
}

impl From<FallbackArg> for LqrFallback {
    fn from(arg: FallbackArg) -> Self {
        match arg {
            FallbackArg::TablePolicy => Self::TablePolicy,
            FallbackArg::Halt => Self::Halt,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tasks => commands::list_tasks(),
        Commands::Train(args) => commands::train(args).await?,
        Commands::Replay(args) => commands::replay(args).await?,
        Commands::Inspect { snapshot, json } => commands::inspect(&snapshot, json)?,
    }

    Ok(())
}
