// Command implementations for pendulumctl

use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{info, warn};

use pendulum_rl_agent::{QLearner, RunStatus, TrainingEvent};
use pendulum_rl_core::{ControlSet, PolicySnapshot, SimulationConfig, SnapshotStore, Task, TrainingConfig};
use pendulum_rl_env::{PendulumEnv, ReplayObservation, Replayer};

use crate::{ReplayArgs, TrainArgs};

pub fn list_tasks() {
    println!("Tasks:");
    for task in Task::ALL {
        let marker = if task.is_swing() { " (swing)" } else { "" };
        println!("  {:<20} {}{}", task.key(), task.description(), marker);
    }

    println!("\nControl sets:");
    for set in ControlSet::ALL {
        let levels: Vec<String> = set.levels().iter().map(|level| format!("{level}")).collect();
        println!("  {:<20} {} levels: [{}]", set.key(), set.len(), levels.join(", "));
    }
}

/// File configuration (or defaults) with command-line overrides applied
fn training_config(args: &TrainArgs) -> Result<TrainingConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read training config {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("Invalid training config {}", path.display()))?
        }
        None => TrainingConfig::default(),
    };

    if let Some(label) = &args.label {
        config.label.clone_from(label);
    }
    if let Some(task) = args.task {
        config.task = task;
    }
    if let Some(controls) = args.controls {
        config.control_set = controls;
    }
    if let Some(u_max) = args.u_max {
        config.u_max = u_max;
    }
    if let Some(epsilon) = args.epsilon {
        config.epsilon = epsilon;
    }
    if let Some(decay) = args.epsilon_decay {
        config.epsilon_decay = decay;
    }
    if let Some(alpha) = args.alpha {
        config.alpha = alpha;
    }
    if let Some(gamma) = args.gamma {
        config.gamma = gamma;
    }
    if let Some(dt) = args.dt {
        config.dt = dt;
    }
    if let Some(episodes) = args.episodes {
        config.max_episodes = episodes;
    }
    if let Some(steps) = args.steps {
        config.max_steps = steps;
    }
    if let Some(interval) = args.snapshot_interval {
        config.snapshot_interval = interval;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    config.validate()?;
    Ok(config)
}

fn simulation_config(args: &ReplayArgs) -> Result<SimulationConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read simulation config {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("Invalid simulation config {}", path.display()))?
        }
        None => SimulationConfig::default(),
    };

    config.use_lqr |= args.lqr;
    config.persistent_trace |= args.trace;
    if let Some(theta0) = args.theta0 {
        config.initial_angle_deg = theta0;
    }
    if let Some(omega0) = args.omega0 {
        config.initial_omega = omega0;
    }
    if let Some(dt) = args.dt {
        config.dt = dt;
    }
    if let Some(delay) = args.delay {
        config.step_delay = delay;
    }
    if let Some(steps) = args.steps {
        config.max_steps = steps;
    }
    if let Some(fallback) = args.fallback {
        config.lqr_fallback = fallback.into();
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    config.validate()?;
    Ok(config)
}

pub async fn train(args: TrainArgs) -> Result<()> {
    let config = training_config(&args)?;
    let store = SnapshotStore::new(&args.out_dir);
    let snapshot_path = store.path_for(&config.label);

    let env = PendulumEnv::from_config(&config)?;
    let mut learner = QLearner::new(config, env)?;
    let stop = learner.stop_signal();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let worker = tokio::task::spawn_blocking(move || {
        let mut observer = (store, tx);
        learner.run(&mut observer)
    });

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(TrainingEvent::Episode(stats)) => info!(
                    episode = stats.episode,
                    steps = stats.steps,
                    goal = stats.reached_goal,
                    reward = stats.total_reward,
                    epsilon = stats.epsilon,
                    v_delta = ?stats.v_delta,
                    q_delta = ?stats.q_delta,
                    "Episode finished"
                ),
                Some(TrainingEvent::Snapshot(snapshot)) => info!(
                    episode = snapshot.episode,
                    path = %snapshot_path.display(),
                    "Snapshot saved"
                ),
                None => break,
            },
            signal = tokio::signal::ctrl_c(), if !stop.is_stop_requested() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Stop requested, finishing the current episode");
                stop.request_stop();
            }
        }
    }

    let outcome = worker.await.context("Training worker panicked")??;
    let verb = match outcome.status {
        RunStatus::Completed => "Completed",
        _ => "Stopped",
    };
    println!(
        "{} after {} episodes ({} steps), last snapshot at episode {}: {}",
        verb,
        outcome.episodes,
        outcome.total_steps,
        outcome.snapshot.episode,
        snapshot_path.display()
    );
    Ok(())
}

fn log_observation(observation: &ReplayObservation) {
    info!(
        step = observation.step,
        time = observation.time,
        angle_deg = observation.angle_deg,
        omega = observation.omega,
        control = observation.control,
        cell = ?observation.cell,
        source = ?observation.source,
        paused = observation.paused,
        "Replay"
    );
}

pub async fn replay(args: ReplayArgs) -> Result<()> {
    let config = simulation_config(&args)?;
    let mut replayer = Replayer::from_path(&args.snapshot, &config)
        .with_context(|| format!("Cannot replay {}", args.snapshot.display()))?;

    let control = replayer.control();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stop requested");
            control.request_stop();
        }
    });

    let result = replayer.play(log_observation).await;
    interrupt.abort();
    let summary = result?;

    println!(
        "{:?} after {} steps ({:.2} s): angle {:.2} deg, omega {:.4}",
        summary.status, summary.steps, summary.time, summary.angle_deg, summary.omega
    );
    Ok(())
}

/// Number of cells choosing each control level
fn policy_histogram(snapshot: &PolicySnapshot) -> Vec<(f64, usize)> {
    snapshot
        .controls
        .iter()
        .map(|&u| (u, snapshot.policy.iter().filter(|&&p| p == u).count()))
        .collect()
}

pub fn inspect(path: &Path, as_json: bool) -> Result<()> {
    let snapshot = SnapshotStore::load_path(path).with_context(|| format!("Cannot inspect {}", path.display()))?;
    let (v_min, v_max) = snapshot.value_range();
    let histogram = policy_histogram(&snapshot);

    if as_json {
        let summary = json!({
            "label": snapshot.label,
            "run_id": snapshot.run_id,
            "created_at": snapshot.created_at,
            "episode": snapshot.episode,
            "task": snapshot.task,
            "control_set": snapshot.control_set,
            "u_max": snapshot.u_max,
            "dt": snapshot.dt,
            "max_steps": snapshot.max_steps,
            "grid": [snapshot.grid.n_theta(), snapshot.grid.n_omega()],
            "value_range": [v_min, v_max],
            "policy_histogram": histogram,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Snapshot: {}\n", path.display());
    println!("   Label: {}", snapshot.label);
    println!("   Run: {}", snapshot.run_id);
    println!("   Created: {}", snapshot.created_at);
    println!("   Episode: {}", snapshot.episode);
    println!("   Task: {} ({})", snapshot.task, snapshot.task.description());
    println!("   Controls: {} x {}", snapshot.control_set, snapshot.u_max);
    println!("   dt: {} s, {} steps per episode", snapshot.dt, snapshot.max_steps);
    println!(
        "   Grid: {} x {} ({} cells)",
        snapshot.grid.n_theta(),
        snapshot.grid.n_omega(),
        snapshot.grid.len()
    );
    println!("   Value range: [{v_min:.4}, {v_max:.4}]");
    println!("   Policy:");
    for (u, count) in histogram {
        println!("      u = {u:>7.3}: {count} cells");
    }
    Ok(())
}
