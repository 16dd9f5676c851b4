// cli/src/main.rs
#![forbid(unsafe_code)]

mod rollout;

use anyhow::{Context, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use nestris_engine::engine::{
    NoroResetConfig, RotResetConfig, TetrisEnv, tap_table_by_name,
};

use crate::rollout::{Runner, RunnerConfig};

#[derive(Parser, Debug)]
#[command(name = "nestris-cli", about = "Random-policy rollouts through the engine")]
struct Args {
    /// Total placements to execute across episodes.
    #[arg(long, default_value_t = 2000)]
    steps: u64,

    /// RNG seed for the environment and the action picker.
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Rule-set: rot | noro
    #[arg(long, default_value = "rot")]
    mode: String,

    /// Tap cadence: 30hz | 24hz | 20hz | 15hz | 12hz | 10hz | slow5
    #[arg(long, default_value = "30hz")]
    taps: String,

    /// Adjustment delay in frames (0 disables pre-adjustment, 61 disables
    /// adjustment entirely).
    #[arg(long, default_value_t = 18)]
    adj_delay: i32,

    /// Reward aggression level (0..=2).
    #[arg(long, default_value_t = 0)]
    aggression: u8,

    /// NORO start level.
    #[arg(long, default_value_t = 18)]
    start_level: i32,

    /// Disable tucking (NORO).
    #[arg(long, default_value_t = false)]
    no_tuck: bool,

    /// Use a fresh random configuration on every reset.
    #[arg(long, default_value_t = false)]
    random_reset: bool,

    /// 0 = summary only, 1 = progress bar, 2 = bar + periodic rows.
    #[arg(long, default_value_t = 1)]
    verbosity: u8,

    /// Report row cadence in steps (verbosity 2 only).
    #[arg(long, default_value_t = 500)]
    report_every: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let mut env = TetrisEnv::new(args.seed);
    match args.mode.as_str() {
        "rot" => {
            let taps = tap_table_by_name(&args.taps)
                .with_context(|| format!("unknown tap table {:?}", args.taps))?;
            env.reset_rot(RotResetConfig {
                tap_sequence: taps,
                adj_delay: args.adj_delay,
                aggression: args.aggression,
                ..RotResetConfig::default()
            })?;
        }
        "noro" => {
            env.reset_noro(NoroResetConfig {
                start_level: args.start_level,
                do_tuck: !args.no_tuck,
                ..NoroResetConfig::default()
            });
        }
        other => bail!("unknown mode {other:?} (expected rot or noro)"),
    }

    let cfg = RunnerConfig {
        steps: args.steps,
        base_seed: args.seed,
        random_reset: args.random_reset,
        verbosity: args.verbosity,
        report_every: args.report_every,
    };
    let report = Runner::new(cfg).run(&mut env)?;

    // Final one-line summary (useful for logs / grep).
    println!(
        "DONE: mode={} steps_done={} elapsed={:.3}s steps/s={:.1} episodes_finished={} avg_ep_len={:.2} max_ep_len={} total_lines={} total_score={} total_reward={:.4}",
        args.mode,
        report.steps_done,
        report.elapsed_s,
        report.steps_per_s,
        report.episodes_finished,
        report.avg_ep_len,
        report.max_ep_len,
        report.total_lines,
        report.total_score,
        report.total_reward,
    );
    Ok(())
}
