// cli/src/rollout.rs
#![forbid(unsafe_code)]

use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use nestris_engine::engine::{MIRROR_COLS, TetrisEnv};

/// Fixed internal cadence for progress-bar live message updates.
const LIVE_EVERY: u64 = 200;

#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Total placements to execute across episodes.
    pub steps: u64,
    /// Base seed; each episode uses base_seed + episode_id.
    pub base_seed: u64,
    /// Draw a fresh random configuration on every reset.
    pub random_reset: bool,

    /// 0 = final summary only, 1 = progress bar, 2 = bar + periodic rows.
    pub verbosity: u8,
    /// Print a report row every N steps (verbosity 2 only).
    pub report_every: u64,
}

#[derive(Clone, Debug, Default)]
pub struct RolloutStats {
    pub steps_done: u64,
    pub episodes_finished: u64,
    pub ep_len: u64,
    pub episode_len_sum: u64,
    pub episode_len_max: u64,
    pub total_reward: f64,
    pub total_raw_reward: f64,
    pub total_lines: u64,
    pub total_score: u64,
    pub invalid_steps: u64,
}

impl RolloutStats {
    pub fn avg_ep_len(&self) -> f64 {
        if self.episodes_finished == 0 {
            self.ep_len as f64
        } else {
            self.episode_len_sum as f64 / self.episodes_finished as f64
        }
    }
}

#[derive(Debug)]
pub struct FinalReport {
    pub steps_done: u64,
    pub episodes_finished: u64,
    pub avg_ep_len: f64,
    pub max_ep_len: u64,
    pub total_lines: u64,
    pub total_score: u64,
    pub total_reward: f64,
    pub elapsed_s: f64,
    pub steps_per_s: f64,
}

/// All placements currently accepted by the move map, in policy coordinates
/// (mirrored back when the NORO mirror is active).
pub fn legal_placements(env: &TetrisEnv) -> Vec<(i32, i32, i32)> {
    let mut out = Vec::new();
    if let Some(t) = env.rot() {
        let map = t.move_map();
        for (r, plane) in map.iter().enumerate() {
            for (x, row) in plane.iter().enumerate() {
                for (y, &tag) in row.iter().enumerate() {
                    if tag != 0 {
                        out.push((r as i32, x as i32, y as i32));
                    }
                }
            }
        }
    } else if let Some(t) = env.noro() {
        let mirror = env.is_mirror();
        let map = t.move_map();
        for x in 0..20 {
            for y in 0..10 {
                if map.cell(x, y) {
                    let y = y as i32;
                    let y = if mirror {
                        MIRROR_COLS[t.now_piece().idx()] - y
                    } else {
                        y
                    };
                    out.push((0, x as i32, y));
                }
            }
        }
    }
    out
}

pub struct Runner {
    cfg: RunnerConfig,
}

impl Runner {
    pub fn new(cfg: RunnerConfig) -> Self {
        Runner { cfg }
    }

    pub fn run(&mut self, env: &mut TetrisEnv) -> anyhow::Result<FinalReport> {
        let cfg = self.cfg.clone();
        let t0 = Instant::now();
        let mut pick_rng = StdRng::seed_from_u64(cfg.base_seed.wrapping_add(999));

        let pb = (cfg.verbosity >= 1).then(|| {
            let pb = ProgressBar::new(cfg.steps);
            pb.set_style(
                ProgressStyle::with_template(
                    "{bar:40.cyan/blue} {pos:>9}/{len:<9}  {percent:>3}%  {elapsed_precise}  {msg}",
                )
                .unwrap()
                .progress_chars("=>-"),
            );
            pb
        });

        let mut stats = RolloutStats::default();

        while stats.steps_done < cfg.steps {
            if env.is_over() {
                stats.episodes_finished += 1;
                stats.episode_len_sum += stats.ep_len;
                stats.episode_len_max = stats.episode_len_max.max(stats.ep_len);
                stats.ep_len = 0;
                if cfg.random_reset {
                    env.reset_random(nestris_engine::Board::ONES)?;
                } else if env.is_noro() {
                    env.reset_noro(Default::default());
                } else {
                    env.reset_rot(Default::default())?;
                }
                continue;
            }

            let legal = legal_placements(env);
            if legal.is_empty() {
                // Top-out surfaced through the move map.
                continue;
            }
            let (r, x, y) = legal[pick_rng.gen_range(0..legal.len())];
            let reward = env.input_placement(r, x, y)?;

            stats.steps_done += 1;
            stats.ep_len += 1;
            stats.total_reward += reward.reward;
            stats.total_raw_reward += reward.raw_reward;
            if reward.reward == -0.3 && reward.raw_reward == 0.0 {
                stats.invalid_steps += 1;
            }

            if let Some(ref pb) = pb {
                pb.inc(1);
                if stats.steps_done % LIVE_EVERY == 0 {
                    pb.set_message(format!(
                        "ep={} lines={} reward={:.3}",
                        stats.episodes_finished,
                        env.run_lines(),
                        stats.total_reward,
                    ));
                }
            }
            if cfg.verbosity >= 2
                && cfg.report_every > 0
                && stats.steps_done % cfg.report_every == 0
            {
                info!(
                    step = stats.steps_done,
                    episodes = stats.episodes_finished,
                    avg_ep_len = stats.avg_ep_len(),
                    lines = stats.total_lines + env.run_lines() as u64,
                    reward = stats.total_reward,
                    "rollout progress"
                );
            }

            if env.is_over() {
                stats.total_lines += env.run_lines() as u64;
                stats.total_score += env.run_score() as u64;
            }
        }

        if let Some(pb) = pb {
            pb.finish_with_message("done");
        }

        let elapsed = t0.elapsed().as_secs_f64();
        Ok(FinalReport {
            steps_done: stats.steps_done,
            episodes_finished: stats.episodes_finished,
            avg_ep_len: stats.avg_ep_len(),
            max_ep_len: stats.episode_len_max,
            total_lines: stats.total_lines + env.run_lines() as u64,
            total_score: stats.total_score + env.run_score() as u64,
            total_reward: stats.total_reward,
            elapsed_s: elapsed,
            steps_per_s: if elapsed > 0.0 {
                stats.steps_done as f64 / elapsed
            } else {
                0.0
            },
        })
    }
}
