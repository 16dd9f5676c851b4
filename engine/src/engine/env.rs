// engine/src/engine/env.rs
#![forbid(unsafe_code)]

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::engine::board::Board;
use crate::engine::error::GameError;
use crate::engine::frames::FrameSequence;
use crate::engine::game::Tetris;
use crate::engine::game_noro::TetrisNoro;
use crate::engine::level::{DEFAULT_LINE_CAP, Level, score_from_level};
use crate::engine::piece_rng::{self, PieceRngKind};
use crate::engine::pieces::{MIRROR_COLS, Piece};
use crate::engine::position::Position;
use crate::engine::reward::{
    OVER_PROB, PHASE_LINES, PHASE_PENALTY, TETRIS_ONLY_I_ADD, TETRIS_ONLY_I_THRESH, adj_mode_of,
    noro_line_reward_exp, tap_mode_of,
};
use crate::engine::state::{State, build_noro_state, build_rot_state, state_shapes, state_types};
use crate::engine::taps::{TAP_30_HZ, TapTable};

const INVALID_REWARD: f64 = -0.3;

// ROT shaping constants.
const REWARD_MULTIPLIER: f64 = 1e-5; // 10 per maxout
const TETRIS_ONLY_REWARD_MULTIPLIER: f64 = 2e-5; // 20 per maxout
const BOTTOM_MULTIPLIER: f64 = 1.1;
const GAME_OVER_MULTIPLIER: f64 = 1.0 / 16.0;
const GAME_OVER_REWARD: f64 = -1.0;

// NORO shaping constants.
const NORO_RAW_MULTIPLIER: f64 = 0.2;
const NORO_STEP_REWARD: f64 = 2e-3;

/// Per-step reward record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reward {
    /// Shaped reward the learner sees.
    pub reward: f64,
    /// Unshaped score-derived reward.
    pub raw_reward: f64,
    /// Survival probability applied to this step's burned lines (1 when no
    /// burn model applies).
    pub live_prob: f64,
    /// Additive game-over component of the shaped reward.
    pub over_reward: f64,
}

impl Reward {
    fn zero() -> Reward {
        Reward {
            reward: 0.0,
            raw_reward: 0.0,
            live_prob: 1.0,
            over_reward: 0.0,
        }
    }

    fn invalid() -> Reward {
        Reward {
            reward: INVALID_REWARD,
            raw_reward: 0.0,
            live_prob: 1.0,
            over_reward: 0.0,
        }
    }

    fn combine(self, other: Reward) -> Reward {
        Reward {
            reward: self.reward + other.reward,
            raw_reward: self.raw_reward + other.raw_reward,
            live_prob: self.live_prob * other.live_prob,
            over_reward: self.over_reward + other.over_reward,
        }
    }
}

/// ROT reset parameters. Line cap and the tetris-only rule travel with the
/// reset so one process can host both training tracks.
#[derive(Clone, Debug)]
pub struct RotResetConfig {
    pub board: Board,
    pub lines: i32,
    pub now_piece: Option<Piece>,
    pub next_piece: Option<Piece>,
    pub tap_sequence: TapTable,
    pub adj_delay: i32,
    pub aggression: u8,
    pub burn_over_multiplier: f64,
    pub skip_unique_initial: bool,
    pub line_cap: i32,
    pub tetris_only: bool,
}

impl Default for RotResetConfig {
    fn default() -> Self {
        RotResetConfig {
            board: Board::ONES,
            lines: 0,
            now_piece: None,
            next_piece: None,
            tap_sequence: TAP_30_HZ,
            adj_delay: 18,
            aggression: 0,
            burn_over_multiplier: 0.0,
            skip_unique_initial: false,
            line_cap: DEFAULT_LINE_CAP,
            tetris_only: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NoroResetConfig {
    pub board: Board,
    pub lines: i32,
    pub start_level: i32,
    pub do_tuck: bool,
    pub nnb: bool,
    pub mirror: bool,
    pub now_piece: Option<Piece>,
    pub next_piece: Option<Piece>,
}

impl Default for NoroResetConfig {
    fn default() -> Self {
        NoroResetConfig {
            board: Board::ONES,
            lines: 0,
            start_level: 0,
            do_tuck: true,
            nnb: false,
            mirror: false,
            now_piece: None,
            next_piece: None,
        }
    }
}

enum Ruleset {
    Rot(Tetris),
    Noro(TetrisNoro),
}

/**
 * The training environment: one rule-set engine plus the piece stream and
 * the reward shaper. Strictly single-threaded; run one instance per thread
 * and share nothing but the search-table cache.
 */
pub struct TetrisEnv {
    rng: StdRng,
    rng_kind: PieceRngKind,
    piece_count: usize,
    /// Lookahead piece fed to the engine on the next step.
    next_piece: Piece,

    // ROT shaping state.
    step_reward: f64,
    aggression: u8,
    burn_over_multiplier: f64,
    skip_unique_initial: bool,

    // NORO presentation flags.
    nnb: bool,
    is_mirror: bool,

    ruleset: Ruleset,
}

impl TetrisEnv {
    pub fn new(seed: u64) -> Self {
        let mut env = TetrisEnv {
            rng: StdRng::seed_from_u64(seed),
            rng_kind: PieceRngKind::default(),
            piece_count: 0,
            next_piece: Piece::T,
            step_reward: 0.0,
            aggression: 0,
            burn_over_multiplier: 0.0,
            skip_unique_initial: false,
            nnb: false,
            is_mirror: false,
            ruleset: Ruleset::Rot(Tetris::new()),
        };
        env.reset_rot(RotResetConfig::default())
            .expect("default reset is valid");
        env
    }

    pub fn set_piece_rng_kind(&mut self, kind: PieceRngKind) {
        self.rng_kind = kind;
    }

    // -------------------------------------------------------------------
    // Piece stream
    // -------------------------------------------------------------------

    fn gen_next_piece(&mut self, prev: Piece) -> Piece {
        if let Ruleset::Rot(t) = &self.ruleset
            && t.tetris_only()
        {
            // Feed extra I pieces once a run has gone long without a tetris.
            let bucket = t.level_speed().idx();
            let threshold = TETRIS_ONLY_I_THRESH[bucket];
            let add = TETRIS_ONLY_I_ADD[bucket];
            if t.run_lines() >= threshold {
                let over = (t.run_lines() - threshold) as f64 / (threshold as f64 * 0.5);
                let prob = add * 0.3 + add * 0.7 * over.min(1.0);
                if self.rng.r#gen::<f32>() < prob as f32 {
                    return Piece::I;
                }
            }
        }
        self.piece_count = (self.piece_count + 1) & 7;
        piece_rng::gen_next(&mut self.rng, self.rng_kind, self.piece_count, prev)
    }

    fn pick_pieces(&mut self, now: Option<Piece>, next: Option<Piece>) -> (Piece, Piece) {
        match (now, next) {
            (Some(a), Some(b)) => (a, b),
            (now, _) => {
                self.piece_count = self.rng.gen_range(0..=8) & 7;
                let a = now
                    .unwrap_or_else(|| Piece::from_idx(self.rng.gen_range(0..7)).unwrap());
                let b = self.gen_next_piece(a);
                (a, b)
            }
        }
    }

    // -------------------------------------------------------------------
    // Resets
    // -------------------------------------------------------------------

    pub fn reset_rot(&mut self, cfg: RotResetConfig) -> Result<(), GameError> {
        let (now, next) = self.pick_pieces(cfg.now_piece, cfg.next_piece);
        if !matches!(self.ruleset, Ruleset::Rot(_)) {
            self.ruleset = Ruleset::Rot(Tetris::new());
        }
        let Ruleset::Rot(t) = &mut self.ruleset else {
            unreachable!()
        };
        t.set_line_cap(cfg.line_cap);
        t.set_tetris_only(cfg.tetris_only);
        t.reset(
            cfg.board,
            cfg.lines,
            now,
            next,
            &cfg.tap_sequence,
            cfg.adj_delay,
        )?;
        self.skip_unique_initial = cfg.skip_unique_initial;
        self.burn_over_multiplier = cfg.burn_over_multiplier;
        if cfg.tetris_only {
            self.aggression = 0;
            self.step_reward = 5e-3;
        } else {
            self.set_aggression(cfg.aggression);
        }
        self.next_piece = self.gen_next_piece(next);
        self.check_reducible_initial();
        Ok(())
    }

    pub fn reset_noro(&mut self, cfg: NoroResetConfig) {
        let (now, next) = self.pick_pieces(cfg.now_piece, cfg.next_piece);
        self.nnb = cfg.nnb;
        self.is_mirror = cfg.mirror;
        if !matches!(self.ruleset, Ruleset::Noro(_)) {
            self.ruleset = Ruleset::Noro(TetrisNoro::new());
        }
        let Ruleset::Noro(t) = &mut self.ruleset else {
            unreachable!()
        };
        t.reset(cfg.board, cfg.lines, cfg.start_level, cfg.do_tuck, now, next);
        self.next_piece = self.gen_next_piece(next);
    }

    /// Seed-driven random configuration for the current rule-set.
    pub fn reset_random(&mut self, board: Board) -> Result<(), GameError> {
        match &self.ruleset {
            Ruleset::Noro(_) => {
                const START_WEIGHTS: [u32; 30] = [
                    15, 1, 1, 1, 2, 2, 2, 2, 4, 6, // 0-9
                    4, 0, 0, 4, 0, 0, 4, 0, 0, // 10-18
                    4, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 19-28
                    8,
                ];
                let start_level =
                    WeightedIndex::new(START_WEIGHTS).unwrap().sample(&mut self.rng) as i32;
                let do_tuck = self.rng.gen_range(0..2) == 1;
                let nnb = if do_tuck {
                    WeightedIndex::new([2u32, 1]).unwrap().sample(&mut self.rng) == 1
                } else {
                    self.rng.gen_range(0..2) == 1
                };
                let mirror = self.rng.gen_range(0..2) == 1;
                self.reset_noro(NoroResetConfig {
                    board,
                    start_level,
                    do_tuck,
                    nnb,
                    mirror,
                    ..NoroResetConfig::default()
                });
                Ok(())
            }
            Ruleset::Rot(t) => {
                let cap = t.line_cap();
                let cfg = RotResetConfig {
                    tap_sequence: *t.tap_sequence(),
                    adj_delay: t.adj_delay(),
                    line_cap: cap,
                    tetris_only: t.tetris_only(),
                    aggression: self.aggression,
                    burn_over_multiplier: self.burn_over_multiplier,
                    ..RotResetConfig::default()
                };
                let mut lines = (board.count() % 4 != 0) as i32;
                lines += self.rng.gen_range(0..=cap / 2 - 1) * 2;
                self.reset_rot(RotResetConfig {
                    board,
                    lines,
                    skip_unique_initial: true,
                    ..cfg
                })
            }
        }
    }

    // -------------------------------------------------------------------
    // Reward shaping
    // -------------------------------------------------------------------

    fn rot_reward(&mut self, pos: Position, score: i32, lines: i32) -> Reward {
        if score == -1 {
            return Reward::invalid();
        }
        let step_reward_level = self.aggression;
        let step_reward = self.step_reward;
        let burn_over_multiplier = self.burn_over_multiplier;
        let skip_unique_initial = self.skip_unique_initial;

        let outcome = {
            let TetrisEnv { rng, ruleset, .. } = self;
            let Ruleset::Rot(t) = ruleset else {
                unreachable!()
            };
            let tetris_only = t.tetris_only();
            let mult = if tetris_only {
                TETRIS_ONLY_REWARD_MULTIPLIER
            } else {
                REWARD_MULTIPLIER
            };
            let reward = score as f64 * mult;
            let mut n_reward = reward;
            let mut n_step_reward = step_reward;
            let mut bottom_multiplier = BOTTOM_MULTIPLIER;
            let mut live_prob = 1.0f64;
            let mut over_reward = 0.0f64;
            let taps = *t.tap_sequence();
            let tap_4 = taps[3];

            if step_reward_level == 0 {
                let now_lines = t.lines();
                let tap_mode = tap_mode_of(&taps);
                let adj_mode = adj_mode_of(t.adj_delay());
                let p = [
                    OVER_PROB[0][tap_mode][adj_mode],
                    OVER_PROB[1][tap_mode][adj_mode],
                    OVER_PROB[2][tap_mode][adj_mode],
                ];
                // Reduce burn reward at settings capable of consistent
                // tetrises.
                if lines != 4
                    && !(t.level_speed() == Level::Level39
                        || (t.level_speed() == Level::Level29 && tap_4 >= 12))
                {
                    n_reward *= 0.1;
                }
                let phase_penalty: [i32; 3] = [
                    ((p[0] - 0.01).max(0.0) * PHASE_PENALTY[0]) as i32,
                    ((p[1] - 0.01).max(0.0) * PHASE_PENALTY[1]) as i32,
                    ((p[2] - 0.01).max(0.0) * PHASE_PENALTY[2]) as i32,
                ];
                let mut penalty: i32 = 0;
                if lines != 0 && lines != 4 {
                    for i in (now_lines - lines)..now_lines {
                        if i <= PHASE_LINES[0] {
                            live_prob *= 1.0 - p[0];
                            penalty += phase_penalty[0];
                        } else if i <= PHASE_LINES[1] {
                            live_prob *= 1.0 - p[1];
                            penalty += phase_penalty[1];
                        } else if i <= PHASE_LINES[2] {
                            live_prob *= 1.0 - p[2];
                            penalty += phase_penalty[2];
                        }
                    }
                    // Random topouts stand in for the burns a real run would
                    // not survive.
                    let adjusted_over_prob = 1.0 - live_prob.powf(burn_over_multiplier);
                    if skip_unique_initial && rng.r#gen::<f32>() < adjusted_over_prob as f32 {
                        debug!(live_prob, "simulated burn topout");
                        t.force_over();
                    }
                }
                if t.is_over() {
                    // Deter intentional topouts: charge the unreached phases.
                    let before = penalty;
                    penalty += phase_penalty[0] * (PHASE_LINES[0] - now_lines.min(PHASE_LINES[0]));
                    penalty += phase_penalty[1]
                        * (PHASE_LINES[1] - now_lines.clamp(PHASE_LINES[0], PHASE_LINES[1]));
                    penalty += phase_penalty[2]
                        * (PHASE_LINES[2] - now_lines.clamp(PHASE_LINES[1], PHASE_LINES[2]));
                    penalty = (penalty as f64 * 1.05) as i32;
                    over_reward = -((penalty - before) as f64) * mult;
                }
                n_reward -= penalty as f64 * mult;
                n_step_reward = 0.0;
            } else {
                let lvl2 = step_reward_level == 2;
                let mut multiplier_18 = 1.0;
                let mut multiplier_19 = 1.0;
                let mut multiplier_29 = 1.0;
                let mut multiplier_39 = 1.0;
                let mut no_scale_29 = false;
                let mut no_scale_39 = false;
                let now_pieces = t.pieces();
                if tap_4 <= 6 {
                    // 30hz
                    multiplier_18 = if lvl2 { 0.2 } else { 0.0 };
                    multiplier_19 = if lvl2 { 0.2 } else { 0.0 };
                    multiplier_29 = if taps[4] <= 10 {
                        if lvl2 { 1.0 } else { 0.2 }
                    } else if lvl2 {
                        1.0
                    } else {
                        0.4
                    };
                    no_scale_39 = lvl2;
                    if now_pieces <= 330 * 10 / 4 {
                        multiplier_39 = if lvl2 { 1.5 } else { 2.5 };
                    }
                } else if tap_4 <= 8 {
                    // 24hz
                    multiplier_18 = if lvl2 { 0.2 } else { 0.0 };
                    multiplier_19 = if lvl2 { 0.2 } else { 0.0 };
                    multiplier_29 = if lvl2 { 1.0 } else { 0.3 };
                    no_scale_39 = lvl2;
                } else if tap_4 <= 10 {
                    // 20hz
                    multiplier_18 = if lvl2 { 0.2 } else { 0.0 };
                    multiplier_19 = if lvl2 { 0.2 } else { 0.0 };
                    multiplier_29 = if lvl2 { 1.0 } else { 0.5 };
                } else if tap_4 <= 12 {
                    // 15hz
                    multiplier_18 = if lvl2 { 0.25 } else { 0.0 };
                    multiplier_19 = if lvl2 { 0.3 } else { 0.0 };
                    no_scale_29 = lvl2;
                    if now_pieces <= 230 * 10 / 4 {
                        multiplier_29 = if lvl2 { 1.5 } else { 2.5 };
                    }
                } else if tap_4 <= 16 {
                    // 12hz
                    multiplier_18 = if lvl2 { 0.35 } else { 0.0 };
                    multiplier_19 = if lvl2 { 0.5 } else { 0.1 };
                    no_scale_29 = lvl2;
                } else {
                    multiplier_18 = if lvl2 { 0.4 } else { 0.0 };
                    multiplier_19 = if lvl2 { 0.7 } else { 0.2 };
                }
                if now_pieces <= 120 * 10 / 4 {
                    n_step_reward *= multiplier_18;
                } else if now_pieces <= 220 * 10 / 4 {
                    n_step_reward *= multiplier_19;
                } else if now_pieces <= 314 * 10 / 4 {
                    n_step_reward *= multiplier_29;
                } else {
                    n_step_reward *= multiplier_39;
                }
                // At the fastest settings score itself scales with level;
                // fall back to the flat single-clear value there.
                if (no_scale_39 && t.level_speed() == Level::Level39)
                    || (no_scale_29
                        && (t.level_speed() == Level::Level29
                            || t.level_speed() == Level::Level39))
                {
                    n_reward = score_from_level(t.level(), 1) as f64 * lines as f64 * mult;
                    bottom_multiplier = 1.0;
                }
                // Bound the step-reward influence on the shaped total.
                n_reward *= (2800.0 * mult) / (2800.0 * mult + n_step_reward);
            }

            if lines == 4 && pos.x >= 18 {
                n_reward *= bottom_multiplier;
            }
            (
                tetris_only,
                t.is_adj(),
                t.level(),
                t.is_over(),
                n_reward,
                n_step_reward,
                reward,
                live_prob,
                over_reward,
            )
        };

        let (
            tetris_only,
            is_adj,
            level,
            is_over,
            mut n_reward,
            n_step_reward,
            reward,
            live_prob,
            mut over_reward,
        ) = outcome;
        if !is_adj {
            let prev = self.next_piece;
            self.next_piece = self.gen_next_piece(prev);
            n_reward += n_step_reward * (level + 1) as f64 / 30.0;
        }
        if tetris_only {
            if lines != 0 && lines != 4 {
                n_reward *= GAME_OVER_MULTIPLIER;
            }
            if is_over {
                n_reward += GAME_OVER_REWARD;
                over_reward += GAME_OVER_REWARD;
            }
        }
        Reward {
            reward: n_reward,
            raw_reward: reward,
            live_prob,
            over_reward,
        }
    }

    fn noro_reward(&mut self, score: i32, lines: i32) -> Reward {
        if score == -1 {
            return Reward::invalid();
        }
        let (n_reward, raw) = {
            let Ruleset::Noro(t) = &self.ruleset else {
                unreachable!()
            };
            let pre_lines = t.lines() - lines;
            let mut n_reward = NORO_STEP_REWARD;
            for i in pre_lines..pre_lines + lines {
                n_reward +=
                    noro_line_reward_exp(i, t.start_level(), t.do_tuck(), self.nnb).exp();
            }
            (n_reward, lines as f64 * NORO_RAW_MULTIPLIER)
        };
        let prev = self.next_piece;
        self.next_piece = self.gen_next_piece(prev);
        Reward {
            reward: n_reward,
            raw_reward: raw,
            live_prob: 1.0,
            over_reward: 0.0,
        }
    }

    /// When the move list offers exactly one non-reduced initial and nothing
    /// else, the policy has no real choice; take the initial automatically
    /// and fold its reward into the step.
    fn check_reducible_initial(&mut self) -> Reward {
        if !self.skip_unique_initial {
            return Reward::zero();
        }
        let pos = {
            let Ruleset::Rot(t) = &self.ruleset else {
                return Reward::zero();
            };
            if t.is_adj() || t.is_over() {
                return Reward::zero();
            }
            let moves = t.possible_moves();
            let mask = t.initial_mask();
            if !moves.non_adj.is_empty() || mask.count_ones() != 1 {
                return Reward::zero();
            }
            moves.adj[mask.trailing_zeros() as usize].0
        };
        let next = self.next_piece;
        let (score, lines) = {
            let Ruleset::Rot(t) = &mut self.ruleset else {
                unreachable!()
            };
            t.input_placement(pos, next)
        };
        self.rot_reward(pos, score, lines)
    }

    // -------------------------------------------------------------------
    // Stepping
    // -------------------------------------------------------------------

    pub fn input_placement(&mut self, r: i32, x: i32, y: i32) -> Result<Reward, GameError> {
        let pos = self.real_position(Position::new(r, x, y));
        if matches!(self.ruleset, Ruleset::Noro(_)) {
            let next = self.next_piece;
            let (score, lines) = {
                let Ruleset::Noro(t) = &mut self.ruleset else {
                    unreachable!()
                };
                t.input_placement(pos, next)?
            };
            return Ok(self.noro_reward(score, lines));
        }
        let next = self.next_piece;
        let (score, lines) = {
            let Ruleset::Rot(t) = &mut self.ruleset else {
                unreachable!()
            };
            t.input_placement(pos, next)
        };
        let reward = self.rot_reward(pos, score, lines);
        if !self.skip_unique_initial {
            return Ok(reward);
        }
        let extra = self.check_reducible_initial();
        Ok(reward.combine(extra))
    }

    /// Apply a final placement immediately, skipping the adjusting phase.
    pub fn direct_placement(&mut self, r: i32, x: i32, y: i32) -> Result<Reward, GameError> {
        let pos = self.real_position(Position::new(r, x, y));
        let next = self.next_piece;
        let (score, lines) = {
            let Ruleset::Rot(t) = &mut self.ruleset else {
                panic!("direct placement is a ROT operation");
            };
            t.direct_placement(pos, next)
        };
        Ok(self.rot_reward(pos, score, lines))
    }

    // -------------------------------------------------------------------
    // Observations
    // -------------------------------------------------------------------

    pub fn get_state(&self, line_reduce: i32) -> State {
        match &self.ruleset {
            Ruleset::Rot(t) => build_rot_state(t, line_reduce, self.aggression),
            Ruleset::Noro(t) => build_noro_state(t, self.nnb, self.is_mirror, line_reduce),
        }
    }

    /// The would-be observation after taking this adjustment initial, for
    /// each of the seven possible next pieces.
    pub fn get_adj_states(&self, r: i32, x: i32, y: i32) -> [State; 7] {
        let Ruleset::Rot(t) = &self.ruleset else {
            panic!("adjustment states are a ROT operation");
        };
        assert!(!t.is_adj(), "should only be called outside the adjusting phase");
        let mut shadow = t.clone();
        shadow.input_placement(Position::new(r, x, y), Piece::T);
        assert!(shadow.is_adj(), "not an adjustment placement");
        std::array::from_fn(|i| {
            shadow.set_next_piece(Piece::from_idx(i).unwrap());
            build_rot_state(&shadow, 0, self.aggression)
        })
    }

    pub fn state_shapes(&self) -> [Vec<usize>; 5] {
        state_shapes(self.is_noro())
    }

    pub fn state_types(&self) -> [&'static str; 5] {
        state_types()
    }

    // -------------------------------------------------------------------
    // Frame sequences
    // -------------------------------------------------------------------

    pub fn get_sequence(&self, r: i32, x: i32, y: i32) -> FrameSequence {
        let pos = self.real_position(Position::new(r, x, y));
        match &self.ruleset {
            Ruleset::Rot(t) => t.sequence(pos),
            Ruleset::Noro(t) => t.sequence(pos),
        }
    }

    pub fn finish_adj_sequence(
        &self,
        seq: &mut FrameSequence,
        intermediate: Position,
        final_pos: Position,
    ) {
        let Ruleset::Rot(t) = &self.ruleset else {
            panic!("adjustment sequences are a ROT operation");
        };
        t.finish_adj_sequence(seq, intermediate, final_pos);
    }

    pub fn get_adj_premove(&self, targets: &[Position; 7]) -> (Position, FrameSequence) {
        let Ruleset::Rot(t) = &self.ruleset else {
            panic!("adjustment premoves are a ROT operation");
        };
        t.adj_premove(targets)
    }

    // -------------------------------------------------------------------
    // Mutators
    // -------------------------------------------------------------------

    pub fn set_next_piece(&mut self, piece: Piece) {
        match &mut self.ruleset {
            Ruleset::Rot(t) => t.set_next_piece(piece),
            Ruleset::Noro(t) => t.set_next_piece(piece),
        }
    }

    pub fn set_lines(&mut self, lines: i32) -> Result<(), GameError> {
        match &mut self.ruleset {
            Ruleset::Rot(t) => t.set_lines(lines),
            Ruleset::Noro(t) => t.set_lines(lines),
        }
    }

    pub fn set_aggression(&mut self, level: u8) {
        assert!(level <= 2, "aggression level is 0..=2");
        let score = match level {
            0 => 0,
            1 => 800,
            _ => 2400,
        };
        self.step_reward = score as f64 * REWARD_MULTIPLIER;
        self.aggression = level;
    }

    pub fn set_burn_over_multiplier(&mut self, mul: f64) {
        self.burn_over_multiplier = mul;
    }

    // -------------------------------------------------------------------
    // Status
    // -------------------------------------------------------------------

    /// Mirror-corrected placement actually applied to the field.
    pub fn real_position(&self, mut pos: Position) -> Position {
        if let Ruleset::Noro(t) = &self.ruleset
            && self.is_mirror
        {
            pos.y = MIRROR_COLS[t.now_piece().idx()] - pos.y;
        }
        pos
    }

    pub fn is_over(&self) -> bool {
        match &self.ruleset {
            Ruleset::Rot(t) => t.is_over(),
            Ruleset::Noro(t) => t.is_over(),
        }
    }

    pub fn board(&self) -> &Board {
        match &self.ruleset {
            Ruleset::Rot(t) => t.board(),
            Ruleset::Noro(t) => t.board(),
        }
    }

    pub fn lines(&self) -> i32 {
        match &self.ruleset {
            Ruleset::Rot(t) => t.lines(),
            Ruleset::Noro(t) => t.lines(),
        }
    }

    pub fn pieces(&self) -> i32 {
        match &self.ruleset {
            Ruleset::Rot(t) => t.pieces(),
            Ruleset::Noro(t) => t.pieces(),
        }
    }

    pub fn now_piece(&self) -> Piece {
        match &self.ruleset {
            Ruleset::Rot(t) => t.now_piece(),
            Ruleset::Noro(t) => t.now_piece(),
        }
    }

    pub fn next_piece(&self) -> Piece {
        match &self.ruleset {
            Ruleset::Rot(t) => t.next_piece(),
            Ruleset::Noro(t) => t.next_piece(),
        }
    }

    pub fn run_score(&self) -> i32 {
        match &self.ruleset {
            Ruleset::Rot(t) => t.run_score(),
            Ruleset::Noro(t) => t.run_score(),
        }
    }

    pub fn run_lines(&self) -> i32 {
        match &self.ruleset {
            Ruleset::Rot(t) => t.run_lines(),
            Ruleset::Noro(t) => t.run_lines(),
        }
    }

    pub fn run_pieces(&self) -> i32 {
        match &self.ruleset {
            Ruleset::Rot(t) => t.run_pieces(),
            Ruleset::Noro(t) => t.run_pieces(),
        }
    }

    pub fn is_noro(&self) -> bool {
        matches!(self.ruleset, Ruleset::Noro(_))
    }

    pub fn is_mirror(&self) -> bool {
        self.is_mirror
    }

    pub fn is_tetris_only(&self) -> bool {
        matches!(&self.ruleset, Ruleset::Rot(t) if t.tetris_only())
    }

    pub fn line_cap(&self) -> i32 {
        match &self.ruleset {
            Ruleset::Rot(t) => t.line_cap(),
            Ruleset::Noro(_) => DEFAULT_LINE_CAP,
        }
    }

    pub fn rot(&self) -> Option<&Tetris> {
        match &self.ruleset {
            Ruleset::Rot(t) => Some(t),
            Ruleset::Noro(_) => None,
        }
    }

    pub fn noro(&self) -> Option<&TetrisNoro> {
        match &self.ruleset {
            Ruleset::Noro(t) => Some(t),
            Ruleset::Rot(_) => None,
        }
    }
}
