//! Stochastic inputs to a run: the arrival-time generator and the three
//! service-time samplers. Every draw comes from one seedable PRNG per run,
//! in a fixed order, so a seed fully determines the trajectory.

use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, LogNormal, Normal, Uniform};

use crate::config::SimConfig;
use crate::error::{ConfigError, SimError};
use crate::fan::{Esplanade, Fan, Gate, Phase, GATE_COUNT};

/// Give up on rejection sampling after this many consecutive misses of the
/// truncation window. The window contains the bulk of the Normal's mass
/// under any sane configuration, so hitting this means the config is off.
const MAX_REJECTS: u32 = 100_000;

/// Service-duration source for the driver. A trait so scenario tests can
/// pin every duration to a constant.
pub trait ServiceTimes {
    /// Pat-down duration in seconds.
    fn inspection(&mut self) -> f64;
    /// Esplanade-to-gate walk duration in seconds.
    fn walk(&mut self, esplanade: Esplanade, gate: Gate) -> f64;
    /// Turnstile passage duration in seconds.
    fn turnstile(&mut self) -> f64;
}

/// The production sampler backed by the run's PRNG.
pub struct ServiceSampler {
    rng: StdRng,
    inspection: Normal<f64>,
    inspection_floor: f64,
    walk_base: [[f64; GATE_COUNT]; 2],
    walk_jitter: Uniform<f64>,
    fast_pass: LogNormal<f64>,
    problem: LogNormal<f64>,
    problem_prob: f64,
}

fn distribution_err(what: &'static str, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::Distribution {
        what,
        detail: err.to_string(),
    }
}

impl ServiceSampler {
    pub fn new(cfg: &SimConfig, rng: StdRng) -> Result<Self, ConfigError> {
        // The turnstile LogNormals are parameterized so the configured mean
        // is the median and std/mean the shape, matching the field survey.
        let fast_mu = cfg.turnstile_fast_mean_secs.ln();
        let fast_sigma = cfg.turnstile_fast_std_secs / cfg.turnstile_fast_mean_secs;
        let problem_mu = cfg.turnstile_problem_mean_secs.ln();
        let problem_sigma = cfg.turnstile_problem_std_secs / cfg.turnstile_problem_mean_secs;

        Ok(Self {
            rng,
            inspection: Normal::new(cfg.inspection_mean_secs, cfg.inspection_std_secs)
                .map_err(|e| distribution_err("inspection", e))?,
            inspection_floor: cfg.inspection_floor_secs,
            walk_base: cfg.walk_base_secs,
            walk_jitter: Uniform::new(0.8, 1.2).map_err(|e| distribution_err("walk jitter", e))?,
            fast_pass: LogNormal::new(fast_mu, fast_sigma)
                .map_err(|e| distribution_err("turnstile fast pass", e))?,
            problem: LogNormal::new(problem_mu, problem_sigma)
                .map_err(|e| distribution_err("turnstile problem", e))?,
            problem_prob: cfg.turnstile_problem_prob,
        })
    }
}

impl ServiceTimes for ServiceSampler {
    fn inspection(&mut self) -> f64 {
        self.inspection
            .sample(&mut self.rng)
            .max(self.inspection_floor)
    }

    fn walk(&mut self, esplanade: Esplanade, gate: Gate) -> f64 {
        self.walk_base[esplanade.index()][gate.index()] * self.walk_jitter.sample(&mut self.rng)
    }

    fn turnstile(&mut self) -> f64 {
        // Always draw the fast pass; a problem (stuck ticket, bag check,
        // wheelchair platform) adds an independent slow component on top.
        let fast = self.fast_pass.sample(&mut self.rng);
        if self.rng.random::<f64>() < self.problem_prob {
            fast + self.problem.sample(&mut self.rng)
        } else {
            fast
        }
    }
}

/// Pre-generates the full fan population for one run.
pub struct ArrivalGenerator {
    shape: Normal<f64>,
    window: (f64, f64),
    north_fraction: f64,
    gate_weights: WeightedIndex<u32>,
    total: u32,
}

impl ArrivalGenerator {
    pub fn new(cfg: &SimConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            shape: Normal::new(cfg.arrival_mean_secs, cfg.arrival_std_secs)
                .map_err(|e| distribution_err("arrival times", e))?,
            window: (-(f64::from(cfg.pre_game_minutes)) * 60.0, 0.0),
            north_fraction: cfg.north_fraction,
            gate_weights: WeightedIndex::new(cfg.gate_capacity)
                .map_err(|e| distribution_err("gate assignment", e))?,
            total: cfg.total_fans,
        })
    }

    /// Draw, sort, and label the whole population. Draw order is fixed:
    /// all arrival times first (each with its rejection loop), then one
    /// esplanade and one gate choice per fan in sorted-arrival order.
    /// Ids run 1..=total in that same order.
    pub fn generate(&self, rng: &mut StdRng) -> Result<Vec<Fan>, SimError> {
        let mut times = Vec::with_capacity(self.total as usize);
        for _ in 0..self.total {
            times.push(self.sample_arrival(rng)?);
        }
        times.sort_by(f64::total_cmp);

        let mut fans = Vec::with_capacity(times.len());
        for (i, time) in times.into_iter().enumerate() {
            let esplanade = if rng.random::<f64>() < self.north_fraction {
                Esplanade::North
            } else {
                Esplanade::South
            };
            let gate = Gate::ALL[self.gate_weights.sample(rng)];
            let mut fan = Fan::new(i as u32 + 1, esplanade, gate);
            fan.mark(Phase::Arrival, time)?;
            fans.push(fan);
        }
        Ok(fans)
    }

    /// Rejection-sample one arrival time inside the truncation window.
    fn sample_arrival(&self, rng: &mut StdRng) -> Result<f64, SimError> {
        let (lo, hi) = self.window;
        for _ in 0..MAX_REJECTS {
            let t = self.shape.sample(rng);
            if (lo..=hi).contains(&t) {
                return Ok(t);
            }
        }
        Err(SimError::RejectionExhausted(MAX_REJECTS))
    }
}
