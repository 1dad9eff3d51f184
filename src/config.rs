use std::str::FromStr;

use crate::error::ConfigError;
use crate::fan::{Esplanade, Gate, GATE_COUNT};

/// Everything a simulation run needs to know, resolved once at startup.
///
/// Scalar knobs come from the environment (with compiled defaults); the
/// per-gate tables and service-time parameters are fixed records modeled
/// on the surveyed stadium layout.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Fans generated per run (env: TOTAL_FANS).
    pub total_fans: u32,

    /// Independent simulation runs to execute and aggregate (env: NUM_RUNS).
    pub num_runs: u32,

    /// Size of the pat-down agent pool (env: INSPECTION_AGENTS).
    pub inspection_agents: u32,

    /// How long before kickoff the arrival window opens (env: PRE_GAME_MINUTES).
    pub pre_game_minutes: u32,

    /// Nominal arrival peak, minutes before kickoff (env: PEAK_MINUTES).
    /// Bookkeeping only for now; the arrival shape below is fixed.
    pub peak_minutes: u32,

    /// Probability a fan starts on the North esplanade (env: NORTH_FRACTION).
    pub north_fraction: f64,

    /// Bin width for the cross-run arrival histogram hand-off
    /// (env: BIN_HISTOGRAM_MINUTES).
    pub bin_histogram_minutes: u32,

    /// Base seed; run k uses seed + k. Drawn from OS entropy and logged
    /// when unset (env: SEED).
    pub seed: Option<u64>,

    /// When set, the arrival histogram hand-off is written there as JSON
    /// for the external plotter (env: ARRIVALS_JSON_PATH).
    pub arrivals_json_path: Option<String>,

    /// Seats behind each gate. Also the weights for gate assignment.
    pub gate_capacity: [u32; GATE_COUNT],

    /// Turnstiles installed at each gate.
    pub turnstiles_per_gate: [u32; GATE_COUNT],

    /// Base walk seconds from each esplanade to each gate, before jitter.
    pub walk_base_secs: [[f64; GATE_COUNT]; 2],

    /// Arrival-time shape: Normal in seconds relative to kickoff,
    /// rejection-truncated to [-pre_game_minutes * 60, 0].
    pub arrival_mean_secs: f64,
    pub arrival_std_secs: f64,

    /// Pat-down duration: Normal, clamped below at the floor.
    pub inspection_mean_secs: f64,
    pub inspection_std_secs: f64,
    pub inspection_floor_secs: f64,

    /// Turnstile passage: LogNormal around the fast median, with an
    /// additive LogNormal problem component at the given probability.
    pub turnstile_fast_mean_secs: f64,
    pub turnstile_fast_std_secs: f64,
    pub turnstile_problem_prob: f64,
    pub turnstile_problem_mean_secs: f64,
    pub turnstile_problem_std_secs: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            total_fans: 50_000,
            num_runs: 3,
            inspection_agents: 200,
            pre_game_minutes: 180,
            peak_minutes: 60,
            north_fraction: 0.5,
            bin_histogram_minutes: 5,
            seed: None,
            arrivals_json_path: None,
            // Gates A..F.
            gate_capacity: [9_983, 4_114, 15_574, 10_945, 5_399, 15_567],
            turnstiles_per_gate: [19, 14, 30, 22, 13, 30],
            // North esplanade is closest to gate F, South to gate C.
            walk_base_secs: [
                [90.0, 150.0, 240.0, 180.0, 120.0, 60.0],
                [180.0, 120.0, 60.0, 90.0, 150.0, 240.0],
            ],
            arrival_mean_secs: -55.0 * 60.0,
            arrival_std_secs: 17.0 * 60.0,
            inspection_mean_secs: 20.0,
            inspection_std_secs: 5.0,
            inspection_floor_secs: 5.0,
            turnstile_fast_mean_secs: 10.0,
            turnstile_fast_std_secs: 3.0,
            turnstile_problem_prob: 0.15,
            turnstile_problem_mean_secs: 20.0,
            turnstile_problem_std_secs: 8.0,
        }
    }
}

/// Read `key` from the environment, falling back to `default` when unset.
/// A present-but-unparseable value is a startup error, not a silent default.
fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => {
            let parsed = raw.trim().parse();
            parsed.map_err(|_| ConfigError::InvalidValue { key, value: raw })
        }
        Err(_) => Ok(default),
    }
}

impl SimConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            total_fans: parse_var("TOTAL_FANS", d.total_fans)?,
            num_runs: parse_var("NUM_RUNS", d.num_runs)?,
            inspection_agents: parse_var("INSPECTION_AGENTS", d.inspection_agents)?,
            pre_game_minutes: parse_var("PRE_GAME_MINUTES", d.pre_game_minutes)?,
            peak_minutes: parse_var("PEAK_MINUTES", d.peak_minutes)?,
            north_fraction: parse_var("NORTH_FRACTION", d.north_fraction)?,
            bin_histogram_minutes: parse_var("BIN_HISTOGRAM_MINUTES", d.bin_histogram_minutes)?,
            seed: match std::env::var("SEED") {
                Ok(raw) => {
                    let parsed = raw.trim().parse();
                    Some(parsed.map_err(|_| ConfigError::InvalidValue {
                        key: "SEED",
                        value: raw,
                    })?)
                }
                Err(_) => None,
            },
            arrivals_json_path: std::env::var("ARRIVALS_JSON_PATH").ok(),
            ..d
        })
    }

    pub fn total_capacity(&self) -> u64 {
        self.gate_capacity.iter().map(|&c| u64::from(c)).sum()
    }

    pub fn capacity(&self, gate: Gate) -> u32 {
        self.gate_capacity[gate.index()]
    }

    pub fn turnstiles(&self, gate: Gate) -> u32 {
        self.turnstiles_per_gate[gate.index()]
    }

    pub fn walk_base(&self, esplanade: Esplanade, gate: Gate) -> f64 {
        self.walk_base_secs[esplanade.index()][gate.index()]
    }

    /// Startup validation. Any failure here aborts the process with a
    /// one-line message and a nonzero exit code.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if u64::from(self.total_fans) > self.total_capacity() {
            return Err(ConfigError::CapacityExceeded {
                fans: self.total_fans,
                capacity: self.total_capacity(),
            });
        }
        if self.num_runs < 1 {
            return Err(ConfigError::NoRuns);
        }
        if self.inspection_agents < 1 {
            return Err(ConfigError::NoAgents);
        }
        if self.total_fans > 0 {
            for gate in Gate::ALL {
                if self.turnstiles(gate) == 0 {
                    return Err(ConfigError::EmptyTurnstileBank { gate });
                }
            }
        }
        if !(0.0..=1.0).contains(&self.north_fraction) {
            return Err(ConfigError::FractionOutOfRange(self.north_fraction));
        }
        if self.bin_histogram_minutes == 0 {
            return Err(ConfigError::ZeroBin);
        }
        Ok(())
    }
}
