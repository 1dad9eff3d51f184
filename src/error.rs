use crate::fan::{Gate, Phase};

/// Startup validation failure. Reported once, before any run starts,
/// and the process exits nonzero.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TOTAL_FANS ({fans}) exceeds total gate capacity ({capacity})")]
    CapacityExceeded { fans: u32, capacity: u64 },

    #[error("NUM_RUNS must be at least 1")]
    NoRuns,

    #[error("INSPECTION_AGENTS must be positive")]
    NoAgents,

    #[error("gate {gate} has no turnstiles but fans can be routed to it")]
    EmptyTurnstileBank { gate: Gate },

    #[error("NORTH_FRACTION must lie in [0, 1], got {0}")]
    FractionOutOfRange(f64),

    #[error("BIN_HISTOGRAM_MINUTES must be positive")]
    ZeroBin,

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("bad distribution parameters for {what}: {detail}")]
    Distribution { what: &'static str, detail: String },
}

/// Fatal mid-run invariant violation. Aborts the run it occurred in;
/// aggregation proceeds over the runs that completed.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("event scheduled in the past: {time:.3}s while clock is at {now:.3}s")]
    ScheduledInPast { time: f64, now: f64 },

    #[error("inspection agent {agent} finished service while idle")]
    AgentNotBusy { agent: usize },

    #[error("turnstile {turnstile} at gate {gate} finished service while idle")]
    TurnstileNotBusy { gate: Gate, turnstile: usize },

    #[error("turnstile {turnstile} does not exist at gate {gate}")]
    UnknownTurnstile { gate: Gate, turnstile: usize },

    #[error("inspection agent {agent} does not exist")]
    UnknownAgent { agent: usize },

    #[error("fan {fan}: {phase} recorded out of order at {time:.3}s")]
    PhaseOutOfOrder { fan: u32, phase: Phase, time: f64 },

    #[error("fan {fan} completed without a {phase} timestamp")]
    PhaseMissing { fan: u32, phase: Phase },

    #[error("event list drained with {remaining} fans still in transit")]
    FansLeftBehind { remaining: usize },

    #[error("arrival sampling rejected {0} draws in a row; truncation window too narrow")]
    RejectionExhausted(u32),
}
