use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::config::SimConfig;
use crate::error::SimError;
use crate::events::{Event, EventManager};
use crate::fan::{Fan, FanId, Gate, Phase};
use crate::monitor::Monitor;
use crate::sampling::{ArrivalGenerator, ServiceSampler, ServiceTimes};
use crate::stations::{GateStations, InspectionStation};
use crate::stats::{PhaseSummaries, RunStats};

/// Emit a progress line every this many processed events (verbose runs).
const PROGRESS_EVERY: u64 = 20_000;

/// Per-gate outcome of one run.
#[derive(Debug, Clone)]
pub struct GateReport {
    pub gate: Gate,
    pub count: u64,
    /// Share of all completed fans routed through this gate.
    pub pct_of_total: f64,
    pub capacity: u32,
    /// Fans admitted as a share of the seats behind the gate.
    pub occupancy_pct: f64,
    pub turnstiles: u32,
    pub peak_line: usize,
    /// Busy-time utilization of the gate's turnstile bank over the span.
    pub utilization_pct: f64,
}

/// Everything one completed run reports upward.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_index: u32,
    pub seed: u64,
    pub completed: u64,
    pub events_processed: u64,
    pub span_secs: f64,
    pub phases: PhaseSummaries,
    pub gates: Vec<GateReport>,
    pub pct_inside_by_kickoff: f64,
    pub last_entry_secs: f64,
    pub mean_queue_secs: f64,
    pub mean_total_secs: f64,
    pub peak_inspection_line: usize,
    pub inspection_utilization_pct: f64,
    /// Raw per-fan arrival times, for the cross-run arrival histogram.
    pub arrival_secs: Vec<f64>,
    /// Raw per-fan entry times, for the entries-over-time table.
    pub entry_secs: Vec<f64>,
    /// Final per-fan records, timestamps included.
    pub fans: Vec<Fan>,
}

impl RunResult {
    /// Largest turnstile-line peak over all gates.
    pub fn max_turnstile_peak(&self) -> usize {
        self.gates.iter().map(|g| g.peak_line).max().unwrap_or(0)
    }

    /// Turnstile utilization averaged over gates, weighted by bank size.
    pub fn weighted_turnstile_utilization_pct(&self) -> f64 {
        let total: u64 = self.gates.iter().map(|g| u64::from(g.turnstiles)).sum();
        if total == 0 {
            return 0.0;
        }
        let weighted: f64 = self
            .gates
            .iter()
            .map(|g| g.utilization_pct * f64::from(g.turnstiles))
            .sum();
        weighted / total as f64
    }
}

/// One simulation run: owns its event manager, stations, monitor, and
/// sampler, so runs are fully isolated from each other.
pub struct Simulation<S> {
    cfg: Arc<SimConfig>,
    run_index: u32,
    seed: u64,
    events: EventManager,
    fans: Vec<Fan>,
    arrival_order: Vec<FanId>,
    inspection: InspectionStation,
    gates: GateStations,
    monitor: Monitor,
    stats: RunStats,
    sampler: S,
    verbose: bool,
}

impl Simulation<ServiceSampler> {
    /// Build a run from the config: seed the PRNG, pre-generate the fan
    /// population, and hand the PRNG on to the service samplers so every
    /// draw of the run comes from the one seeded stream.
    pub fn new(
        cfg: Arc<SimConfig>,
        run_index: u32,
        seed: u64,
        verbose: bool,
    ) -> anyhow::Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let fans = ArrivalGenerator::new(&cfg)?.generate(&mut rng)?;
        let sampler = ServiceSampler::new(&cfg, rng)?;

        let mut sim = Self::with_fans(cfg, fans, sampler, verbose);
        sim.run_index = run_index;
        sim.seed = seed;
        Ok(sim)
    }
}

impl<S: ServiceTimes> Simulation<S> {
    /// Build a run over an explicit, pre-stamped fan population. Arrivals
    /// are scheduled in the order fans appear here, which is what makes
    /// same-time arrivals resolve deterministically.
    pub fn with_fans(cfg: Arc<SimConfig>, fans: Vec<Fan>, sampler: S, verbose: bool) -> Self {
        let arrival_order: Vec<FanId> = fans.iter().map(|f| f.id).collect();
        let mut by_id = fans;
        by_id.sort_by_key(|f| f.id);

        Self {
            inspection: InspectionStation::new(cfg.inspection_agents),
            gates: GateStations::new(&cfg.turnstiles_per_gate),
            monitor: Monitor::new(cfg.inspection_agents, &cfg.turnstiles_per_gate),
            stats: RunStats::new(by_id.len()),
            events: EventManager::new(),
            fans: by_id,
            arrival_order,
            run_index: 0,
            seed: 0,
            cfg,
            sampler,
            verbose,
        }
    }

    fn fan(&self, id: FanId) -> &Fan {
        &self.fans[(id - 1) as usize]
    }

    fn fan_mut(&mut self, id: FanId) -> &mut Fan {
        &mut self.fans[(id - 1) as usize]
    }

    /// Drain the event list. Every arrival leads to exactly one turnstile
    /// exit, so an empty list with fans still in transit is fatal.
    pub fn run(mut self) -> Result<RunResult, SimError> {
        self.schedule_arrivals()?;

        if self.verbose {
            info!(
                run = self.run_index,
                fans = self.fans.len(),
                agents = self.inspection.agent_count(),
                "arrivals scheduled"
            );
        }

        let mut next_progress = PROGRESS_EVERY;
        while let Some(event) = self.events.advance() {
            self.monitor.observe_event(self.events.now());
            match event {
                Event::Arrival { fan } => self.on_arrival(fan)?,
                Event::InspectionEnd {
                    fan,
                    agent,
                    busy_start,
                } => self.on_inspection_end(fan, agent, busy_start)?,
                Event::GateArrival { fan } => self.on_gate_arrival(fan)?,
                Event::TurnstileEnd {
                    fan,
                    gate,
                    turnstile,
                    busy_start,
                } => self.on_turnstile_end(fan, gate, turnstile, busy_start)?,
            }
            self.monitor
                .observe_lines(self.inspection.line_len(), self.gates.line_lens());

            if self.verbose && self.events.processed() >= next_progress {
                self.log_progress();
                next_progress += PROGRESS_EVERY;
            }
        }

        self.finish()
    }

    fn schedule_arrivals(&mut self) -> Result<(), SimError> {
        for i in 0..self.arrival_order.len() {
            let id = self.arrival_order[i];
            let t = self
                .fan(id)
                .stamp(Phase::Arrival)
                .ok_or(SimError::PhaseMissing {
                    fan: id,
                    phase: Phase::Arrival,
                })?;
            self.events.schedule_at(t, Event::Arrival { fan: id })?;
        }
        Ok(())
    }

    fn on_arrival(&mut self, fan_id: FanId) -> Result<(), SimError> {
        let now = self.events.now();
        self.monitor.count_arrival();

        match self.inspection.find_idle_agent() {
            Some(agent) => self.start_inspection(agent, fan_id, now)?,
            None => self.inspection.enqueue(fan_id, now),
        }
        Ok(())
    }

    fn start_inspection(&mut self, agent: usize, fan_id: FanId, now: f64) -> Result<(), SimError> {
        self.fan_mut(fan_id).mark(Phase::InspectionStart, now)?;
        self.inspection.begin_service(agent, fan_id, now);
        let duration = self.sampler.inspection();
        self.events.schedule_in(
            duration,
            Event::InspectionEnd {
                fan: fan_id,
                agent,
                busy_start: now,
            },
        )
    }

    fn on_inspection_end(
        &mut self,
        fan_id: FanId,
        agent: usize,
        busy_start: f64,
    ) -> Result<(), SimError> {
        let now = self.events.now();
        self.monitor
            .record_inspection_service(agent, busy_start, now)?;
        let served = self.inspection.finish_service(agent, now)?;
        debug_assert_eq!(served, fan_id);
        self.fan_mut(fan_id).mark(Phase::InspectionEnd, now)?;
        self.monitor.count_inspection_done();

        // Head of the line takes over the agent that just freed up.
        if let Some(next) = self.inspection.dequeue_next(now) {
            self.start_inspection(agent, next, now)?;
        }

        let (esplanade, gate) = {
            let fan = self.fan(fan_id);
            (fan.esplanade, fan.gate)
        };
        let walk = self.sampler.walk(esplanade, gate);
        self.events
            .schedule_in(walk, Event::GateArrival { fan: fan_id })
    }

    fn on_gate_arrival(&mut self, fan_id: FanId) -> Result<(), SimError> {
        let now = self.events.now();
        let gate = self.fan(fan_id).gate;
        self.fan_mut(fan_id).mark(Phase::GateArrival, now)?;

        match self.gates.find_idle_turnstile(gate) {
            Some(turnstile) => self.start_turnstile(gate, turnstile, fan_id, now)?,
            None => self.gates.enqueue(gate, fan_id, now),
        }
        Ok(())
    }

    fn start_turnstile(
        &mut self,
        gate: Gate,
        turnstile: usize,
        fan_id: FanId,
        now: f64,
    ) -> Result<(), SimError> {
        self.fan_mut(fan_id).mark(Phase::TurnstileStart, now)?;
        self.gates.begin_service(gate, turnstile, fan_id, now);
        let duration = self.sampler.turnstile();
        self.events.schedule_in(
            duration,
            Event::TurnstileEnd {
                fan: fan_id,
                gate,
                turnstile,
                busy_start: now,
            },
        )
    }

    fn on_turnstile_end(
        &mut self,
        fan_id: FanId,
        gate: Gate,
        turnstile: usize,
        busy_start: f64,
    ) -> Result<(), SimError> {
        let now = self.events.now();
        self.monitor
            .record_turnstile_service(gate, turnstile, busy_start, now)?;
        let served = self.gates.finish_service(gate, turnstile, now)?;
        debug_assert_eq!(served, fan_id);
        self.fan_mut(fan_id).mark(Phase::TurnstileEnd, now)?;
        self.monitor.count_entry_done();
        self.stats.record(&self.fans[(fan_id - 1) as usize])?;

        if let Some(next) = self.gates.dequeue_next(gate, now) {
            self.start_turnstile(gate, turnstile, next, now)?;
        }
        Ok(())
    }

    fn log_progress(&self) {
        info!(
            run = self.run_index,
            sim_minute = format!("{:.1}", self.events.now() / 60.0),
            events = self.events.processed(),
            pending = self.events.pending(),
            inspection_line = self.inspection.line_len(),
            inspection_peak = self.monitor.peak_inspection_line(),
            line_mean_wait_secs = format!("{:.1}", self.inspection.line_mean_wait_secs()),
            busy_agents = self.inspection.busy_agents(),
            arrivals = self.monitor.arrivals(),
            inspections = self.monitor.inspections_done(),
            entries = self.monitor.entries_done(),
            "progress"
        );
    }

    fn finish(self) -> Result<RunResult, SimError> {
        let remaining = self.fans.iter().filter(|f| !f.is_complete()).count();
        if remaining > 0 {
            return Err(SimError::FansLeftBehind { remaining });
        }
        if !self.monitor.counters_consistent() {
            warn!(
                run = self.run_index,
                arrivals = self.monitor.arrivals(),
                inspections = self.monitor.inspections_done(),
                entries = self.monitor.entries_done(),
                "lifecycle counters disagree after drain"
            );
        }

        let completed = self.stats.completed() as u64;
        let gates = Gate::ALL
            .iter()
            .map(|&gate| {
                let count = self.stats.gate_count(gate);
                let capacity = self.cfg.capacity(gate);
                GateReport {
                    gate,
                    count,
                    pct_of_total: if completed == 0 {
                        0.0
                    } else {
                        count as f64 / completed as f64 * 100.0
                    },
                    capacity,
                    occupancy_pct: if capacity == 0 {
                        0.0
                    } else {
                        count as f64 / f64::from(capacity) * 100.0
                    },
                    turnstiles: self.cfg.turnstiles(gate),
                    peak_line: self.monitor.peak_gate_line(gate),
                    utilization_pct: self.monitor.gate_utilization_pct(gate),
                }
            })
            .collect();

        let arrival_secs = self
            .fans
            .iter()
            .filter_map(|f| f.stamp(Phase::Arrival))
            .collect();

        Ok(RunResult {
            run_index: self.run_index,
            seed: self.seed,
            completed,
            events_processed: self.events.processed(),
            span_secs: self.monitor.span_secs(),
            phases: self.stats.phase_summaries(),
            gates,
            pct_inside_by_kickoff: self.stats.pct_inside_by_kickoff(),
            last_entry_secs: self.stats.last_entry_secs(),
            mean_queue_secs: self.stats.mean_queue_secs(),
            mean_total_secs: self.stats.mean_total_secs(),
            peak_inspection_line: self.monitor.peak_inspection_line(),
            inspection_utilization_pct: self.monitor.inspection_utilization_pct(),
            arrival_secs,
            entry_secs: self.stats.entry_secs().to_vec(),
            fans: self.fans,
        })
    }
}

/// Sampler pinned to constants, for scenario-exact assertions in tests.
#[cfg(test)]
pub(crate) struct FixedTimes {
    pub inspection: f64,
    pub walk_scale: f64,
    pub turnstile: f64,
    pub walk_base: [[f64; crate::fan::GATE_COUNT]; 2],
}

#[cfg(test)]
impl ServiceTimes for FixedTimes {
    fn inspection(&mut self) -> f64 {
        self.inspection
    }

    fn walk(&mut self, esplanade: crate::fan::Esplanade, gate: Gate) -> f64 {
        self.walk_base[esplanade.index()][gate.index()] * self.walk_scale
    }

    fn turnstile(&mut self) -> f64 {
        self.turnstile
    }
}
