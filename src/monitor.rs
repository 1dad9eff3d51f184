use crate::error::SimError;
use crate::fan::{Gate, GATE_COUNT};

/// Per-run resource observer: cumulative busy time per server, running
/// peak line sizes, lifecycle counters, and the simulated span.
///
/// Busy time is credited only when a service interval completes, never
/// sampled at tick boundaries, so utilization is exact regardless of
/// event density. Line peaks are sampled after every handler.
#[derive(Debug)]
pub struct Monitor {
    inspection_busy_secs: Vec<f64>,
    turnstile_busy_secs: [Vec<f64>; GATE_COUNT],
    peak_inspection_line: usize,
    peak_gate_lines: [usize; GATE_COUNT],
    first_event: Option<f64>,
    last_event: Option<f64>,
    arrivals: u64,
    inspections_done: u64,
    entries_done: u64,
}

impl Monitor {
    pub fn new(inspection_agents: u32, turnstiles_per_gate: &[u32; GATE_COUNT]) -> Self {
        Self {
            inspection_busy_secs: vec![0.0; inspection_agents as usize],
            turnstile_busy_secs: std::array::from_fn(|g| {
                vec![0.0; turnstiles_per_gate[g] as usize]
            }),
            peak_inspection_line: 0,
            peak_gate_lines: [0; GATE_COUNT],
            first_event: None,
            last_event: None,
            arrivals: 0,
            inspections_done: 0,
            entries_done: 0,
        }
    }

    /// Called once per popped event with the new clock value.
    pub fn observe_event(&mut self, t: f64) {
        if self.first_event.is_none() {
            self.first_event = Some(t);
        }
        self.last_event = Some(t);
    }

    /// Called after each handler so peaks never miss a mutation.
    pub fn observe_lines(&mut self, inspection_line: usize, gate_lines: [usize; GATE_COUNT]) {
        self.peak_inspection_line = self.peak_inspection_line.max(inspection_line);
        for g in 0..GATE_COUNT {
            self.peak_gate_lines[g] = self.peak_gate_lines[g].max(gate_lines[g]);
        }
    }

    pub fn count_arrival(&mut self) {
        self.arrivals += 1;
    }

    pub fn count_inspection_done(&mut self) {
        self.inspections_done += 1;
    }

    pub fn count_entry_done(&mut self) {
        self.entries_done += 1;
    }

    /// Credit one completed pat-down interval to `agent`.
    pub fn record_inspection_service(
        &mut self,
        agent: usize,
        busy_start: f64,
        busy_end: f64,
    ) -> Result<(), SimError> {
        let slot = self
            .inspection_busy_secs
            .get_mut(agent)
            .ok_or(SimError::UnknownAgent { agent })?;
        *slot += busy_end - busy_start;
        Ok(())
    }

    /// Credit one completed turnstile interval to (`gate`, `turnstile`).
    pub fn record_turnstile_service(
        &mut self,
        gate: Gate,
        turnstile: usize,
        busy_start: f64,
        busy_end: f64,
    ) -> Result<(), SimError> {
        let slot = self.turnstile_busy_secs[gate.index()]
            .get_mut(turnstile)
            .ok_or(SimError::UnknownTurnstile { gate, turnstile })?;
        *slot += busy_end - busy_start;
        Ok(())
    }

    /// Simulated seconds between the first and last processed event.
    pub fn span_secs(&self) -> f64 {
        match (self.first_event, self.last_event) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Pool-wide inspection utilization in percent over the run's span.
    pub fn inspection_utilization_pct(&self) -> f64 {
        utilization_pct(
            self.inspection_busy_secs.iter().sum(),
            self.span_secs(),
            self.inspection_busy_secs.len(),
        )
    }

    /// Bank-wide turnstile utilization for one gate in percent.
    pub fn gate_utilization_pct(&self, gate: Gate) -> f64 {
        let bank = &self.turnstile_busy_secs[gate.index()];
        utilization_pct(bank.iter().sum(), self.span_secs(), bank.len())
    }

    pub fn peak_inspection_line(&self) -> usize {
        self.peak_inspection_line
    }

    pub fn peak_gate_line(&self, gate: Gate) -> usize {
        self.peak_gate_lines[gate.index()]
    }

    pub fn peak_gate_lines(&self) -> [usize; GATE_COUNT] {
        self.peak_gate_lines
    }

    pub fn arrivals(&self) -> u64 {
        self.arrivals
    }

    pub fn inspections_done(&self) -> u64 {
        self.inspections_done
    }

    pub fn entries_done(&self) -> u64 {
        self.entries_done
    }

    /// The three lifecycle counters must agree once the run drains.
    pub fn counters_consistent(&self) -> bool {
        self.arrivals == self.inspections_done && self.inspections_done == self.entries_done
    }
}

fn utilization_pct(busy_secs: f64, span_secs: f64, servers: usize) -> f64 {
    if span_secs <= 0.0 || servers == 0 {
        return 0.0;
    }
    busy_secs / (span_secs * servers as f64) * 100.0
}
