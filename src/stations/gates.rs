use crate::error::SimError;
use crate::fan::{FanId, Gate, GATE_COUNT};

use super::{FifoLine, Server};

/// The turnstile stations: one fixed bank of turnstiles and one line per
/// gate, the same shape as the inspection pool replicated six ways.
#[derive(Debug)]
pub struct GateStations {
    banks: [Vec<Server>; GATE_COUNT],
    lines: [FifoLine; GATE_COUNT],
}

impl GateStations {
    pub fn new(turnstiles_per_gate: &[u32; GATE_COUNT]) -> Self {
        Self {
            banks: std::array::from_fn(|g| {
                (0..turnstiles_per_gate[g])
                    .map(|_| Server::default())
                    .collect()
            }),
            lines: std::array::from_fn(|_| FifoLine::new()),
        }
    }

    /// Lowest-id idle turnstile at `gate`, same determinism contract as
    /// the inspection pool.
    pub fn find_idle_turnstile(&self, gate: Gate) -> Option<usize> {
        self.banks[gate.index()].iter().position(Server::is_idle)
    }

    pub fn begin_service(&mut self, gate: Gate, turnstile: usize, fan: FanId, t: f64) {
        self.banks[gate.index()][turnstile].begin(fan, t);
    }

    pub fn finish_service(
        &mut self,
        gate: Gate,
        turnstile: usize,
        t: f64,
    ) -> Result<FanId, SimError> {
        self.banks[gate.index()]
            .get_mut(turnstile)
            .ok_or(SimError::UnknownTurnstile { gate, turnstile })?
            .finish(t)
            .ok_or(SimError::TurnstileNotBusy { gate, turnstile })
    }

    pub fn enqueue(&mut self, gate: Gate, fan: FanId, t: f64) {
        self.lines[gate.index()].enqueue(fan, t);
    }

    pub fn dequeue_next(&mut self, gate: Gate, t: f64) -> Option<FanId> {
        self.lines[gate.index()].dequeue(t)
    }

    pub fn line_len(&self, gate: Gate) -> usize {
        self.lines[gate.index()].len()
    }

    pub fn line_lens(&self) -> [usize; GATE_COUNT] {
        std::array::from_fn(|g| self.lines[g].len())
    }

    pub fn bank_size(&self, gate: Gate) -> usize {
        self.banks[gate.index()].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stations() -> GateStations {
        GateStations::new(&[2, 1, 1, 1, 1, 1])
    }

    #[test]
    fn idle_selection_is_per_gate_and_lowest_id() {
        let mut s = stations();
        assert_eq!(s.find_idle_turnstile(Gate::A), Some(0));

        s.begin_service(Gate::A, 0, 1, 0.0);
        assert_eq!(s.find_idle_turnstile(Gate::A), Some(1));
        // Gate B unaffected by gate A's occupancy.
        assert_eq!(s.find_idle_turnstile(Gate::B), Some(0));

        s.begin_service(Gate::A, 1, 2, 0.0);
        assert_eq!(s.find_idle_turnstile(Gate::A), None);
    }

    #[test]
    fn lines_are_independent_per_gate() {
        let mut s = stations();
        s.enqueue(Gate::A, 1, 0.0);
        s.enqueue(Gate::B, 2, 0.0);

        assert_eq!(s.line_len(Gate::A), 1);
        assert_eq!(s.line_len(Gate::B), 1);
        assert_eq!(s.dequeue_next(Gate::A, 1.0), Some(1));
        assert_eq!(s.line_len(Gate::A), 0);
        assert_eq!(s.line_len(Gate::B), 1);
    }

    #[test]
    fn finish_idle_turnstile_is_an_invariant_violation() {
        let mut s = stations();
        let err = s.finish_service(Gate::C, 0, 1.0).unwrap_err();
        assert!(matches!(
            err,
            SimError::TurnstileNotBusy {
                gate: Gate::C,
                turnstile: 0
            }
        ));
    }

    #[test]
    fn unknown_turnstile_id_is_an_invariant_violation() {
        let mut s = stations();
        let err = s.finish_service(Gate::B, 9, 1.0).unwrap_err();
        assert!(matches!(
            err,
            SimError::UnknownTurnstile {
                gate: Gate::B,
                turnstile: 9
            }
        ));
    }

    #[test]
    fn bank_sizes_match_config() {
        let s = stations();
        assert_eq!(s.bank_size(Gate::A), 2);
        assert_eq!(s.bank_size(Gate::F), 1);
    }
}
