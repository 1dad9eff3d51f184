use crate::error::SimError;
use crate::fan::FanId;

use super::{FifoLine, Server};

/// The pat-down station: a pool of agents sharing one line. The driver
/// maintains the allocation invariant (an idle agent implies an empty
/// line); this type only hands out servers and queue slots.
#[derive(Debug)]
pub struct InspectionStation {
    agents: Vec<Server>,
    line: FifoLine,
}

impl InspectionStation {
    pub fn new(agent_count: u32) -> Self {
        Self {
            agents: (0..agent_count).map(|_| Server::default()).collect(),
            line: FifoLine::new(),
        }
    }

    /// Lowest-id idle agent. The scan order is the determinism contract:
    /// utilization biases toward low ids, and replays depend on it.
    pub fn find_idle_agent(&self) -> Option<usize> {
        self.agents.iter().position(Server::is_idle)
    }

    pub fn begin_service(&mut self, agent: usize, fan: FanId, t: f64) {
        self.agents[agent].begin(fan, t);
    }

    pub fn finish_service(&mut self, agent: usize, t: f64) -> Result<FanId, SimError> {
        self.agents[agent]
            .finish(t)
            .ok_or(SimError::AgentNotBusy { agent })
    }

    pub fn enqueue(&mut self, fan: FanId, t: f64) {
        self.line.enqueue(fan, t);
    }

    pub fn dequeue_next(&mut self, t: f64) -> Option<FanId> {
        self.line.dequeue(t)
    }

    pub fn line_len(&self) -> usize {
        self.line.len()
    }

    /// Mean wait credited by the line so far, for progress reporting.
    pub fn line_mean_wait_secs(&self) -> f64 {
        self.line.mean_wait_secs()
    }

    pub fn busy_agents(&self) -> usize {
        self.agents.iter().filter(|a| !a.is_idle()).count()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_selection_prefers_lowest_id() {
        let mut station = InspectionStation::new(3);
        assert_eq!(station.find_idle_agent(), Some(0));

        station.begin_service(0, 1, 0.0);
        assert_eq!(station.find_idle_agent(), Some(1));

        station.begin_service(1, 2, 0.0);
        station.begin_service(2, 3, 0.0);
        assert_eq!(station.find_idle_agent(), None);

        // Freeing agent 1 makes it the lowest idle id again.
        station.finish_service(1, 10.0).unwrap();
        assert_eq!(station.find_idle_agent(), Some(1));
    }

    #[test]
    fn finish_returns_the_served_fan() {
        let mut station = InspectionStation::new(1);
        station.begin_service(0, 42, 5.0);
        assert_eq!(station.finish_service(0, 25.0).unwrap(), 42);
    }

    #[test]
    fn finish_idle_agent_is_an_invariant_violation() {
        let mut station = InspectionStation::new(1);
        let err = station.finish_service(0, 1.0).unwrap_err();
        assert!(matches!(err, SimError::AgentNotBusy { agent: 0 }));
    }

    #[test]
    fn line_is_fifo() {
        let mut station = InspectionStation::new(1);
        station.enqueue(5, 0.0);
        station.enqueue(6, 1.0);
        assert_eq!(station.line_len(), 2);
        assert_eq!(station.dequeue_next(2.0), Some(5));
        assert_eq!(station.dequeue_next(2.0), Some(6));
        assert_eq!(station.dequeue_next(2.0), None);
    }

    #[test]
    fn busy_count_tracks_state() {
        let mut station = InspectionStation::new(2);
        assert_eq!(station.busy_agents(), 0);
        station.begin_service(0, 1, 0.0);
        station.begin_service(1, 2, 0.0);
        assert_eq!(station.busy_agents(), 2);
        station.finish_service(0, 5.0).unwrap();
        assert_eq!(station.busy_agents(), 1);
    }
}
