use serde::Serialize;

use crate::error::SimError;

/// Number of entrance gates around the stadium.
pub const GATE_COUNT: usize = 6;

/// Fans are numbered 1..=TOTAL_FANS in order of sorted arrival time.
pub type FanId = u32;

/// Starting zone outside the perimeter. Determines the walk-time base
/// to each gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Esplanade {
    North,
    South,
}

impl Esplanade {
    pub fn index(self) -> usize {
        match self {
            Esplanade::North => 0,
            Esplanade::South => 1,
        }
    }
}

impl std::fmt::Display for Esplanade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Esplanade::North => write!(f, "North"),
            Esplanade::South => write!(f, "South"),
        }
    }
}

/// Labeled entry point, each with its own turnstile bank and line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Gate {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Gate {
    pub const ALL: [Gate; GATE_COUNT] = [Gate::A, Gate::B, Gate::C, Gate::D, Gate::E, Gate::F];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> char {
        match self {
            Gate::A => 'A',
            Gate::B => 'B',
            Gate::C => 'C',
            Gate::D => 'D',
            Gate::E => 'E',
            Gate::F => 'F',
        }
    }
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The six boundaries a fan crosses on the way in, in lifecycle order.
/// Used to index the packed timestamp array on [`Fan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
pub enum Phase {
    Arrival,
    InspectionStart,
    InspectionEnd,
    GateArrival,
    TurnstileStart,
    TurnstileEnd,
}

impl Phase {
    pub const COUNT: usize = 6;

    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Arrival => "arrival",
            Phase::InspectionStart => "inspection start",
            Phase::InspectionEnd => "inspection end",
            Phase::GateArrival => "gate arrival",
            Phase::TurnstileStart => "turnstile start",
            Phase::TurnstileEnd => "turnstile end",
        };
        write!(f, "{name}")
    }
}

/// Per-fan state: identity, routing, and one write-once timestamp per
/// lifecycle boundary. The phase strictly advances, so a stamp may only
/// be written when every earlier stamp is present and the clock has not
/// gone backwards.
#[derive(Debug, Clone)]
pub struct Fan {
    pub id: FanId,
    pub esplanade: Esplanade,
    pub gate: Gate,
    stamps: [Option<f64>; Phase::COUNT],
}

impl Fan {
    pub fn new(id: FanId, esplanade: Esplanade, gate: Gate) -> Self {
        Self {
            id,
            esplanade,
            gate,
            stamps: [None; Phase::COUNT],
        }
    }

    /// Record the simulated time at which this fan crossed `phase`.
    pub fn mark(&mut self, phase: Phase, time: f64) -> Result<(), SimError> {
        let idx = phase.index();
        let out_of_order = self.stamps[idx].is_some()
            || self.stamps[..idx].iter().any(Option::is_none)
            || self.stamps[..idx]
                .iter()
                .flatten()
                .any(|&earlier| time < earlier);
        if out_of_order {
            return Err(SimError::PhaseOutOfOrder {
                fan: self.id,
                phase,
                time,
            });
        }
        self.stamps[idx] = Some(time);
        Ok(())
    }

    pub fn stamp(&self, phase: Phase) -> Option<f64> {
        self.stamps[phase.index()]
    }

    /// Time between two boundaries, once both have been crossed.
    pub fn span(&self, from: Phase, to: Phase) -> Option<f64> {
        Some(self.stamp(to)? - self.stamp(from)?)
    }

    pub fn is_complete(&self) -> bool {
        self.stamps[Phase::TurnstileEnd.index()].is_some()
    }
}
