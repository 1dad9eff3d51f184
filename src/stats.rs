use serde::Serialize;

use crate::error::SimError;
use crate::fan::{Fan, Gate, Phase, GATE_COUNT};

/// Descriptive statistics over one duration list.
///
/// Percentiles use the nearest-rank rule `v[floor(q * n)]` with the index
/// clamped to the last element; stdev is the sample standard deviation
/// and reads zero for n <= 1.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub stdev: f64,
    pub min: f64,
    pub max: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl Summary {
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();

        let mean = sorted.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };
        let stdev = if n > 1 {
            let var = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };

        Self {
            count: n,
            mean,
            median,
            stdev,
            min: sorted[0],
            max: sorted[n - 1],
            p90: nearest_rank(&sorted, 0.90),
            p95: nearest_rank(&sorted, 0.95),
            p99: nearest_rank(&sorted, 0.99),
        }
    }
}

fn nearest_rank(sorted: &[f64], q: f64) -> f64 {
    let idx = ((q * sorted.len() as f64) as usize).min(sorted.len() - 1);
    sorted[idx]
}

/// The six per-phase duration summaries of a completed run.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PhaseSummaries {
    pub wait_inspect: Summary,
    pub svc_inspect: Summary,
    pub walk: Summary,
    pub wait_turnstile: Summary,
    pub svc_turnstile: Summary,
    pub total: Summary,
}

/// One row of the entries-over-time table.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HistogramRow {
    pub start_min: i64,
    pub end_min: i64,
    pub count: u64,
    pub pct: f64,
}

/// Collects completed fans during a run and derives the per-fan metrics
/// at the end. Durations are reconstructed from the fan's own stamps,
/// not from line accounting.
#[derive(Debug)]
pub struct RunStats {
    wait_inspect: Vec<f64>,
    svc_inspect: Vec<f64>,
    walk: Vec<f64>,
    wait_turnstile: Vec<f64>,
    svc_turnstile: Vec<f64>,
    total: Vec<f64>,
    queue_total: Vec<f64>,
    entry_secs: Vec<f64>,
    gate_counts: [u64; GATE_COUNT],
}

impl RunStats {
    pub fn new(expected: usize) -> Self {
        Self {
            wait_inspect: Vec::with_capacity(expected),
            svc_inspect: Vec::with_capacity(expected),
            walk: Vec::with_capacity(expected),
            wait_turnstile: Vec::with_capacity(expected),
            svc_turnstile: Vec::with_capacity(expected),
            total: Vec::with_capacity(expected),
            queue_total: Vec::with_capacity(expected),
            entry_secs: Vec::with_capacity(expected),
            gate_counts: [0; GATE_COUNT],
        }
    }

    /// Account a fan that just cleared its turnstile.
    pub fn record(&mut self, fan: &Fan) -> Result<(), SimError> {
        let span = |from: Phase, to: Phase| {
            fan.span(from, to).ok_or(SimError::PhaseMissing {
                fan: fan.id,
                phase: to,
            })
        };

        let wait_inspect = span(Phase::Arrival, Phase::InspectionStart)?;
        let wait_turnstile = span(Phase::GateArrival, Phase::TurnstileStart)?;
        self.wait_inspect.push(wait_inspect);
        self.svc_inspect
            .push(span(Phase::InspectionStart, Phase::InspectionEnd)?);
        self.walk.push(span(Phase::InspectionEnd, Phase::GateArrival)?);
        self.wait_turnstile.push(wait_turnstile);
        self.svc_turnstile
            .push(span(Phase::TurnstileStart, Phase::TurnstileEnd)?);
        self.total.push(span(Phase::Arrival, Phase::TurnstileEnd)?);
        self.queue_total.push(wait_inspect + wait_turnstile);

        let entry = fan.stamp(Phase::TurnstileEnd).ok_or(SimError::PhaseMissing {
            fan: fan.id,
            phase: Phase::TurnstileEnd,
        })?;
        self.entry_secs.push(entry);
        self.gate_counts[fan.gate.index()] += 1;
        Ok(())
    }

    pub fn completed(&self) -> usize {
        self.total.len()
    }

    pub fn gate_count(&self, gate: Gate) -> u64 {
        self.gate_counts[gate.index()]
    }

    pub fn phase_summaries(&self) -> PhaseSummaries {
        PhaseSummaries {
            wait_inspect: Summary::of(&self.wait_inspect),
            svc_inspect: Summary::of(&self.svc_inspect),
            walk: Summary::of(&self.walk),
            wait_turnstile: Summary::of(&self.wait_turnstile),
            svc_turnstile: Summary::of(&self.svc_turnstile),
            total: Summary::of(&self.total),
        }
    }

    /// Share of completed fans already inside when the match kicks off.
    pub fn pct_inside_by_kickoff(&self) -> f64 {
        if self.entry_secs.is_empty() {
            return 0.0;
        }
        let inside = self.entry_secs.iter().filter(|&&t| t <= 0.0).count();
        inside as f64 / self.entry_secs.len() as f64 * 100.0
    }

    /// Entry time of the last fan through, in seconds relative to kickoff.
    /// Negative when even the stragglers beat the whistle.
    pub fn last_entry_secs(&self) -> f64 {
        self.entry_secs
            .iter()
            .copied()
            .reduce(f64::max)
            .unwrap_or(0.0)
    }

    pub fn mean_queue_secs(&self) -> f64 {
        mean(&self.queue_total)
    }

    pub fn mean_total_secs(&self) -> f64 {
        mean(&self.total)
    }

    pub fn entry_secs(&self) -> &[f64] {
        &self.entry_secs
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Bin `times_secs` (converted to minutes) into `bin_minutes` intervals
/// from `floor(min/bin)*bin` to `(floor(max/bin)+1)*bin`.
pub fn temporal_histogram(times_secs: &[f64], bin_minutes: u32) -> Vec<HistogramRow> {
    if times_secs.is_empty() || bin_minutes == 0 {
        return Vec::new();
    }

    let minutes: Vec<f64> = times_secs.iter().map(|t| t / 60.0).collect();
    let bin = i64::from(bin_minutes);
    let lo = minutes.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = minutes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let start = (lo / bin as f64).floor() as i64 * bin;
    let end = ((hi / bin as f64).floor() as i64 + 1) * bin;

    let total = minutes.len() as f64;
    let mut rows = Vec::new();
    let mut from = start;
    while from < end {
        let to = from + bin;
        let count = minutes
            .iter()
            .filter(|&&m| m >= from as f64 && m < to as f64)
            .count() as u64;
        rows.push(HistogramRow {
            start_min: from,
            end_min: to,
            count,
            pct: count as f64 / total * 100.0,
        });
        from = to;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fan::Esplanade;

    // ── Summary ──

    #[test]
    fn summary_of_empty_is_all_zero() {
        let s = Summary::of(&[]);
        assert_eq!(s.count, 0);
        assert_eq!(s.mean, 0.0);
        assert_eq!(s.p99, 0.0);
    }

    #[test]
    fn summary_single_value() {
        let s = Summary::of(&[7.0]);
        assert_eq!(s.count, 1);
        assert_eq!(s.mean, 7.0);
        assert_eq!(s.median, 7.0);
        assert_eq!(s.stdev, 0.0);
        assert_eq!(s.min, 7.0);
        assert_eq!(s.max, 7.0);
        assert_eq!(s.p90, 7.0);
    }

    #[test]
    fn summary_basic_moments() {
        let s = Summary::of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((s.mean - 5.0).abs() < 1e-12);
        assert!((s.median - 4.5).abs() < 1e-12);
        // Sample stdev of this classic set is sqrt(32/7).
        assert!((s.stdev - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 9.0);
    }

    #[test]
    fn percentiles_use_nearest_rank_with_clamp() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let s = Summary::of(&values);
        // floor(0.9 * 10) = 9 -> v[9] = 10, clamped inside the slice.
        assert_eq!(s.p90, 10.0);
        assert_eq!(s.p95, 10.0);
        assert_eq!(s.p99, 10.0);

        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let s = Summary::of(&values);
        assert_eq!(s.p90, 91.0);
        assert_eq!(s.p95, 96.0);
        assert_eq!(s.p99, 100.0);
    }

    // ── RunStats ──

    fn completed_fan(id: u32, gate: Gate, stamps: [f64; 6]) -> Fan {
        let mut fan = Fan::new(id, Esplanade::North, gate);
        for (phase, t) in [
            Phase::Arrival,
            Phase::InspectionStart,
            Phase::InspectionEnd,
            Phase::GateArrival,
            Phase::TurnstileStart,
            Phase::TurnstileEnd,
        ]
        .into_iter()
        .zip(stamps)
        {
            fan.mark(phase, t).unwrap();
        }
        fan
    }

    #[test]
    fn record_derives_phase_durations() {
        let mut stats = RunStats::new(1);
        let fan = completed_fan(1, Gate::A, [-300.0, -290.0, -270.0, -210.0, -205.0, -195.0]);
        stats.record(&fan).unwrap();

        let p = stats.phase_summaries();
        assert_eq!(p.wait_inspect.mean, 10.0);
        assert_eq!(p.svc_inspect.mean, 20.0);
        assert_eq!(p.walk.mean, 60.0);
        assert_eq!(p.wait_turnstile.mean, 5.0);
        assert_eq!(p.svc_turnstile.mean, 10.0);
        assert_eq!(p.total.mean, 105.0);
        assert_eq!(stats.mean_queue_secs(), 15.0);
        assert_eq!(stats.completed(), 1);
        assert_eq!(stats.gate_count(Gate::A), 1);
    }

    #[test]
    fn record_rejects_incomplete_fan() {
        let mut stats = RunStats::new(1);
        let mut fan = Fan::new(1, Esplanade::North, Gate::A);
        fan.mark(Phase::Arrival, 0.0).unwrap();
        assert!(matches!(
            stats.record(&fan).unwrap_err(),
            SimError::PhaseMissing { .. }
        ));
    }

    #[test]
    fn kickoff_percentage_counts_nonpositive_entries() {
        let mut stats = RunStats::new(4);
        for (id, end) in [(1, -100.0), (2, -1.0), (3, 0.0), (4, 120.0)] {
            let fan = completed_fan(
                id,
                Gate::B,
                [end - 50.0, end - 45.0, end - 30.0, end - 10.0, end - 8.0, end],
            );
            stats.record(&fan).unwrap();
        }
        assert_eq!(stats.pct_inside_by_kickoff(), 75.0);
        assert_eq!(stats.last_entry_secs(), 120.0);
    }

    // ── Temporal histogram ──

    #[test]
    fn histogram_bins_span_floor_to_ceil() {
        // Entries at -125, -61, -60, -1 minutes.
        let secs = [-7500.0, -3660.0, -3600.0, -60.0];
        let rows = temporal_histogram(&secs, 10);
        assert_eq!(rows.first().unwrap().start_min, -130);
        assert_eq!(rows.last().unwrap().end_min, 0);
        assert_eq!(rows.iter().map(|r| r.count).sum::<u64>(), 4);

        // -61 and -60 land in different 10-minute bins.
        let bin_70 = rows.iter().find(|r| r.start_min == -70).unwrap();
        let bin_60 = rows.iter().find(|r| r.start_min == -60).unwrap();
        assert_eq!(bin_70.count, 1);
        assert_eq!(bin_60.count, 1);
    }

    #[test]
    fn histogram_empty_input() {
        assert!(temporal_histogram(&[], 10).is_empty());
    }
}
