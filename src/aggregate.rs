//! Multi-run orchestration: runs K independent simulations in parallel,
//! then folds their results into cross-run statistics and the arrival
//! histogram hand-off for the external plotter.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::config::SimConfig;
use crate::sim::{RunResult, Simulation};

/// Across-run statistics for one scalar metric. `stdev` is the sample
/// standard deviation and reads zero for a single run.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricStats {
    pub mean: f64,
    pub stdev: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl MetricStats {
    pub fn of(values: &[f64]) -> Self {
        let n = values.len();
        if n == 0 {
            return Self {
                mean: 0.0,
                stdev: 0.0,
                min: 0.0,
                max: 0.0,
                n: 0,
            };
        }
        let mean = values.iter().sum::<f64>() / n as f64;
        let stdev = if n > 1 {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };
        Self {
            mean,
            stdev,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }
}

/// The fixed metric set reported across runs.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AggregateReport {
    pub pct_inside_by_kickoff: MetricStats,
    pub last_entry_secs: MetricStats,
    pub mean_queue_secs: MetricStats,
    pub mean_total_secs: MetricStats,
    pub mean_wait_inspect_secs: MetricStats,
    pub mean_wait_turnstile_secs: MetricStats,
    pub peak_inspection_line: MetricStats,
    pub inspection_utilization_pct: MetricStats,
    pub peak_turnstile_line: MetricStats,
    pub turnstile_utilization_pct: MetricStats,
}

impl AggregateReport {
    pub fn from_runs(runs: &[RunResult]) -> Self {
        let collect = |f: &dyn Fn(&RunResult) -> f64| {
            let values: Vec<f64> = runs.iter().map(f).collect();
            MetricStats::of(&values)
        };

        Self {
            pct_inside_by_kickoff: collect(&|r| r.pct_inside_by_kickoff),
            last_entry_secs: collect(&|r| r.last_entry_secs),
            mean_queue_secs: collect(&|r| r.mean_queue_secs),
            mean_total_secs: collect(&|r| r.mean_total_secs),
            mean_wait_inspect_secs: collect(&|r| r.phases.wait_inspect.mean),
            mean_wait_turnstile_secs: collect(&|r| r.phases.wait_turnstile.mean),
            peak_inspection_line: collect(&|r| r.peak_inspection_line as f64),
            inspection_utilization_pct: collect(&|r| r.inspection_utilization_pct),
            peak_turnstile_line: collect(&|r| r.max_turnstile_peak() as f64),
            turnstile_utilization_pct: collect(&|r| r.weighted_turnstile_utilization_pct()),
        }
    }
}

/// Cross-run binned arrival counts, the hand-off consumed by the external
/// plotter. Bin edges are in minutes relative to kickoff and shared by
/// every run; mean and stdev are taken across runs per bin.
#[derive(Debug, Clone, Serialize)]
pub struct ArrivalHistogram {
    pub bin_edges: Vec<f64>,
    pub mean_per_bin: Vec<f64>,
    pub stdev_per_bin: Vec<f64>,
    pub num_runs: usize,
    pub bin_minutes: u32,
}

impl ArrivalHistogram {
    pub fn from_runs(runs: &[RunResult], bin_minutes: u32) -> Option<Self> {
        let per_run: Vec<Vec<f64>> = runs
            .iter()
            .map(|r| r.arrival_secs.iter().map(|t| t / 60.0).collect())
            .collect();
        Self::from_minutes(&per_run, bin_minutes)
    }

    /// Build from per-run arrival times already converted to minutes.
    pub fn from_minutes(per_run: &[Vec<f64>], bin_minutes: u32) -> Option<Self> {
        if bin_minutes == 0 || per_run.iter().all(|r| r.is_empty()) {
            return None;
        }

        let all = per_run.iter().flatten().copied();
        let lo = all.clone().fold(f64::INFINITY, f64::min);
        let hi = all.fold(f64::NEG_INFINITY, f64::max);

        let bin = i64::from(bin_minutes);
        let start = (lo / bin as f64).floor() as i64 * bin;
        let end = ((hi / bin as f64).floor() as i64 + 1) * bin;
        let bins = ((end - start) / bin) as usize;

        // Count each run separately so the spread across runs is visible.
        let counts: Vec<Vec<f64>> = per_run
            .iter()
            .map(|minutes| {
                let mut row = vec![0.0; bins];
                for &m in minutes {
                    let idx = (((m - start as f64) / bin as f64).floor() as usize).min(bins - 1);
                    row[idx] += 1.0;
                }
                row
            })
            .collect();

        let num_runs = per_run.len();
        let mut mean_per_bin = Vec::with_capacity(bins);
        let mut stdev_per_bin = Vec::with_capacity(bins);
        for b in 0..bins {
            let mean = counts.iter().map(|row| row[b]).sum::<f64>() / num_runs as f64;
            // Population stdev: the runs here are the whole population of
            // observations for this bin.
            let var =
                counts.iter().map(|row| (row[b] - mean).powi(2)).sum::<f64>() / num_runs as f64;
            mean_per_bin.push(mean);
            stdev_per_bin.push(var.sqrt());
        }

        Some(Self {
            bin_edges: (0..=bins).map(|k| (start + k as i64 * bin) as f64).collect(),
            mean_per_bin,
            stdev_per_bin,
            num_runs,
            bin_minutes,
        })
    }
}

/// Execute `cfg.num_runs` independent runs. Each gets its own derived
/// seed and its own engine state, so they are free to run concurrently
/// on the blocking pool; results come back in run order. A run that trips
/// an invariant is logged and dropped, and aggregation proceeds over the
/// runs that completed.
pub async fn run_all(cfg: Arc<SimConfig>, base_seed: u64) -> anyhow::Result<Vec<RunResult>> {
    let verbose = cfg.num_runs == 1;

    let mut handles = Vec::with_capacity(cfg.num_runs as usize);
    for i in 0..cfg.num_runs {
        let cfg = cfg.clone();
        let seed = base_seed.wrapping_add(u64::from(i));
        handles.push(tokio::task::spawn_blocking(
            move || -> anyhow::Result<RunResult> {
                let sim = Simulation::new(cfg, i, seed, verbose)?;
                Ok(sim.run()?)
            },
        ));
    }

    let mut results = Vec::new();
    for (i, joined) in futures::future::join_all(handles).await.into_iter().enumerate() {
        match joined {
            Ok(Ok(run)) => {
                info!(
                    run = i,
                    completed = run.completed,
                    events = run.events_processed,
                    last_entry_min = format!("{:.1}", run.last_entry_secs / 60.0),
                    "run finished"
                );
                results.push(run);
            }
            Ok(Err(e)) => error!(run = i, error = %e, "run aborted"),
            Err(e) => error!(run = i, error = %e, "run task failed"),
        }
    }

    if results.is_empty() {
        anyhow::bail!("no simulation run completed");
    }
    Ok(results)
}
