mod aggregate;
mod config;
mod error;
mod events;
mod fan;
mod monitor;
mod report;
mod sampling;
mod sim;
mod stations;
mod stats;

#[cfg(test)]
mod scenario_tests;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::aggregate::{AggregateReport, ArrivalHistogram};
use crate::config::SimConfig;

/// Batch runs print a detailed summary for at most this many runs.
const DETAILED_RUN_SUMMARIES: usize = 5;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present (not required)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ingress_engine=info".into()),
        )
        .init();

    info!("Starting ingress-engine v{}", env!("CARGO_PKG_VERSION"));

    let cfg = SimConfig::from_env()?;
    cfg.validate()?;
    info!(
        fans = cfg.total_fans,
        runs = cfg.num_runs,
        agents = cfg.inspection_agents,
        pre_game_minutes = cfg.pre_game_minutes,
        "Configuration loaded"
    );

    // Seed from config when given, otherwise from OS entropy; either way
    // log it so any batch can be replayed exactly.
    let base_seed = cfg.seed.unwrap_or_else(rand::random::<u64>);
    info!(base_seed, "PRNG seeded");

    let cfg = Arc::new(cfg);
    let runs = aggregate::run_all(cfg.clone(), base_seed).await?;

    if runs.len() < cfg.num_runs as usize {
        warn!(
            completed = runs.len(),
            requested = cfg.num_runs,
            "some runs aborted; aggregating over completed runs only"
        );
    }

    if cfg.num_runs == 1 {
        report::print_run_report(&runs[0]);
    } else {
        for run in runs.iter().take(DETAILED_RUN_SUMMARIES) {
            report::print_run_summary(run);
        }
        if runs.len() > DETAILED_RUN_SUMMARIES {
            println!();
            println!(
                "({} more runs completed; cross-run figures below)",
                runs.len() - DETAILED_RUN_SUMMARIES
            );
        }
    }

    let aggregate = AggregateReport::from_runs(&runs);
    report::print_aggregate(&aggregate, runs.len());

    if let Some(path) = &cfg.arrivals_json_path {
        match ArrivalHistogram::from_runs(&runs, cfg.bin_histogram_minutes) {
            Some(histogram) => {
                let json = serde_json::to_string_pretty(&histogram)
                    .context("serializing arrival histogram")?;
                std::fs::write(path, json)
                    .with_context(|| format!("writing arrival histogram to {path}"))?;
                info!(
                    path = %path,
                    bins = histogram.mean_per_bin.len(),
                    "Arrival histogram written for the plotter"
                );
            }
            None => warn!("no arrival data; skipping histogram hand-off"),
        }
    }

    Ok(())
}
