//! Human-readable stdout reports. Everything here is formatting; every
//! number comes from the engine. Reports go to stdout (they are the
//! program's product), diagnostics go through `tracing`.

use crate::aggregate::{AggregateReport, MetricStats};
use crate::sim::RunResult;
use crate::stats::Summary;

/// Bin width of the entries-over-time table in the per-run report.
const REPORT_BIN_MINUTES: u32 = 10;

/// Rows of the entries-over-time table (covers two hours at 10-minute bins).
const REPORT_HISTOGRAM_ROWS: usize = 12;

/// Width of the ASCII bar next to the largest histogram row.
const BAR_WIDTH: usize = 10;

/// Group digits in threes: 50000 -> "50,000".
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// A bar proportional to `count / max`, at most `BAR_WIDTH` characters.
fn bar(count: u64, max: u64) -> String {
    if max == 0 {
        return String::new();
    }
    let len = (count as f64 / max as f64 * BAR_WIDTH as f64) as usize;
    "#".repeat(len)
}

fn status_tag(occupancy_pct: f64) -> &'static str {
    if occupancy_pct > 90.0 {
        "saturated"
    } else if occupancy_pct > 80.0 {
        "high"
    } else {
        "normal"
    }
}

/// "12.3 minutes before kickoff" / "4.0 minutes after kickoff".
fn kickoff_relative(secs: f64) -> String {
    let minutes = secs / 60.0;
    if minutes <= 0.0 {
        format!("{:.1} minutes before kickoff", minutes.abs())
    } else {
        format!("{minutes:.1} minutes after kickoff")
    }
}

fn phase_block(title: &str, s: &Summary) {
    println!("{title}");
    println!("{}", "-".repeat(60));
    if s.count == 0 {
        println!("no data");
        println!();
        return;
    }
    println!(
        "mean   {:6.1} min ({:5.0}s) | median {:6.1} min ({:5.0}s)",
        s.mean / 60.0,
        s.mean,
        s.median / 60.0,
        s.median
    );
    println!(
        "p90    {:6.1} min ({:5.0}s) | p95    {:6.1} min ({:5.0}s)",
        s.p90 / 60.0,
        s.p90,
        s.p95 / 60.0,
        s.p95
    );
    println!(
        "min    {:6.1} min ({:5.0}s) | max    {:6.1} min ({:5.0}s)",
        s.min / 60.0,
        s.min,
        s.max / 60.0,
        s.max
    );
    println!();
}

/// The full single-run document: headline figures, the six per-phase
/// blocks, the gate table, the entries-over-time table, and resource
/// peaks/utilization.
pub fn print_run_report(result: &RunResult) {
    println!();
    println!("{}", "=".repeat(72));
    println!("INGRESS SIMULATION REPORT (run {})", result.run_index + 1);
    println!("{}", "=".repeat(72));
    println!("fans processed:        {}", group_thousands(result.completed));
    println!(
        "last entry:            {}",
        kickoff_relative(result.last_entry_secs)
    );
    println!(
        "inside by kickoff:     {:.1}%",
        result.pct_inside_by_kickoff
    );
    println!(
        "mean time in queues:   {:.1} min",
        result.mean_queue_secs / 60.0
    );
    println!(
        "mean total time:       {:.1} min",
        result.mean_total_secs / 60.0
    );
    println!("{}", "=".repeat(72));
    println!();

    phase_block("WAIT FOR INSPECTION", &result.phases.wait_inspect);
    phase_block("INSPECTION SERVICE", &result.phases.svc_inspect);
    phase_block("WALK TO GATE", &result.phases.walk);
    phase_block("WAIT AT TURNSTILE", &result.phases.wait_turnstile);
    phase_block("TURNSTILE SERVICE", &result.phases.svc_turnstile);
    phase_block("TOTAL (ARRIVAL TO ENTRY)", &result.phases.total);

    println!("GATES");
    println!("{}", "-".repeat(72));
    println!(
        "{:<6} {:>10} {:>8} {:>10} {:>10} {:>10}  {}",
        "gate", "count", "% total", "occupancy", "peak line", "busy %", "status"
    );
    for g in &result.gates {
        println!(
            "{:<6} {:>10} {:>7.1}% {:>9.1}% {:>10} {:>9.1}%  {}",
            g.gate.label(),
            group_thousands(g.count),
            g.pct_of_total,
            g.occupancy_pct,
            g.peak_line,
            g.utilization_pct,
            status_tag(g.occupancy_pct)
        );
    }
    println!();

    println!("ENTRIES OVER TIME ({REPORT_BIN_MINUTES}-minute bins)");
    println!("{}", "-".repeat(60));
    let rows = crate::stats::temporal_histogram(&result.entry_secs, REPORT_BIN_MINUTES);
    let shown = &rows[..rows.len().min(REPORT_HISTOGRAM_ROWS)];
    let max = shown.iter().map(|r| r.count).max().unwrap_or(0);
    for row in shown {
        println!(
            "{:>5} to {:>4} min {:>9} {:>6.1}%  {}",
            row.start_min,
            row.end_min,
            group_thousands(row.count),
            row.pct,
            bar(row.count, max)
        );
    }
    println!();

    println!("RESOURCES");
    println!("{}", "-".repeat(60));
    println!(
        "inspection: peak line {}, utilization {:.1}% over a {:.1}-minute span",
        group_thousands(result.peak_inspection_line as u64),
        result.inspection_utilization_pct,
        result.span_secs / 60.0
    );
    println!("{}", "=".repeat(72));
}

/// Compact per-run summary used for the first few runs of a batch.
pub fn print_run_summary(result: &RunResult) {
    println!();
    println!(
        "run {} done: {} fans | {:.1}% inside by kickoff | mean total {:.1} min",
        result.run_index + 1,
        group_thousands(result.completed),
        result.pct_inside_by_kickoff,
        result.mean_total_secs / 60.0
    );
    println!(
        "  inspection: peak line {}, utilization {:.1}%",
        group_thousands(result.peak_inspection_line as u64),
        result.inspection_utilization_pct
    );
    for g in &result.gates {
        println!(
            "  gate {}: peak line {:>5} | bank utilization {:.1}%",
            g.gate.label(),
            g.peak_line,
            g.utilization_pct
        );
    }
    if let Some(worst) = result.gates.iter().max_by_key(|g| g.peak_line) {
        println!(
            "  bottleneck: gate {} with a line of {}",
            worst.gate.label(),
            group_thousands(worst.peak_line as u64)
        );
    }
}

fn aggregate_entry(label: &str, m: &MetricStats, unit: &str, as_minutes: bool) {
    let scale = if as_minutes { 60.0 } else { 1.0 };
    println!("{label}");
    if m.n == 1 {
        println!("  value {:.2}{unit}", m.mean / scale);
    } else {
        println!(
            "  mean {:.2}{unit} (+/- {:.2})",
            m.mean / scale,
            m.stdev / scale
        );
        println!("  range [{:.2}, {:.2}]{unit}", m.min / scale, m.max / scale);
    }
    println!("  n {}", m.n);
    println!();
}

/// The cross-run aggregate block, printed for every invocation.
pub fn print_aggregate(agg: &AggregateReport, num_runs: usize) {
    println!();
    println!("{}", "=".repeat(72));
    if num_runs == 1 {
        println!("AGGREGATE (single run)");
    } else {
        println!("AGGREGATE OVER {num_runs} RUNS");
    }
    println!("{}", "=".repeat(72));
    println!();

    aggregate_entry(
        "fans inside by kickoff",
        &agg.pct_inside_by_kickoff,
        "%",
        false,
    );
    aggregate_entry("last entry", &agg.last_entry_secs, " min", true);
    aggregate_entry("mean time in queues", &agg.mean_queue_secs, " min", true);
    aggregate_entry("mean total time", &agg.mean_total_secs, " min", true);
    aggregate_entry(
        "mean wait for inspection",
        &agg.mean_wait_inspect_secs,
        " min",
        true,
    );
    aggregate_entry(
        "mean wait at turnstile",
        &agg.mean_wait_turnstile_secs,
        " min",
        true,
    );
    aggregate_entry(
        "peak inspection line",
        &agg.peak_inspection_line,
        " fans",
        false,
    );
    aggregate_entry(
        "inspection utilization",
        &agg.inspection_utilization_pct,
        "%",
        false,
    );
    aggregate_entry(
        "peak turnstile line (worst gate)",
        &agg.peak_turnstile_line,
        " fans",
        false,
    );
    aggregate_entry(
        "turnstile utilization (capacity-weighted)",
        &agg.turnstile_utilization_pct,
        "%",
        false,
    );
    println!("{}", "=".repeat(72));
}
