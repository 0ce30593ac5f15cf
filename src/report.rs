//! Human-readable report text.

use crate::harness::TimingResult;
use crate::histogram::format_bars;
use crate::suite::AccuracyOutcome;

/// Widest histogram bar, in characters.
pub const MAX_BAR_WIDTH: usize = 60;

/// One timing block, followed by a blank line.
pub fn timing_block(t: &TimingResult) -> String {
    let per_iter = t.per_iteration().as_secs_f64();
    format!(
        "{}\nTook total of: {:.6} s\nPer iteration: {:.9} s ({:.6} ms)\n\n",
        t.label,
        t.total.as_secs_f64(),
        per_iter,
        per_iter * 1000.0
    )
}

/// Accuracy heading, summary line and histogram bars, followed by a blank line.
pub fn accuracy_block(outcome: &AccuracyOutcome) -> String {
    let s = &outcome.summary;
    let mut out = format!(
        "{} ({} trials, true cardinality {})\n",
        outcome.kind.as_str(),
        s.trials,
        outcome.true_cardinality
    );
    out.push_str(&format!(
        "mean estimate {:.1}, mean |error| {:.3}%, range [{}, {}]\n",
        s.mean_estimate,
        s.mean_abs_relative_error * 100.0,
        s.min_estimate,
        s.max_estimate
    ));
    out.push_str(&format_bars(&outcome.buckets, MAX_BAR_WIDTH));
    out.push('\n');
    out
}

/// Throughput ratio line comparing two timings of the same family.
pub fn comparison_line(a: &TimingResult, b: &TimingResult) -> String {
    if b.ns_per_iter <= 0.0 {
        return format!("{} vs {}: n/a\n", a.label, b.label);
    }
    format!(
        "{} vs {}: {:.2}x per-call time\n",
        a.label,
        b.label,
        a.ns_per_iter / b.ns_per_iter
    )
}
