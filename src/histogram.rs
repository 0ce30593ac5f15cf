//! Raw estimate histograms and their fixed-bucket display projection.

use crate::error::{BenchError, BenchResult};
use serde::Serialize;

/// Number of display buckets used by the report.
pub const DISPLAY_BUCKETS: usize = 20;

/// Occurrence count per estimate, covering `[0, upper_bound)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorHistogram {
    counts: Vec<u64>,
}

impl ErrorHistogram {
    pub fn new(upper_bound: usize) -> Self {
        Self {
            counts: vec![0; upper_bound],
        }
    }

    pub fn from_counts(counts: Vec<u64>) -> Self {
        Self { counts }
    }

    pub fn upper_bound(&self) -> usize {
        self.counts.len()
    }

    /// Count one occurrence of `index`. Returns `false`, recording nothing,
    /// when `index` is outside the histogram.
    pub fn record(&mut self, index: usize) -> bool {
        match self.counts.get_mut(index) {
            Some(c) => {
                *c += 1;
                true
            }
            None => false,
        }
    }

    pub fn count(&self, index: usize) -> u64 {
        self.counts.get(index).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Lowest and highest index with a non-zero count.
    pub fn nonzero_range(&self) -> Option<(usize, usize)> {
        let left = self.counts.iter().position(|&c| c > 0)?;
        let right = self.counts.iter().rposition(|&c| c > 0)?;
        Some((left, right))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DisplayBucket {
    /// Smallest raw index that falls in this bucket.
    pub lower: usize,
    pub count: u64,
}

/// Re-bucket `hist` into at most `buckets` equal-width ranges spanning its
/// non-zero range.
///
/// Fewer buckets are produced when the non-zero range is narrower than
/// `buckets`, so no bucket covers an empty sub-range.
pub fn render(hist: &ErrorHistogram, buckets: usize) -> BenchResult<Vec<DisplayBucket>> {
    let (left, right) = hist.nonzero_range().ok_or(BenchError::EmptyDistribution)?;
    let width = right - left + 1;
    let k = buckets.max(1).min(width);

    let mut out: Vec<DisplayBucket> = (0..k)
        .map(|b| DisplayBucket {
            lower: left + (b * width).div_ceil(k),
            count: 0,
        })
        .collect();

    for (offset, &c) in hist.counts[left..=right].iter().enumerate() {
        out[offset * k / width].count += c;
    }
    Ok(out)
}

/// Render buckets as text bars.
///
/// Bars longer than `max_width` are scaled down proportionally to the
/// largest bucket; a non-empty bucket always gets at least one mark.
pub fn format_bars(buckets: &[DisplayBucket], max_width: usize) -> String {
    let max = buckets.iter().map(|b| b.count).max().unwrap_or(0);
    let label_width = buckets
        .iter()
        .map(|b| b.lower.to_string().len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for b in buckets {
        let len = if max as usize <= max_width || max == 0 {
            b.count as usize
        } else {
            let scaled = (b.count as u128 * max_width as u128 / max as u128) as usize;
            if b.count > 0 {
                scaled.max(1)
            } else {
                0
            }
        };
        out.push_str(&format!(
            "{:>label_width$} | {} {}\n",
            b.lower,
            "*".repeat(len),
            b.count
        ));
    }
    out
}
