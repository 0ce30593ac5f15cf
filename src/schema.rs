use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::accuracy::AccuracySummary;
use crate::error::BenchResult;
use crate::harness::TimingResult;
use crate::histogram::DisplayBucket;
use crate::suite::AccuracyOutcome;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub profile: String,
    pub seed: u64,
    pub target: String,
    pub timestamp_utc: String,
    pub git_sha: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingRecord {
    pub name: String,
    pub unit: String,
    pub iters: u64,
    pub total_ns: u128,
    pub ns_per_iter: f64,
}

impl From<&TimingResult> for TimingRecord {
    fn from(t: &TimingResult) -> Self {
        Self {
            name: t.label.clone(),
            unit: "ns/iter".to_string(),
            iters: t.iters,
            total_ns: t.total_ns,
            ns_per_iter: t.ns_per_iter,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketRecord {
    pub lower: usize,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccuracyRecord {
    pub structure: String,
    pub true_cardinality: u64,
    pub trials: u64,
    pub mean_estimate: f64,
    pub mean_abs_relative_error: f64,
    pub min_estimate: u64,
    pub max_estimate: u64,
    pub histogram: Vec<BucketRecord>,
}

impl AccuracyRecord {
    pub fn new(outcome: &AccuracyOutcome) -> Self {
        let AccuracySummary {
            trials,
            mean_estimate,
            mean_abs_relative_error,
            min_estimate,
            max_estimate,
        } = outcome.summary.clone();
        Self {
            structure: outcome.kind.as_str().to_string(),
            true_cardinality: outcome.true_cardinality,
            trials,
            mean_estimate,
            mean_abs_relative_error,
            min_estimate,
            max_estimate,
            histogram: outcome
                .buckets
                .iter()
                .map(|DisplayBucket { lower, count }| BucketRecord {
                    lower: *lower,
                    count: *count,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    pub run: RunMeta,
    pub timings: Vec<TimingRecord>,
    pub accuracy: Vec<AccuracyRecord>,
}

impl BenchReport {
    pub fn write_json(&self, path: &Path) -> BenchResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, json)?;
        Ok(())
    }
}
