//! Estimation-accuracy experiments.
//!
//! Each trial writes a known number of distinct elements into a fresh key,
//! asks the structure for its estimate, and records the estimate in an
//! [`ErrorHistogram`]. Trials never share keys or elements.

use crate::channel::{Command, CommandChannel};
use crate::error::{BenchError, BenchResult};
use crate::histogram::ErrorHistogram;
use crate::policy::{CommandFamily, Expect};
use log::debug;
use serde::Serialize;

/// The two competing estimators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum StructureKind {
    /// Built-in `PF*` commands.
    HyperLogLog,
    /// `MH.*` module commands.
    HyperMinHash,
}

impl StructureKind {
    pub const ALL: [StructureKind; 2] = [StructureKind::HyperMinHash, StructureKind::HyperLogLog];

    pub fn as_str(&self) -> &'static str {
        match self {
            StructureKind::HyperLogLog => "HyperLogLog",
            StructureKind::HyperMinHash => "HyperMinHash",
        }
    }

    pub fn key_prefix(&self) -> &'static str {
        match self {
            StructureKind::HyperLogLog => "pf",
            StructureKind::HyperMinHash => "mh",
        }
    }

    pub fn add_command(&self) -> &'static str {
        match self {
            StructureKind::HyperLogLog => "PFADD",
            StructureKind::HyperMinHash => "MH.ADD",
        }
    }

    pub fn count_command(&self) -> &'static str {
        match self {
            StructureKind::HyperLogLog => "PFCOUNT",
            StructureKind::HyperMinHash => "MH.COUNT",
        }
    }

    /// Command for `family`, if this structure supports it.
    pub fn command(&self, family: CommandFamily) -> Option<&'static str> {
        family.command_name(*self)
    }
}

/// Counter-based element generator.
///
/// Key and elements are pure functions of `(namespace, kind, trial, i)`, so
/// two trials can never collide, and a rerun with the same namespace produces
/// the same stream.
#[derive(Clone, Debug)]
pub struct ElementGen {
    namespace: String,
    kind: StructureKind,
}

impl ElementGen {
    pub fn new(namespace: &str, kind: StructureKind) -> Self {
        Self {
            namespace: namespace.to_string(),
            kind,
        }
    }

    pub fn key(&self, trial: u64) -> String {
        format!("{}:{}:acc:{trial}", self.namespace, self.kind.key_prefix())
    }

    pub fn element(&self, trial: u64, i: u64) -> String {
        format!("{trial}:{i}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccuracySample {
    pub kind: StructureKind,
    pub trial: u64,
    pub true_cardinality: u64,
    pub estimated: u64,
}

impl AccuracySample {
    pub fn relative_error(&self) -> f64 {
        (self.estimated as f64 - self.true_cardinality as f64) / self.true_cardinality as f64
    }
}

pub struct AccuracyExperiment {
    kind: StructureKind,
    true_cardinality: u64,
    batch_size: usize,
    gen: ElementGen,
}

impl AccuracyExperiment {
    pub fn new(kind: StructureKind, namespace: &str, true_cardinality: u64, batch_size: usize) -> Self {
        Self {
            kind,
            true_cardinality,
            batch_size: batch_size.max(1),
            gen: ElementGen::new(namespace, kind),
        }
    }

    /// Estimates at or above this value cannot be histogrammed.
    pub fn upper_bound(&self) -> usize {
        (self.true_cardinality as usize).saturating_mul(2)
    }

    pub fn new_histogram(&self) -> ErrorHistogram {
        ErrorHistogram::new(self.upper_bound())
    }

    /// Keys written by the first `trials` trials.
    pub fn trial_keys(&self, trials: u64) -> impl Iterator<Item = String> + '_ {
        (0..trials).map(|trial| self.gen.key(trial))
    }

    /// Run one trial: add `true_cardinality` elements in batches, then count once.
    ///
    /// Failures name the trial in their label and carry the 1-indexed command
    /// number within the trial: add batches are `1..=n`, the count is `n + 1`.
    pub fn run<C: CommandChannel + ?Sized>(
        &self,
        channel: &mut C,
        trial: u64,
    ) -> BenchResult<AccuracySample> {
        let key = self.gen.key(trial);
        let add = self.kind.add_command();
        let batch = self.batch_size as u64;

        let mut start = 0u64;
        let mut sent = 0u64;
        while start < self.true_cardinality {
            let end = (start + batch).min(self.true_cardinality);
            sent += 1;
            let command = Command::new(add)
                .arg(key.as_str())
                .args((start..end).map(|i| self.gen.element(trial, i)));
            let response = channel.send(&command).map_err(|e| e.at_iteration(sent))?;
            if !Expect::Flag.check(&response) {
                return Err(BenchError::InvariantViolation {
                    label: format!("{add} (trial {trial})"),
                    iteration: sent,
                    response: response.to_string(),
                });
            }
            start = end;
        }

        let count = self.kind.count_command();
        sent += 1;
        let response = channel
            .send(&Command::new(count).arg(key.as_str()))
            .map_err(|e| e.at_iteration(sent))?;
        let Some(estimate) = response.as_integer() else {
            return Err(BenchError::InvariantViolation {
                label: format!("{count} (trial {trial})"),
                iteration: sent,
                response: response.to_string(),
            });
        };
        if estimate < 0 || estimate as u64 >= self.upper_bound() as u64 {
            return Err(BenchError::AccuracyRange {
                kind: self.kind.as_str().to_string(),
                trial,
                estimate,
                upper_bound: self.upper_bound(),
            });
        }

        debug!(
            "{} trial {trial}: estimated {estimate} of {}",
            self.kind.as_str(),
            self.true_cardinality
        );
        Ok(AccuracySample {
            kind: self.kind,
            trial,
            true_cardinality: self.true_cardinality,
            estimated: estimate as u64,
        })
    }

    /// Run `trials` independent trials and histogram the estimates.
    pub fn run_trials<C: CommandChannel + ?Sized>(
        &self,
        channel: &mut C,
        trials: u64,
    ) -> BenchResult<(Vec<AccuracySample>, ErrorHistogram)> {
        let mut hist = self.new_histogram();
        let mut samples = Vec::new();
        for trial in 0..trials {
            let sample = self.run(&mut *channel, trial)?;
            if !hist.record(sample.estimated as usize) {
                return Err(BenchError::AccuracyRange {
                    kind: self.kind.as_str().to_string(),
                    trial,
                    estimate: sample.estimated as i64,
                    upper_bound: hist.upper_bound(),
                });
            }
            samples.push(sample);
        }
        Ok((samples, hist))
    }
}

/// Summary statistics over one structure kind's samples.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AccuracySummary {
    pub trials: u64,
    pub mean_estimate: f64,
    pub mean_abs_relative_error: f64,
    pub min_estimate: u64,
    pub max_estimate: u64,
}

impl AccuracySummary {
    pub fn from_samples(samples: &[AccuracySample]) -> Option<Self> {
        let min_estimate = samples.iter().map(|s| s.estimated).min()?;
        let max_estimate = samples.iter().map(|s| s.estimated).max()?;
        let n = samples.len() as f64;
        let mean_estimate = samples.iter().map(|s| s.estimated as f64).sum::<f64>() / n;
        let mean_abs_relative_error =
            samples.iter().map(|s| s.relative_error().abs()).sum::<f64>() / n;
        Some(Self {
            trials: samples.len() as u64,
            mean_estimate,
            mean_abs_relative_error,
            min_estimate,
            max_estimate,
        })
    }
}
