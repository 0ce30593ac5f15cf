//! Error taxonomy for the harness.
//!
//! Every variant is fatal for the run it occurs in: the harness measures, it
//! does not recover. Variants carry enough context (command, iteration, raw
//! response) to be reported as-is.

use std::fmt;

pub type BenchResult<T> = std::result::Result<T, BenchError>;

#[derive(Debug)]
pub enum BenchError {
    /// Target store could not be reached.
    Connection(String),
    /// Malformed or unexpected reply.
    Protocol {
        command: String,
        iteration: Option<u64>,
        detail: String,
    },
    /// No reply within the channel deadline.
    Timeout {
        command: String,
        iteration: Option<u64>,
    },
    /// A reply failed its expected-shape predicate. Points at the store, not the harness.
    InvariantViolation {
        label: String,
        iteration: u64,
        response: String,
    },
    /// Estimated cardinality outside the histogram's representable range.
    AccuracyRange {
        kind: String,
        trial: u64,
        estimate: i64,
        upper_bound: usize,
    },
    /// Nothing to histogram.
    EmptyDistribution,
    /// Iteration count must be positive.
    InvalidIterations(u64),
    Config(String),
    Io(std::io::Error),
}

impl BenchError {
    /// Attach the 1-indexed iteration to channel-level errors that lack one.
    pub fn at_iteration(self, iteration: u64) -> Self {
        match self {
            BenchError::Protocol {
                command,
                iteration: None,
                detail,
            } => BenchError::Protocol {
                command,
                iteration: Some(iteration),
                detail,
            },
            BenchError::Timeout {
                command,
                iteration: None,
            } => BenchError::Timeout {
                command,
                iteration: Some(iteration),
            },
            other => other,
        }
    }
}

fn fmt_iteration(iteration: &Option<u64>) -> String {
    match iteration {
        Some(i) => format!(" at iteration {i}"),
        None => String::new(),
    }
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchError::Connection(s) => write!(f, "connection error: {s}"),
            BenchError::Protocol {
                command,
                iteration,
                detail,
            } => write!(
                f,
                "protocol error in {command}{}: {detail}",
                fmt_iteration(iteration)
            ),
            BenchError::Timeout { command, iteration } => write!(
                f,
                "timed out waiting for {command}{}",
                fmt_iteration(iteration)
            ),
            BenchError::InvariantViolation {
                label,
                iteration,
                response,
            } => write!(
                f,
                "unexpected response from {label} at iteration {iteration}: {response} (the store under test is probably buggy)"
            ),
            BenchError::AccuracyRange {
                kind,
                trial,
                estimate,
                upper_bound,
            } => write!(
                f,
                "{kind} trial {trial} estimated {estimate}, outside [0, {upper_bound})"
            ),
            BenchError::EmptyDistribution => write!(f, "histogram has no non-zero buckets"),
            BenchError::InvalidIterations(n) => {
                write!(f, "iteration count must be positive, got {n}")
            }
            BenchError::Config(s) => write!(f, "config error: {s}"),
            BenchError::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for BenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BenchError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BenchError {
    fn from(e: std::io::Error) -> Self {
        BenchError::Io(e)
    }
}
