use std::cell::Cell;
use std::time::{Duration, Instant};

use log::debug;

use crate::channel::{Command, CommandChannel, Response};
use crate::error::{BenchError, BenchResult};

/// Monotonic time source.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that advances by a fixed step on every reading.
#[derive(Debug)]
pub struct SteppingClock {
    next: Cell<Instant>,
    step: Duration,
}

impl SteppingClock {
    pub fn new(step: Duration) -> Self {
        Self {
            next: Cell::new(Instant::now()),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Instant {
        let now = self.next.get();
        self.next.set(now + self.step);
        now
    }
}

#[derive(Clone, Debug)]
pub struct TimingResult {
    pub label: String,
    pub iters: u64,
    pub total: Duration,
    pub total_ns: u128,
    pub ns_per_iter: f64,
}

impl TimingResult {
    pub fn per_iteration(&self) -> Duration {
        Duration::from_secs_f64(self.total.as_secs_f64() / self.iters as f64)
    }
}

/// Sequential single-channel throughput measurement.
///
/// One command in flight at a time; the timer covers every send and every
/// predicate check, nothing else.
pub struct ThroughputRunner<'a, K: Clock> {
    clock: &'a K,
}

impl<'a, K: Clock> ThroughputRunner<'a, K> {
    pub fn new(clock: &'a K) -> Self {
        Self { clock }
    }

    /// Send `command_for(i)` for `i in 0..iters`, checking each reply.
    ///
    /// Aborts on the first failing reply with the 1-indexed iteration; no
    /// further commands are sent after it.
    pub fn run<C, F, P>(
        &self,
        channel: &mut C,
        label: &str,
        iters: u64,
        mut command_for: F,
        predicate: P,
    ) -> BenchResult<TimingResult>
    where
        C: CommandChannel + ?Sized,
        F: FnMut(u64) -> Command,
        P: Fn(&Response) -> bool,
    {
        if iters == 0 {
            return Err(BenchError::InvalidIterations(iters));
        }
        debug!("{label}: {iters} iterations");

        let start = self.clock.now();
        for i in 0..iters {
            let command = command_for(i);
            let response = channel.send(&command).map_err(|e| e.at_iteration(i + 1))?;
            if !predicate(&response) {
                return Err(BenchError::InvariantViolation {
                    label: label.to_string(),
                    iteration: i + 1,
                    response: response.to_string(),
                });
            }
        }
        let total = self.clock.now().saturating_duration_since(start);

        let total_ns = total.as_nanos();
        let ns_per_iter = (total_ns as f64) / (iters as f64);

        Ok(TimingResult {
            label: label.to_string(),
            iters,
            total,
            total_ns,
            ns_per_iter,
        })
    }
}
