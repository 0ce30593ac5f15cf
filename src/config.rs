use std::time::Duration;

use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{BenchError, BenchResult};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_TRUE_CARDINALITY: u64 = 10_000;
pub const DEFAULT_BATCH_SIZE: usize = 1_000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Largest accepted true cardinality. The accuracy histogram holds one
/// counter per estimate in `[0, 2 * true_cardinality)`.
pub const MAX_TRUE_CARDINALITY: u64 = 1_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Profile {
    Quick,
    Full,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Quick => "quick",
            Profile::Full => "full",
        }
    }

    pub fn iterations(&self) -> u64 {
        match self {
            Profile::Quick => 1_000,
            Profile::Full => 100_000,
        }
    }

    pub fn trials(&self) -> u64 {
        match self {
            Profile::Quick => 50,
            Profile::Full => 500,
        }
    }
}

/// Run configuration, fixed at startup.
#[derive(Clone, Debug)]
pub struct BenchConfig {
    pub profile: Profile,
    pub seed: u64,
    pub host: String,
    pub port: u16,
    /// Iterations per throughput benchmark.
    pub iterations: u64,
    /// Trials per structure kind in the accuracy suite.
    pub trials: u64,
    /// Distinct elements added per accuracy trial.
    pub true_cardinality: u64,
    /// Elements per add command in the accuracy suite.
    pub batch_size: usize,
    /// Connect/read/write deadline for the channel.
    pub timeout: Duration,
    /// Add benchmarks reuse one key and one element.
    pub same_key: bool,
}

impl BenchConfig {
    /// Defaults for `profile`, targeting the default host and port.
    pub fn new(profile: Profile, seed: u64) -> Self {
        Self {
            profile,
            seed,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            iterations: profile.iterations(),
            trials: profile.trials(),
            true_cardinality: DEFAULT_TRUE_CARDINALITY,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: DEFAULT_TIMEOUT,
            same_key: false,
        }
    }

    pub fn validate(&self) -> BenchResult<()> {
        if self.host.trim().is_empty() {
            return Err(BenchError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(BenchError::Config("port must be non-zero".to_string()));
        }
        if self.iterations == 0 {
            return Err(BenchError::InvalidIterations(0));
        }
        if self.trials == 0 {
            return Err(BenchError::Config("trial count must be positive".to_string()));
        }
        if self.true_cardinality == 0 {
            return Err(BenchError::Config(
                "true cardinality must be positive".to_string(),
            ));
        }
        if self.true_cardinality > MAX_TRUE_CARDINALITY {
            return Err(BenchError::Config(format!(
                "true cardinality {} exceeds the maximum of {MAX_TRUE_CARDINALITY}",
                self.true_cardinality
            )));
        }
        if self.batch_size == 0 {
            return Err(BenchError::Config("batch size must be positive".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(BenchError::Config("timeout must be positive".to_string()));
        }
        Ok(())
    }

    pub fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed)
    }

    /// Key namespace for this run. Same seed, same keys.
    pub fn namespace(&self) -> String {
        let tag: u32 = self.rng().gen();
        format!("cb{tag:08x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_profile() {
        let quick = BenchConfig::new(Profile::Quick, 0);
        assert_eq!(quick.iterations, 1_000);
        assert_eq!(quick.trials, 50);

        let full = BenchConfig::new(Profile::Full, 0);
        assert_eq!(full.iterations, 100_000);
        assert_eq!(full.trials, 500);
        assert_eq!(full.port, 6379);
        assert!(full.validate().is_ok());
    }

    #[test]
    fn validation_rejects_zero_counts() {
        let mut cfg = BenchConfig::new(Profile::Quick, 0);
        cfg.iterations = 0;
        assert!(matches!(cfg.validate(), Err(BenchError::InvalidIterations(0))));

        let mut cfg = BenchConfig::new(Profile::Quick, 0);
        cfg.trials = 0;
        assert!(matches!(cfg.validate(), Err(BenchError::Config(_))));

        let mut cfg = BenchConfig::new(Profile::Quick, 0);
        cfg.timeout = Duration::ZERO;
        assert!(matches!(cfg.validate(), Err(BenchError::Config(_))));
    }

    #[test]
    fn validation_caps_true_cardinality() {
        let mut cfg = BenchConfig::new(Profile::Quick, 0);
        cfg.true_cardinality = MAX_TRUE_CARDINALITY;
        assert!(cfg.validate().is_ok());

        for too_big in [MAX_TRUE_CARDINALITY + 1, 5_000_000_000, u64::MAX] {
            cfg.true_cardinality = too_big;
            assert!(matches!(cfg.validate(), Err(BenchError::Config(_))));
        }
    }

    #[test]
    fn namespace_is_deterministic_per_seed() {
        let a = BenchConfig::new(Profile::Quick, 7);
        let b = BenchConfig::new(Profile::Quick, 7);
        let c = BenchConfig::new(Profile::Quick, 8);
        assert_eq!(a.namespace(), b.namespace());
        assert_ne!(a.namespace(), c.namespace());
        assert_eq!(a.namespace().len(), 10);
    }
}
