use cardinality_bench::accuracy::StructureKind;
use cardinality_bench::channel::memory::MemoryChannel;
use cardinality_bench::channel::{CommandChannel, RedisChannel};
use cardinality_bench::config::{
    BenchConfig, Profile, DEFAULT_BATCH_SIZE, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TRUE_CARDINALITY,
};
use cardinality_bench::error::BenchResult;
use cardinality_bench::harness::MonotonicClock;
use cardinality_bench::schema::{AccuracyRecord, BenchReport, RunMeta, TimingRecord};
use cardinality_bench::suite;
use cardinality_bench::KindSelection;
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Quick,
    Full,
}

impl From<ProfileArg> for Profile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::Quick => Profile::Quick,
            ProfileArg::Full => Profile::Full,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per-command latency: add, count, merge, similarity, intersection.
    Throughput {
        /// Reuse one key and one element for the add benchmarks.
        #[arg(long, default_value_t = false)]
        same_key: bool,
    },

    /// Estimation error distribution over repeated fixed-cardinality trials.
    Accuracy {
        /// Which estimator(s) to run.
        #[arg(long, value_enum, default_value_t = KindSelection::All)]
        kind: KindSelection,
    },

    /// Throughput suite, then accuracy suite (default).
    Suite {
        #[arg(long, default_value_t = false)]
        same_key: bool,

        #[arg(long, value_enum, default_value_t = KindSelection::All)]
        kind: KindSelection,
    },
}

#[derive(Parser, Debug)]
#[command(name = "cardinality-bench")]
#[command(about = "Throughput and accuracy benchmarks for PF* (HyperLogLog) vs MH.* (HyperMinHash)")]
struct Args {
    #[arg(long, value_enum, default_value_t = ProfileArg::Quick, global = true)]
    profile: ProfileArg,

    /// Seeds the run's key namespace.
    #[arg(long, default_value_t = 0, global = true)]
    seed: u64,

    #[arg(long, env = "REDIS_HOST", default_value = DEFAULT_HOST, global = true)]
    host: String,

    #[arg(long, env = "REDIS_PORT", default_value_t = DEFAULT_PORT, global = true)]
    port: u16,

    /// Iterations per throughput benchmark (default from --profile).
    #[arg(long, global = true)]
    iterations: Option<u64>,

    /// Trials per estimator in the accuracy suite (default from --profile).
    #[arg(long, global = true)]
    trials: Option<u64>,

    /// Distinct elements per accuracy trial.
    #[arg(long, default_value_t = DEFAULT_TRUE_CARDINALITY, global = true)]
    cardinality: u64,

    /// Elements per add command in the accuracy suite.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, global = true)]
    batch_size: usize,

    /// Connect/read/write deadline per command, in milliseconds.
    #[arg(long, default_value_t = 5_000, global = true)]
    timeout_ms: u64,

    /// Run against an in-process exact store instead of a server.
    #[arg(long, default_value_t = false, global = true)]
    dry_run: bool,

    /// Also write a JSON report to this file.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Option<Command>,
}

fn now_utc() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("unix:{secs}")
}

fn git_sha_short() -> Option<String> {
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}

fn open_channel(cfg: &BenchConfig, dry_run: bool) -> BenchResult<Box<dyn CommandChannel>> {
    if dry_run {
        info!("dry run: using in-process store");
        return Ok(Box::new(MemoryChannel::new()));
    }
    Ok(Box::new(RedisChannel::connect(
        &cfg.host,
        cfg.port,
        cfg.timeout,
    )?))
}

fn run(args: Args) -> BenchResult<()> {
    let profile: Profile = args.profile.into();
    let mut cfg = BenchConfig::new(profile, args.seed);
    cfg.host = args.host.clone();
    cfg.port = args.port;
    cfg.iterations = args.iterations.unwrap_or(profile.iterations());
    cfg.trials = args.trials.unwrap_or(profile.trials());
    cfg.true_cardinality = args.cardinality;
    cfg.batch_size = args.batch_size;
    cfg.timeout = Duration::from_millis(args.timeout_ms);

    let (throughput, kinds): (bool, Vec<StructureKind>) = match args.cmd {
        Some(Command::Throughput { same_key }) => {
            cfg.same_key = same_key;
            (true, Vec::new())
        }
        Some(Command::Accuracy { kind }) => (false, kind.kinds()),
        Some(Command::Suite { same_key, kind }) => {
            cfg.same_key = same_key;
            (true, kind.kinds())
        }
        None => (true, KindSelection::All.kinds()),
    };
    cfg.validate()?;
    info!(
        "target {}:{} profile={} iterations={} trials={} cardinality={}",
        cfg.host,
        cfg.port,
        cfg.profile.as_str(),
        cfg.iterations,
        cfg.trials,
        cfg.true_cardinality
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut timings = Vec::new();
    if throughput {
        let mut channel = open_channel(&cfg, args.dry_run)?;
        timings = suite::run_throughput(&mut channel, &cfg, &MonotonicClock, &mut out)?;
    }

    let mut accuracy = Vec::new();
    if !kinds.is_empty() {
        let mut channel = open_channel(&cfg, args.dry_run)?;
        accuracy = suite::run_accuracy(&mut channel, &cfg, &kinds, &mut out)?;
    }
    out.flush()?;

    if let Some(path) = args.out {
        let report = BenchReport {
            run: RunMeta {
                schema_version: 1,
                bench_version: env!("CARGO_PKG_VERSION").to_string(),
                profile: cfg.profile.as_str().to_string(),
                seed: cfg.seed,
                target: if args.dry_run {
                    "memory".to_string()
                } else {
                    format!("{}:{}", cfg.host, cfg.port)
                },
                timestamp_utc: now_utc(),
                git_sha: git_sha_short(),
            },
            timings: timings.iter().map(TimingRecord::from).collect(),
            accuracy: accuracy.iter().map(AccuracyRecord::new).collect(),
        };
        report.write_json(&path)?;
        info!("wrote JSON report to {}", path.display());
    }

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
