//! End-to-end driver: the throughput suite and the accuracy suite.
//!
//! The two suites are independent sequential phases. Each takes exclusive use
//! of one channel for its duration and writes its text report as it goes.

use std::io::Write;

use log::info;

use crate::accuracy::{AccuracyExperiment, AccuracySample, AccuracySummary, StructureKind};
use crate::channel::{Command, CommandChannel};
use crate::config::BenchConfig;
use crate::error::{BenchError, BenchResult};
use crate::harness::{Clock, ThroughputRunner, TimingResult};
use crate::histogram::{self, DisplayBucket, ErrorHistogram, DISPLAY_BUCKETS};
use crate::policy::{self, CommandFamily, Expect, KeySpace};
use crate::report;

/// Elements written into every pre-populated key.
pub const SETUP_ELEMENTS: [i64; 3] = [1, 2, 3];

/// Keys per `DEL` command when clearing a phase's keys.
pub const CLEAR_BATCH: usize = 1_000;

/// Delete `keys` so every structure the phase writes starts out empty.
pub fn clear_keys<C, I>(channel: &mut C, keys: I) -> BenchResult<()>
where
    C: CommandChannel + ?Sized,
    I: IntoIterator<Item = String>,
{
    let mut keys = keys.into_iter().peekable();
    let mut sent = 0u64;
    while keys.peek().is_some() {
        sent += 1;
        let command = Command::new("DEL").args(keys.by_ref().take(CLEAR_BATCH));
        let response = channel.send(&command).map_err(|e| e.at_iteration(sent))?;
        if !Expect::NonNegative.check(&response) {
            return Err(BenchError::InvariantViolation {
                label: "DEL".to_string(),
                iteration: sent,
                response: response.to_string(),
            });
        }
    }
    Ok(())
}

/// Populate `count` distinct keys so count/merge/set-algebra benchmarks
/// never read a key twice.
pub fn setup_keys<C: CommandChannel + ?Sized>(
    channel: &mut C,
    space: &KeySpace,
    kind: StructureKind,
    count: u64,
) -> BenchResult<()> {
    let add = kind.add_command();
    for i in 0..count {
        let command = Command::new(add).arg(space.key(i)).args(SETUP_ELEMENTS);
        let response = channel.send(&command).map_err(|e| e.at_iteration(i + 1))?;
        if !Expect::Flag.check(&response) {
            return Err(BenchError::InvariantViolation {
                label: format!("{add} (setup)"),
                iteration: i + 1,
                response: response.to_string(),
            });
        }
    }
    Ok(())
}

/// Run every command family for every structure that supports it.
pub fn run_throughput<C, K>(
    channel: &mut C,
    cfg: &BenchConfig,
    clock: &K,
    out: &mut dyn Write,
) -> BenchResult<Vec<TimingResult>>
where
    C: CommandChannel + ?Sized,
    K: Clock,
{
    let namespace = cfg.namespace();
    let runner = ThroughputRunner::new(clock);
    let families = [
        CommandFamily::Add,
        CommandFamily::Count,
        CommandFamily::Merge,
        CommandFamily::Similarity,
        CommandFamily::Intersection,
    ];
    let tables: Vec<(StructureKind, KeySpace, Vec<policy::CommandPolicy>)> = StructureKind::ALL
        .iter()
        .map(|&kind| {
            let space = KeySpace::new(&namespace, kind);
            let table =
                policy::throughput_table(&space, cfg.same_key, SETUP_ELEMENTS.len() as i64);
            (kind, space, table)
        })
        .collect();

    for (kind, space, _) in &tables {
        info!("clearing {} keys", kind.as_str());
        clear_keys(&mut *channel, space.run_keys(cfg.iterations))?;
    }

    let mut results = Vec::new();
    let mut comparisons = Vec::new();
    for family in families {
        if family == CommandFamily::Count {
            for (kind, space, _) in &tables {
                info!("populating {} keys for {}", cfg.iterations, kind.as_str());
                setup_keys(&mut *channel, space, *kind, cfg.iterations)?;
            }
        }

        let mut minhash = None;
        let mut loglog = None;
        for (kind, _, table) in &tables {
            let Some(name) = kind.command(family) else {
                continue;
            };
            let Some(row) = table.iter().find(|p| p.family == family) else {
                continue;
            };
            info!("benchmarking {name}");
            let timing = runner.run(
                &mut *channel,
                name,
                cfg.iterations,
                |i| row.keys.command(name, i),
                |r| row.expect.check(r),
            )?;
            out.write_all(report::timing_block(&timing).as_bytes())?;
            match kind {
                StructureKind::HyperMinHash => minhash = Some(results.len()),
                StructureKind::HyperLogLog => loglog = Some(results.len()),
            }
            results.push(timing);
        }
        if let (Some(a), Some(b)) = (minhash, loglog) {
            comparisons.push(report::comparison_line(&results[a], &results[b]));
        }
    }

    for line in comparisons {
        out.write_all(line.as_bytes())?;
    }
    out.write_all(b"\n")?;
    Ok(results)
}

/// Accuracy results for one structure kind.
#[derive(Clone, Debug)]
pub struct AccuracyOutcome {
    pub kind: StructureKind,
    pub true_cardinality: u64,
    pub samples: Vec<AccuracySample>,
    pub histogram: ErrorHistogram,
    pub buckets: Vec<DisplayBucket>,
    pub summary: AccuracySummary,
}

pub fn run_accuracy<C: CommandChannel + ?Sized>(
    channel: &mut C,
    cfg: &BenchConfig,
    kinds: &[StructureKind],
    out: &mut dyn Write,
) -> BenchResult<Vec<AccuracyOutcome>> {
    let namespace = cfg.namespace();
    let mut outcomes = Vec::with_capacity(kinds.len());

    for &kind in kinds {
        info!(
            "accuracy: {} x {} trials of {} elements",
            kind.as_str(),
            cfg.trials,
            cfg.true_cardinality
        );
        let experiment =
            AccuracyExperiment::new(kind, &namespace, cfg.true_cardinality, cfg.batch_size);
        clear_keys(&mut *channel, experiment.trial_keys(cfg.trials))?;
        let (samples, hist) = experiment.run_trials(&mut *channel, cfg.trials)?;
        let buckets = histogram::render(&hist, DISPLAY_BUCKETS)?;
        let summary =
            AccuracySummary::from_samples(&samples).ok_or(BenchError::EmptyDistribution)?;

        let outcome = AccuracyOutcome {
            kind,
            true_cardinality: cfg.true_cardinality,
            samples,
            histogram: hist,
            buckets,
            summary,
        };
        out.write_all(report::accuracy_block(&outcome).as_bytes())?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::memory::MemoryChannel;
    use crate::channel::testing::RecordingChannel;
    use crate::channel::Response;
    use crate::config::Profile;
    use crate::harness::SteppingClock;
    use std::collections::HashSet;
    use std::time::Duration;

    fn small_cfg() -> BenchConfig {
        let mut cfg = BenchConfig::new(Profile::Quick, 1);
        cfg.iterations = 20;
        cfg.trials = 6;
        cfg.true_cardinality = 300;
        cfg.batch_size = 64;
        cfg
    }

    #[test]
    fn throughput_covers_every_command_in_order() {
        let cfg = small_cfg();
        let mut ch = MemoryChannel::new();
        let mut out: Vec<u8> = Vec::new();
        let clock = SteppingClock::new(Duration::from_millis(1));
        let results = run_throughput(&mut ch, &cfg, &clock, &mut out).unwrap();

        let labels: Vec<&str> = results.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(
            labels,
            [
                "MH.ADD",
                "PFADD",
                "MH.COUNT",
                "PFCOUNT",
                "MH.MERGE",
                "PFMERGE",
                "MH.SIMILARITY",
                "MH.INTERSECTION"
            ]
        );
        assert!(results.iter().all(|t| t.iters == 20));

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("PFCOUNT\nTook total of:"));
        assert!(text.contains("MH.ADD vs PFADD:"));
        assert!(text.ends_with("\n\n"));

        // 8 benchmarks, 2 setup passes, one DEL per structure.
        assert_eq!(ch.calls(), 8 * 20 + 2 * 20 + 2);
    }

    #[test]
    fn comparisons_pair_timings_by_family() {
        let cfg = small_cfg();
        let mut ch = MemoryChannel::new();
        let mut out: Vec<u8> = Vec::new();
        let clock = SteppingClock::new(Duration::from_millis(1));
        run_throughput(&mut ch, &cfg, &clock, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().filter(|l| l.contains(" vs ")).collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("MH.ADD vs PFADD:"));
        assert!(lines[1].starts_with("MH.COUNT vs PFCOUNT:"));
        assert!(lines[2].starts_with("MH.MERGE vs PFMERGE:"));
    }

    #[test]
    fn rerun_starts_from_empty_keys() {
        let cfg = small_cfg();
        let mut store = MemoryChannel::new();
        let mut add_replies = Vec::new();
        let mut rec = RecordingChannel::new(|c: &Command| {
            let reply = store.send(c)?;
            // Benchmark adds carry one element; setup adds carry three.
            if matches!(c.name(), "MH.ADD" | "PFADD") && c.arguments().len() == 2 {
                add_replies.push(reply.clone());
            }
            Ok(reply)
        });
        let clock = SteppingClock::new(Duration::from_micros(1));
        for _ in 0..2 {
            run_throughput(&mut rec, &cfg, &clock, &mut std::io::sink()).unwrap();
        }
        drop(rec);

        assert_eq!(add_replies.len(), 2 * 2 * 20);
        assert!(add_replies.iter().all(|r| *r == Response::Integer(1)));

        // Merge destinations do not accumulate across runs.
        let ns = cfg.namespace();
        for prefix in ["mh", "pf"] {
            let count = store
                .send(&Command::new("PFCOUNT").arg(format!("{ns}:{prefix}:dest")))
                .unwrap();
            assert_eq!(count, Response::Integer(3));
        }
    }

    #[test]
    fn accuracy_rerun_starts_from_empty_keys() {
        let mut cfg = small_cfg();
        cfg.batch_size = 1;
        cfg.true_cardinality = 10;
        let mut store = MemoryChannel::new();
        let mut add_replies = Vec::new();
        let mut rec = RecordingChannel::new(|c: &Command| {
            let reply = store.send(c)?;
            if c.name() == "PFADD" {
                add_replies.push(reply.clone());
            }
            Ok(reply)
        });
        let kinds = [StructureKind::HyperLogLog];
        for _ in 0..2 {
            run_accuracy(&mut rec, &cfg, &kinds, &mut std::io::sink()).unwrap();
        }
        drop(rec);

        assert_eq!(add_replies.len(), 2 * 6 * 10);
        assert!(add_replies.iter().all(|r| *r == Response::Integer(1)));
    }

    #[test]
    fn clear_keys_batches_del_commands() {
        let mut ch = RecordingChannel::new(|_: &Command| Ok(Response::Integer(0)));
        clear_keys(&mut ch, (0..2_500).map(|i| format!("k{i}"))).unwrap();
        let sizes: Vec<usize> = ch.sent.iter().map(|c| c.arguments().len()).collect();
        assert_eq!(sizes, [1_000, 1_000, 500]);
        assert!(ch.sent.iter().all(|c| c.name() == "DEL"));

        let mut ch = RecordingChannel::new(|_: &Command| Ok(Response::Integer(0)));
        clear_keys(&mut ch, std::iter::empty()).unwrap();
        assert!(ch.sent.is_empty());
    }

    #[test]
    fn del_error_reply_aborts_clearing() {
        let mut ch = RecordingChannel::new(|_: &Command| Ok(Response::Error("NOPERM".to_string())));
        let err = clear_keys(&mut ch, ["a".to_string()]).unwrap_err();
        assert!(matches!(
            err,
            BenchError::InvariantViolation { ref label, iteration: 1, .. } if label == "DEL"
        ));
    }

    #[test]
    fn count_benchmark_never_repeats_a_key() {
        let cfg = small_cfg();
        let mut ch = RecordingChannel::new(|c: &Command| {
            Ok(match c.name() {
                "PFCOUNT" | "MH.COUNT" | "MH.INTERSECTION" => Response::Integer(3),
                "PFMERGE" | "MH.MERGE" => Response::Text("OK".to_string()),
                "MH.SIMILARITY" => Response::Text("1".to_string()),
                _ => Response::Integer(1),
            })
        });
        let clock = SteppingClock::new(Duration::from_micros(1));
        run_throughput(&mut ch, &cfg, &clock, &mut std::io::sink()).unwrap();

        for name in ["MH.COUNT", "PFCOUNT"] {
            let keys: Vec<String> = ch
                .sent
                .iter()
                .filter(|c| c.name() == name)
                .map(|c| c.to_string())
                .collect();
            let distinct: HashSet<&String> = keys.iter().collect();
            assert_eq!(keys.len(), 20);
            assert_eq!(distinct.len(), keys.len());
        }
    }

    #[test]
    fn wrong_count_reply_aborts_the_suite() {
        let cfg = small_cfg();
        let mut ch = RecordingChannel::new(|c: &Command| {
            Ok(match c.name() {
                "MH.COUNT" => Response::Integer(4),
                _ => Response::Integer(1),
            })
        });
        let clock = SteppingClock::new(Duration::from_micros(1));
        let err = run_throughput(&mut ch, &cfg, &clock, &mut std::io::sink()).unwrap_err();
        assert!(matches!(
            err,
            BenchError::InvariantViolation { ref label, iteration: 1, .. } if label == "MH.COUNT"
        ));
        assert!(ch.sent.iter().all(|c| c.name() != "PFCOUNT"));
    }

    #[test]
    fn same_key_mode_sends_identical_add_commands() {
        let mut cfg = small_cfg();
        cfg.same_key = true;
        let mut ch = MemoryChannel::new();
        let mut rec = RecordingChannel::new(|c: &Command| ch.send(c));
        let clock = SteppingClock::new(Duration::from_micros(1));
        run_throughput(&mut rec, &cfg, &clock, &mut std::io::sink()).unwrap();
        let adds: HashSet<String> = rec
            .sent
            .iter()
            .filter(|c| c.name() == "PFADD" && c.arguments().len() == 2)
            .map(|c| c.to_string())
            .collect();
        assert_eq!(adds.len(), 1);
    }

    #[test]
    fn accuracy_against_exact_store_is_a_single_bucket() {
        let cfg = small_cfg();
        let mut ch = MemoryChannel::new();
        let mut out: Vec<u8> = Vec::new();
        let outcomes = run_accuracy(&mut ch, &cfg, &StructureKind::ALL, &mut out).unwrap();

        assert_eq!(outcomes.len(), 2);
        for o in &outcomes {
            assert_eq!(o.histogram.total(), 6);
            assert_eq!(o.buckets, vec![DisplayBucket { lower: 300, count: 6 }]);
            assert_eq!(o.summary.mean_abs_relative_error, 0.0);
        }
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("HyperMinHash (6 trials, true cardinality 300)"));
        assert!(text.contains("HyperLogLog (6 trials, true cardinality 300)"));
    }
}
