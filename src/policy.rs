//! Per-command-family key policy and expected reply shape.
//!
//! Every command under test is described by data here instead of ad-hoc
//! checks at the call site: which key each iteration touches, and what a
//! correct reply looks like.

use crate::accuracy::StructureKind;
use crate::channel::{Command, Response};

/// Command families exercised by the throughput suite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandFamily {
    Add,
    Count,
    Merge,
    Similarity,
    Intersection,
}

impl CommandFamily {
    /// Command name for `kind`, or `None` when that structure lacks the family.
    pub fn command_name(&self, kind: StructureKind) -> Option<&'static str> {
        match (kind, self) {
            (StructureKind::HyperLogLog, CommandFamily::Add) => Some("PFADD"),
            (StructureKind::HyperLogLog, CommandFamily::Count) => Some("PFCOUNT"),
            (StructureKind::HyperLogLog, CommandFamily::Merge) => Some("PFMERGE"),
            (StructureKind::HyperLogLog, _) => None,
            (StructureKind::HyperMinHash, CommandFamily::Add) => Some("MH.ADD"),
            (StructureKind::HyperMinHash, CommandFamily::Count) => Some("MH.COUNT"),
            (StructureKind::HyperMinHash, CommandFamily::Merge) => Some("MH.MERGE"),
            (StructureKind::HyperMinHash, CommandFamily::Similarity) => Some("MH.SIMILARITY"),
            (StructureKind::HyperMinHash, CommandFamily::Intersection) => {
                Some("MH.INTERSECTION")
            }
        }
    }
}

/// Which keys (and elements) a given iteration uses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyPolicy {
    /// Same key, same element every iteration: exercises caching paths.
    Fixed { key: String, element: String },
    /// One key for the run, element = iteration index.
    VaryingElement { key: String },
    /// `{prefix}{i}` per iteration, so no reply can come from a cache.
    DistinctKey { prefix: String },
    /// Shared destination, `{prefix}{i}` as the source.
    SharedDestination { dest: String, prefix: String },
    /// `baseline` paired against `{prefix}{i}`.
    PairedWithBaseline { baseline: String, prefix: String },
}

impl KeyPolicy {
    /// Build the command for the 0-based `iteration`. Pure in `iteration`.
    pub fn command(&self, name: &str, iteration: u64) -> Command {
        match self {
            KeyPolicy::Fixed { key, element } => {
                Command::new(name).arg(key.as_str()).arg(element.as_str())
            }
            KeyPolicy::VaryingElement { key } => Command::new(name)
                .arg(key.as_str())
                .arg(iteration.to_string()),
            KeyPolicy::DistinctKey { prefix } => {
                Command::new(name).arg(format!("{prefix}{iteration}"))
            }
            KeyPolicy::SharedDestination { dest, prefix } => Command::new(name)
                .arg(dest.as_str())
                .arg(format!("{prefix}{iteration}")),
            KeyPolicy::PairedWithBaseline { baseline, prefix } => Command::new(name)
                .arg(baseline.as_str())
                .arg(format!("{prefix}{iteration}")),
        }
    }
}

/// Expected reply shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Expect {
    /// Integer 0 or 1.
    Flag,
    Exactly(i64),
    NonNegative,
    /// The `OK` status sentinel.
    Okay,
    /// A real number in `[0, 1]`, sent as text.
    Ratio,
}

impl Expect {
    pub fn check(&self, response: &Response) -> bool {
        match (self, response) {
            (_, Response::Error(_)) => false,
            (Expect::Flag, Response::Integer(i)) => *i == 0 || *i == 1,
            (Expect::Exactly(want), Response::Integer(i)) => i == want,
            (Expect::NonNegative, Response::Integer(i)) => *i >= 0,
            (Expect::Okay, Response::Text(s)) => s == "OK",
            (Expect::Ratio, Response::Text(s)) => s
                .trim()
                .parse::<f64>()
                .is_ok_and(|r| (0.0..=1.0).contains(&r)),
            _ => false,
        }
    }
}

/// One row of the policy table: how a family is driven and checked.
#[derive(Clone, Debug)]
pub struct CommandPolicy {
    pub family: CommandFamily,
    pub keys: KeyPolicy,
    pub expect: Expect,
}

const ADD_KEY: &str = "add";
const FIXED_KEY: &str = "hello";
const FIXED_ELEMENT: &str = "123";
const DEST_KEY: &str = "dest";

/// Key namespace for one structure kind inside one run.
#[derive(Clone, Debug)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(namespace: &str, kind: StructureKind) -> Self {
        Self {
            prefix: format!("{namespace}:{}", kind.key_prefix()),
        }
    }

    /// The `i`-th pre-populated key.
    pub fn key(&self, i: u64) -> String {
        format!("{}:key{i}", self.prefix)
    }

    fn key_prefix(&self) -> String {
        format!("{}:key", self.prefix)
    }

    fn named(&self, name: &str) -> String {
        format!("{}:{name}", self.prefix)
    }

    /// Every key the throughput table can touch in a run of `iterations`.
    pub fn run_keys(&self, iterations: u64) -> impl Iterator<Item = String> + '_ {
        [ADD_KEY, FIXED_KEY, DEST_KEY]
            .into_iter()
            .map(|name| self.named(name))
            .chain((0..iterations).map(|i| self.key(i)))
    }
}

/// Policy table for the throughput suite.
///
/// `setup_cardinality` is the number of elements written into every
/// pre-populated key, which is what count and intersection must return.
pub fn throughput_table(
    space: &KeySpace,
    same_key: bool,
    setup_cardinality: i64,
) -> Vec<CommandPolicy> {
    let add_keys = if same_key {
        KeyPolicy::Fixed {
            key: space.named(FIXED_KEY),
            element: FIXED_ELEMENT.to_string(),
        }
    } else {
        KeyPolicy::VaryingElement {
            key: space.named(ADD_KEY),
        }
    };

    vec![
        CommandPolicy {
            family: CommandFamily::Add,
            keys: add_keys,
            expect: Expect::Flag,
        },
        CommandPolicy {
            family: CommandFamily::Count,
            keys: KeyPolicy::DistinctKey {
                prefix: space.key_prefix(),
            },
            expect: Expect::Exactly(setup_cardinality),
        },
        CommandPolicy {
            family: CommandFamily::Merge,
            keys: KeyPolicy::SharedDestination {
                dest: space.named(DEST_KEY),
                prefix: space.key_prefix(),
            },
            expect: Expect::Okay,
        },
        CommandPolicy {
            family: CommandFamily::Similarity,
            keys: KeyPolicy::PairedWithBaseline {
                baseline: space.key(0),
                prefix: space.key_prefix(),
            },
            expect: Expect::Ratio,
        },
        CommandPolicy {
            family: CommandFamily::Intersection,
            keys: KeyPolicy::PairedWithBaseline {
                baseline: space.key(0),
                prefix: space.key_prefix(),
            },
            expect: Expect::Exactly(setup_cardinality),
        },
    ]
}
