//! In-process store answering the `PF*`, `MH.*` and `DEL` commands with exact
//! set semantics. Used for `--dry-run` and as the reference store in tests.

use super::{Arg, Command, CommandChannel, Response};
use crate::error::BenchResult;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

#[derive(Default)]
pub struct MemoryChannel {
    sets: HashMap<String, HashSet<String>>,
    latency: Option<Duration>,
    calls: u64,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `latency` before answering each command.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Number of commands answered so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn add(&mut self, key: &str, elements: &[String]) -> Response {
        let set = self.sets.entry(key.to_string()).or_default();
        let mut updated = false;
        for el in elements {
            updated |= set.insert(el.clone());
        }
        Response::Integer(i64::from(updated))
    }

    fn union(&self, keys: &[String]) -> HashSet<&String> {
        keys.iter()
            .filter_map(|k| self.sets.get(k))
            .flat_map(|s| s.iter())
            .collect()
    }

    fn intersection(&self, keys: &[String]) -> usize {
        let mut sets = keys.iter().map(|k| self.sets.get(k));
        let Some(Some(first)) = sets.next() else {
            return 0;
        };
        let rest: Vec<Option<&HashSet<String>>> = sets.collect();
        first
            .iter()
            .filter(|el| rest.iter().all(|s| s.is_some_and(|s| s.contains(*el))))
            .count()
    }

    fn merge(&mut self, dest: &str, sources: &[String]) -> Response {
        let merged: HashSet<String> = self.union(sources).into_iter().cloned().collect();
        self.sets.entry(dest.to_string()).or_default().extend(merged);
        Response::Text("OK".to_string())
    }

    fn similarity(&self, keys: &[String]) -> Response {
        let union = self.union(keys).len();
        let ratio = if union == 0 {
            0.0
        } else {
            self.intersection(keys) as f64 / union as f64
        };
        Response::Text(ratio.to_string())
    }
}

fn wrong_arity(name: &str) -> Response {
    Response::Error(format!(
        "ERR wrong number of arguments for '{}' command",
        name.to_lowercase()
    ))
}

impl CommandChannel for MemoryChannel {
    fn send(&mut self, command: &Command) -> BenchResult<Response> {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        self.calls += 1;

        let args: Vec<String> = command
            .arguments()
            .iter()
            .map(|a| match a {
                Arg::Text(s) => s.clone(),
                Arg::Int(i) => i.to_string(),
            })
            .collect();

        let name = command.name();
        let reply = match name {
            "PFADD" | "MH.ADD" => match args.split_first() {
                Some((key, elements)) => self.add(key, elements),
                None => wrong_arity(name),
            },
            "PFCOUNT" | "MH.COUNT" if !args.is_empty() => {
                Response::Integer(self.union(&args).len() as i64)
            }
            "PFMERGE" | "MH.MERGE" => match args.split_first() {
                Some((dest, sources)) => self.merge(dest, sources),
                None => wrong_arity(name),
            },
            "MH.SIMILARITY" if !args.is_empty() => self.similarity(&args),
            "MH.INTERSECTION" if !args.is_empty() => {
                Response::Integer(self.intersection(&args) as i64)
            }
            "DEL" if !args.is_empty() => Response::Integer(
                args.iter().filter(|k| self.sets.remove(*k).is_some()).count() as i64,
            ),
            "PFCOUNT" | "MH.COUNT" | "MH.SIMILARITY" | "MH.INTERSECTION" | "DEL" => {
                wrong_arity(name)
            }
            _ => Response::Error(format!("ERR unknown command '{name}'")),
        };
        Ok(reply)
    }
}
