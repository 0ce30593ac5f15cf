//! Command channel: the narrow contract the harness needs from a store client.
//!
//! A channel sends one command and waits for one reply. No pipelining and no
//! retries; a failed send ends the run.

use crate::error::{BenchError, BenchResult};
use log::info;
use std::fmt;
use std::time::Duration;

pub mod memory;

/// A single command argument.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Arg {
    Text(String),
    Int(i64),
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Text(s) => write!(f, "{s}"),
            Arg::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Text(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Text(s)
    }
}

impl From<i64> for Arg {
    fn from(i: i64) -> Self {
        Arg::Int(i)
    }
}

/// Command name plus ordered arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<Arg>,
}

impl Command {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<A: Into<Arg>>(mut self, args: impl IntoIterator<Item = A>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[Arg] {
        &self.args
    }

    /// First argument, which is the key for every command family under test.
    pub fn key(&self) -> Option<&Arg> {
        self.args.first()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Reply from the store.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    Integer(i64),
    Text(String),
    Nil,
    /// Error reply sent by the store (e.g. `WRONGTYPE ...`).
    Error(String),
}

impl Response {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Response::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Integer(i) => write!(f, "(integer) {i}"),
            Response::Text(s) => write!(f, "{s:?}"),
            Response::Nil => write!(f, "(nil)"),
            Response::Error(s) => write!(f, "(error) {s}"),
        }
    }
}

pub trait CommandChannel {
    fn send(&mut self, command: &Command) -> BenchResult<Response>;
}

impl<C: CommandChannel + ?Sized> CommandChannel for &mut C {
    fn send(&mut self, command: &Command) -> BenchResult<Response> {
        (**self).send(command)
    }
}

impl<C: CommandChannel + ?Sized> CommandChannel for Box<C> {
    fn send(&mut self, command: &Command) -> BenchResult<Response> {
        (**self).send(command)
    }
}

/// Synchronous channel over a single redis connection.
pub struct RedisChannel {
    con: redis::Connection,
}

impl RedisChannel {
    /// Open one connection. `timeout` bounds the connect and every later read/write.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> BenchResult<Self> {
        let url = format!("redis://{host}:{port}/");
        let client = redis::Client::open(url.as_str())
            .map_err(|err| BenchError::Connection(format!("{url}: {err}")))?;
        let mut con = client
            .get_connection_with_timeout(timeout)
            .map_err(|err| BenchError::Connection(format!("{url}: {err}")))?;
        con.set_read_timeout(Some(timeout))
            .map_err(|err| BenchError::Connection(format!("{url}: {err}")))?;
        con.set_write_timeout(Some(timeout))
            .map_err(|err| BenchError::Connection(format!("{url}: {err}")))?;

        info!("connected to {host}:{port}");
        Ok(Self { con })
    }
}

impl CommandChannel for RedisChannel {
    fn send(&mut self, command: &Command) -> BenchResult<Response> {
        let mut cmd = redis::cmd(command.name());
        for arg in command.arguments() {
            match arg {
                Arg::Text(s) => {
                    cmd.arg(s.as_str());
                }
                Arg::Int(i) => {
                    cmd.arg(*i);
                }
            }
        }

        match cmd.query::<redis::Value>(&mut self.con) {
            Ok(value) => from_value(command.name(), value),
            Err(err) => classify_error(command.name(), err),
        }
    }
}

fn from_value(command: &str, value: redis::Value) -> BenchResult<Response> {
    match value {
        redis::Value::Nil => Ok(Response::Nil),
        redis::Value::Int(i) => Ok(Response::Integer(i)),
        redis::Value::Okay => Ok(Response::Text("OK".to_string())),
        redis::Value::SimpleString(s) => Ok(Response::Text(s)),
        redis::Value::BulkString(bytes) => String::from_utf8(bytes)
            .map(Response::Text)
            .map_err(|err| BenchError::Protocol {
                command: command.to_string(),
                iteration: None,
                detail: format!("non-utf8 bulk reply: {err}"),
            }),
        redis::Value::Double(d) => Ok(Response::Text(d.to_string())),
        redis::Value::Boolean(b) => Ok(Response::Integer(i64::from(b))),
        other => Err(BenchError::Protocol {
            command: command.to_string(),
            iteration: None,
            detail: format!("unexpected reply shape: {other:?}"),
        }),
    }
}

fn classify_error(command: &str, err: redis::RedisError) -> BenchResult<Response> {
    if err.is_timeout() {
        return Err(BenchError::Timeout {
            command: command.to_string(),
            iteration: None,
        });
    }
    if err.is_io_error() || err.is_connection_dropped() {
        return Err(BenchError::Connection(format!("{command}: {err}")));
    }
    // Error replies from the store are data: predicates decide what they mean.
    if err.code().is_some() {
        return Ok(Response::Error(err.to_string()));
    }
    Err(BenchError::Protocol {
        command: command.to_string(),
        iteration: None,
        detail: err.to_string(),
    })
}
