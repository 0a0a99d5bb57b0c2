//! Device control plane.
//!
//! A line-oriented command protocol for operating a running device:
//! operators retune thresholds, request runs and read back results while
//! inference keeps going on its own execution context. The pieces are
//! layered the way the data flows: `command` (wire types), `executor`
//! (name to handler dispatch), `history` (bounded recall), `server` (the
//! loop tying them to a transport, plus the `ReplContext` access point).

pub mod command;
pub mod executor;
pub mod history;
pub mod server;

pub use command::{Command, Response, Status};
pub use executor::{Executor, Handler};
pub use history::{History, HistoryEntry};
pub use server::{ReplContext, ReplServer, Transport};
