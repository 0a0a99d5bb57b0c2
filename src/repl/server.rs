//! Control-plane server and its access point.

use std::io;

use crate::repl::command::{Command, Response};
use crate::repl::executor::Executor;
use crate::repl::history::History;

/// Line-oriented transport collaborator.
///
/// Framing below complete lines (terminators, escaping, connection
/// handling) belongs to the implementation. `poll_line` never blocks: it
/// returns one complete input line when the transport has buffered one,
/// `None` otherwise. `send_line` delivers one response line to whoever
/// sent the last polled line.
pub trait Transport {
    fn poll_line(&mut self) -> io::Result<Option<String>>;

    fn send_line(&mut self, line: &str) -> io::Result<()>;
}

/// Control-plane server: one executor, one history.
///
/// The server runs entirely on the REPL context. History mutation happens
/// only inside `handle_line`, so it needs no synchronization against the
/// inference context.
pub struct ReplServer {
    executor: Executor,
    history: History,
}

impl ReplServer {
    pub fn new(executor: Executor, history: History) -> Self {
        Self { executor, history }
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Registration-time access to the command table.
    pub fn executor_mut(&mut self) -> &mut Executor {
        &mut self.executor
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Parse one input line, dispatch it and record the exchange.
    ///
    /// Blank lines produce an `InvalidArgs` response and are not recorded;
    /// there is no command text to recall. `help` is a server builtin that
    /// renders the registered command table without going through dispatch.
    pub fn handle_line(&mut self, line: &str) -> Response {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(err) => return Response::invalid_args(err.to_string()),
        };
        let response = if command.name == "help" {
            self.help()
        } else {
            self.executor.dispatch(&command)
        };
        self.history.append(line.trim(), response.clone());
        response
    }

    /// Drain every complete line the transport has buffered, writing one
    /// rendered response line per command.
    pub fn service<T: Transport>(&mut self, transport: &mut T) -> io::Result<usize> {
        let mut handled = 0;
        while let Some(line) = transport.poll_line()? {
            let response = self.handle_line(&line);
            transport.send_line(&response.to_string())?;
            handled += 1;
        }
        Ok(handled)
    }

    fn help(&self) -> Response {
        let mut lines = vec!["help - list commands".to_string()];
        for (name, help) in self.executor.commands() {
            lines.push(format!("{name} - {help}"));
        }
        Response::ok(lines.join("; "))
    }
}

/// Single access point to the control plane.
///
/// Constructed once in `main` and passed by reference: algorithm modules
/// register their handlers against `executor_mut` at startup, then the
/// REPL context takes the server and drives it. The context holds no
/// inference or detection state.
pub struct ReplContext {
    server: ReplServer,
}

impl ReplContext {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            server: ReplServer::new(Executor::new(), History::new(history_capacity)),
        }
    }

    pub fn executor(&self) -> &Executor {
        self.server.executor()
    }

    pub fn executor_mut(&mut self) -> &mut Executor {
        self.server.executor_mut()
    }

    pub fn server(&self) -> &ReplServer {
        &self.server
    }

    pub fn server_mut(&mut self) -> &mut ReplServer {
        &mut self.server
    }

    /// Hand the server to the serving context. Registration is over once
    /// this is called.
    pub fn into_server(self) -> ReplServer {
        self.server
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
