//! Command registry and dispatch.

use std::collections::HashMap;

use crate::error::CommandError;
use crate::repl::command::{Command, Response};

/// Boxed command handler. Handlers run on the control-plane thread and may
/// only capture state that is safe to share with the inference context.
pub type Handler = Box<dyn Fn(&Command) -> Response + Send>;

struct Registration {
    help: String,
    handler: Handler,
}

/// Name to handler registry.
///
/// Registration happens once at startup through `&mut self`; dispatch takes
/// `&self`, so the table never changes while the server is serving.
#[derive(Default)]
pub struct Executor {
    commands: HashMap<String, Registration>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a unique name. A second registration under
    /// the same name is refused rather than silently replacing the first.
    pub fn register<F>(&mut self, name: &str, help: &str, handler: F) -> Result<(), CommandError>
    where
        F: Fn(&Command) -> Response + Send + 'static,
    {
        if self.commands.contains_key(name) {
            return Err(CommandError::Duplicate(name.to_string()));
        }
        self.commands.insert(
            name.to_string(),
            Registration {
                help: help.to_string(),
                handler: Box::new(handler),
            },
        );
        Ok(())
    }

    /// Resolve and run the handler for `command`.
    pub fn dispatch(&self, command: &Command) -> Response {
        match self.commands.get(&command.name) {
            Some(registration) => (registration.handler)(command),
            None => {
                log::debug!("unknown command '{}'", command.name);
                Response::not_found(&command.name)
            }
        }
    }

    /// Registered names with their help lines, sorted by name.
    pub fn commands(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .commands
            .iter()
            .map(|(name, registration)| (name.clone(), registration.help.clone()))
            .collect();
        entries.sort();
        entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repl::command::Status;

    #[test]
    fn dispatch_routes_to_registered_handler() {
        let mut executor = Executor::new();
        executor
            .register("echo", "repeat the arguments", |cmd: &Command| {
                Response::ok(cmd.args.join(" "))
            })
            .expect("register");

        let cmd = Command::parse("echo hello there").expect("parse");
        let response = executor.dispatch(&cmd);
        assert_eq!(response, Response::ok("hello there"));
    }

    #[test]
    fn unknown_command_reports_not_found() {
        let executor = Executor::new();
        let cmd = Command::parse("bogus").expect("parse");
        let response = executor.dispatch(&cmd);
        assert_eq!(response.status, Status::NotFound);
        assert!(response.payload.contains("bogus"));
    }

    #[test]
    fn duplicate_registration_is_refused() {
        let mut executor = Executor::new();
        executor
            .register("ping", "ping", |_| Response::ok("pong"))
            .expect("register");
        let err = executor
            .register("ping", "ping again", |_| Response::ok("pong"))
            .unwrap_err();
        assert!(matches!(err, CommandError::Duplicate(name) if name == "ping"));
        assert_eq!(executor.len(), 1);
    }

    #[test]
    fn command_listing_is_sorted() {
        let mut executor = Executor::new();
        executor
            .register("zeta", "last", |_| Response::ok(""))
            .expect("register");
        executor
            .register("alpha", "first", |_| Response::ok(""))
            .expect("register");
        let names: Vec<String> = executor.commands().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
