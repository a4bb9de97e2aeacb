//! External command engine.
//!
//! The configured command gets the final query as its last argument and the
//! dataset as NDJSON on stdin; stdout must be one JSON value.

use super::{Dataset, EngineError, QueryEngine};
use crate::log;
use anyhow::Result;
use serde_json::Value;
use std::{
    io::{ErrorKind, Write},
    path::PathBuf,
    process::{Command, Stdio},
    thread,
};

#[derive(Debug, Clone)]
pub struct CommandEngine {
    /// Program followed by its fixed arguments.
    command: Vec<String>,
    /// Working directory for the child, if any.
    root: Option<PathBuf>,
}

impl CommandEngine {
    pub fn new(command: Vec<String>) -> Result<Self> {
        anyhow::ensure!(!command.is_empty(), "Empty engine command");
        Ok(Self {
            command,
            root: None,
        })
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Program name for logs.
    pub fn name(&self) -> &str {
        self.command.first().map_or("", String::as_str)
    }

    fn prepare(&self, query: &str) -> Command {
        let mut command = Command::new(self.name());
        command.args(&self.command[1..]).arg(query);
        if let Some(dir) = &self.root {
            command.current_dir(dir);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl QueryEngine for CommandEngine {
    type Query = String;

    fn parse(&self, query: &str) -> Result<String, EngineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(EngineError::Parse("empty query".into()));
        }
        Ok(query.to_owned())
    }

    fn evaluate(&self, query: &String, dataset: &Dataset) -> Result<Value, EngineError> {
        let name = self.name().to_owned();
        let spawn_error = |source| EngineError::Spawn {
            command: name.clone(),
            source,
        };

        let mut child = self.prepare(query).spawn().map_err(spawn_error)?;
        let input = dataset.to_ndjson();

        // Feed stdin from a second thread so a chatty child cannot block on a full stdout pipe.
        let output = thread::scope(|scope| {
            if let Some(mut stdin) = child.stdin.take() {
                scope.spawn(move || {
                    if let Err(e) = stdin.write_all(input.as_bytes())
                        && e.kind() != ErrorKind::BrokenPipe
                    {
                        log!("query"; "failed to write dataset to `{}`: {e}", self.name());
                    }
                });
            }
            child.wait_with_output()
        })
        .map_err(spawn_error)?;

        if !output.status.success() {
            return Err(EngineError::Failed {
                command: name,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}
