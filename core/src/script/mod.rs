//! Script runner task.
//!
//! # Design
//! Running the script is delegated to a [`ScriptEngine`]. The task only
//! resolves the script file, asks the engine to compile it, builds the
//! [`Bindings`] and runs the compiled script with them. Compilation happens
//! before any binding exists, so a script that fails to compile never
//! observes its variables.
//!
//! Bindings are an explicit, ordered name → value mapping. The reserved
//! `log` binding comes first, then the configured properties, then the
//! reserved `project` binding; a later entry with the same name replaces an
//! earlier one.

pub mod shell;

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::ScriptConfig;
use crate::error::{Error, Result};
use crate::types::{Params, ProjectInfo};

pub use shell::ShellEngine;

pub const LOG_BINDING: &str = "log";
pub const PROJECT_BINDING: &str = "project";

/// Logging sink handed to scripts as the `log` binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogSink;

impl LogSink {
    pub fn debug(&self, message: &str) {
        tracing::debug!(target: "plumb::script", "{message}");
    }

    pub fn info(&self, message: &str) {
        tracing::info!(target: "plumb::script", "{message}");
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(target: "plumb::script", "{message}");
    }

    pub fn error(&self, message: &str) {
        tracing::error!(target: "plumb::script", "{message}");
    }
}

/// Value of a single script binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Text(String),
    Log(LogSink),
    Project(ProjectInfo),
}

/// Ordered set of named values visible to a running script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings(Vec<(String, Binding)>);

impl Bindings {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// The standard binding set: `log`, the properties, then `project`.
    pub fn for_script(log: LogSink, properties: &Params, project: Option<&ProjectInfo>) -> Self {
        let mut bindings = Bindings::new();
        bindings.set(LOG_BINDING, Binding::Log(log));
        for (name, value) in properties.iter() {
            bindings.set(name, Binding::Text(value.to_string()));
        }
        if let Some(project) = project {
            bindings.set(PROJECT_BINDING, Binding::Project(project.clone()));
        }
        bindings
    }

    pub fn set(&mut self, name: impl Into<String>, value: Binding) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, b)| b)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.0.iter().map(|(n, b)| (n.as_str(), b))
    }
}

/// Compiles script files.
pub trait ScriptEngine {
    /// Check and prepare the script at `path`. Fails with
    /// [`Error::ScriptCompilation`] when the script is not valid.
    fn compile(&self, path: &Path) -> Result<Box<dyn CompiledScript + '_>>;
}

/// A compiled script, ready to run.
pub trait CompiledScript {
    /// Run with `bindings`, writing the script's standard output to
    /// `stdout`. Output produced before a failure is still written.
    fn run(&self, bindings: &Bindings, stdout: &mut dyn Write) -> Result<()>;
}

/// What a completed script task did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOutcome {
    Skipped,
    Completed,
}

/// A script run bound to its configuration.
#[derive(Debug, Clone)]
pub struct ScriptTask {
    config: ScriptConfig,
    project: Option<ProjectInfo>,
    log: LogSink,
}

impl ScriptTask {
    pub fn new(config: ScriptConfig) -> Self {
        Self {
            config,
            project: None,
            log: LogSink,
        }
    }

    /// Resolve the script against the project's base directory and expose
    /// the project as the `project` binding.
    pub fn with_project(mut self, project: ProjectInfo) -> Self {
        self.project = Some(project);
        self
    }

    /// Locate the configured script file and check it can be read.
    pub fn resolve_script_file(&self) -> Result<PathBuf> {
        let raw = self
            .config
            .script_file
            .as_deref()
            .ok_or_else(|| Error::config("The parameter 'scriptFile' is null."))?;
        if raw.trim().is_empty() {
            return Err(Error::config("The parameter 'scriptFile' is empty."));
        }

        let path = match &self.project {
            Some(project) => project.base_dir.join(raw),
            None => PathBuf::from(raw),
        };
        let invalid = |expected: &str| {
            let absolute = std::path::absolute(&path).unwrap_or_else(|_| path.clone());
            Error::config(format!(
                "Invalid value for parameter 'scriptFile': Expected {expected} file, got '{raw}', resolved to {}",
                absolute.display()
            ))
        };

        if !path.is_file() {
            return Err(invalid("existing"));
        }
        if File::open(&path).is_err() {
            return Err(invalid("readable"));
        }
        Ok(path)
    }

    /// Engine named by the configuration, or `sh` from `PATH`.
    pub fn engine(&self) -> Result<ShellEngine> {
        match &self.config.interpreter {
            Some(interpreter) => Ok(ShellEngine::new(interpreter.clone())),
            None => ShellEngine::from_path()
                .ok_or_else(|| Error::config("No script interpreter configured and 'sh' not found on PATH")),
        }
    }

    /// Run the script with the default engine, writing to the process stdout.
    pub fn execute(&self) -> Result<ScriptOutcome> {
        if self.skipped() {
            return Ok(ScriptOutcome::Skipped);
        }
        let engine = self.engine()?;
        let stdout = io::stdout();
        self.run(&engine, &mut stdout.lock())
    }

    /// Run the script with `engine`, writing its output to `stdout`.
    pub fn execute_with(&self, engine: &dyn ScriptEngine, stdout: &mut dyn Write) -> Result<ScriptOutcome> {
        if self.skipped() {
            return Ok(ScriptOutcome::Skipped);
        }
        self.run(engine, stdout)
    }

    fn skipped(&self) -> bool {
        if self.config.skip {
            tracing::info!("Skipping execution, because 'skip' parameter is true.");
        }
        self.config.skip
    }

    fn run(&self, engine: &dyn ScriptEngine, stdout: &mut dyn Write) -> Result<ScriptOutcome> {
        let path = self.resolve_script_file()?;
        tracing::debug!(script = %path.display(), "compiling script");
        let script = engine.compile(&path)?;

        let bindings = Bindings::for_script(self.log, &self.config.script_properties, self.project.as_ref());
        tracing::debug!(script = %path.display(), "running script");
        let result = script.run(&bindings, stdout);
        stdout.flush()?;
        if let Err(err) = &result {
            tracing::error!(script = %path.display(), "{err}");
        }
        result.map(|()| ScriptOutcome::Completed)
    }
}
