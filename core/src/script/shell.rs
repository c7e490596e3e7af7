//! Script engine backed by an external shell interpreter.
//!
//! Compilation is the interpreter's syntax-only mode (`sh -n`). At run time
//! text bindings become environment variables, the `project` binding becomes
//! `project_name` and `project_basedir`, and every line the script writes to
//! stderr is forwarded to the `log` binding.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use super::{Binding, Bindings, CompiledScript, LogSink, ScriptEngine};
use crate::error::{Error, Result};

/// Runs scripts with a shell interpreter such as `/bin/sh`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellEngine {
    interpreter: PathBuf,
}

impl ShellEngine {
    pub fn new(interpreter: PathBuf) -> Self {
        Self { interpreter }
    }

    /// Find `sh` on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which("sh").ok().map(Self::new)
    }

    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.interpreter);
        command.stdin(Stdio::null());
        command
    }

    fn output(&self, command: &mut Command) -> Result<Output> {
        command.output().map_err(|e| {
            Error::config(format!(
                "Unable to start script interpreter {}: {e}",
                self.interpreter.display()
            ))
        })
    }
}

impl ScriptEngine for ShellEngine {
    fn compile(&self, path: &Path) -> Result<Box<dyn CompiledScript + '_>> {
        let output = self.output(self.command().arg("-n").arg(path))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => output.status.to_string(),
                text => text.to_string(),
            };
            return Err(Error::ScriptCompilation {
                path: path.to_path_buf(),
                message,
            });
        }
        Ok(Box::new(ShellScript {
            engine: self,
            path: path.to_path_buf(),
        }))
    }
}

struct ShellScript<'a> {
    engine: &'a ShellEngine,
    path: PathBuf,
}

impl CompiledScript for ShellScript<'_> {
    fn run(&self, bindings: &Bindings, stdout: &mut dyn Write) -> Result<()> {
        let mut command = self.engine.command();
        command.arg(&self.path);

        let mut log = None;
        for (name, binding) in bindings.iter() {
            match binding {
                Binding::Text(value) => {
                    if name.is_empty() || name.contains(['=', '\0']) {
                        return Err(Error::config(format!("Invalid script property name '{name}'")));
                    }
                    command.env(name, value);
                }
                Binding::Project(project) => {
                    command.env("project_basedir", &project.base_dir);
                    if let Some(project_name) = &project.name {
                        command.env("project_name", project_name);
                    }
                }
                Binding::Log(sink) => log = Some(*sink),
            }
        }

        let output = self.engine.output(&mut command)?;
        stdout.write_all(&output.stdout)?;
        forward_stderr(log, &output.stderr);

        if output.status.success() {
            return Ok(());
        }
        let (kind, detail) = match output.status.code() {
            Some(code) => ("ExitStatus", format!("exit code {code}")),
            None => ("Signal", output.status.to_string()),
        };
        let message = match last_line(&output.stderr) {
            Some(line) => format!("{detail}: {line}"),
            None => detail,
        };
        Err(Error::ScriptRuntime {
            kind: kind.to_string(),
            message,
        })
    }
}

fn forward_stderr(log: Option<LogSink>, stderr: &[u8]) {
    let Some(log) = log else { return };
    for line in String::from_utf8_lossy(stderr).lines() {
        log.info(line);
    }
}

fn last_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{Params, ProjectInfo};

    fn engine() -> Option<ShellEngine> {
        ShellEngine::from_path()
    }

    fn write_script(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("script.sh");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn compiles_and_runs_a_script() {
        let Some(engine) = engine() else { return };
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(&dir, "echo 'Hello, world!'\n");
        let script = engine.compile(&path).unwrap();
        let mut out = Vec::new();
        script.run(&Bindings::new(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Hello, world!\n");
    }

    #[test]
    fn text_bindings_are_environment_variables() {
        let Some(engine) = engine() else { return };
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(
            &dir,
            "echo \"userName=$userName\"\necho \"userEmail=$userEmail\"\n",
        );
        let properties: Params = [("userName", "Doe, John"), ("userEmail", "john.doe@company.com")]
            .into_iter()
            .collect();
        let bindings = Bindings::for_script(LogSink, &properties, None);
        let mut out = Vec::new();
        engine.compile(&path).unwrap().run(&bindings, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "userName=Doe, John\nuserEmail=john.doe@company.com\n"
        );
    }

    #[test]
    fn project_binding_is_exported() {
        let Some(engine) = engine() else { return };
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(&dir, "echo \"$project_name\"\n");
        let project = ProjectInfo {
            name: Some("demo".to_string()),
            ..ProjectInfo::default()
        };
        let bindings = Bindings::for_script(LogSink, &Params::new(), Some(&project));
        let mut out = Vec::new();
        engine.compile(&path).unwrap().run(&bindings, &mut out).unwrap();
        assert_eq!(out, b"demo\n");
    }

    #[test]
    fn syntax_error_is_a_compilation_error() {
        let Some(engine) = engine() else { return };
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(&dir, "if then fi (\n");
        let err = match engine.compile(&path) {
            Ok(_) => panic!("expected a compilation error"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::ScriptCompilation);
        assert!(err.to_string().starts_with("Failed to compile script file: "));
    }

    #[test]
    fn runtime_failure_keeps_partial_output() {
        let Some(engine) = engine() else { return };
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(&dir, "echo partial\necho 'boom' >&2\nexit 3\n");
        let mut out = Vec::new();
        let err = engine
            .compile(&path)
            .unwrap()
            .run(&Bindings::new(), &mut out)
            .unwrap_err();
        assert_eq!(out, b"partial\n");
        match err {
            Error::ScriptRuntime { kind, message } => {
                assert_eq!(kind, "ExitStatus");
                assert_eq!(message, "exit code 3: boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_property_name_is_rejected() {
        let Some(engine) = engine() else { return };
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(&dir, "true\n");
        let mut bindings = Bindings::new();
        bindings.set("a=b", Binding::Text("x".to_string()));
        let err = engine
            .compile(&path)
            .unwrap()
            .run(&bindings, &mut Vec::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn missing_interpreter_is_a_configuration_error() {
        let engine = ShellEngine::new(PathBuf::from("/no/such/interpreter"));
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(&dir, "true\n");
        let err = match engine.compile(&path) {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn last_line_skips_blank_lines() {
        assert_eq!(last_line(b"first\nsecond\n\n"), Some("second".to_string()));
        assert_eq!(last_line(b""), None);
    }
}
