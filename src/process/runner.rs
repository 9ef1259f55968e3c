//! Command Line Runner
//!
//! Builds and runs external command lines to completion. Execution is
//! strictly synchronous: the calling thread blocks until the child exits.
//! A non-zero exit is translated into [`ExecError`] carrying the rendered
//! command line, the exit code, and captured stderr when available.
//!
//! There is no retry and no timeout; callers needing deadlines must layer
//! them externally.

use std::path::PathBuf;
use std::process::Command;

use log::{debug, error};

use crate::errors::{EnvError, ExecError};

/// Result of a completed process invocation.
///
/// `stdout`/`stderr` are populated only when the run captured output;
/// otherwise the child inherited the parent's streams.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Exit code of the child process.
    pub code: i32,
    /// Decoded standard output, if captured.
    pub stdout: Option<String>,
    /// Decoded standard error, if captured.
    pub stderr: Option<String>,
}

/// A command line plus optional execution context.
///
/// # Example
///
/// ```rust,no_run
/// use envx::process::Invocation;
///
/// fn main() -> Result<(), envx::EnvError> {
///     let out = Invocation::new("conda")
///         .arg("env")
///         .arg("list")
///         .arg("--json")
///         .run(true)?;
///     println!("{}", out.stdout.unwrap_or_default());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl Invocation {
    /// Creates an invocation of the given program.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            envs: Vec::new(),
        }
    }

    /// Appends a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory for the child process.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Sets an environment variable for the child process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Renders the command line for logs and error messages.
    ///
    /// Arguments containing whitespace are quoted; this is a display form,
    /// not a shell-safe serialization.
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        for arg in &self.args {
            if arg.chars().any(char::is_whitespace) {
                parts.push(format!("'{arg}'"));
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }

    /// Runs the command to completion.
    ///
    /// With `capture` the child's stdout/stderr are collected and decoded as
    /// lossy UTF-8; without it the child inherits the parent's streams.
    ///
    /// # Returns
    ///
    /// * `Ok(ExecOutput)` - the child exited with code 0
    /// * `Err` - the child exited non-zero ([`ExecError`]) or could not be
    ///   spawned (I/O error)
    pub fn run(&self, capture: bool) -> Result<ExecOutput, EnvError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
            debug!("Executing in directory: {}", dir.display());
        }

        for (key, value) in &self.envs {
            cmd.env(key, value);
        }

        debug!("Running: {}", self.command_line());

        if capture {
            let output = cmd.output()?;
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

            if output.status.success() {
                Ok(ExecOutput {
                    code: output.status.code().unwrap_or(0),
                    stdout: Some(stdout),
                    stderr: Some(stderr),
                })
            } else {
                error!(
                    "Command failed with exit code {:?}: {}",
                    output.status.code(),
                    self.command_line()
                );
                Err(ExecError {
                    command: self.command_line(),
                    code: output.status.code(),
                    stderr: Some(stderr),
                }
                .into())
            }
        } else {
            let status = cmd.status()?;

            if status.success() {
                Ok(ExecOutput {
                    code: status.code().unwrap_or(0),
                    stdout: None,
                    stderr: None,
                })
            } else {
                error!(
                    "Command failed with exit code {:?}: {}",
                    status.code(),
                    self.command_line()
                );
                Err(ExecError {
                    command: self.command_line(),
                    code: status.code(),
                    stderr: None,
                }
                .into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_captures_stdout() {
        let out = Invocation::new("sh")
            .arg("-c")
            .arg("echo hello")
            .run(true)
            .unwrap();

        assert_eq!(out.code, 0);
        assert_eq!(out.stdout.as_deref(), Some("hello\n"));
    }

    #[test]
    fn test_run_captures_stderr() {
        let out = Invocation::new("sh")
            .arg("-c")
            .arg("echo oops >&2")
            .run(true)
            .unwrap();

        assert_eq!(out.stderr.as_deref(), Some("oops\n"));
    }

    #[test]
    fn test_run_nonzero_exit_is_exec_error() {
        let err = Invocation::new("sh")
            .arg("-c")
            .arg("exit 3")
            .run(true)
            .unwrap_err();

        match err {
            EnvError::Exec(exec) => {
                assert_eq!(exec.code, Some(3));
                assert!(exec.command.contains("sh"));
            }
            other => panic!("expected ExecError, got {other:?}"),
        }
    }

    #[test]
    fn test_run_nonzero_exit_carries_stderr() {
        let err = Invocation::new("sh")
            .arg("-c")
            .arg("echo broken >&2; exit 1")
            .run(true)
            .unwrap_err();

        match err {
            EnvError::Exec(exec) => {
                assert!(exec.stderr.unwrap().contains("broken"));
            }
            other => panic!("expected ExecError, got {other:?}"),
        }
    }

    #[test]
    fn test_run_missing_program_is_io_error() {
        let err = Invocation::new("definitely-not-a-real-binary-envx")
            .run(true)
            .unwrap_err();

        assert!(matches!(err, EnvError::Io(_)));
    }

    #[test]
    fn test_run_with_env_var() {
        let out = Invocation::new("sh")
            .arg("-c")
            .arg("printf %s \"$ENVX_TEST_VALUE\"")
            .env("ENVX_TEST_VALUE", "42")
            .run(true)
            .unwrap();

        assert_eq!(out.stdout.as_deref(), Some("42"));
    }

    #[test]
    fn test_run_with_working_directory() {
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();

        let out = Invocation::new("sh")
            .arg("-c")
            .arg("cat marker.txt")
            .current_dir(dir.path())
            .run(true)
            .unwrap();

        assert_eq!(out.stdout.as_deref(), Some("here"));
    }

    #[test]
    fn test_command_line_quotes_whitespace() {
        let inv = Invocation::new("conda")
            .arg("run")
            .arg("echo hello world");

        assert_eq!(inv.command_line(), "conda run 'echo hello world'");
    }

    #[test]
    fn test_args_extends() {
        let inv = Invocation::new("conda").args(["env", "list", "--json"]);
        assert_eq!(inv.command_line(), "conda env list --json");
    }
}
