//! Error Types
//!
//! Structured errors for environment lifecycle operations. Callers are
//! expected to branch on these: [`ExecError`] carries the failing command
//! line and exit code, [`MissingDependencyError`] names the unsatisfied
//! dependency specs.

use thiserror::Error;

use crate::dependency::Dependency;

/// A process invocation exited non-zero.
///
/// `code` is `None` when the child was terminated by a signal. `stderr` is
/// populated only when the invocation captured output.
#[derive(Debug, Clone, Error)]
#[error("command `{command}` {}", exit_description(.code, .stderr))]
pub struct ExecError {
    /// Rendered command line that failed.
    pub command: String,
    /// Exit code reported by the child, if any.
    pub code: Option<i32>,
    /// Captured standard error text, if output was captured.
    pub stderr: Option<String>,
}

fn exit_description(code: &Option<i32>, stderr: &Option<String>) -> String {
    let mut desc = match code {
        Some(code) => format!("exited with code {code}"),
        None => "terminated by signal".to_string(),
    };
    if let Some(stderr) = stderr {
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            desc.push_str("\nstderr:\n");
            desc.push_str(stderr);
        }
    }
    desc
}

/// Requested dependencies are absent from a live environment and
/// `install_missing` was not enabled.
#[derive(Debug, Clone, Error)]
#[error("environment '{environment}' is missing dependencies: {}", format_specs(.missing))]
pub struct MissingDependencyError {
    /// Name of the environment that was checked.
    pub environment: String,
    /// Exactly the requested specs that the live environment does not satisfy.
    pub missing: Vec<Dependency>,
}

fn format_specs(specs: &[Dependency]) -> String {
    specs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Umbrella error for all environment operations.
#[derive(Debug, Error)]
pub enum EnvError {
    /// A command run inside or against an environment failed.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Dependency reconciliation failed.
    #[error(transparent)]
    MissingDependency(#[from] MissingDependencyError),

    /// Environment creation failed.
    #[error("failed to create environment '{name}': {source}")]
    CreateEnv { name: String, source: ExecError },

    /// Package installation into an existing environment failed.
    #[error("failed to install packages into '{name}': {source}")]
    InstallPackages { name: String, source: ExecError },

    /// The requested environment manager binary was not found on PATH.
    #[error("environment manager '{manager}' is not available on PATH")]
    ManagerNotAvailable { manager: String },

    /// A dependency spec string did not match the `name [op version]` grammar.
    #[error("invalid dependency spec '{spec}': {reason}")]
    DependencyParse { spec: String, reason: String },

    /// The manager produced output we could not interpret.
    #[error("unexpected output from {context}: {reason}")]
    ManagerOutput { context: String, reason: String },

    /// Spawning or waiting on a child process failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
