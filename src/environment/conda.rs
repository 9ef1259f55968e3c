//! Conda-Family Backend
//!
//! Implements the environment lifecycle contract by shelling out to a
//! conda-compatible manager (conda, mamba, or micromamba). Each operation
//! maps to one manager subcommand; existence and package listings are read
//! from the manager's `--json` output.
//!
//! # Binary Resolution
//!
//! Manager binaries are resolved once, lazily, from the system PATH. An
//! unresolvable manager surfaces as `ManagerNotAvailable` on first use.

use std::path::PathBuf;
use std::process::Command;

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use serde::Deserialize;
use uuid::Uuid;

use crate::dependency::Dependency;
use crate::environment::Environment;
use crate::errors::EnvError;
use crate::process::{ExecOutput, Invocation};

/// Prefix for generated environment names.
const GENERATED_NAME_PREFIX: &str = "envx_";

static CONDA_PATH: Lazy<Option<PathBuf>> = Lazy::new(|| resolve_binary("conda"));
static MAMBA_PATH: Lazy<Option<PathBuf>> = Lazy::new(|| resolve_binary("mamba"));
static MICROMAMBA_PATH: Lazy<Option<PathBuf>> = Lazy::new(|| resolve_binary("micromamba"));

/// Looks up a manager binary on the system PATH.
fn resolve_binary(name: &str) -> Option<PathBuf> {
    if let Ok(output) = Command::new("which").arg(name).output() {
        if output.status.success() {
            let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !path_str.is_empty() {
                let path = PathBuf::from(path_str);
                info!("Using {}: {}", name, path.display());
                return Some(path);
            }
        }
    }

    warn!("Manager binary '{}' not found on PATH", name);
    None
}

/// Supported environment managers. All three share the same CLI surface for
/// the subcommands this backend uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Manager {
    Conda,
    Mamba,
    Micromamba,
}

impl Manager {
    /// The binary name of this manager.
    pub fn command_name(self) -> &'static str {
        match self {
            Manager::Conda => "conda",
            Manager::Mamba => "mamba",
            Manager::Micromamba => "micromamba",
        }
    }

    /// Parses a manager selection from its command name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "conda" => Some(Manager::Conda),
            "mamba" => Some(Manager::Mamba),
            "micromamba" => Some(Manager::Micromamba),
            _ => None,
        }
    }

    /// Resolved path to the manager binary.
    ///
    /// # Errors
    ///
    /// `ManagerNotAvailable` when the binary is not on PATH.
    pub fn binary_path(self) -> Result<&'static PathBuf, EnvError> {
        let resolved = match self {
            Manager::Conda => &*CONDA_PATH,
            Manager::Mamba => &*MAMBA_PATH,
            Manager::Micromamba => &*MICROMAMBA_PATH,
        };

        resolved.as_ref().ok_or_else(|| EnvError::ManagerNotAvailable {
            manager: self.command_name().to_string(),
        })
    }

    /// Whether the manager binary is present on PATH.
    pub fn is_available(self) -> bool {
        self.binary_path().is_ok()
    }
}

impl Default for Manager {
    fn default() -> Self {
        Manager::Conda
    }
}

/// `{manager} env list --json` payload.
#[derive(Deserialize)]
struct EnvListing {
    envs: Vec<PathBuf>,
}

/// One entry of `{manager} list --name {env} --json`.
#[derive(Deserialize)]
struct PackageRecord {
    name: String,
    version: String,
}

fn parse_env_listing(json: &str) -> Result<Vec<PathBuf>, EnvError> {
    let listing: EnvListing =
        serde_json::from_str(json).map_err(|e| EnvError::ManagerOutput {
            context: "env list --json".to_string(),
            reason: e.to_string(),
        })?;
    Ok(listing.envs)
}

fn parse_package_listing(json: &str) -> Result<Vec<Dependency>, EnvError> {
    let records: Vec<PackageRecord> =
        serde_json::from_str(json).map_err(|e| EnvError::ManagerOutput {
            context: "list --json".to_string(),
            reason: e.to_string(),
        })?;
    Ok(records
        .into_iter()
        .map(|r| Dependency::installed(r.name, r.version))
        .collect())
}

/// A named environment managed by a conda-family tool.
///
/// The handle holds only the name, the requested dependency specs, and
/// invocation settings. The environment itself lives in the manager's
/// registry and may or may not exist yet.
///
/// # Example
///
/// ```rust,no_run
/// use envx::environment::CondaEnv;
///
/// fn main() -> Result<(), envx::EnvError> {
///     let env = CondaEnv::new("analysis")
///         .with_dependency("python=3.11")?
///         .with_dependency("numpy")?;
///
///     let scope = env.scope().install_missing(true).enter()?;
///     scope.exec("python --version", false)?;
///     scope.close()?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CondaEnv {
    name: String,
    dependencies: Vec<Dependency>,
    channels: Vec<String>,
    manager: Manager,
    capture_output: bool,
    generated_name: bool,
}

impl CondaEnv {
    /// Creates a handle for an explicitly named environment.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            channels: Vec::new(),
            manager: Manager::default(),
            capture_output: true,
            generated_name: false,
        }
    }

    /// Creates a handle with a generated name (`envx_` + 8 hex chars).
    ///
    /// Scopes built from a generated-name handle default to ephemeral: the
    /// environment is removed when the scope exits.
    pub fn with_random_name() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        let mut env = Self::new(format!("{}{}", GENERATED_NAME_PREFIX, &suffix[..8]));
        env.generated_name = true;
        env
    }

    /// Adds a dependency spec (`name [op version]`).
    pub fn with_dependency(mut self, spec: &str) -> Result<Self, EnvError> {
        self.dependencies.push(spec.parse()?);
        Ok(self)
    }

    /// Replaces the requested dependency set.
    pub fn with_dependencies(mut self, dependencies: Vec<Dependency>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Adds a channel passed to create/install invocations.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channels.push(channel.into());
        self
    }

    /// Selects the manager backend (default: conda).
    pub fn with_manager(mut self, manager: Manager) -> Self {
        self.manager = manager;
        self
    }

    /// Controls whether lifecycle commands capture the manager's output.
    ///
    /// Captured (the default), manager chatter stays out of the parent's
    /// stdio and failure stderr is attached to errors. Uncaptured, progress
    /// streams through to the terminal.
    pub fn with_capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    /// Whether this handle's name was generated rather than given.
    pub fn has_generated_name(&self) -> bool {
        self.generated_name
    }

    /// The manager backend this handle shells out to.
    pub fn manager(&self) -> Manager {
        self.manager
    }

    /// Wraps this handle in an unentered lifecycle scope.
    ///
    /// The scope is ephemeral exactly when the name was generated; override
    /// with [`EnvScope::ephemeral`].
    pub fn scope(self) -> super::scope::EnvScope<Self> {
        let ephemeral = self.generated_name;
        super::scope::EnvScope::new(self).ephemeral(ephemeral)
    }

    fn invocation(&self) -> Result<Invocation, EnvError> {
        Ok(Invocation::new(self.manager.binary_path()?))
    }

    fn channel_args(&self) -> Vec<String> {
        self.channels
            .iter()
            .flat_map(|c| ["-c".to_string(), c.clone()])
            .collect()
    }

    fn create_args(&self) -> Vec<String> {
        let mut args = vec![
            "create".to_string(),
            "--name".to_string(),
            self.name.clone(),
        ];
        args.extend(self.channel_args());
        args.extend(self.dependencies.iter().map(ToString::to_string));
        args.push("--yes".to_string());
        args
    }

    fn install_args(&self, dependencies: &[Dependency]) -> Vec<String> {
        let mut args = vec![
            "install".to_string(),
            "--name".to_string(),
            self.name.clone(),
        ];
        args.extend(self.channel_args());
        args.extend(dependencies.iter().map(ToString::to_string));
        args.push("--yes".to_string());
        args
    }

    fn remove_args(&self) -> Vec<String> {
        vec![
            "env".to_string(),
            "remove".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "--yes".to_string(),
        ]
    }

    fn exec_args(&self, command: &str) -> Vec<String> {
        vec![
            "run".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "bash".to_string(),
            "-c".to_string(),
            command.to_string(),
        ]
    }
}

impl Environment for CondaEnv {
    fn name(&self) -> &str {
        &self.name
    }

    fn requested_dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    fn exists(&self) -> Result<bool, EnvError> {
        let out = self
            .invocation()?
            .args(["env", "list", "--json"])
            .run(true)?;
        let envs = parse_env_listing(out.stdout.as_deref().unwrap_or_default())?;

        Ok(envs.iter().any(|path| {
            path.file_name()
                .is_some_and(|n| n.to_string_lossy() == self.name)
        }))
    }

    fn installed_dependencies(&self) -> Result<Vec<Dependency>, EnvError> {
        let out = self
            .invocation()?
            .args(["list", "--name", &self.name, "--json"])
            .run(true)?;
        parse_package_listing(out.stdout.as_deref().unwrap_or_default())
    }

    fn create(&self) -> Result<(), EnvError> {
        if self.exists()? {
            info!("Environment '{}' already exists", self.name);
            return Ok(());
        }

        info!(
            "Creating environment '{}' with {} dependencies",
            self.name,
            self.dependencies.len()
        );

        match self
            .invocation()?
            .args(self.create_args())
            .run(self.capture_output)
        {
            Ok(_) => {
                info!("Successfully created environment '{}'", self.name);
                Ok(())
            }
            Err(EnvError::Exec(source)) => Err(EnvError::CreateEnv {
                name: self.name.clone(),
                source,
            }),
            Err(other) => Err(other),
        }
    }

    fn install(&self, dependencies: &[Dependency]) -> Result<(), EnvError> {
        if dependencies.is_empty() {
            return Ok(());
        }

        info!(
            "Installing {} packages into '{}'",
            dependencies.len(),
            self.name
        );

        match self
            .invocation()?
            .args(self.install_args(dependencies))
            .run(self.capture_output)
        {
            Ok(_) => Ok(()),
            Err(EnvError::Exec(source)) => Err(EnvError::InstallPackages {
                name: self.name.clone(),
                source,
            }),
            Err(other) => Err(other),
        }
    }

    fn remove(&self) -> Result<(), EnvError> {
        if !self.exists()? {
            debug!("Environment '{}' already absent", self.name);
            return Ok(());
        }

        info!("Removing environment '{}'", self.name);
        self.invocation()?
            .args(self.remove_args())
            .run(self.capture_output)?;
        Ok(())
    }

    fn exec(&self, command: &str, capture: bool) -> Result<ExecOutput, EnvError> {
        debug!("Executing in '{}': {}", self.name, command);
        self.invocation()?.args(self.exec_args(command)).run(capture)
    }
}
