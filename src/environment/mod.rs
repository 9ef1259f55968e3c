//! Environment Management Module
//!
//! The lifecycle contract for isolated, named dependency environments and
//! its conda-family backend.
//!
//! # Components
//!
//! - [`Environment`]: capability trait any backend must implement
//! - [`conda`]: backend shelling out to conda / mamba / micromamba
//! - [`scope`]: scoped acquisition with guaranteed teardown

pub mod conda;
pub mod scope;

pub use conda::{CondaEnv, Manager};
pub use scope::{ActiveEnv, EnvScope};

use crate::dependency::{missing_from, Dependency};
use crate::errors::EnvError;
use crate::process::ExecOutput;

/// Lifecycle contract implemented by environment backends.
///
/// The backing manager is the source of truth: [`exists`](Environment::exists)
/// and [`installed_dependencies`](Environment::installed_dependencies) query
/// it live and are never cached. An implementation owns nothing but the
/// environment's name and requested dependency list; the real resource lives
/// in the manager's registry and is shared with anyone else naming it.
pub trait Environment {
    /// Name identifying the environment in the backing manager.
    fn name(&self) -> &str;

    /// Dependency specs this handle was configured with.
    fn requested_dependencies(&self) -> &[Dependency];

    /// Queries whether the environment currently exists.
    fn exists(&self) -> Result<bool, EnvError>;

    /// Queries the live package list of the environment.
    fn installed_dependencies(&self) -> Result<Vec<Dependency>, EnvError>;

    /// Ensures the environment exists with the requested dependencies.
    ///
    /// No-op when the environment is already present.
    fn create(&self) -> Result<(), EnvError>;

    /// Installs additional packages into the existing environment.
    fn install(&self, dependencies: &[Dependency]) -> Result<(), EnvError>;

    /// Deletes the environment from the backing manager.
    ///
    /// Removing an absent environment is a no-op.
    fn remove(&self) -> Result<(), EnvError>;

    /// Runs a shell command inside the environment.
    ///
    /// With `capture` the child's output is collected into the returned
    /// [`ExecOutput`]; otherwise it streams to the parent's stdio.
    fn exec(&self, command: &str, capture: bool) -> Result<ExecOutput, EnvError>;

    /// Requested dependencies not satisfied by the live environment.
    fn missing_dependencies(&self) -> Result<Vec<Dependency>, EnvError> {
        let installed = self.installed_dependencies()?;
        Ok(missing_from(self.requested_dependencies(), &installed))
    }
}
