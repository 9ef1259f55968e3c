//! envx - Ephemeral Environment Execution
//!
//! A small library for creating, using, and destroying isolated dependency
//! environments (conda, mamba, micromamba) and running commands inside them.
//! The backing manager is shelled out to for every operation; envx owns no
//! state beyond the environment's name and requested dependency list.
//!
//! # Architecture
//!
//! The library is organized into four main modules:
//!
//! - [`process`]: synchronous command invocation with optional capture
//! - [`dependency`]: the `name [op version]` spec grammar and reconciliation
//! - [`environment`]: lifecycle contract, conda backend, and scoped teardown
//! - [`errors`]: structured error taxonomy callers can branch on
//!
//! # Example
//!
//! ```rust,no_run
//! use envx::environment::CondaEnv;
//!
//! fn main() -> Result<(), envx::EnvError> {
//!     // Ephemeral: generated name, removed when the scope exits
//!     let out = CondaEnv::with_random_name()
//!         .with_dependency("python=3.11")?
//!         .with_dependency("numpy")?
//!         .scope()
//!         .with(|env| env.exec("python -c 'import numpy; print(numpy.__version__)'", true))?;
//!
//!     print!("{}", out.stdout.unwrap_or_default());
//!     Ok(())
//! }
//! ```

pub mod dependency;
pub mod environment;
pub mod errors;
pub mod process;

// Re-export commonly used types
pub use dependency::Dependency;
pub use environment::{ActiveEnv, CondaEnv, EnvScope, Environment, Manager};
pub use errors::{EnvError, ExecError, MissingDependencyError};
pub use process::{ExecOutput, Invocation};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "envx";
