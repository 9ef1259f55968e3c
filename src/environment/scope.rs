//! Scoped Environment Lifecycle
//!
//! Scoped acquisition of an environment with a guaranteed teardown:
//! [`EnvScope`] is the unentered configuration, [`enter`](EnvScope::enter)
//! ensures the environment exists and its dependency set is reconciled, and
//! the returned [`ActiveEnv`] removes an ephemeral environment when it goes
//! out of scope, on every exit path, exactly once per successful entry.
//!
//! # Example
//!
//! ```rust,no_run
//! use envx::environment::CondaEnv;
//!
//! fn main() -> Result<(), envx::EnvError> {
//!     let result = CondaEnv::with_random_name()
//!         .with_dependency("python=3.11")?
//!         .scope()
//!         .with(|env| env.exec("python --version", true))?;
//!
//!     println!("{}", result.stdout.unwrap_or_default());
//!     Ok(())
//! }
//! ```

use log::{debug, error, info};

use crate::environment::Environment;
use crate::errors::{EnvError, MissingDependencyError};
use crate::process::ExecOutput;

/// An unentered environment scope: a backend plus entry policy.
#[derive(Debug)]
pub struct EnvScope<E: Environment> {
    env: E,
    ephemeral: bool,
    install_missing: bool,
    check: bool,
    force: bool,
}

impl<E: Environment> EnvScope<E> {
    /// Wraps a backend with default policy: persistent, reconciliation on,
    /// missing dependencies are an error.
    pub fn new(env: E) -> Self {
        Self {
            env,
            ephemeral: false,
            install_missing: false,
            check: true,
            force: false,
        }
    }

    /// Sets whether the environment is removed when the scope exits.
    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    /// Sets whether missing dependencies are installed on entry instead of
    /// failing with [`MissingDependencyError`].
    pub fn install_missing(mut self, install: bool) -> Self {
        self.install_missing = install;
        self
    }

    /// Disables dependency reconciliation on entry.
    pub fn check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    /// Forces recreation: an existing environment is removed before entry.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Whether this scope will remove the environment on exit.
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// Enters the scope.
    ///
    /// Ensures the environment exists (creating it with the requested
    /// dependencies when absent, recreating it under `force`), then
    /// reconciles the dependency set: missing dependencies are installed
    /// when `install_missing` is set, otherwise entry fails with
    /// [`MissingDependencyError`] naming exactly the missing specs.
    ///
    /// Entry failures do not trigger teardown; only a successfully entered
    /// scope owns the removal obligation.
    pub fn enter(self) -> Result<ActiveEnv<E>, EnvError> {
        if self.force {
            debug!("Force-recreating environment '{}'", self.env.name());
            self.env.remove()?;
        }

        self.env.create()?;

        if self.check {
            let missing = self.env.missing_dependencies()?;
            if !missing.is_empty() {
                if self.install_missing {
                    self.env.install(&missing)?;
                } else {
                    return Err(MissingDependencyError {
                        environment: self.env.name().to_string(),
                        missing,
                    }
                    .into());
                }
            }
        }

        info!("Environment '{}' ready", self.env.name());

        Ok(ActiveEnv {
            env: self.env,
            ephemeral: self.ephemeral,
            torn_down: false,
        })
    }

    /// Enters the scope, runs the closure, and always tears down.
    ///
    /// The closure's error wins over a teardown error when both occur.
    pub fn with<T, F>(self, f: F) -> Result<T, EnvError>
    where
        F: FnOnce(&ActiveEnv<E>) -> Result<T, EnvError>,
    {
        let active = self.enter()?;
        let result = f(&active);
        let teardown = active.close();

        match result {
            Ok(value) => teardown.map(|()| value),
            Err(e) => Err(e),
        }
    }
}

/// A successfully entered environment scope.
///
/// Dropping an `ActiveEnv` removes the environment when the scope is
/// ephemeral; removal failure on the drop path is logged, never panics.
/// Use [`close`](ActiveEnv::close) to observe teardown errors.
#[derive(Debug)]
pub struct ActiveEnv<E: Environment> {
    env: E,
    ephemeral: bool,
    torn_down: bool,
}

impl<E: Environment> ActiveEnv<E> {
    /// Name of the held environment.
    pub fn name(&self) -> &str {
        self.env.name()
    }

    /// The underlying backend.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Runs a shell command inside the environment.
    pub fn exec(&self, command: &str, capture: bool) -> Result<ExecOutput, EnvError> {
        self.env.exec(command, capture)
    }

    /// Tears the scope down explicitly, reporting removal errors.
    pub fn close(mut self) -> Result<(), EnvError> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<(), EnvError> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        if self.ephemeral {
            info!("Tearing down ephemeral environment '{}'", self.env.name());
            self.env.remove()
        } else {
            debug!("Leaving environment '{}' in place", self.env.name());
            Ok(())
        }
    }
}

impl<E: Environment> Drop for ActiveEnv<E> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            error!(
                "Failed to remove environment '{}' during teardown: {}",
                self.env.name(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::Dependency;
    use crate::errors::ExecError;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// In-memory backend recording every lifecycle call.
    #[derive(Debug)]
    struct MockEnv {
        name: String,
        requested: Vec<Dependency>,
        exists: Cell<bool>,
        installed: RefCell<Vec<Dependency>>,
        calls: Rc<RefCell<Vec<String>>>,
        fail_exec: bool,
    }

    impl MockEnv {
        fn new(requested: &[&str]) -> Self {
            Self {
                name: "mock_env".to_string(),
                requested: requested.iter().map(|s| s.parse().unwrap()).collect(),
                exists: Cell::new(false),
                installed: RefCell::new(Vec::new()),
                calls: Rc::new(RefCell::new(Vec::new())),
                fail_exec: false,
            }
        }

        fn existing(requested: &[&str], installed: &[(&str, &str)]) -> Self {
            let env = Self::new(requested);
            env.exists.set(true);
            *env.installed.borrow_mut() = installed
                .iter()
                .map(|(n, v)| Dependency::installed(*n, *v))
                .collect();
            env
        }

        fn calls(&self) -> Rc<RefCell<Vec<String>>> {
            Rc::clone(&self.calls)
        }

        fn record(&self, call: &str) {
            self.calls.borrow_mut().push(call.to_string());
        }
    }

    impl Environment for MockEnv {
        fn name(&self) -> &str {
            &self.name
        }

        fn requested_dependencies(&self) -> &[Dependency] {
            &self.requested
        }

        fn exists(&self) -> Result<bool, EnvError> {
            Ok(self.exists.get())
        }

        fn installed_dependencies(&self) -> Result<Vec<Dependency>, EnvError> {
            Ok(self.installed.borrow().clone())
        }

        fn create(&self) -> Result<(), EnvError> {
            if self.exists.get() {
                return Ok(());
            }
            self.record("create");
            self.exists.set(true);
            // Creation resolves every requested spec
            *self.installed.borrow_mut() = self
                .requested
                .iter()
                .map(|d| {
                    let version = d
                        .constraint
                        .as_ref()
                        .map_or("1.0.0".to_string(), |c| c.version.clone());
                    Dependency::installed(&d.name, version)
                })
                .collect();
            Ok(())
        }

        fn install(&self, dependencies: &[Dependency]) -> Result<(), EnvError> {
            self.record("install");
            let mut installed = self.installed.borrow_mut();
            installed.retain(|pkg| !dependencies.iter().any(|d| d.name == pkg.name));
            installed.extend(dependencies.iter().map(|d| {
                let version = d
                    .constraint
                    .as_ref()
                    .map_or("1.0.0".to_string(), |c| c.version.clone());
                Dependency::installed(&d.name, version)
            }));
            Ok(())
        }

        fn remove(&self) -> Result<(), EnvError> {
            self.record("remove");
            self.exists.set(false);
            Ok(())
        }

        fn exec(&self, command: &str, _capture: bool) -> Result<ExecOutput, EnvError> {
            self.record("exec");
            if self.fail_exec {
                return Err(ExecError {
                    command: command.to_string(),
                    code: Some(1),
                    stderr: None,
                }
                .into());
            }
            Ok(ExecOutput {
                code: 0,
                stdout: Some(String::new()),
                stderr: Some(String::new()),
            })
        }
    }

    #[test]
    fn test_enter_creates_absent_environment() {
        let env = MockEnv::new(&["numpy"]);
        let calls = env.calls();

        let active = EnvScope::new(env).enter().unwrap();
        assert_eq!(*calls.borrow(), vec!["create"]);
        drop(active);
    }

    #[test]
    fn test_enter_satisfied_set_skips_install() {
        let env = MockEnv::existing(
            &["numpy", "pandas=2.0.0"],
            &[("numpy", "1.26.0"), ("pandas", "2.0.0")],
        );
        let calls = env.calls();

        let active = EnvScope::new(env).enter().unwrap();
        assert!(!calls.borrow().iter().any(|c| c == "install"));
        drop(active);
    }

    #[test]
    fn test_enter_missing_without_install_missing_fails() {
        let env = MockEnv::existing(
            &["numpy", "pandas=2.0.0"],
            &[("numpy", "1.26.0"), ("pandas", "1.5.3")],
        );
        let calls = env.calls();

        let err = EnvScope::new(env).enter().unwrap_err();
        match err {
            EnvError::MissingDependency(missing) => {
                assert_eq!(missing.environment, "mock_env");
                assert_eq!(missing.missing.len(), 1);
                assert_eq!(missing.missing[0].to_string(), "pandas=2.0.0");
            }
            other => panic!("expected MissingDependencyError, got {other:?}"),
        }
        // Failed fast: no install, no exec, no teardown
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_enter_installs_missing_when_enabled() {
        let env = MockEnv::existing(&["numpy", "samtools=1.17"], &[("numpy", "1.26.0")]);
        let calls = env.calls();

        let active = EnvScope::new(env)
            .install_missing(true)
            .enter()
            .unwrap();

        assert_eq!(*calls.borrow(), vec!["install"]);
        // Live set is now a superset of the request
        assert!(active.env().missing_dependencies().unwrap().is_empty());
        drop(active);
    }

    #[test]
    fn test_check_disabled_skips_reconciliation() {
        let env = MockEnv::existing(&["numpy"], &[]);
        let calls = env.calls();

        let active = EnvScope::new(env).check(false).enter().unwrap();
        assert!(calls.borrow().is_empty());
        drop(active);
    }

    #[test]
    fn test_force_recreates_existing_environment() {
        let env = MockEnv::existing(&["numpy"], &[("numpy", "1.26.0")]);
        let calls = env.calls();

        let active = EnvScope::new(env).force(true).enter().unwrap();
        assert_eq!(*calls.borrow(), vec!["remove", "create"]);
        drop(active);
    }

    #[test]
    fn test_ephemeral_scope_removes_on_close() {
        let env = MockEnv::new(&[]);
        let calls = env.calls();

        let active = EnvScope::new(env).ephemeral(true).enter().unwrap();
        assert!(active.env().exists().unwrap());
        active.close().unwrap();

        assert_eq!(*calls.borrow(), vec!["create", "remove"]);
    }

    #[test]
    fn test_persistent_scope_keeps_environment() {
        let env = MockEnv::new(&[]);
        let calls = env.calls();

        let active = EnvScope::new(env).enter().unwrap();
        active.close().unwrap();

        assert_eq!(*calls.borrow(), vec!["create"]);
    }

    #[test]
    fn test_drop_tears_down_ephemeral_scope() {
        let env = MockEnv::new(&[]);
        let calls = env.calls();

        {
            let _active = EnvScope::new(env).ephemeral(true).enter().unwrap();
        }

        assert_eq!(*calls.borrow(), vec!["create", "remove"]);
    }

    #[test]
    fn test_teardown_runs_exactly_once() {
        let env = MockEnv::new(&[]);
        let calls = env.calls();

        let active = EnvScope::new(env).ephemeral(true).enter().unwrap();
        active.close().unwrap();
        // close consumed the guard; Drop already ran and must not re-remove

        let removals = calls.borrow().iter().filter(|c| *c == "remove").count();
        assert_eq!(removals, 1);
    }

    #[test]
    fn test_with_runs_body_and_tears_down() {
        let env = MockEnv::new(&["numpy"]);
        let calls = env.calls();

        let out = EnvScope::new(env)
            .ephemeral(true)
            .with(|active| active.exec("echo hello", true))
            .unwrap();

        assert_eq!(out.code, 0);
        assert_eq!(*calls.borrow(), vec!["create", "exec", "remove"]);
    }

    #[test]
    fn test_with_failing_body_still_tears_down() {
        let mut env = MockEnv::new(&[]);
        env.fail_exec = true;
        let calls = env.calls();

        let err = EnvScope::new(env)
            .ephemeral(true)
            .with(|active| active.exec("false", true))
            .unwrap_err();

        assert!(matches!(err, EnvError::Exec(_)));
        assert_eq!(*calls.borrow(), vec!["create", "exec", "remove"]);
    }

    #[test]
    fn test_with_persistent_env_survives_failing_body() {
        let mut env = MockEnv::new(&[]);
        env.fail_exec = true;
        let calls = env.calls();

        let _ = EnvScope::new(env)
            .with(|active| active.exec("false", true))
            .unwrap_err();

        assert!(!calls.borrow().iter().any(|c| c == "remove"));
    }
}
