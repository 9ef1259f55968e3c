//! Dependency Specification Module
//!
//! Parsing and matching of dependency specs of the form `name [op version]`,
//! and reconciliation of a requested set against the live list reported by
//! an environment manager.
//!
//! # Components
//!
//! - [`Dependency`]: parsed `name [op version]` spec
//! - [`Constraint`] / [`VersionOp`]: the optional version clause
//! - [`missing_from`]: requested-minus-installed set difference

pub mod spec;

pub use spec::{missing_from, Constraint, Dependency, VersionOp};
