//! Process Invocation Module
//!
//! Synchronous, blocking execution of external command lines with optional
//! output capture.
//!
//! # Components
//!
//! - [`Invocation`]: builder for a command line plus execution context
//! - [`ExecOutput`]: exit code and captured output of a completed run

pub mod runner;

pub use runner::{ExecOutput, Invocation};
