//! Tandem CLI - a coupled toy problem run in one process
//!
//! Two participants, each on its own thread, couple a load solver and a
//! deflection solver over an in-process channel. The run configuration is a
//! JSON document; every field has a default.

pub mod config;
pub mod demo;
pub mod error;

pub use config::RunConfig;
pub use demo::{run, ParticipantReport, RunReport};
pub use error::{DemoError, Result};
