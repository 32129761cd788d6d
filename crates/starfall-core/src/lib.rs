//! Starfall Core
//!
//! Logging, profiling and process-level configuration shared by the
//! Starfall crates.

pub mod config;
pub mod logging;
pub mod profiling;

pub use config::{Config, ProfilingMode};
