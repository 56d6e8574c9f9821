//! Command-line interface for itinera
//!
//! ## Module Structure
//!
//! - `args`: CLI argument definitions (clap)
//! - `run`: entry point and command dispatch
//! - `commands`: command implementations
//! - `tests`: test module (cfg(test) only)

pub mod args;
mod commands;
mod run;

#[cfg(test)]
mod tests;

pub use args::{Cli, Commands};
pub use run::run;
