//! # aura-cli
//!
//! Command-line interface for the Aura companion engine.
//!
//! ## Commands
//!
//! - `aura chat`: Interactive conversation in the terminal
//! - `aura memory`: List, search, forget and count stored memories
//! - `aura recipe`: List, add and seed learned recipes
//! - `aura config`: Show the effective configuration

pub mod commands;

pub use commands::Cli;
