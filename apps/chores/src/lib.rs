//! # chores
//!
//! The host for the chores engine - THE BINARY.
//!
//! Owns everything the engine leaves out: the tokio runtime, the poll loop,
//! the TOML configuration file, the JSON state file, the HTTP API and the
//! CLI. Exposed as a library so integration tests can drive the API.

pub mod api;
pub mod cli;
pub mod config;
pub mod runner;
pub mod store;
