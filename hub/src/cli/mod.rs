//! CLI module
//!
//! Argument definitions for the `hub` binary.

pub mod args;

pub use args::{Cli, Commands};
