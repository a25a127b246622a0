//! CLI module for proctools
//!
//! Provides command-line interface with the following subcommands:
//! - `run` - Run a command and wait for it
//! - `spawn` - Run a command on a background thread
//! - `split` - Show command normalization
//! - `stable-branch` - Print a stable branch name
//! - `config` - Show configuration

pub mod commands;

pub use commands::{Cli, Commands};
