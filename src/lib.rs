//! proctools - process execution helpers for development tooling
//!
//! Provides:
//! - **Command normalization** - command lines split with POSIX shell-word rules
//! - **Blocking runner** - launch, wait, return exit code and captured output
//! - **Threaded runner** - the same on a background thread, with forced termination
//!
//! ## Example
//!
//! ```no_run
//! use proctools::{run, ExecOptions};
//!
//! let result = run("git log -1 --format='%H %s'", &ExecOptions::default())?;
//! let (code, stdout, _stderr) = result.into_parts();
//! assert_eq!(code, Some(0));
//! println!("{}", String::from_utf8_lossy(&stdout));
//! # Ok::<(), proctools::ProcError>(())
//! ```

pub mod branch;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;

pub use branch::stable_branch;
pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::{ErrorInfo, ProcError};
pub use executor::{
    exec_command, exec_shell_command, run, CommandSpec, ExecOptions, ExecResult, RunState,
    RunnerHandle, Sink, SinkKind, ThreadedRunner,
};
