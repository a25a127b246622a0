//! Command execution module
//!
//! Provides:
//! - Command normalization (shell-word splitting)
//! - Blocking and async runners with output capture
//! - A background runner on its own thread with forced termination

pub mod command;
pub mod runner;
pub mod sink;
pub mod threaded;

pub use command::{join_args, CommandSpec};
pub use runner::{exec_command, exec_shell_command, run, ExecOptions, ExecResult};
pub use sink::{Sink, SinkKind};
pub use threaded::{RunState, RunnerHandle, ThreadedRunner};
