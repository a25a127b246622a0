//! Background process runner
//!
//! Runs one child process on a dedicated OS thread so the caller is not
//! blocked, and lets any thread force-terminate it.
//!
//! The runner thread owns the child. `kill()` is forwarded to it over a
//! channel and served until the child is reaped, so the signal always targets
//! the live process and never a recycled pid.

use std::fmt;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::command::CommandSpec;
use super::runner::{
    current_thread_runtime, reap, spawn_child, ExecOptions, ExecResult, KillRequest,
    OutputReaders,
};
use crate::error::ProcError;

/// Lifecycle of a background process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Thread not yet launched the child
    NotStarted,
    /// Child launched and not yet reaped
    Running { pid: u32 },
    /// Child exited on its own (code is None if a signal ended it)
    Exited { code: Option<i32> },
    /// Child was ended by `kill()`
    Killed,
    /// The child could not be launched
    LaunchFailed,
}

impl RunState {
    /// Whether the runner has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Exited { .. } | RunState::Killed | RunState::LaunchFailed
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::NotStarted => write!(f, "not started"),
            RunState::Running { pid } => write!(f, "running (pid {})", pid),
            RunState::Exited { code: Some(code) } => write!(f, "exited with code {}", code),
            RunState::Exited { code: None } => write!(f, "exited by signal"),
            RunState::Killed => write!(f, "killed"),
            RunState::LaunchFailed => write!(f, "launch failed"),
        }
    }
}

/// State shared between the caller and the runner thread
struct Shared {
    pid: OnceLock<u32>,
    state: Mutex<RunState>,
    changed: Condvar,
}

impl Shared {
    fn new() -> Self {
        Self {
            pid: OnceLock::new(),
            state: Mutex::new(RunState::NotStarted),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: RunState) {
        *self.lock() = state;
        self.changed.notify_all();
    }

    /// Record the launched child's pid, waking `wait_for_pid` either way.
    ///
    /// A child without a pid cannot be tracked or killed, so it counts as a
    /// failed launch.
    fn publish_launch(&self, pid: Option<u32>, command: &str) -> Result<u32, ProcError> {
        match pid {
            Some(pid) => {
                let _ = self.pid.set(pid);
                self.set_state(RunState::Running { pid });
                Ok(pid)
            }
            None => {
                self.set_state(RunState::LaunchFailed);
                Err(ProcError::Runtime(format!(
                    "child has no pid after launch: {}",
                    command
                )))
            }
        }
    }
}

/// A command prepared to run on its own thread
#[derive(Debug)]
pub struct ThreadedRunner {
    command: CommandSpec,
    argv: Vec<String>,
    options: ExecOptions,
    thread_name: String,
}

impl ThreadedRunner {
    /// Normalize `command` and prepare the runner
    ///
    /// # Errors
    /// * `ProcError::Tokenize` - If the command line cannot be split
    /// * `ProcError::EmptyCommand` - If there is no program to run
    pub fn new(command: impl Into<CommandSpec>, options: ExecOptions) -> Result<Self, ProcError> {
        let command = command.into();
        let argv = command.normalize()?;
        if argv.is_empty() {
            return Err(ProcError::EmptyCommand);
        }

        let thread_name = format!("proc-{}", argv[0]);
        Ok(Self {
            command,
            argv,
            options,
            thread_name,
        })
    }

    /// Name the runner thread (defaults to `proc-<program>`)
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// The normalized argument vector
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Launch the runner thread
    ///
    /// # Errors
    /// * `ProcError::Io` - If the OS refused to create the thread
    pub fn start(self) -> Result<RunnerHandle, ProcError> {
        let shared = Arc::new(Shared::new());
        let (kill_tx, kill_rx) = mpsc::unbounded_channel();
        let command = self.command.display();

        let thread_shared = Arc::clone(&shared);
        let argv = self.argv;
        let options = self.options;
        let thread = thread::Builder::new()
            .name(self.thread_name)
            .spawn(move || run_in_thread(argv, options, thread_shared, kill_rx))?;

        Ok(RunnerHandle {
            command,
            shared,
            kill_tx,
            thread,
        })
    }
}

/// Thread body: launch, publish the pid, serve kills, collect output
fn run_in_thread(
    argv: Vec<String>,
    options: ExecOptions,
    shared: Arc<Shared>,
    mut kill_rx: mpsc::UnboundedReceiver<KillRequest>,
) -> Result<ExecResult, ProcError> {
    let rt = current_thread_runtime().inspect_err(|_| shared.set_state(RunState::LaunchFailed))?;

    rt.block_on(async move {
        let start = Instant::now();
        let command = CommandSpec::Args(argv);

        let (mut child, command_str) = spawn_child(&command, &options)
            .inspect_err(|_| shared.set_state(RunState::LaunchFailed))?;
        shared.publish_launch(child.id(), &command_str)?;

        let readers = OutputReaders::start(&mut child);
        let reaped = match reap(&mut child, Some(&mut kill_rx)).await {
            Ok(reaped) => reaped,
            Err(e) => {
                shared.set_state(RunState::Exited { code: None });
                return Err(e);
            }
        };
        let duration = start.elapsed();

        let final_state = if reaped.kill_sent && reaped.exit_code().is_none() {
            RunState::Killed
        } else {
            RunState::Exited {
                code: reaped.exit_code(),
            }
        };

        // Published before the pipes drain: a descendant may hold them open
        tracing::debug!(command = %command_str, state = %final_state, "background process finished");
        shared.set_state(final_state);
        drop(kill_rx);

        let (stdout, stderr) = readers.collect().await?;

        Ok::<_, ProcError>(ExecResult {
            exit_code: reaped.exit_code(),
            signal: reaped.signal(),
            stdout,
            stderr,
            duration,
        })
    })
}

/// Handle to a running background process
pub struct RunnerHandle {
    command: String,
    shared: Arc<Shared>,
    kill_tx: mpsc::UnboundedSender<KillRequest>,
    thread: JoinHandle<Result<ExecResult, ProcError>>,
}

impl fmt::Debug for RunnerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerHandle")
            .field("command", &self.command)
            .field("pid", &self.pid())
            .field("state", &self.state())
            .finish()
    }
}

impl RunnerHandle {
    /// The command as launched
    pub fn command(&self) -> &str {
        &self.command
    }

    /// OS process id, once the child has been launched
    pub fn pid(&self) -> Option<u32> {
        self.shared.pid.get().copied()
    }

    /// Block until the child is launched; None if the launch failed
    pub fn wait_for_pid(&self) -> Option<u32> {
        let mut state = self.shared.lock();
        while *state == RunState::NotStarted {
            state = self
                .shared
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        drop(state);
        self.pid()
    }

    /// Block until the runner reaches a final state
    pub fn wait(&self) -> RunState {
        let state = self.shared.lock();
        *self
            .shared
            .changed
            .wait_while(state, |s| !s.is_terminal())
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until a final state or until `timeout` elapses.
    ///
    /// Returns true if the runner finished in time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let state = self.shared.lock();
        let (state, _) = self
            .shared
            .changed
            .wait_timeout_while(state, timeout, |s| !s.is_terminal())
            .unwrap_or_else(PoisonError::into_inner);
        state.is_terminal()
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        *self.shared.lock()
    }

    /// Whether the child has exited, been killed or failed to launch
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Force-terminate the child (SIGKILL on unix)
    ///
    /// # Errors
    /// * `ProcError::NotRunning` - If the child is not launched yet or already gone
    /// * `ProcError::Signal` - If the OS refused to deliver the signal
    pub fn kill(&self) -> Result<(), ProcError> {
        let pid = match self.state() {
            RunState::Running { pid } => pid,
            other => {
                return Err(ProcError::NotRunning {
                    state: other.to_string(),
                })
            }
        };

        let (reply_tx, reply_rx) = std_mpsc::channel();
        if self.kill_tx.send(reply_tx).is_err() {
            return Err(self.not_running());
        }

        match reply_rx.recv() {
            Ok(Ok(())) => {
                tracing::info!(pid, command = %self.command, "killed background process");
                Ok(())
            }
            Ok(Err(source)) => Err(ProcError::Signal { pid, source }),
            // Runner reaped the child before serving the request
            Err(_) => Err(self.not_running()),
        }
    }

    fn not_running(&self) -> ProcError {
        ProcError::NotRunning {
            state: self.state().to_string(),
        }
    }

    /// Wait for the runner thread and return the execution result
    ///
    /// # Errors
    /// * `ProcError::Spawn` - If the child could not be launched
    /// * `ProcError::Runtime` - If the runner thread panicked
    pub fn join(self) -> Result<ExecResult, ProcError> {
        self.thread
            .join()
            .map_err(|_| ProcError::Runtime("runner thread panicked".to_string()))?
    }
}
