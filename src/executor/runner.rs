//! Blocking and async command execution
//!
//! Provides a unified interface for running commands with:
//! - Shell-word normalization of command lines
//! - Per-stream sinks (capture, inherit, null, file)
//! - Environment variable injection
//! - Working directory control
//!
//! Captured streams are drained by dedicated reader tasks while the child
//! runs, so a child blocked on a full pipe is always unblocked.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::command::CommandSpec;
use super::sink::Sink;
use crate::error::ProcError;

/// Initial capacity of capture buffers
const CAPTURE_CHUNK: usize = 8 * 1024;

/// How long captured pipes may stay open after the child was reaped
pub(crate) const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Options for command execution
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Working directory for the command (None = caller's directory)
    pub working_dir: Option<PathBuf>,
    /// Environment variables to set
    pub env: HashMap<String, String>,
    /// Destination of the child's stdout
    pub stdout: Sink,
    /// Destination of the child's stderr
    pub stderr: Sink,
}

impl ExecOptions {
    /// Create options with a working directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
            ..Default::default()
        }
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the stdout sink
    pub fn with_stdout(mut self, sink: Sink) -> Self {
        self.stdout = sink;
        self
    }

    /// Set the stderr sink
    pub fn with_stderr(mut self, sink: Sink) -> Self {
        self.stderr = sink;
        self
    }
}

/// Result of a finished command
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Exit code; None when the child was ended by a signal
    pub exit_code: Option<i32>,
    /// Signal that ended the child (unix only)
    pub signal: Option<i32>,
    /// Captured stdout (empty unless the stdout sink is `Capture`)
    pub stdout: Vec<u8>,
    /// Captured stderr (empty unless the stderr sink is `Capture`)
    pub stderr: Vec<u8>,
    /// Wall-clock time from launch to exit
    pub duration: Duration,
}

impl ExecResult {
    /// Whether the command exited with code 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Split into `(exit_code, stdout, stderr)`
    pub fn into_parts(self) -> (Option<i32>, Vec<u8>, Vec<u8>) {
        (self.exit_code, self.stdout, self.stderr)
    }

    /// Captured stdout as text, invalid UTF-8 replaced
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Captured stderr as text, invalid UTF-8 replaced
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Launch the child described by `command`.
///
/// Returns the child together with the rendered command line.
pub(crate) fn spawn_child(
    command: &CommandSpec,
    options: &ExecOptions,
) -> Result<(Child, String), ProcError> {
    let argv = command.normalize()?;
    let (program, args) = argv.split_first().ok_or(ProcError::EmptyCommand)?;
    let command_str = command.display();

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdout(options.stdout.to_stdio()?);
    cmd.stderr(options.stderr.to_stdio()?);
    cmd.kill_on_drop(true);

    if let Some(ref dir) = options.working_dir {
        cmd.current_dir(dir);
    }

    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    tracing::debug!(command = %command_str, cwd = ?options.working_dir, "launching process");

    let child = cmd.spawn().map_err(|e| {
        tracing::debug!(command = %command_str, error = %e, "launch failed");
        ProcError::Spawn {
            command: command_str.clone(),
            working_dir: options.working_dir.clone(),
            source: e,
        }
    })?;

    Ok((child, command_str))
}

/// Execute a command asynchronously and wait for it to finish
///
/// # Arguments
/// * `command` - Command line or pre-split arguments
/// * `options` - Execution options
///
/// # Errors
/// * `ProcError::Tokenize` - If the command line cannot be split
/// * `ProcError::EmptyCommand` - If there is no program to run
/// * `ProcError::Spawn` - If the OS could not launch the program
pub async fn exec_command(
    command: impl Into<CommandSpec>,
    options: &ExecOptions,
) -> Result<ExecResult, ProcError> {
    let command = command.into();
    let start = Instant::now();

    let (mut child, command_str) = spawn_child(&command, options)?;
    let readers = OutputReaders::start(&mut child);
    let reaped = reap(&mut child, None).await?;
    let duration = start.elapsed();

    tracing::debug!(
        command = %command_str,
        exit_code = ?reaped.exit_code(),
        elapsed_ms = duration.as_millis() as u64,
        "process exited"
    );

    let (stdout, stderr) = readers.collect().await?;

    Ok(ExecResult {
        exit_code: reaped.exit_code(),
        signal: reaped.signal(),
        stdout,
        stderr,
        duration,
    })
}

/// A request to kill the child; the outcome of the signal is sent back
pub(crate) type KillRequest = std::sync::mpsc::Sender<std::io::Result<()>>;

/// How a child ended
#[derive(Debug)]
pub(crate) struct Reaped {
    pub status: ExitStatus,
    /// A kill signal was delivered before the child was reaped
    pub kill_sent: bool,
}

impl Reaped {
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn signal(&self) -> Option<i32> {
        exit_signal(&self.status)
    }
}

/// Wait for the child to exit.
///
/// When `kill_rx` is given, kill requests are served until the child is
/// reaped. The child is borrowed from its owner, so a signal never reaches a
/// recycled pid. Requests still queued afterwards are refused once the
/// caller drops the receiver.
pub(crate) async fn reap(
    child: &mut Child,
    mut kill_rx: Option<&mut mpsc::UnboundedReceiver<KillRequest>>,
) -> Result<Reaped, ProcError> {
    let mut kill_sent = false;
    let status = loop {
        tokio::select! {
            status = child.wait() => break status?,
            Some(reply) = next_kill_request(kill_rx.as_deref_mut()) => {
                let outcome = child.start_kill();
                kill_sent |= outcome.is_ok();
                let _ = reply.send(outcome);
            }
        }
    };

    Ok(Reaped { status, kill_sent })
}

async fn next_kill_request(
    kill_rx: Option<&mut mpsc::UnboundedReceiver<KillRequest>>,
) -> Option<KillRequest> {
    match kill_rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Tasks draining a child's captured streams
pub(crate) struct OutputReaders {
    stdout: StreamReader,
    stderr: StreamReader,
}

impl OutputReaders {
    /// Start draining the child's piped streams, if any
    pub fn start(child: &mut Child) -> Self {
        Self {
            stdout: StreamReader::spawn("stdout", child.stdout.take()),
            stderr: StreamReader::spawn("stderr", child.stderr.take()),
        }
    }

    /// Collect both streams once the child has been reaped.
    ///
    /// A descendant may keep a pipe open after the child is gone; such a
    /// stream is given `DRAIN_GRACE` and then abandoned with what was read.
    pub async fn collect(self) -> Result<(Vec<u8>, Vec<u8>), ProcError> {
        let (stdout, stderr) = tokio::join!(
            self.stdout.collect(DRAIN_GRACE),
            self.stderr.collect(DRAIN_GRACE)
        );
        Ok((stdout?, stderr?))
    }
}

struct StreamReader {
    name: &'static str,
    buffer: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl StreamReader {
    fn spawn<R>(name: &'static str, stream: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let handle = tokio::spawn(async move {
            match stream {
                Some(stream) => read_into(stream, &sink).await,
                None => Ok(()),
            }
        });

        Self {
            name,
            buffer,
            handle,
        }
    }

    async fn collect(mut self, grace: Duration) -> Result<Vec<u8>, ProcError> {
        match tokio::time::timeout(grace, &mut self.handle).await {
            Ok(joined) => joined.map_err(|e| {
                ProcError::Runtime(format!("{} reader failed: {}", self.name, e))
            })??,
            Err(_) => {
                tracing::warn!(
                    stream = self.name,
                    "still open {:?} after exit; keeping what was read",
                    grace
                );
                self.handle.abort();
            }
        }

        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(std::mem::take(&mut *buffer))
    }
}

/// Read a stream to EOF, appending to `buffer` as data arrives
async fn read_into<R: AsyncRead + Unpin>(
    mut reader: R,
    buffer: &Mutex<Vec<u8>>,
) -> std::io::Result<()> {
    let mut chunk = vec![0u8; CAPTURE_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await.inspect_err(|e| {
            tracing::warn!("Error reading output: {}", e);
        })?;
        if n == 0 {
            return Ok(());
        }
        buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(&chunk[..n]);
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

/// Build the single-threaded runtime used by the blocking entry points
pub(crate) fn current_thread_runtime() -> Result<tokio::runtime::Runtime, ProcError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ProcError::Runtime(format!("Failed to create runtime: {}", e)))
}

/// Execute a command and block until it finishes
///
/// This is the blocking counterpart of `exec_command` for non-async code.
/// There is no timeout: the call returns only once the child has exited.
///
/// Safe to call from inside a tokio runtime: the child is then driven from a
/// scoped helper thread, and the calling worker is blocked until it returns.
/// Async callers should prefer `exec_command`.
pub fn run(
    command: impl Into<CommandSpec>,
    options: &ExecOptions,
) -> Result<ExecResult, ProcError> {
    let command = command.into();

    if tokio::runtime::Handle::try_current().is_err() {
        return block_on_exec(&command, options);
    }

    // A nested block_on would panic on this thread
    thread::scope(|scope| {
        scope
            .spawn(|| block_on_exec(&command, options))
            .join()
            .map_err(|_| ProcError::Runtime("runner thread panicked".to_string()))?
    })
}

fn block_on_exec(command: &CommandSpec, options: &ExecOptions) -> Result<ExecResult, ProcError> {
    current_thread_runtime()?.block_on(exec_command(command.clone(), options))
}

/// Execute a command line through a shell (`shell -c line`)
pub async fn exec_shell_command(
    shell: &str,
    line: &str,
    options: &ExecOptions,
) -> Result<ExecResult, ProcError> {
    exec_command(vec![shell, "-c", line], options).await
}
