//! The pipeline executor: one shell process per execution, stdin fed on a
//! separate task, stdout pulled lazily by the caller.
//!
//! Every execution walks the same phases:
//!
//! ```text
//! Draining --(stdout exhausted)--> Reaping --> Terminated{Success | Failed | Errored}
//! ```
//!
//! Reaping joins the feeder first, so an error raised by the input source
//! wins over a non-zero exit status. Dropping the output stream before it is
//! exhausted terminates the process and aborts the feeder.

use futures::stream::{BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;

use super::feeder::{spawn_feeder, FeedStats};
use super::input::Input;
use crate::config::options::StreamRole;
use crate::config::{Buffering, CommandOptions, DEFAULT_CHUNK_SIZE};
use crate::error::{PipelineError, Result};

/// An immutable, ready-to-run shell command: the formatted command string
/// plus its spawn options.
#[derive(Debug, Clone)]
pub struct Command {
    command: String,
    options: CommandOptions,
}

/// How an execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    Failed(i32),
    Errored,
}

/// Lifecycle of a single execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Draining,
    Reaping,
    Terminated(Outcome),
}

impl Command {
    /// Wrap an already formatted command string. Options are validated here.
    pub fn new(command: impl Into<String>, options: CommandOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            command: command.into(),
            options,
        })
    }

    /// The command string passed to the shell.
    pub fn as_str(&self) -> &str {
        &self.command
    }

    pub fn options(&self) -> &CommandOptions {
        &self.options
    }

    /// Spawn the command and return its stdout as a lazy stream of byte
    /// chunks.
    ///
    /// Must be called from within a Tokio runtime. If `input` is not
    /// [`Input::None`], stdin is a pipe fed by a background task no matter
    /// what `options.stdin` says.
    pub fn execute(&self, input: Input<Vec<u8>>) -> Result<OutputStream> {
        execute_command(self, input)
    }

    /// The script handed to the shell, with stderr folded into stdout when
    /// requested.
    fn script(&self) -> String {
        if !self.options.merges_stderr() {
            return self.command.clone();
        }
        if cfg!(windows) {
            format!("({}) 2>&1", self.command)
        } else {
            format!("exec 2>&1\n{}", self.command)
        }
    }

    fn shell_command(&self) -> tokio::process::Command {
        let (program, flag) = match &self.options.shell {
            Some(shell) => (shell.as_str(), "-c"),
            None if cfg!(windows) => ("cmd", "/C"),
            None => ("sh", "-c"),
        };
        let mut cmd = tokio::process::Command::new(program);
        cmd.arg(flag).arg(self.script());
        cmd
    }

    /// Configure and spawn the shell. `feed` forces stdin to a pipe.
    fn spawn(&self, feed: bool) -> Result<Child> {
        let spawn_error = |source: std::io::Error| PipelineError::Spawn {
            command: self.command.clone(),
            source,
        };

        let mut cmd = self.shell_command();
        // Own process group, so termination reaches every process of a
        // shell pipeline.
        #[cfg(unix)]
        cmd.process_group(0);

        if self.options.env_clear {
            cmd.env_clear();
        }
        cmd.envs(&self.options.env);
        if let Some(dir) = &self.options.working_dir {
            cmd.current_dir(dir);
        }

        let stdin = if feed {
            Stdio::piped()
        } else {
            self.options
                .stdin
                .to_stdio(StreamRole::Stdin)
                .map_err(spawn_error)?
        };
        cmd.stdin(stdin);
        cmd.stdout(
            self.options
                .stdout
                .to_stdio(StreamRole::Stdout)
                .map_err(spawn_error)?,
        );
        cmd.stderr(
            self.options
                .stderr
                .to_stdio(StreamRole::Stderr)
                .map_err(spawn_error)?,
        );

        cmd.spawn().map_err(|e| {
            tracing::error!("Failed to spawn shell for {:?}: {}", self.command, e);
            spawn_error(e)
        })
    }
}

fn log_command_start(command: &Command, feed: bool) {
    tracing::debug!("Executing pipeline: {}", command.command);
    if !command.options.env.is_empty() {
        tracing::trace!("Environment overrides: {:?}", command.options.env);
    }
    if let Some(dir) = &command.options.working_dir {
        tracing::trace!("Working directory: {:?}", dir);
    }
    tracing::trace!(
        "stdin fed: {}, buffering: {:?}",
        feed,
        command.options.buffering
    );
}

fn execute_command(command: &Command, input: Input<Vec<u8>>) -> Result<OutputStream> {
    let input = input.into_stream();
    let feed = input.is_some();

    log_command_start(command, feed);
    let mut child = command.spawn(feed)?;
    let pid = child.id();

    // The feeder starts before the caller can see any output, so a process
    // that needs to read and write at the same time cannot deadlock.
    let feeder = match (input, child.stdin.take()) {
        (Some(input), Some(stdin)) => Some(spawn_feeder(stdin, input, command.command.clone())),
        // A configured stdin pipe with nothing to feed is closed right away.
        (_, stdin) => {
            drop(stdin);
            None
        }
    };

    if !command.options.stdout.is_pipe() {
        tracing::trace!("No stdout pipe for {:?}; output is empty", command.command);
    }
    let stdout = child
        .stdout
        .take()
        .map(|stdout| BufReader::with_capacity(DEFAULT_CHUNK_SIZE, stdout));
    let read_buf = match command.options.buffering {
        Buffering::Chunked(size) => vec![0u8; size],
        Buffering::Line => Vec::new(),
    };

    let execution = Execution {
        command: command.command.clone(),
        buffering: command.options.buffering,
        child,
        stdout,
        read_buf,
        feeder,
        phase: Phase::Draining,
    };

    Ok(OutputStream {
        command: command.command.clone(),
        pid,
        inner: futures::stream::unfold(execution, Execution::step).boxed(),
    })
}

/// State owned by one execution. Dropping it before `Terminated` kills the
/// process.
struct Execution {
    command: String,
    buffering: Buffering,
    child: Child,
    stdout: Option<BufReader<ChildStdout>>,
    /// Reused for every chunked read.
    read_buf: Vec<u8>,
    feeder: Option<JoinHandle<Result<FeedStats>>>,
    phase: Phase,
}

impl Execution {
    async fn step(mut self) -> Option<(Result<Vec<u8>>, Self)> {
        if self.phase == Phase::Draining {
            match self.read_next().await {
                Ok(Some(chunk)) => return Some((Ok(chunk), self)),
                Ok(None) => self.phase = Phase::Reaping,
                Err(e) => {
                    tracing::debug!("Reading output of {:?} failed: {}", self.command, e);
                    self.terminate();
                    self.phase = Phase::Terminated(Outcome::Errored);
                    return Some((Err(e), self));
                }
            }
        }

        if self.phase != Phase::Reaping {
            return None;
        }

        match self.reap().await {
            Ok(()) => None,
            Err(e) => Some((Err(e), self)),
        }
    }

    /// Next output element, or `None` at end of stdout.
    async fn read_next(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let chunk = match self.buffering {
            Buffering::Chunked(_) => {
                let n = stdout.read(&mut self.read_buf).await?;
                self.read_buf[..n].to_vec()
            }
            Buffering::Line => {
                let mut line = Vec::new();
                stdout.read_until(b'\n', &mut line).await?;
                line
            }
        };

        if chunk.is_empty() {
            self.stdout = None;
            return Ok(None);
        }
        tracing::trace!("Read {} bytes from {:?}", chunk.len(), self.command);
        Ok(Some(chunk))
    }

    /// Join the feeder, then wait for the exit status.
    async fn reap(&mut self) -> Result<()> {
        if let Some(feeder) = self.feeder.take() {
            let fed = match feeder.await {
                Ok(result) => result,
                Err(join_error) => Err(PipelineError::Io(std::io::Error::other(format!(
                    "stdin feeder task failed: {join_error}"
                )))),
            };
            if let Err(e) = fed {
                self.terminate();
                self.phase = Phase::Terminated(Outcome::Errored);
                return Err(e);
            }
        }

        let status = match self.child.wait().await {
            Ok(status) => status,
            Err(e) => {
                self.phase = Phase::Terminated(Outcome::Errored);
                return Err(PipelineError::Io(e));
            }
        };

        let outcome = exit_outcome(status, &self.command);
        self.phase = Phase::Terminated(match &outcome {
            Ok(()) => Outcome::Success,
            Err(PipelineError::CommandFailed { code, .. }) => Outcome::Failed(*code),
            Err(_) => Outcome::Errored,
        });
        match self.phase {
            Phase::Terminated(Outcome::Failed(code)) => {
                tracing::debug!("Pipeline {:?} exited with status {}", self.command, code)
            }
            phase => tracing::debug!("Pipeline {:?} finished: {:?}", self.command, phase),
        }
        outcome
    }

    /// Ask the process group to stop and abandon the feeder.
    fn terminate(&mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            // The shell leads its own group; a negative pid signals all of it.
            if let Some(pid) = self.child.id() {
                match kill(Pid::from_raw(-(pid as i32)), Signal::SIGTERM) {
                    Ok(()) => return,
                    Err(e) => tracing::debug!("SIGTERM to group {} failed: {}", pid, e),
                }
            }
        }

        if let Err(e) = self.child.start_kill() {
            tracing::debug!("Killing {:?} failed: {}", self.command, e);
        }
    }
}

impl Drop for Execution {
    fn drop(&mut self) {
        if matches!(self.phase, Phase::Terminated(_)) {
            return;
        }
        tracing::warn!(
            "Output of {:?} abandoned before exhaustion; terminating process",
            self.command
        );
        self.terminate();
    }
}

/// Map an exit status to the execution result.
fn exit_outcome(status: std::process::ExitStatus, command: &str) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    if let Some(code) = status.code() {
        return Err(PipelineError::CommandFailed {
            code,
            command: command.to_string(),
        });
    }
    signal_outcome(status, command)
}

#[cfg(unix)]
fn signal_outcome(status: std::process::ExitStatus, command: &str) -> Result<()> {
    use std::os::unix::process::ExitStatusExt;
    Err(match status.signal() {
        Some(signal) => PipelineError::Terminated {
            signal,
            command: command.to_string(),
        },
        None => PipelineError::CommandFailed {
            code: -1,
            command: command.to_string(),
        },
    })
}

#[cfg(not(unix))]
fn signal_outcome(_status: std::process::ExitStatus, command: &str) -> Result<()> {
    Err(PipelineError::CommandFailed {
        code: -1,
        command: command.to_string(),
    })
}

/// The lazily produced stdout of one execution.
///
/// Yields chunks (or lines in line-buffered mode) as the caller polls. The
/// stream ends after the process has been reaped; a failure is reported as
/// a final `Err` item. Dropping it early terminates the process.
pub struct OutputStream {
    command: String,
    pid: Option<u32>,
    inner: BoxStream<'static, Result<Vec<u8>>>,
}

impl OutputStream {
    pub fn command(&self) -> &str {
        &self.command
    }

    /// OS process id of the shell, if it was still running at spawn time.
    pub fn id(&self) -> Option<u32> {
        self.pid
    }
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("command", &self.command)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl Stream for OutputStream {
    type Item = Result<Vec<u8>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl From<OutputStream> for Input<Vec<u8>> {
    fn from(output: OutputStream) -> Self {
        Input::from_results(output)
    }
}
