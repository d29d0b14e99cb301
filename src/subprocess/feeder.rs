//! The stdin feeder task.
//!
//! The feeder takes exclusive ownership of the child's stdin. It writes the
//! input in order and closes stdin on every exit path: end of input, broken
//! pipe, an input error or a write error.

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::task::JoinHandle;

use super::input::InputStream;
use crate::error::{PipelineError, Result};

/// What the feeder managed to write before stopping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub chunks: usize,
    pub bytes: usize,
    /// The reader closed its end before all input was written.
    pub broken_pipe: bool,
}

/// Whether `error` means the reading side of the pipe went away.
///
/// Platforms disagree on how this is reported, so both the portable error
/// kind and the raw `EPIPE` code are accepted.
pub fn is_broken_pipe(error: &std::io::Error) -> bool {
    #[cfg(unix)]
    let raw_epipe = error.raw_os_error() == Some(nix::libc::EPIPE);
    #[cfg(not(unix))]
    let raw_epipe = false;

    error.kind() == std::io::ErrorKind::BrokenPipe || raw_epipe
}

/// Start feeding `input` into `stdin` on a separate task.
pub(crate) fn spawn_feeder(
    stdin: ChildStdin,
    input: InputStream<Vec<u8>>,
    command: String,
) -> JoinHandle<Result<FeedStats>> {
    tokio::spawn(async move {
        let result = feed(stdin, input).await;
        match &result {
            Ok(stats) if stats.broken_pipe => tracing::debug!(
                "Reader closed stdin early for {:?} after {} bytes",
                command,
                stats.bytes
            ),
            Ok(stats) => tracing::trace!(
                "Fed {} chunks ({} bytes) to {:?}",
                stats.chunks,
                stats.bytes,
                command
            ),
            Err(e) => tracing::debug!("Feeding {:?} stopped with error: {}", command, e),
        }
        result
    })
}

async fn feed(mut stdin: ChildStdin, mut input: InputStream<Vec<u8>>) -> Result<FeedStats> {
    let mut stats = FeedStats::default();

    while let Some(item) = input.next().await {
        let chunk = item.map_err(PipelineError::Input)?;
        if let Err(e) = stdin.write_all(&chunk).await {
            if is_broken_pipe(&e) {
                stats.broken_pipe = true;
                return Ok(stats);
            }
            return Err(PipelineError::Io(e));
        }
        stats.chunks += 1;
        stats.bytes += chunk.len();
    }

    match stdin.flush().await {
        Err(e) if is_broken_pipe(&e) => stats.broken_pipe = true,
        Err(e) => return Err(PipelineError::Io(e)),
        Ok(()) => {}
    }
    // Dropping stdin closes the pipe and signals EOF.
    Ok(stats)
}
