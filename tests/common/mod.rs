//! Common test utilities and helpers

use futures::{Stream, StreamExt};
use shellpipe::{PipelineError, Result};
use std::path::Path;
use tempfile::TempDir;

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env(shellpipe::logging::LOG_ENV)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A scratch directory for commands that touch the filesystem.
pub struct TestContext {
    pub temp_dir: TempDir,
}

impl TestContext {
    pub fn new() -> anyhow::Result<Self> {
        init_tracing();
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}

/// Collect every element of an output stream, stopping at the first error.
pub async fn collect_all<S, T>(mut stream: S) -> (Vec<T>, Option<PipelineError>)
where
    S: Stream<Item = Result<T>> + Unpin,
{
    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(item) => items.push(item),
            Err(e) => return (items, Some(e)),
        }
    }
    (items, None)
}
