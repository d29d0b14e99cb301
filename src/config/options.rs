use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use crate::error::{PipelineError, Result};

/// Read size used when draining stdout in chunked mode.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Largest accepted chunk size; the read buffer is allocated up front.
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Where one of the three standard streams of the child goes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Redirect {
    /// Share the parent's stream.
    #[default]
    Inherit,
    /// Connect to the null device.
    Null,
    /// A pipe owned by the executor.
    Pipe,
    /// Stderr only: send it wherever stdout goes.
    Merge,
    /// Open a file at spawn time. Read for stdin, create/truncate otherwise.
    File(PathBuf),
    /// An already open handle, duplicated for every spawn.
    #[serde(skip)]
    Handle(Arc<File>),
}

/// Which standard stream a [`Redirect`] applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamRole {
    Stdin,
    Stdout,
    Stderr,
}

impl Redirect {
    /// Redirect to an open file handle.
    pub fn handle(file: File) -> Self {
        Redirect::Handle(Arc::new(file))
    }

    pub fn is_pipe(&self) -> bool {
        matches!(self, Redirect::Pipe)
    }

    /// Build the `Stdio` for this redirect. `Merge` is resolved by the shell,
    /// so the child's own stderr is left inherited.
    pub(crate) fn to_stdio(&self, role: StreamRole) -> std::io::Result<Stdio> {
        Ok(match self {
            Redirect::Inherit | Redirect::Merge => Stdio::inherit(),
            Redirect::Null => Stdio::null(),
            Redirect::Pipe => Stdio::piped(),
            Redirect::File(path) => Stdio::from(Self::open_for(path, role)?),
            Redirect::Handle(file) => Stdio::from(file.try_clone()?),
        })
    }

    fn open_for(path: &Path, role: StreamRole) -> std::io::Result<File> {
        match role {
            StreamRole::Stdin => File::open(path),
            StreamRole::Stdout | StreamRole::Stderr => OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path),
        }
    }
}

/// How stdout is cut into output elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Buffering {
    /// Fixed-size reads of at most this many bytes.
    Chunked(usize),
    /// One newline-terminated line per element.
    Line,
}

impl Default for Buffering {
    fn default() -> Self {
        Buffering::Chunked(DEFAULT_CHUNK_SIZE)
    }
}

/// The full set of spawn options recognized for a command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandOptions {
    pub stdin: Redirect,
    pub stdout: Redirect,
    pub stderr: Redirect,
    /// Variables added to (or overriding) the child's environment.
    pub env: HashMap<String, String>,
    /// Start the child from an empty environment before applying `env`.
    pub env_clear: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    pub buffering: Buffering,
    /// Shell used to interpret the command string instead of `sh -c`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    /// Text encoding label for the text and line flavors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            stdin: Redirect::Inherit,
            stdout: Redirect::Pipe,
            stderr: Redirect::Inherit,
            env: HashMap::new(),
            env_clear: false,
            working_dir: None,
            buffering: Buffering::default(),
            shell: None,
            encoding: None,
        }
    }
}

impl CommandOptions {
    /// Parse options from a TOML document and validate them.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let options: CommandOptions = toml::from_str(s)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Reject option combinations that cannot be spawned.
    pub fn validate(&self) -> Result<()> {
        if matches!(self.stdin, Redirect::Merge) {
            return Err(PipelineError::InvalidOptions(
                "stdin cannot be merged into stdout".to_string(),
            ));
        }
        if matches!(self.stdout, Redirect::Merge) {
            return Err(PipelineError::InvalidOptions(
                "stdout cannot be merged into itself".to_string(),
            ));
        }
        if let Buffering::Chunked(size) = self.buffering {
            if size == 0 || size > MAX_CHUNK_SIZE {
                return Err(PipelineError::InvalidOptions(format!(
                    "chunk size must be between 1 and {MAX_CHUNK_SIZE}, got {size}"
                )));
            }
        }
        if let Some(shell) = &self.shell {
            if shell.trim().is_empty() {
                return Err(PipelineError::InvalidOptions(
                    "shell must not be empty".to_string(),
                ));
            }
        }
        if let Some(label) = &self.encoding {
            crate::text::encoding_for_label(label)?;
        }
        Ok(())
    }

    pub fn merges_stderr(&self) -> bool {
        matches!(self.stderr, Redirect::Merge)
    }
}
