use thiserror::Error;

/// Everything that can go wrong while formatting, spawning or draining a
/// command.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("arguments do not match the format string {template:?}: expected {expected}, got {got}")]
    FormatArity {
        template: String,
        expected: usize,
        got: usize,
    },

    #[error("input must be a sequence, a single value or none, got {type_name}")]
    InvalidInputType { type_name: String },

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),

    #[error("Command {command:?} returned non-zero exit status {code}")]
    CommandFailed { code: i32, command: String },

    #[error("Command {command:?} terminated by signal {signal}")]
    Terminated { signal: i32, command: String },

    #[error("Failed to spawn {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Config(#[from] toml::de::Error),

    /// An error raised by the input source itself, passed through untouched.
    #[error(transparent)]
    Input(anyhow::Error),
}

impl PipelineError {
    /// Exit code carried by a [`PipelineError::CommandFailed`].
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            PipelineError::CommandFailed { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The input source's own error, if this is one.
    pub fn input_error(&self) -> Option<&anyhow::Error> {
        match self {
            PipelineError::Input(err) => Some(err),
            _ => None,
        }
    }

    /// Consume the error and recover the input source's error of type `E`.
    pub fn into_input_error<E>(self) -> std::result::Result<E, Self>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            PipelineError::Input(err) => err.downcast::<E>().map_err(PipelineError::Input),
            other => Err(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
