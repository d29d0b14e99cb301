//! # Shellpipe
//!
//! Run shell command lines as lazy streaming filters: an input sequence is
//! written to the process's stdin while its stdout is read back as a stream
//! of byte chunks, decoded text or lines.
//!
//! ## Usage
//!
//! ```no_run
//! # async fn demo() -> shellpipe::Result<()> {
//! use futures::StreamExt;
//! use shellpipe::{linecmd, Input};
//!
//! let sorted = linecmd("sort -u", &[] as &[&str])?;
//! let mut lines = sorted.execute(Input::from(vec!["b\n".to_string(), "a\n".to_string()]))?;
//! while let Some(line) = lines.next().await {
//!     print!("{}", line?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - `format` - `{}` templates with shell escaping of arguments
//! - `config` - Spawn options, loadable from TOML
//! - `subprocess` - Spawning, stdin feeding and the lazy output stream
//! - `text` - Text and line flavors with incremental decoding
//! - `helpers` - `run`, `call` and `check_call`
//! - `compose` - `|` composition of commands and stream transforms
//! - `logging` - Tracing subscriber setup
pub mod compose;
pub mod config;
pub mod error;
pub mod format;
pub mod helpers;
pub mod logging;
pub mod subprocess;
pub mod text;

pub use config::{Buffering, CommandOptions, Redirect};
pub use error::{PipelineError, Result};
pub use format::{format_command, shell_escape};
pub use helpers::{call, check_call, run};
pub use subprocess::{
    bincmd, cmd, linecmd, Command, CommandBuilder, Execute, Input, OutputStream,
};
pub use text::{LineCommand, TextCommand, TextStream};
