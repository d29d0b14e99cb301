//! Spawn options for a command: stream redirects, environment, buffering and
//! text encoding.
//!
//! Options are plain data. They can be built in code or loaded from TOML:
//!
//! ```toml
//! stdout = "pipe"
//! stderr = "merge"
//! buffering = "line"
//! encoding = "utf-8"
//!
//! [env]
//! LC_ALL = "C"
//! ```

pub mod options;

pub use options::{Buffering, CommandOptions, Redirect, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
