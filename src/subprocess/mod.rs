//! Process plumbing: command construction, stdin feeding and lazy stdout.

pub mod builder;
pub mod executor;
pub mod feeder;
pub mod input;

#[cfg(all(test, unix))]
mod tests;

pub use builder::CommandBuilder;
pub use executor::{Command, OutputStream};
pub use feeder::{is_broken_pipe, FeedStats};
pub use input::{Input, InputStream};

use futures::Stream;

use crate::error::Result;
use crate::text::{LineCommand, TextCommand};

/// Anything that maps an input sequence to a lazily produced output
/// sequence by running a process.
pub trait Execute {
    /// Element type written to stdin.
    type Item: Send + 'static;
    /// Element type read from stdout.
    type Output: Send + 'static;
    type Stream: Stream<Item = Result<Self::Output>> + Send + Unpin + 'static;

    fn execute(&self, input: Input<Self::Item>) -> Result<Self::Stream>;
}

impl Execute for Command {
    type Item = Vec<u8>;
    type Output = Vec<u8>;
    type Stream = OutputStream;

    fn execute(&self, input: Input<Vec<u8>>) -> Result<OutputStream> {
        Command::execute(self, input)
    }
}

/// A binary command working on raw byte chunks.
pub fn bincmd<S: AsRef<str>>(template: &str, args: &[S]) -> Result<Command> {
    CommandBuilder::new(template).args(args).build()
}

/// A text command using the locale's encoding.
pub fn cmd<S: AsRef<str>>(template: &str, args: &[S]) -> Result<TextCommand> {
    CommandBuilder::new(template).args(args).build_text()
}

/// A line-oriented text command.
pub fn linecmd<S: AsRef<str>>(template: &str, args: &[S]) -> Result<LineCommand> {
    CommandBuilder::new(template).args(args).build_lines()
}
