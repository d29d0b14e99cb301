//! Text and line flavors layered over the binary [`Command`].
//!
//! A [`TextCommand`] encodes `String` input and decodes stdout with one
//! encoding. A [`LineCommand`] additionally forces line-buffered reads so
//! that each output element is one line, newline included.

pub mod encoding;

use encoding_rs::Encoding;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::config::Buffering;
use crate::error::{PipelineError, Result};
use crate::subprocess::{Command, Execute, Input, OutputStream};

pub use encoding::{encoding_for_label, locale_encoding};
use encoding::StreamDecoder;

/// A command over text: input strings are encoded, output is decoded.
#[derive(Debug, Clone)]
pub struct TextCommand {
    command: Command,
    encoding: &'static Encoding,
}

impl TextCommand {
    /// Use the encoding named in the command's options, or the locale's.
    pub fn new(command: Command) -> Result<Self> {
        let encoding = match &command.options().encoding {
            Some(label) => encoding_for_label(label)?,
            None => locale_encoding(),
        };
        Ok(Self { command, encoding })
    }

    pub fn with_encoding(command: Command, encoding: &'static Encoding) -> Self {
        Self { command, encoding }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn execute(&self, input: Input<String>) -> Result<TextStream> {
        let encoding = self.encoding;
        let input = input.map(move |text| encoding::encode(encoding, &text));
        let output = self.command.execute(input)?;
        Ok(TextStream::new(output, encoding))
    }
}

impl Execute for TextCommand {
    type Item = String;
    type Output = String;
    type Stream = TextStream;

    fn execute(&self, input: Input<String>) -> Result<TextStream> {
        TextCommand::execute(self, input)
    }
}

/// A text command yielding one line per element.
#[derive(Debug, Clone)]
pub struct LineCommand {
    text: TextCommand,
}

impl LineCommand {
    /// Wrap `command`, switching it to line-buffered output.
    pub fn new(command: Command) -> Result<Self> {
        let mut options = command.options().clone();
        options.buffering = Buffering::Line;
        let command = Command::new(command.as_str(), options)?;
        Ok(Self {
            text: TextCommand::new(command)?,
        })
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.text.encoding()
    }

    pub fn command(&self) -> &Command {
        self.text.command()
    }

    pub fn execute(&self, input: Input<String>) -> Result<TextStream> {
        self.text.execute(input)
    }
}

impl Execute for LineCommand {
    type Item = String;
    type Output = String;
    type Stream = TextStream;

    fn execute(&self, input: Input<String>) -> Result<TextStream> {
        LineCommand::execute(self, input)
    }
}

/// Decoded stdout of a text or line command.
pub struct TextStream {
    inner: OutputStream,
    decoder: StreamDecoder,
    /// Terminal error held back until the decoder tail has been yielded.
    pending_error: Option<PipelineError>,
    finished: bool,
}

impl TextStream {
    fn new(inner: OutputStream, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            decoder: StreamDecoder::new(encoding),
            pending_error: None,
            finished: false,
        }
    }

    pub fn command(&self) -> &str {
        self.inner.command()
    }

    pub fn id(&self) -> Option<u32> {
        self.inner.id()
    }
}

impl Stream for TextStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(e) = this.pending_error.take() {
                return Poll::Ready(Some(Err(e)));
            }
            if this.finished {
                return Poll::Ready(None);
            }
            match futures::ready!(this.inner.poll_next_unpin(cx)) {
                Some(Ok(bytes)) => {
                    let text = this.decoder.decode(&bytes, false);
                    if !text.is_empty() {
                        return Poll::Ready(Some(Ok(text)));
                    }
                }
                Some(Err(e)) => {
                    this.finished = true;
                    let tail = this.decoder.decode(&[], true);
                    if tail.is_empty() {
                        return Poll::Ready(Some(Err(e)));
                    }
                    this.pending_error = Some(e);
                    return Poll::Ready(Some(Ok(tail)));
                }
                None => {
                    this.finished = true;
                    let tail = this.decoder.decode(&[], true);
                    if !tail.is_empty() {
                        return Poll::Ready(Some(Ok(tail)));
                    }
                }
            }
        }
    }
}

impl From<TextStream> for Input<String> {
    fn from(output: TextStream) -> Self {
        Input::from_results(output)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::subprocess::CommandBuilder;

    #[tokio::test]
    async fn test_text_round_trip_utf8() {
        let grep = CommandBuilder::new("grep {}")
            .arg("λ[a-zA-Z]\\.")
            .encoding("utf-8")
            .build_text()
            .unwrap();
        let text = "привет, λ!\nλx. x\nдо свидания\n";

        let out: Vec<String> = grep
            .execute(Input::from(text))
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(out.concat(), "λx. x\n");
    }

    #[tokio::test]
    async fn test_text_decodes_across_chunk_boundaries() {
        let cat = CommandBuilder::new("cat")
            .chunk_size(1)
            .encoding("utf-8")
            .build_text()
            .unwrap();
        let out: Vec<String> = cat
            .execute(Input::from("añλ"))
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(out.concat(), "añλ");
        assert!(out.iter().all(|s| !s.is_empty()));
    }

    #[tokio::test]
    async fn test_latin1_encoding() {
        let od = CommandBuilder::new("od -An -tx1")
            .encoding("latin1")
            .build_text()
            .unwrap();
        let out: Vec<String> = od
            .execute(Input::from("é"))
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(out.concat().trim(), "e9");
    }

    #[tokio::test]
    async fn test_line_command_splits_lines() {
        let tr = CommandBuilder::new("tr a-z A-Z")
            .encoding("utf-8")
            .build_lines()
            .unwrap();
        assert_eq!(tr.command().options().buffering, Buffering::Line);

        let lines: Vec<String> = tr
            .execute(Input::from("абв\nabc\n"))
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec!["абв\n".to_string(), "ABC\n".to_string()]);
    }

    #[tokio::test]
    async fn test_partial_character_flushed_before_terminal_error() {
        let truncated = CommandBuilder::new("printf '\\316'; exit 3")
            .encoding("utf-8")
            .build_text()
            .unwrap();
        let items: Vec<Result<String>> = truncated.execute(Input::none()).unwrap().collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "\u{FFFD}");
        assert_eq!(items[1].as_ref().unwrap_err().exit_code(), Some(3));
    }

    #[tokio::test]
    async fn test_line_command_keeps_final_partial_line() {
        let printf = CommandBuilder::new("printf 'foo\\nbar'")
            .build_lines()
            .unwrap();
        let lines: Vec<String> = printf
            .execute(Input::none())
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec!["foo\n".to_string(), "bar".to_string()]);
    }
}
