use std::collections::HashMap;
use std::path::Path;

use crate::config::{Buffering, CommandOptions, Redirect};
use crate::error::Result;
use crate::format::format_command;
use crate::subprocess::Command;
use crate::text::{LineCommand, TextCommand};

/// Fluent construction of a [`Command`] from a `{}` template, positional
/// arguments and spawn options.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    template: String,
    args: Vec<String>,
    options: CommandOptions,
}

impl CommandBuilder {
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
            args: Vec::new(),
            options: CommandOptions::default(),
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Replace all options at once, e.g. with options loaded from TOML.
    pub fn options(mut self, options: CommandOptions) -> Self {
        self.options = options;
        self
    }

    pub fn stdin(mut self, redirect: Redirect) -> Self {
        self.options.stdin = redirect;
        self
    }

    pub fn stdout(mut self, redirect: Redirect) -> Self {
        self.options.stdout = redirect;
        self
    }

    pub fn stderr(mut self, redirect: Redirect) -> Self {
        self.options.stderr = redirect;
        self
    }

    /// Shorthand for `stderr(Redirect::Merge)`.
    pub fn merge_stderr(self) -> Self {
        self.stderr(Redirect::Merge)
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.options
            .env
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();
        self.options.env.extend(vars);
        self
    }

    pub fn env_clear(mut self) -> Self {
        self.options.env_clear = true;
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.options.working_dir = Some(dir.to_path_buf());
        self
    }

    pub fn buffering(mut self, buffering: Buffering) -> Self {
        self.options.buffering = buffering;
        self
    }

    pub fn chunk_size(self, size: usize) -> Self {
        self.buffering(Buffering::Chunked(size))
    }

    pub fn line_buffered(self) -> Self {
        self.buffering(Buffering::Line)
    }

    pub fn shell(mut self, shell: &str) -> Self {
        self.options.shell = Some(shell.to_string());
        self
    }

    /// Encoding label used by [`build_text`](Self::build_text) and
    /// [`build_lines`](Self::build_lines).
    pub fn encoding(mut self, label: &str) -> Self {
        self.options.encoding = Some(label.to_string());
        self
    }

    /// Format the template and validate the options.
    pub fn build(self) -> Result<Command> {
        let command = format_command(&self.template, &self.args)?;
        Command::new(command, self.options)
    }

    /// Build a text command that encodes input and decodes output.
    pub fn build_text(self) -> Result<TextCommand> {
        TextCommand::new(self.build()?)
    }

    /// Build a line-oriented text command.
    pub fn build_lines(self) -> Result<LineCommand> {
        LineCommand::new(self.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    #[test]
    fn test_build_formats_and_escapes() {
        let cmd = CommandBuilder::new("grep {} {}")
            .arg("two words")
            .arg("file$1")
            .build()
            .unwrap();
        assert_eq!(cmd.as_str(), r"grep two\ words file\$1");
    }

    #[test]
    fn test_build_rejects_arity_mismatch() {
        let result = CommandBuilder::new("cp {} {}").arg("a").build();
        assert!(matches!(result, Err(PipelineError::FormatArity { .. })));
    }

    #[test]
    fn test_options_are_applied() {
        let cmd = CommandBuilder::new("env")
            .env("A", "1")
            .envs([("B", "2")])
            .env_clear()
            .merge_stderr()
            .line_buffered()
            .shell("bash")
            .build()
            .unwrap();

        let options = cmd.options();
        assert_eq!(options.env.len(), 2);
        assert!(options.env_clear);
        assert!(options.merges_stderr());
        assert_eq!(options.buffering, Buffering::Line);
        assert_eq!(options.shell.as_deref(), Some("bash"));
    }

    #[test]
    fn test_build_validates_options() {
        let result = CommandBuilder::new("cat").chunk_size(0).build();
        assert!(matches!(result, Err(PipelineError::InvalidOptions(_))));

        let result = CommandBuilder::new("cat").encoding("bogus").build_text();
        assert!(matches!(result, Err(PipelineError::UnknownEncoding(_))));
    }
}
