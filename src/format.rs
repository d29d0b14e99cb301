//! Shell command formatting with safe argument substitution.
//!
//! Each literal `{}` in a template is replaced by the matching argument
//! after escaping the characters a POSIX shell would otherwise split or
//! expand on. Substituted arguments are never re-scanned for placeholders.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{PipelineError, Result};

/// Marker replaced by positional arguments.
pub const PLACEHOLDER: &str = "{}";

static SHELL_SPECIAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([ \t'"$])"#).expect("Invalid regex pattern"));

/// Backslash-escape space, tab, quotes and `$` in `arg`.
pub fn shell_escape(arg: &str) -> String {
    SHELL_SPECIAL.replace_all(arg, r"\$1").into_owned()
}

/// Number of `{}` markers in `template`.
pub fn placeholder_count(template: &str) -> usize {
    template.matches(PLACEHOLDER).count()
}

/// Substitute `args` into `template`.
///
/// ```
/// let cmd = shellpipe::format_command("ls -l {} | grep {} | wc", &["foo 1", "bar$baz"]).unwrap();
/// assert_eq!(cmd, r"ls -l foo\ 1 | grep bar\$baz | wc");
/// ```
pub fn format_command<S: AsRef<str>>(template: &str, args: &[S]) -> Result<String> {
    let expected = placeholder_count(template);
    if expected != args.len() {
        return Err(PipelineError::FormatArity {
            template: template.to_string(),
            expected,
            got: args.len(),
        });
    }

    let mut pieces = template.split(PLACEHOLDER);
    let mut formatted = String::with_capacity(template.len());
    if let Some(head) = pieces.next() {
        formatted.push_str(head);
    }
    for (piece, arg) in pieces.zip(args) {
        formatted.push_str(&shell_escape(arg.as_ref()));
        formatted.push_str(piece);
    }
    Ok(formatted)
}
