//! Encoding lookup and incremental decoding.

use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};

use crate::error::{PipelineError, Result};

/// Look up an encoding by its WHATWG label, e.g. `"utf-8"` or `"latin1"`.
pub fn encoding_for_label(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| PipelineError::UnknownEncoding(label.to_string()))
}

/// The encoding named by the current locale.
///
/// Locale variables are consulted in the order `LC_ALL`, `LC_CTYPE`, `LANG`;
/// the first non-empty one wins. Locales without a usable charset suffix
/// (`C`, `POSIX`, unknown names) fall back to UTF-8.
pub fn locale_encoding() -> &'static Encoding {
    let locale = ["LC_ALL", "LC_CTYPE", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
        .unwrap_or_default();

    encoding_for_locale(&locale).unwrap_or(UTF_8)
}

/// Charset part of a locale name: `en_US.UTF-8@euro` gives UTF-8.
fn encoding_for_locale(locale: &str) -> Option<&'static Encoding> {
    let (_, charset) = locale.split_once('.')?;
    let charset = charset.split('@').next()?;
    Encoding::for_label(charset.as_bytes())
}

/// Encode one text element for stdin.
pub(crate) fn encode(encoding: &'static Encoding, text: &str) -> Vec<u8> {
    let (bytes, _, had_errors) = encoding.encode(text);
    if had_errors {
        tracing::trace!(
            "Unmappable characters replaced while encoding to {}",
            encoding.name()
        );
    }
    bytes.into_owned()
}

/// Decodes a byte stream chunk by chunk, carrying incomplete multi-byte
/// sequences over to the next chunk.
pub(crate) struct StreamDecoder {
    decoder: Decoder,
}

impl StreamDecoder {
    pub(crate) fn new(encoding: &'static Encoding) -> Self {
        Self {
            decoder: encoding.new_decoder(),
        }
    }

    /// Decode `bytes`. With `last` set, any pending partial sequence is
    /// flushed as a replacement character.
    pub(crate) fn decode(&mut self, bytes: &[u8], last: bool) -> String {
        let capacity = self
            .decoder
            .max_utf8_buffer_length(bytes.len())
            .unwrap_or(bytes.len() * 3 + 4);
        let mut text = String::with_capacity(capacity);
        let mut src = bytes;
        loop {
            let (result, read, _) = self.decoder.decode_to_string(src, &mut text, last);
            src = &src[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => text.reserve(src.len() * 3 + 4),
            }
        }
        text
    }
}
