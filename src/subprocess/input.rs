//! Input sources for a command's stdin.

use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::error::{PipelineError, Result};

/// A boxed stream of input elements. An `Err` item aborts feeding and is
/// reported to the consumer once the output is drained.
pub type InputStream<T> = BoxStream<'static, anyhow::Result<T>>;

/// What gets written to the child's stdin.
pub enum Input<T> {
    /// No stdin activity; the configured stdin redirect is used as is.
    None,
    /// A single value, written as a one-element sequence.
    Scalar(T),
    /// Any sequence of values, written in order.
    Sequence(InputStream<T>),
}

impl<T> Default for Input<T> {
    fn default() -> Self {
        Input::None
    }
}

impl<T> std::fmt::Debug for Input<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Input::None => f.write_str("Input::None"),
            Input::Scalar(_) => f.write_str("Input::Scalar(..)"),
            Input::Sequence(_) => f.write_str("Input::Sequence(..)"),
        }
    }
}

impl<T: Send + 'static> Input<T> {
    pub fn none() -> Self {
        Input::None
    }

    pub fn scalar(value: impl Into<T>) -> Self {
        Input::Scalar(value.into())
    }

    /// Feed every element of `items`.
    pub fn iter<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<T>,
        I::IntoIter: Send + 'static,
    {
        Input::Sequence(stream::iter(items.into_iter().map(|item| Ok(item.into()))).boxed())
    }

    /// Feed a fallible iterator. The first `Err` stops feeding and is
    /// surfaced to the consumer unchanged.
    pub fn try_iter<I, U, E>(items: I) -> Self
    where
        I: IntoIterator<Item = std::result::Result<U, E>>,
        I::IntoIter: Send + 'static,
        U: Into<T>,
        E: Into<anyhow::Error>,
    {
        Input::Sequence(
            stream::iter(
                items
                    .into_iter()
                    .map(|item| item.map(Into::into).map_err(Into::into)),
            )
            .boxed(),
        )
    }

    /// Feed an async stream of elements.
    pub fn stream<S>(items: S) -> Self
    where
        S: Stream<Item = anyhow::Result<T>> + Send + 'static,
    {
        Input::Sequence(items.boxed())
    }

    /// Feed the output of another command. Its errors become input errors
    /// of this one.
    pub fn from_results<S>(items: S) -> Self
    where
        S: Stream<Item = Result<T>> + Send + 'static,
    {
        Input::Sequence(items.map(|item| item.map_err(anyhow::Error::new)).boxed())
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Input::None)
    }

    /// Normalize to a stream; `None` stays `None`, a scalar becomes a
    /// one-element stream.
    pub fn into_stream(self) -> Option<InputStream<T>> {
        match self {
            Input::None => None,
            Input::Scalar(value) => Some(stream::once(async move { Ok(value) }).boxed()),
            Input::Sequence(items) => Some(items),
        }
    }

    /// Transform every element, keeping the shape of the input.
    pub fn map<U, F>(self, mut f: F) -> Input<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        match self {
            Input::None => Input::None,
            Input::Scalar(value) => Input::Scalar(f(value)),
            Input::Sequence(items) => Input::Sequence(items.map(move |item| item.map(&mut f)).boxed()),
        }
    }
}

impl From<&str> for Input<String> {
    fn from(value: &str) -> Self {
        Input::Scalar(value.to_string())
    }
}

impl From<String> for Input<String> {
    fn from(value: String) -> Self {
        Input::Scalar(value)
    }
}

impl From<Vec<String>> for Input<String> {
    fn from(values: Vec<String>) -> Self {
        Input::iter(values)
    }
}

impl From<&[u8]> for Input<Vec<u8>> {
    fn from(value: &[u8]) -> Self {
        Input::Scalar(value.to_vec())
    }
}

impl From<Vec<u8>> for Input<Vec<u8>> {
    fn from(value: Vec<u8>) -> Self {
        Input::Scalar(value)
    }
}

impl From<Vec<Vec<u8>>> for Input<Vec<u8>> {
    fn from(values: Vec<Vec<u8>>) -> Self {
        Input::iter(values)
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Dynamic conversion for values that arrive untyped, e.g. from a JSON
/// request: `null` is no input, a string is a single value and an array of
/// strings is a sequence. Anything else is rejected before spawning.
impl TryFrom<serde_json::Value> for Input<String> {
    type Error = PipelineError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Null => Ok(Input::None),
            serde_json::Value::String(s) => Ok(Input::Scalar(s)),
            serde_json::Value::Array(items) => {
                let lines = items
                    .into_iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => Ok(s),
                        other => Err(PipelineError::InvalidInputType {
                            type_name: format!("array of {}", json_type_name(&other)),
                        }),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Input::iter(lines))
            }
            other => Err(PipelineError::InvalidInputType {
                type_name: json_type_name(&other).to_string(),
            }),
        }
    }
}

impl TryFrom<serde_json::Value> for Input<Vec<u8>> {
    type Error = PipelineError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        Input::<String>::try_from(value).map(|input| input.map(String::into_bytes))
    }
}
