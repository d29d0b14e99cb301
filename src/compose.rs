//! Function composition sugar for building pipelines out of commands and
//! stream transforms.
//!
//! ```no_run
//! # async fn demo() -> shellpipe::Result<()> {
//! use shellpipe::compose::{each, join, pipe, strip};
//! use shellpipe::{linecmd, Input};
//!
//! let upper = pipe(linecmd("printf 'a\\nb\\nc\\n'", &[] as &[&str])?)
//!     | each(|line: String| line.to_uppercase())
//!     | strip("\n");
//! assert_eq!(join(upper.call(Input::none())).await?, "ABC");
//! # Ok(())
//! # }
//! ```

use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::ops::BitOr;

use crate::error::Result;
use crate::subprocess::{Execute, Input};

/// A boxed stream of fallible elements, the currency between stages.
pub type Pipeline<T> = BoxStream<'static, Result<T>>;

/// A function wrapper whose `|` operator chains left to right.
pub struct Fun<A, B> {
    f: Box<dyn Fn(A) -> B + Send + Sync>,
}

impl<A, B> Fun<A, B> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        Self { f: Box::new(f) }
    }

    pub fn call(&self, input: A) -> B {
        (self.f)(input)
    }
}

impl<A: 'static, B: 'static, C: 'static> BitOr<Fun<B, C>> for Fun<A, B> {
    type Output = Fun<A, C>;

    fn bitor(self, next: Fun<B, C>) -> Fun<A, C> {
        Fun::new(move |input| next.call(self.call(input)))
    }
}

/// Mathematical composition: `compose(f, g)` applies `g` first, then `f`.
pub fn compose<A: 'static, B: 'static, C: 'static>(f: Fun<B, C>, g: Fun<A, B>) -> Fun<A, C> {
    g | f
}

/// Turn a command into a stage. A spawn failure surfaces as the stream's
/// only item instead of an immediate error.
pub fn pipe<E>(command: E) -> Fun<Input<E::Item>, Pipeline<E::Output>>
where
    E: Execute + Send + Sync + 'static,
{
    Fun::new(move |input| match command.execute(input) {
        Ok(output) => output.boxed(),
        Err(e) => stream::once(async move { Err(e) }).boxed(),
    })
}

/// Feed the elements of the previous stage to the next command.
pub fn feed<T: Send + 'static>() -> Fun<Pipeline<T>, Input<T>> {
    Fun::new(|items: Pipeline<T>| Input::from_results(items))
}

/// Apply `f` to every element.
pub fn each<T, U, F>(f: F) -> Fun<Pipeline<T>, Pipeline<U>>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> U + Clone + Send + Sync + 'static,
{
    Fun::new(move |items: Pipeline<T>| {
        let f = f.clone();
        items.map(move |item| item.map(&f)).boxed()
    })
}

/// Strip any of `chars` from both ends of every element.
pub fn strip(chars: &str) -> Fun<Pipeline<String>, Pipeline<String>> {
    let chars: Vec<char> = chars.chars().collect();
    each(move |s: String| s.trim_matches(chars.as_slice()).to_string())
}

/// Concatenate a text stream.
pub async fn join<S>(items: S) -> Result<String>
where
    S: Stream<Item = Result<String>>,
{
    let mut items = std::pin::pin!(items);
    let mut joined = String::new();
    while let Some(item) = items.next().await {
        joined.push_str(&item?);
    }
    Ok(joined)
}

/// Concatenate a byte stream.
pub async fn join_bytes<S>(items: S) -> Result<Vec<u8>>
where
    S: Stream<Item = Result<Vec<u8>>>,
{
    let mut items = std::pin::pin!(items);
    let mut joined = Vec::new();
    while let Some(item) = items.next().await {
        joined.extend(item?);
    }
    Ok(joined)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::subprocess::{cmd, linecmd};

    #[test]
    fn test_fun_composition_order() {
        let add_one = Fun::new(|x: i32| x + 1);
        let double = Fun::new(|x: i32| x * 2);
        assert_eq!((add_one | double).call(3), 8);

        let add_one = Fun::new(|x: i32| x + 1);
        let double = Fun::new(|x: i32| x * 2);
        assert_eq!(compose(add_one, double).call(3), 7);
    }

    #[tokio::test]
    async fn test_or_operator_with_commands() {
        let echo = pipe(cmd::<&str>("echo foo", &[]).unwrap()) | each(|s: String| s);
        assert_eq!(join(echo.call(Input::none())).await.unwrap(), "foo\n");

        let upper = Fun::new(|_: ()| Input::<String>::iter(["a"]))
            | pipe(cmd::<&str>("tr a-z A-Z", &[]).unwrap());
        assert_eq!(join(upper.call(())).await.unwrap(), "A");
    }

    #[tokio::test]
    async fn test_each_and_strip() {
        let lines = pipe(linecmd::<&str>("printf 'a\\nb\\nc\\n'", &[]).unwrap())
            | each(|s: String| s.to_uppercase())
            | strip("\n");
        assert_eq!(join(lines.call(Input::none())).await.unwrap(), "ABC");
    }

    #[tokio::test]
    async fn test_chained_commands() {
        let chain = pipe(cmd::<&str>("printf 'b\\na\\nc\\n'", &[]).unwrap())
            | feed()
            | pipe(cmd::<&str>("sort", &[]).unwrap());
        assert_eq!(join(chain.call(Input::none())).await.unwrap(), "a\nb\nc\n");
    }

    #[tokio::test]
    async fn test_upstream_failure_reaches_downstream() {
        let chain = pipe(cmd::<&str>("exit 4", &[]).unwrap())
            | feed()
            | pipe(cmd::<&str>("cat", &[]).unwrap());
        let err = join(chain.call(Input::none())).await.unwrap_err();
        let upstream = err.into_input_error::<PipelineError>().unwrap();
        assert_eq!(upstream.exit_code(), Some(4));
    }

    #[tokio::test]
    async fn test_join_bytes() {
        let out = pipe(crate::subprocess::bincmd::<&str>("printf xyz", &[]).unwrap());
        assert_eq!(join_bytes(out.call(Input::none())).await.unwrap(), b"xyz");
    }
}
