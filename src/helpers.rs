//! Execution helpers for callers that only need part of a command's
//! behavior: its output, its exit code, or just success.

use futures::{Stream, StreamExt};

use crate::error::{PipelineError, Result};
use crate::subprocess::{Execute, Input};

/// Run `command` and return its output stream.
///
/// A non-zero exit is reported as the stream's final `Err` item.
pub fn run<E: Execute>(command: &E, input: Input<E::Item>) -> Result<E::Stream> {
    command.execute(input)
}

/// Run `command`, discard its output and return the exit code.
///
/// A process killed by a signal reports the negated signal number, e.g.
/// `-15` for SIGTERM. Spawn failures and input errors are returned as
/// errors.
pub async fn call<E: Execute>(command: &E, input: Input<E::Item>) -> Result<i32> {
    match drain(run(command, input)?).await {
        Ok(()) => Ok(0),
        Err(PipelineError::Terminated { signal, .. }) => Ok(-signal),
        Err(e) => match e.exit_code() {
            Some(code) => Ok(code),
            None => Err(e),
        },
    }
}

/// Run `command`, discard its output and fail on a non-zero exit.
pub async fn check_call<E: Execute>(command: &E, input: Input<E::Item>) -> Result<()> {
    drain(run(command, input)?).await
}

/// Consume a stream to the end, stopping at the first error.
pub async fn drain<S, T>(mut stream: S) -> Result<()>
where
    S: Stream<Item = Result<T>> + Unpin,
{
    while let Some(item) = stream.next().await {
        item?;
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::subprocess::{bincmd, cmd, CommandBuilder};

    #[tokio::test]
    async fn test_call_returns_exit_code() {
        let ok = bincmd::<&str>("true", &[]).unwrap();
        assert_eq!(call(&ok, Input::none()).await.unwrap(), 0);

        let failing = bincmd::<&str>("exit 7", &[]).unwrap();
        assert_eq!(call(&failing, Input::none()).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_call_reports_signal_as_negative_code() {
        let killed = bincmd::<&str>("kill -TERM $$", &[]).unwrap();
        assert_eq!(call(&killed, Input::none()).await.unwrap(), -15);

        match check_call(&killed, Input::none()).await {
            Err(PipelineError::Terminated { signal, .. }) => assert_eq!(signal, 15),
            other => panic!("Expected Terminated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_check_call_fails_on_non_zero() {
        let failing = bincmd::<&str>("exit 2", &[]).unwrap();
        match check_call(&failing, Input::none()).await {
            Err(PipelineError::CommandFailed { code, command }) => {
                assert_eq!(code, 2);
                assert_eq!(command, "exit 2");
            }
            other => panic!("Expected CommandFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_call_propagates_input_errors() {
        let grep = cmd("grep {}", &["foo"]).unwrap();
        let input = Input::<String>::try_iter(vec![Err::<String, _>(anyhow::anyhow!("no data"))]);
        let err = call(&grep, input).await.unwrap_err();
        assert!(err.input_error().is_some());
    }

    #[tokio::test]
    async fn test_run_with_scalar_input() {
        let tr = CommandBuilder::new("tr t T").build_text().unwrap();
        let out: Vec<String> = run(&tr, Input::from("input"))
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(out.concat(), "inpuT");
    }
}
