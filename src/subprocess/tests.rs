use super::*;
use crate::config::{CommandOptions, Redirect};
use crate::error::PipelineError;
use crate::helpers::{call, check_call};
use futures::StreamExt;

async fn collect_text<E>(command: &E, input: Input<String>) -> (String, Option<PipelineError>)
where
    E: Execute<Item = String, Output = String>,
{
    let mut output = command.execute(input).unwrap();
    let mut text = String::new();
    while let Some(item) = output.next().await {
        match item {
            Ok(chunk) => text.push_str(&chunk),
            Err(e) => return (text, Some(e)),
        }
    }
    (text, None)
}

#[tokio::test]
async fn test_echo_through_text_command() {
    let echo = cmd("echo {}", &["hello world"]).unwrap();
    let (text, err) = collect_text(&echo, Input::none()).await;
    assert_eq!(text, "hello world\n");
    assert!(err.is_none());
}

#[tokio::test]
async fn test_spawn_failure_with_missing_shell() {
    let missing = CommandBuilder::new("true")
        .shell("/nonexistent/shell-12345")
        .build()
        .unwrap();
    match missing.execute(Input::none()) {
        Err(PipelineError::Spawn { command, .. }) => assert_eq!(command, "true"),
        other => panic!("Expected Spawn error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_custom_shell() {
    let dollar_zero = CommandBuilder::new("echo $0")
        .shell("sh")
        .build_text()
        .unwrap();
    let (text, _) = collect_text(&dollar_zero, Input::none()).await;
    assert_eq!(text.trim(), "sh");
}

#[tokio::test]
async fn test_env_overrides_and_clear() {
    let env = CommandBuilder::new("echo \"$SHELLPIPE_A-$HOME\"")
        .env("SHELLPIPE_A", "set")
        .env("PATH", "/usr/bin:/bin")
        .env_clear()
        .build_text()
        .unwrap();
    let (text, err) = collect_text(&env, Input::none()).await;
    assert_eq!(text, "set-\n");
    assert!(err.is_none());
}

#[tokio::test]
async fn test_working_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
    let ls = CommandBuilder::new("ls")
        .current_dir(dir.path())
        .build_text()
        .unwrap();
    let (text, _) = collect_text(&ls, Input::none()).await;
    assert_eq!(text, "marker.txt\n");
}

#[tokio::test]
async fn test_merge_stderr_interleaves_into_output() {
    let noisy = CommandBuilder::new("echo out; echo err >&2")
        .merge_stderr()
        .build_lines()
        .unwrap();
    let (text, err) = collect_text(&noisy, Input::none()).await;
    assert_eq!(text, "out\nerr\n");
    assert!(err.is_none());
}

#[tokio::test]
async fn test_stdin_from_file_redirect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("in.txt");
    std::fs::write(&path, "from file\n").unwrap();

    let cat = CommandBuilder::new("cat")
        .stdin(Redirect::File(path))
        .build_text()
        .unwrap();
    let (text, _) = collect_text(&cat, Input::none()).await;
    assert_eq!(text, "from file\n");
}

#[tokio::test]
async fn test_stdout_to_file_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");

    let echo = CommandBuilder::new("echo redirected; exit 5")
        .stdout(Redirect::File(path.clone()))
        .build_text()
        .unwrap();
    let (text, err) = collect_text(&echo, Input::none()).await;
    assert!(text.is_empty());
    assert_eq!(err.and_then(|e| e.exit_code()), Some(5));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "redirected\n");
}

#[tokio::test]
async fn test_stdout_handle_redirect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("handle.txt");
    let file = std::fs::File::create(&path).unwrap();

    let echo = CommandBuilder::new("echo via handle")
        .stdout(Redirect::handle(file))
        .build()
        .unwrap();
    assert_eq!(call(&echo, Input::none()).await.unwrap(), 0);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "via handle\n");
}

#[tokio::test]
async fn test_chained_output_becomes_input() {
    let producer = cmd::<&str>("printf 'c\\na\\nb\\n'", &[]).unwrap();
    let sort = cmd::<&str>("sort", &[]).unwrap();

    let upstream = producer.execute(Input::none()).unwrap();
    let (text, err) = collect_text(&sort, upstream.into()).await;
    assert_eq!(text, "a\nb\nc\n");
    assert!(err.is_none());
}

#[tokio::test]
async fn test_options_from_toml() {
    let options = CommandOptions::from_toml_str(
        r#"
        buffering = "line"
        [env]
        GREETING = "hi"
        "#,
    )
    .unwrap();
    let greet = CommandBuilder::new("echo $GREETING; echo there")
        .options(options)
        .build_lines()
        .unwrap();
    let (text, _) = collect_text(&greet, Input::none()).await;
    assert_eq!(text, "hi\nthere\n");
}

#[test]
fn test_check_call_outside_test_macro() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let ok = bincmd::<&str>("true", &[]).unwrap();
        tokio_test::assert_ok!(check_call(&ok, Input::none()).await);

        let failing = bincmd::<&str>("false", &[]).unwrap();
        tokio_test::assert_err!(check_call(&failing, Input::none()).await);
    });
}
