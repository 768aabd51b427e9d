//! Integration tests for prompt matching and response delivery

#![cfg(unix)]

use std::time::Duration;

use kodegen_prompt_harness::{PromptRule, RunRequest, run};
use tokio_test::assert_ok;

const TIMEOUT: Option<Duration> = Some(Duration::from_secs(30));

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test]
async fn test_api_key_prompt_is_answered() {
    init_logger();

    let request = RunRequest::builder([
        "sh",
        "-c",
        "echo 'Enter a new API key'; read key; echo \"received $key\"; echo 'Saved credentials'",
    ])
    .rule(PromptRule::contains("Enter a new API key", ["key123"]))
    .build();
    let result = assert_ok!(run(&request, TIMEOUT).await);

    assert_eq!(result.exit_code, 0);
    let prompt = result.position_of("Enter a new API key").unwrap();
    let saved = result.position_of("Saved credentials").unwrap();
    assert!(prompt < saved);
    assert!(result.contains_line("received key123"));
    assert!(result.contains_line("Saved credentials"));
    assert_eq!(result.prompts_matched, 1);

    let delivery = result.delivery.unwrap();
    assert_eq!(delivery.lines_delivered, 1);
    assert!(delivery.is_complete());
}

#[tokio::test]
async fn test_response_arrives_before_dependent_output() {
    init_logger();

    let request = RunRequest::builder(["sh", "-c", "echo 'Name?'; read n; echo \"Hello, $n\""])
        .answer("Name?", ["Ada"])
        .build();
    let result = assert_ok!(run(&request, TIMEOUT).await);

    assert_eq!(result.lines, ["Name?", "Hello, Ada"]);
}

#[tokio::test]
async fn test_repeated_prompt_retriggers_rule() {
    init_logger();

    let script = "for i in 1 2 3; do echo 'Value?'; read v; echo \"got $v$i\"; done";
    let request = RunRequest::builder(["sh", "-c", script])
        .answer("Value?", ["x"])
        .build();
    let result = assert_ok!(run(&request, TIMEOUT).await);

    assert_eq!(
        result.lines,
        ["Value?", "got x1", "Value?", "got x2", "Value?", "got x3"]
    );
    assert_eq!(result.prompts_matched, 3);
    assert_eq!(result.delivery.unwrap().lines_delivered, 3);
}

#[tokio::test]
async fn test_multi_line_response_is_written_in_order() {
    init_logger();

    let request = RunRequest::builder([
        "sh",
        "-c",
        "echo 'Credentials?'; read a; read b; echo \"$a/$b\"",
    ])
    .answer("Credentials?", ["key", "secret"])
    .build();
    let result = assert_ok!(run(&request, TIMEOUT).await);

    assert!(result.contains_line("key/secret"));
}

#[tokio::test]
async fn test_every_matching_rule_fires_in_registration_order() {
    init_logger();

    let request = RunRequest::builder(["sh", "-c", "echo 'Login:'; read a; read b; echo \"$a $b\""])
        .answer("Login", ["first"])
        .rule(PromptRule::regex(r"^Log\w+:", ["second"]).unwrap())
        .build();
    let result = assert_ok!(run(&request, TIMEOUT).await);

    assert!(result.contains_line("first second"));
    assert_eq!(result.prompts_matched, 2);
}

#[tokio::test]
async fn test_prompt_that_never_appears_still_terminates() {
    init_logger();

    let request = RunRequest::builder(["sh", "-c", "echo hello; echo world"])
        .answer("Do you want to continue?", ["y"])
        .build();
    let result = assert_ok!(run(&request, TIMEOUT).await);

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.lines, ["hello", "world"]);
    assert_eq!(result.prompts_matched, 0);
    assert!(!result.writer_started());
}

#[tokio::test]
async fn test_rule_with_empty_response_does_not_start_writer() {
    init_logger();

    let request = RunRequest::builder(["sh", "-c", "echo 'Warning: deprecated'"])
        .rule(PromptRule::contains("Warning", Vec::<String>::new()))
        .build();
    let result = assert_ok!(run(&request, TIMEOUT).await);

    assert_eq!(result.prompts_matched, 1);
    assert!(!result.writer_started());
}

#[tokio::test]
async fn test_write_to_closed_stdin_is_recoverable() {
    init_logger();

    // Child closes its stdin before prompting, so the write hits a broken pipe
    let request = RunRequest::builder([
        "sh",
        "-c",
        "exec 0<&-; echo 'Enter a new API key'; sleep 0.5; echo after",
    ])
    .answer("Enter a new API key", ["key123"])
    .build();
    let result = assert_ok!(run(&request, TIMEOUT).await);

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.lines, ["Enter a new API key", "after"]);

    let delivery = result.delivery.unwrap();
    assert_eq!(delivery.lines_delivered, 0);
    let failure = delivery.failure.unwrap();
    assert!(failure.broken_pipe, "{failure}");
    assert_eq!(failure.line_index, 0);
}

#[tokio::test]
async fn test_child_exiting_right_after_prompt_is_not_a_failure() {
    init_logger();

    let request = RunRequest::builder(["sh", "-c", "echo 'Enter a new API key'; exit 0"])
        .answer("Enter a new API key", ["key123"])
        .build();
    let result = assert_ok!(run(&request, TIMEOUT).await);

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.lines, ["Enter a new API key"]);
    assert!(result.writer_started());
}

#[tokio::test]
async fn test_large_response_does_not_stall_output_reader() {
    init_logger();

    // The child prints far more than a pipe buffer before it reads, and the
    // response is also larger than a pipe buffer. Both sides only make
    // progress if reading and writing happen independently.
    let script = "echo 'Ready?'; \
        i=0; while [ $i -lt 3000 ]; do echo \"progress line $i padded to make it longer\"; i=$((i+1)); done; \
        n=0; while [ $n -lt 2000 ]; do read l; n=$((n+1)); done; \
        echo \"read $n\"";
    let response: Vec<String> = (0..2000).map(|i| format!("{i:0>100}")).collect();

    let request = RunRequest::builder(["sh", "-c", script])
        .answer("Ready?", response)
        .build();
    let result = assert_ok!(run(&request, TIMEOUT).await);

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.lines.len(), 1 + 3000 + 1);
    assert_eq!(result.lines.last().map(String::as_str), Some("read 2000"));

    let delivery = result.delivery.unwrap();
    assert_eq!(delivery.lines_delivered, 2000);
    assert!(delivery.is_complete());
}
