//! Integration tests for scenarios and context threading

#![cfg(unix)]

use std::time::Duration;

use kodegen_prompt_harness::{
    Capture, HarnessError, ProcessDriver, PromptRule, Scenario, ScenarioContext, ScenarioStep,
};
use tokio_test::{assert_err, assert_ok};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test]
async fn test_captured_value_flows_into_later_step() {
    init_logger();

    let scenario = Scenario::new(vec![
        ScenarioStep::new("list", ["sh", "-c", "echo 'Application UUID: abc-123'"])
            .capture(Capture::new("uuid", r"Application UUID:\s+(\S+)").unwrap()),
        ScenarioStep::new(
            "link",
            [
                "sh",
                "-c",
                "echo \"linking $1\"; echo 'Confirm id:'; read x; echo \"confirmed $x\"",
                "sh",
                "{{uuid}}",
            ],
        )
        .rule(PromptRule::contains("Confirm id:", ["{{uuid}}"])),
    ])
    .timeout(Duration::from_secs(30));

    let outcome = assert_ok!(
        scenario
            .run(&ProcessDriver::new(), ScenarioContext::new())
            .await
    );

    assert!(outcome.passed());
    assert_eq!(outcome.context.get("uuid"), Some("abc-123"));
    assert_eq!(outcome.steps.len(), 2);
    assert_eq!(
        outcome.steps[0].captured,
        [("uuid".to_string(), "abc-123".to_string())]
    );

    let link = &outcome.steps[1].result;
    assert!(link.contains_line("linking abc-123"));
    assert!(link.contains_line("confirmed abc-123"));
}

#[tokio::test]
async fn test_seeded_context_is_used() {
    init_logger();

    let scenario = Scenario::new(vec![ScenarioStep::new(
        "greet",
        ["sh", "-c", "echo \"hi $GREETING_NAME\""],
    )
    .env("GREETING_NAME", "{{name}}")]);

    let ctx = ScenarioContext::new().with("name", "ada");
    let outcome = assert_ok!(scenario.run(&ProcessDriver::new(), ctx).await);

    assert!(outcome.steps[0].result.contains_line("hi ada"));
    assert_eq!(outcome.context.get("name"), Some("ada"));
}

#[tokio::test]
async fn test_unexpected_exit_stops_scenario() {
    init_logger();

    let scenario = Scenario::new(vec![
        ScenarioStep::new("first", ["sh", "-c", "echo failing; exit 1"]),
        ScenarioStep::new("second", ["sh", "-c", "echo never"]),
    ]);

    let outcome = assert_ok!(
        scenario
            .run(&ProcessDriver::new(), ScenarioContext::new())
            .await
    );

    assert!(!outcome.passed());
    assert_eq!(outcome.steps.len(), 1);
    assert_eq!(
        outcome.stopped_at.as_ref().map(|name| name.as_str()),
        Some("first")
    );
    assert_eq!(outcome.steps[0].result.exit_code, 1);
}

#[tokio::test]
async fn test_expected_nonzero_exit_passes() {
    init_logger();

    let scenario = Scenario::new(vec![
        ScenarioStep::new("denied", ["sh", "-c", "echo 'Access denied' >&2; exit 2"])
            .expect_exit(2),
    ]);

    let outcome = assert_ok!(
        scenario
            .run(&ProcessDriver::new(), ScenarioContext::new())
            .await
    );

    assert!(outcome.passed());
    assert_eq!(outcome.steps[0].result.stderr, "Access denied\n");
}

#[tokio::test]
async fn test_capture_without_match_is_an_error() {
    init_logger();

    let scenario = Scenario::new(vec![
        ScenarioStep::new("list", ["sh", "-c", "echo 'nothing here'"])
            .capture(Capture::new("uuid", r"UUID: (\S+)").unwrap()),
    ]);

    let err = assert_err!(
        scenario
            .run(&ProcessDriver::new(), ScenarioContext::new())
            .await
    );
    assert!(matches!(err, HarnessError::Scenario(_)));
    assert!(err.to_string().contains("uuid"), "{err}");
}

#[tokio::test]
async fn test_missing_placeholder_fails_before_spawning() {
    init_logger();

    let scenario = Scenario::new(vec![ScenarioStep::new("use", ["echo", "{{never_set}}"])]);
    let err = assert_err!(
        scenario
            .run(&ProcessDriver::new(), ScenarioContext::new())
            .await
    );
    assert!(matches!(err, HarnessError::Scenario(_)));
}

#[tokio::test]
async fn test_scenario_from_json() {
    init_logger();

    let json = r#"{
        "name": "login",
        "timeout_secs": 30,
        "steps": [
            {
                "name": "login",
                "argv": ["sh", "-c", "echo 'Enter a new API key'; read k; echo \"key=$k\"; echo 'Saved credentials'"],
                "rules": [{"match": "Enter a new API key", "response": ["{{key}}"]}],
                "captures": [{"name": "stored", "pattern": "^key=(.*)$"}]
            }
        ]
    }"#;

    let scenario = assert_ok!(Scenario::from_json(json));
    assert_eq!(scenario.name.as_deref(), Some("login"));

    let ctx = ScenarioContext::new().with("key", "key123");
    let outcome = assert_ok!(scenario.run(&ProcessDriver::new(), ctx).await);

    assert!(outcome.passed());
    assert_eq!(outcome.context.get("stored"), Some("key123"));
    assert!(outcome.steps[0].result.contains_line("Saved credentials"));
}

#[test]
fn test_scenario_without_steps_is_rejected() {
    let err = assert_err!(Scenario::from_json(r#"{"steps": []}"#));
    assert!(matches!(err, HarnessError::Scenario(_)));
}

#[test]
fn test_scenario_with_bad_pattern_is_rejected() {
    let json = r#"{"steps": [{"name": "x", "argv": ["true"],
        "rules": [{"match": "(", "regex": true, "response": []}]}]}"#;
    assert!(Scenario::from_json(json).is_err());
}

#[test]
fn test_scenario_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scenario.json");
    std::fs::write(
        &path,
        r#"{"steps": [{"name": "hello", "argv": ["echo", "hello"]}]}"#,
    )
    .unwrap();

    let scenario = assert_ok!(Scenario::load(&path));
    assert_eq!(scenario.steps.len(), 1);
    assert_eq!(scenario.steps[0].name.as_str(), "hello");
}

#[tokio::test]
async fn test_sub_second_timeout_is_kept() {
    init_logger();

    let scenario = Scenario::new(vec![ScenarioStep::new(
        "nap",
        ["sh", "-c", "sleep 0.2; echo awake"],
    )])
    .timeout(Duration::from_millis(800));
    assert_eq!(scenario.step_timeout(), Some(Duration::from_millis(800)));

    let outcome = assert_ok!(
        scenario
            .run(&ProcessDriver::new(), ScenarioContext::new())
            .await
    );
    assert!(outcome.passed());
    assert!(outcome.steps[0].result.contains_line("awake"));
}

#[test]
fn test_timeout_secs_from_json() {
    let json = r#"{"timeout_secs": 2, "steps": [{"name": "x", "argv": ["true"]}]}"#;
    let scenario = assert_ok!(Scenario::from_json(json));
    assert_eq!(scenario.step_timeout(), Some(Duration::from_secs(2)));
}
