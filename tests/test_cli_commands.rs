mod common;

use common::PhaseTrackerCli;

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ============================================================================
// version command
// ============================================================================

#[test]
fn version_human() {
    let output = PhaseTrackerCli::spawn_command(&["version"]);
    assert!(output.status.success(), "version should exit 0: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.starts_with("phase-tracker "), "unexpected version output: {out}");
    assert!(out.contains('.'), "version output should contain a version number: {out}");
}

#[test]
fn version_json() {
    let output = PhaseTrackerCli::spawn_command(&["version", "--format", "json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("version JSON should be valid");
    assert_eq!(parsed["name"], "phase-tracker");
    assert!(parsed.get("version").is_some());
}

// ============================================================================
// scenarios command
// ============================================================================

#[test]
fn scenarios_list_groups_by_category() {
    let output = PhaseTrackerCli::spawn_command(&["scenarios", "list"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    for name in [
        "block-tick",
        "plugin-command-batch",
        "mismatched-completion",
        "runaway-recursion",
        "redstone-chain",
        "async-entities",
    ] {
        assert!(out.contains(name), "missing {name} in: {out}");
    }
    assert!(out.contains("Limits:"), "{out}");
}

#[test]
fn scenarios_list_json_filters_by_category() {
    let output = PhaseTrackerCli::spawn_command(&[
        "scenarios", "list", "--category", "limits", "--format", "json",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let items = parsed.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "redstone-chain");
}

#[test]
fn scenarios_show_prints_yaml() {
    let output = PhaseTrackerCli::spawn_command(&["scenarios", "show", "block-tick"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).starts_with("name: block-tick"));
}

#[test]
fn scenarios_show_suggests_close_names() {
    let output = PhaseTrackerCli::spawn_command(&["scenarios", "show", "block-tik"]);
    assert_eq!(output.status.code(), Some(6));
    assert!(
        stderr(&output).contains("did you mean 'block-tick'?"),
        "{}",
        stderr(&output)
    );
}

// ============================================================================
// simulate command
// ============================================================================

#[test]
fn simulate_builtin_human() {
    let output = PhaseTrackerCli::spawn_command(&["-q", "simulate", "--builtin", "block-tick"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.starts_with("Scenario: block-tick (6 steps)"), "{out}");
    assert!(out.contains("events posted      3 (1 cancelled)"), "{out}");
    assert!(out.contains("anomalies          none"), "{out}");
}

#[test]
fn simulate_builtin_json() {
    let output = PhaseTrackerCli::spawn_command(&[
        "-q", "simulate", "--builtin", "runaway-recursion", "--format", "json",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(parsed["name"], "runaway-recursion");
    assert_eq!(parsed["anomalies"]["runaway_phase"], 3);
    assert_eq!(parsed["open_phases"], 0);
}

#[test]
fn simulate_scenario_file_uses_its_tracker_section() {
    let path = PhaseTrackerCli::fixture_path("fill_scenario.yaml");
    let output = PhaseTrackerCli::spawn_command(&[
        "-q",
        "simulate",
        path.to_str().unwrap(),
        "--format",
        "json",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(parsed["events_posted"], 1);
    assert_eq!(parsed["block_changes_applied"], 2);
    assert_eq!(parsed["max_block_processing_depth"], 50);
}

#[test]
fn simulate_writes_event_stream() {
    let dir = tempfile::tempdir().unwrap();
    let events = dir.path().join("events.jsonl");
    let output = PhaseTrackerCli::spawn_command(&[
        "-q",
        "simulate",
        "--builtin",
        "plugin-command-batch",
        "--events-file",
        events.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", stderr(&output));

    let content = std::fs::read_to_string(&events).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.first().unwrap()["type"], "ScenarioStarted");
    assert_eq!(lines.last().unwrap()["type"], "ScenarioFinished");
    let posted = lines.iter().filter(|e| e["type"] == "WorldEventPosted").count();
    assert_eq!(posted, 3);
}

#[test]
fn simulate_requires_a_source() {
    let output = PhaseTrackerCli::spawn_command(&["simulate"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn simulate_unknown_builtin_fails() {
    let output = PhaseTrackerCli::spawn_command(&["-q", "simulate", "--builtin", "redstone"]);
    assert_eq!(output.status.code(), Some(6));
}

// ============================================================================
// config command
// ============================================================================

#[test]
fn config_validate_accepts_valid_file() {
    let path = PhaseTrackerCli::fixture_path("valid_config.yaml");
    let output = PhaseTrackerCli::spawn_command(&["-q", "config", "validate", path.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains(": ok (0 warnings)"), "{}", stdout(&output));
}

#[test]
fn config_validate_rejects_zero_depth() {
    let path = PhaseTrackerCli::fixture_path("invalid_config.yaml");
    let output = PhaseTrackerCli::spawn_command(&["-q", "config", "validate", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains(": invalid"), "{}", stdout(&output));
}

#[test]
fn config_validate_strict_fails_on_warnings() {
    let path = PhaseTrackerCli::fixture_path("warning_config.yaml");
    let path = path.to_str().unwrap();

    let lenient = PhaseTrackerCli::spawn_command(&["-q", "config", "validate", path]);
    assert!(lenient.status.success(), "{}", stderr(&lenient));
    assert!(stdout(&lenient).contains("(2 warnings)"), "{}", stdout(&lenient));

    let strict = PhaseTrackerCli::spawn_command(&["-q", "config", "validate", "--strict", path]);
    assert_eq!(strict.status.code(), Some(2));
}

#[test]
fn config_validate_json_reports_each_file() {
    let valid = PhaseTrackerCli::fixture_path("valid_config.yaml");
    let invalid = PhaseTrackerCli::fixture_path("invalid_config.yaml");
    let output = PhaseTrackerCli::spawn_command(&[
        "-q",
        "config",
        "validate",
        "--format",
        "json",
        valid.to_str().unwrap(),
        invalid.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(2));
    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(parsed[0]["valid"], true);
    assert_eq!(parsed[1]["valid"], false);
}

#[test]
fn config_defaults_round_trip() {
    let output = PhaseTrackerCli::spawn_command(&["config", "defaults"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("max_block_processing_depth: 100"), "{out}");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("defaults.yaml");
    std::fs::write(&path, out).unwrap();
    let check = PhaseTrackerCli::spawn_command(&["-q", "config", "validate", path.to_str().unwrap()]);
    assert!(check.status.success(), "{}", stderr(&check));
}
