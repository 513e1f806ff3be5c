// The per-item state machine: skip marker, change gate, execution switch,
// execution outcome mapping.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use molecule_harness::discovery::ScenarioItem;
use molecule_harness::gate::ChangeGate;
use molecule_harness::harness::{
    run_item, HarnessConfig, Outcome, SKIP_CONFIG_REASON, SKIP_DISABLED_REASON,
    SKIP_NO_CHANGE_REASON,
};

fn item_with_tags(workdir: &Path, tags: &[&str]) -> ScenarioItem {
    ScenarioItem {
        id: "default[docker]".to_string(),
        scenario_name: "default".to_string(),
        driver_name: "docker".to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
        working_directory: workdir.to_path_buf(),
        config_path: workdir.join("molecule/default/molecule.yml"),
    }
}

// A stub tool that records that it ran by touching a file, so tests can
// assert no process was spawned on the skip paths.
fn recording_tool(dir: &Path, exit_code: i32) -> (Vec<String>, std::path::PathBuf) {
    let witness = dir.join("tool-ran");
    let script = dir.join("tool.sh");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\ntouch {}\nexit {exit_code}\n",
            witness.display()
        ),
    )
    .unwrap();
    (
        vec!["sh".to_string(), script.display().to_string()],
        witness,
    )
}

fn config_with(command: Vec<String>) -> HarnessConfig {
    HarnessConfig {
        command,
        use_colors: false,
        ..HarnessConfig::default()
    }
}

fn stub_git(dir: &Path, body: &str) -> String {
    let path = dir.join("stub-git.sh");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }
    path.display().to_string()
}

#[test]
fn skip_marker_short_circuits_before_any_execution() {
    let dir = tempfile::tempdir().unwrap();
    let (command, witness) = recording_tool(dir.path(), 0);
    let item = item_with_tags(dir.path(), &["docker", "molecule", "skip"]);

    let outcome = run_item(&item, &config_with(command), &ChangeGate::new(None));
    match outcome {
        Outcome::Skipped { reason, .. } => assert_eq!(reason, SKIP_CONFIG_REASON),
        other => panic!("expected skip, got {other:?}"),
    }
    assert!(!witness.exists(), "tool must not run for a skipped scenario");
}

#[test]
fn skip_wins_over_expected_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (command, witness) = recording_tool(dir.path(), 1);
    let item = item_with_tags(
        dir.path(),
        &["docker", "molecule", "skip", "expected-failure"],
    );

    let outcome = run_item(&item, &config_with(command), &ChangeGate::new(None));
    assert!(matches!(outcome, Outcome::Skipped { .. }));
    assert!(!witness.exists());
}

#[test]
fn disabled_execution_skips_without_spawning() {
    let dir = tempfile::tempdir().unwrap();
    let (command, witness) = recording_tool(dir.path(), 0);
    let config = HarnessConfig {
        execution_enabled: false,
        ..config_with(command)
    };
    let item = item_with_tags(dir.path(), &["docker", "molecule"]);

    let outcome = run_item(&item, &config, &ChangeGate::new(None));
    match outcome {
        Outcome::Skipped { reason, .. } => assert_eq!(reason, SKIP_DISABLED_REASON),
        other => panic!("expected skip, got {other:?}"),
    }
    assert!(!witness.exists());
}

#[test]
fn unchanged_role_is_skipped_without_invoking_the_tool() {
    let dir = tempfile::tempdir().unwrap();
    let (command, witness) = recording_tool(dir.path(), 0);
    let gate = ChangeGate::with_program(Some("main".to_string()), stub_git(dir.path(), "exit 0"));
    let item = item_with_tags(dir.path(), &["docker", "molecule"]);

    let outcome = run_item(&item, &config_with(command), &gate);
    match outcome {
        Outcome::Skipped { reason, .. } => assert_eq!(reason, SKIP_NO_CHANGE_REASON),
        other => panic!("expected skip, got {other:?}"),
    }
    assert!(!witness.exists());
}

#[test]
fn gate_tool_failure_is_a_failure_not_a_skip() {
    let dir = tempfile::tempdir().unwrap();
    let (command, witness) = recording_tool(dir.path(), 0);
    let gate = ChangeGate::with_program(
        Some("main".to_string()),
        stub_git(dir.path(), "echo 'fatal: not a repo' >&2; exit 128"),
    );
    let item = item_with_tags(dir.path(), &["docker", "molecule"]);

    let outcome = run_item(&item, &config_with(command), &gate);
    match outcome {
        Outcome::Fail { reason, .. } => assert!(reason.contains("git diff")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!witness.exists());
}

#[test]
fn changed_role_runs_the_tool() {
    let dir = tempfile::tempdir().unwrap();
    let (command, witness) = recording_tool(dir.path(), 0);
    let gate = ChangeGate::with_program(
        Some("main".to_string()),
        stub_git(dir.path(), "echo 'diff --git a/t b/t'"),
    );
    let item = item_with_tags(dir.path(), &["docker", "molecule"]);

    let outcome = run_item(&item, &config_with(command), &gate);
    assert!(matches!(outcome, Outcome::Pass { .. }));
    assert!(witness.exists());
}

#[test]
fn zero_exit_passes() {
    let dir = tempfile::tempdir().unwrap();
    let (command, _) = recording_tool(dir.path(), 0);
    let item = item_with_tags(dir.path(), &["docker", "molecule"]);

    let outcome = run_item(&item, &config_with(command), &ChangeGate::new(None));
    assert!(matches!(outcome, Outcome::Pass { .. }));
}

#[test]
fn nonzero_exit_fails_with_code_and_command_line() {
    let dir = tempfile::tempdir().unwrap();
    let (command, _) = recording_tool(dir.path(), 2);
    let item = item_with_tags(dir.path(), &["docker", "molecule"]);

    let outcome = run_item(&item, &config_with(command), &ChangeGate::new(None));
    match outcome {
        Outcome::Fail { reason, .. } => {
            assert!(reason.contains("Error code 2 returned by:"), "got: {reason}");
            assert!(reason.contains("test -s default"), "got: {reason}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn expected_failure_turns_a_failing_run_into_xfail() {
    let dir = tempfile::tempdir().unwrap();
    let (command, _) = recording_tool(dir.path(), 1);
    let item = item_with_tags(dir.path(), &["docker", "molecule", "expected-failure"]);

    let outcome = run_item(&item, &config_with(command), &ChangeGate::new(None));
    assert!(matches!(outcome, Outcome::XFail { .. }));
}

#[test]
fn expected_failure_that_passes_is_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (command, _) = recording_tool(dir.path(), 0);
    let item = item_with_tags(dir.path(), &["docker", "molecule", "expected-failure"]);

    let outcome = run_item(&item, &config_with(command), &ChangeGate::new(None));
    match outcome {
        Outcome::Fail { reason, .. } => assert!(reason.contains("unexpectedly passed")),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn marker_filter_skips_items_without_the_tag() {
    let dir = tempfile::tempdir().unwrap();
    let (command, witness) = recording_tool(dir.path(), 0);
    let config = HarnessConfig {
        marker_filter: Some("podman".to_string()),
        ..config_with(command)
    };
    let item = item_with_tags(dir.path(), &["docker", "molecule"]);

    let outcome = run_item(&item, &config, &ChangeGate::new(None));
    match outcome {
        Outcome::Skipped { reason, .. } => assert!(reason.contains("podman")),
        other => panic!("expected skip, got {other:?}"),
    }
    assert!(!witness.exists());
}

#[test]
fn spawn_failure_is_reported_as_item_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(vec!["/nonexistent/tool".to_string()]);
    let item = item_with_tags(dir.path(), &["docker", "molecule"]);

    let outcome = run_item(&item, &config, &ChangeGate::new(None));
    match outcome {
        Outcome::Fail { reason, .. } => assert!(reason.contains("failed to run")),
        other => panic!("expected failure, got {other:?}"),
    }
}
