//! `plankifier plan` against a shell-script stand-in for `pegasus-plan`.
//!
//! Kept in its own test binary and serialized: the stand-in is written and
//! then executed by a child process, which fails with ETXTBSY if a sibling
//! test thread forks while the script is still open for writing.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use assert_cmd::Command;
use predicates::prelude::*;

static SPAWN_LOCK: Mutex<()> = Mutex::new(());

fn fake_planner(dir: &Path) -> PathBuf {
    let path = dir.join("fake-pegasus-plan");
    fs::write(
        &path,
        r#"#!/bin/sh
printf '%s\n' "$@" > planner-args.txt
echo '{"submit_dir": "/home/pegasus/submit/run0007"}'
"#,
    )
    .unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

#[test]
fn test_plan_runs_planner_in_work_dir() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let config = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let bin = tempfile::tempdir().unwrap();
    let script = fake_planner(bin.path());

    let output = Command::cargo_bin("plankifier")
        .unwrap()
        .env("PLANKIFIER_CONFIG_DIR", config.path())
        .env_remove("PLANKIFIER_CONFIG")
        .env("PEGASUS_PLAN", &script)
        .args(["--json", "plan", "-e", "arm-pool", "--no-submit", "--dir"])
        .arg(work.path())
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["workflow"], "plankifier-wf");
    assert_eq!(json["submitted"], false);
    assert_eq!(json["submit_dir"], "/home/pegasus/submit/run0007");

    assert!(work.path().join("workflow.yml").is_file());
    let args = fs::read_to_string(work.path().join("planner-args.txt")).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert_eq!(
        args,
        vec![
            "--conf",
            "pegasus.properties",
            "--sites",
            "arm-pool",
            "--output-sites",
            "local",
            "--cleanup",
            "inplace",
            "--json",
            "workflow.yml",
        ]
    );
}

#[test]
fn test_plan_reports_planner_failure() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let config = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();

    Command::cargo_bin("plankifier")
        .unwrap()
        .env("PLANKIFIER_CONFIG_DIR", config.path())
        .env_remove("PLANKIFIER_CONFIG")
        .args(["plan", "--planner", "/nonexistent/pegasus-plan", "--dir"])
        .arg(work.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("planning failed"));

    // Inputs are written before the planner is tried.
    assert!(work.path().join("pegasus.properties").is_file());
}
