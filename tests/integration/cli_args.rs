// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests of argument handling that never reach the engine.

use crate::*;

#[test]
fn help_is_available() {
    let cmd = caga().arg("--help").ok();
    assert!(cmd.is_ok());
    let (stdout, _) = get_cmd_output(cmd);
    for sub in ["run", "plan", "status", "clear"] {
        assert!(stdout.contains(sub), "'{sub}' missing from help");
    }
}

#[test]
fn missing_ms_is_a_configuration_error() {
    let cmd = caga()
        .args([
            "run",
            "--steps",
            "clean",
            "--amp-calibrators",
            "3C286",
            "--targets",
            "TARGET",
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.starts_with("Error: No measurement set"), "{stderr}");
}

#[test]
fn unknown_steps_are_listed_with_the_valid_ones() {
    let ws = Workspace::new();
    let ms = ws.ms();
    let cmd = caga()
        .args(["run", "--ms"])
        .arg(&ms)
        .args([
            "--steps",
            "calibrate",
            "--amp-calibrators",
            "3C286",
            "--targets",
            "TARGET",
        ])
        .ok();
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("Unknown stage 'calibrate'"), "{stderr}");
    assert!(stderr.contains("second_calibration"), "{stderr}");
}

#[test]
fn dry_run_prints_the_setup_and_exits() {
    let ws = Workspace::new();
    let saved = ws.path().join("saved.toml");
    let cmd = caga()
        .args(["run", "--dry-run", "--no-progress-bars", "--ms"])
        .arg(ws.ms())
        .arg("-o")
        .arg(ws.outdir())
        .args([
            "--steps",
            "inspect",
            "clean",
            "--amp-calibrators",
            "3C286",
            "--targets",
            "TARGET",
            "--save-toml",
        ])
        .arg(&saved)
        .ok();
    let ok = cmd.is_ok();
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(ok, "{stderr}");
    assert!(stdout.contains("Stages: inspect, get_caltables, clean"), "{stdout}");
    assert!(stdout.contains("Dry run -- exiting now."), "{stdout}");
    // Nothing is written.
    assert!(!ws.outdir().exists());

    // The saved arguments reproduce the run.
    let toml = fs::read_to_string(&saved).unwrap();
    assert!(toml.contains("[pipeline]"));
    let cmd = caga().args(["run", "--dry-run"]).arg(&saved).ok();
    let ok = cmd.is_ok();
    let (_, stderr) = get_cmd_output(cmd);
    assert!(ok, "{stderr}");
}

#[test]
fn a_missing_measurement_set_is_reported_before_the_engine_runs() {
    let ws = Workspace::new();
    let engine = ws.path().join("no-such-engine");
    let args = ws.args_file(&["inspect"], &engine);
    fs::remove_dir(ws.ms()).unwrap();

    let cmd = caga().arg("run").arg(&args).ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("Has the stage that makes it been run?"), "{stderr}");
}

#[test]
fn an_unrunnable_engine_is_an_engine_failure() {
    let ws = Workspace::new();
    let engine = ws.path().join("no-such-engine");
    let args = ws.args_file(&["inspect"], &engine);

    let cmd = caga().arg("run").arg(&args).ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("try turning up verbosity"), "{stderr}");
}
