// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Whole-pipeline tests against a shell-script engine. The script reports
//! fixed metadata, creates every output it is told to expect and logs each
//! task it is given. Like a real engine, the tasks that write columns or
//! flags change the dataset they're given.

use std::os::unix::fs::PermissionsExt;

use crate::*;

const FAKE_ENGINE: &str = r#"#!/bin/sh
dir=$(dirname "$0")
task=$1
vis=$2
shift 2
echo "$task $vis" >> "$dir/engine.log"
if [ "$task" = "$FAKE_ENGINE_FAIL" ]; then
    echo "$task fell over" >&2
    exit 1
fi
if [ "$task" = "msmetadata" ]; then
    cat <<'JSON'
{"channels": 1024, "subbands": 1, "antennas": ["C00", "C01", "C02", "C03"], "sources": ["3C286", "1822-096", "TARGET"], "reference_frequency_hz": 1.4e9, "bandwidth_hz": 3.2e7, "num_correlations": 2}
JSON
    exit 0
fi
case "$task" in
    setjy|applycal|flagdata)
        if [ -d "$vis" ]; then
            echo "$task" > "$vis/$task.$$"
        else
            echo "$task" >> "$vis"
        fi
        ;;
esac
while [ $# -gt 0 ]; do
    case "$1" in
        --expect)
            mkdir -p "$(dirname "$2")"
            echo "$task" > "$2"
            shift 2
            ;;
        *)
            shift
            ;;
    esac
done
"#;

const ALL_STAGES: [&str; 12] = [
    "inspect",
    "get_caltables",
    "initial_flagging",
    "calibration",
    "bandpass",
    "second_calibration",
    "fluxscale",
    "applycal",
    "postcal_flagging",
    "split",
    "clean",
    "selfcal",
];

fn install_engine(ws: &Workspace) -> PathBuf {
    let path = ws.path().join("engine.sh");
    fs::write(&path, FAKE_ENGINE).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// The tasks the engine has been given so far.
fn engine_tasks(ws: &Workspace) -> Vec<String> {
    fs::read_to_string(ws.path().join("engine.log"))
        .unwrap_or_default()
        .lines()
        .filter_map(|l| l.split_whitespace().next())
        .map(|t| t.to_string())
        .collect()
}

fn clear_engine_log(ws: &Workspace) {
    let _ = fs::remove_file(ws.path().join("engine.log"));
}

fn run_caga(args: &[&str], args_file: &Path) -> (bool, String, String) {
    let cmd = caga()
        .args(args)
        .arg("--no-progress-bars")
        .arg(args_file)
        .ok();
    let ok = cmd.is_ok();
    let (stdout, stderr) = get_cmd_output(cmd);
    (ok, stdout, stderr)
}

#[test]
fn full_run_then_rerun() {
    let ws = Workspace::new();
    let engine = install_engine(&ws);
    let args = ws.args_file(&ALL_STAGES, &engine);

    let (ok, stdout, stderr) = run_caga(&["run"], &args);
    assert!(ok, "{stdout}\n{stderr}");
    assert!(stdout.contains("caga run complete."));

    let out = ws.outdir();
    for product in [
        "log/obs.listobs",
        "log/obs.flagsummary.calibrators",
        "caltables/obs.gain_K",
        "caltables/obs.bandpass",
        "caltables/obs.fluxscale",
        "TARGET/obs.TARGET.split.ms",
        "TARGET/obs.TARGET.tclean.image",
        "TARGET/obs.TARGET.sc.p0",
        "TARGET/obs.TARGET.sc.final",
        ".caga_state.json",
    ] {
        assert!(out.join(product).exists(), "{product} wasn't written");
    }
    let tasks = engine_tasks(&ws);
    assert_eq!(tasks.first().map(|s| s.as_str()), Some("msmetadata"));
    assert!(tasks.iter().any(|t| t == "fluxscale"));
    // One image per source, then one per self-calibration cycle.
    assert_eq!(tasks.iter().filter(|t| *t == "tclean").count(), 5);

    // Everything is up to date, so only the stages without declared outputs
    // run again, however often the engine has written into the datasets.
    for _ in 0..2 {
        clear_engine_log(&ws);
        let (ok, stdout, stderr) = run_caga(&["run"], &args);
        assert!(ok, "{stdout}\n{stderr}");
        assert_eq!(
            engine_tasks(&ws),
            ["msmetadata", "applycal", "applycal", "applycal"]
        );
        assert!(stdout.contains("(up to date)"));
    }

    // Deleting a product makes its stage run again.
    fs::remove_file(out.join("TARGET/obs.TARGET.tclean.image")).unwrap();
    clear_engine_log(&ws);
    let (ok, stdout, stderr) = run_caga(&["run"], &args);
    assert!(ok, "{stdout}\n{stderr}");
    assert!(engine_tasks(&ws).iter().any(|t| t == "tclean"));
}

#[test]
fn plan_status_and_clear() {
    let ws = Workspace::new();
    let engine = install_engine(&ws);
    let args = ws.args_file(&["inspect", "calibration"], &engine);

    let (ok, stdout, stderr) = run_caga(&["plan"], &args);
    assert!(ok, "{stdout}\n{stderr}");
    assert!(stdout.contains("inspect: will run"), "{stdout}");
    assert!(stdout.contains("get_caltables: runs every time"), "{stdout}");
    // Planning only reads metadata.
    assert_eq!(engine_tasks(&ws), ["msmetadata"]);

    let (ok, stdout, stderr) = run_caga(&["run"], &args);
    assert!(ok, "{stdout}\n{stderr}");

    let (ok, stdout, _) = run_caga(&["plan"], &args);
    assert!(ok);
    assert!(stdout.contains("inspect: up to date"), "{stdout}");

    let (ok, stdout, _) = run_caga(&["status"], &args);
    assert!(ok);
    assert!(stdout.contains("inspect: complete"), "{stdout}");
    assert!(stdout.contains(" calibration: complete"), "{stdout}");
    assert!(stdout.contains("clean: not complete"), "{stdout}");

    let (ok, _, stderr) = run_caga(&["clear", "--stage", "calibration"], &args);
    assert!(ok, "{stderr}");
    let (_, stdout, _) = run_caga(&["status"], &args);
    assert!(stdout.contains("inspect: complete"), "{stdout}");
    assert!(stdout.contains(" calibration: not complete"), "{stdout}");

    let (ok, _, stderr) = run_caga(&["clear", "--all"], &args);
    assert!(ok, "{stderr}");
    let (_, stdout, _) = run_caga(&["status"], &args);
    assert!(stdout.contains("inspect: not complete"), "{stdout}");
}

#[test]
fn an_engine_failure_stops_the_run() {
    let ws = Workspace::new();
    let engine = install_engine(&ws);
    let args = ws.args_file(&ALL_STAGES, &engine);

    let cmd = caga()
        .env("FAKE_ENGINE_FAIL", "bandpass")
        .arg("run")
        .arg("--no-progress-bars")
        .arg(&args)
        .ok();
    assert!(cmd.is_err());
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stderr.starts_with("Error:"), "{stderr}");
    assert!(stderr.contains("bandpass fell over"), "{stdout}\n{stderr}");

    let tasks = engine_tasks(&ws);
    assert_eq!(tasks.last().map(|s| s.as_str()), Some("bandpass"));
    assert!(!tasks.iter().any(|t| t == "fluxscale"));

    // Stages before the failure are recorded; the failed one isn't.
    let (_, stdout, _) = run_caga(&["status"], &args);
    assert!(stdout.contains(" calibration: complete"), "{stdout}");
    assert!(stdout.contains("bandpass: not complete"), "{stdout}");
}
