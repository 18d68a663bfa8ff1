// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::str::FromStr;

use indexmap::indexmap;

use super::*;
use crate::{
    engine::ParamValue,
    params::SpwSelection,
    tests::{param, Fixture, RecordingEngine, AMP_CAL, PHASE_CAL, TARGET},
};

fn all_on() -> FlaggingParams {
    FlaggingParams {
        clip: true,
        zerochan: true,
        badchan: true,
        quack: true,
        tfcrop: true,
        rflag: true,
        extend: true,
        aoflagger: true,
    }
}

fn modes(engine: &RecordingEngine) -> Vec<String> {
    engine
        .requests_for(EngineTask::Flagdata)
        .into_iter()
        .map(|r| param(r, "mode").as_str().unwrap().to_string())
        .collect()
}

#[test]
fn nothing_enabled_still_writes_a_summary() {
    let mut fixture = Fixture::new();
    let mut engine = RecordingEngine::new();
    flag_calibrators(&mut fixture.ctx(&mut engine)).unwrap();

    assert_eq!(engine.tasks(), vec![EngineTask::Flagdata]);
    let summary = &engine.requests[0];
    assert_eq!(param(summary, "mode"), &ParamValue::from("summary"));
    let path = fixture.outdir().join("log").join("proj.flagsummary.calibrators");
    assert_eq!(summary.expected_outputs, vec![path.clone()]);
    assert!(path.exists());
}

#[test]
fn every_method_in_order() {
    let mut fixture = Fixture::with_params(|p| {
        p.flagging = all_on();
        p.spw_flagging = Some(SpwSelection::from_str("0.2").unwrap());
    });
    let mut engine = RecordingEngine::new();
    flag_targets(&mut fixture.ctx(&mut engine)).unwrap();

    assert_eq!(
        modes(&engine),
        [
            "clip", "manual", "manual", "quack", "quack", "tfcrop", "rflag", "extend", "summary"
        ]
    );
    // AOFlagger runs once, after the per-source methods.
    assert_eq!(engine.requests_for(EngineTask::Aoflagger).len(), 1);
    assert_eq!(engine.tasks()[8], EngineTask::Aoflagger);

    let flagdata = engine.requests_for(EngineTask::Flagdata);
    for request in &flagdata[..8] {
        assert_eq!(param(request, "field"), &ParamValue::from(TARGET));
    }
    assert_eq!(param(flagdata[1], "spw"), &ParamValue::from("*:0"));
    assert_eq!(param(flagdata[2], "spw"), &ParamValue::from("*:205~819"));
    assert_eq!(param(flagdata[3], "quackmode"), &ParamValue::from("beg"));
    assert_eq!(param(flagdata[4], "quackmode"), &ParamValue::from("endb"));
    assert_eq!(param(flagdata[5], "datacolumn"), &ParamValue::from("DATA"));
}

#[test]
fn user_quackmode_means_a_single_call() {
    let mut fixture = Fixture::with_params(|p| {
        p.flagging.quack = true;
        p.tasks.insert(
            TaskSection::FlagQuack,
            indexmap! {
                "quackmode".to_string() => ParamValue::from("tail"),
                "quackinterval".to_string() => ParamValue::Float(10.0),
            },
        );
    });
    let mut engine = RecordingEngine::new();
    flag_targets(&mut fixture.ctx(&mut engine)).unwrap();

    let flagdata = engine.requests_for(EngineTask::Flagdata);
    assert_eq!(flagdata.len(), 2);
    assert_eq!(param(flagdata[0], "quackmode"), &ParamValue::from("tail"));
    assert_eq!(param(flagdata[0], "quackinterval"), &ParamValue::Float(10.0));
}

#[test]
fn calibrator_pass_covers_each_calibrator_once() {
    let mut fixture = Fixture::with_params(|p| {
        p.flagging.clip = true;
        p.sources.phase_calibrators.push("ABSENT".to_string());
    });
    let mut engine = RecordingEngine::new();
    flag_calibrators(&mut fixture.ctx(&mut engine)).unwrap();

    let fields: Vec<_> = engine
        .requests_for(EngineTask::Flagdata)
        .into_iter()
        .filter(|r| r.params.contains_key("field"))
        .map(|r| param(r, "field").as_str().unwrap().to_string())
        .collect();
    // The amplitude calibrator is also the bandpass calibrator.
    assert_eq!(fields, [AMP_CAL, PHASE_CAL]);
}

#[test]
fn a_failed_method_stops_the_pass() {
    let mut fixture = Fixture::with_params(|p| {
        p.flagging.clip = true;
        p.flagging.rflag = true;
    });
    let mut engine = RecordingEngine::failing_on(EngineTask::Flagdata, 0);
    let result = flag_targets(&mut fixture.ctx(&mut engine));
    assert!(matches!(
        result,
        Err(StepError::Engine(EngineError::Failed { .. }))
    ));
    assert_eq!(engine.calls(), 1);
    assert!(!fixture
        .outdir()
        .join("log")
        .join("proj.flagsummary.targets")
        .exists());
}
