// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helpful things for tests.

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use tempfile::TempDir;
use vec1::vec1;

use crate::{
    dataset::{Dataset, DatasetMetadata},
    engine::{Engine, EngineError, EngineOutcome, EngineRequest, EngineTask, ParamValue},
    flagging::FlaggingParams,
    imaging::Imager,
    io::create_output_tree,
    naming::ArtifactNames,
    params::{EngineParams, PipelineParams, SelfCalParams, Sources, TaskSections},
    state::DEFAULT_STATE_FILE,
    steps::StepContext,
};

pub(crate) const AMP_CAL: &str = "3C286";
pub(crate) const PHASE_CAL: &str = "1822-096";
pub(crate) const TARGET: &str = "TARGET";

pub(crate) fn test_metadata() -> DatasetMetadata {
    DatasetMetadata {
        channels: 1024,
        subbands: 1,
        antennas: (0..4).map(|i| format!("C0{i}")).collect(),
        sources: [AMP_CAL, PHASE_CAL, TARGET]
            .into_iter()
            .map(String::from)
            .collect(),
        reference_frequency_hz: 1.4e9,
        bandwidth_hz: 32e6,
        num_correlations: 2,
    }
}

pub(crate) fn test_params(ms: &Path, outdir: &Path) -> PipelineParams {
    PipelineParams {
        ms: ms.to_path_buf(),
        project: "proj".to_string(),
        outdir: outdir.to_path_buf(),
        steps: vec![],
        imager: Imager::Tclean,
        state_file: outdir.join(DEFAULT_STATE_FILE),
        ref_ant: Some("C00".to_string()),
        spw_flagging: None,
        spw_gaincal: None,
        sources: Sources {
            amp_calibrators: vec1![AMP_CAL.to_string()],
            bandpass_calibrators: vec1![AMP_CAL.to_string()],
            phase_calibrators: vec![PHASE_CAL.to_string()],
            targets: vec1![TARGET.to_string()],
        },
        selfcal: Some(SelfCalParams {
            pcycles: 2,
            apcycles: 1,
            solints: vec1![
                "8min".to_string(),
                "4min".to_string(),
                "2min".to_string(),
                "1min".to_string()
            ],
            resume: false,
        }),
        flagging: FlaggingParams::default(),
        engine: EngineParams::default(),
        tasks: TaskSections::default(),
    }
}

/// A scratch measurement set and output directory.
pub(crate) struct Fixture {
    // Held so the directory lives as long as the fixture.
    pub(crate) dir: TempDir,
    pub(crate) params: PipelineParams,
    pub(crate) names: ArtifactNames,
    pub(crate) dataset: Dataset,
}

impl Fixture {
    pub(crate) fn new() -> Fixture {
        Fixture::with_params(|_| ())
    }

    pub(crate) fn with_params<F: FnOnce(&mut PipelineParams)>(f: F) -> Fixture {
        let dir = TempDir::new().unwrap();
        let ms = dir.path().join("obs.ms");
        fs::create_dir(&ms).unwrap();
        let outdir = dir.path().join("out");
        create_output_tree(&outdir).unwrap();

        let mut params = test_params(&ms, &outdir);
        f(&mut params);
        let names = ArtifactNames::new(&outdir, &params.project, params.imager).unwrap();
        let dataset = Dataset::from_parts(&ms, &params.project, test_metadata()).unwrap();
        Fixture {
            dir,
            params,
            names,
            dataset,
        }
    }

    pub(crate) fn outdir(&self) -> PathBuf {
        self.params.outdir.clone()
    }

    pub(crate) fn ctx<'a>(&'a mut self, engine: &'a mut RecordingEngine) -> StepContext<'a> {
        StepContext {
            dataset: &mut self.dataset,
            params: &self.params,
            names: &self.names,
            engine,
        }
    }
}

/// An engine that records every request and, unless told otherwise, creates
/// each request's expected outputs.
#[derive(Default)]
pub(crate) struct RecordingEngine {
    pub(crate) requests: Vec<EngineRequest>,
    pub(crate) metadata_calls: usize,
    /// Fail the nth (counting from 0) request for this task.
    fail_on: Option<(EngineTask, usize)>,
    skip_outputs: bool,
    /// Tasks that write into the dataset they're given, as setjy and applycal
    /// do.
    writes_vis: Vec<EngineTask>,
}

impl RecordingEngine {
    pub(crate) fn new() -> RecordingEngine {
        RecordingEngine::default()
    }

    pub(crate) fn failing_on(task: EngineTask, nth: usize) -> RecordingEngine {
        RecordingEngine {
            fail_on: Some((task, nth)),
            ..Default::default()
        }
    }

    /// Report success without writing anything.
    pub(crate) fn without_outputs() -> RecordingEngine {
        RecordingEngine {
            skip_outputs: true,
            ..Default::default()
        }
    }

    /// Leave `vis` newer than anything else after each of these tasks.
    pub(crate) fn writing_into_vis(tasks: &[EngineTask]) -> RecordingEngine {
        RecordingEngine {
            writes_vis: tasks.to_vec(),
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.len() + self.metadata_calls
    }

    pub(crate) fn tasks(&self) -> Vec<EngineTask> {
        self.requests.iter().map(|r| r.task).collect()
    }

    pub(crate) fn requests_for(&self, task: EngineTask) -> Vec<&EngineRequest> {
        self.requests.iter().filter(|r| r.task == task).collect()
    }
}

impl Engine for RecordingEngine {
    fn execute(&mut self, request: &EngineRequest) -> Result<EngineOutcome, EngineError> {
        let nth = self
            .requests
            .iter()
            .filter(|r| r.task == request.task)
            .count();
        self.requests.push(request.clone());
        if self.fail_on == Some((request.task, nth)) {
            return Ok(EngineOutcome::failed("injected failure"));
        }
        if !self.skip_outputs {
            for output in &request.expected_outputs {
                if let Some(parent) = output.parent() {
                    fs::create_dir_all(parent).unwrap();
                }
                fs::write(output, request.task.to_string()).unwrap();
            }
        }
        if self.writes_vis.contains(&request.task) {
            write_into(&request.vis, self.requests.len());
        }
        Ok(EngineOutcome::succeeded(request.expected_outputs.clone()))
    }

    fn metadata(&mut self, _vis: &Path) -> Result<DatasetMetadata, EngineError> {
        self.metadata_calls += 1;
        Ok(test_metadata())
    }
}

/// Change `vis` the way a task writing a column would, and push its
/// modification time into the future so that it is unambiguously the newest
/// thing on disk.
fn write_into(vis: &Path, n: usize) {
    if vis.is_dir() {
        fs::write(vis.join(format!("table.f{n}")), b"column").unwrap();
    } else {
        fs::write(vis, format!("column {n}")).unwrap();
    }
    File::open(vis)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
}

/// Give every file under `dir` the same modification time in the past, so
/// that anything written afterwards is newer.
pub(crate) fn age_files(dir: &Path) {
    set_mtimes(dir, SystemTime::now() - Duration::from_secs(60));
}

fn set_mtimes(dir: &Path, time: SystemTime) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            set_mtimes(&path, time);
        } else {
            File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(time)
                .unwrap();
        }
    }
}

/// A request's parameter, which must be present.
pub(crate) fn param<'a>(request: &'a EngineRequest, key: &str) -> &'a ParamValue {
    request
        .params
        .get(key)
        .unwrap_or_else(|| panic!("{:?} request has no '{key}' parameter", request.task))
}

/// A list-of-paths parameter as paths.
pub(crate) fn path_list(value: &ParamValue) -> Vec<PathBuf> {
    match value {
        ParamValue::List(items) => items
            .iter()
            .map(|i| PathBuf::from(i.as_str().unwrap()))
            .collect(),
        other => panic!("not a list: {other:?}"),
    }
}
