// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! An engine backed by an external program. Each task is one blocking
//! invocation:
//!
//! ```text
//! <program> [extra args] <task> <vis> [--param <key>=<json>]... [--expect <path>]...
//! ```
//!
//! The `msmetadata` task must print the dataset's metadata as JSON on stdout.

use std::{
    path::{Path, PathBuf},
    process::{Command, Output},
};

use log::{debug, trace};

use super::{Engine, EngineError, EngineOutcome, EngineRequest, EngineTask};
use crate::dataset::DatasetMetadata;

/// How many lines of a failed program's stderr to report.
const STDERR_LINES: usize = 5;

#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl CommandEngine {
    pub fn new<P: AsRef<Path>>(program: P, extra_args: Vec<String>) -> CommandEngine {
        CommandEngine {
            program: program.as_ref().to_path_buf(),
            extra_args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, request: &EngineRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.extra_args)
            .arg(request.task.to_string())
            .arg(&request.vis);
        for (key, value) in &request.params {
            // Serialising these values can't fail; there are no maps with
            // non-string keys.
            let value = serde_json::to_string(value).unwrap_or_default();
            cmd.arg("--param").arg(format!("{key}={value}"));
        }
        for output in &request.expected_outputs {
            cmd.arg("--expect").arg(output);
        }
        cmd
    }

    fn spawn(&self, mut cmd: Command) -> Result<Output, EngineError> {
        debug!("Running {cmd:?}");
        let output = cmd.output().map_err(|err| EngineError::Spawn {
            program: self.program.clone(),
            err,
        })?;
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            trace!("engine: {line}");
        }
        Ok(output)
    }
}

fn failure_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!(
        "exit code {:?}: {}",
        output.status.code(),
        stderr.lines().take(STDERR_LINES).collect::<Vec<_>>().join("\n")
    )
}

impl Engine for CommandEngine {
    fn execute(&mut self, request: &EngineRequest) -> Result<EngineOutcome, EngineError> {
        let output = self.spawn(self.command(request))?;
        if !output.status.success() {
            return Ok(EngineOutcome::failed(failure_reason(&output)));
        }
        Ok(EngineOutcome::succeeded(request.expected_outputs.clone()))
    }

    fn metadata(&mut self, vis: &Path) -> Result<DatasetMetadata, EngineError> {
        let request = EngineRequest::new(EngineTask::Msmetadata, vis);
        let output = self.spawn(self.command(&request))?;
        if !output.status.success() {
            return Err(EngineError::Failed {
                task: EngineTask::Msmetadata,
                vis: vis.to_path_buf(),
                reason: failure_reason(&output),
            });
        }
        serde_json::from_slice(&output.stdout).map_err(|err| EngineError::BadMetadata {
            vis: vis.to_path_buf(),
            err,
        })
    }
}
