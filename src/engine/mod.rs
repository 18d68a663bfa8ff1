// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The boundary to the external processing engine. Every calibration,
//! flagging, splitting and imaging operation is a blocking engine call.

mod command;
mod error;
mod request;

pub use command::CommandEngine;
pub use error::EngineError;
pub use request::{EngineOutcome, EngineRequest, EngineTask, ParamValue, TaskParams};

use std::path::{Path, PathBuf};

use log::debug;

use crate::{dataset::DatasetMetadata, io::remove_artifact};

pub trait Engine {
    /// Run a single task to completion.
    fn execute(&mut self, request: &EngineRequest) -> Result<EngineOutcome, EngineError>;

    /// Read the metadata of a dataset.
    fn metadata(&mut self, vis: &Path) -> Result<DatasetMetadata, EngineError>;
}

/// Run a task and hold the engine to its contract: an unsuccessful outcome is
/// an error, and so is a "successful" one that left a declared output
/// missing.
pub fn run_task(
    engine: &mut dyn Engine,
    request: EngineRequest,
) -> Result<Vec<PathBuf>, EngineError> {
    debug!(
        "Engine task '{}' on '{}' ({} parameters)",
        request.task,
        request.vis.display(),
        request.params.len()
    );
    let outcome = engine.execute(&request)?;
    if !outcome.success {
        return Err(EngineError::Failed {
            task: request.task,
            vis: request.vis,
            reason: outcome
                .message
                .unwrap_or_else(|| "no reason given".to_string()),
        });
    }
    if let Some(missing) = request.expected_outputs.iter().find(|p| !p.exists()) {
        return Err(EngineError::MissingOutput {
            task: request.task,
            path: missing.clone(),
        });
    }
    Ok(outcome.outputs)
}

/// Remove an output left behind by an earlier run before re-deriving it.
/// Engine tasks generally refuse to overwrite, or worse, append.
pub fn clear_stale_output(path: &Path) -> Result<(), EngineError> {
    remove_artifact(path)
        .map(|_| ())
        .map_err(|err| EngineError::StaleOutput {
            path: path.to_path_buf(),
            err,
        })
}
