// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

use super::EngineTask;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Couldn't start the engine program '{program}': {err}")]
    Spawn {
        program: PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error("Engine task '{task}' failed on '{vis}': {reason}")]
    Failed {
        task: EngineTask,
        vis: PathBuf,
        reason: String,
    },

    #[error("Engine task '{task}' reported success, but its output '{path}' doesn't exist")]
    MissingOutput { task: EngineTask, path: PathBuf },

    #[error("Couldn't remove the stale output '{path}': {err}")]
    StaleOutput {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error("Couldn't understand the metadata reported for '{vis}': {err}")]
    BadMetadata {
        vis: PathBuf,
        #[source]
        err: serde_json::Error,
    },
}
