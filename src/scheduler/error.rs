// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

use crate::{
    naming::NamingError,
    state::StateError,
    steps::{Stage, StepError},
};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Stage '{0}' isn't registered")]
    Unregistered(Stage),

    #[error("Stage '{stage}' can't run: its input '{path}' doesn't exist")]
    MissingInput { stage: Stage, path: PathBuf },

    #[error("Stage '{stage}' failed: {err}")]
    Stage {
        stage: Stage,
        #[source]
        err: StepError,
    },

    #[error("Stage '{stage}' finished, but its output '{path}' doesn't exist")]
    OutputNotProduced { stage: Stage, path: PathBuf },

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error(transparent)]
    State(#[from] StateError),
}
