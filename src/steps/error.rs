// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use super::Stage;
use crate::{
    dataset::DatasetError, engine::EngineError, naming::NamingError, selfcal::SelfCalError,
};

#[derive(Error, Debug)]
pub enum StepError {
    #[error("Stage '{0}' was registered twice")]
    DuplicateStage(Stage),

    #[error("Stage '{0}' isn't registered")]
    Unregistered(Stage),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    SelfCal(#[from] SelfCalError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
