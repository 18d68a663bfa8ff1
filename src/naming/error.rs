// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use super::Artifact;
use crate::selfcal::Cycle;

#[derive(Error, Debug)]
pub enum NamingError {
    #[error("The {0} name is empty")]
    Empty(&'static str),

    #[error("The {kind} name '{name}' contains a path separator")]
    PathSeparator { kind: &'static str, name: String },

    #[error("The {kind} name '{name}' is reserved")]
    Reserved { kind: &'static str, name: String },

    #[error("Artifact {0:?} needs a source to be named")]
    MissingSource(Artifact),

    #[error("Artifact {artifact:?} is not per-source, but source '{name}' was given")]
    UnexpectedSource { artifact: Artifact, name: String },

    #[error("Artifact {0:?} needs a self-calibration cycle to be named")]
    MissingCycle(Artifact),

    #[error("Artifact {artifact:?} does not depend on the self-calibration cycle, but {cycle} was given")]
    UnexpectedCycle { artifact: Artifact, cycle: Cycle },
}
