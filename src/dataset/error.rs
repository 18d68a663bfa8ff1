// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Dataset '{0}' does not exist")]
    DoesNotExist(PathBuf),

    #[error("Couldn't read the metadata of '{path}': {err}")]
    Metadata {
        path: PathBuf,
        #[source]
        err: Box<EngineError>,
    },
}
