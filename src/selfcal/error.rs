// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

use super::Cycle;
use crate::{engine::EngineError, naming::NamingError};

#[derive(Error, Debug)]
pub enum SelfCalError {
    #[error("Self-calibration was requested, but no self-calibration parameters were given")]
    NotConfigured,

    #[error("{pcycles} phase and {apcycles} amplitude-phase cycles need {expected} solution intervals (one more for the final cycle), but {got} were given")]
    SolintCount {
        pcycles: usize,
        apcycles: usize,
        expected: usize,
        got: usize,
    },

    #[error("All {len} solution intervals have already been used")]
    SolintsExhausted { len: usize },

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error("Self-calibration of '{target}' failed during the {cycle} (last completed: {}; calibration chain: [{}]): {err}", display_last(.last_completed), display_tables(.tables))]
    Cycle {
        target: String,
        cycle: Cycle,
        last_completed: Option<Cycle>,
        tables: Vec<PathBuf>,
        #[source]
        err: EngineError,
    },
}

fn display_last(last: &Option<Cycle>) -> String {
    match last {
        Some(c) => c.to_string(),
        None => "none".to_string(),
    }
}

fn display_tables(tables: &[PathBuf]) -> String {
    tables
        .iter()
        .map(|t| t.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
