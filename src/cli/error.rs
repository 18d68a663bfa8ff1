// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all caga-related errors. This should be the *only* error
//! enum that is publicly visible.

use thiserror::Error;

use super::run::RunArgsError;
use crate::{
    dataset::DatasetError,
    engine::EngineError,
    naming::NamingError,
    params::SpwError,
    scheduler::PipelineError,
    selfcal::SelfCalError,
    state::StateError,
    steps::StepError,
};

/// The *only* publicly visible error from caga. The variant is the category
/// of the problem; the message is the underlying error's.
#[derive(Error, Debug)]
pub enum CagaError {
    /// Bad or inconsistent parameters, caught before the engine is called.
    #[error("{0}")]
    Configuration(String),

    /// A declared input artifact or the input dataset doesn't exist.
    #[error("{0}\n\nHas the stage that makes it been run?")]
    MissingInput(String),

    /// The external engine failed or didn't produce what it should have.
    #[error("{0}\n\nIf you don't know what this means, try turning up verbosity (-v or -vv) and maybe disabling progress bars.")]
    EngineFailure(String),

    /// The state file couldn't be written.
    #[error("{0}")]
    State(String),

    /// An error related to argument files.
    #[error("{0}")]
    ArgFile(String),

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

type Category = fn(String) -> CagaError;

fn engine_category(e: &EngineError) -> Category {
    match e {
        EngineError::Spawn { .. }
        | EngineError::Failed { .. }
        | EngineError::MissingOutput { .. }
        | EngineError::BadMetadata { .. } => CagaError::EngineFailure,
        EngineError::StaleOutput { .. } => CagaError::Generic,
    }
}

fn dataset_category(e: &DatasetError) -> Category {
    match e {
        DatasetError::DoesNotExist(_) => CagaError::MissingInput,
        DatasetError::Metadata { .. } => CagaError::EngineFailure,
    }
}

fn selfcal_category(e: &SelfCalError) -> Category {
    match e {
        SelfCalError::NotConfigured
        | SelfCalError::SolintCount { .. }
        | SelfCalError::SolintsExhausted { .. }
        | SelfCalError::Naming(_) => CagaError::Configuration,
        SelfCalError::Cycle { err, .. } => engine_category(err),
    }
}

fn step_category(e: &StepError) -> Category {
    match e {
        StepError::DuplicateStage(_) | StepError::Unregistered(_) | StepError::Naming(_) => {
            CagaError::Configuration
        }
        StepError::MissingInput(_) => CagaError::MissingInput,
        StepError::Engine(e) => engine_category(e),
        StepError::Dataset(e) => dataset_category(e),
        StepError::SelfCal(e) => selfcal_category(e),
        StepError::IO(_) => CagaError::Generic,
    }
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

impl From<RunArgsError> for CagaError {
    fn from(e: RunArgsError) -> Self {
        let s = e.to_string();
        match e {
            RunArgsError::IO(_) => Self::Generic(s),
            _ => Self::Configuration(s),
        }
    }
}

impl From<PipelineError> for CagaError {
    fn from(e: PipelineError) -> Self {
        let s = e.to_string();
        match &e {
            PipelineError::Unregistered(_) | PipelineError::Naming(_) => Self::Configuration(s),
            PipelineError::MissingInput { .. } => Self::MissingInput(s),
            PipelineError::Stage { err, .. } => step_category(err)(s),
            PipelineError::OutputNotProduced { .. } => Self::EngineFailure(s),
            PipelineError::State(_) => Self::State(s),
        }
    }
}

impl From<StepError> for CagaError {
    fn from(e: StepError) -> Self {
        step_category(&e)(e.to_string())
    }
}

impl From<SelfCalError> for CagaError {
    fn from(e: SelfCalError) -> Self {
        selfcal_category(&e)(e.to_string())
    }
}

impl From<EngineError> for CagaError {
    fn from(e: EngineError) -> Self {
        engine_category(&e)(e.to_string())
    }
}

impl From<DatasetError> for CagaError {
    fn from(e: DatasetError) -> Self {
        dataset_category(&e)(e.to_string())
    }
}

impl From<NamingError> for CagaError {
    fn from(e: NamingError) -> Self {
        Self::Configuration(e.to_string())
    }
}

impl From<SpwError> for CagaError {
    fn from(e: SpwError) -> Self {
        Self::Configuration(e.to_string())
    }
}

impl From<StateError> for CagaError {
    fn from(e: StateError) -> Self {
        Self::State(e.to_string())
    }
}

impl From<log::SetLoggerError> for CagaError {
    fn from(e: log::SetLoggerError) -> Self {
        Self::Generic(e.to_string())
    }
}

impl From<std::io::Error> for CagaError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
