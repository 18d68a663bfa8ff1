// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The persisted record of completed stages, and the timestamp check that
//! decides whether a stage needs to (re-)run.
//!
//! The state file is a JSON object mapping stage names to records. It is
//! rewritten atomically after every mutation, so a crash leaves only
//! committed completions behind. Keys that aren't stage names this build
//! knows about are carried along untouched.

mod error;

pub use error::StateError;

use std::{
    collections::BTreeMap,
    fmt,
    fs,
    mem,
    path::{Path, PathBuf},
    time::SystemTime,
};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::io::atomic_write;

/// The state file's name, relative to the output directory, unless
/// configured otherwise.
pub const DEFAULT_STATE_FILE: &str = ".caga_state.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub outputs: Vec<PathBuf>,
}

/// Why a stage does or doesn't need to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    /// Every output exists and no input is newer than the oldest output.
    UpToDate,

    /// The stage declares no outputs, so there's nothing to check.
    Unverifiable,

    MissingOutput(PathBuf),

    NewerInput { input: PathBuf, output: PathBuf },

    /// A stage this one depends on completed after it did.
    UpstreamRerun(String),

    /// A modification time couldn't be read.
    UnknownAge(PathBuf),
}

impl Staleness {
    pub fn is_needed(&self) -> bool {
        !matches!(self, Staleness::UpToDate)
    }
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Staleness::UpToDate => write!(f, "up to date"),
            Staleness::Unverifiable => write!(f, "no declared outputs"),
            Staleness::MissingOutput(p) => write!(f, "'{}' is missing", p.display()),
            Staleness::NewerInput { input, output } => write!(
                f,
                "'{}' is newer than '{}'",
                input.display(),
                output.display()
            ),
            Staleness::UpstreamRerun(stage) => write!(f, "'{stage}' has run since"),
            Staleness::UnknownAge(p) => {
                write!(f, "couldn't read the modification time of '{}'", p.display())
            }
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Compare declared inputs against declared outputs. Inputs that don't exist
/// don't take part in the comparison; an input that must exist is checked
/// separately before the stage runs.
pub fn staleness(inputs: &[PathBuf], outputs: &[PathBuf]) -> Staleness {
    let mut oldest: Option<(SystemTime, &PathBuf)> = None;
    for output in outputs {
        if !output.exists() {
            return Staleness::MissingOutput(output.clone());
        }
        match modified(output) {
            Some(t) => {
                if oldest.map_or(true, |(o, _)| t < o) {
                    oldest = Some((t, output));
                }
            }
            None => return Staleness::UnknownAge(output.clone()),
        }
    }
    let Some((oldest_time, oldest_output)) = oldest else {
        return Staleness::Unverifiable;
    };

    for input in inputs.iter().filter(|i| i.exists()) {
        match modified(input) {
            Some(t) if t > oldest_time => {
                return Staleness::NewerInput {
                    input: input.clone(),
                    output: oldest_output.clone(),
                }
            }
            Some(_) => (),
            None => return Staleness::UnknownAge(input.clone()),
        }
    }
    Staleness::UpToDate
}

#[derive(Debug)]
pub struct PipelineState {
    path: PathBuf,
    records: BTreeMap<String, StageRecord>,
}

impl PipelineState {
    /// Load the state file. A missing file is a fresh run; an unreadable or
    /// malformed one is reported and then treated the same way.
    pub fn load<P: AsRef<Path>>(path: P) -> PipelineState {
        let path = path.as_ref().to_path_buf();
        let records = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    warn!(
                        "State file '{}' is corrupt ({e}); starting from an empty state",
                        path.display()
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at '{}'; this is a fresh run", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                warn!(
                    "Couldn't read state file '{}' ({e}); starting from an empty state",
                    path.display()
                );
                BTreeMap::new()
            }
        };
        PipelineState { path, records }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_stage_needed(&self, stage: &str, inputs: &[PathBuf], outputs: &[PathBuf]) -> bool {
        let verdict = self.stage_staleness(stage, &[], inputs, outputs);
        debug!("Stage '{stage}': {verdict}");
        verdict.is_needed()
    }

    /// [`staleness`], and then whether any of `upstream` completed after
    /// `stage` last did.
    pub fn stage_staleness(
        &self,
        stage: &str,
        upstream: &[&str],
        inputs: &[PathBuf],
        outputs: &[PathBuf],
    ) -> Staleness {
        let verdict = staleness(inputs, outputs);
        if verdict.is_needed() {
            return verdict;
        }
        match upstream.iter().find(|u| self.completed_since(u, stage)) {
            Some(u) => Staleness::UpstreamRerun(u.to_string()),
            None => verdict,
        }
    }

    /// Whether `upstream` has a completion recorded after `stage`'s. A stage
    /// without a record is older than any upstream stage with one.
    pub fn completed_since(&self, upstream: &str, stage: &str) -> bool {
        let completed_at = |s: &str| self.records.get(s).and_then(|r| r.timestamp);
        match (completed_at(upstream), completed_at(stage)) {
            (Some(u), Some(s)) => u > s,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    pub fn mark_complete(&mut self, stage: &str, outputs: &[PathBuf]) -> Result<(), StateError> {
        let previous = self.records.insert(
            stage.to_string(),
            StageRecord {
                completed: true,
                timestamp: Some(Utc::now()),
                outputs: outputs.to_vec(),
            },
        );
        self.save_or_restore(stage, previous)
    }

    /// The last persisted flag. Artifacts can be deleted behind our back, so
    /// this is only advisory; see [`PipelineState::is_stage_needed`].
    pub fn is_complete(&self, stage: &str) -> bool {
        self.records.get(stage).map_or(false, |r| r.completed)
    }

    pub fn record(&self, stage: &str) -> Option<&StageRecord> {
        self.records.get(stage)
    }

    pub fn records(&self) -> impl Iterator<Item = (&str, &StageRecord)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn clear(&mut self, stage: &str) -> Result<(), StateError> {
        if let Some(previous) = self.records.remove(stage) {
            self.save_or_restore(stage, Some(previous))?;
            debug!("Cleared stage '{stage}'");
        }
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), StateError> {
        let previous = mem::take(&mut self.records);
        self.save().map_err(|e| {
            self.records = previous;
            e
        })
    }

    /// Persist a change to `stage`'s record, putting `previous` back if that
    /// fails. Memory never claims more than the file does.
    fn save_or_restore(
        &mut self,
        stage: &str,
        previous: Option<StageRecord>,
    ) -> Result<(), StateError> {
        self.save().map_err(|e| {
            match previous {
                Some(record) => self.records.insert(stage.to_string(), record),
                None => self.records.remove(stage),
            };
            e
        })
    }

    fn save(&self) -> Result<(), StateError> {
        let bytes = serde_json::to_vec_pretty(&self.records)?;
        atomic_write(&self.path, &bytes).map_err(|err| StateError::Write {
            path: self.path.clone(),
            err,
        })
    }
}
