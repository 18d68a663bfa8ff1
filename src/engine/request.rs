// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// The operations the engine provides.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum EngineTask {
    Msmetadata,
    Listobs,
    Plotants,
    Flagdata,
    Aoflagger,
    Setjy,
    Gaincal,
    Bandpass,
    Fluxscale,
    Applycal,
    Split,
    Tclean,
    Wsclean,
}

/// A task parameter. These are passed through to the engine untouched, so
/// anything expressible in an arguments file is allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// A comma-separated list, as the engine expects for field selections.
    pub fn joined<S: AsRef<str>>(items: &[S]) -> ParamValue {
        ParamValue::Str(
            items
                .iter()
                .map(|s| s.as_ref())
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    pub fn paths<P: AsRef<Path>>(paths: &[P]) -> ParamValue {
        ParamValue::List(paths.iter().map(|p| ParamValue::from(p.as_ref())).collect())
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<&Path> for ParamValue {
    fn from(v: &Path) -> Self {
        ParamValue::Str(v.display().to_string())
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::List(v.into_iter().map(ParamValue::Str).collect())
    }
}

/// Named task parameters, in the order they were given.
pub type TaskParams = IndexMap<String, ParamValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineRequest {
    pub task: EngineTask,
    pub vis: PathBuf,
    pub params: TaskParams,

    /// Files or directories that must exist once the task succeeds.
    pub expected_outputs: Vec<PathBuf>,
}

impl EngineRequest {
    pub fn new<P: AsRef<Path>>(task: EngineTask, vis: P) -> EngineRequest {
        EngineRequest {
            task,
            vis: vis.as_ref().to_path_buf(),
            params: TaskParams::new(),
            expected_outputs: vec![],
        }
    }

    /// Start from user-supplied parameters for this task.
    pub fn with_params(mut self, params: TaskParams) -> EngineRequest {
        self.params = params;
        self
    }

    /// Set a parameter, overriding anything the user supplied.
    pub fn param<K: Into<String>, V: Into<ParamValue>>(mut self, key: K, value: V) -> EngineRequest {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set a parameter only if the user didn't.
    pub fn default_param<K: Into<String>, V: Into<ParamValue>>(
        mut self,
        key: K,
        value: V,
    ) -> EngineRequest {
        self.params.entry(key.into()).or_insert_with(|| value.into());
        self
    }

    pub fn expect<P: AsRef<Path>>(mut self, output: P) -> EngineRequest {
        self.expected_outputs.push(output.as_ref().to_path_buf());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutcome {
    pub success: bool,
    pub outputs: Vec<PathBuf>,
    pub message: Option<String>,
}

impl EngineOutcome {
    pub fn succeeded(outputs: Vec<PathBuf>) -> EngineOutcome {
        EngineOutcome {
            success: true,
            outputs,
            message: None,
        }
    }

    pub fn failed<S: Into<String>>(message: S) -> EngineOutcome {
        EngineOutcome {
            success: false,
            outputs: vec![],
            message: Some(message.into()),
        }
    }
}
