// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parameters for a pipeline run. These are produced from user arguments
//! (see `crate::cli`) and are fully validated; nothing downstream needs to
//! re-check them.

mod spw;

pub use spw::{ChannelFraction, SpwError, SpwSelection};

use std::path::PathBuf;

use indexmap::IndexMap;
use itertools::Itertools;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use vec1::Vec1;

use crate::{
    engine::{CommandEngine, TaskParams},
    flagging::FlaggingParams,
    imaging::Imager,
    steps::Stage,
};

#[derive(Debug, Clone)]
pub struct PipelineParams {
    /// The input measurement set.
    pub ms: PathBuf,

    /// Prefix for everything written.
    pub project: String,

    pub outdir: PathBuf,

    /// The stages the user asked for. The stages actually run are resolved
    /// against the catalog; see [`crate::scheduler::resolve`].
    pub steps: Vec<Stage>,

    pub imager: Imager,

    pub state_file: PathBuf,

    pub ref_ant: Option<String>,

    pub spw_flagging: Option<SpwSelection>,

    pub spw_gaincal: Option<SpwSelection>,

    pub sources: Sources,

    /// Only present when self-calibration was configured.
    pub selfcal: Option<SelfCalParams>,

    pub flagging: FlaggingParams,

    pub engine: EngineParams,

    pub tasks: TaskSections,
}

impl PipelineParams {
    /// The engine described by these parameters.
    pub fn command_engine(&self) -> Option<CommandEngine> {
        self.engine
            .program
            .as_ref()
            .map(|p| CommandEngine::new(p, self.engine.args.clone()))
    }
}

/// The roles sources play. Names are unique within each list.
#[derive(Debug, Clone)]
pub struct Sources {
    /// Flux-density (amplitude) calibrators.
    pub amp_calibrators: Vec1<String>,

    pub bandpass_calibrators: Vec1<String>,

    /// May be empty, in which case the targets are used for gain transfer.
    pub phase_calibrators: Vec<String>,

    pub targets: Vec1<String>,
}

impl Sources {
    /// All calibrators, each once, amplitude calibrators first.
    pub fn calibrators(&self) -> Vec<String> {
        self.amp_calibrators
            .iter()
            .chain(self.bandpass_calibrators.iter())
            .chain(self.phase_calibrators.iter())
            .unique()
            .cloned()
            .collect()
    }

    /// Every configured source, each once, calibrators first.
    pub fn all(&self) -> Vec<String> {
        self.calibrators()
            .into_iter()
            .chain(self.targets.iter().cloned())
            .unique()
            .collect()
    }

    /// The sources the amplitude solution is transferred to: the phase
    /// calibrators, or the targets if there are none.
    pub fn transfer_fields(&self) -> Vec<String> {
        if self.phase_calibrators.is_empty() {
            self.targets.to_vec()
        } else {
            self.phase_calibrators.clone()
        }
    }

    /// The sources complex gains are solved on.
    pub fn gain_fields(&self) -> Vec<String> {
        self.amp_calibrators
            .iter()
            .cloned()
            .chain(self.transfer_fields())
            .unique()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelfCalParams {
    /// The number of phase-only cycles.
    pub pcycles: usize,

    /// The number of amplitude-and-phase cycles.
    pub apcycles: usize,

    /// One solution interval per cycle, including the final phase-only
    /// cycle.
    pub solints: Vec1<String>,

    /// Adopt cycles whose artifacts already exist instead of redoing them.
    pub resume: bool,
}

impl SelfCalParams {
    /// The number of solution intervals a loop consumes.
    pub fn num_cycles(&self) -> usize {
        self.pcycles + self.apcycles + 1
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineParams {
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
}

/// The engine tasks whose parameters can be supplied in an arguments file
/// (`[tasks.<name>]`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr,
)]
pub enum TaskSection {
    #[strum(serialize = "inspect")]
    Inspect,

    #[strum(serialize = "setjy")]
    Setjy,

    #[strum(serialize = "gaincal_K")]
    GaincalK,

    #[strum(serialize = "gaincal_G")]
    GaincalG,

    #[strum(serialize = "bandpass")]
    Bandpass,

    #[strum(serialize = "fluxscale")]
    Fluxscale,

    #[strum(serialize = "applycal")]
    Applycal,

    #[strum(serialize = "split")]
    Split,

    #[strum(serialize = "tclean")]
    Tclean,

    #[strum(serialize = "wsclean")]
    Wsclean,

    #[strum(serialize = "flag_clip")]
    FlagClip,

    #[strum(serialize = "flag_zerochan")]
    FlagZerochan,

    #[strum(serialize = "flag_badchan")]
    FlagBadchan,

    #[strum(serialize = "flag_quack")]
    FlagQuack,

    #[strum(serialize = "flag_tfcrop")]
    FlagTfcrop,

    #[strum(serialize = "flag_rflag")]
    FlagRflag,

    #[strum(serialize = "flag_extend")]
    FlagExtend,

    #[strum(serialize = "flag_aoflagger")]
    FlagAoflagger,
}

/// User-supplied engine parameters per task.
#[derive(Debug, Clone, Default)]
pub struct TaskSections(IndexMap<TaskSection, TaskParams>);

impl TaskSections {
    pub fn new(sections: IndexMap<TaskSection, TaskParams>) -> TaskSections {
        TaskSections(sections)
    }

    /// The parameters for a task, or nothing if none were given.
    pub fn get(&self, section: TaskSection) -> TaskParams {
        self.0.get(&section).cloned().unwrap_or_default()
    }

    pub fn insert(&mut self, section: TaskSection, params: TaskParams) {
        self.0.insert(section, params);
    }

    pub fn sections(&self) -> impl Iterator<Item = TaskSection> + '_ {
        self.0.keys().copied()
    }
}
