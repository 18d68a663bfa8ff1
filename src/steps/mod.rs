// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The closed catalog of pipeline stages and the registry binding each stage
//! to its actions and declared artifacts.
//!
//! The catalog's order is the execution order. There is no dependency graph;
//! the order already follows the physical flow of the data (inspect, flag,
//! calibrate, split, image).

mod error;

pub use error::StepError;

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    calibration,
    dataset::Dataset,
    engine::Engine,
    flagging::{self, FlagScope},
    imaging,
    naming::{Artifact, ArtifactNames, NamingError, StandardTable},
    params::PipelineParams,
    selfcal::{self, Cycle},
};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Inspect,
    GetCaltables,
    InitialFlagging,
    Calibration,
    Bandpass,
    SecondCalibration,
    Fluxscale,
    Applycal,
    PostcalFlagging,
    Split,
    Clean,
    Selfcal,
}

impl Stage {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// Which configured sources a per-source pattern covers. Sources that aren't
/// in the dataset are never covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceGroup {
    All,
    Targets,
}

impl SourceGroup {
    pub fn sources(self, params: &PipelineParams, dataset: &Dataset) -> Vec<String> {
        let configured = match self {
            SourceGroup::All => params.sources.all(),
            SourceGroup::Targets => params.sources.targets.to_vec(),
        };
        configured
            .into_iter()
            .filter(|s| dataset.has_source(s))
            .collect()
    }
}

/// A declared stage input or output, resolved to concrete paths once the
/// parameters and the dataset are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactPattern {
    /// The input measurement set itself.
    Dataset,
    Listobs,
    AntennaPlot,
    FlagSummary(FlagScope),
    CalTable(StandardTable),
    Split(SourceGroup),
    Image(SourceGroup),
    /// The final self-calibration table and image of every target.
    SelfCalFinal,
}

impl ArtifactPattern {
    pub fn resolve(
        self,
        params: &PipelineParams,
        names: &ArtifactNames,
        dataset: &Dataset,
    ) -> Result<Vec<PathBuf>, NamingError> {
        let single = |a: Artifact| names.resolve(a, None, None).map(|p| vec![p]);
        match self {
            ArtifactPattern::Dataset => Ok(vec![dataset.path().to_path_buf()]),
            ArtifactPattern::Listobs => single(Artifact::Listobs),
            ArtifactPattern::AntennaPlot => single(Artifact::AntennaPlot),
            ArtifactPattern::FlagSummary(scope) => single(Artifact::FlagSummary(scope)),
            ArtifactPattern::CalTable(t) => single(Artifact::CalTable(t)),
            ArtifactPattern::Split(group) => group
                .sources(params, dataset)
                .iter()
                .map(|s| names.split(s))
                .collect(),
            ArtifactPattern::Image(group) => group
                .sources(params, dataset)
                .iter()
                .map(|s| names.image(s, None))
                .collect(),
            ArtifactPattern::SelfCalFinal => {
                let mut paths = vec![];
                for target in SourceGroup::Targets.sources(params, dataset) {
                    paths.push(names.selfcal_table(&target, Cycle::Final)?);
                    paths.push(names.image(&target, Some(Cycle::Final))?);
                }
                Ok(paths)
            }
        }
    }
}

/// Everything an action may touch. Passed explicitly; there is no global
/// pipeline state.
pub struct StepContext<'a> {
    pub dataset: &'a mut Dataset,
    pub params: &'a PipelineParams,
    pub names: &'a ArtifactNames,
    pub engine: &'a mut dyn Engine,
}

pub type StepAction = fn(&mut StepContext) -> Result<(), StepError>;

/// A stage and what it depends on.
///
/// Only `inputs` and `optional_inputs` take part in the timestamp
/// comparison. Datasets that later stages write into in place (the
/// measurement set, the splits) go in `requires`: they must exist, but their
/// modification times say nothing about this stage's outputs. Work on those
/// is chained with `after` instead.
pub struct StageDefinition {
    pub stage: Stage,
    pub actions: Vec<StepAction>,
    /// Must exist, and mustn't be newer than the outputs.
    pub inputs: Vec<ArtifactPattern>,
    /// Mustn't be newer than the outputs, when they exist.
    pub optional_inputs: Vec<ArtifactPattern>,
    /// Must exist.
    pub requires: Vec<ArtifactPattern>,
    /// The stage is out of date when one of these completed after it did.
    pub after: Vec<Stage>,
    pub outputs: Vec<ArtifactPattern>,
}

impl StageDefinition {
    pub fn new(stage: Stage) -> StageDefinition {
        StageDefinition {
            stage,
            actions: vec![],
            inputs: vec![],
            optional_inputs: vec![],
            requires: vec![],
            after: vec![],
            outputs: vec![],
        }
    }

    pub fn action(mut self, action: StepAction) -> StageDefinition {
        self.actions.push(action);
        self
    }

    pub fn input(mut self, pattern: ArtifactPattern) -> StageDefinition {
        self.inputs.push(pattern);
        self
    }

    pub fn optional_input(mut self, pattern: ArtifactPattern) -> StageDefinition {
        self.optional_inputs.push(pattern);
        self
    }

    pub fn requires(mut self, pattern: ArtifactPattern) -> StageDefinition {
        self.requires.push(pattern);
        self
    }

    pub fn after(mut self, stage: Stage) -> StageDefinition {
        self.after.push(stage);
        self
    }

    pub fn output(mut self, pattern: ArtifactPattern) -> StageDefinition {
        self.outputs.push(pattern);
        self
    }

    /// Everything whose modification time is compared against the outputs.
    pub fn resolve_inputs(
        &self,
        params: &PipelineParams,
        names: &ArtifactNames,
        dataset: &Dataset,
    ) -> Result<Vec<PathBuf>, NamingError> {
        let mut paths = resolve_all(&self.inputs, params, names, dataset)?;
        paths.extend(resolve_all(&self.optional_inputs, params, names, dataset)?);
        Ok(paths)
    }

    /// Everything that has to exist before the stage can run.
    pub fn resolve_required(
        &self,
        params: &PipelineParams,
        names: &ArtifactNames,
        dataset: &Dataset,
    ) -> Result<Vec<PathBuf>, NamingError> {
        let mut paths = resolve_all(&self.requires, params, names, dataset)?;
        paths.extend(resolve_all(&self.inputs, params, names, dataset)?);
        Ok(paths)
    }

    pub fn resolve_outputs(
        &self,
        params: &PipelineParams,
        names: &ArtifactNames,
        dataset: &Dataset,
    ) -> Result<Vec<PathBuf>, NamingError> {
        resolve_all(&self.outputs, params, names, dataset)
    }
}

fn resolve_all(
    patterns: &[ArtifactPattern],
    params: &PipelineParams,
    names: &ArtifactNames,
    dataset: &Dataset,
) -> Result<Vec<PathBuf>, NamingError> {
    let mut paths = vec![];
    for pattern in patterns {
        paths.extend(pattern.resolve(params, names, dataset)?);
    }
    Ok(paths)
}

#[derive(Default)]
pub struct StepRegistry {
    stages: IndexMap<Stage, StageDefinition>,
    mandatory: Vec<Stage>,
}

impl StepRegistry {
    pub fn new() -> StepRegistry {
        StepRegistry::default()
    }

    pub fn register(&mut self, definition: StageDefinition) -> Result<(), StepError> {
        if self.stages.contains_key(&definition.stage) {
            return Err(StepError::DuplicateStage(definition.stage));
        }
        self.stages.insert(definition.stage, definition);
        Ok(())
    }

    /// Mandatory stages run on every invocation, whether or not they were
    /// requested and whether or not they look up to date.
    pub fn make_mandatory(&mut self, stage: Stage) -> Result<(), StepError> {
        if !self.stages.contains_key(&stage) {
            return Err(StepError::Unregistered(stage));
        }
        if !self.mandatory.contains(&stage) {
            self.mandatory.push(stage);
        }
        Ok(())
    }

    pub fn get(&self, stage: Stage) -> Option<&StageDefinition> {
        self.stages.get(&stage)
    }

    pub fn mandatory(&self) -> &[Stage] {
        &self.mandatory
    }

    pub fn is_mandatory(&self, stage: Stage) -> bool {
        self.mandatory.contains(&stage)
    }

    /// The registered stages in catalog order.
    pub fn catalog(&self) -> Vec<Stage> {
        Stage::iter()
            .filter(|s| self.stages.contains_key(s))
            .collect()
    }

    /// The full pipeline.
    pub fn standard() -> Result<StepRegistry, StepError> {
        use ArtifactPattern as P;

        let mut registry = StepRegistry::new();
        let definitions = [
            StageDefinition::new(Stage::Inspect)
                .action(calibration::inspect)
                .requires(P::Dataset)
                .output(P::Listobs)
                .output(P::AntennaPlot),
            StageDefinition::new(Stage::GetCaltables).action(calibration::load_existing_tables),
            StageDefinition::new(Stage::InitialFlagging)
                .action(flagging::flag_calibrators)
                .requires(P::Dataset)
                .output(P::FlagSummary(FlagScope::Calibrators)),
            StageDefinition::new(Stage::Calibration)
                .action(calibration::first_pass)
                .requires(P::Dataset)
                .optional_input(P::FlagSummary(FlagScope::Calibrators))
                .after(Stage::InitialFlagging)
                .output(P::CalTable(StandardTable::GainK))
                .output(P::CalTable(StandardTable::GainG)),
            StageDefinition::new(Stage::Bandpass)
                .action(calibration::bandpass)
                .input(P::CalTable(StandardTable::GainK))
                .input(P::CalTable(StandardTable::GainG))
                .output(P::CalTable(StandardTable::Bandpass)),
            StageDefinition::new(Stage::SecondCalibration)
                .action(calibration::second_pass)
                .input(P::CalTable(StandardTable::Bandpass))
                .optional_input(P::CalTable(StandardTable::GainK))
                .optional_input(P::CalTable(StandardTable::GainG))
                .output(P::CalTable(StandardTable::GainK2))
                .output(P::CalTable(StandardTable::GainG2)),
            StageDefinition::new(Stage::Fluxscale)
                .action(calibration::fluxscale)
                .input(P::CalTable(StandardTable::GainG))
                // Bootstrapped from the second pass's gains when there are any.
                .optional_input(P::CalTable(StandardTable::GainG2))
                .optional_input(P::CalTable(StandardTable::Bandpass))
                .output(P::CalTable(StandardTable::Fluxscale)),
            StageDefinition::new(Stage::Applycal)
                .action(calibration::apply)
                .requires(P::Dataset)
                .input(P::CalTable(StandardTable::Fluxscale)),
            StageDefinition::new(Stage::PostcalFlagging)
                .action(flagging::flag_targets)
                .requires(P::Dataset)
                .optional_input(P::CalTable(StandardTable::Fluxscale))
                .output(P::FlagSummary(FlagScope::Targets)),
            StageDefinition::new(Stage::Split)
                .action(calibration::split_sources)
                .requires(P::Dataset)
                .input(P::CalTable(StandardTable::Fluxscale))
                .optional_input(P::FlagSummary(FlagScope::Targets))
                .after(Stage::PostcalFlagging)
                .output(P::Split(SourceGroup::All)),
            // Self-calibration writes into the target splits, so images are
            // chained on the split stage rather than on the splits' ages.
            StageDefinition::new(Stage::Clean)
                .action(imaging::clean)
                .requires(P::Split(SourceGroup::All))
                .after(Stage::Split)
                .output(P::Image(SourceGroup::All)),
            StageDefinition::new(Stage::Selfcal)
                .action(selfcal::selfcal_targets)
                .requires(P::Split(SourceGroup::Targets))
                .input(P::Image(SourceGroup::Targets))
                .after(Stage::Split)
                .output(P::SelfCalFinal),
        ];
        for definition in definitions {
            registry.register(definition)?;
        }
        registry.make_mandatory(Stage::GetCaltables)?;
        Ok(registry)
    }
}
