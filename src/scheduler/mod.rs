// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Resolving which stages to run, and running them.

mod error;

pub use error::PipelineError;

use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info, warn};

use crate::{
    dataset::Dataset,
    engine::Engine,
    naming::ArtifactNames,
    params::PipelineParams,
    state::{PipelineState, Staleness},
    steps::{Stage, StageDefinition, StepContext, StepRegistry},
};

/// The stages to run: every catalog entry that was requested or is
/// mandatory, in catalog order. The order of `requested` is irrelevant.
pub fn resolve<T: PartialEq + Clone>(requested: &[T], catalog: &[T], mandatory: &[T]) -> Vec<T> {
    catalog
        .iter()
        .filter(|s| requested.contains(s) || mandatory.contains(s))
        .cloned()
        .collect()
}

/// What a run needs besides the dataset and the persisted state.
pub struct RunContext<'a> {
    pub params: &'a PipelineParams,
    pub names: &'a ArtifactNames,
    pub engine: &'a mut dyn Engine,
    pub progress_bar: bool,
}

/// A stage in the plan, and whether it would run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStage {
    pub stage: Stage,
    pub mandatory: bool,
    /// The persisted completion flag.
    pub completed: bool,
    pub staleness: Staleness,
}

impl PlannedStage {
    pub fn will_run(&self) -> bool {
        self.mandatory || self.staleness.is_needed()
    }
}

/// A stage's declared artifacts, resolved to paths.
struct StageArtifacts {
    /// Compared against the outputs.
    inputs: Vec<PathBuf>,
    /// Must exist before the stage runs.
    required: Vec<PathBuf>,
    outputs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub executed: Vec<Stage>,
    pub skipped: Vec<Stage>,
}

pub struct Scheduler<'a> {
    registry: &'a StepRegistry,
    state: &'a mut PipelineState,
}

impl<'a> Scheduler<'a> {
    pub fn new(registry: &'a StepRegistry, state: &'a mut PipelineState) -> Scheduler<'a> {
        Scheduler { registry, state }
    }

    pub fn plan(&self, requested: &[Stage]) -> Vec<Stage> {
        resolve(
            requested,
            &self.registry.catalog(),
            self.registry.mandatory(),
        )
    }

    fn definition(&self, stage: Stage) -> Result<&'a StageDefinition, PipelineError> {
        self.registry
            .get(stage)
            .ok_or(PipelineError::Unregistered(stage))
    }

    fn artifacts(
        definition: &StageDefinition,
        params: &PipelineParams,
        names: &ArtifactNames,
        dataset: &Dataset,
    ) -> Result<StageArtifacts, PipelineError> {
        Ok(StageArtifacts {
            inputs: definition.resolve_inputs(params, names, dataset)?,
            required: definition.resolve_required(params, names, dataset)?,
            outputs: definition.resolve_outputs(params, names, dataset)?,
        })
    }

    fn staleness(&self, definition: &StageDefinition, artifacts: &StageArtifacts) -> Staleness {
        let upstream: Vec<&str> = definition.after.iter().map(|s| s.name()).collect();
        self.state.stage_staleness(
            definition.stage.name(),
            &upstream,
            &artifacts.inputs,
            &artifacts.outputs,
        )
    }

    /// Describe what a run would do without running anything.
    pub fn inspect(
        &self,
        requested: &[Stage],
        params: &PipelineParams,
        names: &ArtifactNames,
        dataset: &Dataset,
    ) -> Result<Vec<PlannedStage>, PipelineError> {
        let mut planned = vec![];
        for stage in self.plan(requested) {
            let definition = self.definition(stage)?;
            let artifacts = Self::artifacts(definition, params, names, dataset)?;
            planned.push(PlannedStage {
                stage,
                mandatory: self.registry.is_mandatory(stage),
                completed: self.state.is_complete(stage.name()),
                staleness: self.staleness(definition, &artifacts),
            });
        }
        Ok(planned)
    }

    /// Run the resolved stages in order. The first failure stops the run;
    /// the failed stage is left incomplete and later stages aren't
    /// attempted.
    pub fn run(
        &mut self,
        requested: &[Stage],
        dataset: &mut Dataset,
        ctx: RunContext,
    ) -> Result<RunSummary, PipelineError> {
        let RunContext {
            params,
            names,
            engine,
            progress_bar,
        } = ctx;
        let stages = self.plan(requested);
        info!(
            "Stages to consider: {}",
            stages.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
        );
        let bar = make_progress_bar(stages.len(), progress_bar);

        let mut summary = RunSummary::default();
        for stage in stages {
            bar.set_message(stage.name());
            let definition = self.definition(stage)?;
            let artifacts = Self::artifacts(definition, params, names, dataset)?;

            let mandatory = self.registry.is_mandatory(stage);
            if !mandatory {
                let verdict = self.staleness(definition, &artifacts);
                debug!("Stage '{stage}': {verdict}");
                if !verdict.is_needed() {
                    info!("Skipping '{stage}': up to date");
                    summary.skipped.push(stage);
                    bar.inc(1);
                    continue;
                }
                if self.state.is_complete(stage.name()) {
                    info!("'{stage}' completed before, but {verdict}; running it again");
                }
            }

            if let Some(missing) = artifacts.required.iter().find(|p| !p.exists()) {
                self.invalidate(stage);
                bar.abandon();
                return Err(PipelineError::MissingInput {
                    stage,
                    path: missing.clone(),
                });
            }

            info!("Running '{stage}'");
            let mut step_ctx = StepContext {
                dataset: &mut *dataset,
                params,
                names,
                engine: &mut *engine,
            };
            for action in &definition.actions {
                if let Err(err) = action(&mut step_ctx) {
                    self.invalidate(stage);
                    bar.abandon();
                    return Err(PipelineError::Stage { stage, err });
                }
            }

            if let Some(missing) = artifacts.outputs.iter().find(|p| !p.exists()) {
                self.invalidate(stage);
                bar.abandon();
                return Err(PipelineError::OutputNotProduced {
                    stage,
                    path: missing.clone(),
                });
            }
            self.state.mark_complete(stage.name(), &artifacts.outputs)?;
            debug!("'{stage}' complete");
            summary.executed.push(stage);
            bar.inc(1);
        }
        bar.finish_with_message("done");
        Ok(summary)
    }

    fn invalidate(&mut self, stage: Stage) {
        if let Err(e) = self.state.clear(stage.name()) {
            warn!("Couldn't mark '{stage}' as incomplete: {e}");
        }
    }
}

fn make_progress_bar(num_stages: usize, visible: bool) -> ProgressBar {
    ProgressBar::with_draw_target(
        Some(num_stages as _),
        if visible {
            // Log messages also go to stdout.
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        },
    )
    .with_style(
        ProgressStyle::default_bar()
            .template("{msg:20}: [{wide_bar:.blue}] {pos:2}/{len:2} stages ({elapsed_precise})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    )
    .with_position(0)
}
