// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The self-calibration loop.
//!
//! For each target, a number of phase-only cycles is followed by a number of
//! amplitude-and-phase cycles and a single final phase-only cycle. Every
//! cycle consumes the next solution interval, solves against the current
//! model while applying every table the loop has made so far, appends its
//! table to the target's chain, applies the whole chain and re-images. A
//! target-only flagging pass runs after each non-empty block of cycles.
//!
//! ```text
//! Init -> PhaseCycle(0..N_p) -> AmpPhaseCycle(0..N_ap) -> FinalPhase -> Done
//!   \__________________________\______________________________\-----> Error
//! ```

mod error;

pub use error::SelfCalError;

use std::{
    fmt,
    path::{Path, PathBuf},
};

use log::{debug, info};
use strum_macros::{Display, IntoStaticStr};
use vec1::Vec1;

use crate::{
    dataset::{paths_of, CalTable, Dataset},
    engine::{
        clear_stale_output, run_task, Engine, EngineError, EngineRequest, EngineTask, ParamValue,
    },
    flagging,
    imaging::make_image,
    naming::{Artifact, ArtifactNames, NamingError},
    params::{PipelineParams, SelfCalParams, TaskSection},
    steps::{SourceGroup, StepContext, StepError},
};

/// One cycle of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cycle {
    Phase(usize),
    AmpPhase(usize),
    Final,
}

impl Cycle {
    /// The short tag used in artifact names.
    pub fn tag(self) -> String {
        match self {
            Cycle::Phase(i) => format!("p{i}"),
            Cycle::AmpPhase(j) => format!("ap{j}"),
            Cycle::Final => "final".to_string(),
        }
    }

    pub fn calmode(self) -> CalMode {
        match self {
            Cycle::Phase(_) | Cycle::Final => CalMode::Phase,
            Cycle::AmpPhase(_) => CalMode::AmpPhase,
        }
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cycle::Phase(i) => write!(f, "phase cycle {i}"),
            Cycle::AmpPhase(j) => write!(f, "amplitude-phase cycle {j}"),
            Cycle::Final => write!(f, "final phase cycle"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum CalMode {
    #[strum(serialize = "p")]
    Phase,

    #[strum(serialize = "ap")]
    AmpPhase,
}

/// A cursor over an immutable sequence of solution intervals.
#[derive(Debug, Clone)]
pub struct SolintSchedule {
    solints: Vec1<String>,
    consumed: usize,
}

impl SolintSchedule {
    pub fn new(solints: Vec1<String>) -> SolintSchedule {
        SolintSchedule {
            solints,
            consumed: 0,
        }
    }

    /// Consume the next solution interval.
    pub fn next_solint(&mut self) -> Result<&str, SelfCalError> {
        let solint = self
            .solints
            .get(self.consumed)
            .ok_or(SelfCalError::SolintsExhausted {
                len: self.solints.len(),
            })?;
        self.consumed += 1;
        Ok(solint)
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn remaining(&self) -> usize {
        self.solints.len() - self.consumed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    Init,
    PhaseCycle(usize),
    AmpPhaseCycle(usize),
    FinalPhase,
    Done,
    Error { last_completed: Option<Cycle> },
}

impl From<Cycle> for LoopState {
    fn from(cycle: Cycle) -> LoopState {
        match cycle {
            Cycle::Phase(i) => LoopState::PhaseCycle(i),
            Cycle::AmpPhase(j) => LoopState::AmpPhaseCycle(j),
            Cycle::Final => LoopState::FinalPhase,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleRecord {
    pub cycle: Cycle,
    pub solint: String,
    pub table: PathBuf,
    pub image: PathBuf,
    /// Whether the cycle's artifacts were found on disk rather than made.
    pub adopted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfCalReport {
    pub target: String,
    pub cycles: Vec<CycleRecord>,
}

/// The loop for a single target.
pub struct SelfCalLoop<'a> {
    target: String,
    config: &'a SelfCalParams,
    params: &'a PipelineParams,
    names: &'a ArtifactNames,
    schedule: SolintSchedule,
    state: LoopState,
    records: Vec<CycleRecord>,
}

impl<'a> SelfCalLoop<'a> {
    /// Set up a loop. Fails if the number of solution intervals doesn't match
    /// the number of cycles, before anything touches the engine.
    pub fn new(
        target: &str,
        params: &'a PipelineParams,
        names: &'a ArtifactNames,
    ) -> Result<SelfCalLoop<'a>, SelfCalError> {
        let config = params.selfcal.as_ref().ok_or(SelfCalError::NotConfigured)?;
        if config.solints.len() != config.num_cycles() {
            return Err(SelfCalError::SolintCount {
                pcycles: config.pcycles,
                apcycles: config.apcycles,
                expected: config.num_cycles(),
                got: config.solints.len(),
            });
        }
        names.source_dir(target)?;

        Ok(SelfCalLoop {
            target: target.to_string(),
            config,
            params,
            names,
            schedule: SolintSchedule::new(config.solints.clone()),
            state: LoopState::Init,
            records: vec![],
        })
    }

    /// The cycles this loop runs, in order.
    pub fn cycles(&self) -> Vec<Cycle> {
        (0..self.config.pcycles)
            .map(Cycle::Phase)
            .chain((0..self.config.apcycles).map(Cycle::AmpPhase))
            .chain(std::iter::once(Cycle::Final))
            .collect()
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn schedule(&self) -> &SolintSchedule {
        &self.schedule
    }

    /// The target-only flagging pass runs before the first cycle after a
    /// non-empty block.
    fn flags_before(&self, cycle: Cycle) -> bool {
        match cycle {
            Cycle::AmpPhase(0) => self.config.pcycles > 0,
            Cycle::Final => self.config.pcycles + self.config.apcycles > 0,
            _ => false,
        }
    }

    fn last_completed(&self) -> Option<Cycle> {
        self.records.last().map(|r| r.cycle)
    }

    /// Enter the error state with an error that isn't tied to an engine
    /// call.
    fn abort<E: Into<SelfCalError>>(&mut self, err: E) -> SelfCalError {
        self.state = LoopState::Error {
            last_completed: self.last_completed(),
        };
        err.into()
    }

    fn fail(&mut self, cycle: Cycle, split: &Dataset, err: EngineError) -> SelfCalError {
        let last_completed = self.last_completed();
        self.state = LoopState::Error { last_completed };
        SelfCalError::Cycle {
            target: self.target.clone(),
            cycle,
            last_completed,
            tables: split.calibration_tables().paths(),
            err,
        }
    }

    /// Run every cycle on `split`, the target's own dataset.
    pub fn run(
        &mut self,
        split: &mut Dataset,
        engine: &mut dyn Engine,
    ) -> Result<SelfCalReport, SelfCalError> {
        let mut resuming = self.config.resume;
        for cycle in self.cycles() {
            self.state = cycle.into();
            let solint = match self.schedule.next_solint() {
                Ok(s) => s.to_string(),
                Err(e) => return Err(self.abort(e)),
            };
            let (table, base) = match self.cycle_paths(cycle) {
                Ok(paths) => paths,
                Err(e) => return Err(self.abort(e)),
            };
            let image = self.names.imager().product(&base);

            if resuming && table.exists() && image.exists() {
                info!("{}: keeping the existing {cycle}", self.target);
                split.add_calibration_table(CalTable::selfcal(cycle, table.clone()));
                self.records.push(CycleRecord {
                    cycle,
                    solint,
                    table,
                    image,
                    adopted: true,
                });
                continue;
            }
            resuming = false;

            if self.flags_before(cycle) {
                let summary = self
                    .names
                    .resolve(
                        Artifact::SelfCalFlagSummary,
                        Some(self.target.as_str()),
                        Some(cycle),
                    )
                    .map_err(|e| self.abort(e))?;
                let target = [self.target.clone()];
                flagging::run_pass(engine, split, self.params, &target, &summary)
                    .map_err(|e| self.fail(cycle, split, e))?;
            }

            info!("{}: {cycle} (solint {solint})", self.target);
            self.run_cycle(cycle, &solint, &table, &base, split, engine)
                .map_err(|e| self.fail(cycle, split, e))?;
            self.records.push(CycleRecord {
                cycle,
                solint,
                table,
                image,
                adopted: false,
            });
        }
        self.state = LoopState::Done;
        debug!(
            "{}: self-calibration done; {} solution intervals left",
            self.target,
            self.schedule.remaining()
        );

        Ok(SelfCalReport {
            target: self.target.clone(),
            cycles: self.records.clone(),
        })
    }

    /// The cycle's table and image base name.
    fn cycle_paths(&self, cycle: Cycle) -> Result<(PathBuf, PathBuf), NamingError> {
        Ok((
            self.names.selfcal_table(&self.target, cycle)?,
            self.names.image_base(&self.target, Some(cycle))?,
        ))
    }

    fn run_cycle(
        &self,
        cycle: Cycle,
        solint: &str,
        table: &Path,
        base: &Path,
        split: &mut Dataset,
        engine: &mut dyn Engine,
    ) -> Result<(), EngineError> {
        let tasks = &self.params.tasks;
        let vis = split.path().to_path_buf();
        let cal_table = CalTable::selfcal(cycle, table.to_path_buf());

        clear_stale_output(table)?;
        let prior = paths_of(split.calibration_tables().prefix_before(&cal_table.name));
        let mut solve = EngineRequest::new(EngineTask::Gaincal, &vis)
            .with_params(tasks.get(TaskSection::GaincalG))
            .param("caltable", table)
            .param("calmode", cycle.calmode().to_string())
            .param("solint", solint)
            .param("gaintable", ParamValue::paths(&prior))
            .expect(table);
        if let Some(refant) = &self.params.ref_ant {
            solve = solve.default_param("refant", refant.as_str());
        }
        run_task(engine, solve)?;
        split.add_calibration_table(cal_table);

        run_task(
            engine,
            EngineRequest::new(EngineTask::Applycal, &vis)
                .with_params(tasks.get(TaskSection::Applycal))
                .param("gaintable", ParamValue::paths(&split.calibration_tables().paths())),
        )?;

        make_image(engine, self.names.imager(), &vis, base, tasks)?;
        Ok(())
    }
}

/// Stage action: self-calibrate every target.
pub fn selfcal_targets(ctx: &mut StepContext) -> Result<(), StepError> {
    let targets = SourceGroup::Targets.sources(ctx.params, ctx.dataset);
    // Set up every loop first so that bad parameters are caught before any
    // target is touched.
    let mut loops = targets
        .iter()
        .map(|t| SelfCalLoop::new(t, ctx.params, ctx.names))
        .collect::<Result<Vec<_>, _>>()?;

    for selfcal in loops.iter_mut() {
        let split_path = ctx.names.split(&selfcal.target)?;
        let mut split = Dataset::open(&split_path, &selfcal.target, ctx.engine)?;
        let report = selfcal.run(&mut split, ctx.engine)?;
        for record in &report.cycles {
            info!(
                "{}: {} solint {} -> {}{}",
                report.target,
                record.cycle,
                record.solint,
                record.image.display(),
                if record.adopted { " (existing)" } else { "" }
            );
        }
    }
    Ok(())
}
