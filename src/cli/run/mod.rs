// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parse pipeline arguments into parameters, then run the pipeline (or
//! report on, or reset, what earlier runs left behind).


use std::{borrow::Cow, path::PathBuf, str::FromStr};

use clap::Parser;
use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use thiserror::Error;
use vec1::Vec1;

use super::common::{
    one_or_many, string_or_number, InfoPrinter, WarningPrinter, ARG_FILE_HELP, IMAGER_HELP,
    STAGES_COMMA_SEPARATED, STEPS_HELP, TASK_SECTIONS_COMMA_SEPARATED,
};
use crate::{
    dataset::Dataset,
    engine::{CommandEngine, TaskParams},
    flagging::FlaggingParams,
    imaging::Imager,
    io::create_output_tree,
    naming::{validate_identifier, ArtifactNames, NamingError},
    params::{
        EngineParams, PipelineParams, SelfCalParams, Sources, SpwError, SpwSelection, TaskSection,
        TaskSections,
    },
    scheduler::{resolve, RunContext, Scheduler},
    state::{PipelineState, DEFAULT_STATE_FILE},
    steps::{Stage, StepRegistry},
    CagaError,
};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct PipelineArgs {
    /// The measurement set to reduce.
    #[clap(long, help_heading = "PIPELINE")]
    pub(super) ms: Option<PathBuf>,

    /// The prefix of every file written. Default: the name of the measurement
    /// set without its extension.
    #[clap(short, long, help_heading = "PIPELINE")]
    pub(super) project: Option<String>,

    /// The directory everything is written to. Default: the current
    /// directory.
    #[clap(short, long, help_heading = "PIPELINE")]
    pub(super) outdir: Option<PathBuf>,

    #[clap(short, long, multiple_values(true), help = STEPS_HELP.as_str(), help_heading = "PIPELINE")]
    #[serde(default, deserialize_with = "one_or_many")]
    pub(super) steps: Option<Vec<String>>,

    #[clap(long, help = IMAGER_HELP.as_str(), help_heading = "PIPELINE")]
    pub(super) imager: Option<String>,

    /// The file recording which stages have completed. Default:
    /// .caga_state.json in the output directory.
    #[clap(long, help_heading = "PIPELINE")]
    pub(super) state_file: Option<PathBuf>,

    /// The reference antenna for calibration solves.
    #[clap(long, help_heading = "CALIBRATION")]
    pub(super) ref_ant: Option<String>,

    /// The channels flagged by the bad-channel method. Either a selection in
    /// the engine's syntax, or a fraction of channels to cut from each edge
    /// (e.g. 0.1), or fractional ranges per sub-band (e.g. 0:0.1~0.2).
    #[clap(long, help_heading = "FLAGGING")]
    #[serde(default, deserialize_with = "string_or_number")]
    pub(super) spw_flagging: Option<String>,

    /// The channels used for gain solves. Same syntax as --spw-flagging.
    #[clap(long, help_heading = "CALIBRATION")]
    #[serde(default, deserialize_with = "string_or_number")]
    pub(super) spw_gaincal: Option<String>,
}

impl PipelineArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            ms: self.ms.or(other.ms),
            project: self.project.or(other.project),
            outdir: self.outdir.or(other.outdir),
            steps: self.steps.or(other.steps),
            imager: self.imager.or(other.imager),
            state_file: self.state_file.or(other.state_file),
            ref_ant: self.ref_ant.or(other.ref_ant),
            spw_flagging: self.spw_flagging.or(other.spw_flagging),
            spw_gaincal: self.spw_gaincal.or(other.spw_gaincal),
        }
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct SourceArgs {
    /// The flux-density (amplitude) calibrators.
    #[clap(long, multiple_values(true), help_heading = "SOURCES")]
    #[serde(default, deserialize_with = "one_or_many")]
    pub(super) amp_calibrators: Option<Vec<String>>,

    /// The bandpass calibrators. Default: the amplitude calibrators.
    #[clap(long, multiple_values(true), help_heading = "SOURCES")]
    #[serde(default, deserialize_with = "one_or_many")]
    pub(super) bandpass_calibrators: Option<Vec<String>>,

    /// The phase calibrators. If there are none, gain solutions are
    /// transferred to the targets directly.
    #[clap(long, multiple_values(true), help_heading = "SOURCES")]
    #[serde(default, deserialize_with = "one_or_many")]
    pub(super) phase_calibrators: Option<Vec<String>>,

    #[clap(long, multiple_values(true), help_heading = "SOURCES")]
    #[serde(default, deserialize_with = "one_or_many")]
    pub(super) targets: Option<Vec<String>>,
}

impl SourceArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            amp_calibrators: self.amp_calibrators.or(other.amp_calibrators),
            bandpass_calibrators: self.bandpass_calibrators.or(other.bandpass_calibrators),
            phase_calibrators: self.phase_calibrators.or(other.phase_calibrators),
            targets: self.targets.or(other.targets),
        }
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct SelfCalArgs {
    /// The number of phase-only self-calibration cycles. Default: 0
    #[clap(long, help_heading = "SELF-CALIBRATION")]
    pub(super) pcycles: Option<usize>,

    /// The number of amplitude-and-phase self-calibration cycles. Default: 0
    #[clap(long, help_heading = "SELF-CALIBRATION")]
    pub(super) apcycles: Option<usize>,

    /// The solution interval of each cycle, in order. A final phase-only
    /// cycle always runs, so one more interval than the number of cycles is
    /// needed.
    #[clap(long, multiple_values(true), help_heading = "SELF-CALIBRATION")]
    #[serde(default, deserialize_with = "one_or_many")]
    pub(super) solints: Option<Vec<String>>,

    /// Keep the leading cycles whose table and image already exist.
    #[clap(long = "selfcal-resume", help_heading = "SELF-CALIBRATION")]
    #[serde(default)]
    pub(super) resume: bool,
}

impl SelfCalArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            pcycles: self.pcycles.or(other.pcycles),
            apcycles: self.apcycles.or(other.apcycles),
            solints: self.solints.or(other.solints),
            resume: self.resume || other.resume,
        }
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct FlaggingArgs {
    /// Clip visibilities with outlying amplitudes.
    #[clap(long = "flag-clip", help_heading = "FLAGGING")]
    #[serde(default)]
    pub(super) clip: bool,

    /// Flag the first channel of every sub-band.
    #[clap(long = "flag-zerochan", help_heading = "FLAGGING")]
    #[serde(default)]
    pub(super) zerochan: bool,

    /// Flag the channels given by --spw-flagging.
    #[clap(long = "flag-badchan", help_heading = "FLAGGING")]
    #[serde(default)]
    pub(super) badchan: bool,

    /// Flag the start and end of every scan.
    #[clap(long = "flag-quack", help_heading = "FLAGGING")]
    #[serde(default)]
    pub(super) quack: bool,

    #[clap(long = "flag-tfcrop", help_heading = "FLAGGING")]
    #[serde(default)]
    pub(super) tfcrop: bool,

    #[clap(long = "flag-rflag", help_heading = "FLAGGING")]
    #[serde(default)]
    pub(super) rflag: bool,

    /// Grow existing flags.
    #[clap(long = "flag-extend", help_heading = "FLAGGING")]
    #[serde(default)]
    pub(super) extend: bool,

    /// Run AOFlagger over the whole dataset.
    #[clap(long = "flag-aoflagger", help_heading = "FLAGGING")]
    #[serde(default)]
    pub(super) aoflagger: bool,
}

impl FlaggingArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            clip: self.clip || other.clip,
            zerochan: self.zerochan || other.zerochan,
            badchan: self.badchan || other.badchan,
            quack: self.quack || other.quack,
            tfcrop: self.tfcrop || other.tfcrop,
            rflag: self.rflag || other.rflag,
            extend: self.extend || other.extend,
            aoflagger: self.aoflagger || other.aoflagger,
        }
    }

    fn parse(self) -> FlaggingParams {
        let FlaggingArgs {
            clip,
            zerochan,
            badchan,
            quack,
            tfcrop,
            rflag,
            extend,
            aoflagger,
        } = self;
        FlaggingParams {
            clip,
            zerochan,
            badchan,
            quack,
            tfcrop,
            rflag,
            extend,
            aoflagger,
        }
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct EngineArgs {
    /// The program that runs engine tasks. Required unless this is a dry run.
    #[clap(long = "engine", help_heading = "ENGINE")]
    pub(super) program: Option<PathBuf>,

    /// An argument given to the engine program before the task name. May be
    /// given multiple times.
    #[clap(long = "engine-arg", allow_hyphen_values(true), help_heading = "ENGINE")]
    #[serde(default, deserialize_with = "one_or_many")]
    pub(super) args: Option<Vec<String>>,
}

impl EngineArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            program: self.program.or(other.program),
            args: self.args.or(other.args),
        }
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RunArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    #[clap(flatten)]
    #[serde(rename = "pipeline")]
    #[serde(default)]
    pub(super) pipeline_args: PipelineArgs,

    #[clap(flatten)]
    #[serde(rename = "sources")]
    #[serde(default)]
    pub(super) source_args: SourceArgs,

    #[clap(flatten)]
    #[serde(rename = "selfcal")]
    #[serde(default)]
    pub(super) selfcal_args: SelfCalArgs,

    #[clap(flatten)]
    #[serde(rename = "flagging")]
    #[serde(default)]
    pub(super) flagging_args: FlaggingArgs,

    #[clap(flatten)]
    #[serde(rename = "engine")]
    #[serde(default)]
    pub(super) engine_args: EngineArgs,

    /// Parameters passed to engine tasks, keyed by task section. These can
    /// only be given in an arguments file.
    #[clap(skip)]
    #[serde(default)]
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub(super) tasks: IndexMap<String, TaskParams>,
}

impl RunArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified
    /// into a single struct. Where applicable, it will prefer CLI parameters
    /// over those in the file.
    ///
    /// This function should only ever merge arguments, and not try to make
    /// sense of them.
    pub(super) fn merge(self) -> Result<RunArgs, CagaError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            // Read in the file arguments. Ensure all of the file args are
            // accounted for by pattern matching.
            let RunArgs {
                args_file: _,
                pipeline_args,
                source_args,
                selfcal_args,
                flagging_args,
                engine_args,
                mut tasks,
            } = unpack_arg_file!(arg_file);

            tasks.extend(cli_args.tasks);

            // Merge all the arguments, preferring the CLI args when available.
            Ok(RunArgs {
                args_file: None,
                pipeline_args: cli_args.pipeline_args.merge(pipeline_args),
                source_args: cli_args.source_args.merge(source_args),
                selfcal_args: cli_args.selfcal_args.merge(selfcal_args),
                flagging_args: cli_args.flagging_args.merge(flagging_args),
                engine_args: cli_args.engine_args.merge(engine_args),
                tasks,
            })
        } else {
            Ok(cli_args)
        }
    }

    /// Parse the arguments into pipeline parameters. Anything odd but not
    /// fatal is added to `warnings`.
    pub(super) fn parse(
        self,
        warnings: &mut WarningPrinter,
    ) -> Result<PipelineParams, RunArgsError> {
        debug!("{:#?}", self);

        let RunArgs {
            args_file: _,
            pipeline_args:
                PipelineArgs {
                    ms,
                    project,
                    outdir,
                    steps,
                    imager,
                    state_file,
                    ref_ant,
                    spw_flagging,
                    spw_gaincal,
                },
            source_args,
            selfcal_args,
            flagging_args,
            engine_args: EngineArgs {
                program,
                args: engine_extra_args,
            },
            tasks,
        } = self;

        let ms = ms.ok_or(RunArgsError::NoMs)?;
        let project = match project {
            Some(p) => p,
            None => ms
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
                .ok_or_else(|| RunArgsError::NoProject(ms.clone()))?,
        };
        validate_identifier("project", &project)?;
        let outdir = match outdir {
            Some(o) => o,
            None => std::env::current_dir()?,
        };

        let steps = steps
            .ok_or(RunArgsError::NoSteps)?
            .iter()
            .map(|s| Stage::from_str(s.trim()).map_err(|_| RunArgsError::UnknownStep(s.clone())))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .unique()
            .collect::<Vec<_>>();
        if steps.is_empty() {
            return Err(RunArgsError::NoSteps);
        }

        let imager = match imager {
            Some(s) => Imager::from_str(&s.to_lowercase())
                .map_err(|_| RunArgsError::UnknownImager(s))?,
            None => Imager::default(),
        };
        let state_file = state_file.unwrap_or_else(|| outdir.join(DEFAULT_STATE_FILE));

        let spw = |option: &'static str, s: Option<String>| {
            s.map(|s| SpwSelection::from_str(&s).map_err(|err| RunArgsError::Spw { option, err }))
                .transpose()
        };
        let spw_flagging = spw("spw_flagging", spw_flagging)?;
        let spw_gaincal = spw("spw_gaincal", spw_gaincal)?;

        let sources = parse_sources(source_args, warnings)?;
        let selfcal = parse_selfcal(selfcal_args, steps.contains(&Stage::Selfcal), warnings)?;

        let mut task_sections = TaskSections::default();
        for (name, params) in tasks {
            let section = TaskSection::from_str(&name)
                .map_err(|_| RunArgsError::UnknownTaskSection(name.clone()))?;
            let unused_imager = match section {
                TaskSection::Tclean => Some(Imager::Tclean),
                TaskSection::Wsclean => Some(Imager::Wsclean),
                _ => None,
            }
            .filter(|i| *i != imager);
            if let Some(unused) = unused_imager {
                warnings.push_line(format!(
                    "Parameters for {unused} were given, but the imager is {imager}; ignoring them"
                ));
            }
            task_sections.insert(section, params);
        }

        Ok(PipelineParams {
            ms,
            project,
            outdir,
            steps,
            imager,
            state_file,
            ref_ant,
            spw_flagging,
            spw_gaincal,
            sources,
            selfcal,
            flagging: flagging_args.parse(),
            engine: EngineParams {
                program,
                args: engine_extra_args.unwrap_or_default(),
            },
            tasks: task_sections,
        })
    }

    /// Run the requested stages.
    pub(super) fn run(self, dry_run: bool, progress_bars: bool) -> Result<(), CagaError> {
        let mut warnings = WarningPrinter::new();
        let params = self.parse(&mut warnings)?;
        let registry = StepRegistry::standard()?;
        let stages = resolve(&params.steps, &registry.catalog(), registry.mandatory());
        display_setup(&params, &stages);
        warnings.display();

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let mut engine = command_engine(&params)?;
        create_output_tree(&params.outdir)?;
        let names = ArtifactNames::new(&params.outdir, &params.project, params.imager)?;
        let mut dataset = Dataset::open(&params.ms, &params.project, &mut engine)?;
        let mut state = PipelineState::load(&params.state_file);
        let summary = Scheduler::new(&registry, &mut state).run(
            &params.steps,
            &mut dataset,
            RunContext {
                params: &params,
                names: &names,
                engine: &mut engine,
                progress_bar: progress_bars,
            },
        )?;

        let mut printer = InfoPrinter::new("Pipeline finished".into());
        printer.push_line(format!("Ran:     {}", summary.executed.iter().join(", ")).into());
        if !summary.skipped.is_empty() {
            printer.push_line(
                format!("Skipped: {} (up to date)", summary.skipped.iter().join(", ")).into(),
            );
        }
        printer.display();
        Ok(())
    }

    /// Show which stages a run would execute, and why.
    pub(super) fn plan(self) -> Result<(), CagaError> {
        let mut warnings = WarningPrinter::new();
        let params = self.parse(&mut warnings)?;
        warnings.display();

        let registry = StepRegistry::standard()?;
        let mut engine = command_engine(&params)?;
        let names = ArtifactNames::new(&params.outdir, &params.project, params.imager)?;
        let dataset = Dataset::open(&params.ms, &params.project, &mut engine)?;
        let mut state = PipelineState::load(&params.state_file);
        let planned = Scheduler::new(&registry, &mut state).inspect(
            &params.steps,
            &params,
            &names,
            &dataset,
        )?;

        let mut printer = InfoPrinter::new("Execution plan".into());
        for stage in planned {
            let verdict = if stage.mandatory {
                "runs every time".to_string()
            } else if stage.will_run() {
                format!("will run ({})", stage.staleness)
            } else {
                "up to date".to_string()
            };
            let previously = if stage.completed {
                "; completed before"
            } else {
                ""
            };
            printer.push_line(format!("{}: {verdict}{previously}", stage.stage).into());
        }
        printer.display();
        Ok(())
    }

    /// Where the state file is. Only the output directory and the state
    /// file itself are consulted, so this works with otherwise incomplete
    /// arguments.
    fn state_file(&self) -> Result<PathBuf, RunArgsError> {
        let PipelineArgs {
            outdir, state_file, ..
        } = &self.pipeline_args;
        Ok(match (state_file, outdir) {
            (Some(f), _) => f.clone(),
            (None, Some(o)) => o.join(DEFAULT_STATE_FILE),
            (None, None) => std::env::current_dir()?.join(DEFAULT_STATE_FILE),
        })
    }

    /// Show the persisted record of completed stages.
    pub(super) fn status(self) -> Result<(), CagaError> {
        let state = PipelineState::load(self.state_file()?);
        let mut printer = InfoPrinter::new(
            format!("Pipeline state ({})", state.path().display()).into(),
        );
        for stage in Stage::iter() {
            let line: Cow<'static, str> = match state.record(stage.name()) {
                Some(record) if record.completed => {
                    let when = record
                        .timestamp
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                        .unwrap_or_else(|| "at an unknown time".to_string());
                    format!(
                        "{stage}: complete, {when} ({} outputs)",
                        record.outputs.len()
                    )
                    .into()
                }
                _ => format!("{stage}: not complete").into(),
            };
            printer.push_line(line);
        }
        printer.display();
        Ok(())
    }
}

#[derive(Parser, Debug, Clone, Default)]
pub(super) struct ClearArgs {
    #[clap(flatten)]
    pub(super) run_args: RunArgs,

    /// The stages to mark as incomplete, so that they run next time.
    #[clap(long = "stage", multiple_values(true), help_heading = "CLEAR")]
    pub(super) stages: Option<Vec<String>>,

    /// Mark every stage as incomplete.
    #[clap(long, help_heading = "CLEAR")]
    pub(super) all: bool,
}

impl ClearArgs {
    pub(super) fn run(self) -> Result<(), CagaError> {
        let ClearArgs {
            run_args,
            stages,
            all,
        } = self;
        let mut state = PipelineState::load(run_args.merge()?.state_file()?);
        if all {
            state.reset()?;
            info!("Cleared every stage in {}", state.path().display());
            return Ok(());
        }
        let stages = stages
            .filter(|s| !s.is_empty())
            .ok_or(RunArgsError::NothingToClear)?
            .iter()
            .map(|s| Stage::from_str(s.trim()).map_err(|_| RunArgsError::UnknownStep(s.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        for stage in stages {
            state.clear(stage.name())?;
            info!("Cleared '{stage}'");
        }
        Ok(())
    }
}

fn command_engine(params: &PipelineParams) -> Result<CommandEngine, RunArgsError> {
    params.command_engine().ok_or(RunArgsError::NoEngine)
}

/// Validate the names in one source role. Every name ends up in file names.
fn source_list(
    role: &'static str,
    names: Option<Vec<String>>,
) -> Result<Vec<String>, RunArgsError> {
    let names: Vec<String> = names
        .unwrap_or_default()
        .into_iter()
        .map(|n| n.trim().to_string())
        .collect();
    for (i, name) in names.iter().enumerate() {
        validate_identifier(role, name)?;
        if names[..i].contains(name) {
            return Err(RunArgsError::DuplicateSource {
                role,
                name: name.clone(),
            });
        }
    }
    Ok(names)
}

fn parse_sources(args: SourceArgs, warnings: &mut WarningPrinter) -> Result<Sources, RunArgsError> {
    let SourceArgs {
        amp_calibrators,
        bandpass_calibrators,
        phase_calibrators,
        targets,
    } = args;
    let amp_calibrators = Vec1::try_from_vec(source_list("amp_calibrators", amp_calibrators)?)
        .map_err(|_| RunArgsError::NoSources("amp_calibrators"))?;
    let targets = Vec1::try_from_vec(source_list("targets", targets)?)
        .map_err(|_| RunArgsError::NoSources("targets"))?;
    let phase_calibrators = source_list("phase_calibrators", phase_calibrators)?;
    let bandpass_calibrators =
        match Vec1::try_from_vec(source_list("bandpass_calibrators", bandpass_calibrators)?) {
            Ok(b) => b,
            Err(_) => {
                warnings.push_line("No bandpass calibrators given; using the amplitude calibrators");
                amp_calibrators.clone()
            }
        };

    for target in &targets {
        if amp_calibrators.contains(target)
            || bandpass_calibrators.contains(target)
            || phase_calibrators.contains(target)
        {
            warnings.push_line(format!("'{target}' is both a target and a calibrator"));
        }
    }

    Ok(Sources {
        amp_calibrators,
        bandpass_calibrators,
        phase_calibrators,
        targets,
    })
}

fn parse_selfcal(
    args: SelfCalArgs,
    requested: bool,
    warnings: &mut WarningPrinter,
) -> Result<Option<SelfCalParams>, RunArgsError> {
    let SelfCalArgs {
        pcycles,
        apcycles,
        solints,
        resume,
    } = args;
    let solints = match solints.map(Vec1::try_from_vec) {
        Some(Ok(s)) => s,
        Some(Err(_)) | None => {
            if requested {
                return Err(RunArgsError::NoSolints);
            }
            if pcycles.is_some() || apcycles.is_some() {
                warnings.push_line("Self-calibration cycles were given without solution intervals; ignoring them");
            }
            return Ok(None);
        }
    };

    let params = SelfCalParams {
        pcycles: pcycles.unwrap_or(0),
        apcycles: apcycles.unwrap_or(0),
        solints,
        resume,
    };
    if params.solints.len() != params.num_cycles() {
        return Err(RunArgsError::SolintCount {
            pcycles: params.pcycles,
            apcycles: params.apcycles,
            expected: params.num_cycles(),
            got: params.solints.len(),
        });
    }
    if !requested {
        warnings.push_line("Self-calibration parameters were given, but the selfcal stage wasn't requested");
    }
    Ok(Some(params))
}

/// Print what is about to happen.
fn display_setup(params: &PipelineParams, stages: &[Stage]) {
    let mut printer = InfoPrinter::new("Pipeline set up".into());
    printer.push_block(vec![
        format!("Measurement set: {}", params.ms.display()).into(),
        format!("Project:         {}", params.project).into(),
        format!("Output dir:      {}", params.outdir.display()).into(),
        format!("State file:      {}", params.state_file.display()).into(),
    ]);

    let sources = &params.sources;
    let mut block: Vec<Cow<'static, str>> = vec![
        format!("Amplitude calibrators: {}", sources.amp_calibrators.iter().join(", ")).into(),
        format!("Bandpass calibrators:  {}", sources.bandpass_calibrators.iter().join(", ")).into(),
    ];
    if !sources.phase_calibrators.is_empty() {
        block.push(
            format!("Phase calibrators:     {}", sources.phase_calibrators.join(", ")).into(),
        );
    }
    block.push(format!("Targets:               {}", sources.targets.iter().join(", ")).into());
    printer.push_block(block);

    printer.push_line(format!("Stages: {}", stages.iter().join(", ")).into());
    if let Some(selfcal) = &params.selfcal {
        printer.push_line(
            format!(
                "Self-calibration: {} phase, {} amplitude-phase and 1 final cycle; solints {}",
                selfcal.pcycles,
                selfcal.apcycles,
                selfcal.solints.iter().join(", ")
            )
            .into(),
        );
    }
    printer.push_line(format!("Imager: {}", params.imager).into());
    if let Some(program) = &params.engine.program {
        printer.push_line(format!("Engine: {}", program.display()).into());
    }
    printer.display();
}

#[derive(Error, Debug)]
pub(crate) enum RunArgsError {
    #[error("No measurement set was given")]
    NoMs,

    #[error("Couldn't work out a project name from '{0}'; please give one")]
    NoProject(PathBuf),

    #[error("No stages were requested. Valid stages: {}", *STAGES_COMMA_SEPARATED)]
    NoSteps,

    #[error("Unknown stage '{0}'. Valid stages: {}", *STAGES_COMMA_SEPARATED)]
    UnknownStep(String),

    #[error("Unknown imager '{0}'")]
    UnknownImager(String),

    #[error("Unknown task section '{0}'. Valid sections: {}", *TASK_SECTIONS_COMMA_SEPARATED)]
    UnknownTaskSection(String),

    #[error("At least one source must be given for '{0}'")]
    NoSources(&'static str),

    #[error("'{name}' appears more than once in '{role}'")]
    DuplicateSource { role: &'static str, name: String },

    #[error("The selfcal stage was requested, but no solution intervals were given")]
    NoSolints,

    #[error("{pcycles} phase and {apcycles} amplitude-phase cycles need {expected} solution intervals (one more for the final cycle), but {got} were given")]
    SolintCount {
        pcycles: usize,
        apcycles: usize,
        expected: usize,
        got: usize,
    },

    #[error("Bad {option}: {err}")]
    Spw {
        option: &'static str,
        #[source]
        err: SpwError,
    },

    #[error("No engine program was given (--engine or [engine] program)")]
    NoEngine,

    #[error("Nothing to clear; give stages with --stage, or --all")]
    NothingToClear,

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
