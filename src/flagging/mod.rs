// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Flagging passes. A pass runs every enabled flagging method over a set of
//! sources and finishes with a flag summary.

#[cfg(test)]
mod tests;

use std::path::Path;

use log::{debug, info};
use strum_macros::{Display, IntoStaticStr};

use crate::{
    dataset::Dataset,
    engine::{clear_stale_output, run_task, Engine, EngineError, EngineRequest, EngineTask},
    naming::Artifact,
    params::{PipelineParams, TaskSection},
    steps::{StepContext, StepError},
};

/// Which sources a flagging pass covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum FlagScope {
    Calibrators,
    Targets,
}

/// Which flagging methods are enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlaggingParams {
    /// Clip visibilities with outlying amplitudes.
    pub clip: bool,
    /// Flag the first channel of each sub-band.
    pub zerochan: bool,
    /// Flag channels with known persistent interference.
    pub badchan: bool,
    /// Flag the edges of each scan.
    pub quack: bool,
    pub tfcrop: bool,
    pub rflag: bool,
    /// Grow existing flags.
    pub extend: bool,
    /// Run AOFlagger over the whole dataset.
    pub aoflagger: bool,
}

/// Flag `sources` in `dataset` and write a flag summary to `summary`.
/// Sources the dataset doesn't contain are skipped.
pub fn run_pass(
    engine: &mut dyn Engine,
    dataset: &Dataset,
    params: &PipelineParams,
    sources: &[String],
    summary: &Path,
) -> Result<(), EngineError> {
    let toggles = params.flagging;
    let tasks = &params.tasks;
    let vis = dataset.path();
    let spw = params
        .spw_flagging
        .as_ref()
        .map(|s| s.resolve(dataset.metadata().channels));

    let flagdata = |section: TaskSection, source: &str| {
        EngineRequest::new(EngineTask::Flagdata, vis)
            .with_params(tasks.get(section))
            .param("field", source)
    };

    for source in sources {
        if !dataset.has_source(source) {
            debug!("'{source}' isn't in '{}'; not flagging it", dataset.name());
            continue;
        }
        info!("Flagging '{source}' in '{}'", dataset.name());

        let mut requests = vec![];
        if toggles.clip {
            requests.push(flagdata(TaskSection::FlagClip, source).default_param("mode", "clip"));
        }
        if toggles.zerochan {
            requests.push(
                flagdata(TaskSection::FlagZerochan, source)
                    .default_param("mode", "manual")
                    .default_param("spw", "*:0"),
            );
        }
        if toggles.badchan {
            let mut request =
                flagdata(TaskSection::FlagBadchan, source).default_param("mode", "manual");
            if let Some(spw) = &spw {
                request = request.default_param("spw", spw.as_str());
            }
            requests.push(request);
        }
        if toggles.quack {
            let quack = flagdata(TaskSection::FlagQuack, source).default_param("mode", "quack");
            if quack.params.contains_key("quackmode") {
                requests.push(quack);
            } else {
                requests.push(quack.clone().param("quackmode", "beg"));
                requests.push(quack.param("quackmode", "endb"));
            }
        }
        for (enabled, section, mode) in [
            (toggles.tfcrop, TaskSection::FlagTfcrop, "tfcrop"),
            (toggles.rflag, TaskSection::FlagRflag, "rflag"),
            (toggles.extend, TaskSection::FlagExtend, "extend"),
        ] {
            if enabled {
                requests.push(
                    flagdata(section, source)
                        .default_param("mode", mode)
                        .default_param("datacolumn", "DATA"),
                );
            }
        }
        for request in requests {
            run_task(engine, request)?;
        }
    }

    // AOFlagger can't select sources; it always works on the whole dataset.
    if toggles.aoflagger {
        info!("Running AOFlagger on '{}'", dataset.name());
        run_task(
            engine,
            EngineRequest::new(EngineTask::Aoflagger, vis)
                .with_params(tasks.get(TaskSection::FlagAoflagger)),
        )?;
    }

    clear_stale_output(summary)?;
    run_task(
        engine,
        EngineRequest::new(EngineTask::Flagdata, vis)
            .param("mode", "summary")
            .param("name", summary)
            .expect(summary),
    )?;
    Ok(())
}

/// Stage action: flag calibrator data only.
pub fn flag_calibrators(ctx: &mut StepContext) -> Result<(), StepError> {
    let sources = ctx.params.sources.calibrators();
    flag_scope(ctx, FlagScope::Calibrators, &sources)
}

/// Stage action: flag target data only.
pub fn flag_targets(ctx: &mut StepContext) -> Result<(), StepError> {
    let sources = ctx.params.sources.targets.to_vec();
    flag_scope(ctx, FlagScope::Targets, &sources)
}

fn flag_scope(
    ctx: &mut StepContext,
    scope: FlagScope,
    sources: &[String],
) -> Result<(), StepError> {
    let summary = ctx
        .names
        .resolve(Artifact::FlagSummary(scope), None, None)?;
    run_pass(ctx.engine, ctx.dataset, ctx.params, sources, &summary)?;
    Ok(())
}
