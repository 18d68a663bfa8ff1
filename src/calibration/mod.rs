// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Stage actions for inspecting, calibrating and splitting the input
//! dataset.
//!
//! Every solve follows the same rules: a stale table on disk is removed
//! first; the tables that precede the new table in the dataset's chain (or
//! the whole chain, if the table is new) are applied on the fly; and the new
//! table replaces its namesake in the chain, or is appended.


use std::fs;

use log::{info, warn};
use strum::IntoEnumIterator;

use crate::{
    dataset::{paths_of, CalTable, ChainUpdate},
    engine::{clear_stale_output, run_task, EngineRequest, EngineTask, ParamValue},
    naming::{Artifact, StandardTable},
    params::TaskSection,
    steps::{StepContext, StepError},
};

/// Stage action: summarise the observation and plot the array.
pub fn inspect(ctx: &mut StepContext) -> Result<(), StepError> {
    let vis = ctx.dataset.path().to_path_buf();
    let listobs = ctx.names.resolve(Artifact::Listobs, None, None)?;
    let plot = ctx.names.resolve(Artifact::AntennaPlot, None, None)?;

    run_task(
        ctx.engine,
        EngineRequest::new(EngineTask::Listobs, &vis)
            .with_params(ctx.params.tasks.get(TaskSection::Inspect))
            .param("listfile", listobs.as_path())
            .param("overwrite", true)
            .expect(&listobs),
    )?;
    clear_stale_output(&plot)?;
    run_task(
        ctx.engine,
        EngineRequest::new(EngineTask::Plotants, &vis)
            .param("figfile", plot.as_path())
            .expect(&plot),
    )?;
    info!("Observation summary written to {}", listobs.display());
    Ok(())
}

/// Stage action: put tables from earlier runs back into the chain.
pub fn load_existing_tables(ctx: &mut StepContext) -> Result<(), StepError> {
    let mut loaded = vec![];
    for table in StandardTable::iter() {
        let path = ctx.names.caltable(table)?;
        if path.exists() {
            ctx.dataset
                .add_calibration_table(CalTable::standard(table, path));
            loaded.push(table.to_string());
        }
    }
    if loaded.is_empty() {
        info!("No existing calibration tables found");
    } else {
        info!("Loaded existing calibration tables: {}", loaded.join(", "));
    }
    Ok(())
}

/// Solve for `table` with `request` (which only needs its task and the
/// user's parameters set) using data from `fields`.
fn solve(
    ctx: &mut StepContext,
    table: StandardTable,
    request: EngineRequest,
    fields: &[String],
) -> Result<(), StepError> {
    let path = ctx.names.caltable(table)?;
    clear_stale_output(&path)?;

    let name = table.to_string();
    let prior = paths_of(ctx.dataset.calibration_tables().prefix_before(&name));
    let mut request = request
        .param("caltable", path.as_path())
        .param("field", ParamValue::joined(fields))
        .param("gaintable", ParamValue::paths(&prior))
        .expect(&path);
    if let Some(refant) = &ctx.params.ref_ant {
        request = request.default_param("refant", refant.as_str());
    }
    if let Some(spw) = &ctx.params.spw_gaincal {
        request = request.default_param("spw", spw.resolve(ctx.dataset.metadata().channels));
    }
    run_task(ctx.engine, request)?;

    match ctx
        .dataset
        .add_calibration_table(CalTable::standard(table, path))
    {
        ChainUpdate::Appended(i) => info!("Solved '{name}' (chain position {i})"),
        ChainUpdate::Replaced(i) => info!("Re-solved '{name}' (chain position {i})"),
    }
    Ok(())
}

/// Set the flux density model, then solve for delays and complex gains.
fn calibrate(
    ctx: &mut StepContext,
    delay: StandardTable,
    gain: StandardTable,
) -> Result<(), StepError> {
    let vis = ctx.dataset.path().to_path_buf();
    let sources = &ctx.params.sources;
    let amp_calibrators = sources.amp_calibrators.to_vec();
    let gain_fields = sources.gain_fields();

    run_task(
        ctx.engine,
        EngineRequest::new(EngineTask::Setjy, &vis)
            .with_params(ctx.params.tasks.get(TaskSection::Setjy))
            .param("field", ParamValue::joined(&amp_calibrators)),
    )?;

    let request = EngineRequest::new(EngineTask::Gaincal, &vis)
        .with_params(ctx.params.tasks.get(TaskSection::GaincalK))
        .default_param("gaintype", "K");
    solve(ctx, delay, request, &amp_calibrators)?;

    let request = EngineRequest::new(EngineTask::Gaincal, &vis)
        .with_params(ctx.params.tasks.get(TaskSection::GaincalG))
        .default_param("gaintype", "G")
        .default_param("calmode", "ap");
    solve(ctx, gain, request, &gain_fields)
}

/// Stage action: the first calibration pass.
pub fn first_pass(ctx: &mut StepContext) -> Result<(), StepError> {
    calibrate(ctx, StandardTable::GainK, StandardTable::GainG)
}

/// Stage action: the second calibration pass, after the bandpass is known.
pub fn second_pass(ctx: &mut StepContext) -> Result<(), StepError> {
    calibrate(ctx, StandardTable::GainK2, StandardTable::GainG2)
}

/// Stage action: solve for the bandpass.
pub fn bandpass(ctx: &mut StepContext) -> Result<(), StepError> {
    let request = EngineRequest::new(EngineTask::Bandpass, ctx.dataset.path())
        .with_params(ctx.params.tasks.get(TaskSection::Bandpass));
    let fields = ctx.params.sources.bandpass_calibrators.to_vec();
    solve(ctx, StandardTable::Bandpass, request, &fields)
}

/// Stage action: bootstrap the flux scale of the latest complex-gain table
/// from the amplitude calibrators.
pub fn fluxscale(ctx: &mut StepContext) -> Result<(), StepError> {
    let vis = ctx.dataset.path().to_path_buf();
    let table = StandardTable::Fluxscale;
    let path = ctx.names.caltable(table)?;
    let gain = ctx
        .dataset
        .calibration_tables()
        .latest_gain_before(&table.to_string())
        .map(|t| t.path.clone())
        .ok_or_else(|| {
            StepError::MissingInput(
                "a complex-gain (G) table to bootstrap the flux scale from".to_string(),
            )
        })?;
    clear_stale_output(&path)?;

    let sources = &ctx.params.sources;
    run_task(
        ctx.engine,
        EngineRequest::new(EngineTask::Fluxscale, &vis)
            .with_params(ctx.params.tasks.get(TaskSection::Fluxscale))
            .param("caltable", gain.as_path())
            .param("fluxtable", path.as_path())
            .param("reference", ParamValue::joined(&sources.amp_calibrators))
            .param("transfer", ParamValue::joined(&sources.transfer_fields()))
            .expect(&path),
    )?;
    ctx.dataset
        .add_calibration_table(CalTable::standard(table, path));
    info!("Flux scale bootstrapped from '{}'", gain.display());
    Ok(())
}

/// Stage action: apply the whole chain. The flux-scaled solutions are taken
/// from each amplitude calibrator itself, and from the phase calibrators for
/// everything else.
pub fn apply(ctx: &mut StepContext) -> Result<(), StepError> {
    let vis = ctx.dataset.path().to_path_buf();
    let chain = ctx.dataset.calibration_tables();
    let tables = chain.paths();
    let flux_index = chain
        .position(&StandardTable::Fluxscale.to_string())
        .ok_or_else(|| {
            StepError::MissingInput("a fluxscale table in the calibration chain".to_string())
        })?;
    let gainfield = |field: &str| {
        let mut fields = vec![String::new(); tables.len()];
        fields[flux_index] = field.to_string();
        ParamValue::from(fields)
    };

    let present = |names: &[String]| -> Vec<String> {
        names
            .iter()
            .filter(|s| ctx.dataset.has_source(s))
            .cloned()
            .collect()
    };
    let sources = &ctx.params.sources;
    let amp_calibrators = present(&sources.amp_calibrators);
    let phase_calibrators = present(&sources.phase_calibrators);
    let targets = present(&sources.targets);

    let mut groups = vec![];
    for cal in &amp_calibrators {
        groups.push((cal.clone(), gainfield(cal)));
    }
    let phase_field = phase_calibrators.join(",");
    if !phase_calibrators.is_empty() {
        groups.push((phase_field.clone(), gainfield(&phase_field)));
    }
    if !targets.is_empty() {
        groups.push((targets.join(","), gainfield(&phase_field)));
    }

    for (field, gainfield) in groups {
        run_task(
            ctx.engine,
            EngineRequest::new(EngineTask::Applycal, &vis)
                .with_params(ctx.params.tasks.get(TaskSection::Applycal))
                .param("field", field.as_str())
                .param("gaintable", ParamValue::paths(&tables))
                .param("gainfield", gainfield),
        )?;
    }
    info!("Applied {} calibration tables", tables.len());
    Ok(())
}

/// Stage action: write one calibrated dataset per source.
pub fn split_sources(ctx: &mut StepContext) -> Result<(), StepError> {
    let vis = ctx.dataset.path().to_path_buf();
    for source in ctx.params.sources.all() {
        if !ctx.dataset.has_source(&source) {
            warn!("Source '{source}' is not in the dataset; not splitting it");
            continue;
        }
        let split = ctx.names.split(&source)?;
        if let Some(parent) = split.parent() {
            fs::create_dir_all(parent)?;
        }
        clear_stale_output(&split)?;
        run_task(
            ctx.engine,
            EngineRequest::new(EngineTask::Split, &vis)
                .with_params(ctx.params.tasks.get(TaskSection::Split))
                .default_param("datacolumn", "corrected")
                .param("field", source.as_str())
                .param("outputvis", split.as_path())
                .expect(&split),
        )?;
        info!("Split '{source}' into {}", split.display());
    }
    Ok(())
}
