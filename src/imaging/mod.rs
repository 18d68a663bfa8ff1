// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Imaging of split datasets.

#[cfg(test)]
mod tests;

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    engine::{
        clear_stale_output, run_task, Engine, EngineError, EngineRequest, EngineTask, ParamValue,
    },
    params::{TaskSection, TaskSections},
    steps::{StepContext, StepError},
};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Imager {
    #[default]
    Tclean,
    Wsclean,
}

impl Imager {
    pub fn task(self) -> EngineTask {
        match self {
            Imager::Tclean => EngineTask::Tclean,
            Imager::Wsclean => EngineTask::Wsclean,
        }
    }

    fn section(self) -> TaskSection {
        match self {
            Imager::Tclean => TaskSection::Tclean,
            Imager::Wsclean => TaskSection::Wsclean,
        }
    }

    /// The primary image an imager writes when given `base` as its output
    /// name.
    pub fn product(self, base: &Path) -> PathBuf {
        let mut name = OsString::from(base.as_os_str());
        name.push(match self {
            Imager::Tclean => ".image",
            Imager::Wsclean => "-image.fits",
        });
        PathBuf::from(name)
    }

    pub fn request(self, vis: &Path, base: &Path, tasks: &TaskSections) -> EngineRequest {
        let mut params = tasks.get(self.section());
        let request = match self {
            Imager::Tclean => EngineRequest::new(self.task(), vis)
                .with_params(params)
                .param("imagename", base),
            Imager::Wsclean => {
                // A single number means a square image.
                if let Some(ParamValue::Int(n)) = params.get("size").cloned() {
                    params.insert("size".to_string(), ParamValue::Str(format!("{n} {n}")));
                }
                EngineRequest::new(self.task(), vis)
                    .with_params(params)
                    .param("name", base)
            }
        };
        request.expect(self.product(base))
    }
}

/// Image `vis`, replacing any earlier product. Returns the image path.
pub fn make_image(
    engine: &mut dyn Engine,
    imager: Imager,
    vis: &Path,
    base: &Path,
    tasks: &TaskSections,
) -> Result<PathBuf, EngineError> {
    let product = imager.product(base);
    clear_stale_output(&product)?;
    run_task(engine, imager.request(vis, base, tasks))?;
    Ok(product)
}

/// Stage action: image every split.
pub fn clean(ctx: &mut StepContext) -> Result<(), StepError> {
    let imager = ctx.names.imager();
    for source in ctx.params.sources.all() {
        if !ctx.dataset.has_source(&source) {
            warn!("Source '{source}' is not in the dataset; not imaging it");
            continue;
        }
        let split = ctx.names.split(&source)?;
        let base = ctx.names.image_base(&source, None)?;
        let image = make_image(ctx.engine, imager, &split, &base, &ctx.params.tasks)?;
        info!("Imaged '{source}' with {imager}: {}", image.display());
    }
    Ok(())
}
