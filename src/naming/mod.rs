// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Deterministic names for everything the pipeline writes.
//!
//! Every artifact lives under the output directory and is a pure function of
//! (artifact kind, source, self-calibration cycle). Distinct triples never
//! map to the same path.

mod error;

pub use error::NamingError;

use std::path::{Path, PathBuf};

use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{flagging::FlagScope, imaging::Imager, selfcal::Cycle};

/// The sub-directory holding calibration tables.
pub const CALTABLES_DIR: &str = "caltables";
/// The sub-directory holding logs and textual summaries.
pub const LOG_DIR: &str = "log";
/// The sub-directory holding diagnostic plots.
pub const PLOTS_DIR: &str = "plots";

/// The calibration tables produced by the standard (non-self-cal) stages.
/// The iteration order is the order in which existing tables are loaded
/// into a dataset's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr)]
pub enum StandardTable {
    #[strum(serialize = "gain_K")]
    GainK,

    #[strum(serialize = "gain_G")]
    GainG,

    #[strum(serialize = "bandpass")]
    Bandpass,

    #[strum(serialize = "gain_K2")]
    GainK2,

    #[strum(serialize = "gain_G2")]
    GainG2,

    #[strum(serialize = "fluxscale")]
    Fluxscale,
}

impl StandardTable {
    /// Is this a complex-gain (`G`) solution table?
    pub fn is_gain(self) -> bool {
        matches!(self, StandardTable::GainG | StandardTable::GainG2)
    }
}

/// The kinds of artifact the pipeline knows how to name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    /// The textual observation summary.
    Listobs,

    /// The antenna-layout plot.
    AntennaPlot,

    /// The flag summary written at the end of a flagging pass.
    FlagSummary(FlagScope),

    /// A standard calibration table.
    CalTable(StandardTable),

    /// A per-source split dataset. Requires a source.
    Split,

    /// The primary image product of a source. Requires a source; with a
    /// cycle, the image made at the end of that self-calibration cycle.
    Image,

    /// A self-calibration gain table. Requires a source and a cycle.
    SelfCalTable,

    /// The flag summary of the target-only flagging pass made before a
    /// self-calibration cycle. Requires a source and a cycle.
    SelfCalFlagSummary,
}

impl Artifact {
    fn takes_source(self) -> bool {
        matches!(
            self,
            Artifact::Split
                | Artifact::Image
                | Artifact::SelfCalTable
                | Artifact::SelfCalFlagSummary
        )
    }

    fn takes_cycle(self) -> bool {
        matches!(
            self,
            Artifact::Image | Artifact::SelfCalTable | Artifact::SelfCalFlagSummary
        )
    }

    fn requires_cycle(self) -> bool {
        matches!(self, Artifact::SelfCalTable | Artifact::SelfCalFlagSummary)
    }
}

/// Resolves artifact paths for one project in one output directory.
#[derive(Debug, Clone)]
pub struct ArtifactNames {
    outdir: PathBuf,
    project: String,
    imager: Imager,
}

impl ArtifactNames {
    pub fn new<P: AsRef<Path>>(
        outdir: P,
        project: &str,
        imager: Imager,
    ) -> Result<ArtifactNames, NamingError> {
        validate_identifier("project", project)?;
        Ok(ArtifactNames {
            outdir: outdir.as_ref().to_path_buf(),
            project: project.to_string(),
            imager,
        })
    }

    pub fn outdir(&self) -> &Path {
        &self.outdir
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn imager(&self) -> Imager {
        self.imager
    }

    pub fn caltables_dir(&self) -> PathBuf {
        self.outdir.join(CALTABLES_DIR)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.outdir.join(LOG_DIR)
    }

    pub fn plots_dir(&self) -> PathBuf {
        self.outdir.join(PLOTS_DIR)
    }

    /// The directory holding everything specific to a single source.
    pub fn source_dir(&self, source: &str) -> Result<PathBuf, NamingError> {
        validate_identifier("source", source)?;
        Ok(self.outdir.join(source))
    }

    /// Resolve the path of an artifact.
    ///
    /// A source (or cycle) must be given exactly when the artifact kind uses
    /// one; supplying one the kind ignores is an error, because otherwise two
    /// different triples would share a path.
    pub fn resolve(
        &self,
        artifact: Artifact,
        source: Option<&str>,
        cycle: Option<Cycle>,
    ) -> Result<PathBuf, NamingError> {
        match (artifact.takes_source(), source) {
            (true, None) => return Err(NamingError::MissingSource(artifact)),
            (false, Some(s)) => {
                return Err(NamingError::UnexpectedSource {
                    artifact,
                    name: s.to_string(),
                })
            }
            _ => (),
        }
        match (artifact.takes_cycle(), cycle) {
            (false, Some(c)) => return Err(NamingError::UnexpectedCycle { artifact, cycle: c }),
            (_, None) if artifact.requires_cycle() => {
                return Err(NamingError::MissingCycle(artifact))
            }
            _ => (),
        }

        let project = &self.project;
        // The checks above guarantee a source (and a cycle, where one is
        // required) wherever these are used.
        let source = source.unwrap_or_default();
        let tag = cycle.map(|c| c.tag()).unwrap_or_default();
        let path = match artifact {
            Artifact::Listobs => self.log_dir().join(format!("{project}.listobs")),
            Artifact::AntennaPlot => self.plots_dir().join(format!("{project}.plotants.png")),
            Artifact::FlagSummary(scope) => self
                .log_dir()
                .join(format!("{project}.flagsummary.{scope}")),
            Artifact::CalTable(table) => self.caltables_dir().join(format!("{project}.{table}")),
            Artifact::Split => self
                .source_dir(source)?
                .join(format!("{project}.{source}.split.ms")),
            Artifact::Image => self.imager.product(&self.image_base(source, cycle)?),
            Artifact::SelfCalTable => self
                .source_dir(source)?
                .join(format!("{project}.{source}.sc.{tag}")),
            Artifact::SelfCalFlagSummary => self
                .source_dir(source)?
                .join(format!("{project}.{source}.sc.{tag}.flagsummary")),
        };
        Ok(path)
    }

    /// The name handed to the imager. Imagers derive their product names
    /// from this; see [`Imager::product`].
    pub fn image_base(&self, source: &str, cycle: Option<Cycle>) -> Result<PathBuf, NamingError> {
        let dir = self.source_dir(source)?;
        let project = &self.project;
        let imager = self.imager;
        Ok(match cycle {
            None => dir.join(format!("{project}.{source}.{imager}")),
            Some(c) => dir.join(format!("{project}.{source}.{imager}.{}", c.tag())),
        })
    }

    pub fn caltable(&self, table: StandardTable) -> Result<PathBuf, NamingError> {
        self.resolve(Artifact::CalTable(table), None, None)
    }

    pub fn split(&self, source: &str) -> Result<PathBuf, NamingError> {
        self.resolve(Artifact::Split, Some(source), None)
    }

    pub fn image(&self, source: &str, cycle: Option<Cycle>) -> Result<PathBuf, NamingError> {
        self.resolve(Artifact::Image, Some(source), cycle)
    }

    pub fn selfcal_table(&self, source: &str, cycle: Cycle) -> Result<PathBuf, NamingError> {
        self.resolve(Artifact::SelfCalTable, Some(source), Some(cycle))
    }
}

/// Check that a name can be used as a single path component.
pub fn validate_identifier(kind: &'static str, name: &str) -> Result<(), NamingError> {
    if name.trim().is_empty() {
        return Err(NamingError::Empty(kind));
    }
    if name.contains(['/', '\\']) {
        return Err(NamingError::PathSeparator {
            kind,
            name: name.to_string(),
        });
    }
    if name == "." || name == ".." || name.contains('\0') {
        return Err(NamingError::Reserved {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}
