// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A handle on an input dataset (a measurement set or one of its per-source
//! splits), along with the ordered chain of calibration tables applied to it.

mod chain;
mod error;

pub use chain::{paths_of, CalTable, CalTableChain, CalTableKind, ChainUpdate};
pub use error::DatasetError;

use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine::Engine;

/// Observation metadata, as reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// The number of channels per sub-band.
    pub channels: u32,

    /// The number of sub-bands (spectral windows).
    pub subbands: u32,

    /// Antenna names.
    pub antennas: Vec<String>,

    /// Observed source (field) names.
    pub sources: IndexSet<String>,

    /// \[Hz\]
    pub reference_frequency_hz: f64,

    /// \[Hz\]
    pub bandwidth_hz: f64,

    /// The number of correlation products (polarisations).
    pub num_correlations: u32,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    path: PathBuf,
    name: String,
    metadata: DatasetMetadata,
    chain: CalTableChain,
}

impl Dataset {
    /// Open a dataset, asking the engine for its metadata. Fails before
    /// contacting the engine if the path doesn't exist.
    pub fn open<P: AsRef<Path>>(
        path: P,
        name: &str,
        engine: &mut dyn Engine,
    ) -> Result<Dataset, DatasetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DatasetError::DoesNotExist(path.to_path_buf()));
        }
        let metadata = engine
            .metadata(path)
            .map_err(|e| DatasetError::Metadata {
                path: path.to_path_buf(),
                err: Box::new(e),
            })?;
        debug!(
            "Opened '{}': {} sources, {} antennas, {} sub-bands x {} channels",
            path.display(),
            metadata.sources.len(),
            metadata.antennas.len(),
            metadata.subbands,
            metadata.channels
        );
        Dataset::from_parts(path, name, metadata)
    }

    /// Construct a dataset handle from already-known metadata.
    pub fn from_parts<P: AsRef<Path>>(
        path: P,
        name: &str,
        metadata: DatasetMetadata,
    ) -> Result<Dataset, DatasetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DatasetError::DoesNotExist(path.to_path_buf()));
        }
        Ok(Dataset {
            path: path.to_path_buf(),
            name: name.to_string(),
            metadata,
            chain: CalTableChain::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    pub fn has_source(&self, source: &str) -> bool {
        self.metadata.sources.contains(source)
    }

    pub fn has_antenna(&self, antenna: &str) -> bool {
        self.metadata.antennas.iter().any(|a| a == antenna)
    }

    /// The calibration tables applied to this dataset, in application order.
    pub fn calibration_tables(&self) -> &CalTableChain {
        &self.chain
    }

    /// The only way a dataset's state changes after it has been opened.
    pub fn add_calibration_table(&mut self, table: CalTable) -> ChainUpdate {
        let update = self.chain.add(table);
        debug!(
            "{}: calibration chain now [{}]",
            self.name,
            self.chain.names().join(", ")
        );
        update
    }
}
