// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use crate::{naming::StandardTable, selfcal::Cycle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalTableKind {
    Standard(StandardTable),
    SelfCal(Cycle),
}

/// A reference to a calibration table on disk. Tables are identified by
/// name within a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalTable {
    pub name: String,
    pub path: PathBuf,
    pub kind: CalTableKind,
}

impl CalTable {
    pub fn standard(table: StandardTable, path: PathBuf) -> CalTable {
        CalTable {
            name: table.to_string(),
            path,
            kind: CalTableKind::Standard(table),
        }
    }

    pub fn selfcal(cycle: Cycle, path: PathBuf) -> CalTable {
        CalTable {
            name: format!("sc.{}", cycle.tag()),
            path,
            kind: CalTableKind::SelfCal(cycle),
        }
    }
}

/// What [`CalTableChain::add`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainUpdate {
    /// The table was new and now sits at this index.
    Appended(usize),
    /// A table with the same name already sat at this index and was
    /// replaced; the order of the chain is unchanged.
    Replaced(usize),
}

/// An ordered list of calibration tables. Names are unique; the order is
/// the order in which the tables are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalTableChain {
    tables: Vec<CalTable>,
}

impl CalTableChain {
    pub fn add(&mut self, table: CalTable) -> ChainUpdate {
        match self.position(&table.name) {
            Some(i) => {
                self.tables[i] = table;
                ChainUpdate::Replaced(i)
            }
            None => {
                self.tables.push(table);
                ChainUpdate::Appended(self.tables.len() - 1)
            }
        }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// The tables that precede `name`. If `name` isn't in the chain, that's
    /// all of them. These are the prior tables a solve for `name` must apply
    /// on the fly.
    pub fn prefix_before(&self, name: &str) -> &[CalTable] {
        match self.position(name) {
            Some(i) => &self.tables[..i],
            None => &self.tables,
        }
    }

    /// The last complex-gain table before `name`.
    pub fn latest_gain_before(&self, name: &str) -> Option<&CalTable> {
        self.prefix_before(name)
            .iter()
            .rev()
            .find(|t| matches!(t.kind, CalTableKind::Standard(s) if s.is_gain()))
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        paths_of(&self.tables)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<CalTable> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

pub fn paths_of(tables: &[CalTable]) -> Vec<PathBuf> {
    tables.iter().map(|t| t.path.clone()).collect()
}

impl<'a> IntoIterator for &'a CalTableChain {
    type Item = &'a CalTable;
    type IntoIter = std::slice::Iter<'a, CalTable>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.iter()
    }
}

impl AsRef<[CalTable]> for CalTableChain {
    fn as_ref(&self) -> &[CalTable] {
        &self.tables
    }
}
