// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
An incremental pipeline driver for calibrating, flagging, imaging and
self-calibrating interferometric measurement sets. The numerical work is done by
an external engine; this crate decides what needs to run, names everything that
is written, and keeps track of what has been done.
 */

pub mod calibration;
pub mod cli;
pub mod dataset;
pub mod engine;
pub mod flagging;
pub mod imaging;
pub(crate) mod io;
pub mod naming;
pub mod params;
pub mod scheduler;
pub mod selfcal;
pub mod state;
pub mod steps;

#[cfg(test)]
mod tests;

// Re-exports.
pub use cli::{Caga, CagaError};
