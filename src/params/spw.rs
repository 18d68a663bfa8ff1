// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Spectral-window selections.
//!
//! Selections are normally given in the engine's own syntax (e.g. `0:100~900`)
//! and are passed through untouched. Channel ranges may also be given as
//! fractions of the band, which are only resolved into channel numbers once
//! the dataset's channel count is known:
//!
//! - `0.1` drops 10% of the channels at each edge of every sub-band
//!   (`*:ceil(0.1n)~floor(0.9n)`);
//! - `1~2:0.1` does the same for sub-bands 1 and 2;
//! - `*:0.2~0.9` keeps channels `ceil(0.2n)` to `floor(0.9n)`.

use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelFraction {
    /// Remove this fraction of channels from both edges.
    Edges(f64),

    /// Keep the channels between these fractions of the band.
    Range(f64, f64),
}

impl ChannelFraction {
    fn parse(s: &str) -> Result<ChannelFraction, SpwError> {
        let float = |f: &str| {
            f.trim()
                .parse::<f64>()
                .map_err(|_| SpwError::NotAFraction(f.to_string()))
        };
        match s.split_once('~') {
            Some((lo, hi)) => {
                let (lo, hi) = (float(lo)?, float(hi)?);
                if !(0.0..1.0).contains(&lo) || !(0.0 < hi && hi <= 1.0) || lo >= hi {
                    return Err(SpwError::BadRange(lo, hi));
                }
                Ok(ChannelFraction::Range(lo, hi))
            }
            None => {
                let f = float(s)?;
                if !(0.0 < f && f < 0.5) {
                    return Err(SpwError::BadEdgeFraction(f));
                }
                Ok(ChannelFraction::Edges(f))
            }
        }
    }

    /// The channel range as `first~last` for a sub-band of `num_chans`
    /// channels. Channels are numbered from 0, so `last` is at most
    /// `num_chans - 1`.
    pub fn channels(self, num_chans: u32) -> String {
        let n = f64::from(num_chans);
        let last_chan = f64::from(num_chans.saturating_sub(1));
        let (lo, hi) = match self {
            ChannelFraction::Edges(f) => ((n * f).ceil(), (n * (1.0 - f)).floor()),
            ChannelFraction::Range(lo, hi) => ((n * lo).ceil(), (n * hi).floor()),
        };
        format!("{}~{}", lo.min(last_chan) as u32, hi.min(last_chan) as u32)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpwSelection {
    /// Passed to the engine as-is.
    Literal(String),

    /// A channel fraction applied to the given sub-band selection.
    Fractional {
        subbands: String,
        fraction: ChannelFraction,
    },
}

impl SpwSelection {
    /// The selection in the engine's syntax.
    pub fn resolve(&self, num_chans: u32) -> String {
        match self {
            SpwSelection::Literal(s) => s.clone(),
            SpwSelection::Fractional { subbands, fraction } => {
                format!("{subbands}:{}", fraction.channels(num_chans))
            }
        }
    }
}

impl FromStr for SpwSelection {
    type Err = SpwError;

    fn from_str(s: &str) -> Result<SpwSelection, SpwError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SpwError::Empty);
        }
        // A bare float applies to every sub-band. A bare integer is a
        // sub-band number.
        if s.contains('.') && !s.contains(':') {
            return Ok(SpwSelection::Fractional {
                subbands: "*".to_string(),
                fraction: ChannelFraction::parse(s)?,
            });
        }
        match s.split_once(':') {
            Some((subbands, channels)) if channels.contains('.') => {
                if channels.contains(':') {
                    return Err(SpwError::Unsupported(s.to_string()));
                }
                Ok(SpwSelection::Fractional {
                    subbands: subbands.to_string(),
                    fraction: ChannelFraction::parse(channels)?,
                })
            }
            _ => Ok(SpwSelection::Literal(s.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum SpwError {
    #[error("Empty spectral-window selection")]
    Empty,

    #[error("'{0}' is not a channel fraction")]
    NotAFraction(String),

    #[error("Edge fraction {0} must be greater than 0 and less than 0.5")]
    BadEdgeFraction(f64),

    #[error("Channel fraction range {0}~{1} must satisfy 0 <= start < end <= 1")]
    BadRange(f64, f64),

    #[error("Fractional channel selections can't be combined with other selections: '{0}'")]
    Unsupported(String),
}
