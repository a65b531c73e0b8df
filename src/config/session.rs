// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use serde::Deserialize;

use super::error::ConfigError;

fn default_tempo() -> u32 {
    120
}

fn default_four() -> u32 {
    4
}

fn default_gain() -> f64 {
    1.0
}

/// The musical settings of a session.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Session {
    /// Tempo in beats per minute.
    #[serde(default = "default_tempo")]
    pub tempo: u32,
    #[serde(default = "default_four")]
    pub beats_per_bar: u32,
    /// Bars per cycle when no loop sets the length.
    #[serde(default = "default_four")]
    pub bars: u32,
    /// Delay of odd steps as a fraction of a step.
    #[serde(default)]
    pub swing: f64,
    #[serde(default = "default_gain")]
    pub output_gain: f64,
    /// Seeds all random choices for a reproducible session.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for Session {
    fn default() -> Self {
        Session {
            tempo: default_tempo(),
            beats_per_bar: default_four(),
            bars: default_four(),
            swing: 0.0,
            output_gain: default_gain(),
            seed: None,
        }
    }
}

impl Session {
    /// Checks the values that can't be represented by the types alone.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tempo == 0 {
            return Err(ConfigError::Invalid("tempo must be positive".to_string()));
        }
        if self.beats_per_bar == 0 {
            return Err(ConfigError::Invalid(
                "beats_per_bar must be positive".to_string(),
            ));
        }
        if self.bars == 0 {
            return Err(ConfigError::Invalid("bars must be positive".to_string()));
        }
        if !self.output_gain.is_finite() || self.output_gain < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "output_gain {} must be a non-negative number",
                self.output_gain
            )));
        }
        Ok(())
    }
}
