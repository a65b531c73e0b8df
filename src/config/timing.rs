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
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::scheduler::TimingSettings;

/// How far ahead the scheduler looks by default.
const DEFAULT_LOOKAHEAD: Duration = Duration::from_millis(100);

/// How often the scheduler wakes up by default.
const DEFAULT_INTERVAL: Duration = Duration::from_millis(25);

/// The delay between starting and the first event by default.
const DEFAULT_START_DELAY: Duration = Duration::from_millis(100);

const DEFAULT_ITERATION_WINDOWS: usize = 4;

/// Scheduler timing. Durations are human readable strings such as "100ms".
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Timing {
    lookahead: Option<String>,
    interval: Option<String>,
    start_delay: Option<String>,
    /// How many loop iterations are planned ahead.
    iteration_windows: Option<usize>,
}

impl Timing {
    #[cfg(test)]
    pub fn new(lookahead: &str, interval: &str) -> Timing {
        Timing {
            lookahead: Some(lookahead.to_string()),
            interval: Some(interval.to_string()),
            start_delay: None,
            iteration_windows: None,
        }
    }

    /// The scheduler timing settings.
    pub fn settings(&self) -> Result<TimingSettings, ConfigError> {
        Ok(TimingSettings::new(
            parse_duration(&self.lookahead, DEFAULT_LOOKAHEAD)?,
            parse_duration(&self.interval, DEFAULT_INTERVAL)?,
            parse_duration(&self.start_delay, DEFAULT_START_DELAY)?,
        )?)
    }

    /// The number of loop iterations planned ahead.
    pub fn iteration_windows(&self) -> Result<usize, ConfigError> {
        match self.iteration_windows {
            Some(0) => Err(ConfigError::Invalid(
                "iteration_windows must be positive".to_string(),
            )),
            Some(windows) => Ok(windows),
            None => Ok(DEFAULT_ITERATION_WINDOWS),
        }
    }
}

fn parse_duration(value: &Option<String>, default: Duration) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => match DurationString::from_string(value.clone()) {
            Ok(duration) => Ok(duration.into()),
            Err(e) => Err(ConfigError::Duration {
                value: value.clone(),
                reason: e.to_string(),
            }),
        },
        None => Ok(default),
    }
}
