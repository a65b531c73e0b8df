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
use crate::pattern::{
    FillPolicy, GeneratorSettings, Randomness, VariantRange, VARIATION_PROBABILITY,
};

/// Pattern generation tunables.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Generator {
    /// A fill may happen on the last cycle of every `fill_period` cycles.
    fill_period: Option<u64>,
    fill_probability: Option<f64>,
    /// The chance an empty step gains a hit when hit variation is on.
    variation_probability: Option<f64>,
    variant_min: Option<u32>,
    variant_max: Option<u32>,
    #[serde(default)]
    pattern_selection: bool,
    #[serde(default)]
    hit_variation: bool,
    /// Pick loop samples at random among the candidates.
    #[serde(default)]
    random_samples: bool,
}

impl Generator {
    /// The generator settings.
    pub fn settings(&self) -> Result<GeneratorSettings, ConfigError> {
        let fill_defaults = FillPolicy::default();
        let range_defaults = VariantRange::default();

        let period = self.fill_period.unwrap_or(fill_defaults.period);
        if period == 0 {
            return Err(ConfigError::Invalid(
                "fill_period must be positive".to_string(),
            ));
        }
        let fill_probability = probability(
            "fill_probability",
            self.fill_probability.unwrap_or(fill_defaults.probability),
        )?;
        let variation_probability = probability(
            "variation_probability",
            self.variation_probability.unwrap_or(VARIATION_PROBABILITY),
        )?;

        let min = self.variant_min.unwrap_or(range_defaults.min);
        let max = self.variant_max.unwrap_or(range_defaults.max.max(min));
        if min == 0 || min > max {
            return Err(ConfigError::Invalid(format!(
                "variant range {}..{} is empty",
                min, max
            )));
        }

        Ok(GeneratorSettings {
            fill: FillPolicy {
                period,
                probability: fill_probability,
            },
            variant_range: VariantRange::new(min, max),
            variation_probability,
        })
    }

    pub fn randomness(&self) -> Randomness {
        Randomness {
            pattern_selection: self.pattern_selection,
            hit_variation: self.hit_variation,
        }
    }

    pub fn random_samples(&self) -> bool {
        self.random_samples
    }
}

fn probability(name: &str, value: f64) -> Result<f64, ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid(format!(
            "{} {} is outside [0, 1]",
            name, value
        )))
    }
}
