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
use std::collections::BTreeMap;

use serde::Deserialize;

use super::error::ConfigError;
use crate::instrument;
use crate::pattern::TemplateLibrary;

/// Replacement templates for one instrument. Each template is one bar of 0/1 steps.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PatternOverride {
    #[serde(default)]
    standard: Option<Vec<Vec<u8>>>,
    #[serde(default)]
    fills: Option<Vec<Vec<u8>>>,
}

/// Applies the overrides to the library.
pub fn apply(
    library: TemplateLibrary,
    overrides: &BTreeMap<String, PatternOverride>,
) -> Result<TemplateLibrary, ConfigError> {
    let mut library = library;
    for (key, patterns) in overrides.iter() {
        if instrument::lookup_step(key).is_none() {
            return Err(ConfigError::Invalid(format!(
                "patterns given for unknown instrument {}",
                key
            )));
        }
        library = library.with_override(
            key,
            to_grids(key, &patterns.standard)?,
            to_grids(key, &patterns.fills)?,
        );
    }
    Ok(library)
}

fn to_grids(
    key: &str,
    templates: &Option<Vec<Vec<u8>>>,
) -> Result<Option<Vec<Vec<bool>>>, ConfigError> {
    let Some(templates) = templates else {
        return Ok(None);
    };

    templates
        .iter()
        .map(|template| {
            if template.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{}: templates need at least one step",
                    key
                )));
            }
            template
                .iter()
                .map(|step| match step {
                    0 => Ok(false),
                    1 => Ok(true),
                    other => Err(ConfigError::Invalid(format!(
                        "{}: template steps are 0 or 1, got {}",
                        key, other
                    ))),
                })
                .collect()
        })
        .collect::<Result<Vec<Vec<bool>>, ConfigError>>()
        .map(Some)
}
