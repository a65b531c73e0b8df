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
use std::path::Path;

use ::config::{Config, File, FileFormat};
use serde::Deserialize;

use crate::catalog::{MemoryCatalog, SampleDescriptor};
use crate::pattern::{InstrumentConfig, TemplateLibrary};
use crate::session::{validate_settings, SessionOptions};

mod error;
mod generator;
mod patterns;
mod session;
mod timing;

pub use self::error::ConfigError;
pub use self::generator::Generator;
pub use self::patterns::PatternOverride;
pub use self::session::Session;
pub use self::timing::Timing;

/// The configuration of a loopdeck session.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Loopdeck {
    #[serde(default)]
    session: Session,
    #[serde(default)]
    timing: Timing,
    #[serde(default)]
    generator: Generator,
    /// Per-instrument settings. Instruments left out keep their defaults.
    #[serde(default)]
    instruments: BTreeMap<String, InstrumentConfig>,
    /// Template overrides per instrument.
    #[serde(default)]
    patterns: BTreeMap<String, PatternOverride>,
    /// The sample catalog.
    #[serde(default)]
    samples: Vec<SampleDescriptor>,
}

impl Loopdeck {
    /// Parses the configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Loopdeck, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Loopdeck>()?)
    }

    /// Parses the configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Loopdeck, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Loopdeck>()?)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Builds validated session options.
    pub fn session_options(&self) -> Result<SessionOptions, ConfigError> {
        self.session.validate()?;

        let mut instruments = SessionOptions::default().instruments;
        instruments.extend(validate_settings(&self.instruments, self.session.swing)?);

        Ok(SessionOptions {
            tempo: self.session.tempo,
            beats_per_bar: self.session.beats_per_bar,
            bars: self.session.bars,
            swing: self.session.swing,
            output_gain: self.session.output_gain,
            instruments,
            randomness: self.generator.randomness(),
            timing: self.timing.settings()?,
            generator: self.generator.settings()?,
            library: patterns::apply(TemplateLibrary::builtin(), &self.patterns)?,
            seed: self.session.seed,
            random_samples: self.generator.random_samples(),
            iteration_windows: self.timing.iteration_windows()?,
        })
    }

    /// The sample catalog.
    pub fn catalog(&self) -> MemoryCatalog {
        MemoryCatalog::new(self.samples.clone())
    }
}
