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

//! Sample metadata and the catalog used to find samples by category and type.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

use crate::error::ResourceError;

fn default_unity() -> f64 {
    1.0
}

fn default_beats_per_bar() -> u32 {
    4
}

/// Metadata for a single sample.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct SampleDescriptor {
    /// Unique identifier of the sample.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Catalog category, e.g. "drum" or "loop".
    pub category: String,
    /// Type within the category, e.g. "kick" or "rhythm".
    #[serde(rename = "type")]
    pub kind: String,
    /// The tempo the sample was recorded at.
    #[serde(default)]
    pub native_tempo: Option<f64>,
    /// Seconds to skip at the start of the audio.
    #[serde(default)]
    pub trim_start: f64,
    /// Seconds to drop at the end of the audio.
    #[serde(default)]
    pub trim_end: f64,
    /// Linear gain.
    #[serde(default = "default_unity")]
    pub gain: f64,
    /// Base playback rate before any tempo adjustment.
    #[serde(default = "default_unity")]
    pub playback_rate: f64,
    /// Length of the loop in bars of the recording's time signature.
    #[serde(default)]
    pub loop_bars: Option<u32>,
    /// Extra beats beyond `loop_bars`.
    #[serde(default)]
    pub loop_beats: u32,
    /// Beats per bar of the recording.
    #[serde(default = "default_beats_per_bar")]
    pub beats_per_bar: u32,
    /// Whether the sample is meant to loop.
    #[serde(default, rename = "loop")]
    pub looped: bool,
    /// Length of the audio in seconds, if known ahead of decoding.
    #[serde(default)]
    pub duration: Option<f64>,
}

impl SampleDescriptor {
    /// Creates a descriptor with default properties.
    pub fn new(id: &str, category: &str, kind: &str) -> SampleDescriptor {
        SampleDescriptor {
            id: id.to_string(),
            name: id.to_string(),
            category: category.to_string(),
            kind: kind.to_string(),
            native_tempo: None,
            trim_start: 0.0,
            trim_end: 0.0,
            gain: 1.0,
            playback_rate: 1.0,
            loop_bars: None,
            loop_beats: 0,
            beats_per_bar: 4,
            looped: false,
            duration: None,
        }
    }

    /// Returns a copy with the given native tempo.
    pub fn with_native_tempo(&self, tempo: f64) -> SampleDescriptor {
        SampleDescriptor {
            native_tempo: Some(tempo),
            ..self.clone()
        }
    }

    /// Returns a copy with the given trim offsets.
    pub fn with_trim(&self, trim_start: f64, trim_end: f64) -> SampleDescriptor {
        SampleDescriptor {
            trim_start,
            trim_end,
            ..self.clone()
        }
    }

    /// Returns a copy with the given duration.
    pub fn with_duration(&self, duration: f64) -> SampleDescriptor {
        SampleDescriptor {
            duration: Some(duration),
            ..self.clone()
        }
    }

    /// Returns a copy with the given loop length.
    pub fn with_loop_length(&self, bars: u32, beats: u32) -> SampleDescriptor {
        SampleDescriptor {
            loop_bars: Some(bars),
            loop_beats: beats,
            ..self.clone()
        }
    }

    /// Returns a copy with the given base playback rate.
    pub fn with_playback_rate(&self, playback_rate: f64) -> SampleDescriptor {
        SampleDescriptor {
            playback_rate,
            ..self.clone()
        }
    }

    /// Returns a copy with the given gain.
    pub fn with_gain(&self, gain: f64) -> SampleDescriptor {
        SampleDescriptor {
            gain,
            ..self.clone()
        }
    }

    /// Returns a copy marked as a loop.
    pub fn looping(&self) -> SampleDescriptor {
        SampleDescriptor {
            looped: true,
            ..self.clone()
        }
    }

    /// The name used in logs.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Finds samples by category and type.
pub trait SampleCatalog: Send + Sync {
    /// All samples matching the category and type, in catalog order.
    fn candidates(&self, category: &str, kind: &str) -> Vec<SampleDescriptor>;

    /// The first sample matching the category and type.
    fn find(&self, category: &str, kind: &str) -> Option<SampleDescriptor> {
        self.candidates(category, kind).into_iter().next()
    }

    /// Like `find`, but returns a resource error when nothing matches.
    fn require(&self, category: &str, kind: &str) -> Result<SampleDescriptor, ResourceError> {
        self.find(category, kind)
            .ok_or_else(|| ResourceError::MissingSample {
                category: category.to_string(),
                kind: kind.to_string(),
            })
    }
}

/// An in-memory catalog indexed by lowercase category and type.
pub struct MemoryCatalog {
    samples: Vec<SampleDescriptor>,
    index: HashMap<(String, String), Vec<usize>>,
}

impl MemoryCatalog {
    /// Creates a new catalog from the given samples.
    pub fn new(samples: Vec<SampleDescriptor>) -> MemoryCatalog {
        let mut index: HashMap<(String, String), Vec<usize>> = HashMap::new();
        for (i, sample) in samples.iter().enumerate() {
            index
                .entry((sample.category.to_lowercase(), sample.kind.to_lowercase()))
                .or_default()
                .push(i);
        }

        MemoryCatalog { samples, index }
    }

    /// The number of samples in the catalog.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the catalog holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Summarizes the catalog contents.
    pub fn summary(&self) -> CatalogSummary {
        let mut categories: Vec<String> = Vec::new();
        let mut types: Vec<String> = Vec::new();
        let mut instruments_by_category: Vec<(String, Vec<String>)> = Vec::new();

        for sample in self.samples.iter() {
            if !categories.contains(&sample.category) {
                categories.push(sample.category.clone());
                instruments_by_category.push((sample.category.clone(), Vec::new()));
            }
            if !types.contains(&sample.kind) {
                types.push(sample.kind.clone());
            }
            if let Some((_, instruments)) = instruments_by_category
                .iter_mut()
                .find(|(category, _)| *category == sample.category)
            {
                if !instruments.contains(&sample.kind) {
                    instruments.push(sample.kind.clone());
                }
            }
        }

        CatalogSummary {
            total_samples: self.samples.len(),
            categories,
            types,
            instruments_by_category,
        }
    }
}

impl SampleCatalog for MemoryCatalog {
    fn candidates(&self, category: &str, kind: &str) -> Vec<SampleDescriptor> {
        self.index
            .get(&(category.to_lowercase(), kind.to_lowercase()))
            .map(|indices| indices.iter().map(|i| self.samples[*i].clone()).collect())
            .unwrap_or_default()
    }
}

/// An overview of what a catalog contains.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSummary {
    pub total_samples: usize,
    pub categories: Vec<String>,
    pub types: Vec<String>,
    pub instruments_by_category: Vec<(String, Vec<String>)>,
}

impl fmt::Display for CatalogSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total samples: {}", self.total_samples)?;
        writeln!(f, "\nCategories:")?;
        for category in self.categories.iter() {
            writeln!(f, "- {}", category)?;
        }
        writeln!(f, "\nTypes:")?;
        for kind in self.types.iter() {
            writeln!(f, "- {}", kind)?;
        }
        writeln!(f, "\nInstruments by category:")?;
        for (category, instruments) in self.instruments_by_category.iter() {
            writeln!(f, "- {}: {}", category, instruments.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new(vec![
            SampleDescriptor::new("kick1", "drum", "kick"),
            SampleDescriptor::new("kick2", "Drum", "Kick"),
            SampleDescriptor::new("snare1", "drum", "snare"),
            SampleDescriptor::new("rhythm1", "loop", "rhythm").looping(),
        ])
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let catalog = catalog();
        let kick = catalog.find("DRUM", "kick").expect("kick should exist");
        assert_eq!("kick1", kick.id);
        assert_eq!(2, catalog.candidates("drum", "KICK").len());
        assert!(catalog.find("drum", "cowbell").is_none());
    }

    #[test]
    fn test_require_missing() {
        let catalog = catalog();
        assert_eq!(
            Err(ResourceError::MissingSample {
                category: "loop".to_string(),
                kind: "melody".to_string()
            }),
            catalog.require("loop", "melody")
        );
    }

    #[test]
    fn test_summary() {
        let summary = catalog().summary();
        assert_eq!(4, summary.total_samples);
        assert_eq!(vec!["drum", "Drum", "loop"], summary.categories);
        assert_eq!(vec!["kick", "Kick", "snare", "rhythm"], summary.types);
        assert_eq!(
            ("drum".to_string(), vec!["kick".to_string(), "snare".to_string()]),
            summary.instruments_by_category[0]
        );
        assert!(summary.to_string().contains("- loop: rhythm"));
    }

    #[test]
    fn test_builder_does_not_alias() {
        let base = SampleDescriptor::new("r", "loop", "rhythm");
        let tuned = base.with_native_tempo(90.0).with_trim(0.1, 0.2);
        assert_eq!(None, base.native_tempo);
        assert_eq!(0.0, base.trim_start);
        assert_eq!(Some(90.0), tuned.native_tempo);
        assert_eq!(0.2, tuned.trim_end);
    }
}
