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

//! Procedural drum patterns.
//!
//! Every cycle, each enabled instrument gets a hit grid. All grids derive from one
//! canonical grid whose resolution is set by the largest tempo multiplier in use, so
//! instruments at different resolutions still cover exactly one cycle.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use rand::{rngs::StdRng, Rng};
use serde::Deserialize;
use tracing::debug;

use crate::musical::MusicalClock;

mod templates;
mod variant;

pub use templates::TemplateLibrary;
pub use variant::{VariantRange, VariantRotation};

/// The chance of an extra hit on an empty step when hit variation is on.
pub const VARIATION_PROBABILITY: f64 = 0.1;

fn default_probability() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

/// Per-instrument generation settings.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct InstrumentConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// The chance each template hit is kept.
    #[serde(default = "default_probability", alias = "probability")]
    pub hit_probability: f64,
    /// Tempo multiplier variants, rotated over time.
    #[serde(default, alias = "multipliers")]
    pub tempo_multipliers: Vec<u32>,
}

impl InstrumentConfig {
    /// An enabled instrument that plays every template hit at multiplier 1.
    pub fn new() -> InstrumentConfig {
        InstrumentConfig {
            enabled: true,
            hit_probability: 1.0,
            tempo_multipliers: Vec::new(),
        }
    }

    pub fn with_probability(&self, hit_probability: f64) -> InstrumentConfig {
        InstrumentConfig {
            hit_probability,
            ..self.clone()
        }
    }

    pub fn with_multipliers(&self, tempo_multipliers: &[u32]) -> InstrumentConfig {
        InstrumentConfig {
            tempo_multipliers: tempo_multipliers.to_vec(),
            ..self.clone()
        }
    }

    pub fn disabled(&self) -> InstrumentConfig {
        InstrumentConfig {
            enabled: false,
            ..self.clone()
        }
    }

    /// The largest configured multiplier, or 1.
    pub fn max_multiplier(&self) -> u32 {
        self.tempo_multipliers.iter().copied().max().unwrap_or(1)
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Randomness switches.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Randomness {
    /// Pick templates at random instead of always using the first one.
    #[serde(default)]
    pub pattern_selection: bool,
    /// Inject extra hits into empty steps outside of fills.
    #[serde(default)]
    pub hit_variation: bool,
}

/// Decides which cycles are fills.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct FillPolicy {
    /// A fill may happen on the last cycle of every `period` cycles.
    pub period: u64,
    /// The chance that an eligible cycle is a fill.
    pub probability: f64,
}

impl Default for FillPolicy {
    fn default() -> Self {
        FillPolicy {
            period: 4,
            probability: 0.5,
        }
    }
}

/// Generator tunables.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeneratorSettings {
    pub fill: FillPolicy,
    pub variant_range: VariantRange,
    pub variation_probability: f64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        GeneratorSettings {
            fill: FillPolicy::default(),
            variant_range: VariantRange::default(),
            variation_probability: VARIATION_PROBABILITY,
        }
    }
}

/// The hit grid of one instrument for one cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct InstrumentGrid {
    pub steps: Vec<bool>,
    pub step_duration: f64,
    pub tempo_multiplier: u32,
}

impl InstrumentGrid {
    /// The wall-clock time the grid covers.
    pub fn total_duration(&self) -> f64 {
        self.steps.len() as f64 * self.step_duration
    }

    pub fn hit_count(&self) -> usize {
        self.steps.iter().filter(|step| **step).count()
    }
}

/// The grids of every enabled instrument for one cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleGrids {
    pub cycle_duration: f64,
    pub bars: u32,
    /// The resolution of the canonical grid.
    pub canonical_steps: usize,
    pub fill: bool,
    pub instruments: BTreeMap<String, InstrumentGrid>,
}

impl fmt::Display for CycleGrids {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} bars, {:.3}s{}",
            self.bars,
            self.cycle_duration,
            if self.fill { " (fill)" } else { "" }
        )?;
        for (key, grid) in self.instruments.iter() {
            let steps: String = grid
                .steps
                .iter()
                .map(|step| if *step { 'x' } else { '.' })
                .collect();
            writeln!(f, "  {:<9} x{} {}", key, grid.tempo_multiplier, steps)?;
        }
        Ok(())
    }
}

/// Places one-bar templates onto a grid of `steps_per_bar * bars` steps. Each template hit
/// lands on the step nearest below its position in the bar.
pub fn expand_template(template: &[bool], steps_per_bar: usize, bars: usize) -> Vec<bool> {
    let mut grid = vec![false; steps_per_bar * bars];
    if template.is_empty() || steps_per_bar == 0 {
        return grid;
    }

    for bar in 0..bars {
        for (j, hit) in template.iter().enumerate() {
            if *hit {
                grid[bar * steps_per_bar + j * steps_per_bar / template.len()] = true;
            }
        }
    }
    grid
}

/// Keeps every `factor`th step.
pub fn downsample(grid: &[bool], factor: usize) -> Vec<bool> {
    grid.iter().step_by(factor.max(1)).copied().collect()
}

/// Nearest-index decimation to an arbitrary length.
pub fn resample(grid: &[bool], length: usize) -> Vec<bool> {
    if grid.is_empty() {
        return vec![false; length];
    }
    (0..length).map(|j| grid[j * grid.len() / length]).collect()
}

fn probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// Generates hit grids cycle by cycle.
pub struct PatternGenerator {
    rng: StdRng,
    library: TemplateLibrary,
    settings: GeneratorSettings,
    rotations: HashMap<String, VariantRotation>,
}

impl PatternGenerator {
    /// Creates a new pattern generator.
    pub fn new(
        rng: StdRng,
        library: TemplateLibrary,
        settings: GeneratorSettings,
    ) -> PatternGenerator {
        PatternGenerator {
            rng,
            library,
            settings,
            rotations: HashMap::new(),
        }
    }

    /// Decides whether a cycle is a fill.
    pub fn is_fill_cycle(&mut self, cycle: u64) -> bool {
        let period = self.settings.fill.period;
        if period == 0 || (cycle + 1) % period != 0 {
            return false;
        }
        self.rng.gen_bool(probability(self.settings.fill.probability))
    }

    /// Decides whether the cycle is a fill and generates its grids.
    pub fn next_cycle(
        &mut self,
        cycle: u64,
        instruments: &BTreeMap<String, InstrumentConfig>,
        randomness: Randomness,
        clock: &MusicalClock,
    ) -> CycleGrids {
        let is_fill = self.is_fill_cycle(cycle);
        self.generate(instruments, randomness, clock, is_fill)
    }

    /// Generates the grids of one cycle.
    pub fn generate(
        &mut self,
        instruments: &BTreeMap<String, InstrumentConfig>,
        randomness: Randomness,
        clock: &MusicalClock,
        is_fill: bool,
    ) -> CycleGrids {
        let enabled: Vec<(&String, &InstrumentConfig)> = instruments
            .iter()
            .filter(|(_, config)| config.enabled)
            .collect();

        let max_multiplier = enabled
            .iter()
            .map(|(_, config)| config.max_multiplier())
            .max()
            .unwrap_or(1)
            .max(1) as usize;
        let bars = clock.bars() as usize;
        let steps_per_bar = clock.beats_per_bar() as usize * max_multiplier;
        let canonical_steps = steps_per_bar * bars;
        let cycle_duration = clock.cycle_duration();

        let mut grids = BTreeMap::new();
        for (key, config) in enabled {
            let multiplier = self
                .rotations
                .get(key.as_str())
                .map(|rotation| rotation.current(&config.tempo_multipliers))
                .unwrap_or_else(|| VariantRotation::default().current(&config.tempo_multipliers))
                .max(1);

            let canonical = self.canonical_grid(key, randomness, is_fill, steps_per_bar, bars);
            let steps_len = clock.beats_per_cycle() as usize * multiplier as usize;
            let mut steps = if max_multiplier % multiplier as usize == 0 {
                downsample(&canonical, max_multiplier / multiplier as usize)
            } else {
                resample(&canonical, steps_len)
            };

            let keep = probability(config.hit_probability);
            for step in steps.iter_mut().filter(|step| **step) {
                *step = self.rng.gen_bool(keep);
            }

            if randomness.hit_variation && !is_fill {
                let inject = probability(self.settings.variation_probability);
                for step in steps.iter_mut().filter(|step| !**step) {
                    *step = self.rng.gen_bool(inject);
                }
            }

            let step_count = steps.len();
            self.rotations.entry(key.clone()).or_default().advance(
                step_count as u32,
                &config.tempo_multipliers,
                &self.settings.variant_range,
                &mut self.rng,
            );

            grids.insert(
                key.clone(),
                InstrumentGrid {
                    steps,
                    step_duration: cycle_duration / step_count.max(1) as f64,
                    tempo_multiplier: multiplier,
                },
            );
        }

        debug!(
            bars,
            canonical_steps,
            fill = is_fill,
            instruments = grids.len(),
            "Generated cycle grids"
        );

        CycleGrids {
            cycle_duration,
            bars: clock.bars(),
            canonical_steps,
            fill: is_fill,
            instruments: grids,
        }
    }

    /// Picks a template and places it on the canonical grid. Instruments without templates
    /// hit every step.
    fn canonical_grid(
        &mut self,
        key: &str,
        randomness: Randomness,
        is_fill: bool,
        steps_per_bar: usize,
        bars: usize,
    ) -> Vec<bool> {
        let choices = self.library.choices(key, is_fill);
        if choices.is_empty() {
            return vec![true; steps_per_bar * bars];
        }

        let index = if randomness.pattern_selection {
            self.rng.gen_range(0..choices.len())
        } else {
            0
        };
        expand_template(&choices[index], steps_per_bar, bars)
    }
}

#[cfg(test)]
mod test {
    use rand::SeedableRng;

    use super::*;

    fn generator(library: TemplateLibrary) -> PatternGenerator {
        PatternGenerator::new(
            StdRng::seed_from_u64(42),
            library,
            GeneratorSettings::default(),
        )
    }

    fn instruments(entries: &[(&str, InstrumentConfig)]) -> BTreeMap<String, InstrumentConfig> {
        entries
            .iter()
            .map(|(key, config)| (key.to_string(), config.clone()))
            .collect()
    }

    #[test]
    fn test_single_instrument_at_120() {
        let mut generator = generator(TemplateLibrary::empty());
        let clock = MusicalClock::new(120.0, 4, 4);
        let grids = generator.generate(
            &instruments(&[("kick", InstrumentConfig::new().with_multipliers(&[1]))]),
            Randomness::default(),
            &clock,
            false,
        );

        let kick = &grids.instruments["kick"];
        assert_eq!(16, kick.steps.len());
        assert!(kick.steps.iter().all(|step| *step));
        // Steps always fill the cycle: 16 steps over an 8 s cycle are 0.5 s each.
        assert_eq!(0.5, kick.step_duration);
        assert_eq!(8.0, kick.total_duration());
        assert_eq!(8.0, grids.cycle_duration);
        assert_eq!(16, grids.canonical_steps);
    }

    #[test]
    fn test_durations_match_for_any_multipliers() {
        let combos: &[&[u32]] = &[&[1], &[2], &[3], &[1, 2], &[4, 3], &[5], &[2, 7]];
        for tempo in [73.0, 120.0, 171.0] {
            for bars in [1, 3, 4] {
                let clock = MusicalClock::new(tempo, 4, bars);
                let mut generator = generator(TemplateLibrary::builtin());
                let config = instruments(&[
                    ("kick", InstrumentConfig::new().with_multipliers(combos[0])),
                    ("snare", InstrumentConfig::new().with_multipliers(combos[1])),
                    ("hihat", InstrumentConfig::new().with_multipliers(combos[2])),
                    ("rimshot", InstrumentConfig::new().with_multipliers(combos[3])),
                    ("floortom", InstrumentConfig::new().with_multipliers(combos[4])),
                    ("hightom", InstrumentConfig::new().with_multipliers(combos[6])),
                ]);
                for _ in 0..8 {
                    let grids =
                        generator.generate(&config, Randomness::default(), &clock, false);
                    for grid in grids.instruments.values() {
                        assert!(
                            (grid.total_duration() - clock.cycle_duration()).abs() < 1e-9,
                            "grid of {} steps covers {} instead of {}",
                            grid.steps.len(),
                            grid.total_duration(),
                            clock.cycle_duration()
                        );
                        assert_eq!(
                            clock.beats_per_cycle() as usize * grid.tempo_multiplier as usize,
                            grid.steps.len()
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_downsample_all_ones() {
        for n in [1, 7, 16, 32, 48] {
            for factor in 1..=6 {
                let grid = downsample(&vec![true; n], factor);
                assert_eq!(n.div_ceil(factor), grid.iter().filter(|s| **s).count());
            }
        }
    }

    #[test]
    fn test_resample() {
        let grid = [true, false, true, false, true, false];
        assert_eq!(vec![true, true, true], resample(&grid, 3));
        assert_eq!(vec![false; 4], resample(&[], 4));
    }

    #[test]
    fn test_expand_template() {
        let grid = expand_template(&[true, false, true, false], 8, 2);
        assert_eq!(16, grid.len());
        let hits: Vec<usize> = (0..16).filter(|i| grid[*i]).collect();
        assert_eq!(vec![0, 4, 8, 12], hits);

        let dense = expand_template(&[true; 32], 4, 1);
        assert_eq!(vec![true; 4], dense);
    }

    #[test]
    fn test_hit_probability_bounds() {
        let clock = MusicalClock::new(100.0, 4, 4);
        let mut generator = generator(TemplateLibrary::builtin());
        let template = expand_template(&TemplateLibrary::builtin().standard("snare")[0], 4, 4);

        for _ in 0..10 {
            let never = generator.generate(
                &instruments(&[("snare", InstrumentConfig::new().with_probability(0.0))]),
                Randomness::default(),
                &clock,
                false,
            );
            assert_eq!(0, never.instruments["snare"].hit_count());

            let always = generator.generate(
                &instruments(&[("snare", InstrumentConfig::new().with_probability(1.0))]),
                Randomness::default(),
                &clock,
                false,
            );
            assert_eq!(template, always.instruments["snare"].steps);
        }
    }

    #[test]
    fn test_fills_never_vary() {
        let clock = MusicalClock::new(100.0, 4, 4);
        let mut generator = PatternGenerator::new(
            StdRng::seed_from_u64(5),
            TemplateLibrary::builtin(),
            GeneratorSettings {
                variation_probability: 1.0,
                ..GeneratorSettings::default()
            },
        );
        let config = instruments(&[("snare", InstrumentConfig::new().with_probability(0.0))]);
        let randomness = Randomness {
            pattern_selection: false,
            hit_variation: true,
        };

        let fill = generator.generate(&config, randomness, &clock, true);
        assert!(fill.fill);
        assert_eq!(0, fill.instruments["snare"].hit_count());

        let varied = generator.generate(&config, randomness, &clock, false);
        assert_eq!(16, varied.instruments["snare"].hit_count());
    }

    #[test]
    fn test_fill_cycles() {
        let mut generator = PatternGenerator::new(
            StdRng::seed_from_u64(5),
            TemplateLibrary::builtin(),
            GeneratorSettings {
                fill: FillPolicy {
                    period: 4,
                    probability: 1.0,
                },
                ..GeneratorSettings::default()
            },
        );
        let fills: Vec<u64> = (0..12).filter(|c| generator.is_fill_cycle(*c)).collect();
        assert_eq!(vec![3, 7, 11], fills);

        let mut never = PatternGenerator::new(
            StdRng::seed_from_u64(5),
            TemplateLibrary::builtin(),
            GeneratorSettings {
                fill: FillPolicy {
                    period: 4,
                    probability: 0.0,
                },
                ..GeneratorSettings::default()
            },
        );
        assert!((0..12).all(|c| !never.is_fill_cycle(c)));
    }

    #[test]
    fn test_fill_uses_fill_templates() {
        let clock = MusicalClock::new(100.0, 4, 1);
        let mut generator = generator(TemplateLibrary::builtin());
        let config = instruments(&[("snare", InstrumentConfig::new())]);
        let grids = generator.generate(&config, Randomness::default(), &clock, true);
        assert_eq!(
            vec![false, true, true, true],
            grids.instruments["snare"].steps
        );
    }

    #[test]
    fn test_disabled_instruments_are_skipped() {
        let clock = MusicalClock::new(100.0, 4, 2);
        let mut generator = generator(TemplateLibrary::builtin());
        let grids = generator.generate(
            &instruments(&[
                ("kick", InstrumentConfig::new()),
                ("snare", InstrumentConfig::new().with_multipliers(&[8]).disabled()),
            ]),
            Randomness::default(),
            &clock,
            false,
        );
        assert_eq!(1, grids.instruments.len());
        assert_eq!(8, grids.canonical_steps);
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let clock = MusicalClock::new(128.0, 4, 4);
        let config = instruments(&[
            ("kick", InstrumentConfig::new().with_probability(0.7)),
            ("hihat", InstrumentConfig::new().with_multipliers(&[2, 1])),
        ]);
        let randomness = Randomness {
            pattern_selection: true,
            hit_variation: true,
        };

        let mut a = generator(TemplateLibrary::builtin());
        let mut b = generator(TemplateLibrary::builtin());
        for cycle in 0..6 {
            assert_eq!(
                a.next_cycle(cycle, &config, randomness, &clock),
                b.next_cycle(cycle, &config, randomness, &clock)
            );
        }
    }
}
