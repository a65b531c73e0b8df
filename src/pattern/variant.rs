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
use rand::Rng;
use serde::Deserialize;

/// The range the number of steps between variant changes is drawn from.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct VariantRange {
    pub min: u32,
    pub max: u32,
}

impl VariantRange {
    pub fn new(min: u32, max: u32) -> VariantRange {
        VariantRange { min, max }
    }

    /// Draws a step count from the range. Never returns zero.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> u32 {
        let min = self.min.max(1);
        let max = self.max.max(min);
        rng.gen_range(min..=max)
    }
}

impl Default for VariantRange {
    fn default() -> Self {
        VariantRange::new(16, 64)
    }
}

/// Rotates through the tempo multiplier variants of one instrument.
#[derive(Clone, Debug, Default)]
pub struct VariantRotation {
    index: usize,
    remaining: u32,
}

impl VariantRotation {
    /// The active multiplier. Instruments without variants play at multiplier 1.
    pub fn current(&self, variants: &[u32]) -> u32 {
        if variants.is_empty() {
            return 1;
        }
        variants[self.index % variants.len()]
    }

    /// Counts `steps` played with the active variant, moving to the next variant once the
    /// drawn number of steps has passed.
    pub fn advance<R: Rng>(
        &mut self,
        steps: u32,
        variants: &[u32],
        range: &VariantRange,
        rng: &mut R,
    ) {
        if variants.len() < 2 {
            return;
        }
        if self.remaining == 0 {
            self.remaining = range.draw(rng);
        }

        if steps >= self.remaining {
            self.index = (self.index + 1) % variants.len();
            self.remaining = range.draw(rng);
        } else {
            self.remaining -= steps;
        }
    }
}
