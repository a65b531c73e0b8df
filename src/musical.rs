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

//! Musical time. Every duration used by the engine derives from [`MusicalClock`].

const SECONDS_PER_MINUTE: f64 = 60.0;

/// Maps a tempo and a bar layout onto wall-clock durations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MusicalClock {
    tempo: f64,
    beats_per_bar: u32,
    bars: u32,
}

impl MusicalClock {
    /// Creates a new musical clock. The tempo must be positive; beats per bar and bars are
    /// clamped to at least 1.
    pub fn new(tempo: f64, beats_per_bar: u32, bars: u32) -> MusicalClock {
        MusicalClock {
            tempo,
            beats_per_bar: beats_per_bar.max(1),
            bars: bars.max(1),
        }
    }

    /// The tempo in beats per minute.
    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// The number of beats in one bar.
    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    /// The number of bars in one cycle.
    pub fn bars(&self) -> u32 {
        self.bars
    }

    /// Returns a copy of this clock with a different bar count.
    pub fn with_bars(&self, bars: u32) -> MusicalClock {
        MusicalClock::new(self.tempo, self.beats_per_bar, bars)
    }

    /// Returns a copy of this clock with a different tempo.
    pub fn with_tempo(&self, tempo: f64) -> MusicalClock {
        MusicalClock::new(tempo, self.beats_per_bar, self.bars)
    }

    /// Seconds per beat.
    pub fn beat_duration(&self) -> f64 {
        SECONDS_PER_MINUTE / self.tempo
    }

    /// Seconds per bar.
    pub fn bar_duration(&self) -> f64 {
        self.beats_per_bar as f64 * self.beat_duration()
    }

    /// Seconds per cycle, i.e. `bars * beats_per_bar * 60 / tempo`.
    pub fn cycle_duration(&self) -> f64 {
        self.bars as f64 * self.bar_duration()
    }

    /// Number of beats in one cycle.
    pub fn beats_per_cycle(&self) -> u32 {
        self.beats_per_bar * self.bars
    }
}

/// Converts a bar and beat count to seconds at the given tempo.
pub fn bars_beats_to_seconds(bars: u32, beats: u32, tempo: f64, beats_per_bar: u32) -> f64 {
    (bars as f64 * beats_per_bar as f64 + beats as f64) * (SECONDS_PER_MINUTE / tempo)
}
