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

//! Phase alignment of pre-recorded loops.
//!
//! A loop recorded at one tempo is played at the session tempo by scaling its playback
//! rate. The synchronizer works out that rate, the loop bounds inside the recording, and
//! the wall-clock windows of the next few iterations, which the beat generator uses to
//! pick a bar count that lines up with the loop.

use std::collections::HashMap;

use rand::{rngs::StdRng, Rng};
use tracing::{debug, warn};

use crate::catalog::{SampleCatalog, SampleDescriptor};
use crate::error::ResourceError;
use crate::instrument::{self, Instrument};
use crate::musical::{bars_beats_to_seconds, MusicalClock};
use crate::playback::PlaybackOptions;

/// One iteration of a loop on the session clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IterationWindow {
    pub start: f64,
    pub end: f64,
}

/// A loop that has been planned or scheduled.
#[derive(Clone, Debug, PartialEq)]
pub struct LoopHandle {
    /// The loop instrument key.
    pub source_key: String,
    /// The sample being looped.
    pub sample_id: String,
    /// Session clock time the first iteration starts.
    pub start_time: f64,
    /// Loop start in buffer seconds.
    pub loop_start: f64,
    /// Loop end in buffer seconds.
    pub loop_end: f64,
    pub playback_rate: f64,
    pub gain: f64,
    /// The forthcoming iterations, starting at `start_time`.
    pub iteration_schedule: Vec<IterationWindow>,
    window_count: usize,
}

impl LoopHandle {
    /// Creates a loop handle. `bounds` are the loop start and end in buffer seconds.
    pub fn new(
        source_key: &str,
        sample_id: &str,
        start_time: f64,
        bounds: (f64, f64),
        playback_rate: f64,
        gain: f64,
        windows: usize,
    ) -> LoopHandle {
        let mut handle = LoopHandle {
            source_key: source_key.to_string(),
            sample_id: sample_id.to_string(),
            start_time,
            loop_start: bounds.0,
            loop_end: bounds.1,
            playback_rate,
            gain,
            iteration_schedule: Vec::new(),
            window_count: windows,
        };
        handle.iteration_schedule = handle.windows();
        handle
    }

    fn windows(&self) -> Vec<IterationWindow> {
        let duration = self.adjusted_duration();
        if duration <= 0.0 {
            return Vec::new();
        }
        (0..self.window_count)
            .map(|i| IterationWindow {
                start: self.start_time + i as f64 * duration,
                end: self.start_time + (i + 1) as f64 * duration,
            })
            .collect()
    }

    /// The wall-clock length of one iteration at the handle's playback rate.
    pub fn adjusted_duration(&self) -> f64 {
        if self.playback_rate <= 0.0 {
            return 0.0;
        }
        ((self.loop_end - self.loop_start) / self.playback_rate).max(0.0)
    }

    /// Returns a copy fitted to the decoded buffer. An unknown loop end becomes the
    /// trimmed end of the buffer, and a loop end past the end of the buffer is clamped.
    pub fn fit_to_buffer(&self, sample: &SampleDescriptor, buffer_duration: f64) -> LoopHandle {
        let mut loop_end = self.loop_end;
        if loop_end <= self.loop_start {
            loop_end = (buffer_duration - sample.trim_end).max(self.loop_start);
        }
        if loop_end > buffer_duration {
            warn!(
                key = %self.source_key,
                sample = %self.sample_id,
                loop_end,
                buffer_duration,
                "Loop end exceeds buffer duration, clamping to buffer end"
            );
            loop_end = buffer_duration;
        }

        LoopHandle::new(
            &self.source_key,
            &self.sample_id,
            self.start_time,
            (self.loop_start, loop_end),
            self.playback_rate,
            self.gain,
            self.window_count,
        )
    }

    /// The loop length in session bars, or `None` if the length is not known yet.
    pub fn musical_bars(&self, clock: &MusicalClock) -> Option<u32> {
        let duration = self.adjusted_duration();
        if duration <= 0.0 {
            return None;
        }
        Some(((duration / clock.bar_duration()).round() as u32).max(1))
    }

    /// The first iteration boundary at or after `time`.
    pub fn next_boundary(&self, time: f64) -> f64 {
        let duration = self.adjusted_duration();
        if duration <= 0.0 || time <= self.start_time {
            return self.start_time.max(time);
        }
        let iterations = ((time - self.start_time) / duration).ceil();
        self.start_time + iterations * duration
    }

    /// The options to hand to the playback port.
    pub fn options(&self) -> PlaybackOptions {
        PlaybackOptions::looped(self.loop_start, self.loop_end, self.playback_rate, self.gain)
    }
}

/// Chooses loop samples and plans their playback.
pub struct LoopSynchronizer {
    rng: StdRng,
    /// Whether loop samples are picked at random among the candidates.
    random_samples: bool,
    /// How many iteration windows each handle precomputes.
    iteration_windows: usize,
    /// The sample chosen for each key. A key keeps its sample until it is released.
    selected: HashMap<String, SampleDescriptor>,
    /// Handles of the loops that are scheduled.
    scheduled: HashMap<String, LoopHandle>,
}

impl LoopSynchronizer {
    /// Creates a new loop synchronizer.
    pub fn new(rng: StdRng, random_samples: bool, iteration_windows: usize) -> LoopSynchronizer {
        LoopSynchronizer {
            rng,
            random_samples,
            iteration_windows: iteration_windows.max(1),
            selected: HashMap::new(),
            scheduled: HashMap::new(),
        }
    }

    /// Picks the sample for a loop instrument.
    pub fn select(
        &mut self,
        catalog: &dyn SampleCatalog,
        instrument: &Instrument,
    ) -> Result<SampleDescriptor, ResourceError> {
        if let Some(sample) = self.selected.get(instrument.key) {
            return Ok(sample.clone());
        }

        let candidates = catalog.candidates(instrument.category, instrument.key);
        if candidates.is_empty() {
            return Err(ResourceError::MissingSample {
                category: instrument.category.to_string(),
                kind: instrument.key.to_string(),
            });
        }

        let index = if self.random_samples {
            self.rng.gen_range(0..candidates.len())
        } else {
            0
        };
        let sample = candidates[index].clone();
        debug!(
            key = instrument.key,
            sample = sample.display_name(),
            candidates = candidates.len(),
            "Selected loop sample"
        );
        self.selected
            .insert(instrument.key.to_string(), sample.clone());
        Ok(sample)
    }

    /// The playback rate that plays the sample at the session tempo. Falls back to the
    /// sample's base rate when the tempo relation is unknown or nonsensical.
    pub fn playback_rate(sample: &SampleDescriptor, tempo: f64) -> f64 {
        let base = if sample.playback_rate > 0.0 && sample.playback_rate.is_finite() {
            sample.playback_rate
        } else {
            1.0
        };

        let native = match sample.native_tempo {
            Some(native) if native > 0.0 && native.is_finite() => native,
            _ => {
                warn!(
                    sample = sample.display_name(),
                    "No usable native tempo, playing at base rate"
                );
                return base;
            }
        };

        let rate = base * (tempo / native);
        if rate <= 0.0 || !rate.is_finite() {
            warn!(
                sample = sample.display_name(),
                tempo,
                native_tempo = native,
                "Computed playback rate is invalid, falling back to 1.0"
            );
            return 1.0;
        }
        rate
    }

    /// The loop bounds in buffer seconds. The end equals the start when the length is not
    /// known until the buffer is decoded.
    pub fn loop_bounds(sample: &SampleDescriptor) -> (f64, f64) {
        let loop_start = sample.trim_start.max(0.0);
        let trimmed_end = sample
            .duration
            .map(|duration| (duration - sample.trim_end).max(loop_start));

        let musical_end = match (sample.loop_bars, sample.native_tempo) {
            (Some(bars), Some(native)) if native > 0.0 => Some(
                loop_start
                    + bars_beats_to_seconds(bars, sample.loop_beats, native, sample.beats_per_bar),
            ),
            _ => None,
        };

        let loop_end = match (musical_end, trimmed_end) {
            (Some(musical), Some(trimmed)) if musical > trimmed => {
                warn!(
                    sample = sample.display_name(),
                    loop_end = musical,
                    trimmed_end = trimmed,
                    "Loop length exceeds the sample, clamping to the trimmed end"
                );
                trimmed
            }
            (Some(musical), _) => musical,
            (None, Some(trimmed)) => trimmed,
            (None, None) => loop_start,
        };

        (loop_start, loop_end)
    }

    /// Plans a loop without recording it as scheduled.
    pub fn plan(
        &self,
        key: &str,
        sample: &SampleDescriptor,
        start_time: f64,
        tempo: f64,
    ) -> LoopHandle {
        LoopHandle::new(
            key,
            &sample.id,
            start_time,
            LoopSynchronizer::loop_bounds(sample),
            LoopSynchronizer::playback_rate(sample, tempo),
            sample.gain,
            self.iteration_windows,
        )
    }

    /// Plans and records a loop. Returns `None` if the key is already scheduled.
    pub fn schedule(
        &mut self,
        key: &str,
        sample: &SampleDescriptor,
        start_time: f64,
        tempo: f64,
    ) -> Option<LoopHandle> {
        if self.scheduled.contains_key(key) {
            debug!(key, "Loop already scheduled");
            return None;
        }

        let handle = self.plan(key, sample, start_time, tempo);
        self.scheduled.insert(key.to_string(), handle.clone());
        Some(handle)
    }

    /// Replaces the handle of a scheduled loop, e.g. once it has been fitted to its buffer.
    /// Ignored if the key is no longer scheduled.
    pub fn update(&mut self, handle: LoopHandle) {
        if let Some(existing) = self.scheduled.get_mut(&handle.source_key) {
            *existing = handle;
        }
    }

    /// Forgets a loop and its selected sample.
    pub fn release(&mut self, key: &str) -> Option<LoopHandle> {
        self.selected.remove(key);
        self.scheduled.remove(key)
    }

    /// Forgets every scheduled loop. Selected samples are kept so a restart plays the same
    /// material.
    pub fn clear(&mut self) {
        self.scheduled.clear();
    }

    pub fn is_scheduled(&self, key: &str) -> bool {
        self.scheduled.contains_key(key)
    }

    pub fn handle(&self, key: &str) -> Option<&LoopHandle> {
        self.scheduled.get(key)
    }

    /// The largest musical length among the given loops, in session bars. Scheduled loops
    /// use their handle; loops still waiting for their first bar are measured from the
    /// sample they will play.
    pub fn effective_bars<'a>(
        &mut self,
        catalog: &dyn SampleCatalog,
        keys: impl IntoIterator<Item = &'a String>,
        clock: &MusicalClock,
    ) -> Option<u32> {
        let mut bars = None;
        for key in keys {
            let length = match self.scheduled.get(key) {
                Some(handle) => handle.musical_bars(clock),
                None => self.planned_bars(catalog, key, clock),
            };
            bars = bars.max(length);
        }
        bars
    }

    fn planned_bars(
        &mut self,
        catalog: &dyn SampleCatalog,
        key: &str,
        clock: &MusicalClock,
    ) -> Option<u32> {
        let instrument = instrument::lookup_loop(key)?;
        match self.select(catalog, instrument) {
            Ok(sample) => self
                .plan(instrument.key, &sample, 0.0, clock.tempo())
                .musical_bars(clock),
            Err(e) => {
                debug!(key, err = e.to_string(), "Loop length unknown");
                None
            }
        }
    }

    /// The next iteration boundary of any scheduled loop at or after `time`, or `None` if
    /// no loop has a known length.
    pub fn next_boundary(&self, time: f64) -> Option<f64> {
        self.scheduled
            .values()
            .filter(|handle| handle.adjusted_duration() > 0.0)
            .map(|handle| handle.next_boundary(time))
            .min_by(|a, b| a.total_cmp(b))
    }
}

#[cfg(test)]
mod test {
    use rand::SeedableRng;

    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::instrument;

    fn synchronizer() -> LoopSynchronizer {
        LoopSynchronizer::new(StdRng::seed_from_u64(7), false, 4)
    }

    fn rhythm() -> &'static Instrument {
        instrument::lookup_loop("rhythm").expect("rhythm should exist")
    }

    #[test]
    fn test_playback_rate() {
        let sample = SampleDescriptor::new("r", "loop", "rhythm").with_native_tempo(100.0);
        assert_eq!(1.2, LoopSynchronizer::playback_rate(&sample, 120.0));

        let scaled = sample.with_playback_rate(0.5);
        assert_eq!(0.6, LoopSynchronizer::playback_rate(&scaled, 120.0));

        let unknown = SampleDescriptor::new("r", "loop", "rhythm");
        assert_eq!(1.0, LoopSynchronizer::playback_rate(&unknown, 120.0));

        let zero = sample.with_native_tempo(0.0);
        assert_eq!(1.0, LoopSynchronizer::playback_rate(&zero, 120.0));

        let broken = sample.with_playback_rate(-2.0);
        assert_eq!(1.2, LoopSynchronizer::playback_rate(&broken, 120.0));
    }

    #[test]
    fn test_loop_bounds_from_duration() {
        let sample = SampleDescriptor::new("r", "loop", "rhythm")
            .with_duration(5.0)
            .with_trim(0.5, 0.5);
        assert_eq!((0.5, 4.5), LoopSynchronizer::loop_bounds(&sample));

        let unknown = SampleDescriptor::new("r", "loop", "rhythm").with_trim(0.25, 0.0);
        assert_eq!((0.25, 0.25), LoopSynchronizer::loop_bounds(&unknown));
    }

    #[test]
    fn test_loop_bounds_from_bars() {
        let sample = SampleDescriptor::new("r", "loop", "rhythm")
            .with_native_tempo(120.0)
            .with_loop_length(2, 1)
            .with_duration(10.0);
        assert_eq!((0.0, 4.5), LoopSynchronizer::loop_bounds(&sample));

        let clamped = sample.with_loop_length(8, 0);
        assert_eq!((0.0, 10.0), LoopSynchronizer::loop_bounds(&clamped));
    }

    #[test]
    fn test_iteration_windows() {
        let handle = LoopHandle::new("rhythm", "r", 10.0, (0.0, 4.0), 2.0, 1.0, 3);
        assert_eq!(2.0, handle.adjusted_duration());
        assert_eq!(
            vec![
                IterationWindow {
                    start: 10.0,
                    end: 12.0
                },
                IterationWindow {
                    start: 12.0,
                    end: 14.0
                },
                IterationWindow {
                    start: 14.0,
                    end: 16.0
                },
            ],
            handle.iteration_schedule
        );
        assert_eq!(10.0, handle.next_boundary(3.0));
        assert_eq!(12.0, handle.next_boundary(11.0));
        assert_eq!(14.0, handle.next_boundary(14.0));
    }

    #[test]
    fn test_fit_to_buffer() {
        let sample = SampleDescriptor::new("r", "loop", "rhythm").with_trim(0.0, 0.5);
        let unknown = LoopHandle::new("rhythm", "r", 0.0, (0.0, 0.0), 1.0, 1.0, 2);
        assert!(unknown.iteration_schedule.is_empty());

        let fitted = unknown.fit_to_buffer(&sample, 4.5);
        assert_eq!(4.0, fitted.loop_end);
        assert_eq!(2, fitted.iteration_schedule.len());

        let long = LoopHandle::new("rhythm", "r", 0.0, (0.0, 6.0), 1.0, 1.0, 2);
        assert_eq!(4.5, long.fit_to_buffer(&sample, 4.5).loop_end);
    }

    #[test]
    fn test_musical_bars() {
        let clock = MusicalClock::new(120.0, 4, 4);
        let four = LoopHandle::new("rhythm", "r", 0.0, (0.0, 4.0), 1.0, 1.0, 1);
        let six = LoopHandle::new("melody", "m", 0.0, (0.0, 6.0), 1.0, 1.0, 1);
        let short = LoopHandle::new("melody", "m", 0.0, (0.0, 0.5), 1.0, 1.0, 1);
        assert_eq!(Some(2), four.musical_bars(&clock));
        assert_eq!(Some(3), six.musical_bars(&clock));
        assert_eq!(Some(1), short.musical_bars(&clock));
    }

    #[test]
    fn test_schedule_is_idempotent() {
        let mut sync = synchronizer();
        let sample = SampleDescriptor::new("r", "loop", "rhythm").with_duration(4.0);
        let first = sync
            .schedule("rhythm", &sample, 1.0, 120.0)
            .expect("first schedule");
        assert!(sync.schedule("rhythm", &sample, 3.0, 120.0).is_none());
        assert_eq!(Some(&first), sync.handle("rhythm"));

        sync.release("rhythm");
        assert!(!sync.is_scheduled("rhythm"));
        assert!(sync.schedule("rhythm", &sample, 3.0, 120.0).is_some());
    }

    #[test]
    fn test_effective_bars() {
        let catalog = MemoryCatalog::new(vec![]);
        let mut sync = synchronizer();
        let clock = MusicalClock::new(120.0, 4, 4);
        let four = SampleDescriptor::new("r", "loop", "rhythm").with_duration(4.0);
        let six = SampleDescriptor::new("m", "loop", "melody").with_duration(6.0);
        sync.schedule("rhythm", &four, 0.0, 120.0);
        sync.schedule("melody", &six, 0.0, 120.0);

        let keys = vec!["rhythm".to_string(), "melody".to_string()];
        assert_eq!(Some(3), sync.effective_bars(&catalog, keys.iter(), &clock));
        assert_eq!(
            None,
            sync.effective_bars(&catalog, Vec::<String>::new().iter(), &clock)
        );
        assert_eq!(Some(4.0), sync.next_boundary(3.0));
    }

    #[test]
    fn test_effective_bars_of_unscheduled_loops() {
        let catalog = MemoryCatalog::new(vec![
            SampleDescriptor::new("m", "loop", "melody")
                .with_duration(6.0)
                .with_native_tempo(120.0),
            SampleDescriptor::new("r", "loop", "rhythm")
                .with_native_tempo(120.0)
                .with_loop_length(5, 0),
        ]);
        let mut sync = synchronizer();
        let clock = MusicalClock::new(120.0, 4, 4);

        let melody = vec!["melody".to_string()];
        assert_eq!(Some(3), sync.effective_bars(&catalog, melody.iter(), &clock));
        assert!(!sync.is_scheduled("melody"));

        // Explicit loop lengths count even when the sample duration is unknown.
        let keys = vec!["melody".to_string(), "rhythm".to_string()];
        assert_eq!(Some(5), sync.effective_bars(&catalog, keys.iter(), &clock));

        let empty = MemoryCatalog::new(vec![]);
        let mut unselected = synchronizer();
        assert_eq!(None, unselected.effective_bars(&empty, keys.iter(), &clock));
    }

    #[test]
    fn test_select() {
        let catalog = MemoryCatalog::new(vec![
            SampleDescriptor::new("r1", "loop", "rhythm"),
            SampleDescriptor::new("r2", "loop", "rhythm"),
        ]);
        let mut sync = synchronizer();
        let first = sync.select(&catalog, rhythm()).expect("rhythm sample");
        assert_eq!("r1", first.id);

        let mut random = LoopSynchronizer::new(StdRng::seed_from_u64(3), true, 4);
        let picked = random.select(&catalog, rhythm()).expect("rhythm sample");
        assert!(picked.id == "r1" || picked.id == "r2");
        for _ in 0..10 {
            assert_eq!(
                picked.id,
                random.select(&catalog, rhythm()).expect("rhythm sample").id
            );
        }

        let melody = instrument::lookup_loop("melody").expect("melody should exist");
        assert!(matches!(
            sync.select(&catalog, melody),
            Err(ResourceError::MissingSample { .. })
        ));
    }
}
