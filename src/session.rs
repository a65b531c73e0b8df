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

//! The session: tempo, instrument settings, and the loop and beat toggles, driving the
//! scheduler.
//!
//! All state lives behind one lock. Ticks and configuration calls take the lock, do their
//! work synchronously, and release it; sample loads happen on spawned tasks that take the
//! lock again only once their audio is ready.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info, span, warn, Level};

use crate::catalog::SampleCatalog;
use crate::clock::ClockSource;
use crate::error::SessionError;
use crate::instrument;
use crate::loopsync::{LoopHandle, LoopSynchronizer};
use crate::musical::MusicalClock;
use crate::pattern::{
    CycleGrids, GeneratorSettings, InstrumentConfig, PatternGenerator, Randomness,
    TemplateLibrary,
};
use crate::playback::{ActivePlaybackSet, Decoder, PlaybackPort, SampleLoader};
use crate::scheduler::{ScheduledEvent, Scheduler, TickContext, TimerTask, TimingSettings};

mod dispatch;

use dispatch::LoadRequest;

/// Everything a session starts with.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub tempo: u32,
    pub beats_per_bar: u32,
    /// Bars per cycle when no loop sets the length.
    pub bars: u32,
    pub swing: f64,
    pub output_gain: f64,
    pub instruments: BTreeMap<String, InstrumentConfig>,
    pub randomness: Randomness,
    pub timing: TimingSettings,
    pub generator: GeneratorSettings,
    pub library: TemplateLibrary,
    /// Seeds every random choice. Sessions with the same seed and inputs behave the same.
    pub seed: Option<u64>,
    /// Pick loop samples at random among the candidates.
    pub random_samples: bool,
    /// How many iterations ahead each loop plans.
    pub iteration_windows: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            tempo: 120,
            beats_per_bar: 4,
            bars: 4,
            swing: 0.0,
            output_gain: 1.0,
            instruments: instrument::INSTRUMENTS
                .iter()
                .filter(|instrument| !instrument.is_loop())
                .map(|instrument| (instrument.key.to_string(), InstrumentConfig::new()))
                .collect(),
            randomness: Randomness::default(),
            timing: TimingSettings::default(),
            generator: GeneratorSettings::default(),
            library: TemplateLibrary::builtin(),
            seed: None,
            random_samples: false,
            iteration_windows: 4,
        }
    }
}

impl SessionOptions {
    /// The random sources for the generator and the synchronizer.
    fn rngs(&self) -> (StdRng, StdRng) {
        match self.seed {
            Some(seed) => (
                StdRng::seed_from_u64(seed),
                StdRng::seed_from_u64(seed.wrapping_add(1)),
            ),
            None => (StdRng::from_entropy(), StdRng::from_entropy()),
        }
    }

    /// A standalone generator for these options, for planning cycles without a session.
    pub fn pattern_generator(&self) -> PatternGenerator {
        let (rng, _) = self.rngs();
        PatternGenerator::new(rng, self.library.clone(), self.generator)
    }

    /// The musical clock these options start with.
    pub fn musical_clock(&self) -> MusicalClock {
        MusicalClock::new(self.tempo as f64, self.beats_per_bar, self.bars)
    }
}

/// Validates instrument settings and swing. Returns the settings keyed by the canonical
/// instrument key, so `Kick` and `kick` name the same channel.
pub fn validate_settings(
    instruments: &BTreeMap<String, InstrumentConfig>,
    swing: f64,
) -> Result<BTreeMap<String, InstrumentConfig>, SessionError> {
    let mut normalized = BTreeMap::new();
    for (key, config) in instruments.iter() {
        let instrument = instrument::lookup_step(key)
            .ok_or_else(|| SessionError::UnknownInstrument(key.clone()))?;
        if !(0.0..=1.0).contains(&config.hit_probability) {
            return Err(SessionError::InvalidSettings(format!(
                "{}: hit probability {} is outside [0, 1]",
                key, config.hit_probability
            )));
        }
        if config.tempo_multipliers.contains(&0) {
            return Err(SessionError::InvalidSettings(format!(
                "{}: tempo multipliers must be positive",
                key
            )));
        }
        if normalized
            .insert(instrument.key.to_string(), config.clone())
            .is_some()
        {
            return Err(SessionError::InvalidSettings(format!(
                "{} is configured more than once",
                instrument.key
            )));
        }
    }
    if !(0.0..1.0).contains(&swing) {
        return Err(SessionError::InvalidSettings(format!(
            "swing {} is outside [0, 1)",
            swing
        )));
    }
    Ok(normalized)
}

/// Parses a tempo. Only positive whole numbers are tempos.
pub fn parse_tempo(bpm: &str) -> Result<u32, SessionError> {
    match bpm.trim().parse::<u32>() {
        Ok(tempo) if tempo > 0 => Ok(tempo),
        _ => Err(SessionError::InvalidTempo(bpm.to_string())),
    }
}

/// Parses an output gain. Anything that isn't a number is unity gain; negative gains are
/// silence.
pub fn parse_gain(value: &str) -> f64 {
    match value.trim().parse::<f64>() {
        Ok(gain) if gain.is_finite() => gain.max(0.0),
        _ => 1.0,
    }
}

/// The session state the scheduler works against.
struct SessionCore {
    tempo: u32,
    beats_per_bar: u32,
    default_bars: u32,
    effective_bars: u32,
    swing: f64,
    output_gain: f64,
    instruments: BTreeMap<String, InstrumentConfig>,
    randomness: Randomness,
    active_loops: BTreeSet<String>,
    beat_enabled: bool,
    generator: PatternGenerator,
    synchronizer: LoopSynchronizer,
    playback: ActivePlaybackSet,
    catalog: Arc<dyn SampleCatalog>,
    /// Requests produced during a tick, spawned once the lock is released.
    outbox: Vec<LoadRequest>,
}

impl SessionCore {
    fn clock_with_bars(&self, bars: u32) -> MusicalClock {
        MusicalClock::new(self.tempo as f64, self.beats_per_bar, bars)
    }

    fn start_loop(&mut self, key: &str, start_time: f64) {
        let Some(instrument) = instrument::lookup_loop(key) else {
            warn!(key, "Not a loop, ignoring");
            return;
        };
        let Some(reservation) = self.playback.reserve(instrument.key) else {
            return;
        };

        let sample = match self
            .synchronizer
            .select(self.catalog.as_ref(), instrument)
        {
            Ok(sample) => sample,
            Err(e) => {
                warn!(key, err = e.to_string(), "Skipping loop");
                self.playback.cancel_reservation(&reservation);
                return;
            }
        };

        let Some(handle) =
            self.synchronizer
                .schedule(instrument.key, &sample, start_time, self.tempo as f64)
        else {
            self.playback.cancel_reservation(&reservation);
            return;
        };

        self.outbox.push(LoadRequest::Loop {
            reservation,
            sample,
            handle,
        });
    }

    fn start_hit(&mut self, key: &str, start_time: f64) {
        let Some(instrument) = instrument::lookup_step(key) else {
            warn!(key, "Not a drum instrument, ignoring");
            return;
        };

        match self.catalog.require(instrument.category, instrument.key) {
            Ok(sample) => self.outbox.push(LoadRequest::Hit {
                epoch: self.playback.epoch(),
                sample,
                start_time,
            }),
            Err(e) => debug!(key, err = e.to_string(), "Skipping hit"),
        }
    }

    /// Recomputes the bar count from the active loops.
    fn update_effective_bars(&mut self) {
        let clock = self.clock_with_bars(self.default_bars);
        self.effective_bars = self
            .synchronizer
            .effective_bars(&*self.catalog, self.active_loops.iter(), &clock)
            .unwrap_or(self.default_bars);
    }
}

impl TickContext for SessionCore {
    fn musical_clock(&self) -> MusicalClock {
        self.clock_with_bars(self.effective_bars)
    }

    fn pending_loops(&self) -> Vec<String> {
        self.active_loops
            .iter()
            .filter(|key| !self.playback.contains(key))
            .cloned()
            .collect()
    }

    fn cycle_grids(&mut self, cycle: u64) -> Option<CycleGrids> {
        if !self.beat_enabled {
            return None;
        }
        let clock = self.musical_clock();
        Some(
            self.generator
                .next_cycle(cycle, &self.instruments, self.randomness, &clock),
        )
    }

    fn swing(&self) -> f64 {
        self.swing
    }

    fn emit(&mut self, event: ScheduledEvent) {
        match event {
            ScheduledEvent::LoopStart { key, start_time } => self.start_loop(&key, start_time),
            ScheduledEvent::Hit {
                instrument,
                start_time,
            } => self.start_hit(&instrument, start_time),
        }
    }
}

struct SessionState {
    scheduler: Scheduler,
    core: SessionCore,
    timer: Option<TimerTask>,
}

impl SessionState {
    /// Stops the scheduler, its timer, and every playback. Returns the number of handles
    /// stopped.
    fn halt(&mut self) -> usize {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.scheduler.stop();
        self.core.synchronizer.clear();
        self.core.outbox.clear();
        self.core.playback.clear()
    }
}

pub(crate) struct Inner {
    state: Mutex<SessionState>,
    clock: Arc<dyn ClockSource>,
    port: Arc<dyn PlaybackPort>,
    loader: SampleLoader,
}

/// Owns a session and exposes its configuration operations.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    /// Creates a stopped session.
    pub fn new(
        options: SessionOptions,
        catalog: Arc<dyn SampleCatalog>,
        clock: Arc<dyn ClockSource>,
        port: Arc<dyn PlaybackPort>,
        decoder: Arc<dyn Decoder>,
    ) -> SessionController {
        let (generator_rng, synchronizer_rng) = options.rngs();
        let output_gain = options.output_gain.max(0.0);
        port.set_output_gain(output_gain);

        info!(
            tempo = options.tempo,
            beats_per_bar = options.beats_per_bar,
            bars = options.bars,
            port = port.to_string(),
            "Creating session"
        );

        let core = SessionCore {
            tempo: options.tempo.max(1),
            beats_per_bar: options.beats_per_bar.max(1),
            default_bars: options.bars.max(1),
            effective_bars: options.bars.max(1),
            swing: options.swing,
            output_gain,
            instruments: options.instruments,
            randomness: options.randomness,
            active_loops: BTreeSet::new(),
            beat_enabled: false,
            generator: PatternGenerator::new(generator_rng, options.library, options.generator),
            synchronizer: LoopSynchronizer::new(
                synchronizer_rng,
                options.random_samples,
                options.iteration_windows,
            ),
            playback: ActivePlaybackSet::new(),
            catalog,
            outbox: Vec::new(),
        };

        SessionController {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState {
                    scheduler: Scheduler::new(options.timing),
                    core,
                    timer: None,
                }),
                clock,
                port,
                loader: SampleLoader::new(decoder),
            }),
        }
    }

    /// Runs one scheduler tick against the current clock. The timer calls this; tests and
    /// offline drivers may call it directly. Returns the number of events emitted.
    pub fn tick(&self) -> usize {
        SessionController::tick_inner(&self.inner)
    }

    fn tick_inner(inner: &Arc<Inner>) -> usize {
        let now = inner.clock.now();
        let (emitted, requests) = {
            let mut guard = inner.state.lock();
            let state = &mut *guard;
            state.core.playback.prune(now);
            let emitted = state.scheduler.tick(now, &mut state.core);
            (emitted, std::mem::take(&mut state.core.outbox))
        };

        for request in requests {
            dispatch::spawn(inner.clone(), request);
        }
        emitted
    }

    /// Spawns queued requests.
    fn flush(&self) {
        let requests = std::mem::take(&mut self.inner.state.lock().core.outbox);
        for request in requests {
            dispatch::spawn(self.inner.clone(), request);
        }
    }

    /// Starts the timer if it isn't running. Without an async runtime the session is only
    /// driven by explicit ticks.
    fn ensure_timer(&self, state: &mut SessionState) {
        if state.timer.is_some() {
            return;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            debug!("No async runtime, not starting the timer");
            return;
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        state.timer = Some(TimerTask::spawn(
            state.scheduler.timing().interval(),
            move || {
                if let Some(inner) = weak.upgrade() {
                    SessionController::tick_inner(&inner);
                }
            },
        ));
    }

    /// Replaces the instrument settings, randomness, and swing. Takes effect from the next
    /// cycle. Invalid settings are rejected and nothing changes.
    pub fn configure(
        &self,
        instruments: BTreeMap<String, InstrumentConfig>,
        randomness: Randomness,
        swing: f64,
    ) -> Result<(), SessionError> {
        let span = span!(Level::INFO, "configure");
        let _enter = span.enter();

        let instruments = validate_settings(&instruments, swing)?;

        let mut state = self.inner.state.lock();
        info!(
            instruments = instruments.len(),
            pattern_selection = randomness.pattern_selection,
            hit_variation = randomness.hit_variation,
            swing,
            "Session configured"
        );
        state.core.instruments = instruments;
        state.core.randomness = randomness;
        state.core.swing = swing;
        Ok(())
    }

    /// Sets the tempo. If the session is playing, everything is stopped and restarted in
    /// phase at the new tempo.
    pub fn set_tempo(&self, bpm: &str) -> Result<u32, SessionError> {
        let span = span!(Level::INFO, "set tempo");
        let _enter = span.enter();

        let tempo = parse_tempo(bpm)?;
        let restarted = {
            let mut state = self.inner.state.lock();
            let previous = state.core.tempo;
            state.core.tempo = tempo;
            info!(previous, tempo, "Tempo set");

            if state.scheduler.is_running() {
                let stopped = state.core.playback.clear();
                state.core.synchronizer.clear();
                state.core.outbox.clear();
                state.scheduler.start(self.inner.clock.now());
                info!(stopped, "Restarting at the new tempo");
                true
            } else {
                false
            }
        };

        if restarted {
            self.tick();
        }
        Ok(tempo)
    }

    /// Turns a loop on or off. Returns whether the loop is now on.
    pub fn toggle_loop(&self, key: &str) -> Result<bool, SessionError> {
        let span = span!(Level::INFO, "toggle loop");
        let _enter = span.enter();

        let instrument = instrument::lookup_loop(key)
            .ok_or_else(|| SessionError::UnknownLoop(key.to_string()))?;

        let enabled = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;

            if state.core.active_loops.remove(instrument.key) {
                state.core.playback.release(instrument.key);
                state.core.synchronizer.release(instrument.key);
                info!(key = instrument.key, "Loop off");

                if state.core.active_loops.is_empty() && !state.core.beat_enabled {
                    let stopped = state.halt();
                    info!(stopped, "Nothing left to play, stopping");
                }
                false
            } else {
                state.core.active_loops.insert(instrument.key.to_string());
                info!(key = instrument.key, "Loop on");

                if state.scheduler.is_running() {
                    let boundary = state.scheduler.next_event_time();
                    state.core.start_loop(instrument.key, boundary);
                } else {
                    state.scheduler.start(self.inner.clock.now());
                }
                self.ensure_timer(state);
                true
            }
        };

        self.flush();
        if enabled {
            self.tick();
        }
        Ok(enabled)
    }

    /// Turns beat generation on or off. Returns whether it is now on.
    pub fn toggle_beat(&self) -> bool {
        let span = span!(Level::INFO, "toggle beat");
        let _enter = span.enter();

        let enabled = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let now = self.inner.clock.now();
            state.core.beat_enabled = !state.core.beat_enabled;

            if state.core.beat_enabled {
                state.core.update_effective_bars();
                let clock = state.core.musical_clock();
                info!(
                    bars = state.core.effective_bars,
                    cycle_duration = clock.cycle_duration(),
                    "Beat on"
                );

                // Never earlier than what is already scheduled.
                let earliest = now + state.scheduler.timing().start_delay();
                let from = earliest.max(state.scheduler.next_event_time());
                match state.core.synchronizer.next_boundary(from) {
                    Some(boundary) if state.scheduler.is_running() => {
                        state.scheduler.start_at(boundary)
                    }
                    _ if state.scheduler.is_running() => {
                        let next = state.scheduler.next_event_time();
                        state.scheduler.start_at(next.max(earliest));
                    }
                    _ => state.scheduler.start(now),
                }
                self.ensure_timer(state);
            } else {
                info!("Beat off");
                state.core.effective_bars = state.core.default_bars;
                if state.core.active_loops.is_empty() {
                    let stopped = state.halt();
                    info!(stopped, "Nothing left to play, stopping");
                } else {
                    let next = state.scheduler.next_event_time();
                    state.scheduler.start_at(next);
                }
            }
            state.core.beat_enabled
        };

        if enabled {
            self.tick();
        }
        enabled
    }

    /// Plays one hit of a drum instrument right away.
    pub fn trigger(&self, key: &str) -> Result<(), SessionError> {
        let instrument = instrument::lookup_step(key)
            .ok_or_else(|| SessionError::UnknownInstrument(key.to_string()))?;

        let now = self.inner.clock.now();
        self.inner.state.lock().core.start_hit(instrument.key, now);
        self.flush();
        Ok(())
    }

    /// Sets the output gain. Returns the gain applied.
    pub fn set_output_gain(&self, value: &str) -> f64 {
        let gain = parse_gain(value);
        self.inner.state.lock().core.output_gain = gain;
        self.inner.port.set_output_gain(gain);
        gain
    }

    /// Stops everything: the timer, every playback, and every toggle.
    pub fn stop(&self) {
        let span = span!(Level::INFO, "stop");
        let _enter = span.enter();

        let mut state = self.inner.state.lock();
        let stopped = state.halt();
        state.core.active_loops.clear();
        state.core.beat_enabled = false;
        state.core.effective_bars = state.core.default_bars;
        info!(stopped, "Session stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().scheduler.is_running()
    }

    pub fn tempo(&self) -> u32 {
        self.inner.state.lock().core.tempo
    }

    pub fn output_gain(&self) -> f64 {
        self.inner.state.lock().core.output_gain
    }

    pub fn swing(&self) -> f64 {
        self.inner.state.lock().core.swing
    }

    pub fn instruments(&self) -> BTreeMap<String, InstrumentConfig> {
        self.inner.state.lock().core.instruments.clone()
    }

    pub fn beat_enabled(&self) -> bool {
        self.inner.state.lock().core.beat_enabled
    }

    /// Loops that are toggled on, sorted.
    pub fn active_loops(&self) -> Vec<String> {
        self.inner
            .state
            .lock()
            .core
            .active_loops
            .iter()
            .cloned()
            .collect()
    }

    /// The bars per cycle of the generated beat.
    pub fn effective_bars(&self) -> u32 {
        self.inner.state.lock().core.effective_bars
    }

    /// The musical clock the scheduler is running against.
    pub fn musical_clock(&self) -> MusicalClock {
        self.inner.state.lock().core.musical_clock()
    }

    /// Returns true if the loop has a live playback handle.
    pub fn is_playing(&self, key: &str) -> bool {
        self.inner.state.lock().core.playback.is_playing(key)
    }

    /// The planned or playing loop for a key.
    pub fn loop_handle(&self, key: &str) -> Option<LoopHandle> {
        self.inner
            .state
            .lock()
            .core
            .synchronizer
            .handle(key)
            .cloned()
    }

    /// The start time of the next bar the scheduler will emit.
    pub fn next_event_time(&self) -> f64 {
        self.inner.state.lock().scheduler.next_event_time()
    }
}
