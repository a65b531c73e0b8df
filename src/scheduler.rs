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

//! The lookahead scheduler.
//!
//! The scheduler walks the bar grid ahead of the clock. On every tick it emits everything
//! that starts before `now + lookahead` with an absolute start time, and leaves exact
//! timing to the playback port. The bar position only moves forward, so a tick that comes
//! early or twice emits nothing new.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::musical::MusicalClock;
use crate::pattern::CycleGrids;

mod timer;

pub use timer::TimerTask;

/// Whether the scheduler is producing events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// How far ahead and how often the scheduler looks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimingSettings {
    lookahead: f64,
    interval: Duration,
    start_delay: f64,
}

impl TimingSettings {
    /// Creates timing settings. The lookahead must cover at least one timer interval,
    /// otherwise events could fall between two ticks.
    pub fn new(
        lookahead: Duration,
        interval: Duration,
        start_delay: Duration,
    ) -> Result<TimingSettings, SessionError> {
        if interval.is_zero() {
            return Err(SessionError::InvalidTiming(
                "timer interval must be greater than zero".to_string(),
            ));
        }
        if lookahead < interval {
            return Err(SessionError::InvalidTiming(format!(
                "lookahead {:?} is shorter than the timer interval {:?}",
                lookahead, interval
            )));
        }

        Ok(TimingSettings {
            lookahead: lookahead.as_secs_f64(),
            interval,
            start_delay: start_delay.as_secs_f64(),
        })
    }

    /// The lookahead window in seconds.
    pub fn lookahead(&self) -> f64 {
        self.lookahead
    }

    /// The timer interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The delay between starting and the first event, in seconds.
    pub fn start_delay(&self) -> f64 {
        self.start_delay
    }
}

impl Default for TimingSettings {
    fn default() -> Self {
        TimingSettings {
            lookahead: 0.1,
            interval: Duration::from_millis(25),
            start_delay: 0.1,
        }
    }
}

/// Something the scheduler wants played.
#[derive(Clone, Debug, PartialEq)]
pub enum ScheduledEvent {
    /// Start a loop at a bar boundary.
    LoopStart { key: String, start_time: f64 },
    /// Play one drum hit.
    Hit { instrument: String, start_time: f64 },
}

impl ScheduledEvent {
    pub fn start_time(&self) -> f64 {
        match self {
            ScheduledEvent::LoopStart { start_time, .. } => *start_time,
            ScheduledEvent::Hit { start_time, .. } => *start_time,
        }
    }
}

/// What the scheduler needs from the session on each tick.
pub trait TickContext {
    /// The clock at the current tempo and bar count.
    fn musical_clock(&self) -> MusicalClock;

    /// Enabled loops that are neither playing nor loading.
    fn pending_loops(&self) -> Vec<String>;

    /// The grids of a cycle, or `None` if beat generation is off.
    fn cycle_grids(&mut self, cycle: u64) -> Option<CycleGrids>;

    /// Swing as a fraction of a step.
    fn swing(&self) -> f64;

    /// Receives an event. Events arrive in ascending start time order.
    fn emit(&mut self, event: ScheduledEvent);
}

/// The real-time driver.
pub struct Scheduler {
    state: SchedulerState,
    timing: TimingSettings,
    next_event_time: f64,
    /// Bar within the current cycle.
    bar: u32,
    cycle: u64,
    grids: Option<CycleGrids>,
}

impl Scheduler {
    /// Creates a stopped scheduler.
    pub fn new(timing: TimingSettings) -> Scheduler {
        Scheduler {
            state: SchedulerState::Stopped,
            timing,
            next_event_time: 0.0,
            bar: 0,
            cycle: 0,
            grids: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    pub fn timing(&self) -> &TimingSettings {
        &self.timing
    }

    /// The start time of the next bar to be scheduled.
    pub fn next_event_time(&self) -> f64 {
        self.next_event_time
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn bar(&self) -> u32 {
        self.bar
    }

    /// The grids of the cycle being scheduled.
    pub fn current_grids(&self) -> Option<&CycleGrids> {
        self.grids.as_ref()
    }

    /// Starts, or restarts, with the first bar after the start delay.
    pub fn start(&mut self, now: f64) {
        self.start_at(now + self.timing.start_delay);
    }

    /// Starts, or restarts, with the first bar at the given time.
    pub fn start_at(&mut self, time: f64) {
        info!(start_time = time, "Scheduler starting");
        self.state = SchedulerState::Running;
        self.next_event_time = time;
        self.bar = 0;
        self.cycle = 0;
        self.grids = None;
    }

    /// Stops and forgets all timing state.
    pub fn stop(&mut self) {
        if self.state == SchedulerState::Running {
            info!(cycle = self.cycle, bar = self.bar, "Scheduler stopping");
        }
        self.state = SchedulerState::Stopped;
        self.next_event_time = 0.0;
        self.bar = 0;
        self.cycle = 0;
        self.grids = None;
    }

    /// Emits every event that starts within the lookahead window. Returns the number of
    /// events emitted.
    pub fn tick(&mut self, now: f64, context: &mut dyn TickContext) -> usize {
        if self.state != SchedulerState::Running {
            return 0;
        }

        if self.next_event_time < now {
            warn!(
                behind = now - self.next_event_time,
                "Scheduler fell behind the clock, skipping ahead"
            );
            self.next_event_time = now;
        }

        let clock = context.musical_clock();
        let bar_duration = clock.bar_duration();
        let swing = context.swing();
        let mut emitted = 0;

        while self.next_event_time < now + self.timing.lookahead {
            let bar_start = self.next_event_time;

            for key in context.pending_loops() {
                debug!(key, start_time = bar_start, "Scheduling loop start");
                context.emit(ScheduledEvent::LoopStart {
                    key,
                    start_time: bar_start,
                });
                emitted += 1;
            }

            if self.bar == 0 {
                self.grids = context.cycle_grids(self.cycle);
            }

            let bars = self
                .grids
                .as_ref()
                .map(|grids| grids.bars)
                .unwrap_or_else(|| clock.bars())
                .max(1);

            if let Some(grids) = &self.grids {
                let mut hits = bar_hits(grids, self.bar, bar_start, bar_duration, swing);
                hits.sort_by(|a, b| a.start_time().total_cmp(&b.start_time()));
                emitted += hits.len();
                for hit in hits {
                    context.emit(hit);
                }
            }

            self.next_event_time += bar_duration;
            self.bar += 1;
            if self.bar >= bars {
                self.bar = 0;
                self.cycle += 1;
            }
        }

        emitted
    }
}

/// The hits of one bar. Step `i` of an `n` step grid belongs to bar `i * bars / n`.
fn bar_hits(
    grids: &CycleGrids,
    bar: u32,
    bar_start: f64,
    bar_duration: f64,
    swing: f64,
) -> Vec<ScheduledEvent> {
    let bars = grids.bars.max(1) as usize;
    let mut hits = Vec::new();

    for (instrument, grid) in grids.instruments.iter() {
        let steps = grid.steps.len();
        for (i, hit) in grid.steps.iter().enumerate() {
            if !*hit || i * bars / steps != bar as usize {
                continue;
            }

            let mut offset = i as f64 * grid.step_duration - bar as f64 * bar_duration;
            if i % 2 == 1 {
                offset += swing * grid.step_duration;
            }
            hits.push(ScheduledEvent::Hit {
                instrument: instrument.clone(),
                start_time: bar_start + offset.max(0.0),
            });
        }
    }
    hits
}

#[cfg(test)]
mod test {
    use std::collections::{BTreeMap, HashSet};

    use super::*;
    use crate::pattern::InstrumentGrid;

    struct TestContext {
        clock: MusicalClock,
        loops: Vec<String>,
        active: HashSet<String>,
        grid: Option<Vec<bool>>,
        swing: f64,
        generated: Vec<u64>,
        events: Vec<ScheduledEvent>,
    }

    impl TestContext {
        fn new(clock: MusicalClock) -> TestContext {
            TestContext {
                clock,
                loops: Vec::new(),
                active: HashSet::new(),
                grid: None,
                swing: 0.0,
                generated: Vec::new(),
                events: Vec::new(),
            }
        }

        fn hits(&self) -> Vec<f64> {
            self.events
                .iter()
                .filter(|event| matches!(event, ScheduledEvent::Hit { .. }))
                .map(|event| event.start_time())
                .collect()
        }

        fn loop_starts(&self) -> Vec<(String, f64)> {
            self.events
                .iter()
                .filter_map(|event| match event {
                    ScheduledEvent::LoopStart { key, start_time } => {
                        Some((key.clone(), *start_time))
                    }
                    _ => None,
                })
                .collect()
        }
    }

    impl TickContext for TestContext {
        fn musical_clock(&self) -> MusicalClock {
            self.clock
        }

        fn pending_loops(&self) -> Vec<String> {
            self.loops
                .iter()
                .filter(|key| !self.active.contains(*key))
                .cloned()
                .collect()
        }

        fn cycle_grids(&mut self, cycle: u64) -> Option<CycleGrids> {
            let steps = self.grid.clone()?;
            self.generated.push(cycle);
            let mut instruments = BTreeMap::new();
            instruments.insert(
                "kick".to_string(),
                InstrumentGrid {
                    step_duration: self.clock.cycle_duration() / steps.len() as f64,
                    steps,
                    tempo_multiplier: 1,
                },
            );
            Some(CycleGrids {
                cycle_duration: self.clock.cycle_duration(),
                bars: self.clock.bars(),
                canonical_steps: self.clock.beats_per_cycle() as usize,
                fill: false,
                instruments,
            })
        }

        fn swing(&self) -> f64 {
            self.swing
        }

        fn emit(&mut self, event: ScheduledEvent) {
            if let ScheduledEvent::LoopStart { key, .. } = &event {
                self.active.insert(key.clone());
            }
            self.events.push(event);
        }
    }

    fn assert_times(expected: &[f64], actual: &[f64]) {
        assert_eq!(expected.len(), actual.len(), "{:?} != {:?}", expected, actual);
        for (e, a) in expected.iter().zip(actual.iter()) {
            assert!((e - a).abs() < 1e-9, "{:?} != {:?}", expected, actual);
        }
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(TimingSettings::default())
    }

    #[test]
    fn test_timing_validation() {
        assert!(TimingSettings::new(
            Duration::from_millis(100),
            Duration::from_millis(25),
            Duration::from_millis(100)
        )
        .is_ok());
        assert!(matches!(
            TimingSettings::new(
                Duration::from_millis(10),
                Duration::from_millis(25),
                Duration::ZERO
            ),
            Err(SessionError::InvalidTiming(_))
        ));
        assert!(TimingSettings::new(Duration::ZERO, Duration::ZERO, Duration::ZERO).is_err());
    }

    #[test]
    fn test_stopped_scheduler_emits_nothing() {
        let mut scheduler = scheduler();
        let mut context = TestContext::new(MusicalClock::new(120.0, 4, 4));
        context.grid = Some(vec![true; 16]);
        assert_eq!(0, scheduler.tick(10.0, &mut context));
        assert!(context.events.is_empty());
    }

    #[test]
    fn test_emits_one_bar_per_tick_within_lookahead() {
        let mut scheduler = scheduler();
        let mut context = TestContext::new(MusicalClock::new(120.0, 4, 4));
        context.grid = Some(vec![true; 16]);

        scheduler.start(0.0);
        assert_eq!(0.1, scheduler.next_event_time());
        // The first bar is exactly one lookahead away.
        assert_eq!(0, scheduler.tick(0.0, &mut context));
        assert_eq!(4, scheduler.tick(0.01, &mut context));
        assert_times(&[0.1, 0.6, 1.1, 1.6], &context.hits());
        assert!((scheduler.next_event_time() - 2.1).abs() < 1e-9);

        // Ticking again before the next bar is in range is a no-op.
        assert_eq!(0, scheduler.tick(0.05, &mut context));
        assert_eq!(0, scheduler.tick(1.5, &mut context));

        assert_eq!(4, scheduler.tick(2.05, &mut context));
        assert_eq!(2, scheduler.bar());
        assert_eq!(vec![0], context.generated);
    }

    #[test]
    fn test_next_event_time_never_decreases() {
        let mut scheduler = scheduler();
        let mut context = TestContext::new(MusicalClock::new(97.0, 3, 2));
        context.grid = Some(vec![true, false, true, true, false, true]);
        scheduler.start(0.0);

        let mut last = scheduler.next_event_time();
        let mut now = 0.0;
        while now < 30.0 {
            scheduler.tick(now, &mut context);
            assert!(scheduler.next_event_time() >= last);
            assert!(scheduler.next_event_time() >= now);
            last = scheduler.next_event_time();
            now += 0.025;
        }

        let hits = context.hits();
        assert!(hits.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_cycles_regenerate_grids() {
        let mut scheduler = scheduler();
        let mut context = TestContext::new(MusicalClock::new(120.0, 4, 2));
        context.grid = Some(vec![true; 8]);
        scheduler.start_at(0.0);

        let mut now = 0.0;
        while now < 11.0 {
            scheduler.tick(now, &mut context);
            now += 0.025;
        }
        // Bars every 2s starting at 0, cycles every 4s.
        assert_eq!(vec![0, 1, 2], context.generated);
        assert_eq!(3, scheduler.cycle());
        assert_eq!(24, context.hits().len());
    }

    #[test]
    fn test_lagging_scheduler_skips_ahead() {
        let mut scheduler = scheduler();
        let mut context = TestContext::new(MusicalClock::new(120.0, 4, 4));
        scheduler.start_at(1.0);
        scheduler.tick(5.0, &mut context);
        assert!(scheduler.next_event_time() >= 5.0);
    }

    #[test]
    fn test_loops_start_once_on_bar_boundary() {
        let mut scheduler = scheduler();
        let mut context = TestContext::new(MusicalClock::new(120.0, 4, 4));
        context.loops = vec!["rhythm".to_string(), "melody".to_string()];
        scheduler.start(0.0);

        let mut now = 0.0;
        while now < 5.0 {
            scheduler.tick(now, &mut context);
            now += 0.025;
        }
        assert_eq!(
            vec![("rhythm".to_string(), 0.1), ("melody".to_string(), 0.1)],
            context.loop_starts()
        );
        assert!(context.hits().is_empty());
    }

    #[test]
    fn test_swing_delays_off_beats() {
        let mut scheduler = scheduler();
        let mut context = TestContext::new(MusicalClock::new(120.0, 4, 1));
        context.grid = Some(vec![true; 4]);
        context.swing = 0.5;
        scheduler.start_at(0.0);
        scheduler.tick(0.0, &mut context);
        assert_times(&[0.0, 0.75, 1.0, 1.75], &context.hits());
    }

    #[test]
    fn test_stop_resets_position() {
        let mut scheduler = scheduler();
        let mut context = TestContext::new(MusicalClock::new(120.0, 4, 4));
        context.grid = Some(vec![true; 16]);
        scheduler.start(0.0);
        scheduler.tick(0.0, &mut context);
        scheduler.stop();

        assert_eq!(SchedulerState::Stopped, scheduler.state());
        assert_eq!(0, scheduler.cycle());
        assert!(scheduler.current_grids().is_none());
        assert_eq!(0, scheduler.tick(1.0, &mut context));
    }
}
