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
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonic audio clock measured in fractional seconds.
pub trait ClockSource: Send + Sync {
    /// The current time in seconds.
    fn now(&self) -> f64;
}

/// A clock backed by the system's monotonic clock, starting at zero when created.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a new system clock.
    pub fn new() -> SystemClock {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// A clock that only moves when told to. Used for offline planning and tests.
pub struct ManualClock {
    seconds: AtomicU64,
}

impl ManualClock {
    /// Creates a manual clock at the given time.
    pub fn new(start: f64) -> ManualClock {
        ManualClock {
            seconds: AtomicU64::new(start.to_bits()),
        }
    }

    /// Sets the current time. Times earlier than the current time are ignored so the clock
    /// stays monotonic.
    pub fn set(&self, seconds: f64) {
        let _ = self
            .seconds
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                if seconds > f64::from_bits(current) {
                    Some(seconds.to_bits())
                } else {
                    None
                }
            });
    }

    /// Moves the clock forward.
    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds.max(0.0));
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.seconds.load(Ordering::SeqCst))
    }
}
