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
use std::time::Duration;

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, span, Level};

use crate::playsync::CancelHandle;

/// A cancellable repeating task. Each tick runs to completion before the next one is
/// armed, so ticks never overlap.
pub struct TimerTask {
    cancel_handle: CancelHandle,
    join: JoinHandle<()>,
}

impl TimerTask {
    /// Spawns the task on the current tokio runtime. The first tick fires immediately.
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> TimerTask
    where
        F: FnMut() + Send + 'static,
    {
        let cancel_handle = CancelHandle::new();
        let join = {
            let cancel_handle = cancel_handle.clone();
            tokio::spawn(async move {
                let span = span!(Level::INFO, "scheduler timer");
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = cancel_handle.cancelled() => break,
                        _ = interval.tick() => {
                            if cancel_handle.is_cancelled() {
                                break;
                            }
                            let _enter = span.enter();
                            on_tick();
                        }
                    }
                }
                debug!("Timer stopped");
            })
        };

        TimerTask {
            cancel_handle,
            join,
        }
    }

    /// Stops the task. A tick in progress completes; no further ticks run.
    pub fn cancel(&self) {
        self.cancel_handle.cancel();
    }

    /// Returns true once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl Drop for TimerTask {
    fn drop(&mut self) {
        self.cancel_handle.cancel();
    }
}
