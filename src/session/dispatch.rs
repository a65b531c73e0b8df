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

//! Turns scheduled events into playback.
//!
//! Audio is loaded off the tick. When the load resolves, the session is locked and the
//! request is checked against the current epoch before anything reaches the port, so a
//! load that outlives a stop or restart plays nothing.

use std::sync::Arc;

use tracing::{debug, error, warn};

use super::Inner;
use crate::catalog::SampleDescriptor;
use crate::loopsync::LoopHandle;
use crate::playback::{PlaybackOptions, Reservation};

/// Playback waiting on its audio.
pub(super) enum LoadRequest {
    Loop {
        reservation: Reservation,
        sample: SampleDescriptor,
        handle: LoopHandle,
    },
    Hit {
        epoch: u64,
        sample: SampleDescriptor,
        start_time: f64,
    },
}

/// Spawns the load for a request on the current runtime.
pub(super) fn spawn(inner: Arc<Inner>, request: LoadRequest) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(run(inner, request));
        }
        Err(e) => {
            error!(err = e.to_string(), "No async runtime, dropping playback request");
            if let LoadRequest::Loop {
                reservation,
                handle,
                ..
            } = request
            {
                abandon_loop(&inner, &reservation, &handle);
            }
        }
    }
}

async fn run(inner: Arc<Inner>, request: LoadRequest) {
    match request {
        LoadRequest::Loop {
            reservation,
            sample,
            handle,
        } => start_loop(inner, reservation, sample, handle).await,
        LoadRequest::Hit {
            epoch,
            sample,
            start_time,
        } => start_hit(inner, epoch, sample, start_time).await,
    }
}

/// Releases a reservation whose loop will never start. The loop is retried on the next bar
/// if it is still enabled.
fn abandon_loop(inner: &Inner, reservation: &Reservation, handle: &LoopHandle) {
    let mut state = inner.state.lock();
    if state.core.playback.is_current(reservation) {
        state.core.playback.cancel_reservation(reservation);
        state.core.synchronizer.release(&handle.source_key);
    }
}

async fn start_loop(
    inner: Arc<Inner>,
    reservation: Reservation,
    sample: SampleDescriptor,
    handle: LoopHandle,
) {
    let buffer = match inner.loader.load(&sample).await {
        Ok(buffer) => buffer,
        Err(e) => {
            warn!(key = reservation.key(), err = e.to_string(), "Skipping loop");
            abandon_loop(&inner, &reservation, &handle);
            return;
        }
    };

    let mut state = inner.state.lock();
    if !state.core.playback.is_current(&reservation) {
        debug!(
            key = reservation.key(),
            "Loop load resolved after the session moved on, discarding"
        );
        return;
    }

    let handle = handle.fit_to_buffer(&sample, buffer.duration());
    match inner
        .port
        .schedule(&sample, &buffer, handle.start_time, handle.options())
    {
        Ok(playback) => {
            debug!(
                key = reservation.key(),
                sample = sample.display_name(),
                start_time = handle.start_time,
                "Loop started"
            );
            state.core.synchronizer.update(handle);
            if let Err(playback) = state.core.playback.commit(&reservation, playback) {
                playback.stop();
            }
        }
        Err(e) => {
            warn!(key = reservation.key(), err = e.to_string(), "Skipping loop");
            state.core.playback.cancel_reservation(&reservation);
            state.core.synchronizer.release(reservation.key());
        }
    }
}

async fn start_hit(inner: Arc<Inner>, epoch: u64, sample: SampleDescriptor, start_time: f64) {
    let buffer = match inner.loader.load(&sample).await {
        Ok(buffer) => buffer,
        Err(e) => {
            warn!(kind = %sample.kind, err = e.to_string(), "Skipping hit");
            return;
        }
    };

    let mut state = inner.state.lock();
    if state.core.playback.epoch() != epoch {
        debug!(
            kind = %sample.kind,
            "Hit load resolved after the session moved on, discarding"
        );
        return;
    }

    let rate = if sample.playback_rate > 0.0 && sample.playback_rate.is_finite() {
        sample.playback_rate
    } else {
        1.0
    };
    let length = (buffer.duration() - sample.trim_start - sample.trim_end).max(0.0);
    let options = PlaybackOptions::one_shot(sample.trim_start, length, rate, sample.gain);

    match inner.port.schedule(&sample, &buffer, start_time, options) {
        Ok(playback) => {
            if let Err(playback) =
                state
                    .core
                    .playback
                    .track_one_shot(epoch, start_time + length / rate, playback)
            {
                playback.stop();
            }
        }
        Err(e) => warn!(kind = %sample.kind, err = e.to_string(), "Skipping hit"),
    }
}
