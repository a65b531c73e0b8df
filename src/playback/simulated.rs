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

//! A backend that produces no sound. Every playback is logged with its timing so that a
//! session can be followed from the logs alone.

use std::fmt;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use futures_util::future::BoxFuture;
use tracing::{debug, info};

use super::{AudioBuffer, Decoder, PlaybackHandle, PlaybackOptions, PlaybackPort};
use crate::catalog::SampleDescriptor;
use crate::error::ResourceError;

/// The length given to samples that have no duration in the catalog.
const DEFAULT_DURATION: f64 = 1.0;

/// The sample rate of the silent buffers.
const SAMPLE_RATE: u32 = 8000;

/// A playback port that logs what it would play.
pub struct LoggingPort {
    output_gain: AtomicU64,
}

impl LoggingPort {
    /// Creates a new logging port at unity gain.
    pub fn new() -> LoggingPort {
        LoggingPort {
            output_gain: AtomicU64::new(1.0_f64.to_bits()),
        }
    }

    /// The current output gain.
    pub fn output_gain(&self) -> f64 {
        f64::from_bits(self.output_gain.load(Ordering::Relaxed))
    }
}

impl Default for LoggingPort {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LoggingPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Logging")
    }
}

struct LoggingHandle {
    sample: String,
    stopped: AtomicBool,
}

impl PlaybackHandle for LoggingHandle {
    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::Relaxed) {
            debug!(sample = %self.sample, "Playback stopped");
        }
    }
}

impl PlaybackPort for LoggingPort {
    fn schedule(
        &self,
        sample: &SampleDescriptor,
        buffer: &AudioBuffer,
        start_time: f64,
        options: PlaybackOptions,
    ) -> Result<Box<dyn PlaybackHandle>, ResourceError> {
        if options.looped {
            info!(
                sample = sample.display_name(),
                start_time = format!("{:.3}", start_time),
                loop_start = format!("{:.3}", options.loop_start),
                loop_end = format!("{:.3}", options.loop_end),
                rate = format!("{:.3}", options.rate),
                gain = options.gain * self.output_gain(),
                "Loop scheduled"
            );
        } else {
            info!(
                sample = sample.display_name(),
                kind = %sample.kind,
                start_time = format!("{:.3}", start_time),
                length = format!("{:.3}", options.duration.unwrap_or(buffer.duration())),
                gain = options.gain * self.output_gain(),
                "Hit scheduled"
            );
        }

        Ok(Box::new(LoggingHandle {
            sample: sample.display_name().to_string(),
            stopped: AtomicBool::new(false),
        }))
    }

    fn set_output_gain(&self, gain: f64) {
        info!(gain, "Output gain set");
        self.output_gain.store(gain.to_bits(), Ordering::Relaxed);
    }
}

/// A decoder that produces silent buffers as long as the catalog says the sample is.
#[derive(Default)]
pub struct MetadataDecoder {}

impl MetadataDecoder {
    pub fn new() -> Arc<MetadataDecoder> {
        Arc::new(MetadataDecoder {})
    }
}

impl Decoder for MetadataDecoder {
    fn load(
        &self,
        sample: &SampleDescriptor,
    ) -> BoxFuture<'static, Result<AudioBuffer, ResourceError>> {
        let duration = sample.duration.unwrap_or(DEFAULT_DURATION);
        let id = sample.id.clone();
        Box::pin(async move {
            if !duration.is_finite() || duration <= 0.0 {
                return Err(ResourceError::Decode {
                    sample: id,
                    reason: format!("invalid duration {}", duration),
                });
            }
            Ok(AudioBuffer::silent(duration, 1, SAMPLE_RATE))
        })
    }
}
