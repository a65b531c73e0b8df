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

//! The audio output seam: decoded buffers, the playback port, and the decoder.
//!
//! This module provides:
//! - The [`PlaybackPort`] and [`Decoder`] traits implemented by the audio backend
//! - The [`ActivePlaybackSet`] that tracks live handles per channel key
//! - A caching [`SampleLoader`] in front of the decoder
//! - A simulated backend that logs instead of producing sound

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::catalog::SampleDescriptor;
use crate::error::ResourceError;

pub mod active;
pub mod loader;
#[cfg(test)]
pub mod mock;
pub mod simulated;

pub use active::{ActivePlaybackSet, Reservation};
pub use loader::SampleLoader;

/// Decoded audio, shared between every playback of the same sample.
#[derive(Clone)]
pub struct AudioBuffer {
    /// Interleaved sample data.
    data: Arc<Vec<f32>>,
    /// Number of channels.
    channel_count: u16,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl AudioBuffer {
    /// Creates a buffer from interleaved samples.
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> AudioBuffer {
        AudioBuffer {
            data: Arc::new(data),
            channel_count: channel_count.max(1),
            sample_rate: sample_rate.max(1),
        }
    }

    /// Creates a silent buffer of the given length in seconds.
    pub fn silent(duration: f64, channel_count: u16, sample_rate: u32) -> AudioBuffer {
        let frames = (duration.max(0.0) * sample_rate as f64).round() as usize;
        AudioBuffer::new(
            vec![0.0; frames * channel_count.max(1) as usize],
            channel_count,
            sample_rate,
        )
    }

    /// The number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// The sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The number of frames.
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    /// The length of the buffer in seconds.
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// The memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// How a buffer should be played.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackOptions {
    /// Whether playback loops between `loop_start` and `loop_end`.
    pub looped: bool,
    /// Loop start in buffer seconds.
    pub loop_start: f64,
    /// Loop end in buffer seconds.
    pub loop_end: f64,
    /// Where in the buffer playback begins, in buffer seconds.
    pub offset: f64,
    /// How much of the buffer to play, in buffer seconds. Unbounded when `None`.
    pub duration: Option<f64>,
    /// Playback rate.
    pub rate: f64,
    /// Linear gain.
    pub gain: f64,
}

impl PlaybackOptions {
    /// Options for a one-shot playback of part of a buffer.
    pub fn one_shot(offset: f64, duration: f64, rate: f64, gain: f64) -> PlaybackOptions {
        PlaybackOptions {
            looped: false,
            loop_start: 0.0,
            loop_end: 0.0,
            offset,
            duration: Some(duration),
            rate,
            gain,
        }
    }

    /// Options for a looped playback.
    pub fn looped(loop_start: f64, loop_end: f64, rate: f64, gain: f64) -> PlaybackOptions {
        PlaybackOptions {
            looped: true,
            loop_start,
            loop_end,
            offset: loop_start,
            duration: None,
            rate,
            gain,
        }
    }
}

/// A live playback that can be stopped.
pub trait PlaybackHandle: Send + Sync {
    /// Stops playback. Stopping twice is harmless.
    fn stop(&self);
}

/// Starts playback of decoded audio at absolute clock times.
pub trait PlaybackPort: fmt::Display + Send + Sync {
    /// Schedules the buffer to start at `start_time` on the audio clock.
    fn schedule(
        &self,
        sample: &SampleDescriptor,
        buffer: &AudioBuffer,
        start_time: f64,
        options: PlaybackOptions,
    ) -> Result<Box<dyn PlaybackHandle>, ResourceError>;

    /// Sets the output gain applied to everything the port plays.
    fn set_output_gain(&self, gain: f64);
}

/// Loads the audio data for a sample.
pub trait Decoder: Send + Sync {
    /// Loads the sample. The returned future must not borrow the decoder.
    fn load(
        &self,
        sample: &SampleDescriptor,
    ) -> BoxFuture<'static, Result<AudioBuffer, ResourceError>>;
}
