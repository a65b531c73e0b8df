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
use std::{
    collections::HashSet,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use super::{AudioBuffer, Decoder, PlaybackHandle, PlaybackOptions, PlaybackPort};
use crate::catalog::SampleDescriptor;
use crate::error::ResourceError;

/// A playback the mock port was asked to start.
#[derive(Clone)]
pub struct Scheduled {
    pub sample_id: String,
    pub kind: String,
    pub start_time: f64,
    pub options: PlaybackOptions,
    pub stopped: Arc<AtomicBool>,
}

impl Scheduled {
    /// Returns true if the playback has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

struct MockHandle {
    stopped: Arc<AtomicBool>,
}

impl PlaybackHandle for MockHandle {
    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// A mock port. Doesn't actually play anything, just records what it was asked to do.
#[derive(Default)]
pub struct MockPort {
    scheduled: Mutex<Vec<Scheduled>>,
    output_gain: Mutex<Option<f64>>,
    failing: Mutex<HashSet<String>>,
}

impl MockPort {
    pub fn new() -> MockPort {
        MockPort::default()
    }

    /// Makes scheduling of the given sample fail.
    pub fn fail(&self, sample_id: &str) {
        self.failing.lock().insert(sample_id.to_string());
    }

    /// Everything scheduled so far.
    pub fn scheduled(&self) -> Vec<Scheduled> {
        self.scheduled.lock().clone()
    }

    /// Everything scheduled for the given sample type.
    pub fn scheduled_kind(&self, kind: &str) -> Vec<Scheduled> {
        self.scheduled
            .lock()
            .iter()
            .filter(|scheduled| scheduled.kind == kind)
            .cloned()
            .collect()
    }

    /// Playbacks that are still running.
    pub fn playing(&self) -> Vec<Scheduled> {
        self.scheduled
            .lock()
            .iter()
            .filter(|scheduled| !scheduled.is_stopped())
            .cloned()
            .collect()
    }

    /// The last output gain set.
    pub fn output_gain(&self) -> Option<f64> {
        *self.output_gain.lock()
    }
}

impl PlaybackPort for MockPort {
    fn schedule(
        &self,
        sample: &SampleDescriptor,
        _: &AudioBuffer,
        start_time: f64,
        options: PlaybackOptions,
    ) -> Result<Box<dyn PlaybackHandle>, ResourceError> {
        if self.failing.lock().contains(&sample.id) {
            return Err(ResourceError::Playback {
                sample: sample.id.clone(),
                reason: "mock failure".to_string(),
            });
        }

        let stopped = Arc::new(AtomicBool::new(false));
        self.scheduled.lock().push(Scheduled {
            sample_id: sample.id.clone(),
            kind: sample.kind.clone(),
            start_time,
            options,
            stopped: stopped.clone(),
        });
        Ok(Box::new(MockHandle { stopped }))
    }

    fn set_output_gain(&self, gain: f64) {
        *self.output_gain.lock() = Some(gain);
    }
}

impl fmt::Display for MockPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mock")
    }
}

/// A mock decoder producing silent buffers. Loads can be held back until released and
/// individual samples can be made to fail.
pub struct MockDecoder {
    gate: Option<Arc<Semaphore>>,
    failing: Mutex<HashSet<String>>,
    loads: AtomicUsize,
}

impl MockDecoder {
    /// A decoder that resolves immediately.
    pub fn new() -> MockDecoder {
        MockDecoder {
            gate: None,
            failing: Mutex::new(HashSet::new()),
            loads: AtomicUsize::new(0),
        }
    }

    /// A decoder whose loads wait until `release` is called.
    pub fn gated() -> MockDecoder {
        MockDecoder {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..MockDecoder::new()
        }
    }

    /// Lets `count` held loads resolve.
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    /// Makes loading of the given sample fail.
    pub fn fail(&self, sample_id: &str) {
        self.failing.lock().insert(sample_id.to_string());
    }

    /// The number of loads started.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl Decoder for MockDecoder {
    fn load(
        &self,
        sample: &SampleDescriptor,
    ) -> BoxFuture<'static, Result<AudioBuffer, ResourceError>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.clone();
        let fails = self.failing.lock().contains(&sample.id);
        let sample_id = sample.id.clone();
        let duration = sample.duration.unwrap_or(1.0);

        Box::pin(async move {
            if let Some(gate) = gate {
                match gate.acquire().await {
                    Ok(permit) => permit.forget(),
                    Err(e) => {
                        return Err(ResourceError::Decode {
                            sample: sample_id,
                            reason: e.to_string(),
                        })
                    }
                }
            }

            if fails {
                return Err(ResourceError::Decode {
                    sample: sample_id,
                    reason: "mock failure".to_string(),
                });
            }
            Ok(AudioBuffer::silent(duration, 1, 1000))
        })
    }
}
