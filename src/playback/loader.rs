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

//! Sample loading and caching.
//!
//! Decoded buffers are kept in memory by sample ID so that every hit after the first one
//! starts without waiting on the decoder.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{AudioBuffer, Decoder};
use crate::catalog::SampleDescriptor;
use crate::error::ResourceError;

/// Manages loading and caching of sample data.
pub struct SampleLoader {
    /// Decodes samples that are not cached yet.
    decoder: Arc<dyn Decoder>,
    /// Cache of loaded samples by sample ID.
    cache: Mutex<HashMap<String, AudioBuffer>>,
}

impl SampleLoader {
    /// Creates a new sample loader.
    pub fn new(decoder: Arc<dyn Decoder>) -> SampleLoader {
        SampleLoader {
            decoder,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Loads a sample, returning the cached buffer if it has been loaded before.
    pub async fn load(&self, sample: &SampleDescriptor) -> Result<AudioBuffer, ResourceError> {
        if let Some(buffer) = self.cache.lock().get(&sample.id) {
            debug!(sample = %sample.id, "Using cached sample");
            return Ok(buffer.clone());
        }

        info!(sample = %sample.id, "Loading sample into memory");
        let buffer = self.decoder.load(sample).await?;

        info!(
            sample = %sample.id,
            duration = buffer.duration(),
            memory_kb = buffer.memory_size() / 1024,
            "Sample loaded"
        );
        self.cache
            .lock()
            .insert(sample.id.clone(), buffer.clone());
        Ok(buffer)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::playback::mock::MockDecoder;

    #[tokio::test]
    async fn test_load_caches() {
        let decoder = Arc::new(MockDecoder::new());
        let loader = SampleLoader::new(decoder.clone());
        let sample = SampleDescriptor::new("kick1", "drum", "kick").with_duration(0.5);

        let first = loader.load(&sample).await.expect("load should succeed");
        let second = loader.load(&sample).await.expect("load should succeed");
        assert_eq!(first.frames(), second.frames());
        assert_eq!(1, decoder.load_count());
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let decoder = Arc::new(MockDecoder::new());
        decoder.fail("snare1");
        let loader = SampleLoader::new(decoder.clone());
        let sample = SampleDescriptor::new("snare1", "drum", "snare");

        assert!(matches!(
            loader.load(&sample).await,
            Err(ResourceError::Decode { .. })
        ));
        assert!(loader.load(&sample).await.is_err());
        assert_eq!(2, decoder.load_count());
    }
}
