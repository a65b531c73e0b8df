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

//! Tracking of live playback handles.
//!
//! A channel key holds at most one handle. Keys are reserved before their audio is loaded
//! so that a second request for the same key is rejected while the first is in flight.
//! Every reservation carries the epoch it was made in; clearing the set starts a new
//! epoch, which makes any late load from the previous epoch a no-op.

use std::collections::HashMap;

use tracing::debug;

use super::PlaybackHandle;

/// A claim on a channel key made before the audio for it has loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reservation {
    key: String,
    epoch: u64,
    id: u64,
}

impl Reservation {
    /// The reserved channel key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

enum Slot {
    Reserved(u64),
    Playing(Box<dyn PlaybackHandle>),
}

/// A one-shot playback that is stopped along with everything else until it has finished.
struct OneShot {
    ends_at: f64,
    handle: Box<dyn PlaybackHandle>,
}

/// Live playback handles keyed by channel.
#[derive(Default)]
pub struct ActivePlaybackSet {
    epoch: u64,
    next_id: u64,
    channels: HashMap<String, Slot>,
    one_shots: Vec<OneShot>,
}

impl ActivePlaybackSet {
    /// Creates an empty set.
    pub fn new() -> ActivePlaybackSet {
        ActivePlaybackSet::default()
    }

    /// The current epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns true if the key is reserved or playing.
    pub fn contains(&self, key: &str) -> bool {
        self.channels.contains_key(key)
    }

    /// Returns true if the key has a live handle.
    pub fn is_playing(&self, key: &str) -> bool {
        matches!(self.channels.get(key), Some(Slot::Playing(_)))
    }

    /// Reserves a key. Returns `None` if the key is already reserved or playing.
    pub fn reserve(&mut self, key: &str) -> Option<Reservation> {
        if self.channels.contains_key(key) {
            debug!(key, "Key already active, not reserving");
            return None;
        }

        self.next_id += 1;
        self.channels
            .insert(key.to_string(), Slot::Reserved(self.next_id));
        Some(Reservation {
            key: key.to_string(),
            epoch: self.epoch,
            id: self.next_id,
        })
    }

    /// Returns true if the reservation is still waiting to be committed.
    pub fn is_current(&self, reservation: &Reservation) -> bool {
        reservation.epoch == self.epoch
            && matches!(self.channels.get(&reservation.key), Some(Slot::Reserved(id)) if *id == reservation.id)
    }

    /// Fills a reservation with a live handle. If the reservation is stale the handle is
    /// handed back so the caller can stop it.
    pub fn commit(
        &mut self,
        reservation: &Reservation,
        handle: Box<dyn PlaybackHandle>,
    ) -> Result<(), Box<dyn PlaybackHandle>> {
        if !self.is_current(reservation) {
            return Err(handle);
        }

        self.channels
            .insert(reservation.key.clone(), Slot::Playing(handle));
        Ok(())
    }

    /// Drops a reservation that will not be committed, e.g. because its load failed.
    pub fn cancel_reservation(&mut self, reservation: &Reservation) {
        if self.is_current(reservation) {
            self.channels.remove(&reservation.key);
        }
    }

    /// Stops and removes a key. Returns true if anything was removed.
    pub fn release(&mut self, key: &str) -> bool {
        match self.channels.remove(key) {
            Some(Slot::Playing(handle)) => {
                handle.stop();
                true
            }
            Some(Slot::Reserved(_)) => true,
            None => false,
        }
    }

    /// Tracks a one-shot until `ends_at`. The handle is handed back if the epoch has moved on.
    pub fn track_one_shot(
        &mut self,
        epoch: u64,
        ends_at: f64,
        handle: Box<dyn PlaybackHandle>,
    ) -> Result<(), Box<dyn PlaybackHandle>> {
        if epoch != self.epoch {
            return Err(handle);
        }
        self.one_shots.push(OneShot { ends_at, handle });
        Ok(())
    }

    /// Forgets one-shots that have finished playing.
    pub fn prune(&mut self, now: f64) {
        self.one_shots.retain(|one_shot| one_shot.ends_at > now);
    }

    /// Stops every handle, forgets every key, and starts a new epoch. Returns the number of
    /// handles that were stopped.
    pub fn clear(&mut self) -> usize {
        let mut stopped = 0;
        for (_, slot) in self.channels.drain() {
            if let Slot::Playing(handle) = slot {
                handle.stop();
                stopped += 1;
            }
        }
        for one_shot in self.one_shots.drain(..) {
            one_shot.handle.stop();
            stopped += 1;
        }
        self.epoch += 1;
        stopped
    }
}

impl std::fmt::Debug for ActivePlaybackSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivePlaybackSet")
            .field("epoch", &self.epoch)
            .field("channels", &self.channels.len())
            .field("one_shots", &self.one_shots.len())
            .finish()
    }
}
