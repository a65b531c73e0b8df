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
//! A real-time procedural percussion and loop playback engine.
//!
//! A [session::SessionController] drives a lookahead [scheduler::Scheduler] that turns
//! generated drum patterns and tempo-synchronized loops into playback scheduled on a
//! [playback::PlaybackPort] ahead of the audio clock.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod instrument;
pub mod loopsync;
pub mod musical;
pub mod pattern;
pub mod playback;
pub mod playsync;
pub mod scheduler;
pub mod session;
#[cfg(test)]
mod testutil;
