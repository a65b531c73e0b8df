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

/// Errors returned synchronously by session configuration operations. When one of these is
/// returned, the session state is unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("invalid tempo '{0}': expected a positive whole number of beats per minute")]
    InvalidTempo(String),

    #[error("invalid instrument settings: {0}")]
    InvalidSettings(String),

    #[error("'{0}' is not a known loop")]
    UnknownLoop(String),

    #[error("'{0}' is not a known instrument")]
    UnknownInstrument(String),

    #[error("invalid timing: {0}")]
    InvalidTiming(String),
}

/// Errors for a single playback event. These never escape a scheduler tick: the event is
/// logged and skipped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResourceError {
    #[error("no sample found for category '{category}', type '{kind}'")]
    MissingSample { category: String, kind: String },

    #[error("failed to load sample {sample}: {reason}")]
    Decode { sample: String, reason: String },

    #[error("failed to start playback of {sample}: {reason}")]
    Playback { sample: String, reason: String },
}
