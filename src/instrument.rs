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

//! The static instrument table. Every playable key, drum hit or loop, is listed here with
//! the catalog category it is looked up in.

/// How an instrument is placed in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionClass {
    /// One-shot hits placed on the generated step grid.
    Step,
    /// Pre-recorded phrases that loop and are phase-aligned to the bar grid.
    Phrase,
}

/// An entry in the instrument table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instrument {
    /// The instrument key. Also the sample type in the catalog.
    pub key: &'static str,
    /// The catalog category.
    pub category: &'static str,
    /// How the instrument is placed in time.
    pub resolution: ResolutionClass,
}

impl Instrument {
    /// Returns true if this instrument is a loop.
    pub fn is_loop(&self) -> bool {
        self.resolution == ResolutionClass::Phrase
    }
}

const fn step(key: &'static str) -> Instrument {
    Instrument {
        key,
        category: "drum",
        resolution: ResolutionClass::Step,
    }
}

const fn phrase(key: &'static str) -> Instrument {
    Instrument {
        key,
        category: "loop",
        resolution: ResolutionClass::Phrase,
    }
}

/// All known instruments.
pub const INSTRUMENTS: &[Instrument] = &[
    step("kick"),
    step("snare"),
    step("hihat"),
    step("rimshot"),
    step("floortom"),
    step("hightom"),
    phrase("rhythm"),
    phrase("melody"),
];

/// Looks up an instrument by key, ignoring case.
pub fn lookup(key: &str) -> Option<&'static Instrument> {
    INSTRUMENTS
        .iter()
        .find(|instrument| instrument.key.eq_ignore_ascii_case(key.trim()))
}

/// Looks up a loop instrument by key.
pub fn lookup_loop(key: &str) -> Option<&'static Instrument> {
    lookup(key).filter(|instrument| instrument.is_loop())
}

/// Looks up a drum instrument by key.
pub fn lookup_step(key: &str) -> Option<&'static Instrument> {
    lookup(key).filter(|instrument| !instrument.is_loop())
}
