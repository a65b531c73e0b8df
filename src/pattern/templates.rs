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

//! One-bar pattern templates. A template may have any number of steps; it is stretched
//! over the bar when it is placed on the canonical grid.

use std::collections::HashMap;

type Templates = &'static [&'static [u8]];

const KICK: Templates = &[
    &[1, 1, 1, 1],
    &[1, 0, 0, 0],
    &[1, 0, 0, 1, 1, 0, 1, 0],
    &[1, 0, 0, 0, 1, 0, 1, 0, 1, 0, 0, 0, 1, 0, 1, 0],
    &[1, 1, 0, 0],
    &[0, 0, 1, 0],
    &[1, 0, 0, 1, 0, 0],
    &[1, 0, 1, 0, 0, 1, 0, 0],
    &[1, 0, 0, 1, 0, 1, 0, 0],
    &[1, 0, 1, 1, 0, 0, 1, 0],
    &[1; 32],
];

const SNARE: Templates = &[
    &[0, 1, 0, 1],
    &[0, 0, 1, 0],
    &[0, 1, 0, 0, 1, 0, 0, 0],
    &[0, 0, 1, 0, 0, 1, 0, 0],
    &[0, 0, 1, 0, 0, 1, 1, 0],
    &[0, 1, 0, 1, 0, 1, 0, 1],
    &[0, 1, 0, 0, 1, 0, 1, 0],
    &[1; 32],
];

const HIHAT: Templates = &[
    &[1; 16],
    &[1; 32],
    &[1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0],
    &[1; 8],
    &[0, 1, 0, 1, 0, 1, 0, 1],
    &[1, 0, 1, 0, 1, 0, 1, 0],
    &[1, 1, 1, 1, 1, 1, 1, 0],
    &[1, 0, 1, 1, 0, 1, 0, 1],
    &[1, 0, 0, 1, 0, 1, 0, 1],
];

const RIMSHOT: Templates = &[
    &[0, 0, 1, 0],
    &[0, 1, 0, 0],
    &[0, 0, 0, 1],
    &[0, 1, 0, 1],
    &[0, 1, 0, 0, 1, 0, 1, 0],
    &[1; 32],
];

const FLOORTOM: Templates = &[
    &[0, 0, 0, 1],
    &[0, 1, 0, 1],
    &[1, 0, 1, 0],
    &[0, 0, 0, 0, 0, 0, 1, 1],
    &[1, 0, 0, 1, 0, 1, 0, 0],
];

const HIGHTOM: Templates = &[
    &[1, 0, 1, 0],
    &[0, 1, 1, 0],
    &[1, 1, 1, 1],
    &[1; 8],
    &[1, 0, 1, 1, 0, 1, 1, 0],
    &[1; 32],
];

const KICK_FILLS: Templates = &[&[1, 1, 1, 1], &[1, 0, 1, 0, 1, 0, 1, 0]];

const SNARE_FILLS: Templates = &[
    &[0, 1, 1, 1],
    &[0, 1, 0, 1, 0, 1, 0, 1],
    &[1; 16],
    &[1; 32],
    &[1, 1, 0, 1, 1, 0, 1, 1],
];

const HIHAT_FILLS: Templates = &[
    &[1; 8],
    &[1, 0, 1, 1, 0, 1, 1, 0],
    &[1; 16],
    &[1; 32],
];

const FLOORTOM_FILLS: Templates = &[
    &[1, 1, 1, 1],
    &[1, 0, 1, 0, 1, 0, 1, 0],
    &[1; 16],
    &[1; 32],
    &[1, 1, 0, 1, 0, 1, 1, 1],
];

const HIGHTOM_FILLS: Templates = &[
    &[1, 1, 1, 1],
    &[1, 1, 0, 1, 1, 0, 1, 1],
    &[1; 16],
    &[1; 32],
    &[1, 1, 1, 0, 1, 1, 1, 0],
];

const BUILTIN: &[(&str, Templates, Templates)] = &[
    ("kick", KICK, KICK_FILLS),
    ("snare", SNARE, SNARE_FILLS),
    ("hihat", HIHAT, HIHAT_FILLS),
    ("rimshot", RIMSHOT, &[]),
    ("floortom", FLOORTOM, FLOORTOM_FILLS),
    ("hightom", HIGHTOM, HIGHTOM_FILLS),
];

fn to_grids(templates: Templates) -> Vec<Vec<bool>> {
    templates
        .iter()
        .map(|template| template.iter().map(|step| *step != 0).collect())
        .collect()
}

/// Standard and fill templates per instrument.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TemplateLibrary {
    standard: HashMap<String, Vec<Vec<bool>>>,
    fills: HashMap<String, Vec<Vec<bool>>>,
}

impl TemplateLibrary {
    /// A library with no templates. Every instrument plays on every step.
    pub fn empty() -> TemplateLibrary {
        TemplateLibrary::default()
    }

    /// The built-in library.
    pub fn builtin() -> TemplateLibrary {
        let mut library = TemplateLibrary::empty();
        for &(key, standard, fills) in BUILTIN {
            library.standard.insert(key.to_string(), to_grids(standard));
            if !fills.is_empty() {
                library.fills.insert(key.to_string(), to_grids(fills));
            }
        }
        library
    }

    /// Returns a copy with the templates of one instrument replaced. `None` keeps the
    /// existing set; an empty set removes it.
    pub fn with_override(
        &self,
        key: &str,
        standard: Option<Vec<Vec<bool>>>,
        fills: Option<Vec<Vec<bool>>>,
    ) -> TemplateLibrary {
        let mut library = self.clone();
        for (set, replacement) in [
            (&mut library.standard, standard),
            (&mut library.fills, fills),
        ] {
            match replacement {
                Some(templates) if templates.is_empty() => {
                    set.remove(key);
                }
                Some(templates) => {
                    set.insert(key.to_string(), templates);
                }
                None => {}
            }
        }
        library
    }

    /// The standard templates of an instrument.
    pub fn standard(&self, key: &str) -> &[Vec<bool>] {
        self.standard.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The fill templates of an instrument.
    pub fn fills(&self, key: &str) -> &[Vec<bool>] {
        self.fills.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The templates to choose from for a cycle. Instruments without fills use their
    /// standard templates in fill cycles.
    pub fn choices(&self, key: &str, is_fill: bool) -> &[Vec<bool>] {
        let fills = self.fills(key);
        if is_fill && !fills.is_empty() {
            fills
        } else {
            self.standard(key)
        }
    }
}
