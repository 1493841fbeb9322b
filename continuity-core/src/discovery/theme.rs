//! Emergent theme tracking.

use serde::{Deserialize, Serialize};

/// How established a theme is, weakest first.
///
/// Strength only ever increases; reinforcement promotes, nothing
/// demotes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ThemeStrength {
    Subtle,
    Developing,
    Prominent,
    Central,
}

impl ThemeStrength {
    pub fn name(&self) -> &'static str {
        match self {
            ThemeStrength::Subtle => "subtle",
            ThemeStrength::Developing => "developing",
            ThemeStrength::Prominent => "prominent",
            ThemeStrength::Central => "central",
        }
    }
}

/// Occurrence counts at which a theme is promoted.
const DEVELOPING_AT: usize = 3;
const PROMINENT_AT: usize = 5;
const CENTRAL_AT: usize = 8;

/// A theme that surfaced in generated content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmergentTheme {
    pub name: String,
    pub strength: ThemeStrength,
    /// Unit numbers where the theme appeared.
    pub occurrences: Vec<u32>,
    /// Whether the original outline already named this theme.
    pub was_planned: bool,
}

impl EmergentTheme {
    /// Create a theme first seen in the given unit.
    pub fn new(name: impl Into<String>, unit: u32, was_planned: bool) -> Self {
        Self {
            name: name.into(),
            strength: ThemeStrength::Subtle,
            occurrences: vec![unit],
            was_planned,
        }
    }

    /// Record another occurrence and promote if a threshold is crossed.
    pub fn reinforce(&mut self, unit: u32) {
        self.occurrences.push(unit);
        let floor = if self.occurrences.len() >= CENTRAL_AT {
            ThemeStrength::Central
        } else if self.occurrences.len() >= PROMINENT_AT {
            ThemeStrength::Prominent
        } else if self.occurrences.len() >= DEVELOPING_AT {
            ThemeStrength::Developing
        } else {
            ThemeStrength::Subtle
        };
        self.strength = self.strength.max(floor);
    }

    /// Whether the theme is established enough to steer revision.
    pub fn is_strong(&self) -> bool {
        self.strength >= ThemeStrength::Prominent
    }
}
