//! Format-specific character sub-profiles.
//!
//! Each arc carries exactly one profile, created at initialization to
//! match the tracker's format. Updaters accumulate small deltas:
//! counts, append-if-new lists, last-value-wins scalars, and rolling
//! proportional averages.

use crate::format::ContentFormat;
use serde::{Deserialize, Serialize};

/// The per-format sub-profile on a character arc.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FormatProfile {
    Book(BookProseProfile),
    Comic(ComicVisualProfile),
    Screenplay(ScreenplayProfile),
}

impl FormatProfile {
    pub fn empty(format: ContentFormat) -> Self {
        match format {
            ContentFormat::Book => FormatProfile::Book(BookProseProfile::default()),
            ContentFormat::Comic => FormatProfile::Comic(ComicVisualProfile::default()),
            ContentFormat::Screenplay => {
                FormatProfile::Screenplay(ScreenplayProfile::default())
            }
        }
    }

    pub fn format(&self) -> ContentFormat {
        match self {
            FormatProfile::Book(_) => ContentFormat::Book,
            FormatProfile::Comic(_) => ContentFormat::Comic,
            FormatProfile::Screenplay(_) => ContentFormat::Screenplay,
        }
    }
}

fn push_if_new(list: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    if !list.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        list.push(value.to_string());
    }
}

/// Fold one sample into a rolling proportional average.
fn roll(average: f32, samples: u32, value: f32) -> f32 {
    (average * samples as f32 + value) / (samples + 1) as f32
}

// ============================================================================
// Comic
// ============================================================================

/// How a character appears on the page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComicVisualProfile {
    pub panel_appearances: u32,
    pub costume_changes: u32,
    /// Distinct facial expressions the character has shown.
    pub expressions: Vec<String>,
    /// Visual motifs drawn with this character.
    pub motifs: Vec<String>,
}

/// One unit's worth of comic visual observations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComicVisualDelta {
    pub panel_appearances: u32,
    pub costume_changed: bool,
    pub expression: Option<String>,
    pub motif: Option<String>,
}

impl ComicVisualProfile {
    pub fn update(&mut self, delta: &ComicVisualDelta) {
        self.panel_appearances += delta.panel_appearances;
        if delta.costume_changed {
            self.costume_changes += 1;
        }
        if let Some(expression) = &delta.expression {
            push_if_new(&mut self.expressions, expression);
        }
        if let Some(motif) = &delta.motif {
            push_if_new(&mut self.motifs, motif);
        }
    }
}

// ============================================================================
// Screenplay
// ============================================================================

/// How a character plays on screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScreenplayProfile {
    pub scenes_present: u32,
    /// Rolling share of the character's scenes spent in dialogue.
    pub dialogue_share: f32,
    /// Rolling share of the character's scenes spent in silence.
    pub silence_share: f32,
    /// Sample count behind the rolling shares.
    pub share_samples: u32,
    /// Distinct speech quirks observed.
    pub speech_quirks: Vec<String>,
}

/// One unit's worth of screenplay observations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScreenplayProfileDelta {
    pub scenes_present: u32,
    /// Dialogue share within this unit's scenes, in [0,1].
    pub dialogue_share: Option<f32>,
    /// Silent-presence share within this unit's scenes, in [0,1].
    pub silence_share: Option<f32>,
    pub speech_quirk: Option<String>,
}

impl ScreenplayProfile {
    pub fn update(&mut self, delta: &ScreenplayProfileDelta) {
        self.scenes_present += delta.scenes_present;
        if delta.dialogue_share.is_some() || delta.silence_share.is_some() {
            let dialogue = delta.dialogue_share.unwrap_or(0.0).clamp(0.0, 1.0);
            let silence = delta.silence_share.unwrap_or(0.0).clamp(0.0, 1.0);
            self.dialogue_share = roll(self.dialogue_share, self.share_samples, dialogue);
            self.silence_share = roll(self.silence_share, self.share_samples, silence);
            self.share_samples += 1;
        }
        if let Some(quirk) = &delta.speech_quirk {
            push_if_new(&mut self.speech_quirks, quirk);
        }
    }
}

// ============================================================================
// Book
// ============================================================================

/// How a character reads on the page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookProseProfile {
    /// Units narrated from this character's point of view.
    pub pov_units: u32,
    /// Most recent prose-style note for this character's passages.
    pub prose_style: Option<String>,
    /// Distinct interiority notes (inner-life observations).
    pub interiority_notes: Vec<String>,
}

/// One unit's worth of prose observations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookProseDelta {
    pub pov_unit: bool,
    pub prose_style: Option<String>,
    pub interiority_note: Option<String>,
}

impl BookProseProfile {
    pub fn update(&mut self, delta: &BookProseDelta) {
        if delta.pov_unit {
            self.pov_units += 1;
        }
        if let Some(style) = &delta.prose_style {
            // Last value wins.
            self.prose_style = Some(style.clone());
        }
        if let Some(note) = &delta.interiority_note {
            push_if_new(&mut self.interiority_notes, note);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_if_new_is_case_insensitive() {
        let mut profile = ComicVisualProfile::default();
        profile.update(&ComicVisualDelta {
            expression: Some("wry grin".into()),
            ..Default::default()
        });
        profile.update(&ComicVisualDelta {
            expression: Some("Wry Grin".into()),
            ..Default::default()
        });
        assert_eq!(profile.expressions, vec!["wry grin"]);
    }

    #[test]
    fn test_rolling_shares() {
        let mut profile = ScreenplayProfile::default();
        profile.update(&ScreenplayProfileDelta {
            scenes_present: 2,
            dialogue_share: Some(0.8),
            silence_share: Some(0.1),
            speech_quirk: None,
        });
        profile.update(&ScreenplayProfileDelta {
            scenes_present: 1,
            dialogue_share: Some(0.2),
            silence_share: Some(0.5),
            speech_quirk: None,
        });

        assert_eq!(profile.scenes_present, 3);
        assert!((profile.dialogue_share - 0.5).abs() < 1e-6);
        assert!((profile.silence_share - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_prose_style_last_wins() {
        let mut profile = BookProseProfile::default();
        profile.update(&BookProseDelta {
            pov_unit: true,
            prose_style: Some("clipped, present tense".into()),
            interiority_note: None,
        });
        profile.update(&BookProseDelta {
            pov_unit: false,
            prose_style: Some("longer, reflective sentences".into()),
            interiority_note: Some("counts debts when anxious".into()),
        });

        assert_eq!(profile.pov_units, 1);
        assert_eq!(
            profile.prose_style.as_deref(),
            Some("longer, reflective sentences")
        );
        assert_eq!(profile.interiority_notes.len(), 1);
    }
}
