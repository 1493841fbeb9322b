//! Format-specific discovery sub-ledgers.
//!
//! Each story instance carries exactly one of these, matching its
//! content format. Ledgers accumulate the format-native signals the
//! revision planner scores: page hooks and visual consistency for
//! comics, location and dialogue balance for screenplays, symbols and
//! foreshadowing for books.

use crate::extraction::{BookExtraction, ComicExtraction, PageFlow, ScreenplayExtraction};
use crate::format::ContentFormat;
use crate::matching::prefix_matches;
use crate::namemap::NameMap;
use serde::{Deserialize, Serialize};

/// How many units back "recent" reaches for hook and conflict scoring.
const RECENT_UNITS: u32 = 3;

/// The per-format cumulative sub-ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FormatLedger {
    Book(BookLedger),
    Comic(ComicLedger),
    Screenplay(ScreenplayLedger),
}

impl FormatLedger {
    pub fn empty(format: ContentFormat) -> Self {
        match format {
            ContentFormat::Book => FormatLedger::Book(BookLedger::default()),
            ContentFormat::Comic => FormatLedger::Comic(ComicLedger::default()),
            ContentFormat::Screenplay => FormatLedger::Screenplay(ScreenplayLedger::default()),
        }
    }

    pub fn format(&self) -> ContentFormat {
        match self {
            FormatLedger::Book(_) => ContentFormat::Book,
            FormatLedger::Comic(_) => ContentFormat::Comic,
            FormatLedger::Screenplay(_) => ContentFormat::Screenplay,
        }
    }
}

// ============================================================================
// Comic
// ============================================================================

/// Page-turn hook strength categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    Cliffhanger,
    Question,
    Revelation,
    EmotionalBeat,
    /// Missing or flat hook.
    Weak,
}

/// Categorize a page hook description. A missing hook is weak.
pub fn categorize_hook(hook: Option<&str>) -> HookKind {
    let Some(hook) = hook else {
        return HookKind::Weak;
    };
    let text = hook.to_lowercase();
    if text.trim().is_empty() {
        HookKind::Weak
    } else if ["cliff", "danger", "attack", "falls", "bursts", "explo"]
        .iter()
        .any(|k| text.contains(k))
    {
        HookKind::Cliffhanger
    } else if text.contains('?') || ["who", "what is", "why", "mystery"].iter().any(|k| text.contains(k)) {
        HookKind::Question
    } else if ["reveal", "truth", "unmask", "discover"].iter().any(|k| text.contains(k)) {
        HookKind::Revelation
    } else if ["tears", "embrace", "grief", "kiss", "silence"].iter().any(|k| text.contains(k)) {
        HookKind::EmotionalBeat
    } else {
        HookKind::Weak
    }
}

/// A character visual attribute on record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisualRecord {
    pub character: String,
    pub attribute: String,
    pub value: String,
    pub unit: u32,
}

/// A contradiction between two drawn values of the same attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisualConflict {
    pub character: String,
    pub attribute: String,
    pub prior: String,
    pub conflicting: String,
    pub unit: u32,
}

/// A tracked visual motif.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotifRecord {
    pub name: String,
    pub occurrences: u32,
    pub last_seen: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComicLedger {
    /// Hook category per page, with the unit it came from.
    pub hooks: Vec<(u32, HookKind)>,
    pub action_pages: u32,
    pub dialogue_pages: u32,
    pub establishing_pages: u32,
    pub mixed_pages: u32,
    pub visuals: Vec<VisualRecord>,
    pub conflicts: Vec<VisualConflict>,
    pub motifs: NameMap<MotifRecord>,
}

impl ComicLedger {
    /// Absorb one unit's comic payload.
    pub fn absorb(&mut self, payload: &ComicExtraction, unit: u32) {
        for page in &payload.pages {
            self.hooks.push((unit, categorize_hook(page.hook.as_deref())));
            match page.flow {
                PageFlow::Action => self.action_pages += 1,
                PageFlow::Dialogue => self.dialogue_pages += 1,
                PageFlow::Establishing => self.establishing_pages += 1,
                PageFlow::Mixed => self.mixed_pages += 1,
            }
        }

        for visual in &payload.visuals {
            // Compare against the most recent record of the same
            // attribute; differing values are a consistency conflict.
            let prior = self
                .visuals
                .iter()
                .rev()
                .find(|v| {
                    v.character.eq_ignore_ascii_case(&visual.character)
                        && v.attribute.eq_ignore_ascii_case(&visual.attribute)
                })
                .map(|v| v.value.clone());

            if let Some(prior) = prior {
                if !prior.eq_ignore_ascii_case(&visual.value) {
                    tracing::debug!(
                        character = %visual.character,
                        attribute = %visual.attribute,
                        "visual consistency conflict"
                    );
                    self.conflicts.push(VisualConflict {
                        character: visual.character.clone(),
                        attribute: visual.attribute.clone(),
                        prior,
                        conflicting: visual.value.clone(),
                        unit,
                    });
                }
            }

            self.visuals.push(VisualRecord {
                character: visual.character.clone(),
                attribute: visual.attribute.clone(),
                value: visual.value.clone(),
                unit,
            });
        }

        for motif in &payload.motifs {
            let entry = self.motifs.get_or_insert_with(motif, || MotifRecord {
                name: motif.clone(),
                occurrences: 0,
                last_seen: unit,
            });
            entry.occurrences += 1;
            entry.last_seen = unit;
        }
    }

    pub fn total_pages(&self) -> u32 {
        self.action_pages + self.dialogue_pages + self.establishing_pages + self.mixed_pages
    }

    /// Share of all pages whose visual pacing is dialogue flow.
    pub fn dialogue_flow_share(&self) -> f32 {
        let total = self.total_pages();
        if total == 0 {
            return 0.0;
        }
        self.dialogue_pages as f32 / total as f32
    }

    /// Weak hooks recorded within the recent unit window.
    pub fn recent_weak_hooks(&self, current_unit: u32) -> usize {
        let floor = current_unit.saturating_sub(RECENT_UNITS - 1);
        self.hooks
            .iter()
            .filter(|(unit, kind)| *unit >= floor && *kind == HookKind::Weak)
            .count()
    }

    /// Conflicts detected within the recent unit window.
    pub fn recent_conflicts(&self, current_unit: u32) -> usize {
        let floor = current_unit.saturating_sub(RECENT_UNITS - 1);
        self.conflicts.iter().filter(|c| c.unit >= floor).count()
    }

    /// Motifs seen more than once: candidates for deliberate reuse.
    pub fn reinforceable_motifs(&self) -> Vec<&MotifRecord> {
        self.motifs.values().filter(|m| m.occurrences >= 2).collect()
    }
}

// ============================================================================
// Screenplay
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScreenplayLedger {
    pub location_uses: NameMap<u32>,
    pub scene_count: u32,
    pub dialogue_lines: u64,
    pub action_lines: u64,
    /// Most recent visual beats, newest last.
    pub recent_beats: Vec<String>,
    /// Most recent scene purposes, newest last.
    pub recent_purposes: Vec<String>,
    /// A detected pacing problem, if one is currently standing.
    pub pacing_issue: Option<String>,
}

/// How many recent beats/purposes are kept for pattern detection.
const PATTERN_WINDOW: usize = 6;

impl ScreenplayLedger {
    /// Absorb one unit's screenplay payload.
    pub fn absorb(&mut self, payload: &ScreenplayExtraction, _unit: u32) {
        for scene in &payload.scenes {
            self.scene_count += 1;
            self.dialogue_lines += u64::from(scene.dialogue_lines);
            self.action_lines += u64::from(scene.action_lines);

            if !scene.location.trim().is_empty() {
                *self.location_uses.get_or_insert_with(&scene.location, || 0) += 1;
            }
            if let Some(beat) = &scene.visual_beat {
                push_windowed(&mut self.recent_beats, beat.trim().to_lowercase());
            }
            if !scene.purpose.trim().is_empty() {
                push_windowed(&mut self.recent_purposes, scene.purpose.trim().to_lowercase());
            }
        }

        self.pacing_issue = self.detect_pacing_issue(payload.pacing_note.as_deref());
    }

    fn detect_pacing_issue(&self, note: Option<&str>) -> Option<String> {
        if let Some(note) = note {
            if !note.trim().is_empty() {
                return Some(note.trim().to_string());
            }
        }
        // Three identical visual beats in a row reads as a rut.
        if self.recent_beats.len() >= 3 {
            let tail = &self.recent_beats[self.recent_beats.len() - 3..];
            if tail.iter().all(|b| b == &tail[0]) {
                return Some(format!("visual beat repeated three times: {}", tail[0]));
            }
        }
        None
    }

    /// Rolling dialogue share across all scenes so far.
    ///
    /// Balanced (0.5) when nothing has been counted yet, so an empty
    /// ledger never reads as a pacing problem.
    pub fn dialogue_ratio(&self) -> f32 {
        let total = self.dialogue_lines + self.action_lines;
        if total == 0 {
            return 0.5;
        }
        self.dialogue_lines as f32 / total as f32
    }

    /// Locations leaned on hard enough to feel repetitive.
    pub fn overused_locations(&self) -> Vec<&str> {
        if self.scene_count == 0 {
            return Vec::new();
        }
        self.location_uses
            .iter()
            .filter(|(_, &uses)| uses >= 3 && uses as f32 / self.scene_count as f32 > 0.4)
            .map(|(name, _)| name)
            .collect()
    }

    /// The dominant scene purpose if it repeats in the recent window.
    pub fn repeated_purpose(&self) -> Option<&str> {
        let window = &self.recent_purposes;
        if window.len() < 3 {
            return None;
        }
        for purpose in window {
            if window.iter().filter(|p| *p == purpose).count() >= 3 {
                return Some(purpose);
            }
        }
        None
    }
}

fn push_windowed(buffer: &mut Vec<String>, value: String) {
    buffer.push(value);
    if buffer.len() > PATTERN_WINDOW {
        buffer.remove(0);
    }
}

// ============================================================================
// Book
// ============================================================================

/// A recurring symbol in the prose.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbolRecord {
    pub name: String,
    pub occurrences: u32,
    pub last_seen: u32,
}

/// A foreshadowing setup awaiting its payoff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForeshadowingRecord {
    pub setup: String,
    pub payoff_hint: Option<String>,
    pub planted_in: u32,
    pub paid_off: bool,
}

/// Units after planting before a foreshadowing payoff is due.
const PAYOFF_DUE_AFTER: u32 = 3;

/// Ending kinds that read as weak when they land.
const WEAK_ENDINGS: &[&str] = &["quiet", "flat", "none", "trails off"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookLedger {
    pub symbols: NameMap<SymbolRecord>,
    pub foreshadowing: Vec<ForeshadowingRecord>,
    /// Normalized chapter-ending kind per unit, in order.
    pub endings: Vec<(u32, String)>,
}

impl BookLedger {
    /// Absorb one unit's book payload.
    pub fn absorb(&mut self, payload: &BookExtraction, unit: u32) {
        for symbol in &payload.symbols {
            let entry = self.symbols.get_or_insert_with(symbol, || SymbolRecord {
                name: symbol.clone(),
                occurrences: 0,
                last_seen: unit,
            });
            entry.occurrences += 1;
            entry.last_seen = unit;
        }

        for setup in &payload.foreshadowing {
            self.foreshadowing.push(ForeshadowingRecord {
                setup: setup.setup.clone(),
                payoff_hint: setup.payoff_hint.clone(),
                planted_in: unit,
                paid_off: false,
            });
        }

        if let Some(kind) = &payload.ending_kind {
            self.endings.push((unit, kind.trim().to_lowercase()));
        }
    }

    /// Mark setups paid off by this unit's callback threads.
    pub fn mark_payoffs(&mut self, callback_descriptions: &[&str]) {
        for record in &mut self.foreshadowing {
            if record.paid_off {
                continue;
            }
            if callback_descriptions
                .iter()
                .any(|desc| prefix_matches(desc, &record.setup))
            {
                record.paid_off = true;
            }
        }
    }

    /// Setups planted long enough ago that their payoff is due.
    pub fn due_foreshadowing(&self, current_unit: u32) -> Vec<&ForeshadowingRecord> {
        self.foreshadowing
            .iter()
            .filter(|f| !f.paid_off && current_unit.saturating_sub(f.planted_in) >= PAYOFF_DUE_AFTER)
            .collect()
    }

    /// The ending kind if the last three chapters all used it.
    pub fn stale_ending_pattern(&self) -> Option<&str> {
        if self.endings.len() < 3 {
            return None;
        }
        let tail = &self.endings[self.endings.len() - 3..];
        if tail.iter().all(|(_, kind)| kind == &tail[0].1) {
            Some(&tail[0].1)
        } else {
            None
        }
    }

    /// Whether the most recent chapter ending reads as weak.
    pub fn last_ending_weak(&self) -> bool {
        self.endings
            .last()
            .map(|(_, kind)| WEAK_ENDINGS.iter().any(|w| kind.contains(w)))
            .unwrap_or(false)
    }

    /// Symbols seen in more than one chapter.
    pub fn recurring_symbols(&self) -> Vec<&SymbolRecord> {
        self.symbols.values().filter(|s| s.occurrences >= 2).collect()
    }
}
