//! Character arc tracking.
//!
//! Long-running per-character state: arc stage, emotional history,
//! relationships, knowledge, decisions, wounds, and one format-specific
//! sub-profile. Arcs are created lazily the first time a character
//! shows up in an extraction and are mutated in place for the lifetime
//! of the story.

pub mod profile;
pub mod state;

use crate::classify::{
    capability_impact, decision_trait_classifier, intensity_classifier,
    significance_classifier, EmotionIntensity, KeywordClassifier, KnowledgeSignificance,
};
use crate::extraction::{CharacterDelta, RelationshipDelta};
use crate::format::ContentFormat;
use crate::namemap::{normalize, NameMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use profile::{
    BookProseDelta, BookProseProfile, ComicVisualDelta, ComicVisualProfile, FormatProfile,
    ScreenplayProfile, ScreenplayProfileDelta,
};
pub use state::{
    ArcStage, CharacterKnowledge, DecisionPoint, EmotionalState, RelationshipState,
    RelationshipStatus, WoundOrGrowth,
};

/// Units spent in crisis before the diagnostic flags the character.
const CRISIS_STUCK_AFTER: u32 = 3;

/// How many knowledge entries a summary shows.
const SUMMARY_KNOWLEDGE: usize = 3;

/// Everything tracked about one character.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterArc {
    pub name: String,
    pub role: Option<String>,
    pub stage: ArcStage,
    /// Unit in which the current stage was entered.
    pub stage_entered_in: u32,
    pub first_seen: u32,
    pub emotional_history: Vec<EmotionalState>,
    pub relationships: NameMap<RelationshipState>,
    pub knowledge: Vec<CharacterKnowledge>,
    pub decisions: Vec<DecisionPoint>,
    pub wounds: Vec<WoundOrGrowth>,
    /// Dominant decision trait, recomputed on every decision.
    pub choice_pattern: Option<String>,
    pub profile: FormatProfile,
}

impl CharacterArc {
    pub fn new(
        name: impl Into<String>,
        role: Option<String>,
        format: ContentFormat,
        unit: u32,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            stage: ArcStage::Setup,
            stage_entered_in: unit,
            first_seen: unit,
            emotional_history: Vec::new(),
            relationships: NameMap::new(),
            knowledge: Vec::new(),
            decisions: Vec::new(),
            wounds: Vec::new(),
            choice_pattern: None,
            profile: FormatProfile::empty(format),
        }
    }

    /// Move to a later stage. Backward moves are ignored.
    pub fn advance_stage(&mut self, stage: ArcStage, unit: u32) {
        if stage > self.stage {
            self.stage = stage;
            self.stage_entered_in = unit;
        }
    }

    /// The currently ongoing wound, if any.
    pub fn ongoing_wound(&self) -> Option<&WoundOrGrowth> {
        self.wounds.iter().find(|w| w.ongoing)
    }
}

/// The serializable arc map for one story.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArcState {
    pub format: ContentFormat,
    pub arcs: NameMap<CharacterArc>,
}

impl ArcState {
    pub fn new(format: ContentFormat) -> Self {
        Self {
            format,
            arcs: NameMap::new(),
        }
    }
}

/// What one unit did to one character's arc.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArcUpdate {
    pub character: String,
    pub unit: u32,
    pub stage_before: ArcStage,
    pub stage: ArcStage,
    pub notes: Vec<String>,
}

impl ArcUpdate {
    pub fn stage_changed(&self) -> bool {
        self.stage != self.stage_before
    }
}

/// Tracks every character's arc across a story's units.
pub struct CharacterArcTracker {
    state: ArcState,
    intensity: KeywordClassifier<EmotionIntensity>,
    significance: KeywordClassifier<KnowledgeSignificance>,
    decision_trait: KeywordClassifier<&'static str>,
}

impl CharacterArcTracker {
    pub fn new(format: ContentFormat) -> Self {
        Self::from_state(ArcState::new(format))
    }

    /// Rebuild a tracker from caller-persisted state.
    pub fn from_state(state: ArcState) -> Self {
        Self {
            state,
            intensity: intensity_classifier(),
            significance: significance_classifier(),
            decision_trait: decision_trait_classifier(),
        }
    }

    pub fn state(&self) -> &ArcState {
        &self.state
    }

    pub fn into_state(self) -> ArcState {
        self.state
    }

    pub fn arc(&self, name: &str) -> Option<&CharacterArc> {
        self.state.arcs.get(name)
    }

    /// Start tracking a character explicitly, with a role.
    ///
    /// Characters who show up in deltas are initialized lazily; this
    /// exists for named cast the caller wants tracked from the start.
    pub fn initialize(&mut self, name: &str, role: Option<&str>, unit: u32) {
        let format = self.state.format;
        self.state.arcs.get_or_insert_with(name, || {
            CharacterArc::new(name, role.map(String::from), format, unit)
        });
    }

    /// Fold one unit's character and relationship deltas into the arcs.
    pub fn update_from_unit(
        &mut self,
        character_deltas: &[CharacterDelta],
        relationship_deltas: &[RelationshipDelta],
        unit: u32,
    ) -> Vec<ArcUpdate> {
        struct Pending {
            stage_before: ArcStage,
            notes: Vec<String>,
            decided: bool,
        }
        let mut pending: BTreeMap<String, Pending> = BTreeMap::new();
        let format = self.state.format;

        for delta in character_deltas {
            if delta.name.trim().is_empty() {
                continue;
            }
            // Classify before touching the arc so the classifiers stay
            // free to borrow.
            let intensity = delta.emotional_state.as_deref().map(|d| self.intensity.classify(d));
            let significance = delta.learned.as_deref().map(|d| self.significance.classify(d));
            let inferred_trait = delta.decision.as_deref().map(|d| self.decision_trait.classify(d));

            let arc = self
                .state
                .arcs
                .get_or_insert_with(&delta.name, || {
                    CharacterArc::new(delta.name.clone(), None, format, unit)
                });
            let entry = pending.entry(normalize(&delta.name)).or_insert(Pending {
                stage_before: arc.stage,
                notes: Vec::new(),
                decided: false,
            });

            if let (Some(description), Some(intensity)) = (&delta.emotional_state, intensity) {
                arc.emotional_history.push(EmotionalState {
                    unit,
                    description: description.clone(),
                    intensity,
                });
                entry.notes.push(format!("emotional: {} ({})", description, intensity.name()));
            }

            if let (Some(content), Some(significance)) = (&delta.learned, significance) {
                arc.knowledge.push(CharacterKnowledge {
                    unit,
                    content: content.clone(),
                    significance,
                });
                entry.notes.push(format!("learned: {} ({})", content, significance.name()));
            }

            if let Some(physical) = &delta.physical_state {
                // One ongoing wound at a time.
                if arc.ongoing_wound().is_none() {
                    let impact = capability_impact(physical);
                    arc.wounds.push(WoundOrGrowth {
                        unit,
                        description: physical.clone(),
                        capability_impact: impact.map(String::from),
                        ongoing: true,
                    });
                    entry.notes.push(match impact {
                        Some(impact) => format!("wound: {} ({})", physical, impact),
                        None => format!("wound: {}", physical),
                    });
                }
            }

            if let (Some(description), Some(inferred_trait)) = (&delta.decision, inferred_trait) {
                arc.decisions.push(DecisionPoint {
                    unit,
                    description: description.clone(),
                    inferred_trait: inferred_trait.to_string(),
                });
                arc.choice_pattern = dominant_trait(&arc.decisions);
                entry.notes.push(format!("decision: {}", description));
                entry.decided = true;
            }
        }

        for delta in relationship_deltas {
            let (a, b) = &delta.between;
            if a.trim().is_empty() || b.trim().is_empty() {
                continue;
            }
            // Symmetric: both sides record the change.
            for (this, other) in [(a, b), (b, a)] {
                let arc = self.state.arcs.get_or_insert_with(this, || {
                    CharacterArc::new(this.clone(), None, format, unit)
                });
                arc.relationships
                    .get_or_insert_with(other, || RelationshipState::new(other.clone()))
                    .apply(delta.change, &delta.detail, unit);

                pending
                    .entry(normalize(this))
                    .or_insert(Pending {
                        stage_before: arc.stage,
                        notes: Vec::new(),
                        decided: false,
                    })
                    .notes
                    .push(format!("relationship with {}: {}", other, delta.detail));
            }
        }

        let mut updates = Vec::new();
        for (key, entry) in pending {
            let Some(arc) = self.state.arcs.get_mut(&key) else {
                continue;
            };

            // Forward-only stage machine, evaluated in order so one
            // unit can carry an arc through more than one stage.
            if arc.stage == ArcStage::Setup && arc.emotional_history.len() >= 2 {
                arc.advance_stage(ArcStage::Conflict, unit);
            }
            if arc.stage == ArcStage::Conflict
                && arc
                    .emotional_history
                    .last()
                    .map(|e| e.intensity >= EmotionIntensity::High)
                    .unwrap_or(false)
            {
                arc.advance_stage(ArcStage::Rising, unit);
            }
            if arc.stage == ArcStage::Rising && entry.decided {
                arc.advance_stage(ArcStage::Crisis, unit);
            }

            if arc.stage != entry.stage_before {
                tracing::debug!(
                    character = %arc.name,
                    from = entry.stage_before.name(),
                    to = arc.stage.name(),
                    unit,
                    "arc stage advanced"
                );
            }
            updates.push(ArcUpdate {
                character: arc.name.clone(),
                unit,
                stage_before: entry.stage_before,
                stage: arc.stage,
                notes: entry.notes,
            });
        }
        updates
    }

    /// Record a decision made outside a unit delta.
    pub fn record_decision(&mut self, name: &str, description: &str, unit: u32) {
        let inferred_trait = self.decision_trait.classify(description);
        let format = self.state.format;
        let arc = self.state.arcs.get_or_insert_with(name, || {
            CharacterArc::new(name, None, format, unit)
        });
        arc.decisions.push(DecisionPoint {
            unit,
            description: description.to_string(),
            inferred_trait: inferred_trait.to_string(),
        });
        arc.choice_pattern = dominant_trait(&arc.decisions);
    }

    /// Whether a character has sat in crisis long enough to need
    /// authorial attention. The machine defines no transition past
    /// crisis, so this is a diagnostic, not a transition.
    pub fn stuck_in_crisis(&self, name: &str, current_unit: u32) -> bool {
        self.state
            .arcs
            .get(name)
            .map(|arc| {
                arc.stage == ArcStage::Crisis
                    && current_unit.saturating_sub(arc.stage_entered_in) >= CRISIS_STUCK_AFTER
            })
            .unwrap_or(false)
    }

    pub fn update_comic_visuals(&mut self, name: &str, delta: &ComicVisualDelta) {
        let Some(arc) = self.state.arcs.get_mut(name) else {
            tracing::warn!(character = name, "visual delta for untracked character, ignored");
            return;
        };
        match &mut arc.profile {
            FormatProfile::Comic(profile) => profile.update(delta),
            _ => tracing::warn!(character = name, "comic delta on a non-comic profile, ignored"),
        }
    }

    pub fn update_screenplay_profile(&mut self, name: &str, delta: &ScreenplayProfileDelta) {
        let Some(arc) = self.state.arcs.get_mut(name) else {
            tracing::warn!(character = name, "profile delta for untracked character, ignored");
            return;
        };
        match &mut arc.profile {
            FormatProfile::Screenplay(profile) => profile.update(delta),
            _ => tracing::warn!(
                character = name,
                "screenplay delta on a non-screenplay profile, ignored"
            ),
        }
    }

    pub fn update_book_prose(&mut self, name: &str, delta: &BookProseDelta) {
        let Some(arc) = self.state.arcs.get_mut(name) else {
            tracing::warn!(character = name, "prose delta for untracked character, ignored");
            return;
        };
        match &mut arc.profile {
            FormatProfile::Book(profile) => profile.update(delta),
            _ => tracing::warn!(character = name, "book delta on a non-book profile, ignored"),
        }
    }

    /// Render one character's arc for the next generation prompt.
    pub fn summary(&self, name: &str) -> Option<String> {
        let arc = self.state.arcs.get(name)?;
        let mut out = String::new();

        match &arc.role {
            Some(role) => out.push_str(&format!("{} ({}): {} stage", arc.name, role, arc.stage.name())),
            None => out.push_str(&format!("{}: {} stage", arc.name, arc.stage.name())),
        }
        out.push('\n');

        if let Some(last) = arc.emotional_history.last() {
            out.push_str(&format!(
                "Current emotional state: {} ({})\n",
                last.description,
                last.intensity.name()
            ));
        }
        if let Some(pattern) = &arc.choice_pattern {
            out.push_str(&format!("Pattern of choice: {}\n", pattern));
        }
        for relationship in arc.relationships.values() {
            out.push_str(&format!(
                "Relationship with {}: {} (trust {})\n",
                relationship.counterpart,
                relationship.status.name(),
                relationship.trust
            ));
        }
        for knowledge in arc.knowledge.iter().rev().take(SUMMARY_KNOWLEDGE) {
            out.push_str(&format!(
                "Knows: {} ({})\n",
                knowledge.content,
                knowledge.significance.name()
            ));
        }
        if let Some(wound) = arc.ongoing_wound() {
            match &wound.capability_impact {
                Some(impact) => out.push_str(&format!("Ongoing: {} ({})\n", wound.description, impact)),
                None => out.push_str(&format!("Ongoing: {}\n", wound.description)),
            }
        }

        match &arc.profile {
            FormatProfile::Book(profile) => {
                if let Some(style) = &profile.prose_style {
                    out.push_str(&format!("Prose style: {}\n", style));
                }
                if !profile.interiority_notes.is_empty() {
                    out.push_str(&format!(
                        "Interiority: {}\n",
                        profile.interiority_notes.join("; ")
                    ));
                }
            }
            FormatProfile::Comic(profile) => {
                if !profile.expressions.is_empty() {
                    out.push_str(&format!("Expressions shown: {}\n", profile.expressions.join(", ")));
                }
                if !profile.motifs.is_empty() {
                    out.push_str(&format!("Visual motifs: {}\n", profile.motifs.join(", ")));
                }
            }
            FormatProfile::Screenplay(profile) => {
                if profile.share_samples > 0 {
                    out.push_str(&format!(
                        "On screen: {:.0}% dialogue, {:.0}% silent presence\n",
                        profile.dialogue_share * 100.0,
                        profile.silence_share * 100.0
                    ));
                }
                if !profile.speech_quirks.is_empty() {
                    out.push_str(&format!("Speech: {}\n", profile.speech_quirks.join(", ")));
                }
            }
        }

        Some(out)
    }

    /// Render a digest of every tracked character.
    pub fn roster_summary(&self) -> String {
        let mut sections: Vec<String> = Vec::new();
        for arc in self.state.arcs.values() {
            if let Some(summary) = self.summary(&arc.name) {
                sections.push(summary);
            }
        }
        sections.join("\n")
    }
}

/// Most frequent inferred trait; ties go to the first seen.
fn dominant_trait(decisions: &[DecisionPoint]) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for decision in decisions {
        let count = decisions
            .iter()
            .filter(|d| d.inferred_trait == decision.inferred_trait)
            .count();
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((&decision.inferred_trait, count)),
        }
    }
    best.map(|(t, _)| t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::RelationshipChange;

    fn delta(name: &str) -> CharacterDelta {
        CharacterDelta {
            name: name.into(),
            ..Default::default()
        }
    }

    fn emotional(name: &str, state: &str) -> CharacterDelta {
        CharacterDelta {
            emotional_state: Some(state.into()),
            ..delta(name)
        }
    }

    #[test]
    fn test_lazy_initialization() {
        let mut tracker = CharacterArcTracker::new(ContentFormat::Book);
        tracker.update_from_unit(&[emotional("Mara", "worried about the debt")], &[], 1);

        let arc = tracker.arc("mara").unwrap();
        assert_eq!(arc.name, "Mara");
        assert_eq!(arc.stage, ArcStage::Setup);
        assert_eq!(arc.first_seen, 1);
        assert_eq!(arc.emotional_history.len(), 1);
    }

    #[test]
    fn test_stage_progression() {
        let mut tracker = CharacterArcTracker::new(ContentFormat::Book);

        tracker.update_from_unit(&[emotional("Mara", "worried about the debt")], &[], 1);
        assert_eq!(tracker.arc("Mara").unwrap().stage, ArcStage::Setup);

        // Two emotional entries: setup moves to conflict.
        tracker.update_from_unit(&[emotional("Mara", "angry at the guild")], &[], 2);
        assert_eq!(tracker.arc("Mara").unwrap().stage, ArcStage::Conflict);

        // High intensity: conflict moves to rising.
        tracker.update_from_unit(&[emotional("Mara", "terrified of losing the house")], &[], 3);
        assert_eq!(tracker.arc("Mara").unwrap().stage, ArcStage::Rising);

        // Extreme emotion plus a decision in the same unit: crisis.
        let update = tracker.update_from_unit(
            &[CharacterDelta {
                emotional_state: Some("utterly devastated, the world breaks".into()),
                decision: Some("she refuses to sell and stands her ground".into()),
                ..delta("Mara")
            }],
            &[],
            4,
        );
        assert_eq!(tracker.arc("Mara").unwrap().stage, ArcStage::Crisis);
        assert!(update[0].stage_changed());
        assert_eq!(update[0].stage_before, ArcStage::Rising);
    }

    #[test]
    fn test_stage_never_regresses() {
        let mut tracker = CharacterArcTracker::new(ContentFormat::Book);
        let mut last = ArcStage::Setup;
        for unit in 1..=10 {
            let state = if unit % 2 == 0 {
                "devastated and broken"
            } else {
                "calm for now"
            };
            let mut d = emotional("Mara", state);
            if unit == 5 {
                d.decision = Some("confronts the guildmaster".into());
            }
            tracker.update_from_unit(&[d], &[], unit);
            let stage = tracker.arc("Mara").unwrap().stage;
            assert!(stage >= last, "stage regressed at unit {}", unit);
            last = stage;
        }
    }

    #[test]
    fn test_stuck_in_crisis_diagnostic() {
        let mut tracker = CharacterArcTracker::new(ContentFormat::Book);
        tracker.update_from_unit(&[emotional("Mara", "worried")], &[], 1);
        tracker.update_from_unit(&[emotional("Mara", "enraged beyond words")], &[], 2);
        tracker.update_from_unit(
            &[CharacterDelta {
                decision: Some("she refuses the deal".into()),
                ..delta("Mara")
            }],
            &[],
            3,
        );
        assert_eq!(tracker.arc("Mara").unwrap().stage, ArcStage::Crisis);

        assert!(!tracker.stuck_in_crisis("Mara", 4));
        assert!(tracker.stuck_in_crisis("Mara", 6));
        assert!(!tracker.stuck_in_crisis("nobody", 6));
    }

    #[test]
    fn test_decision_pattern_ties_to_first_seen() {
        let mut tracker = CharacterArcTracker::new(ContentFormat::Book);
        tracker.record_decision("Mara", "shields Edan from the blow", 1);
        tracker.record_decision("Mara", "flees the burning warehouse", 2);

        // One each: the first-seen trait wins the tie.
        assert_eq!(
            tracker.arc("Mara").unwrap().choice_pattern.as_deref(),
            Some("protects others before themselves")
        );

        tracker.record_decision("Mara", "runs rather than meet the enforcer", 3);
        assert_eq!(
            tracker.arc("Mara").unwrap().choice_pattern.as_deref(),
            Some("avoids conflict until forced")
        );
    }

    #[test]
    fn test_one_ongoing_wound_at_a_time() {
        let mut tracker = CharacterArcTracker::new(ContentFormat::Book);
        tracker.update_from_unit(
            &[CharacterDelta {
                physical_state: Some("a deep cut to the leg".into()),
                ..delta("Mara")
            }],
            &[],
            1,
        );
        tracker.update_from_unit(
            &[CharacterDelta {
                physical_state: Some("bruised ribs from the fall".into()),
                ..delta("Mara")
            }],
            &[],
            2,
        );

        let arc = tracker.arc("Mara").unwrap();
        assert_eq!(arc.wounds.len(), 1);
        assert_eq!(
            arc.wounds[0].capability_impact.as_deref(),
            Some("reduced mobility")
        );
    }

    #[test]
    fn test_relationships_are_symmetric() {
        let mut tracker = CharacterArcTracker::new(ContentFormat::Book);
        let updates = tracker.update_from_unit(
            &[],
            &[RelationshipDelta {
                between: ("Mara".into(), "Edan".into()),
                change: RelationshipChange::Worsened,
                detail: "he hid the letter".into(),
            }],
            1,
        );

        assert_eq!(updates.len(), 2);
        let mara = tracker.arc("Mara").unwrap();
        let edan = tracker.arc("Edan").unwrap();
        assert_eq!(mara.relationships.get("Edan").unwrap().trust, -2);
        assert_eq!(edan.relationships.get("Mara").unwrap().trust, -2);
    }

    #[test]
    fn test_summary_includes_format_block() {
        let mut tracker = CharacterArcTracker::new(ContentFormat::Screenplay);
        tracker.initialize("Mara", Some("lead"), 1);
        tracker.update_screenplay_profile(
            "Mara",
            &ScreenplayProfileDelta {
                scenes_present: 2,
                dialogue_share: Some(0.6),
                silence_share: Some(0.2),
                speech_quirk: Some("never finishes apologies".into()),
            },
        );

        let summary = tracker.summary("Mara").unwrap();
        assert!(summary.contains("Mara (lead)"));
        assert!(summary.contains("setup stage"));
        assert!(summary.contains("never finishes apologies"));
    }

    #[test]
    fn test_mismatched_profile_delta_ignored() {
        let mut tracker = CharacterArcTracker::new(ContentFormat::Book);
        tracker.initialize("Mara", None, 1);
        tracker.update_comic_visuals(
            "Mara",
            &ComicVisualDelta {
                panel_appearances: 3,
                ..Default::default()
            },
        );

        assert_eq!(
            tracker.arc("Mara").unwrap().profile,
            FormatProfile::Book(BookProseProfile::default())
        );
    }

    #[test]
    fn test_state_round_trip() {
        let mut tracker = CharacterArcTracker::new(ContentFormat::Book);
        tracker.update_from_unit(
            &[CharacterDelta {
                emotional_state: Some("worried about the debt".into()),
                learned: Some("the guild forged the ledger".into()),
                ..delta("Mara")
            }],
            &[],
            1,
        );

        let json = serde_json::to_string(tracker.state()).unwrap();
        let restored: ArcState = serde_json::from_str(&json).unwrap();
        assert_eq!(tracker.state(), &restored);

        let mut live = tracker;
        let mut restored = CharacterArcTracker::from_state(restored);
        let rec = emotional("Mara", "enraged at the forgery");
        assert_eq!(
            live.update_from_unit(&[rec.clone()], &[], 2),
            restored.update_from_unit(&[rec], &[], 2)
        );
        assert_eq!(live.state(), restored.state());
    }
}
