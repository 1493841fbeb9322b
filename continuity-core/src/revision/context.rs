//! Scoped revision context.
//!
//! A `RevisionContext` is a transient view of the discovery ledger for
//! one upcoming unit: which threads that unit should close, which
//! themes it should lean into, which discoveries it should integrate,
//! plus format advisory lines. It exists only for the duration of one
//! revision call and renders itself into the revision prompt.

use crate::discovery::{CharacterDiscovery, DiscoveryState, FormatLedger, PlotThread, ThreadStatus};
use crate::format::ContentFormat;

/// How many units back a character discovery stays in revision prompts.
/// Older discoveries have either been woven in already or gone stale.
const INTEGRATION_WINDOW: u32 = 3;

/// The ledger view handed to one unit's revision.
#[derive(Debug, Clone)]
pub struct RevisionContext {
    pub unit: u32,
    pub format: ContentFormat,
    /// Threads this unit should work toward closing.
    pub threads_to_resolve: Vec<PlotThread>,
    pub themes_to_reinforce: Vec<String>,
    pub integrations: Vec<CharacterDiscovery>,
    /// Format-specific advisory lines from the sub-ledger.
    pub advisories: Vec<String>,
    /// One-paragraph recap of the most recent unit, for batch revision.
    pub recap: Option<String>,
}

impl RevisionContext {
    /// Build the view for one upcoming unit.
    ///
    /// `threads_to_resolve` is passed in rather than derived so batch
    /// revision can chain contexts: threads handed to an earlier unit
    /// in the batch are withheld from later ones.
    pub fn for_unit(
        state: &DiscoveryState,
        unit: u32,
        threads_to_resolve: Vec<PlotThread>,
    ) -> Self {
        Self {
            unit,
            format: state.format,
            threads_to_resolve,
            themes_to_reinforce: state
                .strong_themes()
                .iter()
                .map(|t| t.name.clone())
                .collect(),
            integrations: state
                .character_discoveries
                .iter()
                .filter(|d| d.should_integrate && d.unit + INTEGRATION_WINDOW >= unit)
                .cloned()
                .collect(),
            advisories: format_advisories(state, unit),
            recap: None,
        }
    }

    pub fn with_recap(mut self, recap: impl Into<String>) -> Self {
        self.recap = Some(recap.into());
        self
    }

    /// Threads ready to be written out of the story.
    pub fn ready_threads(state: &DiscoveryState) -> Vec<PlotThread> {
        state
            .threads
            .iter()
            .filter(|t| t.status == ThreadStatus::ReadyToResolve)
            .cloned()
            .collect()
    }

    /// Render the context for the revision prompt.
    pub fn brief(&self) -> String {
        let mut out = String::new();

        if let Some(recap) = &self.recap {
            out.push_str(&format!("## What just happened\n{recap}\n\n"));
        }

        if !self.threads_to_resolve.is_empty() {
            out.push_str("## Threads to resolve\n");
            for thread in &self.threads_to_resolve {
                out.push_str(&format!(
                    "- {} (open since {} {})\n",
                    thread.description,
                    self.format.unit_name(),
                    thread.introduced_in
                ));
            }
            out.push('\n');
        }

        if !self.themes_to_reinforce.is_empty() {
            out.push_str("## Themes to reinforce\n");
            for theme in &self.themes_to_reinforce {
                out.push_str(&format!("- {theme}\n"));
            }
            out.push('\n');
        }

        if !self.integrations.is_empty() {
            out.push_str("## Character discoveries to integrate\n");
            for discovery in &self.integrations {
                out.push_str(&format!("- {}: {}\n", discovery.character, discovery.description));
            }
            out.push('\n');
        }

        if !self.advisories.is_empty() {
            out.push_str(&format!("## {} notes\n", capitalize(self.format.name())));
            for advisory in &self.advisories {
                out.push_str(&format!("- {advisory}\n"));
            }
            out.push('\n');
        }

        out
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Advisory lines from the format sub-ledger.
fn format_advisories(state: &DiscoveryState, unit: u32) -> Vec<String> {
    let mut advisories = Vec::new();
    match &state.ledger {
        FormatLedger::Book(ledger) => {
            for setup in ledger.due_foreshadowing(unit) {
                match &setup.payoff_hint {
                    Some(hint) => advisories.push(format!(
                        "foreshadowing due: {} (intended payoff: {})",
                        setup.setup, hint
                    )),
                    None => advisories.push(format!("foreshadowing due: {}", setup.setup)),
                }
            }
            if let Some(kind) = ledger.stale_ending_pattern() {
                advisories.push(format!(
                    "the last three chapters all ended on a {kind}; vary the ending"
                ));
            }
            if ledger.last_ending_weak() {
                advisories.push("the previous chapter ending was weak; end on a stronger beat".into());
            }
            for symbol in ledger.recurring_symbols() {
                advisories.push(format!(
                    "recurring symbol available: {} (seen {} times)",
                    symbol.name, symbol.occurrences
                ));
            }
        }
        FormatLedger::Comic(ledger) => {
            for conflict in &ledger.conflicts {
                if conflict.unit == unit.saturating_sub(1) || conflict.unit == unit {
                    advisories.push(format!(
                        "visual conflict: {}'s {} drawn as \"{}\" but previously \"{}\"",
                        conflict.character, conflict.attribute, conflict.conflicting, conflict.prior
                    ));
                }
            }
            let share = ledger.dialogue_flow_share();
            if share > 0.7 {
                advisories.push(format!(
                    "{:.0}% of pages are dialogue-flow; add visual variety",
                    share * 100.0
                ));
            }
            if ledger.recent_weak_hooks(unit) >= 2 {
                advisories.push("recent page-turn hooks are weak; end pages on stronger beats".into());
            }
            for motif in ledger.reinforceable_motifs() {
                advisories.push(format!(
                    "motif worth reinforcing: {} (seen {} times)",
                    motif.name, motif.occurrences
                ));
            }
        }
        FormatLedger::Screenplay(ledger) => {
            let ratio = ledger.dialogue_ratio();
            if ratio > 0.7 {
                advisories.push(format!(
                    "dialogue-heavy so far ({:.0}%); add visual storytelling",
                    ratio * 100.0
                ));
            } else if ratio < 0.3 {
                advisories.push(format!(
                    "action-heavy so far ({:.0}% dialogue); give characters room to speak",
                    ratio * 100.0
                ));
            }
            for location in ledger.overused_locations() {
                advisories.push(format!("location overused: {location}"));
            }
            if let Some(issue) = &ledger.pacing_issue {
                advisories.push(format!("pacing: {issue}"));
            }
            if let Some(purpose) = ledger.repeated_purpose() {
                advisories.push(format!("recent scenes keep serving the same purpose: {purpose}"));
            }
        }
    }
    advisories
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{DiscoveryTracker, ThreadStatus};
    use crate::extraction::{
        ExtractionRecord, ThemeMention, ThreadKind, ThreadMention, ThreadUrgency,
    };

    fn state_with_ready_thread() -> DiscoveryState {
        let mut tracker = DiscoveryTracker::new(ContentFormat::Book, "an outline");
        let mut record = ExtractionRecord::empty(1, ContentFormat::Book);
        record.threads.push(ThreadMention {
            description: "the guild enforcer closes in".into(),
            kind: ThreadKind::Introduction,
            urgency: ThreadUrgency::Normal,
        });
        record.emergent_themes.push(ThemeMention {
            name: "debt".into(),
            evidence: String::new(),
        });
        tracker.process_unit(&record);

        let mut rec2 = ExtractionRecord::empty(2, ContentFormat::Book);
        rec2.threads.push(ThreadMention {
            description: "the guild enforcer closes in on the house".into(),
            kind: ThreadKind::Advancement,
            urgency: ThreadUrgency::Immediate,
        });
        tracker.process_unit(&rec2);
        tracker.into_state()
    }

    #[test]
    fn test_ready_threads_selected() {
        let state = state_with_ready_thread();
        let ready = RevisionContext::ready_threads(&state);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].status, ThreadStatus::ReadyToResolve);
    }

    #[test]
    fn test_brief_renders_sections() {
        let state = state_with_ready_thread();
        let ready = RevisionContext::ready_threads(&state);
        let context = RevisionContext::for_unit(&state, 3, ready);
        let brief = context.brief();

        assert!(brief.contains("## Threads to resolve"));
        assert!(brief.contains("the guild enforcer closes in"));
        // No strong themes yet, so no theme section.
        assert!(!brief.contains("## Themes to reinforce"));
    }

    #[test]
    fn test_empty_context_renders_empty() {
        let state = DiscoveryState::new(ContentFormat::Screenplay, "an outline");
        let context = RevisionContext::for_unit(&state, 1, Vec::new());
        assert!(context.brief().is_empty());
    }

    #[test]
    fn test_old_discoveries_drop_out_of_integrations() {
        use crate::discovery::{CharacterDiscovery, DiscoveryKind};

        let mut state = DiscoveryState::new(ContentFormat::Book, "an outline");
        state.character_discoveries.push(CharacterDiscovery {
            character: "Mara".into(),
            kind: DiscoveryKind::Backstory,
            description: "Mara grew up on the ferries".into(),
            unit: 1,
            should_integrate: true,
        });
        state.character_discoveries.push(CharacterDiscovery {
            character: "Edan".into(),
            kind: DiscoveryKind::Motivation,
            description: "Edan wants the ledger for himself".into(),
            unit: 5,
            should_integrate: true,
        });

        let context = RevisionContext::for_unit(&state, 6, Vec::new());
        assert_eq!(context.integrations.len(), 1);
        assert_eq!(context.integrations[0].character, "Edan");

        // Both are still fresh enough two units earlier.
        let context = RevisionContext::for_unit(&state, 4, Vec::new());
        assert_eq!(context.integrations.len(), 2);
    }
}
