//! Revision planning.
//!
//! After each unit, the planner scores how far the generated content
//! has drifted from the plan and, when the score warrants it, asks the
//! text service to revise the upcoming unit plans within a bounded
//! lookahead window.
//!
//! Revision never blocks the pipeline: any generation or parse failure
//! degrades to the unmodified original plan with low confidence. A bad
//! revision call costs an opportunity, not a unit.

pub mod context;

pub use context::RevisionContext;

use crate::discovery::DiscoveryState;
use crate::extraction::{extract_json, ExtractionRecord, Momentum, ThreadUrgency};
use crate::format::ContentFormat;
use serde::{Deserialize, Serialize};
use textgen::{GenerationRequest, TextGenerator};

/// Scoring weights.
const WEIGHT_SURPRISE: u32 = 2;
const WEIGHT_PIVOTAL: u32 = 2;
const WEIGHT_IMMEDIATE_THREAD: u32 = 3;
const WEIGHT_STALE_THREADS: u32 = 1;
const WEIGHT_UNPLANNED_THEME: u32 = 1;
const WEIGHT_EARLY_CLIMAX: u32 = 2;

/// Stale threads beyond this count contribute to the score.
const STALE_THREAD_TOLERANCE: usize = 2;

/// Climaxing momentum before this share of the story is early.
const EARLY_CLIMAX_SHARE: f32 = 0.6;

/// Confidence reported when revision falls back to the original plan.
const FALLBACK_CONFIDENCE: f32 = 0.2;

/// Ready threads handed to each unit of a chained book batch.
const CHAINED_THREADS_PER_UNIT: usize = 2;

/// How urgently the upcoming plans want revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionUrgency {
    Low,
    Medium,
    High,
}

impl RevisionUrgency {
    pub fn name(&self) -> &'static str {
        match self {
            RevisionUrgency::Low => "low",
            RevisionUrgency::Medium => "medium",
            RevisionUrgency::High => "high",
        }
    }
}

/// The outcome of scoring one unit against the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevisionDecision {
    pub should_revise: bool,
    pub urgency: RevisionUrgency,
    pub score: u32,
    pub reasons: Vec<String>,
}

/// One upcoming unit's plan, as the caller holds it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanUnit {
    pub unit_number: u32,
    pub summary: String,
}

/// A revised plan for one upcoming unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Revision {
    pub unit: u32,
    pub original_plan: String,
    pub revised_plan: String,
    pub reasons: Vec<String>,
    /// In [0, 1]. Fallback revisions carry low confidence.
    pub confidence: f32,
}

impl Revision {
    /// Whether the revision actually changed the plan.
    pub fn changed(&self) -> bool {
        self.revised_plan != self.original_plan
    }
}

/// Configuration for the revision planner.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub model: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

/// Scores drift and revises upcoming plans for one story instance.
pub struct RevisionPlanner<G: TextGenerator> {
    generator: G,
    config: PlannerConfig,
    format: ContentFormat,
}

impl<G: TextGenerator> RevisionPlanner<G> {
    pub fn new(generator: G, format: ContentFormat) -> Self {
        Self {
            generator,
            config: PlannerConfig::default(),
            format,
        }
    }

    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Score one unit's drift from the plan.
    pub fn decide(
        &self,
        record: &ExtractionRecord,
        state: &DiscoveryState,
        unit_index: u32,
        total_units: u32,
    ) -> RevisionDecision {
        let mut score = 0;
        let mut reasons = Vec::new();

        let surprises = record.significant_surprises().count();
        if surprises > 0 {
            score += WEIGHT_SURPRISE * surprises as u32;
            reasons.push(format!("{surprises} significant surprise(s) off-plan"));
        }

        let pivotal = record.pivotal_events().count();
        if pivotal > 0 {
            score += WEIGHT_PIVOTAL;
            reasons.push(format!("{pivotal} pivotal event(s) this unit"));
        }

        let immediate = state
            .thread_backlog()
            .iter()
            .filter(|t| t.priority == ThreadUrgency::Immediate)
            .count();
        if immediate > 0 {
            score += WEIGHT_IMMEDIATE_THREAD;
            reasons.push(format!("{immediate} thread(s) at immediate urgency"));
        }

        let stale = state.stale_threads(record.unit_number).len();
        if stale > STALE_THREAD_TOLERANCE {
            score += WEIGHT_STALE_THREADS;
            reasons.push(format!("{stale} threads have gone unmentioned too long"));
        }

        let unplanned = state.unplanned_strong_themes();
        if !unplanned.is_empty() {
            score += WEIGHT_UNPLANNED_THEME;
            let names: Vec<&str> = unplanned.iter().map(|t| t.name.as_str()).collect();
            reasons.push(format!("unplanned theme(s) now strong: {}", names.join(", ")));
        }

        if record.momentum == Momentum::Climaxing
            && total_units > 0
            && (unit_index as f32) < (total_units as f32) * EARLY_CLIMAX_SHARE
        {
            score += WEIGHT_EARLY_CLIMAX;
            reasons.push(format!(
                "climactic momentum at {} {} of {}",
                self.format.unit_name(),
                unit_index,
                total_units
            ));
        }

        score += score_format(state, record.unit_number, &mut reasons);

        let urgency = if score >= 4 {
            RevisionUrgency::High
        } else if score >= 2 {
            RevisionUrgency::Medium
        } else {
            RevisionUrgency::Low
        };
        RevisionDecision {
            should_revise: !reasons.is_empty(),
            urgency,
            score,
            reasons,
        }
    }

    /// Revise one upcoming plan against the context.
    ///
    /// Never fails: any generation or parse problem returns the
    /// original plan unmodified with fallback confidence.
    pub async fn revise(&self, plan: &str, context: &RevisionContext) -> Revision {
        match self.try_revise(plan, context).await {
            Ok(revision) => revision,
            Err(reason) => {
                tracing::warn!(unit = context.unit, %reason, "revision failed, keeping original plan");
                Revision {
                    unit: context.unit,
                    original_plan: plan.to_string(),
                    revised_plan: plan.to_string(),
                    reasons: vec![format!("revision unavailable: {reason}")],
                    confidence: FALLBACK_CONFIDENCE,
                }
            }
        }
    }

    async fn try_revise(&self, plan: &str, context: &RevisionContext) -> Result<Revision, String> {
        let prompt = self.build_prompt(plan, context);
        let system = format!(
            "You are a story editor revising the plan for an upcoming {} of a serialized {}. \
             Keep what works, change only what the notes require.",
            self.format.unit_name(),
            self.format.name(),
        );

        let mut request = GenerationRequest::new(prompt)
            .with_system(system)
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature);
        if let Some(ref model) = self.config.model {
            request = request.with_model(model);
        }

        let response = self
            .generator
            .generate(request)
            .await
            .map_err(|e| e.to_string())?;
        let raw: RawRevision =
            serde_json::from_str(extract_json(&response)).map_err(|e| e.to_string())?;

        if raw.revised_plan.trim().is_empty() {
            return Err("response carried no revised plan".to_string());
        }
        Ok(Revision {
            unit: context.unit,
            original_plan: plan.to_string(),
            revised_plan: raw.revised_plan,
            reasons: raw.reasons,
            confidence: raw.confidence.unwrap_or(0.6).clamp(0.0, 1.0),
        })
    }

    fn build_prompt(&self, plan: &str, context: &RevisionContext) -> String {
        let unit = self.format.unit_name();
        let mut prompt = format!(
            "## Current plan for {unit} {}\n{plan}\n\n{}",
            context.unit,
            context.brief()
        );
        prompt.push_str(&format!(
            "## Instructions\nRevise the plan for {unit} {} to honor the notes above. \
             Respond with ONLY a JSON object:\n\
             {{\"revised_plan\": \"...\", \"reasons\": [\"...\"], \"confidence\": 0.0}}\n\
             Confidence is your own 0-1 estimate that the revision improves the {}.",
            context.unit,
            self.format.name(),
        ));
        prompt
    }

    /// Revise the upcoming plans within the format's lookahead window.
    ///
    /// Book batches chain their context: ready-to-resolve threads
    /// handed to one chapter are withheld from the chapters after it,
    /// so the batch does not ask every chapter to close the same
    /// thread.
    pub async fn batch(
        &self,
        plans: &[PlanUnit],
        state: &DiscoveryState,
        last_record: &ExtractionRecord,
        total_units: u32,
    ) -> Vec<Revision> {
        let window = self.format.lookahead_window().min(plans.len());
        let mut thread_pool = RevisionContext::ready_threads(state);
        let recap = recap_of(last_record, total_units, self.format);

        let mut revisions = Vec::with_capacity(window);
        for plan in &plans[..window] {
            let threads = if self.format == ContentFormat::Book {
                let take = thread_pool.len().min(CHAINED_THREADS_PER_UNIT);
                thread_pool.drain(..take).collect()
            } else {
                thread_pool.clone()
            };
            let context = RevisionContext::for_unit(state, plan.unit_number, threads)
                .with_recap(recap.clone());
            revisions.push(self.revise(&plan.summary, &context).await);
        }
        revisions
    }
}

/// Format-addendum scoring against the sub-ledger.
fn score_format(state: &DiscoveryState, unit: u32, reasons: &mut Vec<String>) -> u32 {
    use crate::discovery::FormatLedger;

    let mut score = 0;
    match &state.ledger {
        FormatLedger::Comic(ledger) => {
            let conflicts = ledger.recent_conflicts(unit);
            if conflicts > 0 {
                score += 2;
                reasons.push(format!("{conflicts} recent visual consistency conflict(s)"));
            }
            if ledger.recent_weak_hooks(unit) >= 2 {
                score += 1;
                reasons.push("multiple recent pages end on weak hooks".to_string());
            }
            let motifs = ledger.reinforceable_motifs();
            if !motifs.is_empty() {
                score += 1;
                let names: Vec<&str> = motifs.iter().map(|m| m.name.as_str()).collect();
                reasons.push(format!("recurring motif(s) worth reinforcing: {}", names.join(", ")));
            }
            let share = ledger.dialogue_flow_share();
            if share > 0.7 {
                score += 1;
                reasons.push(format!("{:.0}% of pages are dialogue-flow", share * 100.0));
            }
        }
        FormatLedger::Screenplay(ledger) => {
            let ratio = ledger.dialogue_ratio();
            let deviation = (ratio - 0.5).abs();
            if deviation > 0.3 {
                score += 2;
                reasons.push(format!("dialogue/action badly unbalanced ({:.0}% dialogue)", ratio * 100.0));
            } else if deviation > 0.2 {
                score += 1;
                reasons.push(format!("dialogue/action drifting ({:.0}% dialogue)", ratio * 100.0));
            }
            let overused = ledger.overused_locations();
            if !overused.is_empty() {
                score += 1;
                reasons.push(format!("overused location(s): {}", overused.join(", ")));
            }
            if let Some(issue) = &ledger.pacing_issue {
                score += 2;
                reasons.push(format!("pacing issue: {issue}"));
            }
        }
        FormatLedger::Book(ledger) => {
            let due = ledger.due_foreshadowing(unit);
            if !due.is_empty() {
                score += 2;
                reasons.push(format!("{} foreshadowing setup(s) due for payoff", due.len()));
            }
            if let Some(kind) = ledger.stale_ending_pattern() {
                score += 1;
                reasons.push(format!("last three chapters all ended on a {kind}"));
            }
            if ledger.last_ending_weak() {
                score += 1;
                reasons.push("previous chapter ending was weak".to_string());
            }
        }
    }
    score
}

/// One-paragraph recap of the last unit for batch prompts.
fn recap_of(record: &ExtractionRecord, total_units: u32, format: ContentFormat) -> String {
    let mut parts: Vec<String> = record
        .pivotal_events()
        .map(|e| e.description.clone())
        .collect();
    if parts.is_empty() {
        parts.extend(record.events.iter().take(2).map(|e| e.description.clone()));
    }
    let events = if parts.is_empty() {
        "nothing of note".to_string()
    } else {
        parts.join("; ")
    };
    format!(
        "In {} {} of {}: {}. Momentum: {}.",
        format.unit_name(),
        record.unit_number,
        total_units,
        events,
        record.momentum.name()
    )
}

#[derive(Debug, Default, Deserialize)]
struct RawRevision {
    #[serde(default)]
    revised_plan: String,
    #[serde(default)]
    reasons: Vec<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryTracker;
    use crate::extraction::{
        ComicExtraction, EventSignificance, FormatExtension, PageExtraction, PageFlow, Surprise,
        SurpriseKind, ThreadKind, ThreadMention, UnitEvent,
    };
    use crate::testing::ScriptedGenerator;

    fn planner(format: ContentFormat) -> RevisionPlanner<ScriptedGenerator> {
        RevisionPlanner::new(ScriptedGenerator::new(), format)
    }

    fn quiet_record(unit: u32, format: ContentFormat) -> ExtractionRecord {
        ExtractionRecord::empty(unit, format)
    }

    #[test]
    fn test_quiet_unit_needs_no_revision() {
        let state = DiscoveryState::new(ContentFormat::Book, "outline");
        let record = quiet_record(1, ContentFormat::Book);
        let decision = planner(ContentFormat::Book).decide(&record, &state, 1, 20);

        assert!(!decision.should_revise);
        assert_eq!(decision.urgency, RevisionUrgency::Low);
        assert!(decision.reasons.is_empty());
    }

    #[test]
    fn test_drift_scores_high() {
        let mut state = DiscoveryState::new(ContentFormat::Book, "outline");
        let mut record = quiet_record(3, ContentFormat::Book);
        record.surprises.push(Surprise {
            kind: SurpriseKind::PlotTurn,
            description: "the ferry sinks with the ledger aboard".into(),
            significant: true,
        });
        record.events.push(UnitEvent {
            description: "Mara burns the contract".into(),
            significance: EventSignificance::Pivotal,
        });
        // An immediate-priority open thread.
        let mut tracker = DiscoveryTracker::from_state(state);
        let mut seed = quiet_record(2, ContentFormat::Book);
        seed.threads.push(ThreadMention {
            description: "the enforcer reaches the docks".into(),
            kind: ThreadKind::Introduction,
            urgency: crate::extraction::ThreadUrgency::Immediate,
        });
        tracker.process_unit(&seed);
        state = tracker.into_state();

        let decision = planner(ContentFormat::Book).decide(&record, &state, 3, 20);

        // surprises +2, pivotal +2, immediate thread +3
        assert_eq!(decision.score, 7);
        assert_eq!(decision.urgency, RevisionUrgency::High);
        assert!(decision.should_revise);
    }

    #[test]
    fn test_early_climax_scores() {
        let state = DiscoveryState::new(ContentFormat::Book, "outline");
        let mut record = quiet_record(5, ContentFormat::Book);
        record.momentum = Momentum::Climaxing;

        let early = planner(ContentFormat::Book).decide(&record, &state, 5, 20);
        assert_eq!(early.score, 2);
        assert_eq!(early.urgency, RevisionUrgency::Medium);

        // The same momentum at 80% completion is expected, not drift.
        let late = planner(ContentFormat::Book).decide(&record, &state, 16, 20);
        assert_eq!(late.score, 0);
        assert!(!late.should_revise);
    }

    #[test]
    fn test_dialogue_heavy_comic_triggers_revision() {
        let mut tracker = DiscoveryTracker::new(ContentFormat::Comic, "outline");
        let mut record = quiet_record(1, ContentFormat::Comic);
        record.extension = FormatExtension::Comic(ComicExtraction {
            pages: (0..4)
                .map(|i| PageExtraction {
                    panels: 5,
                    flow: if i == 0 { PageFlow::Action } else { PageFlow::Dialogue },
                    hook: Some("who sent the letter?".into()),
                })
                .collect(),
            visuals: vec![],
            motifs: vec![],
        });
        tracker.process_unit(&record);
        let state = tracker.into_state();

        let next = quiet_record(2, ContentFormat::Comic);
        let decision = planner(ContentFormat::Comic).decide(&next, &state, 2, 24);

        assert!(decision.should_revise);
        assert!(decision.reasons.iter().any(|r| r.contains("dialogue-flow")));
    }

    #[test]
    fn test_recap_uses_prompt_vocabulary() {
        let mut record = quiet_record(6, ContentFormat::Book);
        record.momentum = Momentum::Climaxing;
        record.events.push(UnitEvent {
            description: "the ferry sinks with the ledger aboard".into(),
            significance: EventSignificance::Pivotal,
        });

        let recap = recap_of(&record, 20, ContentFormat::Book);
        assert!(recap.contains("chapter 6 of 20"));
        assert!(recap.contains("the ferry sinks"));
        assert!(recap.contains("Momentum: climaxing."));
    }

    #[tokio::test]
    async fn test_revise_parses_fenced_response() {
        let generator = ScriptedGenerator::new();
        generator.push_text(
            "```json\n{\"revised_plan\": \"Mara confronts the enforcer at the docks\", \
             \"reasons\": [\"close the enforcer thread\"], \"confidence\": 0.85}\n```",
        );
        let planner = RevisionPlanner::new(generator, ContentFormat::Book);
        let state = DiscoveryState::new(ContentFormat::Book, "outline");
        let context = RevisionContext::for_unit(&state, 4, Vec::new());

        let revision = planner.revise("Mara avoids the docks", &context).await;

        assert!(revision.changed());
        assert_eq!(revision.unit, 4);
        assert!((revision.confidence - 0.85).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_revise_falls_back_on_failure() {
        let generator = ScriptedGenerator::new();
        generator.push_error(textgen::GenerationError::Network("connection reset".into()));
        let planner = RevisionPlanner::new(generator, ContentFormat::Book);
        let state = DiscoveryState::new(ContentFormat::Book, "outline");
        let context = RevisionContext::for_unit(&state, 4, Vec::new());

        let original = "Mara avoids the docks";
        let revision = planner.revise(original, &context).await;

        assert!(!revision.changed());
        assert_eq!(revision.revised_plan, original);
        assert!((revision.confidence - FALLBACK_CONFIDENCE).abs() < 1e-6);
        assert!(revision.reasons[0].contains("revision unavailable"));
    }

    #[tokio::test]
    async fn test_revise_falls_back_on_unparsable_response() {
        let generator = ScriptedGenerator::new();
        generator.push_text("I think the plan is fine as written.");
        let planner = RevisionPlanner::new(generator, ContentFormat::Book);
        let state = DiscoveryState::new(ContentFormat::Book, "outline");
        let context = RevisionContext::for_unit(&state, 7, Vec::new());

        let revision = planner.revise("the plan", &context).await;
        assert!(!revision.changed());
        assert!((revision.confidence - FALLBACK_CONFIDENCE).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_batch_respects_lookahead_window() {
        let generator = ScriptedGenerator::new();
        for _ in 0..2 {
            generator.push_text("{\"revised_plan\": \"tightened\", \"confidence\": 0.7}");
        }
        let planner = RevisionPlanner::new(generator.clone(), ContentFormat::Screenplay);
        let state = DiscoveryState::new(ContentFormat::Screenplay, "outline");
        let record = quiet_record(1, ContentFormat::Screenplay);

        let plans: Vec<PlanUnit> = (2..=6)
            .map(|n| PlanUnit {
                unit_number: n,
                summary: format!("plan for sequence {n}"),
            })
            .collect();
        let revisions = planner.batch(&plans, &state, &record, 12).await;

        // Screenplay lookahead is two sequences.
        assert_eq!(revisions.len(), 2);
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_book_batch_chains_thread_context() {
        let mut tracker = DiscoveryTracker::new(ContentFormat::Book, "outline");
        let mut seed = quiet_record(1, ContentFormat::Book);
        for description in [
            "the enforcer reaches the docks and waits",
            "the forged ledger sits in the magistrate's office",
            "Edan's debt to the smugglers comes due",
        ] {
            seed.threads.push(ThreadMention {
                description: description.into(),
                kind: ThreadKind::Introduction,
                urgency: crate::extraction::ThreadUrgency::Immediate,
            });
        }
        tracker.process_unit(&seed);
        // A second mention at immediate urgency marks them ready.
        let mut again = quiet_record(2, ContentFormat::Book);
        for description in [
            "the enforcer reaches the docks and asks for Mara",
            "the forged ledger sits in the magistrate's office, unexamined",
            "Edan's debt to the smugglers comes due tonight",
        ] {
            again.threads.push(ThreadMention {
                description: description.into(),
                kind: ThreadKind::Advancement,
                urgency: crate::extraction::ThreadUrgency::Immediate,
            });
        }
        tracker.process_unit(&again);
        let state = tracker.into_state();
        assert_eq!(RevisionContext::ready_threads(&state).len(), 3);

        let generator = ScriptedGenerator::new();
        for _ in 0..3 {
            generator.push_error(textgen::GenerationError::Network("offline".into()));
        }
        let planner = RevisionPlanner::new(generator, ContentFormat::Book);
        let record = quiet_record(2, ContentFormat::Book);
        let plans: Vec<PlanUnit> = (3..=5)
            .map(|n| PlanUnit {
                unit_number: n,
                summary: format!("plan for chapter {n}"),
            })
            .collect();

        // Even with the generator offline, batch still returns one
        // fallback revision per plan in the window.
        let revisions = planner.batch(&plans, &state, &record, 20).await;
        assert_eq!(revisions.len(), 3);
        assert!(revisions.iter().all(|r| !r.changed()));
    }
}
