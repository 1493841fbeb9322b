//! Pipeline orchestrator.
//!
//! One `UnitPipeline` owns the extractor, both trackers, and the
//! revision planner for a single story instance, and runs them in the
//! required order after each generated unit: extraction → discovery →
//! arcs → (conditional) revision. Each step consumes state the previous
//! one mutated, so the order is fixed.
//!
//! Independent stories get independent pipelines; nothing here is
//! shared between instances.

use crate::arc::{ArcState, ArcUpdate, CharacterArcTracker};
use crate::discovery::{DiscoveryReport, DiscoveryState, DiscoveryTracker};
use crate::extraction::{ExtractError, ExtractionRecord, Extractor, ExtractorConfig};
use crate::format::ContentFormat;
use crate::revision::{PlanUnit, PlannerConfig, Revision, RevisionDecision, RevisionPlanner};
use textgen::TextGenerator;
use thiserror::Error;

/// Errors from the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Persisted state disagrees on format: discovery is {discovery}, arcs are {arcs}")]
    StateMismatch {
        discovery: ContentFormat,
        arcs: ContentFormat,
    },
}

/// Everything one unit produced for the caller.
#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub record: ExtractionRecord,
    pub report: DiscoveryReport,
    pub arc_updates: Vec<ArcUpdate>,
    pub decision: RevisionDecision,
    /// Revisions for the lookahead window; empty when the decision
    /// found nothing worth revising.
    pub revisions: Vec<Revision>,
}

/// The per-story orchestrator.
pub struct UnitPipeline<G: TextGenerator + Clone> {
    extractor: Extractor<G>,
    discovery: DiscoveryTracker,
    arcs: CharacterArcTracker,
    planner: RevisionPlanner<G>,
    /// Upcoming unit plans, revised in place as the story drifts.
    plans: Vec<PlanUnit>,
    total_units: u32,
}

impl<G: TextGenerator + Clone> UnitPipeline<G> {
    /// Build a pipeline for a fresh story.
    pub fn new(
        generator: G,
        format: ContentFormat,
        outline: impl Into<String>,
        plans: Vec<PlanUnit>,
        total_units: u32,
    ) -> Self {
        Self {
            extractor: Extractor::new(generator.clone(), format),
            discovery: DiscoveryTracker::new(format, outline),
            arcs: CharacterArcTracker::new(format),
            planner: RevisionPlanner::new(generator, format),
            plans,
            total_units,
        }
    }

    /// Rebuild a pipeline from caller-persisted state.
    pub fn restore(
        generator: G,
        discovery_state: DiscoveryState,
        arc_state: ArcState,
        plans: Vec<PlanUnit>,
        total_units: u32,
    ) -> Result<Self, PipelineError> {
        if discovery_state.format != arc_state.format {
            return Err(PipelineError::StateMismatch {
                discovery: discovery_state.format,
                arcs: arc_state.format,
            });
        }
        let format = discovery_state.format;
        Ok(Self {
            extractor: Extractor::new(generator.clone(), format),
            discovery: DiscoveryTracker::from_state(discovery_state),
            arcs: CharacterArcTracker::from_state(arc_state),
            planner: RevisionPlanner::new(generator, format),
            plans,
            total_units,
        })
    }

    pub fn with_extractor_config(mut self, config: ExtractorConfig) -> Self {
        self.extractor = self.extractor.with_config(config);
        self
    }

    pub fn with_planner_config(mut self, config: PlannerConfig) -> Self {
        self.planner = self.planner.with_config(config);
        self
    }

    pub fn format(&self) -> ContentFormat {
        self.extractor.format()
    }

    pub fn discovery_state(&self) -> &DiscoveryState {
        self.discovery.state()
    }

    pub fn arc_state(&self) -> &ArcState {
        self.arcs.state()
    }

    /// The current plans, including any applied revisions.
    pub fn plans(&self) -> &[PlanUnit] {
        &self.plans
    }

    pub fn arcs(&self) -> &CharacterArcTracker {
        &self.arcs
    }

    /// Mutable arc access, for the format-specific profile updaters.
    pub fn arcs_mut(&mut self) -> &mut CharacterArcTracker {
        &mut self.arcs
    }

    /// Run one generated unit through the full pipeline.
    pub async fn process_unit(
        &mut self,
        content: &str,
        unit_number: u32,
    ) -> Result<UnitOutcome, PipelineError> {
        let planned = self
            .plans
            .iter()
            .find(|p| p.unit_number == unit_number)
            .map(|p| p.summary.clone())
            .unwrap_or_default();
        let prior = self.arcs.roster_summary();
        let known: Vec<String> = self
            .arcs
            .state()
            .arcs
            .values()
            .map(|a| a.name.clone())
            .collect();

        let record = self
            .extractor
            .extract(content, unit_number, &planned, &prior, &known)
            .await?;

        let report = self.discovery.process_unit(&record);
        let arc_updates = self.arcs.update_from_unit(
            &record.character_deltas,
            &record.relationship_deltas,
            unit_number,
        );

        let decision =
            self.planner
                .decide(&record, self.discovery.state(), unit_number, self.total_units);

        let mut revisions = Vec::new();
        if decision.should_revise {
            tracing::info!(
                unit_number,
                urgency = decision.urgency.name(),
                score = decision.score,
                "revising upcoming plans"
            );
            let upcoming: Vec<PlanUnit> = self
                .plans
                .iter()
                .filter(|p| p.unit_number > unit_number)
                .cloned()
                .collect();
            revisions = self
                .planner
                .batch(&upcoming, self.discovery.state(), &record, self.total_units)
                .await;
            self.apply_revisions(&revisions);
        }

        Ok(UnitOutcome {
            record,
            report,
            arc_updates,
            decision,
            revisions,
        })
    }

    fn apply_revisions(&mut self, revisions: &[Revision]) {
        for revision in revisions {
            if !revision.changed() {
                continue;
            }
            if let Some(plan) = self
                .plans
                .iter_mut()
                .find(|p| p.unit_number == revision.unit)
            {
                plan.summary = revision.revised_plan.clone();
            }
        }
    }
}
