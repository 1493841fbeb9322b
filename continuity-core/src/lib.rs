//! Narrative continuity engine for serialized story generation.
//!
//! This crate provides:
//! - Structured extraction of narrative facts from generated units
//! - Discovery tracking: emergent themes, plot threads, motifs, tone
//! - Per-character arc tracking with a forward-only stage machine
//! - Drift scoring and bounded-lookahead plan revision
//!
//! Everything is polymorphic over one of three content formats (book,
//! comic, screenplay), fixed per story instance: a book story tracks
//! foreshadowing and chapter endings, a comic tracks page hooks and
//! visual consistency, a screenplay tracks locations and the
//! dialogue/action balance.
//!
//! # Quick Start
//!
//! ```ignore
//! use continuity_core::{ContentFormat, PlanUnit, UnitPipeline};
//! use textgen::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let plans = vec![PlanUnit {
//!         unit_number: 1,
//!         summary: "Mara returns to the harbor town".to_string(),
//!     }];
//!     let mut pipeline = UnitPipeline::new(
//!         Client::from_env()?,
//!         ContentFormat::Book,
//!         "Mara returns to settle her father's debts.",
//!         plans,
//!         20,
//!     );
//!
//!     let outcome = pipeline.process_unit("...chapter one text...", 1).await?;
//!     println!("backlog: {} threads", outcome.report.thread_backlog.len());
//!     Ok(())
//! }
//! ```

pub mod arc;
pub mod classify;
pub mod discovery;
pub mod extraction;
pub mod format;
pub mod matching;
pub mod namemap;
pub mod pipeline;
pub mod revision;
pub mod testing;

// Primary public API
pub use arc::{ArcStage, ArcState, ArcUpdate, CharacterArc, CharacterArcTracker};
pub use discovery::{
    DiscoveryReport, DiscoveryState, DiscoveryTracker, EmergentTheme, PlotThread, ThemeStrength,
    ThreadStatus,
};
pub use extraction::{ExtractError, ExtractionRecord, Extractor, ExtractorConfig};
pub use format::ContentFormat;
pub use pipeline::{PipelineError, UnitOutcome, UnitPipeline};
pub use revision::{
    PlanUnit, PlannerConfig, Revision, RevisionContext, RevisionDecision, RevisionPlanner,
    RevisionUrgency,
};
