//! Plot thread tracking.

use crate::extraction::{ThreadKind, ThreadUrgency};
use serde::{Deserialize, Serialize};

/// Lifecycle of a plot thread. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Active,
    ReadyToResolve,
    Resolved,
    Abandoned,
}

impl ThreadStatus {
    /// Position in the forward-only ordering.
    fn rank(&self) -> u8 {
        match self {
            ThreadStatus::Active => 0,
            ThreadStatus::ReadyToResolve => 1,
            ThreadStatus::Resolved | ThreadStatus::Abandoned => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ThreadStatus::Resolved | ThreadStatus::Abandoned)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ThreadStatus::Active => "active",
            ThreadStatus::ReadyToResolve => "ready to resolve",
            ThreadStatus::Resolved => "resolved",
            ThreadStatus::Abandoned => "abandoned",
        }
    }
}

/// A number of units without a mention after which a thread is stale.
const STALE_AFTER_UNITS: u32 = 3;

/// A plot thread accumulated across units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlotThread {
    /// Monotonic per-story id.
    pub id: u64,
    pub description: String,
    pub kind: ThreadKind,
    pub status: ThreadStatus,
    /// Backlog priority, reusing the urgency scale.
    pub priority: ThreadUrgency,
    pub introduced_in: u32,
    pub last_mentioned_in: u32,
    /// Whether the original outline already contained this thread.
    pub was_planned: bool,
}

impl PlotThread {
    /// Create a thread first seen in the given unit.
    ///
    /// Status and priority derive from kind and urgency: a callback
    /// pays off on arrival, complications escalate priority.
    pub fn new(
        id: u64,
        description: impl Into<String>,
        kind: ThreadKind,
        urgency: ThreadUrgency,
        unit: u32,
        was_planned: bool,
    ) -> Self {
        let status = match kind {
            ThreadKind::Callback => ThreadStatus::Resolved,
            _ => ThreadStatus::Active,
        };
        let priority = match kind {
            ThreadKind::Complication => urgency.max(ThreadUrgency::High),
            _ => urgency,
        };
        Self {
            id,
            description: description.into(),
            kind,
            status,
            priority,
            introduced_in: unit,
            last_mentioned_in: unit,
            was_planned,
        }
    }

    /// Move to a later status. Backward moves are ignored.
    pub fn advance_status(&mut self, status: ThreadStatus) {
        if status.rank() > self.status.rank() {
            self.status = status;
        }
    }

    /// Force resolution, regardless of prior status.
    pub fn resolve(&mut self) {
        self.status = ThreadStatus::Resolved;
    }

    /// Note a mention of this thread in the given unit.
    pub fn touch(&mut self, unit: u32) {
        self.last_mentioned_in = self.last_mentioned_in.max(unit);
    }

    /// Whether this thread has gone unmentioned long enough to worry.
    pub fn is_stale(&self, current_unit: u32) -> bool {
        !self.status.is_terminal()
            && current_unit.saturating_sub(self.last_mentioned_in) >= STALE_AFTER_UNITS
    }
}
