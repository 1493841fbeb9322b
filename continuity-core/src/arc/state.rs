//! Per-character arc state types.

use crate::classify::{EmotionIntensity, KnowledgeSignificance};
use crate::extraction::RelationshipChange;
use serde::{Deserialize, Serialize};

/// Where a character sits in their arc. Stages only move forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ArcStage {
    Setup,
    Conflict,
    Rising,
    Crisis,
    Transformation,
    Resolution,
    NewNormal,
}

impl ArcStage {
    pub fn name(&self) -> &'static str {
        match self {
            ArcStage::Setup => "setup",
            ArcStage::Conflict => "conflict",
            ArcStage::Rising => "rising",
            ArcStage::Crisis => "crisis",
            ArcStage::Transformation => "transformation",
            ArcStage::Resolution => "resolution",
            ArcStage::NewNormal => "new normal",
        }
    }
}

/// One emotional-history entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmotionalState {
    pub unit: u32,
    pub description: String,
    pub intensity: EmotionIntensity,
}

/// Something a character learned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterKnowledge {
    pub unit: u32,
    pub content: String,
    pub significance: KnowledgeSignificance,
}

/// A decision a character made, with the trait it implies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionPoint {
    pub unit: u32,
    pub description: String,
    pub inferred_trait: String,
}

/// A physical-state change and its lasting effect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WoundOrGrowth {
    pub unit: u32,
    pub description: String,
    pub capability_impact: Option<String>,
    pub ongoing: bool,
}

/// Trust bounds for relationship state.
pub const TRUST_MIN: i8 = -10;
pub const TRUST_MAX: i8 = 10;

/// Trust movement per improved/worsened change.
const TRUST_STEP: i8 = 2;

/// The standing of a relationship, derived from trust unless a
/// complication overrides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStatus {
    Hostile,
    Strained,
    Neutral,
    Warm,
    Complicated,
}

impl RelationshipStatus {
    fn from_trust(trust: i8) -> Self {
        if trust <= -5 {
            RelationshipStatus::Hostile
        } else if trust < 0 {
            RelationshipStatus::Strained
        } else if trust < 5 {
            RelationshipStatus::Neutral
        } else {
            RelationshipStatus::Warm
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RelationshipStatus::Hostile => "hostile",
            RelationshipStatus::Strained => "strained",
            RelationshipStatus::Neutral => "neutral",
            RelationshipStatus::Warm => "warm",
            RelationshipStatus::Complicated => "complicated",
        }
    }
}

/// One recorded relationship change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipEvent {
    pub unit: u32,
    pub change: RelationshipChange,
    pub detail: String,
}

/// A character's standing toward one counterpart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipState {
    pub counterpart: String,
    pub trust: i8,
    pub status: RelationshipStatus,
    /// Append-only record of every change.
    pub history: Vec<RelationshipEvent>,
}

impl RelationshipState {
    pub fn new(counterpart: impl Into<String>) -> Self {
        Self {
            counterpart: counterpart.into(),
            trust: 0,
            status: RelationshipStatus::Neutral,
            history: Vec::new(),
        }
    }

    /// Apply one change. Trust moves by a fixed step and is clamped;
    /// a complication forces the status without touching trust.
    pub fn apply(&mut self, change: RelationshipChange, detail: &str, unit: u32) {
        match change {
            RelationshipChange::Improved => {
                self.trust = (self.trust + TRUST_STEP).clamp(TRUST_MIN, TRUST_MAX);
                self.status = RelationshipStatus::from_trust(self.trust);
            }
            RelationshipChange::Worsened => {
                self.trust = (self.trust - TRUST_STEP).clamp(TRUST_MIN, TRUST_MAX);
                self.status = RelationshipStatus::from_trust(self.trust);
            }
            RelationshipChange::Complicated => {
                self.status = RelationshipStatus::Complicated;
            }
            RelationshipChange::Unchanged => {}
        }
        self.history.push(RelationshipEvent {
            unit,
            change,
            detail: detail.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordering() {
        assert!(ArcStage::Setup < ArcStage::Conflict);
        assert!(ArcStage::Crisis < ArcStage::Transformation);
        assert!(ArcStage::Resolution < ArcStage::NewNormal);
    }

    #[test]
    fn test_trust_steps_and_status() {
        let mut rel = RelationshipState::new("Edan");
        rel.apply(RelationshipChange::Worsened, "a lie surfaces", 1);
        rel.apply(RelationshipChange::Worsened, "the lie deepens", 2);

        assert_eq!(rel.trust, -4);
        assert_eq!(rel.status, RelationshipStatus::Strained);
        assert_eq!(rel.history.len(), 2);
    }

    #[test]
    fn test_trust_clamped() {
        let mut rel = RelationshipState::new("Edan");
        for unit in 0..20 {
            rel.apply(RelationshipChange::Worsened, "again", unit);
        }
        assert_eq!(rel.trust, TRUST_MIN);
        assert_eq!(rel.status, RelationshipStatus::Hostile);

        for unit in 20..40 {
            rel.apply(RelationshipChange::Improved, "repair", unit);
        }
        assert_eq!(rel.trust, TRUST_MAX);
        assert_eq!(rel.status, RelationshipStatus::Warm);
    }

    #[test]
    fn test_complicated_forces_status() {
        let mut rel = RelationshipState::new("Edan");
        rel.apply(RelationshipChange::Improved, "an alliance", 1);
        rel.apply(RelationshipChange::Complicated, "but a secret debt", 2);

        assert_eq!(rel.trust, 2);
        assert_eq!(rel.status, RelationshipStatus::Complicated);
    }

    #[test]
    fn test_unchanged_only_records() {
        let mut rel = RelationshipState::new("Edan");
        rel.apply(RelationshipChange::Unchanged, "a quiet dinner", 1);
        assert_eq!(rel.trust, 0);
        assert_eq!(rel.status, RelationshipStatus::Neutral);
        assert_eq!(rel.history.len(), 1);
    }
}
