//! Running elements, story connections, and tone history.

use crate::classify::Tone;
use crate::extraction::RelationshipChange;
use serde::{Deserialize, Serialize};

/// A recurring element: a motif or a callback chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunningElement {
    /// Short name, taken from the first words of the source text.
    pub name: String,
    pub kind: ElementKind,
    /// Unit numbers where the element appeared.
    pub occurrences: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Motif,
    Callback,
}

impl RunningElement {
    pub fn new(name: impl Into<String>, kind: ElementKind, unit: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            occurrences: vec![unit],
        }
    }

    pub fn record(&mut self, unit: u32) {
        self.occurrences.push(unit);
    }

    /// A candidate element becomes a true recurring motif on its second
    /// appearance.
    pub fn is_recurring(&self) -> bool {
        self.occurrences.len() >= 2
    }
}

/// Take the first `n` whitespace words of a description as a name.
pub fn leading_words(text: &str, n: usize) -> String {
    text.split_whitespace().take(n).collect::<Vec<_>>().join(" ")
}

/// A detected connection between two relationship changes in one unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoryConnection {
    pub kind: ConnectionKind,
    pub first: (String, String),
    pub second: (String, String),
    pub unit: u32,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    /// Two relationships moved the same way.
    Parallel,
    /// One improved while the other worsened.
    Contrast,
}

/// Classify a pair of relationship changes, if they connect at all.
pub fn connect(a: RelationshipChange, b: RelationshipChange) -> Option<ConnectionKind> {
    use RelationshipChange::*;
    match (a, b) {
        (Unchanged, _) | (_, Unchanged) => None,
        (x, y) if x == y => Some(ConnectionKind::Parallel),
        (Improved, Worsened) | (Worsened, Improved) => Some(ConnectionKind::Contrast),
        _ => None,
    }
}

/// One entry in the tone timeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ToneRecord {
    pub unit: u32,
    pub tone: Tone,
    /// Whether this unit's tone differs from the previous unit's.
    pub shifted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_words() {
        assert_eq!(leading_words("the broken clock strikes again", 3), "the broken clock");
        assert_eq!(leading_words("ledger", 3), "ledger");
        assert_eq!(leading_words("  spaced   out   words here ", 3), "spaced out words");
    }

    #[test]
    fn test_recurring_threshold() {
        let mut element = RunningElement::new("the broken clock", ElementKind::Callback, 2);
        assert!(!element.is_recurring());
        element.record(5);
        assert!(element.is_recurring());
    }

    #[test]
    fn test_connection_rules() {
        use RelationshipChange::*;
        assert_eq!(connect(Improved, Improved), Some(ConnectionKind::Parallel));
        assert_eq!(connect(Worsened, Worsened), Some(ConnectionKind::Parallel));
        assert_eq!(connect(Complicated, Complicated), Some(ConnectionKind::Parallel));
        assert_eq!(connect(Improved, Worsened), Some(ConnectionKind::Contrast));
        assert_eq!(connect(Worsened, Improved), Some(ConnectionKind::Contrast));
        assert_eq!(connect(Unchanged, Improved), None);
        assert_eq!(connect(Improved, Complicated), None);
    }
}
