//! Structured extraction records.
//!
//! An `ExtractionRecord` is what the engine learned from one generated
//! unit: the common narrative facts plus exactly one format-specific
//! payload. Every field is optional-by-default at the wire boundary;
//! missing data becomes empty collections, never an error.

use crate::format::ContentFormat;
use serde::{Deserialize, Serialize};

/// Facts extracted from a single generated unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionRecord {
    /// Which unit this record describes (1-based).
    pub unit_number: u32,
    /// What happened, in event granularity.
    pub events: Vec<UnitEvent>,
    /// Per-character changes observed this unit.
    pub character_deltas: Vec<CharacterDelta>,
    /// Locations introduced or changed.
    pub location_deltas: Vec<LocationDelta>,
    /// Relationship changes between pairs of characters.
    pub relationship_deltas: Vec<RelationshipDelta>,
    /// Plot threads touched by this unit.
    pub threads: Vec<ThreadMention>,
    /// Deviations from the planned summary.
    pub surprises: Vec<Surprise>,
    /// Themes that surfaced in the content.
    pub emergent_themes: Vec<ThemeMention>,
    /// The unit's overall emotional arc, in the extractor's words.
    pub emotional_arc: Option<String>,
    /// Narrative momentum at the end of the unit.
    pub momentum: Momentum,
    /// Consequences left open / questions the unit raised.
    pub open_questions: Vec<String>,
    /// Exactly one format-specific payload.
    pub extension: FormatExtension,
}

impl ExtractionRecord {
    /// An empty record for the given unit and format.
    pub fn empty(unit_number: u32, format: ContentFormat) -> Self {
        Self {
            unit_number,
            events: Vec::new(),
            character_deltas: Vec::new(),
            location_deltas: Vec::new(),
            relationship_deltas: Vec::new(),
            threads: Vec::new(),
            surprises: Vec::new(),
            emergent_themes: Vec::new(),
            emotional_arc: None,
            momentum: Momentum::Steady,
            open_questions: Vec::new(),
            extension: FormatExtension::empty(format),
        }
    }

    /// The format this record's payload belongs to.
    pub fn format(&self) -> ContentFormat {
        self.extension.format()
    }

    /// Surprises marked significant.
    pub fn significant_surprises(&self) -> impl Iterator<Item = &Surprise> {
        self.surprises.iter().filter(|s| s.significant)
    }

    /// Events marked pivotal.
    pub fn pivotal_events(&self) -> impl Iterator<Item = &UnitEvent> {
        self.events
            .iter()
            .filter(|e| e.significance == EventSignificance::Pivotal)
    }
}

/// A single event within a unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitEvent {
    pub description: String,
    pub significance: EventSignificance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSignificance {
    Minor,
    Notable,
    Pivotal,
}

/// Changes observed for one character in one unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CharacterDelta {
    pub name: String,
    /// Emotional state description, if the unit showed one.
    pub emotional_state: Option<String>,
    /// Physical state change (injury, illness, recovery).
    pub physical_state: Option<String>,
    /// Something the character learned.
    pub learned: Option<String>,
    /// A decision the character made.
    pub decision: Option<String>,
}

/// A location introduced or changed this unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationDelta {
    pub name: String,
    pub change: String,
}

/// A relationship change between two characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipDelta {
    pub between: (String, String),
    pub change: RelationshipChange,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipChange {
    Improved,
    Worsened,
    Complicated,
    Unchanged,
}

/// A plot thread touched by this unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadMention {
    pub description: String,
    pub kind: ThreadKind,
    pub urgency: ThreadUrgency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadKind {
    /// A new thread opened.
    Introduction,
    /// An existing thread moved forward.
    Advancement,
    /// An existing thread got harder.
    Complication,
    /// A planted element paid off.
    Callback,
}

/// How urgently a thread wants attention, lowest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ThreadUrgency {
    Background,
    Normal,
    High,
    Immediate,
}

/// A deviation from the planned summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Surprise {
    pub kind: SurpriseKind,
    pub description: String,
    pub significant: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurpriseKind {
    /// A character acted against their planned behavior.
    CharacterChoice,
    /// The plot turned somewhere the plan did not go.
    PlotTurn,
    /// Something appeared that the plan never mentioned.
    NewElement,
}

/// A theme that surfaced in the content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThemeMention {
    pub name: String,
    pub evidence: String,
}

/// Narrative momentum at the end of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Momentum {
    Building,
    Steady,
    Climaxing,
    Resolving,
}

impl Momentum {
    pub fn name(&self) -> &'static str {
        match self {
            Momentum::Building => "building",
            Momentum::Steady => "steady",
            Momentum::Climaxing => "climaxing",
            Momentum::Resolving => "resolving",
        }
    }
}

// ============================================================================
// Format-specific payloads
// ============================================================================

/// Exactly one of these per record, matching the story's format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FormatExtension {
    Book(BookExtraction),
    Comic(ComicExtraction),
    Screenplay(ScreenplayExtraction),
}

impl FormatExtension {
    pub fn format(&self) -> ContentFormat {
        match self {
            FormatExtension::Book(_) => ContentFormat::Book,
            FormatExtension::Comic(_) => ContentFormat::Comic,
            FormatExtension::Screenplay(_) => ContentFormat::Screenplay,
        }
    }

    /// An empty payload for the given format.
    pub fn empty(format: ContentFormat) -> Self {
        match format {
            ContentFormat::Book => FormatExtension::Book(BookExtraction::default()),
            ContentFormat::Comic => FormatExtension::Comic(ComicExtraction::default()),
            ContentFormat::Screenplay => {
                FormatExtension::Screenplay(ScreenplayExtraction::default())
            }
        }
    }
}

/// Book payload: prose and pacing observations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookExtraction {
    pub prose_style: Option<String>,
    pub pacing: Option<String>,
    /// Recurring symbols present in the chapter.
    pub symbols: Vec<String>,
    /// Foreshadowing the chapter planted.
    pub foreshadowing: Vec<ForeshadowingSetup>,
    /// How the chapter ends ("cliffhanger", "quiet", "revelation", ...).
    pub ending_kind: Option<String>,
}

/// A foreshadowing setup planted in a chapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForeshadowingSetup {
    pub setup: String,
    pub payoff_hint: Option<String>,
}

/// Comic payload: pages, panels, visuals.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComicExtraction {
    pub pages: Vec<PageExtraction>,
    /// Character visual attributes shown this unit.
    pub visuals: Vec<CharacterVisual>,
    /// Visual motifs present this unit.
    pub motifs: Vec<String>,
}

/// One produced comic page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageExtraction {
    pub panels: u32,
    pub flow: PageFlow,
    /// The page-turn hook, if the page has one.
    pub hook: Option<String>,
}

/// The dominant visual pacing of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageFlow {
    Action,
    Dialogue,
    Establishing,
    Mixed,
}

impl PageFlow {
    pub fn name(&self) -> &'static str {
        match self {
            PageFlow::Action => "action",
            PageFlow::Dialogue => "dialogue",
            PageFlow::Establishing => "establishing",
            PageFlow::Mixed => "mixed",
        }
    }
}

/// A character visual attribute as drawn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterVisual {
    pub character: String,
    /// e.g. "hair color", "scar", "coat".
    pub attribute: String,
    pub value: String,
}

/// Screenplay payload: scenes and pacing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScreenplayExtraction {
    pub scenes: Vec<SceneExtraction>,
    /// Pacing problem the extractor noticed, if any.
    pub pacing_note: Option<String>,
}

/// One scene within a screenplay sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SceneExtraction {
    pub location: String,
    /// What the scene is for ("reveal", "confrontation", ...).
    pub purpose: String,
    pub dialogue_lines: u32,
    pub action_lines: u32,
    /// The scene's defining visual beat, if it has one.
    pub visual_beat: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record_matches_format() {
        for format in [
            ContentFormat::Book,
            ContentFormat::Comic,
            ContentFormat::Screenplay,
        ] {
            let record = ExtractionRecord::empty(1, format);
            assert_eq!(record.format(), format);
            assert!(record.events.is_empty());
        }
    }

    #[test]
    fn test_significant_filters() {
        let mut record = ExtractionRecord::empty(2, ContentFormat::Book);
        record.surprises.push(Surprise {
            kind: SurpriseKind::PlotTurn,
            description: "the ferry sank".into(),
            significant: true,
        });
        record.surprises.push(Surprise {
            kind: SurpriseKind::NewElement,
            description: "a stray dog".into(),
            significant: false,
        });
        record.events.push(UnitEvent {
            description: "Mara burns the letter".into(),
            significance: EventSignificance::Pivotal,
        });
        record.events.push(UnitEvent {
            description: "dinner at the inn".into(),
            significance: EventSignificance::Minor,
        });

        assert_eq!(record.significant_surprises().count(), 1);
        assert_eq!(record.pivotal_events().count(), 1);
    }

    #[test]
    fn test_record_serde_round_trip() {
        let mut record = ExtractionRecord::empty(3, ContentFormat::Comic);
        record.extension = FormatExtension::Comic(ComicExtraction {
            pages: vec![PageExtraction {
                panels: 5,
                flow: PageFlow::Action,
                hook: Some("the door bursts open".into()),
            }],
            visuals: vec![CharacterVisual {
                character: "Mara".into(),
                attribute: "hair color".into(),
                value: "red".into(),
            }],
            motifs: vec!["broken clock".into()],
        });

        let json = serde_json::to_string(&record).unwrap();
        let restored: ExtractionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, restored);
    }
}
