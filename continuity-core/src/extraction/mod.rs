//! Extraction engine.
//!
//! Turns raw unit content plus its plan and prior summary into a
//! structured [`ExtractionRecord`] via one format-aware call to the
//! text service. Extraction is a pure function of its inputs aside
//! from the outbound call.
//!
//! Failure policy: the generate+parse sequence is retried up to
//! `ExtractorConfig::max_attempts`, then the error surfaces to the
//! caller. No degraded empty record is fabricated; an empty record
//! would read as "nothing happened" to every downstream tracker.

mod record;

pub use record::{
    BookExtraction, CharacterDelta, CharacterVisual, ComicExtraction, EventSignificance,
    ExtractionRecord, ForeshadowingSetup, FormatExtension, LocationDelta, Momentum,
    PageExtraction, PageFlow, RelationshipChange, RelationshipDelta, SceneExtraction,
    ScreenplayExtraction, Surprise, SurpriseKind, ThemeMention, ThreadKind, ThreadMention,
    ThreadUrgency, UnitEvent,
};

use crate::format::ContentFormat;
use serde::Deserialize;
use textgen::{GenerationError, GenerationRequest, TextGenerator};
use thiserror::Error;

/// Errors from the extraction engine.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Text service error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Failed to parse extraction response: {0}")]
    Parse(String),
}

/// Configuration for the extractor.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Model override (the client default is used when None).
    pub model: Option<String>,
    /// Maximum tokens for the extraction response.
    pub max_tokens: usize,
    /// Temperature; extraction wants near-deterministic output.
    pub temperature: f32,
    /// Total attempts before the failure surfaces.
    pub max_attempts: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 2048,
            temperature: 0.2,
            max_attempts: 2,
        }
    }
}

/// The extraction engine for one story instance.
pub struct Extractor<G: TextGenerator> {
    generator: G,
    config: ExtractorConfig,
    format: ContentFormat,
}

impl<G: TextGenerator> Extractor<G> {
    pub fn new(generator: G, format: ContentFormat) -> Self {
        Self {
            generator,
            config: ExtractorConfig::default(),
            format,
        }
    }

    pub fn with_config(mut self, config: ExtractorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn format(&self) -> ContentFormat {
        self.format
    }

    /// Extract a structured record from one generated unit.
    pub async fn extract(
        &self,
        content: &str,
        unit_number: u32,
        planned_summary: &str,
        prior_summary: &str,
        known_entities: &[String],
    ) -> Result<ExtractionRecord, ExtractError> {
        let prompt = self.build_prompt(content, unit_number, planned_summary, prior_summary, known_entities);
        let system = format!(
            "You are a story analyst. You read one {} of a serialized {} and report, \
             as JSON, exactly what it established. Report only what is in the text.",
            self.format.unit_name(),
            self.format.name(),
        );

        let mut last_error = ExtractError::Parse("no attempts made".to_string());
        for attempt in 1..=self.config.max_attempts {
            let mut request = GenerationRequest::new(&prompt)
                .with_system(&system)
                .with_max_tokens(self.config.max_tokens)
                .with_temperature(self.config.temperature);
            if let Some(ref model) = self.config.model {
                request = request.with_model(model);
            }

            match self.attempt(request, unit_number).await {
                Ok(record) => return Ok(record),
                Err(e) => {
                    if attempt < self.config.max_attempts {
                        tracing::warn!(unit_number, attempt, error = %e, "extraction attempt failed, retrying");
                    }
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn attempt(
        &self,
        request: GenerationRequest,
        unit_number: u32,
    ) -> Result<ExtractionRecord, ExtractError> {
        let response = self.generator.generate(request).await?;
        parse_extraction(&response, unit_number, self.format)
    }

    fn build_prompt(
        &self,
        content: &str,
        unit_number: u32,
        planned_summary: &str,
        prior_summary: &str,
        known_entities: &[String],
    ) -> String {
        let unit = self.format.unit_name();
        let mut prompt = format!("## Planned summary for {unit} {unit_number}\n{planned_summary}\n\n");

        if !prior_summary.trim().is_empty() {
            prompt.push_str(&format!("## Story so far\n{prior_summary}\n\n"));
        }

        if !known_entities.is_empty() {
            prompt.push_str("## Known characters\n");
            for name in known_entities {
                prompt.push_str(&format!("- {name}\n"));
            }
            prompt.push('\n');
        }

        prompt.push_str(&format!("## The {unit} as generated\n{content}\n\n"));

        prompt.push_str(
            r#"## Instructions
Respond with ONLY a JSON object (no markdown, no prose outside the JSON):
{
  "events": [{"description": "...", "significance": "minor|notable|pivotal"}],
  "characters": [{"name": "...", "emotional_state": "...", "physical_state": "...", "learned": "...", "decision": "..."}],
  "locations": [{"name": "...", "change": "..."}],
  "relationships": [{"between": ["A", "B"], "change": "improved|worsened|complicated|unchanged", "detail": "..."}],
  "threads": [{"description": "...", "kind": "introduction|advancement|complication|callback", "urgency": "background|normal|high|immediate"}],
  "surprises": [{"kind": "character_choice|plot_turn|new_element", "description": "...", "significance": "minor|significant"}],
  "themes": [{"name": "...", "evidence": "..."}],
  "emotional_arc": "one sentence on the unit's emotional arc",
  "momentum": "building|steady|climaxing|resolving",
  "open_questions": ["..."],
"#,
        );

        // Ask for exactly the active format's extension fields.
        match self.format {
            ContentFormat::Book => prompt.push_str(
                r#"  "book": {"prose_style": "...", "pacing": "...", "symbols": ["..."], "foreshadowing": [{"setup": "...", "payoff_hint": "..."}], "ending_kind": "cliffhanger|quiet|revelation|..."}
}
Surprises are deviations from the planned summary. Character fields may be omitted when the unit showed nothing for them."#,
            ),
            ContentFormat::Comic => prompt.push_str(
                r#"  "comic": {"pages": [{"panels": 5, "flow": "action|dialogue|establishing|mixed", "hook": "..."}], "visuals": [{"character": "...", "attribute": "...", "value": "..."}], "motifs": ["..."]}
}
Surprises are deviations from the planned summary. Character fields may be omitted when the unit showed nothing for them."#,
            ),
            ContentFormat::Screenplay => prompt.push_str(
                r#"  "screenplay": {"scenes": [{"location": "...", "purpose": "...", "dialogue_lines": 12, "action_lines": 8, "visual_beat": "..."}], "pacing_note": "..."}
}
Surprises are deviations from the planned summary. Character fields may be omitted when the unit showed nothing for them."#,
            ),
        }

        prompt
    }
}

/// Extract JSON from a response that might have markdown code fences.
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    text
}

/// Parse a text-service response into a record.
fn parse_extraction(
    response: &str,
    unit_number: u32,
    format: ContentFormat,
) -> Result<ExtractionRecord, ExtractError> {
    let json = extract_json(response);
    let raw: RawExtraction =
        serde_json::from_str(json).map_err(|e| ExtractError::Parse(e.to_string()))?;
    Ok(raw.into_record(unit_number, format))
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    events: Vec<RawEvent>,
    #[serde(default)]
    characters: Vec<RawCharacter>,
    #[serde(default)]
    locations: Vec<RawLocation>,
    #[serde(default)]
    relationships: Vec<RawRelationship>,
    #[serde(default)]
    threads: Vec<RawThread>,
    #[serde(default)]
    surprises: Vec<RawSurprise>,
    #[serde(default)]
    themes: Vec<RawTheme>,
    #[serde(default)]
    emotional_arc: Option<String>,
    #[serde(default)]
    momentum: Option<String>,
    #[serde(default)]
    open_questions: Vec<String>,
    #[serde(default)]
    book: Option<RawBook>,
    #[serde(default)]
    comic: Option<RawComic>,
    #[serde(default)]
    screenplay: Option<RawScreenplay>,
}

impl RawExtraction {
    fn into_record(self, unit_number: u32, format: ContentFormat) -> ExtractionRecord {
        // Only the active format's payload is read; anything else the
        // model volunteered is dropped at the boundary.
        let extension = match format {
            ContentFormat::Book => {
                FormatExtension::Book(self.book.map(RawBook::into_payload).unwrap_or_default())
            }
            ContentFormat::Comic => {
                FormatExtension::Comic(self.comic.map(RawComic::into_payload).unwrap_or_default())
            }
            ContentFormat::Screenplay => FormatExtension::Screenplay(
                self.screenplay
                    .map(RawScreenplay::into_payload)
                    .unwrap_or_default(),
            ),
        };

        ExtractionRecord {
            unit_number,
            events: self
                .events
                .into_iter()
                .map(|e| UnitEvent {
                    description: e.description,
                    significance: parse_event_significance(e.significance.as_deref()),
                })
                .collect(),
            character_deltas: self
                .characters
                .into_iter()
                .filter(|c| !c.name.trim().is_empty())
                .map(|c| CharacterDelta {
                    name: c.name,
                    emotional_state: c.emotional_state,
                    physical_state: c.physical_state,
                    learned: c.learned,
                    decision: c.decision,
                })
                .collect(),
            location_deltas: self
                .locations
                .into_iter()
                .filter(|l| !l.name.trim().is_empty())
                .map(|l| LocationDelta {
                    name: l.name,
                    change: l.change.unwrap_or_default(),
                })
                .collect(),
            relationship_deltas: self
                .relationships
                .into_iter()
                .filter_map(RawRelationship::into_delta)
                .collect(),
            threads: self
                .threads
                .into_iter()
                .map(|t| ThreadMention {
                    description: t.description,
                    kind: parse_thread_kind(t.kind.as_deref()),
                    urgency: parse_urgency(t.urgency.as_deref()),
                })
                .collect(),
            surprises: self
                .surprises
                .into_iter()
                .map(|s| Surprise {
                    kind: parse_surprise_kind(s.kind.as_deref()),
                    description: s.description,
                    significant: matches!(
                        s.significance.as_deref().map(str::to_lowercase).as_deref(),
                        Some("significant") | Some("major") | Some("high")
                    ),
                })
                .collect(),
            emergent_themes: self
                .themes
                .into_iter()
                .filter(|t| !t.name.trim().is_empty())
                .map(|t| ThemeMention {
                    name: t.name,
                    evidence: t.evidence.unwrap_or_default(),
                })
                .collect(),
            emotional_arc: self.emotional_arc,
            momentum: parse_momentum(self.momentum.as_deref()),
            open_questions: self.open_questions,
            extension,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    description: String,
    #[serde(default)]
    significance: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCharacter {
    name: String,
    #[serde(default)]
    emotional_state: Option<String>,
    #[serde(default)]
    physical_state: Option<String>,
    #[serde(default)]
    learned: Option<String>,
    #[serde(default)]
    decision: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    name: String,
    #[serde(default)]
    change: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRelationship {
    #[serde(default)]
    between: Vec<String>,
    #[serde(default)]
    change: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl RawRelationship {
    fn into_delta(self) -> Option<RelationshipDelta> {
        let mut names = self.between.into_iter();
        let a = names.next()?;
        let b = names.next()?;
        Some(RelationshipDelta {
            between: (a, b),
            change: parse_relationship_change(self.change.as_deref()),
            detail: self.detail.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawThread {
    description: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    urgency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSurprise {
    #[serde(default)]
    kind: Option<String>,
    description: String,
    #[serde(default)]
    significance: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTheme {
    name: String,
    #[serde(default)]
    evidence: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawBook {
    #[serde(default)]
    prose_style: Option<String>,
    #[serde(default)]
    pacing: Option<String>,
    #[serde(default)]
    symbols: Vec<String>,
    #[serde(default)]
    foreshadowing: Vec<RawForeshadow>,
    #[serde(default)]
    ending_kind: Option<String>,
}

impl RawBook {
    fn into_payload(self) -> BookExtraction {
        BookExtraction {
            prose_style: self.prose_style,
            pacing: self.pacing,
            symbols: self.symbols,
            foreshadowing: self
                .foreshadowing
                .into_iter()
                .map(|f| ForeshadowingSetup {
                    setup: f.setup,
                    payoff_hint: f.payoff_hint,
                })
                .collect(),
            ending_kind: self.ending_kind,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawForeshadow {
    setup: String,
    #[serde(default)]
    payoff_hint: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawComic {
    #[serde(default)]
    pages: Vec<RawPage>,
    #[serde(default)]
    visuals: Vec<RawVisual>,
    #[serde(default)]
    motifs: Vec<String>,
}

impl RawComic {
    fn into_payload(self) -> ComicExtraction {
        ComicExtraction {
            pages: self
                .pages
                .into_iter()
                .map(|p| PageExtraction {
                    panels: p.panels.unwrap_or(0),
                    flow: parse_page_flow(p.flow.as_deref()),
                    hook: p.hook,
                })
                .collect(),
            visuals: self
                .visuals
                .into_iter()
                .map(|v| CharacterVisual {
                    character: v.character,
                    attribute: v.attribute,
                    value: v.value,
                })
                .collect(),
            motifs: self.motifs,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(default)]
    panels: Option<u32>,
    #[serde(default)]
    flow: Option<String>,
    #[serde(default)]
    hook: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVisual {
    character: String,
    attribute: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawScreenplay {
    #[serde(default)]
    scenes: Vec<RawScene>,
    #[serde(default)]
    pacing_note: Option<String>,
}

impl RawScreenplay {
    fn into_payload(self) -> ScreenplayExtraction {
        ScreenplayExtraction {
            scenes: self
                .scenes
                .into_iter()
                .map(|s| SceneExtraction {
                    location: s.location.unwrap_or_default(),
                    purpose: s.purpose.unwrap_or_default(),
                    dialogue_lines: s.dialogue_lines.unwrap_or(0),
                    action_lines: s.action_lines.unwrap_or(0),
                    visual_beat: s.visual_beat,
                })
                .collect(),
            pacing_note: self.pacing_note,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawScene {
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    purpose: Option<String>,
    #[serde(default)]
    dialogue_lines: Option<u32>,
    #[serde(default)]
    action_lines: Option<u32>,
    #[serde(default)]
    visual_beat: Option<String>,
}

// Lenient string-to-enum decoding. Unknown values get the mildest label.

fn parse_event_significance(value: Option<&str>) -> EventSignificance {
    match value.map(str::to_lowercase).as_deref() {
        Some("pivotal") | Some("major") | Some("critical") => EventSignificance::Pivotal,
        Some("notable") | Some("moderate") => EventSignificance::Notable,
        _ => EventSignificance::Minor,
    }
}

fn parse_relationship_change(value: Option<&str>) -> RelationshipChange {
    match value.map(str::to_lowercase).as_deref() {
        Some("improved") | Some("better") => RelationshipChange::Improved,
        Some("worsened") | Some("worse") => RelationshipChange::Worsened,
        Some("complicated") => RelationshipChange::Complicated,
        _ => RelationshipChange::Unchanged,
    }
}

fn parse_thread_kind(value: Option<&str>) -> ThreadKind {
    match value.map(str::to_lowercase).as_deref() {
        Some("introduction") | Some("new") => ThreadKind::Introduction,
        Some("complication") => ThreadKind::Complication,
        Some("callback") | Some("payoff") => ThreadKind::Callback,
        _ => ThreadKind::Advancement,
    }
}

fn parse_urgency(value: Option<&str>) -> ThreadUrgency {
    match value.map(str::to_lowercase).as_deref() {
        Some("immediate") | Some("urgent") => ThreadUrgency::Immediate,
        Some("high") => ThreadUrgency::High,
        Some("background") | Some("low") => ThreadUrgency::Background,
        _ => ThreadUrgency::Normal,
    }
}

fn parse_surprise_kind(value: Option<&str>) -> SurpriseKind {
    match value.map(str::to_lowercase).as_deref() {
        Some("character_choice") | Some("character choice") => SurpriseKind::CharacterChoice,
        Some("plot_turn") | Some("plot turn") => SurpriseKind::PlotTurn,
        _ => SurpriseKind::NewElement,
    }
}

fn parse_momentum(value: Option<&str>) -> Momentum {
    match value.map(str::to_lowercase).as_deref() {
        Some(v) if v.starts_with("build") => Momentum::Building,
        Some(v) if v.starts_with("climax") => Momentum::Climaxing,
        Some(v) if v.starts_with("resolv") || v.starts_with("wind") => Momentum::Resolving,
        _ => Momentum::Steady,
    }
}

fn parse_page_flow(value: Option<&str>) -> PageFlow {
    match value.map(str::to_lowercase).as_deref() {
        Some("action") => PageFlow::Action,
        Some("dialogue") | Some("dialog") => PageFlow::Dialogue,
        Some("establishing") => PageFlow::Establishing,
        _ => PageFlow::Mixed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_plain() {
        let text = r#"{"events": []}"#;
        assert_eq!(extract_json(text), text);
    }

    #[test]
    fn test_extract_json_fenced() {
        let text = "```json\n{\"events\": []}\n```";
        assert_eq!(extract_json(text), r#"{"events": []}"#);
    }

    #[test]
    fn test_parse_minimal_extraction() {
        let record = parse_extraction("{}", 4, ContentFormat::Book).unwrap();
        assert_eq!(record.unit_number, 4);
        assert!(record.events.is_empty());
        assert_eq!(record.momentum, Momentum::Steady);
        assert_eq!(record.format(), ContentFormat::Book);
    }

    #[test]
    fn test_parse_full_extraction() {
        let response = r#"{
            "events": [{"description": "Mara burns the letter", "significance": "pivotal"}],
            "characters": [{"name": "Mara", "emotional_state": "furious at the betrayal", "decision": "chose to conceal the truth"}],
            "relationships": [{"between": ["Mara", "Edan"], "change": "worsened", "detail": "the letter"}],
            "threads": [{"description": "the missing ledger", "kind": "introduction", "urgency": "high"}],
            "surprises": [{"kind": "character_choice", "description": "Mara spared the informant", "significance": "significant"}],
            "themes": [{"name": "redemption", "evidence": "she turned back"}],
            "emotional_arc": "dread building to a break",
            "momentum": "climaxing",
            "book": {"symbols": ["the broken clock"], "ending_kind": "cliffhanger"}
        }"#;

        let record = parse_extraction(response, 7, ContentFormat::Book).unwrap();
        assert_eq!(record.pivotal_events().count(), 1);
        assert_eq!(record.significant_surprises().count(), 1);
        assert_eq!(record.momentum, Momentum::Climaxing);
        assert_eq!(record.relationship_deltas[0].change, RelationshipChange::Worsened);
        match &record.extension {
            FormatExtension::Book(book) => {
                assert_eq!(book.symbols, vec!["the broken clock"]);
                assert_eq!(book.ending_kind.as_deref(), Some("cliffhanger"));
            }
            other => panic!("expected book payload, got {other:?}"),
        }
    }

    #[test]
    fn test_only_active_format_payload_is_read() {
        let response = r#"{
            "comic": {"pages": [{"panels": 4, "flow": "action"}]},
            "book": {"symbols": ["rose"]}
        }"#;

        let record = parse_extraction(response, 1, ContentFormat::Comic).unwrap();
        match &record.extension {
            FormatExtension::Comic(comic) => assert_eq!(comic.pages.len(), 1),
            other => panic!("expected comic payload, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_relationship_skipped() {
        let response = r#"{"relationships": [{"between": ["OnlyOne"], "change": "improved"}]}"#;
        let record = parse_extraction(response, 1, ContentFormat::Book).unwrap();
        assert!(record.relationship_deltas.is_empty());
    }

    #[test]
    fn test_unparsable_response_is_an_error() {
        let result = parse_extraction("I could not analyze this chapter.", 1, ContentFormat::Book);
        assert!(matches!(result, Err(ExtractError::Parse(_))));
    }
}
