//! Discovery tracking.
//!
//! The discovery tracker is the story's cumulative ledger of what the
//! generated content actually did, as opposed to what the outline
//! planned. It consumes one `ExtractionRecord` per unit and accumulates
//! emergent themes, character discoveries, plot threads, recurring
//! elements, relationship connections, and the tone trajectory, plus
//! one format-specific sub-ledger.
//!
//! `DiscoveryState` is the serializable half. Callers persist it
//! between units and rebuild the tracker with `from_state`; behavior
//! after a round-trip is identical to never having serialized.

pub mod elements;
pub mod ledger;
pub mod theme;
pub mod thread;

use crate::classify::{tone_classifier, KeywordClassifier, Tone};
use crate::extraction::{ExtractionRecord, FormatExtension, SurpriseKind, ThreadKind, ThreadUrgency};
use crate::format::ContentFormat;
use crate::matching::{fuzzy_contains, prefix_matches, Similarity, TokenOverlap};
use crate::namemap::normalize;
use serde::{Deserialize, Serialize};

pub use elements::{leading_words, ConnectionKind, ElementKind, RunningElement, StoryConnection, ToneRecord};
pub use ledger::{BookLedger, ComicLedger, FormatLedger, HookKind, ScreenplayLedger};
pub use theme::{EmergentTheme, ThemeStrength};
pub use thread::{PlotThread, ThreadStatus};

/// What kind of thing a character discovery revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryKind {
    Backstory,
    Motivation,
    Relationship,
    Skill,
    Trait,
}

fn discovery_kind_classifier() -> KeywordClassifier<DiscoveryKind> {
    KeywordClassifier::new(
        vec![
            (
                DiscoveryKind::Backstory,
                &["past", "childhood", "years ago", "used to", "history", "before the story"][..],
            ),
            (
                DiscoveryKind::Motivation,
                &["wants", "desire", "goal", "driven by", "seeks", "ambition"][..],
            ),
            (
                DiscoveryKind::Relationship,
                &["brother", "sister", "mother", "father", "loves", "hates", "friend", "bond"][..],
            ),
            (
                DiscoveryKind::Skill,
                &["skill", "trained", "able to", "knows how", "talent", "can fight"][..],
            ),
        ],
        DiscoveryKind::Trait,
    )
}

/// Something learned about a character from a surprise in the content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterDiscovery {
    pub character: String,
    pub kind: DiscoveryKind,
    pub description: String,
    pub unit: u32,
    /// True when the outline does not already cover this.
    pub should_integrate: bool,
}

/// The serializable cumulative discovery ledger for one story.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryState {
    pub format: ContentFormat,
    /// The original story outline, used for was-planned checks.
    pub outline: String,
    pub themes: Vec<EmergentTheme>,
    pub character_discoveries: Vec<CharacterDiscovery>,
    pub threads: Vec<PlotThread>,
    pub running_elements: Vec<RunningElement>,
    pub connections: Vec<StoryConnection>,
    pub tone_timeline: Vec<ToneRecord>,
    pub ledger: FormatLedger,
    pub units_processed: u32,
    /// Next thread id to hand out. Monotonic, never reused.
    pub next_thread_id: u64,
}

impl DiscoveryState {
    pub fn new(format: ContentFormat, outline: impl Into<String>) -> Self {
        Self {
            format,
            outline: outline.into(),
            themes: Vec::new(),
            character_discoveries: Vec::new(),
            threads: Vec::new(),
            running_elements: Vec::new(),
            connections: Vec::new(),
            tone_timeline: Vec::new(),
            ledger: FormatLedger::empty(format),
            units_processed: 0,
            next_thread_id: 1,
        }
    }

    /// Non-terminal threads, highest priority first, stalest first
    /// within a priority.
    pub fn thread_backlog(&self) -> Vec<&PlotThread> {
        let mut backlog: Vec<&PlotThread> = self
            .threads
            .iter()
            .filter(|t| !t.status.is_terminal())
            .collect();
        backlog.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.last_mentioned_in.cmp(&b.last_mentioned_in))
        });
        backlog
    }

    /// Threads unmentioned long enough to count as stale.
    pub fn stale_threads(&self, current_unit: u32) -> Vec<&PlotThread> {
        self.threads.iter().filter(|t| t.is_stale(current_unit)).collect()
    }

    /// Themes strong enough to steer revision.
    pub fn strong_themes(&self) -> Vec<&EmergentTheme> {
        self.themes.iter().filter(|t| t.is_strong()).collect()
    }

    /// Strong themes the outline never planned.
    pub fn unplanned_strong_themes(&self) -> Vec<&EmergentTheme> {
        self.themes
            .iter()
            .filter(|t| t.is_strong() && !t.was_planned)
            .collect()
    }
}

/// What one unit contributed to the discovery ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryReport {
    pub unit: u32,
    pub new_themes: Vec<String>,
    pub reinforced_themes: Vec<String>,
    /// All themes currently at prominent strength or above.
    pub strong_themes: Vec<String>,
    /// Discoveries from this unit worth integrating into the plan.
    pub suggested_integrations: Vec<CharacterDiscovery>,
    /// Open threads, highest priority first.
    pub thread_backlog: Vec<PlotThread>,
    pub new_connections: Vec<StoryConnection>,
    pub tone: Option<Tone>,
    pub tone_shifted: bool,
}

/// Accumulates discoveries across a story's units.
///
/// Holds the serializable state plus the replaceable matching and
/// classification strategies, which are configuration rather than
/// state and are not persisted.
pub struct DiscoveryTracker {
    state: DiscoveryState,
    similarity: Box<dyn Similarity>,
    similarity_cutoff: f32,
    tone: KeywordClassifier<Tone>,
    discovery_kind: KeywordClassifier<DiscoveryKind>,
}

impl DiscoveryTracker {
    /// Start tracking a fresh story.
    pub fn new(format: ContentFormat, outline: impl Into<String>) -> Self {
        Self::from_state(DiscoveryState::new(format, outline))
    }

    /// Rebuild a tracker from caller-persisted state.
    pub fn from_state(state: DiscoveryState) -> Self {
        let overlap = TokenOverlap::default();
        let cutoff = overlap.cutoff;
        Self {
            state,
            similarity: Box::new(overlap),
            similarity_cutoff: cutoff,
            tone: tone_classifier(),
            discovery_kind: discovery_kind_classifier(),
        }
    }

    /// Replace the theme-matching strategy.
    pub fn with_similarity(mut self, similarity: Box<dyn Similarity>, cutoff: f32) -> Self {
        self.similarity = similarity;
        self.similarity_cutoff = cutoff;
        self
    }

    pub fn state(&self) -> &DiscoveryState {
        &self.state
    }

    pub fn into_state(self) -> DiscoveryState {
        self.state
    }

    /// Fold one unit's extraction into the ledger.
    ///
    /// Not idempotent: call exactly once per unit, in unit order.
    pub fn process_unit(&mut self, record: &ExtractionRecord) -> DiscoveryReport {
        let unit = record.unit_number;
        let mut report = DiscoveryReport {
            unit,
            new_themes: Vec::new(),
            reinforced_themes: Vec::new(),
            strong_themes: Vec::new(),
            suggested_integrations: Vec::new(),
            thread_backlog: Vec::new(),
            new_connections: Vec::new(),
            tone: None,
            tone_shifted: false,
        };

        self.track_themes(record, &mut report);
        self.track_character_discoveries(record, &mut report);
        self.track_threads(record);
        self.track_running_elements(record);
        self.track_connections(record, &mut report);
        self.track_tone(record, &mut report);
        self.update_ledger(record);

        self.state.units_processed += 1;

        report.strong_themes = self
            .state
            .strong_themes()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        report.thread_backlog = self.state.thread_backlog().into_iter().cloned().collect();

        tracing::debug!(
            unit,
            new_themes = report.new_themes.len(),
            backlog = report.thread_backlog.len(),
            "processed unit"
        );
        report
    }

    fn theme_matches(&self, a: &str, b: &str) -> bool {
        fuzzy_contains(a, b) || self.similarity.score(a, b) >= self.similarity_cutoff
    }

    fn track_themes(&mut self, record: &ExtractionRecord, report: &mut DiscoveryReport) {
        let unit = record.unit_number;
        for mention in &record.emergent_themes {
            let existing = self
                .state
                .themes
                .iter()
                .position(|t| self.theme_matches(&t.name, &mention.name));
            match existing {
                Some(i) => {
                    let theme = &mut self.state.themes[i];
                    theme.reinforce(unit);
                    report.reinforced_themes.push(theme.name.clone());
                }
                None => {
                    let was_planned = fuzzy_contains(&self.state.outline, &mention.name);
                    self.state
                        .themes
                        .push(EmergentTheme::new(&mention.name, unit, was_planned));
                    report.new_themes.push(mention.name.clone());
                }
            }
        }
    }

    fn track_character_discoveries(
        &mut self,
        record: &ExtractionRecord,
        report: &mut DiscoveryReport,
    ) {
        for surprise in &record.surprises {
            if surprise.kind != SurpriseKind::CharacterChoice {
                continue;
            }
            // Best-effort name: the first word of the description.
            let character = surprise
                .description
                .split_whitespace()
                .next()
                .unwrap_or("unknown")
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_string();
            let discovery = CharacterDiscovery {
                character,
                kind: self.discovery_kind.classify(&surprise.description),
                description: surprise.description.clone(),
                unit: record.unit_number,
                should_integrate: !fuzzy_contains(&self.state.outline, &surprise.description),
            };
            if discovery.should_integrate {
                report.suggested_integrations.push(discovery.clone());
            }
            self.state.character_discoveries.push(discovery);
        }
    }

    fn track_threads(&mut self, record: &ExtractionRecord) {
        let unit = record.unit_number;
        for mention in &record.threads {
            let existing = self
                .state
                .threads
                .iter()
                .position(|t| prefix_matches(&t.description, &mention.description));
            match existing {
                Some(i) => {
                    let thread = &mut self.state.threads[i];
                    thread.touch(unit);
                    if mention.kind == ThreadKind::Callback {
                        // A callback always pays the thread off.
                        thread.resolve();
                    } else if mention.urgency >= ThreadUrgency::High {
                        thread.advance_status(ThreadStatus::ReadyToResolve);
                    }
                }
                None => {
                    let was_planned = fuzzy_contains(&self.state.outline, &mention.description);
                    let id = self.state.next_thread_id;
                    self.state.next_thread_id += 1;
                    self.state.threads.push(PlotThread::new(
                        id,
                        &mention.description,
                        mention.kind,
                        mention.urgency,
                        unit,
                        was_planned,
                    ));
                }
            }
        }
    }

    fn track_running_elements(&mut self, record: &ExtractionRecord) {
        let unit = record.unit_number;
        for mention in &record.threads {
            if mention.kind != ThreadKind::Callback {
                continue;
            }
            let name = leading_words(&mention.description, 3);
            match self
                .state
                .running_elements
                .iter_mut()
                .find(|e| normalize(&e.name) == normalize(&name))
            {
                Some(element) => element.record(unit),
                None => self
                    .state
                    .running_elements
                    .push(RunningElement::new(name, ElementKind::Callback, unit)),
            }
        }
    }

    fn track_connections(&mut self, record: &ExtractionRecord, report: &mut DiscoveryReport) {
        let deltas = &record.relationship_deltas;
        for i in 0..deltas.len() {
            for j in (i + 1)..deltas.len() {
                let Some(kind) = elements::connect(deltas[i].change, deltas[j].change) else {
                    continue;
                };
                let connection = StoryConnection {
                    kind,
                    first: deltas[i].between.clone(),
                    second: deltas[j].between.clone(),
                    unit: record.unit_number,
                    detail: format!("{} / {}", deltas[i].detail, deltas[j].detail),
                };
                report.new_connections.push(connection.clone());
                self.state.connections.push(connection);
            }
        }
    }

    fn track_tone(&mut self, record: &ExtractionRecord, report: &mut DiscoveryReport) {
        let Some(arc) = &record.emotional_arc else {
            return;
        };
        let tone = self.tone.classify(arc);
        let shifted = self
            .state
            .tone_timeline
            .last()
            .map(|prev| prev.tone != tone)
            .unwrap_or(false);
        self.state.tone_timeline.push(ToneRecord {
            unit: record.unit_number,
            tone,
            shifted,
        });
        report.tone = Some(tone);
        report.tone_shifted = shifted;
    }

    fn update_ledger(&mut self, record: &ExtractionRecord) {
        let unit = record.unit_number;
        match (&mut self.state.ledger, &record.extension) {
            (FormatLedger::Book(ledger), FormatExtension::Book(payload)) => {
                ledger.absorb(payload, unit);
                let callbacks: Vec<&str> = record
                    .threads
                    .iter()
                    .filter(|t| t.kind == ThreadKind::Callback)
                    .map(|t| t.description.as_str())
                    .collect();
                if !callbacks.is_empty() {
                    ledger.mark_payoffs(&callbacks);
                }
            }
            (FormatLedger::Comic(ledger), FormatExtension::Comic(payload)) => {
                ledger.absorb(payload, unit);
            }
            (FormatLedger::Screenplay(ledger), FormatExtension::Screenplay(payload)) => {
                ledger.absorb(payload, unit);
            }
            _ => {
                tracing::warn!(
                    expected = %self.state.format,
                    got = %record.format(),
                    "extraction payload format does not match the story, skipped"
                );
            }
        }
    }
}
