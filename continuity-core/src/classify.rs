//! Keyword-heuristic classifiers.
//!
//! Tone buckets, emotional intensity, knowledge significance, decision
//! traits, and capability impact are all inferred from short free-text
//! descriptions with ordered keyword rules. Those rules live here, as
//! data on a single classifier type, so trackers can swap in better
//! classifiers without touching tracking logic.

use serde::{Deserialize, Serialize};

/// An ordered keyword classifier.
///
/// Buckets are checked in order; the first bucket with any keyword
/// contained in the (lowercased) input wins. Input with no hits gets
/// the default label.
#[derive(Debug, Clone)]
pub struct KeywordClassifier<L: Copy> {
    buckets: Vec<(L, &'static [&'static str])>,
    default: L,
}

impl<L: Copy> KeywordClassifier<L> {
    pub fn new(buckets: Vec<(L, &'static [&'static str])>, default: L) -> Self {
        Self { buckets, default }
    }

    pub fn classify(&self, text: &str) -> L {
        let text = text.to_lowercase();
        for (label, keywords) in &self.buckets {
            if keywords.iter().any(|k| text.contains(k)) {
                return *label;
            }
        }
        self.default
    }
}

// ============================================================================
// Tone
// ============================================================================

/// Tone buckets for the emotional arc of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Tense,
    Hopeful,
    Melancholic,
    Intense,
    Romantic,
    Neutral,
}

impl Tone {
    pub fn name(&self) -> &'static str {
        match self {
            Tone::Tense => "tense",
            Tone::Hopeful => "hopeful",
            Tone::Melancholic => "melancholic",
            Tone::Intense => "intense",
            Tone::Romantic => "romantic",
            Tone::Neutral => "neutral",
        }
    }
}

/// The default tone classifier.
///
/// Intense outranks tense so that "violent" arcs are not swallowed by
/// the broader anxiety bucket.
pub fn tone_classifier() -> KeywordClassifier<Tone> {
    KeywordClassifier::new(
        vec![
            (
                Tone::Intense,
                &["violen", "explosive", "furious", "rage", "desperate", "brutal"][..],
            ),
            (
                Tone::Tense,
                &["tens", "anxi", "dread", "suspense", "threat", "fear", "unease"][..],
            ),
            (
                Tone::Melancholic,
                &["melanchol", "grief", "mourn", "loss", "sorrow", "regret", "lonel"][..],
            ),
            (
                Tone::Romantic,
                &["romanc", "romantic", "tender", "longing", "intimate", "love"][..],
            ),
            (
                Tone::Hopeful,
                &["hope", "uplift", "warm", "triumph", "relief", "joy"][..],
            ),
        ],
        Tone::Neutral,
    )
}

// ============================================================================
// Emotional intensity
// ============================================================================

/// Severity buckets for a character's emotional state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EmotionIntensity {
    Low,
    Medium,
    High,
    Extreme,
}

impl EmotionIntensity {
    pub fn name(&self) -> &'static str {
        match self {
            EmotionIntensity::Low => "low",
            EmotionIntensity::Medium => "medium",
            EmotionIntensity::High => "high",
            EmotionIntensity::Extreme => "extreme",
        }
    }
}

pub fn intensity_classifier() -> KeywordClassifier<EmotionIntensity> {
    KeywordClassifier::new(
        vec![
            (
                EmotionIntensity::Extreme,
                &["shatter", "devastat", "break", "broken", "overwhelm", "collapse", "unbearable"]
                    [..],
            ),
            (
                EmotionIntensity::High,
                &["furious", "terrified", "desperate", "anguish", "elated", "enraged"][..],
            ),
            (
                EmotionIntensity::Medium,
                &["worried", "angry", "afraid", "excited", "sad", "guilty", "jealous"][..],
            ),
        ],
        EmotionIntensity::Low,
    )
}

// ============================================================================
// Knowledge significance
// ============================================================================

/// How much a learned fact matters to the story.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeSignificance {
    Minor,
    Moderate,
    Major,
    StoryChanging,
}

impl KnowledgeSignificance {
    pub fn name(&self) -> &'static str {
        match self {
            KnowledgeSignificance::Minor => "minor",
            KnowledgeSignificance::Moderate => "moderate",
            KnowledgeSignificance::Major => "major",
            KnowledgeSignificance::StoryChanging => "story-changing",
        }
    }
}

pub fn significance_classifier() -> KeywordClassifier<KnowledgeSignificance> {
    KeywordClassifier::new(
        vec![
            (
                KnowledgeSignificance::StoryChanging,
                &["truth about", "identity", "betray", "conspiracy", "was behind", "all along"][..],
            ),
            (
                KnowledgeSignificance::Major,
                &["secret", "hidden", "revealed", "discover", "location of", "weakness"][..],
            ),
            (
                KnowledgeSignificance::Moderate,
                &["learn", "realize", "notice", "suspect", "rumor"][..],
            ),
        ],
        KnowledgeSignificance::Minor,
    )
}

// ============================================================================
// Decision traits
// ============================================================================

/// One-line character trait inferred from a decision description.
pub fn decision_trait_classifier() -> KeywordClassifier<&'static str> {
    KeywordClassifier::new(
        vec![
            (
                "protects others before themselves",
                &["protect", "save", "shield", "sacrifice", "defend"][..],
            ),
            (
                "withholds the truth when cornered",
                &["lie", "deceive", "hide", "conceal", "mislead"][..],
            ),
            (
                "confronts problems head-on",
                &["confront", "face", "challenge", "stand up", "refuse"][..],
            ),
            (
                "avoids conflict until forced",
                &["flee", "run", "avoid", "retreat", "escape"][..],
            ),
            (
                "extends trust readily",
                &["trust", "forgive", "accept", "believe", "mercy"][..],
            ),
            (
                "puts the goal above personal cost",
                &["mission", "duty", "oath", "promise", "no matter the cost"][..],
            ),
        ],
        "acts on instinct in the moment",
    )
}

// ============================================================================
// Capability impact (wounds)
// ============================================================================

lazy_static::lazy_static! {
    /// Body-part keyword map for wound capability impact.
    static ref BODY_PART_IMPACTS: Vec<(&'static str, &'static str)> = vec![
        ("hand", "impaired fine manipulation"),
        ("arm", "limited use of one arm"),
        ("leg", "reduced mobility"),
        ("knee", "reduced mobility"),
        ("foot", "reduced mobility"),
        ("eye", "impaired vision"),
        ("ear", "impaired hearing"),
        ("head", "episodes of disorientation"),
        ("rib", "pain under exertion"),
        ("chest", "pain under exertion"),
        ("shoulder", "cannot bear heavy loads"),
        ("back", "cannot bear heavy loads"),
        ("voice", "strained speech"),
        ("throat", "strained speech"),
    ];
}

/// Infer a capability impact from a physical-state description.
///
/// Returns `None` when the description names no recognized body part,
/// in which case the wound is tracked without a capability note.
pub fn capability_impact(physical_state: &str) -> Option<&'static str> {
    let text = physical_state.to_lowercase();
    BODY_PART_IMPACTS
        .iter()
        .find(|(part, _)| text.contains(part))
        .map(|(_, impact)| *impact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_bucket_wins() {
        let tones = tone_classifier();
        // "violent" hits Intense before "threat" can hit Tense.
        assert_eq!(tones.classify("a violent threat in the dark"), Tone::Intense);
    }

    #[test]
    fn test_tone_default() {
        let tones = tone_classifier();
        assert_eq!(tones.classify("they walked to the market"), Tone::Neutral);
    }

    #[test]
    fn test_intensity_ordering() {
        assert!(EmotionIntensity::Extreme > EmotionIntensity::High);
        assert!(EmotionIntensity::High > EmotionIntensity::Medium);
        assert!(EmotionIntensity::Medium > EmotionIntensity::Low);
    }

    #[test]
    fn test_intensity_buckets() {
        let c = intensity_classifier();
        assert_eq!(c.classify("utterly devastated by the news"), EmotionIntensity::Extreme);
        assert_eq!(c.classify("furious at the betrayal"), EmotionIntensity::High);
        assert_eq!(c.classify("worried about the road ahead"), EmotionIntensity::Medium);
        assert_eq!(c.classify("calm and collected"), EmotionIntensity::Low);
    }

    #[test]
    fn test_significance_buckets() {
        let c = significance_classifier();
        assert_eq!(
            c.classify("learned the truth about her mother's disappearance"),
            KnowledgeSignificance::StoryChanging
        );
        assert_eq!(
            c.classify("discovered a hidden passage"),
            KnowledgeSignificance::Major
        );
        assert_eq!(
            c.classify("noticed the guard's limp"),
            KnowledgeSignificance::Moderate
        );
        assert_eq!(c.classify("the weather turned"), KnowledgeSignificance::Minor);
    }

    #[test]
    fn test_decision_trait_inference() {
        let c = decision_trait_classifier();
        assert_eq!(
            c.classify("chose to shield the boy from the blast"),
            "protects others before themselves"
        );
        assert_eq!(
            c.classify("decided to conceal the letter"),
            "withholds the truth when cornered"
        );
        assert_eq!(c.classify("shrugged and picked a door"), "acts on instinct in the moment");
    }

    #[test]
    fn test_capability_impact() {
        assert_eq!(
            capability_impact("broken left hand, splinted"),
            Some("impaired fine manipulation")
        );
        assert_eq!(capability_impact("deep gash over the eye"), Some("impaired vision"));
        assert_eq!(capability_impact("bruised pride"), None);
    }
}
