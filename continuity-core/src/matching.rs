//! Fuzzy matching for theme and thread de-duplication.
//!
//! Extracted descriptions never repeat verbatim, so the trackers need
//! an approximate notion of "same theme" / "same thread". The scoring
//! function is pluggable so matching accuracy can be tuned and tested
//! independently of tracking logic.

/// How many leading characters participate in thread prefix matching.
const THREAD_PREFIX_LEN: usize = 30;

/// A similarity scorer over two short pieces of text.
///
/// Scores are in [0.0, 1.0]; 1.0 means identical under the scorer's
/// notion of equality.
pub trait Similarity: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f32;
}

/// Token-overlap (Jaccard) similarity with a match cutoff.
///
/// The default scorer: case-insensitive, punctuation-blind, and cheap
/// enough to run pairwise against every known theme per unit.
#[derive(Debug, Clone, Copy)]
pub struct TokenOverlap {
    pub cutoff: f32,
}

impl TokenOverlap {
    pub fn new(cutoff: f32) -> Self {
        Self { cutoff }
    }

    /// Whether two texts meet the cutoff.
    pub fn matches(&self, a: &str, b: &str) -> bool {
        self.score(a, b) >= self.cutoff
    }
}

impl Default for TokenOverlap {
    fn default() -> Self {
        Self { cutoff: 0.5 }
    }
}

impl Similarity for TokenOverlap {
    fn score(&self, a: &str, b: &str) -> f32 {
        let a_tokens = tokens(a);
        let b_tokens = tokens(b);
        if a_tokens.is_empty() || b_tokens.is_empty() {
            return 0.0;
        }

        let shared = a_tokens.iter().filter(|t| b_tokens.contains(*t)).count();
        let union = a_tokens.len() + b_tokens.len() - shared;
        shared as f32 / union as f32
    }
}

fn tokens(text: &str) -> Vec<String> {
    let mut out: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Case-insensitive bidirectional substring containment.
///
/// This is the baseline theme-matching rule: a one-word theme name like
/// "redemption" matches a longer phrasing of the same theme in either
/// direction.
pub fn fuzzy_contains(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

/// Thread prefix matching: the first ~30 characters of either
/// description contained in the other, case-insensitive.
pub fn prefix_matches(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let a_prefix = truncate_chars(&a, THREAD_PREFIX_LEN);
    let b_prefix = truncate_chars(&b, THREAD_PREFIX_LEN);
    a.contains(b_prefix) || b.contains(a_prefix)
}

/// Truncate to at most `n` chars without splitting a UTF-8 boundary.
fn truncate_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
