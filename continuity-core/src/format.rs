//! Content formats and their structural parameters.

use serde::{Deserialize, Serialize};

/// The fixed per-story content format.
///
/// Selected once at story-instance creation; every format-specific
/// payload in the engine must carry the matching variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    /// Prose novel, generated chapter by chapter.
    Book,
    /// Comic, generated page by page.
    Comic,
    /// Screenplay, generated sequence by sequence.
    Screenplay,
}

impl ContentFormat {
    /// Get the display name for this format.
    pub fn name(&self) -> &'static str {
        match self {
            ContentFormat::Book => "book",
            ContentFormat::Comic => "comic",
            ContentFormat::Screenplay => "screenplay",
        }
    }

    /// The name of the structural unit this format is generated in.
    pub fn unit_name(&self) -> &'static str {
        match self {
            ContentFormat::Book => "chapter",
            ContentFormat::Comic => "page",
            ContentFormat::Screenplay => "sequence",
        }
    }

    /// How many upcoming plan units are eligible for revision after a
    /// unit completes. Sequences are coarser than chapters or pages,
    /// so screenplays get a shorter window.
    pub fn lookahead_window(&self) -> usize {
        match self {
            ContentFormat::Book | ContentFormat::Comic => 3,
            ContentFormat::Screenplay => 2,
        }
    }
}

impl std::fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_names() {
        assert_eq!(ContentFormat::Book.unit_name(), "chapter");
        assert_eq!(ContentFormat::Comic.unit_name(), "page");
        assert_eq!(ContentFormat::Screenplay.unit_name(), "sequence");
    }

    #[test]
    fn test_lookahead_asymmetry() {
        assert_eq!(ContentFormat::Book.lookahead_window(), 3);
        assert_eq!(ContentFormat::Comic.lookahead_window(), 3);
        assert_eq!(ContentFormat::Screenplay.lookahead_window(), 2);
    }
}
