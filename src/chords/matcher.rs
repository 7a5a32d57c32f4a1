// Chord matching
// Finds the first rule whose fret and string multisets equal the observed contacts

use serde::{Deserialize, Serialize};

use crate::chords::binarize::ContactGrid;
use crate::chords::rules::RuleTable;

/// Chord name reported when no rule matches
pub const UNKNOWN_CHORD: &str = "Unknown";

/// Classification outcome handed to playback and the API
///
/// `fret_positions[i]` and `string_positions[i]` describe the same contact,
/// listed in grid scan order (string-major, fret-minor), never sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(rename = "chord")]
    pub chord_name: String,

    pub fret_positions: Vec<usize>,

    pub string_positions: Vec<usize>,
}

impl ClassificationResult {
    /// Baseline answer before any frame has been classified
    pub fn unknown() -> Self {
        ClassificationResult {
            chord_name: UNKNOWN_CHORD.to_string(),
            fret_positions: Vec::new(),
            string_positions: Vec::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.chord_name == UNKNOWN_CHORD
    }

    pub fn contact_count(&self) -> usize {
        self.fret_positions.len()
    }
}

impl Default for ClassificationResult {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Rule-based chord matcher over a fixed rule table
pub struct ChordMatcher {
    rules: RuleTable,
}

impl ChordMatcher {
    pub fn new(rules: RuleTable) -> Self {
        ChordMatcher { rules }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Match a contact grid against the rule table
    ///
    /// Strings and frets are compared as two independently sorted lists, so a
    /// grid with the same multiset of strings and frets as a rule matches even
    /// if the individual pairings differ. Rules are tried in table order and
    /// the first hit wins.
    pub fn match_grid(&self, grid: &ContactGrid) -> ClassificationResult {
        let (string_positions, fret_positions): (Vec<usize>, Vec<usize>) = grid
            .active_positions()
            .map(|p| (p.string, p.fret))
            .unzip();

        let mut sorted_frets = fret_positions.clone();
        sorted_frets.sort_unstable();
        let mut sorted_strings = string_positions.clone();
        sorted_strings.sort_unstable();

        let chord_name = self
            .rules
            .positional()
            .find(|rule| rule.matches_sorted(&sorted_frets, &sorted_strings))
            .map(|rule| rule.name.clone())
            .unwrap_or_else(|| UNKNOWN_CHORD.to_string());

        ClassificationResult {
            chord_name,
            fret_positions,
            string_positions,
        }
    }
}

impl Default for ChordMatcher {
    fn default() -> Self {
        Self::new(RuleTable::builtin())
    }
}
