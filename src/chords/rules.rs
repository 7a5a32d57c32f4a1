// Chord rule table
// Ordered, load-time validated mapping from chord name to canonical contact positions

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::sensor::{FRETS, STRINGS};

/// Errors detected while loading a rule table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("Rule '{name}' is malformed: {frets} fret indices but {strings} string indices")]
    Malformed {
        name: String,
        frets: usize,
        strings: usize,
    },

    #[error("Rule '{name}' has position (string {string}, fret {fret}) outside the sensor grid")]
    OutOfRange {
        name: String,
        string: usize,
        fret: usize,
    },

    #[error("Rule '{name}' has only one of its fret/string lists")]
    PartialShape { name: String },

    #[error("Duplicate chord name: {0}")]
    DuplicateName(String),

    #[error("Rule table has no positional rules")]
    Empty,
}

/// A rule as written in configuration
///
/// Either both `fret` and `string` are given (a positional rule) or neither
/// is, in which case the entry is kept for display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fret: Option<Vec<usize>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<Vec<usize>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl RuleSpec {
    pub fn positional(name: &str, fret: &[usize], string: &[usize]) -> Self {
        RuleSpec {
            name: name.to_string(),
            fret: Some(fret.to_vec()),
            string: Some(string.to_vec()),
            notes: Vec::new(),
        }
    }
}

/// Canonical shape of a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleShape {
    /// Matchable rule; `frets[i]` pairs with `strings[i]`
    Positional {
        frets: Vec<usize>,
        strings: Vec<usize>,
        sorted_frets: Vec<usize>,
        sorted_strings: Vec<usize>,
    },

    /// Metadata-only rule, never matched
    Incomplete { notes: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordRule {
    pub name: String,
    pub shape: RuleShape,
}

impl ChordRule {
    fn from_spec(spec: RuleSpec) -> Result<Self, RuleError> {
        let shape = match (spec.fret, spec.string) {
            (Some(frets), Some(strings)) => {
                if frets.len() != strings.len() {
                    return Err(RuleError::Malformed {
                        name: spec.name,
                        frets: frets.len(),
                        strings: strings.len(),
                    });
                }

                if let Some((&string, &fret)) = strings
                    .iter()
                    .zip(frets.iter())
                    .find(|(s, f)| **s >= STRINGS || **f >= FRETS)
                {
                    return Err(RuleError::OutOfRange {
                        name: spec.name,
                        string,
                        fret,
                    });
                }

                let mut sorted_frets = frets.clone();
                sorted_frets.sort_unstable();
                let mut sorted_strings = strings.clone();
                sorted_strings.sort_unstable();

                RuleShape::Positional {
                    frets,
                    strings,
                    sorted_frets,
                    sorted_strings,
                }
            }
            (None, None) => RuleShape::Incomplete { notes: spec.notes },
            _ => return Err(RuleError::PartialShape { name: spec.name }),
        };

        Ok(ChordRule {
            name: spec.name,
            shape,
        })
    }

    pub fn is_positional(&self) -> bool {
        matches!(self.shape, RuleShape::Positional { .. })
    }

    /// Fret and string lists as declared, for positional rules
    pub fn positions(&self) -> Option<(&[usize], &[usize])> {
        match &self.shape {
            RuleShape::Positional { frets, strings, .. } => Some((frets.as_slice(), strings.as_slice())),
            RuleShape::Incomplete { .. } => None,
        }
    }

    /// Independent-axis comparison against already sorted observations
    pub fn matches_sorted(&self, sorted_frets: &[usize], sorted_strings: &[usize]) -> bool {
        match &self.shape {
            RuleShape::Positional {
                sorted_frets: rule_frets,
                sorted_strings: rule_strings,
                ..
            } => rule_frets == sorted_frets && rule_strings == sorted_strings,
            RuleShape::Incomplete { .. } => false,
        }
    }
}

/// Immutable, ordered rule table. Declaration order is the tie-break order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<ChordRule>,
}

impl RuleTable {
    /// Validate and build a table, failing on the first malformed rule
    pub fn from_specs(specs: Vec<RuleSpec>) -> Result<Self, RuleError> {
        let mut names = HashSet::new();
        let mut rules: Vec<ChordRule> = Vec::with_capacity(specs.len());

        for spec in specs {
            if !names.insert(spec.name.clone()) {
                return Err(RuleError::DuplicateName(spec.name));
            }

            let rule = ChordRule::from_spec(spec)?;

            if let RuleShape::Positional { sorted_frets, sorted_strings, .. } = &rule.shape {
                if let Some(earlier) = rules
                    .iter()
                    .find(|r| r.matches_sorted(sorted_frets, sorted_strings))
                {
                    log::warn!(
                        "Chord rule '{}' has the same shape as '{}' and will never match",
                        rule.name,
                        earlier.name
                    );
                }
            }

            rules.push(rule);
        }

        if !rules.iter().any(ChordRule::is_positional) {
            return Err(RuleError::Empty);
        }

        Ok(RuleTable { rules })
    }

    /// Built-in table for the reference fretboard
    pub fn builtin() -> Self {
        RuleTable::from_specs(builtin_specs())
            .expect("built-in chord rules are valid")
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChordRule> {
        self.rules.iter()
    }

    pub fn positional(&self) -> impl Iterator<Item = &ChordRule> {
        self.rules.iter().filter(|r| r.is_positional())
    }

    pub fn get(&self, name: &str) -> Option<&ChordRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Chord shapes for the reference fretboard, in tie-break order
pub fn builtin_specs() -> Vec<RuleSpec> {
    vec![
        RuleSpec::positional("A minor", &[1, 3, 3], &[1, 2, 3]),
        RuleSpec::positional("C major", &[1, 3, 5], &[1, 3, 4]),
        RuleSpec::positional("D major", &[3, 5, 3], &[0, 1, 3]),
        RuleSpec::positional("E minor", &[3, 3], &[3, 4]),
        RuleSpec::positional("G major", &[5, 3, 5], &[0, 4, 5]),
    ]
}
