// Chord classification module
// Contact detection, rule table, matching, and the cached classification service

pub mod binarize;
pub mod matcher;
pub mod rules;
pub mod service;

pub use binarize::{binarize, Comparison, ContactGrid, ThresholdPolicy};
pub use matcher::{ChordMatcher, ClassificationResult, UNKNOWN_CHORD};
pub use rules::{builtin_specs, ChordRule, RuleError, RuleShape, RuleSpec, RuleTable};
pub use service::{ClassificationService, ClassifyOutcome};
