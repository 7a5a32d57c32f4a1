// Classification service
// Binarize -> match -> cache, with the last result served when no frame arrives

use std::sync::{Mutex, MutexGuard};

use crate::chords::binarize::{binarize, ThresholdPolicy};
use crate::chords::matcher::{ChordMatcher, ClassificationResult};
use crate::chords::rules::RuleTable;
use crate::sensor::{FrameError, SensorFrame};

/// Result of classifying raw, not yet validated readings
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyOutcome {
    pub result: ClassificationResult,

    /// Set when the submitted readings were rejected and the cached answer was served
    pub rejected: Option<FrameError>,
}

/// Sole entry point for turning sensor frames into chords
///
/// Owns the cache slot holding the last result produced from a real frame.
/// The slot is read and written under one lock so the poller and the HTTP
/// handlers can share a single service.
pub struct ClassificationService {
    matcher: ChordMatcher,
    policy: ThresholdPolicy,
    last: Mutex<ClassificationResult>,
}

impl ClassificationService {
    pub fn new(rules: RuleTable, policy: ThresholdPolicy) -> Self {
        ClassificationService {
            matcher: ChordMatcher::new(rules),
            policy,
            last: Mutex::new(ClassificationResult::unknown()),
        }
    }

    /// Classify a frame, or return the cached result when there is none
    pub fn classify(&self, frame: Option<&SensorFrame>) -> ClassificationResult {
        let mut last = self.lock();

        match frame {
            Some(frame) => {
                let grid = binarize(frame, &self.policy);
                let result = self.matcher.match_grid(&grid);
                *last = result.clone();
                result
            }
            None => last.clone(),
        }
    }

    /// Validate raw rows, then classify; malformed input degrades to the cache
    pub fn classify_rows(&self, rows: Option<&[Vec<f32>]>) -> ClassifyOutcome {
        let frame = match rows.map(SensorFrame::from_rows).transpose() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Rejected sensor frame: {}", e);
                return ClassifyOutcome {
                    result: self.classify(None),
                    rejected: Some(e),
                };
            }
        };

        ClassifyOutcome {
            result: self.classify(frame.as_ref()),
            rejected: None,
        }
    }

    /// Cached result without classifying anything
    pub fn current(&self) -> ClassificationResult {
        self.classify(None)
    }

    pub fn rules(&self) -> &RuleTable {
        self.matcher.rules()
    }

    pub fn policy(&self) -> ThresholdPolicy {
        self.policy
    }

    fn lock(&self) -> MutexGuard<'_, ClassificationResult> {
        // Slot always holds a complete result, even after a panic elsewhere
        self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ClassificationService {
    fn default() -> Self {
        Self::new(RuleTable::builtin(), ThresholdPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chords::matcher::UNKNOWN_CHORD;
    use crate::sensor::{Position, FRETS, STRINGS};
    use std::sync::Arc;
    use std::thread;

    const IDLE: f32 = 3.0;
    const PRESSED: f32 = 0.4;

    fn frame(positions: &[(usize, usize)]) -> SensorFrame {
        let mut frame = SensorFrame::filled(IDLE);
        for (string, fret) in positions {
            frame.set(Position::new(*string, *fret), PRESSED);
        }
        frame
    }

    fn c_major() -> SensorFrame {
        frame(&[(1, 1), (3, 3), (4, 5)])
    }

    #[test]
    fn test_baseline_before_any_frame() {
        let service = ClassificationService::default();
        let result = service.classify(None);

        assert_eq!(result.chord_name, UNKNOWN_CHORD);
        assert!(result.fret_positions.is_empty());
        assert!(result.string_positions.is_empty());
    }

    #[test]
    fn test_classify_then_fallback_returns_same_result() {
        let service = ClassificationService::default();
        let fresh = service.classify(Some(&c_major()));

        assert_eq!(fresh.chord_name, "C major");
        assert_eq!(fresh.fret_positions, vec![1, 3, 5]);
        assert_eq!(fresh.string_positions, vec![1, 3, 4]);

        assert_eq!(service.classify(None), fresh);
        assert_eq!(service.classify(None), fresh);
    }

    #[test]
    fn test_unknown_frame_overwrites_cache() {
        let service = ClassificationService::default();
        service.classify(Some(&c_major()));
        let unknown = service.classify(Some(&frame(&[(0, 0)])));

        assert!(unknown.is_unknown());
        assert_eq!(service.current(), unknown);
    }

    #[test]
    fn test_malformed_rows_keep_cache() {
        let service = ClassificationService::default();
        let fresh = service.classify(Some(&c_major()));

        let short = vec![vec![IDLE; FRETS]; STRINGS - 1];
        let outcome = service.classify_rows(Some(short.as_slice()));

        assert_eq!(outcome.result, fresh);
        assert!(matches!(outcome.rejected, Some(FrameError::Malformed { .. })));
        assert_eq!(service.current(), fresh);
    }

    #[test]
    fn test_valid_rows_classify() {
        let service = ClassificationService::default();
        let mut rows = vec![vec![IDLE; FRETS]; STRINGS];
        rows[3][3] = PRESSED;
        rows[4][3] = PRESSED;

        let outcome = service.classify_rows(Some(rows.as_slice()));
        assert!(outcome.rejected.is_none());
        assert_eq!(outcome.result.chord_name, "E minor");
    }

    #[test]
    fn test_absent_rows_return_cache() {
        let service = ClassificationService::default();
        let fresh = service.classify(Some(&c_major()));

        let outcome = service.classify_rows(None);
        assert_eq!(outcome.result, fresh);
        assert!(outcome.rejected.is_none());
    }

    #[test]
    fn test_threshold_policy_is_applied() {
        let service = ClassificationService::new(RuleTable::builtin(), ThresholdPolicy::at_least(2.0));
        assert_eq!(service.policy(), ThresholdPolicy::at_least(2.0));

        // With an inverted policy, idle readings at 3.0 are all contacts
        let result = service.classify(Some(&SensorFrame::filled(IDLE)));
        assert!(result.is_unknown());
        assert_eq!(result.contact_count(), STRINGS * FRETS);
    }

    #[test]
    fn test_shared_across_threads() {
        let service = Arc::new(ClassificationService::default());

        let writer = {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                for _ in 0..50 {
                    service.classify(Some(&c_major()));
                }
            })
        };

        for _ in 0..50 {
            let seen = service.classify(None);
            assert_eq!(seen.fret_positions.len(), seen.string_positions.len());
        }

        writer.join().unwrap();
        assert_eq!(service.current().chord_name, "C major");
    }
}
