// Contact detection
// Turns raw sensor readings into a boolean contact grid with one threshold comparison

use serde::{Deserialize, Serialize};

use crate::sensor::{Position, SensorFrame, FRETS, STRINGS};

/// Direction of the threshold comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Contact when reading <= threshold (signal drops on contact)
    AtMost,

    /// Contact when reading >= threshold (signal rises on contact)
    AtLeast,
}

/// Threshold policy applied to every cell of a frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    pub comparison: Comparison,
    pub value: f32,
}

impl ThresholdPolicy {
    pub fn at_most(value: f32) -> Self {
        ThresholdPolicy {
            comparison: Comparison::AtMost,
            value,
        }
    }

    pub fn at_least(value: f32) -> Self {
        ThresholdPolicy {
            comparison: Comparison::AtLeast,
            value,
        }
    }

    /// Whether a single reading counts as contact
    pub fn is_contact(&self, reading: f32) -> bool {
        match self.comparison {
            Comparison::AtMost => reading <= self.value,
            Comparison::AtLeast => reading >= self.value,
        }
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        // Observed hardware reads ~3.0 idle and drops below 1.5 when pressed
        ThresholdPolicy::at_most(1.5)
    }
}

/// Same-shape boolean grid of contacts, scoped to one classification call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactGrid {
    cells: [[bool; FRETS]; STRINGS],
}

impl ContactGrid {
    pub fn new(cells: [[bool; FRETS]; STRINGS]) -> Self {
        ContactGrid { cells }
    }

    /// Grid with contacts at exactly the given positions
    pub fn from_positions(positions: &[Position]) -> Self {
        let mut cells = [[false; FRETS]; STRINGS];
        for p in positions.iter().filter(|p| p.in_bounds()) {
            cells[p.string][p.fret] = true;
        }
        Self::new(cells)
    }

    pub fn is_active(&self, string: usize, fret: usize) -> bool {
        self.cells
            .get(string)
            .and_then(|row| row.get(fret))
            .copied()
            .unwrap_or(false)
    }

    /// Active positions in scan order: string-major, fret-minor
    pub fn active_positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.cells.iter().enumerate().flat_map(|(string, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, active)| **active)
                .map(move |(fret, _)| Position::new(string, fret))
        })
    }

    pub fn active_count(&self) -> usize {
        self.cells.iter().flatten().filter(|active| **active).count()
    }
}

/// Apply the threshold policy to every cell of a validated frame
pub fn binarize(frame: &SensorFrame, policy: &ThresholdPolicy) -> ContactGrid {
    let mut cells = [[false; FRETS]; STRINGS];
    for (string, row) in frame.rows().iter().enumerate() {
        for (fret, reading) in row.iter().enumerate() {
            cells[string][fret] = policy.is_contact(*reading);
        }
    }
    ContactGrid::new(cells)
}
