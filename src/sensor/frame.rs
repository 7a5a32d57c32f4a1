// Sensor frame types
// Fixed-shape grid of raw readings, one per (string, fret) intersection

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of strings on the instrument (grid rows)
pub const STRINGS: usize = 6;

/// Number of sensed frets per string (grid columns)
pub const FRETS: usize = 11;

/// Errors raised while turning raw readings into a frame
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("Malformed frame: expected {expected_strings}x{expected_frets}, found {found}")]
    Malformed {
        expected_strings: usize,
        expected_frets: usize,
        found: String,
    },

    #[error("Failed to parse reading: {0}")]
    Parse(String),
}

impl FrameError {
    fn malformed(rows: &[Vec<f32>]) -> Self {
        let widths: Vec<String> = rows.iter().map(|row| row.len().to_string()).collect();
        FrameError::Malformed {
            expected_strings: STRINGS,
            expected_frets: FRETS,
            found: format!("{} rows with widths [{}]", rows.len(), widths.join(", ")),
        }
    }
}

/// A single contact point on the fretboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// String index, 0-based
    pub string: usize,

    /// Fret index, 0-based
    pub fret: usize,
}

impl Position {
    pub fn new(string: usize, fret: usize) -> Self {
        Position { string, fret }
    }

    /// Check that the position lies inside the sensor grid
    pub fn in_bounds(&self) -> bool {
        self.string < STRINGS && self.fret < FRETS
    }
}

/// One snapshot of every string/fret sensor cell
///
/// The shape is fixed by the type; anything else is rejected in
/// [`SensorFrame::from_rows`] rather than padded or truncated.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorFrame {
    readings: [[f32; FRETS]; STRINGS],
}

impl SensorFrame {
    pub fn new(readings: [[f32; FRETS]; STRINGS]) -> Self {
        SensorFrame { readings }
    }

    /// Frame with every cell set to the same reading
    pub fn filled(value: f32) -> Self {
        Self::new([[value; FRETS]; STRINGS])
    }

    /// Build a frame from dynamically sized rows, rejecting any other shape
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self, FrameError> {
        if rows.len() != STRINGS || rows.iter().any(|row| row.len() != FRETS) {
            return Err(FrameError::malformed(rows));
        }

        let mut readings = [[0.0; FRETS]; STRINGS];
        for (string, row) in rows.iter().enumerate() {
            readings[string].copy_from_slice(row);
        }

        Ok(Self::new(readings))
    }

    /// Reading at a given cell
    pub fn get(&self, string: usize, fret: usize) -> Option<f32> {
        self.readings.get(string)?.get(fret).copied()
    }

    /// Overwrite a single cell (used when building test and calibration frames)
    pub fn set(&mut self, position: Position, value: f32) {
        if position.in_bounds() {
            self.readings[position.string][position.fret] = value;
        }
    }

    /// Row-major view of the readings
    pub fn rows(&self) -> &[[f32; FRETS]; STRINGS] {
        &self.readings
    }
}
