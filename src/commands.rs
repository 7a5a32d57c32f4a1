// API commands
// Request/response shapes and the operations exposed to the frontend

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::chords::{ChordRule, ClassificationResult, ClassificationService};

#[derive(Debug, Serialize)]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl<E: std::fmt::Display> From<E> for CommandError {
    fn from(error: E) -> Self {
        CommandError {
            message: error.to_string(),
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

// ==================== SENSOR COMMANDS ====================

/// Optional body of a classification request
#[derive(Debug, Deserialize)]
pub struct ProcessSensorInput {
    /// Raw readings, one row per string
    #[serde(default)]
    pub readings: Option<Vec<Vec<f32>>>,
}

/// Classification answer as the frontend consumes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordResponse {
    #[serde(flatten)]
    pub result: ClassificationResult,

    /// Present when submitted readings were rejected and the cached answer was returned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Parse a request body; an empty body means "no new frame"
pub fn parse_sensor_input(body: &[u8]) -> CommandResult<Option<ProcessSensorInput>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let input: ProcessSensorInput = serde_json::from_slice(body).map_err(|e| CommandError {
        message: format!("Invalid sensor payload: {}", e),
    })?;

    Ok(Some(input))
}

/// Classify submitted readings, or return the last known chord
pub fn process_sensor(
    service: &ClassificationService,
    input: Option<ProcessSensorInput>,
) -> ChordResponse {
    let readings = input.and_then(|i| i.readings);
    let outcome = service.classify_rows(readings.as_deref());

    ChordResponse {
        result: outcome.result,
        warning: outcome.rejected.map(|e| e.to_string()),
    }
}

// ==================== CHORD RULE COMMANDS ====================

/// One positional rule as the frontend consumes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordShape {
    pub fret_positions: Vec<usize>,
    pub string_positions: Vec<usize>,
}

/// Ordered `name -> shape` view of the positional rules
#[derive(Debug, Clone, PartialEq)]
pub struct ChordShapeMap(pub Vec<(String, ChordShape)>);

impl Serialize for ChordShapeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, shape) in &self.0 {
            map.serialize_entry(name, shape)?;
        }
        map.end()
    }
}

fn shape_of(rule: &ChordRule) -> Option<ChordShape> {
    let (frets, strings) = rule.positions()?;
    Some(ChordShape {
        fret_positions: frets.to_vec(),
        string_positions: strings.to_vec(),
    })
}

/// All matchable chord rules in table order
pub fn list_chord_rules(service: &ClassificationService) -> ChordShapeMap {
    let shapes = service
        .rules()
        .positional()
        .filter_map(|rule| Some((rule.name.clone(), shape_of(rule)?)))
        .collect();
    ChordShapeMap(shapes)
}

/// Shape of a single chord, if it is a matchable rule
pub fn get_chord_rule(service: &ClassificationService, name: &str) -> CommandResult<Option<ChordShape>> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CommandError {
            message: "Chord name must not be empty".to_string(),
        });
    }
    Ok(service.rules().get(name).and_then(shape_of))
}
