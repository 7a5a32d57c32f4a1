// Sensor module
// Frame shape, contact positions, and frame acquisition

pub mod frame;
pub mod source;

pub use frame::{FrameError, Position, SensorFrame, FRETS, STRINGS};
pub use source::{open_serial, FrameSource, LineFrameSource, SerialFrameSource, SourceError, FRAME_HEADER};
