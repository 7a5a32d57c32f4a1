// Frame acquisition
// Reads sensor frames from a line-oriented device stream

use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::sensor::frame::{FrameError, SensorFrame, STRINGS};

/// Line the device prints before every full matrix dump
pub const FRAME_HEADER: &str = "Matrix updated:";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
}

/// Anything that can hand the classifier one frame per polling tick
pub trait FrameSource {
    /// Returns `Ok(None)` when no new frame is available this cycle
    fn next_frame(&mut self) -> Result<Option<SensorFrame>, SourceError>;
}

/// Serial device speaking the frame line protocol
pub type SerialFrameSource = LineFrameSource<BufReader<Box<dyn serialport::SerialPort>>>;

/// Open a serial device with a read timeout
///
/// A quiet device makes `next_frame` return `Ok(None)` once the timeout
/// expires instead of blocking the poller.
pub fn open_serial(path: &Path, baud_rate: u32, timeout: Duration) -> Result<SerialFrameSource, SourceError> {
    let port = serialport::new(path.to_string_lossy(), baud_rate)
        .timeout(timeout)
        .open()?;
    Ok(LineFrameSource::new(BufReader::new(port)))
}

enum Line {
    Text(String),
    Pending,
    End,
}

/// Frame source over the device's text protocol
///
/// The device writes a header line followed by one comma-separated row of
/// readings per string. Any other line is noise and means "no frame".
/// Undecodable bytes are dropped. A read timeout keeps the partial line and
/// rows, so the frame resumes on the next call.
pub struct LineFrameSource<R> {
    reader: R,
    line: Vec<u8>,
    rows: Option<Vec<Vec<f32>>>,
}

impl<R: BufRead> LineFrameSource<R> {
    pub fn new(reader: R) -> Self {
        LineFrameSource {
            reader,
            line: Vec::new(),
            rows: None,
        }
    }

    fn read_line(&mut self) -> Result<Line, SourceError> {
        match self.reader.read_until(b'\n', &mut self.line) {
            Ok(0) if self.line.is_empty() => Ok(Line::End),
            Ok(_) => {
                let text = String::from_utf8_lossy(&self.line).replace(char::REPLACEMENT_CHARACTER, "");
                self.line.clear();
                Ok(Line::Text(text))
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(Line::Pending),
            Err(e) => {
                self.line.clear();
                self.rows = None;
                Err(e.into())
            }
        }
    }

    fn parse_row(line: &str) -> Result<Vec<f32>, FrameError> {
        if line.is_empty() {
            return Ok(Vec::new());
        }
        line.split(',')
            .map(|cell| {
                let cell = cell.trim();
                cell.parse::<f32>()
                    .map_err(|e| FrameError::Parse(format!("'{}': {}", cell, e)))
            })
            .collect()
    }
}

impl<R: BufRead> FrameSource for LineFrameSource<R> {
    fn next_frame(&mut self) -> Result<Option<SensorFrame>, SourceError> {
        if self.rows.is_none() {
            match self.read_line()? {
                Line::Text(line) if line.contains(FRAME_HEADER) => {
                    self.rows = Some(Vec::with_capacity(STRINGS));
                }
                _ => return Ok(None),
            }
        }

        while self.rows.as_ref().map_or(0, Vec::len) < STRINGS {
            match self.read_line()? {
                Line::Pending => return Ok(None),
                Line::End => break,
                Line::Text(line) => match Self::parse_row(line.trim()) {
                    Ok(row) => self.rows.get_or_insert_with(Vec::new).push(row),
                    Err(e) => {
                        self.rows = None;
                        return Err(e.into());
                    }
                },
            }
        }

        let rows = self.rows.take().unwrap_or_default();
        let frame = SensorFrame::from_rows(&rows)?;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::frame::FRETS;
    use std::collections::VecDeque;
    use std::io::{Cursor, Read};

    fn row(value: f32) -> String {
        vec![format!("{:.1}", value); FRETS].join(",")
    }

    fn dump(rows: &[String]) -> String {
        let mut text = format!("{}\n", FRAME_HEADER);
        for r in rows {
            text.push_str(r);
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_reads_frame_after_header() {
        let mut rows: Vec<String> = (0..STRINGS).map(|_| row(3.0)).collect();
        rows[1] = {
            let mut cells = vec!["3.0".to_string(); FRETS];
            cells[1] = "0.4".to_string();
            cells.join(", ")
        };

        let mut source = LineFrameSource::new(Cursor::new(dump(&rows)));
        let frame = source.next_frame().unwrap().unwrap();

        assert_eq!(frame.get(1, 1), Some(0.4));
        assert_eq!(frame.get(0, 0), Some(3.0));
    }

    #[test]
    fn test_noise_line_is_no_frame() {
        let mut source = LineFrameSource::new(Cursor::new("boot ok\n"));
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_end_of_stream_is_no_frame() {
        let mut source = LineFrameSource::new(Cursor::new(""));
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_short_row_is_malformed() {
        let mut rows: Vec<String> = (0..STRINGS).map(|_| row(3.0)).collect();
        rows[3] = vec!["3.0"; FRETS - 2].join(",");

        let mut source = LineFrameSource::new(Cursor::new(dump(&rows)));
        let err = source.next_frame().unwrap_err();
        assert!(matches!(err, SourceError::Frame(FrameError::Malformed { .. })));
    }

    #[test]
    fn test_truncated_dump_is_malformed() {
        let rows: Vec<String> = (0..STRINGS - 2).map(|_| row(3.0)).collect();
        let mut source = LineFrameSource::new(Cursor::new(dump(&rows)));
        let err = source.next_frame().unwrap_err();
        assert!(matches!(err, SourceError::Frame(FrameError::Malformed { .. })));
    }

    #[test]
    fn test_garbage_cell_is_parse_error() {
        let mut rows: Vec<String> = (0..STRINGS).map(|_| row(3.0)).collect();
        rows[0] = format!("abc,{}", vec!["3.0"; FRETS - 1].join(","));

        let mut source = LineFrameSource::new(Cursor::new(dump(&rows)));
        let err = source.next_frame().unwrap_err();
        assert!(matches!(err, SourceError::Frame(FrameError::Parse(_))));
    }

    #[test]
    fn test_consecutive_frames() {
        let rows: Vec<String> = (0..STRINGS).map(|_| row(2.0)).collect();
        let text = format!("{}{}", dump(&rows), dump(&rows));
        let mut source = LineFrameSource::new(Cursor::new(text));

        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }

    /// Reader handing out scripted chunks and errors, then end of stream
    struct ScriptedReader(VecDeque<std::io::Result<Vec<u8>>>);

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.0.pop_front() {
                None => Ok(0),
                Some(Err(e)) => Err(e),
                Some(Ok(mut chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.0.push_front(Ok(chunk.split_off(n)));
                    }
                    Ok(n)
                }
            }
        }
    }

    fn timed_out() -> std::io::Result<Vec<u8>> {
        Err(std::io::Error::new(ErrorKind::TimedOut, "Operation timed out"))
    }

    #[test]
    fn test_quiet_device_is_no_frame() {
        let reader = ScriptedReader(VecDeque::from(vec![timed_out(), timed_out()]));
        let mut source = LineFrameSource::new(BufReader::new(reader));

        assert!(source.next_frame().unwrap().is_none());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_timeout_mid_frame_resumes() {
        let mut rows: Vec<String> = (0..STRINGS).map(|_| row(3.0)).collect();
        rows[4] = {
            let mut cells = vec!["3.0".to_string(); FRETS];
            cells[7] = "0.9".to_string();
            cells.join(",")
        };
        let text = dump(&rows);
        let split = text.find(&rows[4]).unwrap() + 5;

        let reader = ScriptedReader(VecDeque::from(vec![
            Ok(text.as_bytes()[..split].to_vec()),
            timed_out(),
            Ok(text.as_bytes()[split..].to_vec()),
        ]));
        let mut source = LineFrameSource::new(BufReader::new(reader));

        assert!(source.next_frame().unwrap().is_none());
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.get(4, 7), Some(0.9));
        assert_eq!(frame.get(2, 0), Some(3.0));
    }

    #[test]
    fn test_stray_byte_before_header_is_ignored() {
        let rows: Vec<String> = (0..STRINGS).map(|_| row(2.0)).collect();
        let mut bytes = vec![0xff];
        bytes.extend_from_slice(dump(&rows).as_bytes());

        let mut source = LineFrameSource::new(Cursor::new(bytes));
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.get(5, 10), Some(2.0));
    }

    #[test]
    fn test_stray_byte_inside_row_is_ignored() {
        let rows: Vec<String> = (0..STRINGS).map(|_| row(2.0)).collect();
        let mut bytes = dump(&rows).into_bytes();
        // Inside the first cell of the first row
        bytes.insert(FRAME_HEADER.len() + 3, 0xfe);

        let mut source = LineFrameSource::new(Cursor::new(bytes));
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.get(0, 0), Some(2.0));
    }

    #[test]
    fn test_missing_serial_device_fails() {
        let err = open_serial(
            Path::new("/dev/fretsense-missing-device"),
            250_000,
            Duration::from_millis(50),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SourceError::Serial(_)));
    }
}
