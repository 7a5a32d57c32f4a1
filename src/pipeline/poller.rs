// Frame polling loop
// Reads one frame per tick, classifies it, and triggers playback on chord changes

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::chords::{ClassificationResult, ClassificationService};
use crate::playback::ChordPlayer;
use crate::sensor::{FrameSource, SourceError};

/// Settings for the background polling thread
#[derive(Debug, Clone)]
pub struct PollerSettings {
    /// Pause between ticks
    pub interval: Duration,

    /// Folder of chord sounds; `None` disables playback
    pub audio_folder: Option<PathBuf>,
}

impl Default for PollerSettings {
    fn default() -> Self {
        PollerSettings {
            interval: Duration::from_millis(100),
            audio_folder: None,
        }
    }
}

/// One polling loop over a frame source
pub struct PollLoop<S> {
    source: S,
    service: Arc<ClassificationService>,
    player: Option<ChordPlayer>,
    last_chord: Option<String>,
}

impl<S: FrameSource> PollLoop<S> {
    pub fn new(source: S, service: Arc<ClassificationService>, player: Option<ChordPlayer>) -> Self {
        PollLoop {
            source,
            service,
            player,
            last_chord: None,
        }
    }

    /// Read at most one frame and classify it (or serve the cache)
    pub fn tick(&mut self) -> ClassificationResult {
        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(SourceError::Frame(e)) => {
                log::warn!("Rejected sensor frame: {}", e);
                None
            }
            Err(SourceError::Io(e)) => {
                log::warn!("Sensor read error: {}", e);
                None
            }
            Err(SourceError::Serial(e)) => {
                log::warn!("Serial port error: {}", e);
                None
            }
        };

        let result = self.service.classify(frame.as_ref());

        if self.last_chord.as_deref() != Some(result.chord_name.as_str()) {
            log::info!(
                "Chord changed: {} (frets {:?}, strings {:?})",
                result.chord_name,
                result.fret_positions,
                result.string_positions
            );
            self.on_chord_change(&result);
            self.last_chord = Some(result.chord_name.clone());
        }

        result
    }

    /// Chord reported by the previous tick
    pub fn last_chord(&self) -> Option<&str> {
        self.last_chord.as_deref()
    }

    fn on_chord_change(&mut self, result: &ClassificationResult) {
        let Some(player) = self.player.as_mut() else {
            return;
        };

        if result.is_unknown() {
            return;
        }

        if let Err(e) = player.play(&result.chord_name) {
            log::warn!("Playback failed: {}", e);
        }
    }

    /// Tick until `stop` is raised
    pub fn run(&mut self, interval: Duration, stop: &AtomicBool) {
        while !stop.load(Ordering::SeqCst) {
            self.tick();
            thread::sleep(interval);
        }

        if let Some(player) = self.player.as_mut() {
            player.stop();
        }
    }
}

/// Handle to a polling loop running on its own thread
pub struct Poller {
    stop_signal: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Start polling `source` on a dedicated thread
    pub fn spawn<S>(source: S, service: Arc<ClassificationService>, settings: PollerSettings) -> Self
    where
        S: FrameSource + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_signal);

        let handle = thread::spawn(move || {
            // Audio output handles are not Send, so the player lives on this thread
            let player = settings.audio_folder.map(ChordPlayer::new);
            let mut poll_loop = PollLoop::new(source, service, player);
            poll_loop.run(settings.interval, &stop);
            log::info!("Frame poller stopped");
        });

        Poller {
            stop_signal,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Ask the loop to stop after its current tick, without waiting
    pub fn request_stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Signal the loop to stop and wait for it
    pub fn stop(mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Frame poller thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{FrameError, LineFrameSource, SensorFrame, FRAME_HEADER, FRETS, STRINGS};
    use std::collections::VecDeque;
    use std::io::Cursor;

    /// Scripted source returning queued answers, then "no frame"
    struct ScriptedSource(VecDeque<Result<Option<SensorFrame>, SourceError>>);

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<SensorFrame>, SourceError> {
            self.0.pop_front().unwrap_or(Ok(None))
        }
    }

    fn dump(pressed: &[(usize, usize)]) -> String {
        let mut text = format!("{}\n", FRAME_HEADER);
        for string in 0..STRINGS {
            let row: Vec<&str> = (0..FRETS)
                .map(|fret| if pressed.contains(&(string, fret)) { "0.3" } else { "3.1" })
                .collect();
            text.push_str(&row.join(","));
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_tick_classifies_then_serves_cache() {
        let text = format!("noise\n{}", dump(&[(3, 3), (4, 3)]));
        let service = Arc::new(ClassificationService::default());
        let mut poll_loop = PollLoop::new(LineFrameSource::new(Cursor::new(text)), Arc::clone(&service), None);

        // Noise line: nothing classified yet
        assert!(poll_loop.tick().is_unknown());
        assert_eq!(poll_loop.last_chord(), Some("Unknown"));

        let fresh = poll_loop.tick();
        assert_eq!(fresh.chord_name, "E minor");
        assert_eq!(poll_loop.last_chord(), Some("E minor"));

        // End of stream: cached answer
        assert_eq!(poll_loop.tick(), fresh);
        assert_eq!(service.current(), fresh);
    }

    #[test]
    fn test_rejected_frame_keeps_previous_result() {
        let text = format!("{}{}\n1,2,3\n", dump(&[(1, 1), (2, 3), (3, 3)]), FRAME_HEADER);
        let service = Arc::new(ClassificationService::default());
        let mut poll_loop = PollLoop::new(LineFrameSource::new(Cursor::new(text)), service, None);

        let fresh = poll_loop.tick();
        assert_eq!(fresh.chord_name, "A minor");
        assert_eq!(poll_loop.tick(), fresh);
    }

    #[test]
    fn test_io_error_is_no_frame() {
        let source = ScriptedSource(VecDeque::from(vec![
            Err(SourceError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout"))),
            Err(SourceError::Frame(FrameError::Parse("x".to_string()))),
        ]));
        let mut poll_loop = PollLoop::new(source, Arc::new(ClassificationService::default()), None);

        assert!(poll_loop.tick().is_unknown());
        assert!(poll_loop.tick().is_unknown());
    }

    #[test]
    fn test_missing_audio_does_not_break_loop() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let text = dump(&[(3, 3), (4, 3)]);
        let player = ChordPlayer::new(temp_dir.path());
        let mut poll_loop = PollLoop::new(
            LineFrameSource::new(Cursor::new(text)),
            Arc::new(ClassificationService::default()),
            Some(player),
        );

        assert_eq!(poll_loop.tick().chord_name, "E minor");
    }

    /// Device that never sends anything before its read timeout
    struct QuietDevice;

    impl std::io::Read for QuietDevice {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            thread::sleep(Duration::from_millis(2));
            Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "Operation timed out"))
        }
    }

    #[test]
    fn test_quiet_device_serves_cache_and_stops() {
        let service = Arc::new(ClassificationService::default());
        let mut poll_loop = PollLoop::new(
            LineFrameSource::new(std::io::BufReader::new(QuietDevice)),
            Arc::clone(&service),
            None,
        );
        assert!(poll_loop.tick().is_unknown());

        let settings = PollerSettings {
            interval: Duration::from_millis(5),
            audio_folder: None,
        };
        let poller = Poller::spawn(
            LineFrameSource::new(std::io::BufReader::new(QuietDevice)),
            service,
            settings,
        );
        thread::sleep(Duration::from_millis(20));
        assert!(poller.is_running());

        // Joins only because reads come back after the timeout
        poller.stop();
    }

    #[test]
    fn test_spawned_poller_stops() {
        let service = Arc::new(ClassificationService::default());
        let source = ScriptedSource(VecDeque::new());
        let settings = PollerSettings {
            interval: Duration::from_millis(5),
            audio_folder: None,
        };

        let poller = Poller::spawn(source, Arc::clone(&service), settings);
        thread::sleep(Duration::from_millis(20));
        assert!(poller.is_running());
        poller.stop();

        assert!(service.current().is_unknown());
    }
}
