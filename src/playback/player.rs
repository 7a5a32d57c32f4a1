// Chord audio playback
// Resolves a chord name to an audio file and plays it without blocking

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("No audio file for chord '{chord}', tried: {tried:?}")]
    NotFound { chord: String, tried: Vec<String> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio output unavailable: {0}")]
    Output(String),

    #[error("Failed to decode audio: {0}")]
    Decode(String),
}

/// Candidate file names for a chord, in lookup order
pub fn candidate_filenames(chord: &str) -> Vec<String> {
    let lower = chord.to_lowercase();
    vec![
        format!("{}.mp3", lower),
        format!("{} chord.mp3", lower),
        format!("{} chord.mp3", capitalize(chord)),
        format!("{} chord.mp3", chord),
    ]
}

/// First uppercase, rest lowercase
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Find the audio file for a chord inside `folder`
pub fn resolve_audio_file(folder: &Path, chord: &str) -> Result<PathBuf, PlaybackError> {
    let candidates = candidate_filenames(chord);

    candidates
        .iter()
        .map(|name| folder.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| PlaybackError::NotFound {
            chord: chord.to_string(),
            tried: candidates.clone(),
        })
}

#[cfg(feature = "playback")]
struct AudioOutput {
    // Dropping the stream silences the sink
    _stream: rodio::OutputStream,
    sink: rodio::Sink,
}

#[cfg(feature = "playback")]
impl AudioOutput {
    fn open() -> Result<Self, PlaybackError> {
        let (stream, handle) = rodio::OutputStream::try_default()
            .map_err(|e| PlaybackError::Output(e.to_string()))?;
        let sink = rodio::Sink::try_new(&handle).map_err(|e| PlaybackError::Output(e.to_string()))?;
        Ok(AudioOutput {
            _stream: stream,
            sink,
        })
    }

    fn play(&mut self, path: &Path) -> Result<(), PlaybackError> {
        let file = std::fs::File::open(path)?;
        let source = rodio::Decoder::new(std::io::BufReader::new(file))
            .map_err(|e| PlaybackError::Decode(e.to_string()))?;

        // Cut the previous chord off
        self.sink.clear();
        self.sink.append(source);
        self.sink.play();
        Ok(())
    }

    fn stop(&mut self) {
        self.sink.stop();
    }

    fn wait(&self) {
        self.sink.sleep_until_end();
    }
}

/// Plays chord sounds from a folder of audio files
///
/// Without the `playback` feature the player only logs what it would play.
/// Must stay on the thread that created it when audio output is enabled.
pub struct ChordPlayer {
    audio_folder: PathBuf,
    #[cfg(feature = "playback")]
    output: Option<AudioOutput>,
}

impl ChordPlayer {
    pub fn new(audio_folder: impl Into<PathBuf>) -> Self {
        ChordPlayer {
            audio_folder: audio_folder.into(),
            #[cfg(feature = "playback")]
            output: None,
        }
    }

    pub fn audio_folder(&self) -> &Path {
        &self.audio_folder
    }

    /// Start playing a chord, replacing whatever is playing
    pub fn play(&mut self, chord: &str) -> Result<PathBuf, PlaybackError> {
        let path = resolve_audio_file(&self.audio_folder, chord)?;
        self.play_file(&path)?;
        log::info!("Playing: {}", chord);
        Ok(path)
    }

    /// Play a chord and return once it has finished
    pub fn play_blocking(&mut self, chord: &str) -> Result<PathBuf, PlaybackError> {
        let path = self.play(chord)?;
        self.wait_until_end();
        Ok(path)
    }

    #[cfg(feature = "playback")]
    fn wait_until_end(&self) {
        if let Some(output) = self.output.as_ref() {
            output.wait();
        }
    }

    #[cfg(not(feature = "playback"))]
    fn wait_until_end(&self) {}

    #[cfg(feature = "playback")]
    fn play_file(&mut self, path: &Path) -> Result<(), PlaybackError> {
        if self.output.is_none() {
            self.output = Some(AudioOutput::open()?);
        }
        match self.output.as_mut() {
            Some(output) => output.play(path),
            None => Err(PlaybackError::Output("no output stream".to_string())),
        }
    }

    #[cfg(not(feature = "playback"))]
    fn play_file(&mut self, path: &Path) -> Result<(), PlaybackError> {
        log::info!("Would play: {} (audio output disabled)", path.display());
        Ok(())
    }

    /// Stop the current sound, if any
    #[cfg(feature = "playback")]
    pub fn stop(&mut self) {
        if let Some(output) = self.output.as_mut() {
            output.stop();
        }
    }

    /// Stop the current sound, if any
    #[cfg(not(feature = "playback"))]
    pub fn stop(&mut self) {}
}
