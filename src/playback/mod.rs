// Playback module
// Chord sound lookup and playback for detected chords

pub mod keys;
pub mod player;

pub use keys::{chord_for_key, run_keys, KEY_CHORDS};
pub use player::{candidate_filenames, resolve_audio_file, ChordPlayer, PlaybackError};
