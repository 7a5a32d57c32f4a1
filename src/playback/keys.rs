// Keyboard chord harness
// Plays chord sounds from typed keys to check the audio folder without a sensor

use std::io::BufRead;

use crate::playback::player::ChordPlayer;

/// Escape ends the session
pub const QUIT_KEY: char = '\u{1b}';

/// Key to chord name, in the order shown to the user
pub const KEY_CHORDS: &[(char, &str)] = &[
    ('a', "Am"),
    ('e', "Em"),
    ('g', "g"),
    ('f', "f"),
    ('b', "Bm"),
    ('c', "c"),
    ('q', "a"),
];

/// Chord bound to a key, ignoring case
pub fn chord_for_key(key: char) -> Option<&'static str> {
    let key = key.to_ascii_lowercase();
    KEY_CHORDS
        .iter()
        .find(|(bound, _)| *bound == key)
        .map(|(_, chord)| *chord)
}

/// Play chords for every mapped key read from `input`
///
/// Stops at the escape key or end of input. Returns the chords that were
/// triggered, whether or not a sound could be played for them.
pub fn run_keys<R: BufRead>(input: R, player: &mut ChordPlayer) -> std::io::Result<Vec<&'static str>> {
    let mut triggered = Vec::new();

    for line in input.lines() {
        for key in line?.chars() {
            if key == QUIT_KEY {
                return Ok(triggered);
            }
            let Some(chord) = chord_for_key(key) else {
                continue;
            };

            if let Err(e) = player.play(chord) {
                log::warn!("{}", e);
            }
            triggered.push(chord);
        }
    }

    Ok(triggered)
}
