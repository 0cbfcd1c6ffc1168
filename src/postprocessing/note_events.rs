use std::cmp::Ordering;

/// A transcribed note, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub pitch: u8,
    pub start: f32,
    pub end: f32,
    pub velocity: u8,
}

impl NoteEvent {
    pub fn duration(&self) -> f32 {
        self.end - self.start
    }
}

/// Clamp a fractional MIDI pitch to a valid key.
pub fn midi_key(pitch: f32) -> u8 {
    pitch.round().clamp(0.0, 127.0) as u8
}

/// Clamp a velocity to the audible MIDI range 1-127.
pub fn midi_velocity(velocity: f32) -> u8 {
    velocity.floor().clamp(1.0, 127.0) as u8
}

/// Sort notes by start time, then pitch, so emission order does not depend on
/// the order the segmenter produced them in.
pub fn sort_notes(notes: &mut [NoteEvent]) {
    notes.sort_by(|a, b| {
        a.start
            .partial_cmp(&b.start)
            .unwrap_or(Ordering::Equal)
            .then(a.pitch.cmp(&b.pitch))
    });
}
