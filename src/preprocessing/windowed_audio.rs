/// Zero-pad a signal by half a frame on each side so frame `i` is centered on
/// sample `i * hop`.
pub fn pad_center(audio: &[f32], frame_length: usize) -> Vec<f32> {
    let pad = frame_length / 2;
    let mut padded = vec![0.0; audio.len() + 2 * pad];
    padded[pad..pad + audio.len()].copy_from_slice(audio);
    padded
}

/// Number of centered frames for a signal of `len` samples.
pub fn n_centered_frames(len: usize, hop_size: usize) -> usize {
    1 + len / hop_size
}

/// Fixed-length frames taken every `hop_size` samples.
pub struct WindowedAudio<'a> {
    audio: &'a [f32],
    frame_length: usize,
    hop_size: usize,
    index: usize,
}

impl<'a> Iterator for WindowedAudio<'a> {
    type Item = &'a [f32];

    fn next(&mut self) -> Option<Self::Item> {
        let end_index = self.index + self.frame_length;
        if end_index > self.audio.len() {
            return None;
        }

        let window = &self.audio[self.index..end_index];
        self.index += self.hop_size;
        Some(window)
    }
}

/// Iterate over the frames of an (already padded) signal. Trailing samples
/// that do not fill a whole frame are not yielded.
pub fn window_audio_file(audio: &[f32], frame_length: usize, hop_size: usize) -> WindowedAudio<'_> {
    WindowedAudio {
        audio,
        frame_length,
        hop_size: hop_size.max(1),
        index: 0,
    }
}
