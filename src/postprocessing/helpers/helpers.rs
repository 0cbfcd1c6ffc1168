use crate::constants::{CREPE_CENTS_OFFSET, CREPE_CENTS_PER_BIN};

use super::ported::numpy::arg_max;

/// Maximum bin jump the Viterbi transition model allows between frames.
const VITERBI_MAX_JUMP: usize = 12;
/// Probability that the observed argmax bin is the true pitch bin.
const VITERBI_SELF_EMISSION: f32 = 0.1;

/// Converts a pitch-salience bin to cents above 10 Hz.
pub fn bin_to_cents(bin: f32) -> f32 {
    CREPE_CENTS_OFFSET + CREPE_CENTS_PER_BIN * bin
}

/// Converts cents above 10 Hz to a frequency in Hz.
pub fn cents_to_frequency(cents: f32) -> f32 {
    10.0 * 2.0f32.powf(cents / 1200.0)
}

/// Weighted average of the cents around a salience bin.
///
/// # Arguments
///
/// * `salience` - One frame of pitch activations.
/// * `center` - The bin to average around, usually the argmax.
///
/// # Returns
///
/// * The salience-weighted mean of the cents in `center - 4..=center + 4`.
pub fn local_average_cents(salience: &[f32], center: usize) -> f32 {
    let start = center.saturating_sub(4);
    let end = (center + 5).min(salience.len());

    let (product_sum, weight_sum) = salience[start..end]
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(product, weight), (offset, &value)| {
            (product + value * bin_to_cents((start + offset) as f32), weight + value)
        });

    if weight_sum > 0.0 {
        product_sum / weight_sum
    } else {
        bin_to_cents(center as f32)
    }
}

/// Find the most likely pitch-bin path through a salience matrix.
///
/// The hidden states are the pitch bins. Transitions favour small jumps
/// (linearly decaying weight up to 12 bins) and the observation at each frame
/// is the argmax bin, emitted by the true bin with probability 0.1 and by any
/// bin uniformly otherwise.
///
/// # Arguments
///
/// * `salience` - Activation matrix (n_frames, n_bins).
///
/// # Returns
///
/// * One bin index per frame.
pub fn viterbi_decode(salience: &[Vec<f32>]) -> Vec<usize> {
    let n_frames = salience.len();
    if n_frames == 0 {
        return vec![];
    }
    let n_bins = salience[0].len();
    if n_bins == 0 {
        return vec![0; n_frames];
    }

    let observations: Vec<usize> = salience
        .iter()
        .map(|row| arg_max(row).unwrap_or(0))
        .collect();

    // Transition weights decay linearly with the jump and are normalised per
    // source row.
    let row_sums: Vec<f32> = (0..n_bins)
        .map(|from| {
            (from.saturating_sub(VITERBI_MAX_JUMP - 1)..(from + VITERBI_MAX_JUMP).min(n_bins))
                .map(|j| (VITERBI_MAX_JUMP - from.abs_diff(j)) as f32)
                .sum()
        })
        .collect();
    let log_transition = |from: usize, to: usize| -> f32 {
        let jump = from.abs_diff(to);
        if jump >= VITERBI_MAX_JUMP {
            return f32::NEG_INFINITY;
        }
        ((VITERBI_MAX_JUMP - jump) as f32 / row_sums[from]).ln()
    };

    let uniform = (1.0 - VITERBI_SELF_EMISSION) / n_bins as f32;
    let log_emission = |state: usize, observed: usize| -> f32 {
        if state == observed {
            (VITERBI_SELF_EMISSION + uniform).ln()
        } else {
            uniform.ln()
        }
    };

    let log_start = -(n_bins as f32).ln();
    let mut scores: Vec<f32> = (0..n_bins)
        .map(|state| log_start + log_emission(state, observations[0]))
        .collect();
    let mut backpointers: Vec<Vec<usize>> = Vec::with_capacity(n_frames);

    for &observed in &observations[1..] {
        let mut next_scores = vec![f32::NEG_INFINITY; n_bins];
        let mut pointers = vec![0; n_bins];

        for (to, (next_score, pointer)) in next_scores.iter_mut().zip(pointers.iter_mut()).enumerate() {
            let from_start = to.saturating_sub(VITERBI_MAX_JUMP - 1);
            let from_end = (to + VITERBI_MAX_JUMP).min(n_bins);
            for from in from_start..from_end {
                let candidate = scores[from] + log_transition(from, to);
                if candidate > *next_score {
                    *next_score = candidate;
                    *pointer = from;
                }
            }
            *next_score += log_emission(to, observed);
        }

        scores = next_scores;
        backpointers.push(pointers);
    }

    let mut state = arg_max(&scores).unwrap_or(0);
    let mut path = vec![state; n_frames];
    for (frame, pointers) in backpointers.iter().enumerate().rev() {
        state = pointers[state];
        path[frame] = state;
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_hot(n_bins: usize, bin: usize) -> Vec<f32> {
        let mut row = vec![0.01; n_bins];
        row[bin] = 0.9;
        row
    }

    #[test]
    fn cents_mapping_hits_reference_pitch() {
        // Bin 0 sits at ~31.7 Hz; every bin is 20 cents.
        let f0 = cents_to_frequency(bin_to_cents(0.0));
        assert!((f0 - 31.7).abs() < 0.1);
        let octave_up = cents_to_frequency(bin_to_cents(60.0));
        assert!((octave_up / f0 - 2.0).abs() < 1e-3);
    }

    #[test]
    fn local_average_is_pulled_towards_heavier_neighbour() {
        let mut salience = vec![0.0; 20];
        salience[10] = 1.0;
        salience[11] = 1.0;
        let cents = local_average_cents(&salience, 10);
        assert!((cents - bin_to_cents(10.5)).abs() < 1e-2);
    }

    #[test]
    fn viterbi_follows_a_smooth_path() {
        let salience: Vec<Vec<f32>> = [100, 101, 102, 103].iter().map(|&b| one_hot(360, b)).collect();
        assert_eq!(viterbi_decode(&salience), vec![100, 101, 102, 103]);
    }

    #[test]
    fn viterbi_smooths_over_a_single_outlier() {
        let bins = [100, 100, 100, 300, 100, 100, 100];
        let salience: Vec<Vec<f32>> = bins.iter().map(|&b| one_hot(360, b)).collect();
        let path = viterbi_decode(&salience);
        assert_eq!(path.len(), bins.len());
        assert!(path.iter().all(|&bin| bin.abs_diff(100) < VITERBI_MAX_JUMP * 2));
    }

    #[test]
    fn viterbi_handles_empty_input() {
        assert!(viterbi_decode(&[]).is_empty());
    }
}
