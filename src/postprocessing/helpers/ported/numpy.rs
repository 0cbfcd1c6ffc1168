/* PORTED NUMPY FUNCTIONS */

use std::cmp::Ordering;

/// Returns the location of the maximum element in the array.
///
/// # Arguments
///
/// * `arr` - Input array.
///
/// # Returns
///
/// * The location of the maximum element in the array (the first one on
///   ties), or `None` if the array is empty.
pub fn arg_max(arr: &[f32]) -> Option<usize> {
    arr.iter()
        .enumerate()
        .reduce(|(max_index, max_value), (current_index, current_value)| {
            if current_value > max_value {
                (current_index, current_value)
            } else {
                (max_index, max_value)
            }
        })
        .map(|(index, _)| index)
}

/// Returns the maximum element of the array, or 0 for an empty array.
pub fn max_value(arr: &[f32]) -> f32 {
    arr.iter().copied().fold(0.0, f32::max)
}

/// Returns the minimum element of the array, or 0 for an empty array.
pub fn min_value(arr: &[f32]) -> f32 {
    arr.iter().copied().reduce(f32::min).unwrap_or(0.0)
}

/// Root mean square of the array, 0 for an empty array.
pub fn rms(arr: &[f32]) -> f32 {
    if arr.is_empty() {
        return 0.0;
    }
    (arr.iter().map(|&v| v * v).sum::<f32>() / arr.len() as f32).sqrt()
}

/// Median of a scratch buffer. The buffer is reordered.
///
/// # Arguments
///
/// * `values` - Non-empty buffer; its order is not preserved.
///
/// # Returns
///
/// * The middle element (upper median for even lengths, as scipy's
///   `median_filter` does for its odd-sized kernels).
pub fn median_in_place(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mid = values.len() / 2;
    let (_, median, _) =
        values.select_nth_unstable_by(mid, |a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    *median
}

/// Index into a signal of length `n` with scipy's `reflect` boundary mode
/// (`d c b a | a b c d | d c b a`).
pub fn reflect_index(index: isize, n: usize) -> usize {
    let n = n as isize;
    if n == 1 {
        return 0;
    }
    let period = 2 * n;
    let mut i = index.rem_euclid(period);
    if i >= n {
        i = period - 1 - i;
    }
    i as usize
}
