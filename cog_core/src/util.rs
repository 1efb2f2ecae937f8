//! Sample-combining helpers for load cell reads.

/// Fraction of samples dropped from each end before the trimmed mean.
pub const TRIM_FRACTION: f64 = 0.2;

/// Below this many samples the median is used instead of a trimmed mean.
pub const TRIMMED_MEAN_MIN_SAMPLES: usize = 5;

/// Median of `values`, averaging the two middle elements for even lengths.
/// Sorts `values` in place. Returns `None` for an empty slice.
pub fn median(values: &mut [i32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((f64::from(values[mid - 1]) + f64::from(values[mid])) / 2.0)
    } else {
        Some(f64::from(values[mid]))
    }
}

/// Mean after sorting and dropping `floor(len * TRIM_FRACTION)` samples from
/// each end. Sorts `values` in place. Returns `None` for an empty slice.
pub fn trimmed_mean(values: &mut [i32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let cut = (values.len() as f64 * TRIM_FRACTION) as usize;
    let kept = &values[cut..values.len() - cut];
    let sum: f64 = kept.iter().map(|&v| f64::from(v)).sum();
    Some(sum / kept.len() as f64)
}

/// Combine raw samples into one reading:
/// - 1 sample: itself
/// - 2..=4 samples: median
/// - 5 or more: trimmed mean
pub fn combine_samples(values: &mut [i32]) -> Option<f64> {
    match values.len() {
        0 => None,
        1 => Some(f64::from(values[0])),
        n if n < TRIMMED_MEAN_MIN_SAMPLES => median(values),
        _ => trimmed_mean(values),
    }
}
