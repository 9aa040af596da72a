//! Similarity metrics over aligned vectors.
//!
//! Every metric returns `None` when it is undefined for its input (zero
//! norms, empty vectors, zero axis span). A missing value never aborts a
//! batch, it just shows up as an empty cell.

use crate::similarity::Normalization;
use crate::utils::RunningStats;

fn dot(
    a: &[f64],
    b: &[f64],
) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn l2_norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// dot(a, b) / (|a| |b|), clamped to [-1, 1].
pub fn cosine(
    a: &[f64],
    b: &[f64],
) -> Option<f64> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let denom = l2_norm(a) * l2_norm(b);
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some((dot(a, b) / denom).clamp(-1.0, 1.0))
}

/// Root mean squared difference.
pub fn rmse(
    a: &[f64],
    b: &[f64],
) -> Option<f64> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let sum_sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
    Some((sum_sq / a.len() as f64).sqrt())
}

/// Cosine similarity of the mean-centered vectors (Pearson correlation).
pub fn xcorr(
    a: &[f64],
    b: &[f64],
) -> Option<f64> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let mean_a = RunningStats::from_slice(a).get_mean();
    let mean_b = RunningStats::from_slice(b).get_mean();
    let ca: Vec<f64> = a.iter().map(|x| x - mean_a).collect();
    let cb: Vec<f64> = b.iter().map(|x| x - mean_b).collect();
    cosine(&ca, &cb)
}

/// Indices of the `top_n` largest absolute values, in descending order.
/// Ties keep the lower index first.
fn peak_indices(
    values: &[f64],
    top_n: usize,
) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.sort_by(|&i, &j| values[j].abs().total_cmp(&values[i].abs()));
    indices.truncate(top_n);
    indices
}

fn nearest_distances<'a>(
    from: &'a [f64],
    to: &'a [f64],
) -> impl Iterator<Item = f64> + 'a {
    from.iter().map(move |x| {
        to.iter()
            .map(|y| (x - y).abs())
            .fold(f64::INFINITY, f64::min)
    })
}

/// Peak position agreement.
///
/// The `top_n` largest-|value| positions of `a` and `b` are treated as
/// peaks. Every peak is matched to the nearest peak of the other trace, in
/// both directions, and the score is
/// `1 - mean(nearest distance) / axis span`, clamped to [0, 1].
pub fn line_match(
    axis: &[f64],
    a: &[f64],
    b: &[f64],
    top_n: usize,
) -> Option<f64> {
    if top_n == 0 || axis.is_empty() || axis.len() != a.len() || axis.len() != b.len() {
        return None;
    }
    let span = axis[axis.len() - 1] - axis[0];
    if span <= 0.0 || !span.is_finite() {
        return None;
    }

    let peaks_a: Vec<f64> = peak_indices(a, top_n).into_iter().map(|i| axis[i]).collect();
    let peaks_b: Vec<f64> = peak_indices(b, top_n).into_iter().map(|i| axis[i]).collect();

    let distances: Vec<f64> = nearest_distances(&peaks_a, &peaks_b)
        .chain(nearest_distances(&peaks_b, &peaks_a))
        .collect();
    let mean = RunningStats::from_slice(&distances).get_mean();
    Some((1.0 - mean / span).clamp(0.0, 1.0))
}

/// Applies a normalization mode to a single vector.
///
/// `unit` and `max` leave all-zero vectors untouched, `zscore` only
/// subtracts the mean when the standard deviation is zero.
pub fn normalize(
    values: &[f64],
    mode: Normalization,
) -> Vec<f64> {
    match mode {
        Normalization::None => values.to_vec(),
        Normalization::Unit => {
            let norm = l2_norm(values);
            if norm == 0.0 || !norm.is_finite() {
                values.to_vec()
            } else {
                values.iter().map(|x| x / norm).collect()
            }
        },
        Normalization::Max => {
            let max_abs = values.iter().fold(0.0f64, |acc, x| acc.max(x.abs()));
            if max_abs == 0.0 || !max_abs.is_finite() {
                values.to_vec()
            } else {
                values.iter().map(|x| x / max_abs).collect()
            }
        },
        Normalization::ZScore => {
            let stats = RunningStats::from_slice(values);
            let mean = stats.get_mean();
            let sd = stats.get_sd();
            if sd == 0.0 || !sd.is_finite() {
                values.iter().map(|x| x - mean).collect()
            } else {
                values.iter().map(|x| (x - mean) / sd).collect()
            }
        },
    }
}
