use crate::errors::{
    EngineError,
    Result,
};
use crate::series::Series;

pub(crate) fn check_shape(
    axis: &[f64],
    value: &[f64],
) -> Result<()> {
    if axis.len() != value.len() {
        return Err(EngineError::ShapeMismatch {
            axis_len: axis.len(),
            value_len: value.len(),
        });
    }
    if axis.is_empty() {
        return Err(EngineError::EmptySeries);
    }
    Ok(())
}

pub(crate) fn midpoint(
    axis: &[f64],
    value: &[f64],
) -> Series {
    let mid = axis.len() / 2;
    Series::from_sorted(vec![axis[mid]], vec![value[mid]])
}

/// Largest-Triangle-Three-Buckets downsampling.
///
/// Reduces `axis.len()` points to `threshold` points. The first and last
/// points are always kept. Each of the `threshold - 2` interior buckets
/// contributes the point that spans the largest triangle with the point
/// picked in the previous bucket and the centroid of the next bucket.
///
/// Input must be sorted and deduplicated (see [`Series::new`]).
/// When `threshold >= N` the input is returned unchanged, a threshold of 1
/// returns the midpoint sample and 0 returns an empty series.
///
/// ```rust
/// use specmesh::downsample::lttb;
/// let out = lttb(&[1., 2., 3., 4., 5.], &[0., 10., 0., 10., 0.], 3).unwrap();
/// assert_eq!(out.len(), 3);
/// assert_eq!(out.first(), Some((1., 0.)));
/// assert_eq!(out.last(), Some((5., 0.)));
/// ```
pub fn lttb(
    axis: &[f64],
    value: &[f64],
    threshold: usize,
) -> Result<Series> {
    let indices = lttb_indices(axis, value, threshold)?;
    Ok(Series::from_sorted(
        indices.iter().map(|&i| axis[i]).collect(),
        indices.iter().map(|&i| value[i]).collect(),
    ))
}

/// Source indices picked by [`lttb`], strictly increasing.
///
/// Useful when per-sample data that is not part of the series (labels,
/// hover text) has to follow the reduction.
pub fn lttb_indices(
    axis: &[f64],
    value: &[f64],
    threshold: usize,
) -> Result<Vec<usize>> {
    check_shape(axis, value)?;
    let n = axis.len();

    if threshold >= n {
        return Ok((0..n).collect());
    }
    match threshold {
        0 => return Ok(Vec::new()),
        1 => return Ok(vec![n / 2]),
        2 => return Ok(vec![0, n - 1]),
        _ => {},
    }

    let bucket_size = (n - 2) as f64 / (threshold - 2) as f64;
    let bucket_bound = |i: usize| -> usize { ((i as f64 * bucket_size).floor() as usize + 1).min(n - 1) };

    let mut out = Vec::with_capacity(threshold);
    out.push(0);

    let mut a = 0usize;
    for i in 0..(threshold - 2) {
        let start = bucket_bound(i);
        let end = bucket_bound(i + 1).max(start + 1);

        // Centroid of the next bucket. Near the end of the series the window
        // can collapse, in which case the last point stands in for it.
        let next_start = end;
        let next_end = (((i + 2) as f64 * bucket_size).floor() as usize + 1).min(n);
        let (avg_x, avg_y) = if next_start < next_end {
            let count = (next_end - next_start) as f64;
            let sum_x: f64 = axis[next_start..next_end].iter().sum();
            let sum_y: f64 = value[next_start..next_end].iter().sum();
            (sum_x / count, sum_y / count)
        } else {
            (axis[n - 1], value[n - 1])
        };

        let (ax, ay) = (axis[a], value[a]);
        let mut max_area = -1.0f64;
        let mut max_idx = start;
        for j in start..end.min(n - 1) {
            let area = ((ax - avg_x) * (value[j] - ay) - (ax - axis[j]) * (avg_y - ay)).abs();
            if area > max_area {
                max_area = area;
                max_idx = j;
            }
        }

        out.push(max_idx);
        a = max_idx;
    }

    out.push(n - 1);
    Ok(out)
}
