use super::lttb::{
    check_shape,
    lttb,
    midpoint,
};
use crate::errors::Result;
use crate::series::Series;

/// Min/max envelope downsampling.
///
/// The first and last samples are always kept. The interior samples are
/// split into `(threshold - 2) / 2` buckets of equal width, and every bucket
/// contributes its minimum and maximum (in axis order, once if they are the
/// same sample). The result never exceeds `threshold` points and keeps
/// every local extremum at the bucket scale exactly.
///
/// Thresholds below 4 leave no room for a min/max pair and fall back to
/// [`lttb`].
pub fn minmax_envelope(
    axis: &[f64],
    value: &[f64],
    threshold: usize,
) -> Result<Series> {
    check_shape(axis, value)?;
    let n = axis.len();

    if threshold >= n {
        return Ok(Series::from_sorted(axis.to_vec(), value.to_vec()));
    }
    if threshold == 1 {
        return Ok(midpoint(axis, value));
    }
    if threshold < 4 {
        return lttb(axis, value, threshold);
    }

    let num_buckets = (threshold - 2) / 2;
    let interior = n - 2;
    let bucket_width = interior.div_ceil(num_buckets);

    let mut out_axis = Vec::with_capacity(threshold);
    let mut out_value = Vec::with_capacity(threshold);
    out_axis.push(axis[0]);
    out_value.push(value[0]);

    let mut start = 1;
    while start < n - 1 {
        let end = (start + bucket_width).min(n - 1);

        let mut min_idx = start;
        let mut max_idx = start;
        for j in start..end {
            if value[j] < value[min_idx] {
                min_idx = j;
            }
            if value[j] > value[max_idx] {
                max_idx = j;
            }
        }

        let (lo, hi) = if min_idx <= max_idx {
            (min_idx, max_idx)
        } else {
            (max_idx, min_idx)
        };
        out_axis.push(axis[lo]);
        out_value.push(value[lo]);
        if hi != lo {
            out_axis.push(axis[hi]);
            out_value.push(value[hi]);
        }

        start = end;
    }

    out_axis.push(axis[n - 1]);
    out_value.push(value[n - 1]);

    Ok(Series::from_sorted(out_axis, out_value))
}
