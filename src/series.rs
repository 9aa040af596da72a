use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::{
    EngineError,
    Result,
};
use crate::utils::{
    argsort_f64,
    inclusive_range,
};

/// Number of decimals kept when numbers become hash or cache-key material.
pub const KEY_DECIMALS: i32 = 6;

/// Rounds to `KEY_DECIMALS` and returns the scaled integer, so that floating
/// noise below 1e-6 maps to the same key.
#[inline]
pub fn round_key(x: f64) -> i64 {
    (x * 10f64.powi(KEY_DECIMALS)).round() as i64
}

/// Ordered pair of equal-length numeric sequences with a strictly
/// increasing axis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Series {
    axis: Vec<f64>,
    value: Vec<f64>,
}

impl Series {
    /// Builds a series from unordered raw samples.
    ///
    /// Pairs where either number is not finite are dropped, the rest is
    /// sorted by axis and samples sharing an axis value keep only their
    /// first occurrence.
    ///
    /// ```rust
    /// use specmesh::Series;
    /// let s = Series::new(vec![3.0, 1.0, 2.0, 1.0], vec![30.0, 10.0, 20.0, 11.0]).unwrap();
    /// assert_eq!(s.axis(), &[1.0, 2.0, 3.0]);
    /// assert_eq!(s.value(), &[10.0, 20.0, 30.0]);
    /// ```
    pub fn new(
        axis: Vec<f64>,
        value: Vec<f64>,
    ) -> Result<Self> {
        let (series, _) = Self::normalize_with_order(&axis, &value)?;
        Ok(series)
    }

    /// Same as [`Series::new`] but also returns, for every kept sample, the
    /// index it had in the raw input. Used to carry per-point side data
    /// through the same reordering.
    pub fn normalize_with_order(
        axis: &[f64],
        value: &[f64],
    ) -> Result<(Self, Vec<usize>)> {
        if axis.len() != value.len() {
            return Err(EngineError::ShapeMismatch {
                axis_len: axis.len(),
                value_len: value.len(),
            });
        }
        if axis.is_empty() {
            return Err(EngineError::EmptySeries);
        }

        let order = argsort_f64(axis);
        let mut kept = Vec::with_capacity(order.len());
        let mut out_axis = Vec::with_capacity(order.len());
        let mut out_value = Vec::with_capacity(order.len());
        for i in order {
            let (x, y) = (axis[i], value[i]);
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            if out_axis.last().map_or(false, |last| *last == x) {
                continue;
            }
            out_axis.push(x);
            out_value.push(y);
            kept.push(i);
        }

        if out_axis.is_empty() {
            return Err(EngineError::EmptySeries);
        }

        Ok((
            Series {
                axis: out_axis,
                value: out_value,
            },
            kept,
        ))
    }

    /// Wraps data that is already sorted, unique and finite. Only used for
    /// results derived from an existing series.
    pub(crate) fn from_sorted(
        axis: Vec<f64>,
        value: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(axis.len(), value.len());
        debug_assert!(axis.windows(2).all(|w| w[0] < w[1]));
        Series { axis, value }
    }

    pub fn empty() -> Self {
        Series::default()
    }

    pub fn axis(&self) -> &[f64] {
        &self.axis
    }

    pub fn value(&self) -> &[f64] {
        &self.value
    }

    pub fn len(&self) -> usize {
        self.axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axis.is_empty()
    }

    pub fn first(&self) -> Option<(f64, f64)> {
        Some((*self.axis.first()?, *self.value.first()?))
    }

    pub fn last(&self) -> Option<(f64, f64)> {
        Some((*self.axis.last()?, *self.value.last()?))
    }

    /// Index range of the samples whose axis lies inside the viewport.
    pub fn viewport_range(
        &self,
        viewport: &Viewport,
    ) -> std::ops::Range<usize> {
        let (left, right) = inclusive_range(&self.axis, viewport.low, viewport.high);
        left..right
    }

    pub fn viewport_len(
        &self,
        viewport: &Viewport,
    ) -> usize {
        self.viewport_range(viewport).len()
    }

    pub fn restrict(
        &self,
        viewport: &Viewport,
    ) -> Series {
        let range = self.viewport_range(viewport);
        Series {
            axis: self.axis[range.clone()].to_vec(),
            value: self.value[range].to_vec(),
        }
    }

    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.axis, self.value)
    }
}

/// Visible axis range. `None` bounds are unbounded, present bounds are
/// inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl Viewport {
    pub fn new(
        low: Option<f64>,
        high: Option<f64>,
    ) -> Self {
        Viewport { low, high }
    }

    pub fn unbounded() -> Self {
        Viewport::default()
    }

    pub fn contains(
        &self,
        x: f64,
    ) -> bool {
        self.low.map_or(true, |low| x >= low) && self.high.map_or(true, |high| x <= high)
    }

    /// Bounds rounded to `KEY_DECIMALS`, used as part of cache keys.
    pub fn rounded_key(&self) -> (Option<i64>, Option<i64>) {
        (self.low.map(round_key), self.high.map(round_key))
    }
}
