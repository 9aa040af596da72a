use serde::{
    Deserialize,
    Serialize,
};

use crate::fingerprint::Fingerprint;
use crate::overlay::TraceId;
use crate::series::Viewport;

/// Numeric view of a trace handed to the similarity pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceVectors {
    pub id: TraceId,
    pub label: String,
    pub axis: Vec<f64>,
    pub value: Vec<f64>,
    pub fingerprint: Fingerprint,
}

impl TraceVectors {
    pub fn new(
        id: TraceId,
        label: String,
        axis: Vec<f64>,
        value: Vec<f64>,
        fingerprint: Fingerprint,
    ) -> Self {
        TraceVectors {
            id,
            label,
            axis,
            value,
            fingerprint,
        }
    }

    /// Copy restricted to pairs where both numbers are finite. Applying it
    /// twice gives the same result as applying it once.
    pub fn cleaned(&self) -> TraceVectors {
        let (axis, value): (Vec<f64>, Vec<f64>) = self
            .axis
            .iter()
            .zip(self.value.iter())
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(x, y)| (*x, *y))
            .unzip();
        TraceVectors {
            id: self.id,
            label: self.label.clone(),
            axis,
            value,
            fingerprint: self.fingerprint,
        }
    }

    pub fn len(&self) -> usize {
        self.axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axis.is_empty()
    }
}

/// Two traces resampled onto a shared axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedVectors {
    pub axis: Vec<f64>,
    pub a: Vec<f64>,
    pub b: Vec<f64>,
}

impl AlignedVectors {
    pub fn len(&self) -> usize {
        self.axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axis.is_empty()
    }
}

/// Linear interpolation of a sorted `(axis, value)` pair at increasing
/// query positions. Positions outside `[axis[0], axis[last]]` give `None`.
struct Interpolator<'a> {
    axis: &'a [f64],
    value: &'a [f64],
    cursor: usize,
}

impl<'a> Interpolator<'a> {
    fn new(
        axis: &'a [f64],
        value: &'a [f64],
    ) -> Self {
        Interpolator {
            axis,
            value,
            cursor: 0,
        }
    }

    /// Queries must be non-decreasing between calls.
    fn at(
        &mut self,
        x: f64,
    ) -> Option<f64> {
        let n = self.axis.len();
        if n == 0 || x < self.axis[0] || x > self.axis[n - 1] {
            return None;
        }
        while self.cursor + 1 < n && self.axis[self.cursor + 1] <= x {
            self.cursor += 1;
        }
        let i = self.cursor;
        if self.axis[i] == x || i + 1 >= n {
            return Some(self.value[i]);
        }
        let (x0, x1) = (self.axis[i], self.axis[i + 1]);
        let (y0, y1) = (self.value[i], self.value[i + 1]);
        Some(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
    }
}

/// Sorted union of two sorted axes, without repeated values.
fn union_axis(
    a: &[f64],
    b: &[f64],
) -> Vec<f64> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() || j < b.len() {
        let next = match (a.get(i), b.get(j)) {
            (Some(x), Some(y)) if x < y => {
                i += 1;
                *x
            },
            (Some(x), Some(y)) if y < x => {
                j += 1;
                *y
            },
            (Some(x), Some(_)) => {
                i += 1;
                j += 1;
                *x
            },
            (Some(x), None) => {
                i += 1;
                *x
            },
            (None, Some(y)) => {
                j += 1;
                *y
            },
            (None, None) => break,
        };
        if out.last().map_or(true, |last| *last < next) {
            out.push(next);
        }
    }
    out
}

/// Aligns two traces onto the union of their axes within `viewport`.
///
/// Both traces are linearly interpolated on every union point. A point is
/// kept only when both traces have a real value there, i.e. when it lies
/// inside both native axis ranges. Returns `None` when no such point
/// exists.
pub fn prepare_vectors(
    a: &TraceVectors,
    b: &TraceVectors,
    viewport: &Viewport,
) -> Option<AlignedVectors> {
    let a = a.cleaned();
    let b = b.cleaned();
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let union = union_axis(&a.axis, &b.axis);
    let mut interp_a = Interpolator::new(&a.axis, &a.value);
    let mut interp_b = Interpolator::new(&b.axis, &b.value);

    let mut out = AlignedVectors {
        axis: Vec::new(),
        a: Vec::new(),
        b: Vec::new(),
    };
    for x in union.into_iter().filter(|x| viewport.contains(*x)) {
        let (Some(ya), Some(yb)) = (interp_a.at(x), interp_b.at(x)) else {
            continue;
        };
        out.axis.push(x);
        out.a.push(ya);
        out.b.push(yb);
    }

    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint_arrays;

    fn vectors(
        axis: Vec<f64>,
        value: Vec<f64>,
    ) -> TraceVectors {
        let fp = fingerprint_arrays(&axis, &value);
        TraceVectors::new(TraceId(0), "v".into(), axis, value, fp)
    }

    #[test]
    fn test_cleaned_is_idempotent() {
        let v = vectors(vec![1., 2., f64::NAN, 4.], vec![1., f64::INFINITY, 3., 4.]);
        let once = v.cleaned();
        assert_eq!(once.axis, vec![1., 4.]);
        assert_eq!(once.cleaned(), once);
    }

    #[test]
    fn test_union_interpolation() {
        let a = vectors(vec![0., 2., 4.], vec![0., 2., 4.]);
        let b = vectors(vec![1., 3., 5.], vec![10., 30., 50.]);
        let aligned = prepare_vectors(&a, &b, &Viewport::unbounded()).unwrap();
        // 0 is outside b, 5 is outside a
        assert_eq!(aligned.axis, vec![1., 2., 3., 4.]);
        assert_eq!(aligned.a, vec![1., 2., 3., 4.]);
        assert_eq!(aligned.b, vec![10., 20., 30., 40.]);
    }

    #[test]
    fn test_viewport_filter_and_disjoint() {
        let a = vectors(vec![1., 2., 3.], vec![1., 2., 3.]);
        let b = vectors(vec![10., 11., 12.], vec![4., 5., 6.]);
        assert!(prepare_vectors(&a, &b, &Viewport::unbounded()).is_none());

        let c = vectors(vec![1., 2., 3.], vec![3., 2., 1.]);
        let aligned = prepare_vectors(&a, &c, &Viewport::new(Some(2.), None)).unwrap();
        assert_eq!(aligned.axis, vec![2., 3.]);
        assert!(prepare_vectors(&a, &c, &Viewport::new(Some(5.), None)).is_none());
    }

    #[test]
    fn test_single_point_overlap() {
        let a = vectors(vec![1., 2.], vec![1., 2.]);
        let b = vectors(vec![2., 3.], vec![5., 6.]);
        let aligned = prepare_vectors(&a, &b, &Viewport::unbounded()).unwrap();
        assert_eq!(aligned.axis, vec![2.]);
        assert_eq!(aligned.a, vec![2.]);
        assert_eq!(aligned.b, vec![5.]);
    }
}
