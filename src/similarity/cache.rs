use std::collections::HashMap;
use std::sync::atomic::{
    AtomicUsize,
    Ordering,
};
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    OnceLock,
    PoisonError,
};

use log::{
    debug,
    trace,
};

use super::metrics::{
    cosine,
    line_match,
    normalize,
    rmse,
    xcorr,
};
use super::vectors::{
    prepare_vectors,
    TraceVectors,
};
use super::{
    MetricId,
    Normalization,
    SimilarityOptions,
    SimilarityResult,
};
use crate::fingerprint::Fingerprint;
use crate::overlay::OverlayTrace;
use crate::series::Viewport;

/// Identity of one similarity computation.
///
/// The fingerprint pair is stored in sorted order, so swapping the two
/// traces gives the same key. Viewport bounds are rounded to 6 decimals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pair: (Fingerprint, Fingerprint),
    viewport: (Option<i64>, Option<i64>),
    metrics: Vec<MetricId>,
    normalization: Normalization,
    line_match_top_n: usize,
}

impl CacheKey {
    /// `options` are expected to be normalized already.
    pub fn new(
        a: Fingerprint,
        b: Fingerprint,
        viewport: &Viewport,
        options: &SimilarityOptions,
    ) -> Self {
        let pair = if a <= b { (a, b) } else { (b, a) };
        CacheKey {
            pair,
            viewport: viewport.rounded_key(),
            // BTreeSet iteration is already sorted.
            metrics: options.metrics.iter().copied().collect(),
            normalization: options.normalization,
            line_match_top_n: options.line_match_top_n,
        }
    }
}

type Slot = Arc<OnceLock<SimilarityResult>>;

/// Memoized pairwise similarity results.
///
/// The table maps each key to a once-cell. The mutex is only held to fetch
/// or insert the cell, the computation itself runs on the cell, so
/// concurrent callers asking for the same key wait for a single
/// computation while other keys proceed in parallel.
#[derive(Debug, Default)]
pub struct SimilarityCache {
    table: Mutex<HashMap<CacheKey, Slot>>,
    computations: AtomicUsize,
    metric_evaluations: AtomicUsize,
}

impl SimilarityCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Similarity of two overlay traces within `viewport`.
    ///
    /// On a cache hit the traces are not even converted to vectors.
    pub fn compute(
        &self,
        a: &OverlayTrace,
        b: &OverlayTrace,
        viewport: &Viewport,
        options: &SimilarityOptions,
    ) -> SimilarityResult {
        self.get_or_compute(a.fingerprint(), b.fingerprint(), viewport, options, || {
            (a.to_vectors(viewport), b.to_vectors(viewport))
        })
    }

    /// Same as [`SimilarityCache::compute`] for callers that already hold
    /// the vectors.
    pub fn compute_vectors(
        &self,
        a: &TraceVectors,
        b: &TraceVectors,
        viewport: &Viewport,
        options: &SimilarityOptions,
    ) -> SimilarityResult {
        self.get_or_compute(a.fingerprint, b.fingerprint, viewport, options, || {
            (a.clone(), b.clone())
        })
    }

    fn get_or_compute<F>(
        &self,
        fp_a: Fingerprint,
        fp_b: Fingerprint,
        viewport: &Viewport,
        options: &SimilarityOptions,
        vectors: F,
    ) -> SimilarityResult
    where
        F: FnOnce() -> (TraceVectors, TraceVectors),
    {
        let options = options.normalized();
        let key = CacheKey::new(fp_a, fp_b, viewport, &options);
        let slot = {
            let mut table = self.lock();
            Arc::clone(table.entry(key).or_default())
        };

        if let Some(hit) = slot.get() {
            trace!("Similarity cache hit for {} / {}", fp_a, fp_b);
            return hit.clone();
        }

        slot.get_or_init(|| {
            debug!("Similarity cache miss for {} / {}", fp_a, fp_b);
            let (va, vb) = vectors();
            self.evaluate(&va, &vb, viewport, &options)
        })
        .clone()
    }

    fn evaluate(
        &self,
        a: &TraceVectors,
        b: &TraceVectors,
        viewport: &Viewport,
        options: &SimilarityOptions,
    ) -> SimilarityResult {
        self.computations.fetch_add(1, Ordering::Relaxed);

        // Fixed order so that both argument orders produce identical numbers.
        let (a, b) = if a.fingerprint <= b.fingerprint { (a, b) } else { (b, a) };
        let Some(aligned) = prepare_vectors(a, b, viewport) else {
            return SimilarityResult::missing(&options.metrics);
        };

        let na = normalize(&aligned.a, options.normalization);
        let nb = normalize(&aligned.b, options.normalization);

        let values = options
            .metrics
            .iter()
            .map(|metric| {
                self.metric_evaluations.fetch_add(1, Ordering::Relaxed);
                let value = match metric {
                    MetricId::Cosine => cosine(&na, &nb),
                    MetricId::Rmse => rmse(&na, &nb),
                    MetricId::Xcorr => xcorr(&na, &nb),
                    MetricId::LineMatch => line_match(&aligned.axis, &na, &nb, options.line_match_top_n),
                };
                (*metric, value)
            })
            .collect();

        SimilarityResult {
            values,
            points: aligned.len(),
        }
    }

    /// Drops every cached result. Called whenever the overlay set changes.
    pub fn reset(&self) {
        let mut table = self.lock();
        let dropped = table.len();
        table.clear();
        debug!("Similarity cache reset, dropped {} entries", dropped);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of pairs that were actually aligned and evaluated.
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }

    /// Number of individual metric function calls.
    pub fn metric_evaluations(&self) -> usize {
        self.metric_evaluations.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downsample::DownsampleConfig;
    use crate::overlay::{
        AxisKind,
        TraceId,
    };

    fn trace(
        id: u64,
        axis: Vec<f64>,
        value: Vec<f64>,
    ) -> OverlayTrace {
        OverlayTrace::from_series(
            TraceId(id),
            format!("t{id}"),
            AxisKind::Wavelength,
            axis,
            value,
            &DownsampleConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_key_is_symmetric() {
        let a = trace(0, vec![1., 2.], vec![1., 2.]);
        let b = trace(1, vec![1., 2.], vec![2., 1.]);
        let opts = SimilarityOptions::default();
        let vp = Viewport::new(Some(1.0), Some(2.0000000001));
        assert_eq!(
            CacheKey::new(a.fingerprint(), b.fingerprint(), &vp, &opts),
            CacheKey::new(b.fingerprint(), a.fingerprint(), &Viewport::new(Some(1.0), Some(2.0)), &opts)
        );
    }

    #[test]
    fn test_hits_do_not_recompute() {
        let cache = SimilarityCache::new();
        let a = trace(0, vec![1., 2., 3.], vec![1., 2., 3.]);
        let b = trace(1, vec![1., 2., 3.], vec![3., 2., 1.]);
        let opts = SimilarityOptions::default().with_metrics([MetricId::Cosine, MetricId::Xcorr]);
        let vp = Viewport::unbounded();

        let first = cache.compute(&a, &b, &vp, &opts);
        assert_eq!(cache.computations(), 1);
        assert_eq!(cache.metric_evaluations(), 2);

        let second = cache.compute(&b, &a, &vp, &opts);
        assert_eq!(first, second);
        assert_eq!(cache.computations(), 1);
        assert_eq!(cache.metric_evaluations(), 2);
        assert_eq!(cache.len(), 1);

        cache.reset();
        assert!(cache.is_empty());
        cache.compute(&a, &b, &vp, &opts);
        assert_eq!(cache.computations(), 2);
    }

    #[test]
    fn test_options_are_part_of_the_key() {
        let cache = SimilarityCache::new();
        let a = trace(0, vec![1., 2., 3.], vec![1., 2., 3.]);
        let b = trace(1, vec![1., 2., 3.], vec![2., 4., 7.]);
        let vp = Viewport::unbounded();
        let opts = SimilarityOptions::default();
        cache.compute(&a, &b, &vp, &opts);
        cache.compute(&a, &b, &vp, &opts.clone().with_normalization(Normalization::Max));
        cache.compute(&a, &b, &Viewport::new(Some(2.0), None), &opts);
        assert_eq!(cache.computations(), 3);
    }

    #[test]
    fn test_zero_peak_count_leaves_line_match_undefined() {
        let cache = SimilarityCache::new();
        let axis = vec![1., 2., 3., 4., 5.];
        let a = trace(0, axis.clone(), vec![0., 5., 0., 1., 0.]);
        let b = trace(1, axis, vec![0., 4., 0., 2., 0.]);
        let opts = SimilarityOptions {
            line_match_top_n: 0,
            ..Default::default()
        }
        .with_metrics([MetricId::Cosine, MetricId::LineMatch]);

        let result = cache.compute(&a, &b, &Viewport::unbounded(), &opts);
        assert_eq!(result.points, 5);
        assert!(result.get(MetricId::Cosine).is_some());
        assert_eq!(result.get(MetricId::LineMatch), None);
    }
}
