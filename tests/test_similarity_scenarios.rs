use std::sync::Arc;
use std::thread;

use specmesh::downsample::DownsampleConfig;
use specmesh::similarity::{
    prepare_vectors,
    MetricId,
    Normalization,
    SimilarityCache,
    SimilarityOptions,
};
use specmesh::{
    AddOutcome,
    AxisKind,
    EngineConfig,
    OverlayTrace,
    SpectralEngineContext,
    TraceId,
    TraceInput,
    Viewport,
};

fn add(
    ctx: &mut SpectralEngineContext,
    label: &str,
    axis: Vec<f64>,
    value: Vec<f64>,
) -> TraceId {
    match ctx.add_trace(TraceInput::new(label, axis, value)).unwrap() {
        AddOutcome::Added(id) => id,
        other => panic!("{} was not added: {:?}", label, other),
    }
}

fn all_metrics() -> SimilarityOptions {
    SimilarityOptions::default().with_metrics(MetricId::ALL)
}

#[test]
fn test_identical_flat_traces() {
    let config = DownsampleConfig::default();
    let flat = |id: u64, label: &str| {
        OverlayTrace::from_series(
            TraceId(id),
            label,
            AxisKind::Wavelength,
            vec![1., 2., 3.],
            vec![1., 1., 1.],
            &config,
        )
        .unwrap()
    };
    let a = flat(0, "A");
    let b = flat(1, "B");

    let opts = SimilarityOptions::default().with_metrics([MetricId::Cosine, MetricId::Rmse]);
    let cache = SimilarityCache::new();
    let result = cache.compute(&a, &b, &Viewport::unbounded(), &opts);
    assert_eq!(result.points, 3);
    assert!((result.get(MetricId::Cosine).unwrap() - 1.0).abs() < 1e-12);
    assert_eq!(result.get(MetricId::Rmse), Some(0.0));
}

#[test]
fn test_disjoint_traces_have_no_overlap() {
    let mut ctx = SpectralEngineContext::new(EngineConfig::default()).unwrap();
    let a = add(&mut ctx, "A", vec![1., 2., 3.], vec![1., 2., 3.]);
    let b = add(&mut ctx, "B", vec![10., 11., 12.], vec![4., 5., 6.]);
    let vp = Viewport::unbounded();

    let va = ctx.trace(a).unwrap().to_vectors(&vp);
    let vb = ctx.trace(b).unwrap().to_vectors(&vp);
    assert!(prepare_vectors(&va, &vb, &vp).is_none());

    let result = ctx.compute(a, b, &vp, &all_metrics()).unwrap();
    assert_eq!(result.points, 0);
    assert_eq!(result.values.len(), 4);
    assert!(result.values.values().all(|v| v.is_none()));
}

#[test]
fn test_cache_symmetry_and_idempotence() {
    let mut ctx = SpectralEngineContext::new(EngineConfig::default()).unwrap();
    let axis: Vec<f64> = (0..200).map(|i| 400. + i as f64 * 0.5).collect();
    let a = add(
        &mut ctx,
        "A",
        axis.clone(),
        axis.iter().map(|x| (x / 7.).sin() + 2.).collect(),
    );
    let b = add(
        &mut ctx,
        "B",
        axis.iter().map(|x| x + 0.25).collect(),
        axis.iter().map(|x| (x / 9.).cos() + 2.).collect(),
    );
    let vp = Viewport::new(Some(420.), Some(480.));

    for normalization in [
        Normalization::None,
        Normalization::Unit,
        Normalization::Max,
        Normalization::ZScore,
    ] {
        let opts = all_metrics().with_normalization(normalization);
        let ab = ctx.compute(a, b, &vp, &opts).unwrap();
        let evaluations = ctx.cache().metric_evaluations();
        let computations = ctx.cache().computations();
        let ba = ctx.compute(b, a, &vp, &opts).unwrap();
        let again = ctx.compute(a, b, &vp, &opts).unwrap();

        assert_eq!(ab, ba);
        assert_eq!(ab, again);
        assert!(ab.points > 0);
        assert_eq!(ctx.cache().metric_evaluations(), evaluations);
        assert_eq!(ctx.cache().computations(), computations);
    }
    assert_eq!(ctx.cache().computations(), 4);
}

#[test]
fn test_concurrent_callers_compute_once() {
    let mut ctx = SpectralEngineContext::new(EngineConfig::default()).unwrap();
    let axis: Vec<f64> = (0..5_000).map(|i| i as f64).collect();
    let a = add(&mut ctx, "A", axis.clone(), axis.iter().map(|x| x.sin()).collect());
    let b = add(&mut ctx, "B", axis.clone(), axis.iter().map(|x| x.cos()).collect());
    let ctx = Arc::new(ctx);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || {
                let (x, y) = if i % 2 == 0 { (a, b) } else { (b, a) };
                ctx.compute(x, y, &Viewport::unbounded(), &all_metrics()).unwrap()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(ctx.cache().computations(), 1);
    assert_eq!(ctx.cache().metric_evaluations(), 4);
}

#[test]
fn test_matrix_over_visible_traces() {
    let mut ctx = SpectralEngineContext::new(EngineConfig::default()).unwrap();
    let a = add(&mut ctx, "A", vec![1., 2., 3., 4.], vec![1., 2., 3., 4.]);
    let b = add(&mut ctx, "B", vec![1., 2., 3., 4.], vec![2., 4., 6., 8.]);
    let c = add(&mut ctx, "C", vec![1., 2., 3., 4.], vec![4., 1., 3., 2.]);
    ctx.set_visible(c, false).unwrap();

    let opts = all_metrics();
    let matrix = ctx.similarity_matrix(&Viewport::unbounded(), &opts);
    assert_eq!(matrix.ids, vec![a, b]);
    assert_eq!(matrix.labels, vec!["A".to_string(), "B".to_string()]);
    assert!((matrix.get(MetricId::Cosine, 0, 1).unwrap() - 1.0).abs() < 1e-12);
    assert!((matrix.get(MetricId::Xcorr, 1, 0).unwrap() - 1.0).abs() < 1e-12);
    assert_eq!(matrix.get(MetricId::Rmse, 0, 0), Some(0.0));

    let ranked = ctx
        .rank_against_reference(&Viewport::unbounded(), &opts.with_reference(c))
        .unwrap();
    assert_eq!(ranked.len(), 2);
    assert!(ranked.iter().all(|r| r.id != c));
}
