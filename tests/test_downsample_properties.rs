use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{
    Rng,
    SeedableRng,
};
use specmesh::downsample::{
    build_tiers,
    lttb,
    minmax_envelope,
    DownsampleConfig,
    DownsampleStrategy,
};
use specmesh::fingerprint::fingerprint_series;
use specmesh::{
    AxisKind,
    OverlayTrace,
    Series,
    TraceId,
    Viewport,
};

fn random_series(
    rng: &mut StdRng,
    n: usize,
) -> Series {
    let mut x = 300.0;
    let mut axis = Vec::with_capacity(n);
    let mut value = Vec::with_capacity(n);
    for _ in 0..n {
        x += rng.gen_range(0.001..0.5);
        axis.push(x);
        value.push(rng.gen_range(-50.0..50.0));
    }
    Series::new(axis, value).unwrap()
}

#[test]
fn test_tier_monotonicity() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let n = rng.gen_range(3..12_000);
        let series = random_series(&mut rng, n);
        let tier_sizes: Vec<usize> = (0..4).map(|_| rng.gen_range(0..15_000)).collect();
        for strategy in [
            DownsampleStrategy::Lttb,
            DownsampleStrategy::MinMax,
            DownsampleStrategy::Hybrid,
        ] {
            let config = DownsampleConfig {
                tier_sizes: tier_sizes.clone(),
                strategy,
                ..Default::default()
            };
            let tiers = build_tiers(&series, &config).unwrap();
            for tier in &tiers {
                assert!(tier.series.len() <= tier.target_points);
                assert!(tier.target_points < series.len());
                assert!(tier.series.axis().windows(2).all(|w| w[0] < w[1]));
            }
            assert!(tiers.windows(2).all(|w| w[0].target_points <= w[1].target_points));
        }
    }
}

#[test]
fn test_lttb_endpoint_preservation() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..50 {
        let n = rng.gen_range(2..5_000);
        let series = random_series(&mut rng, n);
        let threshold = rng.gen_range(2..=n);
        let out = lttb(series.axis(), series.value(), threshold).unwrap();
        assert_eq!(out.len(), threshold);
        assert_eq!(out.first(), series.first());
        assert_eq!(out.last(), series.last());

        let envelope = minmax_envelope(series.axis(), series.value(), threshold).unwrap();
        assert!(envelope.len() <= threshold);
        assert_eq!(envelope.first(), series.first());
        assert_eq!(envelope.last(), series.last());
    }
}

#[test]
fn test_sample_bounds() {
    let mut rng = StdRng::seed_from_u64(3);
    let series = random_series(&mut rng, 30_000);
    let (axis, value) = series.clone().into_parts();
    let trace = OverlayTrace::from_series(
        TraceId(0),
        "random",
        AxisKind::Time,
        axis,
        value,
        &DownsampleConfig::default(),
    )
    .unwrap();

    let (lo, hi) = (series.axis()[0], series.axis()[series.len() - 1]);
    for _ in 0..30 {
        let a = rng.gen_range(lo..hi);
        let b = rng.gen_range(lo..hi);
        let viewport = Viewport::new(Some(a.min(b)), Some(a.max(b)));
        let max_points = rng.gen_range(2..3_000);
        let out = trace.sample(&viewport, Some(max_points), false);
        assert!(out.len() <= max_points);
        assert!(out.axis.iter().all(|x| viewport.contains(*x)));
        assert!(out.axis.windows(2).all(|w| w[0] < w[1]));
        if series.viewport_len(&viewport) <= max_points {
            assert!(out.is_full_resolution);
            assert_eq!(out.len(), series.viewport_len(&viewport));
        }
    }
}

#[test]
fn test_sample_under_budget_returns_input() {
    let mut rng = StdRng::seed_from_u64(5);
    let series = random_series(&mut rng, 400);
    let (axis, value) = series.clone().into_parts();
    let trace = OverlayTrace::from_series(
        TraceId(0),
        "small",
        AxisKind::Wavelength,
        axis,
        value,
        &DownsampleConfig::default(),
    )
    .unwrap();
    let out = trace.sample(&Viewport::unbounded(), Some(400), false);
    assert!(out.is_full_resolution);
    assert_eq!(out.axis, series.axis());
    assert_eq!(out.value, series.value());
}

#[test]
fn test_fingerprint_reorder_stability() {
    let mut rng = StdRng::seed_from_u64(13);
    for _ in 0..10 {
        let n = rng.gen_range(1..2_000);
        let series = random_series(&mut rng, n);
        let mut order: Vec<usize> = (0..series.len()).collect();
        order.shuffle(&mut rng);
        let axis = order.iter().map(|&i| series.axis()[i]).collect();
        let value = order.iter().map(|&i| series.value()[i]).collect();
        let shuffled = Series::new(axis, value).unwrap();
        assert_eq!(shuffled, series);
        assert_eq!(fingerprint_series(&shuffled), fingerprint_series(&series));
    }
}
