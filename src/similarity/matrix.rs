use std::collections::BTreeMap;
use std::io::Write;

use log::warn;
use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};

use super::{
    MetricId,
    SimilarityCache,
    SimilarityOptions,
    SimilarityResult,
};
use crate::errors::{
    EngineError,
    Result,
};
use crate::overlay::{
    OverlayTrace,
    TraceId,
};
use crate::series::Viewport;
use crate::utils::{
    ContextTimer,
    LogLevel,
};

/// Symmetric `labels x labels` table, one grid per requested metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatrix {
    pub ids: Vec<TraceId>,
    pub labels: Vec<String>,
    pub values: BTreeMap<MetricId, Vec<Vec<Option<f64>>>>,
    /// Aligned sample count of every pair.
    pub points: Vec<Vec<usize>>,
}

impl SimilarityMatrix {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn get(
        &self,
        metric: MetricId,
        i: usize,
        j: usize,
    ) -> Option<f64> {
        *self.values.get(&metric)?.get(i)?.get(j)?
    }

    pub fn metrics(&self) -> impl Iterator<Item = MetricId> + '_ {
        self.values.keys().copied()
    }

    /// Writes one metric as CSV, labels as header row and first column.
    /// Missing values become empty cells.
    pub fn write_csv<W: Write>(
        &self,
        metric: MetricId,
        writer: W,
    ) -> Result<()> {
        let grid = self
            .values
            .get(&metric)
            .ok_or_else(|| EngineError::InvalidOption(format!("metric {metric} was not computed")))?;

        let mut wtr = csv::Writer::from_writer(writer);
        let mut header = vec![String::new()];
        header.extend(self.labels.iter().cloned());
        wtr.write_record(&header)?;

        for (label, row) in self.labels.iter().zip(grid.iter()) {
            let mut record = vec![label.clone()];
            record.extend(row.iter().map(|v| match v {
                Some(v) => format!("{v}"),
                None => String::new(),
            }));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Pairwise similarity of every trace against every other.
///
/// The diagonal is fixed to the self-similarity value of each metric (1.0,
/// or 0.0 for `rmse`). Off-diagonal pairs go through the cache, in
/// parallel unless the `less_parallel` feature is enabled. A pair without
/// overlap only leaves missing cells.
pub fn similarity_matrix(
    cache: &SimilarityCache,
    traces: &[&OverlayTrace],
    viewport: &Viewport,
    options: &SimilarityOptions,
) -> SimilarityMatrix {
    let options = options.normalized();
    let n = traces.len();
    let mut timer = ContextTimer::new("similarity_matrix", true, LogLevel::DEBUG);

    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .collect();

    let compute_pair = |&(i, j): &(usize, usize)| -> (usize, usize, SimilarityResult) {
        (i, j, cache.compute(traces[i], traces[j], viewport, &options))
    };

    let results: Vec<(usize, usize, SimilarityResult)> = if cfg!(feature = "less_parallel") {
        warn!("Running in single-threaded mode");
        pairs.iter().map(compute_pair).collect()
    } else {
        pairs.par_iter().map(compute_pair).collect()
    };

    let mut values: BTreeMap<MetricId, Vec<Vec<Option<f64>>>> = options
        .metrics
        .iter()
        .map(|metric| {
            let mut grid = vec![vec![None; n]; n];
            for (i, row) in grid.iter_mut().enumerate() {
                row[i] = Some(metric.self_value());
            }
            (*metric, grid)
        })
        .collect();

    let mut points = vec![vec![0usize; n]; n];
    for (i, trace) in traces.iter().enumerate() {
        points[i][i] = trace.series().len();
    }

    for (i, j, result) in results {
        points[i][j] = result.points;
        points[j][i] = result.points;
        for (metric, grid) in values.iter_mut() {
            let value = result.get(*metric);
            grid[i][j] = value;
            grid[j][i] = value;
        }
    }

    timer.stop(true);
    SimilarityMatrix {
        ids: traces.iter().map(|t| t.id()).collect(),
        labels: traces.iter().map(|t| t.label().to_string()).collect(),
        values,
        points,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedTrace {
    pub id: TraceId,
    pub label: String,
    pub score: Option<f64>,
    pub result: SimilarityResult,
}

/// Scores every other trace against `options.reference_id` on
/// `options.primary_metric` and sorts best first. Traces with a missing
/// score go last.
pub fn rank_against_reference(
    cache: &SimilarityCache,
    traces: &[&OverlayTrace],
    viewport: &Viewport,
    options: &SimilarityOptions,
) -> Result<Vec<RankedTrace>> {
    let reference_id = options
        .reference_id
        .ok_or_else(|| EngineError::InvalidOption("reference_id is not set".into()))?;
    let reference = traces
        .iter()
        .find(|t| t.id() == reference_id)
        .ok_or(EngineError::UnknownTrace(reference_id))?;

    let mut options = options.normalized();
    let primary = options.primary_metric;
    options.metrics.insert(primary);

    let mut ranked: Vec<RankedTrace> = traces
        .iter()
        .filter(|t| t.id() != reference_id)
        .map(|t| {
            let result = cache.compute(reference, t, viewport, &options);
            RankedTrace {
                id: t.id(),
                label: t.label().to_string(),
                score: result.get(primary),
                result,
            }
        })
        .collect();

    ranked.sort_by(|a, b| match (a.score, b.score) {
        (Some(x), Some(y)) if primary.higher_is_better() => y.total_cmp(&x),
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downsample::DownsampleConfig;
    use crate::overlay::AxisKind;

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
    fn test_matrix_is_symmetric_with_fixed_diagonal() {
        let traces = vec![
            trace(0, vec![1., 2., 3.], vec![1., 2., 3.]),
            trace(1, vec![1., 2., 3.], vec![3., 2., 1.]),
            trace(2, vec![10., 11., 12.], vec![4., 5., 6.]),
        ];
        let refs: Vec<&OverlayTrace> = traces.iter().collect();
        let cache = SimilarityCache::new();
        let opts = SimilarityOptions::default().with_metrics([MetricId::Cosine, MetricId::Rmse]);
        let m = similarity_matrix(&cache, &refs, &Viewport::unbounded(), &opts);

        assert_eq!(m.len(), 3);
        assert_eq!(m.get(MetricId::Cosine, 1, 1), Some(1.0));
        assert_eq!(m.get(MetricId::Rmse, 2, 2), Some(0.0));
        assert_eq!(m.get(MetricId::Cosine, 0, 1), m.get(MetricId::Cosine, 1, 0));
        // Disjoint axes leave missing cells only for that pair.
        assert_eq!(m.get(MetricId::Cosine, 0, 2), None);
        assert_eq!(m.points[0][2], 0);
        assert_eq!(m.points[0][1], 3);
        assert_eq!(cache.computations(), 3);

        let mut out = Vec::new();
        m.write_csv(MetricId::Cosine, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], ",t0,t1,t2");
        assert!(lines[1].starts_with("t0,1,"));
        assert!(lines[1].ends_with(','));
        assert!(m.write_csv(MetricId::Xcorr, Vec::new()).is_err());
    }

    #[test]
    fn test_rank_against_reference() {
        let traces = vec![
            trace(0, vec![1., 2., 3., 4.], vec![1., 2., 3., 4.]),
            trace(1, vec![1., 2., 3., 4.], vec![4., 3., 2., 1.]),
            trace(2, vec![1., 2., 3., 4.], vec![1., 2., 3., 5.]),
            trace(3, vec![10., 11.], vec![1., 1.]),
        ];
        let refs: Vec<&OverlayTrace> = traces.iter().collect();
        let cache = SimilarityCache::new();

        let opts = SimilarityOptions::default().with_reference(TraceId(0));
        let ranked = rank_against_reference(&cache, &refs, &Viewport::unbounded(), &opts).unwrap();
        let order: Vec<u64> = ranked.iter().map(|r| r.id.0).collect();
        assert_eq!(order, vec![2, 1, 3]);
        assert!(ranked[2].score.is_none());

        let opts = SimilarityOptions {
            primary_metric: MetricId::Rmse,
            ..opts
        };
        let ranked = rank_against_reference(&cache, &refs, &Viewport::unbounded(), &opts).unwrap();
        assert_eq!(ranked[0].id, TraceId(2));

        let missing = SimilarityOptions::default().with_reference(TraceId(42));
        assert!(matches!(
            rank_against_reference(&cache, &refs, &Viewport::unbounded(), &missing),
            Err(EngineError::UnknownTrace(TraceId(42)))
        ));
    }
}
