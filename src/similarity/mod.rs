pub mod cache;
pub mod matrix;
pub mod metrics;
pub mod vectors;

use std::collections::{
    BTreeMap,
    BTreeSet,
};
use std::fmt;
use std::str::FromStr;

use serde::{
    Deserialize,
    Serialize,
};

pub use self::cache::{
    CacheKey,
    SimilarityCache,
};
pub use self::matrix::{
    rank_against_reference,
    similarity_matrix,
    RankedTrace,
    SimilarityMatrix,
};
pub use self::vectors::{
    prepare_vectors,
    AlignedVectors,
    TraceVectors,
};
use crate::errors::EngineError;
use crate::overlay::TraceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricId {
    Cosine,
    Rmse,
    Xcorr,
    LineMatch,
}

impl MetricId {
    pub const ALL: [MetricId; 4] = [
        MetricId::Cosine,
        MetricId::Rmse,
        MetricId::Xcorr,
        MetricId::LineMatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricId::Cosine => "cosine",
            MetricId::Rmse => "rmse",
            MetricId::Xcorr => "xcorr",
            MetricId::LineMatch => "line_match",
        }
    }

    /// `rmse` is a distance, everything else a similarity.
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, MetricId::Rmse)
    }

    /// Value of the metric for a trace compared with itself.
    pub fn self_value(&self) -> f64 {
        match self {
            MetricId::Rmse => 0.0,
            _ => 1.0,
        }
    }
}

impl fmt::Display for MetricId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(MetricId::Cosine),
            "rmse" => Ok(MetricId::Rmse),
            "xcorr" => Ok(MetricId::Xcorr),
            "line_match" | "linematch" => Ok(MetricId::LineMatch),
            other => Err(EngineError::InvalidOption(format!("unknown metric '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    #[default]
    None,
    Unit,
    Max,
    ZScore,
}

const DEFAULT_LINE_MATCH_TOP_N: usize = 10;

/// `[similarity]` section of the engine configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimilarityConfig {
    pub metrics: Vec<MetricId>,
    pub normalization: Normalization,
    pub line_match_top_n: usize,
    pub primary_metric: MetricId,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        SimilarityConfig {
            metrics: vec![MetricId::Cosine],
            normalization: Normalization::None,
            line_match_top_n: DEFAULT_LINE_MATCH_TOP_N,
            primary_metric: MetricId::Cosine,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityOptions {
    pub metrics: BTreeSet<MetricId>,
    pub normalization: Normalization,
    pub line_match_top_n: usize,
    pub primary_metric: MetricId,
    pub reference_id: Option<TraceId>,
}

impl Default for SimilarityOptions {
    fn default() -> Self {
        SimilarityOptions::from(&SimilarityConfig::default())
    }
}

impl From<&SimilarityConfig> for SimilarityOptions {
    fn from(config: &SimilarityConfig) -> Self {
        SimilarityOptions {
            metrics: config.metrics.iter().copied().collect(),
            normalization: config.normalization,
            line_match_top_n: config.line_match_top_n,
            primary_metric: config.primary_metric,
            reference_id: None,
        }
    }
}

impl SimilarityOptions {
    pub fn with_metrics(
        mut self,
        metrics: impl IntoIterator<Item = MetricId>,
    ) -> Self {
        self.metrics = metrics.into_iter().collect();
        self
    }

    pub fn with_normalization(
        mut self,
        normalization: Normalization,
    ) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_reference(
        mut self,
        reference_id: TraceId,
    ) -> Self {
        self.reference_id = Some(reference_id);
        self
    }

    /// Copy with an empty metric set replaced by `{cosine}`. A zero
    /// `line_match_top_n` is kept, `line_match` is then undefined.
    pub fn normalized(&self) -> SimilarityOptions {
        let mut out = self.clone();
        if out.metrics.is_empty() {
            out.metrics.insert(MetricId::Cosine);
        }
        out
    }
}

/// Metric values for one pair of traces. A `None` value means the metric is
/// undefined for that pair (no overlap, zero norm, ...).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub values: BTreeMap<MetricId, Option<f64>>,
    /// Number of aligned samples the metrics were computed on.
    pub points: usize,
}

impl SimilarityResult {
    pub fn get(
        &self,
        metric: MetricId,
    ) -> Option<f64> {
        self.values.get(&metric).copied().flatten()
    }

    /// Result with every requested metric missing and no points.
    pub fn missing(metrics: &BTreeSet<MetricId>) -> Self {
        SimilarityResult {
            values: metrics.iter().map(|m| (*m, None)).collect(),
            points: 0,
        }
    }
}
