use std::fmt;

use log::trace;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    Map,
    Value,
};

use crate::downsample::{
    lttb_indices,
    DownsampleConfig,
    TileStore,
};
use crate::errors::{
    EngineError,
    Result,
};
use crate::fingerprint::{
    fingerprint_image,
    fingerprint_series,
    Fingerprint,
    ImagePayload,
};
use crate::series::{
    Series,
    Viewport,
};
use crate::similarity::vectors::TraceVectors;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TraceId(pub u64);

impl fmt::Display for TraceId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    #[default]
    Spectrum,
    Lines,
    Image,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisKind {
    #[default]
    Wavelength,
    Time,
    Image,
}

/// One trace as handed over by ingestion. Arrays need not be sorted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceInput {
    pub label: String,
    pub kind: TraceKind,
    pub axis_kind: AxisKind,
    pub axis: Vec<f64>,
    pub value: Vec<f64>,
    /// Per-point hover text, same length as `axis`.
    pub auxiliary: Option<Vec<String>>,
    pub image: Option<ImagePayload>,
    pub provider: Option<String>,
    /// Passthrough fields the engine never inspects.
    pub metadata: Map<String, Value>,
}

impl TraceInput {
    pub fn new(
        label: impl Into<String>,
        axis: Vec<f64>,
        value: Vec<f64>,
    ) -> Self {
        TraceInput {
            label: label.into(),
            axis,
            value,
            ..Default::default()
        }
    }
}

/// What the renderer gets back from [`OverlayTrace::sample`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SampledSeries {
    pub axis: Vec<f64>,
    pub value: Vec<f64>,
    pub auxiliary: Option<Vec<String>>,
    pub is_full_resolution: bool,
}

impl SampledSeries {
    pub fn len(&self) -> usize {
        self.axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axis.is_empty()
    }
}

/// A trace in the overlay set, with its precomputed tiers and fingerprint.
#[derive(Debug, Clone)]
pub struct OverlayTrace {
    id: TraceId,
    label: String,
    kind: TraceKind,
    axis_kind: AxisKind,
    series: Series,
    tiles: TileStore,
    fingerprint: Fingerprint,
    visible: bool,
    auxiliary: Option<Vec<String>>,
    image: Option<ImagePayload>,
    provider: Option<String>,
    metadata: Map<String, Value>,
}

impl OverlayTrace {
    /// Normalizes the input, fingerprints it and precomputes its tiers.
    ///
    /// Image inputs are routed to [`OverlayTrace::from_image`].
    pub fn from_input(
        id: TraceId,
        input: TraceInput,
        config: &DownsampleConfig,
    ) -> Result<Self> {
        if input.axis_kind == AxisKind::Image || input.kind == TraceKind::Image {
            let image = input.image.ok_or(EngineError::MissingImage)?;
            let mut trace = Self::from_image(id, input.label, image)?;
            trace.provider = input.provider;
            trace.metadata = input.metadata;
            return Ok(trace);
        }

        let (series, order) = Series::normalize_with_order(&input.axis, &input.value)?;
        let auxiliary = match input.auxiliary {
            Some(aux) => {
                if aux.len() != input.axis.len() {
                    return Err(EngineError::AuxiliaryMismatch {
                        expected: input.axis.len(),
                        found: aux.len(),
                    });
                }
                Some(order.iter().map(|&i| aux[i].clone()).collect::<Vec<_>>())
            },
            None => None,
        };

        let fingerprint = fingerprint_series(&series);
        let tiles = TileStore::build(&series, config)?;

        Ok(OverlayTrace {
            id,
            label: input.label,
            kind: input.kind,
            axis_kind: input.axis_kind,
            series,
            tiles,
            fingerprint,
            visible: true,
            auxiliary,
            image: None,
            provider: input.provider,
            metadata: input.metadata,
        })
    }

    pub fn from_series(
        id: TraceId,
        label: impl Into<String>,
        axis_kind: AxisKind,
        axis: Vec<f64>,
        value: Vec<f64>,
        config: &DownsampleConfig,
    ) -> Result<Self> {
        let input = TraceInput {
            axis_kind,
            ..TraceInput::new(label, axis, value)
        };
        Self::from_input(id, input, config)
    }

    pub fn from_image(
        id: TraceId,
        label: impl Into<String>,
        image: ImagePayload,
    ) -> Result<Self> {
        image.validate()?;
        let fingerprint = fingerprint_image(&image);
        Ok(OverlayTrace {
            id,
            label: label.into(),
            kind: TraceKind::Image,
            axis_kind: AxisKind::Image,
            series: Series::empty(),
            tiles: TileStore::default(),
            fingerprint,
            visible: true,
            auxiliary: None,
            image: Some(image),
            provider: None,
            metadata: Map::new(),
        })
    }

    pub fn id(&self) -> TraceId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(
        &mut self,
        label: impl Into<String>,
    ) {
        self.label = label.into();
    }

    pub fn kind(&self) -> TraceKind {
        self.kind
    }

    pub fn axis_kind(&self) -> AxisKind {
        self.axis_kind
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn tiles(&self) -> &TileStore {
        &self.tiles
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(
        &mut self,
        visible: bool,
    ) {
        self.visible = visible;
    }

    pub fn auxiliary(&self) -> Option<&[String]> {
        self.auxiliary.as_deref()
    }

    pub fn image(&self) -> Option<&ImagePayload> {
        self.image.as_ref()
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns a size-bounded view of the trace for the given viewport.
    ///
    /// 1. Images are not downsampled and give an empty result.
    /// 2. The series is restricted to the viewport (inclusive bounds).
    /// 3. Without a budget, or when the restricted series fits, it is
    ///    returned verbatim at full resolution.
    /// 4. Otherwise the smallest precomputed tier with a restricted length
    ///    in `[max_points / 2, max_points]` is used. Tiers carry no
    ///    auxiliary data.
    /// 5. If no tier fits, LTTB runs on the restricted full-resolution
    ///    series. Auxiliary text follows the selected samples.
    pub fn sample(
        &self,
        viewport: &Viewport,
        max_points: Option<usize>,
        include_auxiliary: bool,
    ) -> SampledSeries {
        if self.axis_kind == AxisKind::Image || self.series.is_empty() {
            return SampledSeries::default();
        }

        let range = self.series.viewport_range(viewport);
        let restricted_len = range.len();

        let full_resolution = |range: std::ops::Range<usize>| SampledSeries {
            axis: self.series.axis()[range.clone()].to_vec(),
            value: self.series.value()[range.clone()].to_vec(),
            auxiliary: match (include_auxiliary, &self.auxiliary) {
                (true, Some(aux)) => Some(aux[range].to_vec()),
                _ => None,
            },
            is_full_resolution: true,
        };

        let max_points = match max_points {
            Some(max_points) if restricted_len > max_points => max_points,
            _ => return full_resolution(range),
        };

        if let Some(tier) = self.tiles.select(viewport, max_points) {
            let tier_range = tier.series.viewport_range(viewport);
            let end = tier_range.end.min(tier_range.start + max_points);
            trace!(
                "Serving {} from tier {} ({} points)",
                self.id,
                tier.target_points,
                end - tier_range.start
            );
            return SampledSeries {
                axis: tier.series.axis()[tier_range.start..end].to_vec(),
                value: tier.series.value()[tier_range.start..end].to_vec(),
                auxiliary: None,
                is_full_resolution: false,
            };
        }

        trace!(
            "No tier fits {} points for {}, running LTTB on {} points",
            max_points,
            self.id,
            restricted_len
        );
        let axis = &self.series.axis()[range.clone()];
        let value = &self.series.value()[range.clone()];
        let indices = match lttb_indices(axis, value, max_points) {
            Ok(indices) => indices,
            // Unreachable for a non-empty restriction, degrade to empty.
            Err(_) => return SampledSeries::default(),
        };
        SampledSeries {
            axis: indices.iter().map(|&i| axis[i]).collect(),
            value: indices.iter().map(|&i| value[i]).collect(),
            auxiliary: match (include_auxiliary, &self.auxiliary) {
                (true, Some(aux)) => Some(indices.iter().map(|&i| aux[range.start + i].clone()).collect()),
                _ => None,
            },
            is_full_resolution: false,
        }
    }

    /// Viewport-restricted numeric view used by the similarity pipeline.
    pub fn to_vectors(
        &self,
        viewport: &Viewport,
    ) -> TraceVectors {
        let restricted = self.series.restrict(viewport);
        let (axis, value) = restricted.into_parts();
        TraceVectors::new(self.id, self.label.clone(), axis, value, self.fingerprint)
    }
}
