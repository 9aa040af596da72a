pub mod config;
pub mod context;
pub mod downsample;
pub mod errors;
pub mod fingerprint;
pub mod ledger;
pub mod overlay;
pub mod series;
pub mod similarity;
pub mod utils;

pub use crate::config::EngineConfig;
pub use crate::context::{
    AddOutcome,
    SpectralEngineContext,
};
pub use crate::errors::{
    EngineError,
    Result,
};
pub use crate::fingerprint::Fingerprint;
pub use crate::overlay::{
    AxisKind,
    OverlayTrace,
    SampledSeries,
    TraceId,
    TraceInput,
    TraceKind,
};
pub use crate::series::{
    Series,
    Viewport,
};
pub use crate::similarity::{
    MetricId,
    Normalization,
    SimilarityCache,
    SimilarityOptions,
    SimilarityResult,
};
