pub mod lttb;
pub mod minmax;
pub mod tiers;

pub use lttb::{
    lttb,
    lttb_indices,
};
pub use minmax::minmax_envelope;
pub use tiers::{
    build_tiers,
    DownsampleConfig,
    DownsampleStrategy,
    DownsampleTier,
    TileStore,
};
