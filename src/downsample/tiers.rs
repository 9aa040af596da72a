use log::{
    debug,
    trace,
};
use serde::{
    Deserialize,
    Serialize,
};

use super::lttb::lttb;
use super::minmax::minmax_envelope;
use crate::errors::Result;
use crate::series::{
    Series,
    Viewport,
};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DownsampleStrategy {
    Lttb,
    MinMax,
    /// Min/max envelope for small tiers, LTTB above `hybrid_minmax_limit`.
    #[default]
    Hybrid,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DownsampleConfig {
    pub tier_sizes: Vec<usize>,
    pub strategy: DownsampleStrategy,
    pub hybrid_minmax_limit: usize,
}

impl Default for DownsampleConfig {
    fn default() -> Self {
        DownsampleConfig {
            tier_sizes: vec![500, 2000, 8000],
            strategy: DownsampleStrategy::Hybrid,
            hybrid_minmax_limit: 2000,
        }
    }
}

impl DownsampleConfig {
    fn uses_minmax(
        &self,
        target_points: usize,
    ) -> bool {
        match self.strategy {
            DownsampleStrategy::Lttb => false,
            DownsampleStrategy::MinMax => true,
            DownsampleStrategy::Hybrid => target_points <= self.hybrid_minmax_limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownsampleTier {
    pub target_points: usize,
    pub series: Series,
}

/// Builds one tier per requested size, smallest first. Sizes that are not
/// smaller than the series are skipped, the full series already serves
/// them.
pub fn build_tiers(
    series: &Series,
    config: &DownsampleConfig,
) -> Result<Vec<DownsampleTier>> {
    let mut sizes = config.tier_sizes.clone();
    sizes.sort_unstable();
    sizes.dedup();

    let mut tiers = Vec::with_capacity(sizes.len());
    for target_points in sizes {
        if target_points == 0 || target_points >= series.len() {
            continue;
        }
        let reduced = if config.uses_minmax(target_points) {
            minmax_envelope(series.axis(), series.value(), target_points)?
        } else {
            lttb(series.axis(), series.value(), target_points)?
        };
        trace!(
            "Built tier {} -> {} points (from {})",
            target_points,
            reduced.len(),
            series.len()
        );
        tiers.push(DownsampleTier {
            target_points,
            series: reduced,
        });
    }
    Ok(tiers)
}

/// Precomputed downsample tiers of a single trace, ascending by size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TileStore {
    tiers: Vec<DownsampleTier>,
}

impl TileStore {
    pub fn build(
        series: &Series,
        config: &DownsampleConfig,
    ) -> Result<TileStore> {
        let tiers = build_tiers(series, config)?;
        debug!("TileStore with {} tiers for {} points", tiers.len(), series.len());
        Ok(TileStore { tiers })
    }

    pub fn tiers(&self) -> &[DownsampleTier] {
        &self.tiers
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Smallest tier whose viewport-restricted length lies within
    /// `[max_points / 2, max_points]`.
    pub fn select(
        &self,
        viewport: &Viewport,
        max_points: usize,
    ) -> Option<&DownsampleTier> {
        let lower = max_points / 2;
        self.tiers.iter().find(|tier| {
            let len = tier.series.viewport_len(viewport);
            len > 0 && len >= lower && len <= max_points
        })
    }
}
