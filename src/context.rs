use std::collections::BTreeMap;

use indicatif::ParallelProgressIterator;
use log::{
    info,
    warn,
};
use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::errors::{
    EngineError,
    Result,
};
use crate::fingerprint::Fingerprint;
use crate::ledger::{
    DuplicateLedger,
    LedgerMeta,
};
use crate::overlay::{
    OverlayTrace,
    SampledSeries,
    TraceId,
    TraceInput,
};
use crate::series::Viewport;
use crate::similarity::{
    rank_against_reference,
    similarity_matrix,
    RankedTrace,
    SimilarityCache,
    SimilarityMatrix,
    SimilarityOptions,
    SimilarityResult,
};
use crate::utils::{
    ContextTimer,
    LogLevel,
};

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added(TraceId),
    /// The fingerprint was already in the ledger, nothing was added.
    Duplicate {
        fingerprint: Fingerprint,
        existing_label: String,
    },
}

/// Owns the overlay set together with the similarity cache and the
/// duplicate ledger of one viewer session.
#[derive(Debug)]
pub struct SpectralEngineContext {
    config: EngineConfig,
    cache: SimilarityCache,
    ledger: DuplicateLedger,
    traces: BTreeMap<TraceId, OverlayTrace>,
    next_id: u64,
}

impl SpectralEngineContext {
    /// Opens the ledger named in the configuration (in-memory when no
    /// path is set).
    pub fn new(config: EngineConfig) -> Result<Self> {
        let ledger = DuplicateLedger::from_config(&config.ledger)?;
        Ok(Self::with_ledger(config, ledger))
    }

    pub fn with_ledger(
        config: EngineConfig,
        ledger: DuplicateLedger,
    ) -> Self {
        SpectralEngineContext {
            config,
            cache: SimilarityCache::new(),
            ledger,
            traces: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &SimilarityCache {
        &self.cache
    }

    pub fn ledger(&self) -> &DuplicateLedger {
        &self.ledger
    }

    pub fn session_id(&self) -> &str {
        &self.config.ledger.session_id
    }

    fn allocate_ids(
        &mut self,
        n: usize,
    ) -> u64 {
        let first = self.next_id;
        self.next_id += n as u64;
        first
    }

    /// Registers a built trace unless its fingerprint was seen before.
    fn admit(
        &mut self,
        trace: OverlayTrace,
    ) -> Result<AddOutcome> {
        let meta = LedgerMeta {
            label: trace.label().to_string(),
            provider: trace.provider().map(str::to_string),
            session_id: self.session_id().to_string(),
        };
        let fingerprint = trace.fingerprint();
        if let Some(existing) = self.ledger.record_if_new(fingerprint, meta)? {
            info!(
                "Skipping '{}': duplicate of '{}' ({})",
                trace.label(),
                existing.label,
                fingerprint
            );
            return Ok(AddOutcome::Duplicate {
                fingerprint,
                existing_label: existing.label,
            });
        }
        let id = trace.id();
        self.traces.insert(id, trace);
        Ok(AddOutcome::Added(id))
    }

    pub fn add_trace(
        &mut self,
        input: TraceInput,
    ) -> Result<AddOutcome> {
        let id = TraceId(self.allocate_ids(1));
        let trace = OverlayTrace::from_input(id, input, &self.config.downsample)?;
        self.admit(trace)
    }

    /// Builds all traces (tiers and fingerprints) in parallel, then checks
    /// them against the ledger one by one in input order. One result per
    /// input, a failing input does not affect the others.
    pub fn ingest_batch(
        &mut self,
        inputs: Vec<TraceInput>,
        progress: bool,
    ) -> Vec<Result<AddOutcome>> {
        let mut timer = ContextTimer::new("ingest_batch", true, LogLevel::INFO);
        let first_id = self.allocate_ids(inputs.len());
        let downsample = self.config.downsample.clone();

        let build = |(i, input): (usize, TraceInput)| {
            OverlayTrace::from_input(TraceId(first_id + i as u64), input, &downsample)
        };

        let mut build_timer = timer.start_sub_timer("build");
        let built: Vec<Result<OverlayTrace>> = if cfg!(feature = "less_parallel") {
            warn!("Running in single-threaded mode");
            inputs.into_iter().enumerate().map(build).collect()
        } else {
            let progbar = if progress {
                indicatif::ProgressBar::new(inputs.len() as u64)
            } else {
                indicatif::ProgressBar::hidden()
            };
            inputs
                .into_par_iter()
                .enumerate()
                .progress_with(progbar)
                .map(build)
                .collect()
        };
        build_timer.stop(true);

        let mut dedup_timer = timer.start_sub_timer("dedup");
        let out: Vec<Result<AddOutcome>> = built
            .into_iter()
            .map(|trace| trace.and_then(|t| self.admit(t)))
            .collect();
        dedup_timer.stop(true);
        timer.stop(true);
        out
    }

    /// Removes a trace from the overlay set. Its ledger entry is kept.
    pub fn remove_trace(
        &mut self,
        id: TraceId,
    ) -> Result<OverlayTrace> {
        let trace = self.traces.remove(&id).ok_or(EngineError::UnknownTrace(id))?;
        self.cache.reset();
        Ok(trace)
    }

    pub fn trace(
        &self,
        id: TraceId,
    ) -> Result<&OverlayTrace> {
        self.traces.get(&id).ok_or(EngineError::UnknownTrace(id))
    }

    fn trace_mut(
        &mut self,
        id: TraceId,
    ) -> Result<&mut OverlayTrace> {
        self.traces.get_mut(&id).ok_or(EngineError::UnknownTrace(id))
    }

    /// All traces in insertion order.
    pub fn traces(&self) -> impl Iterator<Item = &OverlayTrace> {
        self.traces.values()
    }

    pub fn visible_traces(&self) -> impl Iterator<Item = &OverlayTrace> {
        self.traces.values().filter(|t| t.is_visible())
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn set_visible(
        &mut self,
        id: TraceId,
        visible: bool,
    ) -> Result<()> {
        self.trace_mut(id)?.set_visible(visible);
        Ok(())
    }

    pub fn set_label(
        &mut self,
        id: TraceId,
        label: impl Into<String>,
    ) -> Result<()> {
        self.trace_mut(id)?.set_label(label);
        Ok(())
    }

    pub fn sample(
        &self,
        id: TraceId,
        viewport: &Viewport,
        max_points: Option<usize>,
        include_auxiliary: bool,
    ) -> Result<SampledSeries> {
        Ok(self.trace(id)?.sample(viewport, max_points, include_auxiliary))
    }

    /// Session default options from the `[similarity]` config section.
    pub fn default_options(&self) -> SimilarityOptions {
        SimilarityOptions::from(&self.config.similarity)
    }

    pub fn compute(
        &self,
        a: TraceId,
        b: TraceId,
        viewport: &Viewport,
        options: &SimilarityOptions,
    ) -> Result<SimilarityResult> {
        let a = self.trace(a)?;
        let b = self.trace(b)?;
        Ok(self.cache.compute(a, b, viewport, options))
    }

    /// Matrix over the visible traces.
    pub fn similarity_matrix(
        &self,
        viewport: &Viewport,
        options: &SimilarityOptions,
    ) -> SimilarityMatrix {
        let traces: Vec<&OverlayTrace> = self.visible_traces().collect();
        similarity_matrix(&self.cache, &traces, viewport, options)
    }

    /// Ranks the visible traces against `options.reference_id`. The
    /// reference itself may be hidden.
    pub fn rank_against_reference(
        &self,
        viewport: &Viewport,
        options: &SimilarityOptions,
    ) -> Result<Vec<RankedTrace>> {
        let mut traces: Vec<&OverlayTrace> = self.visible_traces().collect();
        if let Some(reference) = options.reference_id {
            let reference = self.trace(reference)?;
            if !reference.is_visible() {
                traces.push(reference);
            }
        }
        rank_against_reference(&self.cache, &traces, viewport, options)
    }

    /// Forgets the ledger entries of `session_id` so their traces can be
    /// ingested again. The overlay set itself is untouched.
    pub fn purge_session(
        &self,
        session_id: &str,
    ) -> Result<usize> {
        self.ledger.purge_session(session_id)
    }
}
