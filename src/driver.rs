// Multi-read driver: fans a batch of reads out over rayon workers,
// one read in flight per worker, each worker owning its aligner,
// scratch buffers and local cache level.  The shared cache level and
// the index are the only cross-thread state.

use crate::aligner::{AlignError, SeedAligner};
use crate::cache::{AlignmentCache, LocalCache, SharedCache};
use crate::index::FmIndexPair;
use crate::metrics::SeedSearchMetrics;
use crate::penalty::Penalties;
use crate::read::Read;
use crate::results::SeedResults;
use crate::seed::Seed;
use crate::sinks::SinkSet;
use rayon::prelude::*;
use std::sync::Arc;

/// Per-batch search configuration.
pub struct SeedSearchConfig<'a> {
    /// Seed policies to instantiate for every read.
    pub seeds: &'a [Seed],
    /// Interval between seed offsets.
    pub per: usize,
    pub pens: Penalties,
    /// Ceiling on seed-covered Ns as a function of read length.
    pub n_ceil_const: f32,
    pub n_ceil_linear: f32,
}

impl<'a> SeedSearchConfig<'a> {
    pub fn new(seeds: &'a [Seed], per: usize, pens: Penalties) -> SeedSearchConfig<'a> {
        SeedSearchConfig {
            seeds,
            per,
            pens,
            n_ceil_const: 2.0,
            n_ceil_linear: 0.1,
        }
    }
}

/// Align one read's seeds end to end: instantiate, search, rank.
/// `cache` keeps its shared level; its local level is reset here.
#[allow(clippy::too_many_arguments)]
pub fn align_read(
    aligner: &mut SeedAligner,
    index: &(impl FmIndexPair + ?Sized),
    read: &Read,
    cfg: &SeedSearchConfig,
    cache: &mut AlignmentCache,
    sr: &mut SeedResults,
    met: &mut SeedSearchMetrics,
    sinks: &SinkSet,
) -> Result<(), AlignError> {
    cache.reset();
    aligner.instantiate_seeds(
        cfg.seeds,
        cfg.per,
        read,
        &cfg.pens,
        cfg.n_ceil_const,
        cfg.n_ceil_linear,
        sr,
        met,
    );
    aligner.search_all_seeds(index, read, &cfg.pens, cache, sr, met, sinks)?;
    sr.sort();
    Ok(())
}

/// Search a batch of reads in parallel.
///
/// `on_read` is invoked once per read, on the worker that aligned it,
/// with the ranked results and the local cache level the result's
/// `QVal`s point into (range data is only valid for the duration of
/// the callback).  Per-thread metrics are merged at the join point and
/// returned.
pub fn search_reads<I, F>(
    index: &I,
    reads: &[Read],
    cfg: &SeedSearchConfig,
    shared: Option<Arc<dyn SharedCache>>,
    on_read: F,
) -> Result<SeedSearchMetrics, AlignError>
where
    I: FmIndexPair + ?Sized,
    F: Fn(usize, &SeedResults, &LocalCache) + Send + Sync,
{
    reads
        .par_iter()
        .enumerate()
        .map_init(
            || {
                (
                    SeedAligner::new(),
                    AlignmentCache::new(shared.clone()),
                    SeedResults::new(),
                )
            },
            |(aligner, cache, sr), (i, read)| {
                let mut met = SeedSearchMetrics::new();
                align_read(aligner, index, read, cfg, cache, sr, &mut met, &SinkSet::none())?;
                on_read(i, sr, &cache.local);
                Ok(met)
            },
        )
        .try_reduce(SeedSearchMetrics::new, |mut a, b| {
            a.merge(&b);
            Ok(a)
        })
}
