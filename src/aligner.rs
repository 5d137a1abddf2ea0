// The seed aligner: instantiates a seed set over the offsets of a read
// and executes each instantiated seed's bidirectional search against
// the FM-index pair, going through the two-level cache so identical
// seed bytes are never searched twice.

use crate::cache::{AlignmentCache, CacheAnswer, CacheSource, RangeBuilder, RangeHit, SeedFingerprint};
use crate::constraint::Constraint;
use crate::edit::{Edit, EditKind};
use crate::index::{BiRange, Direction, FmIndexPair};
use crate::metrics::{SeedAction, SeedActionKind, SeedCounters, SeedSearchMetrics};
use crate::penalty::Penalties;
use crate::read::{Read, BASE_N};
use crate::results::SeedResults;
use crate::seed::{InstantiatedSeed, Seed};
use crate::sinks::SinkSet;
use std::fmt;

/// Fatal conditions the aligner surfaces to its caller.  Everything
/// else (N-filtered seeds, shared-cache OOM, absent patterns) is
/// handled internally and reflected in the metrics.
#[derive(Debug)]
pub enum AlignError {
    /// An internal invariant broke; the current read's alignment is
    /// abandoned.
    Internal(String),
}

impl fmt::Display for AlignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignError::Internal(msg) => write!(f, "internal seed-search invariant violated: {}", msg),
        }
    }
}

impl std::error::Error for AlignError {}

/// Gap chaining state threaded through the recursion: the extension
/// index of a gap depends on whether the previous action was a gap of
/// the same kind.
#[derive(Debug, Clone, Copy)]
enum GapState {
    None,
    Del(u32),
    Ins(u32),
}

/// Read-only context of one seed search, bundled so the recursion's
/// signature stays close to its contract.
struct SearchCtx<'a, I: FmIndexPair + ?Sized> {
    index: &'a I,
    pens: &'a Penalties,
    is: &'a InstantiatedSeed,
    seq: &'a [u8],
    qual: &'a [u8],
    record_actions: bool,
}

/// Seed aligner with per-worker scratch buffers.  One instance per
/// worker thread; the buffers amortize across reads so the recursive
/// hot path never allocates.
pub struct SeedAligner {
    /// Offset-index-to-offset map built by `instantiate_seeds`.
    off_idx2off: Vec<u32>,
    /// Edit stack threaded through the recursion, with the direction
    /// of the step that produced each edit.
    edits: Vec<(Edit, bool)>,
    /// Action trace, collected only when an action sink is attached.
    actions: Vec<SeedAction>,
    /// Per-read work counters.
    counters: SeedCounters,
}

impl Default for SeedAligner {
    fn default() -> Self {
        SeedAligner::new()
    }
}

impl SeedAligner {
    pub fn new() -> SeedAligner {
        SeedAligner {
            off_idx2off: Vec::new(),
            edits: Vec::new(),
            actions: Vec::new(),
            counters: SeedCounters::default(),
        }
    }

    /// Counters of the most recently searched read.
    pub fn counters(&self) -> &SeedCounters {
        &self.counters
    }

    /// Extract the seed substring at `off` from the 5' end of the
    /// given orientation, as (bases, qualities).
    pub fn instantiate_seq(read: &Read, len: usize, off: usize, fw: bool) -> (Vec<u8>, Vec<u8>) {
        debug_assert!(off + len <= read.len());
        let mut seq = Vec::with_capacity(len);
        let mut qual = Vec::with_capacity(len);
        for i in off..off + len {
            seq.push(read.base(i, fw));
            qual.push(read.quality(i, fw));
        }
        (seq, qual)
    }

    /// Instantiate every seed of the set at every valid offset on both
    /// strands, populating `sr`.  Returns (instantiated, filtered).
    ///
    /// Seeds are placed every `per` bases starting flush with the 5'
    /// end.  A read shorter than the seed length gets a single seed
    /// shrunk to the read length.  `n_ceil_const`/`n_ceil_linear` give
    /// the ceiling on seed-covered Ns as a function of read length.
    #[allow(clippy::too_many_arguments)]
    pub fn instantiate_seeds(
        &mut self,
        seeds: &[Seed],
        per: usize,
        read: &Read,
        pens: &Penalties,
        n_ceil_const: f32,
        n_ceil_linear: f32,
        sr: &mut SeedResults,
        met: &mut SeedSearchMetrics,
    ) -> (usize, usize) {
        debug_assert!(!seeds.is_empty());
        debug_assert!(per > 0);
        debug_assert!(!read.is_empty());
        debug_assert!(seeds.iter().all(|s| s.len == seeds[0].len));

        let n_ceil = (0.5 + n_ceil_const + n_ceil_linear * read.len() as f32).max(0.0) as usize;

        // Shrink the whole set when the read is shorter than one seed.
        let shrunk;
        let (seeds, len) = if read.len() < seeds[0].len {
            log::debug!(
                "read {} shorter than seed ({} < {}); shrinking",
                read.name,
                read.len(),
                seeds[0].len
            );
            shrunk = seeds.iter().map(|s| s.shrunk(read.len())).collect::<Vec<_>>();
            (&shrunk[..], read.len())
        } else {
            (seeds, seeds[0].len)
        };

        self.off_idx2off.clear();
        let mut off = 0;
        while off + len <= read.len() {
            self.off_idx2off.push(off as u32);
            off += per;
        }
        sr.reset(read, &self.off_idx2off);

        let mut inst = 0;
        let mut filtered = 0;
        for fw in [true, false] {
            for (idx, &off) in self.off_idx2off.iter().enumerate() {
                let (seq, qual) = SeedAligner::instantiate_seq(read, len, off as usize, fw);
                for (tidx, s) in seeds.iter().enumerate() {
                    let is = s.instantiate(
                        read, &seq, &qual, pens, off as usize, idx, tidx, fw, n_ceil,
                    );
                    if is.nfiltered {
                        filtered += 1;
                        met.filteredseed += 1;
                    } else {
                        inst += 1;
                    }
                    sr.push_seed(is);
                }
                sr.set_seq(idx, fw, seq, qual);
            }
        }
        log::debug!(
            "read {}: {} offsets, {} seeds instantiated, {} filtered",
            read.name,
            self.off_idx2off.len(),
            inst,
            filtered
        );
        (inst, filtered)
    }

    /// Search every live instantiated seed of `sr` against the index,
    /// resolving each (orientation, offset) through the two-level
    /// cache and collecting hit ranges into `sr`.
    #[allow(clippy::too_many_arguments)]
    pub fn search_all_seeds<I: FmIndexPair + ?Sized>(
        &mut self,
        index: &I,
        read: &Read,
        pens: &Penalties,
        cache: &mut AlignmentCache,
        sr: &mut SeedResults,
        met: &mut SeedSearchMetrics,
        sinks: &SinkSet,
    ) -> Result<(), AlignError> {
        self.counters.reset();
        self.actions.clear();
        let record_actions = sinks.wants_actions();

        for fw in [true, false] {
            for offidx in 0..sr.num_offs() {
                if !sr.instantiated_seeds(offidx, fw).iter().any(|s| !s.nfiltered) {
                    continue;
                }
                let key = SeedFingerprint::new(sr.seq(offidx, fw), fw);
                let qv = match cache.resolve(&key) {
                    CacheAnswer::Hit(qv, src) => {
                        match src {
                            CacheSource::Local => met.intrahit += 1,
                            CacheSource::Shared => met.interhit += 1,
                        }
                        qv
                    }
                    CacheAnswer::Miss { shared, oom } => {
                        met.possearch += 1;
                        if oom {
                            met.ooms += 1;
                            log::warn!(
                                "shared seed cache OOM for read {}; continuing local-only",
                                read.name
                            );
                        }
                        let mut builder = cache.builder(key, shared);
                        let seq = sr.seq(offidx, fw);
                        let qual = sr.qual(offidx, fw);
                        for is in sr.instantiated_seeds(offidx, fw) {
                            if is.nfiltered {
                                continue;
                            }
                            met.seedsearch += 1;
                            self.counters.seed += 1;
                            let ctx = SearchCtx {
                                index,
                                pens,
                                is,
                                seq,
                                qual,
                                record_actions,
                            };
                            self.search_seed(&ctx, &mut builder, met)?;
                        }
                        let (qv, oom_late) = builder.finalize();
                        if oom_late {
                            met.ooms += 1;
                        }
                        qv
                    }
                };
                if !qv.empty() {
                    for s in sinks.hit {
                        s.report_seed_hit(read, sr.seq(offidx, fw));
                    }
                }
                sr.add(qv, offidx, fw);
            }
        }

        for s in sinks.counter {
            s.report_counters(read, &self.counters);
        }
        for s in sinks.action {
            s.report_actions(read, &self.actions);
        }
        debug_assert!(sr.rep_ok());
        Ok(())
    }

    /// Run one instantiated seed's search strategy: pick the initial
    /// jump, then recurse over the remaining steps.
    fn search_seed<I: FmIndexPair + ?Sized>(
        &mut self,
        ctx: &SearchCtx<I>,
        builder: &mut RangeBuilder,
        met: &mut SeedSearchMetrics,
    ) -> Result<(), AlignError> {
        let is = ctx.is;
        if is.is_empty() {
            return Ok(());
        }
        self.edits.clear();
        let cons = is.cons;
        let overall = is.overall;

        let ftl = ctx.index.ftab_len();
        let (start_step, rng) = if ftl >= 2 && is.maxjump >= ftl {
            // Resolve a full ftab prefix in one lookup.  The prefix
            // steps are monotonic, so they cover a contiguous window.
            self.counters.ftab += 1;
            let p0 = (is.steps[0].unsigned_abs() - 1) as usize;
            let window = if is.steps[0] > 0 {
                &ctx.seq[p0..p0 + ftl]
            } else {
                &ctx.seq[p0 + 1 - ftl..=p0]
            };
            if ctx.record_actions {
                self.actions.push(SeedAction {
                    kind: SeedActionKind::FtabJump,
                    seed: is.seedtypeidx,
                    seedoff: is.seedoff,
                    pos: p0 as u32,
                    ltr: is.steps[0] > 0,
                    len: ftl as u32,
                    depth: 0,
                    edit: None,
                });
            }
            match ctx.index.ftab_lookup(window) {
                Some(r) if r.consistent() && !r.is_empty() => (ftl, r),
                Some(_) => {
                    met.ovfs += 1;
                    return Ok(());
                }
                None => return Ok(()),
            }
        } else if is.maxjump >= 1 {
            // Single-base jump through fchr.
            self.counters.fchr += 1;
            let p0 = (is.steps[0].unsigned_abs() - 1) as usize;
            if ctx.record_actions {
                self.actions.push(SeedAction {
                    kind: SeedActionKind::FchrJump,
                    seed: is.seedtypeidx,
                    seedoff: is.seedoff,
                    pos: p0 as u32,
                    ltr: is.steps[0] > 0,
                    len: 1,
                    depth: 0,
                    edit: None,
                });
            }
            match ctx.index.fchr(ctx.seq[p0]) {
                Some(r) if r.consistent() && !r.is_empty() => (1, r),
                Some(_) => {
                    met.ovfs += 1;
                    return Ok(());
                }
                None => return Ok(()),
            }
        } else {
            (0, ctx.index.whole())
        };

        self.search_bi(ctx, builder, met, start_step, 0, rng, cons, overall, GapState::None)
    }

    /// The recursive bidirectional search.  Walks `steps` maintaining
    /// the range pair, branching into exact, mismatch, N, deletion and
    /// insertion continuations in that fixed order.  Constraints are
    /// plain copies on the frame, so unwinding is free.
    #[allow(clippy::too_many_arguments)]
    fn search_bi<I: FmIndexPair + ?Sized>(
        &mut self,
        ctx: &SearchCtx<I>,
        builder: &mut RangeBuilder,
        met: &mut SeedSearchMetrics,
        step: usize,
        depth: usize,
        rng: BiRange,
        cons: [Constraint; 3],
        overall: Constraint,
        gap: GapState,
    ) -> Result<(), AlignError> {
        self.counters.note_depth(depth);
        let is = ctx.is;
        let len = is.len();

        if step == len {
            if !(cons.iter().all(|c| c.rep_ok()) && overall.rep_ok()) {
                return Err(AlignError::Internal(format!(
                    "constraint counters negative at terminal state of seed at offset {}",
                    is.seedoff
                )));
            }
            if cons[0].acceptable()
                && cons[1].acceptable()
                && cons[2].acceptable()
                && overall.acceptable()
            {
                self.report_hit(builder, rng, len);
            }
            return Ok(());
        }

        let st = is.steps[step];
        let p = (st.unsigned_abs() - 1) as usize;
        let dir = if st > 0 { Direction::Right } else { Direction::Left };
        let zp = is.zones[step];
        let zn = zp.norm as usize;
        let zi = zp.ins as usize;
        let rb = ctx.seq[p];
        let rq = ctx.qual[p];

        // Exact continuation.
        if rb != BASE_N {
            if let Some(r2) = self.extend_checked(ctx.index, met, dir, rb, rng) {
                self.counters.note_match(depth);
                if ctx.record_actions {
                    self.push_action(is, SeedActionKind::Match, p, st > 0, depth, None);
                }
                if !zp.close || cons[zn].acceptable() {
                    self.search_bi(ctx, builder, met, step + 1, depth + 1, r2, cons, overall, GapState::None)?;
                }
            }
        }

        // Mismatch continuation: every reference base but the read's,
        // in canonical A,C,G,T order.
        if rb != BASE_N && cons[zn].can_mismatch(rq, ctx.pens) && overall.can_mismatch(rq, ctx.pens) {
            for b in 0..4u8 {
                if b == rb {
                    continue;
                }
                if let Some(r2) = self.extend_checked(ctx.index, met, dir, b, rng) {
                    self.counters.note_edit(depth);
                    met.bweds += 1;
                    let mut cz = cons;
                    cz[zn].charge_mismatch(rq, ctx.pens);
                    let mut ov = overall;
                    ov.charge_mismatch(rq, ctx.pens);
                    let e = Edit::mm(p, b);
                    self.edits.push((e, st > 0));
                    if ctx.record_actions {
                        self.push_action(is, SeedActionKind::Edit, p, st > 0, depth, Some(e));
                    }
                    if !zp.close || cz[zn].acceptable() {
                        self.search_bi(ctx, builder, met, step + 1, depth + 1, r2, cz, ov, GapState::None)?;
                    }
                    self.edits.pop();
                }
            }
        }

        // N continuation: the zone share was pre-debited at
        // instantiation, so only the overall budget is charged here.
        if rb == BASE_N && overall.can_n(rq, ctx.pens) {
            for b in 0..4u8 {
                if let Some(r2) = self.extend_checked(ctx.index, met, dir, b, rng) {
                    self.counters.note_edit(depth);
                    met.bweds += 1;
                    let mut ov = overall;
                    ov.charge_n(rq, ctx.pens);
                    let e = Edit::mm(p, b);
                    self.edits.push((e, st > 0));
                    if ctx.record_actions {
                        self.push_action(is, SeedActionKind::Edit, p, st > 0, depth, Some(e));
                    }
                    if !zp.close || cons[zn].acceptable() {
                        self.search_bi(ctx, builder, met, step + 1, depth + 1, r2, cons, ov, GapState::None)?;
                    }
                    self.edits.pop();
                }
            }
        }

        // Deletion continuation: consume a reference base, stay on the
        // same step.
        let del_ex = match gap {
            GapState::Del(e) => e + 1,
            _ => 0,
        };
        if cons[zn].can_delete(del_ex, ctx.pens) && overall.can_delete(del_ex, ctx.pens) {
            for b in 0..4u8 {
                if let Some(r2) = self.extend_checked(ctx.index, met, dir, b, rng) {
                    self.counters.note_edit(depth);
                    met.bweds += 1;
                    let mut cz = cons;
                    cz[zn].charge_delete(del_ex, ctx.pens);
                    let mut ov = overall;
                    ov.charge_delete(del_ex, ctx.pens);
                    // A leftward step's deletion lands after `p` in
                    // the final reference window.
                    let e = Edit::del(if st > 0 { p } else { p + 1 }, b);
                    self.edits.push((e, st > 0));
                    if ctx.record_actions {
                        self.push_action(is, SeedActionKind::Edit, p, st > 0, depth, Some(e));
                    }
                    self.search_bi(ctx, builder, met, step, depth + 1, r2, cz, ov, GapState::Del(del_ex))?;
                    self.edits.pop();
                }
            }
        }

        // Insertion continuation: consume the read base, leave the
        // range untouched.
        let ins_ex = match gap {
            GapState::Ins(e) => e + 1,
            _ => 0,
        };
        if cons[zi].can_insert(ins_ex, ctx.pens) && overall.can_insert(ins_ex, ctx.pens) {
            self.counters.note_edit(depth);
            met.bweds += 1;
            let mut cz = cons;
            cz[zi].charge_insert(ins_ex, ctx.pens);
            let mut ov = overall;
            ov.charge_insert(ins_ex, ctx.pens);
            let e = Edit::ins(p, rb);
            self.edits.push((e, st > 0));
            if ctx.record_actions {
                self.push_action(is, SeedActionKind::Edit, p, st > 0, depth, Some(e));
            }
            // Close-out consults the zone this branch charged: the
            // insert zone, which can differ from the substitution zone
            // at a zone boundary.
            if !zp.close || cz[zi].acceptable() {
                self.search_bi(ctx, builder, met, step + 1, depth + 1, rng, cz, ov, GapState::Ins(ins_ex))?;
            }
            self.edits.pop();
        }

        Ok(())
    }

    /// One range extension with defensive validation: inconsistent
    /// interval arithmetic is demoted to an empty range and counted.
    fn extend_checked<I: FmIndexPair + ?Sized>(
        &mut self,
        index: &I,
        met: &mut SeedSearchMetrics,
        dir: Direction,
        base: u8,
        rng: BiRange,
    ) -> Option<BiRange> {
        met.bwops += 1;
        match index.extend(dir, base, rng) {
            Some(r) if r.is_empty() => None,
            Some(r) if !r.consistent() => {
                met.ovfs += 1;
                None
            }
            r => r,
        }
    }

    fn report_hit(&mut self, builder: &mut RangeBuilder, rng: BiRange, len: usize) {
        // Edits were pushed in step order; report them in seed-position
        // order.  Deletions from leftward steps stack up in reverse
        // reference order at their slot, so their push index sorts
        // negated.
        let mut keyed: Vec<(u32, i64, Edit)> = self
            .edits
            .iter()
            .enumerate()
            .map(|(i, &(e, ltr))| {
                let tie = if e.kind == EditKind::Del && !ltr { -(i as i64) } else { i as i64 };
                (e.pos, tie, e)
            })
            .collect();
        keyed.sort_by_key(|&(pos, tie, _)| (pos, tie));
        let hit = RangeHit {
            rng,
            len: len as u32,
            edits: keyed.into_iter().map(|(_, _, e)| e).collect(),
        };
        if builder.add(hit) {
            self.counters.hits += 1;
        }
    }

    fn push_action(
        &mut self,
        is: &InstantiatedSeed,
        kind: SeedActionKind,
        pos: usize,
        ltr: bool,
        depth: usize,
        edit: Option<Edit>,
    ) {
        self.actions.push(SeedAction {
            kind,
            seed: is.seedtypeidx,
            seedoff: is.seedoff,
            pos: pos as u32,
            ltr,
            len: 1,
            depth: depth as u32,
            edit,
        });
    }
}
