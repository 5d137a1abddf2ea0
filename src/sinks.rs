// Observer sinks: taps that receive per-hit, per-read-counter and
// per-action records from the seed aligner.
//
// Each sink is a narrow capability with a single report method.  The
// provided stream implementations serialize concurrent reporters with
// an internal mutex and write one tab-delimited record per line.
// Sinks observe; they never feed anything back into the search.

use crate::metrics::{SeedAction, SeedCounters};
use crate::read::{decode_seq, Read};
use parking_lot::Mutex;
use std::io::Write;

/// Receives every seed hit (one call per seed with a non-empty result).
pub trait SeedHitSink: Send + Sync {
    fn report_seed_hit(&self, rd: &Read, seed_seq: &[u8]);
}

/// Receives the per-read counter snapshot after each read completes.
pub trait SeedCounterSink: Send + Sync {
    fn report_counters(&self, rd: &Read, c: &SeedCounters);
}

/// Receives the per-read action trace after each read completes.
pub trait SeedActionSink: Send + Sync {
    fn report_actions(&self, rd: &Read, actions: &[SeedAction]);
}

/// Hit records: `readSeq \t readQual \t seedSeq`.
pub struct StreamTabSeedHitSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> StreamTabSeedHitSink<W> {
    pub fn new(out: W) -> Self {
        StreamTabSeedHitSink { out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> SeedHitSink for StreamTabSeedHitSink<W> {
    fn report_seed_hit(&self, rd: &Read, seed_seq: &[u8]) {
        let mut out = self.out.lock();
        // Ignore stream errors: observers must not disturb the search.
        let _ = writeln!(
            out,
            "{}\t{}\t{}",
            rd.seq_ascii(),
            rd.qual_ascii(),
            decode_seq(seed_seq)
        );
    }
}

/// Counter records: 15 tab-separated fields in fixed order.
pub struct StreamTabSeedCounterSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> StreamTabSeedCounterSink<W> {
    pub fn new(out: W) -> Self {
        StreamTabSeedCounterSink { out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> SeedCounterSink for StreamTabSeedCounterSink<W> {
    fn report_counters(&self, rd: &Read, c: &SeedCounters) {
        let mut out = self.out.lock();
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            rd.seq_ascii(),  // 1: read sequence
            rd.qual_ascii(), // 2: quality sequence
            c.seed,          // 3: seeds searched
            c.ftab,          // 4: ftab lookups
            c.fchr,          // 5: fchr lookups
            c.matchd[0],     // 6: match advances at depth 0
            c.matchd[1],     // 7: depth 1
            c.matchd[2],     // 8: depth 2
            c.matchd[3],     // 9: depth >= 3
            c.editd[0],      // 10: edit advances at depth 0
            c.editd[1],      // 11: depth 1
            c.editd[2],      // 12: depth 2
            c.editd[3],      // 13: depth >= 3
            c.hits,          // 14: seed hits
            c.max_depth,     // 15: max depth
        );
    }
}

/// Action records: one line per action.
pub struct StreamTabSeedActionSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> StreamTabSeedActionSink<W> {
    pub fn new(out: W) -> Self {
        StreamTabSeedActionSink { out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> SeedActionSink for StreamTabSeedActionSink<W> {
    fn report_actions(&self, rd: &Read, actions: &[SeedAction]) {
        let mut out = self.out.lock();
        let seq = rd.seq_ascii();
        let qual = rd.qual_ascii();
        for a in actions {
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                seq,
                qual,
                a.pos,
                a.kind.code(),
                a.seed,
                a.seedoff,
                a.depth,
            );
        }
    }
}

/// The optional sink set handed to `search_all_seeds`.  All slots may
/// be empty; reporting then costs nothing.
#[derive(Default)]
pub struct SinkSet<'a> {
    pub hit: &'a [&'a dyn SeedHitSink],
    pub counter: &'a [&'a dyn SeedCounterSink],
    pub action: &'a [&'a dyn SeedActionSink],
}

impl<'a> SinkSet<'a> {
    pub fn none() -> SinkSet<'a> {
        SinkSet::default()
    }

    pub fn wants_actions(&self) -> bool {
        !self.action.is_empty()
    }
}
