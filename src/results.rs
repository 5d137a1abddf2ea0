// Per-read seed hit collection.
//
// Hits are stratified by orientation and by seed offset index.  The
// extracted seed sequences and qualities live here (the instantiated
// seeds address them by index), and `sort` produces a ranking of
// non-empty (orientation, offset) pairs by ascending element count so
// downstream extension can start with the cheapest work.

use crate::cache::QVal;
use crate::read::Read;
use crate::seed::InstantiatedSeed;

/// Identity of one ranked hit group, as returned by `hits_by_rank`.
#[derive(Debug, Clone, Copy)]
pub struct RankedHits {
    pub qv: QVal,
    pub offidx: u32,
    pub off: u32,
    pub fw: bool,
    pub seedlen: u32,
}

/// All of the seed hits associated with one read.
#[derive(Default)]
pub struct SeedResults {
    // Arena of extracted seed strings, one slot per offset index.
    seq_fw: Vec<Vec<u8>>,
    seq_rc: Vec<Vec<u8>>,
    qual_fw: Vec<Vec<u8>>,
    qual_rc: Vec<Vec<u8>>,
    // One QVal per (orientation, offset index).
    hits_fw: Vec<QVal>,
    hits_rc: Vec<QVal>,
    // Instantiated seeds per (orientation, offset index).
    is_fw: Vec<Vec<InstantiatedSeed>>,
    is_rc: Vec<Vec<InstantiatedSeed>>,
    sorted_fw: Vec<bool>,
    sorted_rc: Vec<bool>,
    nonz_tot: usize,
    nonz_fw: usize,
    nonz_rc: usize,
    num_ranges: u64,
    num_elts: u64,
    num_ranges_fw: u64,
    num_elts_fw: u64,
    num_ranges_rc: u64,
    num_elts_rc: u64,
    off_idx2off: Vec<u32>,
    rank_offs: Vec<u32>,
    rank_fws: Vec<bool>,
    sorted: bool,
    num_offs: usize,
    read: Read,
}

impl SeedResults {
    pub fn new() -> SeedResults {
        SeedResults::default()
    }

    /// Clear state and size the containers for a new read with the
    /// given seed offsets.  Buffers are reused across reads.
    pub fn reset(&mut self, read: &Read, off_idx2off: &[u32]) {
        debug_assert!(!off_idx2off.is_empty());
        self.clear();
        let n = off_idx2off.len();
        self.num_offs = n;
        self.seq_fw.resize(n, Vec::new());
        self.seq_rc.resize(n, Vec::new());
        self.qual_fw.resize(n, Vec::new());
        self.qual_rc.resize(n, Vec::new());
        self.hits_fw.resize(n, QVal::invalid());
        self.hits_rc.resize(n, QVal::invalid());
        self.is_fw.resize(n, Vec::new());
        self.is_rc.resize(n, Vec::new());
        self.sorted_fw.resize(n, false);
        self.sorted_rc.resize(n, false);
        for i in 0..n {
            self.hits_fw[i].reset();
            self.hits_rc[i].reset();
            self.is_fw[i].clear();
            self.is_rc[i].clear();
            self.sorted_fw[i] = false;
            self.sorted_rc[i] = false;
        }
        self.off_idx2off.clear();
        self.off_idx2off.extend_from_slice(off_idx2off);
        self.read = read.clone();
    }

    fn clear(&mut self) {
        self.rank_offs.clear();
        self.rank_fws.clear();
        self.nonz_tot = 0;
        self.nonz_fw = 0;
        self.nonz_rc = 0;
        self.num_ranges = 0;
        self.num_elts = 0;
        self.num_ranges_fw = 0;
        self.num_elts_fw = 0;
        self.num_ranges_rc = 0;
        self.num_elts_rc = 0;
        self.sorted = false;
    }

    /// Record the result for one (orientation, offset index).  Empty
    /// results are not recorded; the caches still remember them.
    pub fn add(&mut self, qv: QVal, seedoffidx: usize, fw: bool) {
        debug_assert!(qv.valid());
        debug_assert!(seedoffidx < self.num_offs);
        if qv.empty() {
            return;
        }
        let slot = if fw { &mut self.hits_fw[seedoffidx] } else { &mut self.hits_rc[seedoffidx] };
        debug_assert!(!slot.valid(), "offset resolved twice");
        *slot = qv;
        let (ranges, elts) = (qv.num_ranges() as u64, qv.num_elts() as u64);
        if fw {
            self.num_ranges_fw += ranges;
            self.num_elts_fw += elts;
            self.nonz_fw += 1;
        } else {
            self.num_ranges_rc += ranges;
            self.num_elts_rc += elts;
            self.nonz_rc += 1;
        }
        self.num_ranges += ranges;
        self.num_elts += elts;
        self.nonz_tot += 1;
    }

    /// Store the extracted seed string for one (orientation, offset).
    pub fn set_seq(&mut self, seedoffidx: usize, fw: bool, seq: Vec<u8>, qual: Vec<u8>) {
        if fw {
            self.seq_fw[seedoffidx] = seq;
            self.qual_fw[seedoffidx] = qual;
        } else {
            self.seq_rc[seedoffidx] = seq;
            self.qual_rc[seedoffidx] = qual;
        }
    }

    pub fn seq(&self, seedoffidx: usize, fw: bool) -> &[u8] {
        if fw { &self.seq_fw[seedoffidx] } else { &self.seq_rc[seedoffidx] }
    }

    pub fn qual(&self, seedoffidx: usize, fw: bool) -> &[u8] {
        if fw { &self.qual_fw[seedoffidx] } else { &self.qual_rc[seedoffidx] }
    }

    /// Append an instantiated seed for one (orientation, offset).
    pub fn push_seed(&mut self, is: InstantiatedSeed) {
        let idx = is.seedoffidx as usize;
        if is.fw {
            self.is_fw[idx].push(is);
        } else {
            self.is_rc[idx].push(is);
        }
    }

    pub fn instantiated_seeds(&self, seedoffidx: usize, fw: bool) -> &[InstantiatedSeed] {
        if fw { &self.is_fw[seedoffidx] } else { &self.is_rc[seedoffidx] }
    }

    pub fn hits_at(&self, seedoffidx: usize, fw: bool) -> &QVal {
        if fw { &self.hits_fw[seedoffidx] } else { &self.hits_rc[seedoffidx] }
    }

    pub fn num_offs(&self) -> usize {
        self.num_offs
    }

    pub fn off_idx2off(&self) -> &[u32] {
        &self.off_idx2off
    }

    pub fn read(&self) -> &Read {
        &self.read
    }

    pub fn num_ranges(&self) -> u64 {
        self.num_ranges
    }

    pub fn num_elts(&self) -> u64 {
        self.num_elts
    }

    pub fn num_ranges_fw(&self) -> u64 {
        self.num_ranges_fw
    }

    pub fn num_elts_fw(&self) -> u64 {
        self.num_elts_fw
    }

    pub fn num_ranges_rc(&self) -> u64 {
        self.num_ranges_rc
    }

    pub fn num_elts_rc(&self) -> u64 {
        self.num_elts_rc
    }

    pub fn is_hits_empty(&self) -> bool {
        self.num_ranges == 0
    }

    /// Number of (orientation, offset) pairs with at least one hit.
    pub fn nonzero_offsets(&self) -> usize {
        self.nonz_tot
    }

    pub fn nonzero_offsets_fw(&self) -> usize {
        self.nonz_fw
    }

    pub fn nonzero_offsets_rc(&self) -> usize {
        self.nonz_rc
    }

    /// Rank the non-empty (orientation, offset) pairs by ascending
    /// element count.  Repeated selection; ties go to the forward
    /// orientation first, then to the smaller offset index.
    pub fn sort(&mut self) {
        while self.rank_offs.len() < self.nonz_tot {
            let mut min_elts = u32::MAX;
            let mut min_idx = 0usize;
            let mut min_fw = true;
            let mut found = false;
            for fw in [true, false] {
                let (hits, sorted) = if fw {
                    (&self.hits_fw, &self.sorted_fw)
                } else {
                    (&self.hits_rc, &self.sorted_rc)
                };
                for i in 0..self.num_offs {
                    let qv = &hits[i];
                    if qv.valid() && qv.num_elts() > 0 && !sorted[i] && qv.num_elts() < min_elts {
                        min_elts = qv.num_elts();
                        min_idx = i;
                        min_fw = fw;
                        found = true;
                    }
                }
            }
            debug_assert!(found, "ranking ran out of unsorted non-empty offsets");
            if !found {
                break;
            }
            if min_fw {
                self.sorted_fw[min_idx] = true;
            } else {
                self.sorted_rc[min_idx] = true;
            }
            self.rank_offs.push(min_idx as u32);
            self.rank_fws.push(min_fw);
        }
        self.sorted = true;
    }

    /// The hit group of rank `r` (0 = fewest elements).
    pub fn hits_by_rank(&self, r: usize) -> RankedHits {
        debug_assert!(self.sorted);
        debug_assert!(r < self.rank_offs.len());
        let offidx = self.rank_offs[r] as usize;
        let fw = self.rank_fws[r];
        let seedlen = self.seq(offidx, fw).len() as u32;
        RankedHits {
            qv: *self.hits_at(offidx, fw),
            offidx: offidx as u32,
            off: self.off_idx2off[offidx],
            fw,
            seedlen,
        }
    }

    pub fn seq_by_rank(&self, r: usize) -> &[u8] {
        debug_assert!(self.sorted);
        self.seq(self.rank_offs[r] as usize, self.rank_fws[r])
    }

    pub fn qual_by_rank(&self, r: usize) -> &[u8] {
        debug_assert!(self.sorted);
        self.qual(self.rank_offs[r] as usize, self.rank_fws[r])
    }

    /// Internal consistency of the running totals.
    pub fn rep_ok(&self) -> bool {
        let mut nonz = 0;
        for hits in [&self.hits_fw, &self.hits_rc] {
            for qv in hits.iter() {
                if qv.valid() && qv.num_ranges() > 0 {
                    nonz += 1;
                }
            }
        }
        nonz == self.nonz_tot && self.num_ranges <= self.num_elts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{AlignmentCache, RangeHit};
    use crate::edit::Edit;
    use crate::index::BiRange;

    fn qval(cache: &mut AlignmentCache, seq: &[u8], fw: bool, sizes: &[u64]) -> QVal {
        let key = crate::cache::SeedFingerprint::new(seq, fw);
        let mut b = cache.builder(key, None);
        for (i, &sz) in sizes.iter().enumerate() {
            let topf = (i as u64) * 100;
            b.add(RangeHit {
                rng: BiRange { topf, botf: topf + sz, topb: topf, botb: topf + sz },
                len: seq.len() as u32,
                edits: Vec::<Edit>::new(),
            });
        }
        b.finalize().0
    }

    #[test]
    fn totals_track_adds() {
        let rd = Read::with_flat_qual("r", b"ACGTACGTACGT", 30);
        let mut sr = SeedResults::new();
        sr.reset(&rd, &[0, 4, 8]);
        let mut cache = AlignmentCache::local_only();
        let q1 = qval(&mut cache, &[0, 1], true, &[2]);
        let q2 = qval(&mut cache, &[1, 2], false, &[1, 3]);
        sr.add(q1, 0, true);
        sr.add(q2, 2, false);
        assert_eq!(sr.num_ranges(), 3);
        assert_eq!(sr.num_elts(), 6);
        assert_eq!(sr.num_elts_fw(), 2);
        assert_eq!(sr.num_elts_rc(), 4);
        assert_eq!(sr.nonzero_offsets(), 2);
        assert_eq!(sr.nonzero_offsets_fw(), 1);
        assert_eq!(sr.nonzero_offsets_rc(), 1);
        assert!(sr.rep_ok());
    }

    #[test]
    fn empty_qval_not_recorded() {
        let rd = Read::with_flat_qual("r", b"ACGTACGT", 30);
        let mut sr = SeedResults::new();
        sr.reset(&rd, &[0, 4]);
        let mut cache = AlignmentCache::local_only();
        let q = qval(&mut cache, &[0, 1], true, &[]);
        assert!(q.valid() && q.empty());
        sr.add(q, 0, true);
        assert_eq!(sr.nonzero_offsets(), 0);
        assert!(sr.is_hits_empty());
    }

    #[test]
    fn rank_order_and_tie_breaks() {
        let rd = Read::with_flat_qual("r", b"ACGTACGTACGT", 30);
        let mut sr = SeedResults::new();
        sr.reset(&rd, &[0, 4, 8]);
        let mut cache = AlignmentCache::local_only();
        // fw@0: 5 elts, rc@0: 2 elts, fw@1: 2 elts, rc@2: 1 elt.
        let a = qval(&mut cache, &[0, 0], true, &[5]);
        let b = qval(&mut cache, &[0, 1], false, &[2]);
        let c = qval(&mut cache, &[0, 2], true, &[1, 1]);
        let d = qval(&mut cache, &[0, 3], false, &[1]);
        sr.add(a, 0, true);
        sr.add(b, 0, false);
        sr.add(c, 1, true);
        sr.add(d, 2, false);
        sr.sort();
        // Ascending elts: rc@2 (1), then the 2-elt tie broken forward
        // first (fw@1 before rc@0), then fw@0 (5).
        let r0 = sr.hits_by_rank(0);
        assert!((r0.offidx, r0.fw) == (2, false));
        let r1 = sr.hits_by_rank(1);
        assert!((r1.offidx, r1.fw) == (1, true));
        let r2 = sr.hits_by_rank(2);
        assert!((r2.offidx, r2.fw) == (0, false));
        let r3 = sr.hits_by_rank(3);
        assert!((r3.offidx, r3.fw) == (0, true));
        // Offsets resolve through the offset map.
        assert_eq!(r0.off, 8);
        assert_eq!(r1.off, 4);
    }

    #[test]
    fn ranked_accessors_follow_orientation() {
        let rd = Read::with_flat_qual("r", b"ACGTACGT", 30);
        let mut sr = SeedResults::new();
        sr.reset(&rd, &[0, 4]);
        sr.set_seq(0, true, vec![0, 1, 2, 3], vec![30; 4]);
        sr.set_seq(1, false, vec![3, 2, 1, 0], vec![30; 4]);
        let mut cache = AlignmentCache::local_only();
        let a = qval(&mut cache, &[0, 1, 2, 3], true, &[4]);
        let b = qval(&mut cache, &[3, 2, 1, 0], false, &[1]);
        sr.add(a, 0, true);
        sr.add(b, 1, false);
        sr.sort();
        assert_eq!(sr.seq_by_rank(0), &[3, 2, 1, 0]);
        assert_eq!(sr.seq_by_rank(1), &[0, 1, 2, 3]);
        assert_eq!(sr.hits_by_rank(0).seedlen, 4);
    }
}
