// Two-level cache for seed alignment results.
//
// The local level belongs to one read in flight: it deduplicates work
// across seed offsets of that read (two offsets often extract identical
// seed bytes).  The shared level is process-wide and deduplicates work
// across reads; it provides its own synchronization and guarantees at
// most one concurrent build per key.  Values are `QVal` handles naming
// a contiguous run of ranges in the local cache's range list.

use crate::edit::Edit;
use crate::index::BiRange;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Cache key: the exact byte sequence of the seed's bases (2-bit plus
/// N) and the orientation it was extracted from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeedFingerprint {
    pub seq: Vec<u8>,
    pub fw: bool,
}

impl SeedFingerprint {
    pub fn new(seq: &[u8], fw: bool) -> SeedFingerprint {
        SeedFingerprint { seq: seq.to_vec(), fw }
    }
}

/// One reported hit: the range coordinates, the matched reference
/// length and the edits that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeHit {
    pub rng: BiRange,
    pub len: u32,
    pub edits: Vec<Edit>,
}

impl RangeHit {
    /// Number of reference occurrences the range covers.
    #[inline]
    pub fn num_elts(&self) -> u64 {
        self.rng.size()
    }
}

/// Handle into the local cache naming a contiguous list of ranges
/// produced for one fingerprint.  Invalid until a lookup or build
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QVal {
    idx: u32,
    rangen: u32,
    eltn: u32,
}

const QVAL_INVALID: u32 = u32::MAX;

impl QVal {
    pub fn invalid() -> QVal {
        QVal { idx: QVAL_INVALID, rangen: 0, eltn: 0 }
    }

    fn new(idx: u32, rangen: u32, eltn: u32) -> QVal {
        QVal { idx, rangen, eltn }
    }

    #[inline]
    pub fn valid(&self) -> bool {
        self.idx != QVAL_INVALID
    }

    #[inline]
    pub fn num_ranges(&self) -> u32 {
        self.rangen
    }

    #[inline]
    pub fn num_elts(&self) -> u32 {
        self.eltn
    }

    #[inline]
    pub fn empty(&self) -> bool {
        self.rangen == 0
    }

    pub fn reset(&mut self) {
        *self = QVal::invalid();
    }
}

impl Default for QVal {
    fn default() -> Self {
        QVal::invalid()
    }
}

/// Shared-cache allocation failure.  Recoverable: the caller keeps the
/// local result and gives up on cross-read reuse for this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOom;

impl fmt::Display for CacheOom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shared seed cache out of memory")
    }
}

impl std::error::Error for CacheOom {}

/// Outcome of asking the shared level for build permission.
pub enum BeginAdd {
    /// Caller owns the build; ranges go through the handle.
    Build(Box<dyn SharedBuildHandle>),
    /// Somebody already finished this key.
    Present(Arc<[RangeHit]>),
    /// Somebody else is building this key right now.
    Pending,
}

/// Scoped shared-cache build.  Dropping a handle without `finalize`
/// abandons the build: the pending slot is released and waiters wake to
/// find a miss.
pub trait SharedBuildHandle: Send {
    fn add_range(&mut self, hit: &RangeHit) -> Result<(), CacheOom>;
    fn finalize(self: Box<Self>) -> Result<Arc<[RangeHit]>, CacheOom>;
}

/// Process-wide cache of finished seed searches.
///
/// Contract: `begin_add` admits at most one builder per missing key;
/// concurrent requesters see `Pending` and use `wait` to block until
/// the builder finalizes (or abandons, in which case `wait` reports a
/// miss and the caller may try to become the builder itself).
pub trait SharedCache: Send + Sync {
    fn lookup(&self, key: &SeedFingerprint) -> Option<Arc<[RangeHit]>>;
    fn begin_add(&self, key: &SeedFingerprint) -> Result<BeginAdd, CacheOom>;
    /// Block until a pending build for `key` resolves.  `Some` carries
    /// the finalized ranges; `None` means the build was abandoned or
    /// the entry vanished.
    fn wait(&self, key: &SeedFingerprint) -> Option<Arc<[RangeHit]>>;
}

// ---------------------------------------------------------------------
// In-memory shared cache
// ---------------------------------------------------------------------

enum Slot {
    Pending,
    Done(Arc<[RangeHit]>),
}

struct SharedState {
    map: HashMap<SeedFingerprint, Slot>,
    /// Ranges currently stored across all finished entries.
    ranges_stored: usize,
}

struct SharedInner {
    state: Mutex<SharedState>,
    cond: Condvar,
    max_ranges: usize,
}

/// In-memory `SharedCache` with a capacity cap expressed in stored
/// ranges.  Exceeding the cap surfaces as `CacheOom`, which the aligner
/// treats as recoverable.
#[derive(Clone)]
pub struct InMemorySharedCache {
    inner: Arc<SharedInner>,
}

impl InMemorySharedCache {
    pub fn new(max_ranges: usize) -> InMemorySharedCache {
        InMemorySharedCache {
            inner: Arc::new(SharedInner {
                state: Mutex::new(SharedState { map: HashMap::new(), ranges_stored: 0 }),
                cond: Condvar::new(),
                max_ranges,
            }),
        }
    }

    /// Number of finalized keys currently resident.
    pub fn num_keys(&self) -> usize {
        let st = self.inner.state.lock();
        st.map
            .values()
            .filter(|s| matches!(s, Slot::Done(_)))
            .count()
    }
}

impl SharedCache for InMemorySharedCache {
    fn lookup(&self, key: &SeedFingerprint) -> Option<Arc<[RangeHit]>> {
        let st = self.inner.state.lock();
        match st.map.get(key) {
            Some(Slot::Done(r)) => Some(Arc::clone(r)),
            _ => None,
        }
    }

    fn begin_add(&self, key: &SeedFingerprint) -> Result<BeginAdd, CacheOom> {
        let mut st = self.inner.state.lock();
        match st.map.get(key) {
            Some(Slot::Done(r)) => return Ok(BeginAdd::Present(Arc::clone(r))),
            Some(Slot::Pending) => return Ok(BeginAdd::Pending),
            None => {}
        }
        if st.ranges_stored >= self.inner.max_ranges {
            return Err(CacheOom);
        }
        st.map.insert(key.clone(), Slot::Pending);
        Ok(BeginAdd::Build(Box::new(InMemoryBuild {
            cache: Arc::clone(&self.inner),
            key: key.clone(),
            ranges: Vec::new(),
            finalized: false,
        })))
    }

    fn wait(&self, key: &SeedFingerprint) -> Option<Arc<[RangeHit]>> {
        let mut st = self.inner.state.lock();
        loop {
            match st.map.get(key) {
                Some(Slot::Done(r)) => return Some(Arc::clone(r)),
                Some(Slot::Pending) => {}
                None => return None,
            }
            self.inner.cond.wait(&mut st);
        }
    }
}

struct InMemoryBuild {
    cache: Arc<SharedInner>,
    key: SeedFingerprint,
    ranges: Vec<RangeHit>,
    finalized: bool,
}

impl SharedBuildHandle for InMemoryBuild {
    fn add_range(&mut self, hit: &RangeHit) -> Result<(), CacheOom> {
        // Capacity is checked against what is already resident plus
        // what this build has buffered so far.
        let st = self.cache.state.lock();
        if st.ranges_stored + self.ranges.len() >= self.cache.max_ranges {
            return Err(CacheOom);
        }
        drop(st);
        self.ranges.push(hit.clone());
        Ok(())
    }

    fn finalize(mut self: Box<Self>) -> Result<Arc<[RangeHit]>, CacheOom> {
        let mut st = self.cache.state.lock();
        let stored: Arc<[RangeHit]> = Arc::from(std::mem::take(&mut self.ranges).into_boxed_slice());
        st.ranges_stored += stored.len();
        st.map.insert(self.key.clone(), Slot::Done(Arc::clone(&stored)));
        self.finalized = true;
        self.cache.cond.notify_all();
        Ok(stored)
    }
}

impl Drop for InMemoryBuild {
    fn drop(&mut self) {
        if !self.finalized {
            // Abandoned build: release the pending slot so waiters can
            // become builders themselves.
            let mut st = self.cache.state.lock();
            if matches!(st.map.get(&self.key), Some(Slot::Pending)) {
                st.map.remove(&self.key);
            }
            self.cache.cond.notify_all();
        }
    }
}

// ---------------------------------------------------------------------
// Local (per-read) cache and the two-level view
// ---------------------------------------------------------------------

/// Per-read cache level.  Owns the contiguous range list every `QVal`
/// of the current read points into.  Reset between reads; the backing
/// buffers are reused.
#[derive(Default)]
pub struct LocalCache {
    map: HashMap<SeedFingerprint, QVal>,
    ranges: Vec<RangeHit>,
}

impl LocalCache {
    pub fn new() -> LocalCache {
        LocalCache::default()
    }

    /// Forget the previous read's entries, keeping allocations.
    pub fn reset(&mut self) {
        self.map.clear();
        self.ranges.clear();
    }

    pub fn lookup(&self, key: &SeedFingerprint) -> Option<QVal> {
        self.map.get(key).copied()
    }

    /// Ranges a valid `QVal` names.
    pub fn ranges(&self, qv: &QVal) -> &[RangeHit] {
        if !qv.valid() {
            return &[];
        }
        let start = qv.idx as usize;
        &self.ranges[start..start + qv.rangen as usize]
    }

    /// Install an already-built range list (e.g. copied from the shared
    /// level) under `key`.
    pub fn install(&mut self, key: SeedFingerprint, hits: &[RangeHit]) -> QVal {
        let start = self.ranges.len() as u32;
        let mut eltn = 0u64;
        for h in hits {
            eltn += h.num_elts();
            self.ranges.push(h.clone());
        }
        let qv = QVal::new(start, hits.len() as u32, eltn.min(u32::MAX as u64) as u32);
        self.map.insert(key, qv);
        qv
    }

    pub fn num_ranges(&self) -> usize {
        self.ranges.len()
    }
}

/// Where a cache answer came from, for metrics attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Local,
    Shared,
}

/// Resolution of one fingerprint against both cache levels.
pub enum CacheAnswer {
    /// Answer served without running a search.
    Hit(QVal, CacheSource),
    /// Caller must run the search and feed ranges to the returned
    /// builder.  `oom` is true when the shared level refused the build.
    Miss { shared: Option<Box<dyn SharedBuildHandle>>, oom: bool },
}

/// The two-level cache view the aligner works against: a per-read
/// local cache plus an optional process-wide shared cache.
pub struct AlignmentCache {
    pub local: LocalCache,
    shared: Option<Arc<dyn SharedCache>>,
}

impl AlignmentCache {
    pub fn new(shared: Option<Arc<dyn SharedCache>>) -> AlignmentCache {
        AlignmentCache { local: LocalCache::new(), shared }
    }

    pub fn local_only() -> AlignmentCache {
        AlignmentCache::new(None)
    }

    /// Start a new read: clears the local level only.
    pub fn reset(&mut self) {
        self.local.reset();
    }

    /// Resolve `key` per the two-level flow: local, then shared, then
    /// become (or wait for) the shared builder.
    pub fn resolve(&mut self, key: &SeedFingerprint) -> CacheAnswer {
        if let Some(qv) = self.local.lookup(key) {
            return CacheAnswer::Hit(qv, CacheSource::Local);
        }
        let shared = match &self.shared {
            Some(s) => Arc::clone(s),
            None => return CacheAnswer::Miss { shared: None, oom: false },
        };
        if let Some(hits) = shared.lookup(key) {
            let qv = self.local.install(key.clone(), &hits);
            return CacheAnswer::Hit(qv, CacheSource::Shared);
        }
        loop {
            match shared.begin_add(key) {
                Ok(BeginAdd::Build(h)) => {
                    return CacheAnswer::Miss { shared: Some(h), oom: false };
                }
                Ok(BeginAdd::Present(hits)) => {
                    let qv = self.local.install(key.clone(), &hits);
                    return CacheAnswer::Hit(qv, CacheSource::Shared);
                }
                Ok(BeginAdd::Pending) => match shared.wait(key) {
                    Some(hits) => {
                        let qv = self.local.install(key.clone(), &hits);
                        return CacheAnswer::Hit(qv, CacheSource::Shared);
                    }
                    // Builder abandoned; try to take over.
                    None => continue,
                },
                Err(CacheOom) => {
                    return CacheAnswer::Miss { shared: None, oom: true };
                }
            }
        }
    }

    /// Begin collecting ranges for `key` after a `Miss`.
    pub fn builder<'a>(
        &'a mut self,
        key: SeedFingerprint,
        shared: Option<Box<dyn SharedBuildHandle>>,
    ) -> RangeBuilder<'a> {
        RangeBuilder {
            local: &mut self.local,
            key,
            start: 0,
            started: false,
            rangen: 0,
            eltn: 0,
            shared,
            seen: HashSet::new(),
            oom: false,
        }
    }
}

/// Collects the ranges of one build, writing them into the local level
/// and mirroring them into the shared build handle when one is held.
/// Duplicate coordinates are suppressed here, which gives the cache its
/// set discipline.
pub struct RangeBuilder<'a> {
    local: &'a mut LocalCache,
    key: SeedFingerprint,
    start: u32,
    started: bool,
    rangen: u32,
    eltn: u64,
    shared: Option<Box<dyn SharedBuildHandle>>,
    seen: HashSet<BiRange>,
    oom: bool,
}

impl<'a> RangeBuilder<'a> {
    /// Add one hit.  Returns false when the tuple was a duplicate.
    pub fn add(&mut self, hit: RangeHit) -> bool {
        if !self.seen.insert(hit.rng) {
            return false;
        }
        if !self.started {
            self.start = self.local.ranges.len() as u32;
            self.started = true;
        }
        if let Some(h) = self.shared.as_mut() {
            if h.add_range(&hit).is_err() {
                // Recoverable: drop the shared side, keep building
                // locally.  The handle's Drop releases the pending slot.
                self.shared = None;
                self.oom = true;
            }
        }
        self.rangen += 1;
        self.eltn += hit.num_elts();
        self.local.ranges.push(hit);
        true
    }

    /// Whether the shared level dropped out mid-build.
    pub fn hit_oom(&self) -> bool {
        self.oom
    }

    /// Finish the build: installs the `QVal` locally, finalizes the
    /// shared entry when still held, and reports whether an OOM was
    /// seen anywhere along the way.
    pub fn finalize(mut self) -> (QVal, bool) {
        let start = if self.started { self.start } else { self.local.ranges.len() as u32 };
        let qv = QVal::new(start, self.rangen, self.eltn.min(u32::MAX as u64) as u32);
        self.local.map.insert(self.key.clone(), qv);
        let mut oom = self.oom;
        if let Some(h) = self.shared.take() {
            if h.finalize().is_err() {
                oom = true;
            }
        }
        (qv, oom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::BiRange;

    fn hit(topf: u64, len: u32) -> RangeHit {
        RangeHit {
            rng: BiRange { topf, botf: topf + 2, topb: 10 + topf, botb: 12 + topf },
            len,
            edits: Vec::new(),
        }
    }

    #[test]
    fn local_build_and_lookup() {
        let mut cache = AlignmentCache::local_only();
        let key = SeedFingerprint::new(&[0, 1, 2, 3], true);
        assert!(matches!(cache.resolve(&key), CacheAnswer::Miss { shared: None, oom: false }));
        let mut b = cache.builder(key.clone(), None);
        assert!(b.add(hit(5, 4)));
        assert!(!b.add(hit(5, 4))); // duplicate coordinates suppressed
        assert!(b.add(hit(9, 4)));
        let (qv, oom) = b.finalize();
        assert!(!oom);
        assert_eq!(qv.num_ranges(), 2);
        assert_eq!(qv.num_elts(), 4);
        match cache.resolve(&key) {
            CacheAnswer::Hit(got, CacheSource::Local) => {
                assert_eq!(got, qv);
                assert_eq!(cache.local.ranges(&got).len(), 2);
            }
            _ => panic!("expected local hit"),
        }
    }

    #[test]
    fn orientation_is_part_of_the_key() {
        let mut cache = AlignmentCache::local_only();
        let kf = SeedFingerprint::new(&[0, 0, 1], true);
        let kr = SeedFingerprint::new(&[0, 0, 1], false);
        let b = cache.builder(kf.clone(), None);
        b.finalize();
        assert!(matches!(cache.resolve(&kf), CacheAnswer::Hit(..)));
        assert!(matches!(cache.resolve(&kr), CacheAnswer::Miss { .. }));
    }

    #[test]
    fn shared_round_trip() {
        let shared = InMemorySharedCache::new(1024);
        let key = SeedFingerprint::new(&[1, 1, 2, 2], true);

        // First read builds.
        let mut c1 = AlignmentCache::new(Some(Arc::new(shared.clone())));
        let h = match c1.resolve(&key) {
            CacheAnswer::Miss { shared: h, oom: false } => h,
            _ => panic!("expected miss"),
        };
        assert!(h.is_some());
        let mut b = c1.builder(key.clone(), h);
        b.add(hit(3, 4));
        let (qv, oom) = b.finalize();
        assert!(!oom);
        assert!(qv.valid());

        // Second read (fresh local level) is served by the shared level.
        let mut c2 = AlignmentCache::new(Some(Arc::new(shared.clone())));
        match c2.resolve(&key) {
            CacheAnswer::Hit(got, CacheSource::Shared) => {
                assert_eq!(got.num_ranges(), 1);
                assert_eq!(c2.local.ranges(&got), c1.local.ranges(&qv));
            }
            _ => panic!("expected shared hit"),
        }
    }

    #[test]
    fn abandoned_build_releases_slot() {
        let shared = InMemorySharedCache::new(1024);
        let key = SeedFingerprint::new(&[3, 3], false);
        match shared.begin_add(&key).unwrap() {
            BeginAdd::Build(h) => drop(h), // abandon
            _ => panic!("expected build"),
        }
        // The slot must be free again.
        assert!(matches!(shared.begin_add(&key).unwrap(), BeginAdd::Build(_)));
        assert!(shared.wait(&key).is_none() || shared.lookup(&key).is_none());
    }

    #[test]
    fn capacity_cap_reports_oom() {
        let shared = InMemorySharedCache::new(1);
        let k1 = SeedFingerprint::new(&[0], true);
        let k2 = SeedFingerprint::new(&[1], true);
        let mut h = match shared.begin_add(&k1).unwrap() {
            BeginAdd::Build(h) => h,
            _ => panic!(),
        };
        h.add_range(&hit(0, 1)).unwrap();
        assert_eq!(h.add_range(&hit(4, 1)), Err(CacheOom));
        h.finalize().unwrap();
        assert_eq!(shared.num_keys(), 1);
        // Cache is full now.
        assert!(matches!(shared.begin_add(&k2), Err(CacheOom)));
    }

    #[test]
    fn empty_build_still_installs() {
        // A searched seed with zero hits must be remembered so the
        // search is not repeated.
        let mut cache = AlignmentCache::local_only();
        let key = SeedFingerprint::new(&[2, 2, 2], true);
        let b = cache.builder(key.clone(), None);
        let (qv, _) = b.finalize();
        assert!(qv.valid());
        assert!(qv.empty());
        assert!(matches!(cache.resolve(&key), CacheAnswer::Hit(..)));
    }
}
