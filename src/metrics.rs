// Work accounting for the seed search: per-read counters, per-action
// trace records, and the process-wide aggregate that worker threads
// merge into at their join points.

use crate::edit::Edit;

/// Per-read counters characterizing the work one `search_all_seeds`
/// call did.  Depth-stratified slots record activity at recursion
/// depths 0, 1, 2 and 3-or-deeper.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedCounters {
    /// Seeds searched (search strategies executed).
    pub seed: u64,
    /// ftab prefix jumps.
    pub ftab: u64,
    /// fchr single-base jumps.
    pub fchr: u64,
    /// Match advances, total and by depth.
    pub matches: u64,
    pub matchd: [u64; 4],
    /// Edit advances, total and by depth.
    pub edits: u64,
    pub editd: [u64; 4],
    /// Valid alignments found.
    pub hits: u64,
    /// Deepest recursion reached.
    pub max_depth: usize,
}

impl SeedCounters {
    pub fn reset(&mut self) {
        *self = SeedCounters::default();
    }

    #[inline]
    pub fn note_match(&mut self, depth: usize) {
        self.matches += 1;
        self.matchd[depth.min(3)] += 1;
    }

    #[inline]
    pub fn note_edit(&mut self, depth: usize) {
        self.edits += 1;
        self.editd[depth.min(3)] += 1;
    }

    #[inline]
    pub fn note_depth(&mut self, depth: usize) {
        if depth > self.max_depth {
            self.max_depth = depth;
        }
    }
}

/// What a trace action was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedActionKind {
    FtabJump,
    FchrJump,
    Match,
    Edit,
}

impl SeedActionKind {
    /// Stable numeric code used by the tab-delimited action sink.
    pub fn code(&self) -> u32 {
        match self {
            SeedActionKind::FtabJump => 0,
            SeedActionKind::FchrJump => 1,
            SeedActionKind::Match => 2,
            SeedActionKind::Edit => 3,
        }
    }
}

/// One traced search action, collected only when an action sink is
/// attached.
#[derive(Debug, Clone, Copy)]
pub struct SeedAction {
    pub kind: SeedActionKind,
    /// Index of the seed policy within the read's seed set.
    pub seed: u32,
    /// Seed offset from the 5' end.
    pub seedoff: u32,
    /// Seed position before the jump.
    pub pos: u32,
    /// Direction of the jump.
    pub ltr: bool,
    /// Number of positions resolved by the action.
    pub len: u32,
    /// Recursion depth at the time.
    pub depth: u32,
    /// Edit performed, for `Edit` actions.
    pub edit: Option<Edit>,
}

/// Summary of what the seed aligner did, aggregated across reads and
/// threads.  Per-thread instances are plain data; a shared instance is
/// only ever updated through `merge` at a synchronization point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSearchMetrics {
    /// Times the aligner executed the search strategy of an
    /// instantiated seed.
    pub seedsearch: u64,
    /// Offsets where at least one strategy ran.
    pub possearch: u64,
    /// Offsets answered by the current read's cache.
    pub intrahit: u64,
    /// Offsets answered by the across-read cache.
    pub interhit: u64,
    /// Seed instantiations skipped because of Ns.
    pub filteredseed: u64,
    /// Recoverable shared-cache out-of-memory events.
    pub ooms: u64,
    /// Burrows-Wheeler range operations.
    pub bwops: u64,
    /// Burrows-Wheeler edits introduced.
    pub bweds: u64,
    /// Index ranges discarded for inconsistent arithmetic.
    pub ovfs: u64,
}

impl SeedSearchMetrics {
    pub fn new() -> SeedSearchMetrics {
        SeedSearchMetrics::default()
    }

    /// Sum another instance into this one.  This is the only way a
    /// shared instance is updated; callers hold the owning lock.
    pub fn merge(&mut self, m: &SeedSearchMetrics) {
        self.seedsearch += m.seedsearch;
        self.possearch += m.possearch;
        self.intrahit += m.intrahit;
        self.interhit += m.interhit;
        self.filteredseed += m.filteredseed;
        self.ooms += m.ooms;
        self.bwops += m.bwops;
        self.bweds += m.bweds;
        self.ovfs += m.ovfs;
    }

    pub fn reset(&mut self) {
        *self = SeedSearchMetrics::default();
    }
}
