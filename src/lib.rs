// Seed alignment core for a short-read DNA aligner.
//
// Given a read, a set of seed policies and a bidirectional FM-index
// pair, the core extracts fixed-length seeds at regular offsets on
// both strands and enumerates, for each seed, the suffix-array ranges
// where it occurs under a per-seed edit budget.  Results are cached at
// two levels (within a read and across reads) and ranked by ascending
// range size for downstream extension.

pub mod aligner;
pub mod cache;
pub mod constraint;
pub mod driver;
pub mod edit;
pub mod index; // FM-index pair interface + naive reference implementation
pub mod metrics;
pub mod penalty;
pub mod read;
pub mod results;
pub mod seed;
pub mod sinks;

pub use aligner::{AlignError, SeedAligner};
pub use cache::{AlignmentCache, InMemorySharedCache, QVal, RangeHit, SeedFingerprint, SharedCache};
pub use constraint::Constraint;
pub use driver::{align_read, search_reads, SeedSearchConfig};
pub use edit::{Edit, EditKind};
pub use index::{BiRange, Direction, FmIndexPair, RefIndex};
pub use metrics::{SeedCounters, SeedSearchMetrics};
pub use penalty::Penalties;
pub use read::Read;
pub use results::SeedResults;
pub use seed::{InstantiatedSeed, Seed, SeedType};
pub use sinks::{SeedActionSink, SeedCounterSink, SeedHitSink, SinkSet};
