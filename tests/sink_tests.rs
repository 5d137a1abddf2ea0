// Observer sink integration: the aligner must tap hit, counter and
// action sinks without them feeding anything back into the search.

use seed_align::aligner::SeedAligner;
use seed_align::cache::AlignmentCache;
use seed_align::driver::{align_read, SeedSearchConfig};
use seed_align::index::RefIndex;
use seed_align::metrics::SeedSearchMetrics;
use seed_align::penalty::Penalties;
use seed_align::read::Read;
use seed_align::results::SeedResults;
use seed_align::seed::Seed;
use seed_align::sinks::{
    SeedActionSink, SeedCounterSink, SeedHitSink, SinkSet, StreamTabSeedActionSink,
    StreamTabSeedCounterSink, StreamTabSeedHitSink,
};

#[test]
fn stream_sinks_observe_the_search() {
    let mut reference = vec![b'T'; 20];
    reference.extend_from_slice(b"ACGGAGGC");
    reference.extend_from_slice(&vec![b'T'; 20]);
    let index = RefIndex::new(&reference, 2);

    let read = Read::with_flat_qual("sunk", b"ACGGAGGC", 30);
    let seeds = Seed::zero_mm_seeds(4);
    let cfg = SeedSearchConfig::new(&seeds, 4, Penalties::default_table());

    let hit_sink = StreamTabSeedHitSink::new(Vec::new());
    let counter_sink = StreamTabSeedCounterSink::new(Vec::new());
    let action_sink = StreamTabSeedActionSink::new(Vec::new());
    let hits: [&dyn SeedHitSink; 1] = [&hit_sink];
    let counters: [&dyn SeedCounterSink; 1] = [&counter_sink];
    let actions: [&dyn SeedActionSink; 1] = [&action_sink];
    let sinks = SinkSet { hit: &hits, counter: &counters, action: &actions };

    let mut aligner = SeedAligner::new();
    let mut cache = AlignmentCache::local_only();
    let mut sr = SeedResults::new();
    let mut met = SeedSearchMetrics::new();
    align_read(
        &mut aligner,
        &index,
        &read,
        &cfg,
        &mut cache,
        &mut sr,
        &mut met,
        &sinks,
    )
    .expect("alignment failed");

    // One hit line per non-empty (orientation, offset), three fields
    // each.
    let hit_out = String::from_utf8(hit_sink.into_inner()).unwrap();
    assert_eq!(hit_out.lines().count(), sr.nonzero_offsets());
    for line in hit_out.lines() {
        assert_eq!(line.split('\t').count(), 3);
        assert!(line.starts_with("ACGGAGGC\t"));
    }

    // One counter record for the read, 15 fields.
    let counter_out = String::from_utf8(counter_sink.into_inner()).unwrap();
    let lines: Vec<&str> = counter_out.lines().collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].split('\t').count(), 15);

    // Actions were traced (at least the initial jumps), 7 fields each.
    let action_out = String::from_utf8(action_sink.into_inner()).unwrap();
    assert!(action_out.lines().count() > 0);
    for line in action_out.lines() {
        assert_eq!(line.split('\t').count(), 7);
    }
}

#[test]
fn absent_sinks_change_nothing() {
    let mut reference = vec![b'T'; 20];
    reference.extend_from_slice(b"ACGGAGGC");
    reference.extend_from_slice(&vec![b'T'; 20]);
    let index = RefIndex::new(&reference, 2);
    let read = Read::with_flat_qual("plain", b"ACGGAGGC", 30);
    let seeds = Seed::zero_mm_seeds(4);
    let cfg = SeedSearchConfig::new(&seeds, 4, Penalties::default_table());

    let run = |sinks: &SinkSet| {
        let mut aligner = SeedAligner::new();
        let mut cache = AlignmentCache::local_only();
        let mut sr = SeedResults::new();
        let mut met = SeedSearchMetrics::new();
        align_read(&mut aligner, &index, &read, &cfg, &mut cache, &mut sr, &mut met, sinks)
            .expect("alignment failed");
        (sr.num_ranges(), sr.num_elts(), met)
    };

    let hit_sink = StreamTabSeedHitSink::new(Vec::new());
    let hits: [&dyn SeedHitSink; 1] = [&hit_sink];
    let with_sinks = SinkSet { hit: &hits, counter: &[], action: &[] };
    assert_eq!(run(&SinkSet::none()), run(&with_sinks));
}
