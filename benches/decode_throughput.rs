//! Benchmarks for decoding and running-order throughput
//!
//! Measures:
//! - Record parsing from capture text
//! - Decoding a full synthetic race into domain events
//! - The complete pipeline with a position tracker and interval recorder
//! - Resync search over a recorded timeline
//!
//! Platform: Cross-platform (synthetic captures, CI-safe)

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use livetiming::history::History;
use livetiming::test_utils::synthetic_race;
use livetiming::{Decoder, Pipeline, PositionTracker, Update};
use std::hint::black_box;

const GRID: [u32; 20] =
    [1, 4, 5, 6, 10, 12, 14, 16, 18, 22, 23, 27, 30, 31, 43, 44, 55, 63, 81, 87];

fn parse_capture(capture: &str) -> Vec<Update> {
    capture
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            Update::parse_record(line, i + 1).expect("Synthetic record is valid")
        })
        .enumerate()
        .map(|(sequence, update)| update.with_sequence(sequence as u64))
        .collect()
}

fn bench_record_parsing(c: &mut Criterion) {
    let capture = synthetic_race(&GRID, 70, [7, 8, 6]);

    let mut group = c.benchmark_group("record_parsing");
    group.throughput(Throughput::Bytes(capture.len() as u64));
    group.bench_function("synthetic_race_70_laps", |b| {
        b.iter(|| black_box(parse_capture(black_box(&capture))))
    });
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for laps in [10u32, 70] {
        let updates = parse_capture(&synthetic_race(&GRID, laps, [7, 8, 6]));
        group.throughput(Throughput::Elements(updates.len() as u64));
        group.bench_with_input(BenchmarkId::new("synthetic_race", laps), &updates, |b, updates| {
            b.iter(|| {
                let mut decoder = Decoder::new();
                let mut events = 0usize;
                for update in updates {
                    let decoded = decoder.decode(black_box(update));
                    events += decoded.expect("Synthetic race decodes").len();
                }
                black_box(events)
            })
        });
    }

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let updates = parse_capture(&synthetic_race(&GRID, 70, [7, 8, 6]));

    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Elements(updates.len() as u64));
    group.bench_function("tracker_and_recorder", |b| {
        b.iter(|| {
            let history = History::new();
            let mut pipeline = Pipeline::new();
            pipeline.subscribe(PositionTracker::new()).subscribe(history.interval_recorder());
            for update in &updates {
                pipeline.feed(black_box(update)).expect("Synthetic race feeds");
            }
            black_box(history.snapshot_count())
        })
    });
    group.finish();
}

fn bench_resync_search(c: &mut Criterion) {
    let updates = parse_capture(&synthetic_race(&GRID, 70, [7, 8, 6]));
    let history = History::new();
    let mut pipeline = Pipeline::new();
    pipeline.subscribe(history.interval_recorder());
    for update in &updates {
        pipeline.feed(update).expect("Synthetic race feeds");
    }

    // A sample from the middle of the race
    let middle = updates[updates.len() / 2].sequence;
    let observed = (0..=middle)
        .rev()
        .find_map(|sequence| history.snapshot_at(sequence))
        .expect("Timeline has a snapshot before the middle");
    let observed: livetiming::history::Intervals =
        observed.iter().take(5).map(|(d, i)| (*d, *i)).collect();

    c.bench_function("resync_find_70_laps", |b| {
        b.iter(|| black_box(history.find(black_box(&observed))))
    });
}

criterion_group!(benches, bench_record_parsing, bench_decode, bench_pipeline, bench_resync_search);
criterion_main!(benches);
