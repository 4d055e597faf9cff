//! Benchmark suite for the reconciliation core.
//!
//! Covers the paths that run on every workflow invocation:
//! - Task hashing (description normalization + SHA-256)
//! - Checklist parsing of large spec files
//! - Status synchronization and next-task selection
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! cargo bench -- --save-baseline main
//! cargo bench -- --baseline main
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use claudestep::reconcile::{find_next_available_task, metadata_open_prs};
use claudestep::testing::{MetadataFixture, FIXTURE_PROJECT};
use claudestep::{generate_task_hash, Checklist, PrState, SkipSet};

/// Build a spec with `count` tasks, the first quarter checked off.
fn large_spec(count: u32) -> String {
    let mut spec = String::from("# Tasks\n\nSome prose that is not a task.\n\n");
    for i in 1..=count {
        let mark = if i <= count / 4 { 'x' } else { ' ' };
        spec.push_str(&format!("- [{mark}] Implement step {i} of the migration plan\n"));
    }
    spec
}

// ============================================================================
// Hashing
// ============================================================================

fn bench_task_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("task_hash");

    for description in [
        "Add login endpoint",
        "  Hash   passwords with argon2 and migrate the existing rows in the users table  ",
    ] {
        group.bench_with_input(
            BenchmarkId::new("generate", description.len()),
            description,
            |b, description| b.iter(|| black_box(generate_task_hash(black_box(description)))),
        );
    }

    group.finish();
}

// ============================================================================
// Checklist parsing
// ============================================================================

fn bench_checklist_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("checklist_parse");

    for count in [10, 100, 1000] {
        let spec = large_spec(count);
        group.throughput(Throughput::Elements(u64::from(count)));
        group.bench_with_input(BenchmarkId::new("parse", count), &spec, |b, spec| {
            b.iter(|| black_box(Checklist::parse(black_box(spec))));
        });
    }

    group.finish();
}

// ============================================================================
// Reconciliation
// ============================================================================

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");

    for count in [10, 100, 1000] {
        let spec = large_spec(count);
        let checklist = Checklist::parse(&spec);

        // One PR per checked task plus an open PR on every tenth unchecked one
        let mut fixture = MetadataFixture::new(FIXTURE_PROJECT).with_checklist(&spec);
        for index in 1..=count {
            if index <= count / 4 {
                fixture = fixture.with_pr(index, u64::from(index), "alice", PrState::Merged);
            } else if index % 10 == 0 {
                fixture = fixture.with_pr(index, u64::from(index), "bob", PrState::Open);
            }
        }
        let metadata = fixture.build();

        group.throughput(Throughput::Elements(u64::from(count)));
        group.bench_with_input(
            BenchmarkId::new("sync_task_statuses", count),
            &metadata,
            |b, metadata| {
                b.iter(|| {
                    let mut metadata = metadata.clone();
                    metadata.sync_task_statuses();
                    black_box(metadata)
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("find_next_available_task", count),
            &(checklist, metadata),
            |b, (checklist, metadata)| {
                b.iter(|| {
                    let skip = SkipSet::from_refs(&metadata_open_prs(metadata));
                    black_box(find_next_available_task(black_box(checklist), &skip))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_task_hash, bench_checklist_parse, bench_reconcile);
criterion_main!(benches);
