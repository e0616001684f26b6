//! Benchmarks for the task queue.
//!
//! Covers:
//! - One-shot submit -> retire churn through a warm pool
//! - Status-table snapshot reads against table size

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use taskmill::{FnTask, RunAgain, TaskQueue};

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_one_shot_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("one_shot_churn");

    for batch in [16u64, 128] {
        group.throughput(Throughput::Elements(batch));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            let queue = TaskQueue::with_threads("bench-churn", 4).unwrap();
            let done = Arc::new(AtomicUsize::new(0));
            // Ids stay unique across iterations; retiring tasks free theirs
            // asynchronously.
            let mut next_id = 0i64;

            b.iter(|| {
                let before = done.load(Ordering::SeqCst);
                for _ in 0..batch {
                    next_id += 1;
                    let done = Arc::clone(&done);
                    queue.add_task(Arc::new(FnTask::new(next_id, 0, move |_| {
                        done.fetch_add(1, Ordering::SeqCst);
                        RunAgain::No
                    })));
                }
                while done.load(Ordering::SeqCst) < before + batch as usize {
                    std::thread::yield_now();
                }
            });
        });
    }
    group.finish();
}

fn bench_status_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("status_snapshot");

    for rows in [16usize, 256] {
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, &rows| {
            let queue = TaskQueue::with_threads("bench-status", 1).unwrap();
            // Far-future periodic tasks keep the table populated.
            for id in 0..rows {
                queue.add_task(Arc::new(FnTask::new(id as i64, 3_600_000, |_| {
                    RunAgain::Yes
                })));
            }

            b.iter(|| {
                let total = queue
                    .view_task_status(|rows| rows.iter().map(|r| r.message.len()).sum::<usize>());
                black_box(total);
            });
        });
    }
    group.finish();
}

// ============================================================================
// Benchmark Groups
// ============================================================================

criterion_group!(queue_benches, bench_one_shot_churn, bench_status_snapshot);

criterion_main!(queue_benches);
