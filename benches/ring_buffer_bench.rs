//! Performance benchmarks for ByteRingBuffer.
//!
//! Measures push/pop throughput for the chunk sizes the transport sees:
//! single bytes from `write_byte`, short writes, and full-buffer drains by
//! the pump.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench ring_buffer_bench
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use hostserial_transport::ByteRingBuffer;
use std::hint::black_box;

/// Push `chunk`-sized writes and drain them, one full buffer per iteration.
fn bench_push_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_commit");

    for chunk in [1usize, 16, 64, 256].iter() {
        group.throughput(Throughput::Bytes(256));
        let data = vec![0xa5u8; *chunk];
        let buffer = ByteRingBuffer::new(256).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(chunk), chunk, |b, &chunk| {
            b.iter(|| {
                for _ in 0..(256 / chunk) {
                    assert!(buffer.try_push(black_box(&data)));
                }
                while let Some(run) = buffer.try_pop_up_to(256) {
                    black_box(run.commit());
                }
            });
        });
    }

    group.finish();
}

/// Steady state with the write position wandering around the wrap point.
fn bench_wrapping_runs(c: &mut Criterion) {
    let mut group = c.benchmark_group("wrapping_runs");
    group.throughput(Throughput::Bytes(100));

    let buffer = ByteRingBuffer::new(256).unwrap();
    let data = [0x5au8; 100];

    group.bench_function("push_100_pop_100", |b| {
        b.iter(|| {
            assert!(buffer.try_push(black_box(&data)));
            let mut taken = 0;
            while taken < data.len() {
                let run = buffer.try_pop_up_to(data.len() - taken).unwrap();
                taken += run.len();
                black_box(run.commit());
            }
        });
    });

    group.finish();
}

/// Bytes handed out and returned without commit, as after a failed transmit.
fn bench_pop_release(c: &mut Criterion) {
    let buffer = ByteRingBuffer::new(256).unwrap();
    assert!(buffer.try_push(&[0u8; 256]));

    c.bench_function("pop_release_256", |b| {
        b.iter(|| {
            let run = buffer.try_pop_up_to(256).unwrap();
            black_box(run.len());
        });
    });
}

criterion_group!(
    benches,
    bench_push_commit,
    bench_wrapping_runs,
    bench_pop_release
);
criterion_main!(benches);
