use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use telemetry_ring::BoundedRingBuffer;

const MSG_PER_PRODUCER: u64 = 100_000;
const CAPACITY: usize = 2048;
const DRAIN_BATCH: usize = 512;

fn bench_uncontended(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended");
    group.throughput(Throughput::Elements(CAPACITY as u64));

    group.bench_function("fill_then_drain", |b| {
        let buffer = BoundedRingBuffer::<u64>::new(CAPACITY);
        b.iter(|| {
            for i in 0..CAPACITY as u64 {
                let _ = buffer.try_push(Box::new(i));
            }
            buffer.consume(CAPACITY, |range| {
                for item in range.drain() {
                    black_box(item);
                }
            });
        });
    });

    group.finish();
}

fn bench_mpsc(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpsc");

    for num_producers in [1usize, 2, 4, 8] {
        let total_msgs = MSG_PER_PRODUCER * num_producers as u64;
        group.throughput(Throughput::Elements(total_msgs));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}P_1C", num_producers)),
            &num_producers,
            |b, &n| {
                b.iter(|| {
                    let buffer = Arc::new(BoundedRingBuffer::<u64>::new(CAPACITY));
                    let done = Arc::new(AtomicBool::new(false));

                    let consumer = {
                        let buffer = Arc::clone(&buffer);
                        let done = Arc::clone(&done);
                        thread::spawn(move || {
                            let mut count = 0u64;
                            loop {
                                let finished = done.load(Ordering::Acquire);
                                buffer.consume(DRAIN_BATCH, |range| {
                                    for item in range.drain() {
                                        black_box(item);
                                        count += 1;
                                    }
                                });
                                if finished && buffer.is_empty() {
                                    return count;
                                }
                            }
                        })
                    };

                    let producers: Vec<_> = (0..n)
                        .map(|_| {
                            let buffer = Arc::clone(&buffer);
                            thread::spawn(move || {
                                for i in 0..MSG_PER_PRODUCER {
                                    let mut item = Some(Box::new(i));
                                    while !buffer.add(&mut item) {
                                        std::hint::spin_loop();
                                    }
                                }
                            })
                        })
                        .collect();

                    for h in producers {
                        h.join().unwrap();
                    }
                    done.store(true, Ordering::Release);
                    black_box(consumer.join().unwrap());
                });
            },
        );
    }

    group.finish();
}

fn bench_drop_on_full(c: &mut Criterion) {
    let mut group = c.benchmark_group("drop_on_full");
    group.throughput(Throughput::Elements(1));

    group.bench_function("rejected_push", |b| {
        let buffer = BoundedRingBuffer::<u64>::new(16);
        for i in 0..16 {
            let _ = buffer.try_push(Box::new(i));
        }
        b.iter(|| {
            let mut item = Some(Box::new(black_box(7u64)));
            black_box(buffer.add(&mut item));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_uncontended, bench_mpsc, bench_drop_on_full);
criterion_main!(benches);
