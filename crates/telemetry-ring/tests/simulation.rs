//! Multi-threaded simulation: several producers race one consumer that
//! drains random-sized ranges. The multiset of accepted items must equal the
//! multiset of drained items, for every buffer size.

use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use telemetry_ring::BoundedRingBuffer;

const PRODUCERS: usize = 4;
const ITEMS_PER_PRODUCER: usize = 25_000;

fn run_producers(buffer: &Arc<BoundedRingBuffer<u32>>) -> Vec<u32> {
    let handles: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let buffer = Arc::clone(buffer);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                let mut accepted = Vec::new();
                for _ in 0..ITEMS_PER_PRODUCER {
                    let value: u32 = rng.gen();
                    let mut item = Some(Box::new(value));
                    if buffer.add(&mut item) {
                        accepted.push(value);
                    }
                }
                accepted
            })
        })
        .collect();

    handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect()
}

fn run_consumer(buffer: &BoundedRingBuffer<u32>, exit: &AtomicBool) -> Vec<u32> {
    let mut rng = rand::thread_rng();
    let mut drained = Vec::new();
    loop {
        // Read the flag before peeking: once set, producers are done and an
        // empty snapshot means nothing more can arrive.
        let producers_done = exit.load(Ordering::Acquire);
        let available = buffer.peek().len;
        if producers_done && available == 0 {
            return drained;
        }

        let n = rng.gen_range(0..=available);
        buffer.consume(n, |range| {
            assert_eq!(range.len(), n, "consumer is the only one shrinking the buffer");
            range.for_each(|slot| {
                let item = slot.take().expect("reserved slot must be occupied");
                drained.push(*item);
                true
            });
        });
    }
}

#[test]
fn test_simulation_across_capacities() {
    for capacity in [1, 2, 10, 50, 100, 1000] {
        let buffer = Arc::new(BoundedRingBuffer::new(capacity));
        let exit = Arc::new(AtomicBool::new(false));

        let consumer = {
            let buffer = Arc::clone(&buffer);
            let exit = Arc::clone(&exit);
            thread::spawn(move || run_consumer(&buffer, &exit))
        };

        let mut produced = run_producers(&buffer);
        exit.store(true, Ordering::Release);
        let mut consumed = consumer.join().unwrap();

        produced.sort_unstable();
        consumed.sort_unstable();
        assert_eq!(
            produced.len(),
            consumed.len(),
            "capacity {}: item count mismatch",
            capacity
        );
        assert_eq!(produced, consumed, "capacity {}: multiset mismatch", capacity);
    }
}

#[test]
fn test_per_producer_fifo_under_contention() {
    let buffer = Arc::new(BoundedRingBuffer::<(usize, usize)>::new(64));
    let exit = Arc::new(AtomicBool::new(false));

    let consumer = {
        let buffer = Arc::clone(&buffer);
        let exit = Arc::clone(&exit);
        thread::spawn(move || {
            let mut last_seen = vec![None::<usize>; PRODUCERS];
            let mut total = 0;
            loop {
                let done = exit.load(Ordering::Acquire);
                if done && buffer.is_empty() {
                    return total;
                }
                buffer.consume(16, |range| {
                    for item in range.drain() {
                        let (producer, seq) = *item;
                        if let Some(prev) = last_seen[producer] {
                            assert!(seq > prev, "producer {} reordered: {} after {}", producer, seq, prev);
                        }
                        last_seen[producer] = Some(seq);
                        total += 1;
                    }
                });
            }
        })
    };

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                let mut sent = 0;
                for seq in 0..10_000 {
                    let mut item = Some(Box::new((producer, seq)));
                    // Spin until accepted so every item gets through
                    while !buffer.add(&mut item) {
                        thread::yield_now();
                    }
                    sent += 1;
                }
                sent
            })
        })
        .collect();

    let sent: usize = producers.into_iter().map(|h| h.join().unwrap()).sum();
    exit.store(true, Ordering::Release);
    let received = consumer.join().unwrap();

    assert_eq!(sent, PRODUCERS * 10_000);
    assert_eq!(received, sent);
}
