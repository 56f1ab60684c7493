//! Queue correctness: FIFO order, exact-set drains, producer/consumer
//! conservation, drop accounting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use vigil_collections::Queue;

#[test]
fn empty_queue_dequeues_none() {
    let queue: Queue<i32> = Queue::new();
    assert!(queue.is_empty());
    assert_eq!(queue.dequeue(), None);
}

#[test]
fn single_enqueue_dequeue_round_trip() {
    let queue = Queue::new();
    queue.enqueue(42);
    assert!(!queue.is_empty());
    assert_eq!(queue.dequeue(), Some(42));
    assert_eq!(queue.dequeue(), None);
}

#[test]
fn sequential_fifo_order() {
    let queue = Queue::new();
    const COUNT: u32 = 10_000;

    for i in 1..=COUNT {
        queue.enqueue(i);
    }
    for i in 1..=COUNT {
        assert_eq!(queue.dequeue(), Some(i));
    }
    assert_eq!(queue.dequeue(), None);
}

/// Pre-filled queue, four consumers, no producers: the union of everything
/// dequeued is exactly the original contents, with no duplicates.
#[test]
fn concurrent_dequeue_drains_exact_set() {
    const COUNT: usize = 10_000;
    const THREADS: usize = 4;

    let queue = Arc::new(Queue::new());
    for i in 0..COUNT {
        queue.enqueue(i);
    }

    let mut handles = Vec::new();
    for _ in 0..THREADS {
        let queue = queue.clone();
        handles.push(thread::spawn(move || {
            let mut taken = Vec::new();
            while let Some(value) = queue.dequeue() {
                taken.push(value);
            }
            taken
        }));
    }

    let mut all: Vec<usize> = Vec::with_capacity(COUNT);
    for handle in handles {
        all.extend(handle.join().unwrap());
    }

    assert!(queue.is_empty());
    all.sort_unstable();
    let expected: Vec<usize> = (0..COUNT).collect();
    assert_eq!(all, expected);
}

/// Four producers, four consumers: the multiset consumed equals the
/// multiset produced.
#[test]
fn producer_consumer_multisets_match() {
    const PRODUCERS: usize = 4;
    const CONSUMERS: usize = 4;
    const ITEMS: usize = 1_000;

    let queue = Arc::new(Queue::new());
    let mut handles = Vec::new();

    for tid in 0..PRODUCERS {
        let queue = queue.clone();
        handles.push(thread::spawn(move || {
            for i in 0..ITEMS {
                queue.enqueue(tid * ITEMS + i);
            }
            Vec::new()
        }));
    }

    for _ in 0..CONSUMERS {
        let queue = queue.clone();
        handles.push(thread::spawn(move || {
            let mut taken = Vec::with_capacity(ITEMS);
            while taken.len() < ITEMS {
                match queue.dequeue() {
                    Some(value) => taken.push(value),
                    None => thread::yield_now(),
                }
            }
            taken
        }));
    }

    let mut consumed: Vec<usize> = Vec::new();
    for handle in handles {
        consumed.extend(handle.join().unwrap());
    }

    assert!(queue.is_empty());
    consumed.sort_unstable();
    let expected: Vec<usize> = (0..PRODUCERS * ITEMS).collect();
    assert_eq!(consumed, expected);
}

/// Per-producer order survives interleaving: if one thread enqueues x
/// before y, no consumer observes y's sequence number before x's.
#[test]
fn fifo_order_per_producer() {
    const PRODUCERS: usize = 2;
    const ITEMS: usize = 5_000;

    // (producer id, sequence number)
    let queue = Arc::new(Queue::new());
    let mut producers = Vec::new();
    for tid in 0..PRODUCERS {
        let queue = queue.clone();
        producers.push(thread::spawn(move || {
            for seq in 0..ITEMS {
                queue.enqueue((tid, seq));
            }
        }));
    }

    let mut taken = 0;
    let mut last_seq = [None::<usize>; PRODUCERS];
    while taken < PRODUCERS * ITEMS {
        match queue.dequeue() {
            Some((tid, seq)) => {
                if let Some(prev) = last_seq[tid] {
                    assert!(
                        seq > prev,
                        "producer {} reordered: {} after {}",
                        tid,
                        seq,
                        prev
                    );
                }
                last_seq[tid] = Some(seq);
                taken += 1;
            }
            None => thread::yield_now(),
        }
    }

    for producer in producers {
        producer.join().unwrap();
    }
    assert_eq!(queue.dequeue(), None);
}

struct Tracked {
    value: usize,
    drops: Arc<AtomicUsize>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::Release);
    }
}

#[test]
fn values_drop_exactly_once() {
    let drops = Arc::new(AtomicUsize::new(0));
    const COUNT: usize = 100;

    {
        let queue = Queue::new();
        for i in 0..COUNT {
            queue.enqueue(Tracked {
                value: i,
                drops: drops.clone(),
            });
        }
        // Dequeue half; the drop of the queue drains the rest.
        for i in 0..COUNT / 2 {
            let taken = queue.dequeue();
            assert_eq!(taken.map(|t| t.value), Some(i));
        }
        assert_eq!(drops.load(Ordering::Acquire), COUNT / 2);
    }

    assert_eq!(drops.load(Ordering::Acquire), COUNT);
}

/// Randomized mixed workload across enqueue/dequeue with value conservation.
#[test]
fn randomized_workload_conserves_values() {
    use rand::Rng;

    const THREADS: usize = 4;
    const OPS: usize = 10_000;

    let queue = Arc::new(Queue::new());
    let enqueued = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for tid in 0..THREADS {
        let queue = queue.clone();
        let enqueued = enqueued.clone();
        handles.push(thread::spawn(move || {
            let mut rng = rand::thread_rng();
            let mut taken = Vec::new();
            for i in 0..OPS {
                if rng.gen_bool(0.6) {
                    queue.enqueue(tid * OPS + i);
                    enqueued.fetch_add(1, Ordering::Relaxed);
                } else if let Some(value) = queue.dequeue() {
                    taken.push(value);
                }
            }
            taken
        }));
    }

    let mut observed = 0usize;
    for handle in handles {
        observed += handle.join().unwrap().len();
    }
    while queue.dequeue().is_some() {
        observed += 1;
    }

    assert_eq!(observed, enqueued.load(Ordering::Relaxed));
}
