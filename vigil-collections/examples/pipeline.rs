//! Producer/consumer pipeline over the hazard-pointer backed queue.

use std::sync::Arc;
use std::thread;

use vigil_collections::{Queue, Stack};

fn main() {
    println!("Lock-free pipeline example");
    println!("==========================\n");

    // Single-threaded sanity checks
    println!("Single-threaded:");
    {
        let stack = Stack::new();
        stack.push(1);
        stack.push(2);
        stack.push(3);
        assert_eq!(stack.pop(), Some(3));
        assert_eq!(stack.pop(), Some(2));
        assert_eq!(stack.pop(), Some(1));
        assert_eq!(stack.pop(), None);

        let queue = Queue::new();
        queue.enqueue(1);
        queue.enqueue(2);
        queue.enqueue(3);
        assert_eq!(queue.dequeue(), Some(1));
        assert_eq!(queue.dequeue(), Some(2));
        assert_eq!(queue.dequeue(), Some(3));
        assert_eq!(queue.dequeue(), None);

        println!("Stack pops in LIFO order, queue dequeues in FIFO order.");
    }

    // Multi-threaded pipeline
    println!("\nPipeline (4 producers x 10000 items, 4 consumers):");
    {
        const PRODUCERS: usize = 4;
        const CONSUMERS: usize = 4;
        const ITEMS: usize = 10_000;

        let queue = Arc::new(Queue::new());
        let start = std::time::Instant::now();

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|tid| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..ITEMS {
                        queue.enqueue(tid * ITEMS + i);
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || {
                    let mut sum = 0u64;
                    let mut taken = 0;
                    while taken < ITEMS {
                        match queue.dequeue() {
                            Some(value) => {
                                sum += value as u64;
                                taken += 1;
                            }
                            None => thread::yield_now(),
                        }
                    }
                    sum
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }
        let total: u64 = consumers.into_iter().map(|c| c.join().unwrap()).sum();

        let elapsed = start.elapsed();
        let expected: u64 = (0..(PRODUCERS * ITEMS) as u64).sum();
        assert_eq!(total, expected);

        let ops = (PRODUCERS * ITEMS * 2) as f64;
        println!(
            "Moved {} items in {:?} ({:.0} ops/sec), checksum OK.",
            PRODUCERS * ITEMS,
            elapsed,
            ops / elapsed.as_secs_f64()
        );
    }

    println!("\nAll good.");
}
