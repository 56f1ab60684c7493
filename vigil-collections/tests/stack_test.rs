//! Stack correctness: LIFO order, value conservation, drop accounting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use vigil_collections::Stack;

#[test]
fn empty_stack_pops_none() {
    let stack: Stack<i32> = Stack::new();
    assert!(stack.is_empty());
    assert_eq!(stack.pop(), None);
}

#[test]
fn single_push_pop_round_trip() {
    let stack = Stack::new();
    stack.push(42);
    assert!(!stack.is_empty());
    assert_eq!(stack.pop(), Some(42));
    assert_eq!(stack.pop(), None);
}

#[test]
fn pop_returns_reverse_push_order() {
    let stack = Stack::new();
    const COUNT: i64 = 1_000;

    for i in 0..COUNT {
        stack.push(i);
    }
    for i in (0..COUNT).rev() {
        assert_eq!(stack.pop(), Some(i));
    }
    assert_eq!(stack.pop(), None);
}

#[test]
fn round_trips_non_copy_values() {
    let stack = Stack::new();
    stack.push(String::from("alpha"));
    stack.push(String::from("beta"));
    assert_eq!(stack.pop().as_deref(), Some("beta"));
    assert_eq!(stack.pop().as_deref(), Some("alpha"));
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
        let stack = Stack::new();
        for i in 0..COUNT {
            stack.push(Tracked {
                value: i,
                drops: drops.clone(),
            });
        }
        // Pop half; the drop of the stack drains the rest.
        for _ in 0..COUNT / 2 {
            let popped = stack.pop();
            assert!(popped.map(|t| t.value < COUNT).unwrap_or(false));
        }
        assert_eq!(drops.load(Ordering::Acquire), COUNT / 2);
    }

    assert_eq!(drops.load(Ordering::Acquire), COUNT);
}

/// Pre-filled stack, four consumers, no producers: the union of everything
/// popped is exactly the original contents, with no duplicates.
#[test]
fn concurrent_pop_drains_exact_set() {
    const COUNT: usize = 10_000;
    const THREADS: usize = 4;

    let stack = Arc::new(Stack::new());
    for i in 0..COUNT {
        stack.push(i);
    }

    let mut handles = Vec::new();
    for _ in 0..THREADS {
        let stack = stack.clone();
        handles.push(thread::spawn(move || {
            let mut popped = Vec::new();
            while let Some(value) = stack.pop() {
                popped.push(value);
            }
            popped
        }));
    }

    let mut all: Vec<usize> = Vec::with_capacity(COUNT);
    for handle in handles {
        all.extend(handle.join().unwrap());
    }

    assert!(stack.is_empty());
    all.sort_unstable();
    let expected: Vec<usize> = (0..COUNT).collect();
    assert_eq!(all, expected);
}

/// Mixed concurrent workload: whatever was pushed equals whatever was
/// popped plus whatever is left in the structure.
#[test]
fn concurrent_push_pop_conserves_values() {
    const THREADS: usize = 4;
    const ITEMS: usize = 2_500;

    let stack = Arc::new(Stack::new());
    let mut handles = Vec::new();

    for tid in 0..THREADS {
        let stack = stack.clone();
        handles.push(thread::spawn(move || {
            let mut popped = Vec::new();
            for i in 0..ITEMS {
                stack.push(tid * ITEMS + i);
                if i % 2 == 0 {
                    if let Some(value) = stack.pop() {
                        popped.push(value);
                    }
                }
            }
            popped
        }));
    }

    let mut observed: Vec<usize> = Vec::new();
    for handle in handles {
        observed.extend(handle.join().unwrap());
    }
    while let Some(value) = stack.pop() {
        observed.push(value);
    }

    observed.sort_unstable();
    let expected: Vec<usize> = (0..THREADS * ITEMS).collect();
    assert_eq!(observed, expected);
}
